use clap::{Parser as ClapParser, Subcommand};
use formula_lang::BuildOptions;
use formula_lang::cli::{self, CheckOptions, CliError, CompileOptions};
use std::io::{self, Read};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(ClapParser)]
#[command(name = "formula")]
#[command(about = "Formula - parse, validate and compile metric formulas into aggregation queries")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a formula
    Check {
        /// The formula (reads from stdin if not provided)
        formula: Option<String>,

        /// JSON file with the data view fields: [{"name", "type", "aggregatable"}]
        #[arg(short, long)]
        fields: Option<PathBuf>,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Compile a formula into an aggregation query
    Compile {
        /// The formula (reads from stdin if not provided)
        formula: Option<String>,

        /// Target index or index pattern
        #[arg(short, long)]
        index: String,

        /// Start of the time range, e.g. now-15m
        #[arg(long, requires = "to")]
        from: Option<String>,

        /// End of the time range, e.g. now
        #[arg(long, requires = "from")]
        to: Option<String>,

        /// JSON file with an array of extra filter clauses
        #[arg(long)]
        filters: Option<PathBuf>,

        /// JSON file with the data view fields
        #[arg(long)]
        fields: Option<PathBuf>,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// List functions, or show one function
    Functions {
        /// Function name
        name: Option<String>,
    },

    /// Show documentation (lists categories without an argument)
    Docs {
        /// Category name
        category: Option<String>,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "formula_lang=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            formula,
            fields,
            config,
            pretty,
        } => run_check(formula, fields, config, pretty),
        Commands::Compile {
            formula,
            index,
            from,
            to,
            filters,
            fields,
            config,
            pretty,
        } => {
            let mut build = BuildOptions::new(index);
            if let (Some(from), Some(to)) = (from, to) {
                build = build.time_range(from, to);
            }
            run_compile(formula, build, filters, fields, config, pretty)
        }
        Commands::Functions { name } => run_functions(name),
        Commands::Docs { category } => run_docs(category),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

/// Formula from the argument, or from stdin when it is piped.
fn read_formula(formula: Option<String>) -> Result<String, CliError> {
    match formula {
        Some(f) => Ok(f),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
        None => Err(CliError::NoInput),
    }
}

fn run_check(
    formula: Option<String>,
    fields: Option<PathBuf>,
    config: Option<PathBuf>,
    pretty: bool,
) -> Result<bool, CliError> {
    let engine = cli::load_engine(config.as_deref())?;
    let options = CheckOptions {
        formula: read_formula(formula)?,
        context: fields.as_deref().map(cli::load_fields).transpose()?,
    };

    let check = cli::execute_check(&engine, &options)?;
    println!("{}", cli::to_json(&check, pretty)?);
    Ok(check.valid)
}

fn run_compile(
    formula: Option<String>,
    mut build: BuildOptions,
    filters: Option<PathBuf>,
    fields: Option<PathBuf>,
    config: Option<PathBuf>,
    pretty: bool,
) -> Result<bool, CliError> {
    let engine = cli::load_engine(config.as_deref())?;
    if let Some(path) = filters {
        let text = std::fs::read_to_string(path)?;
        build.filters = serde_json::from_str(&text)?;
    }

    let options = CompileOptions {
        formula: read_formula(formula)?,
        build,
        context: fields.as_deref().map(cli::load_fields).transpose()?,
    };

    let document = cli::execute_compile(&engine, &options)?;
    println!("{}", cli::to_json(&document, pretty)?);
    Ok(true)
}

fn run_functions(name: Option<String>) -> Result<bool, CliError> {
    let registry = formula_lang::FunctionRegistry::builtin();
    match name {
        Some(name) => print!("{}", cli::function_reference(&registry, &name)?),
        None => print!("{}", cli::functions_overview(&registry)),
    }
    Ok(true)
}

fn run_docs(category: Option<String>) -> Result<bool, CliError> {
    match category {
        Some(category) => {
            let registry = formula_lang::FunctionRegistry::builtin();
            print!("{}", cli::get_doc_category(&category, &registry)?);
        }
        None => print!("{}", cli::get_docs_overview()),
    }
    Ok(true)
}
