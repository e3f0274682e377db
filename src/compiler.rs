//! Translation of formula syntax trees into aggregation query documents.
//!
//! Each call to an aggregation function becomes one named bucket
//! (`"0-bucket"`, `"1-bucket"`, ...). Numbering restarts for every
//! [`QueryCompiler::build_query`] call, so ids are unique within a document
//! but not stable across compilations.
//!
//! ```text
//! count() / count(shift='1d')
//! ```
//!
//! compiles to two `value_count` buckets, the second wrapped in a filter
//! aggregation over the time range shifted back by one day.

pub mod kql;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use crate::{
    ast::{LiteralValue, Node, NodeKind},
    config::QueryConfig,
    registry::{FunctionKind, FunctionRegistry},
    validator::is_valid_shift,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Field counted by `count()` when no field is given.
const DOCUMENT_COUNT_FIELD: &str = "_index";

const DEFAULT_PERCENTILE: f64 = 95.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("Unknown function '{name}' at position {position}")]
    UnknownFunction { name: String, position: usize },

    #[error("Function '{function}' requires a field at position {position}")]
    MissingField { function: String, position: usize },

    #[error("Argument '{argument}' of '{function}' {reason} (position {position})")]
    InvalidArgument {
        function: String,
        argument: String,
        reason: String,
        position: usize,
    },
}

/// Absolute or date-math time bounds, e.g. `now-15m` to `now`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: String,
    pub to: String,
}

impl TimeRange {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        TimeRange {
            from: from.into(),
            to: to.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildOptions {
    pub index: String,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
    /// Filter clauses added verbatim to the query
    #[serde(default)]
    pub filters: Vec<Value>,
}

impl BuildOptions {
    pub fn new(index: impl Into<String>) -> Self {
        BuildOptions {
            index: index.into(),
            ..Default::default()
        }
    }

    pub fn time_range(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.time_range = Some(TimeRange::new(from, to));
        self
    }

    pub fn filter(mut self, filter: Value) -> Self {
        self.filters.push(filter);
        self
    }
}

/// One emitted bucket and the call it was generated from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketSpec {
    pub id: String,
    pub function: String,
    pub field: Option<String>,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryBody {
    pub size: u32,
    pub query: Value,
    pub aggs: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryDocument {
    pub index: String,
    pub body: QueryBody,
    #[serde(skip)]
    pub buckets: Vec<BucketSpec>,
}

pub struct QueryCompiler {
    registry: Arc<FunctionRegistry>,
    time_field: String,
}

impl QueryCompiler {
    pub fn new(registry: Arc<FunctionRegistry>, config: &QueryConfig) -> Self {
        QueryCompiler {
            registry,
            time_field: config.time_field.clone(),
        }
    }

    pub fn build_query(&self, ast: &Node, options: &BuildOptions) -> Result<QueryDocument, CompileError> {
        let mut compilation = Compilation {
            compiler: self,
            options,
            next_id: 0,
            aggs: Map::new(),
            buckets: Vec::new(),
        };
        compilation.visit(ast)?;

        let mut filters = options.filters.clone();
        if let Some(range) = &options.time_range {
            filters.push(self.range_filter(&range.from, &range.to));
        }

        tracing::debug!(
            index = %options.index,
            buckets = compilation.buckets.len(),
            "formula compiled"
        );

        Ok(QueryDocument {
            index: options.index.clone(),
            body: QueryBody {
                size: 0,
                query: json!({ "bool": { "filter": filters } }),
                aggs: compilation.aggs,
            },
            buckets: compilation.buckets,
        })
    }

    fn range_filter(&self, from: &str, to: &str) -> Value {
        json!({ "range": { self.time_field.as_str(): { "gte": from, "lte": to } } })
    }
}

/// State of one `build_query` call.
struct Compilation<'a> {
    compiler: &'a QueryCompiler,
    options: &'a BuildOptions,
    next_id: usize,
    aggs: Map<String, Value>,
    buckets: Vec<BucketSpec>,
}

impl Compilation<'_> {
    fn visit(&mut self, node: &Node) -> Result<(), CompileError> {
        match &node.kind {
            NodeKind::FunctionCall {
                name,
                positional_args,
                named_args,
            } => match self.compiler.registry.kind(name) {
                None => Err(CompileError::UnknownFunction {
                    name: name.clone(),
                    position: node.position,
                }),
                Some(FunctionKind::Aggregation) => {
                    self.emit_bucket(node, name, positional_args, named_args)
                }
                // Windowing happens after the search; only the inner metric is queried.
                Some(FunctionKind::Column) => {
                    match positional_args.first().or_else(|| named_args.get("metric")) {
                        Some(metric) => self.visit(metric),
                        None => Ok(()),
                    }
                }
                Some(FunctionKind::Math) => {
                    for arg in node.children() {
                        self.visit(arg)?;
                    }
                    Ok(())
                }
            },
            NodeKind::BinaryOp { left, right, .. } => {
                self.visit(left)?;
                self.visit(right)
            }
            NodeKind::UnaryOp { operand, .. } => self.visit(operand),
            NodeKind::FieldRef { .. } | NodeKind::Literal { .. } => Ok(()),
        }
    }

    fn emit_bucket(
        &mut self,
        node: &Node,
        name: &str,
        positional_args: &[Node],
        named_args: &BTreeMap<String, Node>,
    ) -> Result<(), CompileError> {
        let field = positional_args
            .first()
            .or_else(|| named_args.get("field"))
            .and_then(field_name);

        let metric = self.metric(node, name, field.as_deref(), positional_args, named_args)?;

        let mut filters = Vec::new();
        if let Some(kql) = string_argument(name, "kql", named_args)? {
            filters.push(kql::translate(kql));
        }

        let shift = string_argument(name, "shift", named_args)?;
        if let Some(shift) = shift {
            if !is_valid_shift(shift) {
                return Err(CompileError::InvalidArgument {
                    function: name.to_string(),
                    argument: "shift".to_string(),
                    reason: format!("is not a valid time shift: '{}'", shift),
                    position: named_args["shift"].position,
                });
            }
            if let Some(range) = &self.options.time_range {
                let shifted = if shift == "previous" {
                    previous_range(range).ok_or_else(|| CompileError::InvalidArgument {
                        function: name.to_string(),
                        argument: "shift".to_string(),
                        reason: format!(
                            "'previous' needs a time range of known length, got '{}' to '{}'",
                            range.from, range.to
                        ),
                        position: named_args["shift"].position,
                    })?
                } else {
                    TimeRange::new(shift_date(&range.from, shift), shift_date(&range.to, shift))
                };
                filters.push(self.compiler.range_filter(&shifted.from, &shifted.to));
            }
        }

        let mut bucket = match filters.len() {
            0 => metric,
            1 => json!({ "filter": filters.remove(0), "aggs": { "value": metric } }),
            _ => json!({ "filter": { "bool": { "filter": filters } }, "aggs": { "value": metric } }),
        };
        if let (Some(shift), Some(object)) = (shift, bucket.as_object_mut()) {
            object.insert("meta".to_string(), json!({ "shift": shift }));
        }

        let id = format!("{}-bucket", self.next_id);
        self.next_id += 1;
        self.aggs.insert(id.clone(), bucket);
        self.buckets.push(BucketSpec {
            id,
            function: name.to_string(),
            field,
            position: node.position,
        });
        Ok(())
    }

    /// The metric aggregation computing `name` over `field`.
    fn metric(
        &self,
        node: &Node,
        name: &str,
        field: Option<&str>,
        positional_args: &[Node],
        named_args: &BTreeMap<String, Node>,
    ) -> Result<Value, CompileError> {
        if name == "count" {
            let field = field.unwrap_or(DOCUMENT_COUNT_FIELD);
            return Ok(json!({ "value_count": { "field": field } }));
        }

        let field = field.ok_or_else(|| CompileError::MissingField {
            function: name.to_string(),
            position: node.position,
        })?;

        Ok(match name {
            "average" => json!({ "avg": { "field": field } }),
            "sum" => json!({ "sum": { "field": field } }),
            "min" => json!({ "min": { "field": field } }),
            "max" => json!({ "max": { "field": field } }),
            "median" => json!({ "percentiles": { "field": field, "percents": [50.0] } }),
            "percentile" => {
                let percent = number_argument(name, "percentile", 1, positional_args, named_args)?
                    .unwrap_or(DEFAULT_PERCENTILE);
                json!({ "percentiles": { "field": field, "percents": [percent] } })
            }
            "percentile_rank" => {
                let value = number_argument(name, "value", 1, positional_args, named_args)?
                    .ok_or_else(|| CompileError::InvalidArgument {
                        function: name.to_string(),
                        argument: "value".to_string(),
                        reason: "is required".to_string(),
                        position: node.position,
                    })?;
                json!({ "percentile_ranks": { "field": field, "values": [value] } })
            }
            "unique_count" => json!({ "cardinality": { "field": field } }),
            "standard_deviation" => json!({ "extended_stats": { "field": field } }),
            "last_value" => json!({
                "top_metrics": {
                    "metrics": { "field": field },
                    "sort": { self.compiler.time_field.as_str(): "desc" }
                }
            }),
            // Catalog entries without a dedicated translation use the
            // aggregation of the same name.
            other => json!({ other: { "field": field } }),
        })
    }
}

fn field_name(node: &Node) -> Option<String> {
    match &node.kind {
        NodeKind::FieldRef { field } => Some(field.clone()),
        NodeKind::Literal {
            value: LiteralValue::String(s),
        } => Some(s.clone()),
        _ => None,
    }
}

fn string_argument<'a>(
    function: &str,
    argument: &str,
    named_args: &'a BTreeMap<String, Node>,
) -> Result<Option<&'a str>, CompileError> {
    let Some(node) = named_args.get(argument) else {
        return Ok(None);
    };
    match node.as_literal().and_then(LiteralValue::as_str) {
        Some(text) => Ok(Some(text)),
        None => Err(CompileError::InvalidArgument {
            function: function.to_string(),
            argument: argument.to_string(),
            reason: "must be a string literal".to_string(),
            position: node.position,
        }),
    }
}

/// A numeric argument given by name or at positional `index`.
fn number_argument(
    function: &str,
    argument: &str,
    index: usize,
    positional_args: &[Node],
    named_args: &BTreeMap<String, Node>,
) -> Result<Option<f64>, CompileError> {
    let Some(node) = named_args.get(argument).or_else(|| positional_args.get(index)) else {
        return Ok(None);
    };
    match node.as_literal().and_then(LiteralValue::as_number) {
        Some(n) => Ok(Some(n)),
        None => Err(CompileError::InvalidArgument {
            function: function.to_string(),
            argument: argument.to_string(),
            reason: "must be a number literal".to_string(),
            position: node.position,
        }),
    }
}

/// The window of the same length that ends where `range` starts.
///
/// Works for `now`-relative bounds in fixed units (`now-15m` to `now` gives
/// `now-15m-15m` to `now-15m`) and for two absolute dates. Mixed bounds,
/// rounding and calendar units (`M`, `y`) have no fixed length and yield
/// `None`, as does an empty or inverted range.
pub fn previous_range(range: &TimeRange) -> Option<TimeRange> {
    let seconds = match (relative_offset(&range.from), relative_offset(&range.to)) {
        // Offsets count back from now, so `from` has the larger one.
        (Some(from), Some(to)) => from.checked_sub(to)?,
        (None, None) => {
            let from = absolute_date(&range.from)?;
            let to = absolute_date(&range.to)?;
            (to - from).num_seconds()
        }
        _ => return None,
    };
    if seconds <= 0 {
        return None;
    }

    let width = format_duration(seconds);
    Some(TimeRange::new(shift_date(&range.from, &width), range.from.clone()))
}

/// Seconds before now for `now` or `now-<n><unit>`.
fn relative_offset(date: &str) -> Option<i64> {
    let rest = date.strip_prefix("now")?;
    if rest.is_empty() {
        return Some(0);
    }
    let amount = rest.strip_prefix('-')?;
    let unit = amount.chars().last()?;
    let count: i64 = amount[..amount.len() - unit.len_utf8()].parse().ok()?;
    count.checked_mul(unit_seconds(unit)?)
}

fn absolute_date(date: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return Some(parsed.naive_utc());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S") {
        return Some(parsed);
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
}

fn unit_seconds(unit: char) -> Option<i64> {
    Some(match unit {
        's' => 1,
        'm' => 60,
        'h' => 3_600,
        'd' => 86_400,
        'w' => 604_800,
        _ => return None,
    })
}

/// Largest whole unit, e.g. 900 seconds is `15m`.
fn format_duration(seconds: i64) -> String {
    for (unit, size) in [('w', 604_800), ('d', 86_400), ('h', 3_600), ('m', 60)] {
        if seconds % size == 0 {
            return format!("{}{}", seconds / size, unit);
        }
    }
    format!("{}s", seconds)
}

/// Moves a date back by `shift` using date math: `now-15m` becomes
/// `now-15m-1d`, `2024-01-01` becomes `2024-01-01||-1d`.
pub fn shift_date(date: &str, shift: &str) -> String {
    if date.starts_with("now") || date.contains("||") {
        format!("{}-{}", date, shift)
    } else {
        format!("{}||-{}", date, shift)
    }
}
