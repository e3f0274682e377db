//! Configuration System
//!
//! Limits and tuning knobs for the formula pipeline. Every section and field
//! has a default, so an empty TOML document is a valid configuration.
//!
//! ```toml
//! [security]
//! max_depth = 20
//!
//! [performance]
//! max_complexity = 100
//!
//! [cache]
//! parse_capacity = 1000
//! ```

use regex::RegexSet;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid forbidden pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormulaConfig {
    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub performance: PerformanceConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub debounce: DebounceConfig,

    #[serde(default)]
    pub query: QueryConfig,
}

impl FormulaConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: FormulaConfig = toml::from_str(source)?;
        config.security.compile_patterns()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }
}

/// Caps enforced by the security pass.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Longest allowed JSON serialization of the syntax tree
    #[serde(default = "default_max_serialized_length")]
    pub max_serialized_length: usize,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_max_function_calls")]
    pub max_function_calls: usize,

    /// Case-insensitive regular expressions rejected inside string literals
    #[serde(default = "default_forbidden_patterns")]
    pub forbidden_patterns: Vec<String>,
}

fn default_max_serialized_length() -> usize {
    10_000
}

fn default_max_depth() -> usize {
    20
}

fn default_max_function_calls() -> usize {
    50
}

fn default_forbidden_patterns() -> Vec<String> {
    [
        r"<script",
        r"javascript:",
        r"eval\s*\(",
        r"function\s*\(",
        r"=>",
        r"__proto__",
        r"constructor\s*\[",
        r"\$\{",
        r"require\s*\(",
        r"import\s*\(",
        r"process\.",
        r"document\.",
        r"window\.",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

impl SecurityConfig {
    pub fn compile_patterns(&self) -> Result<RegexSet, regex::Error> {
        let patterns = self.forbidden_patterns.iter().map(|p| format!("(?i){}", p));
        RegexSet::new(patterns)
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_serialized_length: default_max_serialized_length(),
            max_depth: default_max_depth(),
            max_function_calls: default_max_function_calls(),
            forbidden_patterns: default_forbidden_patterns(),
        }
    }
}

/// Thresholds for the performance heuristics.
#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceConfig {
    #[serde(default = "default_max_complexity")]
    pub max_complexity: u32,

    #[serde(default = "default_max_aggregations")]
    pub max_aggregations: usize,

    /// A subexpression is reported once it occurs more often than this
    #[serde(default = "default_repeat_threshold")]
    pub repeat_threshold: usize,

    /// ...and its own complexity is above this
    #[serde(default = "default_repeat_min_complexity")]
    pub repeat_min_complexity: u32,
}

fn default_max_complexity() -> u32 {
    100
}

fn default_max_aggregations() -> usize {
    10
}

fn default_repeat_threshold() -> usize {
    2
}

fn default_repeat_min_complexity() -> u32 {
    5
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_complexity: default_max_complexity(),
            max_aggregations: default_max_aggregations(),
            repeat_threshold: default_repeat_threshold(),
            repeat_min_complexity: default_repeat_min_complexity(),
        }
    }
}

/// Cache sizes and expiry.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_parse_capacity")]
    pub parse_capacity: usize,

    #[serde(default = "default_response_capacity")]
    pub response_capacity: usize,

    #[serde(default = "default_response_capacity")]
    pub transformed_capacity: usize,

    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_parse_capacity() -> usize {
    1000
}

fn default_response_capacity() -> usize {
    100
}

fn default_ttl_secs() -> u64 {
    300 // 5 minutes
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            parse_capacity: default_parse_capacity(),
            response_capacity: default_response_capacity(),
            transformed_capacity: default_response_capacity(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DebounceConfig {
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_delay_ms() -> u64 {
    300
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
        }
    }
}

/// Settings for query generation.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Field used for time-range filters and time shifts
    #[serde(default = "default_time_field")]
    pub time_field: String,
}

fn default_time_field() -> String {
    "@timestamp".to_string()
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            time_field: default_time_field(),
        }
    }
}
