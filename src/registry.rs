//! Function catalog shared by the validator and the query compiler.
//!
//! The catalog is configuration, not code: it is loaded from JSON of the
//! shape `{ name: { kind, args: [{name, type, optional}], returns } }`. The
//! built-in catalog is embedded from `data/functions.json`.

use crate::ast::DataType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

const BUILTIN_CATALOG: &str = include_str!("../data/functions.json");

/// Argument names that are only ever bound by name.
pub const RESERVED_ARGUMENTS: [&str; 2] = ["kql", "shift"];

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid function catalog: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Function '{function}' declares argument '{argument}' twice")]
    DuplicateArgument { function: String, argument: String },
}

/// How the query compiler treats a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    /// Metric computed by the search engine, one bucket per call
    Aggregation,
    /// Windowed computation over the buckets of its first argument
    Column,
    /// Arithmetic over other metrics
    Math,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub kind: FunctionKind,
    #[serde(default)]
    pub description: String,
    pub args: Vec<ArgSpec>,
    pub returns: DataType,
}

impl FunctionSignature {
    /// Arguments that can be bound by position, in declaration order.
    pub fn positional_params(&self) -> impl Iterator<Item = &ArgSpec> {
        self.args
            .iter()
            .filter(|arg| !RESERVED_ARGUMENTS.contains(&arg.name.as_str()))
    }

    pub fn arg(&self, name: &str) -> Option<&ArgSpec> {
        self.args.iter().find(|arg| arg.name == name)
    }

    /// Usage line such as `percentile(field, [percentile], [kql], [shift])`.
    pub fn usage(&self, name: &str) -> String {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.optional {
                    format!("[{}]", arg.name)
                } else {
                    arg.name.clone()
                }
            })
            .collect();
        format!("{}({})", name, args.join(", "))
    }
}

/// Immutable catalog of known functions.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, FunctionSignature>,
}

impl FunctionRegistry {
    /// The catalog shipped with the crate.
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_CATALOG).expect("embedded function catalog is valid")
    }

    /// Loads a catalog from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let functions: BTreeMap<String, FunctionSignature> = serde_json::from_str(json)?;

        for (name, signature) in &functions {
            let mut seen = Vec::new();
            for arg in &signature.args {
                if seen.contains(&arg.name.as_str()) {
                    return Err(RegistryError::DuplicateArgument {
                        function: name.clone(),
                        argument: arg.name.clone(),
                    });
                }
                seen.push(arg.name.as_str());
            }
        }

        Ok(FunctionRegistry { functions })
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn kind(&self, name: &str) -> Option<FunctionKind> {
        self.get(name).map(|s| s.kind)
    }

    pub fn is_aggregatable(&self, name: &str) -> bool {
        self.kind(name) == Some(FunctionKind::Aggregation)
    }

    pub fn is_column(&self, name: &str) -> bool {
        self.kind(name) == Some(FunctionKind::Column)
    }

    /// Function names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FunctionSignature)> {
        self.functions.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_loads() {
        let registry = FunctionRegistry::builtin();
        assert!(registry.is_aggregatable("sum"));
        assert!(registry.is_column("moving_average"));
        assert_eq!(registry.kind("abs"), Some(FunctionKind::Math));
        assert!(!registry.contains("totalSum"));
    }

    #[test]
    fn reserved_arguments_are_not_positional() {
        let registry = FunctionRegistry::builtin();
        let sum = registry.get("sum").unwrap();
        let positional: Vec<&str> = sum.positional_params().map(|a| a.name.as_str()).collect();
        assert_eq!(positional, vec!["field"]);
        assert_eq!(sum.usage("sum"), "sum(field, [kql], [shift])");
    }

    #[test]
    fn duplicate_argument_is_rejected() {
        let json = r#"{"f": {"kind": "math", "args": [
            {"name": "x", "type": "NUMBER"}, {"name": "x", "type": "NUMBER"}
        ], "returns": "NUMBER"}}"#;
        assert!(matches!(
            FunctionRegistry::from_json(json),
            Err(RegistryError::DuplicateArgument { .. })
        ));
    }
}
