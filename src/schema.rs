//! Parameter schema: static catalog of parameter definitions.
//!
//! Definitions are data. The built-in catalog is `schema/remora.yaml`, embedded
//! at compile time; any other catalog in the same format can be loaded with
//! [`Registry::from_yaml_str`]. Every catalog goes through the same
//! construction-time self-check (unique keys, resolvable and acyclic
//! `depends_on` edges, defaults that satisfy their own constraints), so a
//! [`Registry`] that exists is consistent and immutable.

use crate::record::{is_valid_key, ValueRecord};
use crate::value::{DType, Scalar, Value};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const BUILTIN_SCHEMA: &str = include_str!("../schema/remora.yaml");

/// Parameter groups, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    Domain,
    Timing,
    Physics,
    Mixing,
    Advection,
    Boundary,
    Output,
    Parallel,
    Restart,
}

impl Group {
    pub const ALL: [Group; 9] = [
        Group::Domain,
        Group::Timing,
        Group::Physics,
        Group::Mixing,
        Group::Advection,
        Group::Boundary,
        Group::Output,
        Group::Parallel,
        Group::Restart,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Group::Domain => "domain",
            Group::Timing => "timing",
            Group::Physics => "physics",
            Group::Mixing => "mixing",
            Group::Advection => "advection",
            Group::Boundary => "boundary",
            Group::Output => "output",
            Group::Parallel => "parallel",
            Group::Restart => "restart",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Group {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Group::ALL
            .into_iter()
            .find(|g| g.name() == s)
            .ok_or_else(|| format!("unknown group: {}", s))
    }
}

/// "Only meaningful while `key` equals `equals`."
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    pub key: String,
    pub equals: Value,
}

/// Definition of a single parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDefinition {
    pub key: String,
    pub label: String,
    pub description: String,
    pub group: Group,
    pub dtype: DType,
    /// `None` when the parameter has no default (it is simply absent until set).
    pub default: Option<Value>,
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub enum_values: Vec<String>,
    pub depends_on: Option<Dependency>,
    pub units: Option<String>,
    pub doc_link: Option<String>,
}

impl ParameterDefinition {
    /// Minimal definition; remaining fields take their empty values.
    pub fn new(key: impl Into<String>, group: Group, dtype: DType, default: Option<Value>) -> Self {
        let key = key.into();
        ParameterDefinition {
            label: key.clone(),
            key,
            description: String::new(),
            group,
            dtype,
            default,
            required: false,
            min: None,
            max: None,
            enum_values: Vec::new(),
            depends_on: None,
            units: None,
            doc_link: None,
        }
    }

    /// Whether `value` has the shape of this definition's type.
    pub fn shape_violation(&self, value: &Value) -> Option<String> {
        let scalar_ok = |s: &Scalar| match self.dtype {
            DType::IntegerTriple => matches!(s, Scalar::Integer(_)),
            DType::RealTriple => matches!(s, Scalar::Integer(_) | Scalar::Real(_)),
            _ => matches!(s, Scalar::Text(_)),
        };
        let ok = match (self.dtype, value) {
            (DType::Integer, Value::Integer(_)) => true,
            (DType::Real, Value::Integer(_) | Value::Real(_)) => true,
            (DType::Boolean, Value::Boolean(_)) => true,
            (DType::Text | DType::Enumeration, Value::Text(_)) => true,
            (DType::IntegerTriple | DType::RealTriple, Value::List(items)) => {
                if items.len() != 3 {
                    return Some(format!("expected 3 values, found {}", items.len()));
                }
                items.iter().all(scalar_ok)
            }
            (DType::TextList, Value::List(items)) => items.iter().all(scalar_ok),
            _ => false,
        };
        if ok {
            return None;
        }
        let found = match value {
            Value::List(items) => match items.iter().find(|s| !scalar_ok(*s)) {
                Some(bad) => format!("list containing {} {}", bad.kind(), bad),
                None => "list".to_string(),
            },
            other => format!("{} {}", other.kind(), other),
        };
        Some(format!("expected {}, found {}", self.dtype, found))
    }

    /// First numeric component outside `[min, max]`, if any.
    pub fn range_violation(&self, value: &Value) -> Option<String> {
        if self.min.is_none() && self.max.is_none() {
            return None;
        }
        let check = |x: f64, label: String| -> Option<String> {
            if let Some(min) = self.min {
                if x < min {
                    return Some(format!("{} = {} is below the minimum {}", label, x, min));
                }
            }
            if let Some(max) = self.max {
                if x > max {
                    return Some(format!("{} = {} is above the maximum {}", label, x, max));
                }
            }
            None
        };
        match value {
            Value::List(items) => items.iter().enumerate().find_map(|(i, s)| {
                s.as_f64()
                    .and_then(|x| check(x, format!("{}[{}]", self.key, i)))
            }),
            other => other.as_f64().and_then(|x| check(x, self.key.clone())),
        }
    }

    /// Enumeration value outside the allowed set, if any.
    pub fn enum_violation(&self, value: &Value) -> Option<String> {
        if self.dtype != DType::Enumeration {
            return None;
        }
        let v = value.as_str()?;
        if self.enum_values.iter().any(|e| e == v) {
            None
        } else {
            Some(format!(
                "{:?} is not one of: {}",
                v,
                self.enum_values.join(", ")
            ))
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Schema: {0}")]
    Schema(#[from] serde_yaml::Error),
    #[error("Duplicate parameter key: {0}")]
    DuplicateKey(String),
    #[error("{key} depends on unknown parameter {depends_on}")]
    DanglingDependency { key: String, depends_on: String },
    #[error("Dependency cycle: {}", .keys.join(" -> "))]
    DependencyCycle { keys: Vec<String> },
    #[error("Invalid default for {key}: {reason}")]
    InvalidDefault { key: String, reason: String },
    #[error("Invalid definition for {key}: {reason}")]
    InvalidDefinition { key: String, reason: String },
}

/// Immutable catalog of parameter definitions, in declaration order.
#[derive(Debug, Clone)]
pub struct Registry {
    definitions: Vec<ParameterDefinition>,
    by_key: HashMap<String, usize>,
}

impl Registry {
    /// The REMORA catalog shipped with the crate.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_yaml_str(BUILTIN_SCHEMA)
    }

    /// Load a catalog from its YAML form (a sequence of definitions).
    pub fn from_yaml_str(source: &str) -> Result<Self, RegistryError> {
        let raw: Vec<RawDefinition> = serde_yaml::from_str(source)?;
        let dtypes: HashMap<&str, DType> =
            raw.iter().map(|r| (r.key.as_str(), r.dtype)).collect();
        let mut definitions = Vec::with_capacity(raw.len());
        for r in &raw {
            definitions.push(r.build(&dtypes)?);
        }
        Self::from_definitions(definitions)
    }

    /// Build and self-check a catalog.
    pub fn from_definitions(definitions: Vec<ParameterDefinition>) -> Result<Self, RegistryError> {
        let mut by_key = HashMap::with_capacity(definitions.len());
        for (i, d) in definitions.iter().enumerate() {
            if by_key.insert(d.key.clone(), i).is_some() {
                return Err(RegistryError::DuplicateKey(d.key.clone()));
            }
        }
        let registry = Registry { definitions, by_key };
        for d in &registry.definitions {
            registry.check_definition(d)?;
        }
        registry.check_acyclic()?;
        tracing::debug!(parameters = registry.definitions.len(), "parameter registry built");
        Ok(registry)
    }

    fn check_definition(&self, d: &ParameterDefinition) -> Result<(), RegistryError> {
        let invalid = |reason: String| RegistryError::InvalidDefinition {
            key: d.key.clone(),
            reason,
        };
        if !is_valid_key(&d.key) {
            return Err(invalid("key must be non-empty without whitespace, '=', '#' or '\"'".into()));
        }
        if let (Some(min), Some(max)) = (d.min, d.max) {
            if min > max {
                return Err(invalid(format!("min {} exceeds max {}", min, max)));
            }
        }
        if (d.min.is_some() || d.max.is_some()) && !d.dtype.is_numeric() {
            return Err(invalid(format!("min/max on non-numeric type {}", d.dtype)));
        }
        match (d.dtype, d.enum_values.is_empty()) {
            (DType::Enumeration, true) => return Err(invalid("enumeration without values".into())),
            (DType::Enumeration, false) | (_, true) => {}
            (_, false) => return Err(invalid(format!("enum values on type {}", d.dtype))),
        }
        if let Some(dep) = &d.depends_on {
            let target = self
                .lookup(&dep.key)
                .ok_or_else(|| RegistryError::DanglingDependency {
                    key: d.key.clone(),
                    depends_on: dep.key.clone(),
                })?;
            if let Some(reason) = target.shape_violation(&dep.equals) {
                return Err(invalid(format!("depends_on {}: {}", dep.key, reason)));
            }
        }
        if let Some(default) = &d.default {
            let reason = d
                .shape_violation(default)
                .or_else(|| d.range_violation(default))
                .or_else(|| d.enum_violation(default));
            if let Some(reason) = reason {
                return Err(RegistryError::InvalidDefault {
                    key: d.key.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }

    /// Each definition has at most one outgoing edge, so following the chain
    /// from every node finds every cycle.
    fn check_acyclic(&self) -> Result<(), RegistryError> {
        for start in &self.definitions {
            let mut seen = HashSet::new();
            let mut chain = vec![start.key.clone()];
            seen.insert(start.key.as_str());
            let mut current = start;
            while let Some(dep) = &current.depends_on {
                chain.push(dep.key.clone());
                if !seen.insert(dep.key.as_str()) {
                    return Err(RegistryError::DependencyCycle { keys: chain });
                }
                match self.lookup(&dep.key) {
                    Some(next) => current = next,
                    None => break,
                }
            }
        }
        Ok(())
    }

    /// Exact key match.
    pub fn lookup(&self, key: &str) -> Option<&ParameterDefinition> {
        self.by_key.get(key).map(|&i| &self.definitions[i])
    }

    /// Position of `key` in declaration order.
    pub fn declaration_index(&self, key: &str) -> Option<usize> {
        self.by_key.get(key).copied()
    }

    pub fn definitions(&self) -> &[ParameterDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Members of `group` in declaration order.
    pub fn group_members(&self, group: Group) -> impl Iterator<Item = &ParameterDefinition> {
        self.definitions.iter().filter(move |d| d.group == group)
    }

    pub fn default_of(&self, key: &str) -> Option<&Value> {
        self.lookup(key)?.default.as_ref()
    }

    /// One entry per parameter that declares a default, in declaration order.
    pub fn defaults(&self) -> ValueRecord {
        self.definitions
            .iter()
            .filter_map(|d| d.default.clone().map(|v| (d.key.clone(), v)))
            .collect()
    }

    /// Record value for `key`, falling back to its registry default.
    pub fn effective<'a>(&'a self, key: &str, record: &'a ValueRecord) -> Option<&'a Value> {
        record.get(key).or_else(|| self.default_of(key))
    }

    /// Whether `key` is currently meaningful for `record`.
    ///
    /// Unknown keys and keys without `depends_on` are always active. Otherwise the
    /// controlling key's value (or its default when absent) must equal the
    /// required value.
    pub fn is_active(&self, key: &str, record: &ValueRecord) -> bool {
        let Some(dep) = self.lookup(key).and_then(|d| d.depends_on.as_ref()) else {
            return true;
        };
        self.effective(&dep.key, record)
            .is_some_and(|v| v.loosely_eq(&dep.equals))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDependency {
    key: String,
    equals: serde_yaml::Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDefinition {
    key: String,
    label: String,
    #[serde(default)]
    description: String,
    group: Group,
    dtype: DType,
    #[serde(default)]
    default: Option<serde_yaml::Value>,
    #[serde(default)]
    required: bool,
    min: Option<f64>,
    max: Option<f64>,
    #[serde(default)]
    enum_values: Vec<String>,
    depends_on: Option<RawDependency>,
    units: Option<String>,
    doc_link: Option<String>,
}

impl RawDefinition {
    fn build(&self, dtypes: &HashMap<&str, DType>) -> Result<ParameterDefinition, RegistryError> {
        let default = match &self.default {
            Some(v) => Some(value_from_yaml(v, self.dtype).map_err(|reason| {
                RegistryError::InvalidDefault {
                    key: self.key.clone(),
                    reason,
                }
            })?),
            None => None,
        };
        let depends_on = match &self.depends_on {
            Some(dep) => {
                let dtype = *dtypes.get(dep.key.as_str()).ok_or_else(|| {
                    RegistryError::DanglingDependency {
                        key: self.key.clone(),
                        depends_on: dep.key.clone(),
                    }
                })?;
                let equals = value_from_yaml(&dep.equals, dtype).map_err(|reason| {
                    RegistryError::InvalidDefinition {
                        key: self.key.clone(),
                        reason: format!("depends_on {}: {}", dep.key, reason),
                    }
                })?;
                Some(Dependency {
                    key: dep.key.clone(),
                    equals,
                })
            }
            None => None,
        };
        Ok(ParameterDefinition {
            key: self.key.clone(),
            label: self.label.clone(),
            description: self.description.clone(),
            group: self.group,
            dtype: self.dtype,
            default,
            required: self.required,
            min: self.min,
            max: self.max,
            enum_values: self.enum_values.clone(),
            depends_on,
            units: self.units.clone(),
            doc_link: self.doc_link.clone(),
        })
    }
}

fn value_from_yaml(v: &serde_yaml::Value, dtype: DType) -> Result<Value, String> {
    let mismatch = || format!("{:?} is not a valid {}", v, dtype);
    let scalar = |item: &serde_yaml::Value| -> Result<Scalar, String> {
        let s = match dtype {
            DType::IntegerTriple => item.as_i64().map(Scalar::Integer),
            DType::RealTriple => item.as_f64().map(Scalar::Real),
            _ => item.as_str().map(|s| Scalar::Text(s.to_string())),
        };
        s.ok_or_else(mismatch)
    };
    match dtype {
        DType::Integer => v.as_i64().map(Value::Integer).ok_or_else(mismatch),
        DType::Real => v.as_f64().map(Value::Real).ok_or_else(mismatch),
        DType::Boolean => v.as_bool().map(Value::Boolean).ok_or_else(mismatch),
        DType::Text | DType::Enumeration => v
            .as_str()
            .map(|s| Value::Text(s.to_string()))
            .ok_or_else(mismatch),
        DType::IntegerTriple | DType::RealTriple | DType::TextList => {
            let items = v.as_sequence().ok_or_else(mismatch)?;
            Ok(Value::List(items.iter().map(scalar).collect::<Result<_, _>>()?))
        }
    }
}
