use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Type tag of a single operation parameter, as advertised by its provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    #[default]
    String,
    Number,
    Boolean,
    Object,
}

impl ParamType {
    /// Map a JSON schema `type` keyword onto a type tag.
    ///
    /// Untyped and unknown parameters are treated as strings.
    pub fn from_schema_type(schema_type: Option<&str>) -> Self {
        match schema_type {
            Some("number") | Some("integer") => Self::Number,
            Some("boolean") => Self::Boolean,
            Some("object") | Some("array") => Self::Object,
            _ => Self::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single declared parameter of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// A remotely callable operation advertised by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Parameters in the order the provider declared them.
    #[serde(default)]
    pub parameters: IndexMap<String, ParamSpec>,
}

impl OperationDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: IndexMap::new(),
        }
    }

    /// Builder-style helper used by providers and tests.
    pub fn with_param(
        mut self,
        name: impl Into<String>,
        param_type: ParamType,
        description: Option<&str>,
        required: bool,
    ) -> Self {
        self.parameters.insert(
            name.into(),
            ParamSpec {
                param_type,
                description: description.map(str::to_string),
                required,
            },
        );
        self
    }

    /// Build a descriptor from an MCP-style `inputSchema` JSON schema object.
    pub fn from_input_schema(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: &Value,
    ) -> Self {
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut parameters = IndexMap::new();
        if let Some(props) = schema.get("properties").and_then(Value::as_object) {
            for (param, prop) in props {
                let description = prop
                    .get("description")
                    .and_then(Value::as_str)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string);
                parameters.insert(
                    param.clone(),
                    ParamSpec {
                        param_type: ParamType::from_schema_type(
                            prop.get("type").and_then(Value::as_str),
                        ),
                        description,
                        required: required.contains(&param.as_str()),
                    },
                );
            }
        }

        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    pub fn has_params(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.parameters.contains_key(*n))
    }
}

/// One catalog entry: the descriptor plus the name of the provider that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub descriptor: OperationDescriptor,
    pub provider: String,
}

/// The merged set of operations visible for one request.
///
/// Iteration follows insertion order; equality ignores it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: IndexMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an operation, returning the provider that already owns the name on collision.
    pub fn insert(
        &mut self,
        descriptor: OperationDescriptor,
        provider: impl Into<String>,
    ) -> Result<(), String> {
        if let Some(existing) = self.entries.get(&descriptor.name) {
            return Err(existing.provider.clone());
        }
        self.entries.insert(
            descriptor.name.clone(),
            CatalogEntry {
                descriptor,
                provider: provider.into(),
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.entries.values().map(|e| &e.descriptor)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// The interpreter's pick, not yet checked against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateCall {
    None,
    Operation {
        name: String,
        arguments: Map<String, Value>,
    },
}

impl CandidateCall {
    pub fn operation(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self::Operation {
            name: name.into(),
            arguments,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Operation { name, .. } => Some(name),
        }
    }

    pub fn arguments(&self) -> Map<String, Value> {
        match self {
            Self::None => Map::new(),
            Self::Operation { arguments, .. } => arguments.clone(),
        }
    }
}

/// Result of routing one candidate call.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Success(Value),
    NoOperationSelected,
    UnknownOperation(String),
    InvocationFailure(String),
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// A configured tool provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl ProviderEndpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeRole {
    User,
    Assistant,
}

/// A prior turn the caller explicitly passes back in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub role: ExchangeRole,
    pub content: String,
}
