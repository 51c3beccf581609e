//! Loosely-typed workload documents
//!
//! A [`WorkloadTree`] wraps one Kubernetes resource as an ordered JSON tree.
//! It is deliberately schema-less: the engine only needs to find container
//! lists and a handful of credential fields, so every lookup is path based
//! and a missing node is simply `None`.

use jsonptr::PointerBuf;
use serde_json::Value as JsonValue;
use std::fmt;

use crate::error::{DigesterError, Result};

/// One step of a [`TreePath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Mapping key
    Key(String),
    /// Sequence index
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Location of a node inside a [`WorkloadTree`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TreePath(Vec<PathSegment>);

impl TreePath {
    /// Root path
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from mapping keys
    pub fn from_keys(keys: &[&str]) -> Self {
        Self(keys.iter().map(|k| PathSegment::from(*k)).collect())
    }

    /// Return a new path with one more segment
    pub fn child(&self, segment: impl Into<PathSegment>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// Path segments in order
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Convert into a JSON pointer (RFC 6901), as used by JSON Patch
    pub fn to_pointer(&self) -> PointerBuf {
        let tokens: Vec<String> = self
            .0
            .iter()
            .map(|s| match s {
                PathSegment::Key(k) => k.clone(),
                PathSegment::Index(i) => i.to_string(),
            })
            .collect();
        PointerBuf::from_tokens(tokens.iter().map(String::as_str))
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            match segment {
                PathSegment::Key(k) => {
                    if !first {
                        f.write_str(".")?;
                    }
                    f.write_str(k)?;
                }
                PathSegment::Index(i) => write!(f, "[{}]", i)?,
            }
            first = false;
        }
        Ok(())
    }
}

/// An ordered, mutable workload document
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadTree {
    root: JsonValue,
}

impl WorkloadTree {
    /// Wrap an already parsed value
    pub fn from_value(root: JsonValue) -> Self {
        Self { root }
    }

    /// Parse a JSON document, as delivered in an admission request
    pub fn from_json(raw: &[u8]) -> Result<Self> {
        let root: JsonValue =
            serde_json::from_slice(raw).map_err(|e| DigesterError::Parse(e.to_string()))?;
        Self::require_mapping(root)
    }

    /// Parse a single YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let root: JsonValue = serde_yaml::from_str(yaml)?;
        Self::require_mapping(root)
    }

    fn require_mapping(root: JsonValue) -> Result<Self> {
        if !root.is_object() {
            return Err(DigesterError::Parse(format!(
                "expected a mapping at the document root, found {}",
                type_name(&root)
            )));
        }
        Ok(Self { root })
    }

    /// Borrow the underlying value
    pub fn as_value(&self) -> &JsonValue {
        &self.root
    }

    /// Consume the tree, returning the underlying value
    pub fn into_value(self) -> JsonValue {
        self.root
    }

    /// Declared `kind`, if any
    pub fn kind(&self) -> Option<&str> {
        self.string_at(&["kind"])
    }

    /// `metadata.name`, if any
    pub fn name(&self) -> Option<&str> {
        self.string_at(&["metadata", "name"])
    }

    /// `metadata.namespace`, treating an empty string as absent
    pub fn namespace(&self) -> Option<&str> {
        self.string_at(&["metadata", "namespace"])
            .filter(|ns| !ns.is_empty())
    }

    /// Set `metadata.namespace`, creating `metadata` when missing
    pub fn set_namespace(&mut self, namespace: &str) -> Result<()> {
        let root = self
            .root
            .as_object_mut()
            .ok_or_else(|| DigesterError::Parse("resource is not a mapping".to_string()))?;
        let metadata = root
            .entry("metadata")
            .or_insert_with(|| JsonValue::Object(serde_json::Map::new()));
        if metadata.is_null() {
            *metadata = JsonValue::Object(serde_json::Map::new());
        }
        let metadata = metadata.as_object_mut().ok_or_else(|| {
            DigesterError::Parse("metadata is not a mapping".to_string())
        })?;
        metadata.insert(
            "namespace".to_string(),
            JsonValue::String(namespace.to_string()),
        );
        Ok(())
    }

    /// Walk mapping keys from the root
    pub fn lookup(&self, keys: &[&str]) -> Option<&JsonValue> {
        keys.iter()
            .try_fold(&self.root, |node, key| node.as_object()?.get(*key))
    }

    /// Walk mapping keys and return the scalar string found there
    pub fn string_at(&self, keys: &[&str]) -> Option<&str> {
        self.lookup(keys).and_then(JsonValue::as_str)
    }

    /// Walk mapping keys and return the sequence found there
    pub fn sequence_at(&self, keys: &[&str]) -> Option<&Vec<JsonValue>> {
        self.lookup(keys).and_then(JsonValue::as_array)
    }

    /// Collect `field` from every mapping element of the sequence at `keys`
    ///
    /// Elements that are not mappings or lack a string `field` are skipped.
    pub fn element_values(&self, keys: &[&str], field: &str) -> Vec<String> {
        self.sequence_at(keys)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get(field)?.as_str())
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Resolve a [`TreePath`]
    pub fn get(&self, path: &TreePath) -> Option<&JsonValue> {
        path.segments()
            .iter()
            .try_fold(&self.root, |node, segment| match segment {
                PathSegment::Key(k) => node.as_object()?.get(k),
                PathSegment::Index(i) => node.as_array()?.get(*i),
            })
    }

    fn get_mut(&mut self, path: &TreePath) -> Option<&mut JsonValue> {
        path.segments()
            .iter()
            .try_fold(&mut self.root, |node, segment| match segment {
                PathSegment::Key(k) => node.as_object_mut()?.get_mut(k),
                PathSegment::Index(i) => node.as_array_mut()?.get_mut(*i),
            })
    }

    /// Replace the scalar at `path` with a string
    ///
    /// The node must already exist; sibling content is left untouched.
    pub fn set_string(&mut self, path: &TreePath, value: impl Into<String>) -> Result<()> {
        let node = self.get_mut(path).ok_or_else(|| {
            DigesterError::Serialization(format!("could not set {}: node not found", path))
        })?;
        *node = JsonValue::String(value.into());
        Ok(())
    }

    /// Serialize the tree as JSON bytes
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.root).map_err(|e| DigesterError::Serialization(e.to_string()))
    }

    /// Render the tree as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.root)
            .map_err(|e| DigesterError::Serialization(e.to_string()))
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "sequence",
        JsonValue::Object(_) => "mapping",
    }
}
