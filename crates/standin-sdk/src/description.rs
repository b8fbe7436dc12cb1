//! Descriptions and the serialization collaborator
//!
//! A description is a shallow snapshot of one referent: copiable fields are
//! embedded by value, everything else is an [`ObjectRef`](crate::ObjectRef).
//! The byte layout belongs to whichever [`DescriptionCodec`] the host plugs
//! in; [`JsonCodec`] is provided for diagnostics and tests.

use serde::{Deserialize, Serialize};

use crate::error::{StandinError, StandinResult};
use crate::value::Value;

/// Shallow snapshot of a referent's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Description {
    class: String,
    fields: Vec<(String, Value)>,
}

impl Description {
    /// Create an empty description of `class`
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style field insertion
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    /// Record a field, replacing an earlier entry of the same name
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|entry| entry.0 == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Class name the description was taken from
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Look up a field
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|entry| entry.0 == name)
            .map(|entry| &entry.1)
    }

    /// Look up a field that must be present
    pub fn require(&self, name: &str) -> StandinResult<&Value> {
        self.get(name).ok_or_else(|| {
            StandinError::Codec(format!("{} description lacks field '{}'", self.class, name))
        })
    }

    /// Iterate fields in recording order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of recorded fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if no fields were recorded
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Serialization collaborator: sizes, writes and reads descriptions
pub trait DescriptionCodec: Send + Sync {
    /// Encoded size of `description` in bytes
    fn size_of(&self, description: &Description) -> StandinResult<usize>;

    /// Append the encoding of `description` to `sink`
    fn describe_into(&self, sink: &mut Vec<u8>, description: &Description) -> StandinResult<()>;

    /// Decode a description
    fn reproduce_from(&self, bytes: &[u8]) -> StandinResult<Description>;
}

/// JSON codec backed by serde_json
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl DescriptionCodec for JsonCodec {
    fn size_of(&self, description: &Description) -> StandinResult<usize> {
        serde_json::to_vec(description)
            .map(|bytes| bytes.len())
            .map_err(|e| StandinError::Codec(e.to_string()))
    }

    fn describe_into(&self, sink: &mut Vec<u8>, description: &Description) -> StandinResult<()> {
        serde_json::to_writer(sink, description).map_err(|e| StandinError::Codec(e.to_string()))
    }

    fn reproduce_from(&self, bytes: &[u8]) -> StandinResult<Description> {
        serde_json::from_slice(bytes).map_err(|e| StandinError::Codec(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ObjectRef;

    #[test]
    fn test_push_replaces_existing_field() {
        let mut d = Description::new("Point").with("x", 1i64);
        d.push("x", 2i64);
        assert_eq!(d.len(), 1);
        assert_eq!(d.get("x"), Some(&Value::I64(2)));
    }

    #[test]
    fn test_require_missing_field() {
        let d = Description::new("Point");
        assert!(d.is_empty());
        let err = d.require("x").unwrap_err();
        assert!(err.to_string().contains("lacks field 'x'"));
    }

    #[test]
    fn test_fields_keep_order() {
        let d = Description::new("Account")
            .with("owner", "ada")
            .with("balance", 10i64)
            .with("branch", ObjectRef::new("Branch", 3));
        let names: Vec<&str> = d.fields().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["owner", "balance", "branch"]);
    }

    #[test]
    fn test_json_codec() {
        let codec = JsonCodec;
        let d = Description::new("Account")
            .with("owner", "ada")
            .with("branch", ObjectRef::new("Branch", 3));

        let mut sink = Vec::new();
        codec.describe_into(&mut sink, &d).unwrap();
        assert_eq!(codec.size_of(&d).unwrap(), sink.len());
        assert_eq!(codec.reproduce_from(&sink).unwrap(), d);
    }

    #[test]
    fn test_json_codec_rejects_garbage() {
        let err = JsonCodec.reproduce_from(b"{not json").unwrap_err();
        assert!(matches!(err, StandinError::Codec(_)));
    }
}
