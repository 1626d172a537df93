/*! Record codec.

A [Record] is one document of a corpus, serialized as a single JSON line.

Only `id` is typed: it must be a string. Every other top-level key is kept as the raw JSON value it was
decoded from, so that decoding then encoding a line never rewrites or drops data, whatever shape a
given producer chose for `created`, `metadata` and friends. The well-known fields (`text`, `source`,
`added`, `created`, `metadata`) are exposed through accessors that only see values of the expected
JSON type.
!*/
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// One corpus document.
///
/// Timestamps are kept as their ISO-8601 string representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Record {
    /// Create a record that only holds an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.set_string("source", source.into());
        self
    }

    pub fn with_added(mut self, added: impl Into<String>) -> Self {
        self.set_string("added", added.into());
        self
    }

    pub fn with_created(mut self, created: impl Into<String>) -> Self {
        self.set_string("created", created.into());
        self
    }

    /// Decode a record from a single line (without its trailing newline).
    ///
    /// A line holding a bare JSON `null` is reported as [Error::NullRecord].
    pub fn from_line(line: &str) -> Result<Self, Error> {
        if line.trim() == "null" {
            return Err(Error::NullRecord);
        }
        Ok(serde_json::from_str(line)?)
    }

    /// Encode the record as a single line, without trailing newline.
    ///
    /// JSON string escaping guarantees that the result contains no raw newline.
    pub fn to_line(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `text`, if it is a string.
    pub fn text(&self) -> Option<&str> {
        self.string("text")
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.set_string("text", text.into());
    }

    pub fn source(&self) -> Option<&str> {
        self.string("source")
    }

    pub fn added(&self) -> Option<&str> {
        self.string("added")
    }

    pub fn created(&self) -> Option<&str> {
        self.string("created")
    }

    /// `metadata`, if it is an object.
    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.fields.get("metadata").and_then(Value::as_object)
    }

    /// Get the metadata object, creating an empty one if it is absent or `null`.
    ///
    /// Returns `None` when `metadata` holds something else than an object, which is left untouched.
    pub fn metadata_mut(&mut self) -> Option<&mut Map<String, Value>> {
        let metadata = self
            .fields
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        if metadata.is_null() {
            *metadata = Value::Object(Map::new());
        }
        metadata.as_object_mut()
    }

    /// Raw value of a top-level field other than `id`.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Every top-level field but `id`, as decoded.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Mutable access to the top-level fields.
    ///
    /// Inserting an `id` key here would produce a line with a duplicate key.
    pub fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }

    /// Drop every top-level field whose key is not in `keep`.
    ///
    /// `id` is always kept.
    pub fn retain_fields(&mut self, keep: &HashSet<String>) {
        self.fields.retain(|key, _| keep.contains(key));
    }

    fn string(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    fn set_string(&mut self, key: &str, value: String) {
        self.fields.insert(key.to_string(), Value::String(value));
    }
}
