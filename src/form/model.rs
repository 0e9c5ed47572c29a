use std::fmt::{Display, Formatter};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::path::Path;
use crate::value::Value;

/// Name of a top-level field of a typed form model.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldKey(&'static str);

impl FieldKey {
    pub const fn new(value: &'static str) -> Self {
        Self(value)
    }

    pub const fn as_str(self) -> &'static str {
        self.0
    }

    pub fn path(self) -> Path {
        Path::from_segments([self.0])
    }

    /// `items[index]` for list-valued fields.
    pub fn index(self, index: usize) -> Path {
        self.path().index(index)
    }

    pub fn key(self, key: impl Into<String>) -> Path {
        self.path().key(key)
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl From<FieldKey> for Path {
    fn from(key: FieldKey) -> Self {
        key.path()
    }
}

/// A struct whose fields are form fields. Usually derived.
pub trait FormModel {
    type Fields;

    fn fields() -> Self::Fields;

    fn field_names() -> &'static [&'static str];

    fn to_values(&self) -> Result<Value, serde_json::Error>
    where
        Self: Serialize,
    {
        Value::from_serialize(self)
    }

    fn from_values(values: &Value) -> Result<Self, serde_json::Error>
    where
        Self: DeserializeOwned + Sized,
    {
        values.deserialize_into()
    }
}
