//! Field type tags and field values.
//!
//! A field's type signature is an ordered tuple of [`PrimitiveType`] tags.
//! A value for that field is a [`FieldValue`]: an ordered tuple of
//! [`Value`]s that must line up with the signature position by position.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag for one position of a field's type signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    Bool,
    Int,
    UInt,
    Float,
    Str,
    Bytes,
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimitiveType::Bool => "bool",
            PrimitiveType::Int => "int",
            PrimitiveType::UInt => "uint",
            PrimitiveType::Float => "float",
            PrimitiveType::Str => "str",
            PrimitiveType::Bytes => "bytes",
        };
        f.write_str(name)
    }
}

/// A single primitive value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// The type tag this value carries.
    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            Value::Bool(_) => PrimitiveType::Bool,
            Value::Int(_) => PrimitiveType::Int,
            Value::UInt(_) => PrimitiveType::UInt,
            Value::Float(_) => PrimitiveType::Float,
            Value::Str(_) => PrimitiveType::Str,
            Value::Bytes(_) => PrimitiveType::Bytes,
        }
    }
}

/// The value of one (possibly composite) field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldValue(pub Vec<Value>);

impl FieldValue {
    /// Wraps an ordered list of values.
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Returns `true` if the arity and every position match `signature`.
    pub fn conforms_to(&self, signature: &[PrimitiveType]) -> bool {
        self.0.len() == signature.len()
            && self
                .0
                .iter()
                .zip(signature)
                .all(|(value, ty)| value.primitive_type() == *ty)
    }

    /// The individual values.
    pub fn values(&self) -> &[Value] {
        &self.0
    }
}

impl From<Vec<Value>> for FieldValue {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        Self(vec![value])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conforms_to_matching_signature() {
        let v = FieldValue::new(vec![Value::Float(1.0), Value::Float(2.0)]);
        assert!(v.conforms_to(&[PrimitiveType::Float, PrimitiveType::Float]));
    }

    #[test]
    fn test_conforms_to_rejects_wrong_arity() {
        let v = FieldValue::from(Value::Float(1.0));
        assert!(!v.conforms_to(&[PrimitiveType::Float, PrimitiveType::Float]));
        assert!(!v.conforms_to(&[]));
    }

    #[test]
    fn test_conforms_to_rejects_wrong_type() {
        let v = FieldValue::new(vec![
            Value::Str("user".into()),
            Value::Int(3),
        ]);
        assert!(!v.conforms_to(&[PrimitiveType::Str, PrimitiveType::Str]));
    }

    #[test]
    fn test_empty_value_conforms_to_empty_signature() {
        assert!(FieldValue::default().conforms_to(&[]));
    }

    #[test]
    fn test_primitive_type_names() {
        let json = serde_json::to_string(&PrimitiveType::UInt).unwrap();
        assert_eq!(json, "\"uint\"");
        assert_eq!(PrimitiveType::Bytes.to_string(), "bytes");
    }
}
