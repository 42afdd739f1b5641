//! value representation
//!
//! The kmix value model contains the following data types
//! - null
//! - boolean (true/false)
//! - integer (signed, i64)
//! - decimal (f64)
//! - string (utf-8)
//! - array ("list" of values)
//! - object (order-preserving "map"/"dictionary")
//!
//! Object keys are [Key]s: strings, integers or booleans. YAML allows all three, so we keep
//! them apart while merging and only turn them into strings when rendering.
//!
//! Object equality ignores key order, iteration follows insertion order.
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};
use std::fmt::{Display, Formatter};

pub type Mapping = indexmap::IndexMap<Key, Value>;

/// All possible value types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Value>),
    Object(Mapping),
}

/// All possible object key types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    String(String),
    Integer(i64),
    Boolean(bool),
}

impl Value {
    /// Short type name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn as_object(&self) -> Option<&Mapping> {
        match self {
            Value::Object(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Array(_) | Value::Object(_))
    }

    /// Text form of a scalar, `None` for arrays and objects
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Value::Null => Some(String::new()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Decimal(d) => Some(d.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::String(s) => f.write_str(s),
            Key::Integer(i) => write!(f, "{i}"),
            Key::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::String(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::String(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Integer(value)
    }
}

impl From<bool> for Key {
    fn from(value: bool) -> Self {
        Key::Boolean(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl From<Mapping> for Value {
    fn from(value: Mapping) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConversionError {
    #[error("integer {0} does not fit into a signed 64 bit integer")]
    IntegerOutOfRange(String),
    #[error("unsupported mapping key of type {0}")]
    UnsupportedKey(&'static str),
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "boolean",
        serde_yaml::Value::Number(_) => "number",
        serde_yaml::Value::String(_) => "string",
        serde_yaml::Value::Sequence(_) => "sequence",
        serde_yaml::Value::Mapping(_) => "mapping",
        serde_yaml::Value::Tagged(_) => "tagged value",
    }
}

impl TryFrom<serde_yaml::Value> for Key {
    type Error = ConversionError;

    fn try_from(value: serde_yaml::Value) -> Result<Self, Self::Error> {
        match value {
            serde_yaml::Value::String(s) => Ok(Key::String(s)),
            serde_yaml::Value::Bool(b) => Ok(Key::Boolean(b)),
            serde_yaml::Value::Number(n) if n.is_i64() || n.is_u64() => {
                match Value::try_from(serde_yaml::Value::Number(n))? {
                    Value::Integer(i) => Ok(Key::Integer(i)),
                    other => Err(ConversionError::UnsupportedKey(other.kind())),
                }
            }
            serde_yaml::Value::Tagged(tagged) => Key::try_from(tagged.value),
            other => Err(ConversionError::UnsupportedKey(yaml_kind(&other))),
        }
    }
}

impl TryFrom<serde_yaml::Value> for Value {
    type Error = ConversionError;

    fn try_from(value: serde_yaml::Value) -> Result<Self, Self::Error> {
        use serde_yaml::Value as Yaml;

        match value {
            Yaml::Null => Ok(Value::Null),
            Yaml::Bool(b) => Ok(b.into()),
            Yaml::Number(num) => {
                if let Some(int) = num.as_i64() {
                    return Ok(Value::Integer(int));
                }
                if num.is_u64() {
                    return Err(ConversionError::IntegerOutOfRange(num.to_string()));
                }
                // every number that is not an integer is a float
                Ok(Value::Decimal(num.as_f64().unwrap_or(f64::NAN)))
            }
            Yaml::String(s) => Ok(s.into()),
            Yaml::Sequence(seq) => Ok(Value::Array(
                seq.into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            )),
            Yaml::Mapping(mapping) => {
                let mut object = Mapping::with_capacity(mapping.len());
                for (k, v) in mapping {
                    object.insert(Key::try_from(k)?, Value::try_from(v)?);
                }
                Ok(Value::Object(object))
            }
            // tags carry no meaning for values
            Yaml::Tagged(tagged) => Value::try_from(tagged.value),
        }
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = ConversionError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value as Json;

        match value {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(b.into()),
            Json::Number(num) => {
                if let Some(int) = num.as_i64() {
                    return Ok(Value::Integer(int));
                }
                if num.is_u64() {
                    return Err(ConversionError::IntegerOutOfRange(num.to_string()));
                }
                Ok(Value::Decimal(num.as_f64().unwrap_or(f64::NAN)))
            }
            Json::String(s) => Ok(s.into()),
            Json::Array(array) => Ok(Value::Array(
                array
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            )),
            Json::Object(object) => Ok(Value::Object(
                object
                    .into_iter()
                    .map(|(k, v)| Ok((Key::String(k), Value::try_from(v)?)))
                    .collect::<Result<_, ConversionError>>()?,
            )),
        }
    }
}

impl TryFrom<hcl::Number> for Value {
    type Error = ConversionError;

    fn try_from(value: hcl::Number) -> Result<Self, Self::Error> {
        if let Some(int) = value.as_i64() {
            return Ok(Value::Integer(int));
        }
        if value.is_u64() {
            return Err(ConversionError::IntegerOutOfRange(value.to_string()));
        }

        Ok(Value::Decimal(value.as_f64().unwrap_or(f64::NAN)))
    }
}

impl TryFrom<hcl::Value> for Value {
    type Error = ConversionError;

    fn try_from(value: hcl::Value) -> Result<Value, Self::Error> {
        match value {
            hcl::Value::Null => Ok(Value::Null),
            hcl::Value::Bool(b) => Ok(b.into()),
            hcl::Value::Number(n) => n.try_into(),
            hcl::Value::String(s) => Ok(s.into()),
            hcl::Value::Array(a) => Ok(Value::Array(
                a.into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            )),
            hcl::Value::Object(o) => Ok(Value::Object(
                o.into_iter()
                    .map(|(k, v)| Ok((Key::String(k), Value::try_from(v)?)))
                    .collect::<Result<_, ConversionError>>()?,
            )),
        }
    }
}

impl From<&Value> for hcl::Value {
    /// Keys become strings, non-finite decimals become null
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => hcl::Value::Null,
            Value::Boolean(b) => hcl::Value::Bool(*b),
            Value::Integer(i) => hcl::Value::from(*i),
            Value::Decimal(d) => hcl::Value::from(*d),
            Value::String(s) => hcl::Value::String(s.clone()),
            Value::Array(array) => hcl::Value::Array(array.iter().map(Into::into).collect()),
            Value::Object(object) => hcl::Value::Object(
                object
                    .iter()
                    .map(|(key, value)| (key.to_string(), value.into()))
                    .collect(),
            ),
        }
    }
}

impl serde::ser::Serialize for Key {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // output formats only know string keys
        match self {
            Key::String(s) => serializer.serialize_str(s),
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn yaml_keys_keep_their_type() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("1: one\ntrue: yes\nname: x").unwrap();
        let Value::Object(object) = Value::try_from(yaml).unwrap() else {
            panic!("expected object");
        };

        let keys: Vec<_> = object.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![Key::Integer(1), Key::Boolean(true), Key::String("name".into())]
        );
    }

    #[test]
    fn yaml_sequence_keys_are_rejected() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("[a, b]: value").unwrap();
        assert_eq!(
            Value::try_from(yaml),
            Err(ConversionError::UnsupportedKey("sequence"))
        );
    }

    #[test]
    fn large_integers_are_rejected() {
        let json: serde_json::Value = serde_json::from_str("18446744073709551615").unwrap();
        assert!(matches!(
            Value::try_from(json),
            Err(ConversionError::IntegerOutOfRange(_))
        ));
    }

    #[test]
    fn keys_serialize_as_strings() {
        let mut object = Mapping::new();
        object.insert(Key::Integer(8080), "http".into());
        object.insert(Key::Boolean(false), Value::Null);

        let json = serde_json::to_string(&Value::Object(object)).unwrap();
        assert_eq!(json, r#"{"8080":"http","false":null}"#);
    }

    #[test]
    fn into_hcl_values() {
        let mut object = Mapping::new();
        object.insert(Key::Integer(1), Value::Decimal(f64::NAN));
        object.insert("list".into(), vec![Value::Integer(2), Value::Boolean(true)].into());

        let hcl = hcl::Value::from(&Value::Object(object));
        assert_eq!(
            hcl,
            hcl::Value::Object(hcl::Map::from([
                ("1".to_string(), hcl::Value::Null),
                (
                    "list".to_string(),
                    hcl::Value::Array(vec![hcl::Value::from(2), hcl::Value::Bool(true)])
                ),
            ]))
        );
    }

    #[test]
    fn object_equality_ignores_order() {
        let mut a = Mapping::new();
        a.insert("x".into(), Value::Integer(1));
        a.insert("y".into(), Value::Integer(2));
        let mut b = Mapping::new();
        b.insert("y".into(), Value::Integer(2));
        b.insert("x".into(), Value::Integer(1));

        assert_eq!(Value::Object(a), Value::Object(b));
    }
}
