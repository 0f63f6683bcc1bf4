//! Generic URI Charge value

use crate::encode::encode_uc_value;
use crate::error::UcPathStep;
use crate::rx::{Ucrx, UcrxContext, UcrxKeyTarget, UcrxOutcome, UcrxPush};
use indexmap::IndexMap;
use num_bigint::BigInt;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use smallvec::SmallVec;
use std::fmt;

/// Charge map type (preserves insertion order)
pub type UcMap = IndexMap<String, UcValue>;

/// Charge list type - uses SmallVec to avoid heap allocation for short lists
pub type UcList = SmallVec<[UcValue; 4]>;

/// URI Charge value
#[derive(Debug, Clone, PartialEq)]
pub enum UcValue {
    Null,
    Bool(bool),
    Number(f64),
    BigInt(BigInt),
    String(String),
    /// Lists use Box<SmallVec> to avoid infinite size recursion
    List(Box<UcList>),
    Map(UcMap),
    /// Entity nobody claimed, kept verbatim (`!name...`)
    Entity(String),
    /// `!format'name(data)` nobody claimed
    Formatted { format: String, data: String },
}

impl UcValue {
    /// Builds a list value
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator<Item = UcValue>,
    {
        UcValue::List(Box::new(items.into_iter().collect()))
    }

    /// Builds a map value
    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, UcValue)>,
        K: Into<String>,
    {
        UcValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Returns a string representation of the value type for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            UcValue::Null => "null",
            UcValue::Bool(_) => "boolean",
            UcValue::Number(_) => "number",
            UcValue::BigInt(_) => "bigint",
            UcValue::String(_) => "string",
            UcValue::List(_) => "list",
            UcValue::Map(_) => "map",
            UcValue::Entity(_) => "entity",
            UcValue::Formatted { .. } => "format",
        }
    }

    /// Returns true if this is a Null variant
    pub fn is_null(&self) -> bool {
        matches!(self, UcValue::Null)
    }

    /// Returns true if the value is a map
    pub fn is_map(&self) -> bool {
        matches!(self, UcValue::Map(_))
    }

    /// Returns true if the value is a list
    pub fn is_list(&self) -> bool {
        matches!(self, UcValue::List(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let UcValue::Bool(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        if let UcValue::Number(n) = self {
            Some(*n)
        } else {
            None
        }
    }

    pub fn as_bigint(&self) -> Option<&BigInt> {
        if let UcValue::BigInt(n) = self {
            Some(n)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let UcValue::String(s) = self {
            Some(s.as_str())
        } else {
            None
        }
    }

    pub fn as_list(&self) -> Option<&UcList> {
        if let UcValue::List(list) = self {
            Some(list)
        } else {
            None
        }
    }

    pub fn as_map(&self) -> Option<&UcMap> {
        if let UcValue::Map(map) = self {
            Some(map)
        } else {
            None
        }
    }

    pub fn as_entity(&self) -> Option<&str> {
        if let UcValue::Entity(entity) = self {
            Some(entity)
        } else {
            None
        }
    }

    /// Looks up a map entry
    pub fn get(&self, key: &str) -> Option<&UcValue> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Pushes this value through a receiver, as if it was parsed
    ///
    /// Path steps are recorded in `cx` for every nested entry and item, so
    /// rejections raised by the receiver point at the offending part.
    pub fn replay(&self, rx: &mut dyn Ucrx, cx: &mut UcrxContext) -> UcrxOutcome {
        match self {
            UcValue::Null => rx.push_null(cx),
            UcValue::Bool(value) => rx.push_bool(*value, cx),
            UcValue::Number(value) => rx.push_number(*value, cx),
            UcValue::BigInt(value) => rx.push_bigint(value, cx),
            UcValue::String(value) => rx.push_string(value, cx),
            UcValue::Entity(entity) => rx.push_entity(entity, cx),
            UcValue::Formatted { format, data } => rx.push_format(format, data, cx),
            UcValue::List(items) => {
                let outcome = rx.push_list(cx);
                if outcome != UcrxOutcome::Accepted {
                    return outcome;
                }
                for (index, item) in items.iter().enumerate() {
                    cx.enter(UcPathStep::Index(index));
                    if let Some(item_rx) = rx.nested(cx) {
                        item.replay(item_rx, cx);
                    }
                    cx.leave();
                }
                rx.end(cx);
                UcrxOutcome::Accepted
            }
            UcValue::Map(entries) => {
                for (key, value) in entries {
                    cx.enter(UcPathStep::Key(key.clone()));
                    let target = rx.enter_key(key, cx);
                    let rejected_map = match target {
                        UcrxKeyTarget::Entry(entry_rx) => {
                            value.replay(entry_rx, cx);
                            false
                        }
                        UcrxKeyTarget::Skip => false,
                        UcrxKeyTarget::NotMap => true,
                    };
                    cx.leave();
                    if rejected_map {
                        return UcrxOutcome::Rejected;
                    }
                }
                rx.push_map_end(cx)
            }
        }
    }
}

impl fmt::Display for UcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_uc_value(self))
    }
}

impl From<bool> for UcValue {
    fn from(value: bool) -> Self {
        UcValue::Bool(value)
    }
}

impl From<f64> for UcValue {
    fn from(value: f64) -> Self {
        UcValue::Number(value)
    }
}

impl From<i64> for UcValue {
    fn from(value: i64) -> Self {
        UcValue::Number(value as f64)
    }
}

impl From<BigInt> for UcValue {
    fn from(value: BigInt) -> Self {
        UcValue::BigInt(value)
    }
}

impl From<&str> for UcValue {
    fn from(value: &str) -> Self {
        UcValue::String(value.to_string())
    }
}

impl From<String> for UcValue {
    fn from(value: String) -> Self {
        UcValue::String(value)
    }
}

impl From<serde_json::Value> for UcValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => UcValue::Null,
            serde_json::Value::Bool(b) => UcValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                // Integers beyond f64 precision keep their exact value
                Some(i) if i.unsigned_abs() > (1u64 << 53) => UcValue::BigInt(BigInt::from(i)),
                _ => match n.as_u64() {
                    Some(u) if u > (1u64 << 53) => UcValue::BigInt(BigInt::from(u)),
                    _ => UcValue::Number(n.as_f64().unwrap_or(f64::NAN)),
                },
            },
            serde_json::Value::String(s) => UcValue::String(s),
            serde_json::Value::Array(items) => UcValue::list(items.into_iter().map(UcValue::from)),
            serde_json::Value::Object(entries) => UcValue::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, UcValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for UcValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            UcValue::Null => serializer.serialize_unit(),
            UcValue::Bool(b) => serializer.serialize_bool(*b),
            UcValue::Number(n) => serializer.serialize_f64(*n),
            UcValue::BigInt(n) => match i64::try_from(n) {
                Ok(i) => serializer.serialize_i64(i),
                Err(_) => serializer.serialize_str(&n.to_string()),
            },
            UcValue::String(s) => serializer.serialize_str(s),
            UcValue::Entity(entity) => serializer.serialize_str(entity),
            UcValue::Formatted { format, data } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(format, data)?;
                map.end()
            }
            UcValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            UcValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}
