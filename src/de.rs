//! Serde deserializer over parsed charge
//!
//! Text is parsed into a [`UcValue`] first, then handed to the visitor. The
//! charge grammar leaves some shapes ambiguous, so the deserializer is
//! lenient where the target type makes the intent clear:
//!
//! - a single value is accepted where a sequence is expected (`k(1)` for a
//!   `Vec<u32>` field);
//! - an empty string is `true` for a `bool` (bare flag keys);
//! - numbers and booleans are accepted as text for string fields.

use crate::error::{Result, UcError};
use crate::reader::{parse_uc_value, UcReaderOptions};
use crate::rx::UcValueRx;
use crate::value::{UcList, UcMap, UcValue};
use num_bigint::BigInt;
use serde::de::{self, Deserialize, DeserializeSeed, IntoDeserializer, Visitor};
use std::fmt;

/// Deserializes a type from URI Charge text
pub fn from_str<T>(text: &str) -> Result<T>
where
    T: de::DeserializeOwned,
{
    from_str_with_options(text, UcReaderOptions::default())
}

/// Deserializes a type from URI Charge text with custom reader options
///
/// Rejections collected in [`crate::reader::UcErrorMode::Collect`] mode are
/// not fatal here; the value built from the accepted parts is deserialized.
pub fn from_str_with_options<T>(text: &str, options: UcReaderOptions) -> Result<T>
where
    T: de::DeserializeOwned,
{
    let mut rx = UcValueRx::new();
    parse_uc_value(text, &mut rx, options)?;
    let value = rx.into_value().unwrap_or_else(|| UcValue::from(""));
    from_value(value)
}

/// Deserializes a type from a [`UcValue`]
pub fn from_value<T>(value: UcValue) -> Result<T>
where
    T: de::DeserializeOwned,
{
    T::deserialize(UcDeserializer::new(value))
}

fn mismatch(value: &UcValue, expected: &str) -> UcError {
    UcError::Serde(format!("Expected {}, found {}", expected, value.type_name()))
}

/// Integral `f64` as `i64`, if exact
fn as_integer(number: f64) -> Option<i64> {
    if number.fract() == 0.0 && number >= i64::MIN as f64 && number < i64::MAX as f64 {
        Some(number as i64)
    } else {
        None
    }
}

/// Deserializer for a single charge value
pub struct UcDeserializer {
    value: UcValue,
}

impl UcDeserializer {
    pub fn new(value: UcValue) -> Self {
        Self { value }
    }

    fn visit_bigint<'de, V>(number: BigInt, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if let Ok(value) = i64::try_from(&number) {
            visitor.visit_i64(value)
        } else if let Ok(value) = u64::try_from(&number) {
            visitor.visit_u64(value)
        } else if let Ok(value) = i128::try_from(&number) {
            visitor.visit_i128(value)
        } else if let Ok(value) = u128::try_from(&number) {
            visitor.visit_u128(value)
        } else {
            visitor.visit_string(number.to_string())
        }
    }
}

impl<'de> de::Deserializer<'de> for UcDeserializer {
    type Error = UcError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.value {
            UcValue::Null => visitor.visit_unit(),
            UcValue::Bool(value) => visitor.visit_bool(value),
            UcValue::Number(number) => match as_integer(number) {
                Some(value) if !(value == 0 && number.is_sign_negative()) => {
                    visitor.visit_i64(value)
                }
                _ => visitor.visit_f64(number),
            },
            UcValue::BigInt(number) => Self::visit_bigint(number, visitor),
            UcValue::String(text) | UcValue::Entity(text) => visitor.visit_string(text),
            UcValue::Formatted { format, data } => {
                let mut map = UcMap::new();
                map.insert(format, UcValue::String(data));
                visitor.visit_map(UcMapAccess::new(map))
            }
            UcValue::List(items) => visitor.visit_seq(UcSeqAccess::new(*items)),
            UcValue::Map(entries) => visitor.visit_map(UcMapAccess::new(entries)),
        }
    }

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.value {
            UcValue::Bool(value) => visitor.visit_bool(value),
            UcValue::String(text) if text.is_empty() => visitor.visit_bool(true),
            other => Err(mismatch(&other, "boolean")),
        }
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.value {
            UcValue::String(text) | UcValue::Entity(text) => visitor.visit_string(text),
            UcValue::Number(number) => visitor.visit_string(number.to_string()),
            UcValue::BigInt(number) => visitor.visit_string(number.to_string()),
            UcValue::Bool(value) => visitor.visit_string(value.to_string()),
            other => Err(mismatch(&other, "string")),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.value {
            UcValue::Null => visitor.visit_none(),
            value => visitor.visit_some(UcDeserializer::new(value)),
        }
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.value {
            UcValue::List(items) => visitor.visit_seq(UcSeqAccess::new(*items)),
            // A list of one is written as a single value
            value => {
                let mut items = UcList::new();
                items.push(value);
                visitor.visit_seq(UcSeqAccess::new(items))
            }
        }
    }

    fn deserialize_tuple<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.value {
            UcValue::String(variant) | UcValue::Entity(variant) => {
                visitor.visit_enum(variant.into_deserializer())
            }
            UcValue::Map(entries) if entries.len() == 1 => {
                let mut entries = entries.into_iter();
                match entries.next() {
                    Some((variant, value)) => visitor.visit_enum(UcEnumAccess { variant, value }),
                    None => Err(UcError::Serde("Expected enum variant".to_string())),
                }
            }
            other => Err(mismatch(&other, "enum variant")),
        }
    }

    serde::forward_to_deserialize_any! {
        i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char
        bytes byte_buf unit unit_struct map struct identifier ignored_any
    }
}

/// Sequence access for charge lists
struct UcSeqAccess {
    items: smallvec::IntoIter<[UcValue; 4]>,
}

impl UcSeqAccess {
    fn new(items: UcList) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

impl<'de> de::SeqAccess<'de> for UcSeqAccess {
    type Error = UcError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        match self.items.next() {
            Some(value) => seed.deserialize(UcDeserializer::new(value)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

/// Map access for charge maps
struct UcMapAccess {
    entries: indexmap::map::IntoIter<String, UcValue>,
    current_value: Option<UcValue>,
}

impl UcMapAccess {
    fn new(entries: UcMap) -> Self {
        Self {
            entries: entries.into_iter(),
            current_value: None,
        }
    }
}

impl<'de> de::MapAccess<'de> for UcMapAccess {
    type Error = UcError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        match self.entries.next() {
            Some((key, value)) => {
                self.current_value = Some(value);
                seed.deserialize(UcKeyDeserializer { key }).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        match self.current_value.take() {
            Some(value) => seed.deserialize(UcDeserializer::new(value)),
            None => Err(UcError::Serde(
                "No value available for map entry".to_string(),
            )),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

/// Map keys are text, but may stand for numbers or booleans
struct UcKeyDeserializer {
    key: String,
}

impl UcKeyDeserializer {
    fn parse<T: std::str::FromStr>(&self, expected: &str) -> Result<T> {
        self.key
            .parse()
            .map_err(|_| UcError::Serde(format!("Expected {} key, found `{}`", expected, self.key)))
    }
}

impl<'de> de::Deserializer<'de> for UcKeyDeserializer {
    type Error = UcError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_string(self.key)
    }

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_bool(self.parse("bool")?)
    }

    fn deserialize_i8<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_i8(self.parse("i8")?)
    }

    fn deserialize_i16<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_i16(self.parse("i16")?)
    }

    fn deserialize_i32<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_i32(self.parse("i32")?)
    }

    fn deserialize_i64<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_i64(self.parse("i64")?)
    }

    fn deserialize_u8<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_u8(self.parse("u8")?)
    }

    fn deserialize_u16<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_u16(self.parse("u16")?)
    }

    fn deserialize_u32<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_u32(self.parse("u32")?)
    }

    fn deserialize_u64<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_u64(self.parse("u64")?)
    }


    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_enum(self.key.into_deserializer())
    }

    serde::forward_to_deserialize_any! {
        i128 u128 f32 f64 char str string bytes byte_buf option unit unit_struct
        newtype_struct seq tuple tuple_struct map struct identifier ignored_any
    }
}

/// Enum access for `variant(value)` maps
struct UcEnumAccess {
    variant: String,
    value: UcValue,
}

impl<'de> de::EnumAccess<'de> for UcEnumAccess {
    type Error = UcError;
    type Variant = UcVariantAccess;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: DeserializeSeed<'de>,
    {
        let variant = seed.deserialize(UcKeyDeserializer { key: self.variant })?;
        Ok((variant, UcVariantAccess { value: self.value }))
    }
}

struct UcVariantAccess {
    value: UcValue,
}

impl<'de> de::VariantAccess<'de> for UcVariantAccess {
    type Error = UcError;

    fn unit_variant(self) -> Result<()> {
        match self.value {
            UcValue::Null => Ok(()),
            UcValue::String(text) if text.is_empty() => Ok(()),
            other => Err(mismatch(&other, "unit variant")),
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        seed.deserialize(UcDeserializer::new(self.value))
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        de::Deserializer::deserialize_seq(UcDeserializer::new(self.value), visitor)
    }

    fn struct_variant<V>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.value {
            UcValue::Map(entries) => visitor.visit_map(UcMapAccess::new(entries)),
            other => Err(mismatch(&other, "struct variant")),
        }
    }
}

struct UcValueVisitor;

impl<'de> Visitor<'de> for UcValueVisitor {
    type Value = UcValue;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("any charge value")
    }

    fn visit_bool<E>(self, value: bool) -> std::result::Result<UcValue, E>
    where
        E: de::Error,
    {
        Ok(UcValue::Bool(value))
    }

    fn visit_i64<E>(self, value: i64) -> std::result::Result<UcValue, E>
    where
        E: de::Error,
    {
        Ok(crate::ser::to_value(&value).unwrap_or(UcValue::Number(value as f64)))
    }

    fn visit_u64<E>(self, value: u64) -> std::result::Result<UcValue, E>
    where
        E: de::Error,
    {
        Ok(crate::ser::to_value(&value).unwrap_or(UcValue::Number(value as f64)))
    }

    fn visit_f64<E>(self, value: f64) -> std::result::Result<UcValue, E>
    where
        E: de::Error,
    {
        Ok(UcValue::Number(value))
    }

    fn visit_str<E>(self, value: &str) -> std::result::Result<UcValue, E>
    where
        E: de::Error,
    {
        Ok(UcValue::from(value))
    }

    fn visit_string<E>(self, value: String) -> std::result::Result<UcValue, E>
    where
        E: de::Error,
    {
        Ok(UcValue::String(value))
    }

    fn visit_unit<E>(self) -> std::result::Result<UcValue, E>
    where
        E: de::Error,
    {
        Ok(UcValue::Null)
    }

    fn visit_none<E>(self) -> std::result::Result<UcValue, E>
    where
        E: de::Error,
    {
        Ok(UcValue::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> std::result::Result<UcValue, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        UcValue::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<UcValue, A::Error>
    where
        A: de::SeqAccess<'de>,
    {
        let mut items = UcList::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(UcValue::List(Box::new(items)))
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<UcValue, A::Error>
    where
        A: de::MapAccess<'de>,
    {
        let mut entries = UcMap::new();
        while let Some((key, value)) = map.next_entry::<String, UcValue>()? {
            entries.insert(key, value);
        }
        Ok(UcValue::Map(entries))
    }
}

impl<'de> Deserialize<'de> for UcValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_any(UcValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Query {
        name: String,
        page: u32,
        #[serde(default)]
        tags: Vec<String>,
        #[serde(default)]
        verbose: bool,
        filter: Option<String>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    enum Shape {
        Point,
        Circle(f64),
        Pair(u8, u8),
        Rect { w: u8, h: u8 },
    }

    #[test]
    fn test_struct_from_charge() {
        let query: Query = from_str("name(rust%20book)page(2)tags((a)(b))filter(--)verbose").unwrap();
        assert_eq!(
            query,
            Query {
                name: "rust book".to_string(),
                page: 2,
                tags: vec!["a".to_string(), "b".to_string()],
                verbose: true,
                filter: None,
            }
        );
    }

    #[test]
    fn test_single_value_as_sequence() {
        let query: Query = from_str("name(x)page(1)tags(only)filter(y)").unwrap();
        assert_eq!(query.tags, vec!["only".to_string()]);
        assert_eq!(query.filter.as_deref(), Some("y"));
    }

    #[test]
    fn test_enum_variants() {
        assert_eq!(from_str::<Shape>("Point").unwrap(), Shape::Point);
        assert_eq!(from_str::<Shape>("Circle(1.5)").unwrap(), Shape::Circle(1.5));
        assert_eq!(from_str::<Shape>("Pair(1)(2)").unwrap(), Shape::Pair(1, 2));
        assert_eq!(from_str::<Shape>("Rect(w(2)h(3))").unwrap(), Shape::Rect { w: 2, h: 3 });
    }

    #[test]
    fn test_type_mismatch() {
        let err = from_str::<Query>("name(x)page(-)filter(--)").unwrap_err();
        assert!(matches!(err, UcError::Serde(_)));
    }

    #[test]
    fn test_value_round_trip_through_serde() {
        let value = crate::reader::parse_uc("a(1)b((x)(!))c($)").unwrap();
        let copy: UcValue = from_value(value.clone()).unwrap();
        assert_eq!(copy, value);
    }
}
