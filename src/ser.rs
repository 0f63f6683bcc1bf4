//! Serde serializer producing [`UcValue`]
//!
//! Types are serialized into a value tree first, then encoded with
//! [`encode_uc_value`]. Integers beyond the exact `f64` range become bigints.
//! Enum variants with data are encoded as single-entry maps keyed by the
//! variant name.

use crate::encode::encode_uc_value;
use crate::error::{Result, UcError};
use crate::value::{UcMap, UcValue};
use num_bigint::BigInt;
use serde::ser::{self, Serialize};

/// Largest integer an `f64` represents exactly
const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Serializes a value into URI Charge text
pub fn to_string<T>(value: &T) -> Result<String>
where
    T: ?Sized + Serialize,
{
    Ok(encode_uc_value(&to_value(value)?))
}

/// Serializes a value into a [`UcValue`]
pub fn to_value<T>(value: &T) -> Result<UcValue>
where
    T: ?Sized + Serialize,
{
    value.serialize(UcValueSerializer)
}

fn integer(value: i128) -> UcValue {
    if (-(MAX_SAFE_INTEGER as i128)..=MAX_SAFE_INTEGER as i128).contains(&value) {
        UcValue::Number(value as f64)
    } else {
        UcValue::BigInt(BigInt::from(value))
    }
}

/// Wraps variant data as `variant(data)`
fn variant_value(variant: &'static str, value: UcValue) -> UcValue {
    let mut map = UcMap::new();
    map.insert(variant.to_string(), value);
    UcValue::Map(map)
}

pub struct UcValueSerializer;

pub struct SerializeVec {
    variant: Option<&'static str>,
    items: Vec<UcValue>,
}

pub struct SerializeMap {
    variant: Option<&'static str>,
    map: UcMap,
    current_key: Option<String>,
}

impl ser::Serializer for UcValueSerializer {
    type Ok = UcValue;
    type Error = UcError;

    type SerializeSeq = SerializeVec;
    type SerializeTuple = SerializeVec;
    type SerializeTupleStruct = SerializeVec;
    type SerializeTupleVariant = SerializeVec;
    type SerializeMap = SerializeMap;
    type SerializeStruct = SerializeMap;
    type SerializeStructVariant = SerializeMap;

    fn serialize_bool(self, v: bool) -> Result<UcValue> {
        Ok(UcValue::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<UcValue> {
        Ok(UcValue::Number(v as f64))
    }

    fn serialize_i16(self, v: i16) -> Result<UcValue> {
        Ok(UcValue::Number(v as f64))
    }

    fn serialize_i32(self, v: i32) -> Result<UcValue> {
        Ok(UcValue::Number(v as f64))
    }

    fn serialize_i64(self, v: i64) -> Result<UcValue> {
        Ok(integer(v as i128))
    }

    fn serialize_i128(self, v: i128) -> Result<UcValue> {
        Ok(integer(v))
    }

    fn serialize_u8(self, v: u8) -> Result<UcValue> {
        Ok(UcValue::Number(v as f64))
    }

    fn serialize_u16(self, v: u16) -> Result<UcValue> {
        Ok(UcValue::Number(v as f64))
    }

    fn serialize_u32(self, v: u32) -> Result<UcValue> {
        Ok(UcValue::Number(v as f64))
    }

    fn serialize_u64(self, v: u64) -> Result<UcValue> {
        Ok(integer(v as i128))
    }

    fn serialize_u128(self, v: u128) -> Result<UcValue> {
        match i128::try_from(v) {
            Ok(v) => Ok(integer(v)),
            Err(_) => Ok(UcValue::BigInt(BigInt::from(v))),
        }
    }

    fn serialize_f32(self, v: f32) -> Result<UcValue> {
        Ok(UcValue::Number(v as f64))
    }

    fn serialize_f64(self, v: f64) -> Result<UcValue> {
        Ok(UcValue::Number(v))
    }

    fn serialize_char(self, v: char) -> Result<UcValue> {
        Ok(UcValue::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<UcValue> {
        Ok(UcValue::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<UcValue> {
        Ok(UcValue::list(v.iter().map(|&b| UcValue::Number(b as f64))))
    }

    fn serialize_none(self) -> Result<UcValue> {
        Ok(UcValue::Null)
    }

    fn serialize_some<T>(self, value: &T) -> Result<UcValue>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<UcValue> {
        Ok(UcValue::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<UcValue> {
        Ok(UcValue::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<UcValue> {
        Ok(UcValue::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<UcValue>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<UcValue>
    where
        T: ?Sized + Serialize,
    {
        Ok(variant_value(variant, to_value(value)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SerializeVec> {
        Ok(SerializeVec::new(None, len.unwrap_or(0)))
    }

    fn serialize_tuple(self, len: usize) -> Result<SerializeVec> {
        Ok(SerializeVec::new(None, len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SerializeVec> {
        Ok(SerializeVec::new(None, len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeVec> {
        Ok(SerializeVec::new(Some(variant), len))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<SerializeMap> {
        Ok(SerializeMap::new(None))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<SerializeMap> {
        Ok(SerializeMap::new(None))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<SerializeMap> {
        Ok(SerializeMap::new(Some(variant)))
    }
}

impl SerializeVec {
    fn new(variant: Option<&'static str>, capacity: usize) -> Self {
        SerializeVec {
            variant,
            items: Vec::with_capacity(capacity),
        }
    }

    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.items.push(to_value(value)?);
        Ok(())
    }

    fn finish(self) -> Result<UcValue> {
        let list = UcValue::list(self.items);
        Ok(match self.variant {
            Some(variant) => variant_value(variant, list),
            None => list,
        })
    }
}

impl SerializeMap {
    fn new(variant: Option<&'static str>) -> Self {
        SerializeMap {
            variant,
            map: UcMap::new(),
            current_key: None,
        }
    }

    fn finish(self) -> Result<UcValue> {
        let map = UcValue::Map(self.map);
        Ok(match self.variant {
            Some(variant) => variant_value(variant, map),
            None => map,
        })
    }
}

impl ser::SerializeSeq for SerializeVec {
    type Ok = UcValue;
    type Error = UcError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<UcValue> {
        self.finish()
    }
}

impl ser::SerializeTuple for SerializeVec {
    type Ok = UcValue;
    type Error = UcError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<UcValue> {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for SerializeVec {
    type Ok = UcValue;
    type Error = UcError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<UcValue> {
        self.finish()
    }
}

impl ser::SerializeTupleVariant for SerializeVec {
    type Ok = UcValue;
    type Error = UcError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<UcValue> {
        self.finish()
    }
}

impl ser::SerializeMap for SerializeMap {
    type Ok = UcValue;
    type Error = UcError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let key = match to_value(key)? {
            UcValue::String(key) => key,
            UcValue::Number(number) => number.to_string(),
            UcValue::BigInt(number) => number.to_string(),
            UcValue::Bool(flag) => flag.to_string(),
            other => {
                return Err(UcError::Serde(format!(
                    "Map keys must be strings, found {}",
                    other.type_name()
                )));
            }
        };
        self.current_key = Some(key);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let key = self.current_key.take().ok_or_else(|| {
            UcError::Serde("serialize_value called without serialize_key".to_string())
        })?;
        self.map.insert(key, to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<UcValue> {
        self.finish()
    }
}

impl ser::SerializeStruct for SerializeMap {
    type Ok = UcValue;
    type Error = UcError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.map.insert(key.to_string(), to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<UcValue> {
        self.finish()
    }
}

impl ser::SerializeStructVariant for SerializeMap {
    type Ok = UcValue;
    type Error = UcError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.map.insert(key.to_string(), to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<UcValue> {
        self.finish()
    }
}
