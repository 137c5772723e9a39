use ciborium::value::Value;

use crate::error::{Error, Result};

pub(crate) fn to_vec(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| Error::Encoding(e.to_string()))?;
    Ok(buf)
}

/// Decode one CBOR map from the front of `data`, returning it with the
/// number of bytes it occupied.
pub(crate) fn parse_map_prefix(data: &[u8]) -> Result<(Vec<(Value, Value)>, usize), String> {
    let mut rest = data;
    let value: Value = ciborium::from_reader(&mut rest).map_err(|e| e.to_string())?;
    let consumed = data.len() - rest.len();
    match value {
        Value::Map(map) => Ok((map, consumed)),
        _ => Err("expected map".into()),
    }
}

pub(crate) fn parse_map(data: &[u8]) -> Result<Vec<(Value, Value)>, String> {
    let (map, consumed) = parse_map_prefix(data)?;
    if consumed != data.len() {
        return Err(format!("{} trailing bytes after map", data.len() - consumed));
    }
    Ok(map)
}

pub(crate) fn int(key: i64) -> Value {
    Value::Integer(key.into())
}

pub(crate) fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub(crate) fn map_get(map: &[(Value, Value)], key: i64) -> Option<&Value> {
    let target = int(key);
    map.iter().find(|(k, _)| k == &target).map(|(_, v)| v)
}

pub(crate) fn map_get_str<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::Text(s) if s == key))
        .map(|(_, v)| v)
}

pub(crate) fn as_bytes(v: &Value) -> Option<&[u8]> {
    match v {
        Value::Bytes(b) => Some(b),
        _ => None,
    }
}

pub(crate) fn as_int(v: &Value) -> Option<i64> {
    match v {
        Value::Integer(i) => i64::try_from(*i).ok(),
        _ => None,
    }
}
