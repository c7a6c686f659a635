//! Readers that accept numbers as strings, flags as `"on"`/`"off"` and
//! `"None"` as absent.

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::{Error, Result};

const NONE_SENTINEL: &str = "None";

pub(crate) fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.round() as i64))
        }
        _ => None,
    }
}

/// Identifier as a string, whether the wire sent `"1"` or `1`.
pub(crate) fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn opt_str<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| *s != NONE_SENTINEL)
}

pub(crate) fn opt_string(obj: &Value, key: &str) -> Option<String> {
    opt_str(obj, key).map(str::to_string)
}

pub(crate) fn opt_f64(obj: &Value, key: &str) -> Option<f64> {
    obj.get(key).and_then(as_f64)
}

pub(crate) fn opt_i64(obj: &Value, key: &str) -> Option<i64> {
    obj.get(key).and_then(as_i64)
}

/// `true` for `true`, `"on"` or `"true"`.
pub(crate) fn flag(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::String(s) => s == "on" || s == "true",
        _ => false,
    }
}

pub(crate) fn is_on(obj: &Value, key: &str) -> bool {
    obj.get(key).is_some_and(flag)
}

pub(crate) fn opt_flag(obj: &Value, key: &str) -> Option<bool> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(v) => Some(flag(v)),
    }
}

pub(crate) fn required_str<'a>(obj: &'a Value, key: &'static str) -> Result<&'a str> {
    opt_str(obj, key).ok_or(Error::MissingField(key))
}

pub(crate) fn parse_enum<T>(
    obj: &Value,
    key: &'static str,
    parse: fn(&str) -> Option<T>,
) -> Result<T> {
    let s = required_str(obj, key)?;
    parse(s).ok_or_else(|| Error::UnrecognizedValue {
        field: key,
        value: s.to_string(),
    })
}

pub(crate) fn parse_opt_enum<T>(
    obj: &Value,
    key: &'static str,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>> {
    match opt_str(obj, key) {
        None => Ok(None),
        Some(s) => parse(s).map(Some).ok_or_else(|| Error::UnrecognizedValue {
            field: key,
            value: s.to_string(),
        }),
    }
}

/// Wall-clock time of day, `HH:MM` or `HH:MM:SS`.
pub(crate) fn parse_time(field: &'static str, s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| Error::UnrecognizedValue {
            field,
            value: s.to_string(),
        })
}

pub(crate) fn opt_time(obj: &Value, key: &'static str) -> Result<Option<NaiveTime>> {
    match opt_str(obj, key) {
        None | Some("") => Ok(None),
        Some(s) => parse_time(key, s).map(Some),
    }
}

/// `deserialize_with` adapter for on/off flags that may arrive as booleans
/// or strings.
pub(crate) fn de_flag<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<bool, D::Error> {
    Ok(flag(&Value::deserialize(d)?))
}

/// `deserialize_with` adapter for counters sent as numbers or numeric
/// strings.
pub(crate) fn de_opt_i64<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<i64>, D::Error> {
    Ok(as_i64(&Value::deserialize(d)?))
}

pub(crate) fn de_opt_f64<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<f64>, D::Error> {
    Ok(as_f64(&Value::deserialize(d)?))
}
