//! 值类型转换
//!
//! 将分层配置中的原始值尽力转换为访问器需要的类型，无法转换时返回 None，
//! 由访问器回退为该类型的零值

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::time::Duration;

use super::serde_duration::parse_duration;

pub fn to_bool(value: &JsonValue) -> Option<bool> {
    match value {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::Number(n) => n.as_f64().map(|f| f != 0.0),
        JsonValue::String(s) => match s.trim() {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn to_i64(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(float_to_i64)),
        JsonValue::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(float_to_i64))
        }
        JsonValue::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

pub fn to_u64(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().and_then(float_to_u64)),
        JsonValue::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(float_to_u64))
        }
        JsonValue::Bool(b) => Some(u64::from(*b)),
        _ => None,
    }
}

pub fn to_f64(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn float_to_i64(f: f64) -> Option<i64> {
    let f = f.trunc();
    (f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64).then_some(f as i64)
}

fn float_to_u64(f: f64) -> Option<u64> {
    let f = f.trunc();
    (f.is_finite() && f >= 0.0 && f <= u64::MAX as f64).then_some(f as u64)
}

/// 带单位的字符串按时长解析，纯数字按纳秒解释
pub fn to_duration(value: &JsonValue) -> Option<Duration> {
    match value {
        JsonValue::String(s) => {
            let s = s.trim();
            if s.chars().any(|c| c.is_alphabetic()) {
                parse_duration(s).ok()
            } else {
                to_u64(value).map(Duration::from_nanos)
            }
        }
        JsonValue::Number(_) => to_u64(value).map(Duration::from_nanos),
        _ => None,
    }
}

/// 解析 "10kb"、"5 MB"、"1g" 形式的大小，单位为 1024 的幂
pub fn parse_size_in_bytes(size: &str) -> u64 {
    let size = size.trim();
    let lower = size.to_lowercase();

    let (number, multiplier) = match lower.strip_suffix('b') {
        Some(rest) if rest.ends_with('k') => (&rest[..rest.len() - 1], 1u64 << 10),
        Some(rest) if rest.ends_with('m') => (&rest[..rest.len() - 1], 1u64 << 20),
        Some(rest) if rest.ends_with('g') => (&rest[..rest.len() - 1], 1u64 << 30),
        Some(rest) if !rest.is_empty() => (rest, 1),
        _ => (lower.as_str(), 1),
    };

    let number = to_i64(&JsonValue::String(number.trim().to_string())).unwrap_or(0);
    if number <= 0 {
        return 0;
    }

    (number as u64).checked_mul(multiplier).unwrap_or(0)
}

/// 数组逐项转为字符串，字符串按空白切分
pub fn to_string_slice(value: &JsonValue) -> Option<Vec<String>> {
    match value {
        JsonValue::Array(items) => Some(items.iter().filter_map(to_string).collect()),
        JsonValue::String(s) => Some(s.split_whitespace().map(str::to_string).collect()),
        _ => None,
    }
}

/// 数组逐项转为整数，任一项失败则整体失败
pub fn to_int_slice(value: &JsonValue) -> Option<Vec<i64>> {
    match value {
        JsonValue::Array(items) => items.iter().map(to_i64).collect(),
        JsonValue::String(s) => s
            .split_whitespace()
            .map(|part| part.parse::<i64>().ok())
            .collect(),
        _ => None,
    }
}

/// 映射原样返回，字符串按 JSON 对象解析
pub fn to_string_map(value: &JsonValue) -> Option<Map<String, JsonValue>> {
    match value {
        JsonValue::Object(map) => Some(map.clone()),
        JsonValue::String(s) => match serde_json::from_str::<JsonValue>(s) {
            Ok(JsonValue::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}

pub fn to_string_map_string(value: &JsonValue) -> Option<HashMap<String, String>> {
    let map = to_string_map(value)?;
    Some(
        map.iter()
            .map(|(key, value)| (key.clone(), to_string(value).unwrap_or_default()))
            .collect(),
    )
}

pub fn to_string_map_string_slice(value: &JsonValue) -> Option<HashMap<String, Vec<String>>> {
    let map = to_string_map(value)?;
    Some(
        map.iter()
            .map(|(key, value)| {
                let items = match value {
                    // 单个字符串不切分，作为一个元素
                    JsonValue::String(s) => vec![s.clone()],
                    other => to_string_slice(other)
                        .or_else(|| to_string(other).map(|s| vec![s]))
                        .unwrap_or_default(),
                };
                (key.clone(), items)
            })
            .collect(),
    )
}

/// 支持 RFC 3339、"YYYY-MM-DD HH:MM:SS"、"YYYY-MM-DD" 以及 unix 秒
pub fn to_time(value: &JsonValue) -> Option<DateTime<Utc>> {
    match value {
        JsonValue::String(s) => {
            let s = s.trim();
            if let Ok(time) = DateTime::parse_from_rfc3339(s) {
                return Some(time.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(Utc.from_utc_datetime(&naive));
                }
            }
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
            }
            s.parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        }
        JsonValue::Number(n) => n.as_i64().and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        _ => None,
    }
}
