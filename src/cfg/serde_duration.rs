use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

// 重新导出serde_with
pub use serde_with::{serde_as, DeserializeAs, SerializeAs};

/// Duration的人性化格式化器
///
/// 支持格式: "3s", "100ms", "2m", "1h", "1h30m45s", "2d"
pub struct HumanDur;

impl SerializeAs<Duration> for HumanDur {
    fn serialize_as<S>(source: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*source))
    }
}

impl<'de> DeserializeAs<'de, Duration> for HumanDur {
    fn deserialize_as<D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

/// 每个单位对应的纳秒数
fn unit_nanos(unit: &str) -> Option<f64> {
    let nanos = match unit {
        "ns" => 1.0,
        "us" | "µs" | "μs" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        "m" => 60.0 * 1e9,
        "h" => 3600.0 * 1e9,
        "d" => 86400.0 * 1e9,
        _ => return None,
    };
    Some(nanos)
}

/// 解析时间字符串: "1h30m45s" -> Duration
///
/// 每一段都必须带单位；不带单位的纯数字由调用方自行解释
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err(anyhow!("空字符串"));
    }

    let mut total_nanos = 0f64;
    let mut chars = s.chars().peekable();

    while chars.peek().is_some() {
        let mut num_str = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() || c == '.' {
                num_str.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if num_str.is_empty() {
            return Err(anyhow!("期望数字: {}", s));
        }
        let value: f64 = num_str
            .parse()
            .map_err(|_| anyhow!("无效数字: {}", num_str))?;

        let mut unit_str = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_alphabetic() {
                unit_str.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if unit_str.is_empty() {
            return Err(anyhow!("缺少时间单位: {}", s));
        }

        let nanos = unit_nanos(&unit_str).ok_or_else(|| anyhow!("不支持的时间单位: {}", unit_str))?;
        total_nanos += value * nanos;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(anyhow!("时间超出范围: {}", s));
    }

    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

/// Duration格式化为字符串: Duration -> "1h30m45s"
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let nanos = duration.subsec_nanos();

    if total_secs == 0 {
        return match nanos {
            0 => "0s".to_string(),
            n if n % 1_000_000 == 0 => format!("{}ms", n / 1_000_000),
            n if n % 1_000 == 0 => format!("{}us", n / 1_000),
            n => format!("{}ns", n),
        };
    }

    let mut out = String::new();
    let mut remaining = total_secs;

    for (unit, secs) in [("d", 86400), ("h", 3600), ("m", 60)] {
        if remaining >= secs {
            out.push_str(&format!("{}{}", remaining / secs, unit));
            remaining %= secs;
        }
    }

    if nanos == 0 {
        if remaining > 0 {
            out.push_str(&format!("{}s", remaining));
        }
    } else {
        out.push_str(&format!("{}ms", remaining * 1000 + (nanos as u64) / 1_000_000));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[test]
    fn test_parse_duration_basic_units() {
        assert_eq!(parse_duration("1s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86400));
    }

    #[test]
    fn test_parse_duration_sub_second() {
        assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
        assert_eq!(parse_duration("1000us").unwrap(), Duration::from_micros(1000));
        assert_eq!(parse_duration("1000µs").unwrap(), Duration::from_micros(1000));
        assert_eq!(parse_duration("1000ns").unwrap(), Duration::from_nanos(1000));
    }

    #[test]
    fn test_parse_duration_decimal_and_compound() {
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(
            parse_duration("1h30m45s").unwrap(),
            Duration::from_secs(3600 + 1800 + 45)
        );
        assert_eq!(
            parse_duration("1m500ms").unwrap(),
            Duration::from_secs(60) + Duration::from_millis(500)
        );
    }

    #[test]
    fn test_parse_duration_whitespace_case() {
        assert_eq!(parse_duration("  1S  ").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_duration("100MS").unwrap(), Duration::from_millis(100));
    }

    #[test]
    fn test_parse_duration_errors() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("5x").is_err());
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_secs(2)), "2s");
        assert_eq!(format_duration(Duration::from_secs(5400)), "1h30m");
        assert_eq!(format_duration(Duration::from_millis(61_500)), "1m1500ms");
    }

    #[serde_as]
    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Timeouts {
        #[serde_as(as = "HumanDur")]
        delay: Duration,
    }

    #[test]
    fn test_human_dur_serde() {
        let parsed: Timeouts = serde_json::from_str(r#"{"delay": "2s"}"#).unwrap();
        assert_eq!(parsed.delay, Duration::from_secs(2));

        let text = serde_json::to_string(&parsed).unwrap();
        assert_eq!(text, r#"{"delay":"2s"}"#);
    }
}
