//! 命令行参数绑定
//!
//! 绑定的参数作为额外的覆盖层：用户在命令行显式给出时优先于环境变量和文件，
//! 仅取默认值时只优先于 `set_default`

use clap::parser::ValueSource;
use clap::ArgMatches;
use serde_json::Value as JsonValue;

/// 一个已解析的命令行参数
#[derive(Debug, Clone, PartialEq)]
pub struct Flag {
    /// 参数名（clap 中的 id）
    pub name: String,
    /// 参数值，单值为字符串，多值为字符串数组
    pub value: JsonValue,
    /// 是否由用户在命令行显式给出
    pub changed: bool,
}

impl Flag {
    pub fn new(name: impl Into<String>, value: impl Into<JsonValue>, changed: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            changed,
        }
    }

    /// 从 clap 的解析结果中提取参数
    ///
    /// 参数不存在或没有任何值（包括默认值）时返回 None
    pub fn from_matches(matches: &ArgMatches, id: &str) -> Option<Self> {
        let raw = matches.try_get_raw(id).ok().flatten()?;
        let mut values: Vec<JsonValue> = raw
            .map(|value| JsonValue::String(value.to_string_lossy().into_owned()))
            .collect();

        let value = match values.len() {
            0 => return None,
            1 => values.remove(0),
            _ => JsonValue::Array(values),
        };

        let changed = matches!(matches.value_source(id), Some(ValueSource::CommandLine));

        Some(Self {
            name: id.to_string(),
            value,
            changed,
        })
    }

    /// 提取解析结果中的所有参数，键为参数 id
    pub fn all_from_matches(matches: &ArgMatches) -> Vec<Self> {
        matches
            .ids()
            .filter_map(|id| Self::from_matches(matches, id.as_str()))
            .collect()
    }
}
