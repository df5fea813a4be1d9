//! 文件配置源
//!
//! 支持从本地文件系统加载配置，支持 JSON/JSON5/YAML/TOML 格式，
//! 多个文件按顺序深度合并，后面的文件覆盖前面的同名键

use serde_json::{Map, Value as JsonValue};
use std::path::{Path, PathBuf};

use super::error::ConfigError;

/// toml 日期时间反序列化为 JsonValue 时使用的私有包装字段
const TOML_DATETIME_FIELD: &str = "$__toml_private_datetime";

/// 支持的扩展名，按查找优先级排列
pub const SUPPORTED_EXTS: [&str; 5] = ["json", "json5", "yaml", "yml", "toml"];

/// 根据扩展名推断文件格式
pub fn format_of(path: &Path) -> Result<&'static str, ConfigError> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    SUPPORTED_EXTS
        .iter()
        .find(|supported| **supported == ext)
        .copied()
        .ok_or_else(|| ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        })
}

/// 在目录中查找配置文件
///
/// `name` 已带受支持的扩展名时直接使用，否则按 [`SUPPORTED_EXTS`] 顺序探测
pub fn find_config_file(dir: &Path, name: &str) -> Result<PathBuf, ConfigError> {
    let direct = dir.join(name);
    if format_of(&direct).is_ok() && direct.is_file() {
        return Ok(direct);
    }

    for ext in SUPPORTED_EXTS {
        let path = dir.join(format!("{}.{}", name, ext));
        if path.is_file() {
            return Ok(path);
        }
    }

    Err(ConfigError::NotFound {
        name: name.to_string(),
        dir: dir.to_path_buf(),
    })
}

/// 根据格式解析配置内容
pub fn parse_config(content: &str, format: &str, path: &Path) -> Result<JsonValue, ConfigError> {
    let parsed = match format {
        "json" => serde_json::from_str::<JsonValue>(content).map_err(|e| e.to_string()),
        "json5" => json5::from_str::<JsonValue>(content).map_err(|e| e.to_string()),
        "yaml" | "yml" => serde_yaml::from_str::<JsonValue>(content).map_err(|e| e.to_string()),
        "toml" => toml::from_str::<JsonValue>(content)
            .map(unwrap_toml_datetimes)
            .map_err(|e| e.to_string()),
        _ => {
            return Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    };

    let value = parsed.map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        format: format.to_string(),
        message,
    })?;

    match value {
        // 空的 YAML 文件解析为 null
        JsonValue::Null => Ok(JsonValue::Object(Map::new())),
        JsonValue::Object(_) => Ok(lowercase_keys(value)),
        other => Err(ConfigError::Parse {
            path: path.to_path_buf(),
            format: format.to_string(),
            message: format!("顶层必须是映射，实际为 {}", type_name(&other)),
        }),
    }
}

/// 读取并解析单个配置文件
pub fn read_config_file(path: &Path) -> Result<JsonValue, ConfigError> {
    let format = format_of(path)?;
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    parse_config(&content, format, path)
}

/// 按顺序读取所有文件并合并：第一个为基础，后续文件依次覆盖
pub fn load_all(paths: &[PathBuf]) -> Result<JsonValue, ConfigError> {
    let mut merged = JsonValue::Object(Map::new());
    for path in paths {
        merge_values(&mut merged, read_config_file(path)?);
    }
    Ok(merged)
}

/// 深度合并：映射递归合并，其余值由 overlay 覆盖
pub fn merge_values(base: &mut JsonValue, overlay: JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let nested = value.is_object()
                    && base_map.get(&key).map_or(false, JsonValue::is_object);
                if !nested {
                    base_map.insert(key, value);
                } else if let Some(existing) = base_map.get_mut(&key) {
                    merge_values(existing, value);
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// 递归地将映射的键转为小写，配置键大小写不敏感
pub fn lowercase_keys(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            let mut lowered = Map::with_capacity(map.len());
            for (key, value) in map {
                let key = key.to_lowercase();
                let value = lowercase_keys(value);
                if let Some(existing) = lowered.get_mut(&key) {
                    merge_values(existing, value);
                } else {
                    lowered.insert(key, value);
                }
            }
            JsonValue::Object(lowered)
        }
        JsonValue::Array(items) => JsonValue::Array(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

/// 将 toml 日期时间的包装对象展开为原始字符串
fn unwrap_toml_datetimes(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            if map.len() == 1 {
                if let Some(JsonValue::String(datetime)) = map.get(TOML_DATETIME_FIELD) {
                    return JsonValue::String(datetime.clone());
                }
            }
            JsonValue::Object(
                map.into_iter()
                    .map(|(key, value)| (key, unwrap_toml_datetimes(value)))
                    .collect(),
            )
        }
        JsonValue::Array(items) => {
            JsonValue::Array(items.into_iter().map(unwrap_toml_datetimes).collect())
        }
        other => other,
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
