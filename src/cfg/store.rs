//! 分层配置存储
//!
//! 读取配置文件与环境变量并按优先级合并，可选地监听文件变化热更新。
//! 读路径只加载 `ArcSwap` 中的不可变快照，不加锁，也不会看到更新到一半的状态；
//! 文件层的更新全部由单一 reload 线程通过通道串行完成

use arc_swap::ArcSwap;
use clap::ArgMatches;
use crossbeam::channel::{unbounded, Receiver};
use garde::Validate;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use smart_default::SmartDefault;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use super::config::Config;
use super::env::{self, EnvKeys, CONFIG_NAME_ENV, CONFIG_PATH_ENV, ENV_PREFIX, LOG_LEVEL_ENV};
use super::error::ConfigError;
use super::file_source;
use super::flag::Flag;
use super::retry::{retry, RetryConfig, TransientFn};
use crate::fs::{FileEvent, FileWatcher, FileWatcherConfig};
use crate::log::Logger;

/// 配置重载回调，参数为触发重载的文件
pub type ChangeCallback = Arc<dyn Fn(&Path) + Send + Sync>;

/// ConfigStore 构造选项
#[derive(Clone, Deserialize, SmartDefault)]
#[serde(default)]
pub struct StoreOptions {
    /// 文件读取的重试策略
    pub retry: RetryConfig,

    /// 加载了文件时是否监听变化
    #[default = true]
    pub watch: bool,

    /// 文件监听配置
    pub watcher: FileWatcherConfig,

    /// 环境变量前缀
    #[default(ENV_PREFIX.to_string())]
    pub env_prefix: String,

    /// 自定义的暂时性错误判定，默认使用 [`ConfigError::is_transient`]
    #[serde(skip)]
    pub transient: Option<TransientFn>,
}

/// 某一时刻的完整配置层，整体替换，不原地修改
#[derive(Debug, Clone)]
struct Snapshot {
    /// set 写入的显式覆盖
    overrides: JsonValue,
    /// 绑定的命令行参数，键为配置键
    flags: BTreeMap<String, Flag>,
    /// 合并后的文件配置
    files: JsonValue,
    /// set_default 写入的默认值
    defaults: JsonValue,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            overrides: JsonValue::Object(Map::new()),
            flags: BTreeMap::new(),
            files: JsonValue::Object(Map::new()),
            defaults: JsonValue::Object(Map::new()),
        }
    }
}

/// 与 reload 线程共享的状态
struct Shared {
    settings: ArcSwap<Snapshot>,
    env: EnvKeys,
    source_paths: Vec<PathBuf>,
    logger: Logger,
    callbacks: Mutex<Vec<ChangeCallback>>,
    /// 串行化文件层的读取与替换，手动重载和 reload 线程共用
    reload_lock: Mutex<()>,
}

impl Shared {
    /// 按优先级查找：覆盖 > 显式参数 > 环境变量 > 文件 > 参数默认值 > 默认值
    fn find(&self, key: &str) -> Option<JsonValue> {
        self.resolve(&self.settings.load(), key)
    }

    /// 在给定快照上解析键，环境变量层始终实时读取
    fn resolve(&self, snapshot: &Snapshot, key: &str) -> Option<JsonValue> {
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }

        if let Some(value) = search_path(&snapshot.overrides, &key) {
            return Some(value.clone());
        }
        let flag = snapshot.flags.get(&key);
        if let Some(flag) = flag.filter(|flag| flag.changed) {
            return Some(flag.value.clone());
        }
        if let Some(value) = self.env.lookup(&key) {
            return Some(JsonValue::String(value));
        }
        if let Some(value) = search_path(&snapshot.files, &key) {
            return Some(value.clone());
        }
        if let Some(flag) = flag {
            return Some(flag.value.clone());
        }
        search_path(&snapshot.defaults, &key).cloned()
    }

    /// 重新读取全部源文件，成功后原子替换文件层；失败时保留上一次的有效配置
    fn reload(&self, changed: &Path) -> Result<(), ConfigError> {
        {
            let _guard = self
                .reload_lock
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let files = file_source::load_all(&self.source_paths)?;
            self.settings.rcu(|current| Snapshot {
                files: files.clone(),
                ..Snapshot::clone(current)
            });
        }
        self.logger
            .info(format!("Reloaded config: {}", changed.display()));

        let callbacks = self
            .callbacks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for callback in callbacks {
            callback(changed);
        }
        Ok(())
    }
}

/// 分层配置存储
///
/// # 示例
/// ```no_run
/// use ndau_config::cfg::{Config, ConfigStore};
///
/// // 未传入文件时从 NDAU_CONFIG_PATH/NDAU_CONFIG_NAME 加载
/// let config = ConfigStore::new::<&str>(&[]).unwrap();
///
/// // base.yaml 为基础，override.yaml 覆盖同名键，NDAU_DB_HOST 覆盖两者
/// let config = ConfigStore::new(&["base.yaml", "override.yaml"]).unwrap();
/// println!("db.host = {}", config.get_string("db.host"));
/// ```
pub struct ConfigStore {
    shared: Arc<Shared>,
    watch_enabled: bool,
    /// drop 时关闭监听线程，进而关闭 reload 线程
    _watcher: Option<FileWatcher>,
}

impl ConfigStore {
    /// 使用默认选项创建配置存储
    ///
    /// # 参数
    /// - `paths`: 配置文件列表，第一个为基础，后续依次合并覆盖；
    ///   为空时从 `NDAU_CONFIG_NAME`/`NDAU_CONFIG_PATH` 指定的位置加载
    ///
    /// # 错误
    /// 文件读取遇到永久性错误，或 `NDAU_LOG_LEVEL` 无效时返回错误。
    /// 暂时性错误每 2 秒重试一次，直到成功
    pub fn new<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ConfigError> {
        Self::with_options(StoreOptions::default(), paths)
    }

    /// 使用指定选项创建配置存储
    pub fn with_options<P: AsRef<Path>>(
        options: StoreOptions,
        paths: &[P],
    ) -> Result<Self, ConfigError> {
        let level = env::var_or(LOG_LEVEL_ENV, "info");
        let logger =
            Logger::new("config", &level).map_err(|e| ConfigError::Logger(e.to_string()))?;

        options
            .retry
            .validate()
            .map_err(|e| ConfigError::InvalidOptions(e.to_string()))?;

        let transient: TransientFn = options
            .transient
            .clone()
            .unwrap_or_else(|| Arc::new(ConfigError::is_transient));

        let (source_paths, files) = if paths.is_empty() {
            load_from_env(&options, transient.as_ref(), &logger)?
        } else {
            load_paths(paths, &options, transient.as_ref(), &logger)?
        };

        let watch_enabled = !source_paths.is_empty();
        let shared = Arc::new(Shared {
            settings: ArcSwap::from_pointee(Snapshot {
                files,
                ..Snapshot::default()
            }),
            env: EnvKeys::new(&options.env_prefix),
            source_paths,
            logger,
            callbacks: Mutex::new(Vec::new()),
            reload_lock: Mutex::new(()),
        });

        let watcher = if watch_enabled && options.watch {
            Some(start_watch(&shared, options.watcher.clone())?)
        } else {
            None
        };

        Ok(Self {
            shared,
            watch_enabled,
            _watcher: watcher,
        })
    }

    /// 按顺序加载的配置文件
    pub fn source_paths(&self) -> &[PathBuf] {
        &self.shared.source_paths
    }

    /// 最后加载的配置文件
    pub fn config_file_used(&self) -> Option<&Path> {
        self.shared.source_paths.last().map(PathBuf::as_path)
    }

    /// 是否从文件加载（即是否具备热更新条件）
    pub fn watch_enabled(&self) -> bool {
        self.watch_enabled
    }

    /// 注册配置重载后的回调
    pub fn on_config_change<F>(&self, callback: F)
    where
        F: Fn(&Path) + Send + Sync + 'static,
    {
        self.shared
            .callbacks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Arc::new(callback));
    }

    /// 立即重新读取全部配置文件
    ///
    /// 失败时返回错误，已生效的配置保持不变
    pub fn reload(&self) -> Result<(), ConfigError> {
        match self.shared.source_paths.last() {
            Some(path) => self.shared.reload(path),
            None => Ok(()),
        }
    }

    /// 显式覆盖，优先级最高
    pub fn set(&self, key: &str, value: impl Into<JsonValue>) -> Result<(), ConfigError> {
        let key = normalize_key(key)?;
        let value = file_source::lowercase_keys(value.into());
        self.shared.settings.rcu(|current| {
            let mut next = Snapshot::clone(current);
            insert_path(&mut next.overrides, &key, value.clone());
            next
        });
        Ok(())
    }

    /// 默认值，优先级最低
    pub fn set_default(&self, key: &str, value: impl Into<JsonValue>) -> Result<(), ConfigError> {
        let key = normalize_key(key)?;
        let value = file_source::lowercase_keys(value.into());
        self.shared.settings.rcu(|current| {
            let mut next = Snapshot::clone(current);
            insert_path(&mut next.defaults, &key, value.clone());
            next
        });
        Ok(())
    }

    /// 所有已知的键（不含仅存在于环境变量中的键），按字典序排列
    pub fn all_keys(&self) -> Vec<String> {
        known_keys(&self.shared.settings.load())
    }
}

impl Config for ConfigStore {
    fn get(&self, key: &str) -> Option<JsonValue> {
        self.shared.find(key)
    }

    fn all_settings(&self) -> Map<String, JsonValue> {
        // 所有键基于同一快照解析
        let snapshot = self.shared.settings.load();
        let mut settings = JsonValue::Object(Map::new());
        for key in known_keys(&snapshot) {
            if let Some(value) = self.shared.resolve(&snapshot, &key) {
                insert_path(&mut settings, &key, value);
            }
        }
        match settings {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn bind_flag(&self, key: &str, flag: Flag) -> Result<(), ConfigError> {
        let key = normalize_key(key)?;
        self.shared.settings.rcu(|current| {
            let mut next = Snapshot::clone(current);
            next.flags.insert(key.clone(), flag.clone());
            next
        });
        Ok(())
    }

    fn bind_flags(&self, matches: &ArgMatches) -> Result<(), ConfigError> {
        for flag in Flag::all_from_matches(matches) {
            let key = flag.name.clone();
            self.bind_flag(&key, flag)?;
        }
        Ok(())
    }
}

/// 未传入文件：从 NDAU_CONFIG_PATH/NDAU_CONFIG_NAME 查找，任一为空则只使用环境变量
fn load_from_env(
    options: &StoreOptions,
    transient: &(dyn Fn(&ConfigError) -> bool + Send + Sync),
    logger: &Logger,
) -> Result<(Vec<PathBuf>, JsonValue), ConfigError> {
    let name = env::var_or(CONFIG_NAME_ENV, "");
    let dir = env::var_or(CONFIG_PATH_ENV, "");

    logger.info(format!("Load config from: {}/{}", dir, name));
    if name.is_empty() || dir.is_empty() {
        return Ok((Vec::new(), JsonValue::Object(Map::new())));
    }

    let (path, files) = retry(&options.retry, transient, logger, || {
        let path = file_source::find_config_file(Path::new(&dir), &name)?;
        let value = file_source::read_config_file(&path)?;
        Ok((path, value))
    })?;

    Ok((vec![path], files))
}

/// 第一个文件为基础，后续文件依次合并覆盖，每个文件独立重试
fn load_paths<P: AsRef<Path>>(
    paths: &[P],
    options: &StoreOptions,
    transient: &(dyn Fn(&ConfigError) -> bool + Send + Sync),
    logger: &Logger,
) -> Result<(Vec<PathBuf>, JsonValue), ConfigError> {
    let mut files = JsonValue::Object(Map::new());
    let mut source_paths = Vec::with_capacity(paths.len());

    for (i, path) in paths.iter().enumerate() {
        let path = path.as_ref();
        let value = retry(&options.retry, transient, logger, || {
            file_source::read_config_file(path)
        })?;

        if i == 0 {
            files = value;
        } else {
            file_source::merge_values(&mut files, value);
        }
        source_paths.push(path.to_path_buf());
    }

    Ok((source_paths, files))
}

/// 监听所有源文件；事件经通道交给唯一的 reload 线程处理
fn start_watch(shared: &Arc<Shared>, config: FileWatcherConfig) -> Result<FileWatcher, ConfigError> {
    let mut watcher =
        FileWatcher::new(config).map_err(|e| ConfigError::Watch(e.to_string()))?;
    let (reload_tx, reload_rx) = unbounded::<PathBuf>();

    for path in &shared.source_paths {
        let reload_tx = reload_tx.clone();
        let logger = shared.logger.clone();
        watcher
            .watch(path, move |event| match event {
                FileEvent::Created(path) | FileEvent::Modified(path) => {
                    let _ = reload_tx.send(path);
                }
                FileEvent::Deleted(path) => {
                    logger.warn(format!("Config file removed: {}", path.display()));
                }
                FileEvent::Error(message) => logger.error(message),
            })
            .map_err(|e| ConfigError::Watch(e.to_string()))?;
    }

    let shared = Arc::clone(shared);
    thread::Builder::new()
        .name("config-reload".to_string())
        .spawn(move || reload_loop(shared, reload_rx))
        .map_err(|e| ConfigError::Watch(e.to_string()))?;

    Ok(watcher)
}

/// 所有发送端（监听 handler）关闭后退出
fn reload_loop(shared: Arc<Shared>, reload_rx: Receiver<PathBuf>) {
    while let Ok(mut changed) = reload_rx.recv() {
        // 合并已经排队的请求，一次重载即可覆盖
        while let Ok(next) = reload_rx.try_recv() {
            changed = next;
        }

        if let Err(e) = shared.reload(&changed) {
            shared.logger.error(format!(
                "Failed to reload config {}, keeping previous settings: {}",
                changed.display(),
                e
            ));
        }
    }
}

fn normalize_key(key: &str) -> Result<String, ConfigError> {
    let normalized = key.trim().to_lowercase();
    if normalized.is_empty() || normalized.split('.').any(str::is_empty) {
        return Err(ConfigError::InvalidKey(key.to_string()));
    }
    Ok(normalized)
}

/// 按点号路径查找嵌套值
fn search_path<'a>(root: &'a JsonValue, key: &str) -> Option<&'a JsonValue> {
    key.split('.')
        .try_fold(root, |node, part| node.as_object()?.get(part))
        .filter(|value| !value.is_null())
}

/// 按点号路径写入，中间层不是映射时替换为映射
fn insert_path(root: &mut JsonValue, key: &str, value: JsonValue) {
    if !root.is_object() {
        *root = JsonValue::Object(Map::new());
    }
    let JsonValue::Object(map) = root else {
        return;
    };

    match key.split_once('.') {
        None => {
            map.insert(key.to_string(), value);
        }
        Some((head, rest)) => {
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| JsonValue::Object(Map::new()));
            insert_path(child, rest, value);
        }
    }
}

fn known_keys(snapshot: &Snapshot) -> Vec<String> {
    let mut keys = BTreeSet::new();
    collect_leaf_keys(&snapshot.overrides, "", &mut keys);
    collect_leaf_keys(&snapshot.files, "", &mut keys);
    collect_leaf_keys(&snapshot.defaults, "", &mut keys);
    keys.extend(snapshot.flags.keys().cloned());
    keys.into_iter().collect()
}

/// 收集叶子节点的完整键，空映射也视为叶子
fn collect_leaf_keys(value: &JsonValue, prefix: &str, keys: &mut BTreeSet<String>) {
    match value {
        JsonValue::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let full = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                collect_leaf_keys(child, &full, keys);
            }
        }
        _ if !prefix.is_empty() => {
            keys.insert(prefix.to_string());
        }
        _ => {}
    }
}
