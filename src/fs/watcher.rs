//! 文件监听器
//!
//! 监听文件系统事件，当文件变化时触发回调

use anyhow::{anyhow, Result};
use crossbeam::channel::{unbounded, Receiver, Sender};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use smart_default::SmartDefault;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::cfg::serde_duration::{serde_as, HumanDur};

/// 文件事件
#[derive(Debug, Clone)]
pub enum FileEvent {
    /// 文件被创建
    Created(PathBuf),
    /// 文件被修改
    Modified(PathBuf),
    /// 文件被删除
    Deleted(PathBuf),
    /// 发生错误
    Error(String),
}

/// 文件监听器配置
#[serde_as]
#[derive(Debug, Clone, Deserialize, SmartDefault)]
#[serde(default)]
pub struct FileWatcherConfig {
    /// 事件防抖延迟（同一文件的多次修改只处理最后一次）
    #[serde_as(as = "HumanDur")]
    #[default(Duration::from_millis(100))]
    pub debounce_delay: Duration,
}

/// Handler 函数包装器
type HandlerFn = dyn Fn(FileEvent) + Send + Sync;

/// 监听请求（用于在事件循环中添加监听）
struct WatchRequest {
    path: PathBuf,
    handler: Box<HandlerFn>,
}

/// 文件监听器
///
/// 监听指定文件的变化，当文件被创建、修改或删除时触发回调
///
/// # 架构说明
///
/// - **单一 notify watcher**：监听目标文件所在的目录，按文件路径分发事件，
///   编辑器"写临时文件再重命名"的保存方式同样能被捕获
/// - **单一事件循环线程**：接收 notify 原始事件，防抖去重后在同一线程内调用 handler
///
/// # 示例
///
/// ```no_run
/// use ndau_config::fs::{FileEvent, FileWatcher, FileWatcherConfig};
///
/// let mut watcher = FileWatcher::new(FileWatcherConfig::default()).unwrap();
///
/// watcher.watch("/etc/ndau/config.toml", |event| match event {
///     FileEvent::Modified(path) => println!("文件修改: {:?}", path),
///     other => println!("其他事件: {:?}", other),
/// }).unwrap();
/// ```
pub struct FileWatcher {
    /// 监听请求发送通道，drop 后事件循环线程退出
    watch_request_tx: Sender<WatchRequest>,
    _event_thread: thread::JoinHandle<()>,
}

impl FileWatcher {
    /// 使用配置创建文件监听器
    ///
    /// # 错误
    /// 底层 notify watcher 创建失败时返回错误
    pub fn new(config: FileWatcherConfig) -> Result<Self> {
        let (watch_request_tx, watch_request_rx) = unbounded::<WatchRequest>();
        let (notify_tx, notify_rx) = unbounded();

        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = notify_tx.send(event);
            }
        })
        .map_err(|e| anyhow!("创建文件监听器失败: {}", e))?;

        let debounce_delay = config.debounce_delay;
        let event_thread = thread::Builder::new()
            .name("config-watcher".to_string())
            .spawn(move || event_loop(watcher, watch_request_rx, notify_rx, debounce_delay))
            .map_err(|e| anyhow!("启动监听线程失败: {}", e))?;

        Ok(Self {
            watch_request_tx,
            _event_thread: event_thread,
        })
    }

    /// 监听指定文件
    ///
    /// 文件可以暂时不存在，但其父目录必须存在
    pub fn watch<F>(&mut self, filepath: impl AsRef<Path>, handler: F) -> Result<()>
    where
        F: Fn(FileEvent) + Send + Sync + 'static,
    {
        let path = normalize_watch_path(filepath.as_ref())?;

        self.watch_request_tx
            .send(WatchRequest {
                path,
                handler: Box::new(handler),
            })
            .map_err(|e| anyhow!("发送监听请求失败: {}", e))
    }
}

/// 规范化路径：canonicalize 父目录再拼接文件名，保证与 notify 上报的路径一致
fn normalize_watch_path(path: &Path) -> Result<PathBuf> {
    if path.is_dir() {
        return Err(anyhow!("路径不是一个文件: {}", path.display()));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| anyhow!("无法获取文件名: {}", path.display()))?;

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !parent.exists() {
        return Err(anyhow!("父目录不存在: {}", parent.display()));
    }

    Ok(dunce::canonicalize(&parent)?.join(filename))
}

/// 事件循环的轮询间隔，防抖延迟为 0 时也不低于 1ms
fn poll_interval(debounce_delay: Duration) -> Duration {
    (debounce_delay / 2).max(Duration::from_millis(1))
}

fn event_loop(
    mut watcher: RecommendedWatcher,
    watch_request_rx: Receiver<WatchRequest>,
    notify_rx: Receiver<notify::Event>,
    debounce_delay: Duration,
) {
    let mut handlers: HashMap<PathBuf, Box<HandlerFn>> = HashMap::new();
    let mut watched_dirs: HashSet<PathBuf> = HashSet::new();

    // 事件去重缓存：path -> (event, timestamp)
    let mut pending_events: HashMap<PathBuf, (FileEvent, Instant)> = HashMap::new();
    let tick = poll_interval(debounce_delay);

    loop {
        crossbeam::select! {
            recv(watch_request_rx) -> request => {
                let Ok(request) = request else {
                    break; // FileWatcher 已 drop
                };

                if let Some(dir) = request.path.parent() {
                    if watched_dirs.insert(dir.to_path_buf()) {
                        if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
                            watched_dirs.remove(dir);
                            (request.handler)(FileEvent::Error(format!(
                                "监听目录失败: {}, 路径: {}",
                                e,
                                dir.display()
                            )));
                        }
                    }
                }
                handlers.insert(request.path, request.handler);
            }
            recv(notify_rx) -> event => {
                let Ok(event) = event else {
                    break;
                };

                for path in &event.paths {
                    let file_event = if event.kind.is_create() {
                        FileEvent::Created(path.clone())
                    } else if event.kind.is_modify() {
                        FileEvent::Modified(path.clone())
                    } else if event.kind.is_remove() {
                        FileEvent::Deleted(path.clone())
                    } else {
                        continue;
                    };

                    let key = dunce::canonicalize(path).unwrap_or_else(|_| path.clone());
                    if handlers.contains_key(&key) {
                        pending_events.insert(key, (file_event, Instant::now()));
                    }
                }
            }
            default(tick) => {}
        }

        if pending_events.is_empty() {
            continue;
        }

        // 只分发超过 debounce_delay 没有新事件的文件
        let now = Instant::now();
        let mut ready = Vec::new();
        pending_events.retain(|path, (event, time)| {
            if now.duration_since(*time) >= debounce_delay {
                ready.push((path.clone(), event.clone()));
                false
            } else {
                true
            }
        });

        for (path, event) in ready {
            if let Some(handler) = handlers.get(&path) {
                handler(event);
            }
        }
    }

    // 显式 drop watcher 以释放文件句柄
    drop(watcher);
}
