//! 键值存储 - 基础设施层
//!
//! 持有唯一的持久化资源，只暴露 get / set 能力

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{AppError, AppResult};

/// 键值存储
///
/// 职责：
/// - `get` 返回最后一次写入的值，不存在时返回 `None`
/// - `set` 在返回之前完成写入（没有批量、没有延迟）
/// - 不认识会话 / 进度
/// - 没有事务，也没有结构版本
pub trait KeyValueStore {
    fn get(&self, key: &str) -> AppResult<Option<JsonValue>>;

    fn set(&self, key: &str, value: JsonValue) -> AppResult<()>;

    /// 读取并反序列化为指定类型
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>>
    where
        Self: Sized,
    {
        match self.get(key)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| AppError::store_corrupted(key, e)),
            None => Ok(None),
        }
    }

    /// 序列化后写入
    fn set_as<T: Serialize>(&self, key: &str, value: &T) -> AppResult<()>
    where
        Self: Sized,
    {
        let json_value =
            serde_json::to_value(value).map_err(|e| AppError::store_write_failed(key, e))?;
        self.set(key, json_value)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> AppResult<Option<JsonValue>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: JsonValue) -> AppResult<()> {
        (**self).set(key, value)
    }
}

/// 进程内存储（测试与无持久化场景）
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, JsonValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> AppResult<Option<JsonValue>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: JsonValue) -> AppResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// 文件存储：每个键一个 JSON 文件
///
/// 先写临时文件再原子替换，进程在写入途中退出也不会留下半个文件。
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// 创建文件存储（目录不存在时自动创建）
    pub fn open(dir: impl AsRef<Path>) -> AppResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| AppError::store_write_failed(dir.display().to_string(), e))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> AppResult<Option<JsonValue>> {
        let path = self.path_for(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::store_read_failed(key, e)),
        };

        let value = serde_json::from_str(&content).map_err(|e| AppError::store_corrupted(key, e))?;
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: JsonValue) -> AppResult<()> {
        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");

        let content =
            serde_json::to_string_pretty(&value).map_err(|e| AppError::store_write_failed(key, e))?;
        fs::write(&tmp_path, content).map_err(|e| AppError::store_write_failed(key, e))?;
        fs::rename(&tmp_path, &path).map_err(|e| AppError::store_write_failed(key, e))?;

        debug!("已写入 {}", path.display());
        Ok(())
    }
}
