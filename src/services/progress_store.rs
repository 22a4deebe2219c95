//! 进度存储适配器 - 业务能力层
//!
//! 每次切换都把完整记录写回存储后才返回，不做批量和防抖。

use tracing::debug;

use crate::error::AppResult;
use crate::infrastructure::KeyValueStore;
use crate::models::{ProgressKind, ProgressRecord};

pub const PROGRESS_KEY: &str = "reflection.progress";

pub struct ProgressStore<S> {
    store: S,
}

impl<S: KeyValueStore> ProgressStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// 最后一次写入的记录，不存在时为空记录
    pub fn read(&self) -> AppResult<ProgressRecord> {
        Ok(self
            .store
            .get_as::<ProgressRecord>(PROGRESS_KEY)?
            .unwrap_or_default())
    }

    /// 翻转完成状态并立即写回，返回写入后的记录
    pub fn toggle(&self, kind: ProgressKind, id: &str) -> AppResult<ProgressRecord> {
        let mut record = self.read()?;
        let completed = record.toggle(kind, id);
        self.store.set_as(PROGRESS_KEY, &record)?;

        debug!("进度已更新: {:?} {} → {}", kind, id, completed);
        Ok(record)
    }

    pub fn toggle_action(&self, id: &str) -> AppResult<ProgressRecord> {
        self.toggle(ProgressKind::Action, id)
    }

    pub fn toggle_exercise(&self, id: &str) -> AppResult<ProgressRecord> {
        self.toggle(ProgressKind::Exercise, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{FileStore, MemoryStore};
    use std::sync::Arc;

    #[test]
    fn test_read_before_any_write_is_empty() {
        let progress = ProgressStore::new(MemoryStore::new());
        assert_eq!(progress.read().unwrap(), ProgressRecord::default());
    }

    #[test]
    fn test_every_toggle_is_written_through() {
        let store = Arc::new(MemoryStore::new());
        let progress = ProgressStore::new(store.clone());

        progress.toggle_action("action-1").unwrap();
        let persisted: ProgressRecord = store.get_as(PROGRESS_KEY).unwrap().unwrap();
        assert!(persisted.completed_action_ids.contains("action-1"));

        progress.toggle_action("action-1").unwrap();
        let persisted: ProgressRecord = store.get_as(PROGRESS_KEY).unwrap().unwrap();
        assert_eq!(persisted, ProgressRecord::default());
    }

    #[test]
    fn test_toggles_survive_a_new_process() {
        let dir = tempfile::tempdir().unwrap();
        {
            let progress = ProgressStore::new(FileStore::open(dir.path()).unwrap());
            progress.toggle_exercise("exercise-2").unwrap();
            progress.toggle_action("action-3").unwrap();
        }

        let reopened = ProgressStore::new(FileStore::open(dir.path()).unwrap());
        let record = reopened.read().unwrap();
        assert!(record.is_completed(ProgressKind::Exercise, "exercise-2"));
        assert!(record.is_completed(ProgressKind::Action, "action-3"));
    }
}
