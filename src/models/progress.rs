//! 完成进度记录

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// 进度条目的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    Action,
    Exercise,
}

/// 已完成的行动项与练习
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(default)]
    pub completed_action_ids: BTreeSet<String>,
    #[serde(default)]
    pub completed_exercise_ids: BTreeSet<String>,
}

impl ProgressRecord {
    /// 翻转 `id` 的完成状态，返回翻转后是否处于完成状态
    pub fn toggle(&mut self, kind: ProgressKind, id: &str) -> bool {
        let set = self.set_mut(kind);
        if set.remove(id) {
            false
        } else {
            set.insert(id.to_string());
            true
        }
    }

    pub fn is_completed(&self, kind: ProgressKind, id: &str) -> bool {
        match kind {
            ProgressKind::Action => self.completed_action_ids.contains(id),
            ProgressKind::Exercise => self.completed_exercise_ids.contains(id),
        }
    }

    fn set_mut(&mut self, kind: ProgressKind) -> &mut BTreeSet<String> {
        match kind {
            ProgressKind::Action => &mut self.completed_action_ids,
            ProgressKind::Exercise => &mut self.completed_exercise_ids,
        }
    }
}
