//! 长期上下文：历史日记与过往分析

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::result::AnalysisReport;

/// 一条自由文本日记
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// 一次被接受的分析结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub session_id: String,
    pub completed_at: DateTime<Utc>,
    pub report: AnalysisReport,
}

/// 提示词可引用的长期上下文（均按时间从旧到新排列）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LongTermContext {
    pub prior_analyses: Vec<AnalysisRecord>,
    pub journal_entries: Vec<JournalEntry>,
}

impl LongTermContext {
    pub fn is_empty(&self) -> bool {
        self.prior_analyses.is_empty() && self.journal_entries.is_empty()
    }
}
