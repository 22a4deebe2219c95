//! 长期历史存储 - 业务能力层
//!
//! 保存日记条目和被接受的分析结果，供提示词引用。

use chrono::Utc;
use tracing::debug;

use crate::error::AppResult;
use crate::infrastructure::KeyValueStore;
use crate::models::{AnalysisRecord, AnalysisReport, JournalEntry, LongTermContext};

pub const JOURNAL_KEY: &str = "reflection.journal";
pub const ANALYSES_KEY: &str = "reflection.analyses";

/// 最多保留的历史分析条数
pub const MAX_STORED_ANALYSES: usize = 20;

pub struct HistoryStore<S> {
    store: S,
}

impl<S: KeyValueStore> HistoryStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn journal_entries(&self) -> AppResult<Vec<JournalEntry>> {
        Ok(self.store.get_as(JOURNAL_KEY)?.unwrap_or_default())
    }

    /// 追加一条日记；空白内容直接忽略
    pub fn add_journal_entry(&self, text: &str) -> AppResult<Option<JournalEntry>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let entry = JournalEntry::new(text);
        let mut entries = self.journal_entries()?;
        entries.push(entry.clone());
        self.store.set_as(JOURNAL_KEY, &entries)?;

        debug!("已保存日记，共 {} 条", entries.len());
        Ok(Some(entry))
    }

    pub fn analyses(&self) -> AppResult<Vec<AnalysisRecord>> {
        Ok(self.store.get_as(ANALYSES_KEY)?.unwrap_or_default())
    }

    /// 记录一次被接受的分析，只保留最近的若干条
    pub fn record_analysis(&self, session_id: &str, report: &AnalysisReport) -> AppResult<()> {
        let mut records = self.analyses()?;
        records.push(AnalysisRecord {
            session_id: session_id.to_string(),
            completed_at: Utc::now(),
            report: report.clone(),
        });
        let overflow = records.len().saturating_sub(MAX_STORED_ANALYSES);
        records.drain(..overflow);

        self.store.set_as(ANALYSES_KEY, &records)
    }

    pub fn long_term_context(&self) -> AppResult<LongTermContext> {
        Ok(LongTermContext {
            prior_analyses: self.analyses()?,
            journal_entries: self.journal_entries()?,
        })
    }
}
