//! 应用装配 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个库的入口，负责把配置变成可用的访谈流程。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：启动日志、打开存储、加载题库、创建生成客户端
//! 2. **资源管理**：持有存储句柄，流程、进度和历史共享同一个存储
//! 3. **会话恢复**：打开时自动恢复上次的会话，并继续被中断的生成

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::clients::{LlmClient, TextGenerator};
use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{FileStore, KeyValueStore};
use crate::models::{load_question_pool, JournalEntry, ProgressRecord, QuestionPool};
use crate::services::{HistoryStore, ProgressStore};
use crate::utils::logging::log_startup;
use crate::workflow::{FlowSettings, InterviewFlow};

/// 应用主结构
pub struct App<G = LlmClient, S = Arc<FileStore>> {
    flow: InterviewFlow<G, S>,
    progress: ProgressStore<S>,
}

impl App {
    /// 按配置初始化应用（文件存储 + 真实生成服务）
    pub async fn initialize(config: Config) -> Result<Self> {
        crate::logger::init(config.verbose_logging);
        log_startup(&config);

        let store = Arc::new(
            FileStore::open(&config.store_dir)
                .with_context(|| format!("无法打开存储目录: {}", config.store_dir))?,
        );

        let pool = load_question_pool(config.question_pool_file.as_deref()).await?;
        let generator = LlmClient::new(&config);

        Self::with_parts(&config, generator, store, pool).await
    }
}

impl<G, S> App<G, S>
where
    G: TextGenerator,
    S: KeyValueStore + Clone,
{
    /// 使用指定的生成服务与存储装配应用
    pub async fn with_parts(
        config: &Config,
        generator: G,
        store: S,
        pool: QuestionPool,
    ) -> Result<Self> {
        let mut flow = InterviewFlow::open(
            generator,
            store.clone(),
            pool,
            FlowSettings::from_config(config),
        )
        .context("无法打开访谈会话")?;

        let phase = flow
            .resume_pending()
            .await
            .context("无法继续中断的生成")?;
        info!("✓ 应用就绪，当前阶段: {}", phase);

        Ok(Self {
            flow,
            progress: ProgressStore::new(store),
        })
    }

    pub fn flow(&self) -> &InterviewFlow<G, S> {
        &self.flow
    }

    pub fn flow_mut(&mut self) -> &mut InterviewFlow<G, S> {
        &mut self.flow
    }

    pub fn history(&self) -> &HistoryStore<S> {
        self.flow.history()
    }

    pub fn progress(&self) -> AppResult<ProgressRecord> {
        self.progress.read()
    }

    pub fn toggle_action(&self, id: &str) -> AppResult<ProgressRecord> {
        self.progress.toggle_action(id)
    }

    pub fn toggle_exercise(&self, id: &str) -> AppResult<ProgressRecord> {
        self.progress.toggle_exercise(id)
    }

    pub fn add_journal_entry(&self, text: &str) -> AppResult<Option<JournalEntry>> {
        self.flow.history().add_journal_entry(text)
    }
}
