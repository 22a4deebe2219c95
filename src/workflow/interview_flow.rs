//! 访谈流程 - 流程层
//!
//! 核心职责：定义"一次反思访谈"的完整状态流转
//!
//! 流程顺序：
//! 1. Intro → 抽题 → CoreQuestions
//! 2. 核心问题答完 → 生成追问 → FollowUp
//! 3. 追问答完 → 生成分析 → Analysis(Succeeded | Failed)
//! 4. Failed → 重试（有上限）或重新开始
//!
//! 每次状态变化都会立即写入键值存储，重新打开时从存储中恢复。

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clients::{ChatRole, ChatTurn, GenerationProfile, TextGenerator};
use crate::config::Config;
use crate::error::{AppError, AppResult, ConfigError, GenerationError, SessionError, StoreError};
use crate::infrastructure::KeyValueStore;
use crate::models::{
    AnalysisReport, AnalysisStatus, FailureCause, InterviewSession, LongTermContext, Phase,
    QuestionPool, SchemaTag, StructuredResult, MAX_RETRIES,
};
use crate::services::heuristics::fallback_questions;
use crate::services::{extract, prompt_builder, select_questions, ExtractionOutcome, HistoryStore};
use crate::utils::logging::{
    log_analysis_complete, log_generation_failure, log_phase_change, log_session_start,
};
use crate::workflow::pending::PendingGeneration;

/// 会话在键值存储中的键
pub const SESSION_KEY: &str = "reflection.session";

/// 反思对话随请求发送的最近轮次数
pub const MAX_REFLECTION_TURNS: usize = 10;

/// 流程参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowSettings {
    /// 追问与反思对话使用的生成参数
    pub conversation: GenerationProfile,
    /// 最终分析使用的生成参数
    pub analysis: GenerationProfile,
    /// 单次生成调用的超时
    pub timeout: Duration,
}

impl FlowSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            conversation: config.conversation_profile(),
            analysis: config.analysis_profile(),
            timeout: config.generation_timeout(),
        }
    }
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// 访谈流程
///
/// - 唯一持有会话状态的模块
/// - 决定何时生成追问、何时生成分析、何时进入错误状态
/// - 只依赖业务能力（services）和两个边界（生成服务、键值存储）
pub struct InterviewFlow<G, S> {
    generator: G,
    store: S,
    history: HistoryStore<S>,
    pool: QuestionPool,
    settings: FlowSettings,
    session: InterviewSession,
}

impl<G, S> InterviewFlow<G, S>
where
    G: TextGenerator,
    S: KeyValueStore + Clone,
{
    /// 打开流程：有已保存的会话就恢复，否则创建新会话
    ///
    /// 已保存的会话损坏时记录警告并重新开始，其他存储错误向上返回。
    pub fn open(
        generator: G,
        store: S,
        pool: QuestionPool,
        settings: FlowSettings,
    ) -> AppResult<Self> {
        let session = match store.get_as::<InterviewSession>(SESSION_KEY) {
            Ok(Some(session)) => {
                info!(
                    "📂 恢复已保存的会话 {} (阶段: {})",
                    session.id, session.phase
                );
                session
            }
            Ok(None) => InterviewSession::new(),
            Err(AppError::Store(err @ StoreError::Corrupted { .. })) => {
                warn!("⚠️ 已保存的会话无法解析，重新开始: {}", err);
                InterviewSession::new()
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            generator,
            history: HistoryStore::new(store.clone()),
            store,
            pool,
            settings,
            session,
        })
    }

    pub fn session(&self) -> &InterviewSession {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    pub fn analysis(&self) -> Option<&AnalysisReport> {
        self.session.analysis.as_ref()
    }

    pub fn history(&self) -> &HistoryStore<S> {
        &self.history
    }

    /// 当前等待回答的问题
    pub fn current_question(&self) -> Option<&str> {
        match self.session.phase {
            Phase::CoreQuestions => self
                .session
                .current_core_question()
                .map(|q| q.text.as_str()),
            Phase::FollowUp => self.session.current_follow_up(),
            _ => None,
        }
    }

    /// 开始访谈：为本次会话抽题
    pub fn start(&mut self) -> AppResult<()> {
        if self.session.phase != Phase::Intro {
            return Err(AppError::invalid_transition(self.session.phase, "start"));
        }

        let selected = select_questions(&self.pool);
        if selected.is_empty() {
            return Err(ConfigError::EmptyQuestionPool.into());
        }

        log_session_start(&self.session.id, selected.len());
        self.session.selected_questions = selected;
        self.session.core_index = 0;
        self.transition(Phase::CoreQuestions);
        self.persist()
    }

    /// 回答当前问题；空白回答等同于跳过
    pub async fn answer(&mut self, text: &str) -> AppResult<Phase> {
        self.advance(Some(text)).await
    }

    /// 跳过当前问题
    pub async fn skip(&mut self) -> AppResult<Phase> {
        self.advance(None).await
    }

    async fn advance(&mut self, text: Option<&str>) -> AppResult<Phase> {
        let answer = text.map(str::trim).unwrap_or_default().to_string();

        match self.session.phase {
            Phase::CoreQuestions => {
                let Some(question_id) = self.session.current_core_question().map(|q| q.id.clone())
                else {
                    return Err(AppError::invalid_transition(self.session.phase, "answer"));
                };

                if answer.is_empty() {
                    debug!("核心问题 {} 已跳过", question_id);
                }
                self.session.core_responses.insert(question_id, answer);
                self.session.core_index += 1;
                self.persist()?;

                if self.session.core_complete() {
                    self.generate_follow_ups().await?;
                }
            }
            Phase::FollowUp => {
                if self.session.follow_up_complete() {
                    return Err(AppError::invalid_transition(self.session.phase, "answer"));
                }

                let index = self.session.follow_up_index;
                self.session.follow_up_responses.insert(index, answer);
                self.session.follow_up_index += 1;
                self.persist()?;

                if self.session.follow_up_complete() {
                    self.run_analysis().await?;
                }
            }
            phase => return Err(AppError::invalid_transition(phase, "answer")),
        }

        Ok(self.session.phase)
    }

    /// 生成追问
    ///
    /// 不会阻塞访谈：调用失败或无法提取时使用通用兜底问题。
    async fn generate_follow_ups(&mut self) -> AppResult<()> {
        let history = self.long_term_context();
        let request = prompt_builder::follow_up_request(&self.session, &history);
        let pending = PendingGeneration::new(self.next_ticket(), request, self.settings.conversation);
        self.persist()?;

        info!("{} 💬 正在生成追问...", pending);

        let questions = match self.dispatch(&pending).await {
            Ok(raw) => match extract(&raw, SchemaTag::FollowUp) {
                ExtractionOutcome::Structured(StructuredResult::FollowUp(result)) => result.questions,
                ExtractionOutcome::Heuristic(questions) => questions,
                _ => fallback_questions(),
            },
            Err(e) => {
                warn!("{} ⚠️ 追问生成失败，使用通用问题: {}", pending, e);
                fallback_questions()
            }
        };

        info!("{} ✓ 得到 {} 个追问", pending, questions.len());
        self.session.follow_up_questions = questions;
        self.session.follow_up_index = 0;
        self.session.follow_up_responses.clear();
        self.transition(Phase::FollowUp);
        self.persist()
    }

    /// 发出分析请求前的状态准备，返回带票据的在途请求
    ///
    /// 与 [`Self::complete_analysis`] 配合使用时，宿主可以自行发出请求并在稍后应用结果。
    pub fn begin_analysis(&mut self) -> AppResult<PendingGeneration> {
        match self.session.phase {
            Phase::FollowUp if self.session.follow_up_complete() => {}
            Phase::Analysis(AnalysisStatus::Generating) => {}
            Phase::Analysis(AnalysisStatus::Failed) if self.session.can_retry() => {}
            Phase::Analysis(AnalysisStatus::Failed) | Phase::Error => {
                return Err(self.exhaust_retries());
            }
            phase => return Err(AppError::invalid_transition(phase, "begin_analysis")),
        }

        let history = self.long_term_context();
        let request = prompt_builder::analysis_request(&self.session, &history);
        let pending = PendingGeneration::new(self.next_ticket(), request, self.settings.analysis);

        self.transition(Phase::Analysis(AnalysisStatus::Generating));
        self.persist()?;

        info!("{} 🧠 正在生成分析...", pending);
        Ok(pending)
    }

    /// 发出生成调用，超时视为服务错误
    pub async fn dispatch(&self, pending: &PendingGeneration) -> Result<String, GenerationError> {
        let call = self
            .generator
            .generate(&pending.request, &pending.turns, pending.profile);

        match tokio::time::timeout(self.settings.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} ⏱️ 生成调用超时", pending);
                Err(GenerationError::service(format!(
                    "timed out after {}s",
                    self.settings.timeout.as_secs_f32()
                )))
            }
        }
    }

    /// 应用分析结果
    ///
    /// 票据与当前纪元不一致（期间发生过重新开始或新的请求）时结果被丢弃。
    pub fn complete_analysis(
        &mut self,
        ticket: u64,
        outcome: Result<String, GenerationError>,
    ) -> AppResult<Phase> {
        if ticket != self.session.request_epoch
            || self.session.phase != Phase::Analysis(AnalysisStatus::Generating)
        {
            warn!(
                "丢弃过期的分析响应 (票据 #{}，当前 #{}，阶段 {})",
                ticket, self.session.request_epoch, self.session.phase
            );
            return Ok(self.session.phase);
        }

        match outcome {
            Ok(raw) => match extract(&raw, SchemaTag::Analysis) {
                ExtractionOutcome::Structured(StructuredResult::Analysis(report)) => {
                    self.accept_analysis(report)?
                }
                _ => self.fail_analysis(FailureCause::Unparseable, "无法解析分析结果")?,
            },
            Err(e) => {
                let reason = e.to_string();
                self.fail_analysis(FailureCause::Generation(e.kind), &reason)?
            }
        }

        Ok(self.session.phase)
    }

    fn accept_analysis(&mut self, report: AnalysisReport) -> AppResult<()> {
        log_analysis_complete(
            &self.session.id,
            report.action_items.len(),
            report.exercises.len(),
        );

        if let Err(e) = self.history.record_analysis(&self.session.id, &report) {
            warn!("⚠️ 写入历史分析失败: {}", e);
        }

        self.session.analysis = Some(report);
        self.session.retry_count = 0;
        self.session.last_failure = None;
        self.transition(Phase::Analysis(AnalysisStatus::Succeeded));
        self.persist()
    }

    fn fail_analysis(&mut self, cause: FailureCause, reason: &str) -> AppResult<()> {
        self.session.retry_count = (self.session.retry_count + 1).min(MAX_RETRIES);
        self.session.last_failure = Some(cause);
        log_generation_failure(&self.session.id, reason, self.session.retry_count, MAX_RETRIES);

        self.transition(Phase::Analysis(AnalysisStatus::Failed));
        self.persist()
    }

    async fn run_analysis(&mut self) -> AppResult<()> {
        let pending = self.begin_analysis()?;
        let outcome = self.dispatch(&pending).await;
        self.complete_analysis(pending.ticket, outcome)?;
        Ok(())
    }

    /// 用同样的回答重新生成分析
    ///
    /// 重试次数用尽后进入 Error，只能重新开始。
    pub async fn retry(&mut self) -> AppResult<Phase> {
        match self.session.phase {
            Phase::Analysis(AnalysisStatus::Failed) | Phase::Error => {
                info!("🔄 重试分析 (已失败 {} 次)", self.session.retry_count);
                self.run_analysis().await?;
                Ok(self.session.phase)
            }
            phase => Err(AppError::invalid_transition(phase, "retry")),
        }
    }

    fn exhaust_retries(&mut self) -> AppError {
        let retry_count = self.session.retry_count;
        if self.session.phase != Phase::Error {
            self.transition(Phase::Error);
            if let Err(e) = self.persist() {
                warn!("⚠️ 保存错误状态失败: {}", e);
            }
        }
        SessionError::RetriesExhausted { retry_count }.into()
    }

    /// 重新开始：清空所有回答与结果
    pub fn restart(&mut self) -> AppResult<()> {
        let previous = self.session.phase;
        self.session = self.session.restarted();
        log_phase_change(&self.session.id, &previous, &self.session.phase);
        self.persist()
    }

    /// 继续被中断的生成（例如进程在等待响应时退出）
    ///
    /// 已经生成过的追问不会重新请求。
    pub async fn resume_pending(&mut self) -> AppResult<Phase> {
        match self.session.phase {
            Phase::CoreQuestions
                if self.session.core_complete() && !self.session.selected_questions.is_empty() =>
            {
                info!("▶️ 继续生成追问");
                self.generate_follow_ups().await?;
            }
            Phase::FollowUp if self.session.follow_up_complete() => {
                info!("▶️ 继续生成分析");
                self.run_analysis().await?;
            }
            Phase::Analysis(AnalysisStatus::Generating) => {
                info!("▶️ 重新发出中断的分析请求");
                self.run_analysis().await?;
            }
            phase => debug!("阶段 {} 没有中断的生成", phase),
        }

        Ok(self.session.phase)
    }

    /// 分析完成后的反思对话
    pub async fn reflect(&mut self, message: &str) -> AppResult<String> {
        if self.session.phase != Phase::Analysis(AnalysisStatus::Succeeded) {
            return Err(SessionError::AnalysisUnavailable.into());
        }
        let Some(report) = self.session.analysis.as_ref() else {
            return Err(SessionError::AnalysisUnavailable.into());
        };

        let message = message.trim();
        if message.is_empty() {
            return Err(SessionError::EmptyMessage.into());
        }

        let request = prompt_builder::conversation_request(&self.session, report);
        let mut pending = PendingGeneration::new(self.next_ticket(), request, self.settings.conversation);
        pending.turns = recent_turns(&self.session.conversation).to_vec();
        pending.turns.push(ChatTurn::user(message));

        let reply = self.dispatch(&pending).await?;

        self.session.conversation.push(ChatTurn::user(message));
        self.session.conversation.push(ChatTurn::assistant(reply.clone()));
        self.persist()?;

        debug!("{} 反思对话共 {} 轮", pending, self.session.conversation.len());
        Ok(reply)
    }

    fn next_ticket(&mut self) -> u64 {
        self.session.request_epoch += 1;
        self.session.request_epoch
    }

    fn long_term_context(&self) -> LongTermContext {
        self.history.long_term_context().unwrap_or_else(|e| {
            warn!("⚠️ 读取长期上下文失败，忽略历史: {}", e);
            LongTermContext::default()
        })
    }

    fn transition(&mut self, to: Phase) {
        log_phase_change(&self.session.id, &self.session.phase, &to);
        self.session.phase = to;
    }

    fn persist(&self) -> AppResult<()> {
        self.store.set_as(SESSION_KEY, &self.session)
    }
}

/// 最近的对话轮次，且总是从用户消息开始
fn recent_turns(conversation: &[ChatTurn]) -> &[ChatTurn] {
    let recent = &conversation[conversation.len().saturating_sub(MAX_REFLECTION_TURNS)..];
    let start = recent
        .iter()
        .position(|turn| turn.role == ChatRole::User)
        .unwrap_or(recent.len());
    &recent[start..]
}
