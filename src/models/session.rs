//! 访谈会话状态

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clients::ChatTurn;
use crate::error::FailureKind;
use crate::models::result::AnalysisReport;

/// 最终分析允许的失败次数上限
pub const MAX_RETRIES: u32 = 3;

/// 分析阶段的内部状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Generating,
    Succeeded,
    Failed,
}

/// 最近一次分析失败的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// 生成服务调用失败（带原因码）
    Generation(FailureKind),
    /// 服务有响应，但内容无法解析
    Unparseable,
}

/// 访谈阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Intro,
    CoreQuestions,
    FollowUp,
    Analysis(AnalysisStatus),
    /// 重试用尽后的终止状态，只能通过重新开始离开
    Error,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Intro => "intro",
            Phase::CoreQuestions => "core_questions",
            Phase::FollowUp => "follow_up",
            Phase::Analysis(AnalysisStatus::Generating) => "analysis:generating",
            Phase::Analysis(AnalysisStatus::Succeeded) => "analysis:succeeded",
            Phase::Analysis(AnalysisStatus::Failed) => "analysis:failed",
            Phase::Error => "error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 本次会话抽中的一个核心问题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedQuestion {
    /// 问题 ID（即分类名）
    pub id: String,
    pub category: String,
    pub text: String,
}

/// 访谈会话
///
/// 回答表只会按键覆盖写入，除了显式重新开始之外从不清空，
/// 因此任何失败都不会丢失用户已经输入的内容。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub phase: Phase,
    /// 本次会话固定的问题选择
    #[serde(default)]
    pub selected_questions: Vec<SelectedQuestion>,
    #[serde(default)]
    pub core_index: usize,
    /// 问题 ID → 回答（跳过记为空字符串）
    #[serde(default)]
    pub core_responses: BTreeMap<String, String>,
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
    #[serde(default)]
    pub follow_up_index: usize,
    /// 追问序号 → 回答（跳过记为空字符串）
    #[serde(default)]
    pub follow_up_responses: BTreeMap<usize, String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub last_failure: Option<FailureCause>,
    /// 每发出一次生成请求递增，用于识别过期响应
    #[serde(default)]
    pub request_epoch: u64,
    #[serde(default)]
    pub analysis: Option<AnalysisReport>,
    /// 分析完成后的反思对话
    #[serde(default)]
    pub conversation: Vec<ChatTurn>,
}

impl InterviewSession {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            phase: Phase::Intro,
            selected_questions: Vec::new(),
            core_index: 0,
            core_responses: BTreeMap::new(),
            follow_up_questions: Vec::new(),
            follow_up_index: 0,
            follow_up_responses: BTreeMap::new(),
            retry_count: 0,
            last_failure: None,
            request_epoch: 0,
            analysis: None,
            conversation: Vec::new(),
        }
    }

    /// 重新开始：清空全部状态，但保留递增后的请求纪元
    ///
    /// 纪元不归零，旧会话发出的请求晚到时会被识别为过期。
    pub fn restarted(&self) -> Self {
        Self {
            request_epoch: self.request_epoch + 1,
            ..Self::new()
        }
    }

    pub fn current_core_question(&self) -> Option<&SelectedQuestion> {
        self.selected_questions.get(self.core_index)
    }

    pub fn current_follow_up(&self) -> Option<&str> {
        self.follow_up_questions
            .get(self.follow_up_index)
            .map(String::as_str)
    }

    pub fn core_complete(&self) -> bool {
        self.core_index >= self.selected_questions.len()
    }

    pub fn follow_up_complete(&self) -> bool {
        self.follow_up_index >= self.follow_up_questions.len()
    }

    /// 还能否重试最终分析
    pub fn can_retry(&self) -> bool {
        self.phase == Phase::Analysis(AnalysisStatus::Failed) && self.retry_count < MAX_RETRIES
    }

    /// 处于用户可见的失败状态
    pub fn is_failed(&self) -> bool {
        matches!(
            self.phase,
            Phase::Analysis(AnalysisStatus::Failed) | Phase::Error
        )
    }

    /// 按提问顺序返回 (追问, 回答)
    pub fn answered_follow_ups(&self) -> Vec<(&str, &str)> {
        self.follow_up_questions
            .iter()
            .enumerate()
            .filter_map(|(i, q)| {
                self.follow_up_responses
                    .get(&i)
                    .map(|a| (q.as_str(), a.as_str()))
            })
            .collect()
    }
}

impl Default for InterviewSession {
    fn default() -> Self {
        Self::new()
    }
}
