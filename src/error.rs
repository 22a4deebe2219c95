use std::fmt;

use serde::{Deserialize, Serialize};

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 文本生成服务错误
    Generation(GenerationError),
    /// 持久化存储错误
    Store(StoreError),
    /// 会话状态错误
    Session(SessionError),
    /// 配置错误
    Config(ConfigError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Generation(e) => write!(f, "生成服务错误: {}", e),
            AppError::Store(e) => write!(f, "存储错误: {}", e),
            AppError::Session(e) => write!(f, "会话错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Generation(e) => Some(e),
            AppError::Store(e) => Some(e),
            AppError::Session(e) => Some(e),
            AppError::Config(e) => Some(e),
        }
    }
}

/// 生成失败的原因码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 配额耗尽 / 被限流
    QuotaExceeded,
    /// 服务端或传输层错误（含超时）
    ServiceError,
    /// 鉴权失败
    Unauthenticated,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::QuotaExceeded => "quota_exceeded",
            FailureKind::ServiceError => "service_error",
            FailureKind::Unauthenticated => "unauthenticated",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 文本生成服务的类型化失败
///
/// 生成客户端从不 panic，所有失败都以该类型返回给状态机。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}{}", detail_suffix(.detail))]
pub struct GenerationError {
    pub kind: FailureKind,
    pub detail: Option<String>,
}

impl GenerationError {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: Some(detail.into()),
        }
    }

    pub fn quota_exceeded(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::QuotaExceeded, detail)
    }

    pub fn service(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::ServiceError, detail)
    }

    pub fn unauthenticated(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Unauthenticated, detail)
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(": {}", d))
        .unwrap_or_default()
}

/// 持久化存储错误
#[derive(Debug)]
pub enum StoreError {
    /// 读取失败
    ReadFailed {
        key: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入失败
    WriteFailed {
        key: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 存储内容无法解析
    Corrupted {
        key: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::ReadFailed { key, source } => {
                write!(f, "读取键 {} 失败: {}", key, source)
            }
            StoreError::WriteFailed { key, source } => {
                write!(f, "写入键 {} 失败: {}", key, source)
            }
            StoreError::Corrupted { key, source } => {
                write!(f, "键 {} 的内容已损坏: {}", key, source)
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::ReadFailed { source, .. }
            | StoreError::WriteFailed { source, .. }
            | StoreError::Corrupted { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
        }
    }
}

/// 会话状态错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// 当前阶段不允许该操作
    InvalidTransition {
        phase: String,
        action: &'static str,
    },
    /// 重试次数已用尽，只能重新开始
    RetriesExhausted {
        retry_count: u32,
    },
    /// 会话尚未产生分析结果
    AnalysisUnavailable,
    /// 对话消息为空
    EmptyMessage,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidTransition { phase, action } => {
                write!(f, "阶段 {} 不允许操作 {}", phase, action)
            }
            SessionError::RetriesExhausted { retry_count } => {
                write!(f, "已重试 {} 次，请重新开始", retry_count)
            }
            SessionError::AnalysisUnavailable => write!(f, "分析结果尚不可用"),
            SessionError::EmptyMessage => write!(f, "消息不能为空"),
        }
    }
}

impl std::error::Error for SessionError {}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 题库为空
    EmptyQuestionPool,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyQuestionPool => write!(f, "题库中没有任何可用的问题"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 从常见错误类型转换 ==========

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        AppError::Generation(err)
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::Session(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建阶段转换错误
    pub fn invalid_transition(phase: impl fmt::Display, action: &'static str) -> Self {
        AppError::Session(SessionError::InvalidTransition {
            phase: phase.to_string(),
            action,
        })
    }

    /// 创建存储写入错误
    pub fn store_write_failed(
        key: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Store(StoreError::WriteFailed {
            key: key.into(),
            source: Box::new(source),
        })
    }

    /// 创建存储读取错误
    pub fn store_read_failed(
        key: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Store(StoreError::ReadFailed {
            key: key.into(),
            source: Box::new(source),
        })
    }

    /// 创建存储内容损坏错误
    pub fn store_corrupted(
        key: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Store(StoreError::Corrupted {
            key: key.into(),
            source: Box::new(source),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
