//! # Reflection Interview
//!
//! 一个引导式自我反思访谈的 Rust 库：抽题、追问、生成行为分析，并记录行动项进度。
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有持久化资源，只暴露 get / set 能力
//! - `KeyValueStore` - 存储边界；`FileStore` 落盘，`MemoryStore` 用于测试
//!
//! ### ② 客户端层（Clients）
//! - `clients/` - 外部生成服务的唯一出口
//! - `TextGenerator` - 生成边界；`LlmClient` 基于 async-openai 实现
//! - `RateLimitGate` - 按调用方的滑动窗口限流
//!
//! ### ③ 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，互不依赖
//! - 抽题、提示词构建、结构化提取（含启发式兜底）、进度与历史存储
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/` - 定义"一次访谈"的完整状态流转
//! - `InterviewFlow` - Intro → CoreQuestions → FollowUp → Analysis
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/app` - 按配置装配以上各层
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{ChatTurn, GenerationProfile, GenerationRequest, LlmClient, RateLimitGate, TextGenerator};
pub use config::Config;
pub use error::{AppError, AppResult, FailureKind, GenerationError, SessionError};
pub use infrastructure::{FileStore, KeyValueStore, MemoryStore};
pub use models::{AnalysisReport, AnalysisStatus, InterviewSession, Phase, QuestionPool};
pub use orchestrator::App;
pub use workflow::{FlowSettings, InterviewFlow, PendingGeneration};
