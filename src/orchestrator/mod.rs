//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 把配置、存储、生成客户端和题库装配成一个可用的 [`App`]。
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator::App (装配与资源持有)
//!     ↓
//! workflow::InterviewFlow (单个会话的状态流转)
//!     ↓
//! services (能力层：抽题 / 提示词 / 提取 / 进度 / 历史)
//!     ↓
//! clients + infrastructure (生成服务、键值存储)
//! ```

pub mod app;

pub use app::App;
