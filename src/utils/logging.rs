/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use tracing::{info, warn};

use crate::config::Config;
use crate::models::Phase;

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 反思访谈启动");
    info!("🤖 模型: {}", config.llm_model_name);
    info!("💾 存储目录: {}", config.store_dir);
    info!("👤 调用方: {}", config.caller_id);
    info!(
        "⏱️ 生成超时: {}s | 限流: {} 次 / {}s",
        config.generation_timeout_secs,
        config.rate_limit_max_requests,
        config.rate_limit_window_secs
    );
    info!("{}", "=".repeat(60));
}

/// 记录会话启动信息
///
/// # 参数
/// - `session_id`: 会话 ID
/// - `question_count`: 本次会话抽中的核心问题数量
pub fn log_session_start(session_id: &str, question_count: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 反思会话开始 - {}", session_id);
    info!("📋 核心问题: {} 个", question_count);
    info!("{}", "=".repeat(60));
}

/// 记录阶段切换
pub fn log_phase_change(session_id: &str, from: &Phase, to: &Phase) {
    info!("[会话 {}] 阶段切换: {} → {}", short_id(session_id), from, to);
}

/// 记录生成失败
///
/// # 参数
/// - `retry_count`: 当前已失败次数
/// - `max_retries`: 失败次数上限
pub fn log_generation_failure(session_id: &str, reason: &str, retry_count: u32, max_retries: u32) {
    warn!("\n{}", "─".repeat(60));
    warn!(
        "[会话 {}] ❌ 分析生成失败 ({}/{}): {}",
        short_id(session_id),
        retry_count,
        max_retries,
        reason
    );
    warn!("{}", "─".repeat(60));
}

/// 记录分析完成
pub fn log_analysis_complete(session_id: &str, action_items: usize, exercises: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 [会话 {}] 分析完成", short_id(session_id));
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("✅ 行动项: {} | 练习: {}", action_items, exercises);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示和提示词摘录
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

fn short_id(session_id: &str) -> &str {
    session_id.get(..8).unwrap_or(session_id)
}
