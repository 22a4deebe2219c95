use crate::models::question_pool::QuestionPool;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载题库
///
/// 文件格式：
///
/// ```toml
/// [[category]]
/// name = "avoidance"
/// variants = ["What do you keep putting off?", "..."]
/// ```
pub async fn load_toml_to_question_pool(toml_file_path: &Path) -> Result<QuestionPool> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取题库文件: {}", toml_file_path.display()))?;

    let pool: QuestionPool = toml::from_str(&content)
        .with_context(|| format!("无法解析题库文件: {}", toml_file_path.display()))?;

    Ok(pool)
}

/// 加载题库：指定了文件就读取文件，否则使用内置题库
///
/// 文件中没有任何可用问题时回退到内置题库。
pub async fn load_question_pool(path: Option<&str>) -> Result<QuestionPool> {
    let Some(path) = path else {
        tracing::info!("未指定题库文件，使用内置题库");
        return Ok(QuestionPool::builtin());
    };

    let pool = load_toml_to_question_pool(Path::new(path)).await?;
    if !pool.has_questions() {
        tracing::warn!("题库文件 {} 中没有可用问题，使用内置题库", path);
        return Ok(QuestionPool::builtin());
    }

    tracing::info!("成功加载题库: {} 个分类", pool.categories.len());
    Ok(pool)
}
