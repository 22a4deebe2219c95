use std::time::Duration;

use crate::clients::GenerationProfile;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 键值存储目录
    pub store_dir: String,
    /// 题库 TOML 文件（为空时使用内置题库）
    pub question_pool_file: Option<String>,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 固定的生成温度
    pub llm_temperature: f32,
    /// 对话式回复（追问、反思对话）的输出上限
    pub conversation_max_tokens: u32,
    /// 最终分析的输出上限
    pub analysis_max_tokens: u32,
    /// 单次生成调用的超时（秒）
    pub generation_timeout_secs: u64,
    // --- 限流配置 ---
    /// 调用方标识（限流键），跨会话、跨重新开始保持不变
    pub caller_id: String,
    pub rate_limit_max_requests: usize,
    pub rate_limit_window_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose_logging: false,
            store_dir: ".reflection_store".to_string(),
            question_pool_file: None,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            llm_temperature: 0.7,
            conversation_max_tokens: 600,
            analysis_max_tokens: 2500,
            generation_timeout_secs: 60,
            caller_id: "local".to_string(),
            rate_limit_max_requests: 20,
            rate_limit_window_secs: 3600,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            store_dir: std::env::var("STORE_DIR").unwrap_or(default.store_dir),
            question_pool_file: std::env::var("QUESTION_POOL_FILE").ok().filter(|v| !v.trim().is_empty()),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            llm_temperature: std::env::var("LLM_TEMPERATURE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_temperature),
            conversation_max_tokens: std::env::var("CONVERSATION_MAX_TOKENS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.conversation_max_tokens),
            analysis_max_tokens: std::env::var("ANALYSIS_MAX_TOKENS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.analysis_max_tokens),
            generation_timeout_secs: std::env::var("GENERATION_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.generation_timeout_secs),
            caller_id: std::env::var("CALLER_ID").ok().filter(|v| !v.trim().is_empty()).unwrap_or(default.caller_id),
            rate_limit_max_requests: std::env::var("RATE_LIMIT_MAX_REQUESTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.rate_limit_max_requests),
            rate_limit_window_secs: std::env::var("RATE_LIMIT_WINDOW_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.rate_limit_window_secs),
        }
    }

    /// 对话式调用（追问生成、反思对话）使用的参数
    pub fn conversation_profile(&self) -> GenerationProfile {
        GenerationProfile {
            max_tokens: self.conversation_max_tokens,
            temperature: self.llm_temperature,
        }
    }

    /// 最终分析使用的参数
    pub fn analysis_profile(&self) -> GenerationProfile {
        GenerationProfile {
            max_tokens: self.analysis_max_tokens,
            temperature: self.llm_temperature,
        }
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}
