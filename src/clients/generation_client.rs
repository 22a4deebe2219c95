//! 文本生成客户端
//!
//! 只负责"把提示词发给生成服务并拿回原始文本"，不关心流程、不做解析。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（自定义端点与模型）

use std::future::Future;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::clients::rate_gate::RateLimitGate;
use crate::config::Config;
use crate::error::GenerationError;
use crate::models::SchemaTag;

/// 对话角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// 一轮对话
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// 生成参数：温度固定，输出上限随阶段变化
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationProfile {
    pub max_tokens: u32,
    pub temperature: f32,
}

/// 一次生成请求
///
/// 每次调用时重新构建，调用结束后不保留。
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// 会话 ID（用于日志）
    pub session_id: String,
    /// 系统指令
    pub instructions: String,
    /// 已有回答与历史的结构化摘要
    pub context: JsonValue,
    /// 期望的结果契约
    pub schema_tag: SchemaTag,
}

impl GenerationRequest {
    /// 把上下文序列化成一轮用户消息
    pub fn context_turn(&self) -> ChatTurn {
        let context = serde_json::to_string_pretty(&self.context).unwrap_or_default();
        ChatTurn::user(format!("Here is everything I have shared so far:\n{}", context))
    }
}

/// 文本生成服务边界
///
/// 实现者不得 panic；任何传输或服务失败都以 [`GenerationError`] 返回。
pub trait TextGenerator {
    fn generate(
        &self,
        request: &GenerationRequest,
        turns: &[ChatTurn],
        profile: GenerationProfile,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send;
}

/// 基于 async-openai 的生成客户端
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model_name: String,
    /// 限流键：同一调用方的所有会话共享配额
    caller_id: String,
    gate: RateLimitGate,
}

impl LlmClient {
    /// 创建新的生成客户端
    pub fn new(config: &Config) -> Self {
        let gate = RateLimitGate::new(config.rate_limit_max_requests, config.rate_limit_window());
        Self::with_gate(config, gate)
    }

    /// 使用自定义限流闸门创建
    pub fn with_gate(config: &Config, gate: RateLimitGate) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            caller_id: config.caller_id.clone(),
            gate,
        }
    }

    fn build_messages(
        request: &GenerationRequest,
        turns: &[ChatTurn],
    ) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
        let mut messages = Vec::with_capacity(turns.len() + 1);

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(request.instructions.as_str())
            .build()?;
        messages.push(ChatCompletionRequestMessage::System(system_msg));

        for turn in turns {
            let message = match turn.role {
                ChatRole::User => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(turn.content.as_str())
                        .build()?,
                ),
                ChatRole::Assistant => ChatCompletionRequestMessage::Assistant(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(turn.content.as_str())
                        .build()?,
                ),
            };
            messages.push(message);
        }

        Ok(messages)
    }

    async fn send(
        &self,
        request: &GenerationRequest,
        turns: &[ChatTurn],
        profile: GenerationProfile,
    ) -> Result<String, OpenAIError> {
        let messages = Self::build_messages(request, turns)?;

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(profile.temperature)
            .max_tokens(profile.max_tokens)
            .build()?;

        let response = self.client.chat().create(chat_request).await?;

        Ok(response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default())
    }
}

impl TextGenerator for LlmClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
        turns: &[ChatTurn],
        profile: GenerationProfile,
    ) -> Result<String, GenerationError> {
        self.gate.check(&self.caller_id)?;

        debug!(
            "调用生成服务，模型: {}，契约: {:?}，轮次: {}，上限: {}",
            self.model_name,
            request.schema_tag,
            turns.len(),
            profile.max_tokens
        );

        let content = self.send(request, turns, profile).await.map_err(|e| {
            warn!("生成服务调用失败: {}", e);
            classify_openai_error(&e)
        })?;

        let content = content.trim();
        if content.is_empty() {
            warn!("生成服务返回内容为空");
            return Err(GenerationError::service("empty completion"));
        }

        debug!("生成服务调用成功，返回 {} 字符", content.chars().count());
        Ok(content.to_string())
    }
}

fn classify_openai_error(err: &OpenAIError) -> GenerationError {
    match err {
        OpenAIError::ApiError(api) => classify_api_failure(api.r#type.as_deref(), &api.message),
        other => GenerationError::service(other.to_string()),
    }
}

/// 根据服务端返回的错误类型和消息归类原因码
pub fn classify_api_failure(error_type: Option<&str>, message: &str) -> GenerationError {
    let haystack = format!("{} {}", error_type.unwrap_or_default(), message).to_lowercase();

    if ["insufficient_quota", "quota", "rate limit", "rate_limit", "too many requests"]
        .iter()
        .any(|needle| haystack.contains(needle))
    {
        GenerationError::quota_exceeded(message)
    } else if ["invalid_api_key", "unauthorized", "authentication", "permission", "api key"]
        .iter()
        .any(|needle| haystack.contains(needle))
    {
        GenerationError::unauthenticated(message)
    } else {
        GenerationError::service(message)
    }
}
