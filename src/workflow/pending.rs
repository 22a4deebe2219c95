//! 在途生成请求
//!
//! 封装"这是哪个会话的第几次请求"这一信息，响应回来时据此判断是否过期。

use std::fmt::Display;

use crate::clients::{ChatTurn, GenerationProfile, GenerationRequest};

/// 一次已发出、尚未应用结果的生成请求
#[derive(Debug, Clone)]
pub struct PendingGeneration {
    /// 发出请求时会话的请求纪元
    pub ticket: u64,

    pub request: GenerationRequest,

    /// 随请求发送的对话轮次
    pub turns: Vec<ChatTurn>,

    pub profile: GenerationProfile,
}

impl PendingGeneration {
    pub fn new(ticket: u64, request: GenerationRequest, profile: GenerationProfile) -> Self {
        let turns = vec![request.context_turn()];
        Self {
            ticket,
            request,
            turns,
            profile,
        }
    }
}

impl Display for PendingGeneration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[会话 {} 请求#{} 契约#{}]",
            self.request.session_id.get(..8).unwrap_or(&self.request.session_id),
            self.ticket,
            self.request.schema_tag.as_u32()
        )
    }
}
