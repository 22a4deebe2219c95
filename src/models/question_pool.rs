//! 题库：每个分类下是一组语义等价的问题变体

use serde::{Deserialize, Serialize};

/// 一个问题分类
///
/// 同一分类中的所有变体探查同一个分析维度，每次会话只会用到其中一个。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub variants: Vec<String>,
}

/// 题库（分类按定义顺序排列）
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuestionPool {
    #[serde(default, rename = "category")]
    pub categories: Vec<Category>,
}

impl QuestionPool {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// 至少存在一个可选变体
    pub fn has_questions(&self) -> bool {
        self.categories.iter().any(|c| !c.variants.is_empty())
    }

    /// 内置题库
    pub fn builtin() -> Self {
        let category = |name: &str, variants: &[&str]| Category {
            name: name.to_string(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
        };

        Self::new(vec![
            category(
                "recurring_pattern",
                &[
                    "What situation keeps showing up in your life, no matter how hard you try to avoid it?",
                    "Which frustrating experience seems to repeat itself across different relationships or jobs?",
                    "What do you notice yourself doing again and again, even when you promised yourself you wouldn't?",
                ],
            ),
            category(
                "emotional_trigger",
                &[
                    "What kind of comment or behavior from others gets under your skin faster than it should?",
                    "When did you last react far more strongly than the situation called for?",
                    "Which emotion do you find hardest to sit with when it shows up?",
                ],
            ),
            category(
                "avoidance",
                &[
                    "What conversation have you been putting off, and what do you fear would happen if you had it?",
                    "Which decision have you been postponing for longer than you'd like to admit?",
                    "What do you keep yourself busy to avoid thinking about?",
                ],
            ),
            category(
                "self_image",
                &[
                    "What is one thing you would never want other people to think about you?",
                    "Which quality do you criticize most quickly in other people?",
                    "How would you describe yourself on your worst day?",
                ],
            ),
            category(
                "origin",
                &[
                    "What rule about how to behave did you learn early in life that you still follow?",
                    "Which message from your childhood still echoes when things get hard?",
                    "What did you have to be in your family to feel safe or valued?",
                ],
            ),
        ])
    }
}
