//! 结构化结果：按阶段区分的封闭变体集合
//!
//! 生成服务返回的是"任意 JSON"，这里逐字段校验后转换为强类型结构，
//! 所有可选字段都显式表示为 `Option`。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// 追问列表的最大长度
pub const MAX_FOLLOW_UP_QUESTIONS: usize = 5;

/// 结果声明自己满足的阶段契约
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaTag {
    /// 追问列表
    FollowUp = 1,
    /// 最终分析
    Analysis = 2,
    /// 反思对话（纯文本，不做结构化解析）
    Conversation = 3,
}

impl SchemaTag {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// 该阶段是否期待问题列表（只有这类阶段允许启发式兜底）
    pub fn expects_questions(self) -> bool {
        self == SchemaTag::FollowUp
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_label(raw).as_str() {
            "easy" | "low" | "simple" => Some(Difficulty::Easy),
            "medium" | "moderate" | "intermediate" => Some(Difficulty::Medium),
            "hard" | "high" | "difficult" | "challenging" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeline {
    Immediate,
    ShortTerm,
    LongTerm,
}

impl Timeline {
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_label(raw).as_str() {
            "immediate" | "now" | "today" | "this_week" => Some(Timeline::Immediate),
            "short_term" | "shortterm" | "weeks" | "this_month" => Some(Timeline::ShortTerm),
            "long_term" | "longterm" | "months" | "ongoing" => Some(Timeline::LongTerm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    AsNeeded,
}

impl Frequency {
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_label(raw).as_str() {
            "daily" | "every_day" | "each_day" => Some(Frequency::Daily),
            "weekly" | "every_week" | "once_a_week" => Some(Frequency::Weekly),
            "as_needed" | "when_needed" | "situational" => Some(Frequency::AsNeeded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpQuestions {
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehavioralPattern {
    pub name: String,
    pub description: Option<String>,
    pub evidence: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootCause {
    pub core_belief: Option<String>,
    pub origin: Option<String>,
    pub protective_function: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub timeline: Option<Timeline>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub title: String,
    pub instructions: Option<String>,
    pub frequency: Option<Frequency>,
}

/// 最终分析报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub summary: Option<String>,
    pub behavioral_patterns: Vec<BehavioralPattern>,
    pub root_cause: Option<RootCause>,
    pub action_items: Vec<ActionItem>,
    pub exercises: Vec<Exercise>,
    pub archetype: Option<String>,
}

/// 结构化结果（标签 = 阶段号）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuredResult {
    FollowUp(FollowUpQuestions),
    Analysis(AnalysisReport),
}

impl StructuredResult {
    /// 按期望的阶段契约校验并转换
    ///
    /// 内容不满足期望形状时返回 `None`；标签本身不参与判定。
    pub fn from_value(value: &JsonValue, expected: SchemaTag) -> Option<Self> {
        let obj = value.as_object()?;
        match expected {
            SchemaTag::FollowUp => FollowUpQuestions::from_object(obj).map(Self::FollowUp),
            SchemaTag::Analysis => AnalysisReport::from_object(obj).map(Self::Analysis),
            SchemaTag::Conversation => None,
        }
    }
}

/// 读取结果中声明的阶段标签
///
/// 支持数字或数字字符串；缺失或无法解析时返回 `None`。
pub fn read_tag(value: &JsonValue) -> Option<u32> {
    let raw = value.get("phase")?;
    match raw {
        JsonValue::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl FollowUpQuestions {
    fn from_object(obj: &Map<String, JsonValue>) -> Option<Self> {
        let items = array_field(obj, &["questions", "followUpQuestions", "follow_up_questions"])?;

        let questions: Vec<String> = items
            .iter()
            .filter_map(|item| match item {
                JsonValue::String(s) => Some(s.as_str()),
                JsonValue::Object(o) => ["question", "text"]
                    .iter()
                    .find_map(|k| o.get(*k).and_then(JsonValue::as_str)),
                _ => None,
            })
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(ensure_question_mark)
            .take(MAX_FOLLOW_UP_QUESTIONS)
            .collect();

        if questions.is_empty() {
            None
        } else {
            Some(Self { questions })
        }
    }
}

impl AnalysisReport {
    fn from_object(obj: &Map<String, JsonValue>) -> Option<Self> {
        let summary = string_field(obj, &["summary", "overview"]);

        let behavioral_patterns: Vec<BehavioralPattern> =
            array_field(obj, &["behavioral_patterns", "behavioralPatterns", "patterns"])
                .map(|items| items.iter().filter_map(BehavioralPattern::from_value).collect())
                .unwrap_or_default();

        let root_cause = object_field(obj, &["root_cause", "rootCause"]).and_then(RootCause::from_object);

        let action_items: Vec<ActionItem> =
            array_field(obj, &["action_items", "actionItems", "action_plan", "actionPlan"])
                .map(|items| {
                    items
                        .iter()
                        .enumerate()
                        .filter_map(|(i, v)| ActionItem::from_value(i, v))
                        .collect()
                })
                .unwrap_or_default();

        let exercises: Vec<Exercise> = array_field(obj, &["exercises", "practices"])
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| Exercise::from_value(i, v))
                    .collect()
            })
            .unwrap_or_default();

        let archetype = string_field(obj, &["archetype"]);

        // 至少要有一项可展示的内容
        if summary.is_none() && behavioral_patterns.is_empty() && action_items.is_empty() {
            return None;
        }

        Some(Self {
            summary,
            behavioral_patterns,
            root_cause,
            action_items,
            exercises,
            archetype,
        })
    }
}

impl BehavioralPattern {
    fn from_value(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(s) if !s.trim().is_empty() => Some(Self {
                name: s.trim().to_string(),
                description: None,
                evidence: None,
            }),
            JsonValue::Object(o) => Some(Self {
                name: string_field(o, &["name", "pattern", "title"])?,
                description: string_field(o, &["description"]),
                evidence: string_field(o, &["evidence", "example"]),
            }),
            _ => None,
        }
    }
}

impl RootCause {
    fn from_object(obj: &Map<String, JsonValue>) -> Option<Self> {
        let cause = Self {
            core_belief: string_field(obj, &["core_belief", "coreBelief", "belief"]),
            origin: string_field(obj, &["origin"]),
            protective_function: string_field(
                obj,
                &["protective_function", "protectiveFunction", "purpose"],
            ),
        };
        if cause.core_belief.is_none() && cause.origin.is_none() && cause.protective_function.is_none() {
            None
        } else {
            Some(cause)
        }
    }
}

impl ActionItem {
    fn from_value(index: usize, value: &JsonValue) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            id: string_field(obj, &["id"]).unwrap_or_else(|| format!("action-{}", index + 1)),
            title: string_field(obj, &["title", "action", "name"])?,
            description: string_field(obj, &["description", "details"]),
            difficulty: string_field(obj, &["difficulty"]).and_then(|s| Difficulty::parse(&s)),
            timeline: string_field(obj, &["timeline", "timeframe"]).and_then(|s| Timeline::parse(&s)),
        })
    }
}

impl Exercise {
    fn from_value(index: usize, value: &JsonValue) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            id: string_field(obj, &["id"]).unwrap_or_else(|| format!("exercise-{}", index + 1)),
            title: string_field(obj, &["title", "name"])?,
            instructions: string_field(obj, &["instructions", "description"]),
            frequency: string_field(obj, &["frequency"]).and_then(|s| Frequency::parse(&s)),
        })
    }
}

/// 保证问题以问号结尾
pub fn ensure_question_mark(text: &str) -> String {
    let trimmed = text
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '…'))
        .trim_end();
    if trimmed.ends_with('?') {
        trimmed.to_string()
    } else {
        format!("{}?", trimmed)
    }
}

fn normalize_label(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace(['-', ' '], "_")
}

fn string_field(obj: &Map<String, JsonValue>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|v| match v {
            JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn array_field<'a>(obj: &'a Map<String, JsonValue>, keys: &[&str]) -> Option<&'a Vec<JsonValue>> {
    keys.iter().find_map(|k| obj.get(*k).and_then(JsonValue::as_array))
}

fn object_field<'a>(
    obj: &'a Map<String, JsonValue>,
    keys: &[&str],
) -> Option<&'a Map<String, JsonValue>> {
    keys.iter().find_map(|k| obj.get(*k).and_then(JsonValue::as_object))
}
