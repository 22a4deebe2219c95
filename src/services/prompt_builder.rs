//! 提示词构建 - 业务能力层
//!
//! 根据会话状态和长期上下文生成 [`GenerationRequest`]。
//! 生成服务并不可靠，所以输出契约会在指令开头和结尾各强调一次。

use serde_json::{json, Map, Value as JsonValue};

use crate::clients::GenerationRequest;
use crate::models::{AnalysisReport, InterviewSession, LongTermContext, SchemaTag};
use crate::utils::truncate_text;

/// 历史上下文最多引用的条数
pub const MAX_CONTEXT_ITEMS: usize = 3;
/// 每条历史摘录的最大字符数
pub const CONTEXT_EXCERPT_CHARS: usize = 280;

const ROLE: &str = "You are a warm, perceptive guide for self-reflection. \
You help people notice the patterns behind their reactions without diagnosing or judging them.";

fn output_contract(tag: SchemaTag) -> String {
    format!(
        "OUTPUT CONTRACT: Your response must be ONLY a single well-formed JSON object. \
It must begin with {{ and end with }}. Do not add any text, greeting, explanation or \
markdown code fences before or after the object. The object must contain \"phase\": {}.",
        tag.as_u32()
    )
}

/// 追问生成请求
pub fn follow_up_request(session: &InterviewSession, history: &LongTermContext) -> GenerationRequest {
    let tag = SchemaTag::FollowUp;
    let instructions = format!(
        r#"{role}

{contract}

The person has just answered a set of core reflection questions. Read their answers and
write exactly 3 follow-up questions that go one layer deeper into what they revealed.
Each question must be open-ended, specific to their words, and end with a question mark.
If an answer was skipped, do not ask about it directly.

Required shape:
{{"phase": {phase}, "questions": ["...", "...", "..."]}}

Remember: respond with the JSON object only, starting with {{ and ending with }}."#,
        role = ROLE,
        contract = output_contract(tag),
        phase = tag.as_u32(),
    );

    let mut context = Map::new();
    context.insert("core_responses".to_string(), core_responses(session));
    add_history(&mut context, history);

    GenerationRequest {
        session_id: session.id.clone(),
        instructions,
        context: JsonValue::Object(context),
        schema_tag: tag,
    }
}

/// 最终分析请求
pub fn analysis_request(session: &InterviewSession, history: &LongTermContext) -> GenerationRequest {
    let tag = SchemaTag::Analysis;
    let instructions = format!(
        r#"{role}

{contract}

Using every answer the person gave (core questions and follow-ups) and any earlier
reflections provided, write an analysis of the pattern underneath their experience.

Required shape:
{{
  "phase": {phase},
  "summary": "2-3 sentences in plain, compassionate language",
  "archetype": "a short name for the protective pattern",
  "behavioral_patterns": [{{"name": "...", "description": "...", "evidence": "quote or paraphrase of their answer"}}],
  "root_cause": {{"core_belief": "...", "origin": "...", "protective_function": "..."}},
  "action_items": [{{"id": "action-1", "title": "...", "description": "...", "difficulty": "easy|medium|hard", "timeline": "immediate|short_term|long_term"}}],
  "exercises": [{{"id": "exercise-1", "title": "...", "instructions": "...", "frequency": "daily|weekly|as_needed"}}]
}}

Give 2-4 behavioral patterns, 3-5 action items and 2-3 exercises.
Use only the enum values listed above.

Remember: respond with the JSON object only, starting with {{ and ending with }}. No prose."#,
        role = ROLE,
        contract = output_contract(tag),
        phase = tag.as_u32(),
    );

    let mut context = Map::new();
    context.insert("core_responses".to_string(), core_responses(session));
    context.insert("follow_up_responses".to_string(), follow_up_responses(session));
    add_history(&mut context, history);

    GenerationRequest {
        session_id: session.id.clone(),
        instructions,
        context: JsonValue::Object(context),
        schema_tag: tag,
    }
}

/// 分析完成后的反思对话请求（纯文本，短回复）
pub fn conversation_request(session: &InterviewSession, report: &AnalysisReport) -> GenerationRequest {
    let instructions = format!(
        "{}\n\nThe person has received the analysis below and wants to talk it through. \
Reply conversationally in at most 3 short paragraphs. Stay grounded in their analysis, \
ask at most one gentle question, and never claim clinical authority.\n\nAnalysis:\n{}",
        ROLE,
        serde_json::to_string_pretty(report).unwrap_or_default()
    );

    GenerationRequest {
        session_id: session.id.clone(),
        instructions,
        context: JsonValue::Null,
        schema_tag: SchemaTag::Conversation,
    }
}

fn core_responses(session: &InterviewSession) -> JsonValue {
    let items: Vec<JsonValue> = session
        .selected_questions
        .iter()
        .filter_map(|q| {
            let answer = session.core_responses.get(&q.id)?;
            Some(answer_entry(&q.text, answer, Some(&q.category)))
        })
        .collect();
    JsonValue::Array(items)
}

fn follow_up_responses(session: &InterviewSession) -> JsonValue {
    let items: Vec<JsonValue> = session
        .answered_follow_ups()
        .into_iter()
        .map(|(question, answer)| answer_entry(question, answer, None))
        .collect();
    JsonValue::Array(items)
}

fn answer_entry(question: &str, answer: &str, category: Option<&str>) -> JsonValue {
    let mut entry = Map::new();
    if let Some(category) = category {
        entry.insert("category".to_string(), json!(category));
    }
    entry.insert("question".to_string(), json!(question));
    if answer.trim().is_empty() {
        entry.insert("skipped".to_string(), json!(true));
    } else {
        entry.insert("answer".to_string(), json!(answer));
    }
    JsonValue::Object(entry)
}

/// 附加长期上下文：只取最近几条，每条截断；没有就不出现
fn add_history(context: &mut Map<String, JsonValue>, history: &LongTermContext) {
    let journal: Vec<JsonValue> = most_recent(&history.journal_entries)
        .map(|entry| {
            json!({
                "date": entry.created_at.format("%Y-%m-%d").to_string(),
                "excerpt": truncate_text(&entry.text, CONTEXT_EXCERPT_CHARS),
            })
        })
        .collect();
    if !journal.is_empty() {
        context.insert("recent_journal".to_string(), JsonValue::Array(journal));
    }

    let analyses: Vec<JsonValue> = most_recent(&history.prior_analyses)
        .filter_map(|record| {
            let summary = record.report.summary.as_deref()?;
            let mut item = Map::new();
            item.insert(
                "date".to_string(),
                json!(record.completed_at.format("%Y-%m-%d").to_string()),
            );
            item.insert(
                "summary".to_string(),
                json!(truncate_text(summary, CONTEXT_EXCERPT_CHARS)),
            );
            if let Some(archetype) = &record.report.archetype {
                item.insert("archetype".to_string(), json!(archetype));
            }
            Some(JsonValue::Object(item))
        })
        .collect();
    if !analyses.is_empty() {
        context.insert("prior_analyses".to_string(), JsonValue::Array(analyses));
    }
}

fn most_recent<T>(items: &[T]) -> impl Iterator<Item = &T> {
    items[items.len().saturating_sub(MAX_CONTEXT_ITEMS)..].iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisRecord, JournalEntry, SelectedQuestion};

    fn answered_session() -> InterviewSession {
        let mut session = InterviewSession::new();
        session.selected_questions = vec![
            SelectedQuestion {
                id: "avoidance".to_string(),
                category: "avoidance".to_string(),
                text: "What do you keep putting off?".to_string(),
            },
            SelectedQuestion {
                id: "origin".to_string(),
                category: "origin".to_string(),
                text: "What rule did you learn early?".to_string(),
            },
        ];
        session
            .core_responses
            .insert("avoidance".to_string(), "Calling my father".to_string());
        session.core_responses.insert("origin".to_string(), String::new());
        session.core_index = 2;
        session
    }

    fn report(summary: &str) -> AnalysisReport {
        AnalysisReport {
            summary: Some(summary.to_string()),
            behavioral_patterns: vec![],
            root_cause: None,
            action_items: vec![],
            exercises: vec![],
            archetype: Some("The Keeper".to_string()),
        }
    }

    #[test]
    fn test_follow_up_request_states_contract_twice_and_tags_phase() {
        let request = follow_up_request(&answered_session(), &LongTermContext::default());

        assert_eq!(request.schema_tag, SchemaTag::FollowUp);
        assert!(request.instructions.contains("\"phase\": 1"));
        assert!(request.instructions.matches("starting with { and ending with }").count() >= 1);
        assert!(request.instructions.contains("must begin with { and end with }"));
    }

    #[test]
    fn test_skipped_answers_are_marked_and_missing_history_is_omitted() {
        let request = follow_up_request(&answered_session(), &LongTermContext::default());
        let core = request.context["core_responses"].as_array().unwrap();

        assert_eq!(core.len(), 2);
        assert_eq!(core[0]["answer"], "Calling my father");
        assert_eq!(core[1]["skipped"], true);
        assert!(request.context.get("recent_journal").is_none());
        assert!(request.context.get("prior_analyses").is_none());
    }

    #[test]
    fn test_history_is_bounded_and_truncated() {
        let history = LongTermContext {
            journal_entries: (0..6)
                .map(|i| JournalEntry::new(format!("entry {} {}", i, "x".repeat(500))))
                .collect(),
            prior_analyses: (0..5)
                .map(|i| AnalysisRecord {
                    session_id: format!("s{}", i),
                    completed_at: chrono::Utc::now(),
                    report: report(&format!("summary {}", i)),
                })
                .collect(),
        };

        let request = analysis_request(&answered_session(), &history);
        let journal = request.context["recent_journal"].as_array().unwrap();
        assert_eq!(journal.len(), MAX_CONTEXT_ITEMS);
        let first = journal[0]["excerpt"].as_str().unwrap();
        assert!(first.starts_with("entry 3"));
        assert_eq!(first.chars().count(), CONTEXT_EXCERPT_CHARS + 3);

        let analyses = request.context["prior_analyses"].as_array().unwrap();
        assert_eq!(analyses.len(), MAX_CONTEXT_ITEMS);
        assert_eq!(analyses[2]["summary"], "summary 4");
    }

    #[test]
    fn test_analysis_request_includes_follow_ups() {
        let mut session = answered_session();
        session.follow_up_questions = vec!["Why your father?".to_string(), "What then?".to_string()];
        session.follow_up_responses.insert(0, "He was distant".to_string());

        let request = analysis_request(&session, &LongTermContext::default());
        assert_eq!(request.schema_tag, SchemaTag::Analysis);
        let follow_ups = request.context["follow_up_responses"].as_array().unwrap();
        assert_eq!(follow_ups.len(), 1);
        assert_eq!(follow_ups[0]["question"], "Why your father?");
    }

    #[test]
    fn test_conversation_request_embeds_report() {
        let request = conversation_request(&answered_session(), &report("Busy to avoid grief"));
        assert_eq!(request.schema_tag, SchemaTag::Conversation);
        assert!(request.instructions.contains("Busy to avoid grief"));
    }
}
