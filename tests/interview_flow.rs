use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reflection_interview::clients::{ChatTurn, GenerationProfile, GenerationRequest, TextGenerator};
use reflection_interview::config::Config;
use reflection_interview::error::{AppError, ConfigError, FailureKind, GenerationError, SessionError};
use reflection_interview::infrastructure::{KeyValueStore, MemoryStore};
use reflection_interview::models::{
    AnalysisStatus, Category, FailureCause, Phase, QuestionPool, SchemaTag, MAX_RETRIES,
};
use reflection_interview::services::heuristics::fallback_questions;
use reflection_interview::workflow::{FlowSettings, InterviewFlow, SESSION_KEY};
use reflection_interview::App;

const FOLLOW_UPS: &str = "```json\n{\"phase\": 1, \"questions\": [\"What were you protecting\", \"Who taught you that?\"]}\n```";
const ANALYSIS: &str = r#"Here is the analysis:
{"phase": 2, "summary": "You stay busy so you never have to feel rejected.",
 "archetype": "The Tireless Helper",
 "behavioral_patterns": [{"name": "Over-functioning", "description": "Taking on more than your share"}],
 "action_items": [{"id": "a1", "title": "Say no once this week", "difficulty": "medium", "timeline": "immediate"}],
 "exercises": [{"id": "e1", "title": "Evening check-in", "instructions": "Write one feeling", "frequency": "daily"}]}
Take care!"#;

/// 按脚本依次返回响应的生成服务
#[derive(Clone, Default)]
struct ScriptedGenerator {
    responses: Arc<Mutex<VecDeque<Result<String, GenerationError>>>>,
    calls: Arc<Mutex<Vec<(SchemaTag, usize)>>>,
}

impl ScriptedGenerator {
    fn with(responses: Vec<Result<String, GenerationError>>) -> Self {
        let generator = Self::default();
        generator.responses.lock().unwrap().extend(responses);
        generator
    }

    fn push(&self, response: Result<String, GenerationError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    fn tags(&self) -> Vec<SchemaTag> {
        self.calls.lock().unwrap().iter().map(|(tag, _)| *tag).collect()
    }

    fn last_turn_count(&self) -> usize {
        self.calls.lock().unwrap().last().map(|(_, n)| *n).unwrap_or_default()
    }
}

impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
        turns: &[ChatTurn],
        _profile: GenerationProfile,
    ) -> Result<String, GenerationError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.schema_tag, turns.len()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::service("script exhausted")))
    }
}

/// 永远不按时返回的生成服务
struct StalledGenerator;

impl TextGenerator for StalledGenerator {
    async fn generate(
        &self,
        _request: &GenerationRequest,
        _turns: &[ChatTurn],
        _profile: GenerationProfile,
    ) -> Result<String, GenerationError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(ANALYSIS.to_string())
    }
}

fn pool() -> QuestionPool {
    QuestionPool::new(vec![
        Category {
            name: "avoidance".to_string(),
            variants: vec!["What do you keep putting off?".to_string()],
        },
        Category {
            name: "origin".to_string(),
            variants: vec!["What rule did you learn early?".to_string()],
        },
    ])
}

fn open(
    generator: ScriptedGenerator,
    store: &Arc<MemoryStore>,
) -> InterviewFlow<ScriptedGenerator, Arc<MemoryStore>> {
    InterviewFlow::open(generator, store.clone(), pool(), FlowSettings::default()).unwrap()
}

/// 开始访谈并答完全部核心问题
async fn answer_core(flow: &mut InterviewFlow<ScriptedGenerator, Arc<MemoryStore>>) {
    flow.start().unwrap();
    flow.answer("Calling my sister back").await.unwrap();
    let phase = flow.answer("Never ask for help").await.unwrap();
    assert_eq!(phase, Phase::FollowUp);
}

async fn answer_follow_ups(flow: &mut InterviewFlow<ScriptedGenerator, Arc<MemoryStore>>) -> Phase {
    let mut phase = flow.phase();
    while phase == Phase::FollowUp {
        phase = flow.answer("I am not sure").await.unwrap();
    }
    phase
}

#[tokio::test]
async fn test_full_interview_reaches_analysis() {
    let generator = ScriptedGenerator::with(vec![Ok(FOLLOW_UPS.to_string()), Ok(ANALYSIS.to_string())]);
    let store = Arc::new(MemoryStore::new());
    let mut flow = open(generator.clone(), &store);

    assert_eq!(flow.phase(), Phase::Intro);
    flow.start().unwrap();
    assert_eq!(flow.current_question(), Some("What do you keep putting off?"));

    flow.answer("Calling my sister back").await.unwrap();
    assert_eq!(flow.current_question(), Some("What rule did you learn early?"));
    flow.answer("  Never ask for help  ").await.unwrap();

    assert_eq!(flow.phase(), Phase::FollowUp);
    assert_eq!(
        flow.session().follow_up_questions,
        vec!["What were you protecting?", "Who taught you that?"]
    );
    assert_eq!(flow.session().core_responses["origin"], "Never ask for help");

    let phase = answer_follow_ups(&mut flow).await;
    assert_eq!(phase, Phase::Analysis(AnalysisStatus::Succeeded));

    let report = flow.analysis().unwrap();
    assert_eq!(report.archetype.as_deref(), Some("The Tireless Helper"));
    assert_eq!(report.action_items[0].id, "a1");
    assert_eq!(flow.session().retry_count, 0);
    assert_eq!(generator.tags(), vec![SchemaTag::FollowUp, SchemaTag::Analysis]);
    assert_eq!(flow.history().analyses().unwrap().len(), 1);
}

#[tokio::test]
async fn test_skipping_everything_still_advances() {
    let generator = ScriptedGenerator::with(vec![
        Ok("I'd rather not structure this. Take a breath.".to_string()),
        Ok(ANALYSIS.to_string()),
    ]);
    let store = Arc::new(MemoryStore::new());
    let mut flow = open(generator, &store);

    flow.start().unwrap();
    flow.skip().await.unwrap();
    flow.answer("   ").await.unwrap();

    assert_eq!(flow.phase(), Phase::FollowUp);
    assert!(flow.session().core_responses.values().all(String::is_empty));
    assert_eq!(flow.session().follow_up_questions, fallback_questions());

    let mut phase = flow.phase();
    while phase == Phase::FollowUp {
        phase = flow.skip().await.unwrap();
    }
    assert_eq!(phase, Phase::Analysis(AnalysisStatus::Succeeded));
}

#[tokio::test]
async fn test_duplicate_category_names_keep_every_answer() {
    let duplicated = QuestionPool::new(vec![
        Category {
            name: "dup".to_string(),
            variants: vec!["What do you avoid?".to_string()],
        },
        Category {
            name: "dup".to_string(),
            variants: vec!["What do you fear?".to_string()],
        },
    ]);
    let generator = ScriptedGenerator::with(vec![Ok(FOLLOW_UPS.to_string())]);
    let mut flow = InterviewFlow::open(
        generator,
        Arc::new(MemoryStore::new()),
        duplicated,
        FlowSettings::default(),
    )
    .unwrap();

    flow.start().unwrap();
    flow.answer("answer one").await.unwrap();
    flow.answer("answer two").await.unwrap();

    let responses = &flow.session().core_responses;
    assert_eq!(responses.len(), 2);
    assert_eq!(responses["dup"], "answer one");
    assert_eq!(responses["dup-2"], "answer two");
}

#[tokio::test]
async fn test_follow_up_failure_uses_generic_questions() {
    let generator = ScriptedGenerator::with(vec![Err(GenerationError::quota_exceeded("limit"))]);
    let store = Arc::new(MemoryStore::new());
    let mut flow = open(generator, &store);

    answer_core(&mut flow).await;
    assert_eq!(flow.session().follow_up_questions, fallback_questions());
}

#[tokio::test]
async fn test_three_failures_then_retry_moves_to_error() {
    let generator = ScriptedGenerator::with(vec![Ok(FOLLOW_UPS.to_string())]);
    let store = Arc::new(MemoryStore::new());
    let mut flow = open(generator.clone(), &store);

    answer_core(&mut flow).await;
    generator.push(Err(GenerationError::service("boom")));
    assert_eq!(
        answer_follow_ups(&mut flow).await,
        Phase::Analysis(AnalysisStatus::Failed)
    );
    assert_eq!(flow.session().retry_count, 1);

    for expected in 2..=MAX_RETRIES {
        generator.push(Err(GenerationError::service("boom")));
        let phase = flow.retry().await.unwrap();
        assert_eq!(phase, Phase::Analysis(AnalysisStatus::Failed));
        assert_eq!(flow.session().retry_count, expected);
    }

    assert_eq!(
        flow.session().last_failure,
        Some(FailureCause::Generation(FailureKind::ServiceError))
    );
    // 失败不丢失任何已输入的回答
    assert_eq!(flow.session().core_responses["avoidance"], "Calling my sister back");
    assert_eq!(flow.session().follow_up_responses.len(), 2);

    let err = flow.retry().await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Session(SessionError::RetriesExhausted { retry_count: 3 })
    ));
    assert_eq!(flow.phase(), Phase::Error);
    assert!(flow.retry().await.is_err());

    flow.restart().unwrap();
    assert_eq!(flow.phase(), Phase::Intro);
    assert_eq!(flow.session().retry_count, 0);
    assert!(flow.session().core_responses.is_empty());
    assert!(flow.session().follow_up_questions.is_empty());
}

#[tokio::test]
async fn test_quota_exceeded_is_reported_as_failure_cause() {
    let generator = ScriptedGenerator::with(vec![
        Ok(FOLLOW_UPS.to_string()),
        Err(GenerationError::quota_exceeded("rate limit reached")),
    ]);
    let store = Arc::new(MemoryStore::new());
    let mut flow = open(generator, &store);

    answer_core(&mut flow).await;
    answer_follow_ups(&mut flow).await;

    assert_eq!(flow.phase(), Phase::Analysis(AnalysisStatus::Failed));
    assert_eq!(
        flow.session().last_failure,
        Some(FailureCause::Generation(FailureKind::QuotaExceeded))
    );
}

#[tokio::test]
async fn test_unparseable_analysis_fails_then_retry_succeeds() {
    let generator = ScriptedGenerator::with(vec![
        Ok(FOLLOW_UPS.to_string()),
        Ok("I'm sorry, I can't produce that right now.".to_string()),
        Ok(ANALYSIS.to_string()),
    ]);
    let store = Arc::new(MemoryStore::new());
    let mut flow = open(generator, &store);

    answer_core(&mut flow).await;
    answer_follow_ups(&mut flow).await;
    assert_eq!(flow.session().last_failure, Some(FailureCause::Unparseable));

    let phase = flow.retry().await.unwrap();
    assert_eq!(phase, Phase::Analysis(AnalysisStatus::Succeeded));
    assert_eq!(flow.session().retry_count, 0);
    assert_eq!(flow.session().last_failure, None);
}

#[tokio::test]
async fn test_reopening_resumes_without_requesting_follow_ups_again() {
    let generator = ScriptedGenerator::with(vec![Ok(FOLLOW_UPS.to_string())]);
    let store = Arc::new(MemoryStore::new());

    let mut flow = open(generator.clone(), &store);
    answer_core(&mut flow).await;
    flow.answer("Being needed").await.unwrap();
    let session_id = flow.session().id.clone();
    drop(flow);

    let mut reopened = open(generator.clone(), &store);
    assert_eq!(reopened.session().id, session_id);
    assert_eq!(reopened.phase(), Phase::FollowUp);
    assert_eq!(reopened.current_question(), Some("Who taught you that?"));

    reopened.resume_pending().await.unwrap();
    assert_eq!(generator.tags(), vec![SchemaTag::FollowUp]);
}

#[tokio::test]
async fn test_interrupted_analysis_is_reissued_on_resume() {
    let generator = ScriptedGenerator::with(vec![
        Ok(FOLLOW_UPS.to_string()),
        Err(GenerationError::service("connection reset")),
    ]);
    let store = Arc::new(MemoryStore::new());

    let mut flow = open(generator.clone(), &store);
    answer_core(&mut flow).await;
    answer_follow_ups(&mut flow).await;
    let pending = flow.begin_analysis().unwrap();
    assert_eq!(pending.request.schema_tag, SchemaTag::Analysis);
    drop(flow);

    generator.push(Ok(ANALYSIS.to_string()));
    let mut reopened = open(generator, &store);
    assert_eq!(reopened.phase(), Phase::Analysis(AnalysisStatus::Generating));

    let phase = reopened.resume_pending().await.unwrap();
    assert_eq!(phase, Phase::Analysis(AnalysisStatus::Succeeded));
}

#[tokio::test]
async fn test_corrupted_saved_session_starts_fresh() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(SESSION_KEY, serde_json::json!({"phase": "somewhere"}))
        .unwrap();

    let mut flow = open(ScriptedGenerator::default(), &store);
    assert_eq!(flow.phase(), Phase::Intro);

    flow.start().unwrap();
    let saved: serde_json::Value = store.get(SESSION_KEY).unwrap().unwrap();
    assert_eq!(saved["phase"], "core_questions");
}

#[tokio::test]
async fn test_late_response_after_restart_is_discarded() {
    let generator = ScriptedGenerator::with(vec![
        Ok(FOLLOW_UPS.to_string()),
        Err(GenerationError::service("boom")),
    ]);
    let store = Arc::new(MemoryStore::new());
    let mut flow = open(generator, &store);

    answer_core(&mut flow).await;
    answer_follow_ups(&mut flow).await;

    let stale = flow.begin_analysis().unwrap();
    let current = flow.begin_analysis().unwrap();
    assert!(current.ticket > stale.ticket);

    let phase = flow.complete_analysis(stale.ticket, Ok(ANALYSIS.to_string())).unwrap();
    assert_eq!(phase, Phase::Analysis(AnalysisStatus::Generating));
    assert!(flow.analysis().is_none());

    flow.restart().unwrap();
    let phase = flow.complete_analysis(current.ticket, Ok(ANALYSIS.to_string())).unwrap();
    assert_eq!(phase, Phase::Intro);
    assert!(flow.analysis().is_none());
}

#[tokio::test]
async fn test_generation_timeout_is_a_service_error() {
    let store = Arc::new(MemoryStore::new());
    let settings = FlowSettings {
        timeout: Duration::from_millis(20),
        ..FlowSettings::default()
    };
    let mut flow = InterviewFlow::open(StalledGenerator, store, pool(), settings).unwrap();

    flow.start().unwrap();
    flow.answer("one").await.unwrap();
    flow.answer("two").await.unwrap();
    assert_eq!(flow.session().follow_up_questions, fallback_questions());

    let mut phase = flow.phase();
    while phase == Phase::FollowUp {
        phase = flow.skip().await.unwrap();
    }
    assert_eq!(phase, Phase::Analysis(AnalysisStatus::Failed));
    assert_eq!(
        flow.session().last_failure,
        Some(FailureCause::Generation(FailureKind::ServiceError))
    );
}

#[tokio::test]
async fn test_reflection_chat_after_analysis() {
    let generator = ScriptedGenerator::with(vec![Ok(FOLLOW_UPS.to_string())]);
    let store = Arc::new(MemoryStore::new());
    let mut flow = open(generator.clone(), &store);

    let err = flow.reflect("hello").await.unwrap_err();
    assert!(matches!(err, AppError::Session(SessionError::AnalysisUnavailable)));

    answer_core(&mut flow).await;
    generator.push(Ok(ANALYSIS.to_string()));
    answer_follow_ups(&mut flow).await;

    let err = flow.reflect("   ").await.unwrap_err();
    assert!(matches!(err, AppError::Session(SessionError::EmptyMessage)));

    generator.push(Ok("It sounds like rest feels unsafe.".to_string()));
    let reply = flow.reflect("Why do I feel guilty resting?").await.unwrap();
    assert_eq!(reply, "It sounds like rest feels unsafe.");
    assert_eq!(flow.session().conversation.len(), 2);

    generator.push(Ok("What would a small rest look like?".to_string()));
    flow.reflect("I don't know").await.unwrap();
    assert_eq!(generator.last_turn_count(), 3);
    assert_eq!(flow.session().conversation.len(), 4);

    // 调用失败时对话记录不变
    generator.push(Err(GenerationError::service("boom")));
    assert!(flow.reflect("Still there?").await.is_err());
    assert_eq!(flow.session().conversation.len(), 4);
}

#[tokio::test]
async fn test_invalid_operations_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let mut flow = open(ScriptedGenerator::default(), &store);

    assert!(matches!(
        flow.answer("too early").await.unwrap_err(),
        AppError::Session(SessionError::InvalidTransition { action: "answer", .. })
    ));
    assert!(flow.retry().await.is_err());

    flow.start().unwrap();
    assert!(flow.start().is_err());

    let mut empty = InterviewFlow::open(
        ScriptedGenerator::default(),
        Arc::new(MemoryStore::new()),
        QuestionPool::new(vec![]),
        FlowSettings::default(),
    )
    .unwrap();
    assert!(matches!(
        empty.start().unwrap_err(),
        AppError::Config(ConfigError::EmptyQuestionPool)
    ));
}

#[tokio::test]
async fn test_app_wires_progress_and_journal_to_the_same_store() {
    let store = Arc::new(MemoryStore::new());
    let generator = ScriptedGenerator::default();

    let app = App::with_parts(&Config::default(), generator.clone(), store.clone(), pool())
        .await
        .unwrap();
    assert_eq!(app.flow().phase(), Phase::Intro);

    let record = app.toggle_action("a1").unwrap();
    assert!(record.completed_action_ids.contains("a1"));
    app.toggle_exercise("e1").unwrap();
    app.toggle_action("a1").unwrap();
    app.add_journal_entry("Rested for ten minutes today").unwrap();

    let reopened = App::with_parts(&Config::default(), generator, store, pool())
        .await
        .unwrap();
    let progress = reopened.progress().unwrap();
    assert!(progress.completed_action_ids.is_empty());
    assert!(progress.completed_exercise_ids.contains("e1"));
    assert_eq!(reopened.history().journal_entries().unwrap().len(), 1);
}
