//! 结构化响应提取 - 业务能力层
//!
//! 从生成服务返回的任意文本中恢复出结构化结果。策略严格按顺序执行，
//! 第一个成功的策略即为结果：
//!
//! 1. 去掉代码围栏后直接解析
//! 2. 在去围栏后的文本中取第一个 `{` 到最后一个 `}` 之间的内容解析
//! 3. 在原始文本上重新扫描（包括逐个 `{` 起点的流式解析）
//! 4. 启发式自然语言提取（仅限期待问题列表的阶段）

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::models::result::{read_tag, SchemaTag, StructuredResult};
use crate::services::heuristics;

/// 一次提取的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Structured(StructuredResult),
    Heuristic(Vec<String>),
    Failure,
}

/// 成功的结构化策略（仅用于日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Direct,
    BracketScan,
    Rescan,
}

/// 提取结构化结果
///
/// # 参数
/// - `raw`: 生成服务返回的原始文本（不可信）
/// - `expected`: 发出请求时期望的结果契约
pub fn extract(raw: &str, expected: SchemaTag) -> ExtractionOutcome {
    if let Some((strategy, result)) = extract_structured(raw, expected) {
        debug!("结构化提取成功，策略: {:?}", strategy);
        return ExtractionOutcome::Structured(result);
    }

    if expected.expects_questions() {
        warn!("结构化提取全部失败，改用启发式提取");
        return ExtractionOutcome::Heuristic(heuristics::heuristic_questions(raw));
    }

    warn!(
        "无法从响应中提取结构化结果 (契约: {:?}, 长度: {})",
        expected,
        raw.len()
    );
    ExtractionOutcome::Failure
}

fn extract_structured(raw: &str, expected: SchemaTag) -> Option<(Strategy, StructuredResult)> {
    let stripped = strip_code_fences(raw);

    if let Some(result) = parse_candidate(&stripped, expected) {
        return Some((Strategy::Direct, result));
    }

    if let Some(result) = bracket_slice(&stripped).and_then(|s| parse_candidate(s, expected)) {
        return Some((Strategy::BracketScan, result));
    }

    if let Some(result) = bracket_slice(raw).and_then(|s| parse_candidate(s, expected)) {
        return Some((Strategy::Rescan, result));
    }

    embedded_objects(raw)
        .find_map(|value| validate(value, expected))
        .map(|result| (Strategy::Rescan, result))
}

/// 去掉 ``` / ```json 之类的围栏行
pub fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// 第一个 `{` 到最后一个 `}` 之间的切片
pub fn bracket_slice(text: &str) -> Option<&str> {
    let open = text.find('{')?;
    let close = text.rfind('}')?;
    if close > open {
        Some(&text[open..=close])
    } else {
        None
    }
}

/// 从每个 `{` 起点尝试流式解析出一个完整对象
fn embedded_objects(text: &str) -> impl Iterator<Item = JsonValue> + '_ {
    text.match_indices('{').filter_map(move |(start, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<JsonValue>();
        match stream.next() {
            Some(Ok(value)) if value.is_object() => Some(value),
            _ => None,
        }
    })
}

fn parse_candidate(candidate: &str, expected: SchemaTag) -> Option<StructuredResult> {
    let value: JsonValue = serde_json::from_str(candidate.trim()).ok()?;
    validate(value, expected)
}

/// 形状校验与标签比对
///
/// 标签不一致只记录警告，内容仍然被采用。
fn validate(value: JsonValue, expected: SchemaTag) -> Option<StructuredResult> {
    let result = StructuredResult::from_value(&value, expected)?;

    match read_tag(&value) {
        Some(tag) if tag != expected.as_u32() => {
            warn!(
                "结果标签不一致: 期望 {}，实际 {}，仍然采用该结果",
                expected.as_u32(),
                tag
            );
        }
        None => debug!("结果中没有可解析的标签"),
        _ => {}
    }

    Some(result)
}
