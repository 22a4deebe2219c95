//! 启发式问题提取
//!
//! 结构化解析全部失败时才会用到。纯函数，不依赖网络调用，可以单独测试。
//!
//! 提取顺序：
//! 1. 带编号且包含问号的行（`1. ...?`）
//! 2. 含疑问词并以问号结尾的句子片段
//! 3. 固定的通用兜底问题

use phf::phf_set;
use regex::Regex;
use tracing::debug;

use crate::models::result::ensure_question_mark;

/// 启发式提取返回的最大问题数
pub const MAX_HEURISTIC_QUESTIONS: usize = 5;

static INTERROGATIVES: phf::Set<&'static str> = phf_set! {
    "what", "how", "why", "when", "where", "which", "who",
};

const FALLBACK_QUESTIONS: [&str; 3] = [
    "What feeling comes up most strongly when you think about your answers so far?",
    "How do you usually protect yourself when that feeling shows up?",
    "What would change in your life if you no longer needed that protection?",
];

/// 通用兜底问题
pub fn fallback_questions() -> Vec<String> {
    FALLBACK_QUESTIONS.iter().map(|q| q.to_string()).collect()
}

/// 从自然语言中提取问题，永远不会返回空列表
pub fn heuristic_questions(text: &str) -> Vec<String> {
    let questions = extract_questions(text);
    if questions.is_empty() {
        debug!("启发式提取未找到问题，使用通用兜底问题");
        fallback_questions()
    } else {
        questions
    }
}

/// 依次尝试编号列表与疑问句片段，找不到时返回空列表
pub fn extract_questions(text: &str) -> Vec<String> {
    let numbered = numbered_questions(text);
    if !numbered.is_empty() {
        debug!("从编号列表中提取到 {} 个问题", numbered.len());
        return numbered;
    }

    let loose = interrogative_fragments(text);
    if !loose.is_empty() {
        debug!("从疑问句片段中提取到 {} 个问题", loose.len());
    }
    loose
}

/// 以"数字 + 点"开头并包含问号的行
pub fn numbered_questions(text: &str) -> Vec<String> {
    let Ok(re) = Regex::new(r"^[\s*#>-]*\d+[.)]\s*(.+)$") else {
        return Vec::new();
    };

    let candidates = text.lines().filter_map(|line| {
        let item = re.captures(line)?.get(1)?.as_str().replace("**", "");
        let end = item.rfind('?')?;
        Some(item[..=end].trim().to_string())
    });

    collect_capped(candidates)
}

/// 含疑问词并以问号结尾的句子片段
pub fn interrogative_fragments(text: &str) -> Vec<String> {
    let Ok(re) = Regex::new(r"[^.!?\n]*\?") else {
        return Vec::new();
    };

    let candidates = re
        .find_iter(text)
        .map(|m| {
            m.as_str()
                .trim()
                .trim_start_matches(|c: char| matches!(c, '"' | '\'' | '*' | '-' | '(' | '“'))
                .trim()
                .to_string()
        })
        .filter(|fragment| contains_interrogative(fragment));

    collect_capped(candidates)
}

fn contains_interrogative(fragment: &str) -> bool {
    fragment
        .split(|c: char| !c.is_alphabetic())
        .any(|word| INTERROGATIVES.contains(word.to_lowercase().as_str()))
}

fn collect_capped(candidates: impl Iterator<Item = String>) -> Vec<String> {
    let mut questions: Vec<String> = Vec::new();
    for candidate in candidates {
        if candidate.trim_end_matches('?').trim().is_empty() {
            continue;
        }
        let question = ensure_question_mark(&candidate);
        if !questions.contains(&question) {
            questions.push(question);
        }
        if questions.len() == MAX_HEURISTIC_QUESTIONS {
            break;
        }
    }
    questions
}
