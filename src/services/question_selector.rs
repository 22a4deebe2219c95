//! 题目抽取服务 - 业务能力层
//!
//! 每个分类独立、均匀地抽取一个变体。抽取结果写入会话后在会话内保持不变，
//! 新会话重新抽取。

use std::collections::HashSet;

use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::models::{QuestionPool, SelectedQuestion};

/// 使用线程随机数抽题
pub fn select_questions(pool: &QuestionPool) -> Vec<SelectedQuestion> {
    select_with(pool, &mut rand::rng())
}

/// 使用指定随机数源抽题
///
/// 空分类直接跳过，不影响其他分类。
/// 问题 ID 在一次抽取内唯一：重名分类依次加上 `-2`、`-3` 后缀，回答不会互相覆盖。
pub fn select_with<R: Rng + ?Sized>(pool: &QuestionPool, rng: &mut R) -> Vec<SelectedQuestion> {
    let mut used: HashSet<String> = HashSet::new();

    pool.categories
        .iter()
        .filter_map(|category| {
            let Some(text) = category.variants.choose(rng) else {
                debug!("分类 {} 没有可选问题，跳过", category.name);
                return None;
            };

            let mut id = category.name.clone();
            let mut suffix = 1;
            while used.contains(&id) {
                suffix += 1;
                id = format!("{}-{}", category.name, suffix);
            }
            if suffix > 1 {
                warn!("⚠️ 分类名 {} 重复，改用 ID {}", category.name, id);
            }
            used.insert(id.clone());

            Some(SelectedQuestion {
                id,
                category: category.name.clone(),
                text: text.clone(),
            })
        })
        .collect()
}
