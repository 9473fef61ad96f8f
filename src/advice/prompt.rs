use serde::{Deserialize, Serialize};

use crate::config::ADVICE_TOP_CATEGORIES;
use crate::types::{AdviceMode, CategoryAmount, TimeWindow};

/// What the advice is generated from. Also the cache key: two requests with
/// equal payloads share one stored answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvicePayload {
    pub mode: AdviceMode,
    pub user_id: String,
    pub time: TimeWindow,
    pub total: f64,
    pub budget: f64,
    /// `budget - total`
    pub budget_delta: f64,
    pub top_categories: Vec<CategoryAmount>,
}

impl AdvicePayload {
    /// Keeps at most [`ADVICE_TOP_CATEGORIES`] of `categories`, which are
    /// expected largest-first.
    pub fn new(
        mode: AdviceMode,
        user_id: &str,
        time: TimeWindow,
        total: f64,
        budget: f64,
        budget_delta: f64,
        categories: &[CategoryAmount],
    ) -> Self {
        Self {
            mode,
            user_id: user_id.to_string(),
            time,
            total,
            budget,
            budget_delta,
            top_categories: categories.iter().take(ADVICE_TOP_CATEGORIES).cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub mode: AdviceMode,
    pub text: String,
    pub max_tokens: u32,
}

const SHORT_INSTRUCTION: &str = "Write a short, practical advice in 2-4 sentences. \
No greetings. No bullet points. No emojis. \
Give 1-2 concrete actions. Output ONLY the advice text.";

const DETAILED_INSTRUCTION: &str = "Write a detailed spending analysis and guidance (not chatbotty).
Structure:
1) One-sentence diagnosis
2) Key observations (3-6 bullets max)
3) Specific adjustments by category (3-6 bullets max)
4) A simple plan for next week (3 steps)
No greetings. No emojis.
Output ONLY the text.";

pub fn build_prompt(payload: &AdvicePayload) -> Prompt {
    let (instruction, max_tokens) = match payload.mode {
        AdviceMode::Short => (SHORT_INSTRUCTION, 150),
        AdviceMode::Detailed => (DETAILED_INSTRUCTION, 900),
    };

    let categories =
        serde_json::to_string(&payload.top_categories).unwrap_or_else(|_| "[]".to_string());

    let text = format!(
        "You are a precise personal finance coach.\n\
         \n\
         Context:\n\
         - userId: {user}\n\
         - timeframe: {time}\n\
         - total spend: {total}\n\
         - budget: {budget}\n\
         - budgetDelta (budget - total): {delta}\n\
         - topCategories: {categories}\n\
         \n\
         {instruction}",
        user = payload.user_id,
        time = payload.time.code(),
        total = payload.total,
        budget = payload.budget,
        delta = payload.budget_delta,
    );

    Prompt { mode: payload.mode, text, max_tokens }
}
