//! Spending advice: cached answers first, a language model second.

pub mod client;
pub mod prompt;
pub mod store;

use std::time::Duration;

use tracing::{info, warn};

pub use client::AdviceClient;
pub use prompt::{build_prompt, AdvicePayload, Prompt};
pub use store::AdviceStore;

use crate::config::Config;
use crate::error::Result;

pub struct AdviceService {
    store: AdviceStore,
    /// None when no API key is configured; only cached advice is served.
    client: Option<AdviceClient>,
}

impl AdviceService {
    pub fn new(store: AdviceStore, client: Option<AdviceClient>) -> Self {
        Self { store, client }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client = match cfg.advice_api_key.as_deref() {
            Some(key) => Some(AdviceClient::new(
                &cfg.advice_api_url,
                key,
                &cfg.advice_model,
                Duration::from_secs(cfg.advice_timeout_secs),
            )?),
            None => {
                info!("ADVICE_API_KEY not set; serving cached advice only");
                None
            }
        };
        Ok(Self::new(AdviceStore::new(&cfg.advice_store_path), client))
    }

    /// Advice text for `payload`. Failures are logged and yield an empty
    /// string so the surrounding report still succeeds.
    pub async fn advise(&self, payload: &AdvicePayload) -> String {
        match self.try_advise(payload).await {
            Ok(text) => text,
            Err(e) => {
                warn!(user_id = %payload.user_id, mode = %payload.mode, "advice unavailable: {e}");
                String::new()
            }
        }
    }

    async fn try_advise(&self, payload: &AdvicePayload) -> Result<String> {
        if let Some(hit) = self.store.find(payload).await {
            return Ok(sanitize(&hit));
        }
        let Some(client) = &self.client else {
            return Ok(String::new());
        };

        let prompt = build_prompt(payload);
        let advice = sanitize(&client.generate(&prompt).await?);
        if let Err(e) = self.store.append(payload, &advice).await {
            warn!(path = %self.store.path().display(), "failed to persist advice: {e}");
        }
        Ok(advice)
    }
}

/// Normalise model output for display: U+FFFD becomes an apostrophe, trailing
/// blanks are removed from every line, runs of blank lines collapse to one.
pub fn sanitize(text: &str) -> String {
    let replaced = text.replace('\u{FFFD}', "'").replace("\r\n", "\n");

    let mut out = String::with_capacity(replaced.len());
    let mut newlines = 0usize;
    for line in replaced.split('\n') {
        let line = line.trim_end_matches([' ', '\t']);
        if out.is_empty() && line.is_empty() {
            continue;
        }
        if line.is_empty() {
            newlines += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if newlines >= 1 { "\n\n" } else { "\n" });
        }
        out.push_str(line);
        newlines = 0;
    }
    out.trim().to_string()
}
