use std::path::PathBuf;
use std::time::Instant;

use spend_insights::api::routes::{AnalyticsResponse, RankingsResponse};
use spend_insights::types::GroupBy;

use crate::prefs::{self, DashboardPrefs};

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

/// Line editor for the group value; `Some` while the user is typing.
#[derive(Debug, Clone, Default)]
pub struct GroupValueInput {
    pub buffer: String,
}

pub struct AppState {
    pub status: ConnectionStatus,
    pub analytics: Option<AnalyticsResponse>,
    pub rankings: Option<RankingsResponse>,
    /// Server-side rejection of the current selection, shown in place of data.
    pub request_error: Option<String>,
    pub prefs: DashboardPrefs,
    pub prefs_path: PathBuf,
    pub input: Option<GroupValueInput>,
    pub last_refresh: Instant,
    pub base_url: String,
}

/// Body of a non-2xx API reply.
#[derive(serde::Deserialize)]
struct ApiError {
    error: String,
}

impl AppState {
    pub fn new(base_url: String, prefs: DashboardPrefs, prefs_path: PathBuf) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            analytics: None,
            rankings: None,
            request_error: None,
            prefs,
            prefs_path,
            input: None,
            last_refresh: Instant::now(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn analytics_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("userId", self.prefs.user_id.clone()),
            ("time", self.prefs.time.code().to_string()),
            ("mode", self.prefs.advice_mode.to_string()),
        ]
    }

    pub fn rankings_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("userId", self.prefs.user_id.clone()),
            ("category", self.prefs.category.as_str().to_string()),
            ("time", self.prefs.time.code().to_string()),
        ];
        if let Some(group) = self.prefs.group {
            params.push(("group", group.to_string()));
            if let Some(value) = self.prefs.group_value.as_deref() {
                params.push(("groupValue", value.to_string()));
            }
        }
        params
    }

    pub async fn refresh(&mut self, client: &reqwest::Client) {
        if self.prefs.user_id.is_empty() {
            self.request_error = Some("No user selected: set USER_ID or userId in preferences".into());
            return;
        }

        let analytics_url = format!("{}/api/analytics", self.base_url);
        let rankings_url = format!("{}/api/rankings", self.base_url);
        let (analytics_params, rankings_params) = (self.analytics_params(), self.rankings_params());

        let (analytics_res, rankings_res) = tokio::join!(
            client.get(&analytics_url).query(&analytics_params).send(),
            client.get(&rankings_url).query(&rankings_params).send(),
        );

        let (analytics_resp, rankings_resp) = match (analytics_res, rankings_res) {
            (Ok(a), Ok(r)) => (a, r),
            (Err(e), _) | (_, Err(e)) => {
                self.status = ConnectionStatus::Error(format!("{e}"));
                return;
            }
        };
        self.status = ConnectionStatus::Connected;
        self.last_refresh = Instant::now();
        self.request_error = None;

        if analytics_resp.status().is_success() {
            match analytics_resp.json::<AnalyticsResponse>().await {
                Ok(a) => self.analytics = Some(a),
                Err(e) => self.status = ConnectionStatus::Error(format!("parse error: {e}")),
            }
        } else {
            self.analytics = None;
            self.request_error = Some(error_text(analytics_resp).await);
        }

        if rankings_resp.status().is_success() {
            match rankings_resp.json::<RankingsResponse>().await {
                Ok(r) => self.rankings = Some(r),
                Err(e) => self.status = ConnectionStatus::Error(format!("parse error: {e}")),
            }
        } else {
            self.rankings = None;
            if self.request_error.is_none() {
                self.request_error = Some(error_text(rankings_resp).await);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Selection changes; each one is persisted immediately.
    // -----------------------------------------------------------------------

    pub fn cycle_time(&mut self) {
        self.prefs.time = self.prefs.time.next();
        self.persist();
    }

    pub fn cycle_category(&mut self) {
        self.prefs.category = self.prefs.category.next();
        self.persist();
    }

    /// None → District → … → Age → None. The value is cleared because it
    /// belonged to the previous dimension.
    pub fn cycle_group(&mut self) {
        self.prefs.group = match self.prefs.group {
            None => Some(GroupBy::ALL[0]),
            Some(GroupBy::Age) => None,
            Some(g) => Some(g.next()),
        };
        self.prefs.group_value = None;
        self.persist();
    }

    pub fn toggle_advice_mode(&mut self) {
        self.prefs.advice_mode = self.prefs.advice_mode.toggle();
        self.persist();
    }

    pub fn begin_group_value_input(&mut self) {
        if self.prefs.group.is_some() {
            let buffer = self.prefs.group_value.clone().unwrap_or_default();
            self.input = Some(GroupValueInput { buffer });
        }
    }

    /// Returns true when a new value was committed.
    pub fn commit_group_value_input(&mut self) -> bool {
        let Some(input) = self.input.take() else {
            return false;
        };
        let value = input.buffer.trim();
        self.prefs.group_value = (!value.is_empty()).then(|| value.to_string());
        self.persist();
        true
    }

    pub fn cancel_input(&mut self) {
        self.input = None;
    }

    fn persist(&mut self) {
        if let Err(e) = prefs::save(&self.prefs_path, &self.prefs) {
            self.request_error = Some(format!("could not save preferences: {e}"));
        }
    }
}

async fn error_text(resp: reqwest::Response) -> String {
    let status = resp.status();
    match resp.json::<ApiError>().await {
        Ok(body) => body.error,
        Err(_) => format!("HTTP {status}"),
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

pub fn format_money(v: f64) -> String {
    if v < 0.0 {
        format!("-${:.2}", -v)
    } else {
        format!("${v:.2}")
    }
}

pub fn format_percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// Horizontal bar of `width` cells, filled in proportion.
pub fn bar(proportion: f64, width: usize) -> String {
    let filled = (proportion.clamp(0.0, 1.0) * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
