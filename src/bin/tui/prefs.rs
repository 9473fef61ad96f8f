//! Dashboard preferences, persisted as JSON across restarts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use spend_insights::error::Result;
use spend_insights::types::{AdviceMode, GroupBy, SpendCategory, TimeWindow};

pub const PREFS_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardPrefs {
    pub version: u32,
    pub user_id: String,
    pub time: TimeWindow,
    pub category: SpendCategory,
    pub group: Option<GroupBy>,
    pub group_value: Option<String>,
    pub advice_mode: AdviceMode,
}

impl Default for DashboardPrefs {
    fn default() -> Self {
        Self {
            version: PREFS_VERSION,
            user_id: String::new(),
            time: TimeWindow::Month,
            category: SpendCategory::FoodDining,
            group: None,
            group_value: None,
            advice_mode: AdviceMode::Short,
        }
    }
}

/// `PREFS_PATH`, else `<config dir>/spend-insights/dashboard.json`.
pub fn default_path() -> PathBuf {
    if let Some(p) = std::env::var_os("PREFS_PATH") {
        return PathBuf::from(p);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spend-insights")
        .join("dashboard.json")
}

fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Upgrade any stored shape to the current one.
///
/// Version 0 is the unversioned camelCase object written by the web client
/// (`userId`/`id`, `time`, `category`, `group`, `groupValue`, `mode`). Fields
/// that do not parse keep their defaults.
pub fn migrate(value: Value) -> DashboardPrefs {
    let version = value.get("version").and_then(Value::as_u64).unwrap_or(0);
    if version >= u64::from(PREFS_VERSION) {
        return serde_json::from_value(value).unwrap_or_default();
    }

    let defaults = DashboardPrefs::default();
    DashboardPrefs {
        version: PREFS_VERSION,
        user_id: str_field(&value, &["userId", "id"]).unwrap_or_default().to_string(),
        time: str_field(&value, &["time"])
            .and_then(TimeWindow::from_code)
            .unwrap_or(defaults.time),
        category: str_field(&value, &["category"])
            .and_then(SpendCategory::from_name)
            .unwrap_or(defaults.category),
        group: str_field(&value, &["group"]).and_then(GroupBy::from_name),
        group_value: str_field(&value, &["groupValue"]).map(str::to_string),
        advice_mode: AdviceMode::from_param(str_field(&value, &["mode"])),
    }
}

/// Missing or unreadable files yield defaults.
pub fn load(path: &Path) -> DashboardPrefs {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
        .map(migrate)
        .unwrap_or_default()
}

pub fn save(path: &Path, prefs: &DashboardPrefs) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(prefs)?)?;
    Ok(())
}
