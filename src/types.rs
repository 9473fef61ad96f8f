use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Query dimensions
// ---------------------------------------------------------------------------

/// Reporting window ending at the request's reference time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeWindow {
    #[serde(rename = "d")]
    Day,
    #[serde(rename = "w")]
    Week,
    #[serde(rename = "m")]
    Month,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 3] = [TimeWindow::Day, TimeWindow::Week, TimeWindow::Month];

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "d" => Some(TimeWindow::Day),
            "w" => Some(TimeWindow::Week),
            "m" => Some(TimeWindow::Month),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            TimeWindow::Day => "d",
            TimeWindow::Week => "w",
            TimeWindow::Month => "m",
        }
    }

    pub fn days(self) -> i64 {
        match self {
            TimeWindow::Day => 1,
            TimeWindow::Week => 7,
            TimeWindow::Month => 30,
        }
    }

    pub fn span_secs(self) -> i64 {
        self.days() * 86_400
    }

    pub fn next(self) -> Self {
        match self {
            TimeWindow::Day => TimeWindow::Week,
            TimeWindow::Week => TimeWindow::Month,
            TimeWindow::Month => TimeWindow::Day,
        }
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TimeWindow::Day => "daily",
            TimeWindow::Week => "weekly",
            TimeWindow::Month => "monthly",
        };
        write!(f, "{s}")
    }
}

/// Population dimension a ranking can be narrowed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupBy {
    District,
    City,
    State,
    Gender,
    Age,
}

impl GroupBy {
    pub const ALL: [GroupBy; 5] = [
        GroupBy::District,
        GroupBy::City,
        GroupBy::State,
        GroupBy::Gender,
        GroupBy::Age,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "district" => Some(GroupBy::District),
            "city" => Some(GroupBy::City),
            "state" => Some(GroupBy::State),
            "gender" => Some(GroupBy::Gender),
            "age" => Some(GroupBy::Age),
            _ => None,
        }
    }

    pub fn next(self) -> Self {
        match self {
            GroupBy::District => GroupBy::City,
            GroupBy::City => GroupBy::State,
            GroupBy::State => GroupBy::Gender,
            GroupBy::Gender => GroupBy::Age,
            GroupBy::Age => GroupBy::District,
        }
    }
}

impl std::fmt::Display for GroupBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GroupBy::District => "District",
            GroupBy::City => "City",
            GroupBy::State => "State",
            GroupBy::Gender => "Gender",
            GroupBy::Age => "Age",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdviceMode {
    #[default]
    Short,
    Detailed,
}

impl AdviceMode {
    /// Lenient parse: anything other than "detailed" is `Short`.
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(|p| p.trim().to_ascii_lowercase()) {
            Some(p) if p == "detailed" => AdviceMode::Detailed,
            _ => AdviceMode::Short,
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            AdviceMode::Short => AdviceMode::Detailed,
            AdviceMode::Detailed => AdviceMode::Short,
        }
    }
}

impl std::fmt::Display for AdviceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdviceMode::Short => write!(f, "short"),
            AdviceMode::Detailed => write!(f, "detailed"),
        }
    }
}

/// Spend categories present in the transaction dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendCategory {
    FoodDining,
    Travel,
    Entertainment,
    PersonalCare,
    Grocery,
    HealthFitness,
    KidsPets,
    Misc,
    GasTransport,
    Home,
    Shopping,
}

impl SpendCategory {
    pub const ALL: [SpendCategory; 11] = [
        SpendCategory::FoodDining,
        SpendCategory::Travel,
        SpendCategory::Entertainment,
        SpendCategory::PersonalCare,
        SpendCategory::Grocery,
        SpendCategory::HealthFitness,
        SpendCategory::KidsPets,
        SpendCategory::Misc,
        SpendCategory::GasTransport,
        SpendCategory::Home,
        SpendCategory::Shopping,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SpendCategory::FoodDining => "food_dining",
            SpendCategory::Travel => "travel",
            SpendCategory::Entertainment => "entertainment",
            SpendCategory::PersonalCare => "personal_care",
            SpendCategory::Grocery => "grocery",
            SpendCategory::HealthFitness => "health_fitness",
            SpendCategory::KidsPets => "kids_pets",
            SpendCategory::Misc => "misc",
            SpendCategory::GasTransport => "gas_transport",
            SpendCategory::Home => "home",
            SpendCategory::Shopping => "shopping",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl std::fmt::Display for SpendCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// Sign convention for `budget_delta = budget - total`: a non-negative delta
/// is money left over, a negative delta is overspend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    UnderBudget,
    OverBudget,
}

impl BudgetStatus {
    pub fn from_delta(delta: f64) -> Self {
        if delta >= 0.0 {
            BudgetStatus::UnderBudget
        } else {
            BudgetStatus::OverBudget
        }
    }

    pub fn headline(self) -> &'static str {
        match self {
            BudgetStatus::UnderBudget => "You saved money",
            BudgetStatus::OverBudget => "You overspent",
        }
    }
}

// ---------------------------------------------------------------------------
// Core records
// ---------------------------------------------------------------------------

/// One pie slice: a spend category with its share of a reference total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAmount {
    pub category: String,
    pub amount: f64,
    /// 0..1
    pub proportion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    pub name: String,
    pub rank: u32,
    pub metric_value: f64,
    #[serde(rename = "isUser")]
    pub is_subject: bool,
}

/// A displayed leaderboard line. `Gap` stands for ranks that were skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LeaderboardRow {
    Entry(RankedEntry),
    Gap,
}

impl LeaderboardRow {
    pub fn rank(&self) -> Option<u32> {
        match self {
            LeaderboardRow::Entry(e) => Some(e.rank),
            LeaderboardRow::Gap => None,
        }
    }
}
