//! Canonical validation rules for [`SleepDay`] records.
//!
//! The engine runs every rule and collects every violation — no
//! short-circuiting — so a single quarantine entry is fully diagnostic.
//! Rules check canonical fields only; vendor overflow in `extra` is an
//! open container and is deliberately not validated.
//!
//! Three of the historical rules are enforced by the type system rather
//! than at runtime: `effective_date` is non-optional, onset/offset carry a
//! fixed UTC offset by construction, and `SleepSource` is a closed enum.
//! Their rule names (`required`, `timezone`, `known_source`) still appear
//! in quarantine entries — produced at the mapping boundary, where those
//! conditions are actually representable.
//!
//! Tolerances and the "today" boundary are configuration, not literals;
//! see [`ValidationConfig`].

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use model::SleepDay;

/// One failed rule, with enough context to diagnose the record without
/// re-running the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Canonical field the rule is about (`stage_sum` for the cross-field rule).
    pub field: String,
    /// Stable rule identifier (`range`, `non_negative`, `consistency`, ...).
    pub rule: String,
    /// Stable machine-readable reason (`sleep_duration_out_of_range`, ...).
    pub message: String,
    /// The offending value as reported.
    pub actual: Value,
}

impl Violation {
    fn new(field: &str, rule: &str, message: &str, actual: Value) -> Self {
        Self {
            field: field.to_string(),
            rule: rule.to_string(),
            message: message.to_string(),
            actual,
        }
    }
}

/// Knobs for the rule engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Upper bound for `total_sleep_minutes`. A night cannot exceed a day.
    #[serde(default = "ValidationConfig::default_max_daily_minutes")]
    pub max_daily_minutes: i64,
    /// Relative tolerance for the stage-sum consistency rule. Vendors round
    /// each stage independently, so the sum rarely matches exactly.
    #[serde(default = "ValidationConfig::default_stage_sum_tolerance")]
    pub stage_sum_tolerance: f64,
    /// Reference date for the future-date rule. `None` means the current
    /// date in UTC at validation time; tests and replays pin it.
    #[serde(default)]
    pub reference_date: Option<NaiveDate>,
}

impl ValidationConfig {
    fn default_max_daily_minutes() -> i64 {
        1440
    }

    fn default_stage_sum_tolerance() -> f64 {
        0.05
    }

    /// The date "today" resolves to for the future-date rule.
    pub fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Utc::now().date_naive())
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_daily_minutes: Self::default_max_daily_minutes(),
            stage_sum_tolerance: Self::default_stage_sum_tolerance(),
            reference_date: None,
        }
    }
}

const STAGE_FIELDS: &[(&str, fn(&SleepDay) -> Option<i64>)] = &[
    ("deep_sleep_minutes", |r| r.deep_sleep_minutes),
    ("light_sleep_minutes", |r| r.light_sleep_minutes),
    ("rem_sleep_minutes", |r| r.rem_sleep_minutes),
    ("awake_minutes", |r| r.awake_minutes),
];

/// Validate a canonical record before upsert.
///
/// Returns an empty vec if the record is valid; otherwise every violation,
/// in stable rule order.
pub fn validate(record: &SleepDay, config: &ValidationConfig) -> Vec<Violation> {
    let mut violations = Vec::new();

    // Total sleep duration must fit in one day.
    if let Some(total) = record.total_sleep_minutes {
        if !(0..=config.max_daily_minutes).contains(&total) {
            violations.push(Violation::new(
                "total_sleep_minutes",
                "range",
                "sleep_duration_out_of_range",
                json!(total),
            ));
        }
    }

    // Stage and awake durations cannot be negative.
    for (field, get) in STAGE_FIELDS {
        if let Some(value) = get(record) {
            if value < 0 {
                violations.push(Violation::new(
                    field,
                    "non_negative",
                    "negative_sleep_stage",
                    json!(value),
                ));
            }
        }
    }

    // When every stage is reported, their sum has to agree with the total
    // within the configured relative tolerance.
    let stages: Vec<i64> = STAGE_FIELDS.iter().filter_map(|(_, get)| get(record)).collect();
    if stages.len() == STAGE_FIELDS.len() {
        if let Some(total) = record.total_sleep_minutes {
            let stage_sum: i64 = stages.iter().sum();
            let drift = (stage_sum - total).abs() as f64;
            let allowed = config.stage_sum_tolerance * total.max(0) as f64;
            if drift > allowed {
                violations.push(Violation::new(
                    "stage_sum",
                    "consistency",
                    "stage_sum_out_of_tolerance",
                    json!({ "stage_sum": stage_sum, "total": total }),
                ));
            }
        }
    }

    // No sleep reported from the future.
    if record.effective_date > config.today() {
        violations.push(Violation::new(
            "effective_date",
            "no_future",
            "future_date",
            json!(record.effective_date.to_string()),
        ));
    }

    // Efficiency is a ratio.
    if let Some(efficiency) = record.sleep_efficiency {
        if !(0.0..=1.0).contains(&efficiency) {
            violations.push(Violation::new(
                "sleep_efficiency",
                "range",
                "efficiency_out_of_range",
                json!(efficiency),
            ));
        }
    }

    // The sleep window must run forward.
    if let (Some(onset), Some(offset)) = (record.sleep_onset, record.sleep_offset) {
        if onset >= offset {
            violations.push(Violation::new(
                "sleep_onset",
                "ordering",
                "bedtime_order_invalid",
                json!({ "onset": onset.to_rfc3339(), "offset": offset.to_rfc3339() }),
            ));
        }
    }

    violations
}
