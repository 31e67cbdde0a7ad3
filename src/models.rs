use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorDetail;

/// One period of the interest series, chronological order, 0-100 intensity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub label: String,
    pub interest: i64,
}

/// Signals derived from one keyword's series for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalSet {
    pub pct_change: Option<i64>,
    pub average: i64,
    pub stability: i64,
}

#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: Uuid,
    pub email: String,
    pub keyword: String,
    pub threshold: i32,
    pub last_notified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutcomeStatus {
    #[serde(rename = "sent")]
    Sent,
    #[serde(rename = "skipped")]
    Skipped,
    #[serde(rename = "error")]
    Errored,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Sent => write!(f, "sent"),
            OutcomeStatus::Skipped => write!(f, "skipped"),
            OutcomeStatus::Errored => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoSignal,
    LowVolume,
    BelowThreshold,
    CooldownActive,
    RecipientRestricted,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SkipReason::NoSignal => "no_signal",
            SkipReason::LowVolume => "low_volume",
            SkipReason::BelowThreshold => "below_threshold",
            SkipReason::CooldownActive => "cooldown_active",
            SkipReason::RecipientRestricted => "recipient_restricted",
        };
        write!(f, "{label}")
    }
}

/// One subscription's fate for one run, in the trigger response's wire shape.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    #[serde(rename = "id")]
    pub subscription_id: Uuid,
    pub email: String,
    #[serde(rename = "query")]
    pub keyword: String,
    #[serde(rename = "pct")]
    pub pct_change: Option<i64>,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl DecisionOutcome {
    pub fn sent(sub: &Subscription, keyword: &str, pct_change: Option<i64>) -> Self {
        Self::new(sub, keyword, pct_change, OutcomeStatus::Sent)
    }

    pub fn skipped(
        sub: &Subscription,
        keyword: &str,
        pct_change: Option<i64>,
        reason: SkipReason,
    ) -> Self {
        let mut outcome = Self::new(sub, keyword, pct_change, OutcomeStatus::Skipped);
        outcome.reason = Some(reason);
        outcome
    }

    pub fn errored(
        sub: &Subscription,
        keyword: &str,
        pct_change: Option<i64>,
        error: ErrorDetail,
    ) -> Self {
        let mut outcome = Self::new(sub, keyword, pct_change, OutcomeStatus::Errored);
        outcome.error = Some(error);
        outcome
    }

    fn new(
        sub: &Subscription,
        keyword: &str,
        pct_change: Option<i64>,
        status: OutcomeStatus,
    ) -> Self {
        DecisionOutcome {
            subscription_id: sub.id,
            email: sub.email.clone(),
            keyword: keyword.to_string(),
            pct_change,
            status,
            reason: None,
            error: None,
        }
    }
}

/// Counters and outcomes threaded through the sweep and folded per group.
#[derive(Debug, Default)]
pub struct RunTally {
    pub sent: u32,
    pub attempts: u32,
    pub outcomes: Vec<DecisionOutcome>,
    pub warnings: Vec<ErrorDetail>,
}

impl RunTally {
    pub fn absorb(&mut self, other: RunTally) {
        self.sent += other.sent;
        self.attempts += other.attempts;
        self.outcomes.extend(other.outcomes);
        self.warnings.extend(other.warnings);
    }
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub forced: bool,
    pub sent: u32,
    pub attempts: u32,
    #[serde(rename = "details")]
    pub outcomes: Vec<DecisionOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ErrorDetail>,
}

impl RunReport {
    pub fn empty(forced: bool) -> Self {
        RunReport {
            forced,
            sent: 0,
            attempts: 0,
            outcomes: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn from_tally(forced: bool, tally: RunTally) -> Self {
        RunReport {
            forced,
            sent: tally.sent,
            attempts: tally.attempts,
            outcomes: tally.outcomes,
            warnings: tally.warnings,
        }
    }
}
