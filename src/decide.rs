use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::models::{SignalSet, SkipReason, Subscription};

/// Groups subscriptions by tracked keyword so each keyword is fetched once
/// per run. Group order follows the first occurrence of the keyword and
/// members keep the store's return order.
pub fn group_by_keyword(subs: Vec<Subscription>) -> IndexMap<String, Vec<Subscription>> {
    let mut groups: IndexMap<String, Vec<Subscription>> = IndexMap::new();
    for sub in subs {
        groups.entry(sub.keyword.clone()).or_default().push(sub);
    }
    groups
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Send,
    Skip(SkipReason),
}

#[derive(Debug, Clone, Copy)]
pub struct Policy {
    pub cooldown_hours: i64,
    pub volume_floor: Option<i64>,
}

/// One decision per subscription, in input order. The group-level gates
/// (no derivable growth, volume floor) reject everyone at once; otherwise
/// each subscription is held against its own threshold and cooldown.
pub fn evaluate_group(
    signals: &SignalSet,
    subs: &[Subscription],
    policy: &Policy,
    forced: bool,
    now: DateTime<Utc>,
) -> Vec<Decision> {
    if !forced {
        if signals.pct_change.is_none() {
            return vec![Decision::Skip(SkipReason::NoSignal); subs.len()];
        }
        if let Some(floor) = policy.volume_floor {
            if signals.average < floor {
                return vec![Decision::Skip(SkipReason::LowVolume); subs.len()];
            }
        }
    }

    subs.iter()
        .map(|sub| decide_one(signals, sub, policy, forced, now))
        .collect()
}

fn decide_one(
    signals: &SignalSet,
    sub: &Subscription,
    policy: &Policy,
    forced: bool,
    now: DateTime<Utc>,
) -> Decision {
    if forced {
        return Decision::Send;
    }
    let pct = match signals.pct_change {
        Some(pct) => pct,
        None => return Decision::Skip(SkipReason::NoSignal),
    };
    if pct < i64::from(sub.threshold) {
        return Decision::Skip(SkipReason::BelowThreshold);
    }
    if !cooldown_elapsed(sub.last_notified_at, policy.cooldown_hours, now) {
        return Decision::Skip(SkipReason::CooldownActive);
    }
    Decision::Send
}

/// A never-notified subscription always passes.
pub fn cooldown_elapsed(
    last_notified_at: Option<DateTime<Utc>>,
    cooldown_hours: i64,
    now: DateTime<Utc>,
) -> bool {
    match last_notified_at {
        None => true,
        Some(last) => now.signed_duration_since(last).num_seconds() >= cooldown_hours * 3600,
    }
}
