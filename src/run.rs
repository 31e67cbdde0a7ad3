use std::sync::Arc;

use chrono::Utc;

use crate::chart;
use crate::config::Config;
use crate::db::SubscriptionStore;
use crate::decide::{self, Decision, Policy};
use crate::dispatch::{self, DispatchDeps, SendPacer};
use crate::error::{StageError, TriggerError};
use crate::mailer::Mailer;
use crate::models::{DecisionOutcome, RunReport, RunTally};
use crate::signal;
use crate::trends::TrendSource;

pub struct RunDeps {
    pub store: Arc<dyn SubscriptionStore>,
    pub trends: Arc<dyn TrendSource>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Config,
}

/// One alert sweep: load subscriptions, evaluate each keyword group,
/// dispatch what qualifies, fold the tally into a report. A keyword
/// group's fetch failure never aborts the sweep.
pub async fn execute(deps: &RunDeps, forced: bool) -> Result<RunReport, TriggerError> {
    let config = &deps.config;
    let subs = deps.store.list_active(config.subscription_limit).await?;
    if subs.is_empty() {
        tracing::info!(forced, "no active subscriptions, nothing to evaluate");
        return Ok(RunReport::empty(forced));
    }

    let groups = decide::group_by_keyword(subs);
    let policy = Policy {
        cooldown_hours: config.cooldown_hours,
        volume_floor: config.volume_floor,
    };
    let pacer = SendPacer::new(config.send_delay_ms);
    let mut tally = RunTally::default();

    tracing::info!(groups = groups.len(), forced, "starting alert sweep");

    for (keyword, members) in groups {
        let points = match deps.trends.fetch(&keyword, config.trend_geo.as_deref()).await {
            Ok(points) => points,
            Err(err) => {
                tracing::warn!(%keyword, error = %err, "trend fetch failed, skipping group");
                for sub in &members {
                    tally
                        .outcomes
                        .push(DecisionOutcome::errored(sub, &keyword, None, err.detail()));
                }
                continue;
            }
        };

        // Best effort: a history miss is a warning, not a reason to hold
        // anyone's notification.
        if let Err(err) = deps.store.upsert_history(&keyword, &points).await {
            tracing::warn!(%keyword, error = %err, "trend history not persisted");
            tally.warnings.push(
                StageError::Persistence(format!("history for \"{keyword}\": {err}")).detail(),
            );
        }

        let signals = signal::derive(&points);
        let decisions = decide::evaluate_group(&signals, &members, &policy, forced, Utc::now());

        let mut candidates = Vec::new();
        for (sub, decision) in members.iter().zip(decisions) {
            match decision {
                Decision::Send => candidates.push(sub.clone()),
                Decision::Skip(reason) => tally.outcomes.push(DecisionOutcome::skipped(
                    sub,
                    &keyword,
                    signals.pct_change,
                    reason,
                )),
            }
        }

        let dispatch_deps = DispatchDeps {
            mailer: deps.mailer.as_ref(),
            store: deps.store.as_ref(),
            pacer: &pacer,
            from: &config.email_from,
            test_recipient: config.test_recipient.as_deref(),
        };
        let group_tally = dispatch::dispatch_candidates(
            &dispatch_deps,
            &keyword,
            &signals,
            points.last().map(|p| p.interest),
            &chart::chart_url(&keyword, &points),
            &candidates,
        )
        .await;
        tally.absorb(group_tally);
    }

    tracing::info!(sent = tally.sent, attempts = tally.attempts, "alert sweep finished");
    Ok(RunReport::from_tally(forced, tally))
}
