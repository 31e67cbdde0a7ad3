use std::time::Duration;

use chrono::Utc;

use crate::db::SubscriptionStore;
use crate::mailer::{EmailMessage, Mailer};
use crate::models::{DecisionOutcome, RunTally, SignalSet, SkipReason, Subscription};
use crate::signal;

/// Fixed-interval pacing between successful sends. Failed sends do not
/// consume the budget.
pub struct SendPacer {
    delay: Duration,
}

impl SendPacer {
    pub fn new(delay_ms: u64) -> Self {
        SendPacer {
            delay: Duration::from_millis(delay_ms),
        }
    }

    pub async fn settle(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

pub struct DispatchDeps<'a> {
    pub mailer: &'a dyn Mailer,
    pub store: &'a dyn SubscriptionStore,
    pub pacer: &'a SendPacer,
    pub from: &'a str,
    /// Restricted test mode: when set, the only deliverable address.
    pub test_recipient: Option<&'a str>,
}

/// Renders the notification for one recipient. Same inputs, same bytes.
pub fn render_email(
    from: &str,
    to: &str,
    keyword: &str,
    signals: &SignalSet,
    last_interest: Option<i64>,
    chart_url: &str,
) -> EmailMessage {
    let pct = signals.pct_change.unwrap_or(0);
    let score = signal::composite_score(signals);
    let last = last_interest
        .map(|v| v.to_string())
        .unwrap_or_else(|| "?".to_string());

    let subject = format!(
        "Trendily alert: \"{keyword}\" {pct:+}% week over week (score {score})"
    );
    let html = format!(
        concat!(
            "<div style=\"font-family:system-ui; line-height:1.55\">",
            "<h2>Rising trend: {keyword}</h2>",
            "<p><strong>{pct:+}%</strong> vs the previous week.</p>",
            "<p>Current interest: <strong>{last}</strong> (average {average}/100).</p>",
            "<p>Stability: {stability}% of weeks rising.</p>",
            "<p>Overall score: {score}</p>",
            "<p><a href=\"{chart_url}\">Interest over the last 12 months</a></p>",
            "<p style=\"margin-top:16px;color:#666\">- Trendily</p>",
            "</div>"
        ),
        keyword = keyword,
        pct = pct,
        last = last,
        average = signals.average,
        stability = signals.stability,
        score = score,
        chart_url = chart_url,
    );

    EmailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject,
        html,
    }
}

/// Sends to each candidate in the order the decisions were made, strictly
/// one at a time. `last_notified_at` is written only after a confirmed
/// send, and a write failure there never stops the loop.
pub async fn dispatch_candidates(
    deps: &DispatchDeps<'_>,
    keyword: &str,
    signals: &SignalSet,
    last_interest: Option<i64>,
    chart_url: &str,
    candidates: &[Subscription],
) -> RunTally {
    let mut tally = RunTally::default();

    for sub in candidates {
        if let Some(allowed) = deps.test_recipient {
            if !sub.email.eq_ignore_ascii_case(allowed) {
                tally.outcomes.push(DecisionOutcome::skipped(
                    sub,
                    keyword,
                    signals.pct_change,
                    SkipReason::RecipientRestricted,
                ));
                continue;
            }
        }

        tally.attempts += 1;
        let message = render_email(
            deps.from,
            &sub.email,
            keyword,
            signals,
            last_interest,
            chart_url,
        );

        match deps.mailer.send(&message).await {
            Ok(()) => {
                tally.sent += 1;
                tracing::debug!(subscription = %sub.id, to = %sub.email, %keyword, "alert sent");
                let mut outcome = DecisionOutcome::sent(sub, keyword, signals.pct_change);
                if let Err(err) = deps.store.update_last_notified(sub.id, Utc::now()).await {
                    tracing::warn!(subscription = %sub.id, error = %err, "last_notified_at not updated");
                    outcome.error = Some(err.detail());
                }
                tally.outcomes.push(outcome);
                deps.pacer.settle().await;
            }
            Err(err) => {
                tracing::warn!(subscription = %sub.id, to = %sub.email, error = %err, "alert send failed");
                tally.outcomes.push(DecisionOutcome::errored(
                    sub,
                    keyword,
                    signals.pct_change,
                    err.detail(),
                ));
            }
        }
    }

    tally
}
