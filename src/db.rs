use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{StageError, TriggerError};
use crate::models::{Subscription, TrendPoint};

/// The subscription store capability. Reads are fatal when they fail
/// (nothing to evaluate); writes are recovered per call site.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn list_active(&self, limit: i64) -> Result<Vec<Subscription>, TriggerError>;
    async fn update_last_notified(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StageError>;
    async fn upsert_history(
        &self,
        keyword: &str,
        points: &[TrendPoint],
    ) -> Result<(), StageError>;
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PgStore {
    async fn list_active(&self, limit: i64) -> Result<Vec<Subscription>, TriggerError> {
        let rows = sqlx::query(
            "SELECT id, email, query, threshold, last_notified_at \
             FROM trendily.alerts \
             ORDER BY created_at DESC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TriggerError::Store(e.to_string()))?;

        let mut subs = Vec::new();
        for row in rows {
            subs.push(Subscription {
                id: row.get("id"),
                email: row.get("email"),
                keyword: row.get("query"),
                threshold: row.get("threshold"),
                last_notified_at: row.get("last_notified_at"),
            });
        }

        Ok(subs)
    }

    async fn update_last_notified(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StageError> {
        sqlx::query("UPDATE trendily.alerts SET last_notified_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| StageError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn upsert_history(
        &self,
        keyword: &str,
        points: &[TrendPoint],
    ) -> Result<(), StageError> {
        for point in points {
            sqlx::query(
                r#"
                INSERT INTO trendily.trend_history (id, query, period_label, interest, fetched_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (query, period_label) DO UPDATE
                SET interest = EXCLUDED.interest, fetched_at = EXCLUDED.fetched_at
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(keyword)
            .bind(&point.label)
            .bind(point.interest as i32)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| StageError::Persistence(e.to_string()))?;
        }
        Ok(())
    }
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let subscriptions = vec![
        ("nora.fall@example.com", "sourdough starter", 10),
        ("mei.tan@example.com", "sourdough starter", 25),
        ("ravi.kumar@example.com", "standing desk", 10),
        ("nora.fall@example.com", "matcha whisk", 5),
    ];

    for (email, query, threshold) in subscriptions {
        sqlx::query(
            r#"
            INSERT INTO trendily.alerts (id, email, query, threshold)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email, query) DO UPDATE
            SET threshold = EXCLUDED.threshold
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(query)
        .bind(threshold)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        email: String,
        query: String,
        threshold: Option<i32>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut upserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let outcome = sqlx::query(
            r#"
            INSERT INTO trendily.alerts (id, email, query, threshold)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email, query) DO UPDATE
            SET threshold = EXCLUDED.threshold
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.email)
        .bind(&row.query)
        .bind(row.threshold.unwrap_or(10))
        .execute(pool)
        .await?;

        if outcome.rows_affected() > 0 {
            upserted += 1;
        }
    }

    Ok(upserted)
}
