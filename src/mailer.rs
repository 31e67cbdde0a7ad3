use std::time::Duration;

use async_trait::async_trait;

use crate::error::StageError;

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// The external mailer capability. One message per call; the dispatcher
/// owns pacing and ordering.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), StageError>;
}

const SEND_URL: &str = "https://api.resend.com/emails";

pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
}

impl ResendMailer {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(ResendMailer { client, api_key })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), StageError> {
        let payload = serde_json::json!({
            "from": message.from,
            "to": [message.to],
            "subject": message.subject,
            "html": message.html,
        });

        let response = self
            .client
            .post(SEND_URL)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| StageError::Dispatch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StageError::Dispatch(format!("Resend {status}: {body}")));
        }
        Ok(())
    }
}

/// The message used by the delivery-test paths. Always goes out from the
/// Resend sandbox sender; only the recipient varies.
pub fn delivery_test_message(to: &str) -> EmailMessage {
    EmailMessage {
        from: crate::config::DEFAULT_SENDER.to_string(),
        to: to.to_string(),
        subject: "Trendily delivery test".to_string(),
        html: concat!(
            "<div style=\"font-family:system-ui\">",
            "<h2>Trendily delivery test</h2>",
            "<p>If this email reached you, the mailer configuration works.</p>",
            "</div>"
        )
        .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_test_message_targets_the_requested_address() {
        let message = delivery_test_message("ops@example.com");
        assert_eq!(message.to, "ops@example.com");
        assert_eq!(message.from, crate::config::DEFAULT_SENDER);
        assert!(message.html.contains("delivery test"));
    }
}
