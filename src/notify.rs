// src/notify.rs
//! Downstream notification hook. After a successful feed run the pipeline
//! may post newly inserted articles to a webhook; the send is fire and
//! forget and the pipeline never waits on or inspects the result.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{debug, warn};

use crate::store::Article;

const WEBHOOK_ENV: &str = "ECO_PIPELINE_WEBHOOK_URL";

#[derive(Clone)]
pub struct WebhookNotifier {
    webhook_url: Option<String>,
    client: Client,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn from_env() -> Self {
        Self {
            webhook_url: std::env::var(WEBHOOK_ENV).ok(),
            client: Client::new(),
            timeout: Duration::from_secs(5),
        }
    }

    /// A notifier that never sends; handy for tests and local runs.
    pub fn disabled() -> Self {
        Self {
            webhook_url: None,
            client: Client::new(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    pub async fn send_new_articles(&self, articles: &[Article]) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            debug!("webhook disabled (no {WEBHOOK_ENV})");
            return Ok(());
        };
        if articles.is_empty() {
            return Ok(());
        }

        let lines: Vec<String> = articles
            .iter()
            .take(10)
            .map(|a| format!("• {} ({})", a.title, a.source_name))
            .collect();
        let text = format!(
            "{} new articles ingested:\n{}",
            articles.len(),
            lines.join("\n")
        );
        let body = serde_json::json!({ "text": text });

        self.client
            .post(url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .context("webhook post")?
            .error_for_status()
            .context("webhook non-2xx")?;
        Ok(())
    }

    /// Detached send; failures are logged and dropped.
    pub fn notify_detached(&self, articles: Vec<Article>) {
        if !self.is_enabled() || articles.is_empty() {
            return;
        }
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send_new_articles(&articles).await {
                warn!(error = ?e, "new-article notification failed");
            }
        });
    }
}
