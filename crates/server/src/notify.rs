//! Release notifications posted to a Slack-compatible webhook.
//!
//! The coordinator sends a message onto a buffered channel and returns
//! immediately; a background worker drains the channel and posts to the
//! webhook. Delivery failures are logged and never affect the upload
//! response.

use courier_core::config::NotifyConfig;
use time::OffsetDateTime;
use time::macros::format_description;
use tokio::sync::mpsc;

/// Capacity of the notification queue. When the queue is full, messages are
/// dropped rather than backpressuring the upload response.
const QUEUE_CAPACITY: usize = 64;

/// One published-release event.
#[derive(Debug, Clone)]
pub struct ReleaseNotification {
    pub app_name: String,
    pub channel: String,
    pub version: String,
    /// `(package extension, download link)` pairs.
    pub artifacts: Vec<(String, String)>,
    pub changelog: String,
}

/// Handle for queueing release notifications.
#[derive(Clone)]
pub struct Notifier {
    tx: Option<mpsc::Sender<ReleaseNotification>>,
}

impl Notifier {
    /// A notifier that drops every message. Used when notifications are
    /// disabled and in tests.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Spawn the webhook worker if notifications are configured.
    pub fn spawn(config: &NotifyConfig) -> Self {
        if !config.slack_enabled {
            return Self::disabled();
        }
        let Some(webhook_url) = config.slack_webhook_url.clone() else {
            tracing::warn!("slack_enabled is set but slack_webhook_url is missing, notifications disabled");
            return Self::disabled();
        };

        let (tx, mut rx) = mpsc::channel::<ReleaseNotification>(QUEUE_CAPACITY);
        tokio::spawn(async move {
            let client = reqwest::Client::new();
            while let Some(notification) = rx.recv().await {
                let body = serde_json::json!({ "text": format_message(&notification) });
                match client.post(&webhook_url).json(&body).send().await {
                    Ok(response) if response.status().is_success() => {
                        tracing::debug!(
                            app_name = %notification.app_name,
                            version = %notification.version,
                            "release notification delivered"
                        );
                    }
                    Ok(response) => {
                        tracing::warn!(
                            status = %response.status(),
                            "webhook rejected release notification"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to deliver release notification");
                    }
                }
            }
        });

        Self { tx: Some(tx) }
    }

    /// Queue a notification without waiting. Drops the message when the
    /// queue is full.
    pub fn notify(&self, notification: ReleaseNotification) {
        if let Some(tx) = &self.tx
            && tx.try_send(notification).is_err()
        {
            tracing::warn!("notification queue full, dropping release message");
        }
    }
}

fn format_message(notification: &ReleaseNotification) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let uploaded_at = OffsetDateTime::now_utc()
        .format(format)
        .unwrap_or_default();

    let artifacts = notification
        .artifacts
        .iter()
        .map(|(package, link)| {
            format!("🔗 Link {}: {}", package.trim_start_matches('.'), link)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "🎉 *Application Uploaded Successfully!* 🎉\n\
         📦 *App:* {}\n\
         🌐 *Channel:* {}\n\
         🔖 *Version:* {}\n\
         📅 *Uploaded At:* {}\n\
         🔗 *Artifacts:*\n{}\n\
         📋 *Changelog:*\n{}",
        notification.app_name,
        notification.channel,
        notification.version,
        uploaded_at,
        artifacts,
        notification.changelog,
    )
}
