use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::audit::{Action, AuditEntry};
use crate::error::Result;

/// Document posted to the notification webhook after a mutation.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Notification {
    pub delivery_id: Uuid,
    pub action: Action,
    pub name: String,
    pub quantity: i64,
    pub condition: String,
    pub location: String,
    pub timestamp: String,
}

impl From<&AuditEntry> for Notification {
    fn from(entry: &AuditEntry) -> Self {
        Notification {
            delivery_id: Uuid::new_v4(),
            action: entry.action,
            name: entry.row.name.clone(),
            quantity: entry.row.quantity,
            condition: entry.row.condition.clone(),
            location: entry.row.location.clone(),
            timestamp: entry.timestamp().to_string(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Used when no webhook is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _notification: &Notification) -> Result<()> {
        Ok(())
    }
}

/// Fire-and-forget delivery on a background task. Failures are logged only:
/// the mutation has already been committed to the sheet.
pub fn spawn_notify(notifier: Arc<dyn Notifier>, notification: Notification) {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&notification).await {
            log::warn!(
                "notification {} for {} '{}' failed: {}",
                notification.delivery_id,
                notification.action,
                notification.name,
                e
            );
        }
    });
}

#[cfg(feature = "web")]
pub use webhook::WebhookNotifier;

#[cfg(feature = "web")]
mod webhook {
    use super::{Notification, Notifier};
    use crate::error::{InventoryError, Result};
    use async_trait::async_trait;
    use std::time::Duration;

    /// POSTs each notification as JSON, retrying with exponential backoff.
    pub struct WebhookNotifier {
        client: reqwest::Client,
        url: String,
        max_attempts: u32,
        base_delay: Duration,
    }

    impl WebhookNotifier {
        pub fn new(url: &str) -> Result<Self> {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .map_err(|e| InventoryError::Config(format!("failed to create HTTP client: {}", e)))?;
            Ok(WebhookNotifier {
                client,
                url: url.to_string(),
                max_attempts: 3,
                base_delay: Duration::from_secs(1),
            })
        }

        pub fn with_retry(mut self, max_attempts: u32, base_delay: Duration) -> Self {
            self.max_attempts = max_attempts.max(1);
            self.base_delay = base_delay;
            self
        }
    }

    #[async_trait]
    impl Notifier for WebhookNotifier {
        async fn notify(&self, notification: &Notification) -> Result<()> {
            let mut delay = self.base_delay;
            let mut last_error = String::new();

            for attempt in 1..=self.max_attempts {
                let result = self
                    .client
                    .post(&self.url)
                    .header("X-Delivery-ID", notification.delivery_id.to_string())
                    .json(notification)
                    .send()
                    .await;

                match result {
                    Ok(response) if response.status().is_success() => {
                        log::debug!(
                            "notification {} delivered on attempt {}",
                            notification.delivery_id,
                            attempt
                        );
                        return Ok(());
                    }
                    Ok(response) => {
                        last_error = format!("webhook answered {}", response.status());
                    }
                    Err(e) => {
                        last_error = e.to_string();
                    }
                }

                log::warn!(
                    "notification {} attempt {}/{} failed: {}",
                    notification.delivery_id,
                    attempt,
                    self.max_attempts,
                    last_error
                );
                if attempt < self.max_attempts {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }

            Err(InventoryError::Backend(last_error))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::audit::Action;
        use axum::http::{HeaderMap, StatusCode};
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use uuid::Uuid;

        fn notification() -> Notification {
            Notification {
                delivery_id: Uuid::new_v4(),
                action: Action::Transfer,
                name: "Sensor".into(),
                quantity: 2,
                condition: "Good".into(),
                location: "Field Station".into(),
                timestamp: "2024-01-15 10:00:00".into(),
            }
        }

        /// Local endpoint answering 500 to the first `failures` posts and 200
        /// after that. Returns its URL and the number of posts it has seen.
        async fn flaky_endpoint(failures: usize) -> (String, Arc<AtomicUsize>) {
            let hits = Arc::new(AtomicUsize::new(0));
            let counter = hits.clone();
            let app = axum::Router::new().route(
                "/hook",
                axum::routing::post(move |headers: HeaderMap| {
                    let counter = counter.clone();
                    async move {
                        assert!(headers.contains_key("x-delivery-id"));
                        if counter.fetch_add(1, Ordering::SeqCst) < failures {
                            StatusCode::INTERNAL_SERVER_ERROR
                        } else {
                            StatusCode::OK
                        }
                    }
                }),
            );
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            (format!("http://{}/hook", addr), hits)
        }

        #[tokio::test]
        async fn retries_until_the_webhook_accepts() {
            let (url, hits) = flaky_endpoint(1).await;
            let notifier = WebhookNotifier::new(&url)
                .unwrap()
                .with_retry(3, Duration::from_millis(1));

            notifier.notify(&notification()).await.unwrap();
            assert_eq!(hits.load(Ordering::SeqCst), 2);
        }

        #[tokio::test]
        async fn stops_after_max_attempts() {
            let (url, hits) = flaky_endpoint(usize::MAX).await;
            let notifier = WebhookNotifier::new(&url)
                .unwrap()
                .with_retry(3, Duration::from_millis(1));

            let err = notifier.notify(&notification()).await.unwrap_err();
            assert!(err.to_string().contains("500"));
            assert_eq!(hits.load(Ordering::SeqCst), 3);
        }

        #[tokio::test]
        async fn first_success_is_the_only_post() {
            let (url, hits) = flaky_endpoint(0).await;
            let notifier = WebhookNotifier::new(&url).unwrap();

            notifier.notify(&notification()).await.unwrap();
            assert_eq!(hits.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn unreachable_webhook_gives_up_after_the_last_attempt() {
            // Nothing listens on the local discard port.
            let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook")
                .unwrap()
                .with_retry(2, Duration::from_millis(1));
            let err = notifier.notify(&notification()).await.unwrap_err();
            assert!(matches!(err, InventoryError::Backend(_)));
        }
    }
}
