//! Best-effort push notifications for offline partners.
//!
//! Delivery failures are logged and swallowed; no calling operation depends
//! on a push going out.

use futures::future::BoxFuture;
use serde_json::{Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

const FCM_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";

/// Transport used to reach a user who is not realtime-connected.
pub trait PushSender: Send + Sync {
    /// Queue a notification for `user_id`. Must never fail the caller.
    fn send(
        &self,
        user_id: Uuid,
        title: String,
        body: String,
        metadata: Value,
    ) -> BoxFuture<'static, ()>;
}

/// FCM legacy HTTP sender, addressed per-user via topic subscriptions.
pub struct FcmPush {
    client: reqwest::Client,
    server_key: String,
}

impl FcmPush {
    /// Build a sender from the FCM server key.
    pub fn new(server_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            server_key,
        }
    }
}

impl PushSender for FcmPush {
    fn send(
        &self,
        user_id: Uuid,
        title: String,
        body: String,
        metadata: Value,
    ) -> BoxFuture<'static, ()> {
        let client = self.client.clone();
        let server_key = self.server_key.clone();
        Box::pin(async move {
            let payload = json!({
                "to": format!("/topics/user-{user_id}"),
                "notification": { "title": title, "body": body },
                "data": metadata,
            });

            let result = client
                .post(FCM_ENDPOINT)
                .header("Authorization", format!("key={server_key}"))
                .json(&payload)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    debug!(user_id = %user_id, "push notification delivered");
                }
                Ok(response) => {
                    warn!(user_id = %user_id, status = %response.status(), "push notification rejected");
                }
                Err(err) => {
                    warn!(user_id = %user_id, error = %err, "push notification failed");
                }
            }
        })
    }
}

/// Sender used when no FCM key is configured; logs and drops.
pub struct NoopPush;

impl PushSender for NoopPush {
    fn send(
        &self,
        user_id: Uuid,
        title: String,
        _body: String,
        _metadata: Value,
    ) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            debug!(user_id = %user_id, title = %title, "push delivery disabled, dropping notification");
        })
    }
}

/// Fire a notification in the background so the caller never awaits delivery.
pub fn notify_user(
    push: &std::sync::Arc<dyn PushSender>,
    user_id: Uuid,
    title: impl Into<String>,
    body: impl Into<String>,
    metadata: Value,
) {
    let fut = push.send(user_id, title.into(), body.into(), metadata);
    tokio::spawn(fut);
}
