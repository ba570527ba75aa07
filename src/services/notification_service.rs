//! Background notification delivery.
//!
//! Request handlers and reconciliation never talk to mail or push providers directly.
//! They hand [`NotificationJob`]s to a [`Notifier`], and a single worker task drains
//! the queue and POSTs each job to the configured relay.
//!
//! Delivery is best effort: a full queue, a relay timeout or a non-2xx response is
//! logged and the job is dropped. Ledger state never depends on it.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::notification::{NewNotification, NotificationJob};

/// Jobs buffered before `enqueue` starts dropping.
pub const QUEUE_CAPACITY: usize = 1024;

/// Per-job relay timeout.
const RELAY_TIMEOUT: Duration = Duration::from_secs(5);

/// Cheap, cloneable handle to the notification queue.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: mpsc::Sender<NotificationJob>,
}

impl Notifier {
    /// Create a notifier and the receiving end for [`spawn_worker`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NotificationJob>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Queue a job without waiting.
    pub fn enqueue(&self, job: NotificationJob) {
        let channel = job.channel();
        match self.sender.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(channel, "notification queue full, dropping job");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(channel, "notification worker stopped, dropping job");
            }
        }
    }

    pub fn enqueue_all(&self, jobs: impl IntoIterator<Item = NotificationJob>) {
        for job in jobs {
            self.enqueue(job);
        }
    }
}

/// Start the worker that delivers queued jobs until every [`Notifier`] is dropped.
///
/// With no relay configured, jobs are only logged.
pub fn spawn_worker(
    mut receiver: mpsc::Receiver<NotificationJob>,
    relay_url: Option<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let client = match reqwest::Client::builder().timeout(RELAY_TIMEOUT).build() {
            Ok(client) => client,
            Err(e) => {
                tracing::error!("notification worker could not build HTTP client: {e}");
                return;
            }
        };

        tracing::info!(relay = relay_url.as_deref().unwrap_or("none"), "notification worker started");

        while let Some(job) = receiver.recv().await {
            match relay_url.as_deref() {
                Some(url) => deliver(&client, url, &job).await,
                None => tracing::info!(channel = job.channel(), ?job, "notification (no relay configured)"),
            }
        }

        tracing::info!("notification worker stopped");
    })
}

async fn deliver(client: &reqwest::Client, url: &str, job: &NotificationJob) {
    match client.post(url).json(job).send().await {
        Ok(response) if response.status().is_success() => {
            tracing::debug!(channel = job.channel(), "notification delivered");
        }
        Ok(response) => {
            tracing::warn!(
                channel = job.channel(),
                status = response.status().as_u16(),
                "notification relay rejected job"
            );
        }
        Err(e) => {
            tracing::error!(channel = job.channel(), "notification relay request failed: {e}");
        }
    }
}

/// Insert an in-app notification row.
pub async fn insert_notification(
    conn: &mut sqlx::PgConnection,
    notification: &NewNotification,
) -> Result<Uuid, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO notifications (user_id, summary, notification_text, actor_name)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(notification.user_id)
    .bind(&notification.summary)
    .bind(&notification.notification_text)
    .bind(&notification.actor_name)
    .fetch_one(conn)
    .await
}
