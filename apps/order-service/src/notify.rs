//! # Post-Commit Notifier
//!
//! Delivers invoice emails after an order commits, off the request path.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Post-Commit Notification                             │
//! │                                                                         │
//! │  OrderService::generate_invoice                                         │
//! │       │  commit ✓                                                       │
//! │       ▼                                                                 │
//! │  NotifierHandle::notify(notice) ── try_send, never waits                │
//! │       │                                  │                              │
//! │       │                                  └─ queue full → dropped, warn  │
//! │       ▼                                                                 │
//! │  mpsc queue (NOTIFICATION_QUEUE_CAPACITY)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PostCommitNotifier::run (spawned task)                                 │
//! │   ├─ validate recipient                                                 │
//! │   └─ MailSender::send_mail ── failure → error! and move on              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Email failures never reach the caller: the order is already committed.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use tatylu_core::invoice::InvoiceNotice;
use tatylu_core::validation::validate_email;

// =============================================================================
// Mail Sender
// =============================================================================

/// An outgoing email.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Result of a send attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MailOutcome {
    pub fn sent() -> Self {
        MailOutcome { ok: true, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        MailOutcome {
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Email transport.
///
/// Implementations report failures through [`MailOutcome`] instead of
/// erroring.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send_mail(&self, message: MailMessage) -> MailOutcome;
}

/// Transport that only logs. Used when no mail provider is configured.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl MailSender for LogMailer {
    async fn send_mail(&self, message: MailMessage) -> MailOutcome {
        info!(
            to = %message.to,
            subject = %message.subject,
            bytes = message.html.len(),
            "Email (log transport)"
        );
        MailOutcome::sent()
    }
}

// =============================================================================
// Notifier
// =============================================================================

/// Background worker draining the notification queue.
pub struct PostCommitNotifier {
    mailer: Arc<dyn MailSender>,

    /// Sender address.
    from: String,

    /// Pending notices.
    jobs_rx: mpsc::Receiver<InvoiceNotice>,

    /// Shutdown receiver.
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for queueing notices and stopping the worker.
#[derive(Clone)]
pub struct NotifierHandle {
    jobs_tx: mpsc::Sender<InvoiceNotice>,
    shutdown_tx: mpsc::Sender<()>,
}

impl NotifierHandle {
    /// Queues a notice without waiting.
    ///
    /// Returns `false` when the notice was dropped (queue full or worker
    /// stopped).
    pub fn notify(&self, notice: InvoiceNotice) -> bool {
        match self.jobs_tx.try_send(notice) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(notice)) => {
                warn!(to = %notice.to, "Notification queue full, dropping email");
                false
            }
            Err(mpsc::error::TrySendError::Closed(notice)) => {
                warn!(to = %notice.to, "Notifier stopped, dropping email");
                false
            }
        }
    }

    /// Stops the worker after it drains queued notices.
    pub async fn shutdown(&self) {
        if self.shutdown_tx.send(()).await.is_err() {
            debug!("Notifier already stopped");
        }
    }
}

impl PostCommitNotifier {
    /// Creates a notifier and returns its handle.
    pub fn new(
        mailer: Arc<dyn MailSender>,
        from: impl Into<String>,
        capacity: usize,
    ) -> (Self, NotifierHandle) {
        let (jobs_tx, jobs_rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let notifier = PostCommitNotifier {
            mailer,
            from: from.into(),
            jobs_rx,
            shutdown_rx,
        };

        (notifier, NotifierHandle { jobs_tx, shutdown_tx })
    }

    /// Creates a notifier and spawns its worker on the current runtime.
    pub fn spawn(
        mailer: Arc<dyn MailSender>,
        from: impl Into<String>,
        capacity: usize,
    ) -> NotifierHandle {
        let (notifier, handle) = Self::new(mailer, from, capacity);
        tokio::spawn(notifier.run());
        handle
    }

    /// Runs the delivery loop.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!("Post-commit notifier starting");

        loop {
            tokio::select! {
                Some(notice) = self.jobs_rx.recv() => {
                    self.deliver(notice).await;
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Post-commit notifier shutting down");
                    break;
                }
            }
        }

        while let Ok(notice) = self.jobs_rx.try_recv() {
            self.deliver(notice).await;
        }

        info!("Post-commit notifier stopped");
    }

    async fn deliver(&self, notice: InvoiceNotice) {
        if let Err(e) = validate_email(&notice.to) {
            error!(to = ?notice.to, error = %e, "Invoice email not sent: invalid recipient");
            return;
        }

        let message = MailMessage {
            from: self.from.clone(),
            to: notice.to.trim().to_string(),
            subject: notice.subject,
            html: notice.html,
        };
        let to = message.to.clone();

        let outcome = self.mailer.send_mail(message).await;
        if outcome.ok {
            info!(to = %to, "Invoice email sent");
        } else {
            error!(
                to = %to,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "Invoice email failed"
            );
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
