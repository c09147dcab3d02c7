//! Notification dispatch seam.
//!
//! Email/SMS delivery is an external collaborator invoked with recipient,
//! subject and body. The default implementation writes to the application
//! log so the pipeline runs without a mail relay.

use log::info;
use thiserror::Error;

/// Errors surfaced by notification dispatch
#[derive(Error, Debug)]
pub enum NotifyError {
    /// The downstream channel rejected or failed the dispatch
    #[error("notification dispatch failed: {0}")]
    Dispatch(String),
}

/// Outbound notification channel.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    /// Send a notification to `recipient`.
    fn notify(&self, recipient: &str, subject: &str, message: &str) -> Result<(), NotifyError>;
}

/// Notifier that writes to the application log instead of a mail relay.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, recipient: &str, subject: &str, message: &str) -> Result<(), NotifyError> {
        info!("notification to {} | {} | {}", recipient, subject, message);
        Ok(())
    }
}
