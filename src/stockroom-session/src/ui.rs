//! Front-end seam used by the session manager for user feedback.

use std::time::Duration;

use crate::constants::DEFAULT_NOTIFICATION_DURATION;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NotificationLevel {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl std::fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationLevel::Info => write!(f, "info"),
            NotificationLevel::Success => write!(f, "success"),
            NotificationLevel::Warning => write!(f, "warning"),
            NotificationLevel::Error => write!(f, "error"),
        }
    }
}

/// A transient message that dismisses itself after `dismiss_after`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    pub dismiss_after: Duration,
}

impl Notification {
    pub fn new(message: impl Into<String>, level: NotificationLevel) -> Self {
        Self {
            message: message.into(),
            level,
            dismiss_after: DEFAULT_NOTIFICATION_DURATION,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, NotificationLevel::Info)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, NotificationLevel::Success)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, NotificationLevel::Warning)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, NotificationLevel::Error)
    }

    /// Override how long the notification stays visible.
    pub fn dismiss_after(mut self, duration: Duration) -> Self {
        self.dismiss_after = duration;
        self
    }
}

/// Presentation hooks the session manager calls into.
pub trait SessionUi: Send + Sync {
    /// Show a transient notification.
    fn notify(&self, notification: &Notification);

    /// Leave the current view for `path`.
    fn navigate(&self, path: &str);
}

/// [`SessionUi`] that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingUi;

impl SessionUi for TracingUi {
    fn notify(&self, notification: &Notification) {
        match notification.level {
            NotificationLevel::Error => tracing::error!(message = %notification.message, "Notification"),
            NotificationLevel::Warning => tracing::warn!(message = %notification.message, "Notification"),
            NotificationLevel::Info | NotificationLevel::Success => {
                tracing::info!(message = %notification.message, level = %notification.level, "Notification")
            }
        }
    }

    fn navigate(&self, path: &str) {
        tracing::info!(path, "Navigating");
    }
}
