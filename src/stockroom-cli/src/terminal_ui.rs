//! Terminal implementation of the session UI seam.
//!
//! Notifications are written to stderr so stdout stays clean for command
//! output. Navigation has no screen to switch to; it is recorded and
//! cancels whatever long-running command is attached to the UI.

use std::io::{IsTerminal, Write};
use std::time::Instant;

use parking_lot::Mutex;
use stockroom_session::{Notification, NotificationLevel, SessionUi};
use tokio_util::sync::CancellationToken;

use crate::display::colors;

/// Check if stderr should get ANSI colors (honors `NO_COLOR`).
pub fn should_colorize_stderr() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    std::io::stderr().is_terminal()
}

fn level_style(level: NotificationLevel) -> (&'static str, &'static str) {
    match level {
        NotificationLevel::Info => (colors::CYAN, "info"),
        NotificationLevel::Success => (colors::GREEN, "ok"),
        NotificationLevel::Warning => (colors::YELLOW, "warning"),
        NotificationLevel::Error => (colors::RED, "error"),
    }
}

/// Render a notification as a single line.
pub fn render_notification(notification: &Notification, colorize: bool) -> String {
    let (color, tag) = level_style(notification.level);
    if colorize {
        format!(
            "{color}{}{tag}:{} {}",
            colors::BOLD,
            colors::RESET,
            notification.message
        )
    } else {
        format!("{tag}: {}", notification.message)
    }
}

/// [`SessionUi`] for the terminal.
pub struct TerminalUi {
    out: Mutex<Box<dyn Write + Send>>,
    colorize: bool,
    active: Mutex<Vec<(Notification, Instant)>>,
    navigated_to: Mutex<Option<String>>,
    cancel: CancellationToken,
}

impl TerminalUi {
    /// UI writing to stderr, colorized when stderr is a terminal.
    pub fn stderr() -> Self {
        Self::with_writer(Box::new(std::io::stderr()), should_colorize_stderr())
    }

    pub fn with_writer(out: Box<dyn Write + Send>, colorize: bool) -> Self {
        Self {
            out: Mutex::new(out),
            colorize,
            active: Mutex::new(Vec::new()),
            navigated_to: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    pub fn colorize(&self) -> bool {
        self.colorize
    }

    /// Token cancelled on the first navigation.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Target of the last navigation, if any.
    pub fn navigated_to(&self) -> Option<String> {
        self.navigated_to.lock().clone()
    }

    /// Notifications that have not yet reached their dismiss time.
    pub fn active_notifications(&self) -> Vec<Notification> {
        let mut active = self.active.lock();
        active.retain(|(n, shown_at)| shown_at.elapsed() < n.dismiss_after);
        active.iter().map(|(n, _)| n.clone()).collect()
    }

    fn write_line(&self, line: &str) {
        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            tracing::debug!(error = %e, "Failed to write to terminal");
        }
    }
}

impl SessionUi for TerminalUi {
    fn notify(&self, notification: &Notification) {
        tracing::debug!(level = %notification.level, message = %notification.message, "Notification");
        self.write_line(&render_notification(notification, self.colorize));
        self.active
            .lock()
            .push((notification.clone(), Instant::now()));
    }

    fn navigate(&self, path: &str) {
        tracing::info!(path, "Navigating");
        if path == stockroom_session::constants::LOGIN_REDIRECT {
            self.write_line("Run `stockroom login` to sign in again.");
        }
        *self.navigated_to.lock() = Some(path.to_string());
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for TerminalUi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalUi")
            .field("colorize", &self.colorize)
            .field("navigated_to", &self.navigated_to())
            .finish()
    }
}
