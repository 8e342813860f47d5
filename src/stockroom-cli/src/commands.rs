//! Subcommand implementations.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{FixedOffset, Utc};
use clap::Subcommand;
use secrecy::SecretString;
use serde::Deserialize;
use stockroom_session::{
    LOGIN_REDIRECT, Method, Notification, SessionError, SessionManager, SessionState, SessionUi,
    StatusEvent, StatusPoller, UserProfile,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::display::{
    StockLevel, format_datetime, format_number, format_quantity, format_token_status,
    parse_timestamp,
};
use crate::terminal_ui::TerminalUi;

/// Product list endpoint.
pub const PRODUCTS_PATH: &str = "/api/products";

/// Endpoints only administrators can use, shown by `whoami`.
pub const ADMIN_COMMANDS: &[(&str, &str)] = &[
    ("GET /admin", "review accounts awaiting approval"),
    ("POST /admin/approve/{user_id}", "approve an account"),
    ("DELETE /admin/reject/{user_id}", "reject an account"),
    ("GET /api/audit-logs", "browse the audit log"),
];

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and cache the access token
    Login {
        /// Login name (defaults to the configured username)
        #[arg(short, long)]
        username: Option<String>,

        /// Password (defaults to the configured password)
        #[arg(long, value_parser = parse_secret)]
        password: Option<SecretString>,
    },

    /// Sign out and drop the cached token
    Logout,

    /// Show access and refresh token status
    Status {
        /// Also refresh or end the session as needed
        #[arg(long)]
        ensure: bool,
    },

    /// Exchange the refresh token for a new access token
    Refresh,

    /// Send an authenticated request and print the response
    Request {
        /// HTTP method
        method: String,

        /// Path relative to the server root
        path: String,

        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },

    /// Show the current user
    Whoami,

    /// List products with stock levels
    Products,

    /// Poll token status until the session ends or Ctrl+C
    Watch {
        /// Seconds between polls (defaults to the configured interval)
        #[arg(long)]
        interval: Option<u64>,

        /// Only report status, never refresh
        #[arg(long)]
        no_auto_refresh: bool,
    },
}

fn parse_secret(value: &str) -> std::result::Result<SecretString, std::convert::Infallible> {
    Ok(SecretString::from(value))
}

/// How a command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::Failure => ExitCode::FAILURE,
        }
    }
}

/// Product row from the product list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub stock_quantity: i64,
}

/// The session manager wired to the terminal.
pub struct App {
    config: ClientConfig,
    manager: SessionManager,
    ui: Arc<TerminalUi>,
}

impl App {
    pub fn new(config: ClientConfig, ui: Arc<TerminalUi>) -> Result<Self> {
        let options = config.session_options()?;
        let state = Arc::new(SessionState::new(config.token_store()));
        let manager = SessionManager::new(options, state, ui.clone() as Arc<dyn SessionUi>)
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            manager,
            ui,
        })
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    pub fn ui(&self) -> &TerminalUi {
        &self.ui
    }

    fn offset(&self) -> FixedOffset {
        self.config.display_offset()
    }

    fn notify(&self, notification: Notification) {
        self.ui
            .notify(&notification.dismiss_after(self.config.notification_duration()));
    }

    /// Run a subcommand, writing its output to `out`.
    pub async fn run(&self, command: Command, out: &mut dyn Write) -> Result<Outcome> {
        debug!(?command, base_url = %self.manager.base_url(), "Running command");
        let outcome = match command {
            Command::Login { username, password } => self.login(username, password).await,
            Command::Logout => self.logout().await,
            Command::Status { ensure } => self.status(ensure, out).await,
            Command::Refresh => self.refresh().await,
            Command::Request { method, path, body } => {
                self.request(&method, &path, body.as_deref(), out).await
            }
            Command::Whoami => self.whoami(out).await,
            Command::Products => self.products(out).await,
            Command::Watch {
                interval,
                no_auto_refresh,
            } => {
                let interval = interval
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| self.config.poll_interval());
                self.watch(interval, !no_auto_refresh, out).await
            }
        }?;

        self.await_redirect().await;
        Ok(outcome)
    }

    /// Wait for a scheduled redirect to reach the terminal before exiting.
    async fn await_redirect(&self) {
        if self.manager.pending_redirect().is_none() {
            return;
        }
        let wait = self.config.redirect_delay() + Duration::from_millis(500);
        let _ = tokio::time::timeout(wait, self.ui.cancellation().cancelled()).await;
    }

    /// Log in with configured credentials when no token is cached.
    async fn ensure_logged_in(&self) -> Result<()> {
        if self.manager.state().has_token() {
            return Ok(());
        }
        let Some((username, password)) = self.config.credentials() else {
            debug!("No cached token and no credentials configured");
            return Ok(());
        };
        self.manager
            .login(username, password)
            .await
            .with_context(|| format!("Automatic login as {username} failed"))
    }

    async fn login(
        &self,
        username: Option<String>,
        password: Option<SecretString>,
    ) -> Result<Outcome> {
        let username = username
            .or_else(|| self.config.username.clone())
            .ok_or_else(|| anyhow!("No username given (use --username or STOCKROOM_USERNAME)"))?;
        let password = password
            .or_else(|| self.config.password.clone())
            .ok_or_else(|| anyhow!("No password given (use --password or STOCKROOM_PASSWORD)"))?;

        match self.manager.login(&username, &password).await {
            Ok(()) => {
                self.notify(Notification::success(format!("Logged in as {username}")));
                Ok(Outcome::Success)
            }
            Err(SessionError::InvalidCredentials) => {
                self.notify(Notification::error("Invalid username or password"));
                Ok(Outcome::Failure)
            }
            Err(SessionError::PendingApproval) => {
                self.notify(Notification::warning(
                    "Your account is waiting for administrator approval",
                ));
                Ok(Outcome::Failure)
            }
            Err(e) => Err(e).context("Login failed"),
        }
    }

    async fn logout(&self) -> Result<Outcome> {
        self.manager.logout().await.context("Logout request failed")?;
        self.notify(Notification::info("Logged out"));
        Ok(Outcome::Success)
    }

    async fn status(&self, ensure: bool, out: &mut dyn Write) -> Result<Outcome> {
        let Some(status) = self.manager.get_token_status().await else {
            writeln!(out, "Token status unknown")?;
            return Ok(Outcome::Failure);
        };

        for line in format_token_status(&status, self.offset()) {
            writeln!(out, "{line}")?;
        }

        if ensure && !self.manager.reconcile_status(Some(&status)).await {
            return Ok(Outcome::Failure);
        }
        Ok(Outcome::Success)
    }

    async fn refresh(&self) -> Result<Outcome> {
        self.ensure_logged_in().await?;
        if self.manager.refresh_access_token().await {
            self.notify(Notification::success("Access token refreshed"));
            Ok(Outcome::Success)
        } else {
            self.notify(Notification::error("Could not refresh the access token"));
            Ok(Outcome::Failure)
        }
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<&str>,
        out: &mut dyn Write,
    ) -> Result<Outcome> {
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .with_context(|| format!("Invalid HTTP method: {method}"))?;
        let body = body
            .map(serde_json::from_str::<serde_json::Value>)
            .transpose()
            .context("Request body is not valid JSON")?;

        self.ensure_logged_in().await?;
        let Some(response) = self
            .manager
            .authenticated_request(method, path, body.as_ref())
            .await
            .context("Request failed")?
        else {
            return Ok(Outcome::Failure);
        };

        let status = response.status();
        info!(%status, path, "Response received");
        let text = response.text().await.context("Failed to read response body")?;
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(json) => writeln!(out, "{}", serde_json::to_string_pretty(&json)?)?,
            Err(_) if text.is_empty() => {}
            Err(_) => writeln!(out, "{text}")?,
        }

        if status.is_success() {
            Ok(Outcome::Success)
        } else {
            self.notify(Notification::error(format!("Server responded with {status}")));
            Ok(Outcome::Failure)
        }
    }

    async fn whoami(&self, out: &mut dyn Write) -> Result<Outcome> {
        self.ensure_logged_in().await?;
        let Some(user) = self.manager.current_user().await else {
            writeln!(out, "Not signed in")?;
            return Ok(Outcome::Failure);
        };

        for line in render_user(&user, self.offset()) {
            writeln!(out, "{line}")?;
        }
        Ok(Outcome::Success)
    }

    async fn products(&self, out: &mut dyn Write) -> Result<Outcome> {
        self.ensure_logged_in().await?;
        let response = match self
            .manager
            .require_authorized(Method::GET, PRODUCTS_PATH, None)
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_terminal() => return Ok(Outcome::Failure),
            Err(SessionError::Unauthorized) => {
                self.notify(Notification::error("Not authorized to view products"));
                return Ok(Outcome::Failure);
            }
            Err(e) => return Err(e).context("Failed to load products"),
        };
        if !response.status().is_success() {
            self.notify(Notification::error(format!(
                "Could not load products ({})",
                response.status()
            )));
            return Ok(Outcome::Failure);
        }

        let products: Vec<Product> = response
            .json()
            .await
            .context("Failed to decode product list")?;
        for line in render_products(&products, self.ui.colorize()) {
            writeln!(out, "{line}")?;
        }
        Ok(Outcome::Success)
    }

    async fn watch(
        &self,
        interval: Duration,
        auto_refresh: bool,
        out: &mut dyn Write,
    ) -> Result<Outcome> {
        if interval.is_zero() {
            bail!("Poll interval must be at least one second");
        }
        self.ensure_logged_in().await?;

        let cancel = self.ui.cancellation();
        let poller = StatusPoller::new(self.manager.clone())
            .interval(interval)
            .auto_refresh(auto_refresh);
        let mut events = poller.subscribe();
        let handle = poller.spawn(cancel.clone());

        let on_ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_ctrl_c.cancel();
            }
        });

        let mut session_ended = false;
        loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Ok(StatusEvent::SessionEnded) => {
                        session_ended = true;
                        break;
                    }
                    Ok(event) => self.render_event(&event, out)?,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Status renderer fell behind");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = cancel.cancelled() => break,
            }
        }

        // The redirect may fire before the poller reports the session end.
        let session_ended = session_ended
            || self.ui.navigated_to().as_deref() == Some(LOGIN_REDIRECT);

        // After a session end the poller has already stopped and the
        // cancellation token belongs to the pending redirect.
        if !session_ended {
            cancel.cancel();
        }
        if let Err(e) = handle.await {
            warn!(error = %e, "Status poller task failed");
        }

        Ok(if session_ended {
            Outcome::Failure
        } else {
            Outcome::Success
        })
    }

    fn render_event(&self, event: &StatusEvent, out: &mut dyn Write) -> Result<()> {
        let stamp = format_datetime(Utc::now(), self.offset());
        match event {
            StatusEvent::Status(status) => {
                writeln!(out, "[{stamp}]")?;
                for line in format_token_status(status, self.offset()) {
                    writeln!(out, "  {line}")?;
                }
            }
            StatusEvent::Unknown => writeln!(out, "[{stamp}] token status unknown")?,
            StatusEvent::Refreshed => writeln!(out, "[{stamp}] access token refreshed")?,
            StatusEvent::SessionEnded => writeln!(out, "[{stamp}] session ended")?,
        }
        for notification in self.ui.active_notifications() {
            writeln!(out, "  ({}) {}", notification.level, notification.message)?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Profile lines for `whoami`; admin commands only for administrators.
pub fn render_user(user: &UserProfile, offset: FixedOffset) -> Vec<String> {
    let mut lines = vec![format!("Username:  {}", user.username)];
    if let Some(name) = &user.full_name {
        lines.push(format!("Name:      {name}"));
    }
    if let Some(email) = &user.email {
        lines.push(format!("Email:     {email}"));
    }
    if let Some(joined) = user.created_at.as_deref().and_then(parse_timestamp) {
        lines.push(format!("Joined:    {}", format_datetime(joined, offset)));
    }
    lines.push(format!(
        "Role:      {}",
        if user.is_admin { "administrator" } else { "staff" }
    ));
    if !user.is_approved {
        lines.push("Status:    awaiting approval".to_string());
    }

    if user.is_admin {
        lines.push(String::new());
        lines.push("Admin commands:".to_string());
        lines.extend(
            ADMIN_COMMANDS
                .iter()
                .map(|(endpoint, what)| format!("  {endpoint:<32} {what}")),
        );
    }
    lines
}

/// Product table with stock badges.
pub fn render_products(products: &[Product], colorize: bool) -> Vec<String> {
    if products.is_empty() {
        return vec!["No products".to_string()];
    }

    products
        .iter()
        .map(|p| {
            format!(
                "{:>5}  {:<24} {:<12} {:>12}  {:>8} {}",
                p.id,
                p.name,
                p.category.as_deref().unwrap_or("-"),
                format_quantity(p.price),
                format_number(p.stock_quantity),
                StockLevel::from_quantity(p.stock_quantity).badge(colorize)
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(is_admin: bool) -> UserProfile {
        UserProfile {
            id: 1,
            username: "clerk".to_string(),
            email: Some("clerk@example.com".to_string()),
            full_name: None,
            is_admin,
            is_approved: true,
            created_at: Some("2025-01-02T03:04:05".to_string()),
        }
    }

    #[test]
    fn test_render_user_hides_admin_commands() {
        let lines = render_user(&user(false), FixedOffset::east_opt(9 * 3600).unwrap());
        assert!(lines.contains(&"Role:      staff".to_string()));
        assert!(lines.contains(&"Joined:    2025. 01. 02. 12:04".to_string()));
        assert!(!lines.iter().any(|l| l.contains("Admin commands")));
    }

    #[test]
    fn test_render_user_shows_admin_commands() {
        let lines = render_user(&user(true), FixedOffset::east_opt(0).unwrap());
        assert!(lines.contains(&"Admin commands:".to_string()));
        assert!(lines.iter().any(|l| l.contains("/admin/approve/{user_id}")));
    }

    #[test]
    fn test_render_products() {
        let products = vec![
            Product {
                id: 7,
                name: "Bolt M6".to_string(),
                category: None,
                price: 1250.0,
                stock_quantity: 0,
            },
            Product {
                id: 8,
                name: "Washer".to_string(),
                category: Some("parts".to_string()),
                price: 0.5,
                stock_quantity: 12000,
            },
        ];

        let lines = render_products(&products, false);
        assert!(lines[0].contains("1,250.00"));
        assert!(lines[0].ends_with("[out of stock]"));
        assert!(lines[1].contains("12,000"));
        assert!(lines[1].ends_with("[sufficient]"));
        assert_eq!(render_products(&[], false), vec!["No products"]);
    }
}
