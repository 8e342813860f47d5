//! Stockroom Session - client-side session handling for the Stockroom inventory service.
//!
//! Provides:
//! - Token status checks and access-token refresh via the refresh-token cookie
//! - Authenticated requests with a single refresh-and-retry on 401
//! - Coalescing of concurrent refresh attempts
//! - Periodic status polling decoupled from rendering
//!
//! Security features:
//! - Tokens held as `SecretString` and masked in logs
//! - The refresh token never leaves the HTTP client's cookie jar
//! - Token file written with owner-only permissions (0600)

// Core modules
pub mod constants;
pub mod error;
pub mod types;
mod utils;

// Client-held state
pub mod state;
pub mod storage;

// Session handling
pub mod manager;
pub mod poller;
pub mod refresh;
pub mod ui;

pub use constants::{
    DEFAULT_NOTIFICATION_DURATION, DEFAULT_POLL_INTERVAL, DEFAULT_REDIRECT_DELAY,
    DEFAULT_REQUEST_TIMEOUT, LOGIN_REDIRECT, LOGOUT_REDIRECT,
};
pub use error::{Result, SessionError};
pub use manager::{SessionManager, SessionOptions};
pub use poller::{StatusEvent, StatusPoller};
pub use refresh::RefreshCoordinator;
pub use state::SessionState;
pub use storage::{FileTokenStore, MemoryTokenStore, TokenStore, default_stockroom_home};
pub use types::{TokenInfo, TokenStatus, UserProfile};
pub use ui::{Notification, NotificationLevel, SessionUi, TracingUi};
pub use utils::safe_format_token;

pub use reqwest::Method;
