//! Constants for the stockroom-session module.

use std::time::Duration;

/// Endpoint reporting access/refresh token status.
pub const TOKEN_STATUS_PATH: &str = "/api/token-status";

/// Endpoint minting a new access token from the refresh-token cookie.
pub const REFRESH_TOKEN_PATH: &str = "/api/refresh-token";

/// Endpoint returning the current user's profile.
pub const CURRENT_USER_PATH: &str = "/api/user/me";

/// Credential login endpoint.
pub const LOGIN_PATH: &str = "/login";

/// Logout endpoint.
pub const LOGOUT_PATH: &str = "/logout";

/// Where the front end is sent when the session can no longer be recovered.
pub const LOGIN_REDIRECT: &str = "/login";

/// Where the front end is sent after an explicit logout.
pub const LOGOUT_REDIRECT: &str = "/";

/// Cookie carrying the script-readable access token.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Cookie carrying the refresh token. Its value is never copied out of the jar.
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Key under which the access token is cached in local storage.
pub const TOKEN_STORAGE_KEY: &str = "access_token";

/// Delay between a session-terminal notification and the redirect.
pub const DEFAULT_REDIRECT_DELAY: Duration = Duration::from_secs(2);

/// How long a notification stays on screen.
pub const DEFAULT_NOTIFICATION_DURATION: Duration = Duration::from_secs(5);

/// Interval of the background token-status poller.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Timeout applied to every HTTP request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// User-Agent string for HTTP requests
pub const USER_AGENT: &str = concat!("stockroom/", env!("CARGO_PKG_VERSION"));
