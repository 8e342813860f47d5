//! Session token manager.
//!
//! Keeps an authenticated request path alive across access-token expiry:
//! - status checks against `/api/token-status`
//! - refresh through `/api/refresh-token` using the refresh-token cookie
//! - one refresh-and-retry when a request comes back 401
//!
//! When the refresh token can no longer mint access tokens the session is
//! terminated: the cached token is cleared, the user is warned, and a
//! redirect to `/login` is scheduled.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::constants::{
    ACCESS_TOKEN_COOKIE, CURRENT_USER_PATH, DEFAULT_REDIRECT_DELAY, DEFAULT_REQUEST_TIMEOUT,
    LOGIN_PATH, LOGIN_REDIRECT, LOGOUT_PATH, LOGOUT_REDIRECT, REFRESH_TOKEN_PATH,
    TOKEN_STATUS_PATH, USER_AGENT,
};
use crate::error::{Result, SessionError};
use crate::refresh::RefreshCoordinator;
use crate::state::SessionState;
use crate::types::{LoginRequest, RefreshBody, TokenStatus, UserProfile};
use crate::ui::{Notification, SessionUi, TracingUi};
use crate::utils::safe_format_token;

const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// Options for building a [`SessionManager`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Server root, e.g. `http://localhost:8100`.
    pub base_url: Url,
    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,
    /// Delay between the session-expired notification and the redirect.
    pub redirect_delay: Duration,
}

impl SessionOptions {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            redirect_delay: DEFAULT_REDIRECT_DELAY,
        }
    }

    /// Parse `base_url` and use defaults for everything else.
    pub fn parse(base_url: &str) -> Result<Self> {
        Ok(Self::new(Url::parse(base_url)?))
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn redirect_delay(mut self, delay: Duration) -> Self {
        self.redirect_delay = delay;
        self
    }
}

struct PendingRedirect {
    path: String,
    handle: JoinHandle<()>,
}

struct Inner {
    client: Client,
    base_url: Url,
    state: Arc<SessionState>,
    ui: Arc<dyn SessionUi>,
    refresh: RefreshCoordinator,
    redirect_delay: Duration,
    pending_redirect: Mutex<Option<PendingRedirect>>,
}

/// Client-side owner of the access token and the authenticated request path.
///
/// Cheap to clone; clones share state, cookie jar, and refresh coordination.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Create a manager with its own HTTP client.
    ///
    /// The client keeps a cookie jar (the refresh token lives there) and does
    /// not follow redirects, so `Set-Cookie` on 302 responses is observable.
    pub fn new(
        options: SessionOptions,
        state: Arc<SessionState>,
        ui: Arc<dyn SessionUi>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.request_timeout)
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::none())
            .cookie_store(true)
            .build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                base_url: options.base_url,
                state,
                ui,
                refresh: RefreshCoordinator::new(),
                redirect_delay: options.redirect_delay,
                pending_redirect: Mutex::new(None),
            }),
        })
    }

    /// Manager with in-memory state that reports through `tracing`.
    pub fn with_defaults(options: SessionOptions) -> Result<Self> {
        Self::new(
            options,
            Arc::new(SessionState::in_memory()),
            Arc::new(TracingUi),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.inner.state
    }

    /// Path of the scheduled redirect, until it fires or is cancelled.
    pub fn pending_redirect(&self) -> Option<String> {
        self.inner
            .pending_redirect
            .lock()
            .as_ref()
            .filter(|pending| !pending.handle.is_finished())
            .map(|pending| pending.path.clone())
    }

    /// Query the server for access/refresh token status.
    ///
    /// Returns `None` when the status is unknown (transport failure, non-2xx,
    /// or an undecodable body). That is not the same as unauthenticated.
    pub async fn get_token_status(&self) -> Option<TokenStatus> {
        let url = match self.inner.endpoint(TOKEN_STATUS_PATH) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Invalid token status URL");
                return None;
            }
        };

        let request = self.inner.authorize(self.inner.client.get(url));
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Token status request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Token status request was rejected");
            return None;
        }

        match response.json::<TokenStatus>().await {
            Ok(token_status) => {
                debug!(
                    access_exists = token_status.access_token.exists,
                    access_expired = token_status.access_token.expired,
                    refresh_exists = token_status.refresh_token.exists,
                    refresh_expired = token_status.refresh_token.expired,
                    "Received token status"
                );
                Some(token_status)
            }
            Err(e) => {
                warn!(error = %e, "Failed to decode token status");
                None
            }
        }
    }

    /// Mint a new access token from the refresh-token cookie.
    ///
    /// Overlapping calls share one refresh request. Returns `false` when the
    /// server declines, the response carries no token, or the call fails.
    pub async fn refresh_access_token(&self) -> bool {
        let inner = Arc::clone(&self.inner);
        self.inner
            .refresh
            .run(move || async move { inner.perform_refresh().await }.boxed())
            .await
    }

    /// Make sure the session can keep making requests.
    ///
    /// Unknown status is treated permissively. An expired access token with a
    /// usable refresh token triggers exactly one refresh. A missing or expired
    /// refresh token ends the session.
    pub async fn ensure_valid_session(&self) -> bool {
        let status = self.get_token_status().await;
        self.reconcile_status(status.as_ref()).await
    }

    /// Act on an already-fetched status the way [`Self::ensure_valid_session`] does.
    pub async fn reconcile_status(&self, status: Option<&TokenStatus>) -> bool {
        let Some(status) = status else {
            debug!("Token status unknown, keeping session");
            return true;
        };

        if !status.needs_refresh() {
            return true;
        }

        if status.is_refresh_terminal() {
            info!(
                refresh_exists = status.refresh_token.exists,
                "Refresh token unusable, ending session"
            );
            self.terminate_session(SESSION_EXPIRED_MESSAGE);
            return false;
        }

        debug!("Access token expired, refreshing");
        if self.refresh_access_token().await {
            return true;
        }

        self.terminate_session(SESSION_EXPIRED_MESSAGE);
        false
    }

    /// Send a request with the cached token as bearer credential.
    ///
    /// A 401 triggers one refresh; on success the request is retried once
    /// and that response is returned as-is, even if it is another 401. On
    /// refresh failure the session is terminated and `Ok(None)` is returned.
    /// Transport failures surface as errors.
    pub async fn authenticated_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Option<Response>> {
        let url = self.inner.endpoint(path)?;

        let response = self.inner.send(method.clone(), url.clone(), body).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(Some(response));
        }

        debug!(%method, path, "Request unauthorized, attempting token refresh");
        if !self.refresh_access_token().await {
            self.terminate_session(SESSION_EXPIRED_MESSAGE);
            return Ok(None);
        }

        let retry = self.inner.send(method.clone(), url, body).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            warn!(%method, path, "Request still unauthorized after refresh");
        }
        Ok(Some(retry))
    }

    /// `GET` through [`Self::authenticated_request`].
    pub async fn get(&self, path: &str) -> Result<Option<Response>> {
        self.authenticated_request(Method::GET, path, None).await
    }

    /// `POST` a JSON body through [`Self::authenticated_request`].
    pub async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<Option<Response>> {
        self.authenticated_request(Method::POST, path, Some(body))
            .await
    }

    /// [`Self::authenticated_request`] with the failure cases as errors.
    ///
    /// An ended session becomes [`SessionError::SessionTerminated`] and a 401
    /// on the retried call becomes [`SessionError::Unauthorized`].
    pub async fn require_authorized(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response> {
        match self.authenticated_request(method, path, body).await? {
            Some(response) if response.status() == StatusCode::UNAUTHORIZED => {
                Err(SessionError::Unauthorized)
            }
            Some(response) => Ok(response),
            None => Err(SessionError::SessionTerminated),
        }
    }

    /// Log in with credentials; caches the access token the server issues.
    ///
    /// The refresh-token cookie stays in the client's cookie jar.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<()> {
        let url = self.inner.endpoint(LOGIN_PATH)?;
        let response = self
            .inner
            .client
            .post(url)
            .json(&LoginRequest {
                username,
                password: password.expose_secret(),
            })
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED => Err(SessionError::InvalidCredentials),
            StatusCode::FORBIDDEN => Err(SessionError::PendingApproval),
            s if s.is_success() || s.is_redirection() => {
                let token = access_token_cookie(&response).ok_or(SessionError::MissingToken)?;
                self.inner.state.set_token(token);
                self.inner.cancel_redirect();
                info!(username, "Logged in");
                Ok(())
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(SessionError::UnexpectedStatus { status, body })
            }
        }
    }

    /// Log out: invalidate the server session, drop local state, go to `/`.
    ///
    /// Local state is cleared even when the server cannot be reached.
    pub async fn logout(&self) -> Result<()> {
        let url = self.inner.endpoint(LOGOUT_PATH)?;
        let result = self.inner.authorize(self.inner.client.post(url)).send().await;

        self.inner.state.clear();

        let response = result?;
        debug!(status = %response.status(), "Logout acknowledged");
        self.inner.ui.navigate(LOGOUT_REDIRECT);
        Ok(())
    }

    /// Current user profile, or `None` when unauthenticated or unavailable.
    pub async fn current_user(&self) -> Option<UserProfile> {
        let response = match self.get(CURRENT_USER_PATH).await {
            Ok(Some(response)) => response,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to fetch current user");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(status = %response.status(), "Current user request rejected");
            return None;
        }

        match response.json::<UserProfile>().await {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Failed to decode current user");
                None
            }
        }
    }

    /// End the session: clear the cache, warn the user, schedule the redirect.
    fn terminate_session(&self, message: &str) {
        self.inner.state.clear();
        self.inner.ui.notify(&Notification::warning(message));
        self.inner.schedule_redirect(LOGIN_REDIRECT);
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("base_url", &self.inner.base_url.as_str())
            .field("state", &self.inner.state)
            .field("pending_redirect", &self.pending_redirect())
            .finish()
    }
}

impl Inner {
    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Attach the cached token as bearer credential, if there is one.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.state.current_token() {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<Response> {
        let mut request = self
            .authorize(self.client.request(method, url))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    async fn perform_refresh(&self) -> bool {
        let url = match self.endpoint(REFRESH_TOKEN_PATH) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Invalid refresh URL");
                return false;
            }
        };

        let response = match self.client.post(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Token refresh request failed");
                return false;
            }
        };

        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            warn!(status = %status, "Token refresh was declined");
            return false;
        }

        let token = match access_token_cookie(&response) {
            Some(token) => Some(token),
            None if status.is_success() => response
                .json::<RefreshBody>()
                .await
                .ok()
                .map(|body| body.access_token)
                .filter(|token| !token.is_empty()),
            None => None,
        };

        match token {
            Some(token) => {
                info!(
                    token = %safe_format_token(&token),
                    "Successfully refreshed access token"
                );
                self.state.set_token(token);
                true
            }
            None => {
                warn!(status = %status, "Refresh response carried no access token");
                false
            }
        }
    }

    fn schedule_redirect(&self, path: &str) {
        let mut pending = self.pending_redirect.lock();
        if let Some(existing) = pending.as_ref()
            && !existing.handle.is_finished()
        {
            debug!(path = %existing.path, "Redirect already scheduled");
            return;
        }

        let ui = Arc::clone(&self.ui);
        let delay = self.redirect_delay;
        let target = path.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            ui.navigate(&target);
        });

        debug!(path, delay_ms = delay.as_millis() as u64, "Scheduled redirect");
        *pending = Some(PendingRedirect {
            path: path.to_string(),
            handle,
        });
    }

    fn cancel_redirect(&self) {
        if let Some(pending) = self.pending_redirect.lock().take() {
            pending.handle.abort();
            debug!(path = %pending.path, "Cancelled scheduled redirect");
        }
    }
}

/// Non-empty `access_token` value from the response's `Set-Cookie` headers.
fn access_token_cookie(response: &Response) -> Option<String> {
    response
        .cookies()
        .find(|cookie| cookie.name() == ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}
