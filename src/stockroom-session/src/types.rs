//! Type definitions for token status and user data.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Status of a single token as reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Whether the token cookie is present.
    #[serde(default)]
    pub exists: bool,
    /// Whether the token has expired.
    #[serde(default)]
    pub expired: bool,
    /// Expiry timestamp, when the server could decode one.
    #[serde(default, deserialize_with = "deserialize_expiry")]
    pub expiry_time: Option<DateTime<Utc>>,
}

impl TokenInfo {
    /// A present, unexpired token.
    pub fn valid(expiry_time: Option<DateTime<Utc>>) -> Self {
        Self {
            exists: true,
            expired: false,
            expiry_time,
        }
    }

    /// A present but expired token.
    pub fn expired(expiry_time: Option<DateTime<Utc>>) -> Self {
        Self {
            exists: true,
            expired: true,
            expiry_time,
        }
    }

    /// An absent token.
    pub fn missing() -> Self {
        Self::default()
    }

    /// Present and not expired.
    pub fn is_usable(&self) -> bool {
        self.exists && !self.expired
    }

    /// Seconds until expiry. Negative once expired, None if unknown.
    pub fn time_until_expiry(&self) -> Option<i64> {
        self.expiry_time
            .map(|exp| exp.timestamp() - Utc::now().timestamp())
    }
}

/// Token status reported by `GET /api/token-status`.
///
/// The server answers `{"status":"no_token"}` when neither cookie is set;
/// that shape decodes to two missing tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStatus {
    #[serde(default)]
    pub access_token: TokenInfo,
    #[serde(default)]
    pub refresh_token: TokenInfo,
}

impl TokenStatus {
    /// The refresh token can no longer mint access tokens.
    pub fn is_refresh_terminal(&self) -> bool {
        !self.refresh_token.is_usable()
    }

    /// The access token needs replacing before further requests.
    pub fn needs_refresh(&self) -> bool {
        !self.access_token.is_usable()
    }
}

/// Current user as returned by `GET /api/user/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Credentials posted to the login endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Body of a refresh response, used when the server omits the cookie.
#[derive(Debug, Deserialize)]
pub(crate) struct RefreshBody {
    pub access_token: String,
}

/// Accepts RFC 3339 timestamps as well as naive ISO-8601 ones (read as UTC).
fn deserialize_expiry<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }

    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_token_status_full_shape() {
        let json = r#"{
            "access_token": {"exists": true, "expired": true, "expiry_time": "2025-03-01T10:00:00"},
            "refresh_token": {"exists": true, "expired": false, "expiry_time": "2025-03-30T10:00:00+00:00"}
        }"#;
        let status: TokenStatus = serde_json::from_str(json).unwrap();

        assert_eq!(
            status.access_token,
            TokenInfo::expired(Some(Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()))
        );
        assert!(status.refresh_token.is_usable());
        assert!(status.needs_refresh());
        assert!(!status.is_refresh_terminal());
    }

    #[test]
    fn test_token_status_no_token_shape() {
        let json = r#"{"status": "no_token", "message": "no tokens"}"#;
        let status: TokenStatus = serde_json::from_str(json).unwrap();

        assert_eq!(status, TokenStatus::default());
        assert!(status.is_refresh_terminal());
    }

    #[test]
    fn test_token_status_missing_token_only_exists() {
        let json = r#"{"access_token": {"exists": false}, "refresh_token": {"expired": true}}"#;
        let status: TokenStatus = serde_json::from_str(json).unwrap();

        assert!(!status.access_token.exists);
        assert!(status.refresh_token.expired);
        assert!(status.is_refresh_terminal());
    }

    #[test]
    fn test_token_info_null_expiry() {
        let json = r#"{"exists": true, "expired": false, "expiry_time": null}"#;
        let info: TokenInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info, TokenInfo::valid(None));
        assert_eq!(info.time_until_expiry(), None);
    }

    #[test]
    fn test_token_info_bad_expiry_rejected() {
        let json = r#"{"exists": true, "expiry_time": "yesterday"}"#;
        assert!(serde_json::from_str::<TokenInfo>(json).is_err());
    }

    #[test]
    fn test_user_profile_decodes() {
        let json = r#"{
            "id": 7, "username": "kim", "email": "kim@example.com",
            "full_name": null, "is_admin": true, "is_approved": true,
            "created_at": "2025-01-02T03:04:05"
        }"#;
        let user: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(user.username, "kim");
        assert!(user.is_admin);
        assert_eq!(user.full_name, None);
    }
}
