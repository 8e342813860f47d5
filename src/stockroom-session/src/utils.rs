//! Utility functions for the stockroom-session module.

use std::path::Path;

use crate::error::{Result, SessionError};

/// Mask a token for safe display in logs.
///
/// Cuts on char boundaries, so non-ASCII tokens are safe.
pub fn safe_format_token(token: &str) -> String {
    if token.chars().count() <= 13 {
        return "***".to_string();
    }
    let prefix: String = token.chars().take(8).collect();
    let suffix_start = token
        .char_indices()
        .rev()
        .nth(4)
        .map_or(0, |(index, _)| index);
    format!("{prefix}***{}", &token[suffix_start..])
}

/// Set restrictive file permissions (0600 on Unix).
pub fn set_file_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms).map_err(|e| {
            SessionError::Storage(format!(
                "failed to set permissions on {}: {e}",
                path.display()
            ))
        })?;
    }

    #[cfg(not(unix))]
    {
        let _ = path;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_format_token_long() {
        let token = "eyJhbGciOiJIUzI1NiJ9.payload.sig12";
        assert_eq!(safe_format_token(token), "eyJhbGci***sig12");
    }

    #[test]
    fn test_safe_format_token_multibyte() {
        assert_eq!(safe_format_token("aééééééééééééé"), "aééééééé***ééééé");
        assert_eq!(safe_format_token("토큰토큰토큰토큰토큰토큰토큰"), "토큰토큰토큰토큰***큰토큰토큰");
        assert_eq!(safe_format_token("ééééééééééééé"), "***");
    }

    #[test]
    fn test_safe_format_token_short() {
        assert_eq!(safe_format_token("short-token"), "***");
    }

    #[cfg(unix)]
    #[test]
    fn test_set_file_permissions_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{}").unwrap();

        set_file_permissions(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
