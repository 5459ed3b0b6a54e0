use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// The subset of access-token claims the client cares about.
///
/// Decoding is best effort and never verifies the signature; the backend stays
/// the authority on validity.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Expiry, seconds since the Unix epoch
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
}

impl Claims {
    /// Decode the payload segment of a JWT. Returns `None` for anything that
    /// is not a three-segment token with a JSON payload.
    pub fn decode(token: &str) -> Option<Self> {
        let mut parts = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return None;
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// User id rendered as a string, whether the token carries it as a number or a string
    pub fn user_id(&self) -> Option<String> {
        match self.user_id.as_ref()? {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires_within_at(Duration::ZERO, now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }

    /// `true` if the token is expired or expires within `window` of `now`.
    /// Tokens without `exp` never expire.
    pub fn expires_within_at(&self, window: Duration, now: SystemTime) -> bool {
        let Some(exp) = self.exp else {
            return false;
        };
        let now = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let window = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
        exp.saturating_sub(now) <= window
    }

    pub fn expires_within(&self, window: Duration) -> bool {
        self.expires_within_at(window, SystemTime::now())
    }
}

#[cfg(test)]
pub(crate) fn encode_test_token(payload: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.signature")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_numeric_user_id() {
        let token = encode_test_token(&json!({
            "userId": 42,
            "email": "attendee@example.org",
            "role": "attendee",
            "exp": 2_000_000_000i64,
            "iat": 1_700_000_000i64,
        }));
        let claims = Claims::decode(&token).unwrap();
        assert_eq!(claims.user_id().as_deref(), Some("42"));
        assert_eq!(claims.role.as_deref(), Some("attendee"));
        assert_eq!(claims.exp, Some(2_000_000_000));
    }

    #[test]
    fn test_decode_rejects_non_jwt() {
        assert!(Claims::decode("opaque-token").is_none());
        assert!(Claims::decode("a.b").is_none());
        assert!(Claims::decode("a.b.c.d").is_none());
        assert!(Claims::decode("a.!!!.c").is_none());
    }

    #[test]
    fn test_expiry_check() {
        let claims = Claims {
            exp: Some(1_000),
            ..Default::default()
        };
        assert!(!claims.is_expired_at(UNIX_EPOCH + Duration::from_secs(999)));
        assert!(claims.is_expired_at(UNIX_EPOCH + Duration::from_secs(1_000)));

        let no_exp = Claims::default();
        assert!(!no_exp.is_expired());
    }

    #[test]
    fn test_expires_within_window() {
        let claims = Claims {
            exp: Some(1_000),
            ..Default::default()
        };
        let window = Duration::from_secs(300);
        assert!(!claims.expires_within_at(window, UNIX_EPOCH + Duration::from_secs(699)));
        assert!(claims.expires_within_at(window, UNIX_EPOCH + Duration::from_secs(700)));
        assert!(claims.expires_within_at(window, UNIX_EPOCH + Duration::from_secs(940)));
        assert!(claims.expires_within_at(window, UNIX_EPOCH + Duration::from_secs(5_000)));
        assert!(!Claims::default().expires_within(window));
    }

    #[test]
    fn test_string_user_id() {
        let claims = Claims {
            user_id: Some(json!("u-7")),
            ..Default::default()
        };
        assert_eq!(claims.user_id().as_deref(), Some("u-7"));

        let blank = Claims {
            user_id: Some(json!("")),
            ..Default::default()
        };
        assert_eq!(blank.user_id(), None);
    }
}
