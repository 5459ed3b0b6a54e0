use super::Claims;
use crate::infrastructure::HttpTokenRefresher;
use crate::types::RefreshError;
use async_trait::async_trait;
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// Access/refresh token pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Claims of the access token, if it is a JWT
    pub fn claims(&self) -> Option<Claims> {
        Claims::decode(&self.access_token)
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &format_args!("<{} bytes>", self.access_token.len()))
            .field(
                "refresh_token",
                &format_args!("<{} bytes>", self.refresh_token.len()),
            )
            .finish()
    }
}

/// Source of the tokens used to authenticate the event channel.
///
/// The client only reads through `get` and asks for a new pair through
/// `refresh`; persisting tokens is the store's business.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// Current credential, if the user is signed in
    fn get(&self) -> Option<Credential>;

    /// Exchange the refresh token for a new credential pair
    async fn refresh(&self) -> Result<Credential, RefreshError>;
}

/// Credential store kept in process memory, refreshed over HTTP.
pub struct InMemoryCredentials {
    current: RwLock<Option<Credential>>,
    refresher: Option<HttpTokenRefresher>,
}

impl InMemoryCredentials {
    pub fn new(refresher: HttpTokenRefresher) -> Self {
        Self {
            current: RwLock::new(None),
            refresher: Some(refresher),
        }
    }

    /// A store that can never refresh; refresh attempts fail immediately
    pub fn fixed(credential: Credential) -> Self {
        Self {
            current: RwLock::new(Some(credential)),
            refresher: None,
        }
    }

    pub fn with_credential(self, credential: Credential) -> Self {
        self.set(credential);
        self
    }

    pub fn set(&self, credential: Credential) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(credential);
    }

    pub fn clear(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentials {
    fn get(&self) -> Option<Credential> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn refresh(&self) -> Result<Credential, RefreshError> {
        let Some(refresh_token) = self
            .get()
            .map(|c| c.refresh_token)
            .filter(|t| !t.is_empty())
        else {
            return Err(RefreshError::MissingRefreshToken);
        };
        let Some(refresher) = &self.refresher else {
            return Err(RefreshError::Failed(
                "no refresh endpoint configured".to_string(),
            ));
        };

        match refresher.refresh(&refresh_token).await {
            Ok(credential) => {
                self.set(credential.clone());
                Ok(credential)
            }
            Err(RefreshError::Rejected(reason)) => {
                tracing::warn!("Refresh token rejected, clearing stored credential");
                self.clear();
                Err(RefreshError::Rejected(reason))
            }
            Err(e) => Err(e),
        }
    }
}
