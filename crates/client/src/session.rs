//! Session store: the authenticated identity and its transitions.
//!
//! The session is the leaf dependency of the subsystem: the cart and
//! favorites managers read it to gate their operations and to obtain the
//! bearer token for gateway calls. Credentials are persisted through a
//! [`TokenStore`] so the session survives process restarts.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use maison_core::{Email, EmailError, UserId, UserRole};

use crate::error::StoreError;
use crate::gateway::{AuthGateway, GatewayError};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Invalid credentials (wrong password or unknown account).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An account with this email already exists.
    #[error("an account with this email already exists")]
    EmailTaken,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),
}

/// Errors from the durable credential storage.
#[derive(Debug, Error)]
pub enum CredentialStoreError {
    /// Filesystem failure.
    #[error("credential file io error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored file could not be decoded.
    #[error("corrupt credential file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

// =============================================================================
// Identity Types
// =============================================================================

/// The authenticated user as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User's backend ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name.
    pub name: String,
    /// Role (customer or admin).
    #[serde(default)]
    pub role: UserRole,
}

/// The current session.
///
/// A tagged enum rather than a flag bundle: an access token can only exist
/// alongside an authenticated user.
#[derive(Debug, Clone)]
pub enum Session {
    /// Logged out.
    Anonymous,
    /// Logged in with a bearer token.
    Authenticated {
        /// The authenticated user.
        user: User,
        /// Bearer token for gateway calls.
        access_token: SecretString,
    },
}

impl Session {
    /// Whether the session is authenticated.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// The authenticated user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated { user, .. } => Some(user),
        }
    }
}

/// Registration data for a new account.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Email address.
    pub email: String,
    /// Password (validated locally before the gateway call).
    pub password: String,
    /// Display name.
    pub name: String,
}

// =============================================================================
// Credential Persistence
// =============================================================================

/// The credential record persisted between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Bearer token.
    pub access_token: String,
    /// The user record at the time of login.
    pub user: User,
    /// When the credential was stored.
    pub saved_at: DateTime<Utc>,
}

/// Durable client-side storage for the credential token and user record.
pub trait TokenStore: Send + Sync {
    /// Load the stored credential, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store exists but cannot be read or decoded.
    fn load(&self) -> Result<Option<StoredCredential>, CredentialStoreError>;

    /// Persist a credential, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential cannot be written.
    fn save(&self, credential: &StoredCredential) -> Result<(), CredentialStoreError>;

    /// Remove any stored credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be cleared.
    fn clear(&self) -> Result<(), CredentialStoreError>;
}

/// [`TokenStore`] backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Create a store at the given path. The file is created on first save.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<StoredCredential>, CredentialStoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, credential: &StoredCredential) -> Result<(), CredentialStoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(credential)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialStoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// SessionStore
// =============================================================================

/// Holds the current session and exposes authentication transitions.
///
/// Owned by [`crate::Storefront`]; the managers hold a shared reference and
/// read snapshots, never mutate.
pub struct SessionStore<G> {
    gateway: Arc<G>,
    tokens: Box<dyn TokenStore>,
    current: RwLock<Session>,
}

impl<G> SessionStore<G> {
    /// Create a store in the anonymous state.
    pub fn new(gateway: Arc<G>, tokens: Box<dyn TokenStore>) -> Self {
        Self {
            gateway,
            tokens,
            current: RwLock::new(Session::Anonymous),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, session: Session) {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = session;
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn current(&self) -> Session {
        self.read().clone()
    }

    /// Whether a user is logged in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated()
    }

    /// The authenticated user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.read().user().cloned()
    }

    /// The bearer token, if authenticated.
    #[must_use]
    pub fn access_token(&self) -> Option<SecretString> {
        match &*self.read() {
            Session::Anonymous => None,
            Session::Authenticated { access_token, .. } => Some(access_token.clone()),
        }
    }

    /// The bearer token, or `NotAuthenticated` for operations that require
    /// a logged-in session.
    pub(crate) fn require_token(&self) -> Result<SecretString, StoreError> {
        self.access_token().ok_or(StoreError::NotAuthenticated)
    }

    /// Restore a session from durable storage at startup.
    ///
    /// Returns the restored user, or `None` if no credential is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential store cannot be read.
    #[instrument(skip(self))]
    pub fn restore(&self) -> Result<Option<User>, StoreError> {
        let Some(credential) = self.tokens.load().map_err(StoreError::Credential)? else {
            debug!("no stored credential to restore");
            return Ok(None);
        };
        let user = credential.user.clone();
        info!(user_id = %user.id, "restored session from stored credential");
        self.publish(Session::Authenticated {
            user: credential.user,
            access_token: SecretString::from(credential.access_token),
        });
        Ok(Some(user))
    }

    /// Accept an already-issued credential, used by the separate admin
    /// login flow.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential cannot be persisted.
    #[instrument(skip(self, access_token), fields(user_id = %user.id))]
    pub fn admin_login(&self, user: User, access_token: SecretString) -> Result<(), StoreError> {
        self.establish(user, access_token)
    }

    /// Log out: clear the persisted credential and publish the anonymous
    /// session.
    ///
    /// The in-memory session is cleared even if the credential store fails,
    /// so dependent state flushes are never skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted credential could not be removed.
    #[instrument(skip(self))]
    pub fn logout(&self) -> Result<(), StoreError> {
        self.publish(Session::Anonymous);
        self.tokens.clear().map_err(StoreError::Credential)?;
        info!("session cleared");
        Ok(())
    }

    fn establish(&self, user: User, access_token: SecretString) -> Result<(), StoreError> {
        self.tokens
            .save(&StoredCredential {
                access_token: access_token.expose_secret().to_string(),
                user: user.clone(),
                saved_at: Utc::now(),
            })
            .map_err(StoreError::Credential)?;
        info!(user_id = %user.id, role = %user.role, "session established");
        self.publish(Session::Authenticated { user, access_token });
        Ok(())
    }
}

impl<G: AuthGateway> SessionStore<G> {
    /// Log in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` (wrapped in [`StoreError`])
    /// if the backend rejects the credentials; gateway and credential-store
    /// failures propagate as-is. Never retried.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, StoreError> {
        let email = Email::parse(email).map_err(AuthError::from)?;

        let payload = self
            .gateway
            .login(email.as_str(), password)
            .await
            .map_err(|e| match e {
                GatewayError::Unauthorized => StoreError::Auth(AuthError::InvalidCredentials),
                other => StoreError::Gateway(other),
            })?;

        let user = payload.user.clone();
        self.establish(payload.user, SecretString::from(payload.access_token))?;
        Ok(user)
    }

    /// Register a new account and log it in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail`/`WeakPassword` for local validation
    /// failures and `AuthError::EmailTaken` if the backend reports a
    /// conflict.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<User, StoreError> {
        let email = Email::parse(&registration.email).map_err(AuthError::from)?;
        validate_password(&registration.password)?;

        let payload = self
            .gateway
            .register(email.as_str(), &registration.password, &registration.name)
            .await
            .map_err(|e| match e {
                GatewayError::Status { status: 409, .. } => StoreError::Auth(AuthError::EmailTaken),
                other => StoreError::Gateway(other),
            })?;

        let user = payload.user.clone();
        self.establish(payload.user, SecretString::from(payload.access_token))?;
        Ok(user)
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}
