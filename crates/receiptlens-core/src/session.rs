//! Session store: the persisted auth token and the tri-state auth gate
//!
//! The token lives in a scoped key-value store behind the `TokenStore`
//! trait so it survives process restarts. Authentication state starts out
//! `Unknown` and resolves on the first query of the store, letting callers
//! tell "still loading" apart from "confirmed logged out".
//!
//! Only two writers exist: `SessionStore::set_token`/`clear_token` (login
//! and logout) and the gateway's unauthorized hook, which calls
//! `clear_token` when the backend answers 401.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Fixed storage key for the access token
pub const TOKEN_KEY: &str = "@receiptlens:access_token";

/// Whether the user is signed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// The token store has not been queried yet
    #[default]
    Unknown,
    Authenticated,
    Unauthenticated,
}

impl AuthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Authenticated => "authenticated",
            Self::Unauthenticated => "unauthenticated",
        }
    }

    /// `None` while unresolved
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Unknown => None,
            Self::Authenticated => Some(true),
            Self::Unauthenticated => Some(false),
        }
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Durable key-value storage for the session token
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>>;

    async fn save(&self, key: &str, value: &str) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

/// JSON document on disk mapping keys to values
///
/// Writes go through a temp file in the same directory and are renamed into
/// place, so a crash never leaves a half-written document.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_document(&self, doc: BTreeMap<String, String>) -> Result<()> {
        let path = self.path.clone();
        let bytes = serde_json::to_vec_pretty(&doc)?;
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_document().await?.remove(key))
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        let mut doc = self.read_document().await?;
        doc.insert(key.to_string(), value.to_string());
        self.write_document(doc).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut doc = self.read_document().await?;
        if doc.remove(key).is_some() {
            self.write_document(doc).await?;
        }
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryTokenStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded with a token, as if persisted by an earlier run
    pub fn with_token(token: &str) -> Self {
        let store = Self::default();
        if let Ok(mut values) = store.values.lock() {
            values.insert(TOKEN_KEY.to_string(), token.to_string());
        }
        store
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| Error::Io(std::io::Error::other("token store lock poisoned")))?;
        Ok(values.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| Error::Io(std::io::Error::other("token store lock poisoned")))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| Error::Io(std::io::Error::other("token store lock poisoned")))?;
        values.remove(key);
        Ok(())
    }
}

/// Holds the session token and the derived authentication state
pub struct SessionStore {
    store: Arc<dyn TokenStore>,
    state: RwLock<AuthState>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            state: RwLock::new(AuthState::Unknown),
        }
    }

    /// Session backed by a token file on disk
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileTokenStore::new(path)))
    }

    /// Session that forgets everything on exit
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStore::new()))
    }

    /// Current state without touching the store
    pub fn auth_state(&self) -> AuthState {
        self.state.read().map(|s| *s).unwrap_or_default()
    }

    /// `None` until the store has been queried once
    pub fn is_authenticated(&self) -> Option<bool> {
        self.auth_state().as_bool()
    }

    /// Startup check: query the store once and resolve the auth state
    pub async fn restore(&self) -> Result<AuthState> {
        self.get_token().await?;
        Ok(self.auth_state())
    }

    /// Persist a new token and mark the session authenticated
    pub async fn set_token(&self, token: &str) -> Result<()> {
        if token.trim().is_empty() {
            return Err(Error::Validation("Token must not be empty".into()));
        }
        self.store.save(TOKEN_KEY, token).await?;
        self.set_state(AuthState::Authenticated);
        info!("Session started");
        Ok(())
    }

    /// Persisted token, if any
    pub async fn get_token(&self) -> Result<Option<String>> {
        let token = self.store.load(TOKEN_KEY).await?;
        let resolved = if token.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        };
        if self.auth_state() != resolved {
            debug!("Auth state resolved to {}", resolved);
            self.set_state(resolved);
        }
        Ok(token)
    }

    /// Remove the token and mark the session unauthenticated
    pub async fn clear_token(&self) -> Result<()> {
        self.store.remove(TOKEN_KEY).await?;
        self.set_state(AuthState::Unauthenticated);
        info!("Session cleared");
        Ok(())
    }

    fn set_state(&self, next: AuthState) {
        if let Ok(mut state) = self.state.write() {
            *state = next;
        }
    }
}
