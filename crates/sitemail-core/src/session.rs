//! Admin login and bearer-token sessions.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::config::AdminSettings;
use crate::error::{Error, Result};

/// Random bytes per issued token, before hex encoding.
const TOKEN_BYTES: usize = 32;

/// Storage for admin session tokens.
pub trait SessionStore: Send + Sync {
    /// Creates, stores and returns a fresh token.
    fn issue(&self) -> String;

    /// Stores a token supplied from outside, such as a configured one.
    fn insert(&self, token: String);

    /// Returns true if `token` is stored and not expired.
    fn is_valid(&self, token: &str) -> bool;

    /// Removes a token. Returns true if it was present.
    fn invalidate(&self, token: &str) -> bool;
}

/// Issued sessions kept by [`MemorySessionStore::new`] before the oldest is
/// evicted.
pub const DEFAULT_MAX_SESSIONS: usize = 32;

#[derive(Debug)]
struct Session {
    seq: u64,
    expires: Option<Instant>,
    pinned: bool,
}

impl Session {
    fn is_live(&self, now: Instant) -> bool {
        self.expires.is_none_or(|at| at > now)
    }
}

#[derive(Debug, Default)]
struct Sessions {
    by_token: HashMap<String, Session>,
    next_seq: u64,
}

/// In-process session store. Tokens are lost on restart.
///
/// At most `max_sessions` issued tokens are kept; issuing past that evicts
/// the oldest. Inserted tokens are pinned: they never expire and are never
/// evicted.
#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: RwLock<Sessions>,
    ttl: Option<Duration>,
    max_sessions: usize,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self {
            sessions: RwLock::default(),
            ttl: None,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl MemorySessionStore {
    /// Creates a store whose tokens never expire.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose issued tokens expire after `ttl`.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::default()
        }
    }

    /// Sets how many issued tokens are kept (at least one).
    #[must_use]
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max.max(1);
        self
    }

    /// Number of stored tokens, expired ones included until pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_token
            .len()
    }

    /// Returns true if no tokens are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn make_room(&self, sessions: &mut Sessions, now: Instant) {
        sessions.by_token.retain(|_, session| session.is_live(now));

        loop {
            let issued = sessions.by_token.values().filter(|s| !s.pinned).count();
            if issued < self.max_sessions {
                return;
            }
            let oldest = sessions
                .by_token
                .iter()
                .filter(|(_, s)| !s.pinned)
                .min_by_key(|(_, s)| s.seq)
                .map(|(token, _)| token.clone());
            match oldest {
                Some(token) => {
                    sessions.by_token.remove(&token);
                    tracing::debug!("evicted oldest admin session");
                }
                None => return,
            }
        }
    }

    fn store(&self, token: String, expires: Option<Instant>, pinned: bool) {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if !pinned {
            self.make_room(&mut sessions, Instant::now());
        }
        let seq = sessions.next_seq;
        sessions.next_seq += 1;
        sessions.by_token.insert(
            token,
            Session {
                seq,
                expires,
                pinned,
            },
        );
    }
}

impl SessionStore for MemorySessionStore {
    fn issue(&self) -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        let expires = self.ttl.map(|ttl| Instant::now() + ttl);
        self.store(token.clone(), expires, false);
        token
    }

    fn insert(&self, token: String) {
        self.store(token, None, true);
    }

    fn is_valid(&self, token: &str) -> bool {
        let now = Instant::now();
        let sessions = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        // Visits every entry; no early exit on a match.
        sessions
            .by_token
            .iter()
            .fold(false, |found, (stored, session)| {
                let matches: bool = stored.as_bytes().ct_eq(token.as_bytes()).into();
                found | (matches & session.is_live(now))
            })
    }

    fn invalidate(&self, token: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .by_token
            .remove(token)
            .is_some()
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively.
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.trim().split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim_start();
    (!token.is_empty()).then_some(token)
}

/// Password login and token checks for the admin area.
#[derive(Clone)]
pub struct AdminAuth {
    password: Option<String>,
    fixed_token: Option<String>,
    store: Arc<dyn SessionStore>,
}

impl AdminAuth {
    /// Creates the authenticator. A configured `ADMIN_TOKEN` is stored up
    /// front so it authorizes without a login.
    #[must_use]
    pub fn new(settings: AdminSettings, store: Arc<dyn SessionStore>) -> Self {
        if let Some(token) = &settings.token {
            store.insert(token.clone());
        }
        Self {
            password: settings.password,
            fixed_token: settings.token,
            store,
        }
    }

    /// Checks `password` and returns a session token.
    ///
    /// Returns the configured `ADMIN_TOKEN` when one is set (storing it
    /// again if a logout removed it), otherwise issues a new random token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AdminDisabled`] if no password is configured,
    /// [`Error::MissingField`] for an empty password and
    /// [`Error::Unauthorized`] for a wrong one.
    pub fn login(&self, password: &str) -> Result<String> {
        let expected = self.password.as_deref().ok_or(Error::AdminDisabled)?;
        if password.is_empty() {
            return Err(Error::MissingField("password"));
        }
        if !bool::from(password.as_bytes().ct_eq(expected.as_bytes())) {
            tracing::warn!("admin login rejected");
            return Err(Error::Unauthorized);
        }

        let token = match &self.fixed_token {
            Some(token) => {
                // Re-arm in case an earlier logout removed it.
                self.store.insert(token.clone());
                token.clone()
            }
            None => self.store.issue(),
        };
        tracing::info!("admin logged in");
        Ok(token)
    }

    /// Checks an `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] if the header is absent, malformed or
    /// carries an unknown token.
    pub fn authorize(&self, header: Option<&str>) -> Result<()> {
        match header.and_then(bearer_token) {
            Some(token) if self.store.is_valid(token) => Ok(()),
            _ => Err(Error::Unauthorized),
        }
    }

    /// Ends the session carried by an `Authorization` header value.
    ///
    /// Returns true if a session was removed.
    pub fn logout(&self, header: Option<&str>) -> bool {
        header
            .and_then(bearer_token)
            .is_some_and(|token| self.store.invalidate(token))
    }
}

impl std::fmt::Debug for AdminAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAuth")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("fixed_token", &self.fixed_token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn settings(password: Option<&str>, token: Option<&str>) -> AdminSettings {
        AdminSettings {
            password: password.map(str::to_string),
            token: token.map(str::to_string),
        }
    }

    fn auth(password: Option<&str>, token: Option<&str>) -> AdminAuth {
        AdminAuth::new(settings(password, token), Arc::new(MemorySessionStore::new()))
    }

    #[test]
    fn issued_tokens_are_random_hex() {
        let store = MemorySessionStore::new();
        let a = store.issue();
        let b = store.issue();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
        assert!(store.is_valid(&a));
        assert!(store.is_valid(&b));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn unknown_and_invalidated_tokens_rejected() {
        let store = MemorySessionStore::new();
        let token = store.issue();
        assert!(!store.is_valid("deadbeef"));
        assert!(!store.is_valid(""));
        assert!(store.invalidate(&token));
        assert!(!store.is_valid(&token));
        assert!(!store.invalidate(&token));
    }

    #[test]
    fn tokens_expire_after_ttl() {
        let store = MemorySessionStore::with_ttl(Duration::ZERO);
        let token = store.issue();
        assert!(!store.is_valid(&token));

        // Issuing prunes the expired entry.
        let _ = store.issue();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn oldest_issued_token_evicted_at_capacity() {
        let store = MemorySessionStore::new().max_sessions(3);
        store.insert("fixed".to_string());
        let tokens: Vec<String> = (0..4).map(|_| store.issue()).collect();

        assert!(!store.is_valid(&tokens[0]));
        assert!(tokens[1..].iter().all(|t| store.is_valid(t)));
        assert!(store.is_valid("fixed"));
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn repeated_logins_stay_bounded() {
        let store = Arc::new(MemorySessionStore::new());
        let auth = AdminAuth::new(settings(Some("secret"), None), store.clone());

        let first = auth.login("secret").unwrap();
        let mut last = first.clone();
        for _ in 0..10_000 {
            last = auth.login("secret").unwrap();
        }

        assert_eq!(store.len(), DEFAULT_MAX_SESSIONS);
        assert!(auth.authorize(Some(&format!("Bearer {last}"))).is_ok());
        assert!(auth.authorize(Some(&format!("Bearer {first}"))).is_err());
    }

    #[test]
    fn inserted_tokens_do_not_expire() {
        let store = MemorySessionStore::with_ttl(Duration::ZERO);
        store.insert("fixed".to_string());
        assert!(store.is_valid("fixed"));
    }

    #[test]
    fn bearer_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer   abc"), Some("abc"));
        assert_eq!(bearer_token("BEARER\tabc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer   "), None);
        assert_eq!(bearer_token(""), None);
    }

    #[test]
    fn login_without_password_configured() {
        let auth = auth(None, None);
        assert!(matches!(auth.login("x"), Err(Error::AdminDisabled)));
    }

    #[test]
    fn login_checks_password() {
        let auth = auth(Some("secret"), None);
        assert!(matches!(auth.login("secre"), Err(Error::Unauthorized)));
        assert!(matches!(auth.login("secret!"), Err(Error::Unauthorized)));
        assert!(matches!(auth.login(""), Err(Error::MissingField("password"))));

        let token = auth.login("secret").unwrap();
        let header = format!("Bearer {token}");
        auth.authorize(Some(&header)).unwrap();
    }

    #[test]
    fn fixed_token_authorizes_without_login() {
        let auth = auth(Some("secret"), Some("tok123"));
        auth.authorize(Some("Bearer tok123")).unwrap();
        assert_eq!(auth.login("secret").unwrap(), "tok123");
    }

    #[test]
    fn login_restores_fixed_token_after_logout() {
        let auth = auth(Some("secret"), Some("tok123"));
        assert!(auth.logout(Some("Bearer tok123")));
        assert!(auth.authorize(Some("Bearer tok123")).is_err());

        assert_eq!(auth.login("secret").unwrap(), "tok123");
        auth.authorize(Some("Bearer tok123")).unwrap();
    }

    #[test]
    fn authorize_rejects_missing_or_bad_header() {
        let auth = auth(Some("secret"), None);
        assert!(matches!(auth.authorize(None), Err(Error::Unauthorized)));
        assert!(matches!(
            auth.authorize(Some("Bearer nope")),
            Err(Error::Unauthorized)
        ));
        assert!(matches!(
            auth.authorize(Some("Token abc")),
            Err(Error::Unauthorized)
        ));
    }

    #[test]
    fn logout_ends_session() {
        let auth = auth(Some("secret"), None);
        let header = format!("Bearer {}", auth.login("secret").unwrap());
        assert!(auth.logout(Some(&header)));
        assert!(auth.authorize(Some(&header)).is_err());
        assert!(!auth.logout(Some(&header)));
        assert!(!auth.logout(None));
    }

    #[test]
    fn debug_redacts_secrets() {
        let rendered = format!("{:?}", auth(Some("secret"), Some("tok123")));
        assert!(!rendered.contains("secret"));
        assert!(!rendered.contains("tok123"));
    }
}
