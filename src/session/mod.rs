mod storage;

pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const ADMIN_TOKEN_KEY: &str = "admin_token";
pub const ADMIN_USER_KEY: &str = "admin_user";
pub const LOGIN_ROUTE: &str = "/login";

/// Admin user record persisted next to the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// Where the guard is running. Outside a browser there is no session storage
/// and no navigation, so every operation is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    Browser,
    Server,
}

impl ExecutionContext {
    pub fn is_browser(self) -> bool {
        matches!(self, ExecutionContext::Browser)
    }
}

/// Performs full-page navigation.
pub trait Navigator: Send + Sync {
    fn redirect(&self, route: &str);
}

/// Client-side admin session gate over a key-value store.
///
/// Reads never fail: storage errors and unparsable user records are logged
/// and treated as an absent session.
pub struct SessionGuard<S, N> {
    store: S,
    navigator: N,
    context: ExecutionContext,
}

impl<S, N> SessionGuard<S, N>
where
    S: KeyValueStore,
    N: Navigator,
{
    pub fn new(store: S, navigator: N, context: ExecutionContext) -> Self {
        Self {
            store,
            navigator,
            context,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    /// Returns the stored user when both keys are present and the record parses.
    pub fn current_user(&self) -> Option<AdminUser> {
        if !self.context.is_browser() {
            return None;
        }

        self.read(ADMIN_TOKEN_KEY)?;
        let raw = self.read(ADMIN_USER_KEY)?;

        match serde_json::from_str::<AdminUser>(&raw) {
            Ok(user) => Some(user),
            Err(err) => {
                debug!(?err, "stored admin user is not valid JSON");
                None
            }
        }
    }

    /// True iff both keys are present. The user record is not parsed here, so a
    /// session with a corrupt record is authenticated yet has no current user.
    pub fn is_authenticated(&self) -> bool {
        if !self.context.is_browser() {
            return false;
        }

        self.read(ADMIN_TOKEN_KEY).is_some() && self.read(ADMIN_USER_KEY).is_some()
    }

    pub fn token(&self) -> Option<String> {
        if !self.context.is_browser() {
            return None;
        }
        self.read(ADMIN_TOKEN_KEY)
    }

    /// Redirects to the sign-in route when there is no session.
    pub fn require_auth(&self) -> Option<AdminUser> {
        if !self.context.is_browser() {
            return None;
        }

        if !self.is_authenticated() {
            debug!("no admin session, redirecting to sign-in");
            self.navigator.redirect(LOGIN_ROUTE);
            return None;
        }

        self.current_user()
    }

    /// Clears both keys and always redirects to the sign-in route.
    pub fn logout(&self) {
        if !self.context.is_browser() {
            return;
        }

        for key in [ADMIN_TOKEN_KEY, ADMIN_USER_KEY] {
            if let Err(err) = self.store.remove(key) {
                warn!(?err, key, "failed to clear session key");
            }
        }

        info!("admin session cleared");
        self.navigator.redirect(LOGIN_ROUTE);
    }

    /// Persists a session produced by the sign-in flow.
    pub fn store_session(&self, token: &str, user: &AdminUser) -> Result<()> {
        if !self.context.is_browser() {
            return Ok(());
        }

        let user_json = serde_json::to_string(user).context("failed to encode admin user")?;
        self.store
            .set(ADMIN_TOKEN_KEY, token)
            .context("failed to store admin token")?;
        self.store
            .set(ADMIN_USER_KEY, &user_json)
            .context("failed to store admin user")?;

        info!(user_id = %user.id, "admin session stored");
        Ok(())
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(err) => {
                warn!(?err, key, "failed to read session storage");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use anyhow::anyhow;

    use super::*;

    #[derive(Default)]
    struct RecordingNavigator {
        routes: Mutex<Vec<String>>,
    }

    impl RecordingNavigator {
        fn routes(&self) -> Vec<String> {
            self.routes.lock().expect("routes lock").clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn redirect(&self, route: &str) {
            self.routes.lock().expect("routes lock").push(route.to_string());
        }
    }

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(anyhow!("storage disabled"))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(anyhow!("storage disabled"))
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Err(anyhow!("storage disabled"))
        }
    }

    /// Wraps a [`MemoryStore`] and counts every call that reaches it.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl KeyValueStore for CountingStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.remove(key)
        }
    }

    const VALID_USER: &str = r#"{"id":"1","name":"A","email":"a@b.com","role":"admin"}"#;

    fn guard_with(
        entries: &[(&str, &str)],
        context: ExecutionContext,
    ) -> SessionGuard<MemoryStore, RecordingNavigator> {
        let store = MemoryStore::with_entries(entries.iter().copied());
        SessionGuard::new(store, RecordingNavigator::default(), context)
    }

    fn sample_user() -> AdminUser {
        AdminUser {
            id: "1".to_string(),
            name: "A".to_string(),
            email: "a@b.com".to_string(),
            role: "admin".to_string(),
        }
    }

    #[test]
    fn empty_storage_is_unauthenticated() {
        let guard = guard_with(&[], ExecutionContext::Browser);
        assert!(!guard.is_authenticated());
        assert_eq!(guard.current_user(), None);
        assert_eq!(guard.token(), None);
    }

    #[test]
    fn valid_session_returns_user() {
        let guard = guard_with(
            &[(ADMIN_TOKEN_KEY, "t"), (ADMIN_USER_KEY, VALID_USER)],
            ExecutionContext::Browser,
        );
        assert!(guard.is_authenticated());
        assert_eq!(guard.current_user(), Some(sample_user()));
        assert_eq!(guard.token().as_deref(), Some("t"));
    }

    #[test]
    fn corrupt_user_is_authenticated_but_userless() {
        let guard = guard_with(
            &[(ADMIN_TOKEN_KEY, "t"), (ADMIN_USER_KEY, "{oops")],
            ExecutionContext::Browser,
        );
        assert!(guard.is_authenticated());
        assert_eq!(guard.current_user(), None);
        // Corrupt records are not repaired.
        assert!(guard.store().contains(ADMIN_USER_KEY));
    }

    #[test]
    fn user_without_token_is_absent() {
        let guard = guard_with(&[(ADMIN_USER_KEY, VALID_USER)], ExecutionContext::Browser);
        assert!(!guard.is_authenticated());
        assert_eq!(guard.current_user(), None);
    }

    #[test]
    fn logout_clears_keys_and_redirects() {
        let guard = guard_with(
            &[(ADMIN_TOKEN_KEY, "t"), (ADMIN_USER_KEY, VALID_USER)],
            ExecutionContext::Browser,
        );
        guard.logout();
        assert!(!guard.store().contains(ADMIN_TOKEN_KEY));
        assert!(!guard.store().contains(ADMIN_USER_KEY));
        assert_eq!(guard.navigator().routes(), vec!["/login".to_string()]);
    }

    #[test]
    fn logout_redirects_even_without_session() {
        let guard = guard_with(&[], ExecutionContext::Browser);
        guard.logout();
        guard.logout();
        assert_eq!(guard.navigator().routes(), vec!["/login", "/login"]);
    }

    #[test]
    fn require_auth_redirects_when_missing() {
        let guard = guard_with(&[(ADMIN_TOKEN_KEY, "t")], ExecutionContext::Browser);
        assert_eq!(guard.require_auth(), None);
        assert_eq!(guard.navigator().routes(), vec!["/login"]);
    }

    #[test]
    fn require_auth_returns_user_without_redirect() {
        let guard = guard_with(
            &[(ADMIN_TOKEN_KEY, "t"), (ADMIN_USER_KEY, VALID_USER)],
            ExecutionContext::Browser,
        );
        assert_eq!(guard.require_auth(), Some(sample_user()));
        assert!(guard.navigator().routes().is_empty());
    }

    #[test]
    fn require_auth_with_corrupt_user_returns_none_without_redirect() {
        let guard = guard_with(
            &[(ADMIN_TOKEN_KEY, "t"), (ADMIN_USER_KEY, "not json")],
            ExecutionContext::Browser,
        );
        assert_eq!(guard.require_auth(), None);
        assert!(guard.navigator().routes().is_empty());
    }

    #[test]
    fn server_context_never_touches_storage_or_redirects() {
        let guard = guard_with(
            &[(ADMIN_TOKEN_KEY, "t"), (ADMIN_USER_KEY, VALID_USER)],
            ExecutionContext::Server,
        );
        assert!(!guard.is_authenticated());
        assert_eq!(guard.current_user(), None);
        assert_eq!(guard.require_auth(), None);
        guard.logout();
        assert!(guard.store().contains(ADMIN_TOKEN_KEY));
        assert!(guard.navigator().routes().is_empty());
    }

    #[test]
    fn server_context_makes_no_storage_calls() {
        let guard = SessionGuard::new(
            CountingStore::default(),
            RecordingNavigator::default(),
            ExecutionContext::Server,
        );
        assert!(!guard.is_authenticated());
        assert_eq!(guard.current_user(), None);
        assert_eq!(guard.token(), None);
        assert_eq!(guard.require_auth(), None);
        guard.logout();
        guard
            .store_session("token-123", &sample_user())
            .expect("no-op on server");
        assert_eq!(guard.store().calls(), 0);
        assert!(guard.navigator().routes().is_empty());

        let browser = SessionGuard::new(
            CountingStore::default(),
            RecordingNavigator::default(),
            ExecutionContext::Browser,
        );
        assert!(!browser.is_authenticated());
        assert!(browser.store().calls() > 0);
    }

    #[test]
    fn storage_errors_map_to_absent_session() {
        let guard = SessionGuard::new(
            FailingStore,
            RecordingNavigator::default(),
            ExecutionContext::Browser,
        );
        assert!(!guard.is_authenticated());
        assert_eq!(guard.current_user(), None);
        guard.logout();
        assert_eq!(guard.navigator().routes(), vec!["/login"]);
    }

    #[test]
    fn store_session_round_trips() {
        let guard = guard_with(&[], ExecutionContext::Browser);
        guard
            .store_session("token-123", &sample_user())
            .expect("store session");
        assert!(guard.is_authenticated());
        assert_eq!(guard.current_user(), Some(sample_user()));
    }
}
