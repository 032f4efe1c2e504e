//! Session Store - the single writer of the authenticated identity.
//!
//! The store owns the credential token slot and the session state. State is
//! published through a `watch` channel; consumers hold read-only
//! [`SessionHandle`]s and never mutate it.
//!
//! ```text
//! Bootstrapping ──► Anonymous ◄──► Authenticated
//!        └─────────────────────────────┘
//! ```
//!
//! Every call that ends in a new session takes a generation number when it
//! starts. A result is only published if no newer call started meanwhile, so
//! a slow response can never overwrite a fresher one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::gateway::AuthGateway;
use super::types::{Credentials, Session, UserRecord};
use crate::config::UnauthorizedPolicy;
use crate::error::{DashboardError, Result};
use crate::feedback::FeedbackEntry;
use crate::routes::{Navigator, SIGNIN_PATH};
use crate::storage::Slot;
use crate::validation::{NewUser, PasswordChangeForm, SignupForm, ValidationErrors};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Persisted token not yet resolved
    Bootstrapping,
    Anonymous,
    Authenticated(Session),
}

impl SessionState {
    pub fn loading(&self) -> bool {
        matches!(self, SessionState::Bootstrapping)
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Bootstrapping => "bootstrapping",
            SessionState::Anonymous => "anonymous",
            SessionState::Authenticated(_) => "authenticated",
        }
    }
}

/// Read-only projection of the store's state.
#[derive(Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn current(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.rx.borrow().session().cloned()
    }

    pub fn loading(&self) -> bool {
        self.rx.borrow().loading()
    }

    /// Wait for the next state change. `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<SessionState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until bootstrap has resolved.
    pub async fn ready(&mut self) -> SessionState {
        match self.rx.wait_for(|state| !state.loading()).await {
            Ok(state) => state.clone(),
            // Store dropped mid-bootstrap: nobody will ever sign in here.
            Err(_) => SessionState::Anonymous,
        }
    }
}

/// Publishes the bootstrap outcome when dropped, so loading ends exactly once
/// even if the bootstrap future is cancelled halfway.
struct BootstrapRelease<'a> {
    state: &'a watch::Sender<SessionState>,
    next: SessionState,
}

impl Drop for BootstrapRelease<'_> {
    fn drop(&mut self) {
        let next = std::mem::replace(&mut self.next, SessionState::Anonymous);
        self.state.send_if_modified(|state| {
            if state.loading() {
                *state = next;
                true
            } else {
                false
            }
        });
    }
}

pub struct SessionStore {
    gateway: Arc<dyn AuthGateway>,
    token: Slot,
    navigator: Arc<dyn Navigator>,
    policy: UnauthorizedPolicy,
    state: watch::Sender<SessionState>,
    generation: AtomicU64,
    bootstrap_started: AtomicBool,
    /// Serializes token writes with state publication.
    transition: Mutex<()>,
}

impl SessionStore {
    pub fn new(
        gateway: Arc<dyn AuthGateway>,
        token: Slot,
        navigator: Arc<dyn Navigator>,
        policy: UnauthorizedPolicy,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Bootstrapping);
        Self {
            gateway,
            token,
            navigator,
            policy,
            state,
            generation: AtomicU64::new(0),
            bootstrap_started: AtomicBool::new(false),
            transition: Mutex::new(()),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            rx: self.state.subscribe(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    pub fn gateway_name(&self) -> &'static str {
        self.gateway.name()
    }

    fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn publish(&self, next: SessionState) {
        let from = self.state.borrow().name();
        let to = next.name();
        self.state.send_replace(next);
        if from != to {
            info!(from, to, "Session state changed");
        }
    }

    // ========================================================================
    // Bootstrap
    // ========================================================================

    /// Resolve the persisted token into a session.
    ///
    /// Runs once; later calls wait for the first run and return its outcome.
    pub async fn bootstrap(&self) -> SessionState {
        if self.bootstrap_started.swap(true, Ordering::SeqCst) {
            return self.handle().ready().await;
        }

        let mut release = BootstrapRelease {
            state: &self.state,
            next: SessionState::Anonymous,
        };
        if let Some(session) = self.resolve_persisted_token().await {
            release.next = SessionState::Authenticated(session);
        }
        drop(release);

        let state = self.state();
        info!(state = state.name(), gateway = self.gateway.name(), "Session bootstrapped");
        state
    }

    async fn resolve_persisted_token(&self) -> Option<Session> {
        let token = match self.token.get().await {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted token");
                return None;
            }
        };

        match self.gateway.current_session(&token).await {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(error = %e, "Persisted token rejected, clearing it");
                if let Err(e) = self.token.remove().await {
                    warn!(error = %e, "Failed to clear persisted token");
                }
                None
            }
        }
    }

    // ========================================================================
    // Anonymous -> Authenticated
    // ========================================================================

    fn require_anonymous(&self, operation: &'static str) -> Result<()> {
        match &*self.state.borrow() {
            SessionState::Anonymous => Ok(()),
            other => Err(DashboardError::InvalidTransition {
                operation,
                state: other.name(),
            }),
        }
    }

    pub async fn signin(&self, credentials: &Credentials) -> Result<Session> {
        let mut errors = ValidationErrors::new();
        if credentials.email.trim().is_empty() {
            errors.add("email", "Email is required");
        }
        if credentials.password.is_empty() {
            errors.add("password", "Password is required");
        }
        errors.into_result()?;
        self.require_anonymous("sign in")?;

        let generation = self.begin();
        let authenticated = self.gateway.signin(credentials).await.map_err(|e| {
            info!(error = %e, "Sign in failed");
            e
        })?;
        self.establish(generation, "sign in", authenticated.token, authenticated.session)
            .await
    }

    pub async fn signup(&self, form: &SignupForm) -> Result<Session> {
        let profile = form.validate()?;
        self.require_anonymous("sign up")?;

        let generation = self.begin();
        let authenticated = self.gateway.signup(&profile).await?;
        self.establish(generation, "sign up", authenticated.token, authenticated.session)
            .await
    }

    async fn establish(
        &self,
        generation: u64,
        operation: &'static str,
        token: String,
        session: Session,
    ) -> Result<Session> {
        let _transition = self.transition.lock().await;
        if !self.is_current(generation) {
            debug!(operation, "Discarding superseded result");
            return Err(DashboardError::Superseded(operation));
        }
        self.require_anonymous(operation)?;

        self.token.set(&token).await?;
        info!(identity = %session.identity, role = %session.role, "Signed in");
        self.publish(SessionState::Authenticated(session.clone()));
        Ok(session)
    }

    // ========================================================================
    // Authenticated -> Anonymous
    // ========================================================================

    /// Clear the token and the session, then route to the signin surface.
    pub async fn signout(&self) -> Result<()> {
        let token = {
            let _transition = self.transition.lock().await;
            if self.state.borrow().session().is_none() {
                return Err(DashboardError::NotAuthenticated);
            }
            self.begin();
            let token = self.token.get().await.ok().flatten();
            let cleared = self.token.remove().await;
            self.publish(SessionState::Anonymous);
            cleared?;
            token
        };
        self.navigator.navigate(SIGNIN_PATH);

        if let Some(token) = token {
            if let Err(e) = self.gateway.signout(&token).await {
                debug!(error = %e, "Server-side logout failed");
            }
        }
        Ok(())
    }

    /// Apply the configured 401 policy. Only acts if `token` is still the
    /// persisted credential, so a late 401 from an old token cannot end a
    /// newer session.
    async fn handle_unauthorized(&self, token: &str) {
        if self.policy == UnauthorizedPolicy::Ignore {
            return;
        }

        {
            let _transition = self.transition.lock().await;
            match self.token.get().await {
                Ok(Some(current)) if current == token => {}
                _ => return,
            }
            self.begin();
            if let Err(e) = self.token.remove().await {
                warn!(error = %e, "Failed to clear rejected token");
            }
            warn!("Credential rejected by backend, signing out");
            self.publish(SessionState::Anonymous);
        }
        self.navigator.navigate(SIGNIN_PATH);
    }

    // ========================================================================
    // Authenticated -> Authenticated
    // ========================================================================

    async fn authorized(&self) -> Result<(String, Session)> {
        let session = self.session().ok_or(DashboardError::NotAuthenticated)?;
        let token = self
            .token
            .get()
            .await?
            .ok_or(DashboardError::NotAuthenticated)?;
        Ok((token, session))
    }

    async fn authorized_admin(&self) -> Result<String> {
        let (token, session) = self.authorized().await?;
        if !session.is_admin() {
            return Err(DashboardError::Forbidden);
        }
        Ok(token)
    }

    /// Route a gateway failure through the 401 policy.
    async fn checked<T>(&self, token: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_unauthorized() {
                self.handle_unauthorized(token).await;
            }
        }
        result
    }

    /// Publish a session returned by the gateway as a whole replacement.
    async fn replace(
        &self,
        generation: u64,
        operation: &'static str,
        token: &str,
        result: Result<Session>,
    ) -> Result<Session> {
        let session = self.checked(token, result).await?;

        let _transition = self.transition.lock().await;
        if !self.is_current(generation) || self.state.borrow().session().is_none() {
            debug!(operation, "Discarding superseded session update");
            return Err(DashboardError::Superseded(operation));
        }
        self.publish(SessionState::Authenticated(session.clone()));
        Ok(session)
    }

    /// Re-read the identity behind the current token.
    pub async fn refresh(&self) -> Result<Session> {
        let (token, _) = self.authorized().await?;
        let generation = self.begin();
        let result = self.gateway.current_session(&token).await;
        self.replace(generation, "refresh", &token, result).await
    }

    pub async fn change_avatar(&self, avatar: &str) -> Result<Session> {
        let avatar = avatar.trim();
        if avatar.is_empty() {
            let mut errors = ValidationErrors::new();
            errors.add("avatar", "Please select an avatar");
            return Err(errors.into());
        }
        let (token, _) = self.authorized().await?;
        let generation = self.begin();
        let result = self.gateway.change_avatar(&token, avatar).await;
        self.replace(generation, "change avatar", &token, result).await
    }

    pub async fn complete_onboarding(&self) -> Result<Session> {
        let (token, _) = self.authorized().await?;
        let generation = self.begin();
        let result = self.gateway.complete_onboarding(&token).await;
        self.replace(generation, "complete onboarding", &token, result)
            .await
    }

    pub async fn change_password(&self, form: &PasswordChangeForm) -> Result<()> {
        form.validate()?;
        let (token, _) = self.authorized().await?;
        let result = self
            .gateway
            .change_password(&token, &form.current_password, &form.new_password)
            .await;
        self.checked(&token, result).await
    }

    // ========================================================================
    // Pass-through calls
    // ========================================================================

    pub async fn list_avatars(&self) -> Result<Vec<String>> {
        self.gateway.list_avatars().await
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>> {
        let token = self.authorized_admin().await?;
        let result = self.gateway.list_users(&token).await;
        self.checked(&token, result).await
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<UserRecord> {
        user.validate()?;
        let token = self.authorized_admin().await?;
        let result = self.gateway.create_user(&token, user).await;
        self.checked(&token, result).await
    }

    pub async fn submit_feedback(&self, rating: u8, message: &str) -> Result<String> {
        let (token, _) = self.authorized().await?;
        let result = self.gateway.submit_feedback(&token, rating, message).await;
        self.checked(&token, result).await
    }

    pub async fn list_feedback(&self) -> Result<Vec<FeedbackEntry>> {
        let token = self.authorized_admin().await?;
        let result = self.gateway.list_feedback(&token).await;
        self.checked(&token, result).await
    }
}
