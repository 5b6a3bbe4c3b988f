use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use qltb_types::wire::{AuthPayload, LoginEnvelope, LoginRequest, RegisterEnvelope, WireUser};
use qltb_types::{Credential, Identity, Redirect};
use tokio::sync::watch;
use tokio::time::Instant;

use super::error::{
    AuthError, classify_login_failure, classify_registration_failure, login_rejected,
    rate_limit_cooldown, registration_rejected,
};
use super::form::{self, RegistrationProfile};
use super::session::{Session, SessionStatus};
use super::store::{CredentialStore, TOKEN_KEY, USER_KEY};
use crate::api::ApiClient;

/// Result of a successful login or registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSuccess {
    pub identity: Identity,
    pub redirect: Redirect,
}

#[derive(Debug, Clone, Copy)]
struct Cooldown {
    until: Instant,
    retry_after: DateTime<Utc>,
}

/// Single owner of the session.
///
/// Create one per process and hand out [`SessionManager::subscribe`]
/// receivers to anything that needs to observe sign-in state. Operations take
/// `&mut self`, so a second login cannot start while one is in flight.
pub struct SessionManager<S: CredentialStore> {
    api: ApiClient,
    store: S,
    state: watch::Sender<Session>,
    cooldown: Option<Cooldown>,
    restored: bool,
}

impl<S: CredentialStore> SessionManager<S> {
    pub fn new(api: ApiClient, store: S) -> Self {
        Self {
            api,
            store,
            state: watch::Sender::new(Session::Anonymous),
            cooldown: None,
            restored: false,
        }
    }

    /// Receiver that sees every session transition.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Reads the persisted session, once per manager.
    ///
    /// Absent, partial or invalid data (including an unrecognized role) leaves
    /// the session anonymous and clears storage.
    pub fn restore(&mut self) -> SessionStatus {
        if self.restored {
            return self.status();
        }
        self.restored = true;

        self.transition(Session::Authenticating);
        match self.load_persisted() {
            Ok(Some((identity, credential))) => {
                tracing::debug!(
                    user = %identity.email,
                    role = %identity.role,
                    token = %credential,
                    "restored session"
                );
                self.transition(Session::authenticated(identity, credential));
            }
            Ok(None) => {
                self.clear_storage();
                self.transition(Session::Anonymous);
            }
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "discarding persisted session");
                self.clear_storage();
                self.transition(Session::Anonymous);
            }
        }
        self.status()
    }

    /// Signs in with email and password.
    ///
    /// # Errors
    /// Returns the classified [`AuthError`]. Local rejections
    /// ([`AuthError::AlreadySignedIn`], [`AuthError::Validation`],
    /// [`AuthError::SubmitDisabled`]) leave the session and storage untouched; an unrecognized role returns it to anonymous; every
    /// other failure leaves it in the error state.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<AuthSuccess, AuthError> {
        self.ensure_signed_out()?;
        self.ensure_submit_enabled()?;
        let email = form::check_login(email, password)?;

        self.transition(Session::Authenticating);
        let request = LoginRequest {
            email: &email,
            password,
        };
        let outcome = match self.api.login(&request).await {
            Ok(envelope) => accept_login(envelope),
            Err(err) => Err(classify_login_failure(err, Utc::now())),
        };
        self.settle(outcome)
    }

    /// Creates an account and signs in as it.
    ///
    /// # Errors
    /// As [`SessionManager::login`]; a password confirmation mismatch fails
    /// with [`AuthError::PasswordMismatch`] before contacting the service.
    pub async fn register(
        &mut self,
        profile: &RegistrationProfile,
    ) -> Result<AuthSuccess, AuthError> {
        self.ensure_signed_out()?;
        self.ensure_submit_enabled()?;
        let request = profile.to_request()?;

        self.transition(Session::Authenticating);
        let outcome = match self.api.register(&request).await {
            Ok(envelope) => accept_registration(envelope),
            Err(err) => Err(classify_registration_failure(err, Utc::now())),
        };
        self.settle(outcome)
    }

    /// Signs out and clears storage. Returns false when nobody was signed in.
    pub fn logout(&mut self) -> bool {
        if matches!(*self.state.borrow(), Session::Anonymous) {
            return false;
        }
        self.clear_storage();
        self.transition(Session::Anonymous);
        true
    }

    /// Drops the in-memory session without touching storage, so the next
    /// process restores it.
    pub fn teardown(&mut self) {
        self.transition(Session::Anonymous);
    }

    pub fn is_submit_enabled(&self) -> bool {
        self.active_cooldown().is_none()
    }

    /// When submitting re-enables, while a rate-limit cool-down is running.
    pub fn retry_after(&self) -> Option<DateTime<Utc>> {
        self.active_cooldown().map(|c| c.retry_after)
    }

    /// Sleeps until the cool-down, if any, has elapsed.
    pub async fn wait_until_submit_enabled(&self) {
        if let Some(cooldown) = self.active_cooldown() {
            tokio::time::sleep_until(cooldown.until).await;
        }
    }

    fn active_cooldown(&self) -> Option<Cooldown> {
        self.cooldown.filter(|c| Instant::now() < c.until)
    }

    // Leaving an authenticated session goes through logout only.
    fn ensure_signed_out(&self) -> Result<(), AuthError> {
        if self.state.borrow().is_authenticated() {
            return Err(AuthError::AlreadySignedIn);
        }
        Ok(())
    }

    fn ensure_submit_enabled(&mut self) -> Result<(), AuthError> {
        match self.active_cooldown() {
            Some(cooldown) => Err(AuthError::SubmitDisabled {
                retry_after: cooldown.retry_after,
            }),
            None => {
                self.cooldown = None;
                Ok(())
            }
        }
    }

    fn start_cooldown(&mut self, retry_after: DateTime<Utc>) {
        self.cooldown = Some(Cooldown {
            until: Instant::now() + rate_limit_cooldown(),
            retry_after,
        });
    }

    fn settle(
        &mut self,
        outcome: Result<(Identity, Credential), AuthError>,
    ) -> Result<AuthSuccess, AuthError> {
        match outcome {
            Ok((identity, credential)) => {
                if let Err(e) = self.persist(&identity, &credential) {
                    self.clear_storage();
                    let err = AuthError::Storage(format!("{e:#}"));
                    self.transition(Session::Error(err.clone()));
                    return Err(err);
                }
                let redirect = identity.role.home();
                tracing::debug!(user = %identity.email, %redirect, "signed in");
                self.cooldown = None;
                self.transition(Session::authenticated(identity.clone(), credential));
                Ok(AuthSuccess { identity, redirect })
            }
            Err(err) => {
                if let AuthError::InvalidRole(_) = err {
                    self.transition(Session::Anonymous);
                } else {
                    if let AuthError::RateLimited { retry_after, .. } = err {
                        self.start_cooldown(retry_after);
                    }
                    self.transition(Session::Error(err.clone()));
                }
                Err(err)
            }
        }
    }

    fn load_persisted(&self) -> Result<Option<(Identity, Credential)>> {
        let token = self.store.get(TOKEN_KEY).context("Failed to read token")?;
        let user = self.store.get(USER_KEY).context("Failed to read user")?;

        match (token, user) {
            (None, None) => Ok(None),
            (Some(token), Some(user)) => {
                let Some(credential) = Credential::new(token) else {
                    bail!("persisted token is blank");
                };
                let identity = Identity::from_json(&user).context("Invalid persisted user")?;
                Ok(Some((identity, credential)))
            }
            _ => bail!("persisted session is incomplete"),
        }
    }

    fn persist(&mut self, identity: &Identity, credential: &Credential) -> Result<()> {
        let user = identity.to_json().context("Failed to serialize identity")?;
        self.store.set(TOKEN_KEY, credential.expose())?;
        self.store.set(USER_KEY, &user)?;
        Ok(())
    }

    fn clear_storage(&mut self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.store.remove(key) {
                tracing::warn!(key, error = %format!("{e:#}"), "failed to clear stored session");
            }
        }
    }

    fn transition(&self, next: Session) {
        let previous = self.state.send_replace(next);
        tracing::debug!(
            from = previous.status().as_str(),
            to = self.state.borrow().status().as_str(),
            "session transition"
        );
    }
}

fn accept_login(envelope: LoginEnvelope) -> Result<(Identity, Credential), AuthError> {
    let success = envelope.is_success();
    let LoginEnvelope { message, data, .. } = envelope;
    match data.and_then(AuthPayload::into_parts) {
        Some((user, token)) if success => accept_payload(user, token),
        _ => Err(login_rejected(message)),
    }
}

fn accept_registration(envelope: RegisterEnvelope) -> Result<(Identity, Credential), AuthError> {
    let RegisterEnvelope {
        success,
        message,
        data,
    } = envelope;
    match data.and_then(AuthPayload::into_parts) {
        Some((user, token)) if success => accept_payload(user, token),
        _ => Err(registration_rejected(message)),
    }
}

fn accept_payload(user: WireUser, token: String) -> Result<(Identity, Credential), AuthError> {
    let identity = Identity::try_from(user)?;
    let credential = Credential::new(token)
        .ok_or_else(|| AuthError::MalformedResponse("token is empty".to_string()))?;
    Ok((identity, credential))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use qltb_types::Role;
    use serde_json::{Value, json};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::{LOGIN_PATH, REGISTER_PATH};
    use crate::auth::error::FormField;
    use crate::auth::store::MemoryCredentialStore;

    fn can_bind_localhost() -> bool {
        std::net::TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn user(role: &str) -> Value {
        json!({
            "_id": "65f0c2",
            "fullName": "Lab Admin",
            "email": "admin@equipment.com",
            "role": role,
            "isActive": true
        })
    }

    fn offline_manager() -> SessionManager<MemoryCredentialStore> {
        let api = ApiClient::new("http://127.0.0.1:9", Some(Duration::from_secs(2))).unwrap();
        SessionManager::new(api, MemoryCredentialStore::new())
    }

    fn manager_for(server: &MockServer) -> SessionManager<MemoryCredentialStore> {
        let api = ApiClient::new(server.uri(), None).unwrap();
        SessionManager::new(api, MemoryCredentialStore::new())
    }

    fn seeded(token: Option<&str>, user: Option<&str>) -> SessionManager<MemoryCredentialStore> {
        let mut manager = offline_manager();
        if let Some(token) = token {
            manager.store.set(TOKEN_KEY, token).unwrap();
        }
        if let Some(user) = user {
            manager.store.set(USER_KEY, user).unwrap();
        }
        manager
    }

    async fn mount_login(server: &MockServer, response: ResponseTemplate, hits: u64) {
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(response)
            .expect(hits)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_admin_login_persists_and_redirects() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .and(body_json(
                json!({"email": "admin@equipment.com", "password": "admin123456"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"user": user("admin"), "token": "abc"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut manager = manager_for(&server);
        let mut updates = manager.subscribe();

        let success = manager
            .login("admin@equipment.com", "admin123456")
            .await
            .unwrap();
        assert_eq!(success.redirect, Redirect::AdminHome);
        assert_eq!(success.identity.role, Role::Admin);
        assert_eq!(manager.status(), SessionStatus::Authenticated);
        assert_eq!(manager.store().get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));
        assert!(manager.store().get(USER_KEY).unwrap().is_some());

        assert!(updates.has_changed().unwrap());
        assert!(updates.borrow_and_update().is_authenticated());
    }

    #[tokio::test]
    async fn test_401_is_password_field_error() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        mount_login(
            &server,
            ResponseTemplate::new(401).set_body_json(json!({"message": "Unauthorized"})),
            1,
        )
        .await;

        let mut manager = manager_for(&server);
        let err = manager
            .login("admin@equipment.com", "wrong-password")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials { .. }));
        assert_eq!(manager.status(), SessionStatus::Error);
        assert_eq!(manager.session().error(), Some(&err));

        let field_error = err.field_error().unwrap();
        assert_eq!(field_error.field, FormField::Password);
        assert_ne!(field_error.field, FormField::Email);
        assert!(manager.store().is_empty());
        assert!(manager.is_submit_enabled());
    }

    #[tokio::test]
    async fn test_429_disables_submit_without_contacting_service() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        mount_login(
            &server,
            ResponseTemplate::new(429).set_body_json(json!({"error": "Too many requests"})),
            1,
        )
        .await;

        let mut manager = manager_for(&server);
        let err = manager
            .login("admin@equipment.com", "admin123456")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::RateLimited { ref message, .. } if message == "Too many requests"));
        assert!(!manager.is_submit_enabled());
        assert_eq!(manager.retry_after(), err.retry_after());

        let again = manager
            .login("admin@equipment.com", "admin123456")
            .await
            .unwrap_err();
        assert!(matches!(again, AuthError::SubmitDisabled { .. }));
        assert_eq!(manager.status(), SessionStatus::Error);

        server.verify().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_reenables_after_sixty_seconds() {
        let mut manager = offline_manager();
        manager.start_cooldown(Utc::now());
        assert!(!manager.is_submit_enabled());

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!manager.is_submit_enabled());
        let err = manager.login("a@b.co", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::SubmitDisabled { .. }));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(manager.is_submit_enabled());
        assert!(manager.retry_after().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_submit_enabled() {
        let mut manager = offline_manager();
        manager.start_cooldown(Utc::now());
        let started = Instant::now();
        manager.wait_until_submit_enabled().await;
        assert!(started.elapsed() >= Duration::from_secs(60));
        assert!(manager.is_submit_enabled());
    }

    #[tokio::test]
    async fn test_invalid_role_reverts_to_anonymous() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        mount_login(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"user": user("librarian"), "token": "abc"}
            })),
            1,
        )
        .await;

        let mut manager = manager_for(&server);
        let err = manager
            .login("admin@equipment.com", "admin123456")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRole(_)));
        assert_eq!(manager.status(), SessionStatus::Anonymous);
        assert!(manager.store().is_empty());
    }

    #[tokio::test]
    async fn test_success_without_token_is_rejected() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        mount_login(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "message": "half a response",
                "data": {"user": user("admin")}
            })),
            1,
        )
        .await;

        let mut manager = manager_for(&server);
        let err = manager
            .login("admin@equipment.com", "admin123456")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::AuthService {
                status: None,
                message: "half a response".to_string()
            }
        );
        assert_eq!(manager.status(), SessionStatus::Error);
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let mut manager = offline_manager();
        let err = manager
            .login("admin@equipment.com", "admin123456")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Transport(_)), "got {err:?}");
        assert_eq!(manager.status(), SessionStatus::Error);
        assert!(manager.is_submit_enabled());
    }

    #[tokio::test]
    async fn test_validation_does_not_change_state() {
        let mut manager = offline_manager();
        let updates = manager.subscribe();
        let err = manager.login("not-an-email", "pw").await.unwrap_err();
        assert_eq!(err.field_error().unwrap().field, FormField::Email);
        assert_eq!(manager.status(), SessionStatus::Anonymous);
        assert!(!updates.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_retry_after_error_state() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_login(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"user": user("student"), "token": "student-token"}
            })),
            1,
        )
        .await;

        let mut manager = manager_for(&server);
        assert!(manager.login("admin@equipment.com", "pw123456").await.is_err());
        assert_eq!(manager.status(), SessionStatus::Error);

        let success = manager.login("admin@equipment.com", "pw123456").await.unwrap();
        assert_eq!(success.redirect, Redirect::StudentHome);
        assert_eq!(manager.status(), SessionStatus::Authenticated);
    }

    #[tokio::test]
    async fn test_login_over_restored_session_is_refused() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        mount_login(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"user": user("librarian"), "token": "other"}
            })),
            0,
        )
        .await;

        let identity = Identity::from_json(&user("admin").to_string()).unwrap();
        let mut manager = manager_for(&server);
        manager.store.set(TOKEN_KEY, "abc").unwrap();
        manager
            .store
            .set(USER_KEY, &identity.to_json().unwrap())
            .unwrap();
        assert_eq!(manager.restore(), SessionStatus::Authenticated);
        let updates = manager.subscribe();

        let err = manager
            .login("admin@equipment.com", "admin123456")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::AlreadySignedIn);
        let err = manager.register(&profile()).await.unwrap_err();
        assert_eq!(err, AuthError::AlreadySignedIn);

        assert_eq!(manager.status(), SessionStatus::Authenticated);
        assert!(!updates.has_changed().unwrap());
        assert_eq!(manager.store().get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));

        assert!(manager.logout());
        assert!(manager.store().is_empty());
        server.verify().await;
    }

    #[test]
    fn test_logout_twice() {
        let identity = Identity::from_json(&user("admin").to_string()).unwrap();
        let mut manager = seeded(Some("abc"), Some(&identity.to_json().unwrap()));
        assert_eq!(manager.restore(), SessionStatus::Authenticated);

        assert!(manager.logout());
        assert_eq!(manager.status(), SessionStatus::Anonymous);
        assert!(manager.store().is_empty());

        assert!(!manager.logout());
        assert_eq!(manager.status(), SessionStatus::Anonymous);
    }

    #[test]
    fn test_restore_valid_session() {
        let identity = Identity::from_json(&user("student").to_string()).unwrap();
        let mut manager = seeded(Some("abc"), Some(&identity.to_json().unwrap()));
        let mut updates = manager.subscribe();

        assert_eq!(manager.restore(), SessionStatus::Authenticated);
        let session = updates.borrow_and_update().clone();
        assert_eq!(session.identity(), Some(&identity));
        assert_eq!(session.credential().map(Credential::expose), Some("abc"));
    }

    #[test]
    fn test_restore_unknown_role_clears_storage() {
        let mut manager = seeded(Some("abc"), Some(&user("librarian").to_string()));
        assert_eq!(manager.restore(), SessionStatus::Anonymous);
        assert!(manager.store().is_empty());
    }

    #[test]
    fn test_restore_rejects_malformed_and_partial_data() {
        let mut manager = seeded(Some("abc"), Some("{not json"));
        assert_eq!(manager.restore(), SessionStatus::Anonymous);
        assert!(manager.store().is_empty());

        let mut manager = seeded(Some("abc"), None);
        assert_eq!(manager.restore(), SessionStatus::Anonymous);
        assert!(manager.store().is_empty());

        let mut manager = seeded(Some("  "), Some(&user("admin").to_string()));
        assert_eq!(manager.restore(), SessionStatus::Anonymous);
        assert!(manager.store().is_empty());
    }

    #[test]
    fn test_restore_runs_once() {
        let mut manager = seeded(None, None);
        assert_eq!(manager.restore(), SessionStatus::Anonymous);

        let identity = Identity::from_json(&user("admin").to_string()).unwrap();
        manager.store.set(TOKEN_KEY, "abc").unwrap();
        manager
            .store
            .set(USER_KEY, &identity.to_json().unwrap())
            .unwrap();
        assert_eq!(manager.restore(), SessionStatus::Anonymous);
    }

    #[test]
    fn test_teardown_keeps_storage() {
        let identity = Identity::from_json(&user("admin").to_string()).unwrap();
        let mut manager = seeded(Some("abc"), Some(&identity.to_json().unwrap()));
        manager.restore();
        manager.teardown();
        assert_eq!(manager.status(), SessionStatus::Anonymous);
        assert_eq!(manager.store().get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));
    }

    fn profile() -> RegistrationProfile {
        RegistrationProfile {
            full_name: "Tran Thi B".to_string(),
            email: "B.Tran@Student.edu".to_string(),
            password: "secret123".to_string(),
            confirm_password: "secret123".to_string(),
            ..RegistrationProfile::default()
        }
    }

    #[tokio::test]
    async fn test_register_mismatch_is_local() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(REGISTER_PATH))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let mut manager = manager_for(&server);
        let mut input = profile();
        input.confirm_password = "different".to_string();
        let err = manager.register(&input).await.unwrap_err();
        assert_eq!(err, AuthError::PasswordMismatch);
        assert_eq!(manager.status(), SessionStatus::Anonymous);

        server.verify().await;
    }

    #[tokio::test]
    async fn test_register_success_signs_in_as_student() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(REGISTER_PATH))
            .and(body_json(json!({
                "fullName": "Tran Thi B",
                "email": "b.tran@student.edu",
                "password": "secret123"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "success": true,
                "data": {
                    "user": {
                        "_id": "s1",
                        "fullName": "Tran Thi B",
                        "email": "b.tran@student.edu",
                        "role": "student"
                    },
                    "token": "fresh-student-token"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut manager = manager_for(&server);
        let success = manager.register(&profile()).await.unwrap();
        assert_eq!(success.redirect, Redirect::StudentHome);
        assert_eq!(manager.status(), SessionStatus::Authenticated);
        assert_eq!(
            manager.store().get(TOKEN_KEY).unwrap().as_deref(),
            Some("fresh-student-token")
        );
    }

    #[tokio::test]
    async fn test_register_failure_surfaces_message() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(REGISTER_PATH))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"success": false, "message": "Email already exists"})),
            )
            .mount(&server)
            .await;

        let mut manager = manager_for(&server);
        let err = manager.register(&profile()).await.unwrap_err();
        assert_eq!(err, AuthError::Registration("Email already exists".to_string()));
        assert_eq!(manager.status(), SessionStatus::Error);
        assert!(err.is_global());
    }
}
