//! Session store against a mocked REST backend.

use std::sync::Arc;
use std::time::Duration;

use dashboard_core::auth::{Credentials, RestGateway, Role, SessionState, SessionStore};
use dashboard_core::config::UnauthorizedPolicy;
use dashboard_core::routes::{ChannelNavigator, SIGNIN_PATH};
use dashboard_core::storage::{MemoryStorage, Slot, Storage, TOKEN_KEY};
use dashboard_core::validation::SignupForm;
use dashboard_core::DashboardError;
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    store: SessionStore,
    storage: Arc<dyn Storage>,
    routes: UnboundedReceiver<String>,
}

fn harness(server: &MockServer, policy: UnauthorizedPolicy) -> Harness {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let (navigator, routes) = ChannelNavigator::new();
    let store = SessionStore::new(
        Arc::new(RestGateway::from_url(server.uri())),
        Slot::new(storage.clone(), TOKEN_KEY),
        Arc::new(navigator),
        policy,
    );
    Harness {
        store,
        storage,
        routes,
    }
}

fn user(username: &str, full_name: &str, onboarded: bool) -> serde_json::Value {
    json!({
        "username": username,
        "email": format!("{username}@x.com"),
        "full_name": full_name,
        "avatar": null,
        "disabled": false,
        "onboarding_completed": onboarded
    })
}

async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": token, "token_type": "bearer" })),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn signup_creates_plain_user_with_pending_onboarding() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user("jane", "Jane Doe", false)))
        .expect(1)
        .mount(&server)
        .await;
    mount_login(&server, "tok-jane").await;

    let h = harness(&server, UnauthorizedPolicy::Logout);
    h.store.bootstrap().await;

    let session = h
        .store
        .signup(&SignupForm {
            name: "Jane Doe".into(),
            email: "jane@x.com".into(),
            password: "longenough1".into(),
            confirm_password: "longenough1".into(),
            accept_terms: true,
        })
        .await
        .unwrap();

    assert_eq!(session.role, Role::User);
    assert!(!session.onboarding_complete);
    assert_eq!(session.display_name, "Jane Doe");
    assert_eq!(
        h.storage.get(TOKEN_KEY).await.unwrap().as_deref(),
        Some("tok-jane")
    );
}

#[tokio::test]
async fn rejected_signin_reports_message_and_stays_anonymous() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": "Incorrect username or password" })),
        )
        .mount(&server)
        .await;

    let h = harness(&server, UnauthorizedPolicy::Logout);
    h.store.bootstrap().await;

    let err = h
        .store
        .signin(&Credentials::new("bad@x.com", "wrong"))
        .await
        .unwrap_err();

    assert_eq!(err, DashboardError::Auth("Incorrect username or password".into()));
    assert!(!err.to_string().is_empty());
    assert_eq!(h.store.state(), SessionState::Anonymous);
    assert_eq!(h.storage.get(TOKEN_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn signin_then_signout_leaves_nothing_behind() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1").await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user("jane", "Jane Doe", true)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut h = harness(&server, UnauthorizedPolicy::Logout);
    h.store.bootstrap().await;

    let session = h
        .store
        .signin(&Credentials::new("jane@x.com", "longenough1"))
        .await
        .unwrap();
    assert!(session.onboarding_complete);

    h.store.signout().await.unwrap();

    assert_eq!(h.storage.get(TOKEN_KEY).await.unwrap(), None);
    assert_eq!(h.store.state(), SessionState::Anonymous);
    assert_eq!(h.routes.recv().await.as_deref(), Some(SIGNIN_PATH));
}

#[tokio::test]
async fn bootstrap_restores_session_from_persisted_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("authorization", "Bearer saved"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user("admin", "Admin", true)))
        .mount(&server)
        .await;

    let h = harness(&server, UnauthorizedPolicy::Logout);
    h.storage.set(TOKEN_KEY, "saved").await.unwrap();

    let state = h.store.bootstrap().await;
    assert_eq!(state.session().unwrap().role, Role::Admin);
}

#[tokio::test]
async fn unreachable_backend_during_bootstrap_clears_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let h = harness(&server, UnauthorizedPolicy::Logout);
    h.storage.set(TOKEN_KEY, "saved").await.unwrap();

    assert_eq!(h.store.bootstrap().await, SessionState::Anonymous);
    assert_eq!(h.storage.get(TOKEN_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn cancelled_bootstrap_still_releases_loading() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(user("jane", "Jane Doe", true))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let h = harness(&server, UnauthorizedPolicy::Logout);
    h.storage.set(TOKEN_KEY, "slow").await.unwrap();
    let mut handle = h.store.handle();

    let timed_out = tokio::time::timeout(Duration::from_millis(100), h.store.bootstrap()).await;
    assert!(timed_out.is_err());

    assert!(!handle.loading());
    assert_eq!(handle.ready().await, SessionState::Anonymous);
}

async fn signed_in_with_expiring_token(
    server: &MockServer,
    policy: UnauthorizedPolicy,
) -> Harness {
    mount_login(server, "tok-exp").await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user("jane", "Jane Doe", true)))
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "detail": "Token expired" })),
        )
        .mount(server)
        .await;

    let h = harness(server, policy);
    h.store.bootstrap().await;
    h.store
        .signin(&Credentials::new("jane@x.com", "longenough1"))
        .await
        .unwrap();
    h
}

#[tokio::test]
async fn unauthorized_refresh_logs_out_under_logout_policy() {
    let server = MockServer::start().await;
    let mut h = signed_in_with_expiring_token(&server, UnauthorizedPolicy::Logout).await;

    let err = h.store.refresh().await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(h.store.state(), SessionState::Anonymous);
    assert_eq!(h.storage.get(TOKEN_KEY).await.unwrap(), None);
    assert_eq!(h.routes.recv().await.as_deref(), Some(SIGNIN_PATH));
}

#[tokio::test]
async fn unauthorized_refresh_keeps_session_under_ignore_policy() {
    let server = MockServer::start().await;
    let h = signed_in_with_expiring_token(&server, UnauthorizedPolicy::Ignore).await;

    assert!(h.store.refresh().await.unwrap_err().is_unauthorized());
    assert!(h.store.session().is_some());
    assert_eq!(
        h.storage.get(TOKEN_KEY).await.unwrap().as_deref(),
        Some("tok-exp")
    );
}

#[tokio::test]
async fn onboarding_completion_replaces_session() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-2").await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user("jane", "Jane Doe", false)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/me/onboarding-complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user("jane", "Jane Doe", true)))
        .mount(&server)
        .await;

    let h = harness(&server, UnauthorizedPolicy::Logout);
    h.store.bootstrap().await;
    let mut handle = h.store.handle();
    h.store
        .signin(&Credentials::new("jane@x.com", "longenough1"))
        .await
        .unwrap();
    handle.changed().await.unwrap();

    h.store.complete_onboarding().await.unwrap();
    let updated = handle.changed().await.unwrap();
    assert!(updated.session().unwrap().onboarding_complete);
}

// ============================================================================
// Stale results
// ============================================================================

/// `/token` answers per email with `tok-<name>`, after `delay`.
async fn mount_named_login(server: &MockServer, name: &str, delay: Duration) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(format!("username={name}%40x.com")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": format!("tok-{name}"), "token_type": "bearer" }))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

async fn mount_me(server: &MockServer, name: &str, response: ResponseTemplate, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("authorization", format!("Bearer tok-{name}").as_str()))
        .respond_with(response);
    let mock = match times {
        Some(n) => mock.up_to_n_times(n),
        None => mock,
    };
    mock.mount(server).await;
}

async fn mount_logout(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok" })))
        .mount(server)
        .await;
}

fn credentials(name: &str) -> Credentials {
    Credentials::new(format!("{name}@x.com"), "longenough1")
}

#[tokio::test]
async fn slow_refresh_does_not_overwrite_a_newer_session() {
    let server = MockServer::start().await;
    mount_named_login(&server, "alice", Duration::ZERO).await;
    mount_named_login(&server, "bob", Duration::ZERO).await;
    mount_logout(&server).await;
    let ok = |name: &str| ResponseTemplate::new(200).set_body_json(user(name, name, true));
    mount_me(&server, "alice", ok("alice"), Some(1)).await;
    mount_me(&server, "alice", ok("alice").set_delay(Duration::from_millis(300)), None).await;
    mount_me(&server, "bob", ok("bob"), None).await;

    let h = harness(&server, UnauthorizedPolicy::Logout);
    h.store.bootstrap().await;
    h.store.signin(&credentials("alice")).await.unwrap();

    let (refreshed, ()) = tokio::join!(h.store.refresh(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.store.signout().await.unwrap();
        h.store.signin(&credentials("bob")).await.unwrap();
    });

    assert_eq!(refreshed.unwrap_err(), DashboardError::Superseded("refresh"));
    assert_eq!(h.store.session().unwrap().identity, "bob");
    assert_eq!(
        h.storage.get(TOKEN_KEY).await.unwrap().as_deref(),
        Some("tok-bob")
    );
}

#[tokio::test]
async fn late_unauthorized_for_an_old_token_keeps_the_new_session() {
    let server = MockServer::start().await;
    mount_named_login(&server, "alice", Duration::ZERO).await;
    mount_named_login(&server, "bob", Duration::ZERO).await;
    mount_logout(&server).await;
    mount_me(
        &server,
        "alice",
        ResponseTemplate::new(200).set_body_json(user("alice", "alice", true)),
        Some(1),
    )
    .await;
    mount_me(
        &server,
        "alice",
        ResponseTemplate::new(401)
            .set_body_json(json!({ "detail": "Token expired" }))
            .set_delay(Duration::from_millis(300)),
        None,
    )
    .await;
    mount_me(
        &server,
        "bob",
        ResponseTemplate::new(200).set_body_json(user("bob", "bob", true)),
        None,
    )
    .await;

    let mut h = harness(&server, UnauthorizedPolicy::Logout);
    h.store.bootstrap().await;
    h.store.signin(&credentials("alice")).await.unwrap();

    let (refreshed, ()) = tokio::join!(h.store.refresh(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.store.signout().await.unwrap();
        h.store.signin(&credentials("bob")).await.unwrap();
    });

    assert!(refreshed.unwrap_err().is_unauthorized());
    assert_eq!(h.store.session().unwrap().identity, "bob");
    assert_eq!(
        h.storage.get(TOKEN_KEY).await.unwrap().as_deref(),
        Some("tok-bob")
    );
    // Only the explicit signout navigated.
    assert_eq!(h.routes.recv().await.as_deref(), Some(SIGNIN_PATH));
    assert!(h.routes.try_recv().is_err());
}

#[tokio::test]
async fn only_the_later_of_two_overlapping_signins_is_published() {
    let server = MockServer::start().await;
    mount_named_login(&server, "alice", Duration::from_millis(300)).await;
    mount_named_login(&server, "bob", Duration::ZERO).await;
    for name in ["alice", "bob"] {
        mount_me(
            &server,
            name,
            ResponseTemplate::new(200).set_body_json(user(name, name, true)),
            None,
        )
        .await;
    }

    let h = harness(&server, UnauthorizedPolicy::Logout);
    h.store.bootstrap().await;

    let alice = credentials("alice");
    let (slow, fast) = tokio::join!(h.store.signin(&alice), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.store.signin(&credentials("bob")).await
    });

    assert_eq!(fast.unwrap().identity, "bob");
    assert_eq!(slow.unwrap_err(), DashboardError::Superseded("sign in"));
    assert_eq!(h.store.session().unwrap().identity, "bob");
    assert_eq!(
        h.storage.get(TOKEN_KEY).await.unwrap().as_deref(),
        Some("tok-bob")
    );
}
