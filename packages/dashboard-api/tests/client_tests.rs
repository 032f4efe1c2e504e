use dashboard_api::{ApiError, DashboardApiClient, DirectoryClient, SignupRequest};
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn jane() -> serde_json::Value {
    json!({
        "username": "jane",
        "email": "jane@x.com",
        "full_name": "Jane Doe",
        "avatar": null,
        "disabled": false,
        "onboarding_completed": false
    })
}

#[tokio::test]
async fn login_posts_form_and_returns_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("username=jane%40x.com"))
        .and(body_string_contains("password=longenough1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "abc", "token_type": "bearer"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = DashboardApiClient::new(server.uri());
    let token = client.login("jane@x.com", "longenough1").await.unwrap();

    assert_eq!(token.access_token, "abc");
    assert_eq!(token.token_type, "bearer");
}

#[tokio::test]
async fn login_rejection_surfaces_detail_as_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"detail": "Incorrect username or password"})),
        )
        .mount(&server)
        .await;

    let client = DashboardApiClient::new(server.uri());
    let err = client.login("bad@x.com", "wrong").await.unwrap_err();

    match err {
        ApiError::Unauthorized(message) => assert_eq!(message, "Incorrect username or password"),
        other => panic!("expected Unauthorized, got {other:?}"),
    }
}

#[tokio::test]
async fn token_is_sent_as_bearer_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jane()))
        .expect(1)
        .mount(&server)
        .await;

    let client = DashboardApiClient::new(server.uri()).with_token("abc");
    let me = client.current_user().await.unwrap();

    assert_eq!(me.username, "jane");
    assert_eq!(me.full_name.as_deref(), Some("Jane Doe"));
    assert!(!me.onboarding_completed);
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/avatars"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["avatar1.png", "avatar2.png"])))
        .mount(&server)
        .await;

    let client = DashboardApiClient::new(format!("{}/", server.uri()));
    let avatars = client.list_avatars().await.unwrap();

    assert_eq!(avatars, vec!["avatar1.png", "avatar2.png"]);
}

#[tokio::test]
async fn duplicate_signup_maps_to_api_error_with_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/signup"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "Email already registered"})),
        )
        .mount(&server)
        .await;

    let client = DashboardApiClient::new(server.uri());
    let request = SignupRequest {
        username: "jane".to_string(),
        email: "jane@x.com".to_string(),
        password: "longenough1".to_string(),
        full_name: Some("Jane Doe".to_string()),
        avatar: None,
    };
    let err = client.signup(&request).await.unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("Email already registered"));
}

#[tokio::test]
async fn validation_detail_list_uses_first_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/feedback"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "detail": [{"loc": ["body", "rating"], "msg": "field required", "type": "value_error.missing"}]
        })))
        .mount(&server)
        .await;

    let client = DashboardApiClient::new(server.uri()).with_token("abc");
    let err = client.submit_feedback(0, "hi").await.unwrap_err();

    match err {
        ApiError::Api { status, message } => {
            assert_eq!(status, 422);
            assert_eq!(message, "field required");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn admin_endpoints_report_forbidden() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/users"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"detail": "Admins only"})))
        .mount(&server)
        .await;

    let client = DashboardApiClient::new(server.uri()).with_token("abc");
    let err = client.list_users().await.unwrap_err();

    assert!(matches!(err, ApiError::Forbidden(ref m) if m == "Admins only"));
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    // Port 9 (discard) is not listening in the test environment.
    let client = DashboardApiClient::new("http://127.0.0.1:9");
    let err = client.current_user().await.unwrap_err();

    assert!(matches!(err, ApiError::Network(_)));
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn directory_failure_envelope_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": false, "error": "table missing"})),
        )
        .mount(&server)
        .await;

    let client = DirectoryClient::new(server.uri());
    let err = client.fetch_customers().await.unwrap_err();

    assert!(err.to_string().contains("table missing"));
}

#[tokio::test]
async fn directory_lists_customers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "customers": [{
                "customer_id": "c-1",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "email": "ada@example.com",
                "address": {"city": "London", "country": "UK"}
            }]
        })))
        .mount(&server)
        .await;

    let client = DirectoryClient::new(server.uri());
    let customers = client.fetch_customers().await.unwrap();

    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0].customer_id.as_deref(), Some("c-1"));
    let address = customers[0].address.as_ref().unwrap();
    assert_eq!(address.city.as_deref(), Some("London"));
    assert_eq!(address.state, None);
}

#[tokio::test]
async fn directory_add_posts_customer_json() {
    let server = MockServer::start().await;
    let customer = json!({"name": "Ada Lovelace", "email": "ada@x.com", "location": "London"});
    Mock::given(method("POST"))
        .and(path("/customers"))
        .and(body_json(&customer))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    DirectoryClient::new(server.uri())
        .add_customer(&customer)
        .await
        .unwrap();
}

#[tokio::test]
async fn directory_update_and_delete_address_one_customer() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/customers/c-42"))
        .and(body_json(json!({"status": "inactive"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/customers/c-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = DirectoryClient::new(server.uri());
    client
        .update_customer("c-42", &json!({"status": "inactive"}))
        .await
        .unwrap();
    client.delete_customer("c-42").await.unwrap();
}

#[tokio::test]
async fn directory_delete_of_unknown_customer_reports_envelope_error() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/customers/missing"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": false, "error": "Customer not found"})),
        )
        .mount(&server)
        .await;

    let err = DirectoryClient::new(server.uri())
        .delete_customer("missing")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Customer not found"));
}
