use jsonwebtoken::{EncodingKey, Header, encode};
use reqwest::{StatusCode, header};
use std::{sync::Arc, time::Duration};
use storefront_gateway::{
    AppConfig, AppState, IdentityState, JwtIdentityProvider, MockUserSync, RegistryState,
    SyncState, create_router,
    identity::{Claims, LOCAL_IDENTITY_HEADER, SESSION_TOKEN_COOKIE},
    models::{AuthState, AuthStatus, PageView, Role, UserStatus},
};
use tokio::net::TcpListener;

// --- Test Harness ---

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub sync: Arc<MockUserSync>,
    pub sessions: RegistryState,
    pub config: AppConfig,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// GET as the given identity, via the local identity header.
    async fn get_as(&self, identity: Option<&str>, path: &str) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(identity) = identity {
            request = request.header(LOCAL_IDENTITY_HEADER, identity);
        }
        request.send().await.expect("request failed")
    }
}

async fn spawn_app_with_config(sync: MockUserSync, config: AppConfig) -> TestApp {
    let sync = Arc::new(sync);
    let sync_state: SyncState = sync.clone();
    let identity: IdentityState = Arc::new(JwtIdentityProvider::new(&config));
    let state = AppState::new(config.clone(), identity, sync_state).expect("valid destinations");
    let sessions = state.sessions.clone();
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    // Redirects are what the gates produce, so the client must not follow them.
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        address,
        client,
        sync,
        sessions,
        config,
    }
}

async fn spawn_app_with(sync: MockUserSync, gate_wait: Duration) -> TestApp {
    let config = AppConfig {
        gate_wait,
        ..AppConfig::default()
    };
    spawn_app_with_config(sync, config).await
}

async fn spawn_app(roles: Vec<Role>) -> TestApp {
    spawn_app_with(MockUserSync::new(roles), Duration::from_secs(2)).await
}

fn location(response: &reqwest::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("no Location header")
}

/// `sf_sid=<id>` from the response's Set-Cookie header.
fn session_cookie(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .expect("no session cookie issued")
        .to_string()
}

// --- Public Surface ---

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app(vec![Role::Customer]).await;

    let response = app.get_as(None, "/health").await;

    assert!(response.status().is_success());
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = spawn_app(vec![Role::Customer]).await;

    let response = app.get_as(None, "/health").await;

    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_destinations_are_reachable_without_a_principal() {
    let app = spawn_app(vec![Role::Customer]).await;

    let sign_in = app.get_as(None, "/sign-in").await;
    assert_eq!(sign_in.status(), StatusCode::OK);

    let unauthorized = app.get_as(None, "/unauthorized?reason=blocked").await;
    assert_eq!(unauthorized.status(), StatusCode::OK);
    let page: PageView = unauthorized.json().await.unwrap();
    assert_eq!(page.page, "unauthorized");
    assert!(page.notice.unwrap().contains("blocked"));
}

// --- Gate Redirects ---

#[tokio::test]
async fn test_no_principal_is_sent_to_sign_in() {
    let app = spawn_app(vec![Role::Admin]).await;

    let response = app.get_as(None, "/dashboard/admin").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), app.config.sign_in_path);
    assert_eq!(app.sync.calls(), 0);
}

#[tokio::test]
async fn test_vendor_is_kept_out_of_admin() {
    let app = spawn_app(vec![Role::Vendor]).await;

    let response = app.get_as(Some("user_vendor"), "/dashboard/admin/users").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/unauthorized");
}

#[tokio::test]
async fn test_admin_reaches_admin_section() {
    let app = spawn_app(vec![Role::Admin]).await;

    let response = app.get_as(Some("user_admin"), "/dashboard/admin").await;

    assert_eq!(response.status(), StatusCode::OK);
    let page: PageView = response.json().await.unwrap();
    assert_eq!(page.page, "admin");
    assert_eq!(page.viewer.unwrap().roles, vec![Role::Admin]);
}

#[tokio::test]
async fn test_platform_requires_super_admin() {
    let admin = spawn_app(vec![Role::Admin]).await;
    let response = admin
        .get_as(Some("user_admin"), "/dashboard/admin/platform/settings")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/unauthorized");

    let super_admin = spawn_app(vec![Role::SuperAdmin]).await;
    let response = super_admin
        .get_as(Some("user_root"), "/dashboard/admin/platform/settings")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_role_does_not_open_customer_section() {
    let app = spawn_app(vec![Role::Admin]).await;

    let response = app.get_as(Some("user_admin"), "/dashboard/customer/orders").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/unauthorized");
}

#[tokio::test]
async fn test_blocked_customer_is_sent_to_unauthorized_with_reason() {
    let app = spawn_app_with(
        MockUserSync::new(vec![Role::Customer]).with_status(UserStatus::Blocked),
        Duration::from_secs(2),
    )
    .await;

    let response = app.get_as(Some("user_blocked"), "/dashboard/customer/orders").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/unauthorized?reason=blocked");
}

#[tokio::test]
async fn test_failed_sync_is_treated_as_signed_out() {
    let app = spawn_app_with(MockUserSync::new_failing(), Duration::from_secs(2)).await;

    let response = app.get_as(Some("user_a"), "/dashboard").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/sign-in");
}

#[tokio::test]
async fn test_slow_sync_renders_loading_page() {
    let app = spawn_app_with(
        MockUserSync::new(vec![Role::Customer]).with_delay(Duration::from_millis(500)),
        Duration::from_millis(20),
    )
    .await;

    let response = app.get_as(Some("user_a"), "/dashboard").await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(response.headers().get(header::LOCATION).is_none());
    let page: PageView = response.json().await.unwrap();
    assert_eq!(page.page, "loading");
    assert!(page.viewer.is_none());
}

// --- Session Endpoints ---

#[tokio::test]
async fn test_session_cookie_dedups_sync_across_requests() {
    let app = spawn_app(vec![Role::Customer]).await;

    let first = app.get_as(Some("user_a"), "/dashboard").await;
    assert_eq!(first.status(), StatusCode::OK);
    let cookie = session_cookie(&first);

    for _ in 0..3 {
        let response = app
            .client
            .get(app.url("/dashboard/customer/wishlist"))
            .header(LOCAL_IDENTITY_HEADER, "user_a")
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    assert_eq!(app.sync.calls(), 1);
}

#[tokio::test]
async fn test_intent_is_consumed_by_the_next_sync() {
    let app = spawn_app(vec![Role::Customer]).await;

    let marked = app.client.post(app.url("/auth/intent")).send().await.unwrap();
    assert_eq!(marked.status(), StatusCode::NO_CONTENT);
    let cookie = session_cookie(&marked);

    let pending: AuthState = app
        .client
        .get(app.url("/session"))
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(pending.sign_in_intent);

    let dashboard = app
        .client
        .get(app.url("/dashboard"))
        .header(LOCAL_IDENTITY_HEADER, "user_a")
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(dashboard.status(), StatusCode::OK);

    let state: AuthState = app
        .client
        .get(app.url("/session"))
        .header(LOCAL_IDENTITY_HEADER, "user_a")
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state.status, AuthStatus::Synced);
    assert!(!state.sign_in_intent);
    assert_eq!(state.identity.as_deref(), Some("user_a"));
}

#[tokio::test]
async fn test_welcome_notice_is_delivered_exactly_once() {
    let app = spawn_app(vec![Role::Customer]).await;

    let marked = app.client.post(app.url("/auth/intent")).send().await.unwrap();
    let cookie = session_cookie(&marked);

    let first: PageView = app
        .client
        .get(app.url("/dashboard"))
        .header(LOCAL_IDENTITY_HEADER, "user_a")
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let welcome = first.welcome.expect("explicit sign-in should be welcomed");
    assert_eq!(welcome.user_id, first.viewer.unwrap().id);

    let second: PageView = app
        .client
        .get(app.url("/dashboard/profile"))
        .header(LOCAL_IDENTITY_HEADER, "user_a")
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(second.welcome.is_none());

    let state: AuthState = app
        .client
        .get(app.url("/session"))
        .header(LOCAL_IDENTITY_HEADER, "user_a")
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(state.welcome.is_none());
}

#[tokio::test]
async fn test_restored_session_is_not_welcomed() {
    let app = spawn_app(vec![Role::Customer]).await;

    let page: PageView = app
        .get_as(Some("user_a"), "/dashboard")
        .await
        .json()
        .await
        .unwrap();

    assert!(page.welcome.is_none());
}

#[tokio::test]
async fn test_intent_on_synced_session_does_not_linger() {
    let app = spawn_app(vec![Role::Customer]).await;

    let first = app.get_as(Some("alice"), "/dashboard").await;
    assert_eq!(first.status(), StatusCode::OK);
    let cookie = session_cookie(&first);

    let marked = app
        .client
        .post(app.url("/auth/intent"))
        .header(LOCAL_IDENTITY_HEADER, "alice")
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(marked.status(), StatusCode::NO_CONTENT);

    let reload: PageView = app
        .client
        .get(app.url("/dashboard"))
        .header(LOCAL_IDENTITY_HEADER, "alice")
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(reload.welcome.is_some());

    let state: AuthState = app
        .client
        .get(app.url("/session"))
        .header(LOCAL_IDENTITY_HEADER, "alice")
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!state.sign_in_intent);
    assert!(state.welcome.is_none());
    assert_eq!(app.sync.calls(), 1);
}

#[tokio::test]
async fn test_cookieless_clients_cannot_grow_the_registry() {
    let config = AppConfig {
        session_capacity: 20,
        ..AppConfig::default()
    };
    let app = spawn_app_with_config(MockUserSync::new(vec![Role::Customer]), config).await;

    for _ in 0..100 {
        let response = app.get_as(None, "/dashboard").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    assert_eq!(app.sessions.len().await, 20);
}

#[tokio::test]
async fn test_retry_without_identity_is_rejected() {
    let app = spawn_app(vec![Role::Customer]).await;

    let response = app.client.post(app.url("/session/sync")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_retry_when_synced_changes_nothing() {
    let app = spawn_app(vec![Role::Vendor]).await;

    let response = app
        .client
        .post(app.url("/session/sync"))
        .header(LOCAL_IDENTITY_HEADER, "user_vendor")
        .send()
        .await
        .unwrap();

    // The session layer already started the sync; the retry has nothing to redo.
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.sync.calls() <= 1);
}

// --- Token Credentials ---

#[tokio::test]
async fn test_session_token_cookie_reaches_dashboard() {
    let app = spawn_app(vec![Role::Vendor]).await;
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: "user_token".to_string(),
        email: Some("vendor@shop.example".to_string()),
        iat: now,
        exp: now + 3600,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(app.config.jwt_secret.as_bytes()),
    )
    .unwrap();

    let response = app
        .client
        .get(app.url("/dashboard/vendor/products"))
        .header(header::COOKIE, format!("{SESSION_TOKEN_COOKIE}={token}"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let page: PageView = response.json().await.unwrap();
    assert_eq!(
        page.viewer.unwrap().email.as_deref(),
        Some("vendor@shop.example")
    );
}

#[tokio::test]
async fn test_garbage_token_is_sent_to_sign_in() {
    let app = spawn_app(vec![Role::Vendor]).await;

    let response = app
        .client
        .get(app.url("/dashboard"))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/sign-in");
    assert_eq!(app.sync.calls(), 0);
}
