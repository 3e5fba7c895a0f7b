use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;
use uac_auth::store::{KeyValueStore, MemoryStore};
use uac_server::config::{AdminUserConfig, AppConfig, ApplicationConfig, RedisConfig};
use uac_server::server::spawn_purge_task;
use uac_server::{ServerBuilder, create_store};

fn config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.bootstrap.admin_user = Some(AdminUserConfig {
        username: "root".into(),
        password: "Bootstrap-Pass-1".into(),
        email: Some("root@example.com".into()),
    });
    cfg.bootstrap.applications.push(ApplicationConfig {
        name: "Portal".into(),
        client_id: "portal".into(),
        client_secret: None,
        oauth_profile: Default::default(),
        redirect_uris: vec!["https://portal.example.com/cb".into()],
        scopes: vec!["openid".into()],
    });
    cfg
}

async fn json_body(response: axum::http::Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_and_discovery() {
    let server = ServerBuilder::new().with_config(config()).build().await.unwrap();

    let response = server
        .router()
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = server
        .router()
        .oneshot(
            Request::get("/.well-known/openid-configuration")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc = json_body(response).await;
    assert_eq!(doc["issuer"], "http://localhost:8080");
}

#[tokio::test]
async fn test_bootstrap_admin_can_manage_roles() {
    let server = ServerBuilder::new().with_config(config()).build().await.unwrap();

    let login = Request::post("/api/v1/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"username": "root", "password": "Bootstrap-Pass-1"}).to_string(),
        ))
        .unwrap();
    let response = server.router().oneshot(login).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token = json_body(response).await["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = server
        .router()
        .oneshot(
            Request::get("/api/v1/roles")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let roles = json_body(response).await;
    assert_eq!(roles.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_bootstrap_application_is_registered() {
    let server = ServerBuilder::new().with_config(config()).build().await.unwrap();

    let uri = "/oauth/authorize?response_type=code&client_id=portal\
               &redirect_uri=https%3A%2F%2Fportal.example.com%2Fcb&scope=openid\
               &code_challenge=E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM\
               &code_challenge_method=S256";
    let response = server
        .router()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    // Known client without a session is sent to the login page.
    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("/login?redirect="));
}

#[tokio::test]
async fn test_unreachable_redis_falls_back_to_memory() {
    let redis = RedisConfig {
        enabled: true,
        url: "redis://127.0.0.1:1".into(),
        pool_size: 1,
        timeout_ms: 200,
    };
    let shared = create_store(&redis).await;
    assert!(shared.memory.is_some());
}

#[tokio::test]
async fn test_purge_task_sweeps_expired_entries() {
    let store = MemoryStore::new();
    store
        .set("short", b"v".to_vec(), Duration::from_millis(10))
        .await
        .unwrap();
    store
        .set("long", b"v".to_vec(), Duration::from_secs(60))
        .await
        .unwrap();

    let task = spawn_purge_task(store.clone(), Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(120)).await;
    task.abort();

    assert_eq!(store.len(), 1);
}
