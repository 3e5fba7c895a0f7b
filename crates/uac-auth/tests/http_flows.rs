//! End-to-end flows through the HTTP router.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;

use uac_auth::account::{Account, MemoryAccountStorage};
use uac_auth::cas::CasService;
use uac_auth::config::AuthConfig;
use uac_auth::http::{AppState, router};
use uac_auth::oauth::{Application, MemoryApplicationStore, OAuthService};
use uac_auth::rbac::{
    MemoryRbacStorage, RbacEngine, RbacService, ROLE_ORG_ADMIN, ROLE_SUPER_ADMIN, ROLE_USER,
};
use uac_auth::secret::hash_secret;
use uac_auth::store::{KeyValueStore, MemoryStore, StoreError, StoreResult};
use uac_auth::token::service::TokenConfig;
use uac_auth::token::{JwtService, JwtTokenService, SigningKeyPair, TokenClaims, TokenService};

const REDIRECT_URI: &str = "https://app.example.com/callback";
const CLIENT_ID: &str = "demo-client";
const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
const PASSWORD: &str = "Correct-Horse-9";

struct Harness {
    app: Router,
    tokens: Arc<JwtTokenService>,
    rbac: Arc<RbacService>,
}

/// A shared store whose backend is unreachable.
struct DownStore;

fn down<T>() -> StoreResult<T> {
    Err(StoreError::unavailable("connection refused"))
}

#[async_trait::async_trait]
impl KeyValueStore for DownStore {
    async fn get(&self, _key: &str) -> StoreResult<Option<Vec<u8>>> {
        down()
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> StoreResult<()> {
        down()
    }

    async fn set_if_absent(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> StoreResult<bool> {
        down()
    }

    async fn delete(&self, _key: &str) -> StoreResult<bool> {
        down()
    }

    async fn exists(&self, _key: &str) -> StoreResult<bool> {
        down()
    }

    async fn compare_and_swap(
        &self,
        _key: &str,
        _expected: &[u8],
        _new: Vec<u8>,
        _ttl: Duration,
    ) -> StoreResult<bool> {
        down()
    }

    async fn set_add(&self, _key: &str, _member: &str, _ttl: Duration) -> StoreResult<()> {
        down()
    }

    async fn set_remove(&self, _key: &str, _member: &str) -> StoreResult<()> {
        down()
    }

    async fn set_members(&self, _key: &str) -> StoreResult<Vec<String>> {
        down()
    }
}

async fn harness() -> Harness {
    harness_with_store(Arc::new(MemoryStore::new())).await
}

async fn harness_with_store(store: Arc<dyn KeyValueStore>) -> Harness {
    let config = AuthConfig::default();

    let jwt = JwtService::new(SigningKeyPair::generate_rsa().unwrap(), config.issuer.clone());
    let tokens = Arc::new(JwtTokenService::new(
        jwt,
        store.clone(),
        TokenConfig::from_auth_config(&config),
    ));

    let accounts = Arc::new(MemoryAccountStorage::new());
    accounts.insert(
        Account::new("alice")
            .with_id("user-1")
            .with_email("alice@example.com")
            .with_display_name("Alice")
            .with_password_hash(hash_secret(PASSWORD).unwrap()),
    );
    accounts.insert(
        Account::new("root")
            .with_id("admin-1")
            .with_password_hash(hash_secret(PASSWORD).unwrap()),
    );

    let applications = Arc::new(MemoryApplicationStore::new());
    applications.insert(
        Application::new("Demo", CLIENT_ID)
            .with_redirect_uri(REDIRECT_URI)
            .with_scopes(["openid", "profile", "email"]),
    );

    let rbac = Arc::new(RbacService::with_storage(Arc::new(MemoryRbacStorage::new())));
    rbac.init_default_roles_and_permissions().await.unwrap();
    rbac.assign_role_by_code("admin-1", ROLE_SUPER_ADMIN).await.unwrap();
    rbac.assign_role_by_code("user-1", ROLE_USER).await.unwrap();

    let oauth = Arc::new(OAuthService::new(
        tokens.clone(),
        applications,
        accounts.clone(),
        config.oauth.clone(),
    ));
    let cas = Arc::new(CasService::new(store, config.cas.clone()));

    let state = AppState::new(&config, tokens.clone(), oauth, cas, rbac.clone(), accounts);
    Harness {
        app: router(state),
        tokens,
        rbac,
    }
}

impl Harness {
    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    async fn login(&self, username: &str, password: &str) -> Response<Body> {
        self.send(
            Request::post("/api/v1/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "username": username, "password": password }).to_string(),
                ))
                .unwrap(),
        )
        .await
    }

    async fn form(&self, uri: &str, pairs: &[(&str, &str)]) -> Response<Body> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    async fn get_bearer(&self, uri: &str, token: &str) -> Response<Body> {
        self.send(
            Request::get(uri)
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn json_bearer(&self, method: &str, uri: &str, token: &str, body: Value) -> Response<Body> {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

async fn json_body(response: Response<Body>) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn session_cookie(response: &Response<Body>) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

fn location(response: &Response<Body>) -> Url {
    let raw = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    Url::parse(raw).unwrap_or_else(|_| Url::parse("http://localhost").unwrap().join(raw).unwrap())
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

fn authorize_uri() -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("response_type", "code")
        .append_pair("client_id", CLIENT_ID)
        .append_pair("redirect_uri", REDIRECT_URI)
        .append_pair("scope", "openid profile")
        .append_pair("state", "xyz")
        .append_pair("code_challenge", CHALLENGE)
        .append_pair("code_challenge_method", "S256")
        .finish();
    format!("/oauth/authorize?{query}")
}

async fn authorization_code(h: &Harness) -> String {
    let login = h.login("alice", PASSWORD).await;
    assert_eq!(login.status(), StatusCode::OK);
    let cookie = session_cookie(&login);

    let response = h
        .send(
            Request::get(authorize_uri())
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let redirect = location(&response);
    assert!(redirect.as_str().starts_with(REDIRECT_URI));
    assert_eq!(query_param(&redirect, "state").as_deref(), Some("xyz"));
    query_param(&redirect, "code").unwrap()
}

#[tokio::test]
async fn authorization_code_flow_with_pkce() {
    let h = harness().await;
    let code = authorization_code(&h).await;

    let response = h
        .form(
            "/oauth/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", REDIRECT_URI),
                ("client_id", CLIENT_ID),
                ("code_verifier", VERIFIER),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");

    let tokens = json_body(response).await;
    assert_eq!(tokens["token_type"], "Bearer");
    assert!(tokens["refresh_token"].is_string());
    assert!(tokens["id_token"].is_string());

    let access = tokens["access_token"].as_str().unwrap();
    let userinfo = h.get_bearer("/oauth/userinfo", access).await;
    assert_eq!(userinfo.status(), StatusCode::OK);
    let info = json_body(userinfo).await;
    assert_eq!(info["sub"], "user-1");
    assert!(info.get("email").is_none());
}

#[tokio::test]
async fn wrong_verifier_is_invalid_grant() {
    let h = harness().await;
    let code = authorization_code(&h).await;

    let response = h
        .form(
            "/oauth/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", REDIRECT_URI),
                ("client_id", CLIENT_ID),
                ("code_verifier", "wrong-verifier"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_grant");
}

#[tokio::test]
async fn authorize_without_session_bounces_to_login() {
    let h = harness().await;
    let response = h
        .send(Request::get(authorize_uri()).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let raw = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
    assert!(raw.starts_with("/login?redirect="));
}

#[tokio::test]
async fn authorize_with_unknown_client_is_rejected_in_place() {
    let h = harness().await;
    let response = h
        .send(
            Request::get(format!(
                "/oauth/authorize?response_type=code&client_id=nope&redirect_uri={REDIRECT_URI}"
            ))
            .body(Body::empty())
            .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "invalid_client");
}

#[tokio::test]
async fn token_endpoint_rejects_unknown_grant() {
    let h = harness().await;
    let response = h.form("/oauth/token", &[("grant_type", "password")]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "unsupported_grant_type");

    let response = h.form("/oauth/token", &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_request");
}

#[tokio::test]
async fn lockout_after_five_failures() {
    let h = harness().await;
    for _ in 0..5 {
        let response = h.login("alice", "Wrong-password-1").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "invalid_credentials");
    }

    let response = h.login("alice", PASSWORD).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"], "account_locked");
}

#[tokio::test]
async fn login_requires_an_identifier() {
    let h = harness().await;
    let response = h
        .send(
            Request::post("/api/v1/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "password": PASSWORD }).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cas_ticket_lifecycle() {
    let h = harness().await;
    let login = json_body(h.login("alice", PASSWORD).await).await;
    let tgt = login["tgt"].as_str().unwrap().to_string();
    let service = "https://portal.example.com/";

    let created = h
        .form("/cas/tickets", &[("tgt", tgt.as_str()), ("service", service)])
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let ticket = json_body(created).await["ticket"].as_str().unwrap().to_string();
    assert!(ticket.starts_with("ST-"));

    let validate_uri = |svc: &str| {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("ticket", &ticket)
            .append_pair("service", svc)
            .finish();
        format!("/cas/serviceValidate?{query}")
    };

    let mismatch = h
        .send(Request::get(validate_uri("https://evil.example.com/")).body(Body::empty()).unwrap())
        .await;
    assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(mismatch).await["error"], "invalid_service");

    let ok = h
        .send(Request::get(validate_uri(service)).body(Body::empty()).unwrap())
        .await;
    assert_eq!(ok.status(), StatusCode::OK);
    let body = json_body(ok).await;
    assert_eq!(body["user"], "user-1");
    assert_eq!(body["username"], "alice");

    let replay = h
        .send(Request::get(validate_uri(service)).body(Body::empty()).unwrap())
        .await;
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(replay).await["error"], "invalid_ticket");

    let logout = h
        .send(
            Request::delete(format!("/cas/tickets/{tgt}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);

    let after_logout = h
        .form("/cas/tickets", &[("tgt", tgt.as_str()), ("service", service)])
        .await;
    assert_eq!(after_logout.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn revoke_then_introspect() {
    let h = harness().await;
    let access = h
        .tokens
        .issue_access(TokenClaims::for_user("user-1").with_client(CLIENT_ID))
        .unwrap();

    let active = json_body(h.form("/oauth/introspect", &[("token", access.as_str())]).await).await;
    assert_eq!(active["active"], true);
    assert_eq!(active["client_id"], CLIENT_ID);

    let revoked = h.form("/oauth/revoke", &[("token", access.as_str())]).await;
    assert_eq!(revoked.status(), StatusCode::OK);

    let inactive = json_body(h.form("/oauth/introspect", &[("token", access.as_str())]).await).await;
    assert_eq!(inactive, json!({ "active": false }));

    let unauthorized = h.get_bearer("/oauth/userinfo", &access).await;
    assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn well_known_documents() {
    let h = harness().await;

    let discovery = json_body(
        h.send(Request::get("/.well-known/openid-configuration").body(Body::empty()).unwrap())
            .await,
    )
    .await;
    assert_eq!(discovery["issuer"], "http://localhost:8080");
    assert_eq!(
        discovery["token_endpoint"],
        "http://localhost:8080/oauth/token"
    );

    let jwks = json_body(
        h.send(Request::get("/.well-known/jwks.json").body(Body::empty()).unwrap())
            .await,
    )
    .await;
    assert_eq!(jwks["keys"][0]["kty"], "RSA");
    assert_eq!(jwks["keys"][0]["kid"], h.tokens.current_kid());

    let health = h
        .send(Request::get("/healthz").body(Body::empty()).unwrap())
        .await;
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn rbac_admin_routes_are_gated() {
    let h = harness().await;
    let user = h.tokens.issue_access(TokenClaims::for_user("user-1")).unwrap();
    let admin = h.tokens.issue_access(TokenClaims::for_user("admin-1")).unwrap();

    let denied = h.get_bearer("/api/v1/roles", &user).await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let listed = h.get_bearer("/api/v1/roles", &admin).await;
    assert_eq!(listed.status(), StatusCode::OK);
    assert_eq!(json_body(listed).await.as_array().unwrap().len(), 3);

    let mine = json_body(h.get_bearer("/api/v1/me/permissions", &user).await).await;
    assert_eq!(mine["permissions"], json!(["user:read"]));

    let assign = h
        .send(
            Request::post("/api/v1/users/user-1/roles")
                .header(header::AUTHORIZATION, format!("Bearer {admin}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "role_code": "org_admin" }).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(assign.status(), StatusCode::NO_CONTENT);
    assert!(h.rbac.has_role("user-1", "org_admin").await.unwrap());

    let now_allowed = h.get_bearer("/api/v1/roles", &user).await;
    assert_eq!(now_allowed.status(), StatusCode::OK);

    let admin_perms = json_body(h.get_bearer("/api/v1/users/admin-1/permissions", &user).await).await;
    assert_eq!(admin_perms["permissions"], json!(["*:*"]));
}

#[tokio::test]
async fn system_roles_cannot_be_deleted_over_http() {
    let h = harness().await;
    let admin = h.tokens.issue_access(TokenClaims::for_user("admin-1")).unwrap();
    let role = h.rbac.get_role_by_code(ROLE_USER).await.unwrap();

    let response = h
        .send(
            Request::delete(format!("/api/v1/roles/{}", role.id))
                .header(header::AUTHORIZATION, format!("Bearer {admin}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn role_update_and_permission_grants() {
    let h = harness().await;
    let admin = h.tokens.issue_access(TokenClaims::for_user("admin-1")).unwrap();
    let user = h.tokens.issue_access(TokenClaims::for_user("user-1")).unwrap();

    let created = h
        .json_bearer(
            "POST",
            "/api/v1/roles",
            &admin,
            json!({ "code": "auditor", "name": "Auditor" }),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let role_id = json_body(created).await["id"].as_str().unwrap().to_string();

    let permission = h
        .json_bearer(
            "POST",
            "/api/v1/permissions",
            &admin,
            json!({ "resource": "report", "action": "read" }),
        )
        .await;
    assert_eq!(permission.status(), StatusCode::CREATED);
    let permission_id = json_body(permission).await["id"].as_str().unwrap().to_string();

    let fetched = json_body(h.get_bearer(&format!("/api/v1/permissions/{permission_id}"), &admin).await).await;
    assert_eq!(fetched["code"], "report:read");

    let updated = h
        .json_bearer(
            "PUT",
            &format!("/api/v1/roles/{role_id}"),
            &admin,
            json!({ "name": "Compliance auditor", "status": "disabled" }),
        )
        .await;
    assert_eq!(updated.status(), StatusCode::OK);
    let updated = json_body(updated).await;
    assert_eq!(updated["name"], "Compliance auditor");
    assert_eq!(updated["status"], "disabled");
    assert_eq!(updated["code"], "auditor");

    let permissions_uri = format!("/api/v1/roles/{role_id}/permissions");
    let grant = json!({ "permission_ids": [permission_id.clone()] });

    let denied = h.json_bearer("POST", &permissions_uri, &user, grant.clone()).await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let added = h.json_bearer("POST", &permissions_uri, &admin, grant.clone()).await;
    assert_eq!(added.status(), StatusCode::NO_CONTENT);

    let listed = json_body(h.get_bearer(&permissions_uri, &admin).await).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["code"], "report:read");

    let removed = h.json_bearer("DELETE", &permissions_uri, &admin, grant).await;
    assert_eq!(removed.status(), StatusCode::NO_CONTENT);
    let listed = json_body(h.get_bearer(&permissions_uri, &admin).await).await;
    assert_eq!(listed, json!([]));

    let deleted = h
        .json_bearer("DELETE", &format!("/api/v1/permissions/{permission_id}"), &admin, json!({}))
        .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    let gone = h.get_bearer(&format!("/api/v1/permissions/{permission_id}"), &admin).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn system_roles_cannot_be_renamed_over_http() {
    let h = harness().await;
    let admin = h.tokens.issue_access(TokenClaims::for_user("admin-1")).unwrap();
    let role = h.rbac.get_role_by_code(ROLE_USER).await.unwrap();

    let response = h
        .json_bearer(
            "PUT",
            &format!("/api/v1/roles/{}", role.id),
            &admin,
            json!({ "name": "Everyone" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn refresh_me_and_logout() {
    let h = harness().await;
    let login = h.login("alice", PASSWORD).await;
    let cookie = session_cookie(&login);
    let tokens = json_body(login).await;
    let access = tokens["access_token"].as_str().unwrap().to_string();
    let refresh = tokens["refresh_token"].as_str().unwrap().to_string();
    let tgt = tokens["tgt"].as_str().unwrap().to_string();

    let me = h.get_bearer("/api/v1/auth/me", &access).await;
    assert_eq!(me.status(), StatusCode::OK);
    let me = json_body(me).await;
    assert_eq!(me["id"], "user-1");
    assert_eq!(me["username"], "alice");
    assert_eq!(me["display_name"], "Alice");
    assert_eq!(me["status"], "active");
    assert!(me.get("password_hash").is_none());

    let rotated = h
        .send(
            Request::post("/api/v1/auth/refresh")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "refresh_token": refresh }).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(rotated.status(), StatusCode::OK);
    assert_eq!(rotated.headers()[header::CACHE_CONTROL], "no-store");
    let rotated = json_body(rotated).await;
    assert_eq!(rotated["token_type"], "Bearer");
    assert!(rotated["refresh_token"].is_string());

    let replay = h
        .send(
            Request::post("/api/v1/auth/refresh")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "refresh_token": refresh }).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(replay).await["error"], "invalid_grant");

    let logout = h
        .send(
            Request::post("/api/v1/auth/logout")
                .header(header::AUTHORIZATION, format!("Bearer {access}"))
                .header(header::COOKIE, cookie.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);
    let cleared = logout.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cleared.starts_with("uac_session="));

    let after = h.get_bearer("/api/v1/auth/me", &access).await;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);

    // The session is gone, so authorize asks for a login again.
    let authorize = h
        .send(
            Request::get(authorize_uri())
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(authorize.status(), StatusCode::FOUND);
    assert_eq!(location(&authorize).path(), "/login");

    // So is the TGT.
    let ticket = h
        .form("/cas/tickets", &[("tgt", tgt.as_str()), ("service", "https://svc.example.com")])
        .await;
    assert!(!ticket.status().is_success());
}

#[tokio::test]
async fn logout_requires_a_bearer() {
    let h = harness().await;
    let response = h
        .send(Request::post("/api/v1/auth/logout").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn lowercase_bearer_scheme_is_accepted() {
    let h = harness().await;
    let access = h.tokens.issue_access(TokenClaims::for_user("user-1")).unwrap();

    let response = h
        .send(
            Request::get("/api/v1/auth/me")
                .header(header::AUTHORIZATION, format!("bearer {access}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn only_super_admin_assigns_super_admin() {
    let h = harness().await;
    h.rbac.assign_role_by_code("user-1", ROLE_ORG_ADMIN).await.unwrap();
    let org_admin = h.tokens.issue_access(TokenClaims::for_user("user-1")).unwrap();
    let super_admin = h.tokens.issue_access(TokenClaims::for_user("admin-1")).unwrap();
    let body = json!({ "role_code": ROLE_SUPER_ADMIN });

    let denied = h
        .json_bearer("POST", "/api/v1/users/user-1/roles", &org_admin, body.clone())
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    assert!(!h.rbac.has_role("user-1", ROLE_SUPER_ADMIN).await.unwrap());

    let allowed = h
        .json_bearer("POST", "/api/v1/users/user-1/roles", &super_admin, body)
        .await;
    assert_eq!(allowed.status(), StatusCode::NO_CONTENT);
    assert!(h.rbac.has_role("user-1", ROLE_SUPER_ADMIN).await.unwrap());
}

#[tokio::test]
async fn token_endpoint_reports_store_outage() {
    let h = harness_with_store(Arc::new(DownStore)).await;
    let refresh = h
        .tokens
        .issue_refresh(TokenClaims::for_user("user-1"))
        .unwrap();

    let response = h
        .form(
            "/oauth/token",
            &[("grant_type", "refresh_token"), ("refresh_token", refresh.as_str())],
        )
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"], "server_error");

    let revoked = h.form("/oauth/revoke", &[("token", refresh.as_str())]).await;
    assert_eq!(revoked.status(), StatusCode::OK);

    let introspected = json_body(h.form("/oauth/introspect", &[("token", refresh.as_str())]).await).await;
    assert_eq!(introspected, json!({ "active": false }));
}
