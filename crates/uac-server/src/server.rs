use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::task::JoinHandle;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use uac_auth::account::{Account, AccountStorage, MemoryAccountStorage};
use uac_auth::cas::CasService;
use uac_auth::http::AppState;
use uac_auth::oauth::{Application, MemoryApplicationStore, OAuthService};
use uac_auth::rbac::{MemoryRbacStorage, ROLE_SUPER_ADMIN, RbacEngine, RbacService};
use uac_auth::secret::hash_secret;
use uac_auth::store::{KeyValueStore, MemoryStore};
use uac_auth::token::service::TokenConfig;
use uac_auth::token::{JwtService, JwtTokenService, SigningKeyPair};

use crate::config::{AppConfig, BootstrapConfig, RedisConfig};

/// The store selected at startup.
///
/// The in-process handle is kept so expired entries can be swept.
pub struct SharedStore {
    pub store: Arc<dyn KeyValueStore>,
    pub memory: Option<MemoryStore>,
}

impl SharedStore {
    fn memory() -> Self {
        let memory = MemoryStore::new();
        Self {
            store: Arc::new(memory.clone()),
            memory: Some(memory),
        }
    }
}

/// Pick the shared store.
///
/// Redis when enabled and reachable, otherwise the in-process store so a
/// single instance can still serve.
pub async fn create_store(config: &RedisConfig) -> SharedStore {
    if !config.enabled {
        tracing::info!("Redis disabled, using in-process store");
        return SharedStore::memory();
    }
    connect_redis(config).await
}

#[cfg(feature = "redis-store")]
async fn connect_redis(config: &RedisConfig) -> SharedStore {
    use std::time::Duration;
    use uac_auth::store::RedisStore;

    tracing::info!(url = %config.url, "Connecting to Redis");

    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let timeout = Duration::from_millis(config.timeout_ms);
    redis_config.pool = Some(deadpool_redis::PoolConfig {
        max_size: config.pool_size,
        timeouts: deadpool_redis::Timeouts {
            wait: Some(timeout),
            create: Some(timeout),
            recycle: Some(timeout),
        },
        ..Default::default()
    });

    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create Redis pool. Falling back to in-process store.");
            return SharedStore::memory();
        }
    };

    let store = RedisStore::new(pool);
    if store.is_available().await {
        tracing::info!("Connected to Redis");
        SharedStore {
            store: Arc::new(store),
            memory: None,
        }
    } else {
        tracing::warn!("Failed to connect to Redis. Falling back to in-process store.");
        SharedStore::memory()
    }
}

#[cfg(not(feature = "redis-store"))]
async fn connect_redis(_config: &RedisConfig) -> SharedStore {
    tracing::warn!("Redis enabled but built without redis-store; using in-process store");
    SharedStore::memory()
}

async fn load_signing_key(cfg: &AppConfig) -> anyhow::Result<SigningKeyPair> {
    let signing = &cfg.auth.signing;
    match &signing.private_key_path {
        Some(path) => {
            let pem = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading signing key {}", path.display()))?;
            let key = SigningKeyPair::from_pem(&pem, signing.kid.clone())
                .context("parsing signing key")?;
            tracing::info!(path = %path.display(), "Loaded signing key");
            Ok(key)
        }
        None => {
            tracing::warn!("No signing key configured; generated an ephemeral RSA key");
            SigningKeyPair::generate_rsa().context("generating signing key")
        }
    }
}

fn hash(secret: &str) -> anyhow::Result<String> {
    hash_secret(secret).map_err(|e| anyhow::anyhow!("hashing secret: {e}"))
}

async fn seed(
    bootstrap: &BootstrapConfig,
    accounts: &MemoryAccountStorage,
    applications: &MemoryApplicationStore,
    rbac: &dyn RbacEngine,
) -> anyhow::Result<()> {
    if let Some(admin) = &bootstrap.admin_user {
        let existing = accounts
            .find_by_username(&admin.username)
            .await
            .context("looking up bootstrap admin")?;
        let account = match existing {
            Some(account) => account,
            None => {
                let mut account =
                    Account::new(&admin.username).with_password_hash(hash(&admin.password)?);
                if let Some(email) = &admin.email {
                    account = account.with_email(email);
                }
                accounts.insert(account.clone());
                account
            }
        };
        rbac.assign_role_by_code(&account.id, ROLE_SUPER_ADMIN)
            .await
            .context("granting super_admin to bootstrap admin")?;
        tracing::info!(username = %admin.username, "Bootstrap admin ready");
    }

    for app in &bootstrap.applications {
        let mut application = Application::new(&app.name, &app.client_id)
            .with_profile(app.oauth_profile)
            .with_scopes(app.scopes.iter().cloned());
        for uri in &app.redirect_uris {
            application = application.with_redirect_uri(uri);
        }
        if let Some(secret) = &app.client_secret {
            application = application.with_secret_hash(hash(secret)?);
        }
        applications.insert(application);
        tracing::info!(client_id = %app.client_id, "Registered application");
    }
    Ok(())
}

/// Wire every service from configuration.
pub async fn build_state(cfg: &AppConfig, store: Arc<dyn KeyValueStore>) -> anyhow::Result<AppState> {
    let auth = &cfg.auth;

    let jwt = JwtService::new(load_signing_key(cfg).await?, auth.issuer.clone());
    let tokens = Arc::new(JwtTokenService::new(
        jwt,
        store.clone(),
        TokenConfig::from_auth_config(auth),
    ));

    let accounts = Arc::new(MemoryAccountStorage::new());
    let applications = Arc::new(MemoryApplicationStore::new());

    let rbac = Arc::new(RbacService::with_storage(Arc::new(MemoryRbacStorage::new())));
    rbac.init_default_roles_and_permissions()
        .await
        .context("initializing default roles")?;

    seed(&cfg.bootstrap, &accounts, &applications, rbac.as_ref()).await?;

    let oauth = Arc::new(OAuthService::new(
        tokens.clone(),
        applications,
        accounts.clone(),
        auth.oauth.clone(),
    ));
    let cas = Arc::new(CasService::new(store, auth.cas.clone()));

    Ok(AppState::new(auth, tokens, oauth, cas, rbac, accounts))
}

pub fn build_app(cfg: &AppConfig, state: AppState) -> Router {
    uac_auth::router(state)
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri().path(),
                        http.status_code = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(cfg.server.body_limit_bytes))
}

/// Sweep expired entries from the in-process store on an interval.
pub fn spawn_purge_task(store: MemoryStore, every: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purged = store.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, remaining = store.len(), "Purged expired store entries");
            }
        }
    })
}

pub struct UacServer {
    addr: SocketAddr,
    app: Router,
    purge_task: Option<JoinHandle<()>>,
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<UacServer> {
        let shared = create_store(&self.config.redis).await;
        let state = build_state(&self.config, shared.store).await?;
        let app = build_app(&self.config, state);

        let purge_task = shared
            .memory
            .map(|memory| spawn_purge_task(memory, self.config.store.purge_interval));

        Ok(UacServer {
            addr: self.addr,
            app,
            purge_task,
        })
    }
}

impl UacServer {
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("binding {}", self.addr))?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        if let Some(task) = self.purge_task {
            task.abort();
        }
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
