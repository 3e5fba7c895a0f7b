//! Registered OAuth applications.
//!
//! Application CRUD lives outside this crate; the protocol handler only
//! needs [`ApplicationLookup`]. [`MemoryApplicationStore`] backs tests and
//! local runs.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::AuthResult;
use crate::oauth::validation::redirect_uri_registered;
use crate::secret::verify_secret;

/// OAuth profile an application is registered under.
///
/// 2.1 applications must use PKCE and never get the implicit flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OAuthProfile {
    #[serde(rename = "2.0")]
    V2_0,
    #[default]
    #[serde(rename = "2.1")]
    V2_1,
}

impl OAuthProfile {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V2_0 => "2.0",
            Self::V2_1 => "2.1",
        }
    }
}

/// Application status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Active,
    Disabled,
}

/// A registered OAuth client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    #[serde(default)]
    pub org_id: Option<String>,
    pub name: String,
    pub client_id: String,

    /// Argon2 PHC string. Empty for public clients.
    #[serde(default, skip_serializing)]
    pub client_secret_hash: String,

    #[serde(default)]
    pub oauth_profile: OAuthProfile,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub allowed_scopes: Vec<String>,
    #[serde(default)]
    pub status: ApplicationStatus,
}

impl Application {
    /// An active 2.1 application with no redirects, scopes or secret.
    #[must_use]
    pub fn new(name: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            org_id: None,
            name: name.into(),
            client_id: client_id.into(),
            client_secret_hash: String::new(),
            oauth_profile: OAuthProfile::V2_1,
            redirect_uris: Vec::new(),
            allowed_scopes: Vec::new(),
            status: ApplicationStatus::Active,
        }
    }

    #[must_use]
    pub fn with_secret_hash(mut self, hash: impl Into<String>) -> Self {
        self.client_secret_hash = hash.into();
        self
    }

    #[must_use]
    pub fn with_profile(mut self, profile: OAuthProfile) -> Self {
        self.oauth_profile = profile;
        self
    }

    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.push(uri.into());
        self
    }

    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: ApplicationStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ApplicationStatus::Active
    }

    #[must_use]
    pub fn is_oauth21(&self) -> bool {
        self.oauth_profile == OAuthProfile::V2_1
    }

    #[must_use]
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        redirect_uri_registered(&self.redirect_uris, uri)
    }

    /// Verifies a presented client secret. Public clients (no hash) never match.
    #[must_use]
    pub fn verify_client_secret(&self, secret: &str) -> bool {
        if self.client_secret_hash.is_empty() {
            return false;
        }
        match verify_secret(secret, &self.client_secret_hash) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::error!(client_id = %self.client_id, error = %e, "Stored client secret hash is malformed");
                false
            }
        }
    }
}

/// Read access to registered applications.
#[async_trait]
pub trait ApplicationLookup: Send + Sync {
    /// Finds an application by client id. Inactive applications are returned
    /// too; the caller decides.
    async fn get_by_client_id(&self, client_id: &str) -> AuthResult<Option<Application>>;
}

/// In-memory application registry keyed by client id.
#[derive(Debug, Default)]
pub struct MemoryApplicationStore {
    applications: DashMap<String, Application>,
}

impl MemoryApplicationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an application.
    pub fn insert(&self, application: Application) {
        self.applications
            .insert(application.client_id.clone(), application);
    }

    /// Removes an application; returns it if present.
    pub fn remove(&self, client_id: &str) -> Option<Application> {
        self.applications.remove(client_id).map(|(_, app)| app)
    }
}

#[async_trait]
impl ApplicationLookup for MemoryApplicationStore {
    async fn get_by_client_id(&self, client_id: &str) -> AuthResult<Option<Application>> {
        Ok(self
            .applications
            .get(client_id)
            .map(|entry| entry.value().clone()))
    }
}
