//! Role and permission lookup against the external authorization service.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

/// Roles and flattened permissions granted to a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleGrant {
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

#[async_trait]
pub trait RoleResolver: Send + Sync {
    async fn resolve(&self, user_id: Uuid) -> Result<RoleGrant, anyhow::Error>;
}

/// Resolve a grant, degrading to an empty one when the resolver fails.
pub async fn resolve_or_empty(resolver: &dyn RoleResolver, user_id: Uuid) -> RoleGrant {
    match resolver.resolve(user_id).await {
        Ok(grant) => grant,
        Err(e) => {
            tracing::warn!(
                user_id = %user_id,
                error = %e,
                "Role resolution failed, issuing token without roles"
            );
            RoleGrant::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct RolesEnvelope {
    success: bool,
    #[serde(default)]
    data: Vec<RoleWithPermissions>,
}

#[derive(Debug, Deserialize)]
struct RoleWithPermissions {
    role: String,
    #[serde(default)]
    permissions: Vec<String>,
}

/// Calls `GET {base}/auth/users/{id}/roles-with-permissions`.
#[derive(Clone)]
pub struct HttpRoleResolver {
    base_url: String,
    client: Client,
}

impl HttpRoleResolver {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self, anyhow::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

fn flatten(entries: Vec<RoleWithPermissions>) -> RoleGrant {
    let mut roles = Vec::with_capacity(entries.len());
    let mut permissions = BTreeSet::new();
    for entry in entries {
        if !roles.contains(&entry.role) {
            roles.push(entry.role);
        }
        permissions.extend(entry.permissions);
    }
    RoleGrant {
        roles,
        permissions: permissions.into_iter().collect(),
    }
}

#[async_trait]
impl RoleResolver for HttpRoleResolver {
    async fn resolve(&self, user_id: Uuid) -> Result<RoleGrant, anyhow::Error> {
        let url = format!(
            "{}/auth/users/{}/roles-with-permissions",
            self.base_url, user_id
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Authorization service request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Authorization service error {}: {}",
                status,
                error_text
            ));
        }

        let envelope: RolesEnvelope = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Invalid authorization service response: {}", e))?;

        if !envelope.success {
            return Err(anyhow::anyhow!("Authorization service reported failure"));
        }

        Ok(flatten(envelope.data))
    }
}

/// Fixed grant, or a permanently failing resolver. Used when no
/// authorization service is configured and in tests.
#[derive(Clone, Default)]
pub struct StaticRoleResolver {
    grant: Option<RoleGrant>,
}

impl StaticRoleResolver {
    pub fn new(grant: RoleGrant) -> Self {
        Self { grant: Some(grant) }
    }

    pub fn unavailable() -> Self {
        Self { grant: None }
    }
}

#[async_trait]
impl RoleResolver for StaticRoleResolver {
    async fn resolve(&self, _user_id: Uuid) -> Result<RoleGrant, anyhow::Error> {
        self.grant
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Authorization service unavailable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_dedupes_roles_and_permissions() {
        let body = r#"{
            "success": true,
            "data": [
                {"role": "editor", "permissions": ["docs:write", "docs:read"]},
                {"role": "viewer", "permissions": ["docs:read"]}
            ]
        }"#;
        let envelope: RolesEnvelope = serde_json::from_str(body).unwrap();
        let grant = flatten(envelope.data);

        assert_eq!(grant.roles, vec!["editor", "viewer"]);
        assert_eq!(grant.permissions, vec!["docs:read", "docs:write"]);
    }

    #[tokio::test]
    async fn unavailable_resolver_degrades_to_empty() {
        let grant = resolve_or_empty(&StaticRoleResolver::unavailable(), Uuid::new_v4()).await;
        assert_eq!(grant, RoleGrant::default());
    }

    #[tokio::test]
    async fn static_resolver_returns_its_grant() {
        let expected = RoleGrant {
            roles: vec!["admin".to_string()],
            permissions: vec![],
        };
        let resolver = StaticRoleResolver::new(expected.clone());
        assert_eq!(resolver.resolve(Uuid::new_v4()).await.unwrap(), expected);
    }
}
