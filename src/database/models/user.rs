use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Dashboard account. Carries the user's own Azure AD app registration
/// (`client_id`/`client_secret`/`tenant_id`) and, once linked, the ARM tokens.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub tenant_id: String,
    #[serde(skip_serializing)]
    pub azure_access_token: Option<String>,
    #[serde(skip_serializing)]
    pub azure_refresh_token: Option<String>,
    pub azure_expires_at: Option<DateTime<Utc>>,
    pub azure_tenant_id: Option<String>,
    pub is_dev_ops: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Linked Azure session, if the OAuth callback has completed
    pub fn azure_link(&self) -> Option<AzureLink> {
        let access_token = self.azure_access_token.clone()?;
        Some(AzureLink {
            access_token,
            refresh_token: self.azure_refresh_token.clone(),
            expires_at: self.azure_expires_at,
            tenant_id: self.azure_tenant_id.clone().unwrap_or_else(|| self.tenant_id.clone()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AzureLink {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub tenant_id: String,
}

impl AzureLink {
    /// True when the token is gone or will be within `skew_secs`
    pub fn expires_within(&self, skew_secs: i64) -> bool {
        match self.expires_at {
            Some(at) => at <= Utc::now() + chrono::Duration::seconds(skew_secs),
            None => false,
        }
    }
}
