use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{
    App, AppSettingsUpdate, AzureLink, NewApp, NewResourceGroup, NewSubscription, NewUser,
    ResourceGroup, Subscription, SyncedApp, User, NO_BUDGET,
};
use super::store::Store;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    subscriptions: HashMap<Uuid, Subscription>,
    resource_groups: HashMap<Uuid, ResourceGroup>,
    apps: HashMap<Uuid, App>,
}

/// In-process store with the same uniqueness rules as the PostgreSQL schema
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Rows in insertion order, like `ORDER BY created_at`
fn ordered<T: Clone>(rows: impl Iterator<Item = T>, key: impl Fn(&T) -> chrono::DateTime<Utc>) -> Vec<T> {
    let mut rows: Vec<T> = rows.collect();
    rows.sort_by_key(|r| key(r));
    rows
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(DatabaseError::Conflict("User already exists".to_string()));
        }
        let now = Utc::now();
        let row = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            name: user.name,
            client_id: user.client_id,
            client_secret: user.client_secret,
            tenant_id: user.tenant_id,
            azure_access_token: None,
            azure_refresh_token: None,
            azure_expires_at: None,
            azure_tenant_id: None,
            is_dev_ops: false,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn save_azure_link(&self, user_id: Uuid, link: &AzureLink) -> Result<User, DatabaseError> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| DatabaseError::NotFound("User not found in database".to_string()))?;
        user.azure_access_token = Some(link.access_token.clone());
        if link.refresh_token.is_some() {
            user.azure_refresh_token = link.refresh_token.clone();
        }
        user.azure_expires_at = link.expires_at;
        user.azure_tenant_id = Some(link.tenant_id.clone());
        user.is_dev_ops = true;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn upsert_subscription(&self, sub: NewSubscription) -> Result<Subscription, DatabaseError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        if let Some(existing) = tables
            .subscriptions
            .values_mut()
            .find(|s| s.user_id == sub.user_id && s.subscription_id == sub.subscription_id)
        {
            existing.display_name = sub.display_name;
            existing.tenant_id = sub.tenant_id;
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let row = Subscription {
            id: Uuid::new_v4(),
            user_id: sub.user_id,
            subscription_id: sub.subscription_id,
            display_name: sub.display_name,
            tenant_id: sub.tenant_id,
            created_at: now,
            updated_at: now,
        };
        tables.subscriptions.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_subscriptions(&self, user_id: Uuid) -> Result<Vec<Subscription>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(ordered(
            tables.subscriptions.values().filter(|s| s.user_id == user_id).cloned(),
            |s| s.created_at,
        ))
    }

    async fn find_subscription(&self, subscription_id: &str) -> Result<Option<Subscription>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(ordered(
            tables
                .subscriptions
                .values()
                .filter(|s| s.subscription_id == subscription_id)
                .cloned(),
            |s| s.created_at,
        )
        .into_iter()
        .next())
    }

    async fn create_resource_group(&self, group: NewResourceGroup) -> Result<ResourceGroup, DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.resource_groups.values().any(|g| {
            g.user_id == group.user_id && g.subscription_id == group.subscription_id && g.name == group.name
        }) {
            return Err(DatabaseError::Conflict("Resource group already exists".to_string()));
        }
        let now = Utc::now();
        let row = ResourceGroup {
            id: Uuid::new_v4(),
            user_id: group.user_id,
            subscription_id: group.subscription_id,
            name: group.name,
            location: group.location,
            budget: 0.0,
            auto_stop: false,
            created_at: now,
            updated_at: now,
        };
        tables.resource_groups.insert(row.id, row.clone());
        Ok(row)
    }

    async fn upsert_resource_group(&self, group: NewResourceGroup) -> Result<ResourceGroup, DatabaseError> {
        {
            let mut tables = self.tables.write().await;
            if let Some(existing) = tables.resource_groups.values_mut().find(|g| {
                g.user_id == group.user_id && g.subscription_id == group.subscription_id && g.name == group.name
            }) {
                existing.location = group.location;
                existing.updated_at = Utc::now();
                return Ok(existing.clone());
            }
        }
        self.create_resource_group(group).await
    }

    async fn list_resource_groups(&self, user_id: Uuid) -> Result<Vec<ResourceGroup>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(ordered(
            tables.resource_groups.values().filter(|g| g.user_id == user_id).cloned(),
            |g| g.created_at,
        ))
    }

    async fn find_resource_groups(&self, user_id: Uuid, name: &str) -> Result<Vec<ResourceGroup>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(ordered(
            tables
                .resource_groups
                .values()
                .filter(|g| g.user_id == user_id && g.name == name)
                .cloned(),
            |g| g.created_at,
        ))
    }

    async fn find_resource_group_in_subscription(
        &self,
        subscription_id: &str,
        name: &str,
    ) -> Result<Option<ResourceGroup>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(ordered(
            tables
                .resource_groups
                .values()
                .filter(|g| g.subscription_id == subscription_id && g.name == name)
                .cloned(),
            |g| g.created_at,
        )
        .into_iter()
        .next())
    }

    async fn update_resource_group_budget(
        &self,
        id: Uuid,
        budget: f64,
        auto_stop: bool,
    ) -> Result<ResourceGroup, DatabaseError> {
        let mut tables = self.tables.write().await;
        let group = tables
            .resource_groups
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound("Resource group not found".to_string()))?;
        group.budget = budget;
        group.auto_stop = auto_stop;
        group.updated_at = Utc::now();
        Ok(group.clone())
    }

    async fn create_app(&self, app: NewApp) -> Result<App, DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.apps.values().any(|a| a.user_id == app.user_id && a.name == app.name) {
            return Err(DatabaseError::Conflict("App already exists".to_string()));
        }
        let now = Utc::now();
        let row = App {
            id: Uuid::new_v4(),
            user_id: app.user_id,
            name: app.name,
            subscription_id: app.subscription_id,
            resource_group: app.resource_group,
            app_service_name: app.app_service_name,
            app_name: None,
            location: None,
            budget: app.budget,
            current_cost: 0.0,
            status: false,
            is_draft: true,
            auto_stop: false,
            env_vars: Json(BTreeMap::new()),
            deployed_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.apps.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_app(&self, id: Uuid) -> Result<Option<App>, DatabaseError> {
        Ok(self.tables.read().await.apps.get(&id).cloned())
    }

    async fn list_apps(&self, user_id: Uuid) -> Result<Vec<App>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(ordered(
            tables.apps.values().filter(|a| a.user_id == user_id).cloned(),
            |a| a.created_at,
        ))
    }

    async fn list_all_apps(&self) -> Result<Vec<App>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(ordered(tables.apps.values().cloned(), |a| a.created_at))
    }

    async fn list_apps_in_resource_group(
        &self,
        subscription_id: &str,
        resource_group: &str,
    ) -> Result<Vec<App>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(ordered(
            tables
                .apps
                .values()
                .filter(|a| a.subscription_id == subscription_id && a.resource_group == resource_group)
                .cloned(),
            |a| a.created_at,
        ))
    }

    async fn upsert_synced_app(&self, app: SyncedApp) -> Result<App, DatabaseError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        if let Some(existing) = tables.apps.values_mut().find(|a| {
            a.user_id == app.user_id
                && a.subscription_id == app.subscription_id
                && a.app_name.as_deref() == Some(app.app_name.as_str())
        }) {
            existing.location = app.location;
            existing.resource_group = app.resource_group;
            existing.app_service_name = app.app_name;
            existing.is_draft = false;
            existing.current_cost = 0.0;
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        if tables.apps.values().any(|a| a.user_id == app.user_id && a.name == app.app_name) {
            return Err(DatabaseError::Conflict("App already exists".to_string()));
        }
        let row = App {
            id: Uuid::new_v4(),
            user_id: app.user_id,
            name: app.app_name.clone(),
            subscription_id: app.subscription_id,
            resource_group: app.resource_group,
            app_service_name: app.app_name.clone(),
            app_name: Some(app.app_name),
            location: app.location,
            budget: NO_BUDGET,
            current_cost: 0.0,
            status: false,
            is_draft: false,
            auto_stop: false,
            env_vars: Json(BTreeMap::new()),
            deployed_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.apps.insert(row.id, row.clone());
        Ok(row)
    }

    async fn mark_app_deployed(&self, id: Uuid, app_name: &str) -> Result<App, DatabaseError> {
        let mut tables = self.tables.write().await;
        let app = tables
            .apps
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound("App not found".to_string()))?;
        let now = Utc::now();
        app.is_draft = false;
        app.app_name = Some(app_name.to_string());
        app.deployed_at = Some(now);
        app.updated_at = now;
        Ok(app.clone())
    }

    async fn update_app_settings(&self, id: Uuid, update: AppSettingsUpdate) -> Result<App, DatabaseError> {
        let mut tables = self.tables.write().await;
        let app = tables
            .apps
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound("App not found".to_string()))?;
        if let Some(budget) = update.budget {
            app.budget = budget;
        }
        if let Some(auto_stop) = update.auto_stop {
            app.auto_stop = auto_stop;
        }
        if let Some(env_vars) = update.env_vars {
            app.env_vars.0.extend(env_vars);
        }
        app.updated_at = Utc::now();
        Ok(app.clone())
    }

    async fn update_app_cost(&self, id: Uuid, cost: f64) -> Result<(), DatabaseError> {
        if let Some(app) = self.tables.write().await.apps.get_mut(&id) {
            app.current_cost = cost;
            app.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_app(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.tables.write().await.apps.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            name: "Dev".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            tenant_id: "tenant".to_string(),
        }
    }

    fn new_app(user_id: Uuid, name: &str) -> NewApp {
        NewApp {
            user_id,
            name: name.to_string(),
            subscription_id: "sub-1".to_string(),
            resource_group: "rg-1".to_string(),
            app_service_name: "svc".to_string(),
            budget: 50.0,
        }
    }

    #[tokio::test]
    async fn email_is_unique() {
        let store = MemoryStore::new();
        store.create_user(new_user("a@example.com")).await.unwrap();
        let err = store.create_user(new_user("a@example.com")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));
    }

    #[tokio::test]
    async fn app_names_are_unique_per_user_only() {
        let store = MemoryStore::new();
        let alice = store.create_user(new_user("alice@example.com")).await.unwrap();
        let bob = store.create_user(new_user("bob@example.com")).await.unwrap();

        store.create_app(new_app(alice.id, "shop")).await.unwrap();
        assert!(matches!(
            store.create_app(new_app(alice.id, "shop")).await,
            Err(DatabaseError::Conflict(_))
        ));
        store.create_app(new_app(bob.id, "shop")).await.unwrap();
    }

    #[tokio::test]
    async fn synced_app_keeps_existing_name() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("dev@example.com")).await.unwrap();
        let app = store.create_app(new_app(user.id, "My Shop")).await.unwrap();
        store.mark_app_deployed(app.id, "shop-site").await.unwrap();

        let synced = store
            .upsert_synced_app(SyncedApp {
                user_id: user.id,
                subscription_id: "sub-1".to_string(),
                app_name: "shop-site".to_string(),
                resource_group: "rg-2".to_string(),
                location: Some("westeurope".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(synced.id, app.id);
        assert_eq!(synced.name, "My Shop");
        assert_eq!(synced.resource_group, "rg-2");
        assert_eq!(store.list_apps(user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn env_vars_are_merged() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("dev@example.com")).await.unwrap();
        let app = store.create_app(new_app(user.id, "shop")).await.unwrap();

        let first = BTreeMap::from([("A".to_string(), "1".to_string())]);
        let second = BTreeMap::from([("B".to_string(), "2".to_string())]);
        store
            .update_app_settings(app.id, AppSettingsUpdate { env_vars: Some(first), ..Default::default() })
            .await
            .unwrap();
        let updated = store
            .update_app_settings(
                app.id,
                AppSettingsUpdate { env_vars: Some(second), budget: Some(20.0), auto_stop: Some(true) },
            )
            .await
            .unwrap();

        assert_eq!(updated.env_vars.0.len(), 2);
        assert_eq!(updated.budget, 20.0);
        assert!(updated.auto_stop);
    }

    #[tokio::test]
    async fn azure_link_marks_devops_and_keeps_refresh_token() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("dev@example.com")).await.unwrap();
        let link = AzureLink {
            access_token: "a1".into(),
            refresh_token: Some("r1".into()),
            expires_at: None,
            tenant_id: "tenant".into(),
        };
        store.save_azure_link(user.id, &link).await.unwrap();
        let relinked = store
            .save_azure_link(user.id, &AzureLink { access_token: "a2".into(), refresh_token: None, ..link })
            .await
            .unwrap();

        assert!(relinked.is_dev_ops);
        assert_eq!(relinked.azure_access_token.as_deref(), Some("a2"));
        assert_eq!(relinked.azure_refresh_token.as_deref(), Some("r1"));
    }
}
