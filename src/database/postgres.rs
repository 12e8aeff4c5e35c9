use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{
    App, AppSettingsUpdate, AzureLink, NewApp, NewResourceGroup, NewSubscription, NewUser,
    ResourceGroup, Subscription, SyncedApp, User, NO_BUDGET,
};
use super::store::Store;

/// sqlx-backed store
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply embedded migrations
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, name, client_id, client_secret, tenant_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&user.client_id)
        .bind(&user.client_secret)
        .bind(&user.tenant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_write(e, "User"))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn save_azure_link(&self, user_id: Uuid, link: &AzureLink) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET azure_access_token = $2,
                azure_refresh_token = COALESCE($3, azure_refresh_token),
                azure_expires_at = $4,
                azure_tenant_id = $5,
                is_dev_ops = TRUE,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&link.access_token)
        .bind(&link.refresh_token)
        .bind(link.expires_at)
        .bind(&link.tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound("User not found in database".to_string()))
    }

    async fn upsert_subscription(&self, sub: NewSubscription) -> Result<Subscription, DatabaseError> {
        Ok(sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (id, user_id, subscription_id, display_name, tenant_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, subscription_id) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                tenant_id = EXCLUDED.tenant_id,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(sub.user_id)
        .bind(&sub.subscription_id)
        .bind(&sub.display_name)
        .bind(&sub.tenant_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_subscriptions(&self, user_id: Uuid) -> Result<Vec<Subscription>, DatabaseError> {
        Ok(sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_subscription(&self, subscription_id: &str) -> Result<Option<Subscription>, DatabaseError> {
        Ok(sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE subscription_id = $1 ORDER BY created_at LIMIT 1",
        )
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create_resource_group(&self, group: NewResourceGroup) -> Result<ResourceGroup, DatabaseError> {
        sqlx::query_as::<_, ResourceGroup>(
            r#"
            INSERT INTO resource_groups (id, user_id, subscription_id, name, location)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(group.user_id)
        .bind(&group.subscription_id)
        .bind(&group.name)
        .bind(&group.location)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_write(e, "Resource group"))
    }

    async fn upsert_resource_group(&self, group: NewResourceGroup) -> Result<ResourceGroup, DatabaseError> {
        Ok(sqlx::query_as::<_, ResourceGroup>(
            r#"
            INSERT INTO resource_groups (id, user_id, subscription_id, name, location)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, subscription_id, name) DO UPDATE
            SET location = EXCLUDED.location,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(group.user_id)
        .bind(&group.subscription_id)
        .bind(&group.name)
        .bind(&group.location)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_resource_groups(&self, user_id: Uuid) -> Result<Vec<ResourceGroup>, DatabaseError> {
        Ok(sqlx::query_as::<_, ResourceGroup>(
            "SELECT * FROM resource_groups WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_resource_groups(&self, user_id: Uuid, name: &str) -> Result<Vec<ResourceGroup>, DatabaseError> {
        Ok(sqlx::query_as::<_, ResourceGroup>(
            "SELECT * FROM resource_groups WHERE user_id = $1 AND name = $2 ORDER BY created_at",
        )
        .bind(user_id)
        .bind(name)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_resource_group_in_subscription(
        &self,
        subscription_id: &str,
        name: &str,
    ) -> Result<Option<ResourceGroup>, DatabaseError> {
        Ok(sqlx::query_as::<_, ResourceGroup>(
            "SELECT * FROM resource_groups WHERE subscription_id = $1 AND name = $2 ORDER BY created_at LIMIT 1",
        )
        .bind(subscription_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update_resource_group_budget(
        &self,
        id: Uuid,
        budget: f64,
        auto_stop: bool,
    ) -> Result<ResourceGroup, DatabaseError> {
        sqlx::query_as::<_, ResourceGroup>(
            r#"
            UPDATE resource_groups
            SET budget = $2, auto_stop = $3, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(budget)
        .bind(auto_stop)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound("Resource group not found".to_string()))
    }

    async fn create_app(&self, app: NewApp) -> Result<App, DatabaseError> {
        sqlx::query_as::<_, App>(
            r#"
            INSERT INTO apps (id, user_id, name, subscription_id, resource_group, app_service_name, budget)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(app.user_id)
        .bind(&app.name)
        .bind(&app.subscription_id)
        .bind(&app.resource_group)
        .bind(&app.app_service_name)
        .bind(app.budget)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_write(e, "App"))
    }

    async fn find_app(&self, id: Uuid) -> Result<Option<App>, DatabaseError> {
        Ok(sqlx::query_as::<_, App>("SELECT * FROM apps WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_apps(&self, user_id: Uuid) -> Result<Vec<App>, DatabaseError> {
        Ok(sqlx::query_as::<_, App>("SELECT * FROM apps WHERE user_id = $1 ORDER BY created_at")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_all_apps(&self) -> Result<Vec<App>, DatabaseError> {
        Ok(sqlx::query_as::<_, App>("SELECT * FROM apps ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_apps_in_resource_group(
        &self,
        subscription_id: &str,
        resource_group: &str,
    ) -> Result<Vec<App>, DatabaseError> {
        Ok(sqlx::query_as::<_, App>(
            "SELECT * FROM apps WHERE subscription_id = $1 AND resource_group = $2 ORDER BY created_at",
        )
        .bind(subscription_id)
        .bind(resource_group)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn upsert_synced_app(&self, app: SyncedApp) -> Result<App, DatabaseError> {
        let updated = sqlx::query_as::<_, App>(
            r#"
            UPDATE apps
            SET location = $4,
                resource_group = $5,
                app_service_name = $3,
                is_draft = FALSE,
                current_cost = 0,
                updated_at = now()
            WHERE user_id = $1 AND subscription_id = $2 AND app_name = $3
            RETURNING *
            "#,
        )
        .bind(app.user_id)
        .bind(&app.subscription_id)
        .bind(&app.app_name)
        .bind(&app.location)
        .bind(&app.resource_group)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(existing) = updated {
            return Ok(existing);
        }

        sqlx::query_as::<_, App>(
            r#"
            INSERT INTO apps (
                id, user_id, name, subscription_id, resource_group, app_service_name,
                app_name, location, budget, is_draft
            )
            VALUES ($1, $2, $3, $4, $5, $3, $3, $6, $7, FALSE)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(app.user_id)
        .bind(&app.app_name)
        .bind(&app.subscription_id)
        .bind(&app.resource_group)
        .bind(&app.location)
        .bind(NO_BUDGET)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_write(e, "App"))
    }

    async fn mark_app_deployed(&self, id: Uuid, app_name: &str) -> Result<App, DatabaseError> {
        sqlx::query_as::<_, App>(
            r#"
            UPDATE apps
            SET is_draft = FALSE, app_name = $2, deployed_at = now(), updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(app_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_write(e, "Web app"))?
        .ok_or_else(|| DatabaseError::NotFound("App not found".to_string()))
    }

    async fn update_app_settings(&self, id: Uuid, update: AppSettingsUpdate) -> Result<App, DatabaseError> {
        sqlx::query_as::<_, App>(
            r#"
            UPDATE apps
            SET budget = COALESCE($2, budget),
                auto_stop = COALESCE($3, auto_stop),
                env_vars = env_vars || COALESCE($4, '{}'::jsonb),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.budget)
        .bind(update.auto_stop)
        .bind(update.env_vars.map(Json))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound("App not found".to_string()))
    }

    async fn update_app_cost(&self, id: Uuid, cost: f64) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE apps SET current_cost = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(cost)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_app(&self, id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM apps WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
