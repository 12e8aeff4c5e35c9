use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub azure: AzureConfig,
    pub budget: BudgetConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `postgres://...` for the sqlx store, `memory://` for the in-process store
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Externally reachable origin of the dashboard, used for redirects and budget webhooks
    pub public_base_url: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub secure_cookies: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    pub management_url: String,
    pub login_url: String,
    /// `{app}` is replaced by the site name
    pub kudu_url_template: String,
    pub redirect_uri: String,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub provider_poll_attempts: u32,
    pub provider_poll_interval_ms: u64,
    pub app_service_plan: String,
    pub linux_fx_version: String,
    pub default_location: String,
    /// Tokens expiring within this window are refreshed before use
    pub token_refresh_skew_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(skip_serializing)]
    pub webhook_key: String,
    pub sweep_interval_secs: u64,
    pub default_amount: f64,
    pub default_threshold: f64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(v) = env::var("AZORA_API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Ok(v) = env::var("APP_BASE_URL") {
            self.api.public_base_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("API_MAX_UPLOAD_BYTES") {
            self.api.max_upload_bytes = v.parse().unwrap_or(self.api.max_upload_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_SECURE_COOKIES") {
            self.security.secure_cookies = v.parse().unwrap_or(self.security.secure_cookies);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Azure overrides
        if let Ok(v) = env::var("AZURE_MANAGEMENT_URL") {
            self.azure.management_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("AZURE_LOGIN_URL") {
            self.azure.login_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("AZURE_KUDU_URL_TEMPLATE") {
            self.azure.kudu_url_template = v;
        }
        if let Ok(v) = env::var("AZURE_REDIRECT_URI") {
            self.azure.redirect_uri = v;
        }
        if let Ok(v) = env::var("AZURE_RETRY_ATTEMPTS") {
            self.azure.retry_attempts = v.parse().unwrap_or(self.azure.retry_attempts);
        }
        if let Ok(v) = env::var("AZURE_RETRY_BASE_DELAY_MS") {
            self.azure.retry_base_delay_ms = v.parse().unwrap_or(self.azure.retry_base_delay_ms);
        }
        if let Ok(v) = env::var("AZURE_PROVIDER_POLL_ATTEMPTS") {
            self.azure.provider_poll_attempts = v.parse().unwrap_or(self.azure.provider_poll_attempts);
        }
        if let Ok(v) = env::var("AZURE_PROVIDER_POLL_INTERVAL_MS") {
            self.azure.provider_poll_interval_ms = v.parse().unwrap_or(self.azure.provider_poll_interval_ms);
        }
        if let Ok(v) = env::var("AZURE_APP_SERVICE_PLAN") {
            self.azure.app_service_plan = v;
        }
        if let Ok(v) = env::var("AZURE_LINUX_FX_VERSION") {
            self.azure.linux_fx_version = v;
        }
        if let Ok(v) = env::var("AZURE_DEFAULT_LOCATION") {
            self.azure.default_location = v;
        }

        // Budget overrides
        if let Ok(v) = env::var("BUDGET_WEBHOOK_KEY") {
            self.budget.webhook_key = v;
        }
        if let Ok(v) = env::var("BUDGET_SWEEP_INTERVAL_SECS") {
            self.budget.sweep_interval_secs = v.parse().unwrap_or(self.budget.sweep_interval_secs);
        }

        self
    }

    /// Azure endpoints shared by every profile
    fn azure_defaults() -> AzureConfig {
        AzureConfig {
            management_url: "https://management.azure.com".to_string(),
            login_url: "https://login.microsoftonline.com".to_string(),
            kudu_url_template: "https://{app}.scm.azurewebsites.net".to_string(),
            redirect_uri: "http://localhost:3000/api/auth/azure/callback".to_string(),
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
            provider_poll_attempts: 5,
            provider_poll_interval_ms: 2000,
            app_service_plan: "linuxKaServicePLAN".to_string(),
            linux_fx_version: "NODE|18-lts".to_string(),
            default_location: "centralindia".to_string(),
            token_refresh_skew_secs: 60,
        }
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 3000 },
            database: DatabaseConfig {
                url: "memory://".to_string(),
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                public_base_url: "http://localhost:3000".to_string(),
                max_upload_bytes: 100 * 1024 * 1024, // 100MB
            },
            security: SecurityConfig {
                jwt_secret: "development-secret-change-me".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                secure_cookies: false,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            azure: Self::azure_defaults(),
            budget: BudgetConfig {
                webhook_key: "development-webhook-key".to_string(),
                sweep_interval_secs: 0,
                default_amount: 1000.0,
                default_threshold: 100.0,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig { port: 3000 },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                public_base_url: "https://staging.example.com".to_string(),
                max_upload_bytes: 100 * 1024 * 1024,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24 * 7,
                secure_cookies: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            azure: Self::azure_defaults(),
            budget: BudgetConfig {
                webhook_key: String::new(),
                sweep_interval_secs: 60 * 60,
                default_amount: 1000.0,
                default_threshold: 100.0,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig { port: 8080 },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                public_base_url: "https://app.example.com".to_string(),
                max_upload_bytes: 100 * 1024 * 1024,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24 * 7,
                secure_cookies: true,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            azure: Self::azure_defaults(),
            budget: BudgetConfig {
                webhook_key: String::new(),
                sweep_interval_secs: 30 * 60,
                default_amount: 1000.0,
                default_threshold: 100.0,
            },
        }
    }

    /// Site URL for a deployed web app
    pub fn hosted_url(app_name: &str) -> String {
        format!("https://{}.azurewebsites.net", app_name)
    }

    /// Webhook Azure calls when a resource group budget is breached
    pub fn budget_webhook_url(&self) -> String {
        format!(
            "{}/api/resourceGroup/budget-exceed?authKey={}",
            self.api.public_base_url, self.budget.webhook_key
        )
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
