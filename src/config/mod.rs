use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub mod live;

pub use live::{keys, LiveConfig, LiveSnapshot, MissingConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub secrets: SecretsConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Label used in secret names. Development deployments read the `local` bundle.
    pub fn label(&self) -> &'static str {
        match self {
            Environment::Development => "local",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Applied to every outbound call (secret store, token issuer, backend)
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretsSource {
    Aws,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    pub source: SecretsSource,
    pub product: String,
    pub bundle: String,
    pub name_override: Option<String>,
    /// Key whose absence from live configuration triggers a fetch
    pub required_key: String,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub secure_cookies: bool,
    pub session_ttl_hours: u64,
}

impl SecretsConfig {
    /// `<product>-<environment>-<bundle>-config`, unless overridden outright.
    pub fn secret_name(&self, environment: Environment) -> String {
        match &self.name_override {
            Some(name) => name.clone(),
            None => format!("{}-{}-{}-config", self.product, environment.label(), self.bundle),
        }
    }
}

impl ServerConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(port) = env::var("GATEWAY_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|v| v.parse().ok())
        {
            self.server.port = port;
        }
        if let Ok(v) = env::var("HTTP_TIMEOUT_SECS") {
            self.server.http_timeout_secs = v.parse().unwrap_or(self.server.http_timeout_secs);
        }

        // Secret store overrides
        match env::var("SECRETS_SOURCE").as_deref() {
            Ok("aws") => self.secrets.source = SecretsSource::Aws,
            Ok("none") | Ok("disabled") => self.secrets.source = SecretsSource::None,
            _ => {}
        }
        if let Ok(v) = env::var("SECRETS_PRODUCT") {
            self.secrets.product = v;
        }
        if let Ok(v) = env::var("SECRETS_BUNDLE") {
            self.secrets.bundle = v;
        }
        if let Ok(v) = env::var("SECRETS_NAME") {
            self.secrets.name_override = Some(v).filter(|s| !s.is_empty());
        }
        if let Ok(v) = env::var("SECRETS_REQUIRED_KEY") {
            self.secrets.required_key = v;
        }
        if let Ok(v) = env::var("AWS_REGION") {
            self.secrets.region = Some(v);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("SECURITY_SECURE_COOKIES") {
            self.security.secure_cookies = v.parse().unwrap_or(self.security.secure_cookies);
        }
        if let Ok(v) = env::var("SECURITY_SESSION_TTL_HOURS") {
            self.security.session_ttl_hours = v.parse().unwrap_or(self.security.session_ttl_hours);
        }

        self
    }

    fn secrets_defaults(source: SecretsSource) -> SecretsConfig {
        SecretsConfig {
            source,
            product: "portal".to_string(),
            bundle: "frontend".to_string(),
            name_override: None,
            required_key: keys::AUTH0_SECRET.to_string(),
            region: None,
        }
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                http_timeout_secs: 10,
            },
            // Local runs normally get AUTH0_* from .env
            secrets: Self::secrets_defaults(SecretsSource::None),
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
                secure_cookies: false,
                session_ttl_hours: 24,
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 3000,
                http_timeout_secs: 5,
            },
            secrets: Self::secrets_defaults(SecretsSource::Aws),
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                secure_cookies: true,
                session_ttl_hours: 24,
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 3000,
                http_timeout_secs: 5,
            },
            secrets: Self::secrets_defaults(SecretsSource::Aws),
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                secure_cookies: true,
                session_ttl_hours: 24,
            },
        }
    }

    pub fn secret_name(&self) -> String {
        self.secrets.secret_name(self.environment)
    }
}
