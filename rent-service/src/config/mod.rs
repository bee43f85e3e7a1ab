use secrecy::Secret;
use service_core::config::{self as core_config, get_env, Environment};
use service_core::error::AppError;

const MIN_JWT_SECRET_LEN: usize = 16;

#[derive(Clone, Debug)]
pub struct Config {
    pub common: core_config::Config,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StoreBackend {
    Memory,
    MongoDb,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "mongodb" | "mongo" => Ok(StoreBackend::MongoDb),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub url: Secret<String>,
    pub db_name: String,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
    pub access_token_expiry_minutes: i64,
}

fn config_error(message: impl std::fmt::Display) -> AppError {
    AppError::ConfigError(anyhow::anyhow!("{}", message))
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = common.environment == Environment::Prod;

        let host = get_env("RENT_SERVICE_HOST", Some("0.0.0.0"), is_prod)?;
        let port = get_env("RENT_SERVICE_PORT", Some("3010"), is_prod)?
            .parse()
            .map_err(|e: std::num::ParseIntError| config_error(e))?;
        let allowed_origins =
            get_env("RENT_ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();

        let backend: StoreBackend = get_env("RENT_STORE_BACKEND", Some("memory"), is_prod)?
            .parse()
            .map_err(config_error)?;

        let (url, db_name) = match backend {
            StoreBackend::MongoDb => (
                get_env("RENT_DATABASE_URL", None, is_prod)?,
                get_env("RENT_DATABASE_NAME", Some("rent_db"), is_prod)?,
            ),
            StoreBackend::Memory => (String::new(), String::new()),
        };

        let jwt_secret = get_env("RENT_JWT_SECRET", None, is_prod)?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(config_error(format!(
                "RENT_JWT_SECRET must be at least {} characters",
                MIN_JWT_SECRET_LEN
            )));
        }

        let access_token_expiry_minutes =
            get_env("RENT_ACCESS_TOKEN_EXPIRY_MINUTES", Some("60"), is_prod)?
                .parse()
                .map_err(|e: std::num::ParseIntError| config_error(e))?;

        let service_name = get_env("SERVICE_NAME", Some("rent-service"), is_prod)?;
        let log_level = get_env("LOG_LEVEL", Some(common.log_level.as_str()), is_prod)?;
        let otlp_endpoint = std::env::var("OTLP_ENDPOINT")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| common.otlp_endpoint.clone());

        Ok(Self {
            common,
            server: ServerConfig {
                host,
                port,
                allowed_origins,
            },
            store: StoreConfig {
                backend,
                url: Secret::new(url),
                db_name,
            },
            auth: AuthConfig {
                jwt_secret: Secret::new(jwt_secret),
                access_token_expiry_minutes,
            },
            service_name,
            log_level,
            otlp_endpoint,
        })
    }
}
