use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_SQLITE_PATH: &str = "./data/miparqueo.db";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: Environment,
    pub database: DbConfig,
    pub init_timeout: Duration,
    pub static_dir: String,
}

/// Deployment mode. Production enables TLS towards the database and a larger
/// pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

/// Backend selection, fixed once when configuration is read.
#[derive(Debug, Clone)]
pub enum DbConfig {
    Embedded(EmbeddedConfig),
    Networked(NetworkedConfig),
}

impl DbConfig {
    /// Value of `DB_TYPE` that selects this backend.
    pub fn kind(&self) -> &'static str {
        match self {
            DbConfig::Embedded(_) => "sqlite",
            DbConfig::Networked(_) => "postgresql",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddedConfig {
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct NetworkedConfig {
    pub target: PgTarget,
    pub require_tls: bool,
    pub pool: PoolSettings,
}

/// Where the networked server lives.
#[derive(Clone)]
pub enum PgTarget {
    Url(String),
    Discrete {
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    },
}

// Credentials stay out of logs.
impl std::fmt::Debug for PgTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PgTarget::Url(_) => f.write_str("Url(<redacted>)"),
            PgTarget::Discrete {
                host,
                port,
                user,
                database,
                ..
            } => f
                .debug_struct("Discrete")
                .field("host", host)
                .field("port", port)
                .field("user", user)
                .field("database", database)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl PoolSettings {
    pub fn for_environment(environment: Environment) -> Self {
        let max_connections = match environment {
            Environment::Production => 20,
            Environment::Development => 5,
        };
        PoolSettings {
            max_connections,
            acquire_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("3000")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let environment = match env_map
            .get("APP_ENV")
            .map(|s| s.as_str())
            .unwrap_or("development")
        {
            "development" => Environment::Development,
            "production" => Environment::Production,
            other => {
                return Err(ConfigError::InvalidValue(
                    "APP_ENV".to_string(),
                    format!("must be development or production, got {}", other),
                ))
            }
        };

        let database = parse_db_config(&env_map, environment)?;

        let init_timeout_ms = env_map
            .get("DB_INIT_TIMEOUT_MS")
            .map(|s| s.as_str())
            .unwrap_or("5000")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "DB_INIT_TIMEOUT_MS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        let static_dir = env_map
            .get("STATIC_DIR")
            .cloned()
            .unwrap_or_else(|| "public".to_string());

        Ok(Config {
            port,
            environment,
            database,
            init_timeout: Duration::from_millis(init_timeout_ms),
            static_dir,
        })
    }
}

fn parse_db_config(
    env_map: &HashMap<String, String>,
    environment: Environment,
) -> Result<DbConfig, ConfigError> {
    match env_map
        .get("DB_TYPE")
        .map(|s| s.as_str())
        .unwrap_or("sqlite")
    {
        "sqlite" => Ok(DbConfig::Embedded(EmbeddedConfig {
            path: env_map
                .get("SQLITE_PATH")
                .cloned()
                .unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string()),
        })),
        "postgresql" | "postgres" => Ok(DbConfig::Networked(NetworkedConfig {
            target: parse_pg_target(env_map)?,
            require_tls: environment == Environment::Production,
            pool: PoolSettings::for_environment(environment),
        })),
        other => Err(ConfigError::InvalidValue(
            "DB_TYPE".to_string(),
            format!("must be sqlite or postgresql, got {}", other),
        )),
    }
}

/// A full `DATABASE_URL` wins; otherwise every discrete field but the port is
/// required.
fn parse_pg_target(env_map: &HashMap<String, String>) -> Result<PgTarget, ConfigError> {
    if let Some(url) = env_map.get("DATABASE_URL").filter(|s| !s.trim().is_empty()) {
        return Ok(PgTarget::Url(url.clone()));
    }

    let required = |key: &str| {
        env_map
            .get(key)
            .filter(|s| !s.is_empty())
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
    };

    let host = required("PG_HOST")?;
    let port = env_map
        .get("PG_PORT")
        .map(|s| s.as_str())
        .unwrap_or("5432")
        .parse::<u16>()
        .map_err(|_| {
            ConfigError::InvalidValue("PG_PORT".to_string(), "must be a valid u16".to_string())
        })?;

    Ok(PgTarget::Discrete {
        host,
        port,
        user: required("PG_USER")?,
        password: required("PG_PASSWORD")?,
        database: required("PG_DATABASE")?,
    })
}
