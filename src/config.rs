use anyhow::{bail, ensure, Context, Result};
use axum::http::HeaderValue;
use secrecy::Secret;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub debug: bool,
    pub security: SecurityConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub jwt: JwtConfig,
    pub stripe: StripeConfig,
    pub task_queue: TaskQueueConfig,
    pub locale: LocaleConfig,
    pub static_files: StaticFilesConfig,
    pub api: ApiConfig,
}

/// Deployment profile, selected with `APP_ENV`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => bail!("APP_ENV must be 'local' or 'production', got '{other}'"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub secret_key: Secret<String>,
    /// Host patterns: exact names, `.example.com` for a domain and its
    /// subdomains, or `*`
    pub allowed_hosts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub instance_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    Postgres,
    Sqlite,
}

impl DatabaseKind {
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .or_else(|| (url == "sqlite::memory:").then_some("sqlite"))
            .unwrap_or_default();

        match scheme {
            "postgres" | "postgresql" | "pgsql" => Ok(Self::Postgres),
            "sqlite" => Ok(Self::Sqlite),
            _ => bail!("DATABASE_URL must use a postgres or sqlite scheme"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgresql",
            Self::Sqlite => "sqlite",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub kind: DatabaseKind,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl FromStr for SameSite {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lax" => Ok(Self::Lax),
            "none" => Ok(Self::None),
            other => bail!("unknown SameSite policy '{other}'"),
        }
    }
}

/// Token settings shared with the authentication app
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_token_lifetime: Duration,
    pub refresh_token_lifetime: Duration,
    pub rotate_refresh_tokens: bool,
    pub blacklist_after_rotation: bool,
    pub auth_header_type: String,
    pub realm: String,
    pub auth_cookie: String,
    pub auth_cookie_http_only: bool,
    pub auth_cookie_samesite: SameSite,
}

impl JwtConfig {
    /// Challenge sent in `WWW-Authenticate` on 401 responses
    pub fn www_authenticate(&self) -> String {
        format!("{} realm=\"{}\"", self.auth_header_type, self.realm)
    }
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
}

/// Background task queue settings. The queue uses the primary database as broker.
#[derive(Debug, Clone)]
pub struct TaskQueueConfig {
    pub name: String,
    pub workers: u32,
    pub timeout_seconds: u64,
    pub retry_seconds: u64,
    pub queue_limit: u32,
    pub bulk: u32,
}

#[derive(Debug, Clone)]
pub struct LocaleConfig {
    pub language_code: String,
    pub time_zone: String,
}

#[derive(Debug, Clone)]
pub struct StaticFilesConfig {
    pub url: String,
    pub root: PathBuf,
}

impl StaticFilesConfig {
    /// Mount point for the static file service, without the trailing slash
    pub fn mount_path(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionHandlerKind {
    /// Faults rendered as `{"error", "detail"}`
    Envelope,
    /// Faults rendered with the baseline formatter only
    Default,
}

impl FromStr for ExceptionHandlerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "envelope" => Ok(Self::Envelope),
            "default" => Ok(Self::Default),
            other => bail!("EXCEPTION_HANDLER must be 'envelope' or 'default', got '{other}'"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub exception_handler: ExceptionHandlerKind,
    pub throttle_rate_per_second: Option<u32>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let environment: Environment = env::var("APP_ENV")
            .unwrap_or_else(|_| "production".to_string())
            .parse()?;

        if environment == Environment::Local {
            // Load .env file if it exists
            dotenvy::dotenv().ok();
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let environment: Environment = vars.parse_or("APP_ENV", Environment::Production)?;
        let local = environment == Environment::Local;

        let database_url = vars.required("DATABASE_URL")?;
        let database_kind = DatabaseKind::from_url(&database_url)?;

        let default_hosts: &[&str] = if local { &["localhost", "127.0.0.1"] } else { &[] };
        let default_origins: &[&str] = if local { &["http://localhost:5173"] } else { &[] };

        let throttle_rate_per_second = match vars.get("THROTTLE_RATE_PER_SECOND") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u32>()
                    .context("THROTTLE_RATE_PER_SECOND must be a valid number")?,
            ),
            None => None,
        };

        let config = Config {
            environment,
            debug: vars.flag_or("DEBUG", local)?,
            security: SecurityConfig {
                secret_key: Secret::new(
                    vars.first(&["DJANGO_SECRET_KEY", "SECRET_KEY"])
                        .context("DJANGO_SECRET_KEY must be set")?,
                ),
                allowed_hosts: vars
                    .first(&["DJANGO_ALLOWED_HOSTS", "ALLOWED_HOSTS"])
                    .map(|raw| split_list(&raw))
                    .unwrap_or_else(|| to_owned_list(default_hosts)),
            },
            server: ServerConfig {
                host: vars.string_or("API_HOST", "0.0.0.0"),
                port: vars
                    .parse_or::<u16>("API_PORT", 8000)
                    .context("API_PORT must be a valid port number")?,
                // Used only for observability. Falls back to HOSTNAME when set by the
                // container runtime.
                instance_id: vars
                    .get("INSTANCE_ID")
                    .or_else(|| vars.get("HOSTNAME"))
                    .unwrap_or_else(|| "unknown".to_string()),
            },
            database: DatabaseConfig {
                url: Secret::new(database_url),
                kind: database_kind,
            },
            cors: CorsConfig {
                allowed_origins: vars.list_or("CORS_ALLOWED_ORIGINS", default_origins),
                allow_credentials: vars.flag_or("CORS_ALLOW_CREDENTIALS", local)?,
            },
            jwt: JwtConfig {
                access_token_lifetime: Duration::from_secs(
                    60 * vars.parse_or::<u64>("JWT_ACCESS_TOKEN_LIFETIME_MINUTES", 15)?,
                ),
                refresh_token_lifetime: Duration::from_secs(
                    24 * 60 * 60 * vars.parse_or::<u64>("JWT_REFRESH_TOKEN_LIFETIME_DAYS", 7)?,
                ),
                rotate_refresh_tokens: vars.flag_or("JWT_ROTATE_REFRESH_TOKENS", true)?,
                blacklist_after_rotation: vars.flag_or("JWT_BLACKLIST_AFTER_ROTATION", true)?,
                auth_header_type: vars.string_or("JWT_AUTH_HEADER_TYPE", "Bearer"),
                realm: vars.string_or("JWT_REALM", "api"),
                auth_cookie: vars.string_or("JWT_AUTH_COOKIE", "refresh_token"),
                auth_cookie_http_only: vars.flag_or("JWT_AUTH_COOKIE_HTTP_ONLY", true)?,
                auth_cookie_samesite: vars.parse_or("JWT_AUTH_COOKIE_SAMESITE", SameSite::Lax)?,
            },
            stripe: StripeConfig {
                secret_key: Secret::new(vars.required("STRIPE_SECRET_KEY")?),
                webhook_secret: Secret::new(vars.required("STRIPE_WEBHOOK_SECRET")?),
            },
            task_queue: TaskQueueConfig {
                name: vars.string_or("TASK_QUEUE_NAME", "family-karaoke"),
                workers: vars.parse_or("TASK_QUEUE_WORKERS", 2)?,
                timeout_seconds: vars.parse_or("TASK_QUEUE_TIMEOUT", 90)?,
                retry_seconds: vars.parse_or("TASK_QUEUE_RETRY", 120)?,
                queue_limit: vars.parse_or("TASK_QUEUE_LIMIT", 50)?,
                bulk: vars.parse_or("TASK_QUEUE_BULK", 10)?,
            },
            locale: LocaleConfig {
                language_code: vars.string_or("LANGUAGE_CODE", "en-us"),
                time_zone: vars.string_or("TIME_ZONE", "America/Denver"),
            },
            static_files: StaticFilesConfig {
                url: vars.string_or("STATIC_URL", "/static/"),
                root: PathBuf::from(vars.string_or("STATIC_ROOT", "staticfiles")),
            },
            api: ApiConfig {
                exception_handler: vars.parse_or("EXCEPTION_HANDLER", ExceptionHandlerKind::Envelope)?,
                throttle_rate_per_second,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.task_queue.workers > 0,
            "TASK_QUEUE_WORKERS must be at least 1"
        );
        ensure!(
            self.task_queue.retry_seconds > self.task_queue.timeout_seconds,
            "TASK_QUEUE_RETRY ({}) must be greater than TASK_QUEUE_TIMEOUT ({})",
            self.task_queue.retry_seconds,
            self.task_queue.timeout_seconds
        );
        ensure!(
            !self.jwt.access_token_lifetime.is_zero(),
            "JWT_ACCESS_TOKEN_LIFETIME_MINUTES must be positive"
        );
        ensure!(
            self.jwt.refresh_token_lifetime > self.jwt.access_token_lifetime,
            "JWT refresh token lifetime must exceed the access token lifetime"
        );
        ensure!(
            self.static_files.url.len() > 1
                && self.static_files.url.starts_with('/')
                && self.static_files.url.ends_with('/'),
            "STATIC_URL must start and end with '/', got '{}'",
            self.static_files.url
        );
        ensure!(
            self.api.throttle_rate_per_second != Some(0),
            "THROTTLE_RATE_PER_SECOND must be greater than 0"
        );

        for origin in &self.cors.allowed_origins {
            ensure!(
                !(origin == "*" && self.cors.allow_credentials),
                "CORS_ALLOWED_ORIGINS cannot be '*' when credentials are allowed"
            );
            HeaderValue::from_str(origin)
                .with_context(|| format!("invalid CORS origin '{origin}'"))?;
        }

        HeaderValue::from_str(&self.jwt.www_authenticate())
            .context("JWT_AUTH_HEADER_TYPE and JWT_REALM must form a valid header")?;

        Ok(())
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Host patterns actually enforced. In debug mode an empty list allows
    /// the loopback names.
    pub fn effective_allowed_hosts(&self) -> Vec<String> {
        if self.debug && self.security.allowed_hosts.is_empty() {
            return vec![
                ".localhost".to_string(),
                "127.0.0.1".to_string(),
                "[::1]".to_string(),
            ];
        }
        self.security.allowed_hosts.clone()
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    /// First non-empty value among `keys`, in order
    fn first(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.get(key))
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key).with_context(|| format!("{key} must be set"))
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: Into<anyhow::Error>,
    {
        match self.get(key) {
            Some(raw) => raw.trim().parse::<T>().map_err(|err| {
                let err: anyhow::Error = err.into();
                err.context(format!("{key} has an invalid value '{raw}'"))
            }),
            None => Ok(default),
        }
    }

    fn flag_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
                "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
                _ => bail!("{key} must be a boolean, got '{raw}'"),
            },
            None => Ok(default),
        }
    }

    fn list_or(&self, key: &str, default: &[&str]) -> Vec<String> {
        match self.get(key) {
            Some(raw) => split_list(&raw),
            None => to_owned_list(default),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let mut vars: HashMap<String, String> = [
            ("DJANGO_SECRET_KEY", "not-so-secret"),
            ("DATABASE_URL", "postgres://karaoke:pw@localhost/karaoke"),
            ("STRIPE_SECRET_KEY", "sk_test_123"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_123"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (key, value) in pairs {
            vars.insert(key.to_string(), value.to_string());
        }
        move |key| vars.get(key).cloned()
    }

    fn without(key: &'static str) -> impl Fn(&str) -> Option<String> {
        let base = lookup(&[]);
        move |k| if k == key { None } else { base(k) }
    }

    #[test]
    fn test_production_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.environment, Environment::Production);
        assert!(!config.debug);
        assert!(config.security.allowed_hosts.is_empty());
        assert_eq!(config.server_address(), "0.0.0.0:8000");
        assert_eq!(config.database.kind, DatabaseKind::Postgres);
        assert!(config.cors.allowed_origins.is_empty());
        assert!(!config.cors.allow_credentials);
        assert_eq!(config.jwt.access_token_lifetime, Duration::from_secs(15 * 60));
        assert_eq!(
            config.jwt.refresh_token_lifetime,
            Duration::from_secs(7 * 24 * 60 * 60)
        );
        assert!(config.jwt.rotate_refresh_tokens);
        assert!(config.jwt.blacklist_after_rotation);
        assert_eq!(config.jwt.auth_cookie, "refresh_token");
        assert!(config.jwt.auth_cookie_http_only);
        assert_eq!(config.jwt.auth_cookie_samesite, SameSite::Lax);
        assert_eq!(config.task_queue.name, "family-karaoke");
        assert_eq!(config.task_queue.workers, 2);
        assert_eq!(config.task_queue.timeout_seconds, 90);
        assert_eq!(config.task_queue.retry_seconds, 120);
        assert_eq!(config.task_queue.queue_limit, 50);
        assert_eq!(config.task_queue.bulk, 10);
        assert_eq!(config.locale.time_zone, "America/Denver");
        assert_eq!(config.locale.language_code, "en-us");
        assert_eq!(config.static_files.mount_path(), "/static");
        assert_eq!(config.api.exception_handler, ExceptionHandlerKind::Envelope);
        assert!(config.api.throttle_rate_per_second.is_none());
        assert_eq!(config.stripe.secret_key.expose_secret(), "sk_test_123");
    }

    #[test]
    fn test_local_profile_defaults() {
        let config = Config::from_lookup(lookup(&[("APP_ENV", "local")])).unwrap();

        assert_eq!(config.environment, Environment::Local);
        assert!(config.debug);
        assert_eq!(config.security.allowed_hosts, vec!["localhost", "127.0.0.1"]);
        assert_eq!(config.cors.allowed_origins, vec!["http://localhost:5173"]);
        assert!(config.cors.allow_credentials);
    }

    #[test]
    fn test_explicit_values_override_profile() {
        let config = Config::from_lookup(lookup(&[
            ("APP_ENV", "local"),
            ("DEBUG", "off"),
            ("DJANGO_ALLOWED_HOSTS", "karaoke.example.com, .example.org"),
            ("API_PORT", "9000"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("EXCEPTION_HANDLER", "default"),
            ("THROTTLE_RATE_PER_SECOND", "20"),
        ]))
        .unwrap();

        assert!(!config.debug);
        assert_eq!(
            config.security.allowed_hosts,
            vec!["karaoke.example.com", ".example.org"]
        );
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.kind, DatabaseKind::Sqlite);
        assert_eq!(config.api.exception_handler, ExceptionHandlerKind::Default);
        assert_eq!(config.api.throttle_rate_per_second, Some(20));
    }

    #[test]
    fn test_django_variable_names() {
        let vars: HashMap<&str, &str> = [
            ("DJANGO_SECRET_KEY", "django-secret"),
            ("DJANGO_ALLOWED_HOSTS", "karaoke.example.com,api.example.com"),
            ("DATABASE_URL", "postgres://karaoke:pw@localhost/karaoke"),
            ("STRIPE_SECRET_KEY", "sk_test_123"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_123"),
        ]
        .into_iter()
        .collect();

        let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.security.secret_key.expose_secret(), "django-secret");
        assert_eq!(
            config.security.allowed_hosts,
            vec!["karaoke.example.com", "api.example.com"]
        );
    }

    #[test]
    fn test_short_variable_names_are_fallbacks() {
        let config = Config::from_lookup(lookup(&[
            ("DJANGO_SECRET_KEY", ""),
            ("SECRET_KEY", "short-secret"),
            ("ALLOWED_HOSTS", "short.example.com"),
        ]))
        .unwrap();
        assert_eq!(config.security.secret_key.expose_secret(), "short-secret");
        assert_eq!(config.security.allowed_hosts, vec!["short.example.com"]);

        let config = Config::from_lookup(lookup(&[
            ("SECRET_KEY", "short-secret"),
            ("DJANGO_ALLOWED_HOSTS", "django.example.com"),
            ("ALLOWED_HOSTS", "short.example.com"),
        ]))
        .unwrap();
        assert_eq!(config.security.secret_key.expose_secret(), "not-so-secret");
        assert_eq!(config.security.allowed_hosts, vec!["django.example.com"]);
    }

    #[test]
    fn test_missing_required_variables() {
        for key in ["DJANGO_SECRET_KEY", "DATABASE_URL", "STRIPE_SECRET_KEY", "STRIPE_WEBHOOK_SECRET"] {
            let err = Config::from_lookup(without(key)).unwrap_err();
            assert!(err.to_string().contains(key), "{key}: {err}");
        }
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(Config::from_lookup(lookup(&[("API_PORT", "eighty")])).is_err());
        assert!(Config::from_lookup(lookup(&[("DEBUG", "maybe")])).is_err());
        assert!(Config::from_lookup(lookup(&[("APP_ENV", "staging")])).is_err());
        assert!(Config::from_lookup(lookup(&[("DATABASE_URL", "mysql://db/karaoke")])).is_err());
        assert!(Config::from_lookup(lookup(&[("DATABASE_URL", "redis:memory:")])).is_err());
        assert!(Config::from_lookup(lookup(&[("THROTTLE_RATE_PER_SECOND", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("STATIC_URL", "static")])).is_err());
        assert!(Config::from_lookup(lookup(&[("JWT_AUTH_COOKIE_SAMESITE", "sideways")])).is_err());
    }

    #[test]
    fn test_task_queue_retry_must_exceed_timeout() {
        let err = Config::from_lookup(lookup(&[
            ("TASK_QUEUE_TIMEOUT", "120"),
            ("TASK_QUEUE_RETRY", "90"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("TASK_QUEUE_RETRY"));
    }

    #[test]
    fn test_wildcard_origin_with_credentials_is_rejected() {
        let result = Config::from_lookup(lookup(&[
            ("CORS_ALLOWED_ORIGINS", "*"),
            ("CORS_ALLOW_CREDENTIALS", "true"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_www_authenticate_challenge() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.jwt.www_authenticate(), "Bearer realm=\"api\"");
    }

    #[test]
    fn test_effective_allowed_hosts_in_debug() {
        let config = Config::from_lookup(lookup(&[("DEBUG", "true")])).unwrap();
        assert_eq!(
            config.effective_allowed_hosts(),
            vec![".localhost", "127.0.0.1", "[::1]"]
        );

        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert!(config.effective_allowed_hosts().is_empty());
    }

    #[test]
    fn test_secrets_are_redacted_in_debug_output() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("sk_test_123"));
        assert!(!printed.contains("not-so-secret"));
    }
}
