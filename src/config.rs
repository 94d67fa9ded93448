use std::{env, time::Duration};

/// Default time a gate waits for a pending session before rendering the loading page.
const DEFAULT_GATE_WAIT_MS: u64 = 1500;

/// Idle time after which a browser session is forgotten.
const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;

const DEFAULT_SESSION_CAPACITY: usize = 10_000;

/// AppConfig
///
/// Holds the gateway's configuration. Loaded once at startup and shared read-only
/// through `AppState` via FromRef.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the local identity bypass and log format.
    pub env: Env,
    // Shared secret used to validate the identity provider's session tokens.
    pub jwt_secret: String,
    // Base URL of the commerce backend hosting the user sync endpoint.
    pub backend_url: String,
    // Where principals without a session are sent.
    pub sign_in_path: String,
    // Where principals with the wrong roles or a non-active account are sent.
    pub unauthorized_path: String,
    // How long a gate waits for an in-flight sync before showing the loading page.
    pub gate_wait: Duration,
    // Sessions not seen for this long are evicted from the registry.
    pub session_ttl: Duration,
    // Upper bound on live sessions; the least recently seen is evicted first.
    pub session_capacity: usize,
    pub bind_addr: String,
}

/// Env
///
/// Runtime context: development conveniences in `Local`, hardened behaviour in
/// `Production`.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// Non-panicking configuration for test scaffolding.
    fn default() -> Self {
        Self {
            env: Env::Local,
            jwt_secret: "super-secure-test-secret-value-local".to_string(),
            backend_url: "http://localhost:8080".to_string(),
            sign_in_path: "/sign-in".to_string(),
            unauthorized_path: "/unauthorized".to_string(),
            gate_wait: Duration::from_millis(DEFAULT_GATE_WAIT_MS),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            session_capacity: DEFAULT_SESSION_CAPACITY,
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables, failing fast.
    ///
    /// # Panics
    /// Panics if a variable required for the current environment is missing, or if
    /// `GATE_WAIT_MS`, `SESSION_TTL_SECS` or `SESSION_CAPACITY` is not a number.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let defaults = Self::default();

        let jwt_secret = match env {
            Env::Production => env::var("IDENTITY_JWT_SECRET")
                .expect("FATAL: IDENTITY_JWT_SECRET must be set in production."),
            Env::Local => env::var("IDENTITY_JWT_SECRET").unwrap_or(defaults.jwt_secret),
        };

        let backend_url = match env {
            Env::Production => env::var("BACKEND_API_URL")
                .expect("FATAL: BACKEND_API_URL must be set in production."),
            Env::Local => env::var("BACKEND_API_URL").unwrap_or(defaults.backend_url),
        };

        let gate_wait = env::var("GATE_WAIT_MS")
            .ok()
            .map(|raw| {
                raw.parse::<u64>()
                    .expect("FATAL: GATE_WAIT_MS must be a number of milliseconds.")
            })
            .map(Duration::from_millis)
            .unwrap_or(defaults.gate_wait);

        let session_ttl = env::var("SESSION_TTL_SECS")
            .ok()
            .map(|raw| {
                raw.parse::<u64>()
                    .expect("FATAL: SESSION_TTL_SECS must be a number of seconds.")
            })
            .map(Duration::from_secs)
            .unwrap_or(defaults.session_ttl);

        let session_capacity = env::var("SESSION_CAPACITY")
            .ok()
            .map(|raw| {
                raw.parse::<usize>()
                    .ok()
                    .filter(|capacity| *capacity > 0)
                    .expect("FATAL: SESSION_CAPACITY must be a positive number.")
            })
            .unwrap_or(defaults.session_capacity);

        Self {
            env,
            jwt_secret,
            backend_url,
            sign_in_path: env::var("SIGN_IN_PATH").unwrap_or(defaults.sign_in_path),
            unauthorized_path: env::var("UNAUTHORIZED_PATH")
                .unwrap_or(defaults.unauthorized_path),
            gate_wait,
            session_ttl,
            session_capacity,
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
        }
    }
}
