use once_cell::sync::OnceCell;

const DEFAULT_DATABASE_URL: &str = "sqlite:user_registry.db";
const DEFAULT_PORT: u16 = 3000;

static DEV_MODE: OnceCell<bool> = OnceCell::new();

/// Process configuration read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub env: String,
}

impl Config {
    /// Read configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        Self {
            port,
            database_url,
            env,
        }
    }

    pub fn is_development(&self) -> bool {
        self.env == "development"
    }
}

/// Record the runtime mode once at startup. Error rendering consults this
/// instead of re-reading the environment, so the flag always agrees with the
/// `Config` the process was started with.
pub fn init_runtime_mode(config: &Config) {
    let _ = DEV_MODE.set(config.is_development());
}

/// Whether the process is running in development mode. Error envelopes carry
/// stack detail only when this returns true. Defaults to false until startup
/// records the mode, so stack detail never leaks beforehand.
pub fn is_development() -> bool {
    DEV_MODE.get().copied().unwrap_or(false)
}
