use std::{env, fmt, num::NonZeroUsize, path::PathBuf, str::FromStr};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_ROOT: &str = "machine_learner";
const DEFAULT_WORKERS: usize = 1;

/// Startup settings of the controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding `collected_data/` and `trained_models/`.
    pub root: PathBuf,
    pub workers: NonZeroUsize,
}

/// A variable was set but could not be parsed.
#[derive(Debug)]
pub struct ConfigError {
    var: &'static str,
    value: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value for {}: '{}'", self.var, self.value)
    }
}

impl std::error::Error for ConfigError {}

impl ControllerConfig {
    /// Reads `HOST`, `PORT`, `ML_ROOT` and `WORKERS`, falling back to defaults
    /// for the unset ones.
    ///
    /// # Errors
    /// Returns a `ConfigError` if a variable is set to an unparsable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = parse_var("PORT")?.unwrap_or(DEFAULT_PORT);
        let workers = parse_var("WORKERS")?.unwrap_or(DEFAULT_WORKERS);
        let Some(workers) = NonZeroUsize::new(workers) else {
            return Err(ConfigError {
                var: "WORKERS",
                value: workers.to_string(),
            });
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port,
            root: env::var_os("ML_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT)),
            workers,
        })
    }

    /// The `host:port` pair to bind.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            root: PathBuf::from(DEFAULT_ROOT),
            workers: NonZeroUsize::MIN,
        }
    }
}

fn parse_var<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError { var, value }),
        Err(_) => Ok(None),
    }
}
