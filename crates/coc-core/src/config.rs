use std::{env, fmt, fs, path::Path, time::Duration};

use crate::{
    errors::Error,
    throttle::{AdmissionPolicy, ThrottleConfig},
    Result,
};

pub const DEFAULT_API_BASE_URL: &str = "https://api.clashofclans.com/v1";
pub const DEFAULT_DEVELOPER_BASE_URL: &str = "https://developer.clashofclans.com";
pub const DEFAULT_EGRESS_URL: &str = "https://httpbin.org/ip";

/// Typed client configuration.
///
/// Passed explicitly to the client constructor; nothing here is process-global.
#[derive(Clone)]
pub struct Config {
    // Developer portal credentials
    pub email: String,
    pub password: String,

    // Endpoints
    pub api_base_url: String,
    pub developer_base_url: String,
    pub egress_url: String,

    // Request discipline
    pub throttle: ThrottleConfig,
    /// Deadline per endpoint call (throttle wait + exchange). `None` waits forever.
    pub request_timeout: Option<Duration>,
    pub user_agent: String,
}

impl Config {
    /// Defaults for everything except the credentials.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            developer_base_url: DEFAULT_DEVELOPER_BASE_URL.to_string(),
            egress_url: DEFAULT_EGRESS_URL.to_string(),
            throttle: ThrottleConfig::default(),
            request_timeout: None,
            user_agent: "coc-rust/0.1".to_string(),
        }
    }

    /// Load from the process environment, seeded from `./.env` when present.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_source(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (env vars, a map in tests, ...).
    pub fn from_source(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let str_of = |key: &str| get(key).and_then(non_empty);

        // Required
        let email = str_of("COC_EMAIL")
            .ok_or_else(|| Error::Config("COC_EMAIL environment variable is required".to_string()))?;
        let password = str_of("COC_PASSWORD").ok_or_else(|| {
            Error::Config("COC_PASSWORD environment variable is required".to_string())
        })?;

        let mut cfg = Self::new(email, password);

        if let Some(url) = str_of("COC_API_BASE_URL") {
            cfg.api_base_url = trim_base(url);
        }
        if let Some(url) = str_of("COC_DEVELOPER_BASE_URL") {
            cfg.developer_base_url = trim_base(url);
        }
        if let Some(url) = str_of("COC_EGRESS_URL") {
            cfg.egress_url = url;
        }
        if let Some(ua) = str_of("COC_USER_AGENT") {
            cfg.user_agent = ua;
        }

        // Throttle
        if let Some(limit) = parse_num::<usize>("COC_THROTTLE_LIMIT", str_of("COC_THROTTLE_LIMIT"))? {
            if limit == 0 {
                return Err(Error::Config(
                    "COC_THROTTLE_LIMIT must be at least 1".to_string(),
                ));
            }
            cfg.throttle.limit = limit;
        }
        let wake = str_of("COC_THROTTLE_WAKE_ON_RELEASE")
            .map(|s| parse_bool(&s))
            .unwrap_or(false);
        let retry_ms =
            parse_num::<u64>("COC_THROTTLE_RETRY_MS", str_of("COC_THROTTLE_RETRY_MS"))?.unwrap_or(100);
        cfg.throttle.policy = if wake {
            AdmissionPolicy::WakeOnRelease
        } else {
            AdmissionPolicy::Poll {
                retry_interval: Duration::from_millis(retry_ms),
            }
        };

        cfg.request_timeout =
            parse_num::<u64>("COC_REQUEST_TIMEOUT_MS", str_of("COC_REQUEST_TIMEOUT_MS"))?
                .map(Duration::from_millis);

        Ok(cfg)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .field("developer_base_url", &self.developer_base_url)
            .field("egress_url", &self.egress_url)
            .field("throttle", &self.throttle)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_num<T: std::str::FromStr>(key: &str, v: Option<String>) -> Result<Option<T>> {
    match v {
        None => Ok(None),
        Some(s) => s
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {s:?}"))),
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
