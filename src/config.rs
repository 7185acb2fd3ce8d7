use std::path::Path;

use anyhow::{anyhow, Context, Result};
use url::Url;

/// Default backend origin, matching the development server.
pub const DEFAULT_ORIGIN: &str = "http://localhost:5000";

/// Environment variable consulted when no flag is given.
pub const ORIGIN_ENV: &str = "GROCERIES_ORIGIN";

/// Optional config file in the working directory: `{"origin": "..."}`.
pub const CONFIG_FILE: &str = "groceries.json";

/// The one recognized setting: which backend origin to talk to. Both the
/// HTTP endpoints and the event channel derive from it.
#[derive(Debug, Clone)]
pub struct Config {
    origin: Url,
}

impl Config {
    pub fn new(origin: &str) -> Result<Self> {
        let origin = Url::parse(origin).with_context(|| format!("invalid origin: {origin}"))?;
        if origin.scheme() != "http" && origin.scheme() != "https" {
            return Err(anyhow!("origin must be http(s), got {}", origin.scheme()));
        }
        if origin.host_str().is_none() {
            return Err(anyhow!("origin has no host: {origin}"));
        }
        Ok(Self { origin })
    }

    /// Resolve the origin in precedence order: flag, then `GROCERIES_ORIGIN`,
    /// then `groceries.json`, then the default.
    pub fn resolve(flag: Option<&str>) -> Result<Self> {
        Self::resolve_from(flag, Path::new(CONFIG_FILE))
    }

    fn resolve_from(flag: Option<&str>, file: &Path) -> Result<Self> {
        if let Some(origin) = flag {
            return Self::new(origin);
        }
        if let Ok(origin) = std::env::var(ORIGIN_ENV) {
            if !origin.trim().is_empty() {
                return Self::new(origin.trim());
            }
        }
        if let Some(origin) = Self::read_config_file(file)? {
            return Self::new(&origin);
        }
        Self::new(DEFAULT_ORIGIN)
    }

    fn read_config_file(file: &Path) -> Result<Option<String>> {
        if !file.exists() {
            return Ok(None);
        }
        let raw =
            std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
        let value: serde_json::Value =
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;
        Ok(value
            .get("origin")
            .and_then(|v| v.as_str())
            .map(String::from))
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Endpoint URL under the configured origin.
    pub fn http_url(&self, path: &str) -> Result<Url> {
        self.origin.join(path).map_err(Into::into)
    }

    /// Event-channel URL derived from the origin: http becomes ws, https
    /// becomes wss, path `/ws`.
    pub fn ws_url(&self) -> Result<Url> {
        let mut url = self.origin.clone();
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| anyhow!("cannot derive ws url from {}", self.origin))?;
        url.set_path("/ws");
        Ok(url)
    }
}
