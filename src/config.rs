//! Resolver configuration.
//!
//! Layers, lowest precedence first: built-in defaults, a JSON config file,
//! `PLACE2NUTS_*` environment variables, command-line flags.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::location::providers::GISCO_DOMAIN;
use crate::location::{Error, Result, DEFAULT_NUTS_YEAR};
use crate::url::Protocol;

/// Where resolution happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    /// GISCO (or Nominatim) over HTTP for both geocoding and NUTS lookup.
    #[default]
    Online,
    /// Google geocoding plus a local boundary dataset.
    Offline,
}

impl FromStr for ServiceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            other => Err(Error::Configuration(format!(
                "unknown mode '{}' (expected online or offline)",
                other
            ))),
        }
    }
}

impl fmt::Display for ServiceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Geocoding service used in online mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnlineProvider {
    #[default]
    Gisco,
    Nominatim,
}

impl FromStr for OnlineProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gisco" => Ok(Self::Gisco),
            "nominatim" | "osm" => Ok(Self::Nominatim),
            other => Err(Error::Configuration(format!(
                "unknown provider '{}' (expected gisco or nominatim)",
                other
            ))),
        }
    }
}

/// Immutable settings of one resolver.
#[derive(Clone)]
pub struct ResolverConfig {
    pub mode: ServiceMode,
    /// Geocoding API key; required (non-empty) in offline mode.
    pub api_key: Option<String>,
    /// Boundary dataset; required in offline mode.
    pub boundary_path: Option<PathBuf>,
    pub domain: String,
    pub protocol: Protocol,
    pub provider: OnlineProvider,
    pub year: u16,
    /// Request timeout for the HTTP transport. `None` leaves it unbounded.
    pub timeout: Option<Duration>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            mode: ServiceMode::Online,
            api_key: None,
            boundary_path: None,
            domain: GISCO_DOMAIN.to_string(),
            protocol: Protocol::Http,
            provider: OnlineProvider::Gisco,
            year: DEFAULT_NUTS_YEAR,
            timeout: None,
        }
    }
}

impl fmt::Debug for ResolverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverConfig")
            .field("mode", &self.mode)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("boundary_path", &self.boundary_path)
            .field("domain", &self.domain)
            .field("protocol", &self.protocol)
            .field("provider", &self.provider)
            .field("year", &self.year)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ResolverConfig {
    pub fn online() -> Self {
        Self::default()
    }

    pub fn offline(api_key: impl Into<String>, boundary_path: impl Into<PathBuf>) -> Self {
        Self {
            mode: ServiceMode::Offline,
            api_key: Some(api_key.into()),
            boundary_path: Some(boundary_path.into()),
            ..Self::default()
        }
    }
}

/// One partially-specified configuration layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub mode: Option<String>,
    pub api_key: Option<String>,
    pub boundary_path: Option<PathBuf>,
    pub domain: Option<String>,
    pub protocol: Option<String>,
    pub provider: Option<String>,
    pub year: Option<u16>,
    pub timeout_secs: Option<u64>,
}

const ENV_PREFIX: &str = "PLACE2NUTS_";

impl Settings {
    /// `<config_dir>/place2nuts/config.json`, e.g. `~/.config/place2nuts/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("place2nuts").join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .map_err(|e| Error::Transport(format!("reading config {}: {}", path.display(), e)))?;
        serde_json::from_str(&data)
            .map_err(|e| Error::Configuration(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Load the default config file if it exists.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a layer from `PLACE2NUTS_*` variables fetched through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.is_empty());
        let number = |name: &str| -> Result<Option<u64>> {
            var(name)
                .map(|v| {
                    v.parse::<u64>().map_err(|_| {
                        Error::Configuration(format!("{}{} must be a number, got '{}'", ENV_PREFIX, name, v))
                    })
                })
                .transpose()
        };

        let year = number("YEAR")?
            .map(|y| u16::try_from(y).map_err(|_| Error::Configuration(format!("year {} out of range", y))))
            .transpose()?;

        Ok(Self {
            mode: var("MODE"),
            api_key: var("API_KEY"),
            boundary_path: var("BOUNDARY_PATH").map(PathBuf::from),
            domain: var("DOMAIN"),
            protocol: var("PROTOCOL"),
            provider: var("PROVIDER"),
            year,
            timeout_secs: number("TIMEOUT_SECS")?,
        })
    }

    /// Overlay `other` on top of `self`; set fields of `other` win.
    pub fn merge(self, other: Settings) -> Settings {
        Settings {
            mode: other.mode.or(self.mode),
            api_key: other.api_key.or(self.api_key),
            boundary_path: other.boundary_path.or(self.boundary_path),
            domain: other.domain.or(self.domain),
            protocol: other.protocol.or(self.protocol),
            provider: other.provider.or(self.provider),
            year: other.year.or(self.year),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
        }
    }

    /// Resolve the layer against the defaults.
    pub fn into_config(self) -> Result<ResolverConfig> {
        let defaults = ResolverConfig::default();
        Ok(ResolverConfig {
            mode: self.mode.as_deref().map(str::parse::<ServiceMode>).transpose()?.unwrap_or(defaults.mode),
            api_key: self.api_key,
            boundary_path: self.boundary_path,
            domain: self.domain.unwrap_or(defaults.domain),
            protocol: self.protocol.as_deref().map(str::parse::<Protocol>).transpose()?.unwrap_or(defaults.protocol),
            provider: self
                .provider
                .as_deref()
                .map(str::parse::<OnlineProvider>)
                .transpose()?
                .unwrap_or(defaults.provider),
            year: self.year.unwrap_or(defaults.year),
            timeout: self.timeout_secs.map(Duration::from_secs),
        })
    }
}
