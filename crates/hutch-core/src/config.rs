//! hutch.toml configuration parser.
//!
//! Every section is optional. Values from the file can be overridden by the
//! environment variables the exporter has always honoured (`RABBIT_URL`,
//! `PUBLISH_PORT`, ...), which are applied after the file is read.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    pub rabbit: RabbitConfig,
    pub server: ServerConfig,
    pub exporters: ExportersConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RabbitConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    pub timeout: String,
}

impl Default for RabbitConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:15672".to_string(),
            user: "guest".to_string(),
            password: "guest".to_string(),
            timeout: "30s".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
    /// Prefix for every exported metric name; empty for none.
    pub namespace: String,
    /// Answer 503 instead of 200 when a module fails.
    pub fail_on_error: bool,
    /// Re-publish the last successful cycle's series when a fetch fails.
    pub publish_stale_on_error: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:9419".to_string(),
            namespace: "rabbitmq".to_string(),
            fail_on_error: false,
            publish_stale_on_error: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportersConfig {
    pub enabled: Vec<String>,
}

impl Default for ExportersConfig {
    fn default() -> Self {
        Self {
            enabled: vec!["connections".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::Invalid {
                field: "log.format",
                reason: format!("expected \"text\" or \"json\", got {other:?}"),
            }),
        }
    }
}

impl ExporterConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Read the optional config file, apply process environment overrides
    /// and validate the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment-style overrides. `lookup` returns the value of a
    /// variable, if set.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("RABBIT_URL") {
            self.rabbit.url = url;
        }
        if let Some(user) = lookup("RABBIT_USER") {
            self.rabbit.user = user;
        }
        if let Some(password) = lookup("RABBIT_PASSWORD") {
            self.rabbit.password = password;
        }
        if let Some(timeout) = lookup("RABBIT_TIMEOUT") {
            self.rabbit.timeout = timeout;
        }
        if let Some(list) = lookup("RABBIT_EXPORTERS") {
            self.exporters.enabled = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.log.format = format.parse()?;
        }

        let addr = lookup("PUBLISH_ADDR");
        let port = lookup("PUBLISH_PORT");
        if addr.is_some() || port.is_some() {
            let mut listen = self.listen_addr()?;
            if let Some(addr) = addr {
                let ip: IpAddr = addr.trim().parse().map_err(|e| ConfigError::Invalid {
                    field: "PUBLISH_ADDR",
                    reason: format!("{addr:?}: {e}"),
                })?;
                listen.set_ip(ip);
            }
            if let Some(port) = port {
                let port: u16 = port.trim().parse().map_err(|e| ConfigError::Invalid {
                    field: "PUBLISH_PORT",
                    reason: format!("{port:?}: {e}"),
                })?;
                listen.set_port(port);
            }
            self.server.listen = listen.to_string();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let uri: http::Uri = self.rabbit.url.parse().map_err(|e| ConfigError::Invalid {
            field: "rabbit.url",
            reason: format!("{:?}: {e}", self.rabbit.url),
        })?;
        if uri.scheme_str() != Some("http") {
            return Err(ConfigError::Invalid {
                field: "rabbit.url",
                reason: format!("only http:// urls are supported, got {:?}", self.rabbit.url),
            });
        }
        if uri.host().is_none() {
            return Err(ConfigError::Invalid {
                field: "rabbit.url",
                reason: "missing host".to_string(),
            });
        }
        if self.timeout()?.is_zero() {
            return Err(ConfigError::Invalid {
                field: "rabbit.timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.exporters.enabled.is_empty() {
            return Err(ConfigError::Invalid {
                field: "exporters.enabled",
                reason: "at least one exporter must be enabled".to_string(),
            });
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.exporters.enabled.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(ConfigError::Invalid {
                field: "exporters.enabled",
                reason: format!("exporter {dup:?} is listed more than once"),
            });
        }
        self.listen_addr()?;
        Ok(())
    }

    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.rabbit.timeout).ok_or_else(|| ConfigError::Invalid {
            field: "rabbit.timeout",
            reason: format!("cannot parse duration {:?}", self.rabbit.timeout),
        })
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.listen.parse().map_err(|e| ConfigError::Invalid {
            field: "server.listen",
            reason: format!("{:?}: {e}", self.server.listen),
        })
    }
}

/// Parse a duration string like "5s", "500ms", "2m", or a bare number of
/// seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
