use std::net::SocketAddr;

use clap::Parser;
use kogito::util::telemetry::LogFormat;

/// Kubernetes operator deploying Kogito runtimes, supporting services and infra bindings
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Namespace to watch, all namespaces when unset
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Address of the diagnostics, health and metrics server
    #[arg(long, env = "KOGITO_OPERATOR_BIND_ADDRESS", default_value = "0.0.0.0:8080")]
    pub bind_address: SocketAddr,

    /// Log output format: compact or json
    #[arg(long, env = "KOGITO_OPERATOR_LOG_FORMAT", default_value = "compact")]
    pub log_format: LogFormat,
}

impl Config {
    /// An empty `WATCH_NAMESPACE` means every namespace.
    pub fn watched_namespace(&self) -> Option<String> {
        self.namespace.clone().filter(|ns| !ns.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse_from(["operator"]);
        assert_eq!(config.bind_address.port(), 8080);
        assert_eq!(config.log_format, LogFormat::Compact);
        assert_eq!(config.watched_namespace(), None);
    }

    #[test]
    fn test_flags() {
        let config = Config::parse_from(["operator", "--namespace", "kogito", "--log-format", "json"]);
        assert_eq!(config.watched_namespace().as_deref(), Some("kogito"));
        assert_eq!(config.log_format, LogFormat::Json);

        let config = Config::parse_from(["operator", "--namespace", ""]);
        assert_eq!(config.watched_namespace(), None);
    }
}
