use std::net::SocketAddr;

use authorino_operator::util::config::{OperatorConfig, DEFAULT_AUTHORINO_IMAGE};
use clap::Parser;

#[derive(Debug, Parser)]
#[clap(name = "authorino-operator", about = "Manages Authorino instances")]
pub struct Args {
    /// Address of the health, metrics and diagnostics server
    #[clap(long, default_value = "0.0.0.0:8080", env = "BIND_ADDR")]
    pub bind_addr: SocketAddr,

    /// Image of Authorino instances that do not set `spec.image`
    #[clap(long, default_value = DEFAULT_AUTHORINO_IMAGE, env = "RELATED_IMAGE_AUTHORINO")]
    pub authorino_image: String,

    /// Only watch Authorino instances in this namespace; all namespaces when empty
    #[clap(long, default_value = "", env = "WATCH_NAMESPACE")]
    pub watch_namespace: String,

    /// Log as JSON instead of the compact format
    #[clap(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl Args {
    pub fn operator_config(&self) -> OperatorConfig {
        OperatorConfig::default()
            .with_default_authorino_image(self.authorino_image.as_str())
            .with_watch_namespace(self.watch_namespace.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_watch_every_namespace() {
        let args = Args::try_parse_from(["authorino-operator"]).unwrap();
        let config = args.operator_config();
        assert_eq!(config.default_authorino_image, DEFAULT_AUTHORINO_IMAGE);
        assert_eq!(config.watch_namespace, None);
        assert!(!args.log_json);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "authorino-operator",
            "--authorino-image",
            "registry.local/authorino:v1",
            "--watch-namespace",
            "auth",
            "--bind-addr",
            "127.0.0.1:9090",
        ])
        .unwrap();
        let config = args.operator_config();
        assert_eq!(config.default_authorino_image, "registry.local/authorino:v1");
        assert_eq!(config.watch_namespace.as_deref(), Some("auth"));
        assert_eq!(args.bind_addr.port(), 9090);
    }
}
