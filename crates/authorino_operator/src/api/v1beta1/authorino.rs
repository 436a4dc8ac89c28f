use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::v1beta1::conditions_schema;

pub static AUTHORINO_FINALIZER: &str = "authorino.operator.authorino.kuadrant.io";

pub const API_VERSION: &str = "operator.authorino.kuadrant.io/v1beta1";
pub const KIND: &str = "Authorino";

pub const DEFAULT_REPLICAS: i32 = 1;
pub const DEFAULT_GRPC_PORT: i32 = 50051;
pub const DEFAULT_HTTP_PORT: i32 = 5001;
pub const DEFAULT_OIDC_PORT: i32 = 8083;
pub const DEFAULT_METRICS_PORT: i32 = 8080;
pub const DEFAULT_HEALTHZ_PORT: i32 = 8081;

/// Generate the Kubernetes wrapper struct `Authorino` from our Spec and Status struct
///
/// This provides a hook for generating the CRD yaml (in crdgen)
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    kind = "Authorino",
    group = "operator.authorino.kuadrant.io",
    version = "v1beta1",
    namespaced
)]
#[kube(status = "AuthorinoStatus", shortname = "authorino")]
#[kube(
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AuthorinoSpec {
    /// Authorino image; the operator's default image is used when unset
    pub image: Option<String>,
    pub replicas: Option<i32>,
    pub image_pull_policy: Option<String>,
    /// Watch AuthConfigs in every namespace instead of only the Authorino's own
    #[serde(default)]
    pub cluster_wide: bool,
    #[serde(default)]
    pub listener: Listener,
    #[serde(default)]
    pub oidc_server: OidcServer,
    pub auth_config_label_selectors: Option<String>,
    pub secret_label_selectors: Option<String>,
    #[serde(default)]
    pub superseding_host_subsets: bool,
    pub log_level: Option<String>,
    pub log_mode: Option<String>,
    #[serde(default)]
    pub volumes: VolumesSpec,
    /// Cache size of each evaluator, in megabytes
    pub evaluator_cache_size: Option<i32>,
    #[serde(default)]
    pub tracing: Tracing,
    #[serde(default)]
    pub metrics: Metrics,
    #[serde(default)]
    pub healthz: Healthz,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    /// Port of the gRPC interface (deprecated, use `ports.grpc`)
    pub port: Option<i32>,
    #[serde(default)]
    pub ports: Ports,
    #[serde(default)]
    pub tls: Tls,
    /// Timeout of the external authorization request, in milliseconds
    pub timeout: Option<i32>,
    /// Maximum size of the body of requests to the raw HTTP interface, in bytes
    pub max_http_request_body_size: Option<i32>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct Ports {
    pub grpc: Option<i32>,
    pub http: Option<i32>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OidcServer {
    pub port: Option<i32>,
    #[serde(default)]
    pub tls: Tls,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tls {
    /// TLS is on unless explicitly disabled
    pub enabled: Option<bool>,
    pub cert_secret_ref: Option<SecretRef>,
}

impl Tls {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn secret_name(&self) -> Option<&str> {
        self.cert_secret_ref
            .as_ref()
            .map(|r| r.name.as_str())
            .filter(|name| !name.is_empty())
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct SecretRef {
    pub name: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumesSpec {
    #[serde(default)]
    pub items: Vec<VolumeSpec>,
    pub default_mode: Option<i32>,
}

/// An extra volume projected from config maps and secrets into the Authorino container
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpec {
    pub name: String,
    pub mount_path: String,
    #[serde(default)]
    pub config_maps: Vec<String>,
    #[serde(default)]
    pub secrets: Vec<String>,
    #[serde(default)]
    pub items: Vec<KeyToPath>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct KeyToPath {
    pub key: String,
    pub path: String,
    pub mode: Option<i32>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct Tracing {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub insecure: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct Metrics {
    pub port: Option<i32>,
    /// Enable metrics at the level of each evaluator
    #[serde(default)]
    pub deep: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct Healthz {
    pub port: Option<i32>,
}

impl AuthorinoSpec {
    pub fn replicas(&self) -> i32 {
        self.replicas.unwrap_or(DEFAULT_REPLICAS)
    }

    pub fn grpc_port(&self) -> i32 {
        self.listener
            .ports
            .grpc
            .or(self.listener.port)
            .unwrap_or(DEFAULT_GRPC_PORT)
    }

    pub fn http_port(&self) -> i32 {
        self.listener.ports.http.unwrap_or(DEFAULT_HTTP_PORT)
    }

    pub fn oidc_port(&self) -> i32 {
        self.oidc_server.port.unwrap_or(DEFAULT_OIDC_PORT)
    }

    pub fn metrics_port(&self) -> i32 {
        self.metrics.port.unwrap_or(DEFAULT_METRICS_PORT)
    }

    pub fn healthz_port(&self) -> i32 {
        self.healthz.port.unwrap_or(DEFAULT_HEALTHZ_PORT)
    }
}

/// The status object of `Authorino`
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
pub struct AuthorinoStatus {
    #[serde(default)]
    #[schemars(schema_with = "conditions_schema")]
    pub conditions: Vec<Condition>,
}
