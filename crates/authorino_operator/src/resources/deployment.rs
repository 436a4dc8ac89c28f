use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapProjection, Container, ContainerPort, KeyToPath, PodSpec, PodTemplateSpec, ProjectedVolumeSource,
    SecretProjection, SecretVolumeSource, Volume, VolumeMount, VolumeProjection,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

use super::{service_account_name, Instance, AUTHORINO_CONTAINER_NAME};
use crate::api::v1beta1::{AuthorinoSpec, Tls, VolumeSpec};

pub const TLS_CERT_VOLUME_NAME: &str = "tls-cert";
pub const OIDC_CERT_VOLUME_NAME: &str = "oidc-cert";

pub const TLS_CERT_PATH: &str = "/etc/ssl/certs/tls.crt";
pub const TLS_CERT_KEY_PATH: &str = "/etc/ssl/private/tls.key";
pub const OIDC_TLS_CERT_PATH: &str = "/etc/ssl/certs/oidc.crt";
pub const OIDC_TLS_CERT_KEY_PATH: &str = "/etc/ssl/private/oidc.key";

/// Mode the API server defaults secret and projected volumes to (0644)
pub const DEFAULT_VOLUME_MODE: i32 = 420;

pub fn create_desired_deployment(spec: &AuthorinoSpec, instance: &Instance, default_image: &str) -> Deployment {
    let labels = instance.labels();
    let (volumes, volume_mounts) = authorino_volumes(spec);

    Deployment {
        metadata: instance.owned_metadata(instance.name.clone()),
        spec: Some(DeploymentSpec {
            replicas: Some(spec.replicas()),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(service_account_name(&instance.name)),
                    containers: vec![Container {
                        name: AUTHORINO_CONTAINER_NAME.to_string(),
                        image: Some(spec.image.clone().unwrap_or_else(|| default_image.to_string())),
                        image_pull_policy: spec.image_pull_policy.clone(),
                        args: Some(authorino_args(spec, &instance.namespace)),
                        ports: Some(container_ports(spec)),
                        volume_mounts: Some(volume_mounts),
                        ..Default::default()
                    }],
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}

/// Command-line flags of the Authorino container derived from `AuthorinoSpec`
pub fn authorino_args(spec: &AuthorinoSpec, namespace: &str) -> Vec<String> {
    let mut args = Vec::new();

    if spec.superseding_host_subsets {
        args.push("--allow-superseding-host-subsets".to_string());
    }
    if !spec.cluster_wide {
        args.push(format!("--watch-namespace={namespace}"));
    }
    if let Some(selectors) = non_empty(&spec.auth_config_label_selectors) {
        args.push(format!("--auth-config-label-selector={selectors}"));
    }
    if let Some(selectors) = non_empty(&spec.secret_label_selectors) {
        args.push(format!("--secret-label-selector={selectors}"));
    }
    if let Some(level) = non_empty(&spec.log_level) {
        args.push(format!("--log-level={level}"));
    }
    if let Some(mode) = non_empty(&spec.log_mode) {
        args.push(format!("--log-mode={mode}"));
    }

    // external auth service
    if let Some(timeout) = spec.listener.timeout {
        args.push(format!("--timeout={timeout}"));
    }
    args.push(format!("--ext-auth-grpc-port={}", spec.grpc_port()));
    args.push(format!("--ext-auth-http-port={}", spec.http_port()));
    if spec.listener.tls.is_enabled() {
        args.push(format!("--tls-cert={TLS_CERT_PATH}"));
        args.push(format!("--tls-cert-key={TLS_CERT_KEY_PATH}"));
    }

    // oidc server
    args.push(format!("--oidc-http-port={}", spec.oidc_port()));
    if spec.oidc_server.tls.is_enabled() {
        args.push(format!("--oidc-tls-cert={OIDC_TLS_CERT_PATH}"));
        args.push(format!("--oidc-tls-cert-key={OIDC_TLS_CERT_KEY_PATH}"));
    }

    if let Some(size) = spec.evaluator_cache_size {
        args.push(format!("--evaluator-cache-size={size}"));
    }

    if !spec.tracing.endpoint.is_empty() {
        args.push(format!("--tracing-service-endpoint={}", spec.tracing.endpoint));
        // BTreeMap keeps the tags sorted so the args are stable between reconciles
        for (key, value) in &spec.tracing.tags {
            args.push(format!("--tracing-service-tag={key}={value}"));
        }
        if spec.tracing.insecure {
            args.push("--tracing-service-insecure".to_string());
        }
    }

    if spec.metrics.deep {
        args.push("--deep-metrics-enabled".to_string());
    }
    args.push(format!("--metrics-addr=:{}", spec.metrics_port()));
    args.push(format!("--health-probe-addr=:{}", spec.healthz_port()));

    if spec.replicas() > 1 {
        args.push("--enable-leader-election".to_string());
    }

    if let Some(size) = spec.listener.max_http_request_body_size {
        args.push(format!("--max-http-request-body-size={size}"));
    }

    args
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn container_ports(spec: &AuthorinoSpec) -> Vec<ContainerPort> {
    [
        ("grpc", spec.grpc_port()),
        ("http", spec.http_port()),
        ("oidc", spec.oidc_port()),
        ("metrics", spec.metrics_port()),
        ("healthz", spec.healthz_port()),
    ]
    .into_iter()
    .map(|(name, port)| ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        protocol: Some("TCP".to_string()),
        ..Default::default()
    })
    .collect()
}

/// Pod volumes and the matching container mounts: TLS certificates first, then the
/// user-declared projected volumes in declaration order
pub fn authorino_volumes(spec: &AuthorinoSpec) -> (Vec<Volume>, Vec<VolumeMount>) {
    let mut volumes = Vec::new();
    let mut mounts = Vec::new();

    if let Some(secret) = tls_secret(&spec.listener.tls) {
        volumes.push(secret_volume(TLS_CERT_VOLUME_NAME, secret));
        mounts.extend(cert_mounts(TLS_CERT_VOLUME_NAME, TLS_CERT_PATH, TLS_CERT_KEY_PATH));
    }
    if let Some(secret) = tls_secret(&spec.oidc_server.tls) {
        volumes.push(secret_volume(OIDC_CERT_VOLUME_NAME, secret));
        mounts.extend(cert_mounts(OIDC_CERT_VOLUME_NAME, OIDC_TLS_CERT_PATH, OIDC_TLS_CERT_KEY_PATH));
    }

    let default_mode = spec.volumes.default_mode.unwrap_or(DEFAULT_VOLUME_MODE);
    for item in &spec.volumes.items {
        volumes.push(projected_volume(item, default_mode));
        mounts.push(VolumeMount {
            name: item.name.clone(),
            mount_path: item.mount_path.clone(),
            ..Default::default()
        });
    }

    (volumes, mounts)
}

fn tls_secret(tls: &Tls) -> Option<&str> {
    if tls.is_enabled() {
        tls.secret_name()
    } else {
        None
    }
}

fn secret_volume(name: &str, secret_name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret_name.to_string()),
            default_mode: Some(DEFAULT_VOLUME_MODE),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn cert_mounts(volume: &str, cert_path: &str, key_path: &str) -> [VolumeMount; 2] {
    [("tls.crt", cert_path), ("tls.key", key_path)].map(|(sub_path, mount_path)| VolumeMount {
        name: volume.to_string(),
        mount_path: mount_path.to_string(),
        sub_path: Some(sub_path.to_string()),
        read_only: Some(true),
        ..Default::default()
    })
}

fn projected_volume(item: &VolumeSpec, default_mode: i32) -> Volume {
    let items = if item.items.is_empty() {
        None
    } else {
        Some(
            item.items
                .iter()
                .map(|i| KeyToPath {
                    key: i.key.clone(),
                    path: i.path.clone(),
                    mode: i.mode,
                })
                .collect::<Vec<_>>(),
        )
    };

    let config_maps = item.config_maps.iter().map(|name| VolumeProjection {
        config_map: Some(ConfigMapProjection {
            name: name.clone(),
            items: items.clone(),
            ..Default::default()
        }),
        ..Default::default()
    });
    let secrets = item.secrets.iter().map(|name| VolumeProjection {
        secret: Some(SecretProjection {
            name: name.clone(),
            items: items.clone(),
            ..Default::default()
        }),
        ..Default::default()
    });

    Volume {
        name: item.name.clone(),
        projected: Some(ProjectedVolumeSource {
            sources: Some(config_maps.chain(secrets).collect()),
            default_mode: Some(default_mode),
            ..Default::default()
        }),
        ..Default::default()
    }
}
