use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use super::{authorization_service_name, metrics_service_name, oidc_service_name, Instance};
use crate::api::v1beta1::AuthorinoSpec;

/// gRPC and raw HTTP external authorization interfaces
pub fn create_desired_authorization_service(spec: &AuthorinoSpec, instance: &Instance) -> Service {
    create_desired_service(
        instance,
        authorization_service_name(&instance.name),
        vec![
            service_port("grpc", spec.grpc_port()),
            service_port("http", spec.http_port()),
        ],
    )
}

/// Festival wristband OIDC discovery endpoints
pub fn create_desired_oidc_service(spec: &AuthorinoSpec, instance: &Instance) -> Service {
    create_desired_service(
        instance,
        oidc_service_name(&instance.name),
        vec![service_port("http", spec.oidc_port())],
    )
}

pub fn create_desired_metrics_service(spec: &AuthorinoSpec, instance: &Instance) -> Service {
    create_desired_service(
        instance,
        metrics_service_name(&instance.name),
        vec![service_port("http", spec.metrics_port())],
    )
}

fn create_desired_service(instance: &Instance, name: String, ports: Vec<ServicePort>) -> Service {
    Service {
        metadata: instance.owned_metadata(name),
        spec: Some(ServiceSpec {
            selector: Some(instance.labels()),
            ports: Some(ports),
            ..Default::default()
        }),
        ..Default::default()
    }
}

// Protocol and target port are set explicitly so the object read back from the
// API server compares equal to the desired one.
fn service_port(name: &str, port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        target_port: Some(IntOrString::Int(port)),
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}
