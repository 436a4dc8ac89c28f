use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};

use crate::api::v1beta1::Authorino;
use crate::util::errors::{Result, StdError};

pub mod deployment;
pub mod rbac;
pub mod service;

pub use deployment::create_desired_deployment;
pub use rbac::{
    create_desired_k8s_auth_binding, create_desired_leader_election_binding,
    create_desired_manager_binding, create_desired_manager_cluster_binding, create_desired_service_account,
};
pub use service::{create_desired_authorization_service, create_desired_metrics_service, create_desired_oidc_service};

pub const AUTHORINO_CONTAINER_NAME: &str = "authorino";

pub fn authorization_service_name(name: &str) -> String {
    format!("{name}-authorino-authorization")
}

pub fn oidc_service_name(name: &str) -> String {
    format!("{name}-authorino-oidc")
}

pub fn metrics_service_name(name: &str) -> String {
    format!("{name}-controller-metrics")
}

pub fn service_account_name(name: &str) -> String {
    format!("{name}-authorino")
}

pub fn manager_binding_name(name: &str) -> String {
    format!("{name}-authorino")
}

/// Cluster-scoped names must not clash between instances of different namespaces
pub fn manager_cluster_binding_name(namespace: &str, name: &str) -> String {
    format!("authorino-{namespace}-{name}")
}

pub fn leader_election_binding_name(name: &str) -> String {
    format!("{name}-authorino-leader-election")
}

/// Labels put on every object managed for the instance, also used as pod selector
pub fn authorino_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("control-plane".to_string(), "controller-manager".to_string()),
        ("authorino-resource".to_string(), name.to_string()),
    ])
}

/// Identity of an `Authorino` as needed by the resource builders
#[derive(Clone, Debug)]
pub struct Instance {
    pub name: String,
    pub namespace: String,
    pub owner_reference: OwnerReference,
}

impl Instance {
    pub fn from_authorino(authorino: &Authorino) -> Result<Self> {
        let name = authorino.metadata.name.clone().ok_or_else(|| {
            StdError::MetadataMissing("Name should always be set on an existing object".to_string())
        })?;
        let namespace = authorino
            .namespace()
            .ok_or_else(|| StdError::MetadataMissing(format!("Authorino '{name}' has no namespace")))?;
        let owner_reference = authorino
            .controller_owner_ref(&())
            .ok_or_else(|| StdError::MetadataMissing(format!("Authorino '{name}' has no uid")))?;

        Ok(Self {
            name,
            namespace,
            owner_reference,
        })
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        authorino_labels(&self.name)
    }

    /// Metadata for a namespaced object owned by the instance
    pub fn owned_metadata(&self, name: String) -> ObjectMeta {
        ObjectMeta {
            name: Some(name),
            namespace: Some(self.namespace.clone()),
            labels: Some(self.labels()),
            owner_references: Some(vec![self.owner_reference.clone()]),
            ..Default::default()
        }
    }
}
