use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use super::{
    leader_election_binding_name, manager_binding_name, manager_cluster_binding_name, service_account_name,
    Instance,
};
use crate::api::v1beta1::AuthorinoSpec;
use crate::reconcilers::tag_object_to_delete;

pub const MANAGER_CLUSTER_ROLE: &str = "authorino-manager-role";
pub const LEADER_ELECTION_CLUSTER_ROLE: &str = "authorino-leader-election-role";
pub const K8S_AUTH_CLUSTER_ROLE: &str = "authorino-manager-k8s-auth-role";
pub const K8S_AUTH_CLUSTER_ROLE_BINDING: &str = "authorino-k8s-auth";

pub fn create_desired_service_account(instance: &Instance) -> ServiceAccount {
    ServiceAccount {
        metadata: instance.owned_metadata(service_account_name(&instance.name)),
        ..Default::default()
    }
}

/// The subject every binding of the instance grants its roles to
pub fn service_account_subject(instance: &Instance) -> Subject {
    Subject {
        kind: "ServiceAccount".to_string(),
        name: service_account_name(&instance.name),
        namespace: Some(instance.namespace.clone()),
        ..Default::default()
    }
}

fn cluster_role_ref(name: &str) -> RoleRef {
    RoleRef {
        api_group: "rbac.authorization.k8s.io".to_string(),
        kind: "ClusterRole".to_string(),
        name: name.to_string(),
    }
}

/// Namespaced grant of the AuthConfig manager role, tagged for deletion on cluster-wide instances
pub fn create_desired_manager_binding(spec: &AuthorinoSpec, instance: &Instance) -> RoleBinding {
    let mut binding = RoleBinding {
        metadata: instance.owned_metadata(manager_binding_name(&instance.name)),
        role_ref: cluster_role_ref(MANAGER_CLUSTER_ROLE),
        subjects: Some(vec![service_account_subject(instance)]),
    };
    if spec.cluster_wide {
        tag_object_to_delete(&mut binding);
    }
    binding
}

/// Cluster-wide grant of the AuthConfig manager role, tagged for deletion on namespaced instances.
///
/// Cluster-scoped objects cannot be owned by a namespaced `Authorino`, so no owner reference is
/// set and the finalizer takes care of removing it.
pub fn create_desired_manager_cluster_binding(spec: &AuthorinoSpec, instance: &Instance) -> ClusterRoleBinding {
    let mut binding = ClusterRoleBinding {
        metadata: ObjectMeta {
            name: Some(manager_cluster_binding_name(&instance.namespace, &instance.name)),
            labels: Some(instance.labels()),
            ..Default::default()
        },
        role_ref: cluster_role_ref(MANAGER_CLUSTER_ROLE),
        subjects: Some(vec![service_account_subject(instance)]),
    };
    if !spec.cluster_wide {
        tag_object_to_delete(&mut binding);
    }
    binding
}

pub fn create_desired_leader_election_binding(instance: &Instance) -> RoleBinding {
    RoleBinding {
        metadata: instance.owned_metadata(leader_election_binding_name(&instance.name)),
        role_ref: cluster_role_ref(LEADER_ELECTION_CLUSTER_ROLE),
        subjects: Some(vec![service_account_subject(instance)]),
    }
}

/// Shared binding for TokenReview/SubjectAccessReview; subjects of all instances accumulate in it
pub fn create_desired_k8s_auth_binding(instance: &Instance) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: ObjectMeta {
            name: Some(K8S_AUTH_CLUSTER_ROLE_BINDING.to_string()),
            labels: Some(BTreeMap::from([(
                "app.kubernetes.io/managed-by".to_string(),
                "authorino-operator".to_string(),
            )])),
            ..Default::default()
        },
        role_ref: cluster_role_ref(K8S_AUTH_CLUSTER_ROLE),
        subjects: Some(vec![service_account_subject(instance)]),
    }
}
