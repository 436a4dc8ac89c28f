use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, PodSpec, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding, Subject};
use kube::{Resource, ResourceExt};

use super::MutateFn;
use crate::resources::AUTHORINO_CONTAINER_NAME;

pub const DEPLOYMENT_MUTATORS: &[MutateFn<Deployment>] = &[
    merge_labels::<Deployment>,
    deployment_image,
    deployment_image_pull_policy,
    deployment_replicas,
    deployment_args,
    deployment_volume_mounts,
    deployment_volumes,
    deployment_service_account,
];

pub const SERVICE_MUTATORS: &[MutateFn<Service>] = &[merge_labels::<Service>, service_ports, service_selector];

pub const SERVICE_ACCOUNT_MUTATORS: &[MutateFn<ServiceAccount>] = &[merge_labels::<ServiceAccount>];

pub const ROLE_BINDING_MUTATORS: &[MutateFn<RoleBinding>] = &[merge_labels::<RoleBinding>, role_binding_subjects];

pub const CLUSTER_ROLE_BINDING_MUTATORS: &[MutateFn<ClusterRoleBinding>] =
    &[merge_labels::<ClusterRoleBinding>, cluster_role_binding_subjects];

fn replace_if_different<T: PartialEq + Clone>(existing: &mut T, desired: &T) -> bool {
    if existing == desired {
        return false;
    }
    *existing = desired.clone();
    true
}

/// Adds or overwrites the desired labels, keeping labels set by others
pub fn merge_labels<K: Resource>(existing: &mut K, desired: &K) -> bool {
    let labels = existing.labels_mut();
    let mut changed = false;
    for (key, value) in desired.labels() {
        if labels.get(key) != Some(value) {
            labels.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

fn pod_spec(deployment: &Deployment) -> Option<&PodSpec> {
    deployment.spec.as_ref()?.template.spec.as_ref()
}

fn pod_spec_mut(deployment: &mut Deployment) -> &mut PodSpec {
    deployment
        .spec
        .get_or_insert_with(Default::default)
        .template
        .spec
        .get_or_insert_with(Default::default)
}

fn authorino_container(deployment: &Deployment) -> Option<&Container> {
    pod_spec(deployment)?
        .containers
        .iter()
        .find(|c| c.name == AUTHORINO_CONTAINER_NAME)
}

/// Applies `mutate` to the Authorino container, restoring the whole container if it went missing
fn mutate_container(
    existing: &mut Deployment,
    desired: &Deployment,
    mutate: impl FnOnce(&mut Container, &Container) -> bool,
) -> bool {
    let Some(desired_container) = authorino_container(desired) else {
        return false;
    };
    let pod = pod_spec_mut(existing);
    match pod.containers.iter_mut().find(|c| c.name == desired_container.name) {
        Some(container) => mutate(container, desired_container),
        None => {
            pod.containers.push(desired_container.clone());
            true
        }
    }
}

pub fn deployment_image(existing: &mut Deployment, desired: &Deployment) -> bool {
    mutate_container(existing, desired, |e, d| replace_if_different(&mut e.image, &d.image))
}

/// Left alone when not requested, the API server fills in its own default
pub fn deployment_image_pull_policy(existing: &mut Deployment, desired: &Deployment) -> bool {
    mutate_container(existing, desired, |e, d| {
        d.image_pull_policy.is_some() && replace_if_different(&mut e.image_pull_policy, &d.image_pull_policy)
    })
}

pub fn deployment_replicas(existing: &mut Deployment, desired: &Deployment) -> bool {
    let Some(desired_replicas) = desired.spec.as_ref().map(|s| s.replicas) else {
        return false;
    };
    let spec = existing.spec.get_or_insert_with(Default::default);
    replace_if_different(&mut spec.replicas, &desired_replicas)
}

pub fn deployment_args(existing: &mut Deployment, desired: &Deployment) -> bool {
    mutate_container(existing, desired, |e, d| replace_if_different(&mut e.args, &d.args))
}

pub fn deployment_volume_mounts(existing: &mut Deployment, desired: &Deployment) -> bool {
    mutate_container(existing, desired, |e, d| {
        replace_if_different(&mut e.volume_mounts, &d.volume_mounts)
    })
}

pub fn deployment_volumes(existing: &mut Deployment, desired: &Deployment) -> bool {
    let Some(desired_pod) = pod_spec(desired) else {
        return false;
    };
    replace_if_different(&mut pod_spec_mut(existing).volumes, &desired_pod.volumes)
}

pub fn deployment_service_account(existing: &mut Deployment, desired: &Deployment) -> bool {
    let Some(desired_pod) = pod_spec(desired) else {
        return false;
    };
    replace_if_different(
        &mut pod_spec_mut(existing).service_account_name,
        &desired_pod.service_account_name,
    )
}

pub fn service_ports(existing: &mut Service, desired: &Service) -> bool {
    let Some(desired_spec) = desired.spec.as_ref() else {
        return false;
    };
    let spec = existing.spec.get_or_insert_with(Default::default);
    replace_if_different(&mut spec.ports, &desired_spec.ports)
}

pub fn service_selector(existing: &mut Service, desired: &Service) -> bool {
    let Some(desired_spec) = desired.spec.as_ref() else {
        return false;
    };
    let spec = existing.spec.get_or_insert_with(Default::default);
    replace_if_different(&mut spec.selector, &desired_spec.selector)
}

pub fn role_binding_subjects(existing: &mut RoleBinding, desired: &RoleBinding) -> bool {
    replace_if_different(&mut existing.subjects, &desired.subjects)
}

/// Appends the desired subjects that are missing; subjects of other instances are kept
pub fn cluster_role_binding_subjects(existing: &mut ClusterRoleBinding, desired: &ClusterRoleBinding) -> bool {
    let subjects = existing.subjects.get_or_insert_with(Vec::new);
    let mut changed = false;
    for subject in desired.subjects.iter().flatten() {
        if !subjects.contains(subject) {
            subjects.push(subject.clone());
            changed = true;
        }
    }
    changed
}

/// Drops `subject` from a shared binding, returning whether it was present
pub fn remove_subject(binding: &mut ClusterRoleBinding, subject: &Subject) -> bool {
    let Some(subjects) = binding.subjects.as_mut() else {
        return false;
    };
    let before = subjects.len();
    subjects.retain(|s| s != subject);
    subjects.len() != before
}
