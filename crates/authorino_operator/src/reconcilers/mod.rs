//! Converging managed objects towards their desired state.
//!
//! `reconcile_resource` fetches the object named after the desired one and creates,
//! updates or deletes it. Updates go through a list of mutators, each comparing one
//! dimension of the existing object with the desired object and copying it over when
//! it differs. The existing object is written back with its `resourceVersion`, so a
//! concurrent change makes the update fail and the reconcile is retried.

use std::fmt::Debug;

use kube::{
    api::{Api, DeleteParams, PostParams},
    Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use crate::util::errors::{ReconcileAction, Result, StdError};

pub mod mutators;

/// Annotation marking a desired object as one that must not exist
pub const DELETE_TAG_ANNOTATION: &str = "kuadrant.io/delete";

pub fn tag_object_to_delete<K: Resource>(obj: &mut K) {
    obj.annotations_mut()
        .insert(DELETE_TAG_ANNOTATION.to_string(), "true".to_string());
}

pub fn is_object_tagged_to_delete<K: Resource>(obj: &K) -> bool {
    obj.annotations()
        .get(DELETE_TAG_ANNOTATION)
        .is_some_and(|v| v == "true")
}

/// Copies one dimension of `desired` into `existing`, returning whether it changed anything
pub type MutateFn<K> = fn(&mut K, &K) -> bool;

/// Runs every mutator, even after one reported a change
pub fn mutate_all<K>(mutators: &[MutateFn<K>], existing: &mut K, desired: &K) -> bool {
    mutators
        .iter()
        .fold(false, |changed, mutate| mutate(existing, desired) || changed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created,
    Updated,
    Deleted,
    Unchanged,
}

/// Converges the object named after `desired` through `api`.
///
/// The returned object is the one now stored in the cluster, `None` when it does not exist.
pub async fn reconcile_resource<K>(
    api: &Api<K>,
    desired: K,
    mutators: &[MutateFn<K>],
) -> Result<(ReconcileOutcome, Option<K>)>
where
    K: Resource + Clone + Debug + Serialize + DeserializeOwned,
    K::DynamicType: Default,
{
    let kind = K::kind(&K::DynamicType::default()).to_string();
    let name = desired
        .meta()
        .name
        .clone()
        .ok_or_else(|| StdError::MetadataMissing(format!("desired {kind} has no name")))?;
    let failed = |action, source| StdError::ReconcileFailed {
        action,
        kind: kind.clone(),
        name: name.clone(),
        source,
    };

    let existing = match api.get(&name).await {
        Ok(existing) => Some(existing),
        Err(kube::Error::Api(api_err)) if api_err.code == 404 => None,
        Err(e) => return Err(failed(ReconcileAction::Get, e).into()),
    };

    match (existing, is_object_tagged_to_delete(&desired)) {
        (None, true) => {
            debug!("{} '{}' is tagged to delete and already absent", kind, name);
            Ok((ReconcileOutcome::Unchanged, None))
        }
        (None, false) => {
            info!("Creating {} '{}'", kind, name);
            let created = api
                .create(&PostParams::default(), &desired)
                .await
                .map_err(|e| failed(ReconcileAction::Create, e))?;
            Ok((ReconcileOutcome::Created, Some(created)))
        }
        (Some(_), true) => {
            info!("Deleting {} '{}'", kind, name);
            api.delete(&name, &DeleteParams::default())
                .await
                .map_err(|e| failed(ReconcileAction::Delete, e))?;
            Ok((ReconcileOutcome::Deleted, None))
        }
        (Some(mut existing), false) => {
            if !mutate_all(mutators, &mut existing, &desired) {
                debug!("{} '{}' is up to date", kind, name);
                return Ok((ReconcileOutcome::Unchanged, Some(existing)));
            }
            info!("Updating {} '{}'", kind, name);
            let updated = api
                .replace(&name, &PostParams::default(), &existing)
                .await
                .map_err(|e| failed(ReconcileAction::Update, e))?;
            Ok((ReconcileOutcome::Updated, Some(updated)))
        }
    }
}
