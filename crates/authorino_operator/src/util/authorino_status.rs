use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use kube::api::{Api, Patch, PatchParams};
use kube::ResourceExt;
use serde_json::json;
use std::fmt;
use tracing::info;

use crate::api::v1beta1::{Authorino, API_VERSION, KIND};
use crate::util::errors::{Result, StdError};
use crate::util::status::{set_status_condition, CONDITION_FALSE, CONDITION_TRUE};

pub const READY_CONDITION: &str = "Ready";

// Field manager for status updates
pub const STATUS_FIELD_MANAGER: &str = "authorino-operator-status";

/// Reason of the `Ready` condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusReason {
    Provisioning,
    Updating,
    Provisioned,
    DeploymentNotReady,
    TlsSecretNotProvided,
    TlsSecretNotFound,
    UnableToGetTlsSecret,
    UnableToCreateServices,
    UnableToCreateServiceAccount,
    UnableToCreateBindings,
    UnableToCreateDeployment,
    UnableToUpdateDeployment,
}

impl fmt::Display for StatusReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl StatusReason {
    pub fn is_ready(&self) -> bool {
        matches!(self, StatusReason::Provisioned)
    }
}

pub fn ready_condition(reason: StatusReason, message: impl Into<String>, observed_generation: Option<i64>) -> Condition {
    Condition {
        type_: READY_CONDITION.to_string(),
        status: (if reason.is_ready() { CONDITION_TRUE } else { CONDITION_FALSE }).to_string(),
        reason: reason.to_string(),
        message: message.into(),
        last_transition_time: Time(Utc::now()),
        observed_generation,
    }
}

pub struct AuthorinoStatusManager<'a> {
    authorino: &'a Authorino,
    client: kube::Client,
}

impl<'a> AuthorinoStatusManager<'a> {
    pub fn new(client: &kube::Client, authorino: &'a Authorino) -> Self {
        Self {
            authorino,
            client: client.clone(),
        }
    }

    /// Sets the `Ready` condition, writing the status only when the conditions changed.
    ///
    /// Returns whether a write happened.
    pub async fn set_ready(&self, reason: StatusReason, message: impl Into<String>) -> Result<bool> {
        let name = self.authorino.name_any();
        let namespace = self
            .authorino
            .namespace()
            .ok_or_else(|| StdError::MetadataMissing(format!("Authorino '{name}' has no namespace")))?;

        let mut conditions = self
            .authorino
            .status
            .as_ref()
            .map_or_else(Vec::new, |s| s.conditions.clone());
        let condition = ready_condition(reason, message, self.authorino.metadata.generation);
        if !set_status_condition(&mut conditions, condition) {
            return Ok(false);
        }

        let patch = Patch::Apply(json!({
            "apiVersion": API_VERSION,
            "kind": KIND,
            "status": {
                "conditions": conditions
            }
        }));
        let api: Api<Authorino> = Api::namespaced(self.client.clone(), &namespace);
        api.patch_status(&name, &PatchParams::apply(STATUS_FIELD_MANAGER).force(), &patch)
            .await
            .map_err(StdError::KubeError)?;

        info!("Updated Authorino '{}' condition {} to {}", name, READY_CONDITION, reason);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::v1beta1::{AuthorinoSpec, AuthorinoStatus};
    use crate::fixtures::{timeout_after_1s, ApiServerVerifier};
    use assert_json_diff::assert_json_include;

    const STATUS_PATH: &str = "/apis/operator.authorino.kuadrant.io/v1beta1/namespaces/default/authorinos/authorino/status";

    fn authorino(conditions: Vec<Condition>) -> Authorino {
        let mut authorino = Authorino::new("authorino", AuthorinoSpec::default());
        authorino.metadata.namespace = Some("default".to_string());
        authorino.metadata.generation = Some(3);
        authorino.status = Some(AuthorinoStatus { conditions });
        authorino
    }

    #[test]
    fn only_provisioned_is_ready() {
        let ready = ready_condition(StatusReason::Provisioned, "Authorino instance is ready", Some(1));
        assert_eq!(ready.status, "True");
        assert_eq!(ready.reason, "Provisioned");

        let not_ready = ready_condition(StatusReason::DeploymentNotReady, "", Some(1));
        assert_eq!(not_ready.status, "False");
        assert_eq!(not_ready.reason, "DeploymentNotReady");
        assert_eq!(not_ready.type_, READY_CONDITION);
    }

    #[tokio::test]
    async fn writes_changed_condition() {
        let (client, mut verifier) = ApiServerVerifier::client();
        let authorino = authorino(vec![]);
        let response = authorino.clone();
        let mocksrv = tokio::spawn(async move {
            let patch = verifier.expect_patch(STATUS_PATH, &response).await;
            assert_json_include!(
                actual: patch,
                expected: json!({
                    "apiVersion": "operator.authorino.kuadrant.io/v1beta1",
                    "kind": "Authorino",
                    "status": {
                        "conditions": [{
                            "type": "Ready",
                            "status": "False",
                            "reason": "Provisioning",
                            "message": "Authorino instance is being provisioned",
                            "observedGeneration": 3
                        }]
                    }
                })
            );
        });

        let manager = AuthorinoStatusManager::new(&client, &authorino);
        let written = manager
            .set_ready(StatusReason::Provisioning, "Authorino instance is being provisioned")
            .await
            .unwrap();
        assert!(written);
        timeout_after_1s(mocksrv).await;
    }

    #[tokio::test]
    async fn skips_write_when_condition_is_unchanged() {
        let (client, mut verifier) = ApiServerVerifier::client();
        let authorino = authorino(vec![ready_condition(StatusReason::Provisioned, "ready", Some(3))]);
        let mocksrv = tokio::spawn(async move {
            verifier.expect_no_more_requests().await;
        });

        let written = AuthorinoStatusManager::new(&client, &authorino)
            .set_ready(StatusReason::Provisioned, "ready")
            .await
            .unwrap();
        assert!(!written);
        drop(client);
        timeout_after_1s(mocksrv).await;
    }
}
