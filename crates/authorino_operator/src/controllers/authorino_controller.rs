use crate::api::v1beta1::{Authorino, Tls, AUTHORINO_FINALIZER};
use crate::reconcilers::mutators::{
    remove_subject, CLUSTER_ROLE_BINDING_MUTATORS, DEPLOYMENT_MUTATORS, ROLE_BINDING_MUTATORS,
    SERVICE_ACCOUNT_MUTATORS, SERVICE_MUTATORS,
};
use crate::reconcilers::{reconcile_resource, ReconcileOutcome};
use crate::resources::rbac::{service_account_subject, K8S_AUTH_CLUSTER_ROLE_BINDING};
use crate::resources::{
    create_desired_authorization_service, create_desired_deployment, create_desired_k8s_auth_binding,
    create_desired_leader_election_binding, create_desired_manager_binding,
    create_desired_manager_cluster_binding, create_desired_metrics_service, create_desired_oidc_service,
    create_desired_service_account, manager_cluster_binding_name, Instance,
};
use crate::util::authorino_status::{AuthorinoStatusManager, StatusReason};
use crate::util::config::OperatorConfig;
use crate::util::errors::{Error, ErrorWithRequeue, ReconcileAction, Result, StdError};
use crate::util::metrics;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use k8s_openapi::api::{
    apps::v1::Deployment,
    core::v1::{Secret, Service, ServiceAccount},
    rbac::v1::{ClusterRoleBinding, RoleBinding},
};
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{Api, DeleteParams, ListParams, PostParams, Preconditions, ResourceExt},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        events::{Event, EventType, Recorder, Reporter},
        finalizer::{finalizer, Event as Finalizer},
        watcher::{self, Config},
    },
    Resource,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::{sync::RwLock, time::Duration};
use tracing::*;

/// Secrets are not watched, so a missing TLS secret is polled for
const TLS_SECRET_REQUEUE: Duration = Duration::from_secs(30);

impl Authorino {
    // Reconcile (for non-finalizer related changes)
    pub async fn reconcile(&self, ctx: Arc<Context>) -> Result<Action> {
        let client = ctx.client.clone();
        let instance = Instance::from_authorino(self)?;
        let status = AuthorinoStatusManager::new(&client, self);

        match self.tls_preflight(&client, &instance.namespace).await {
            Ok(()) => {}
            Err(StdError::TlsSecretNotProvided(message)) => {
                status.set_ready(StatusReason::TlsSecretNotProvided, message).await?;
                return Ok(Action::await_change());
            }
            Err(StdError::TlsSecretNotFound(message)) => {
                status
                    .set_ready(StatusReason::TlsSecretNotFound, message.clone())
                    .await?;
                return Err(Error::ErrorWithRequeue(ErrorWithRequeue::new(
                    StdError::TlsSecretNotFound(message),
                    TLS_SECRET_REQUEUE,
                )));
            }
            Err(e) => {
                return report(&status, StatusReason::UnableToGetTlsSecret, Err(e.into())).await;
            }
        }

        let services: Api<Service> = Api::namespaced(client.clone(), &instance.namespace);
        for desired in [
            create_desired_authorization_service(&self.spec, &instance),
            create_desired_oidc_service(&self.spec, &instance),
            create_desired_metrics_service(&self.spec, &instance),
        ] {
            let result = reconcile_resource(&services, desired, SERVICE_MUTATORS).await;
            report(&status, StatusReason::UnableToCreateServices, result).await?;
        }

        let service_accounts: Api<ServiceAccount> = Api::namespaced(client.clone(), &instance.namespace);
        let result = reconcile_resource(
            &service_accounts,
            create_desired_service_account(&instance),
            SERVICE_ACCOUNT_MUTATORS,
        )
        .await;
        report(&status, StatusReason::UnableToCreateServiceAccount, result).await?;

        let result = self.reconcile_bindings(&client, &instance).await;
        report(&status, StatusReason::UnableToCreateBindings, result).await?;

        let deployments: Api<Deployment> = Api::namespaced(client.clone(), &instance.namespace);
        let desired = create_desired_deployment(&self.spec, &instance, &ctx.config.default_authorino_image);
        let (outcome, deployment) = match reconcile_resource(&deployments, desired, DEPLOYMENT_MUTATORS).await {
            Ok(converged) => converged,
            Err(e) => {
                let reason = match &e {
                    Error::StdError(StdError::ReconcileFailed { action, .. }) => match action {
                        ReconcileAction::Create => StatusReason::UnableToCreateDeployment,
                        // the message names the failed read, which blocks updating the existing Deployment
                        ReconcileAction::Get | ReconcileAction::Update | ReconcileAction::Delete => {
                            StatusReason::UnableToUpdateDeployment
                        }
                    },
                    _ => StatusReason::UnableToUpdateDeployment,
                };
                return report(&status, reason, Err(e)).await;
            }
        };

        match outcome {
            ReconcileOutcome::Created => {
                ctx.publish(
                    self,
                    "Provisioning",
                    format!("Created Deployment `{}`", instance.name),
                )
                .await;
                status
                    .set_ready(StatusReason::Provisioning, "Authorino instance is being provisioned")
                    .await?;
            }
            ReconcileOutcome::Updated => {
                status
                    .set_ready(StatusReason::Updating, "Authorino instance is being updated")
                    .await?;
            }
            ReconcileOutcome::Unchanged | ReconcileOutcome::Deleted => {
                if deployment.as_ref().is_some_and(deployment_is_ready) {
                    status
                        .set_ready(StatusReason::Provisioned, "Authorino instance is ready")
                        .await?;
                } else {
                    status
                        .set_ready(StatusReason::DeploymentNotReady, "Authorino Deployment is not ready")
                        .await?;
                }
            }
        }

        // If no events were received, check back every 5 minutes
        Ok(Action::requeue(Duration::from_secs(5 * 60)))
    }

    /// Every enabled TLS listener needs a certificate secret that exists in the namespace
    async fn tls_preflight(&self, client: &Client, namespace: &str) -> Result<(), StdError> {
        let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
        let listeners: [(&str, &Tls); 2] = [
            ("listener", &self.spec.listener.tls),
            ("oidcServer", &self.spec.oidc_server.tls),
        ];

        for (field, tls) in listeners {
            if !tls.is_enabled() {
                continue;
            }
            let Some(secret_name) = tls.secret_name() else {
                return Err(StdError::TlsSecretNotProvided(format!(
                    "TLS is enabled on {field} but no certSecretRef was provided"
                )));
            };
            match secrets.get(secret_name).await {
                Ok(_) => {}
                Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                    return Err(StdError::TlsSecretNotFound(format!(
                        "TLS secret '{secret_name}' of {field} not found in namespace '{namespace}'"
                    )));
                }
                Err(e) => return Err(StdError::KubeError(e)),
            }
        }
        Ok(())
    }

    async fn reconcile_bindings(&self, client: &Client, instance: &Instance) -> Result<()> {
        let role_bindings: Api<RoleBinding> = Api::namespaced(client.clone(), &instance.namespace);
        reconcile_resource(
            &role_bindings,
            create_desired_manager_binding(&self.spec, instance),
            ROLE_BINDING_MUTATORS,
        )
        .await?;
        reconcile_resource(
            &role_bindings,
            create_desired_leader_election_binding(instance),
            ROLE_BINDING_MUTATORS,
        )
        .await?;

        let cluster_role_bindings: Api<ClusterRoleBinding> = Api::all(client.clone());
        reconcile_resource(
            &cluster_role_bindings,
            create_desired_manager_cluster_binding(&self.spec, instance),
            CLUSTER_ROLE_BINDING_MUTATORS,
        )
        .await?;
        reconcile_resource(
            &cluster_role_bindings,
            create_desired_k8s_auth_binding(instance),
            CLUSTER_ROLE_BINDING_MUTATORS,
        )
        .await?;
        Ok(())
    }

    // Finalizer cleanup (the object was deleted, ensure nothing is orphaned)
    async fn cleanup(&self, ctx: Arc<Context>) -> Result<Action> {
        let instance = Instance::from_authorino(self)?;
        let cluster_role_bindings: Api<ClusterRoleBinding> = Api::all(ctx.client.clone());

        // Namespaced objects are garbage collected through their owner reference,
        // cluster-scoped bindings are not
        let manager_binding = manager_cluster_binding_name(&instance.namespace, &instance.name);
        match cluster_role_bindings
            .delete(&manager_binding, &DeleteParams::default())
            .await
        {
            Ok(_) => info!("Deleted ClusterRoleBinding '{}'", manager_binding),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {}
            Err(e) => return Err(StdError::KubeError(e).into()),
        }

        release_k8s_auth_subject(&cluster_role_bindings, &instance).await?;

        ctx.publish(self, "DeleteRequested", format!("Delete `{}`", self.name_any()))
            .await;
        Ok(Action::await_change())
    }
}

/// Removes the instance from the shared k8s-auth binding, deleting the binding once nobody uses it
async fn release_k8s_auth_subject(api: &Api<ClusterRoleBinding>, instance: &Instance) -> Result<()> {
    let mut binding = match api.get(K8S_AUTH_CLUSTER_ROLE_BINDING).await {
        Ok(binding) => binding,
        Err(kube::Error::Api(api_err)) if api_err.code == 404 => return Ok(()),
        Err(e) => return Err(StdError::KubeError(e).into()),
    };
    if !remove_subject(&mut binding, &service_account_subject(instance)) {
        return Ok(());
    }

    if binding.subjects.as_ref().map_or(true, Vec::is_empty) {
        info!("Deleting ClusterRoleBinding '{}'", K8S_AUTH_CLUSTER_ROLE_BINDING);
        // A subject added since the read turns the delete into a conflict
        let params = DeleteParams {
            preconditions: Some(Preconditions {
                resource_version: binding.metadata.resource_version.clone(),
                uid: None,
            }),
            ..Default::default()
        };
        api.delete(K8S_AUTH_CLUSTER_ROLE_BINDING, &params)
            .await
            .map_err(StdError::KubeError)?;
    } else {
        info!(
            "Removing '{}' from ClusterRoleBinding '{}'",
            instance.name, K8S_AUTH_CLUSTER_ROLE_BINDING
        );
        api.replace(K8S_AUTH_CLUSTER_ROLE_BINDING, &PostParams::default(), &binding)
            .await
            .map_err(StdError::KubeError)?;
    }
    Ok(())
}

/// Records `reason` on the `Ready` condition when `result` is an error, then hands the result back
async fn report<T>(status: &AuthorinoStatusManager<'_>, reason: StatusReason, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        if let Err(status_err) = status.set_ready(reason, e.to_string()).await {
            warn!("failed to record {} on status: {}", reason, status_err);
        }
    }
    result
}

/// A Deployment is ready once it reports Available with all desired replicas ready
pub fn deployment_is_ready(deployment: &Deployment) -> bool {
    let desired = deployment.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    let Some(status) = deployment.status.as_ref() else {
        return false;
    };
    let available = status
        .conditions
        .iter()
        .flatten()
        .any(|c| c.type_ == "Available" && c.status == "True");
    available && status.ready_replicas.unwrap_or(0) >= desired
}

/// State shared between the controller and the web server
#[derive(Clone)]
pub struct State {
    /// Diagnostics populated by the reconciler
    diagnostics: Arc<RwLock<Diagnostics>>,
    /// Metrics registry
    registry: prometheus::Registry,
    /// Metrics registered on `registry`, shared by every Context
    metrics: metrics::Metrics,
    config: OperatorConfig,
}

impl Default for State {
    fn default() -> Self {
        Self::new(OperatorConfig::default())
    }
}

/// State wrapper around the controller outputs for the web server
impl State {
    pub fn new(config: OperatorConfig) -> Self {
        let registry = prometheus::Registry::default();
        let metrics = metrics::Metrics::default()
            .register(&registry)
            .expect("fresh registry accepts the operator metrics");
        Self {
            diagnostics: Arc::default(),
            registry,
            metrics,
            config,
        }
    }

    /// Metrics getter
    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    // Create a Controller Context that can update State
    pub fn to_context(&self, client: Client) -> Arc<Context> {
        Arc::new(Context {
            client,
            metrics: self.metrics.clone(),
            diagnostics: self.diagnostics.clone(),
            config: self.config.clone(),
        })
    }
}

// Context for our reconciler
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Prometheus metrics
    pub metrics: metrics::Metrics,
    pub config: OperatorConfig,
}

impl Context {
    /// Publishes a Normal event on the Authorino; failures are only logged
    async fn publish(&self, authorino: &Authorino, reason: &str, note: String) {
        let recorder = self.diagnostics.read().await.recorder(self.client.clone());
        let event = Event {
            type_: EventType::Normal,
            reason: reason.into(),
            note: Some(note),
            action: reason.into(),
            secondary: None,
        };
        if let Err(e) = recorder.publish(&event, &authorino.object_ref(&())).await {
            warn!("failed to publish {} event: {}", reason, e);
        }
    }
}

pub async fn reconcile(authorino: Arc<Authorino>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = ctx.metrics.count_and_measure("authorino");
    ctx.diagnostics.write().await.last_event = Utc::now();

    let ns = authorino
        .namespace()
        .ok_or_else(|| StdError::MetadataMissing("Authorino is namespace scoped".to_string()))?;
    let authorinos: Api<Authorino> = Api::namespaced(ctx.client.clone(), &ns);

    info!("Reconciling Authorino \"{}\" in {}", authorino.name_any(), ns);
    finalizer(&authorinos, AUTHORINO_FINALIZER, authorino, |event| async {
        match event {
            Finalizer::Apply(authorino) => match authorino.reconcile(ctx.clone()).await {
                Err(Error::ErrorWithRequeue(e)) => {
                    warn!("requeueing Authorino \"{}\": {}", authorino.name_any(), e);
                    Ok(Action::requeue(e.duration))
                }
                other => other,
            },
            Finalizer::Cleanup(authorino) => authorino.cleanup(ctx.clone()).await,
        }
    })
    .await
    .map_err(|e| Error::StdError(StdError::FinalizerError(Box::new(e))))
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    #[serde(skip)]
    pub reporter: Reporter,
}
impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            reporter: "authorino-operator".into(),
        }
    }
}
impl Diagnostics {
    fn recorder(&self, client: Client) -> Recorder {
        Recorder::new(client, self.reporter.clone())
    }
}

fn error_policy(authorino: Arc<Authorino>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics.reconcile_failure(&authorino, error);
    Action::requeue(Duration::from_secs(60))
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Initialize the controller and shared state (given the crd is installed)
pub async fn run(state: State, client: Client) -> Result<()> {
    let namespace = state.config.watch_namespace.clone();
    let namespace = namespace.as_deref();

    let authorinos = scoped_api::<Authorino>(&client, namespace);
    if let Err(e) = authorinos.list(&ListParams::default().limit(1)).await {
        error!("CRD is not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        return Err(StdError::KubeError(e).into());
    }

    Controller::new(authorinos, Config::default().any_semantic())
        .owns(scoped_api::<Deployment>(&client, namespace), watcher::Config::default())
        .owns(scoped_api::<Service>(&client, namespace), watcher::Config::default())
        .owns(scoped_api::<ServiceAccount>(&client, namespace), watcher::Config::default())
        .owns(scoped_api::<RoleBinding>(&client, namespace), watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, state.to_context(client.clone()))
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("reconciled {}", obj.name),
                Err(e) => warn!("reconcile failed: {}", e),
            }
        })
        .await;
    Ok(())
}
