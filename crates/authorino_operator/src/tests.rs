#[cfg(test)]
mod tests {
    use crate::api::v1beta1::{Authorino, AuthorinoSpec};
    use crate::controllers::authorino_controller::State;
    use crate::resources::{authorization_service_name, service_account_name};
    use crate::util::authorino_status::READY_CONDITION;
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::core::v1::{Service, ServiceAccount};
    use kube::api::{Api, ObjectMeta, Patch, PatchParams};
    use kube::Client;

    #[tokio::test]
    #[ignore = "uses k8s current-context"]
    async fn integration_reconcile_should_provision_authorino() {
        let client = Client::try_default().await.unwrap();
        let ctx = State::default().to_context(client.clone());

        // TLS is on by default, switch it off so no certificate secrets are needed
        let spec: AuthorinoSpec = serde_json::from_value(serde_json::json!({
            "listener": { "tls": { "enabled": false } },
            "oidcServer": { "tls": { "enabled": false } }
        }))
        .unwrap();
        let authorino = Authorino {
            metadata: ObjectMeta {
                name: Some("test-authorino".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec,
            status: None,
        };

        let authorinos: Api<Authorino> = Api::namespaced(client.clone(), "default");
        let ssapply = PatchParams::apply("ctrltest").force();
        authorinos
            .patch("test-authorino", &ssapply, &Patch::Apply(&authorino))
            .await
            .unwrap();

        // Reconcile the stored object, it carries the uid owner references need
        let stored = authorinos.get("test-authorino").await.unwrap();
        stored.reconcile(ctx).await.unwrap();

        let output = authorinos.get("test-authorino").await.unwrap();
        let conditions = output.status.unwrap().conditions;
        assert!(conditions.iter().any(|c| c.type_ == READY_CONDITION));

        let deployments: Api<Deployment> = Api::namespaced(client.clone(), "default");
        let deployment = deployments.get("test-authorino").await.unwrap();
        assert_eq!(deployment.spec.unwrap().replicas, Some(1));

        let services: Api<Service> = Api::namespaced(client.clone(), "default");
        services
            .get(&authorization_service_name("test-authorino"))
            .await
            .unwrap();

        let service_accounts: Api<ServiceAccount> = Api::namespaced(client.clone(), "default");
        service_accounts
            .get(&service_account_name("test-authorino"))
            .await
            .unwrap();

        authorinos
            .delete("test-authorino", &Default::default())
            .await
            .unwrap();
    }
}
