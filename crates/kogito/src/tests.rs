#[cfg(test)]
mod tests {
    use crate::api::v1beta1::{KogitoRuntime, KogitoRuntimeSpec, KogitoServiceSpec};
    use crate::controllers::service_controller::reconcile;
    use crate::controllers::State;
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::core::v1::Service;
    use kube::api::{Api, ObjectMeta, Patch, PatchParams};
    use kube::Client;
    use std::sync::Arc;

    #[tokio::test]
    #[ignore = "uses k8s current-context"]
    async fn integration_reconcile_should_set_status() {
        let client = Client::try_default().await.unwrap();
        let ctx = State::default().to_context(client.clone(), Some("default".to_string()));

        let runtime = KogitoRuntime {
            metadata: ObjectMeta {
                name: Some("test-runtime".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: KogitoRuntimeSpec {
                service: KogitoServiceSpec {
                    image: Some("quay.io/kiegroup/process-quarkus-example:latest".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
            status: None,
        };

        let runtimes: Api<KogitoRuntime> = Api::namespaced(client.clone(), "default");
        let ssapply = PatchParams::apply("ctrltest").force();
        runtimes
            .patch("test-runtime", &ssapply, &Patch::Apply(&runtime))
            .await
            .unwrap();

        let runtime = runtimes.get("test-runtime").await.unwrap();
        reconcile(Arc::new(runtime), ctx).await.unwrap();

        let output = runtimes.get("test-runtime").await.unwrap();
        let conditions = output.status.unwrap().conditions;
        assert_eq!(
            conditions.iter().map(|c| c.type_.as_str()).collect::<Vec<_>>(),
            vec!["Failed", "Provisioning", "Deployed"]
        );

        let deployments: Api<Deployment> = Api::namespaced(client.clone(), "default");
        let deployment = deployments.get("test-runtime").await.unwrap();
        assert_eq!(deployment.spec.unwrap().replicas, Some(1));
        let services: Api<Service> = Api::namespaced(client.clone(), "default");
        assert!(services.get("test-runtime").await.is_ok());

        runtimes.delete("test-runtime", &Default::default()).await.unwrap();
    }
}
