use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::{
    api::ListParams,
    client::Client,
    runtime::{
        controller::{Action, Controller},
        watcher::{self, Config},
    },
    ResourceExt,
};
use tracing::*;

use super::comparators;
use super::context::{Context, State, CHANGED_REQUEUE, ERROR_REQUEUE, RESYNC_INTERVAL, RETRY_REQUEUE};
use super::deployer::ServiceDeployer;
use crate::api::v1beta1::KogitoService;
use crate::client::ResourceClient;
use crate::util::errors::{Error, Result};

/// Maps the outcome of a deployer pass to the next reconciliation.
pub fn next_action(outcome: Result<bool>) -> Result<Action> {
    match outcome {
        Ok(true) => Ok(Action::requeue(CHANGED_REQUEUE)),
        Ok(false) => Ok(Action::requeue(RESYNC_INTERVAL)),
        Err(e) => match e.requeue_after() {
            Some(duration) => Ok(Action::requeue(duration)),
            None if e.is_retryable() => Ok(Action::requeue(RETRY_REQUEUE)),
            None => Err(e),
        },
    }
}

/// One pass over `service` against any cluster facade.
pub async fn reconcile_with<C: ResourceClient, S: KogitoService>(
    client: &C,
    http: &reqwest::Client,
    service: &S,
) -> Result<Action> {
    let outcome = ServiceDeployer::new(client, http, service)
        .run_with_status(comparators::registry())
        .await;
    next_action(outcome)
}

#[instrument(skip(ctx, service), fields(kind = %S::kind(&()), name = %service.name_any()))]
pub async fn reconcile<S: KogitoService>(service: Arc<S>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = ctx.metrics.count_and_measure(&S::kind(&()));
    ctx.diagnostics.write().await.last_event = Utc::now();

    info!(
        "Reconciling {} \"{}\" in {}",
        S::kind(&()),
        service.name_any(),
        service.namespace().unwrap_or_default()
    );
    reconcile_with(&ctx.client, &ctx.http, service.as_ref()).await
}

fn error_policy<S: KogitoService>(service: Arc<S>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics.reconcile_failure(&S::kind(&()), service.as_ref(), error);
    Action::requeue(ERROR_REQUEUE)
}

/// Initialize the controller for one kind of Kogito service (given the crd is installed)
pub async fn run<S: KogitoService>(state: State, client: Client, namespace: Option<String>) {
    let ctx = state.to_context(client, namespace);
    let services = ctx.watched_api::<S>();
    if let Err(e) = services.list(&ListParams::default().limit(1)).await {
        error!("CRD {} is not queryable; {e:?}. Is the CRD installed?", S::kind(&()));
        info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        std::process::exit(1);
    }

    Controller::new(services, Config::default().any_semantic())
        .owns(ctx.watched_api::<Deployment>(), watcher::Config::default())
        .owns(ctx.watched_api::<Service>(), watcher::Config::default())
        .owns(ctx.watched_api::<ConfigMap>(), watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile::<S>, error_policy::<S>, ctx)
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::v1beta1::{
        InfraResource, KogitoInfra, KogitoInfraSpec, KogitoRuntime, KogitoRuntimeSpec, KogitoServiceSpec,
    };
    use crate::client::fake::FakeClient;
    use crate::controllers::image::{IMAGE_IMPORT_REQUEUE, IMAGE_STREAM_API_VERSION, IMAGE_STREAM_KIND};
    use crate::util::errors::{ErrorWithRequeue, StdError};
    use tokio::time::Duration;

    fn runtime(client: &FakeClient, infra: Vec<String>) -> KogitoRuntime {
        let mut runtime = KogitoRuntime::new(
            "orders",
            KogitoRuntimeSpec {
                service: KogitoServiceSpec {
                    image: Some("quay.io/acme/orders:1.0".to_string()),
                    infra,
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        runtime.metadata.namespace = Some("ns".to_string());
        client.seed(runtime)
    }

    #[test]
    fn test_next_action() {
        assert_eq!(next_action(Ok(true)).unwrap(), Action::requeue(CHANGED_REQUEUE));
        assert_eq!(next_action(Ok(false)).unwrap(), Action::requeue(RESYNC_INTERVAL));
        assert_eq!(
            next_action(Err(Error::not_ready("kafka"))).unwrap(),
            Action::requeue(RETRY_REQUEUE)
        );
        let with_requeue = Error::ErrorWithRequeue(ErrorWithRequeue::new(
            StdError::ResourceNotReady("tag".to_string()),
            Duration::from_secs(10),
        ));
        assert_eq!(next_action(Err(with_requeue)).unwrap(), Action::requeue(Duration::from_secs(10)));
        assert!(next_action(Err(Error::configuration("bad"))).is_err());
    }

    #[tokio::test]
    async fn test_reconcile_converges() {
        let client = FakeClient::new();
        let http = reqwest::Client::new();
        let service = runtime(&client, Vec::new());

        let action = reconcile_with(&client, &http, &service).await.unwrap();
        assert_eq!(action, Action::requeue(CHANGED_REQUEUE));

        let stored: KogitoRuntime = client.get("ns", "orders").unwrap();
        let conditions = stored.status.clone().unwrap().conditions;
        let action = reconcile_with(&client, &http, &stored).await.unwrap();
        assert_eq!(action, Action::requeue(RESYNC_INTERVAL));

        let stored: KogitoRuntime = client.get("ns", "orders").unwrap();
        assert_eq!(stored.status.unwrap().conditions, conditions);
    }

    #[tokio::test]
    async fn test_infra_not_ready_is_retried() {
        let client = FakeClient::new();
        let http = reqwest::Client::new();
        client.seed({
            let mut infra = KogitoInfra::new(
                "kafka",
                KogitoInfraSpec {
                    resource: Some(InfraResource {
                        api_version: "kafka.strimzi.io/v1beta2".to_string(),
                        kind: "Kafka".to_string(),
                        namespace: None,
                        name: "my-cluster".to_string(),
                    }),
                    ..Default::default()
                },
            );
            infra.metadata.namespace = Some("ns".to_string());
            infra
        });
        let service = runtime(&client, vec!["kafka".to_string()]);

        let action = reconcile_with(&client, &http, &service).await.unwrap();
        assert_eq!(action, Action::requeue(RETRY_REQUEUE));
        assert_eq!(client.count("create", "Deployment"), 0);
        // the configuration snapshot is written before the infras are checked
        assert_eq!(client.count("create", "ConfigMap"), 1);
    }

    #[tokio::test]
    async fn test_missing_infra_is_fatal() {
        let client = FakeClient::new();
        let http = reqwest::Client::new();
        let service = runtime(&client, vec!["missing".to_string()]);
        let err = reconcile_with(&client, &http, &service).await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unresolved_image_stream_requeues() {
        let client = FakeClient::new().with_api(IMAGE_STREAM_API_VERSION, IMAGE_STREAM_KIND);
        let http = reqwest::Client::new();
        let service = runtime(&client, Vec::new());

        let action = reconcile_with(&client, &http, &service).await.unwrap();
        assert_eq!(action, Action::requeue(IMAGE_IMPORT_REQUEUE));
        assert_eq!(client.count("create", "ImageStream"), 1);
        assert_eq!(client.count("create", "Deployment"), 0);
    }
}
