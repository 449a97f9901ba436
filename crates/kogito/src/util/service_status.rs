use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;
use kube::{Resource, ResourceExt};
use tracing::*;

use crate::api::v1beta1::service::{DeploymentConditionMirror, KogitoService, KogitoServiceStatus};
use crate::client::ResourceClient;
use crate::util::errors::Error;
use crate::util::status::{new_condition, ConditionSet, ConditionStatus};

pub const FAILED_CONDITION: &str = "Failed";
pub const PROVISIONING_CONDITION: &str = "Provisioning";
pub const DEPLOYED_CONDITION: &str = "Deployed";

/// Reason of a `Failed=False` condition inserted on a fresh set.
pub const RECONCILED_REASON: &str = "Reconciled";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningReason {
    InProgress,
    Finished,
    FailedProvisioning,
}

impl fmt::Display for ProvisioningReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProvisioningReason::InProgress => write!(f, "InProgress"),
            ProvisioningReason::Finished => write!(f, "Finished"),
            ProvisioningReason::FailedProvisioning => write!(f, "FailedProvisioning"),
        }
    }
}

/// What one deployer pass observed, copied into status on success.
#[derive(Debug, Clone, Default)]
pub struct ObservedState {
    pub deployment: Option<Deployment>,
    pub image: Option<String>,
    pub external_uri: Option<String>,
    pub config_map_references: Vec<String>,
    pub secret_references: Vec<String>,
}

impl ObservedState {
    pub fn ready_replicas(&self) -> i32 {
        self.deployment
            .as_ref()
            .and_then(|d| d.status.as_ref())
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0)
    }

    fn deployment_conditions(&self) -> Vec<DeploymentConditionMirror> {
        self.deployment
            .as_ref()
            .and_then(|d| d.status.as_ref())
            .and_then(|s| s.conditions.as_ref())
            .map(|conditions| {
                conditions
                    .iter()
                    .map(|c| DeploymentConditionMirror {
                        type_: c.type_.clone(),
                        status: c.status.clone(),
                        reason: c.reason.clone(),
                        message: c.message.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn replicas_reason(deployed: bool) -> &'static str {
    if deployed {
        "ReplicasReady"
    } else {
        "NoReplicasReady"
    }
}

fn replicas_message(ready: i32, expected: i32) -> String {
    format!("{ready} of {expected} replicas ready")
}

/// Moves the Failed, Provisioning and Deployed conditions for one pass.
///
/// The three conditions are always set in this order, so a fresh set ends
/// up as `[Failed, Provisioning, Deployed]`. Returns whether anything
/// changed.
pub fn apply_conditions(
    conditions: &mut ConditionSet,
    error: Option<&Error>,
    ready: i32,
    expected: i32,
    generation: Option<i64>,
) -> bool {
    let mut changed = false;
    match error {
        Some(e) => {
            changed |= conditions.set(new_condition(
                FAILED_CONDITION,
                ConditionStatus::True,
                e.reason(),
                e.to_string(),
                generation,
            ));
            let (status, reason) = if e.is_retryable() {
                (ConditionStatus::True, ProvisioningReason::InProgress)
            } else {
                (ConditionStatus::False, ProvisioningReason::FailedProvisioning)
            };
            changed |= conditions.set(new_condition(
                PROVISIONING_CONDITION,
                status,
                reason,
                "",
                generation,
            ));
            changed |= conditions.set(new_condition(
                DEPLOYED_CONDITION,
                ConditionStatus::from(ready > 0),
                replicas_reason(ready > 0),
                replicas_message(ready, expected),
                generation,
            ));
        }
        None => {
            if conditions.find(FAILED_CONDITION).is_some() {
                changed |= conditions.set_status(FAILED_CONDITION, ConditionStatus::False);
            } else {
                changed |= conditions.set(new_condition(
                    FAILED_CONDITION,
                    ConditionStatus::False,
                    RECONCILED_REASON,
                    "",
                    generation,
                ));
            }
            // a service scaled to zero is fully deployed once nothing is left running
            let (deployed, provisioning, reason) = if ready >= expected {
                (true, false, ProvisioningReason::Finished)
            } else {
                (ready > 0, true, ProvisioningReason::InProgress)
            };
            changed |= conditions.set(new_condition(
                PROVISIONING_CONDITION,
                ConditionStatus::from(provisioning),
                reason,
                "",
                generation,
            ));
            changed |= conditions.set(new_condition(
                DEPLOYED_CONDITION,
                ConditionStatus::from(deployed),
                replicas_reason(deployed),
                replicas_message(ready, expected),
                generation,
            ));
        }
    }
    changed
}

/// Computes the status of a Kogito service and persists it.
pub struct ServiceStatusManager<'a, C> {
    client: &'a C,
}

impl<'a, C: ResourceClient> ServiceStatusManager<'a, C> {
    pub fn new(client: &'a C) -> Self {
        ServiceStatusManager { client }
    }

    /// Status of `service` after a pass that ended with `error`.
    pub fn compute<S: KogitoService>(
        &self,
        service: &S,
        error: Option<&Error>,
        observed: &ObservedState,
    ) -> KogitoServiceStatus {
        let mut status = service.service_status().cloned().unwrap_or_default();
        let expected = service.service_spec().replicas.unwrap_or(1);
        let mut conditions = ConditionSet::new(std::mem::take(&mut status.conditions));
        apply_conditions(
            &mut conditions,
            error,
            observed.ready_replicas(),
            expected,
            service.meta().generation,
        );
        status.conditions = conditions.into_vec();

        if error.is_none() {
            status.image = observed.image.clone();
            status.external_uri = observed.external_uri.clone();
            status.deployment_conditions = observed.deployment_conditions();
            status.config_map_references = observed.config_map_references.clone();
            status.secret_references = observed.secret_references.clone();
        }
        status
    }

    /// Writes the new status when it differs from the current one.
    ///
    /// A failed write is logged and left for the next pass.
    pub async fn update<S: KogitoService>(
        &self,
        service: &S,
        error: Option<&Error>,
        observed: &ObservedState,
    ) -> KogitoServiceStatus {
        let status = self.compute(service, error, observed);
        if service.service_status() == Some(&status) {
            debug!("Status of {} unchanged", service.name_any());
            return status;
        }

        let mut updated = service.clone();
        updated.set_service_status(status.clone());
        match self.client.update_status(&updated).await {
            Ok(()) => info!("Updated status of {}", service.name_any()),
            Err(e) => error!("Failed to update status of {}: {}", service.name_any(), e),
        }
        status
    }
}
