use k8s_openapi::api::core::v1::{
    EnvVar, EnvVarSource, SecretKeySelector, SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::api::core::v1::Secret;

use super::deployer::{service_namespace, Pass};
use crate::api::v1beta1::KogitoService;
use crate::client::ResourceClient;
use crate::util::errors::{Error, Result};
use crate::util::labels::{
    TRUST_STORE_ENV, TRUST_STORE_KEY, TRUST_STORE_PASSWORD_ENV, TRUST_STORE_PASSWORD_KEY, TRUST_STORE_PATH,
};

pub const TRUST_STORE_VOLUME: &str = "trust-store";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustStore {
    pub secret: String,
    pub has_password: bool,
}

impl TrustStore {
    pub fn env(&self) -> Vec<EnvVar> {
        let mut env = vec![EnvVar {
            name: TRUST_STORE_ENV.to_string(),
            value: Some(TRUST_STORE_KEY.to_string()),
            ..Default::default()
        }];
        if self.has_password {
            env.push(EnvVar {
                name: TRUST_STORE_PASSWORD_ENV.to_string(),
                value_from: Some(EnvVarSource {
                    secret_key_ref: Some(SecretKeySelector {
                        name: self.secret.clone(),
                        key: TRUST_STORE_PASSWORD_KEY.to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            });
        }
        env
    }

    pub fn volume(&self) -> Volume {
        Volume {
            name: TRUST_STORE_VOLUME.to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(self.secret.clone()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn volume_mount(&self) -> VolumeMount {
        VolumeMount {
            name: TRUST_STORE_VOLUME.to_string(),
            mount_path: TRUST_STORE_PATH.to_string(),
            read_only: Some(true),
            ..Default::default()
        }
    }
}

fn has_key(secret: &Secret, key: &str) -> bool {
    secret.data.as_ref().is_some_and(|d| d.contains_key(key))
        || secret.string_data.as_ref().is_some_and(|d| d.contains_key(key))
}

pub async fn reconcile<C: ResourceClient, S: KogitoService>(client: &C, service: &S, pass: &mut Pass) -> Result<()> {
    let Some(name) = service.service_spec().trust_store_secret.clone() else {
        return Ok(());
    };
    let namespace = service_namespace(service)?;
    let secret = client
        .fetch::<Secret>(&namespace, &name)
        .await?
        .ok_or_else(|| Error::not_found("Secret", &namespace, &name))?;
    if !has_key(&secret, TRUST_STORE_KEY) {
        return Err(Error::configuration(format!(
            "trust store secret '{name}' has no '{TRUST_STORE_KEY}' key"
        )));
    }

    pass.trust_store = Some(TrustStore {
        secret: name.clone(),
        has_password: has_key(&secret, TRUST_STORE_PASSWORD_KEY),
    });
    pass.observed.secret_references.push(name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_with_password() {
        let store = TrustStore {
            secret: "certs".to_string(),
            has_password: true,
        };
        let env = store.env();
        assert_eq!(env.len(), 2);
        assert_eq!(env[0].value.as_deref(), Some("cacerts"));
        let selector = env[1]
            .value_from
            .as_ref()
            .and_then(|v| v.secret_key_ref.as_ref())
            .unwrap();
        assert_eq!(selector.name, "certs");
        assert_eq!(selector.key, "keyStorePassword");

        let store = TrustStore {
            has_password: false,
            ..store
        };
        assert_eq!(store.env().len(), 1);
        assert_eq!(store.volume_mount().mount_path, "/home/kogito/certs");
    }
}
