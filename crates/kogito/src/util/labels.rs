//! Label, annotation and environment variable names shared by every reconciler.
//!
//! The environment variable names are read by the Kogito application images
//! and must not change.

use std::collections::BTreeMap;

pub const API_GROUP: &str = "app.kiegroup.org";
pub const API_VERSION: &str = "app.kiegroup.org/v1beta1";

pub const APP_LABEL: &str = "app";
pub const SERVICE_LABEL: &str = "app.kiegroup.org/service";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const OPERATOR_NAME: &str = "kogito-operator";
pub const PROTOBUF_LABEL: &str = "app.kiegroup.org/protobuf";
pub const STRIMZI_CLUSTER_LABEL: &str = "strimzi.io/cluster";

pub const CONFIG_HASH_ANNOTATION: &str = "app.kiegroup.org/config-hash";
pub const DISABLE_ROUTE_ANNOTATION: &str = "app.kiegroup.org/disable-route";

pub const APP_PROPERTIES_KEY: &str = "application.properties";
pub const TRUST_STORE_KEY: &str = "cacerts";
pub const TRUST_STORE_PASSWORD_KEY: &str = "keyStorePassword";

pub const SERVICE_URL_ENV: &str = "KOGITO_SERVICE_URL";
pub const DATA_INDEX_HTTP_URL_ENV: &str = "KOGITO_DATAINDEX_HTTP_URL";
pub const DATA_INDEX_WS_URL_ENV: &str = "KOGITO_DATAINDEX_WS_URL";
pub const JOBS_SERVICE_URL_ENV: &str = "KOGITO_JOBS_SERVICE_URL";
pub const TRUSTY_HTTP_URL_ENV: &str = "KOGITO_TRUSTY_HTTP_URL";
pub const TRUSTY_WS_URL_ENV: &str = "KOGITO_TRUSTY_WS_URL";
pub const EXPLAINABILITY_HTTP_URL_ENV: &str = "KOGITO_EXPLAINABILITY_HTTP_URL";
pub const PROTOBUF_FOLDER_ENV: &str = "KOGITO_PROTOBUF_FOLDER";
pub const PROTOBUF_WATCH_ENV: &str = "KOGITO_PROTOBUF_WATCH";
pub const ENABLE_EVENTS_ENV: &str = "ENABLE_EVENTS";
pub const TRUST_STORE_ENV: &str = "CUSTOM_TRUSTSTORE";
pub const TRUST_STORE_PASSWORD_ENV: &str = "CUSTOM_TRUSTSTORE_PASSWORD";

pub const PROTOBUF_FOLDER: &str = "/home/kogito/data/protobufs";
pub const USER_CONFIG_PATH: &str = "/home/kogito/config/user";
pub const APP_PROPS_PATH: &str = "/home/kogito/config/operator";
pub const TRUST_STORE_PATH: &str = "/home/kogito/certs";

/// Labels put on every object owned by the service `name`.
pub fn service_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (APP_LABEL.to_string(), name.to_string()),
        (SERVICE_LABEL.to_string(), name.to_string()),
        (MANAGED_BY_LABEL.to_string(), OPERATOR_NAME.to_string()),
    ])
}

/// Selector matching the pods of the service `name`.
pub fn selector_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), name.to_string())])
}
