//! The platform-API secret source for the credential provider
//!: fetches a `Secret` resource and maps its data
//! fields onto [`RawSecret`].

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::Api;
use kube::Client;

use mountpoint_csi_creds::{Error, RawSecret, Result, SecretSource};

const KEY_ACCESS_KEY_ID: &str = "access_key_id";
const KEY_SECRET_ACCESS_KEY: &str = "secret_access_key";
const KEY_SESSION_TOKEN: &str = "session_token";
const KEY_REGION: &str = "region";

/// Fetches credential secrets from the cluster's `Secret` resources.
pub struct KubeSecretSource {
    client: Client,
}

impl KubeSecretSource {
    /// Builds a source reading secrets through `client`.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl SecretSource for KubeSecretSource {
    async fn fetch_secret(&self, namespace: &str, name: &str) -> Result<RawSecret> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api
            .get(name)
            .await
            .map_err(|e| Error::Transient(format!("fetching secret {namespace}/{name}: {e}")))?;
        Ok(raw_secret_from_data(secret.data.unwrap_or_default()))
    }
}

fn raw_secret_from_data(data: BTreeMap<String, ByteString>) -> RawSecret {
    let field = |key: &str| -> Option<String> {
        data.get(key).map(|v| String::from_utf8_lossy(&v.0).into_owned())
    };
    RawSecret {
        access_key_id: field(KEY_ACCESS_KEY_ID),
        secret_access_key: field(KEY_SECRET_ACCESS_KEY),
        session_token: field(KEY_SESSION_TOKEN),
        region: field(KEY_REGION),
    }
}
