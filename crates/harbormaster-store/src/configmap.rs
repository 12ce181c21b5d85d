//! ConfigMap-backed state store.
//!
//! All pairs live in the data map of a single namespaced ConfigMap.
//! ConfigMap data keys cannot contain `:`, so logical keys are mapped on
//! the way in (`:` becomes `.`) and back on the way out. Logical keys
//! contain exactly one `:`, directly after a dot-free prefix, which makes
//! the reverse mapping (first `.` becomes `:`) lossless even when package
//! names themselves contain dots.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, ObjectMeta, Patch, PatchParams, PostParams};
use kube::Client;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

use harbormaster_core::store::StateStore;
use harbormaster_core::{Error, Result};

pub struct ConfigMapStore {
    api: Api<ConfigMap>,
    namespace: String,
    name: String,
}

fn encode_key(key: &str) -> String {
    key.replace(':', ".")
}

fn decode_key(key: &str) -> String {
    key.replacen('.', ":", 1)
}

impl ConfigMapStore {
    pub fn new(client: Client, namespace: &str, name: impl Into<String>) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
            name: name.into(),
        }
    }

    async fn fetch(&self) -> Result<Option<ConfigMap>> {
        self.api
            .get_opt(&self.name)
            .await
            .map_err(|e| Error::Store(e.to_string()))
    }

    async fn create_with(&self, key: &str, value: &str) -> Result<()> {
        let config_map = ConfigMap {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(
                encode_key(key),
                value.to_string(),
            )])),
            ..Default::default()
        };
        self.api
            .create(&PostParams::default(), &config_map)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        debug!(name = %self.name, "Created state ConfigMap");
        Ok(())
    }
}

#[async_trait]
impl StateStore for ConfigMapStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let Some(config_map) = self.fetch().await? else {
            return Ok(None);
        };
        Ok(config_map
            .data
            .and_then(|data| data.get(&encode_key(key)).cloned()))
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        if self.fetch().await?.is_none() {
            return self.create_with(key, value).await;
        }
        let patch = json!({ "data": { encode_key(key): value } });
        self.api
            .patch(&self.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.fetch().await?.is_none() {
            return Ok(());
        }
        // A null value in a merge patch removes the key.
        let patch = json!({ "data": { encode_key(key): null } });
        self.api
            .patch(&self.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let Some(config_map) = self.fetch().await? else {
            return Ok(Vec::new());
        };
        let encoded_prefix = encode_key(prefix);
        Ok(config_map
            .data
            .unwrap_or_default()
            .into_iter()
            .filter(|(k, _)| k.starts_with(&encoded_prefix))
            .map(|(k, v)| (decode_key(&k), v))
            .collect())
    }
}
