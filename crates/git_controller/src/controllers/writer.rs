use crate::{
    api::Workload,
    util::errors::{Error, Result, StdError},
};
use async_trait::async_trait;
use kube::{
    api::{Api, PostParams},
    client::Client,
    ResourceExt,
};
use std::sync::Arc;
use tracing::info;

/// Persists a mutated workload back to the cluster.
#[async_trait]
pub trait WorkloadWriter: Send + Sync {
    async fn update<K: Workload>(&self, workload: &K) -> Result<()>;
}

#[async_trait]
impl<W: WorkloadWriter + ?Sized> WorkloadWriter for Arc<W> {
    async fn update<K: Workload>(&self, workload: &K) -> Result<()> {
        (**self).update(workload).await
    }
}

/// Replaces the object through the Kubernetes API. A concurrent modification
/// surfaces as a 409 conflict from the API server.
#[derive(Clone)]
pub struct KubeWriter {
    client: Client,
}

impl KubeWriter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WorkloadWriter for KubeWriter {
    async fn update<K: Workload>(&self, workload: &K) -> Result<()> {
        let namespace = workload.namespace().ok_or_else(|| {
            Error::StdError(StdError::MetadataMissing(format!(
                "{} {} has no namespace",
                K::kind_name(),
                workload.name_any()
            )))
        })?;
        let name = workload.name_any();
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);

        info!("Updating {} '{}' in namespace '{}'", K::kind_name(), name, namespace);
        api.replace(&name, &PostParams::default(), workload)
            .await
            .map_err(|e| Error::StdError(StdError::KubeError(e)))?;
        Ok(())
    }
}
