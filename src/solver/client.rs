use crate::{
    crds::{Challenge, VirtualService},
    error::Result,
};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::{
    api::{Api, ListParams, Patch, PatchParams},
    Client, ResourceExt,
};

#[cfg(test)]
use mockall::automock;

/// Kubernetes operations the challenge solver depends on
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SolverClient: Send + Sync {
    /// Get a Challenge, `None` if it no longer exists
    async fn get_challenge(&self, namespace: &str, name: &str) -> Result<Option<Challenge>>;

    /// List Services in all namespaces matching a label selector
    async fn list_services(&self, label_selector: &str) -> Result<Vec<Service>>;

    /// Server-side apply a VirtualService, taking ownership of conflicting fields
    async fn apply_virtual_service(
        &self,
        virtual_service: &VirtualService,
        field_manager: &str,
    ) -> Result<VirtualService>;
}

pub struct KubeSolverClient {
    client: Client,
}

impl KubeSolverClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SolverClient for KubeSolverClient {
    async fn get_challenge(&self, namespace: &str, name: &str) -> Result<Option<Challenge>> {
        let api: Api<Challenge> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn list_services(&self, label_selector: &str) -> Result<Vec<Service>> {
        let api: Api<Service> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default().labels(label_selector))
            .await?;
        Ok(list.items)
    }

    async fn apply_virtual_service(
        &self,
        virtual_service: &VirtualService,
        field_manager: &str,
    ) -> Result<VirtualService> {
        let namespace = virtual_service.namespace().unwrap_or_default();
        let api: Api<VirtualService> = Api::namespaced(self.client.clone(), &namespace);

        let applied = api
            .patch(
                &virtual_service.name_any(),
                &PatchParams::apply(field_manager).force(),
                &Patch::Apply(virtual_service),
            )
            .await?;
        Ok(applied)
    }
}
