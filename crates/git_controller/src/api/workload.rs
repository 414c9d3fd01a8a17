use k8s_openapi::{
    api::{
        apps::v1::Deployment,
        core::v1::{PodSpec, ReplicationController},
    },
    NamespaceResourceScope,
};
use kube::Resource;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

/// A namespaced object owning a pod template whose git volumes can be reconciled.
///
/// The reconciler only ever touches a workload through this capability set, so
/// every supported kind runs through the same routine.
pub trait Workload:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Pod specification of the template, if the object carries one
    fn pod_spec(&self) -> Option<&PodSpec>;

    /// Replace the pod specification of the template, creating the template if needed
    fn set_pod_spec(&mut self, pod_spec: PodSpec);

    /// Whether a mutated object of this kind can be written back to the cluster
    fn supports_update() -> bool;

    fn kind_name() -> String {
        Self::kind(&()).to_string()
    }
}

impl Workload for Deployment {
    fn pod_spec(&self) -> Option<&PodSpec> {
        self.spec.as_ref().and_then(|spec| spec.template.spec.as_ref())
    }

    fn set_pod_spec(&mut self, pod_spec: PodSpec) {
        self.spec.get_or_insert_with(Default::default).template.spec = Some(pod_spec);
    }

    fn supports_update() -> bool {
        true
    }
}

impl Workload for ReplicationController {
    fn pod_spec(&self) -> Option<&PodSpec> {
        self.spec
            .as_ref()
            .and_then(|spec| spec.template.as_ref())
            .and_then(|template| template.spec.as_ref())
    }

    fn set_pod_spec(&mut self, pod_spec: PodSpec) {
        self.spec
            .get_or_insert_with(Default::default)
            .template
            .get_or_insert_with(Default::default)
            .spec = Some(pod_spec);
    }

    // TODO: write ReplicationControllers back once rolling them is handled
    fn supports_update() -> bool {
        false
    }
}
