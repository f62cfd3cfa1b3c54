//! Custom resources observed by the verifier.
//!
//! References:
//! - https://kubernetes.io/docs/tasks/extend-kubernetes/custom-resources/custom-resource-definitions/
//! - https://docs.openshift.com/container-platform/latest/rest_api/machine_apis/machineconfigpool-machineconfiguration-openshift-io-v1.html

mod pool;

use k8s_openapi::api::core::v1::Node;
use kube::Resource;

pub use pool::{
    MachineConfigPool, MachineConfigPoolSpec, MachineConfigPoolStatus, MaxUnavailable, PoolCondition, PoolConfiguration, PoolNodeSelector,
};

/// A convenience trait built around the fact that all implementors
/// must have the following attributes.
pub trait RequiredMetadata {
    /// The name of this object.
    fn name(&self) -> &str;
}

impl RequiredMetadata for MachineConfigPool {
    fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }
}

impl RequiredMetadata for Node {
    fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }
}
