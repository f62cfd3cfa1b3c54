//! MachineConfigPool CRD.
//!
//! This CRD is owned by the machine config operator. Only the fields read or patched by the
//! verifier are modelled here, everything else is ignored during deserialization.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub type MachineConfigPool = MachineConfigPoolCRD; // Mostly to resolve a Rust Analyzer issue.

/// CRD spec for the MachineConfigPool resource.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, CustomResource, JsonSchema)]
#[kube(
    struct = "MachineConfigPoolCRD",
    status = "MachineConfigPoolStatus",
    group = "machineconfiguration.openshift.io",
    version = "v1",
    kind = "MachineConfigPool",
    derive = "PartialEq",
    apiextensions = "v1",
    shortname = "mcp",
    printcolumn = r#"{"name":"Config","type":"string","jsonPath":".status.configuration.name"}"#,
    printcolumn = r#"{"name":"MachineCount","type":"number","jsonPath":".status.machineCount"}"#,
    printcolumn = r#"{"name":"DegradedMachineCount","type":"number","jsonPath":".status.degradedMachineCount"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfigPoolSpec {
    /// The rendered configuration this pool is targeting.
    #[serde(default)]
    pub configuration: Option<PoolConfiguration>,
    /// The label selector used to select member nodes.
    #[serde(default)]
    pub node_selector: Option<PoolNodeSelector>,
    /// The maximum number of member nodes which may be updating at once.
    ///
    /// Defaults to `1` when unset.
    #[serde(default)]
    pub max_unavailable: Option<MaxUnavailable>,
    /// Stops the operator from rolling out configuration changes to this pool.
    #[serde(default)]
    pub paused: bool,
}

/// A reference to a rendered configuration.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
pub struct PoolConfiguration {
    /// The name of the rendered configuration.
    #[serde(default)]
    pub name: Option<String>,
}

/// The subset of a K8s label selector used for selecting pool members.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PoolNodeSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

/// An int-or-string disruption budget, for example `2` or `"25%"`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(untagged)]
pub enum MaxUnavailable {
    /// An absolute number of nodes.
    Int(i32),
    /// A percentage of the pool's member count, like `"25%"`.
    Percent(String),
}

impl MaxUnavailable {
    /// Resolve this budget against the given number of pool members.
    ///
    /// Percentages round down and may not exceed 100%. The result is never less than 1, a pool
    /// must always be able to make progress.
    pub fn resolve(&self, members: usize) -> Result<usize, String> {
        let value = match self {
            Self::Int(val) if *val < 0 => return Err(format!("negative maxUnavailable {}", val)),
            Self::Int(val) => *val as usize,
            Self::Percent(val) => {
                let pct: usize = val
                    .strip_suffix('%')
                    .and_then(|pct| pct.trim().parse().ok())
                    .ok_or_else(|| format!("invalid maxUnavailable percentage {:?}", val))?;
                if pct > 100 {
                    return Err(format!("maxUnavailable percentage {:?} exceeds 100%", val));
                }
                members * pct / 100
            }
        };
        Ok(value.max(1))
    }
}

impl std::fmt::Display for MaxUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(val) => write!(f, "{}", val),
            Self::Percent(val) => write!(f, "{}", val),
        }
    }
}

/// CRD status object.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfigPoolStatus {
    /// The generation observed by the operator.
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// The rendered configuration which has been applied to all members.
    #[serde(default)]
    pub configuration: Option<PoolConfiguration>,
    #[serde(default)]
    pub machine_count: i64,
    #[serde(default)]
    pub updated_machine_count: i64,
    #[serde(default)]
    pub ready_machine_count: i64,
    #[serde(default)]
    pub unavailable_machine_count: i64,
    #[serde(default)]
    pub degraded_machine_count: i64,
    #[serde(default)]
    pub conditions: Vec<PoolCondition>,
}

/// A status condition of a pool.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PoolCondition {
    /// The condition type, `Updated`, `Updating`, `Degraded`, `NodeDegraded` and so on.
    #[serde(rename = "type")]
    pub type_: String,
    /// One of `True`, `False` or `Unknown`.
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub last_transition_time: Option<DateTime<Utc>>,
}
