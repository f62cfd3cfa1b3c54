//! Pool state model.

use std::collections::BTreeMap;

use crate::crd::{MachineConfigPool, MaxUnavailable, PoolCondition, RequiredMetadata};
use crate::error::{VerifyError, VerifyResult};

/// The pool condition types which the verifier reasons about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConditionType {
    Updated,
    Updating,
    Degraded,
    NodeDegraded,
}

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Updated => "Updated",
            Self::Updating => "Updating",
            Self::Degraded => "Degraded",
            Self::NodeDegraded => "NodeDegraded",
        }
    }
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed, point-in-time view of a MachineConfigPool.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoolState {
    pub name: String,
    /// The rendered configuration declared in the pool's spec.
    pub configured_version: Option<String>,
    /// The rendered configuration reported as applied in the pool's status.
    pub applied_version: Option<String>,
    pub max_unavailable: Option<MaxUnavailable>,
    pub paused: bool,
    pub node_selector: BTreeMap<String, String>,
    pub machine_count: u32,
    pub updated_machine_count: u32,
    pub degraded_machine_count: u32,
    pub conditions: Vec<PoolCondition>,
}

impl PoolState {
    /// Build a typed view of the given pool object.
    ///
    /// A pool which has not yet been given a status by the operator reads as having no members
    /// and no conditions.
    pub fn from_pool(pool: &MachineConfigPool) -> VerifyResult<Self> {
        let name = pool.name().to_string();
        let status = pool.status.clone().unwrap_or_default();
        let count = |field: &str, val: i64| -> VerifyResult<u32> {
            u32::try_from(val).map_err(|_| VerifyError::InvalidField {
                object: format!("machineconfigpool/{}", name),
                field: format!("status.{}", field),
                reason: format!("expected a non-negative count, got {}", val),
            })
        };
        Ok(Self {
            configured_version: pool.spec.configuration.as_ref().and_then(|conf| conf.name.clone()),
            applied_version: status.configuration.as_ref().and_then(|conf| conf.name.clone()),
            max_unavailable: pool.spec.max_unavailable.clone(),
            paused: pool.spec.paused,
            node_selector: pool
                .spec
                .node_selector
                .as_ref()
                .map(|selector| selector.match_labels.clone())
                .unwrap_or_default(),
            machine_count: count("machineCount", status.machine_count)?,
            updated_machine_count: count("updatedMachineCount", status.updated_machine_count)?,
            degraded_machine_count: count("degradedMachineCount", status.degraded_machine_count)?,
            conditions: status.conditions,
            name,
        })
    }

    /// Get the condition of the given type, if reported.
    pub fn condition(&self, kind: ConditionType) -> Option<&PoolCondition> {
        self.conditions.iter().find(|cond| cond.type_ == kind.as_str())
    }

    /// Check if the condition of the given type is reported with the given status.
    ///
    /// A condition which is not reported at all matches neither `true` nor `false`.
    pub fn condition_is(&self, kind: ConditionType, status: bool) -> bool {
        let expected = if status { "True" } else { "False" };
        self.condition(kind).map(|cond| cond.status == expected).unwrap_or(false)
    }

    pub fn is_updated(&self) -> bool {
        self.condition_is(ConditionType::Updated, true)
    }

    pub fn is_updating(&self) -> bool {
        self.condition_is(ConditionType::Updating, true)
    }

    pub fn is_degraded(&self) -> bool {
        self.condition_is(ConditionType::Degraded, true)
    }

    /// True once every member runs the configured version and nothing is degraded.
    pub fn is_converged(&self) -> bool {
        self.is_updated() && self.degraded_machine_count == 0
    }

    /// True if the pool claims to be updated while counting degraded machines.
    pub fn violates_degraded_invariant(&self) -> bool {
        self.degraded_machine_count > 0 && self.is_updated()
    }

    /// The pool's disruption budget resolved against the given member count.
    pub fn resolved_max_unavailable(&self, members: usize) -> VerifyResult<usize> {
        match &self.max_unavailable {
            None => Ok(1),
            Some(budget) => budget.resolve(members).map_err(|reason| VerifyError::InvalidField {
                object: format!("machineconfigpool/{}", self.name),
                field: "spec.maxUnavailable".into(),
                reason,
            }),
        }
    }

    /// Render the pool's node selector as a K8s label selector string.
    pub fn label_selector(&self) -> String {
        self.node_selector
            .iter()
            .map(|(key, val)| format!("{}={}", key, val))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl std::fmt::Display for PoolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pool {} configured={} applied={} machines={} updated={} degraded={}",
            self.name,
            self.configured_version.as_deref().unwrap_or("<none>"),
            self.applied_version.as_deref().unwrap_or("<none>"),
            self.machine_count,
            self.updated_machine_count,
            self.degraded_machine_count,
        )?;
        for cond in self.conditions.iter() {
            write!(f, "\n    {}={}", cond.type_, cond.status)?;
            if let Some(msg) = cond.message.as_deref().filter(|msg| !msg.is_empty()) {
                write!(f, " ({})", msg)?;
            }
        }
        Ok(())
    }
}
