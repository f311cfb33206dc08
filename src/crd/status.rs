//! # Status Conditions
//!
//! Condition schema shared by every reconciled kind, plus the upsert/remove helpers
//! the status patch builder and the dependency loader rely on.

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::store::ClusterObject;

pub const CONDITION_TYPE_READY: &str = "Ready";
pub const CONDITION_TYPE_ERROR: &str = "Error";
pub const CONDITION_TYPE_UPDATING: &str = "Updating";

pub const REASON_READY: &str = "Ready";
pub const REASON_INVALID_DEPENDENCY: &str = "InvalidDependency";
pub const REASON_PROCESSING: &str = "Processing";
pub const REASON_DELETING: &str = "Deleting";

/// Status of a condition (True, False, Unknown)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionStatus::True => f.write_str("True"),
            ConditionStatus::False => f.write_str("False"),
            ConditionStatus::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Condition represents one observation of a reconciled object
///
/// At most one condition per `type` is kept on an object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (Ready, Error, Updating, ...)
    pub r#type: String,
    /// Status of the condition
    pub status: ConditionStatus,
    /// Machine-readable reason in CamelCase
    #[serde(default)]
    pub reason: String,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Generation of the object this condition was computed against
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Last time the status flipped (RFC3339)
    #[serde(default)]
    pub last_transition_time: Option<String>,
}

impl Condition {
    pub fn new(
        condition_type: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            r#type: condition_type.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            observed_generation: None,
            last_transition_time: None,
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

/// Named set of condition types that are mutually exclusive on one object
///
/// Setting a condition exclusively against a group removes every other condition
/// whose type belongs to the group. Types outside the group are never touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionGroup(&'static [&'static str]);

/// Lifecycle conditions: an object is Ready, in Error, or Updating, never two at once
pub const LIFECYCLE: ConditionGroup = ConditionGroup::new(&[
    CONDITION_TYPE_READY,
    CONDITION_TYPE_ERROR,
    CONDITION_TYPE_UPDATING,
]);

impl ConditionGroup {
    pub const fn new(types: &'static [&'static str]) -> Self {
        Self(types)
    }

    pub fn contains(&self, condition_type: &str) -> bool {
        self.0.contains(&condition_type)
    }

    pub fn types(&self) -> &'static [&'static str] {
        self.0
    }
}

/// Objects that carry a status with conditions and an observed generation
pub trait ObjWithConditions: ClusterObject {
    fn conditions(&self) -> &[Condition];

    fn conditions_mut(&mut self) -> &mut Vec<Condition>;

    fn observed_generation(&self) -> Option<i64>;

    fn set_observed_generation(&mut self, generation: Option<i64>);
}

/// Find a condition by type
pub fn find_status_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Upsert a condition by type. Returns true when anything changed.
///
/// `lastTransitionTime` only moves when the status flips.
pub fn set_status_condition(conditions: &mut Vec<Condition>, new_condition: Condition) -> bool {
    let now = || Some(Utc::now().to_rfc3339());

    let Some(idx) = conditions
        .iter()
        .position(|c| c.r#type == new_condition.r#type)
    else {
        let mut condition = new_condition;
        if condition.last_transition_time.is_none() {
            condition.last_transition_time = now();
        }
        conditions.push(condition);
        return true;
    };

    let existing = &mut conditions[idx];
    let mut changed = false;
    if existing.status != new_condition.status {
        existing.status = new_condition.status;
        existing.last_transition_time = new_condition.last_transition_time.or_else(now);
        changed = true;
    }
    if existing.reason != new_condition.reason {
        existing.reason = new_condition.reason;
        changed = true;
    }
    if existing.message != new_condition.message {
        existing.message = new_condition.message;
        changed = true;
    }
    if existing.observed_generation != new_condition.observed_generation {
        existing.observed_generation = new_condition.observed_generation;
        changed = true;
    }
    changed
}

/// Remove a condition by type. Returns true when it was present.
pub fn remove_status_condition(conditions: &mut Vec<Condition>, condition_type: &str) -> bool {
    let before = conditions.len();
    conditions.retain(|c| c.r#type != condition_type);
    before != conditions.len()
}
