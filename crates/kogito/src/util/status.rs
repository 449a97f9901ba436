use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConditionStatus::True => write!(f, "True"),
            ConditionStatus::False => write!(f, "False"),
            ConditionStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Builds a condition stamped with the current time.
pub fn new_condition(
    condition_type: &str,
    status: ConditionStatus,
    reason: impl ToString,
    message: impl Into<String>,
    observed_generation: Option<i64>,
) -> Condition {
    Condition {
        type_: condition_type.to_string(),
        status: status.to_string(),
        reason: reason.to_string(),
        message: message.into(),
        last_transition_time: Time(Utc::now()),
        observed_generation,
    }
}

/// Ordered set of conditions holding at most one condition per type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionSet {
    conditions: Vec<Condition>,
}

impl ConditionSet {
    pub fn new(conditions: Vec<Condition>) -> Self {
        let mut set = ConditionSet::default();
        for condition in conditions {
            set.set(condition);
        }
        set
    }

    /// Sets `new_condition` and reports whether anything changed.
    ///
    /// An existing condition of the same type is updated where it stands;
    /// its `lastTransitionTime` only moves when the status flips. A new type
    /// is appended.
    pub fn set(&mut self, mut new_condition: Condition) -> bool {
        let Some(index) = self
            .conditions
            .iter()
            .position(|c| c.type_ == new_condition.type_)
        else {
            self.conditions.push(new_condition);
            return true;
        };

        let existing = &mut self.conditions[index];
        let mut changed = false;
        if existing.status != new_condition.status {
            existing.status = std::mem::take(&mut new_condition.status);
            existing.last_transition_time = new_condition.last_transition_time;
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

    /// Flips the status of an existing condition, keeping reason and message.
    pub fn set_status(&mut self, condition_type: &str, status: ConditionStatus) -> bool {
        match self.find_mut(condition_type) {
            Some(existing) if existing.status != status.to_string() => {
                existing.status = status.to_string();
                existing.last_transition_time = Time(Utc::now());
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, condition_type: &str) -> bool {
        let before = self.conditions.len();
        self.conditions.retain(|c| c.type_ != condition_type);
        before != self.conditions.len()
    }

    pub fn find(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == condition_type)
    }

    fn find_mut(&mut self, condition_type: &str) -> Option<&mut Condition> {
        self.conditions.iter_mut().find(|c| c.type_ == condition_type)
    }

    pub fn is_true(&self, condition_type: &str) -> bool {
        self.has_status(condition_type, ConditionStatus::True)
    }

    pub fn is_false(&self, condition_type: &str) -> bool {
        self.has_status(condition_type, ConditionStatus::False)
    }

    pub fn has_status(&self, condition_type: &str, status: ConditionStatus) -> bool {
        self.find(condition_type)
            .is_some_and(|c| c.status == status.to_string())
    }

    pub fn types(&self) -> Vec<&str> {
        self.conditions.iter().map(|c| c.type_.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn as_slice(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn into_vec(self) -> Vec<Condition> {
        self.conditions
    }
}
