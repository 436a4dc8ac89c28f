use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};

pub const CONDITION_TRUE: &str = "True";
pub const CONDITION_FALSE: &str = "False";

/// Appends `new_condition` or updates the condition of the same type in place.
///
/// The last transition time of an existing condition only moves when its status flips;
/// a newly appended condition is stamped with the current time. Returns whether the list
/// changed.
pub fn set_status_condition(conditions: &mut Vec<Condition>, mut new_condition: Condition) -> bool {
    let Some(existing) = find_status_condition_mut(conditions, &new_condition.type_) else {
        new_condition.last_transition_time = Time(Utc::now());
        conditions.push(new_condition);
        return true;
    };

    let mut changed = false;
    if existing.status != new_condition.status {
        existing.status = new_condition.status;
        existing.last_transition_time = Time(Utc::now());
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

/// Drops the condition of `condition_type`, returning whether one was present.
pub fn remove_status_condition(conditions: &mut Vec<Condition>, condition_type: &str) -> bool {
    let before = conditions.len();
    conditions.retain(|c| c.type_ != condition_type);
    conditions.len() != before
}

pub fn find_status_condition<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == condition_type)
}

pub fn find_status_condition_mut<'a>(
    conditions: &'a mut [Condition],
    condition_type: &str,
) -> Option<&'a mut Condition> {
    conditions.iter_mut().find(|c| c.type_ == condition_type)
}

pub fn is_status_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    find_status_condition(conditions, condition_type).is_some_and(|c| c.status == CONDITION_TRUE)
}

pub fn is_status_condition_false(conditions: &[Condition], condition_type: &str) -> bool {
    find_status_condition(conditions, condition_type).is_some_and(|c| c.status == CONDITION_FALSE)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    use super::*;

    fn condition(type_: &str, status: &str, reason: &str) -> Condition {
        Condition {
            type_: type_.to_string(),
            status: status.to_string(),
            reason: reason.to_string(),
            message: String::new(),
            last_transition_time: Time(Utc::now()),
            observed_generation: Some(1),
        }
    }

    #[test]
    fn appends_missing_condition() {
        let mut conditions = Vec::new();

        assert!(set_status_condition(&mut conditions, condition("Ready", "False", "Provisioning")));
        assert_eq!(conditions.len(), 1);
        assert!(is_status_condition_false(&conditions, "Ready"));
    }

    #[test]
    fn updates_condition_of_same_type_in_place() {
        let mut conditions = vec![
            condition("Ready", "False", "Provisioning"),
            condition("Other", "True", "Whatever"),
        ];

        assert!(set_status_condition(&mut conditions, condition("Ready", "True", "Provisioned")));
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].type_, "Ready");
        assert_eq!(conditions[0].reason, "Provisioned");
        assert!(is_status_condition_true(&conditions, "Ready"));
        assert!(is_status_condition_true(&conditions, "Other"));
    }

    #[test]
    fn identical_condition_is_not_a_change() {
        let mut conditions = vec![condition("Ready", "True", "Provisioned")];
        assert!(!set_status_condition(&mut conditions, condition("Ready", "True", "Provisioned")));
    }

    #[test]
    fn transition_time_only_moves_on_status_flip() {
        let past = Time(Utc::now() - Duration::hours(1));
        let mut conditions = vec![Condition {
            last_transition_time: past.clone(),
            ..condition("Ready", "False", "Provisioning")
        }];

        assert!(set_status_condition(&mut conditions, condition("Ready", "False", "Updating")));
        assert_eq!(conditions[0].last_transition_time, past);

        assert!(set_status_condition(&mut conditions, condition("Ready", "True", "Provisioned")));
        assert!(conditions[0].last_transition_time.0 > past.0);
    }

    #[test]
    fn removes_condition_by_type() {
        let mut conditions = vec![condition("Ready", "True", "Provisioned")];

        assert!(remove_status_condition(&mut conditions, "Ready"));
        assert!(conditions.is_empty());
        assert!(!remove_status_condition(&mut conditions, "Ready"));
        assert!(find_status_condition(&conditions, "Ready").is_none());
    }
}
