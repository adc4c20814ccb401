//! Pure predicates on task data and task-object shape (§4.2). Each rule
//! returns a `Validation`; reason strings are part of the external contract
//! (§6, §8) and are reproduced verbatim.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::task::Priority;
use crate::models::TaskInput;

static START_TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01]?\d|2[0-3]):[0-5]\d$").expect("static regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub reason: Option<String>,
}

impl Validation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }

    pub fn into_result(self) -> Result<(), String> {
        if self.valid {
            Ok(())
        } else {
            Err(self.reason.unwrap_or_default())
        }
    }
}

pub fn validate_description(description: &str) -> Validation {
    if description.trim().is_empty() {
        Validation::fail("Task description is required.")
    } else {
        Validation::ok()
    }
}

pub fn validate_task_type(task_type: Option<&str>) -> Validation {
    match task_type {
        Some("scheduled") | Some("unscheduled") => Validation::ok(),
        _ => Validation::fail("Invalid task type."),
    }
}

pub fn validate_scheduled_duration(duration: Option<i64>) -> Validation {
    match duration {
        Some(d) if d >= 0 => Validation::ok(),
        _ => Validation::fail("Duration must be a non-negative number for scheduled tasks."),
    }
}

pub fn validate_scheduled_start_time_present(start_time: Option<&str>) -> Validation {
    match start_time {
        Some(value) if !value.trim().is_empty() => Validation::ok(),
        _ => Validation::fail("Start time is required for scheduled tasks."),
    }
}

pub fn validate_start_time_format(start_time: &str) -> Validation {
    if START_TIME_RE.is_match(start_time) {
        Validation::ok()
    } else {
        Validation::fail("Invalid start time format. Use HH:MM format.")
    }
}

pub fn validate_priority(priority: Option<&str>) -> Validation {
    match priority {
        None => Validation::ok(),
        Some(raw) if Priority::parse(raw).is_some() => Validation::ok(),
        Some(_) => Validation::fail("Invalid priority. Must be high, medium, or low."),
    }
}

pub fn validate_unscheduled_est_duration(est_duration: Option<i64>) -> Validation {
    match est_duration {
        None => Validation::ok(),
        Some(d) if d >= 0 => Validation::ok(),
        Some(_) => Validation::fail(
            "Estimated duration must be a non-negative number for unscheduled tasks.",
        ),
    }
}

pub fn validate_index(index: usize, len: usize) -> Validation {
    if index < len {
        Validation::ok()
    } else {
        Validation::fail("Invalid task index.")
    }
}

/// Full shape validation of a raw `TaskInput` (§4.5 add/update step 1).
pub fn validate_task_input(input: &TaskInput) -> Validation {
    let checks: [Validation; 1] = [validate_description(&input.description)];
    for v in checks {
        if !v.valid {
            return v;
        }
    }

    let task_type = input.task_type.as_deref();
    let type_check = validate_task_type(task_type);
    if !type_check.valid {
        return type_check;
    }

    match task_type {
        Some("scheduled") => {
            let duration_check = validate_scheduled_duration(input.duration);
            if !duration_check.valid {
                return duration_check;
            }
            let present_check = validate_scheduled_start_time_present(input.start_time.as_deref());
            if !present_check.valid {
                return present_check;
            }
            validate_start_time_format(input.start_time.as_deref().unwrap_or_default())
        }
        Some("unscheduled") => {
            let priority_check = validate_priority(input.priority.as_deref());
            if !priority_check.valid {
                return priority_check;
            }
            validate_unscheduled_est_duration(input.est_duration)
        }
        _ => Validation::fail("Invalid task type."),
    }
}
