//! Suggested start time for a new task (§4.6): gap-fill when possible,
//! otherwise plan ahead.

use crate::clock::Clock;
use crate::models::task::Task;
use crate::time::{extract_time, get_current_time_rounded, time_to_datetime, Instant};

/// Computes the suggested start time against the scheduled task collection.
/// `all` need not be pre-filtered or pre-sorted.
pub fn suggest_start_time(clock: &dyn Clock, all: &[Task]) -> String {
    let rounded_hhmm = get_current_time_rounded(clock);
    let current = time_to_datetime(&rounded_hhmm, clock.now().date_naive())
        .expect("get_current_time_rounded always yields a valid HH:MM");

    let scheduled: Vec<_> = all.iter().filter_map(Task::as_scheduled).collect();
    if scheduled.iter().all(|t| t.header.status != crate::models::task::TaskStatus::Incomplete) {
        return rounded_hhmm;
    }

    if let Some(spanning) = scheduled.iter().find(|t| t.start <= current && current < t.end) {
        return extract_time(spanning.end);
    }

    let current_is_covered = scheduled
        .iter()
        .any(|t| t.header.status == crate::models::task::TaskStatus::Incomplete && t.start <= current && current < t.end);

    let has_earlier_incomplete_work = scheduled
        .iter()
        .any(|t| t.header.status == crate::models::task::TaskStatus::Incomplete && t.end <= current);

    if has_earlier_incomplete_work && !current_is_covered {
        return rounded_hhmm;
    }

    let latest_incomplete_end: Option<Instant> = scheduled
        .iter()
        .filter(|t| t.header.status == crate::models::task::TaskStatus::Incomplete)
        .map(|t| t.end)
        .max();

    match latest_incomplete_end {
        Some(end) => extract_time(end),
        None => rounded_hhmm,
    }
}
