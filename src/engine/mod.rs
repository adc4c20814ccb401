//! The reschedule engine (§4.4). Every function except `execute` is pure:
//! inputs are the trigger and the collection, output is a plan. Plan
//! application is a separate step owned by the task-state machine (§9).

pub mod plan;

use chrono::NaiveDate;
use tracing::warn;

use crate::models::task::{ScheduledTask, Task, TaskStatus};
use crate::time::{calculate_end_datetime, format_12h, Instant};

use plan::{Gap, Plan, PlanConflict, PlanValidation, ShiftEntry};

/// `tasks_overlap(A, B)` — half-open interval overlap (§4.4.1).
/// `tasks_overlap(A, A)` is true only when `A` has non-zero duration;
/// adjacent tasks (one's end == the other's start) never overlap (§8, inv. 5).
pub fn tasks_overlap(a: &ScheduledTask, b: &ScheduledTask) -> bool {
    a.start < b.end && a.end > b.start
}

fn range_overlaps(start: Instant, end: Instant, range_start: Instant, range_end: Instant) -> bool {
    start < range_end && end > range_start
}

/// All scheduled tasks that overlap `candidate`, excluding `candidate` itself
/// (by id), completed tasks, and editing tasks (§4.4.2). Ordered by start.
pub fn check_overlap<'a>(candidate: &ScheduledTask, others: &'a [Task]) -> Vec<&'a ScheduledTask> {
    let mut conflicts: Vec<&ScheduledTask> = others
        .iter()
        .filter_map(Task::as_scheduled)
        .filter(|t| {
            t.header.id != candidate.header.id
                && t.header.status != TaskStatus::Completed
                && !t.header.flags.editing
                && tasks_overlap(candidate, t)
        })
        .collect();
    conflicts.sort_by_key(|t| t.start);
    conflicts
}

fn incomplete_locked_sorted(all: &[Task]) -> Vec<&ScheduledTask> {
    let mut locked: Vec<&ScheduledTask> = all
        .iter()
        .filter_map(Task::as_scheduled)
        .filter(|t| t.locked && t.header.status == TaskStatus::Incomplete)
        .collect();
    locked.sort_by_key(|t| t.start);
    locked
}

/// Pushes `candidate`'s start past the incomplete-locked task whose range
/// covers it, one locked task at a time (§4.4.3). This only resolves a
/// *stacked* run of locked tasks (each newly covering the pushed-to start);
/// a locked task the pushed candidate's duration merely runs into, without
/// its start falling inside that task's range, is left for the caller's
/// overlap check rather than hopped past here - see scenario S4 (§8), where
/// pushing past `L1` lands on a start that still runs into `L2` and that
/// residual conflict must surface as infeasible, not be silently absorbed.
/// Bound at `2 * |locked|` iterations; on overshoot, returns the original
/// candidate unchanged (data-quality defense).
pub fn adjust_for_locked(candidate: &ScheduledTask, all: &[Task]) -> ScheduledTask {
    let locked = incomplete_locked_sorted(all);
    let max_iters = 2 * locked.len();
    let mut adjusted = candidate.clone();
    let mut iters = 0usize;

    loop {
        let blocking = locked.iter().find(|l| l.start <= adjusted.start && adjusted.start < l.end);
        let Some(blocking) = blocking else {
            return adjusted;
        };
        iters += 1;
        if iters > max_iters {
            warn!(
                target: "taskflow::engine",
                task_id = %candidate.header.id,
                "adjust_for_locked exceeded defensive iteration bound, returning original placement"
            );
            return candidate.clone();
        }
        adjusted.start = blocking.end;
        adjusted.end = calculate_end_datetime(adjusted.start, adjusted.duration);
    }
}

fn find_next_available_start(push_point: Instant, duration: i64, locked: &[&ScheduledTask]) -> Instant {
    let max_iters = locked.len() + 1;
    let mut start = push_point;

    for _ in 0..max_iters {
        let end = calculate_end_datetime(start, duration);
        let blocking = locked
            .iter()
            .find(|l| range_overlaps(start, end, l.start, l.end));
        match blocking {
            Some(l) => start = l.end,
            None => return start,
        }
    }

    warn!(
        target: "taskflow::engine",
        "find_next_available_start exceeded defensive iteration bound"
    );
    start
}

/// Computes the cascading flow-around push plan for `trigger` (§4.4.4).
pub fn calculate_plan(trigger: &ScheduledTask, others: &[Task]) -> Plan {
    let locked = incomplete_locked_sorted(others);

    let mut effective_end = trigger.end;
    for l in &locked {
        if tasks_overlap(trigger, l) {
            effective_end = effective_end.max(l.end);
        }
    }

    let mut candidates: Vec<&ScheduledTask> = others
        .iter()
        .filter_map(Task::as_scheduled)
        .filter(|t| {
            t.header.id != trigger.header.id
                && t.header.status != TaskStatus::Completed
                && !t.header.flags.editing
                && !t.locked
                && (t.start >= trigger.start
                    || range_overlaps(t.start, t.end, trigger.start, effective_end))
        })
        .collect();
    candidates.sort_by_key(|t| t.start);

    let mut push_point = effective_end;
    let mut tasks_to_shift = Vec::new();
    let mut shifted_task_plan = Vec::new();

    for candidate in candidates.drain(..) {
        if candidate.start < push_point {
            let new_start = find_next_available_start(push_point, candidate.duration, &locked);
            let new_end = calculate_end_datetime(new_start, candidate.duration);
            tasks_to_shift.push(candidate.header.id.clone());
            shifted_task_plan.push(ShiftEntry {
                task_id: candidate.header.id.clone(),
                original_start: candidate.start,
                original_end: candidate.end,
                new_start,
                new_end,
            });
            push_point = new_end;
        } else if candidate.end > push_point {
            push_point = candidate.end;
        }
    }

    Plan {
        effective_end,
        tasks_to_shift,
        shifted_task_plan,
        locked_tasks: locked.into_iter().cloned().collect(),
    }
}

/// Defense-in-depth check that no shifted task's new range overlaps a locked
/// task (§4.4.5). Under the flow-around push of `calculate_plan` this should
/// never fire; it exists as a contract for callers assembling plans by other means.
pub fn validate_plan(plan: &Plan) -> PlanValidation {
    let mut conflicts = Vec::new();
    for shift in &plan.shifted_task_plan {
        for locked_task in &plan.locked_tasks {
            if range_overlaps(
                shift.new_start,
                shift.new_end,
                locked_task.start,
                locked_task.end,
            ) {
                conflicts.push(PlanConflict {
                    shift: shift.clone(),
                    locked_task: locked_task.clone(),
                });
            }
        }
    }

    if conflicts.is_empty() {
        PlanValidation::Ok
    } else {
        PlanValidation::Conflicts {
            conflicts,
            locked_tasks: plan.locked_tasks.clone(),
        }
    }
}

/// Maximal gaps between locked tasks on `date`'s timeline that fit
/// `required_duration` minutes (§4.4.6).
pub fn find_gaps(locked: &[ScheduledTask], required_duration: i64, date: NaiveDate) -> Vec<Gap> {
    let mut sorted: Vec<&ScheduledTask> = locked.iter().collect();
    sorted.sort_by_key(|t| t.start);

    let day_start = crate::time::time_to_datetime("00:00", date).expect("00:00 always parses");
    let day_end = crate::time::time_to_datetime("23:59", date).expect("23:59 always parses");

    let mut bounds = Vec::with_capacity(sorted.len() * 2 + 2);
    bounds.push(day_start);
    for t in &sorted {
        bounds.push(t.start);
        bounds.push(t.end);
    }
    bounds.push(day_end);

    let mut gaps = Vec::new();
    let mut chunks = bounds.chunks_exact(2);
    for pair in &mut chunks {
        let (start, end) = (pair[0], pair[1]);
        if end > start {
            let gap = Gap { start, end };
            if gap.duration_minutes() >= required_duration {
                gaps.push(gap);
            }
        }
    }
    gaps
}

/// Recomputes the plan against `all` minus `trigger`, then applies every
/// `new_start`/`new_end` to the matching task in place (§4.4.7). `trigger`'s
/// own `editing` flag is cleared for the computation then restored, so the
/// trigger itself is visible to `check_overlap` for downstream callers.
pub fn execute(trigger_id: &str, all: &mut Vec<Task>) -> Option<Plan> {
    let trigger_idx = all.iter().position(|t| t.id() == trigger_id)?;
    let was_editing = all[trigger_idx].is_editing();
    all[trigger_idx].header_mut().flags.editing = false;

    let trigger = all[trigger_idx].as_scheduled()?.clone();
    let others: Vec<Task> = all
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != trigger_idx)
        .map(|(_, t)| t.clone())
        .collect();

    let plan = calculate_plan(&trigger, &others);

    for shift in &plan.shifted_task_plan {
        if let Some(task) = all.iter_mut().find(|t| t.id() == shift.task_id) {
            if let Some(scheduled) = task.as_scheduled_mut() {
                scheduled.start = shift.new_start;
                scheduled.end = shift.new_end;
            }
        }
    }

    all[trigger_idx].header_mut().flags.editing = was_editing;
    Some(plan)
}

/// Composes the bit-stable conflict diagnostic of §4.4.8 / §6.
pub fn generate_locked_conflict_message(
    validation: &PlanValidation,
    new_task_duration: i64,
    date: NaiveDate,
) -> String {
    let PlanValidation::Conflicts {
        conflicts,
        locked_tasks,
    } = validation
    else {
        return String::new();
    };

    let mut conflicting_ids: Vec<&str> = conflicts
        .iter()
        .map(|c| c.locked_task.header.id.as_str())
        .collect();
    conflicting_ids.sort();
    conflicting_ids.dedup();

    let mut lines = vec![
        "Can't fit this task - rescheduling would create conflicts with locked tasks:".to_string(),
        String::new(),
    ];

    for id in &conflicting_ids {
        let locked_task = conflicts
            .iter()
            .map(|c| &c.locked_task)
            .find(|t| t.header.id == *id)
            .expect("conflicting_ids drawn from conflicts");
        lines.push(format!(
            "  • {} (locked) at {} - {}",
            locked_task.header.description,
            format_12h(locked_task.start),
            format_12h(locked_task.end),
        ));
    }

    lines.push(String::new());

    let gaps = find_gaps(locked_tasks, new_task_duration, date);
    if gaps.is_empty() {
        lines.push("No gaps large enough to fit this task.".to_string());
    } else {
        lines.push("Available time slots:".to_string());
        for gap in &gaps {
            lines.push(format!(
                "  • {} - {} ({} min available)",
                format_12h(gap.start),
                format_12h(gap.end),
                gap.duration_minutes(),
            ));
        }
    }

    lines.push(String::new());
    lines.push("To add this task:".to_string());
    lines.push("  1. Unlock one of the conflicting tasks, OR".to_string());
    lines.push("  2. Choose a time in an available slot, OR".to_string());
    lines.push("  3. Delete tasks to make space".to_string());

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{TaskHeader, TaskStatus};
    use crate::time::time_to_datetime;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, 28).unwrap()
    }

    fn scheduled(id: &str, desc: &str, start_hm: &str, dur: i64, locked: bool) -> Task {
        let start = time_to_datetime(start_hm, date()).unwrap();
        let end = calculate_end_datetime(start, dur);
        Task::Scheduled(ScheduledTask {
            header: TaskHeader::new(id.to_string(), desc.to_string()),
            start,
            end,
            duration: dur,
            locked,
        })
    }

    #[test]
    fn overlap_is_half_open() {
        let a = scheduled("a", "A", "09:00", 60, false);
        let b = scheduled("b", "B", "10:00", 60, false);
        let (a, b) = (a.as_scheduled().unwrap(), b.as_scheduled().unwrap());
        assert!(!tasks_overlap(a, b));
    }

    #[test]
    fn zero_duration_never_overlaps() {
        let a = scheduled("a", "A", "09:00", 0, false);
        let a = a.as_scheduled().unwrap();
        assert!(!tasks_overlap(a, a));
    }

    #[test]
    fn scenario_s2_cascade() {
        let a = scheduled("a", "A", "09:00", 60, false);
        let b = scheduled("b", "B", "09:30", 30, false);
        let c = scheduled("c", "C", "09:45", 30, false);
        let mut all = vec![a, b, c];
        let plan = execute("a", &mut all).unwrap();
        assert_eq!(plan.tasks_to_shift, vec!["b", "c"]);

        let b = all[1].as_scheduled().unwrap();
        assert_eq!(crate::time::extract_time(b.start), "10:00");
        assert_eq!(crate::time::extract_time(b.end), "10:30");
        let c = all[2].as_scheduled().unwrap();
        assert_eq!(crate::time::extract_time(c.start), "10:30");
        assert_eq!(crate::time::extract_time(c.end), "11:00");
    }

    #[test]
    fn scenario_s4_infeasible() {
        let l1 = scheduled("l1", "L1", "10:00", 60, true);
        let l2 = scheduled("l2", "L2", "11:15", 60, true);
        let new_task = scheduled("new", "New", "10:00", 60, false);
        let new_task = new_task.as_scheduled().unwrap().clone();
        let others = vec![l1, l2];

        let plan = calculate_plan(&new_task, &others);
        // calculate_plan itself only shifts *other* candidates, so validate the
        // placement the state machine would actually attempt: push `new_task`
        // forward by adjust_for_locked first, as `add` does.
        let adjusted = adjust_for_locked(&new_task, &others);
        assert_eq!(crate::time::extract_time(adjusted.start), "11:00");

        let plan2 = calculate_plan(&adjusted, &others);
        let validation = validate_plan(&plan2);
        // The adjusted task itself (not a shifted entry) overlaps L2; exercise
        // that overlap through check_overlap, which is what `add` consults.
        let conflicts = check_overlap(&adjusted, &others);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].header.id, "l2");
        let _ = plan;
        let _ = validation;
    }
}
