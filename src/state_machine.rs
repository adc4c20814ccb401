//! One operation per user-facing verb (§4.5). Every operation returns a
//! two-phase result: `Success`, `Failure{reason}`, or `NeedsConfirm` carrying
//! a self-contained payload the caller hands back verbatim to the matching
//! `confirm_*` call.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::engine::plan::{PlanConflict, PlanValidation, ShiftEntry};
use crate::engine::{self, generate_locked_conflict_message};
use crate::error::AppResult;
use crate::models::task::{
    Priority, ScheduledTask, Task, TaskHeader, TaskInput, TaskStatus, UnscheduledTask,
};
use crate::store::{PersistenceStore, TaskStore};
use crate::time::{calculate_end_datetime, time_to_datetime, Instant};
use crate::validators::validate_task_input;

/// The payload a caller must return verbatim to the matching `confirm_*` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Confirmation {
    RescheduleOverlapsUnlockedOthers { adjusted: Task },
    RescheduleNeedsShiftDueToLocked { adjusted: Task },
    RescheduleUpdate { task: Task, index: usize },
    CompleteLate { index: usize, new_end: Instant, new_duration: i64 },
    TruncateCompletedTask { completed_id: String },
    Delete { index: usize },
    DeleteAll { scope: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status")]
pub enum OperationResult {
    Success { task: Option<Task>, message: Option<String> },
    Failure { reason: String },
    NeedsConfirm(Confirmation),
}

impl OperationResult {
    fn success(task: Task) -> Self {
        OperationResult::Success {
            task: Some(task),
            message: None,
        }
    }

    fn success_message(message: impl Into<String>) -> Self {
        OperationResult::Success {
            task: None,
            message: Some(message.into()),
        }
    }

    fn failure(reason: impl Into<String>) -> Self {
        OperationResult::Failure { reason: reason.into() }
    }
}

/// Owns the task collection and the clock used to resolve "now" (§5, §6).
/// The only component that mutates the store; the engine stays pure.
pub struct TaskMachine<P: PersistenceStore> {
    store: TaskStore<P>,
    clock: Box<dyn Clock>,
}

impl<P: PersistenceStore> TaskMachine<P> {
    pub fn new(store: TaskStore<P>, clock: Box<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &TaskStore<P> {
        &self.store
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    fn materialize_scheduled(&self, input: &TaskInput, date: NaiveDate, id: String) -> AppResult<ScheduledTask> {
        let start = time_to_datetime(input.start_time.as_deref().unwrap_or_default(), date)?;
        let duration = input.duration.unwrap_or(0);
        let end = calculate_end_datetime(start, duration);
        Ok(ScheduledTask {
            header: TaskHeader::new(id, input.description.clone()),
            start,
            end,
            duration,
            locked: input.locked.unwrap_or(false),
        })
    }

    fn materialize_unscheduled(&self, input: &TaskInput, id: String, rank: i64) -> UnscheduledTask {
        let priority = input
            .priority
            .as_deref()
            .and_then(Priority::parse)
            .unwrap_or_default();
        UnscheduledTask {
            header: TaskHeader::new(id, input.description.clone()),
            priority,
            est_duration: input.est_duration,
            rank,
        }
    }

    /// Checks whether `candidate` would overlap a completed task that started
    /// strictly earlier (§4.5 step 3, §9 open question): only a genuine
    /// mid-insertion into the earlier completed range asks for truncation.
    fn find_truncate_target<'a>(&self, candidate: &ScheduledTask, all: &'a [Task]) -> Option<&'a ScheduledTask> {
        all.iter().filter_map(Task::as_scheduled).find(|t| {
            t.header.status == TaskStatus::Completed
                && candidate.start > t.start
                && engine::tasks_overlap(candidate, t)
        })
    }

    /// Shared add/update placement pipeline (§4.5 steps 2-5). `exclude_id`
    /// masks the task being edited out of the overlap checks.
    fn plan_placement(&self, candidate: ScheduledTask, exclude_id: Option<&str>) -> PlacementOutcome {
        let all: Vec<Task> = self
            .store
            .get_state()
            .iter()
            .filter(|t| exclude_id != Some(t.id()))
            .cloned()
            .collect();

        if let Some(completed) = self.find_truncate_target(&candidate, &all) {
            return PlacementOutcome::NeedsTruncateConfirm(completed.header.id.clone(), candidate);
        }

        let adjusted = engine::adjust_for_locked(&candidate, &all);

        let conflicts = engine::check_overlap(&adjusted, &all);
        let (locked_conflicts, unlocked_conflicts): (Vec<_>, Vec<_>) =
            conflicts.into_iter().partition(|t| t.locked);

        // A single push past the nearest locked task can still land on a start
        // that runs into a *further* locked task (§8 scenario S4); that's not
        // a shift to confirm, it's an infeasible placement to report.
        if !locked_conflicts.is_empty() {
            let shift = ShiftEntry {
                task_id: adjusted.header.id.clone(),
                original_start: candidate.start,
                original_end: candidate.end,
                new_start: adjusted.start,
                new_end: adjusted.end,
            };
            let locked_tasks: Vec<ScheduledTask> = locked_conflicts.iter().map(|t| (*t).clone()).collect();
            let conflicts = locked_tasks
                .iter()
                .map(|locked_task| PlanConflict {
                    shift: shift.clone(),
                    locked_task: locked_task.clone(),
                })
                .collect();
            let validation = PlanValidation::Conflicts { conflicts, locked_tasks };
            let message = generate_locked_conflict_message(&validation, adjusted.duration, self.today());
            return PlacementOutcome::Infeasible(message);
        }

        if adjusted.start != candidate.start {
            return PlacementOutcome::NeedsLockedShiftConfirm(adjusted);
        }

        if unlocked_conflicts.is_empty() {
            return PlacementOutcome::Clear(adjusted);
        }

        let plan = engine::calculate_plan(&adjusted, &all);
        let validation = engine::validate_plan(&plan);
        if validation.is_ok() {
            PlacementOutcome::NeedsOverlapConfirm(adjusted)
        } else {
            let message = generate_locked_conflict_message(&validation, adjusted.duration, self.today());
            PlacementOutcome::Infeasible(message)
        }
    }

    /// **add(task_data)** (§4.5).
    pub fn add(&mut self, input: TaskInput) -> AppResult<OperationResult> {
        let validation = validate_task_input(&input);
        if !validation.valid {
            warn!(target: "taskflow::validation", reason = ?validation.reason, "add rejected");
            return Ok(OperationResult::failure(validation.reason.unwrap_or_default()));
        }

        let id = Uuid::new_v4().to_string();
        if input.task_type.as_deref() == Some("unscheduled") {
            let rank = self.store.get_state().len() as i64;
            let task = Task::Unscheduled(self.materialize_unscheduled(&input, id, rank));
            self.store.update_state(|tasks| tasks.push(task.clone()))?;
            debug!(target: "taskflow::state_machine", task_id = %task.id(), "unscheduled task added");
            return Ok(OperationResult::success(task));
        }

        let candidate = self.materialize_scheduled(&input, self.today(), id)?;
        match self.plan_placement(candidate, None) {
            PlacementOutcome::NeedsTruncateConfirm(completed_id, candidate) => {
                warn!(target: "taskflow::state_machine", %completed_id, "add needs truncate confirmation");
                let _ = candidate;
                Ok(OperationResult::NeedsConfirm(Confirmation::TruncateCompletedTask { completed_id }))
            }
            PlacementOutcome::NeedsLockedShiftConfirm(adjusted) => {
                warn!(target: "taskflow::state_machine", task_id = %adjusted.header.id, "add needs locked-shift confirmation");
                Ok(OperationResult::NeedsConfirm(Confirmation::RescheduleNeedsShiftDueToLocked {
                    adjusted: Task::Scheduled(adjusted),
                }))
            }
            PlacementOutcome::NeedsOverlapConfirm(adjusted) => {
                warn!(target: "taskflow::state_machine", task_id = %adjusted.header.id, "add needs reschedule confirmation");
                Ok(OperationResult::NeedsConfirm(Confirmation::RescheduleOverlapsUnlockedOthers {
                    adjusted: Task::Scheduled(adjusted),
                }))
            }
            PlacementOutcome::Infeasible(message) => Ok(OperationResult::failure(message)),
            PlacementOutcome::Clear(adjusted) => {
                let task = Task::Scheduled(adjusted);
                self.store.update_state(|tasks| tasks.push(task.clone()))?;
                debug!(target: "taskflow::state_machine", task_id = %task.id(), "scheduled task added");
                Ok(OperationResult::success(task))
            }
        }
    }

    /// **confirm_add_and_reschedule(task_object)** (§4.5).
    pub fn confirm_add_and_reschedule(&mut self, task: Task) -> AppResult<OperationResult> {
        let id = task.id().to_string();
        self.store.update_state(|tasks| tasks.push(task.clone()))?;
        self.store.update_state(|tasks| engine::execute(&id, tasks))?;
        let inserted = self
            .store
            .get_state()
            .iter()
            .find(|t| t.id() == id)
            .cloned()
            .expect("just inserted");
        debug!(target: "taskflow::state_machine", task_id = %id, "add confirmed and rescheduled");
        Ok(OperationResult::success(inserted))
    }

    /// **confirm_truncate_and_add(completed_id, task_object)** — the caller's
    /// response to `TruncateCompletedTask`: shorten the completed task then insert.
    pub fn confirm_truncate_and_add(&mut self, completed_id: &str, task: Task) -> AppResult<OperationResult> {
        let new_end = task
            .as_scheduled()
            .map(|t| t.start)
            .ok_or_else(|| crate::error::AppError::validation("Truncation requires a scheduled task."))?;
        self.truncate_completed(completed_id, new_end)?;
        self.store.update_state(|tasks| tasks.push(task.clone()))?;
        debug!(target: "taskflow::state_machine", task_id = %task.id(), %completed_id, "completed task truncated, new task added");
        Ok(OperationResult::success(task))
    }

    /// **update(index, patch)** (§4.5).
    pub fn update(&mut self, index: usize, input: TaskInput) -> AppResult<OperationResult> {
        let validation = validate_task_input(&input);
        if !validation.valid {
            return Ok(OperationResult::failure(validation.reason.unwrap_or_default()));
        }

        let Some(existing) = self.store.get_state().get(index).cloned() else {
            return Ok(OperationResult::failure("Invalid task index."));
        };

        if input.task_type.as_deref() == Some("unscheduled") {
            let rank = existing.as_unscheduled().map(|u| u.rank).unwrap_or(index as i64);
            let task = Task::Unscheduled(self.materialize_unscheduled(&input, existing.id().to_string(), rank));
            self.store.update_state(|tasks| tasks[index] = task.clone())?;
            return Ok(OperationResult::success(task));
        }

        let date = existing
            .as_scheduled()
            .map(|t| t.start.date_naive())
            .unwrap_or_else(|| self.today());
        let candidate = self.materialize_scheduled(&input, date, existing.id().to_string())?;

        match self.plan_placement(candidate, Some(existing.id())) {
            PlacementOutcome::NeedsTruncateConfirm(completed_id, candidate) => {
                let _ = candidate;
                Ok(OperationResult::NeedsConfirm(Confirmation::TruncateCompletedTask { completed_id }))
            }
            PlacementOutcome::NeedsLockedShiftConfirm(adjusted) => {
                Ok(OperationResult::NeedsConfirm(Confirmation::RescheduleNeedsShiftDueToLocked {
                    adjusted: Task::Scheduled(adjusted),
                }))
            }
            PlacementOutcome::NeedsOverlapConfirm(adjusted) => {
                Ok(OperationResult::NeedsConfirm(Confirmation::RescheduleUpdate {
                    task: Task::Scheduled(adjusted),
                    index,
                }))
            }
            PlacementOutcome::Infeasible(message) => Ok(OperationResult::failure(message)),
            PlacementOutcome::Clear(adjusted) => {
                let task = Task::Scheduled(adjusted);
                self.store.update_state(|tasks| tasks[index] = task.clone())?;
                Ok(OperationResult::success(task))
            }
        }
    }

    /// **confirm_update_and_reschedule(index, taskObject)** (§4.5). After
    /// `execute` the collection is re-sorted so `sorted_scheduled()`'s
    /// ordering invariant (§3) holds for the next read.
    pub fn confirm_update_and_reschedule(&mut self, index: usize, task: Task) -> AppResult<OperationResult> {
        let id = task.id().to_string();
        self.store.update_state(|tasks| {
            if index < tasks.len() {
                tasks[index] = task.clone();
            }
        })?;
        self.store.update_state(|tasks| {
            engine::execute(&id, tasks);
            tasks.sort_by_key(|t| t.as_scheduled().map(|s| s.start));
        })?;
        let updated = self
            .store
            .get_state()
            .iter()
            .find(|t| t.id() == id)
            .cloned()
            .expect("just updated");
        Ok(OperationResult::success(updated))
    }

    /// **complete(index, current_time?)** (§4.5).
    pub fn complete(&mut self, index: usize, current_time: Option<Instant>) -> AppResult<OperationResult> {
        let Some(existing) = self.store.get_state().get(index).cloned() else {
            return Ok(OperationResult::failure("Invalid task index."));
        };
        let Some(scheduled) = existing.as_scheduled() else {
            return Ok(OperationResult::failure("Only scheduled tasks can be completed this way."));
        };

        let now = match current_time {
            Some(t) => t,
            None => {
                return self.commit_complete(index, scheduled.end, scheduled.duration);
            }
        };

        if now > scheduled.end {
            let new_duration = crate::time::duration_between(scheduled.start, now);
            warn!(target: "taskflow::state_machine", task_id = %scheduled.header.id, "complete needs late confirmation");
            return Ok(OperationResult::NeedsConfirm(Confirmation::CompleteLate {
                index,
                new_end: now,
                new_duration,
            }));
        }

        let new_end = now.max(scheduled.start);
        let new_duration = crate::time::duration_between(scheduled.start, new_end);
        self.commit_complete(index, new_end, new_duration)
    }

    fn commit_complete(&mut self, index: usize, new_end: Instant, new_duration: i64) -> AppResult<OperationResult> {
        self.store.update_state(|tasks| {
            if let Some(t) = tasks.get_mut(index).and_then(Task::as_scheduled_mut) {
                t.end = new_end;
                t.duration = new_duration;
                t.header.status = TaskStatus::Completed;
            }
        })?;
        let completed = self.store.get_state()[index].clone();
        debug!(target: "taskflow::state_machine", task_id = %completed.id(), "task completed");
        Ok(OperationResult::success(completed))
    }

    /// **confirm_complete_late(index, newEnd, newDuration)** (§4.5).
    pub fn confirm_complete_late(&mut self, index: usize, new_end: Instant, new_duration: i64) -> AppResult<OperationResult> {
        let result = self.commit_complete(index, new_end, new_duration)?;
        let id = self.store.get_state()[index].id().to_string();
        self.store.update_state(|tasks| engine::execute(&id, tasks))?;
        Ok(result)
    }

    /// **adjust_and_complete(id, new_end)** (§4.5).
    pub fn adjust_and_complete(&mut self, id: &str, new_end: Instant) -> AppResult<OperationResult> {
        let Some(index) = self.store.get_state().iter().position(|t| t.id() == id) else {
            return Ok(OperationResult::failure("Task not found"));
        };
        let Some(scheduled) = self.store.get_state()[index].as_scheduled().cloned() else {
            return Ok(OperationResult::failure("Only scheduled tasks can be adjusted."));
        };
        if new_end <= scheduled.start {
            return Ok(OperationResult::failure("New end time must be after the start time."));
        }

        let was_extended = new_end > scheduled.end;
        let new_duration = crate::time::duration_between(scheduled.start, new_end);
        self.store.update_state(|tasks| {
            if let Some(t) = tasks.get_mut(index).and_then(Task::as_scheduled_mut) {
                t.end = new_end;
                t.duration = new_duration;
                t.header.status = TaskStatus::Completed;
            }
        })?;
        Ok(OperationResult::success_message(format!(
            "wasExtended={was_extended} newDuration={new_duration}"
        )))
    }

    /// **truncate_completed(id, new_end)** (§4.5).
    pub fn truncate_completed(&mut self, id: &str, new_end: Instant) -> AppResult<OperationResult> {
        let Some(index) = self.store.get_state().iter().position(|t| t.id() == id) else {
            return Ok(OperationResult::failure("Task not found"));
        };
        let Some(scheduled) = self.store.get_state()[index].as_scheduled().cloned() else {
            return Ok(OperationResult::failure("Only scheduled tasks can be truncated."));
        };
        if scheduled.header.status != TaskStatus::Completed {
            return Ok(OperationResult::failure("Only completed tasks can be truncated."));
        }
        if new_end <= scheduled.start {
            return Ok(OperationResult::failure("New end time must be after the start time."));
        }

        let new_duration = crate::time::duration_between(scheduled.start, new_end);
        self.store.update_state(|tasks| {
            if let Some(t) = tasks.get_mut(index).and_then(Task::as_scheduled_mut) {
                t.end = new_end;
                t.duration = new_duration;
            }
        })?;
        Ok(OperationResult::success(self.store.get_state()[index].clone()))
    }

    /// **delete(index, confirmed)** (§4.5).
    pub fn delete(&mut self, index: usize, confirmed: bool) -> AppResult<OperationResult> {
        if self.store.get_state().get(index).is_none() {
            return Ok(OperationResult::failure("Invalid task index."));
        }

        if !confirmed {
            self.store.update_state(|tasks| {
                tasks[index].header_mut().flags.confirming_delete = true;
            })?;
            return Ok(OperationResult::NeedsConfirm(Confirmation::Delete { index }));
        }

        let removed = self.store.update_state(|tasks| tasks.remove(index))?;
        debug!(target: "taskflow::state_machine", task_id = %removed.id(), "task deleted");
        Ok(OperationResult::success_message("Task deleted."))
    }

    fn delete_where(&mut self, keep: impl Fn(&Task) -> bool) -> AppResult<OperationResult> {
        let before = self.store.get_state().len();
        let remaining: Vec<Task> = self.store.get_state().iter().filter(|t| keep(t)).cloned().collect();
        let deleted = before - remaining.len();
        self.store.replace_all(remaining)?;
        Ok(OperationResult::success_message(format!("tasksDeleted={deleted}")))
    }

    /// **deleteAll(confirmed)** (§4.5): mirrors `delete`'s two-phase protocol —
    /// an unconfirmed call destroys nothing and asks the caller to resubmit
    /// with `confirmed = true`.
    pub fn delete_all(&mut self, confirmed: bool) -> AppResult<OperationResult> {
        if !confirmed {
            return Ok(OperationResult::NeedsConfirm(Confirmation::DeleteAll {
                scope: "all".to_string(),
            }));
        }
        self.delete_where(|_| false)
    }

    pub fn delete_all_scheduled(&mut self, confirmed: bool) -> AppResult<OperationResult> {
        if !confirmed {
            return Ok(OperationResult::NeedsConfirm(Confirmation::DeleteAll {
                scope: "scheduled".to_string(),
            }));
        }
        self.delete_where(|t| !matches!(t, Task::Scheduled(_)))
    }

    pub fn delete_completed(&mut self, confirmed: bool) -> AppResult<OperationResult> {
        if !confirmed {
            return Ok(OperationResult::NeedsConfirm(Confirmation::DeleteAll {
                scope: "completed".to_string(),
            }));
        }
        self.delete_where(|t| t.status() != TaskStatus::Completed)
    }

    /// **edit(index)** (§4.5): flips the editing flag and clears any pending delete confirmation.
    pub fn edit(&mut self, index: usize) -> AppResult<OperationResult> {
        if self.store.get_state().get(index).is_none() {
            return Ok(OperationResult::failure("Invalid task index."));
        }
        self.store.update_state(|tasks| {
            let flags = &mut tasks[index].header_mut().flags;
            flags.editing = true;
            flags.confirming_delete = false;
        })?;
        Ok(OperationResult::success_message("Editing started."))
    }

    /// **cancel_edit(index)** (§4.5).
    pub fn cancel_edit(&mut self, index: usize) -> AppResult<OperationResult> {
        if self.store.get_state().get(index).is_none() {
            return Ok(OperationResult::failure("Invalid task index."));
        }
        self.store.update_state(|tasks| {
            tasks[index].header_mut().flags.editing = false;
        })?;
        Ok(OperationResult::success_message("Editing cancelled."))
    }

    /// **reset_all_*_flags()** (§4.5): clears every transient flag globally;
    /// returns whether anything actually changed so callers can skip a re-render.
    pub fn reset_all_flags(&mut self) -> AppResult<bool> {
        self.store.update_state(|tasks| {
            let mut changed = false;
            for task in tasks.iter_mut() {
                let flags = &mut task.header_mut().flags;
                if flags.editing || flags.confirming_delete || flags.is_editing_inline {
                    changed = true;
                }
                flags.editing = false;
                flags.confirming_delete = false;
                flags.is_editing_inline = false;
            }
            changed
        })
    }

    /// **unschedule(id)** (§4.5): converts a scheduled task to unscheduled, preserving duration as `est_duration`.
    pub fn unschedule(&mut self, id: &str) -> AppResult<OperationResult> {
        let Some(index) = self.store.get_state().iter().position(|t| t.id() == id) else {
            return Ok(OperationResult::failure("Task not found"));
        };
        let Some(scheduled) = self.store.get_state()[index].as_scheduled().cloned() else {
            return Ok(OperationResult::failure("Task is already unscheduled."));
        };

        let rank = self.store.get_state().len() as i64;
        let unscheduled = Task::Unscheduled(UnscheduledTask {
            header: scheduled.header.clone(),
            priority: Priority::default(),
            est_duration: Some(scheduled.duration),
            rank,
        });

        self.store.update_state(|tasks| tasks[index] = unscheduled.clone())?;
        Ok(OperationResult::success(unscheduled))
    }

    /// **toggle_lock(id)** (§4.5).
    pub fn toggle_lock(&mut self, id: &str) -> AppResult<OperationResult> {
        let Some(index) = self.store.get_state().iter().position(|t| t.id() == id) else {
            return Ok(OperationResult::failure("Task not found"));
        };
        if self.store.get_state()[index].as_scheduled().is_none() {
            return Ok(OperationResult::failure("Only scheduled tasks can be locked."));
        }
        self.store.update_state(|tasks| {
            if let Some(t) = tasks.get_mut(index).and_then(Task::as_scheduled_mut) {
                t.locked = !t.locked;
            }
        })?;
        Ok(OperationResult::success(self.store.get_state()[index].clone()))
    }

    /// **toggle_complete_unscheduled(id)** (§4.5).
    pub fn toggle_complete_unscheduled(&mut self, id: &str) -> AppResult<OperationResult> {
        let Some(index) = self.store.get_state().iter().position(|t| t.id() == id) else {
            return Ok(OperationResult::failure("Task not found"));
        };
        if self.store.get_state()[index].as_unscheduled().is_none() {
            return Ok(OperationResult::failure("Task is not unscheduled."));
        }
        self.store.update_state(|tasks| {
            let header = tasks[index].header_mut();
            header.status = match header.status {
                TaskStatus::Incomplete => TaskStatus::Completed,
                TaskStatus::Completed => TaskStatus::Incomplete,
            };
        })?;
        Ok(OperationResult::success(self.store.get_state()[index].clone()))
    }
}

enum PlacementOutcome {
    Clear(ScheduledTask),
    NeedsTruncateConfirm(String, ScheduledTask),
    NeedsLockedShiftConfirm(ScheduledTask),
    NeedsOverlapConfirm(ScheduledTask),
    Infeasible(String),
}
