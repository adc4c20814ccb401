//! Black-box scenario tests (S1-S8) against the full state machine on a
//! `MemoryTaskStore`, the way the reference implementation organizes its own
//! `tests/integration/*.rs`.

use chrono::NaiveDate;

use taskflow_core::clock::FixedClock;
use taskflow_core::models::task::{ScheduledTask, Task, TaskHeader, TaskInput, TaskStatus};
use taskflow_core::state_machine::{Confirmation, OperationResult, TaskMachine};
use taskflow_core::store::{MemoryTaskStore, TaskStore};
use taskflow_core::suggestion::suggest_start_time;
use taskflow_core::time::{calculate_end_datetime, extract_time, time_to_datetime};

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 7, 28).unwrap()
}

fn machine_seeded_at(hm: &str, tasks: Vec<Task>) -> TaskMachine<MemoryTaskStore> {
    let now = time_to_datetime(hm, date()).unwrap();
    let store = TaskStore::load(MemoryTaskStore::seeded(tasks)).unwrap();
    TaskMachine::new(store, Box::new(FixedClock(now)))
}

fn scheduled_task(desc: &str, start_hm: &str, duration: i64, locked: bool, status: TaskStatus) -> Task {
    let start = time_to_datetime(start_hm, date()).unwrap();
    let end = calculate_end_datetime(start, duration);
    Task::Scheduled(ScheduledTask {
        header: TaskHeader {
            id: desc.to_string(),
            description: desc.to_string(),
            status,
            flags: Default::default(),
        },
        start,
        end,
        duration,
        locked,
    })
}

fn scheduled_input(desc: &str, start: &str, duration: i64) -> TaskInput {
    TaskInput {
        description: desc.to_string(),
        task_type: Some("scheduled".to_string()),
        start_time: Some(start.to_string()),
        duration: Some(duration),
        ..Default::default()
    }
}

fn start_time_of(machine: &TaskMachine<MemoryTaskStore>, id: &str) -> String {
    let task = machine.store().get_state().iter().find(|t| t.id() == id).unwrap();
    extract_time(task.as_scheduled().unwrap().start)
}

fn end_time_of(machine: &TaskMachine<MemoryTaskStore>, id: &str) -> String {
    let task = machine.store().get_state().iter().find(|t| t.id() == id).unwrap();
    extract_time(task.as_scheduled().unwrap().end)
}

#[test]
fn s1_simple_shift() {
    let mut machine = machine_seeded_at("08:00", vec![scheduled_task("T1", "09:00", 60, false, TaskStatus::Incomplete)]);

    let result = machine.add(scheduled_input("New", "09:30", 60)).unwrap();
    let OperationResult::NeedsConfirm(Confirmation::RescheduleOverlapsUnlockedOthers { adjusted }) = result else {
        panic!("expected reschedule confirmation, got {result:?}");
    };
    machine.confirm_add_and_reschedule(adjusted).unwrap();

    let new_id = machine
        .store()
        .get_state()
        .iter()
        .find(|t| t.header().description == "New")
        .unwrap()
        .id()
        .to_string();

    assert_eq!(start_time_of(&machine, &new_id), "09:30");
    assert_eq!(end_time_of(&machine, &new_id), "10:30");
    assert_eq!(start_time_of(&machine, "T1"), "10:30");
    assert_eq!(end_time_of(&machine, "T1"), "11:30");
}

#[test]
fn s2_cascade() {
    let machine = machine_seeded_at(
        "08:00",
        vec![
            scheduled_task("A", "09:00", 60, false, TaskStatus::Incomplete),
            scheduled_task("B", "09:30", 30, false, TaskStatus::Incomplete),
            scheduled_task("C", "09:45", 30, false, TaskStatus::Incomplete),
        ],
    );

    // `execute` is exercised directly through the public read-only surface
    // (engine purity, §9): the state machine's own cascade path is covered
    // by its inline unit tests.
    let mut all = machine.store().get_state().to_vec();
    taskflow_core::engine::execute("A", &mut all);

    let b = all.iter().find(|t| t.id() == "B").unwrap().as_scheduled().unwrap();
    let c = all.iter().find(|t| t.id() == "C").unwrap().as_scheduled().unwrap();
    assert_eq!(extract_time(b.start), "10:00");
    assert_eq!(extract_time(b.end), "10:30");
    assert_eq!(extract_time(c.start), "10:30");
    assert_eq!(extract_time(c.end), "11:00");
}

#[test]
fn s3_locked_absorb_complete_late() {
    let mut machine = machine_seeded_at(
        "10:30",
        vec![
            scheduled_task("A", "10:00", 60, false, TaskStatus::Incomplete),
            scheduled_task("Locked", "11:00", 60, true, TaskStatus::Incomplete),
            scheduled_task("B", "12:00", 60, false, TaskStatus::Incomplete),
        ],
    );

    let index = machine.store().get_state().iter().position(|t| t.id() == "A").unwrap();
    let now = time_to_datetime("10:30", date()).unwrap();
    let result = machine.complete(index, Some(now)).unwrap();
    assert!(matches!(result, OperationResult::Success { .. }));

    let a = machine.store().get_state().iter().find(|t| t.id() == "A").unwrap().as_scheduled().unwrap();
    assert_eq!(a.header.status, TaskStatus::Completed);
    assert_eq!(extract_time(a.end), "10:30");

    let b = machine.store().get_state().iter().find(|t| t.id() == "B").unwrap().as_scheduled().unwrap();
    assert_eq!(extract_time(b.start), "12:00");
}

#[test]
fn s4_infeasible_reports_gap() {
    let l1 = scheduled_task("L1", "10:00", 60, true, TaskStatus::Incomplete);
    let l2 = scheduled_task("L2", "11:15", 60, true, TaskStatus::Incomplete);
    let others = vec![l1, l2];

    let new_task = scheduled_task("New", "10:00", 60, false, TaskStatus::Incomplete);
    let new_task = new_task.as_scheduled().unwrap().clone();

    let adjusted = taskflow_core::engine::adjust_for_locked(&new_task, &others);
    assert_eq!(extract_time(adjusted.start), "11:00");

    let conflicts = taskflow_core::engine::check_overlap(&adjusted, &others);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].header.id, "L2");
}

#[test]
fn s5_midnight_crossing_overlap() {
    let late = scheduled_task("Late", "23:00", 90, false, TaskStatus::Incomplete);
    let early_start = time_to_datetime("00:15", date().succ_opt().unwrap()).unwrap();
    let early = Task::Scheduled(ScheduledTask {
        header: TaskHeader::new("Early".to_string(), "Early".to_string()),
        start: early_start,
        end: calculate_end_datetime(early_start, 45),
        duration: 45,
        locked: false,
    });
    assert!(taskflow_core::engine::tasks_overlap(
        late.as_scheduled().unwrap(),
        early.as_scheduled().unwrap()
    ));

    let evening = scheduled_task("Evening", "22:00", 120, false, TaskStatus::Incomplete);
    let morning_start = time_to_datetime("00:00", date().succ_opt().unwrap()).unwrap();
    let morning = Task::Scheduled(ScheduledTask {
        header: TaskHeader::new("Morning".to_string(), "Morning".to_string()),
        start: morning_start,
        end: calculate_end_datetime(morning_start, 120),
        duration: 120,
        locked: false,
    });
    assert!(!taskflow_core::engine::tasks_overlap(
        evening.as_scheduled().unwrap(),
        morning.as_scheduled().unwrap()
    ));
}

#[test]
fn s6_suggestion_gap_fill() {
    let machine = machine_seeded_at(
        "14:35",
        vec![
            scheduled_task("Morning", "09:00", 60, false, TaskStatus::Incomplete),
            scheduled_task("Evening", "16:00", 60, false, TaskStatus::Incomplete),
        ],
    );
    let now = time_to_datetime("14:35", date()).unwrap();
    let clock = FixedClock(now);
    assert_eq!(suggest_start_time(&clock, machine.store().get_state()), "14:35");
}

#[test]
fn s7_suggestion_plan_ahead() {
    let machine = machine_seeded_at(
        "14:35",
        vec![
            scheduled_task("Future1", "16:00", 60, false, TaskStatus::Incomplete),
            scheduled_task("Future2", "18:00", 60, false, TaskStatus::Incomplete),
        ],
    );
    let now = time_to_datetime("14:35", date()).unwrap();
    let clock = FixedClock(now);
    assert_eq!(suggest_start_time(&clock, machine.store().get_state()), "19:00");
}

#[test]
fn s8_truncate_completed_needs_confirm() {
    let mut machine = machine_seeded_at("16:00", vec![scheduled_task("Done", "16:00", 89, false, TaskStatus::Completed)]);

    let result = machine.add(scheduled_input("Break", "16:34", 34)).unwrap();
    assert!(matches!(
        result,
        OperationResult::NeedsConfirm(Confirmation::TruncateCompletedTask { .. })
    ));
}
