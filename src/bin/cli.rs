//! `taskflow-cli` — a `clap`-derived scriptable harness over the task-state
//! machine (§6), backed by an in-memory store or a `--db PATH` sqlite file.
//! Exit code mirrors the operation result: 0 `Success`, 1 `Failure`,
//! 2 `NeedsConfirm` (the payload is printed as JSON for the caller to echo
//! back via `--confirm`).

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use taskflow_core::clock::SystemClock;
use taskflow_core::config::Config;
use taskflow_core::logging;
use taskflow_core::models::task::TaskInput;
use taskflow_core::state_machine::{OperationResult, TaskMachine};
use taskflow_core::store::{MemoryTaskStore, SqliteTaskStore, TaskStore};

#[derive(Parser)]
#[command(name = "taskflow-cli", about = "Scriptable harness over the taskflow state machine")]
struct Cli {
    /// Sqlite file to persist to. Omit to use an in-memory store for this invocation.
    #[arg(long)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add a scheduled task: add <description> <HH:MM> <duration-minutes>
    Add { description: String, start: String, duration: i64 },
    /// Add an unscheduled task: add-unscheduled <description> [priority]
    AddUnscheduled { description: String, priority: Option<String> },
    /// Update a scheduled task by index: update <index> <description> <HH:MM> <duration-minutes>
    Update { index: usize, description: String, start: String, duration: i64 },
    /// Mark a task complete by its index in the raw task list
    Complete { index: usize },
    /// Delete a task by index; pass --confirm to commit after the first prompt
    Delete { index: usize, #[arg(long)] confirm: bool },
    /// Lock or unlock a scheduled task by id
    Lock { id: String },
    Unlock { id: String },
    /// Convert a scheduled task back to unscheduled
    Unschedule { id: String },
    /// List all tasks
    List,
    /// Print the suggested start time for a new task
    Suggest,
}

fn main() -> ExitCode {
    logging::init();
    // Config::from_env() also governs the replication/log-filter ambient
    // stack when this binary is embedded in a longer-running process; the
    // CLI's own storage choice is driven by `--db` alone (§6).
    let _config = Config::from_env();
    let cli = Cli::parse();

    match cli.db {
        Some(path) => run_with_store(SqliteTaskStore::new(path).expect("open sqlite store"), cli.command),
        None => run_with_store(MemoryTaskStore::new(), cli.command),
    }
}

fn run_with_store<P: taskflow_core::store::PersistenceStore>(persistence: P, command: Command) -> ExitCode {
    let store = match TaskStore::load(persistence) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("failed to load task store: {err}");
            return ExitCode::from(1);
        }
    };
    let mut machine = TaskMachine::new(store, Box::new(SystemClock));

    let result = match command {
        Command::Add { description, start, duration } => machine.add(TaskInput {
            description,
            task_type: Some("scheduled".to_string()),
            start_time: Some(start),
            duration: Some(duration),
            ..Default::default()
        }),
        Command::AddUnscheduled { description, priority } => machine.add(TaskInput {
            description,
            task_type: Some("unscheduled".to_string()),
            priority,
            ..Default::default()
        }),
        Command::Update { index, description, start, duration } => machine.update(
            index,
            TaskInput {
                description,
                task_type: Some("scheduled".to_string()),
                start_time: Some(start),
                duration: Some(duration),
                ..Default::default()
            },
        ),
        Command::Complete { index } => machine.complete(index, None),
        Command::Delete { index, confirm } => machine.delete(index, confirm),
        Command::Lock { id } => machine.toggle_lock(&id),
        Command::Unlock { id } => machine.toggle_lock(&id),
        Command::Unschedule { id } => machine.unschedule(&id),
        Command::List => {
            for task in machine.store().get_state() {
                println!("{}", serde_json::to_string(task).unwrap_or_default());
            }
            return ExitCode::from(0);
        }
        Command::Suggest => {
            let suggestion = taskflow_core::suggestion::suggest_start_time(&SystemClock, machine.store().get_state());
            println!("{suggestion}");
            return ExitCode::from(0);
        }
    };

    match result {
        Ok(OperationResult::Success { task, message }) => {
            if let Some(task) = task {
                println!("{}", serde_json::to_string(&task).unwrap_or_default());
            }
            if let Some(message) = message {
                println!("{message}");
            }
            ExitCode::from(0)
        }
        Ok(OperationResult::Failure { reason }) => {
            eprintln!("{reason}");
            ExitCode::from(1)
        }
        Ok(OperationResult::NeedsConfirm(confirmation)) => {
            println!("{}", serde_json::to_string(&confirmation).unwrap_or_default());
            ExitCode::from(2)
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(1)
        }
    }
}
