pub mod task;

pub use task::{
    Priority, ScheduledTask, Task, TaskHeader, TaskInput, TaskStatus, TransientFlags,
    UnscheduledTask,
};
