pub mod runner;

pub use runner::{ReplyGuyScheduler, SchedulerConfig};
