pub mod job;
pub mod task;
