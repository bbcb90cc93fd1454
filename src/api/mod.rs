pub mod activity;
pub mod approval;
pub mod attendance;
pub mod employee;
pub mod file;
pub mod notice;
pub mod report;
pub mod task;
