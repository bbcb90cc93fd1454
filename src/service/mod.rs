pub mod approval;
pub mod attendance;
pub mod geofence;
pub mod reporting;
pub mod tasks;
pub mod time_utils;
