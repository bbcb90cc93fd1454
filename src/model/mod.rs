pub mod activity;
pub mod approval;
pub mod attendance;
pub mod employee;
pub mod notice;
pub mod role;
pub mod shared_file;
pub mod task;

/// Lets string-backed enums be read straight out of VARCHAR columns with
/// `#[sqlx(try_from = "String")]`.
macro_rules! string_column {
    ($($ty:ty),* $(,)?) => {$(
        impl TryFrom<String> for $ty {
            type Error = strum::ParseError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    )*};
}

string_column!(
    role::Role,
    attendance::AttendanceStatus,
    attendance::DayType,
    approval::ApprovalKind,
    approval::ApprovalStatus,
    task::TaskStatus,
    task::TaskPriority,
    notice::NoticeChannel,
);
