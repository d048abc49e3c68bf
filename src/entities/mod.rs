pub mod prelude;

pub mod activity_logs;
pub mod renewal_requests;
pub mod system_settings;
pub mod user_sessions;
pub mod users;
