pub use super::activity_logs::Entity as ActivityLogs;
pub use super::renewal_requests::Entity as RenewalRequests;
pub use super::system_settings::Entity as SystemSettings;
pub use super::user_sessions::Entity as UserSessions;
pub use super::users::Entity as Users;
