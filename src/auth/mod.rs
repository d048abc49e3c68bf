//! Authentication and account lifecycle domain.

pub mod activity;
pub mod error;
pub mod lifecycle;
pub mod policy;
pub mod session;
pub mod status;
pub mod token;

pub use activity::ActivityLogger;
pub use error::AuthError;
pub use lifecycle::{
    BulkAction, DEFAULT_APPROVAL_DAYS, LifecycleController, LoginOutcome, MIN_PASSWORD_LEN,
    Registration, RequestMeta,
};
pub use policy::AuthPolicy;
pub use session::{AuthenticatedSession, IssuedSession, SessionManager};
pub use status::{AccountStatus, Role, days_until_expiry, effective_status};
