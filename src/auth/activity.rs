//! Best-effort audit trail writer.

use tracing::warn;

use crate::db::{AuditEvent, Store};

/// Records audit entries without ever failing the operation being
/// audited. A write failure is logged and swallowed.
#[derive(Clone)]
pub struct ActivityLogger {
    store: Store,
}

impl ActivityLogger {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn record(&self, event: AuditEvent) {
        if let Err(err) = self.store.activity().add(&event).await {
            warn!(action = %event.action, error = %err, "Failed to write activity log entry");
        }
    }
}
