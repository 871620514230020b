// Session Port

use super::refund_api::Credentials;
use crate::domain::RefundId;
use std::sync::{PoisonError, RwLock};

/// Who is asking, and which refund they track.
///
/// The read protocol takes no id; the orchestrator resolves it here and
/// records the id learned from the first successful fetch.
pub trait SessionProvider: Send + Sync {
    fn credentials(&self) -> Credentials;

    fn current_refund_id(&self) -> Option<RefundId>;

    fn set_current_refund_id(&self, refund_id: RefundId);
}

/// Session fixed at startup (CLI, tests)
pub struct StaticSession {
    credentials: Credentials,
    refund_id: RwLock<Option<RefundId>>,
}

impl StaticSession {
    pub fn new(credentials: Credentials, refund_id: Option<RefundId>) -> Self {
        Self {
            credentials,
            refund_id: RwLock::new(refund_id),
        }
    }
}

impl SessionProvider for StaticSession {
    fn credentials(&self) -> Credentials {
        self.credentials.clone()
    }

    fn current_refund_id(&self) -> Option<RefundId> {
        self.refund_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_current_refund_id(&self, refund_id: RefundId) {
        *self
            .refund_id
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(refund_id);
    }
}
