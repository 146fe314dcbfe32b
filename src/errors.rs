use uuid::Uuid;

use crate::models::{OrderStatus, PaymentStatus};

/// Rejection produced by the status transition authority. Pure data, no I/O.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot regress from '{from}' to '{to}'")]
    CannotRegress { from: OrderStatus, to: OrderStatus },

    #[error("payment not confirmed: cannot move to '{target}' while payment status is '{payment}'")]
    PaymentNotConfirmed {
        target: OrderStatus,
        payment: PaymentStatus,
    },

    #[error("status '{from}' is terminal, no further transitions are allowed")]
    Terminal { from: OrderStatus },

    #[error("'rejected' is only reachable from 'pending', current status is '{from}'")]
    RejectedFromNonPending { from: OrderStatus },
}

/// Crate-wide error taxonomy.
///
/// Clonable on purpose: in-flight status updates are shared between
/// deduplicated callers (`futures::future::Shared`), so every awaiting caller
/// receives its own copy of the outcome.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ServiceError {
    /// Invalid input surfaced synchronously, never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// Illegal status transition; triggers optimistic rollback in the store.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// None of the three persistence tiers located the record. Terminal for
    /// the caller, who must refetch.
    #[error("order {0} not found in any tier")]
    BackendUnavailable(Uuid),

    /// A tier failed while handling a record it owns.
    #[error("tier '{tier}' error: {message}")]
    Tier { tier: &'static str, message: String },

    /// Logged and swallowed by the fan-out service, never propagated.
    #[error("notification delivery failed: {0}")]
    NotificationDelivery(String),

    /// Retried with backoff by the read-state reconciler; only logged after
    /// exhaustion, never surfaced to the user.
    #[error("read receipt persistence failed: {0}")]
    ReadReceiptPersistence(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Whether this error may cross the synchronization store boundary to UI
    /// code. Notification and read-receipt failures are contained.
    pub fn crosses_store_boundary(&self) -> bool {
        matches!(
            self,
            ServiceError::Validation(_)
                | ServiceError::Transition(_)
                | ServiceError::BackendUnavailable(_)
                | ServiceError::Tier { .. }
        )
    }
}
