//! Status transition authority.
//!
//! Pure state-machine rules, no I/O. The resolution chain consults this
//! before touching any tier, and the same rules back the unit matrix below.

use crate::errors::TransitionError;
use crate::models::{OrderStatus, PaymentStatus};

/// Checks whether an order may move from `current` to `next`.
///
/// Rules:
/// - the linear ordering `pending → accepted → in_transit → delivered` only
///   moves forward;
/// - `rejected` is reachable only from `pending`;
/// - `cancelled` is reachable from any non-terminal state and bypasses the
///   payment gate;
/// - entering `accepted`, `in_transit` or `delivered` requires a confirmed
///   payment. Legacy rows carry no payment status (`None`) and are not
///   gated; their schema predates the payment flow.
///
/// A same-status transition is a no-op and allowed.
pub fn check_transition(
    current: OrderStatus,
    next: OrderStatus,
    payment_status: Option<PaymentStatus>,
) -> Result<(), TransitionError> {
    if current == next {
        return Ok(());
    }

    if next == OrderStatus::Cancelled {
        return if current.is_terminal() {
            Err(TransitionError::Terminal { from: current })
        } else {
            Ok(())
        };
    }

    if current.is_terminal() {
        return Err(TransitionError::Terminal { from: current });
    }

    if next == OrderStatus::Rejected {
        return if current == OrderStatus::Pending {
            Ok(())
        } else {
            Err(TransitionError::RejectedFromNonPending { from: current })
        };
    }

    if next.is_payment_gated() {
        match payment_status {
            Some(PaymentStatus::Paid) | None => {}
            Some(payment) => {
                return Err(TransitionError::PaymentNotConfirmed {
                    target: next,
                    payment,
                })
            }
        }
    }

    // Both ends are linear here: current is non-terminal, next is neither
    // rejected nor cancelled.
    if let (Some(from_rank), Some(to_rank)) = (current.rank(), next.rank()) {
        if to_rank < from_rank {
            return Err(TransitionError::CannotRegress {
                from: current,
                to: next,
            });
        }
    }

    Ok(())
}
