use thiserror::Error;

use crate::domain::loan::LoanId;
use crate::domain::reservation::ReservationId;
use crate::domain::resource::ResourceId;

/// Errors surfaced by circulation operations.
///
/// Every variant is recoverable by the caller; none is fatal to the
/// process. Background monitors log and swallow their own failures, so
/// these only cross foreground call boundaries.
#[derive(Error, Debug)]
pub enum CirculationError {
    #[error("resource {0} does not exist")]
    ResourceNotFound(ResourceId),
    #[error("resource {id} is not available: {reason}")]
    ResourceUnavailable { id: ResourceId, reason: String },
    #[error("loan {0} does not exist")]
    LoanNotFound(LoanId),
    #[error("loan {0} was already returned")]
    AlreadyReturned(LoanId),
    #[error("loan {id} cannot be renewed: {reason}")]
    NotRenewable { id: LoanId, reason: String },
    #[error("reservation {0} does not exist")]
    ReservationNotFound(ReservationId),
    /// Raised by notification channel implementations; swallowed at the
    /// dispatcher boundary and never shown to business callers.
    #[error("notification channel error: {0}")]
    ChannelError(String),
}

pub type Result<T> = std::result::Result<T, CirculationError>;
