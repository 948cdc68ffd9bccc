use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::dispatcher::{NotificationDispatcher, NotificationTask};
use super::loans::LoanLedger;
use super::reservations::ReservationQueue;
use crate::domain::loan::{Loan, LoanId};
use crate::domain::reservation::{Reservation, ReservationId};
use crate::domain::resource::ResourceId;
use crate::domain::user::UserId;
use crate::error::Result;

/// Foreground orchestration over the ledger, the reservation queue and
/// the dispatcher.
///
/// Performs the synchronous mutation first, then enqueues the matching
/// notification. Because enqueueing is infallible and delivery is
/// best-effort, a completed loan or reservation change never rolls back
/// on notification trouble.
pub struct CirculationService {
    ledger: Arc<LoanLedger>,
    reservations: Arc<ReservationQueue>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl CirculationService {
    pub fn new(
        ledger: Arc<LoanLedger>,
        reservations: Arc<ReservationQueue>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            ledger,
            reservations,
            dispatcher,
        }
    }

    pub async fn borrow(&self, resource_id: &ResourceId, user_id: &UserId) -> Result<Loan> {
        let loan = self.ledger.grant_loan(resource_id, user_id).await?;
        self.dispatcher.enqueue(NotificationTask::notice(
            user_id.clone(),
            format!(
                "You borrowed {}. It is due back on {}.",
                resource_id,
                loan.due_at.format("%Y-%m-%d"),
            ),
        ));
        Ok(loan)
    }

    pub async fn give_back(&self, loan_id: LoanId) -> Result<bool> {
        let returned = self.ledger.return_loan(loan_id).await?;
        if returned && let Some(loan) = self.ledger.find_loan(loan_id).await {
            self.dispatcher.enqueue(NotificationTask::notice(
                loan.user_id,
                format!("Your return of {} has been registered.", loan.resource_id),
            ));
        }
        Ok(returned)
    }

    pub async fn renew(&self, loan_id: LoanId, extension_days: i64) -> Result<DateTime<Utc>> {
        let new_due = self.ledger.renew_loan(loan_id, extension_days).await?;
        if let Some(loan) = self.ledger.find_loan(loan_id).await {
            self.dispatcher.enqueue(NotificationTask::notice(
                loan.user_id,
                format!(
                    "Your loan of {} was renewed. New due date: {}.",
                    loan.resource_id,
                    new_due.format("%Y-%m-%d"),
                ),
            ));
        }
        Ok(new_due)
    }

    pub async fn reserve(
        &self,
        resource_id: &ResourceId,
        user_id: &UserId,
        priority: u8,
    ) -> Result<Reservation> {
        let reservation = self
            .reservations
            .reserve(resource_id, user_id, priority)
            .await?;
        self.dispatcher.enqueue(NotificationTask::notice(
            user_id.clone(),
            format!(
                "Your reservation of {} is registered. You will be notified when it becomes available.",
                resource_id,
            ),
        ));
        Ok(reservation)
    }

    pub async fn cancel_reservation(&self, reservation_id: ReservationId) -> Result<bool> {
        let cancelled = self.reservations.cancel(reservation_id).await?;
        if cancelled && let Some(reservation) = self.reservations.find_reservation(reservation_id).await {
            self.dispatcher.enqueue(NotificationTask::notice(
                reservation.user_id,
                format!("Your reservation of {} was cancelled.", reservation.resource_id),
            ));
        }
        Ok(cancelled)
    }

    pub fn ledger(&self) -> &Arc<LoanLedger> {
        &self.ledger
    }

    pub fn reservations(&self) -> &Arc<ReservationQueue> {
        &self.reservations
    }

    pub fn dispatcher(&self) -> &Arc<NotificationDispatcher> {
        &self.dispatcher
    }
}
