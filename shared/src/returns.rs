//! Deposit pickup requests: pending → completed → refunded, or
//! pending → cancelled.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::ledger::{Outcome, Placement};
use crate::model::{AccountDelta, Address, CustomerAccount, ReturnRequest, ReturnStatus};
use crate::params::LedgerParams;

#[derive(Debug, Clone, Deserialize)]
pub struct ReturnDraft {
    pub customer_id: Uuid,
    pub unit_count: i32,
    pub pickup_date: NaiveDate,
    pub district: String,
    pub address: Address,
}

impl ReturnDraft {
    /// Build the pending request. The refund amount is fixed here and carried
    /// unchanged through every later transition.
    pub fn place(
        self,
        customer: &CustomerAccount,
        params: &LedgerParams,
        placement: Placement,
        now: DateTime<Utc>,
    ) -> Result<ReturnRequest, LedgerError> {
        if customer.id != self.customer_id {
            return Err(LedgerError::customer_not_found(self.customer_id));
        }
        if self.unit_count <= 0 {
            return Err(LedgerError::Invalid("unit count must be positive".to_string()));
        }
        if self.unit_count > customer.active_units {
            return Err(LedgerError::InsufficientUnits {
                requested: self.unit_count,
                active: customer.active_units,
            });
        }

        Ok(ReturnRequest {
            id: Uuid::new_v4(),
            customer_id: self.customer_id,
            district: self.district,
            address: self.address,
            pickup_date: self.pickup_date,
            unit_count: self.unit_count,
            refund_amount: params.deposit_for(self.unit_count),
            status: ReturnStatus::Pending,
            zone_name: placement.zone_name,
            assigned_agent_id: placement.agent_id,
            created_at: now,
            completed_at: None,
            refunded_at: None,
            cancelled_at: None,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnTransition {
    pub from: ReturnStatus,
    pub request: ReturnRequest,
    pub account: AccountDelta,
}

impl ReturnTransition {
    pub fn event_type(&self) -> &'static str {
        match self.request.status {
            ReturnStatus::Pending => "ReturnCreated",
            ReturnStatus::Completed => "ReturnCompleted",
            ReturnStatus::Refunded => "ReturnRefunded",
            ReturnStatus::Cancelled => "ReturnCancelled",
        }
    }
}

pub fn can_transition(from: ReturnStatus, to: ReturnStatus) -> bool {
    use ReturnStatus::*;
    matches!((from, to), (Pending, Completed) | (Completed, Refunded) | (Pending, Cancelled))
}

pub fn plan_transition(
    request: &ReturnRequest,
    target: ReturnStatus,
    now: DateTime<Utc>,
) -> Result<Outcome<ReturnTransition>, LedgerError> {
    if request.status == target {
        return Ok(Outcome::AlreadyApplied);
    }
    if !can_transition(request.status, target) {
        return Err(LedgerError::InvalidTransition {
            entity: "return request",
            from: request.status.to_string(),
            to: target.to_string(),
        });
    }

    let mut next = request.clone();
    next.status = target;
    next.updated_at = now;

    let refund: &BigDecimal = &request.refund_amount;
    let account = match target {
        ReturnStatus::Completed => {
            if request.completed_at.is_some() {
                return Ok(Outcome::AlreadyApplied);
            }
            next.completed_at = Some(now);
            AccountDelta {
                active_units: -request.unit_count,
                ..AccountDelta::wallet(refund.clone())
            }
        }
        ReturnStatus::Refunded => {
            if request.refunded_at.is_some() {
                return Ok(Outcome::AlreadyApplied);
            }
            next.refunded_at = Some(now);
            AccountDelta::wallet(-refund.clone())
        }
        ReturnStatus::Cancelled => {
            next.cancelled_at.get_or_insert(now);
            AccountDelta::none()
        }
        ReturnStatus::Pending => unreachable!("no transition leads back to pending"),
    };

    Ok(Outcome::Applied(ReturnTransition {
        from: request.status,
        request: next,
        account,
    }))
}
