use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;
use shared::ledger::Outcome;
use shared::returns::plan_transition;
use shared::*;
use tracing::{info, warn};
use uuid::Uuid;

use crate::accounts;
use crate::directory;
use crate::error::ServiceError;
use crate::handlers::{list_limit, DbPool, Transitioned};
use crate::models::*;
use crate::outbox;
use crate::schema::*;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnFilter {
    pub customer_id: Option<Uuid>,
    pub district: Option<String>,
    pub agent_id: Option<Uuid>,
    pub status: Option<ReturnStatus>,
    pub limit: Option<i64>,
}

/// Deposit pickup ledger. Shares the customer row with the order ledger and
/// mutates it only through in-transaction arithmetic updates.
#[derive(Clone)]
pub struct ReturnLedger {
    pool: DbPool,
    params: LedgerParams,
}

impl ReturnLedger {
    pub fn new(pool: DbPool, params: LedgerParams) -> Self {
        Self { pool, params }
    }

    pub async fn create_return(&self, draft: ReturnDraft) -> Result<ReturnRequest, ServiceError> {
        let mut conn = self.pool.get().await?;
        let placement = directory::place(&mut conn, &draft.district, &draft.address).await?;
        let params = self.params.clone();

        let request = conn
            .transaction::<_, ServiceError, _>(|conn| {
                Box::pin(async move {
                    let customer = accounts::lock_customer(conn, draft.customer_id).await?;
                    let request = draft.place(&customer, &params, placement, Utc::now())?;

                    diesel::insert_into(return_requests::table)
                        .values(&DbReturnRequest::from(&request))
                        .execute(conn)
                        .await?;
                    outbox::record(conn, OutboxEvent::return_created(&request)?).await?;
                    Ok(request)
                })
            })
            .await?;

        info!(
            return_id = %request.id,
            customer_id = %request.customer_id,
            units = request.unit_count,
            refund = %request.refund_amount,
            "Return request created"
        );
        Ok(request)
    }

    pub async fn transition(
        &self,
        return_id: Uuid,
        target: ReturnStatus,
    ) -> Result<Transitioned<ReturnRequest>, ServiceError> {
        let mut conn = self.pool.get().await?;

        let result = conn
            .transaction::<_, ServiceError, _>(|conn| {
                Box::pin(async move {
                    let request = lock_return(conn, return_id).await?;

                    let transition = match plan_transition(&request, target, Utc::now())? {
                        Outcome::AlreadyApplied => {
                            return Ok(Transitioned {
                                record: request,
                                applied: false,
                            })
                        }
                        Outcome::Applied(transition) => transition,
                    };

                    let next = &transition.request;
                    diesel::update(return_requests::table.find(return_id))
                        .set((
                            return_requests::status.eq(next.status.as_str()),
                            return_requests::completed_at.eq(next.completed_at),
                            return_requests::refunded_at.eq(next.refunded_at),
                            return_requests::cancelled_at.eq(next.cancelled_at),
                            return_requests::updated_at.eq(next.updated_at),
                        ))
                        .execute(conn)
                        .await?;
                    accounts::apply_delta(conn, next.customer_id, &transition.account).await?;
                    outbox::record(conn, OutboxEvent::return_transition(&transition)?).await?;

                    Ok(Transitioned {
                        record: transition.request,
                        applied: true,
                    })
                })
            })
            .await;

        match &result {
            Ok(t) if t.applied => info!(return_id = %return_id, status = %t.record.status, "Return transition applied"),
            Ok(t) => info!(return_id = %return_id, status = %t.record.status, "Return already in requested state"),
            Err(e) => warn!(return_id = %return_id, target = %target, "Return transition rejected: {}", e),
        }
        result
    }

    pub async fn get(&self, return_id: Uuid) -> Result<ReturnRequest, ServiceError> {
        let mut conn = self.pool.get().await?;
        let row = return_requests::table
            .find(return_id)
            .first::<DbReturnRequest>(&mut conn)
            .await
            .optional()?
            .ok_or_else(|| LedgerError::return_not_found(return_id))?;
        ReturnRequest::try_from(row)
    }

    pub async fn list(&self, filter: &ReturnFilter) -> Result<Vec<ReturnRequest>, ServiceError> {
        let mut conn = self.pool.get().await?;

        let mut query = return_requests::table.into_boxed();
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(return_requests::customer_id.eq(customer_id));
        }
        if let Some(district) = &filter.district {
            query = query.filter(return_requests::district.eq(district.clone()));
        }
        if let Some(agent_id) = filter.agent_id {
            query = query.filter(return_requests::assigned_agent_id.eq(agent_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(return_requests::status.eq(status.as_str()));
        }

        let rows = query
            .order(return_requests::pickup_date.asc())
            .then_order_by(return_requests::created_at.asc())
            .limit(list_limit(filter.limit))
            .load::<DbReturnRequest>(&mut conn)
            .await?;
        rows.into_iter().map(ReturnRequest::try_from).collect()
    }
}

async fn lock_return(conn: &mut AsyncPgConnection, return_id: Uuid) -> Result<ReturnRequest, ServiceError> {
    let row = return_requests::table
        .find(return_id)
        .for_update()
        .first::<DbReturnRequest>(conn)
        .await
        .optional()?
        .ok_or_else(|| LedgerError::return_not_found(return_id))?;
    ReturnRequest::try_from(row)
}
