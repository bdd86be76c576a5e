use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{pooled_connection::bb8::Pool, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use shared::ledger::{self, Outcome};
use shared::*;
use tracing::{info, warn};
use uuid::Uuid;

use crate::accounts;
use crate::directory;
use crate::error::ServiceError;
use crate::models::*;
use crate::outbox;
use crate::schema::*;

pub type DbPool = Pool<AsyncPgConnection>;

const DEFAULT_LIST_LIMIT: i64 = 200;
const MAX_LIST_LIMIT: i64 = 1000;

/// Page size for list queries: the requested limit clamped to `1..=MAX_LIST_LIMIT`.
pub(crate) fn list_limit(requested: Option<i64>) -> i64 {
    requested.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

/// A record after a transition request, and whether this request changed it.
#[derive(Debug, Clone, Serialize)]
pub struct Transitioned<T> {
    #[serde(flatten)]
    pub record: T,
    pub applied: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub customer_id: Option<Uuid>,
    pub district: Option<String>,
    pub agent_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    /// Only orders nobody has been assigned to: the district's open pool.
    pub unassigned: Option<bool>,
    pub limit: Option<i64>,
}

/// Owns order state. Every mutation runs in one transaction holding the
/// order row lock, so status, guard timestamp, account effects and the
/// outbox event commit or roll back together.
#[derive(Clone)]
pub struct OrderLedger {
    pool: DbPool,
    params: LedgerParams,
}

impl OrderLedger {
    pub fn new(pool: DbPool, params: LedgerParams) -> Self {
        Self { pool, params }
    }

    pub async fn create_order(&self, draft: OrderDraft) -> Result<Order, ServiceError> {
        draft.validate()?;
        let mut conn = self.pool.get().await?;

        let placement = directory::place(&mut conn, &draft.district, &draft.address).await?;
        let params = self.params.clone();

        let order = conn
            .transaction::<_, ServiceError, _>(|conn| {
                Box::pin(async move {
                    let customer = accounts::lock_customer(conn, draft.customer_id).await?;
                    let placed = draft.place(&customer, &params, placement, Utc::now())?;

                    diesel::insert_into(orders::table)
                        .values(&DbOrder::from_order(&placed.order)?)
                        .execute(conn)
                        .await?;
                    accounts::apply_delta(conn, customer.id, &placed.account).await?;
                    outbox::record(conn, OutboxEvent::order_created(&placed.order)?).await?;

                    Ok(placed.order)
                })
            })
            .await?;

        info!(
            order_id = %order.id,
            customer_id = %order.customer_id,
            total = %order.total_amount,
            zone = ?order.zone_name,
            agent_id = ?order.assigned_agent_id,
            "Order created"
        );
        Ok(order)
    }

    pub async fn transition(&self, order_id: Uuid, target: OrderStatus) -> Result<Transitioned<Order>, ServiceError> {
        let mut conn = self.pool.get().await?;
        let params = self.params.clone();

        let result = conn
            .transaction::<_, ServiceError, _>(|conn| {
                Box::pin(async move {
                    let order = lock_order(conn, order_id).await?;

                    let transition = match ledger::plan_transition(&order, target, &params, Utc::now())? {
                        Outcome::AlreadyApplied => {
                            return Ok(Transitioned {
                                record: order,
                                applied: false,
                            })
                        }
                        Outcome::Applied(transition) => transition,
                    };

                    let next = &transition.order;
                    diesel::update(orders::table.find(order_id))
                        .set((
                            orders::status.eq(next.status.as_str()),
                            orders::shipped_at.eq(next.shipped_at),
                            orders::delivered_at.eq(next.delivered_at),
                            orders::cancelled_at.eq(next.cancelled_at),
                            orders::updated_at.eq(next.updated_at),
                        ))
                        .execute(conn)
                        .await?;
                    accounts::apply_delta(conn, next.customer_id, &transition.account).await?;
                    outbox::record(conn, OutboxEvent::order_transition(&transition)?).await?;

                    Ok(Transitioned {
                        record: transition.order,
                        applied: true,
                    })
                })
            })
            .await;

        match &result {
            Ok(t) if t.applied => info!(order_id = %order_id, status = %t.record.status, "Order transition applied"),
            Ok(t) => info!(order_id = %order_id, status = %t.record.status, "Order already in requested state"),
            Err(e) => warn!(order_id = %order_id, target = %target, "Order transition rejected: {}", e),
        }
        result
    }

    /// Admin override: point the order at any agent, or back into the pool.
    pub async fn reassign(&self, order_id: Uuid, agent_id: Option<Uuid>) -> Result<Order, ServiceError> {
        let mut conn = self.pool.get().await?;

        if let Some(agent_id) = agent_id {
            let agent = directory::find_agent(&mut conn, agent_id).await?;
            if !matches!(agent, Some(Agent { role: StaffRole::Agent, .. })) {
                return Err(LedgerError::agent_not_found(agent_id).into());
            }
        }

        let order = conn
            .transaction::<_, ServiceError, _>(|conn| {
                Box::pin(async move {
                    let mut order = lock_order(conn, order_id).await?;
                    order.assigned_agent_id = agent_id;
                    order.updated_at = Utc::now();
                    save_assignment(conn, &order).await?;
                    outbox::record(conn, OutboxEvent::order_assigned(order_id, agent_id, false)).await?;
                    Ok(order)
                })
            })
            .await?;

        info!(order_id = %order_id, agent_id = ?agent_id, "Order reassigned");
        Ok(order)
    }

    /// An agent takes an unassigned, still open order from their district's pool.
    pub async fn claim(&self, order_id: Uuid, agent_id: Uuid) -> Result<Order, ServiceError> {
        let mut conn = self.pool.get().await?;

        let agent = directory::find_agent(&mut conn, agent_id)
            .await?
            .filter(|a| a.role == StaffRole::Agent && a.active)
            .ok_or_else(|| LedgerError::agent_not_found(agent_id))?;

        let order = conn
            .transaction::<_, ServiceError, _>(|conn| {
                Box::pin(async move {
                    let mut order = lock_order(conn, order_id).await?;
                    match order.assigned_agent_id {
                        Some(current) if current == agent.id => return Ok(order),
                        Some(_) => return Err(LedgerError::AlreadyAssigned(order_id).into()),
                        None => {}
                    }
                    if order.status.is_terminal() {
                        return Err(LedgerError::Invalid(format!("order {} is already {}", order_id, order.status)).into());
                    }
                    if order.district != agent.district {
                        return Err(LedgerError::Invalid(format!(
                            "agent works in {}, order is in {}",
                            agent.district, order.district
                        ))
                        .into());
                    }

                    order.assigned_agent_id = Some(agent.id);
                    order.updated_at = Utc::now();
                    save_assignment(conn, &order).await?;
                    outbox::record(conn, OutboxEvent::order_assigned(order_id, Some(agent.id), true)).await?;
                    Ok(order)
                })
            })
            .await?;

        info!(order_id = %order_id, agent_id = %agent_id, "Order claimed");
        Ok(order)
    }

    pub async fn get(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        let mut conn = self.pool.get().await?;
        let row = orders::table
            .find(order_id)
            .first::<DbOrder>(&mut conn)
            .await
            .optional()?
            .ok_or_else(|| LedgerError::order_not_found(order_id))?;
        Order::try_from(row)
    }

    pub async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, ServiceError> {
        let mut conn = self.pool.get().await?;

        let mut query = orders::table.into_boxed();
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(orders::customer_id.eq(customer_id));
        }
        if let Some(district) = &filter.district {
            query = query.filter(orders::district.eq(district.clone()));
        }
        if let Some(agent_id) = filter.agent_id {
            query = query.filter(orders::assigned_agent_id.eq(agent_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(orders::status.eq(status.as_str()));
        }
        if filter.unassigned == Some(true) {
            query = query.filter(orders::assigned_agent_id.is_null());
        }

        let rows = query
            .order(orders::created_at.desc())
            .limit(list_limit(filter.limit))
            .load::<DbOrder>(&mut conn)
            .await?;
        rows.into_iter().map(Order::try_from).collect()
    }
}

async fn lock_order(conn: &mut AsyncPgConnection, order_id: Uuid) -> Result<Order, ServiceError> {
    let row = orders::table
        .find(order_id)
        .for_update()
        .first::<DbOrder>(conn)
        .await
        .optional()?
        .ok_or_else(|| LedgerError::order_not_found(order_id))?;
    Order::try_from(row)
}

async fn save_assignment(conn: &mut AsyncPgConnection, order: &Order) -> Result<(), ServiceError> {
    diesel::update(orders::table.find(order.id))
        .set((
            orders::assigned_agent_id.eq(order.assigned_agent_id),
            orders::updated_at.eq(order.updated_at),
        ))
        .execute(conn)
        .await?;
    Ok(())
}
