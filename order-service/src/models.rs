//! Row types and the single mapping layer between stored rows and the
//! typed `shared` entities. Status and payment enums are converted to and
//! from their text form here and nowhere else.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use shared::*;
use uuid::Uuid;

use crate::error::ServiceError;

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::customers)]
pub struct DbCustomer {
    pub id: Uuid,
    pub name: String,
    pub district: Option<String>,
    pub wallet_balance: BigDecimal,
    pub active_units: i32,
    pub home_stock_ml: i64,
    pub order_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbCustomer> for CustomerAccount {
    fn from(row: DbCustomer) -> Self {
        Self {
            id: row.id,
            district: row.district,
            wallet_balance: row.wallet_balance,
            active_units: row.active_units,
            home_stock_ml: row.home_stock_ml,
            order_count: row.order_count,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::zones)]
pub struct DbZone {
    pub district: String,
    pub name: String,
    pub postal_codes: Vec<String>,
    pub landmarks: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<DbZone> for Zone {
    fn from(row: DbZone) -> Self {
        Self {
            district: row.district,
            name: row.name,
            postal_codes: row.postal_codes,
            landmarks: row.landmarks,
            active: row.active,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::staff)]
pub struct DbStaff {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub district: String,
    pub zones: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbStaff> for Agent {
    type Error = ServiceError;

    fn try_from(row: DbStaff) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            role: parse_column(&row.role, "staff.role")?,
            district: row.district,
            zones: row.zones,
            active: row.active,
        })
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::orders)]
pub struct DbOrder {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub items: serde_json::Value,
    pub subtotal: BigDecimal,
    pub delivery_fee: BigDecimal,
    pub deposit_fee: BigDecimal,
    pub discount: BigDecimal,
    pub total_amount: BigDecimal,
    pub status: String,
    pub delivery_date: NaiveDate,
    pub district: String,
    pub state: Option<String>,
    pub city: Option<String>,
    pub address_line: String,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub payment_method: String,
    pub returned_units: i32,
    pub assigned_agent_id: Option<Uuid>,
    pub zone_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl DbOrder {
    pub fn from_order(order: &Order) -> Result<Self, ServiceError> {
        Ok(Self {
            id: order.id,
            customer_id: order.customer_id,
            items: serde_json::to_value(&order.items)?,
            subtotal: order.subtotal.clone(),
            delivery_fee: order.delivery_fee.clone(),
            deposit_fee: order.deposit_fee.clone(),
            discount: order.discount.clone(),
            total_amount: order.total_amount.clone(),
            status: order.status.as_str().to_string(),
            delivery_date: order.delivery_date,
            district: order.district.clone(),
            state: order.address.state.clone(),
            city: order.address.city.clone(),
            address_line: order.address.line.clone(),
            postal_code: order.address.postal_code.clone(),
            latitude: order.address.latitude,
            longitude: order.address.longitude,
            payment_method: order.payment_method.as_str().to_string(),
            returned_units: order.returned_units,
            assigned_agent_id: order.assigned_agent_id,
            zone_name: order.zone_name.clone(),
            created_at: order.created_at,
            shipped_at: order.shipped_at,
            delivered_at: order.delivered_at,
            cancelled_at: order.cancelled_at,
            updated_at: order.updated_at,
        })
    }
}

impl TryFrom<DbOrder> for Order {
    type Error = ServiceError;

    fn try_from(row: DbOrder) -> Result<Self, Self::Error> {
        let items: Vec<LineItem> = serde_json::from_value(row.items)
            .map_err(|e| ServiceError::Malformed(format!("orders.items of {}: {}", row.id, e)))?;

        Ok(Self {
            id: row.id,
            customer_id: row.customer_id,
            items,
            subtotal: row.subtotal,
            delivery_fee: row.delivery_fee,
            deposit_fee: row.deposit_fee,
            discount: row.discount,
            total_amount: row.total_amount,
            status: parse_column(&row.status, "orders.status")?,
            delivery_date: row.delivery_date,
            district: row.district,
            address: Address {
                line: row.address_line,
                city: row.city,
                state: row.state,
                postal_code: row.postal_code,
                latitude: row.latitude,
                longitude: row.longitude,
            },
            payment_method: parse_column(&row.payment_method, "orders.payment_method")?,
            returned_units: row.returned_units,
            assigned_agent_id: row.assigned_agent_id,
            zone_name: row.zone_name,
            created_at: row.created_at,
            shipped_at: row.shipped_at,
            delivered_at: row.delivered_at,
            cancelled_at: row.cancelled_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::return_requests)]
pub struct DbReturnRequest {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub district: String,
    pub address_line: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub pickup_date: NaiveDate,
    pub unit_count: i32,
    pub refund_amount: BigDecimal,
    pub status: String,
    pub zone_name: Option<String>,
    pub assigned_agent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ReturnRequest> for DbReturnRequest {
    fn from(request: &ReturnRequest) -> Self {
        Self {
            id: request.id,
            customer_id: request.customer_id,
            district: request.district.clone(),
            address_line: request.address.line.clone(),
            city: request.address.city.clone(),
            state: request.address.state.clone(),
            postal_code: request.address.postal_code.clone(),
            latitude: request.address.latitude,
            longitude: request.address.longitude,
            pickup_date: request.pickup_date,
            unit_count: request.unit_count,
            refund_amount: request.refund_amount.clone(),
            status: request.status.as_str().to_string(),
            zone_name: request.zone_name.clone(),
            assigned_agent_id: request.assigned_agent_id,
            created_at: request.created_at,
            completed_at: request.completed_at,
            refunded_at: request.refunded_at,
            cancelled_at: request.cancelled_at,
            updated_at: request.updated_at,
        }
    }
}

impl TryFrom<DbReturnRequest> for ReturnRequest {
    type Error = ServiceError;

    fn try_from(row: DbReturnRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            customer_id: row.customer_id,
            district: row.district,
            address: Address {
                line: row.address_line,
                city: row.city,
                state: row.state,
                postal_code: row.postal_code,
                latitude: row.latitude,
                longitude: row.longitude,
            },
            pickup_date: row.pickup_date,
            unit_count: row.unit_count,
            refund_amount: row.refund_amount,
            status: parse_column(&row.status, "return_requests.status")?,
            zone_name: row.zone_name,
            assigned_agent_id: row.assigned_agent_id,
            created_at: row.created_at,
            completed_at: row.completed_at,
            refunded_at: row.refunded_at,
            cancelled_at: row.cancelled_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::outbox_events)]
pub struct DbOutboxEvent {
    pub id: Uuid,
    pub aggregate: String,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<OutboxEvent> for DbOutboxEvent {
    fn from(event: OutboxEvent) -> Self {
        Self {
            id: event.id,
            aggregate: event.aggregate.as_str().to_string(),
            aggregate_id: event.aggregate_id,
            event_type: event.event_type,
            event_data: event.event_data,
            processed: false,
            created_at: event.created_at,
        }
    }
}

fn parse_column<T>(value: &str, column: &str) -> Result<T, ServiceError>
where
    T: std::str::FromStr<Err = LedgerError>,
{
    value
        .parse()
        .map_err(|e: LedgerError| ServiceError::Malformed(format!("{}: {}", column, e)))
}
