use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::OrderTransition;
use crate::model::{Order, ReturnRequest};
use crate::returns::ReturnTransition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Order,
    Return,
}

impl Aggregate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregate::Order => "order",
            Aggregate::Return => "return",
        }
    }
}

/// A ledger event recorded in the same transaction as the change it describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub aggregate: Aggregate,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl OutboxEvent {
    pub fn new(aggregate: Aggregate, aggregate_id: Uuid, event_type: &str, event_data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            aggregate,
            aggregate_id,
            event_type: event_type.to_string(),
            event_data,
            created_at: Utc::now(),
        }
    }

    pub fn order_created(order: &Order) -> Result<Self, serde_json::Error> {
        Ok(Self::new(Aggregate::Order, order.id, "OrderCreated", serde_json::to_value(order)?))
    }

    pub fn order_transition(transition: &OrderTransition) -> Result<Self, serde_json::Error> {
        let data = serde_json::json!({
            "from": transition.from,
            "to": transition.order.status,
            "customer_id": transition.order.customer_id,
            "account": transition.account,
        });
        Ok(Self::new(Aggregate::Order, transition.order.id, transition.event_type(), data))
    }

    pub fn order_assigned(order_id: Uuid, agent_id: Option<Uuid>, claimed: bool) -> Self {
        let data = serde_json::json!({ "agent_id": agent_id, "claimed": claimed });
        Self::new(Aggregate::Order, order_id, "OrderAssigned", data)
    }

    pub fn return_created(request: &ReturnRequest) -> Result<Self, serde_json::Error> {
        Ok(Self::new(Aggregate::Return, request.id, "ReturnCreated", serde_json::to_value(request)?))
    }

    pub fn return_transition(transition: &ReturnTransition) -> Result<Self, serde_json::Error> {
        let data = serde_json::json!({
            "from": transition.from,
            "to": transition.request.status,
            "customer_id": transition.request.customer_id,
            "account": transition.account,
        });
        Ok(Self::new(Aggregate::Return, transition.request.id, transition.event_type(), data))
    }
}
