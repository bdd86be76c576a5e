use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(LedgerError::Invalid(format!("unknown order status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnStatus {
    Pending,
    Completed,
    Refunded,
    Cancelled,
}

impl ReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Pending => "pending",
            ReturnStatus::Completed => "completed",
            ReturnStatus::Refunded => "refunded",
            ReturnStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReturnStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReturnStatus::Pending),
            "completed" => Ok(ReturnStatus::Completed),
            "refunded" => Ok(ReturnStatus::Refunded),
            "cancelled" => Ok(ReturnStatus::Cancelled),
            other => Err(LedgerError::Invalid(format!("unknown return status '{}'", other))),
        }
    }
}

/// How the customer paid at checkout. Cancellation refunds both to the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Upi,
    Wallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Upi => "upi",
            PaymentMethod::Wallet => "wallet",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upi" => Ok(PaymentMethod::Upi),
            "wallet" => Ok(PaymentMethod::Wallet),
            other => Err(LedgerError::Invalid(format!("unknown payment method '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Admin,
    Staff,
    Agent,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Admin => "admin",
            StaffRole::Staff => "staff",
            StaffRole::Agent => "agent",
        }
    }
}

impl FromStr for StaffRole {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(StaffRole::Admin),
            "staff" => Ok(StaffRole::Staff),
            "agent" => Ok(StaffRole::Agent),
            other => Err(LedgerError::Invalid(format!("unknown staff role '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: String,
    pub name: String,
    pub unit_price: BigDecimal,
    pub quantity: i32,
    /// Each unit of this product is a refillable container on deposit.
    #[serde(default)]
    pub counts_as_deposit_unit: bool,
}

impl LineItem {
    pub fn line_total(&self) -> BigDecimal {
        &self.unit_price * BigDecimal::from(self.quantity)
    }
}

/// Upper bound on a single line item's quantity.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

pub fn deposit_unit_quantity(items: &[LineItem]) -> Result<i32, LedgerError> {
    items
        .iter()
        .filter(|item| item.counts_as_deposit_unit)
        .try_fold(0i32, |total, item| {
            total
                .checked_add(item.quantity)
                .ok_or_else(|| LedgerError::Invalid("deposit unit quantity out of range".to_string()))
        })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub line: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub items: Vec<LineItem>,
    pub subtotal: BigDecimal,
    pub delivery_fee: BigDecimal,
    pub deposit_fee: BigDecimal,
    pub discount: BigDecimal,
    pub total_amount: BigDecimal,
    pub status: OrderStatus,
    pub delivery_date: NaiveDate,
    pub district: String,
    pub address: Address,
    pub payment_method: PaymentMethod,
    pub returned_units: i32,
    pub assigned_agent_id: Option<Uuid>,
    pub zone_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAccount {
    pub id: Uuid,
    pub district: Option<String>,
    pub wallet_balance: BigDecimal,
    pub active_units: i32,
    pub home_stock_ml: i64,
    pub order_count: i32,
}

impl CustomerAccount {
    pub fn apply(&mut self, delta: &AccountDelta) {
        self.wallet_balance += &delta.wallet;
        self.active_units += delta.active_units;
        self.home_stock_ml += delta.home_stock_ml;
        self.order_count += delta.order_count;
    }
}

/// Change to a customer's accounting fields produced by one ledger step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountDelta {
    pub wallet: BigDecimal,
    pub active_units: i32,
    pub home_stock_ml: i64,
    pub order_count: i32,
}

impl AccountDelta {
    pub fn none() -> Self {
        Self {
            wallet: BigDecimal::zero(),
            active_units: 0,
            home_stock_ml: 0,
            order_count: 0,
        }
    }

    pub fn wallet(amount: BigDecimal) -> Self {
        Self {
            wallet: amount,
            ..Self::none()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.wallet.is_zero()
            && self.active_units == 0
            && self.home_stock_ml == 0
            && self.order_count == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub district: String,
    pub name: String,
    pub postal_codes: Vec<String>,
    pub landmarks: Vec<String>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub role: StaffRole,
    pub district: String,
    pub zones: Vec<String>,
    pub active: bool,
}

impl Agent {
    pub fn covers(&self, district: &str, zone_name: &str) -> bool {
        self.active
            && self.role == StaffRole::Agent
            && self.district == district
            && self.zones.iter().any(|z| z == zone_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub district: String,
    pub address: Address,
    pub pickup_date: NaiveDate,
    pub unit_count: i32,
    pub refund_amount: BigDecimal,
    pub status: ReturnStatus,
    pub zone_name: Option<String>,
    pub assigned_agent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_round_trips_through_from_str() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("Delivered".parse::<OrderStatus>().is_err());
        assert!("refunded".parse::<OrderStatus>().is_err());
        assert_eq!("refunded".parse::<ReturnStatus>().unwrap(), ReturnStatus::Refunded);
        for role in [StaffRole::Admin, StaffRole::Staff, StaffRole::Agent] {
            assert_eq!(role.as_str().parse::<StaffRole>().unwrap(), role);
        }
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&OrderStatus::Shipped).unwrap();
        assert_eq!(json, "\"shipped\"");
        let parsed: ReturnStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(parsed, ReturnStatus::Completed);
    }

    #[test]
    fn deposit_quantity_only_counts_flagged_items() {
        let items = vec![
            LineItem {
                product_id: "can-20l".into(),
                name: "20L Can".into(),
                unit_price: BigDecimal::from(60),
                quantity: 3,
                counts_as_deposit_unit: true,
            },
            LineItem {
                product_id: "bottle-1l".into(),
                name: "1L Bottle".into(),
                unit_price: BigDecimal::from(20),
                quantity: 12,
                counts_as_deposit_unit: false,
            },
        ];
        assert_eq!(deposit_unit_quantity(&items).unwrap(), 3);
        assert_eq!(items[1].line_total(), BigDecimal::from(240));
    }

    #[test]
    fn deposit_quantity_overflow_is_an_error() {
        let can = |quantity| LineItem {
            product_id: "can-20l".into(),
            name: "20L Can".into(),
            unit_price: BigDecimal::from(50),
            quantity,
            counts_as_deposit_unit: true,
        };
        let items = vec![can(1_500_000_000), can(1_500_000_000)];
        assert!(matches!(deposit_unit_quantity(&items), Err(LedgerError::Invalid(_))));
        assert_eq!(deposit_unit_quantity(&[can(i32::MAX)]).unwrap(), i32::MAX);
    }

    #[test]
    fn agent_coverage_requires_active_agent_role_in_district() {
        let mut agent = Agent {
            id: Uuid::new_v4(),
            name: "Ravi".into(),
            role: StaffRole::Agent,
            district: "Puri".into(),
            zones: vec!["North".into()],
            active: true,
        };
        assert!(agent.covers("Puri", "North"));
        assert!(!agent.covers("Puri", "South"));
        assert!(!agent.covers("Khordha", "North"));

        agent.role = StaffRole::Staff;
        assert!(!agent.covers("Puri", "North"));
        agent.role = StaffRole::Agent;
        agent.active = false;
        assert!(!agent.covers("Puri", "North"));
    }

    #[test]
    fn applying_delta_moves_every_field() {
        let mut account = CustomerAccount {
            id: Uuid::new_v4(),
            district: None,
            wallet_balance: BigDecimal::from(10),
            active_units: 1,
            home_stock_ml: 500,
            order_count: 2,
        };
        let delta = AccountDelta {
            wallet: BigDecimal::from(-4),
            active_units: 2,
            home_stock_ml: 40_000,
            order_count: 1,
        };
        account.apply(&delta);
        assert_eq!(account.wallet_balance, BigDecimal::from(6));
        assert_eq!(account.active_units, 3);
        assert_eq!(account.home_stock_ml, 40_500);
        assert_eq!(account.order_count, 3);
        assert!(AccountDelta::none().is_empty());
        assert!(!delta.is_empty());
    }
}
