//! Order lifecycle: pricing at checkout and the pending → shipped →
//! delivered / cancelled state machine.
//!
//! Everything here is a pure plan over a snapshot. The caller persists the
//! returned order and applies the account delta inside one transaction,
//! holding a lock on the order row while planning.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use num_traits::{Signed, Zero};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::model::{
    deposit_unit_quantity, AccountDelta, Address, CustomerAccount, LineItem, Order, OrderStatus, PaymentMethod,
    MAX_LINE_QUANTITY,
};
use crate::params::LedgerParams;

/// Result of a transition request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Applied(T),
    /// The target state was already reached; nothing to do.
    AlreadyApplied,
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }
}

/// Where dispatch placed a new order or pickup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placement {
    pub zone_name: Option<String>,
    pub agent_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderDraft {
    pub customer_id: Uuid,
    pub items: Vec<LineItem>,
    pub district: String,
    pub address: Address,
    pub delivery_date: NaiveDate,
    pub payment_method: PaymentMethod,
    /// Empty containers the customer hands back with this delivery.
    #[serde(default)]
    pub returned_units: i32,
    #[serde(default)]
    pub delivery_fee: BigDecimal,
    #[serde(default)]
    pub discount: BigDecimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub order: Order,
    pub account: AccountDelta,
}

impl OrderDraft {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.items.is_empty() {
            return Err(LedgerError::Invalid("order has no items".to_string()));
        }
        if let Some(item) = self.items.iter().find(|i| i.quantity <= 0) {
            return Err(LedgerError::Invalid(format!(
                "item {} has non-positive quantity {}",
                item.product_id, item.quantity
            )));
        }
        if let Some(item) = self.items.iter().find(|i| i.quantity > MAX_LINE_QUANTITY) {
            return Err(LedgerError::Invalid(format!(
                "item {} quantity {} exceeds {}",
                item.product_id, item.quantity, MAX_LINE_QUANTITY
            )));
        }
        if let Some(item) = self.items.iter().find(|i| i.unit_price.is_negative()) {
            return Err(LedgerError::Invalid(format!("item {} has a negative price", item.product_id)));
        }
        if self.delivery_fee.is_negative() || self.discount.is_negative() {
            return Err(LedgerError::Invalid("fees and discounts must not be negative".to_string()));
        }
        if self.returned_units < 0 {
            return Err(LedgerError::Invalid("returned units must not be negative".to_string()));
        }
        if self.district.trim().is_empty() {
            return Err(LedgerError::Invalid("district is required".to_string()));
        }
        Ok(())
    }

    /// Price the draft against the customer's current account and build the
    /// pending order. Wallet-paid orders carry a debit of the full total.
    pub fn place(
        self,
        customer: &CustomerAccount,
        params: &LedgerParams,
        placement: Placement,
        now: DateTime<Utc>,
    ) -> Result<PlacedOrder, LedgerError> {
        self.validate()?;
        if customer.id != self.customer_id {
            return Err(LedgerError::customer_not_found(self.customer_id));
        }

        let ordered_units = deposit_unit_quantity(&self.items)?;
        let returned_units = self
            .returned_units
            .min(ordered_units)
            .min(customer.active_units.max(0));
        let new_units = (ordered_units - returned_units).max(0);

        let subtotal = self
            .items
            .iter()
            .fold(BigDecimal::zero(), |acc, item| acc + item.line_total());
        let deposit_fee = params.deposit_for(new_units);
        let mut total_amount = &subtotal + &self.delivery_fee + &deposit_fee - &self.discount;
        if total_amount.is_negative() {
            total_amount = BigDecimal::zero();
        }

        let account = match self.payment_method {
            PaymentMethod::Wallet => {
                if customer.wallet_balance < total_amount {
                    return Err(LedgerError::InsufficientBalance {
                        required: total_amount.to_string(),
                        available: customer.wallet_balance.to_string(),
                    });
                }
                AccountDelta::wallet(-total_amount.clone())
            }
            PaymentMethod::Upi => AccountDelta::none(),
        };

        let order = Order {
            id: Uuid::new_v4(),
            customer_id: self.customer_id,
            items: self.items,
            subtotal,
            delivery_fee: self.delivery_fee,
            deposit_fee,
            discount: self.discount,
            total_amount,
            status: OrderStatus::Pending,
            delivery_date: self.delivery_date,
            district: self.district,
            address: self.address,
            payment_method: self.payment_method,
            returned_units,
            assigned_agent_id: placement.agent_id,
            zone_name: placement.zone_name,
            created_at: now,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
            updated_at: now,
        };

        Ok(PlacedOrder { order, account })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderTransition {
    pub from: OrderStatus,
    pub order: Order,
    pub account: AccountDelta,
}

impl OrderTransition {
    pub fn event_type(&self) -> &'static str {
        match self.order.status {
            OrderStatus::Pending => "OrderCreated",
            OrderStatus::Shipped => "OrderShipped",
            OrderStatus::Delivered => "OrderDelivered",
            OrderStatus::Cancelled => "OrderCancelled",
        }
    }
}

pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
        (from, to),
        (Pending, Shipped) | (Pending, Delivered) | (Pending, Cancelled) | (Shipped, Delivered) | (Shipped, Cancelled)
    )
}

/// Plan moving `order` to `target`.
///
/// Requests for a state already reached are `AlreadyApplied`, never errors.
/// Moves out of a terminal state or backwards are rejected.
pub fn plan_transition(
    order: &Order,
    target: OrderStatus,
    params: &LedgerParams,
    now: DateTime<Utc>,
) -> Result<Outcome<OrderTransition>, LedgerError> {
    if order.status == target {
        return Ok(Outcome::AlreadyApplied);
    }
    if !can_transition(order.status, target) {
        return Err(LedgerError::InvalidTransition {
            entity: "order",
            from: order.status.to_string(),
            to: target.to_string(),
        });
    }

    let mut next = order.clone();
    next.status = target;
    next.updated_at = now;

    let account = match target {
        OrderStatus::Shipped => {
            next.shipped_at.get_or_insert(now);
            AccountDelta::none()
        }
        OrderStatus::Delivered => {
            if order.delivered_at.is_some() {
                return Ok(Outcome::AlreadyApplied);
            }
            next.delivered_at = Some(now);
            delivery_effect(order, params)?
        }
        OrderStatus::Cancelled => {
            if order.cancelled_at.is_some() {
                return Ok(Outcome::AlreadyApplied);
            }
            next.cancelled_at = Some(now);
            AccountDelta::wallet(order.total_amount.clone())
        }
        OrderStatus::Pending => unreachable!("no transition leads back to pending"),
    };

    Ok(Outcome::Applied(OrderTransition {
        from: order.status,
        order: next,
        account,
    }))
}

fn delivery_effect(order: &Order, params: &LedgerParams) -> Result<AccountDelta, LedgerError> {
    let ordered = deposit_unit_quantity(&order.items)?;
    let new_units = (ordered - order.returned_units).max(0);
    let home_stock_ml = i64::from(ordered)
        .checked_mul(params.container_volume_ml)
        .ok_or_else(|| LedgerError::Invalid(format!("order {} stock volume out of range", order.id)))?;
    Ok(AccountDelta {
        wallet: BigDecimal::zero(),
        active_units: new_units,
        home_stock_ml,
        order_count: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
    }

    fn can(quantity: i32) -> LineItem {
        LineItem {
            product_id: "can-20l".to_string(),
            name: "20L Water Can".to_string(),
            unit_price: BigDecimal::from(50),
            quantity,
            counts_as_deposit_unit: true,
        }
    }

    fn bottle(quantity: i32) -> LineItem {
        LineItem {
            product_id: "bottle-1l".to_string(),
            name: "1L Bottle".to_string(),
            unit_price: BigDecimal::from(20),
            quantity,
            counts_as_deposit_unit: false,
        }
    }

    fn customer(wallet: i64, active_units: i32) -> CustomerAccount {
        CustomerAccount {
            id: Uuid::new_v4(),
            district: Some("Puri".to_string()),
            wallet_balance: BigDecimal::from(wallet),
            active_units,
            home_stock_ml: 0,
            order_count: 0,
        }
    }

    fn draft(customer: &CustomerAccount, items: Vec<LineItem>, payment_method: PaymentMethod) -> OrderDraft {
        OrderDraft {
            customer_id: customer.id,
            items,
            district: "Puri".to_string(),
            address: Address {
                line: "12 Grand Road".to_string(),
                city: Some("Puri".to_string()),
                state: Some("Odisha".to_string()),
                postal_code: Some("752001".to_string()),
                latitude: None,
                longitude: None,
            },
            delivery_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            payment_method,
            returned_units: 0,
            delivery_fee: BigDecimal::zero(),
            discount: BigDecimal::zero(),
        }
    }

    fn pending_order(items: Vec<LineItem>, returned_units: i32, total: i64) -> Order {
        let account = customer(0, 0);
        let mut order = draft(&account, items, PaymentMethod::Upi)
            .place(&account, &LedgerParams::default(), Placement::default(), now())
            .unwrap()
            .order;
        order.returned_units = returned_units;
        order.total_amount = BigDecimal::from(total);
        order
    }

    fn applied(outcome: Outcome<OrderTransition>) -> OrderTransition {
        match outcome {
            Outcome::Applied(t) => t,
            Outcome::AlreadyApplied => panic!("expected the transition to apply"),
        }
    }

    #[test]
    fn pricing_charges_deposit_only_for_new_containers() {
        let account = customer(0, 1);
        let mut d = draft(&account, vec![can(3), bottle(2)], PaymentMethod::Upi);
        d.returned_units = 2;
        d.delivery_fee = BigDecimal::from(15);
        d.discount = BigDecimal::from(5);

        let placed = d
            .place(&account, &LedgerParams::default(), Placement::default(), now())
            .unwrap();
        // returns capped by the one unit the customer actually holds
        assert_eq!(placed.order.returned_units, 1);
        assert_eq!(placed.order.subtotal, BigDecimal::from(190));
        assert_eq!(placed.order.deposit_fee, BigDecimal::from(400));
        assert_eq!(placed.order.total_amount, BigDecimal::from(600));
        assert_eq!(placed.order.status, OrderStatus::Pending);
        assert!(placed.account.is_empty());
    }

    #[test]
    fn returned_units_capped_by_ordered_quantity() {
        let account = customer(0, 10);
        let mut d = draft(&account, vec![can(2)], PaymentMethod::Upi);
        d.returned_units = 5;
        let placed = d
            .place(&account, &LedgerParams::default(), Placement::default(), now())
            .unwrap();
        assert_eq!(placed.order.returned_units, 2);
        assert_eq!(placed.order.deposit_fee, BigDecimal::zero());
    }

    #[test]
    fn discount_never_drives_total_negative() {
        let account = customer(0, 0);
        let mut d = draft(&account, vec![bottle(1)], PaymentMethod::Upi);
        d.discount = BigDecimal::from(1000);
        let placed = d
            .place(&account, &LedgerParams::default(), Placement::default(), now())
            .unwrap();
        assert_eq!(placed.order.total_amount, BigDecimal::zero());
    }

    #[test]
    fn wallet_payment_debits_total_or_is_rejected() {
        let account = customer(300, 0);
        let placed = draft(&account, vec![can(1)], PaymentMethod::Wallet)
            .place(&account, &LedgerParams::default(), Placement::default(), now())
            .unwrap();
        assert_eq!(placed.order.total_amount, BigDecimal::from(250));
        assert_eq!(placed.account.wallet, BigDecimal::from(-250));

        let poor = customer(100, 0);
        let err = draft(&poor, vec![can(1)], PaymentMethod::Wallet)
            .place(&poor, &LedgerParams::default(), Placement::default(), now())
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    }

    #[test]
    fn placement_is_recorded_on_the_order() {
        let account = customer(0, 0);
        let agent = Uuid::new_v4();
        let placed = draft(&account, vec![can(1)], PaymentMethod::Upi)
            .place(
                &account,
                &LedgerParams::default(),
                Placement {
                    zone_name: Some("North".to_string()),
                    agent_id: Some(agent),
                },
                now(),
            )
            .unwrap();
        assert_eq!(placed.order.zone_name.as_deref(), Some("North"));
        assert_eq!(placed.order.assigned_agent_id, Some(agent));
    }

    #[test]
    fn invalid_drafts_are_rejected() {
        let account = customer(0, 0);
        let empty = draft(&account, vec![], PaymentMethod::Upi);
        assert!(matches!(empty.validate(), Err(LedgerError::Invalid(_))));

        let zero = draft(&account, vec![can(0)], PaymentMethod::Upi);
        assert!(matches!(zero.validate(), Err(LedgerError::Invalid(_))));

        let bulk = draft(&account, vec![can(MAX_LINE_QUANTITY + 1)], PaymentMethod::Upi);
        assert!(matches!(bulk.validate(), Err(LedgerError::Invalid(_))));
        let at_limit = draft(&account, vec![can(MAX_LINE_QUANTITY)], PaymentMethod::Upi);
        assert!(at_limit.validate().is_ok());

        let other = customer(0, 0);
        let err = draft(&other, vec![can(1)], PaymentMethod::Upi)
            .place(&account, &LedgerParams::default(), Placement::default(), now())
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { entity: "customer", .. }));
    }

    #[test]
    fn oversized_quantities_never_reach_pricing() {
        let account = customer(0, 0);
        let err = draft(&account, vec![can(1_500_000_000); 2], PaymentMethod::Upi)
            .place(&account, &LedgerParams::default(), Placement::default(), now())
            .unwrap_err();
        assert!(matches!(err, LedgerError::Invalid(_)));
    }

    #[test]
    fn delivery_of_overflowing_stored_order_is_rejected() {
        let mut order = pending_order(vec![can(1)], 0, 250);
        order.items = vec![can(1_500_000_000); 2];
        let err = plan_transition(&order, OrderStatus::Delivered, &LedgerParams::default(), now()).unwrap_err();
        assert!(matches!(err, LedgerError::Invalid(_)));
    }

    #[test]
    fn delivering_one_can_adds_unit_stock_and_order_count() {
        let order = pending_order(vec![can(1)], 0, 250);
        let t = applied(plan_transition(&order, OrderStatus::Delivered, &LedgerParams::default(), now()).unwrap());

        assert_eq!(t.from, OrderStatus::Pending);
        assert_eq!(t.order.status, OrderStatus::Delivered);
        assert_eq!(t.order.delivered_at, Some(now()));
        assert_eq!(t.account.active_units, 1);
        assert_eq!(t.account.home_stock_ml, 20_000);
        assert_eq!(t.account.order_count, 1);
        assert!(t.account.wallet.is_zero());
        assert_eq!(t.event_type(), "OrderDelivered");
    }

    #[test]
    fn delivery_nets_out_returned_units_but_stocks_full_volume() {
        let order = pending_order(vec![can(3)], 2, 150);
        let t = applied(plan_transition(&order, OrderStatus::Delivered, &LedgerParams::default(), now()).unwrap());
        assert_eq!(t.account.active_units, 1);
        assert_eq!(t.account.home_stock_ml, 60_000);
    }

    #[test]
    fn delivery_without_containers_still_counts_the_order() {
        let order = pending_order(vec![bottle(6)], 0, 120);
        let t = applied(plan_transition(&order, OrderStatus::Delivered, &LedgerParams::default(), now()).unwrap());
        assert_eq!(t.account.active_units, 0);
        assert_eq!(t.account.home_stock_ml, 0);
        assert_eq!(t.account.order_count, 1);
    }

    #[test]
    fn container_volume_comes_from_params() {
        let order = pending_order(vec![can(2)], 0, 100);
        let params = LedgerParams::new(BigDecimal::from(150), 18_900);
        let t = applied(plan_transition(&order, OrderStatus::Delivered, &params, now()).unwrap());
        assert_eq!(t.account.home_stock_ml, 37_800);
    }

    #[test]
    fn repeated_delivery_is_a_no_op() {
        let order = pending_order(vec![can(1)], 0, 250);
        let t = applied(plan_transition(&order, OrderStatus::Delivered, &LedgerParams::default(), now()).unwrap());
        let again = plan_transition(&t.order, OrderStatus::Delivered, &LedgerParams::default(), now()).unwrap();
        assert_eq!(again, Outcome::AlreadyApplied);
    }

    #[test]
    fn cancellation_refunds_full_total_to_wallet_once() {
        let order = pending_order(vec![can(1)], 0, 450);
        let t = applied(plan_transition(&order, OrderStatus::Cancelled, &LedgerParams::default(), now()).unwrap());
        assert_eq!(t.account.wallet, BigDecimal::from(450));
        assert_eq!(t.account.active_units, 0);
        assert_eq!(t.account.home_stock_ml, 0);
        assert_eq!(t.order.cancelled_at, Some(now()));

        let again = plan_transition(&t.order, OrderStatus::Cancelled, &LedgerParams::default(), now()).unwrap();
        assert_eq!(again, Outcome::AlreadyApplied);
    }

    #[test]
    fn upi_orders_are_refunded_to_wallet_too() {
        let order = pending_order(vec![bottle(1)], 0, 20);
        assert_eq!(order.payment_method, PaymentMethod::Upi);
        let t = applied(plan_transition(&order, OrderStatus::Cancelled, &LedgerParams::default(), now()).unwrap());
        assert_eq!(t.account.wallet, BigDecimal::from(20));
    }

    #[test]
    fn shipping_sets_timestamp_without_accounting() {
        let order = pending_order(vec![can(1)], 0, 250);
        let t = applied(plan_transition(&order, OrderStatus::Shipped, &LedgerParams::default(), now()).unwrap());
        assert_eq!(t.order.shipped_at, Some(now()));
        assert!(t.account.is_empty());

        let later = now() + chrono::Duration::hours(2);
        let delivered = applied(plan_transition(&t.order, OrderStatus::Delivered, &LedgerParams::default(), later).unwrap());
        assert_eq!(delivered.from, OrderStatus::Shipped);
        assert_eq!(delivered.order.shipped_at, Some(now()));
        assert_eq!(delivered.order.delivered_at, Some(later));
    }

    #[test]
    fn terminal_and_backward_moves_are_rejected() {
        let order = pending_order(vec![can(1)], 0, 250);
        let delivered = applied(plan_transition(&order, OrderStatus::Delivered, &LedgerParams::default(), now()).unwrap()).order;

        for target in [OrderStatus::Shipped, OrderStatus::Cancelled, OrderStatus::Pending] {
            let err = plan_transition(&delivered, target, &LedgerParams::default(), now()).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidTransition { .. }), "{target}");
        }

        let shipped = applied(plan_transition(&order, OrderStatus::Shipped, &LedgerParams::default(), now()).unwrap()).order;
        let err = plan_transition(&shipped, OrderStatus::Pending, &LedgerParams::default(), now()).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InvalidTransition {
                entity: "order",
                from: "shipped".to_string(),
                to: "pending".to_string(),
            }
        );

        let cancelled = applied(plan_transition(&order, OrderStatus::Cancelled, &LedgerParams::default(), now()).unwrap()).order;
        assert!(plan_transition(&cancelled, OrderStatus::Delivered, &LedgerParams::default(), now()).is_err());
    }

    #[test]
    fn applying_planned_deltas_matches_delivery_scenario() {
        let mut account = customer(0, 0);
        let order = pending_order(vec![can(1)], 0, 250);
        let t = applied(plan_transition(&order, OrderStatus::Delivered, &LedgerParams::default(), now()).unwrap());
        account.apply(&t.account);
        if let Outcome::Applied(t) = plan_transition(&t.order, OrderStatus::Delivered, &LedgerParams::default(), now()).unwrap() {
            account.apply(&t.account);
        }
        assert_eq!(account.active_units, 1);
        assert_eq!(account.home_stock_ml, 20_000);
        assert_eq!(account.order_count, 1);
    }
}
