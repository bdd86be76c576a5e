use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DEPOSIT_PER_UNIT: i64 = 200;
pub const DEFAULT_CONTAINER_VOLUME_ML: i64 = 20_000;

/// Fixed business constants the ledgers price and measure with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerParams {
    /// Refundable deposit held per container on loan.
    pub deposit_per_unit: BigDecimal,
    /// Water volume of one container, in millilitres.
    pub container_volume_ml: i64,
}

impl LedgerParams {
    pub fn new(deposit_per_unit: BigDecimal, container_volume_ml: i64) -> Self {
        Self {
            deposit_per_unit,
            container_volume_ml,
        }
    }

    pub fn deposit_for(&self, units: i32) -> BigDecimal {
        &self.deposit_per_unit * BigDecimal::from(units)
    }
}

impl Default for LedgerParams {
    fn default() -> Self {
        Self::new(
            BigDecimal::from(DEFAULT_DEPOSIT_PER_UNIT),
            DEFAULT_CONTAINER_VOLUME_ML,
        )
    }
}
