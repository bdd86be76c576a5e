use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("{entity} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("insufficient wallet balance: need {required}, have {available}")]
    InsufficientBalance { required: String, available: String },

    #[error("cannot return {requested} units, customer holds {active}")]
    InsufficientUnits { requested: i32, active: i32 },

    #[error("order {0} is already assigned")]
    AlreadyAssigned(Uuid),

    #[error("invalid request: {0}")]
    Invalid(String),
}

impl LedgerError {
    pub fn order_not_found(id: Uuid) -> Self {
        LedgerError::NotFound { entity: "order", id }
    }

    pub fn return_not_found(id: Uuid) -> Self {
        LedgerError::NotFound { entity: "return request", id }
    }

    pub fn customer_not_found(id: Uuid) -> Self {
        LedgerError::NotFound { entity: "customer", id }
    }

    pub fn agent_not_found(id: Uuid) -> Self {
        LedgerError::NotFound { entity: "agent", id }
    }
}
