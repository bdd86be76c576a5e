use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use shared::*;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::handlers::{OrderFilter, OrderLedger, Transitioned};
use crate::returns::{ReturnFilter, ReturnLedger};

#[derive(Clone)]
pub struct AppState {
    pub orders: OrderLedger,
    pub returns: ReturnLedger,
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct ReturnStatusRequest {
    pub status: ReturnStatus,
}

#[derive(Debug, Deserialize)]
pub struct AssignmentRequest {
    pub agent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub agent_id: Uuid,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", post(change_order_status))
        .route("/orders/:id/assignment", put(reassign_order))
        .route("/orders/:id/claim", post(claim_order))
        .route("/returns", post(create_return).get(list_returns))
        .route("/returns/:id", get(get_return))
        .route("/returns/:id/status", post(change_return_status))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(draft): Json<OrderDraft>,
) -> Result<Json<Order>, ServiceError> {
    Ok(Json(state.orders.create_order(draft).await?))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>, ServiceError> {
    Ok(Json(state.orders.list(&filter).await?))
}

pub async fn get_order(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Order>, ServiceError> {
    Ok(Json(state.orders.get(id).await?))
}

pub async fn change_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<OrderStatusRequest>,
) -> Result<Json<Transitioned<Order>>, ServiceError> {
    Ok(Json(state.orders.transition(id, request.status).await?))
}

pub async fn reassign_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignmentRequest>,
) -> Result<Json<Order>, ServiceError> {
    Ok(Json(state.orders.reassign(id, request.agent_id).await?))
}

pub async fn claim_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ClaimRequest>,
) -> Result<Json<Order>, ServiceError> {
    Ok(Json(state.orders.claim(id, request.agent_id).await?))
}

pub async fn create_return(
    State(state): State<AppState>,
    Json(draft): Json<ReturnDraft>,
) -> Result<Json<ReturnRequest>, ServiceError> {
    Ok(Json(state.returns.create_return(draft).await?))
}

pub async fn list_returns(
    State(state): State<AppState>,
    Query(filter): Query<ReturnFilter>,
) -> Result<Json<Vec<ReturnRequest>>, ServiceError> {
    Ok(Json(state.returns.list(&filter).await?))
}

pub async fn get_return(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReturnRequest>, ServiceError> {
    Ok(Json(state.returns.get(id).await?))
}

pub async fn change_return_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReturnStatusRequest>,
) -> Result<Json<Transitioned<ReturnRequest>>, ServiceError> {
    Ok(Json(state.returns.transition(id, request.status).await?))
}

pub async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use diesel_async::pooled_connection::bb8::Pool;
    use diesel_async::pooled_connection::AsyncDieselConnectionManager;
    use diesel_async::AsyncPgConnection;
    use tower::ServiceExt;

    // Never connects: requests under test are answered before touching storage.
    fn router() -> Router {
        let manager =
            AsyncDieselConnectionManager::<AsyncPgConnection>::new("postgres://unused@127.0.0.1:1/none");
        let pool = Pool::builder().build_unchecked(manager);
        let params = LedgerParams::default();
        create_router(AppState {
            orders: OrderLedger::new(pool.clone(), params.clone()),
            returns: ReturnLedger::new(pool, params),
        })
    }

    #[tokio::test]
    async fn health_check_answers_ok() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn unknown_target_status_is_rejected_before_the_ledger() {
        let uri = format!("/orders/{}/status", Uuid::new_v4());
        let response = router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"status":"returned"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn malformed_order_id_is_a_bad_request() {
        let response = router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/orders/not-a-uuid/status")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"status":"shipped"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn order_without_items_fails_validation_without_storage() {
        let body = serde_json::json!({
            "customer_id": Uuid::new_v4(),
            "items": [],
            "district": "Puri",
            "address": { "line": "Grand Road", "city": null, "state": null, "postal_code": "752001", "latitude": null, "longitude": null },
            "delivery_date": "2026-03-02",
            "payment_method": "upi"
        });
        let response = router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/orders")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), 4096).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["retryable"], false);
    }
}
