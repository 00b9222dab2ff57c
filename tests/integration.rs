use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use batch_dispatch::api::rest::router;
use batch_dispatch::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

fn setup() -> axum::Router {
    router(Arc::new(AppState::new(1024, 900, 0)))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn delete_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = body_json(response).await;
    (status, body)
}

async fn seed_zone(app: &axum::Router) {
    let (status, _) = send(
        app,
        json_request(
            "POST",
            "/zones",
            json!({
                "id": "z1",
                "name": "North",
                "cities": ["Hamburg", "Kiel"],
                "base_fee": 4.5,
                "transit_days": 1
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

/// Creates a scheduled order for z1 / 2026-01-10 and walks it to the
/// given statuses in order.
async fn seed_order(app: &axum::Router, statuses: &[&str]) -> String {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/orders",
            json!({
                "zone_id": "z1",
                "scheduled_date": "2026-01-10",
                "total": 32.0
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["id"].as_str().unwrap().to_string();

    for target in statuses {
        let (status, _) = send(
            app,
            json_request(
                "POST",
                &format!("/orders/{id}/status"),
                json!({ "status": target }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "advancing to {target}");
    }

    id
}

async fn seed_driver(app: &axum::Router) -> String {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/drivers",
            json!({
                "name": "Dana",
                "vehicle_type": "motorbike",
                "rating": 4.8
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["id"].as_str().unwrap().to_string()
}

async fn create_batch(app: &axum::Router, order_ids: &[&str]) -> (String, Value) {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/batches",
            json!({
                "zone_id": "z1",
                "scheduled_date": "2026-01-10",
                "order_ids": order_ids
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["batch"]["id"].as_str().unwrap().to_string();
    (id, body)
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let (status, body) = send(&app, get_request("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["zones"], 0);
    assert_eq!(body["orders"], 0);
    assert_eq!(body["batches"], 0);
    assert_eq!(body["drivers"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let response = app.clone().oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("active_batches"));
}

#[tokio::test]
async fn create_zone_without_cities_returns_400() {
    let app = setup();
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/zones",
            json!({
                "id": "z9",
                "name": "Empty",
                "cities": [],
                "base_fee": 3.0,
                "transit_days": 2
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn zone_lookup_finds_covering_zone() {
    let app = setup();
    seed_zone(&app).await;

    let (status, body) = send(&app, get_request("/zones/lookup?city=kiel")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "z1");

    let (status, _) = send(&app, get_request("/zones/lookup?city=Munich")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn order_defaults_delivery_fee_to_zone_base_fee() {
    let app = setup();
    seed_zone(&app).await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/orders",
            json!({
                "zone_id": "z1",
                "scheduled_date": "2026-01-10",
                "total": 20.0
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["delivery_fee"], 4.5);
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn order_for_unknown_zone_returns_404() {
    let app = setup();
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/orders",
            json!({
                "zone_id": "nowhere",
                "scheduled_date": "2026-01-10",
                "total": 20.0
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn eligible_orders_filters_by_zone_date_and_status() {
    let app = setup();
    seed_zone(&app).await;

    let confirmed = seed_order(&app, &["confirmed"]).await;
    let pending = seed_order(&app, &[]).await;

    let (status, body) = send(
        &app,
        get_request("/batches/eligible?zone_id=z1&date=2026-01-10"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&confirmed.as_str()));
    assert!(!ids.contains(&pending.as_str()));

    let (_, body) = send(
        &app,
        get_request("/batches/eligible?zone_id=z1&date=2026-01-11"),
    )
    .await;
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn concurrent_claim_skips_taken_orders_and_reports_them() {
    let app = setup();
    seed_zone(&app).await;

    let o1 = seed_order(&app, &["confirmed"]).await;
    let o2 = seed_order(&app, &["confirmed"]).await;
    let o3 = seed_order(&app, &["confirmed"]).await;

    let (_, body) = create_batch(&app, &[&o1, &o2]).await;
    let claimed: Vec<&str> = body["claim"]["claimed"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(claimed.len(), 2);
    assert!(claimed.contains(&o1.as_str()) && claimed.contains(&o2.as_str()));

    // the second operator listed the same orders before the first claim won
    let (_, body) = create_batch(&app, &[&o2, &o3]).await;
    let claimed: Vec<&str> = body["claim"]["claimed"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(claimed, vec![o3.as_str()]);

    let rejected = body["claim"]["rejected"].as_array().unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0]["order_id"], o2.as_str());
    assert_eq!(rejected[0]["reason"], "already_claimed");
}

#[tokio::test]
async fn batch_cannot_leave_collecting_with_no_members() {
    let app = setup();
    seed_zone(&app).await;

    let (batch_id, _) = create_batch(&app, &[]).await;
    let (status, body) = send(
        &app,
        json_request("POST", &format!("/batches/{batch_id}/ready"), json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("no member orders"));
}

#[tokio::test]
async fn assigning_an_unavailable_driver_is_rejected() {
    let app = setup();
    seed_zone(&app).await;

    let o1 = seed_order(&app, &["confirmed"]).await;
    let (batch_id, _) = create_batch(&app, &[&o1]).await;
    send(
        &app,
        json_request("POST", &format!("/batches/{batch_id}/ready"), json!({})),
    )
    .await;

    let driver_id = seed_driver(&app).await;
    let (status, _) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/drivers/{driver_id}/availability"),
            json!({ "is_available": false }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/batches/{batch_id}/assign"),
            json!({ "driver_id": driver_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn batch_cannot_depart_before_every_member_is_ready() {
    let app = setup();
    seed_zone(&app).await;

    let ready = seed_order(&app, &["confirmed", "preparing", "ready_for_pickup"]).await;
    let lagging = seed_order(&app, &["confirmed"]).await;

    let (batch_id, _) = create_batch(&app, &[&ready, &lagging]).await;
    send(
        &app,
        json_request("POST", &format!("/batches/{batch_id}/ready"), json!({})),
    )
    .await;

    let driver_id = seed_driver(&app).await;
    send(
        &app,
        json_request(
            "POST",
            &format!("/batches/{batch_id}/assign"),
            json!({ "driver_id": driver_id }),
        ),
    )
    .await;

    let (status, body) = send(
        &app,
        json_request("POST", &format!("/batches/{batch_id}/depart"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("not ready for pickup"));
}

#[tokio::test]
async fn full_batch_flow_from_claim_to_completion() {
    let app = setup();
    seed_zone(&app).await;

    let o1 = seed_order(&app, &["confirmed", "preparing", "ready_for_pickup"]).await;
    let o2 = seed_order(&app, &["confirmed", "preparing", "ready_for_pickup"]).await;

    let (batch_id, body) = create_batch(&app, &[&o1, &o2]).await;
    assert_eq!(body["batch"]["status"], "collecting");
    assert_eq!(body["batch"]["batch_number"], "B-Z1-20260110-001");

    let (status, body) = send(
        &app,
        json_request("POST", &format!("/batches/{batch_id}/ready"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");

    let driver_id = seed_driver(&app).await;
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/batches/{batch_id}/assign"),
            json!({ "driver_id": driver_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["batch"]["status"], "assigned");
    assert_eq!(body["confirmation"]["active_batches"], 0);

    // vendor handoff for o1: wrong code, right code, replay
    let (status, code) = send(
        &app,
        json_request("POST", &format!("/orders/{o1}/codes/pickup"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let otp = code["otp"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{o1}/codes/pickup/validate"),
            json!({ "code": "not-the-code" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{o1}/codes/pickup/validate"),
            json!({ "code": otp }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "picked_up");

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{o1}/codes/pickup/validate"),
            json!({ "code": otp }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        json_request("POST", &format!("/batches/{batch_id}/depart"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "in_transit");

    // both members are now in transit; deliver them
    for order_id in [&o1, &o2] {
        let (status, body) = send(&app, get_request(&format!("/orders/{order_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "in_transit");

        let (status, code) = send(
            &app,
            json_request(
                "POST",
                &format!("/orders/{order_id}/codes/delivery"),
                json!({}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                &format!("/orders/{order_id}/codes/delivery/validate"),
                json!({ "code": code["qr_token"] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "delivered");
    }

    let (status, body) = send(
        &app,
        json_request("POST", &format!("/batches/{batch_id}/complete"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert!(body["completed_at"].is_string());

    let (_, codes) = send(&app, get_request(&format!("/batches/{batch_id}/codes"))).await;
    assert_eq!(codes.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn completing_with_a_non_terminal_member_is_rejected() {
    let app = setup();
    seed_zone(&app).await;

    let o1 = seed_order(&app, &["confirmed", "preparing", "ready_for_pickup"]).await;
    let (batch_id, _) = create_batch(&app, &[&o1]).await;
    send(
        &app,
        json_request("POST", &format!("/batches/{batch_id}/ready"), json!({})),
    )
    .await;
    let driver_id = seed_driver(&app).await;
    send(
        &app,
        json_request(
            "POST",
            &format!("/batches/{batch_id}/assign"),
            json!({ "driver_id": driver_id }),
        ),
    )
    .await;
    send(
        &app,
        json_request("POST", &format!("/batches/{batch_id}/depart"), json!({})),
    )
    .await;

    let (status, _) = send(
        &app,
        json_request("POST", &format!("/batches/{batch_id}/complete"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn reassign_is_rejected_once_in_transit() {
    let app = setup();
    seed_zone(&app).await;

    let o1 = seed_order(&app, &["confirmed", "preparing", "ready_for_pickup"]).await;
    let (batch_id, _) = create_batch(&app, &[&o1]).await;
    send(
        &app,
        json_request("POST", &format!("/batches/{batch_id}/ready"), json!({})),
    )
    .await;

    let d1 = seed_driver(&app).await;
    let d2 = seed_driver(&app).await;
    send(
        &app,
        json_request(
            "POST",
            &format!("/batches/{batch_id}/assign"),
            json!({ "driver_id": d1 }),
        ),
    )
    .await;

    // a second assign without reassigning is not a legal transition
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/batches/{batch_id}/assign"),
            json!({ "driver_id": d2 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // reassigning while still assigned is fine
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/batches/{batch_id}/reassign"),
            json!({ "driver_id": d2 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["batch"]["driver_id"], d2.as_str());

    send(
        &app,
        json_request("POST", &format!("/batches/{batch_id}/depart"), json!({})),
    )
    .await;

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/batches/{batch_id}/reassign"),
            json!({ "driver_id": d1 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn cancelling_a_batch_releases_claims_for_rebatching() {
    let app = setup();
    seed_zone(&app).await;

    let o1 = seed_order(&app, &["confirmed"]).await;
    let (b1, _) = create_batch(&app, &[&o1]).await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/batches/{b1}/cancel"),
            json!({ "reason": "vendor closed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["cancel_reason"], "vendor closed");

    let (_, body) = send(&app, get_request(&format!("/orders/{o1}"))).await;
    assert!(body["batch_id"].is_null());

    // immediately claimable by a fresh batch
    let (_, body) = create_batch(&app, &[&o1]).await;
    assert_eq!(body["claim"]["claimed"].as_array().unwrap().len(), 1);

    // the cancelled batch is terminal and immutable
    let (status, _) = send(
        &app,
        json_request("POST", &format!("/batches/{b1}/ready"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn cancel_without_a_reason_records_it_as_omitted() {
    let app = setup();
    seed_zone(&app).await;

    let (batch_id, _) = create_batch(&app, &[]).await;
    let (status, body) = send(
        &app,
        json_request("POST", &format!("/batches/{batch_id}/cancel"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["cancel_reason"].is_null());
    assert!(body["cancelled_at"].is_string());
}

#[tokio::test]
async fn single_order_removal_is_collecting_only() {
    let app = setup();
    seed_zone(&app).await;

    let o1 = seed_order(&app, &["confirmed"]).await;
    let o2 = seed_order(&app, &["confirmed"]).await;
    let (batch_id, _) = create_batch(&app, &[&o1, &o2]).await;

    let (status, body) = send(
        &app,
        delete_request(&format!("/batches/{batch_id}/orders/{o1}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_ids"].as_array().unwrap().len(), 1);

    let (_, body) = send(&app, get_request(&format!("/orders/{o1}"))).await;
    assert!(body["batch_id"].is_null());

    send(
        &app,
        json_request("POST", &format!("/batches/{batch_id}/ready"), json!({})),
    )
    .await;

    let (status, _) = send(
        &app,
        delete_request(&format!("/batches/{batch_id}/orders/{o2}")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn order_status_is_idempotent_forward_only() {
    let app = setup();
    seed_zone(&app).await;

    let id = seed_order(&app, &["confirmed"]).await;

    // re-requesting the current status is a no-op, not an error
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{id}/status"),
            json!({ "status": "confirmed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{id}/status"),
            json!({ "status": "pending" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{id}/status"),
            json!({ "status": "cancelled" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{id}/status"),
            json!({ "status": "cancelled", "reason": "customer request" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
}

#[tokio::test]
async fn pickup_code_cannot_be_issued_before_ready_for_pickup() {
    let app = setup();
    seed_zone(&app).await;

    let id = seed_order(&app, &["confirmed"]).await;
    let (status, _) = send(
        &app,
        json_request("POST", &format!("/orders/{id}/codes/pickup"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
