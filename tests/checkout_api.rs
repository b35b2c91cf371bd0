use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use storefront::domain::aggregates::{OrderNumber, Product, StockLevel, MAX_AMOUNT};
use storefront::http::{router, AppState};
use storefront::identity::MemorySessionStore;
use storefront::notifications::{LogMailer, Mailer, MockMailer, NotificationError};
use storefront::orders::{InMemoryOrderRepository, MockOrderRepository, OrderService, RepositoryError};
use storefront::cart_store::MemoryCartStorage;
use storefront::{CartItem, CartStore, CheckoutDetails, OrderStatus, ShippingAddress};

struct Harness {
    repo: InMemoryOrderRepository,
    app: Router,
}

fn harness(sessions: MemorySessionStore, mailer: Arc<dyn Mailer>) -> Harness {
    let repo = InMemoryOrderRepository::with_products([
        Product::new("A", "Alpha", 500, StockLevel::tracked(2)),
        Product::new("B", "Beta", 300, StockLevel::tracked(10)),
        Product::new("C", "Gift card", 1000, StockLevel::untracked()),
    ]);
    let service = OrderService::new(Arc::new(repo.clone()), mailer);
    let app = router(AppState::new(service, Arc::new(sessions), "session_token"));
    Harness { repo, app }
}

fn default_harness() -> Harness {
    harness(MemorySessionStore::new(), Arc::new(LogMailer::new("orders@example.com", "Storefront", "BDT")))
}

fn order_body() -> Value {
    json!({
        "items": [
            { "productId": "A", "name": "Alpha", "price": 500, "quantity": 2 },
            { "productId": "B", "name": "Beta", "price": 300, "quantity": 1 }
        ],
        "subtotal": 1300, "shippingCost": 60, "total": 1360,
        "customerName": "Rahim", "customerPhone": "01700000000",
        "shippingAddress": { "address": "House 1, Road 2", "city": "Dhaka", "area": "Gulshan" },
        "paymentMethod": "cod"
    })
}

fn post_order() -> axum::http::request::Builder {
    Request::builder().method(Method::POST).uri("/api/v1/orders").header(header::CONTENT_TYPE, "application/json")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

async fn submit(app: &Router, body: Value) -> (StatusCode, Value) {
    send(app, post_order().body(Body::from(body.to_string())).unwrap()).await
}

#[tokio::test]
async fn health_reports_service() {
    let h = default_harness();
    let (status, body) = send(&h.app, Request::builder().uri("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn guest_order_is_created_with_computed_totals() {
    let h = default_harness();
    let (status, body) = submit(&h.app, order_body()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    let number = body["order"]["orderNumber"].as_str().unwrap();
    assert!(OrderNumber::is_well_formed(number));

    let orders = h.repo.orders().await;
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order.id.to_string(), body["order"]["id"].as_str().unwrap());
    assert_eq!(order.user_id, None);
    assert_eq!(order.subtotal, 1300);
    assert_eq!(order.total, 1360);
    assert_eq!(order.items.iter().map(|i| i.total).collect::<Vec<_>>(), [1000, 300]);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.shipping_address.extra["area"], "Gulshan");
}

#[tokio::test]
async fn missing_phone_is_rejected_without_side_effects() {
    let h = default_harness();
    let mut body = order_body();
    body.as_object_mut().unwrap().remove("customerPhone");
    let (status, response) = submit(&h.app, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "customerPhone is required");
    assert!(h.repo.orders().await.is_empty());
    assert_eq!(h.repo.product("A").await.unwrap().stock.quantity(), Some(2));
}

#[tokio::test]
async fn empty_items_and_malformed_json_are_client_errors() {
    let h = default_harness();
    let mut body = order_body();
    body["items"] = json!([]);
    let (status, response) = submit(&h.app, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "items must not be empty");

    let request = post_order().body(Body::from("{\"items\": [")).unwrap();
    let (status, response) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].is_string());
    assert!(h.repo.orders().await.is_empty());
}

#[tokio::test]
async fn stock_is_floored_at_zero() {
    let h = default_harness();
    let mut body = order_body();
    body["items"] = json!([
        { "productId": "A", "name": "Alpha", "price": 500, "quantity": 5 },
        { "productId": "C", "name": "Gift card", "price": 1000, "quantity": 1 }
    ]);
    let (status, _) = submit(&h.app, body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(h.repo.product("A").await.unwrap().stock.quantity(), Some(0));
    assert_eq!(h.repo.product("C").await.unwrap().stock, StockLevel::untracked());
}

#[tokio::test]
async fn bearer_token_attributes_order_to_user() {
    let (api_user, web_user) = (Uuid::new_v4(), Uuid::new_v4());
    let sessions = MemorySessionStore::new().with_bearer("mobile-token", api_user).with_cookie("browser-session", web_user);
    let h = harness(sessions, Arc::new(MockMailer::new()));

    let body = order_body();
    let request = post_order()
        .header(header::AUTHORIZATION, "Bearer mobile-token")
        .header(header::COOKIE, "session_token=browser-session")
        .body(Body::from(body.to_string())).unwrap();
    assert_eq!(send(&h.app, request).await.0, StatusCode::CREATED);

    let request = post_order()
        .header(header::COOKIE, "session_token=browser-session")
        .body(Body::from(body.to_string())).unwrap();
    assert_eq!(send(&h.app, request).await.0, StatusCode::CREATED);

    let users: Vec<_> = h.repo.orders().await.iter().map(|o| o.user_id).collect();
    assert_eq!(users, [Some(api_user), Some(web_user)]);
}

#[tokio::test]
async fn paid_orders_start_confirmed() {
    let h = default_harness();
    let mut body = order_body();
    body["paymentStatus"] = json!("paid");
    body["paymentMethod"] = json!("card");
    assert_eq!(submit(&h.app, body).await.0, StatusCode::CREATED);
    assert_eq!(h.repo.orders().await[0].status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn email_failure_still_returns_success() {
    let mut mailer = MockMailer::new();
    mailer.expect_send_order_confirmation().times(1).returning(|_, _| Err(NotificationError::Delivery("smtp down".into())));
    let h = harness(MemorySessionStore::new(), Arc::new(mailer));
    let mut body = order_body();
    body["customerEmail"] = json!("rahim@example.com");
    let (status, response) = submit(&h.app, body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response["success"], true);
    assert_eq!(h.repo.orders().await.len(), 1);
}

#[tokio::test]
async fn storage_failure_is_opaque_server_error() {
    let mut repo = MockOrderRepository::new();
    repo.expect_place_order().returning(|_| Err(RepositoryError::Sql(sqlx::Error::PoolTimedOut)));
    let service = OrderService::new(Arc::new(repo), Arc::new(MockMailer::new()));
    let app = router(AppState::new(service, Arc::new(MemorySessionStore::new()), "session_token"));
    let (status, response) = submit(&app, order_body()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response, json!({ "error": "Failed to create order" }));
}

#[tokio::test]
async fn repeated_idempotency_key_returns_first_order() {
    let h = default_harness();
    let body = order_body();
    let request = || post_order().header("Idempotency-Key", "checkout-42").body(Body::from(body.to_string())).unwrap();
    let (first_status, first) = send(&h.app, request()).await;
    let (second_status, second) = send(&h.app, request()).await;
    assert_eq!(first_status, StatusCode::CREATED);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(first["order"], second["order"]);
    assert_eq!(h.repo.orders().await.len(), 1);
    assert_eq!(h.repo.product("A").await.unwrap().stock.quantity(), Some(0));
    assert_eq!(h.repo.product("B").await.unwrap().stock.quantity(), Some(9));
}

#[tokio::test]
async fn stored_order_can_be_read_back() {
    let h = default_harness();
    let (_, created) = submit(&h.app, order_body()).await;
    let id = created["order"]["id"].as_str().unwrap();
    let (status, order) = send(&h.app, Request::builder().uri(format!("/api/v1/orders/{id}")).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["orderNumber"], created["order"]["orderNumber"]);
    assert_eq!(order["total"], 1360);
    assert_eq!(order["status"], "pending");

    let missing = format!("/api/v1/orders/{}", Uuid::new_v4());
    let (status, body) = send(&h.app, Request::builder().uri(missing).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Order not found");
}

#[tokio::test]
async fn cart_checkout_end_to_end() {
    let storage = MemoryCartStorage::new();
    let mut cart = CartStore::open(Arc::new(storage.clone())).await;
    cart.add_item(CartItem::new("A", "Alpha", 500).with_quantity(2));
    cart.add_item(CartItem::new("B", "Beta", 300));
    assert_eq!(cart.subtotal(), 1300);

    let request = cart.checkout_request(CheckoutDetails {
        customer_name: "Rahim".into(),
        customer_phone: "01700000000".into(),
        shipping_address: ShippingAddress::new("House 1, Road 2", "Dhaka"),
        shipping_cost: 60,
        payment_method: "cod".into(),
        ..CheckoutDetails::default()
    });

    let h = default_harness();
    let (status, body) = submit(&h.app, serde_json::to_value(&request).unwrap()).await;
    assert_eq!(status, StatusCode::CREATED);
    let order = h.repo.orders().await.remove(0);
    assert_eq!(order.order_number, body["order"]["orderNumber"]);
    assert_eq!(order.total, 1360);
    assert_eq!(order.items.iter().map(|i| i.total).collect::<Vec<_>>(), [1000, 300]);
    assert_eq!(order.idempotency_key, request.idempotency_key);

    // Checkout leaves the cart as it was.
    assert_eq!(cart.item_count(), 3);
    cart.close().await;
    assert!(storage.contents().await.is_some());
}

#[tokio::test]
async fn oversized_amounts_are_rejected_with_json_errors() {
    let h = default_harness();
    let mut body = order_body();
    body["items"] = json!([{ "productId": "A", "name": "Alpha", "price": i64::MAX, "quantity": 1 }]);
    let (status, response) = submit(&h.app, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "items[0].price is out of range");

    // Each figure is within bounds but the line total is not.
    let mut body = order_body();
    body["items"] = json!([{ "productId": "A", "name": "Alpha", "price": MAX_AMOUNT, "quantity": u32::MAX }]);
    let (status, response) = submit(&h.app, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "order total is out of range");

    assert!(h.repo.orders().await.is_empty());
    assert_eq!(h.repo.product("A").await.unwrap().stock.quantity(), Some(2));
}

#[tokio::test]
async fn payment_status_is_free_form() {
    let h = default_harness();
    let mut body = order_body();
    body["paymentStatus"] = json!("unpaid");
    assert_eq!(submit(&h.app, body).await.0, StatusCode::CREATED);

    let mut body = order_body();
    body["paymentStatus"] = json!("PAID");
    assert_eq!(submit(&h.app, body).await.0, StatusCode::CREATED);

    let statuses: Vec<_> = h.repo.orders().await.iter().map(|o| o.status).collect();
    assert_eq!(statuses, [OrderStatus::Pending, OrderStatus::Confirmed]);
}

#[tokio::test]
async fn malformed_order_id_gets_json_error() {
    let h = default_harness();
    let (status, body) = send(&h.app, Request::builder().uri("/api/v1/orders/not-a-uuid").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "order id must be a UUID");
}

#[tokio::test]
async fn idempotency_key_is_scoped_to_its_customer() {
    let owner = Uuid::new_v4();
    let h = harness(MemorySessionStore::new().with_bearer("owner-token", owner), Arc::new(MockMailer::new()));
    let body = order_body();

    let request = post_order()
        .header(header::AUTHORIZATION, "Bearer owner-token")
        .header("Idempotency-Key", "checkout-7")
        .body(Body::from(body.to_string())).unwrap();
    let (status, created) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::CREATED);

    let request = post_order().header("Idempotency-Key", "checkout-7").body(Body::from(body.to_string())).unwrap();
    let (status, response) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(response.get("order").is_none());
    assert!(!response.to_string().contains(created["order"]["orderNumber"].as_str().unwrap()));

    assert_eq!(h.repo.orders().await.len(), 1);
    assert_eq!(h.repo.orders().await[0].user_id, Some(owner));
}
