//! A small order service wired through sluice.
//!
//! ```text
//! cargo run --example cqs
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sluice::middleware::{
    Authorization, AuthorizationOutcome, Logging, Timeout, Validate, Validation,
    ValidationError,
};
use sluice::{
    CancellationSignal, ConfigurationError, Error, Handler, HandlerRegistry, InvocationContext,
    Message, MessageKind, Metadata, PipelineBuilder, PipelineSettings, Services,
};

// ── Messages ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct PlaceOrder {
    customer: String,
    sku: String,
    quantity: u32,
}

impl Message for PlaceOrder {
    type Response = u64;
}

impl Validate for PlaceOrder {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        errors
            .check(!self.sku.is_empty(), "sku", "required")
            .check((1..=100).contains(&self.quantity), "quantity", "must be between 1 and 100");
        errors.into_result()
    }
}

#[derive(Clone, Debug)]
struct GetOrder {
    id: u64,
}

#[derive(Clone, Debug)]
struct Order {
    customer: String,
    sku: String,
    quantity: u32,
}

impl Message for GetOrder {
    type Response = Option<Order>;
    const KIND: MessageKind = MessageKind::Query;
}

// ── Handlers ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Store {
    orders: Mutex<HashMap<u64, Order>>,
}

struct PlaceOrderHandler(Arc<Store>);

#[async_trait]
impl Handler<PlaceOrder> for PlaceOrderHandler {
    async fn handle(&self, cmd: PlaceOrder, cancel: CancellationSignal) -> Result<u64, Error> {
        cancel.check()?;
        let mut orders = self.0.orders.lock();
        let id = orders.len() as u64 + 1;
        orders.insert(id, Order { customer: cmd.customer, sku: cmd.sku, quantity: cmd.quantity });
        Ok(id)
    }

    fn configure_pipeline(
        pipeline: &mut PipelineBuilder<PlaceOrder>,
        _services: &Services,
    ) -> Result<(), ConfigurationError> {
        pipeline
            .use_middleware(Logging::new())
            .use_middleware(Authorization::new().with_check(signed_in))
            .use_middleware(Validation)
            .use_middleware(Timeout::new(Duration::from_secs(2)));
        Ok(())
    }
}

fn signed_in(ctx: &InvocationContext<PlaceOrder>) -> AuthorizationOutcome {
    let principal = ctx.metadata().get("x-principal");
    AuthorizationOutcome::require(
        principal == Some(ctx.message().customer.as_str()),
        "orders can only be placed by the signed-in customer",
    )
}

struct GetOrderHandler(Arc<Store>);

#[async_trait]
impl Handler<GetOrder> for GetOrderHandler {
    async fn handle(&self, query: GetOrder, _: CancellationSignal) -> Result<Option<Order>, Error> {
        Ok(self.0.orders.lock().get(&query.id).cloned())
    }
}

const QUERY_SETTINGS: &str = r#"{
    "logging": { "pre_level": "debug", "post_level": "debug" },
    "timeout_ms": 500,
    "retry": { "max_attempts": 3, "delay_ms": 50 }
}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let store = Arc::new(Store::default());
    let settings = PipelineSettings::from_json_str(QUERY_SETTINGS)?;

    let mut registry = HandlerRegistry::new();
    registry
        .register::<PlaceOrder, _>(PlaceOrderHandler(Arc::clone(&store)))?
        .register_with::<GetOrder, _, _>(GetOrderHandler(Arc::clone(&store)), move |p, _| {
            settings.apply(p)
        })?;

    // A transport would build this from the incoming request.
    let mut headers = http::HeaderMap::new();
    headers.insert("x-principal", http::HeaderValue::from_static("ada"));
    let metadata = Metadata::from_headers(&headers);

    let place = registry.proxy::<PlaceOrder>()?;
    let order = PlaceOrder { customer: "ada".into(), sku: "KB-01".into(), quantity: 2 };
    let ctx = InvocationContext::new(order, CancellationSignal::new()).with_metadata(metadata.clone());
    let id = place.invoke_context(ctx).await?;
    println!("placed order {id}");

    let invalid = PlaceOrder { customer: "ada".into(), sku: String::new(), quantity: 0 };
    let ctx = InvocationContext::new(invalid, CancellationSignal::new()).with_metadata(metadata.clone());
    if let Err(err) = place.invoke_context(ctx).await {
        println!("rejected: {err}");
    }

    let impostor = PlaceOrder { customer: "bob".into(), sku: "KB-01".into(), quantity: 1 };
    let ctx = InvocationContext::new(impostor, CancellationSignal::new()).with_metadata(metadata);
    if let Err(err) = place.invoke_context(ctx).await {
        println!("rejected: {err}");
    }

    if let Some(order) = registry.send(GetOrder { id }, CancellationSignal::new()).await? {
        println!("order {id}: {} x {} for {}", order.quantity, order.sku, order.customer);
    }

    Ok(())
}
