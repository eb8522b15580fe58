//! Customer-support tools backed by an in-memory order store.
//!
//! Four tools share one [`OrderStore`]: user lookup, order lookup, a
//! customer's order history, and cancellation. Only orders that are still
//! `Processing` can be cancelled; anything else is a business error that the
//! model gets to see and explain.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use toolwright_core::error::ToolError;
use toolwright_core::tool::{Tool, ToolPayload};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub product: String,
    pub quantity: u32,
    pub price: f64,
    pub status: OrderStatus,
}

#[derive(Debug, Default)]
struct StoreData {
    customers: Vec<Customer>,
    orders: BTreeMap<String, Order>,
}

/// Shared, mutable store of customers and their orders.
#[derive(Debug, Clone, Default)]
pub struct OrderStore {
    inner: Arc<RwLock<StoreData>>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with a handful of demo customers and orders.
    pub fn demo() -> Self {
        let customer = |id: &str, name: &str, email: &str, phone: &str, username: &str| Customer {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            username: username.into(),
        };
        let order = |id: &str, customer_id: &str, product: &str, quantity: u32, price: f64, status| Order {
            id: id.into(),
            customer_id: customer_id.into(),
            product: product.into(),
            quantity,
            price,
            status,
        };

        let customers = vec![
            customer("1213210", "John Doe", "john@gmail.com", "123-456-7890", "johndoe"),
            customer("2837622", "Priya Patel", "priya@candy.com", "987-654-3210", "priya123"),
            customer("3924156", "Liam Nguyen", "lnguyen@yahoo.com", "555-123-4567", "liamn"),
            customer("4782901", "Aaliyah Davis", "aaliyahd@hotmail.com", "111-222-3333", "adavis"),
            customer("5190753", "Hiroshi Nakamura", "hiroshi@gmail.com", "444-555-6666", "hiroshin"),
        ];
        let orders = vec![
            order("24601", "1213210", "Wireless Headphones", 1, 79.99, OrderStatus::Processing),
            order("13579", "1213210", "Smartphone Case", 2, 19.99, OrderStatus::Shipped),
            order("97531", "2837622", "Bluetooth Speaker", 1, 49.99, OrderStatus::Shipped),
            order("86420", "3924156", "Fitness Tracker", 1, 129.99, OrderStatus::Delivered),
            order("54321", "3924156", "Laptop Sleeve", 3, 24.99, OrderStatus::Processing),
            order("19283", "4782901", "Smartwatch", 1, 199.99, OrderStatus::Processing),
            order("47652", "5190753", "Portable Charger", 1, 29.99, OrderStatus::Delivered),
        ];

        Self {
            inner: Arc::new(RwLock::new(StoreData {
                customers,
                orders: orders.into_iter().map(|o| (o.id.clone(), o)).collect(),
            })),
        }
    }

    pub async fn insert_customer(&self, customer: Customer) {
        self.inner.write().await.customers.push(customer);
    }

    pub async fn insert_order(&self, order: Order) {
        self.inner.write().await.orders.insert(order.id.clone(), order);
    }

    pub async fn find_customer(&self, key: LookupKey, value: &str) -> Option<Customer> {
        let data = self.inner.read().await;
        data.customers
            .iter()
            .find(|c| match key {
                LookupKey::Email => c.email.eq_ignore_ascii_case(value),
                LookupKey::Phone => c.phone == value,
                LookupKey::Username => c.username == value,
            })
            .cloned()
    }

    pub async fn order(&self, order_id: &str) -> Option<Order> {
        self.inner.read().await.orders.get(order_id).cloned()
    }

    pub async fn orders_for(&self, customer_id: &str) -> Vec<Order> {
        self.inner
            .read()
            .await
            .orders
            .values()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect()
    }

    /// Cancel a processing order. Returns the status that blocked it otherwise.
    pub async fn cancel(&self, order_id: &str) -> Result<Order, CancelRefusal> {
        let mut data = self.inner.write().await;
        let order = data
            .orders
            .get_mut(order_id)
            .ok_or(CancelRefusal::NotFound)?;
        if order.status != OrderStatus::Processing {
            return Err(CancelRefusal::NotCancellable(order.status));
        }
        order.status = OrderStatus::Cancelled;
        Ok(order.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelRefusal {
    NotFound,
    NotCancellable(OrderStatus),
}

/// Attribute a customer can be looked up by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKey {
    Email,
    Phone,
    Username,
}

impl std::str::FromStr for LookupKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Self::Email),
            "phone" => Ok(Self::Phone),
            "username" => Ok(Self::Username),
            other => Err(format!("unknown lookup key '{other}'")),
        }
    }
}

fn required_str<'a>(arguments: &'a serde_json::Value, field: &str) -> Result<&'a str, ToolError> {
    arguments[field]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{field}' argument")))
}

fn to_payload<T: Serialize>(tool_name: &str, value: &T) -> Result<ToolPayload, ToolError> {
    serde_json::to_value(value)
        .map(ToolPayload::Json)
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: e.to_string(),
        })
}

fn refused(tool_name: &str, reason: String) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: tool_name.into(),
        reason,
    }
}

pub struct GetUserTool {
    store: OrderStore,
}

impl GetUserTool {
    pub fn new(store: OrderStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetUserTool {
    fn name(&self) -> &str {
        "get_user"
    }

    fn description(&self) -> &str {
        "Looks up a user by email, phone, or username."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "key": {
                    "type": "string",
                    "enum": ["email", "phone", "username"],
                    "description": "The attribute to search for a user by (email, phone, or username)."
                },
                "value": {
                    "type": "string",
                    "description": "The value to match for the specified attribute."
                }
            },
            "required": ["key", "value"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolPayload, ToolError> {
        let key: LookupKey = required_str(&arguments, "key")?
            .parse()
            .map_err(ToolError::InvalidArguments)?;
        let value = required_str(&arguments, "value")?;

        match self.store.find_customer(key, value).await {
            Some(customer) => to_payload(self.name(), &customer),
            None => Err(refused(self.name(), format!("no user found with that {}", describe(key)))),
        }
    }
}

fn describe(key: LookupKey) -> &'static str {
    match key {
        LookupKey::Email => "email",
        LookupKey::Phone => "phone",
        LookupKey::Username => "username",
    }
}

pub struct GetOrderByIdTool {
    store: OrderStore,
}

impl GetOrderByIdTool {
    pub fn new(store: OrderStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetOrderByIdTool {
    fn name(&self) -> &str {
        "get_order_by_id"
    }

    fn description(&self) -> &str {
        "Retrieves the details of a specific order based on the order ID."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "order_id": {
                    "type": "string",
                    "description": "The unique identifier for the order."
                }
            },
            "required": ["order_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolPayload, ToolError> {
        let order_id = required_str(&arguments, "order_id")?;
        match self.store.order(order_id).await {
            Some(order) => to_payload(self.name(), &order),
            None => Err(refused(self.name(), format!("order {order_id} not found"))),
        }
    }
}

pub struct GetCustomerOrdersTool {
    store: OrderStore,
}

impl GetCustomerOrdersTool {
    pub fn new(store: OrderStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetCustomerOrdersTool {
    fn name(&self) -> &str {
        "get_customer_orders"
    }

    fn description(&self) -> &str {
        "Retrieves the list of orders belonging to a user based on a user's customer id."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "customer_id": {
                    "type": "string",
                    "description": "The customer_id belonging to the user"
                }
            },
            "required": ["customer_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolPayload, ToolError> {
        let customer_id = required_str(&arguments, "customer_id")?;
        to_payload(self.name(), &self.store.orders_for(customer_id).await)
    }
}

/// Cancels processing orders. Not idempotent: a second call reports the
/// order as already cancelled.
pub struct CancelOrderTool {
    store: OrderStore,
}

impl CancelOrderTool {
    pub fn new(store: OrderStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CancelOrderTool {
    fn name(&self) -> &str {
        "cancel_order"
    }

    fn description(&self) -> &str {
        "Cancels an order based on a provided order_id. Only orders that are 'processing' can be cancelled."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "order_id": {
                    "type": "string",
                    "description": "The order_id pertaining to a particular order"
                }
            },
            "required": ["order_id"]
        })
    }

    fn is_idempotent(&self) -> bool {
        false
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolPayload, ToolError> {
        let order_id = required_str(&arguments, "order_id")?;
        match self.store.cancel(order_id).await {
            Ok(order) => {
                info!(order_id = %order.id, "Order cancelled");
                Ok(ToolPayload::Text(format!("Order {order_id} has been cancelled.")))
            }
            Err(CancelRefusal::NotFound) => {
                Err(refused(self.name(), format!("order {order_id} not found")))
            }
            Err(CancelRefusal::NotCancellable(status)) => Err(refused(
                self.name(),
                format!("order {order_id} is {status} and can no longer be cancelled"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_user_by_each_key() {
        let tool = GetUserTool::new(OrderStore::demo());

        let by_email = tool
            .execute(json!({"key": "email", "value": "John@Gmail.com"}))
            .await
            .unwrap();
        assert!(by_email.to_content().contains("1213210"));

        let by_phone = tool
            .execute(json!({"key": "phone", "value": "987-654-3210"}))
            .await
            .unwrap();
        assert!(by_phone.to_content().contains("Priya Patel"));

        let by_username = tool
            .execute(json!({"key": "username", "value": "liamn"}))
            .await
            .unwrap();
        assert!(by_username.to_content().contains("3924156"));
    }

    #[tokio::test]
    async fn unknown_user_is_business_error() {
        let tool = GetUserTool::new(OrderStore::demo());
        let err = tool
            .execute(json!({"key": "email", "value": "nobody@example.com"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn order_lookup_and_history() {
        let store = OrderStore::demo();

        let order = GetOrderByIdTool::new(store.clone())
            .execute(json!({"order_id": "24601"}))
            .await
            .unwrap();
        match order {
            ToolPayload::Json(v) => {
                assert_eq!(v["product"], "Wireless Headphones");
                assert_eq!(v["status"], "processing");
            }
            other => panic!("Expected JSON payload, got {other:?}"),
        }

        let history = GetCustomerOrdersTool::new(store)
            .execute(json!({"customer_id": "1213210"}))
            .await
            .unwrap();
        match history {
            ToolPayload::Json(serde_json::Value::Array(orders)) => assert_eq!(orders.len(), 2),
            other => panic!("Expected JSON array, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_only_processing_orders() {
        let store = OrderStore::demo();
        let tool = CancelOrderTool::new(store.clone());
        assert!(!tool.is_idempotent());

        let ok = tool.execute(json!({"order_id": "24601"})).await.unwrap();
        assert!(ok.to_content().contains("cancelled"));
        assert_eq!(
            store.order("24601").await.unwrap().status,
            OrderStatus::Cancelled
        );

        // Second attempt is refused
        let again = tool.execute(json!({"order_id": "24601"})).await.unwrap_err();
        assert!(again.to_string().contains("cancelled"));

        // Shipped orders cannot be cancelled
        let shipped = tool.execute(json!({"order_id": "13579"})).await.unwrap_err();
        assert!(shipped.to_string().contains("shipped"));
        assert_eq!(
            store.order("13579").await.unwrap().status,
            OrderStatus::Shipped
        );
    }

    #[tokio::test]
    async fn refused_cancellation_is_an_execution_failure() {
        let tool = CancelOrderTool::new(OrderStore::demo());
        match tool.execute(json!({"order_id": "13579"})).await {
            Err(ToolError::ExecutionFailed { tool_name, reason }) => {
                assert_eq!(tool_name, "cancel_order");
                assert_eq!(reason, "order 13579 is shipped and can no longer be cancelled");
            }
            other => panic!("Expected ExecutionFailed, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_unknown_order() {
        let tool = CancelOrderTool::new(OrderStore::demo());
        let err = tool.execute(json!({"order_id": "42"})).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn inserted_records_are_visible() {
        let store = OrderStore::new();
        store
            .insert_customer(Customer {
                id: "9".into(),
                name: "Test".into(),
                email: "t@example.com".into(),
                phone: "000".into(),
                username: "tester".into(),
            })
            .await;
        store
            .insert_order(Order {
                id: "42".into(),
                customer_id: "9".into(),
                product: "Widget".into(),
                quantity: 1,
                price: 1.0,
                status: OrderStatus::Processing,
            })
            .await;

        assert!(store.find_customer(LookupKey::Username, "tester").await.is_some());
        assert_eq!(store.orders_for("9").await.len(), 1);
        assert!(store.cancel("42").await.is_ok());
    }
}
