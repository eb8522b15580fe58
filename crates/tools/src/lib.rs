//! Built-in tool implementations for Toolwright.
//!
//! Four tool packs ship with the runtime:
//! - a customer-support pack backed by an in-memory [`support::OrderStore`]
//! - structured-output tools whose schemas shape extracted JSON
//! - a text-message pack meant to run under a mandatory tool policy
//! - a research pack with a stubbed web search and a calculator

pub mod research;
pub mod sms;
pub mod structured;
pub mod support;

use toolwright_core::error::ToolError;
use toolwright_core::tool::ToolRegistry;

pub use sms::Outbox;
pub use support::OrderStore;

/// Create a registry with the customer-support tools over `store`.
pub fn support_registry(store: OrderStore) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(support::GetUserTool::new(store.clone())))?;
    registry.register(Box::new(support::GetOrderByIdTool::new(store.clone())))?;
    registry.register(Box::new(support::GetCustomerOrdersTool::new(store.clone())))?;
    registry.register(Box::new(support::CancelOrderTool::new(store)))?;
    Ok(registry)
}

/// Create a registry with the structured-output tools.
pub fn structured_registry() -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(structured::SentimentScoresTool))?;
    registry.register(Box::new(structured::EntitiesTool))?;
    registry.register(Box::new(structured::ArticleClassificationTool))?;
    Ok(registry)
}

/// Create a registry with the text-message tools; sent texts go to `outbox`.
pub fn sms_registry(outbox: Outbox) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(sms::SendTextTool::new(outbox)))?;
    registry.register(Box::new(sms::CustomerInfoTool))?;
    Ok(registry)
}

/// Create a registry with web search, the calculator, and sentiment scoring.
pub fn research_registry() -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(research::WebSearchTool))?;
    registry.register(Box::new(research::CalculatorTool))?;
    registry.register(Box::new(structured::SentimentScoresTool))?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn support_registry_declares_tools_in_order() {
        let registry = support_registry(OrderStore::demo()).unwrap();
        assert_eq!(
            registry.names(),
            vec!["get_user", "get_order_by_id", "get_customer_orders", "cancel_order"]
        );
    }

    #[test]
    fn structured_registry_schemas() {
        let registry = structured_registry().unwrap();
        let schemas = registry.schemas();
        assert_eq!(schemas.len(), 3);
        assert!(schemas.iter().all(|s| s.input_schema["type"] == "object"));
        assert!(registry.contains("print_article_classification"));
    }

    #[test]
    fn tool_choice_packs() {
        let sms = sms_registry(Outbox::new()).unwrap();
        assert_eq!(sms.names(), vec!["send_text_to_user", "get_customer_info"]);

        let research = research_registry().unwrap();
        assert_eq!(
            research.names(),
            vec!["web_search", "calculator", "print_sentiment_scores"]
        );
    }
}
