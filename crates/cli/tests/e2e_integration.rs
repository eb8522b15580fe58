//! End-to-end integration tests for the Toolwright tool-use loop.
//!
//! These tests drive the full pipeline from user input to final reply: the
//! loop driver, the built-in tool packs, and the conversation log, with a
//! scripted gateway standing in for the hosted model.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::json;
use toolwright_agent::{LoopError, LoopSettings, TagReplyExtractor, ToolLoop};
use toolwright_core::error::GatewayError;
use toolwright_core::gateway::{
    GatewayReply, GatewayRequest, GatewayResponse, ModelGateway, ToolSelectionPolicy, Usage,
};
use toolwright_core::message::{Conversation, Role};
use toolwright_core::tool::{ToolInvocationRequest, ToolPayload};
use toolwright_tools::support::OrderStatus;
use toolwright_tools::{Outbox, OrderStore, sms_registry, structured_registry, support_registry};

// ── Scripted Gateway ─────────────────────────────────────────────────────

/// A gateway that returns scripted replies in sequence and records every
/// request it receives.
struct ScriptedGateway {
    script: Mutex<VecDeque<GatewayResponse>>,
    requests: Mutex<Vec<GatewayRequest>>,
}

impl ScriptedGateway {
    fn new(script: Vec<GatewayResponse>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, i: usize) -> GatewayRequest {
        self.requests.lock().unwrap()[i].clone()
    }
}

#[async_trait::async_trait]
impl ModelGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "e2e_scripted"
    }

    async fn complete(&self, request: GatewayRequest) -> Result<GatewayReply, GatewayError> {
        self.requests.lock().unwrap().push(request);
        let response = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| GatewayError::NotConfigured("script exhausted".into()))?;
        Ok(GatewayReply {
            response,
            usage: Some(Usage {
                input_tokens: 100,
                output_tokens: 20,
            }),
            model: "claude-test".into(),
        })
    }
}

fn call(id: &str, tool: &str, arguments: serde_json::Value) -> ToolInvocationRequest {
    ToolInvocationRequest {
        id: id.into(),
        tool_name: tool.into(),
        arguments,
    }
}

fn wants(requests: Vec<ToolInvocationRequest>) -> GatewayResponse {
    GatewayResponse::ToolRequests {
        preamble: Some("<thinking>I need to look this up.</thinking>".into()),
        requests,
    }
}

fn says(text: &str) -> GatewayResponse {
    GatewayResponse::FinalText(text.into())
}

fn support_loop(gateway: Arc<ScriptedGateway>, store: OrderStore) -> ToolLoop {
    let settings = LoopSettings {
        system: Some("You are a customer support chat bot.".into()),
        ..LoopSettings::default()
    };
    ToolLoop::new(gateway, Arc::new(support_registry(store).unwrap()), settings)
        .with_extractor(Box::new(TagReplyExtractor::default()))
}

// ── Customer Support ─────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_lookup_then_cancel_order() {
    let store = OrderStore::demo();
    let gateway = ScriptedGateway::new(vec![
        wants(vec![call(
            "toolu_1",
            "get_user",
            json!({"key": "email", "value": "john@gmail.com"}),
        )]),
        wants(vec![call(
            "toolu_2",
            "get_customer_orders",
            json!({"customer_id": "1213210"}),
        )]),
        wants(vec![call("toolu_3", "cancel_order", json!({"order_id": "24601"}))]),
        says("<thinking>Done.</thinking><reply>Your order 24601 has been cancelled.</reply>"),
    ]);
    let agent = support_loop(gateway.clone(), store.clone());
    let mut conv = Conversation::new();

    let outcome = agent
        .run_turn(
            &mut conv,
            "I'm john@gmail.com, please cancel my processing order",
            ToolSelectionPolicy::Automatic,
        )
        .await
        .unwrap();

    assert_eq!(outcome.reply, "Your order 24601 has been cancelled.");
    assert_eq!(outcome.iterations, 4);
    assert_eq!(outcome.tool_calls, 3);
    assert_eq!(outcome.usage.total(), 480);
    assert_eq!(gateway.calls(), 4);

    // user, then three request/result pairs, then the answer
    assert_eq!(conv.len(), 8);
    assert!(conv.outstanding_requests().is_empty());
    assert_eq!(
        store.order("24601").await.unwrap().status,
        OrderStatus::Cancelled
    );

    // The last request carried the whole history, results included
    let last = gateway.request(3);
    assert_eq!(last.turns.len(), 7);
    let cancelled = last.turns[6].tool_result_block().unwrap();
    assert_eq!(cancelled.correlating_id, "toolu_3");
    assert!(!cancelled.is_error);
    assert_eq!(
        cancelled.payload,
        ToolPayload::Text("Order 24601 has been cancelled.".into())
    );
}

#[tokio::test]
async fn e2e_refused_cancellation_is_fed_back() {
    let store = OrderStore::demo();
    let gateway = ScriptedGateway::new(vec![
        wants(vec![call("toolu_1", "cancel_order", json!({"order_id": "13579"}))]),
        says("<reply>Sorry, order 13579 has already shipped.</reply>"),
    ]);
    let agent = support_loop(gateway.clone(), store.clone());
    let mut conv = Conversation::new();

    let outcome = agent
        .run_turn(&mut conv, "Cancel order 13579", ToolSelectionPolicy::Automatic)
        .await
        .unwrap();

    assert_eq!(outcome.reply, "Sorry, order 13579 has already shipped.");
    let result = gateway.request(1).turns[2].tool_result_block().cloned().unwrap();
    assert!(result.is_error);
    assert!(result.payload.to_content().contains("can no longer be cancelled"));
    assert_eq!(store.order("13579").await.unwrap().status, OrderStatus::Shipped);
}

#[tokio::test]
async fn e2e_parallel_lookups_keep_request_order() {
    let gateway = ScriptedGateway::new(vec![
        wants(vec![
            call("toolu_a", "get_order_by_id", json!({"order_id": "24601"})),
            call("toolu_b", "get_order_by_id", json!({"order_id": "13579"})),
            call("toolu_c", "get_order_by_id", json!({"order_id": "00000"})),
        ]),
        says("<reply>Two of those orders exist.</reply>"),
    ]);
    let agent = support_loop(gateway.clone(), OrderStore::demo());
    let mut conv = Conversation::new();

    agent
        .run_turn(&mut conv, "Check 24601, 13579 and 00000", ToolSelectionPolicy::Automatic)
        .await
        .unwrap();

    let results: Vec<_> = conv
        .snapshot()
        .iter()
        .filter(|t| t.role == Role::ToolResult)
        .filter_map(|t| t.tool_result_block())
        .map(|r| (r.correlating_id.clone(), r.is_error))
        .collect();
    assert_eq!(
        results,
        vec![
            ("toolu_a".to_string(), false),
            ("toolu_b".to_string(), false),
            ("toolu_c".to_string(), true),
        ]
    );
}

#[tokio::test]
async fn e2e_multi_turn_conversation_keeps_history() {
    let gateway = ScriptedGateway::new(vec![
        says("<reply>Sure, what is your email address?</reply>"),
        wants(vec![call(
            "toolu_1",
            "get_user",
            json!({"key": "email", "value": "john@gmail.com"}),
        )]),
        says("<reply>Hi John! How can I help?</reply>"),
    ]);
    let agent = support_loop(gateway.clone(), OrderStore::demo());
    let mut conv = Conversation::new();

    let first = agent
        .run_turn(&mut conv, "Can you look up my account?", ToolSelectionPolicy::Automatic)
        .await
        .unwrap();
    assert_eq!(first.reply, "Sure, what is your email address?");

    let second = agent
        .run_turn(&mut conv, "john@gmail.com", ToolSelectionPolicy::Automatic)
        .await
        .unwrap();
    assert_eq!(second.reply, "Hi John! How can I help?");

    // The second turn's first request saw the first exchange
    assert_eq!(gateway.request(1).turns.len(), 3);
    assert_eq!(conv.len(), 6);
}

#[tokio::test]
async fn e2e_forced_tool_that_returns_text_fails_turn() {
    let gateway = ScriptedGateway::new(vec![says("I would rather just talk.")]);
    let agent = support_loop(gateway.clone(), OrderStore::demo());
    let mut conv = Conversation::new();

    let err = agent
        .run_turn(
            &mut conv,
            "Look up order 24601",
            ToolSelectionPolicy::MandatoryNamed("get_order_by_id".into()),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LoopError::Gateway(GatewayError::PolicyViolation(_))
    ));
    assert_eq!(
        gateway.request(0).policy,
        ToolSelectionPolicy::MandatoryNamed("get_order_by_id".into())
    );
    // The user turn stays; nothing else was appended
    assert_eq!(conv.len(), 1);
}

#[tokio::test]
async fn e2e_unknown_tool_leaves_no_dangling_request() {
    let gateway = ScriptedGateway::new(vec![wants(vec![call(
        "toolu_1",
        "refund_order",
        json!({"order_id": "24601"}),
    )])]);
    let agent = support_loop(gateway, OrderStore::demo());
    let mut conv = Conversation::new();

    let err = agent
        .run_turn(&mut conv, "Refund 24601", ToolSelectionPolicy::Automatic)
        .await
        .unwrap_err();

    assert!(matches!(err, LoopError::UnknownTool(ref name) if name == "refund_order"));
    assert!(conv.outstanding_requests().is_empty());
}

// ── Tool Choice ──────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_sms_assistant_under_mandatory_any() {
    let outbox = Outbox::new();
    let gateway = ScriptedGateway::new(vec![
        wants(vec![call(
            "toolu_1",
            "send_text_to_user",
            json!({"text": "Hi! What is your username?"}),
        )]),
        says(""),
        wants(vec![call(
            "toolu_2",
            "get_customer_info",
            json!({"username": "jenny76"}),
        )]),
        wants(vec![call(
            "toolu_3",
            "send_text_to_user",
            json!({"text": "Your email is jenny76@email.com"}),
        )]),
        says(""),
    ]);
    let agent = ToolLoop::new(
        gateway.clone(),
        Arc::new(sms_registry(outbox.clone()).unwrap()),
        LoopSettings::default(),
    );
    let mut conv = Conversation::new();

    agent
        .run_turn(&mut conv, "Hey there!", ToolSelectionPolicy::MandatoryAny)
        .await
        .unwrap();
    assert_eq!(outbox.drain().await, vec!["Hi! What is your username?"]);

    // An empty final answer is kept in the log and the next turn still works
    agent
        .run_turn(
            &mut conv,
            "I'm jenny76, what email do you have for me?",
            ToolSelectionPolicy::MandatoryAny,
        )
        .await
        .unwrap();
    assert_eq!(outbox.drain().await, vec!["Your email is jenny76@email.com"]);

    assert_eq!(
        gateway.request(2).policy,
        ToolSelectionPolicy::MandatoryAny
    );
    assert_eq!(gateway.request(3).policy, ToolSelectionPolicy::Automatic);
}

#[tokio::test]
async fn e2e_mandatory_any_rejects_two_tool_calls() {
    let outbox = Outbox::new();
    let gateway = ScriptedGateway::new(vec![wants(vec![
        call("toolu_1", "send_text_to_user", json!({"text": "Hi"})),
        call("toolu_2", "get_customer_info", json!({"username": "jenny76"})),
    ])]);
    let agent = ToolLoop::new(
        gateway,
        Arc::new(sms_registry(outbox.clone()).unwrap()),
        LoopSettings::default(),
    );

    let err = agent
        .run_turn(&mut Conversation::new(), "Hey", ToolSelectionPolicy::MandatoryAny)
        .await
        .unwrap_err();

    assert!(matches!(err, LoopError::Gateway(GatewayError::PolicyViolation(_))));
    assert!(outbox.drain().await.is_empty());
}

// ── Structured Extraction ────────────────────────────────────────────────

#[tokio::test]
async fn e2e_extract_sentiment_scores() {
    let scores = json!({"positive_score": 0.0, "negative_score": 0.791, "neutral_score": 0.209});
    let gateway = ScriptedGateway::new(vec![wants(vec![call(
        "toolu_1",
        "print_sentiment_scores",
        scores.clone(),
    )])]);
    let agent = ToolLoop::new(
        gateway.clone(),
        Arc::new(structured_registry().unwrap()),
        LoopSettings::default(),
    );

    let extraction = agent
        .extract_structured(
            "<text>I'm a HUGE hater of pickles.</text>",
            "print_sentiment_scores",
        )
        .await
        .unwrap();

    assert_eq!(extraction.value, scores);
    assert_eq!(extraction.attempts, 1);

    let sent = gateway.request(0);
    assert_eq!(sent.tools.len(), 1);
    assert_eq!(sent.tools[0].name, "print_sentiment_scores");
    assert_eq!(
        sent.policy,
        ToolSelectionPolicy::MandatoryNamed("print_sentiment_scores".into())
    );
}

#[tokio::test]
async fn e2e_extract_entities_retries_on_invalid_arguments() {
    let good = json!({"entities": [
        {"name": "John", "type": "PERSON", "context": "John works at Google"}
    ]});
    let gateway = ScriptedGateway::new(vec![
        wants(vec![call(
            "toolu_1",
            "print_entities",
            json!({"entities": [{"name": "John"}]}),
        )]),
        wants(vec![call("toolu_2", "print_entities", good.clone())]),
    ]);
    let agent = ToolLoop::new(
        gateway.clone(),
        Arc::new(structured_registry().unwrap()),
        LoopSettings::default(),
    );

    let extraction = agent
        .extract_structured("<text>John works at Google.</text>", "print_entities")
        .await
        .unwrap();

    assert_eq!(extraction.value, good);
    assert_eq!(extraction.attempts, 2);

    // The retry saw the schema complaint as an error result
    let feedback = gateway.request(1).turns[2].tool_result_block().cloned().unwrap();
    assert!(feedback.is_error);
    assert!(feedback.payload.to_content().contains("print_entities"));
}

#[tokio::test]
async fn e2e_extract_article_classification() {
    let classification = json!({
        "subject": "Octopus",
        "summary": "Octopuses are soft-bodied, eight-limbed molluscs.",
        "keywords": ["cephalopod", "mollusc", "intelligence"],
        "categories": [
            {"name": "Biology", "score": 0.95},
            {"name": "Marine life", "score": 0.9}
        ]
    });
    let gateway = ScriptedGateway::new(vec![wants(vec![call(
        "toolu_1",
        "print_article_classification",
        classification.clone(),
    )])]);
    let agent = ToolLoop::new(
        gateway.clone(),
        Arc::new(structured_registry().unwrap()),
        LoopSettings::default(),
    );

    let extraction = agent
        .extract_structured(
            "<document>The octopus is a soft-bodied mollusc.</document>",
            "print_article_classification",
        )
        .await
        .unwrap();

    assert_eq!(extraction.tool_name, "print_article_classification");
    assert_eq!(extraction.value, classification);
    assert_eq!(gateway.request(0).tools.len(), 1);
}
