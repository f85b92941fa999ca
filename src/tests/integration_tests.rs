//! End-to-end scenarios across the gateway, risk engine and context
//! manager, driven through the public API with scripted transports and a
//! manual clock.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use crate::context::ContextManager;
use crate::errors::GatewayError;
use crate::gateway::mock::MockTransport;
use crate::gateway::{
    BreakerConfig, BreakerState, GatewayConfig, ResilientGateway, ServiceRequest, ServiceResponse,
};
use crate::risk::{RiskEngine, RiskFactor};
use crate::time::ManualClock;
use crate::types::{ChatMessage, ChatRole, SessionSnapshot, Sentiment, UserBehaviorProfile};

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// Scenario A: a long, error-laden, frustrated session for a historically
/// calm user still predicts escalation.
#[test]
fn scenario_a_heated_session_predicts_escalation() {
    let messages: Vec<ChatMessage> = (0..16)
        .map(|i| {
            let msg = ChatMessage::new(ChatRole::User, format!("still broken {i}"), ts(i * 60));
            if i < 3 {
                msg.with_sentiment(Sentiment::Frustrated)
            } else {
                msg.with_sentiment(Sentiment::Neutral)
            }
        })
        .collect();

    let session = SessionSnapshot {
        session_id: "sess-a".into(),
        user_id: "user-a".into(),
        messages,
        tools_invoked: vec!["station_status".into()],
        error_codes: vec!["E_CONNECTOR".into(), "E_PAYMENT_DECLINED".into()],
        stations_touched: vec!["st-100".into()],
        actions: vec!["restart_charge".into(), "switch_connector".into()],
        started_at: ts(0),
        evaluated_at: ts(20 * 60),
    };

    let profile = UserBehaviorProfile {
        user_id: "user-a".into(),
        escalation_rate: 0.1,
        resolution_rate: 0.9,
        avg_session_duration_minutes: 8.0,
        avg_message_count: 6.0,
        fraud_risk_score: 2.0,
        repeat_issue_frequency: 0.0,
        total_sessions: 12,
        last_session_at: Some(ts(0) - chrono::Duration::days(20)),
    };

    let prediction = RiskEngine::default()
        .predict(&session, Some(&profile))
        .unwrap();

    assert!(prediction.escalation_probability >= 0.6);
    assert!(prediction.predicted_escalation);
    for expected in [
        RiskFactor::LongConversation,
        RiskFactor::MultipleErrors,
        RiskFactor::NegativeSentiment,
        RiskFactor::HighEscalationRisk,
    ] {
        assert!(
            prediction.risk_factors.contains(&expected),
            "missing factor {expected}"
        );
    }
}

/// Scenario B: three transient failures trip a threshold-3 breaker; the
/// fourth call fast-fails with no network attempt.
#[tokio::test]
async fn scenario_b_breaker_trips_after_three_failures() {
    let transport = Arc::new(MockTransport::new(vec![Ok(ServiceResponse::status(503))]));
    let gateway = ResilientGateway::new(
        transport.clone(),
        GatewayConfig {
            // One attempt per call so each call records one breaker failure.
            max_retries: 0,
            breaker: BreakerConfig::default().with_failure_threshold(3),
            ..Default::default()
        },
        Arc::new(ManualClock::new()),
    );

    let request = ServiceRequest::write("charging-network", "conv-b", "/v1/charge", json!({}));

    for _ in 0..3 {
        let err = gateway.call(&request).await.unwrap_err();
        assert!(matches!(err, GatewayError::Exhausted { .. }));
    }
    assert_eq!(transport.call_count(), 3);
    assert_eq!(gateway.breaker_state("charging-network"), BreakerState::Open);

    let err = gateway.call(&request).await.unwrap_err();
    assert!(matches!(err, GatewayError::ServiceUnavailable { .. }));
    assert_eq!(transport.call_count(), 3);
    assert_eq!(gateway.metrics().fast_failed, 1);
}

/// Scenario C: identical GETs at t=0 and t=30 share one network call under
/// a 60 s TTL; at t=90 the entry has expired.
#[tokio::test]
async fn scenario_c_cache_ttl_round_trip() {
    let clock = ManualClock::new();
    let transport = Arc::new(MockTransport::new(vec![Ok(ServiceResponse::ok(json!({
        "station": "st-7",
        "status": "available"
    })))]));
    let gateway = ResilientGateway::new(
        transport.clone(),
        GatewayConfig {
            cache_ttl: Duration::from_secs(60),
            ..Default::default()
        },
        Arc::new(clock.clone()),
    );

    let request = ServiceRequest::read("charging-network", "conv-c", "/v1/stations/st-7");

    let first = gateway.call(&request).await.unwrap();
    clock.advance(Duration::from_secs(30));
    let second = gateway.call(&request).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(transport.call_count(), 1);
    assert_eq!(gateway.metrics().cache_hits, 1);

    clock.advance(Duration::from_secs(60));
    gateway.call(&request).await.unwrap();
    assert_eq!(transport.call_count(), 2);
}

/// A degraded dependency ends a turn with a typed error the orchestrator
/// can map to a fallback reply, while the risk engine keeps scoring.
#[tokio::test]
async fn degraded_dependency_still_allows_scoring() {
    let transport = Arc::new(MockTransport::new(vec![Ok(ServiceResponse::status(500))]));
    let gateway = ResilientGateway::new(
        transport,
        GatewayConfig {
            max_retries: 0,
            breaker: BreakerConfig::default().with_failure_threshold(1),
            ..Default::default()
        },
        Arc::new(ManualClock::new()),
    );

    let request = ServiceRequest::read("charging-network", "conv-d", "/v1/stations");
    let _ = gateway.call(&request).await;
    let err = gateway.call(&request).await.unwrap_err();
    assert!(matches!(err, GatewayError::ServiceUnavailable { .. }));

    // The scoring path has no dependency on the gateway.
    let session = SessionSnapshot {
        session_id: "sess-d".into(),
        user_id: "user-d".into(),
        messages: vec![ChatMessage::new(ChatRole::User, "charger is dead", ts(0))],
        tools_invoked: vec![],
        error_codes: vec!["E_GATEWAY".into()],
        stations_touched: vec![],
        actions: vec![],
        started_at: ts(0),
        evaluated_at: ts(60),
    };
    let prediction = RiskEngine::default().predict(&session, None).unwrap();
    assert!(prediction.escalation_probability > 0.0);
}

/// Trimming a long support conversation keeps the system prompt and the
/// newest turns, inside budget.
#[test]
fn trimmed_context_fits_model_budget() {
    let mut messages = vec![ChatMessage::new(
        ChatRole::System,
        "You are the EV charging support assistant.".repeat(4),
        ts(0),
    )];
    for i in 0..30 {
        messages.push(ChatMessage::new(
            ChatRole::User,
            format!("turn {i}: my charging session at station st-{i} failed again"),
            ts(i + 1),
        ));
    }

    let kept = ContextManager::new().trim(&messages, 200).unwrap();

    assert!(crate::context::estimate_sequence_tokens(&kept) <= 200);
    assert!(kept[0].role.is_pinned());
    // The newest rolling message always survives.
    assert_eq!(kept.last().unwrap().timestamp, ts(30));
}
