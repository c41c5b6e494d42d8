//! Collector client against a scripted axum server.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::Value;

use orderindex_core::{
    CheckpointManager, CheckpointStore, CallContext, EventSink, IndexerError, Match, MatchState,
    Order, OrderState, OrderStatus, SourceKey,
};
use orderindex_storage::{CollectorClient, CollectorConfig};

#[derive(Debug, Clone)]
struct Request {
    method: String,
    path: String,
    body: Option<Value>,
}

type Log = Arc<Mutex<Vec<Request>>>;

struct Script {
    responses: Mutex<VecDeque<(u16, &'static str)>>,
    log: Log,
}

/// Records every request and answers with the next canned `(status, body)`.
async fn scripted(
    State(script): State<Arc<Script>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    script.log.lock().unwrap().push(Request {
        method: method.to_string(),
        path: uri.path().to_string(),
        body: (!body.is_empty()).then(|| serde_json::from_slice(&body).unwrap()),
    });
    let (status, reply) = script
        .responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((500, "script exhausted"));
    (
        StatusCode::from_u16(status).unwrap(),
        [(header::CONTENT_TYPE, "application/json")],
        reply,
    )
        .into_response()
}

async fn serve(responses: Vec<(u16, &'static str)>) -> (CollectorClient, Log) {
    let log: Log = Arc::default();
    let script = Arc::new(Script {
        responses: Mutex::new(responses.into()),
        log: log.clone(),
    });
    let router = Router::new().fallback(scripted).with_state(script);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = CollectorClient::new(&CollectorConfig {
        endpoint: format!("http://{addr}/integrations/order-aggregator"),
        request_timeout_ms: 5_000,
    })
    .unwrap();
    (client, log)
}

fn order() -> Order {
    Order {
        id: 7,
        src_chain: 97,
        creator: "0xC1".into(),
        sell_token: "0xD1".into(),
        buy_token: "0xD2".into(),
        sell_amount: "100".into(),
        buy_amount: "200".into(),
        dest_chain: 5,
        state: OrderState::AwaitingMatch,
        executed_by_match: None,
        match_contract: None,
        use_relayer: false,
    }
}

// ─── Sink ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_order_posts_jsonapi() {
    let (client, log) = serve(vec![(201, "{}")]).await;
    client.create_order(&order()).await.unwrap();

    let req = log.lock().unwrap()[0].clone();
    assert_eq!(req.method, "POST");
    assert_eq!(req.path, "/integrations/order-aggregator/orders");
    let body = req.body.unwrap();
    assert_eq!(body["data"]["type"], "order");
    assert_eq!(body["data"]["attributes"]["orderId"], 7);
}

#[tokio::test]
async fn conflict_on_create_is_reported() {
    let (client, _) = serve(vec![(409, r#"{"errors":[{"status":"409"}]}"#)]).await;
    let err = client.create_order(&order()).await.unwrap_err();
    assert!(matches!(err, IndexerError::SinkConflict { entity: "order", id: 7 }));
}

#[tokio::test]
async fn updates_patch_under_chain_id() {
    let (client, log) = serve(vec![(204, ""), (204, "")]).await;
    client
        .update_order(97, 7, &OrderStatus::new(OrderState::Cancelled))
        .await
        .unwrap();
    client.update_match(5, 4, MatchState::Executed).await.unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log[0].method, "PATCH");
    assert_eq!(log[0].path, "/integrations/order-aggregator/97/orders");
    assert_eq!(log[0].body.as_ref().unwrap()["data"]["attributes"]["state"], 3);
    assert_eq!(log[1].path, "/integrations/order-aggregator/5/match_orders");
    assert_eq!(log[1].body.as_ref().unwrap()["data"]["id"], "4");
}

#[tokio::test]
async fn server_error_is_unavailable() {
    let (client, _) = serve(vec![(500, "boom")]).await;
    let m = Match {
        id: 4,
        src_chain: 5,
        origin_order_id: 7,
        origin_chain: 97,
        creator: "0xC2".into(),
        sell_token: "0xD3".into(),
        sell_amount: "42".into(),
        state: MatchState::AwaitingFinalization,
        use_relayer: false,
    };
    let err = client.create_match(&m).await.unwrap_err();
    assert!(matches!(err, IndexerError::SinkUnavailable(_)));
    assert!(err.is_retryable());
}

// ─── Checkpoints ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_block_is_none() {
    let (client, log) = serve(vec![(404, r#"{"errors":[]}"#)]).await;
    let key = SourceKey::new(97, "0xaa");
    assert!(client.load(&key).await.unwrap().is_none());
    assert_eq!(log.lock().unwrap()[0].path, "/integrations/order-aggregator/97/block");
}

#[tokio::test]
async fn manager_reads_and_commits_blocks() {
    let (client, log) = serve(vec![
        (200, r#"{"data":{"id":"1000","type":"block"}}"#),
        (201, "{}"),
    ])
    .await;
    let mut manager = CheckpointManager::new(Arc::new(client), SourceKey::new(97, "0xaa"));
    let cx = CallContext::new(Default::default(), std::time::Duration::from_secs(5));

    assert_eq!(manager.load_or_seed(&cx, None).await.unwrap(), 1000);
    assert!(manager.commit(&cx, 1021).await.unwrap());
    // behind the last commit: no request
    assert!(!manager.commit(&cx, 1010).await.unwrap());

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].method, "POST");
    assert_eq!(
        log[1].body.as_ref().unwrap(),
        &serde_json::json!({ "data": { "id": "1021", "type": "block" } })
    );
}
