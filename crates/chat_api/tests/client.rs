use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chat_api::retry::RetryPolicy;
use chat_api::{
    new_cancel_signal, ChatApiConfig, ChatApiError, ChatClient, ChatRequest, ChatTransport,
    CompletionEvent, StatusCode, TransportError, TransportResponse, Turn,
};
use serde_json::json;
use tokio::time::{sleep, Instant};

fn success_body(content: &str) -> String {
    json!({
        "choices": [
            {"message": {"role": "assistant", "content": content}}
        ]
    })
    .to_string()
}

fn reply(status: u16, body: &str) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse::new(
        StatusCode::from_u16(status).expect("valid status"),
        body,
    ))
}

/// Replays a fixed list of outcomes and records every request it receives.
struct ScriptedTransport {
    script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Result<TransportResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn request_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn send(&self, request: &ChatRequest) -> Result<TransportResponse, TransportError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| reply(500, r#"{"error":{"message":"script exhausted"}}"#))
    }
}

/// Answers every request after a delay, echoing the last user message.
struct SlowEchoTransport {
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl SlowEchoTransport {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ChatTransport for SlowEchoTransport {
    async fn send(&self, request: &ChatRequest) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_in_flight.fetch_max(now, Ordering::AcqRel);

        sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        let last = request
            .messages
            .last()
            .map(|message| message.content.clone())
            .unwrap_or_default();
        reply(200, &success_body(&format!("echo {last}")))
    }
}

/// Delay per request chosen from the user text (`"slow"` waits longer).
struct DelayByInputTransport;

#[async_trait]
impl ChatTransport for DelayByInputTransport {
    async fn send(&self, request: &ChatRequest) -> Result<TransportResponse, TransportError> {
        let last = request
            .messages
            .iter()
            .rev()
            .find(|message| message.role == "user")
            .map(|message| message.content.clone())
            .unwrap_or_default();
        let delay = if last == "slow" { 300 } else { 50 };
        sleep(Duration::from_millis(delay)).await;
        reply(200, &success_body(&format!("reply to {last}")))
    }
}

fn client_with(transport: Arc<dyn ChatTransport>) -> ChatClient {
    ChatClient::with_transport(ChatApiConfig::new("test-key"), transport)
}

fn retry_delays(events: &[CompletionEvent]) -> Vec<Duration> {
    events
        .iter()
        .filter_map(|event| match event {
            CompletionEvent::Retrying { delay, .. } => Some(*delay),
            CompletionEvent::AttemptStarted { .. } => None,
        })
        .collect()
}

fn attempts(events: &[CompletionEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, CompletionEvent::AttemptStarted { .. }))
        .count()
}

#[tokio::test(start_paused = true)]
async fn success_records_both_turns_and_sends_window() {
    let transport = ScriptedTransport::new(vec![reply(200, &success_body("hello back"))]);
    let client = client_with(transport.clone());

    let content = client
        .complete("hello", None)
        .await
        .expect("completion should succeed");

    assert_eq!(content, "hello back");
    assert_eq!(
        client.transcript().turns(),
        vec![Turn::user("hello"), Turn::assistant("hello back")]
    );

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, chat_api::config::DEFAULT_MODEL);
    assert_eq!(requests[0].messages.len(), 1);
    assert_eq!(requests[0].messages[0].role, "user");
    assert_eq!(requests[0].messages[0].content, "hello");
}

#[tokio::test(start_paused = true)]
async fn rate_limited_twice_then_success_waits_two_then_four_seconds() {
    let transport = ScriptedTransport::new(vec![
        reply(429, r#"{"error":{"message":"slow down"}}"#),
        reply(429, r#"{"error":{"message":"slow down"}}"#),
        reply(200, &success_body("finally")),
    ]);
    let client = client_with(transport.clone());
    let mut events = Vec::new();

    let started = Instant::now();
    let content = client
        .complete_with_handler("hi", None, |event| events.push(event))
        .await
        .expect("third attempt should succeed");
    let elapsed = started.elapsed();

    assert_eq!(content, "finally");
    assert_eq!(transport.request_count(), 3);
    assert_eq!(attempts(&events), 3);
    assert_eq!(
        retry_delays(&events),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );
    assert!(elapsed >= Duration::from_secs(6));
    assert!(elapsed < Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn retries_resend_the_same_window() {
    let transport = ScriptedTransport::new(vec![
        reply(503, ""),
        reply(200, &success_body("ok")),
    ]);
    let client = client_with(transport.clone());

    client.complete("again", None).await.expect("success");

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);
}

#[tokio::test(start_paused = true)]
async fn overloaded_five_times_exhausts_with_four_waits() {
    let transport = ScriptedTransport::new(
        (0..5)
            .map(|_| reply(503, r#"{"error":{"message":"overloaded"}}"#))
            .collect(),
    );
    let client = client_with(transport.clone());
    let mut events = Vec::new();

    let error = client
        .complete_with_handler("busy?", None, |event| events.push(event))
        .await
        .expect_err("all attempts fail");

    assert!(error.is_upstream());
    assert!(matches!(
        error,
        ChatApiError::RetryExhausted {
            status: Some(StatusCode::SERVICE_UNAVAILABLE),
            ..
        }
    ));
    assert_eq!(transport.request_count(), 5);
    assert_eq!(
        retry_delays(&events),
        vec![
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8),
            Duration::from_secs(16),
        ]
    );
    assert_eq!(client.transcript().turns(), vec![Turn::user("busy?")]);
}

#[tokio::test(start_paused = true)]
async fn bad_request_fails_immediately_without_waiting() {
    let transport = ScriptedTransport::new(vec![reply(
        400,
        r#"{"error":{"message":"invalid model"}}"#,
    )]);
    let client = client_with(transport.clone());
    let mut events = Vec::new();

    let started = Instant::now();
    let error = client
        .complete_with_handler("hi", None, |event| events.push(event))
        .await
        .expect_err("400 is terminal");

    assert!(matches!(
        &error,
        ChatApiError::Status(StatusCode::BAD_REQUEST, message) if message == "invalid model"
    ));
    assert!(error.is_upstream());
    assert_eq!(transport.request_count(), 1);
    assert!(retry_delays(&events).is_empty());
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(client.transcript().turns(), vec![Turn::user("hi")]);
}

#[tokio::test(start_paused = true)]
async fn transport_error_with_retryable_status_is_retried() {
    let transport = ScriptedTransport::new(vec![
        Err(TransportError::with_status(
            StatusCode::TOO_MANY_REQUESTS,
            "rate limited mid-flight",
        )),
        reply(200, &success_body("recovered")),
    ]);
    let client = client_with(transport.clone());

    let content = client.complete("hi", None).await.expect("retry succeeds");

    assert_eq!(content, "recovered");
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn transport_error_without_status_is_terminal() {
    let transport = ScriptedTransport::new(vec![
        Err(TransportError::new("connection reset by peer")),
        reply(200, &success_body("never reached")),
    ]);
    let client = client_with(transport.clone());

    let error = client.complete("hi", None).await.expect_err("reset is terminal");

    assert!(matches!(error, ChatApiError::Transport(ref inner) if inner.status.is_none()));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn retryable_transport_error_on_last_attempt_exhausts() {
    let script = (0..5)
        .map(|_| {
            Err(TransportError::with_status(
                StatusCode::SERVICE_UNAVAILABLE,
                "upstream overloaded",
            ))
        })
        .collect();
    let transport = ScriptedTransport::new(script);
    let client = client_with(transport.clone());

    let error = client.complete("hi", None).await.expect_err("exhausted");

    match error {
        ChatApiError::RetryExhausted { status, last_error } => {
            assert_eq!(status, Some(StatusCode::SERVICE_UNAVAILABLE));
            assert!(last_error
                .expect("last error recorded")
                .contains("upstream overloaded"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(transport.request_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn missing_content_yields_empty_reply() {
    let transport = ScriptedTransport::new(vec![reply(200, r#"{"choices":[]}"#)]);
    let client = client_with(transport);

    let content = client.complete("hi", None).await.expect("success");

    assert_eq!(content, "");
    assert_eq!(
        client.transcript().turns(),
        vec![Turn::user("hi"), Turn::assistant("")]
    );
}

#[tokio::test(start_paused = true)]
async fn custom_policy_controls_attempts_and_delays() {
    let transport = ScriptedTransport::new(vec![reply(429, ""), reply(429, "")]);
    let config = ChatApiConfig::new("k")
        .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(10)));
    let client = ChatClient::with_transport(config, transport.clone());
    let mut events = Vec::new();

    let error = client
        .complete_with_handler("hi", None, |event| events.push(event))
        .await
        .expect_err("two attempts then give up");

    assert!(matches!(error, ChatApiError::RetryExhausted { .. }));
    assert_eq!(retry_delays(&events), vec![Duration::from_millis(10)]);
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancel_during_backoff_releases_permit_and_keeps_user_turn() {
    let transport = ScriptedTransport::new(vec![
        reply(429, ""),
        reply(200, &success_body("too late")),
    ]);
    let client = Arc::new(client_with(transport.clone()));
    let signal = new_cancel_signal();

    let call = tokio::spawn({
        let client = Arc::clone(&client);
        let signal = signal.clone();
        async move { client.complete("interrupt me", Some(&signal)).await }
    });

    sleep(Duration::from_secs(1)).await;
    assert_eq!(client.gate().available(), client.gate().capacity() - 1);
    signal.store(true, Ordering::Release);

    let result = call.await.expect("call task");
    assert!(matches!(result, Err(ChatApiError::Cancelled)));
    assert_eq!(transport.request_count(), 1);
    assert_eq!(client.gate().available(), client.gate().capacity());
    assert_eq!(client.transcript().turns(), vec![Turn::user("interrupt me")]);
}

#[tokio::test(start_paused = true)]
async fn cancelled_before_admission_sends_nothing() {
    let transport = ScriptedTransport::new(vec![reply(200, &success_body("unused"))]);
    let client = client_with(transport.clone());
    let signal = new_cancel_signal();
    signal.store(true, Ordering::Release);

    let result = client.complete("hi", Some(&signal)).await;

    assert!(matches!(result, Err(ChatApiError::Cancelled)));
    assert_eq!(transport.request_count(), 0);
    assert_eq!(client.gate().available(), client.gate().capacity());
    assert!(client.transcript().is_empty());
}

#[tokio::test(start_paused = true)]
async fn fifteen_concurrent_calls_never_exceed_ten_in_flight() {
    let transport = SlowEchoTransport::new(Duration::from_millis(200));
    let client = Arc::new(client_with(transport.clone()));

    let calls: Vec<_> = (0..15)
        .map(|index| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.complete(&format!("msg {index}"), None).await })
        })
        .collect();

    for call in calls {
        call.await
            .expect("call task")
            .expect("every call should succeed");
    }

    assert_eq!(transport.calls.load(Ordering::Acquire), 15);
    let peak = transport.max_in_flight.load(Ordering::Acquire);
    assert!(peak <= 10, "peak in-flight was {peak}");
    assert_eq!(peak, 10);
    assert_eq!(client.gate().available(), 10);
    assert_eq!(client.transcript().len(), 30);
}

#[tokio::test(start_paused = true)]
async fn concurrent_calls_append_replies_in_completion_order() {
    let client = Arc::new(client_with(Arc::new(DelayByInputTransport)));

    let slow = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.complete("slow", None).await }
    });
    sleep(Duration::from_millis(10)).await;
    let fast = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.complete("fast", None).await }
    });

    fast.await.expect("fast task").expect("fast call");
    slow.await.expect("slow task").expect("slow call");

    assert_eq!(
        client.transcript().turns(),
        vec![
            Turn::user("slow"),
            Turn::user("fast"),
            Turn::assistant("reply to fast"),
            Turn::assistant("reply to slow"),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn window_sent_upstream_is_capped_at_thirty() {
    let script = (0..20)
        .map(|index| reply(200, &success_body(&format!("a{index}"))))
        .collect();
    let transport = ScriptedTransport::new(script);
    let client = client_with(transport.clone());

    for index in 0..20 {
        client
            .complete(&format!("q{index}"), None)
            .await
            .expect("success");
    }

    let requests = transport.requests();
    let last = requests.last().expect("requests were sent");
    assert_eq!(last.messages.len(), 30);
    assert_eq!(last.messages[0].content, "a4");
    assert_eq!(last.messages[29].content, "q19");

    let transcript = client.transcript();
    assert_eq!(transcript.len(), 30);
    assert_eq!(transcript.last().map(Turn::content), Some("a19"));
}
