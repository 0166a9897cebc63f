use std::collections::VecDeque;
use std::sync::Mutex;

use super::*;
use crate::stylize::task::TaskState;

/// Scripted provider: answers submits and polls from queues and records every request.
#[derive(Default)]
struct FakeTransport {
    submit_responses: Mutex<VecDeque<Result<Value, String>>>,
    poll_responses: Mutex<VecDeque<Result<Value, String>>>,
    requests: Mutex<Vec<(String, String)>>,
    submitted_bodies: Mutex<Vec<Value>>,
}

impl FakeTransport {
    fn with(submits: Vec<Value>, polls: Vec<Value>) -> Self {
        Self {
            submit_responses: Mutex::new(submits.into_iter().map(Ok).collect()),
            poll_responses: Mutex::new(polls.into_iter().map(Ok).collect()),
            ..Default::default()
        }
    }

    fn polls(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(method, _)| method == "GET")
            .count()
    }
}

fn next(queue: &Mutex<VecDeque<Result<Value, String>>>) -> DoodleResult<Value> {
    match queue.lock().unwrap().pop_front() {
        Some(Ok(v)) => Ok(v),
        Some(Err(msg)) => Err(DoodleError::provider(msg)),
        None => Ok(json!({"data": {"id": "abc", "status": "processing"}})),
    }
}

#[async_trait]
impl TaskTransport for FakeTransport {
    async fn post_json(&self, url: &str, body: &Value) -> DoodleResult<Value> {
        self.requests.lock().unwrap().push(("POST".into(), url.into()));
        self.submitted_bodies.lock().unwrap().push(body.clone());
        next(&self.submit_responses)
    }

    async fn get_json(&self, url: &str) -> DoodleResult<Value> {
        self.requests.lock().unwrap().push(("GET".into(), url.into()));
        next(&self.poll_responses)
    }
}

fn client(transport: FakeTransport) -> StylizeClient<FakeTransport> {
    let config = StylizeConfig {
        base_url: "https://provider.test/api/v3/".into(),
        ..StylizeConfig::new("key")
    };
    StylizeClient::with_transport(config, transport)
}

fn processing() -> Value {
    json!({"data": {"id": "abc", "status": "processing"}})
}

#[tokio::test(start_paused = true)]
async fn synchronous_completion_never_polls() {
    let transport = FakeTransport::with(
        vec![json!({"data": {"id": "abc", "status": "completed", "outputs": ["https://x/y.png"]}})],
        vec![],
    );
    let client = client(transport);
    let task = client
        .stylize(&ImageRef::Url("https://cdn/frame.jpg".into()), PollOpts::default())
        .await
        .unwrap();

    assert_eq!(task.request_id, "abc");
    assert_eq!(task.state, TaskState::Completed);
    assert_eq!(task.result_url.as_deref(), Some("https://x/y.png"));
    assert_eq!(client.transport.polls(), 0);
}

#[tokio::test]
async fn submit_sends_prompt_and_image_to_the_model_endpoint() {
    let transport = FakeTransport::with(vec![json!({"data": {"id": "t1", "status": "created"}})], vec![]);
    let client = client(transport);
    let task = client
        .submit(&ImageRef::Bytes {
            mime_type: "image/jpeg".into(),
            bytes: vec![0xff, 0xd8, 0xff],
        })
        .await
        .unwrap();
    assert_eq!(task.state, TaskState::Pending);

    let requests = client.transport.requests.lock().unwrap().clone();
    assert_eq!(
        requests,
        vec![(
            "POST".to_string(),
            "https://provider.test/api/v3/bytedance/seededit-v3".to_string()
        )]
    );
    let body = client.transport.submitted_bodies.lock().unwrap()[0].clone();
    assert_eq!(body["image"], "data:image/jpeg;base64,/9j/");
    assert_eq!(body["prompt"], DEFAULT_PROMPT);
}

#[tokio::test]
async fn submit_without_job_id_is_a_hard_failure() {
    let transport = FakeTransport::with(vec![json!({"data": {"status": "created"}})], vec![]);
    let client = client(transport);
    let err = client
        .submit(&ImageRef::Url("https://cdn/frame.jpg".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, DoodleError::Provider(_)));
    assert_eq!(client.transport.polls(), 0);
}

#[tokio::test(start_paused = true)]
async fn await_result_stops_at_the_first_terminal_poll() {
    let transport = FakeTransport::with(
        vec![],
        vec![
            processing(),
            json!({"data": {"id": "abc", "status": "succeeded", "outputs": [{"url": "https://r"}]}}),
            processing(),
        ],
    );
    let client = client(transport);
    let start = tokio::time::Instant::now();
    let task = client.await_result("abc", PollOpts::default()).await.unwrap();

    assert_eq!(task.result_url.as_deref(), Some("https://r"));
    assert_eq!(client.transport.polls(), 2);
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(3000) && waited < Duration::from_millis(6000));
    let requests = client.transport.requests.lock().unwrap().clone();
    assert_eq!(requests[0].1, "https://provider.test/api/v3/predictions/abc/result");
}

#[tokio::test(start_paused = true)]
async fn await_result_is_bounded_for_tasks_that_never_finish() {
    let client = client(FakeTransport::default());
    let opts = PollOpts::default();
    let start = tokio::time::Instant::now();
    let err = client.await_result("abc", opts).await.unwrap_err();

    assert!(matches!(err, DoodleError::PollTimeoutExceeded { attempts: 60 }));
    assert!(err.is_timeout());
    assert_eq!(client.transport.polls(), 60);
    assert!(start.elapsed() <= opts.interval * opts.max_attempts);
}

#[tokio::test(start_paused = true)]
async fn failed_task_is_returned_not_retried() {
    let transport = FakeTransport::with(
        vec![],
        vec![json!({"data": {"id": "abc", "status": "error", "error": "blocked"}})],
    );
    let client = client(transport);
    let task = client.await_result("abc", PollOpts::default()).await.unwrap();
    assert_eq!(task.state, TaskState::Failed);
    assert_eq!(task.error_detail.as_deref(), Some("blocked"));
    assert_eq!(client.transport.polls(), 1);
}

#[tokio::test(start_paused = true)]
async fn transport_errors_propagate_from_polling() {
    let transport = FakeTransport::default();
    transport
        .poll_responses
        .lock()
        .unwrap()
        .push_back(Err("provider responded 502".into()));
    let client = client(transport);
    let err = client.await_result("abc", PollOpts::default()).await.unwrap_err();
    assert!(matches!(err, DoodleError::Provider(_)));
    assert_eq!(client.transport.polls(), 1);
}

#[tokio::test]
async fn empty_request_ids_are_rejected_without_a_request() {
    let client = client(FakeTransport::default());
    assert!(matches!(
        client.poll("  ").await,
        Err(DoodleError::Validation(_))
    ));
    assert!(client.transport.requests.lock().unwrap().is_empty());
}
