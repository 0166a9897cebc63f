use serde_json::json;

use super::*;

#[test]
fn nested_completed_response_is_normalized() {
    let body = json!({"data": {"id": "abc", "status": "completed", "outputs": ["https://x/y.png"]}});
    let (task, shape) = parse_with_shape(&body).unwrap();
    assert_eq!(shape, ResponseShape::Nested);
    assert_eq!(task.request_id, "abc");
    assert_eq!(task.state, TaskState::Completed);
    assert_eq!(task.result_url.as_deref(), Some("https://x/y.png"));
    assert_eq!(task.error_detail, None);
}

#[test]
fn flat_response_with_alternate_field_names() {
    let body = json!({"request_id": "r-1", "status": "succeeded", "result_url": "https://cdn/a.png"});
    let (task, shape) = parse_with_shape(&body).unwrap();
    assert_eq!(shape, ResponseShape::Flat);
    assert_eq!(task.request_id, "r-1");
    assert_eq!(task.state, TaskState::Completed);
    assert_eq!(task.result_url.as_deref(), Some("https://cdn/a.png"));

    let body = json!({"requestId": "r-2", "state": "running", "progress": 42.4});
    let task = parse_task_response(&body).unwrap();
    assert_eq!(task.state, TaskState::Processing);
    assert_eq!(task.progress, Some(42));

    let body = json!({"prediction_id": 77, "status": "queued"});
    assert_eq!(parse_task_response(&body).unwrap().request_id, "77");
}

#[test]
fn output_urls_come_in_several_forms() {
    for body in [
        json!({"id": "a", "status": "done", "outputs": [{"url": "https://u"}]}),
        json!({"id": "a", "status": "done", "output": "https://u"}),
        json!({"id": "a", "status": "done", "output": ["https://u"]}),
        json!({"id": "a", "status": "done", "resultUrl": "https://u"}),
        json!({"id": "a", "status": "done", "images": [{"url": "https://u"}]}),
    ] {
        let task = parse_task_response(&body).unwrap();
        assert_eq!(task.result_url.as_deref(), Some("https://u"), "{body}");
    }
}

#[test]
fn status_synonyms_map_to_canonical_states() {
    let cases = [
        ("succeeded", TaskState::Completed),
        ("SUCCESS", TaskState::Completed),
        ("error", TaskState::Failed),
        ("canceled", TaskState::Failed),
        ("created", TaskState::Pending),
        ("in_progress", TaskState::Processing),
    ];
    for (token, expected) in cases {
        assert_eq!(TaskState::from_token(token), Some(expected), "{token}");
    }
    assert_eq!(TaskState::from_token("mystery"), None);
    assert!(TaskState::Completed.is_terminal());
    assert!(TaskState::Failed.is_terminal());
    assert!(!TaskState::Processing.is_terminal());
}

#[test]
fn failed_tasks_carry_an_error_detail() {
    let body = json!({"data": {"id": "f", "status": "error", "error": "NSFW content"}});
    let task = parse_task_response(&body).unwrap();
    assert_eq!(task.state, TaskState::Failed);
    assert_eq!(task.error_detail.as_deref(), Some("NSFW content"));
    assert_eq!(task.result_url, None);

    let body = json!({"id": "f", "status": "failed", "error": {"message": "quota"}});
    assert_eq!(
        parse_task_response(&body).unwrap().error_detail.as_deref(),
        Some("quota")
    );

    let body = json!({"id": "f", "status": "failed"});
    assert!(parse_task_response(&body).unwrap().error_detail.is_some());
}

#[test]
fn missing_status_is_inferred_from_output() {
    let done = json!({"id": "s", "outputs": ["https://o"]});
    assert_eq!(parse_task_response(&done).unwrap().state, TaskState::Completed);
    let waiting = json!({"id": "s", "outputs": []});
    assert_eq!(parse_task_response(&waiting).unwrap().state, TaskState::Pending);
}

#[test]
fn bodies_without_a_job_id_are_provider_errors() {
    for body in [
        json!({"data": {"status": "completed", "outputs": ["https://x"]}}),
        json!({"status": "pending"}),
        json!({"id": ""}),
        json!([1, 2, 3]),
    ] {
        let err = parse_task_response(&body).unwrap_err();
        assert!(matches!(err, DoodleError::Provider(_)), "{body}");
    }
    let err = parse_task_response(&json!({"status": "pending", "foo": 1})).unwrap_err();
    assert!(err.to_string().contains("unknown response shape"));
}

#[test]
fn completed_without_output_and_unknown_status_are_rejected() {
    let no_url = json!({"id": "x", "status": "completed", "outputs": []});
    assert!(matches!(
        parse_task_response(&no_url),
        Err(DoodleError::Provider(_))
    ));
    let weird = json!({"id": "x", "status": "teleporting"});
    assert!(parse_task_response(&weird).is_err());
}

#[test]
fn in_band_error_codes_are_provider_errors() {
    let body = json!({"code": 401, "message": "invalid api key", "data": null});
    let err = parse_task_response(&body).unwrap_err();
    assert!(err.to_string().contains("invalid api key"));

    let ok = json!({"code": 200, "message": "success", "data": {"id": "z", "status": "created"}});
    assert_eq!(parse_task_response(&ok).unwrap().state, TaskState::Pending);
}

#[test]
fn task_serializes_in_camel_case() {
    let task = StylizationTask {
        request_id: "abc".into(),
        state: TaskState::Completed,
        result_url: Some("https://x/y.png".into()),
        error_detail: None,
        progress: None,
    };
    assert_eq!(
        serde_json::to_value(&task).unwrap(),
        json!({"requestId": "abc", "state": "completed", "resultUrl": "https://x/y.png"})
    );
}
