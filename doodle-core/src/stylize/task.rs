use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::foundation::error::{DoodleError, DoodleResult};

const ID_KEYS: &[&str] = &["id", "request_id", "requestId", "prediction_id", "task_id"];
const STATUS_KEYS: &[&str] = &["status", "state"];
const RESULT_URL_KEYS: &[&str] = &["output", "result_url", "resultUrl", "output_url"];
const ERROR_KEYS: &[&str] = &["error", "error_message", "errorMessage"];

/// Lifecycle of a remote stylization task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Accepted, not started.
    Pending,
    /// Running on the provider.
    Processing,
    /// Finished with a result image.
    Completed,
    /// Finished without a result.
    Failed,
}

impl TaskState {
    /// Map a provider status token, accepting the synonyms providers use.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" | "created" | "starting" | "submitted" => Some(Self::Pending),
            "processing" | "running" | "in_progress" | "started" => Some(Self::Processing),
            "completed" | "succeeded" | "success" | "done" | "finished" => Some(Self::Completed),
            "failed" | "error" | "canceled" | "cancelled" | "timeout" => Some(Self::Failed),
            _ => None,
        }
    }

    /// `true` for `completed` and `failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Normalized view of a provider task.
///
/// `result_url` is present only when `state` is `Completed`; `error_detail` only when it is
/// `Failed`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylizationTask {
    /// Provider job id.
    pub request_id: String,
    /// Canonical state.
    pub state: TaskState,
    /// URL of the stylized image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    /// Provider's failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Provider-reported progress, `0..=100`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

/// Which known layout a response body matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ResponseShape {
    /// `{ "code": .., "data": { "id": .., ... } }`
    Nested,
    /// `{ "id": .., "status": .., ... }`
    Flat,
}

/// Normalize a provider response body into a [`StylizationTask`].
///
/// Shapes are tried in order (nested `data` envelope, then flat). A body that matches no shape,
/// i.e. carries no job id under any known name, is a provider error rather than a task with an
/// empty id.
pub fn parse_task_response(body: &Value) -> DoodleResult<StylizationTask> {
    parse_with_shape(body).map(|(task, _)| task)
}

pub(crate) fn parse_with_shape(body: &Value) -> DoodleResult<(StylizationTask, ResponseShape)> {
    let root = body
        .as_object()
        .ok_or_else(|| DoodleError::provider(format!("expected a JSON object, got {}", kind(body))))?;
    check_envelope_code(root)?;

    let candidates = [
        (ResponseShape::Nested, root.get("data").and_then(Value::as_object)),
        (ResponseShape::Flat, Some(root)),
    ];
    for (shape, obj) in candidates {
        let Some(obj) = obj else { continue };
        let Some(request_id) = first_string(obj, ID_KEYS) else {
            continue;
        };
        return normalize(obj, request_id).map(|task| (task, shape));
    }

    let mut keys: Vec<&str> = root.keys().map(String::as_str).collect();
    keys.sort_unstable();
    Err(DoodleError::provider(format!(
        "unknown response shape: no job id among keys [{}]",
        keys.join(", ")
    )))
}

fn normalize(obj: &Map<String, Value>, request_id: String) -> DoodleResult<StylizationTask> {
    let result_url = result_url(obj);
    let state = match first_string(obj, STATUS_KEYS) {
        Some(token) => TaskState::from_token(&token).ok_or_else(|| {
            DoodleError::provider(format!("task {request_id} has unknown status '{token}'"))
        })?,
        None if result_url.is_some() => TaskState::Completed,
        None => TaskState::Pending,
    };

    let progress = obj
        .get("progress")
        .and_then(Value::as_f64)
        .filter(|p| p.is_finite())
        .map(|p| p.clamp(0.0, 100.0).round() as u8);

    match state {
        TaskState::Completed => {
            let url = result_url.ok_or_else(|| {
                DoodleError::provider(format!("task {request_id} completed without an output URL"))
            })?;
            Ok(StylizationTask {
                request_id,
                state,
                result_url: Some(url),
                error_detail: None,
                progress: Some(100),
            })
        }
        TaskState::Failed => Ok(StylizationTask {
            request_id,
            state,
            result_url: None,
            error_detail: Some(error_detail(obj).unwrap_or_else(|| "stylization failed".into())),
            progress,
        }),
        TaskState::Pending | TaskState::Processing => Ok(StylizationTask {
            request_id,
            state,
            result_url: None,
            error_detail: None,
            progress,
        }),
    }
}

/// Envelopes like `{ "code": 400, "message": ".." }` report failures in-band.
fn check_envelope_code(root: &Map<String, Value>) -> DoodleResult<()> {
    let Some(code) = root.get("code").and_then(Value::as_i64) else {
        return Ok(());
    };
    if (200..300).contains(&code) {
        return Ok(());
    }
    let message = first_string(root, &["message", "error"]).unwrap_or_default();
    Err(DoodleError::provider(format!(
        "provider returned code {code}: {message}"
    )))
}

fn result_url(obj: &Map<String, Value>) -> Option<String> {
    let from_outputs = obj
        .get("outputs")
        .and_then(Value::as_array)
        .and_then(|outputs| outputs.first())
        .and_then(url_of);
    let from_images = || {
        obj.get("images")
            .and_then(Value::as_array)
            .and_then(|images| images.first())
            .and_then(url_of)
    };
    from_outputs
        .or_else(|| RESULT_URL_KEYS.iter().find_map(|k| obj.get(*k).and_then(url_of)))
        .or_else(from_images)
}

/// A bare string, `{ "url": .. }`, or the first element of an array of either.
fn url_of(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(o) => o.get("url").and_then(url_of),
        Value::Array(items) => items.first().and_then(url_of),
        _ => None,
    }
}

fn error_detail(obj: &Map<String, Value>) -> Option<String> {
    ERROR_KEYS.iter().find_map(|k| match obj.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(o) => o.get("message").and_then(Value::as_str).map(str::to_string),
        _ => None,
    })
}

fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[path = "../../tests/unit/stylize/task.rs"]
mod tests;
