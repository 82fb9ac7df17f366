use serde_json::Value;

/// Failures talking to the Jira REST API.
///
/// Status codes and Jira's own messages are carried through untouched so the
/// caller sees what the server said.
#[derive(Debug, thiserror::Error)]
pub enum JiraError {
    #[error("Authentication failed (401): {message}")]
    Unauthorized { message: String },

    #[error("Permission denied (403): {message}")]
    PermissionDenied { message: String },

    #[error("Not found (404): {message}")]
    NotFound { message: String },

    #[error("Rate limited (429): {message}")]
    RateLimited {
        retry_after: Option<u64>,
        message: String,
    },

    #[error("Jira returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode Jira response: {0}")]
    Decode(String),

    #[error("Invalid request path: {0}")]
    InvalidPath(String),
}

impl JiraError {
    /// Classify a non-success response
    pub fn from_status(status: u16, body: &str, retry_after: Option<u64>) -> Self {
        let message = extract_message(body);
        match status {
            401 => JiraError::Unauthorized { message },
            403 => JiraError::PermissionDenied { message },
            404 => JiraError::NotFound { message },
            429 => JiraError::RateLimited {
                retry_after,
                message,
            },
            _ => JiraError::Api { status, message },
        }
    }

    /// HTTP status behind this error, when there was a response
    pub fn status(&self) -> Option<u16> {
        match self {
            JiraError::Unauthorized { .. } => Some(401),
            JiraError::PermissionDenied { .. } => Some(403),
            JiraError::NotFound { .. } => Some(404),
            JiraError::RateLimited { .. } => Some(429),
            JiraError::Api { status, .. } => Some(*status),
            JiraError::Network(_) | JiraError::Decode(_) | JiraError::InvalidPath(_) => None,
        }
    }
}

impl From<reqwest::Error> for JiraError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            JiraError::Decode(error.to_string())
        } else {
            JiraError::Network(error.to_string())
        }
    }
}

/// Pull `errorMessages` and `errors` out of a Jira error body.
///
/// Falls back to the raw body, or a placeholder when the body is empty.
fn extract_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no response body".to_string();
    }

    let Ok(json) = serde_json::from_str::<Value>(trimmed) else {
        return trimmed.to_string();
    };

    let mut parts: Vec<String> = json["errorMessages"]
        .as_array()
        .map(|messages| {
            messages
                .iter()
                .filter_map(|m| m.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    if let Some(errors) = json["errors"].as_object() {
        for (field, message) in errors {
            let text = message.as_str().map(str::to_string).unwrap_or_else(|| message.to_string());
            parts.push(format!("{}: {}", field, text));
        }
    }

    if parts.is_empty() {
        if let Some(message) = json["message"].as_str() {
            return message.to_string();
        }
        return trimmed.to_string();
    }

    parts.join("; ")
}
