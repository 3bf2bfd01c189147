use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{message}")]
    Transport { message: String },
    #[error("server responded with {status}: {message}")]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("failed to decode server response: {0}")]
    Decode(String),
    #[error("request cancelled")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Status { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    TransientUnavailable,
    NotFound,
    AddressConflict,
    PermissionDenied,
    OperationNotPermitted,
    Cancelled,
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserError {
    pub category: ErrorCategory,
    pub message: String,
    pub hints: Vec<String>,
}

impl UserError {
    pub fn is_silent(&self) -> bool {
        self.category == ErrorCategory::Cancelled
    }
}

pub trait ErrorReporter: Send + Sync {
    fn report(&self, err: &ClientError);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, err: &ClientError) {
        tracing::warn!(error = %err, code = ?err.code(), "task service request failed");
    }
}

pub fn translate(err: &ClientError, reporter: &dyn ErrorReporter) -> UserError {
    reporter.report(err);
    let category = categorize(err);
    let detail = err.to_string();
    let (message, hints) = match category {
        ErrorCategory::TransientUnavailable => (
            "The task service is not ready yet.".to_string(),
            vec!["Wait a few seconds, then send your message again.".to_string()],
        ),
        ErrorCategory::NotFound => (
            format!("Not found: {}", short_detail(err)),
            vec!["Check that the file, path or task still exists.".to_string()],
        ),
        ErrorCategory::AddressConflict => (
            "The service address is already in use.".to_string(),
            vec![
                "Stop the other process bound to that address.".to_string(),
                "Or point the client at a different server with --server.".to_string(),
            ],
        ),
        ErrorCategory::PermissionDenied => (
            format!("Permission denied: {}", short_detail(err)),
            vec!["Check the permissions of the workspace and its files.".to_string()],
        ),
        ErrorCategory::OperationNotPermitted => (
            format!("Operation not permitted: {}", short_detail(err)),
            vec!["The current user is not allowed to perform this action.".to_string()],
        ),
        ErrorCategory::Cancelled => ("Request cancelled.".to_string(), Vec::new()),
        ErrorCategory::Generic => (detail, Vec::new()),
    };
    let message = if message.trim().is_empty() {
        "Request failed.".to_string()
    } else {
        message
    };
    UserError {
        category,
        message,
        hints,
    }
}

pub fn categorize(err: &ClientError) -> ErrorCategory {
    if matches!(err, ClientError::Cancelled) {
        return ErrorCategory::Cancelled;
    }
    if let Some(code) = err.code()
        && let Some(category) = category_for_code(code)
    {
        return category;
    }
    if let ClientError::Status { status, .. } = err
        && let Some(category) = category_for_status(*status)
    {
        return category;
    }
    category_for_text(&err.to_string())
}

fn category_for_code(code: &str) -> Option<ErrorCategory> {
    let category = match code.trim().to_ascii_lowercase().as_str() {
        "unavailable" | "warming_up" | "not_ready" => ErrorCategory::TransientUnavailable,
        "not_found" | "enoent" => ErrorCategory::NotFound,
        "address_in_use" | "eaddrinuse" => ErrorCategory::AddressConflict,
        "permission_denied" | "eacces" => ErrorCategory::PermissionDenied,
        "operation_not_permitted" | "eperm" => ErrorCategory::OperationNotPermitted,
        "cancelled" | "canceled" => ErrorCategory::Cancelled,
        _ => return None,
    };
    Some(category)
}

fn category_for_status(status: u16) -> Option<ErrorCategory> {
    match status {
        502..=504 => Some(ErrorCategory::TransientUnavailable),
        404 => Some(ErrorCategory::NotFound),
        403 => Some(ErrorCategory::PermissionDenied),
        _ => None,
    }
}

fn category_for_text(text: &str) -> ErrorCategory {
    let text = text.to_ascii_lowercase();
    if text.contains("connection refused")
        || text.contains("service unavailable")
        || text.contains("warming up")
        || text.starts_with("unavailable")
    {
        ErrorCategory::TransientUnavailable
    } else if text.contains("address already in use") {
        ErrorCategory::AddressConflict
    } else if text.contains("no such file or directory") || text.contains("not found") {
        ErrorCategory::NotFound
    } else if text.contains("permission denied") {
        ErrorCategory::PermissionDenied
    } else if text.contains("operation not permitted") {
        ErrorCategory::OperationNotPermitted
    } else if text.contains("context canceled") || text.starts_with("cancelled") {
        ErrorCategory::Cancelled
    } else {
        ErrorCategory::Generic
    }
}

fn short_detail(err: &ClientError) -> String {
    match err {
        ClientError::Status { message, .. } => message.clone(),
        other => other.to_string(),
    }
}
