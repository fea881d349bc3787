//! Errors raised while verifying and dispatching Slack event requests.
//!
//! Every request rejection maps to a fixed plain-text body. Slack integrations
//! match on these literals, so they must not change.

use crate::registry::HandlerId;
use derive_more::{Display, Error};
use ntex::{http, web};

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum ReceiverError {
    #[display("Request doesn't contain timestamp header")]
    MissingTimestamp,

    #[display("Invalid timestamp in request header")]
    MalformedTimestamp(#[error(not(source))] String),

    #[display("Invalid timestamp in request header")]
    StaleTimestamp { timestamp: i64, now: i64 },

    #[display("Invalid request signature")]
    InvalidSignature,

    #[display("No event in request body")]
    MissingEvent,

    #[display("Invalid JSON in request body")]
    InvalidJson(#[error(not(source))] String),

    #[display("handler {handler_id} is not registered for event '{event_type}'")]
    HandlerNotFound {
        event_type: String,
        handler_id: HandlerId,
    },
}

impl ReceiverError {
    /// Detailed message for logs. `Display` stays the public response body.
    pub fn log_message(&self) -> String {
        match self {
            ReceiverError::MalformedTimestamp(raw) => {
                format!("[MalformedTimestamp] header value {raw:?} is not an integer")
            }
            ReceiverError::StaleTimestamp { timestamp, now } => format!(
                "[StaleTimestamp] timestamp {timestamp} is {}s away from now ({now})",
                timestamp.abs_diff(*now)
            ),
            ReceiverError::InvalidJson(reason) => format!("[InvalidJson] {reason}"),
            other => format!("[{other:?}] {other}"),
        }
    }
}

impl web::error::WebResponseError for ReceiverError {
    fn error_response(&self, _: &web::HttpRequest) -> web::HttpResponse {
        web::HttpResponse::build(self.status_code())
            .content_type("text/plain")
            .body(self.to_string())
    }

    fn status_code(&self) -> http::StatusCode {
        match *self {
            ReceiverError::InvalidJson(_) => http::StatusCode::BAD_REQUEST,
            ReceiverError::HandlerNotFound { .. } => http::StatusCode::INTERNAL_SERVER_ERROR,
            _ => http::StatusCode::FORBIDDEN,
        }
    }
}
