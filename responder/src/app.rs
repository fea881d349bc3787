//! # Slack Events Receiver
//!
//! [`SlackEventApp`] owns the signing secret and the handler registry and turns
//! one inbound request into a response plus the handler work to run after it.
//!
//! Request flow, stopping at the first failure:
//! 1. non-POST → 404
//! 2. missing `X-Slack-Request-Timestamp` → 403
//! 3. timestamp more than five minutes off, or not an integer → 403
//! 4. `X-Slack-Signature` mismatch → 403
//! 5. body: invalid JSON → 400, challenge → 200 echo, typed event → 200, otherwise → 403
//!
//! Every failure from step 2 on is also dispatched to the `"error"` handlers.

use crate::{
    dispatch::{self, BackgroundTasks},
    envelope::{self, Envelope},
    error::ReceiverError,
    freshness::{self, Clock, SystemClock},
    metric,
    registry::{CHALLENGE_EVENT, ERROR_EVENT, EventData, Handler, HandlerRegistry},
    signature::{SignatureVerifier, SigningSecret},
};
use ntex::{
    http::{Method, StatusCode},
    util::Bytes,
    web::{self, error::WebResponseError},
};
use std::sync::Arc;

pub const DEFAULT_EVENT_PATH: &str = "/slack/events";
pub const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-Slack-Signature";
pub const POWERED_BY_HEADER: &str = "X-Slack-Powered-By";
pub const NOT_FOUND_BODY: &str = "These are not the slackbots you're looking for.";

/// The parts of an HTTP request the receiver looks at
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub timestamp: Option<String>,
    pub signature: Option<String>,
    pub body: Bytes,
}

impl InboundRequest {
    pub fn from_http(req: &web::HttpRequest, body: Bytes) -> Self {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        };

        Self {
            method: req.method().clone(),
            timestamp: header(TIMESTAMP_HEADER),
            signature: header(SIGNATURE_HEADER),
            body,
        }
    }
}

/// Response produced by the receiver, independent of the HTTP server
#[derive(Debug, Clone, PartialEq)]
pub struct EventResponse {
    pub status: StatusCode,
    pub content_type: Option<&'static str>,
    pub body: String,
    pub powered_by: Option<String>,
}

impl EventResponse {
    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            content_type: Some("text/plain"),
            body: NOT_FOUND_BODY.to_string(),
            powered_by: None,
        }
    }

    fn rejection(err: &ReceiverError) -> Self {
        Self {
            status: err.status_code(),
            content_type: Some("text/plain"),
            body: err.to_string(),
            powered_by: None,
        }
    }

    fn challenge(challenge: String) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: Some("application/json"),
            body: challenge,
            powered_by: None,
        }
    }

    fn accepted(package_info: &str) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: None,
            body: String::new(),
            powered_by: Some(package_info.to_string()),
        }
    }
}

impl From<EventResponse> for web::HttpResponse {
    fn from(response: EventResponse) -> Self {
        let mut builder = web::HttpResponse::build(response.status);

        if let Some(content_type) = response.content_type {
            builder.content_type(content_type);
        }
        if let Some(powered_by) = &response.powered_by {
            builder.set_header(POWERED_BY_HEADER, powered_by.as_str());
        }

        builder.body(response.body)
    }
}

/// Result of handling one request
pub struct Outcome {
    pub response: EventResponse,
    /// Handler work to start once the response is built
    pub tasks: BackgroundTasks,
}

/// Slack Events API receiver
#[derive(Clone)]
pub struct SlackEventApp {
    event_path: String,
    verifier: SignatureVerifier,
    registry: HandlerRegistry,
    clock: Arc<dyn Clock>,
    package_info: String,
}

impl SlackEventApp {
    pub fn new(signing_secret: impl Into<String>) -> Self {
        Self {
            event_path: DEFAULT_EVENT_PATH.to_string(),
            verifier: SignatureVerifier::new(SigningSecret::new(signing_secret)),
            registry: HandlerRegistry::new(),
            clock: Arc::new(SystemClock),
            package_info: package_info(),
        }
    }

    pub fn with_event_path(mut self, path: impl Into<String>) -> Self {
        self.event_path = path.into();
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn event_path(&self) -> &str {
        &self.event_path
    }

    /// Value sent in `X-Slack-Powered-By`
    pub fn package_info(&self) -> &str {
        &self.package_info
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }

    pub fn verify_signature(&self, timestamp: &str, body: &str, signature: &str) -> bool {
        self.verifier.verify(timestamp, body, signature)
    }

    pub fn on(&self, event_type: &str, handler: Handler) -> Handler {
        self.registry.on(event_type, handler)
    }

    pub fn once(&self, event_type: &str, handler: Handler) -> Handler {
        self.registry.once(event_type, handler)
    }

    pub fn remove_handler(&self, event_type: &str, handler: &Handler) -> Result<(), ReceiverError> {
        self.registry.remove_handler(event_type, handler)
    }

    pub fn remove_all_handlers(&self, event_type: Option<&str>) {
        self.registry.remove_all_handlers(event_type)
    }

    pub fn handlers(&self, event_type: &str) -> Vec<Handler> {
        self.registry.handlers(event_type)
    }

    /// Verifies, parses and routes one request.
    pub fn handle(&self, request: &InboundRequest) -> Outcome {
        if request.method != Method::POST {
            metric::incr_request_statds("not_found");
            return Outcome {
                response: EventResponse::not_found(),
                tasks: BackgroundTasks::default(),
            };
        }

        let raw_timestamp = request.timestamp.as_deref();
        if let Err(e) = freshness::check_timestamp(raw_timestamp, self.clock.now()) {
            return self.reject(e);
        }

        let signature = request.signature.as_deref().unwrap_or_default();
        if !self
            .verifier
            .verify_bytes(raw_timestamp.unwrap_or_default(), &request.body, signature)
        {
            return self.reject(ReceiverError::InvalidSignature);
        }

        match envelope::parse(&request.body) {
            Ok(Envelope::Challenge { challenge, body }) => {
                logfire::info!("Answering Slack URL verification challenge");
                metric::incr_request_statds("challenge");

                Outcome {
                    response: EventResponse::challenge(challenge),
                    tasks: dispatch::dispatch(
                        &self.registry,
                        CHALLENGE_EVENT,
                        EventData::Envelope(body),
                    ),
                }
            }
            Ok(Envelope::Event { event_type, body }) => {
                let tasks =
                    dispatch::dispatch(&self.registry, &event_type, EventData::Envelope(body));
                logfire::info!(
                    "Received Slack event '{event}', {count} handler(s) scheduled",
                    event = event_type,
                    count = tasks.len().to_string()
                );
                metric::incr_request_statds("event");

                Outcome {
                    response: EventResponse::accepted(&self.package_info),
                    tasks,
                }
            }
            Err(e) => self.reject(e),
        }
    }

    fn reject(&self, err: ReceiverError) -> Outcome {
        logfire::warn!(
            "Rejected Slack event request: {reason}",
            reason = err.log_message()
        );
        metric::incr_request_statds("rejected");

        Outcome {
            response: EventResponse::rejection(&err),
            tasks: dispatch::dispatch(&self.registry, ERROR_EVENT, EventData::Error(err)),
        }
    }
}

impl std::fmt::Debug for SlackEventApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackEventApp")
            .field("event_path", &self.event_path)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// `<client>/<version> Rust/<rustc version> <os name>/<os release>`
fn package_info() -> String {
    format!(
        "{client}/{version} Rust/{rust} {os}/{release}",
        client = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        rust = env!("SLACKEVENT_RUSTC_VERSION"),
        os = std::env::consts::OS,
        release = os_release(),
    )
}

/// Kernel release, e.g. `6.8.0-45-generic` on Linux or `24.1.0` on macOS
fn os_release() -> String {
    sysinfo::System::kernel_version()
        .map(|release| release.split_whitespace().collect::<Vec<_>>().join("-"))
        .filter(|release| !release.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
