//! # Slack Events Responder
//!
//! Receives Slack Events API webhooks, verifies their signature and freshness,
//! answers URL verification challenges and fans typed events out to registered
//! handlers after the HTTP response is built.
//!
//! ```no_run
//! use slackevent_responder::{Handler, SlackEventApp};
//!
//! let app = SlackEventApp::new("signing-secret").with_event_path("/events");
//! app.on(
//!     "reaction_added",
//!     Handler::from_fn(|data| {
//!         println!("{:?}", data.envelope());
//!         Ok(())
//!     }),
//! );
//! ```

pub mod app;
pub mod client;
pub mod config;
pub mod demo;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod freshness;
pub mod metric;
pub mod registry;
pub mod routes;
pub mod signature;

pub use app::{EventResponse, InboundRequest, Outcome, SlackEventApp};
pub use error::ReceiverError;
pub use registry::{CHALLENGE_EVENT, ERROR_EVENT, EventData, Handler, HandlerId, HandlerRegistry};
pub use signature::{SignatureVerifier, SigningSecret};
