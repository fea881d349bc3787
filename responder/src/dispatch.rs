//! Fan-out of one event to its handlers as background work
//!
//! [`dispatch`] copies the handler list out of the registry at call time, so
//! later registrations and removals never affect work already scheduled.

use crate::{
    metric,
    registry::{Callback, EventData, HandlerId, HandlerRegistry, HandlerResult},
};
use futures::{FutureExt, future};
use std::{panic::AssertUnwindSafe, sync::Arc};

/// One handler invocation waiting to run
pub struct DeferredInvocation {
    event_type: Arc<str>,
    handler_id: HandlerId,
    callback: Callback,
    payload: Arc<EventData>,
}

impl DeferredInvocation {
    pub fn handler_id(&self) -> HandlerId {
        self.handler_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Runs the handler. Panics are turned into errors.
    pub async fn run(self) -> HandlerResult {
        match AssertUnwindSafe(self.callback.call(self.payload))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "handler {} panicked while handling '{}'",
                self.handler_id,
                self.event_type
            )),
        }
    }

    /// Runs the handler and logs its failure. Nothing is retried.
    pub async fn execute(self) {
        let event_type = self.event_type.clone();
        let handler_id = self.handler_id;

        if let Err(e) = self.run().await {
            metric::incr_handler_statds("handler_failed");
            logfire::error!(
                "Handler {handler} failed for event '{event}': {error}",
                handler = handler_id.to_string(),
                event = event_type.to_string(),
                error = format!("{e:#}")
            );
        }
    }
}

/// Handler invocations attached to a response
#[derive(Default)]
pub struct BackgroundTasks {
    invocations: Vec<DeferredInvocation>,
}

impl BackgroundTasks {
    pub fn len(&self) -> usize {
        self.invocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }

    pub fn handler_ids(&self) -> Vec<HandlerId> {
        self.invocations.iter().map(|i| i.handler_id).collect()
    }

    /// Spawns every invocation on the current ntex runtime, in registration order.
    ///
    /// Each invocation is its own task, a slow or failing handler does not hold
    /// back its siblings.
    pub fn spawn(self) {
        for invocation in self.invocations {
            ntex::rt::spawn(invocation.execute());
        }
    }

    /// Runs all invocations concurrently and waits for them.
    ///
    /// Results are returned in registration order.
    pub async fn join(self) -> Vec<HandlerResult> {
        future::join_all(self.invocations.into_iter().map(DeferredInvocation::run)).await
    }
}

/// Schedules every handler registered for `event_type` with `payload`.
pub fn dispatch(registry: &HandlerRegistry, event_type: &str, payload: EventData) -> BackgroundTasks {
    let snapshot = registry.snapshot(event_type);
    if snapshot.is_empty() {
        logfire::debug!(
            "No handlers registered for event '{event}'",
            event = event_type.to_string()
        );
        return BackgroundTasks::default();
    }

    let event_type: Arc<str> = Arc::from(event_type);
    let payload = Arc::new(payload);

    BackgroundTasks {
        invocations: snapshot
            .into_iter()
            .map(|(handler_id, callback)| DeferredInvocation {
                event_type: event_type.clone(),
                handler_id,
                callback,
                payload: payload.clone(),
            })
            .collect(),
    }
}
