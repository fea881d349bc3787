//! Event handler registry
//!
//! Maps an event type (`"message"`, `"reaction_added"`, `"error"`, ...) to the
//! ordered list of handlers subscribed to it. Every [`Handler`] carries a
//! process-unique [`HandlerId`]; that id is its identity for re-registration and
//! removal, so clones of a handler are the same handler.
//!
//! Handlers come in two calling conventions:
//! - sync: `Fn(&EventData) -> anyhow::Result<()>`, runs to completion once started
//! - async: `Fn(Arc<EventData>) -> impl Future<Output = anyhow::Result<()>>`
//!
//! One-shot handlers registered with [`HandlerRegistry::once`] are stored behind a
//! wrapper of the same convention that unregisters itself before running.

use crate::error::ReceiverError;
use derive_more::Display;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::{
        Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

/// Reserved event type for verification failures
pub const ERROR_EVENT: &str = "error";
/// Reserved event type for URL verification challenges
pub const CHALLENGE_EVENT: &str = "challenge";

pub type HandlerResult = anyhow::Result<()>;

type SyncCallback = dyn Fn(&EventData) -> HandlerResult + Send + Sync;
type AsyncCallback = dyn Fn(Arc<EventData>) -> BoxFuture<'static, HandlerResult> + Send + Sync;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Argument passed to every handler
#[derive(Debug)]
pub enum EventData {
    /// Full parsed request envelope (events and challenges)
    Envelope(Value),
    /// Verification failure, delivered to `"error"` handlers
    Error(ReceiverError),
}

impl EventData {
    pub fn envelope(&self) -> Option<&Value> {
        match self {
            EventData::Envelope(value) => Some(value),
            EventData::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ReceiverError> {
        match self {
            EventData::Error(err) => Some(err),
            EventData::Envelope(_) => None,
        }
    }
}

/// Identity of a registered handler
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display("#{_0}")]
pub struct HandlerId(u64);

impl HandlerId {
    fn next() -> Self {
        Self(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The function actually run for a dispatch
#[derive(Clone)]
pub(crate) enum Callback {
    Sync(Arc<SyncCallback>),
    Async(Arc<AsyncCallback>),
}

impl Callback {
    pub(crate) async fn call(&self, data: Arc<EventData>) -> HandlerResult {
        match self {
            Callback::Sync(f) => f(data.as_ref()),
            Callback::Async(f) => f(data).await,
        }
    }
}

/// A subscribable event handler
#[derive(Clone)]
pub struct Handler {
    id: HandlerId,
    callback: Callback,
}

impl Handler {
    /// Wraps a synchronous function
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&EventData) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            id: HandlerId::next(),
            callback: Callback::Sync(Arc::new(f)),
        }
    }

    /// Wraps an asynchronous function
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<EventData>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            id: HandlerId::next(),
            callback: Callback::Async(Arc::new(move |data| f(data).boxed())),
        }
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn is_async(&self) -> bool {
        matches!(self.callback, Callback::Async(_))
    }

    /// Runs the handler directly, outside of any dispatch
    pub async fn call(&self, data: Arc<EventData>) -> HandlerResult {
        self.callback.call(data).await
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Handler {}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.id)
            .field("async", &self.is_async())
            .finish()
    }
}

/// Registration key plus the callback run on dispatch
struct Entry {
    handler: Handler,
    invocable: Callback,
}

type HandlerTable = HashMap<String, Vec<Entry>>;

/// Registry of event handlers, shared by every clone
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    table: Arc<RwLock<HandlerTable>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for every future dispatch of `event_type`.
    ///
    /// Registering the same handler again replaces its entry in place.
    pub fn on(&self, event_type: &str, handler: Handler) -> Handler {
        let invocable = handler.callback.clone();
        self.insert(event_type, handler.clone(), invocable);
        handler
    }

    /// Registers `handler` for the next dispatch of `event_type` only.
    ///
    /// The stored wrapper removes the entry before running the handler and
    /// never runs it twice, even if two dispatches picked it up.
    pub fn once(&self, event_type: &str, handler: Handler) -> Handler {
        let invocable = self.one_shot(event_type, &handler);
        self.insert(event_type, handler.clone(), invocable);
        handler
    }

    /// Removes `handler` from `event_type`.
    ///
    /// # Errors
    /// `HandlerNotFound` if it was never registered there or is already gone
    pub fn remove_handler(&self, event_type: &str, handler: &Handler) -> Result<(), ReceiverError> {
        remove_entry(&mut self.write(), event_type, handler.id)
    }

    /// Clears one event type, or the whole registry when `event_type` is `None`
    pub fn remove_all_handlers(&self, event_type: Option<&str>) {
        let mut table = self.write();
        match event_type {
            Some(event_type) => {
                table.remove(event_type);
            }
            None => table.clear(),
        }
    }

    /// Registered handlers for `event_type`, in insertion order
    pub fn handlers(&self, event_type: &str) -> Vec<Handler> {
        self.read()
            .get(event_type)
            .map(|entries| entries.iter().map(|e| e.handler.clone()).collect())
            .unwrap_or_default()
    }

    /// Callbacks to run for `event_type`, copied out of the table
    pub(crate) fn snapshot(&self, event_type: &str) -> Vec<(HandlerId, Callback)> {
        self.read()
            .get(event_type)
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| (e.handler.id, e.invocable.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn insert(&self, event_type: &str, handler: Handler, invocable: Callback) {
        let mut table = self.write();
        let entries = table.entry(event_type.to_string()).or_default();

        match entries.iter_mut().find(|e| e.handler.id == handler.id) {
            Some(existing) => {
                existing.handler = handler;
                existing.invocable = invocable;
            }
            None => entries.push(Entry { handler, invocable }),
        }
    }

    fn one_shot(&self, event_type: &str, handler: &Handler) -> Callback {
        let release = OneShotRelease {
            table: Arc::downgrade(&self.table),
            event_type: event_type.to_string(),
            handler_id: handler.id,
            fired: Arc::new(AtomicBool::new(false)),
        };

        match handler.callback.clone() {
            Callback::Sync(f) => Callback::Sync(Arc::new(move |data: &EventData| {
                if !release.claim() {
                    return Ok(());
                }
                f(data)
            })),
            Callback::Async(f) => Callback::Async(Arc::new(move |data: Arc<EventData>| {
                if !release.claim() {
                    return futures::future::ready(Ok(())).boxed();
                }
                f(data)
            })),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HandlerTable> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HandlerTable> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.read();
        f.debug_map()
            .entries(table.iter().map(|(event, entries)| (event, entries.len())))
            .finish()
    }
}

fn remove_entry(
    table: &mut HandlerTable,
    event_type: &str,
    handler_id: HandlerId,
) -> Result<(), ReceiverError> {
    let position = table
        .get(event_type)
        .and_then(|entries| entries.iter().position(|e| e.handler.id == handler_id));

    match (table.get_mut(event_type), position) {
        (Some(entries), Some(position)) => {
            entries.remove(position);
            Ok(())
        }
        _ => Err(ReceiverError::HandlerNotFound {
            event_type: event_type.to_string(),
            handler_id,
        }),
    }
}

/// State captured by a one-shot wrapper. Holds the table weakly, the table owns the wrapper.
struct OneShotRelease {
    table: Weak<RwLock<HandlerTable>>,
    event_type: String,
    handler_id: HandlerId,
    fired: Arc<AtomicBool>,
}

impl OneShotRelease {
    /// Returns `true` exactly once, unregistering the handler on that call.
    fn claim(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            logfire::debug!(
                "One-shot handler {id} already fired for '{event}'",
                id = self.handler_id.to_string(),
                event = self.event_type.clone()
            );
            return false;
        }

        if let Some(table) = self.table.upgrade() {
            let mut table = table.write().unwrap_or_else(PoisonError::into_inner);
            // removed manually after the dispatch snapshot; still runs this once
            let _ = remove_entry(&mut table, &self.event_type, self.handler_id);
        }

        true
    }
}
