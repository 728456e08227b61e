//! Main Store struct tying items, streams and the readiness gate together.

use crate::dispatch::{Dispatcher, ThreadSpawner};
use crate::error::{Result, StoreError};
use crate::gate::{ReadyCallback, ReadyGate};
use crate::streams::{
    ChangeFilter, ChangeSink, ChangeStream, LabelFilter, MutationRequest, MutationSink,
    MutationStream, StreamSet,
};
use crate::types::{ChangeRecord, StreamId, Value, Version};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Store configuration, applied by the registry to every store it creates.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Prefix for the names of dispatch and delivery threads.
    pub thread_name_prefix: String,

    /// Stack size for dispatch and delivery threads (None = platform default).
    pub delivery_stack_size: Option<usize>,

    /// Delivery workers per store. Change streams are spread over them by id;
    /// zero is treated as one.
    pub delivery_workers: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: "fabric-store".to_string(),
            delivery_stack_size: None,
            delivery_workers: 4,
        }
    }
}

/// Item map and version, guarded together so that every write and its
/// version bump form one critical section.
struct Items {
    values: HashMap<String, Value>,
    version: Version,
}

impl Items {
    fn new() -> Self {
        Self {
            values: HashMap::new(),
            version: Version::INITIAL,
        }
    }
}

/// A named, versioned key/value store with change notification.
///
/// Obtained from [`StoreRegistry`](crate::StoreRegistry); handles are shared
/// as `Arc<Store>` and every method takes `&self`.
///
/// Locks are independent per concern: the item map, the change stream set,
/// the mutation stream set and the readiness gate. Subscribing never blocks
/// reads or writes of items.
pub struct Store {
    name: String,

    items: RwLock<Items>,

    /// Active change streams (shared with the dispatch thread).
    change_streams: Arc<StreamSet<ChangeSink>>,

    /// Active mutation streams.
    mutation_streams: Arc<StreamSet<MutationSink>>,

    gate: ReadyGate,

    dispatcher: Dispatcher,

    next_stream_id: AtomicU64,
}

impl Store {
    /// Create a store and start its dispatch thread and delivery workers.
    pub(crate) fn new(name: &str, config: &StoreConfig) -> Result<Self> {
        let spawner = ThreadSpawner::new(
            &config.thread_name_prefix,
            name,
            config.delivery_stack_size,
        );
        let change_streams = Arc::new(StreamSet::new());
        let dispatcher = Dispatcher::start(
            &spawner,
            config.delivery_workers,
            Arc::clone(&change_streams),
        )?;

        Ok(Self {
            name: name.to_string(),
            items: RwLock::new(Items::new()),
            change_streams,
            mutation_streams: Arc::new(StreamSet::new()),
            gate: ReadyGate::new(),
            dispatcher,
            next_stream_id: AtomicU64::new(1),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current version. Starts at 1 and grows by one per put or remove.
    pub fn version(&self) -> Version {
        self.items.read().version
    }

    // --- Item Operations ---

    /// Insert or overwrite an item and notify matching change streams.
    ///
    /// Returns once the item is written; handlers run later on the store's
    /// delivery workers.
    pub fn put(&self, id: impl Into<String>, value: impl Into<Value>, state: impl Into<Value>) {
        let id = id.into();
        let value = value.into();

        let mut items = self.items.write();
        items.values.insert(id.clone(), value.clone());
        items.version = items.version.next();

        let record = ChangeRecord {
            id,
            value,
            state: state.into(),
            is_delete: false,
            version: items.version,
        };
        trace!(store = %self.name, item = %record.id, version = %record.version, "put");
        // Queued under the item lock to keep dispatch in version order.
        self.dispatcher.schedule(record);
    }

    /// Serialize `value` to JSON and put it.
    pub fn put_serialized<T: Serialize>(
        &self,
        id: impl Into<String>,
        value: &T,
        state: impl Into<Value>,
    ) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.put(id, value, state);
        Ok(())
    }

    /// Look up an item. Returns `(Value::Null, false)` when absent.
    pub fn get(&self, id: &str) -> (Value, bool) {
        match self.items.read().values.get(id) {
            Some(value) => (value.clone(), true),
            None => (Value::Null, false),
        }
    }

    pub fn get_value(&self, id: &str) -> Option<Value> {
        self.items.read().values.get(id).cloned()
    }

    /// Look up an item and deserialize it into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, id: &str) -> Result<Option<T>> {
        match self.get_value(id) {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StoreError::Deserialization(e.to_string())),
            None => Ok(None),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.read().values.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.read().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().values.is_empty()
    }

    /// Remove an item. Returns false, without notifying, if it was absent.
    ///
    /// Concurrent removes of the same id linearize on the item lock: exactly
    /// one of them returns true.
    pub fn remove(&self, id: &str, state: impl Into<Value>) -> bool {
        let mut items = self.items.write();
        let Some(value) = items.values.remove(id) else {
            return false;
        };
        items.version = items.version.next();

        let record = ChangeRecord {
            id: id.to_string(),
            value,
            state: state.into(),
            is_delete: true,
            version: items.version,
        };
        trace!(store = %self.name, item = %record.id, version = %record.version, "remove");
        self.dispatcher.schedule(record);
        true
    }

    /// Point-in-time snapshot of all values, in no particular order.
    pub fn all_values(&self) -> Vec<Value> {
        self.items.read().values.values().cloned().collect()
    }

    /// Point-in-time snapshot of all items.
    pub fn all_values_as_map(&self) -> HashMap<String, Value> {
        self.items.read().values.clone()
    }

    // --- Change Streams ---

    /// Stream of changes to item `id`. An empty `states` accepts any state.
    pub fn on_change<I, L>(&self, id: impl Into<String>, states: I) -> ChangeStream
    where
        I: IntoIterator<Item = L>,
        L: Into<Value>,
    {
        self.change_stream(ChangeFilter::item(id, LabelFilter::of(states)))
    }

    /// Stream of changes to every item. An empty `states` accepts any state.
    pub fn on_all_changes<I, L>(&self, states: I) -> ChangeStream
    where
        I: IntoIterator<Item = L>,
        L: Into<Value>,
    {
        self.change_stream(ChangeFilter::all_items(LabelFilter::of(states)))
    }

    fn change_stream(&self, filter: ChangeFilter) -> ChangeStream {
        ChangeStream::new(
            self.allocate_stream_id(),
            filter,
            Arc::clone(&self.change_streams),
        )
    }

    pub fn change_stream_count(&self) -> usize {
        self.change_streams.len()
    }

    // --- Mutation Routing ---

    /// Stream of mutation requests. An empty `request_types` accepts any type.
    pub fn on_mutation_request<I, L>(&self, request_types: I) -> MutationStream
    where
        I: IntoIterator<Item = L>,
        L: Into<Value>,
    {
        MutationStream::new(
            self.allocate_stream_id(),
            LabelFilter::of(request_types),
            Arc::clone(&self.mutation_streams),
        )
    }

    /// Hand `request` to every matching mutation stream, one after another, on
    /// the calling thread. Returns how many handlers were invoked.
    ///
    /// Every matching handler sees the request and may call its callbacks;
    /// nothing is deduplicated.
    pub fn mutate(&self, request: MutationRequest) -> usize {
        let mut reached = 0;
        for sink in self.mutation_streams.snapshot() {
            if sink.filter().matches(&request.request_type) && sink.dispatch(&request) {
                reached += 1;
            }
        }
        trace!(store = %self.name, request_type = %request.request_type, reached, "mutate");
        reached
    }

    pub fn mutation_stream_count(&self) -> usize {
        self.mutation_streams.len()
    }

    // --- Readiness ---

    /// Bulk-load an empty store and mark it ready.
    ///
    /// Loading neither bumps the version nor notifies change streams. Fails
    /// with `AlreadyInitialized`, leaving the store untouched, if it already
    /// holds items.
    pub fn populate<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        {
            let mut current = self.items.write();
            if !current.values.is_empty() {
                return Err(StoreError::AlreadyInitialized(self.name.clone()));
            }
            current.values.extend(items);
            debug!(store = %self.name, count = current.values.len(), "store populated");
        }
        self.initialize();
        Ok(())
    }

    /// Open the readiness gate. Later calls are no-ops until the next reset.
    ///
    /// Pending `when_ready` callbacks are handed to the dispatch thread; this
    /// call does not run them.
    pub fn initialize(&self) {
        if let Some(waiters) = self.gate.open() {
            debug!(store = %self.name, released = waiters.len(), "store initialized");
            self.dispatcher.release(waiters);
        }
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_open()
    }

    /// Run `callback` once the store is initialized.
    ///
    /// Runs inline if the store is already ready, otherwise on the dispatch
    /// thread after a later `initialize` or `populate`. Never blocks the
    /// caller.
    pub fn when_ready<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.gate.when_ready(Box::new(callback) as ReadyCallback);
    }

    /// Block until the store is initialized or `timeout` elapses.
    pub fn wait_ready_timeout(&self, timeout: Duration) -> bool {
        self.gate.wait_timeout(timeout)
    }

    /// Clear the store in place.
    ///
    /// Items are dropped, the version returns to 1, every change and mutation
    /// stream is detached for good and the store is no longer ready. Changes
    /// still queued for dispatch are discarded. Callbacks waiting on
    /// readiness stay pending and run after the next `initialize`.
    pub fn reset(&self) {
        let mut items = self.items.write();
        let mut changes = self.change_streams.lock();
        let mut mutations = self.mutation_streams.lock();

        // Under the item lock: every record stamped from here on is current.
        self.dispatcher.advance_epoch();
        *items = Items::new();
        let detached = changes.len() + mutations.len();
        for sink in changes.drain(..) {
            sink.detach();
        }
        for sink in mutations.drain(..) {
            sink.detach();
        }
        self.gate.close();

        debug!(store = %self.name, detached, pending = self.gate.pending(), "store reset");
    }

    fn allocate_stream_id(&self) -> StreamId {
        StreamId(self.next_stream_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("version", &self.version())
            .field("len", &self.len())
            .finish()
    }
}
