//! Change streams: filtered, single-subscriber views of store mutations.

use crate::error::{Result, StoreError};
use crate::types::{ChangeRecord, StreamId, SubscriberState};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use super::filter::ChangeFilter;
use super::set::{swap_out, StreamSet};

/// Handler attached to a change stream. Runs on one of the store's delivery
/// workers, never on the mutating thread.
pub type ChangeHandler = Box<dyn FnMut(ChangeRecord) + Send + 'static>;

/// Store-side half of a change stream.
///
/// Lock order on the delivery path is handler, then state. Subscribe installs
/// the handler before the sink is registered, so no delivery can hold the
/// handler lock at that point.
pub(crate) struct ChangeSink {
    id: StreamId,
    filter: ChangeFilter,
    state: Mutex<SubscriberState>,
    handler: Mutex<Option<ChangeHandler>>,
}

impl ChangeSink {
    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn filter(&self) -> &ChangeFilter {
        &self.filter
    }

    fn is_subscribed(&self) -> bool {
        *self.state.lock() == SubscriberState::Subscribed
    }

    /// Call the handler with `record` if the stream is still subscribed.
    ///
    /// Backlog queued before an unsubscribe is discarded here, one record at a
    /// time, and the handler is dropped the first time the check fails.
    pub fn run(&self, record: ChangeRecord) {
        let mut handler = self.handler.lock();
        if !self.is_subscribed() {
            if handler.take().is_some() {
                trace!(stream = %self.id, "handler released");
            }
            return;
        }

        if let Some(handler) = handler.as_mut() {
            trace!(stream = %self.id, item = %record.id, version = %record.version, "delivering change");
            handler(record);
        }

        // The handler may have unsubscribed its own stream.
        if !self.is_subscribed() {
            handler.take();
        }
    }

    /// Mark the sink unsubscribed and drop its handler unless a delivery is
    /// running it right now; that delivery drops it on return.
    fn retire(&self, state: &mut SubscriberState) {
        *state = SubscriberState::Unsubscribed;
        if let Some(mut handler) = self.handler.try_lock() {
            handler.take();
        }
    }

    /// Make the sink permanently inert.
    pub fn detach(&self) {
        let mut state = self.state.lock();
        self.retire(&mut state);
    }
}

/// A filtered subscription to the changes of one store.
///
/// Created by `Store::on_change` or `Store::on_all_changes`. Nothing is
/// delivered until [`subscribe`](Self::subscribe) attaches a handler. Dropping
/// the handle does not unsubscribe; the handler stays live until
/// [`unsubscribe`](Self::unsubscribe) or a store reset.
pub struct ChangeStream {
    sink: Arc<ChangeSink>,
    streams: Arc<StreamSet<ChangeSink>>,
}

impl ChangeStream {
    pub(crate) fn new(
        id: StreamId,
        filter: ChangeFilter,
        streams: Arc<StreamSet<ChangeSink>>,
    ) -> Self {
        Self {
            sink: Arc::new(ChangeSink {
                id,
                filter,
                state: Mutex::new(SubscriberState::Created),
                handler: Mutex::new(None),
            }),
            streams,
        }
    }

    pub fn id(&self) -> StreamId {
        self.sink.id
    }

    pub fn filter(&self) -> &ChangeFilter {
        &self.sink.filter
    }

    pub fn state(&self) -> SubscriberState {
        *self.sink.state.lock()
    }

    /// Attach `handler` and start receiving matching changes.
    ///
    /// The handler is called once per matching record, in version order, on
    /// one of the store's delivery workers. A stream is always served by the
    /// same worker, so calls never overlap.
    pub fn subscribe<F>(&self, handler: F) -> Result<()>
    where
        F: FnMut(ChangeRecord) + Send + 'static,
    {
        self.subscribe_with(Some(Box::new(handler)))
    }

    /// Type-erased form of [`subscribe`](Self::subscribe) for callers that
    /// hold an optional handler.
    pub fn subscribe_with(&self, handler: Option<ChangeHandler>) -> Result<()> {
        let mut entries = self.streams.lock();
        let mut state = self.sink.state.lock();

        if *state != SubscriberState::Created {
            return Err(StoreError::AlreadySubscribed(self.sink.id));
        }
        let handler = handler.ok_or(StoreError::InvalidHandler(self.sink.id))?;

        *self.sink.handler.lock() = Some(handler);
        *state = SubscriberState::Subscribed;
        entries.push(Arc::clone(&self.sink));

        debug!(stream = %self.sink.id, filter = ?self.sink.filter, "change stream subscribed");
        Ok(())
    }

    /// Detach the handler. It is not called again after this returns, except
    /// for a call already in progress.
    pub fn unsubscribe(&self) -> Result<()> {
        let mut entries = self.streams.lock();
        let mut state = self.sink.state.lock();

        if *state != SubscriberState::Subscribed {
            return Err(StoreError::NotSubscribed(self.sink.id));
        }

        swap_out(&mut entries, &self.sink);
        self.sink.retire(&mut state);

        debug!(stream = %self.sink.id, "change stream unsubscribed");
        Ok(())
    }
}

impl fmt::Debug for ChangeStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeStream")
            .field("id", &self.sink.id)
            .field("filter", &self.sink.filter)
            .field("state", &self.state())
            .finish()
    }
}
