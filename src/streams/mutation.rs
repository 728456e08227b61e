//! Mutation streams: filtered, single-subscriber views of mutation requests.

use crate::error::{Result, StoreError};
use crate::types::{StreamId, SubscriberState, Value};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::filter::LabelFilter;
use super::set::{swap_out, StreamSet};

/// Handler attached to a mutation stream. Runs on the thread calling `mutate`.
pub type MutationHandler = Arc<dyn Fn(&MutationRequest) + Send + Sync + 'static>;

/// Success or error callback carried by a mutation request.
pub type ResponseHandler = Arc<dyn Fn(Value) + Send + Sync + 'static>;

/// A routed request for action.
///
/// Every matching mutation stream receives the same request and may call
/// either callback any number of times.
#[derive(Clone)]
pub struct MutationRequest {
    pub request: Value,
    pub request_type: Value,
    success: Option<ResponseHandler>,
    error: Option<ResponseHandler>,
}

impl MutationRequest {
    pub fn new(request: impl Into<Value>, request_type: impl Into<Value>) -> Self {
        Self {
            request: request.into(),
            request_type: request_type.into(),
            success: None,
            error: None,
        }
    }

    pub fn on_success<F>(mut self, handler: F) -> Self
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.success = Some(Arc::new(handler));
        self
    }

    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(handler));
        self
    }

    /// Set both callbacks from optional, type-erased handlers.
    pub fn with_handlers(
        mut self,
        success: Option<ResponseHandler>,
        error: Option<ResponseHandler>,
    ) -> Self {
        self.success = success;
        self.error = error;
        self
    }

    /// Invoke the success callback, if any. Returns whether one was present.
    pub fn succeed(&self, response: Value) -> bool {
        match self.success {
            Some(ref handler) => {
                handler(response);
                true
            }
            None => false,
        }
    }

    /// Invoke the error callback, if any. Returns whether one was present.
    pub fn fail(&self, error: Value) -> bool {
        match self.error {
            Some(ref handler) => {
                handler(error);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for MutationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationRequest")
            .field("request", &self.request)
            .field("request_type", &self.request_type)
            .field("success", &self.success.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

/// Store-side half of a mutation stream.
pub(crate) struct MutationSink {
    id: StreamId,
    filter: LabelFilter,
    state: Mutex<SubscriberState>,
    handler: Mutex<Option<MutationHandler>>,
}

impl MutationSink {
    pub fn filter(&self) -> &LabelFilter {
        &self.filter
    }

    /// Run the handler on the calling thread. Returns false if detached.
    pub fn dispatch(&self, request: &MutationRequest) -> bool {
        // Clone out so the handler runs without holding the lock.
        let handler = self.handler.lock().clone();
        match handler {
            Some(handler) => {
                handler(request);
                true
            }
            None => false,
        }
    }

    pub fn detach(&self) {
        *self.state.lock() = SubscriberState::Unsubscribed;
        self.handler.lock().take();
    }
}

/// A filtered subscription to the mutation requests of one store.
pub struct MutationStream {
    sink: Arc<MutationSink>,
    streams: Arc<StreamSet<MutationSink>>,
}

impl MutationStream {
    pub(crate) fn new(
        id: StreamId,
        filter: LabelFilter,
        streams: Arc<StreamSet<MutationSink>>,
    ) -> Self {
        Self {
            sink: Arc::new(MutationSink {
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

    pub fn filter(&self) -> &LabelFilter {
        &self.sink.filter
    }

    pub fn state(&self) -> SubscriberState {
        *self.sink.state.lock()
    }

    pub fn subscribe<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(&MutationRequest) + Send + Sync + 'static,
    {
        self.subscribe_with(Some(Arc::new(handler)))
    }

    pub fn subscribe_with(&self, handler: Option<MutationHandler>) -> Result<()> {
        let mut entries = self.streams.lock();
        let mut state = self.sink.state.lock();

        if *state != SubscriberState::Created {
            return Err(StoreError::AlreadySubscribed(self.sink.id));
        }
        let handler = handler.ok_or(StoreError::InvalidHandler(self.sink.id))?;

        *self.sink.handler.lock() = Some(handler);
        *state = SubscriberState::Subscribed;
        entries.push(Arc::clone(&self.sink));

        debug!(stream = %self.sink.id, filter = ?self.sink.filter, "mutation stream subscribed");
        Ok(())
    }

    /// Detach the handler. A `mutate` already iterating may still reach it.
    pub fn unsubscribe(&self) -> Result<()> {
        let mut entries = self.streams.lock();
        let mut state = self.sink.state.lock();

        if *state != SubscriberState::Subscribed {
            return Err(StoreError::NotSubscribed(self.sink.id));
        }

        swap_out(&mut entries, &self.sink);
        *state = SubscriberState::Unsubscribed;
        self.sink.handler.lock().take();

        debug!(stream = %self.sink.id, "mutation stream unsubscribed");
        Ok(())
    }
}

impl fmt::Debug for MutationStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationStream")
            .field("id", &self.sink.id)
            .field("filter", &self.sink.filter)
            .field("state", &self.state())
            .finish()
    }
}
