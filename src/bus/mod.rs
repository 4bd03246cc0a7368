//! The in-process event bus: a single bounded FIFO of [`Event`]s with a
//! fan-out to registered handlers.

use crate::types::Event;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Implemented by anything that wants to observe bus events. Handlers must
/// be side-effect-only and non-blocking: the Fanout worker calls every
/// handler in registration order for each dequeued event, and a slow
/// handler stalls the whole bus.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event);
}

/// Producer-facing handle: a clone of the bus's sender, offering
/// non-blocking sends. Cheap to clone and hand to every worker.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<Event>,
}

impl EventBus {
    /// Build a bus and its Fanout consumer. The returned `Fanout` must be
    /// run as its own supervised worker for events to ever reach handlers.
    pub fn new(buffer_size: usize) -> (Self, Fanout) {
        let (tx, rx) = mpsc::channel(buffer_size);
        (Self { tx }, Fanout { rx, handlers: Vec::new() })
    }

    /// Capacity of the bus's channel (== `BufferSize`).
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Current queue length (messages not yet drained by the Fanout).
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Non-blocking offer. On a full bus, the event is dropped and logged
    /// at DEBUG — lossy telemetry is acceptable.
    pub fn publish(&self, event: Event) {
        if self.tx.try_send(event).is_err() {
            debug!("event bus full, dropping event");
        }
    }
}

/// The bus's single consumer: dequeues events and delivers each to every
/// registered handler, in registration order.
pub struct Fanout {
    rx: mpsc::Receiver<Event>,
    handlers: Vec<Box<dyn EventHandler>>,
}

impl Fanout {
    pub fn register(&mut self, handler: Box<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    /// Run until every sender (every `EventBus` clone) is dropped, or the
    /// receive is cancelled externally. Intended as a supervised worker
    /// body; returning `Ok(())` here is a terminal success (the Supervisor
    /// never restarts a worker that returns normally).
    pub async fn run(&mut self) {
        while let Some(event) = self.rx.recv().await {
            for handler in &self.handlers {
                handler.handle(&event);
            }
        }
        warn!("event bus fanout exiting: all producers dropped");
    }
}
