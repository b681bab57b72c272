//! Pipeline sink
//!
//! The terminal recipient of a pipeline: final-stage outputs and the
//! end-of-inputs notification land here.

use std::fmt;
use std::sync::Arc;

use plumb_protocol::Item;
use tokio::sync::mpsc;

/// One event delivered to the sink
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    /// A result emitted by the final stage
    Result {
        /// Name of the stage that produced the item
        stage: Arc<str>,
        /// The item itself
        item: Item,
    },
    /// The named stage has drained; no further results will arrive
    Eoi {
        /// Name of the stage that finished
        stage: Arc<str>,
    },
}

/// Sending side of a pipeline sink
///
/// Cheap to clone. Delivery is best-effort and non-blocking; once the
/// collector is dropped, events vanish quietly.
#[derive(Clone)]
pub struct SinkHandle {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl SinkHandle {
    /// Deliver a final result
    pub fn deliver(&self, stage: &Arc<str>, item: Item) {
        let _ = self.tx.send(SinkEvent::Result {
            stage: Arc::clone(stage),
            item,
        });
    }

    /// Notify the sink that a stage has drained
    pub fn eoi(&self, stage: &Arc<str>) {
        let _ = self.tx.send(SinkEvent::Eoi {
            stage: Arc::clone(stage),
        });
    }

    /// Check if the collecting side is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl fmt::Debug for SinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Receiving side of a pipeline sink
pub struct SinkCollector {
    rx: mpsc::UnboundedReceiver<SinkEvent>,
}

impl SinkCollector {
    /// Receive the next sink event
    ///
    /// Returns `None` once every sending handle is dropped.
    pub async fn recv(&mut self) -> Option<SinkEvent> {
        self.rx.recv().await
    }

    /// Collect result items until the first EOI notification
    ///
    /// Items are returned in arrival order. Returns everything collected
    /// so far if the channel closes before an EOI arrives.
    pub async fn drain_until_eoi(&mut self) -> Vec<Item> {
        let mut items = Vec::new();
        while let Some(event) = self.rx.recv().await {
            match event {
                SinkEvent::Result { item, .. } => items.push(item),
                SinkEvent::Eoi { .. } => break,
            }
        }
        items
    }

    /// Non-blocking poll for an already-delivered event
    pub fn try_recv(&mut self) -> Option<SinkEvent> {
        self.rx.try_recv().ok()
    }
}

impl fmt::Debug for SinkCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SinkCollector")
    }
}

/// Create a connected sink handle / collector pair
pub fn sink_channel() -> (SinkHandle, SinkCollector) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SinkHandle { tx }, SinkCollector { rx })
}
