//! Location sources.
//!
//! The device's location stream runs independently of claim attempts. The
//! engine only ever asks for the latest sample; nothing is buffered.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use quest_core::LocationSample;

/// Latest location fix, if any.
pub trait LocationSource: Send + Sync {
    fn latest(&self) -> Option<LocationSample>;
}

/// A [`LocationSource`] fed by a background stream.
///
/// Each published sample replaces the previous one.
#[derive(Debug)]
pub struct LocationFeed {
    tx: watch::Sender<Option<LocationSample>>,
}

impl LocationFeed {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Replace the current sample.
    pub fn publish(&self, sample: LocationSample) {
        self.tx.send_replace(Some(sample));
    }

    /// Drop the current sample (provider lost its fix).
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    /// Watch for new samples.
    pub fn subscribe(&self) -> watch::Receiver<Option<LocationSample>> {
        self.tx.subscribe()
    }

    /// Publish every sample from `stream` until it ends.
    pub fn follow<S>(self: &Arc<Self>, stream: S) -> JoinHandle<()>
    where
        S: Stream<Item = LocationSample> + Send + 'static,
    {
        let feed = Arc::clone(self);
        tokio::spawn(async move {
            let mut stream = Box::pin(stream);
            while let Some(sample) = stream.next().await {
                feed.publish(sample);
            }
            debug!("Location stream ended");
        })
    }
}

impl Default for LocationFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationSource for LocationFeed {
    fn latest(&self) -> Option<LocationSample> {
        *self.tx.borrow()
    }
}
