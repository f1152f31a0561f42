// ── Reactive metrics stream ──
//
// Subscription type for consuming per-tick metrics from the monitor.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::NetworkMetrics;

/// A subscription to the monitor's metrics.
///
/// Provides both point-in-time snapshot access and change notification via
/// [`changed`](Self::changed) or by converting into a `Stream`.
pub struct MetricsStream {
    current: Arc<NetworkMetrics>,
    receiver: watch::Receiver<Arc<NetworkMetrics>>,
}

impl MetricsStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<NetworkMetrics>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Metrics captured at creation or at the last `changed()`.
    pub fn current(&self) -> &Arc<NetworkMetrics> {
        &self.current
    }

    /// Latest published metrics.
    pub fn latest(&self) -> Arc<NetworkMetrics> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next tick. `None` once the monitor has stopped.
    pub async fn changed(&mut self) -> Option<Arc<NetworkMetrics>> {
        self.receiver.changed().await.ok()?;
        let metrics = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&metrics);
        Some(metrics)
    }

    /// Convert into a `Stream` yielding the current value, then one item
    /// per tick.
    pub fn into_stream(self) -> MetricsWatchStream {
        MetricsWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct MetricsWatchStream {
    inner: WatchStream<Arc<NetworkMetrics>>,
}

impl Stream for MetricsWatchStream {
    type Item = Arc<NetworkMetrics>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::model::ConnectionType;

    fn metrics(score: u8) -> Arc<NetworkMetrics> {
        Arc::new(NetworkMetrics {
            bandwidth_mbps: 5.0,
            latency_ms: 50.0,
            packet_loss: 0.0,
            connection_type: ConnectionType::Ethernet,
            quality_score: score,
            buffer_health: 10.0,
            timestamp: Utc::now(),
        })
    }

    #[tokio::test]
    async fn changed_tracks_latest_send() {
        let (tx, rx) = watch::channel(metrics(5));
        let mut stream = MetricsStream::new(rx);
        assert_eq!(stream.current().quality_score, 5);

        tx.send(metrics(9)).unwrap();
        let next = stream.changed().await.unwrap();
        assert_eq!(next.quality_score, 9);
        assert_eq!(stream.current().quality_score, 9);

        drop(tx);
        assert!(stream.changed().await.is_none());
        assert_eq!(stream.latest().quality_score, 9);
    }

    #[tokio::test]
    async fn stream_yields_initial_then_updates() {
        use tokio_stream::StreamExt;

        let (tx, rx) = watch::channel(metrics(3));
        let mut stream = MetricsStream::new(rx).into_stream();
        assert_eq!(stream.next().await.unwrap().quality_score, 3);

        tx.send(metrics(8)).unwrap();
        assert_eq!(stream.next().await.unwrap().quality_score, 8);
    }
}
