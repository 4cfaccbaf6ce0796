use serde::{Deserialize, Serialize};
use std::{
    marker::PhantomData,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tracing::warn;

/// Transmitter abstraction over different channel kinds.
pub trait Tx
where
    Self: Clone + Send,
{
    type Item;
    type Error;
    fn send(&self, item: Self::Item) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone)]
pub struct UnboundedTx<T, Error> {
    pub tx: tokio::sync::mpsc::UnboundedSender<T>,
    phantom: PhantomData<Error>,
}

impl<T, Error> UnboundedTx<T, Error> {
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<T>) -> Self {
        Self {
            tx,
            phantom: PhantomData,
        }
    }
}

impl<T, Error> Tx for UnboundedTx<T, Error>
where
    T: Clone + Send,
    Error: From<tokio::sync::mpsc::error::SendError<T>> + Clone + Send,
{
    type Item = T;
    type Error = Error;

    fn send(&self, item: Self::Item) -> Result<(), Self::Error> {
        self.tx.send(item).map_err(Error::from)
    }
}

#[derive(Debug)]
pub struct UnboundedRx<T> {
    pub rx: tokio::sync::mpsc::UnboundedReceiver<T>,
}

impl<T> UnboundedRx<T> {
    pub fn new(rx: tokio::sync::mpsc::UnboundedReceiver<T>) -> Self {
        Self { rx }
    }

    pub fn into_stream(self) -> tokio_stream::wrappers::UnboundedReceiverStream<T> {
        tokio_stream::wrappers::UnboundedReceiverStream::new(self.rx)
    }
}

/// Construct an unbounded channel as a `(UnboundedTx, UnboundedRx)` pair.
pub fn mpsc_unbounded<T, Error>() -> (UnboundedTx<T, Error>, UnboundedRx<T>) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    (UnboundedTx::new(tx), UnboundedRx::new(rx))
}

/// Transmitter wrapper that disables itself after the receiver is dropped, rather than
/// propagating send failures to the caller.
#[derive(Debug, Clone)]
pub struct ChannelTxDroppable<ChannelTx> {
    pub state: ChannelState<ChannelTx>,
}

impl<ChannelTx> ChannelTxDroppable<ChannelTx> {
    pub fn new(tx: ChannelTx) -> Self {
        Self {
            state: ChannelState::Active(tx),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Deserialize, Serialize)]
pub enum ChannelState<Tx> {
    Active(Tx),
    Disabled,
}

impl<ChannelTx> ChannelTxDroppable<ChannelTx>
where
    ChannelTx: Tx,
{
    pub fn send(&mut self, item: ChannelTx::Item) {
        let ChannelState::Active(tx) = &self.state else {
            return;
        };

        if tx.send(item).is_err() {
            let name = std::any::type_name::<ChannelTx::Item>();
            warn!(
                name,
                "ChannelTxDroppable receiver dropped - items will no longer be sent"
            );
            self.state = ChannelState::Disabled
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self.state, ChannelState::Disabled)
    }
}

/// Bounded transmitter that never blocks the producer: a full buffer drops the item and
/// increments a shared drop counter instead.
///
/// Used for fan-out to subscribers that must not be able to stall a reader task.
#[derive(Debug, Clone)]
pub struct BoundedTxDropOnFull<T> {
    pub tx: tokio::sync::mpsc::Sender<T>,
    drops: Arc<AtomicU64>,
}

impl<T> BoundedTxDropOnFull<T> {
    pub fn new(tx: tokio::sync::mpsc::Sender<T>) -> Self {
        Self {
            tx,
            drops: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Attempt a non-blocking send. A full buffer drops the item and counts it.
    ///
    /// Returns `false` once the receiver has been dropped, signalling the subscriber can be
    /// removed from the fan-out list.
    pub fn try_send(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                self.drops.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Number of items dropped on this subscriber due to a full buffer.
    pub fn dropped(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }
}

/// Construct a bounded drop-on-full channel with the provided buffer capacity.
pub fn mpsc_bounded_drop_on_full<T>(
    capacity: usize,
) -> (BoundedTxDropOnFull<T>, tokio::sync::mpsc::Receiver<T>) {
    let (tx, rx) = tokio::sync::mpsc::channel(capacity);
    (BoundedTxDropOnFull::new(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_tx_drops_on_full_without_blocking() {
        let (tx, mut rx) = mpsc_bounded_drop_on_full::<u32>(2);

        assert!(tx.try_send(1));
        assert!(tx.try_send(2));
        // Buffer full: item dropped, producer not blocked
        assert!(tx.try_send(3));
        assert_eq!(tx.dropped(), 1);

        assert_eq!(rx.try_recv().unwrap(), 1);
        assert_eq!(rx.try_recv().unwrap(), 2);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_bounded_tx_reports_closed_receiver() {
        let (tx, rx) = mpsc_bounded_drop_on_full::<u32>(2);
        drop(rx);
        assert!(!tx.try_send(1));
    }
}
