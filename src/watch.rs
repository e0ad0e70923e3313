//! Change notifications and row-set watch streams.
//!
//! Writes to the local mirror fan out table-level change events over a
//! broadcast channel. A [`RowSetWatch`] turns those events into the contract
//! the UI consumes: the full current row set is re-delivered on every
//! underlying change, so subscribers never diff individual rows.
//! Notifications are in-process only; the managed sync engine converges
//! replicas by writing rows, which re-enters this path.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::Stream;
use tracing::warn;

use crate::error::Result;

/// Tables of the local mirror that carry selection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    AudioVersions,
    TextVersions,
    LanguageEntities,
    SavedAudioVersions,
    SavedTextVersions,
    CurrentSelections,
}

/// A change to one of the mirror's tables.
///
/// Row-level detail is deliberately absent: watchers requery, they do not
/// patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: Table,
}

/// Handle for fanning change events out to subscribers.
#[derive(Clone)]
pub struct ChangeSender {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeSender {
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send an event to all subscribers. Send errors (no subscribers) are
    /// ignored.
    pub fn send(&self, table: Table) {
        let _ = self.sender.send(ChangeEvent { table });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeSender {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

/// A live subscription that yields the full current row set on every change
/// to a relevant table, starting with an initial snapshot.
pub struct RowSetWatch<T> {
    rx: mpsc::Receiver<T>,
    // Held only by the silent variant so the channel never closes.
    _keepalive: Option<mpsc::Sender<T>>,
}

impl<T: Send + 'static> RowSetWatch<T> {
    /// A subscription that never yields and never terminates.
    ///
    /// Returned to unauthenticated callers so the interface stays uniform:
    /// no rows, no error.
    pub fn silent() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            rx,
            _keepalive: Some(tx),
        }
    }

    /// Spawn a watcher task: emit the current row set, then requery and
    /// re-emit after every change to one of `tables`.
    ///
    /// The task exits when the stream is dropped or the change channel
    /// closes. Lagged notifications are coalesced into a single requery.
    pub fn live<F, Fut>(
        tables: Vec<Table>,
        mut changes: broadcast::Receiver<ChangeEvent>,
        query: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            loop {
                match query().await {
                    Ok(rows) => {
                        if tx.send(rows).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        // Keep the subscription alive; the next change
                        // retries the query.
                        warn!(error = %err, "watch requery failed");
                    }
                }

                loop {
                    match changes.recv().await {
                        Ok(event) if tables.contains(&event.table) => break,
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(_)) => break,
                        Err(broadcast::error::RecvError::Closed) => return,
                    }
                }
            }
        });

        Self {
            rx,
            _keepalive: None,
        }
    }
}

impl<T> Stream for RowSetWatch<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_stream::StreamExt;

    #[test]
    fn test_change_sender_fan_out() {
        let sender = ChangeSender::new(16);
        let mut a = sender.subscribe();
        let mut b = sender.subscribe();

        sender.send(Table::SavedAudioVersions);

        assert_eq!(a.try_recv().unwrap().table, Table::SavedAudioVersions);
        assert_eq!(b.try_recv().unwrap().table, Table::SavedAudioVersions);
    }

    #[test]
    fn test_send_without_subscribers_is_ok() {
        let sender = ChangeSender::new(16);
        sender.send(Table::CurrentSelections);
        assert_eq!(sender.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_silent_watch_never_yields() {
        let mut watch: RowSetWatch<Vec<u8>> = RowSetWatch::silent();
        let result = tokio::time::timeout(Duration::from_millis(50), watch.next()).await;
        assert!(result.is_err(), "silent watch must not yield");
    }

    #[tokio::test]
    async fn test_live_watch_emits_initial_and_on_change() {
        let sender = ChangeSender::new(16);
        let mut watch = RowSetWatch::live(
            vec![Table::SavedAudioVersions],
            sender.subscribe(),
            || async { Ok(vec![1u8]) },
        );

        let first = watch.next().await.unwrap();
        assert_eq!(first, vec![1]);

        sender.send(Table::SavedAudioVersions);
        let second = tokio::time::timeout(Duration::from_secs(2), watch.next())
            .await
            .expect("change should trigger re-delivery")
            .unwrap();
        assert_eq!(second, vec![1]);
    }

    #[tokio::test]
    async fn test_live_watch_ignores_unrelated_tables() {
        let sender = ChangeSender::new(16);
        let mut watch = RowSetWatch::live(
            vec![Table::CurrentSelections],
            sender.subscribe(),
            || async { Ok(0u8) },
        );

        // Drain the initial emission.
        watch.next().await.unwrap();

        sender.send(Table::LanguageEntities);
        let result = tokio::time::timeout(Duration::from_millis(50), watch.next()).await;
        assert!(result.is_err(), "unrelated change must not re-deliver");
    }
}
