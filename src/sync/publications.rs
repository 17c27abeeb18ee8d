use std::collections::HashSet;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::{error::SendError, unbounded_channel, UnboundedSender};

use super::{Subscription, SyncEvent};
use crate::store::{ChangeEvent, Collection, Document};

/// Start a predicate-filtered publication over one collection.
///
/// The feed subscription is taken before the snapshot so no committed write
/// can fall between them; an event replayed against a record already in the
/// matched set degrades to `Changed`, which keeps the stream consistent.
pub(super) fn spawn_filter_publication<T, P>(collection: Collection<T>, pred: P) -> Subscription<T>
where
    T: Document,
    P: Fn(&T) -> bool + Send + Sync + 'static,
{
    let (tx, rx) = unbounded_channel();

    let mut feed = collection.subscribe();
    let snapshot = collection.snapshot_filtered(&pred);
    let mut matched: HashSet<String> = snapshot.iter().map(|doc| doc.id().to_string()).collect();

    tokio::spawn(async move {
        loop {
            match feed.recv().await {
                Ok(event) => {
                    if apply_change(&event, &pred, &mut matched, &tx).is_err() {
                        break; // subscriber went away
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        collection = T::COLLECTION,
                        skipped,
                        "change feed lagged, resynchronizing publication"
                    );
                    if resync(&collection, &pred, &mut matched, &tx).is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    Subscription {
        snapshot,
        events: rx,
    }
}

fn apply_change<T, P>(
    event: &ChangeEvent<T>,
    pred: &P,
    matched: &mut HashSet<String>,
    tx: &UnboundedSender<SyncEvent<T>>,
) -> Result<(), SendError<SyncEvent<T>>>
where
    T: Document,
    P: Fn(&T) -> bool,
{
    match event {
        ChangeEvent::Added(doc) | ChangeEvent::Updated(doc) => {
            let id = doc.id().to_string();
            if pred(doc) {
                if matched.insert(id) {
                    tx.send(SyncEvent::Added {
                        record: doc.clone(),
                    })?;
                } else {
                    tx.send(SyncEvent::Changed {
                        record: doc.clone(),
                    })?;
                }
            } else if matched.remove(&id) {
                tx.send(SyncEvent::Removed { id })?;
            }
        }
        ChangeEvent::Removed(id) => {
            if matched.remove(id) {
                tx.send(SyncEvent::Removed { id: id.clone() })?;
            }
        }
    }
    Ok(())
}

/// Rebuild the matched set from a fresh snapshot after feed lag. Retained
/// records are re-sent as `Changed` because their content may have moved
/// while events were dropped.
fn resync<T, P>(
    collection: &Collection<T>,
    pred: &P,
    matched: &mut HashSet<String>,
    tx: &UnboundedSender<SyncEvent<T>>,
) -> Result<(), SendError<SyncEvent<T>>>
where
    T: Document,
    P: Fn(&T) -> bool,
{
    let current = collection.snapshot_filtered(pred);
    let current_ids: HashSet<String> = current.iter().map(|doc| doc.id().to_string()).collect();

    for gone in matched.difference(&current_ids) {
        tx.send(SyncEvent::Removed { id: gone.clone() })?;
    }
    for doc in current {
        if matched.contains(doc.id()) {
            tx.send(SyncEvent::Changed { record: doc })?;
        } else {
            tx.send(SyncEvent::Added { record: doc })?;
        }
    }

    *matched = current_ids;
    Ok(())
}
