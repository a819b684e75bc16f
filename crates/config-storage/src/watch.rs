//! Poll-based change notification shared by the backends.

use crate::models::ConfigSnapshot;
use crate::storage_trait::{ConfigStorage, SnapshotStream};
use futures::StreamExt;
use futures::stream;
use std::time::Duration;
use tracing::debug;

/// Poll `storage` every `period` and yield a snapshot whenever it changes.
///
/// The first successful read is always yielded. Errors are yielded without
/// advancing the last observed snapshot, so a recovered read that matches the
/// pre-error state is not reported as a change.
pub(crate) fn poll_snapshots<S>(storage: S, period: Duration) -> SnapshotStream
where
    S: ConfigStorage + Clone + 'static,
{
    let state: (S, Option<ConfigSnapshot>, bool) = (storage, None, true);
    stream::unfold(state, move |(storage, mut last, mut first)| async move {
        loop {
            if !first {
                tokio::time::sleep(period).await;
            }
            first = false;
            match storage.snapshot().await {
                Ok(snapshot) => {
                    if last.as_ref() == Some(&snapshot) {
                        continue;
                    }
                    debug!(
                        backend = storage.backend(),
                        objects = snapshot.len(),
                        "Configuration storage changed"
                    );
                    last = Some(snapshot.clone());
                    return Some((Ok(snapshot), (storage, last, first)));
                }
                Err(e) => return Some((Err(e), (storage, last, first))),
            }
        }
    })
    .boxed()
}
