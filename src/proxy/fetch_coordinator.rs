use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{error, trace};

use crate::error::ResolveError;

type SharedResult<T> = Shared<BoxFuture<'static, Result<T, ResolveError>>>;

/// Single flight: at most one operation per key is in flight at any time. Callers asking for
///  a key that is already in flight wait for that operation's result instead of starting
///  their own.
///
/// Operations run as tasks of their own. A caller that goes away only stops waiting, the
///  operation runs to completion for the remaining callers.
pub struct FetchCoordinator<K, T> {
    in_flight: Arc<DashMap<K, SharedResult<T>>>,
}
impl<K, T> Default for FetchCoordinator<K, T>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        FetchCoordinator {
            in_flight: Arc::new(DashMap::new()),
        }
    }
}
impl<K, T> FetchCoordinator<K, T>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> FetchCoordinator<K, T> {
        Default::default()
    }

    pub async fn run<F>(&self, key: K, operation: F) -> Result<T, ResolveError>
    where
        F: Future<Output = Result<T, ResolveError>> + Send + 'static,
    {
        let shared = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(e) => {
                trace!("joining in-flight operation");
                e.get().clone()
            }
            Entry::Vacant(e) => {
                // the spawned task can not remove the key before it is inserted: it would
                //  have to wait for the shard lock held by this entry
                let release = ReleaseOnDrop {
                    in_flight: self.in_flight.clone(),
                    key,
                };
                let handle = tokio::spawn(async move {
                    let _release = release;
                    operation.await
                });

                let shared = async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(e) => {
                            error!("in-flight operation did not complete: {}", e);
                            Err(ResolveError::Internal(format!("operation aborted: {}", e)))
                        }
                    }
                }.boxed().shared();

                e.insert(shared.clone());
                shared
            }
        };

        shared.await
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

/// Removes the key once its operation is over, whether it completed, panicked or was aborted
struct ReleaseOnDrop<K: Hash + Eq, T> {
    in_flight: Arc<DashMap<K, SharedResult<T>>>,
    key: K,
}
impl<K: Hash + Eq, T> Drop for ReleaseOnDrop<K, T> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}
