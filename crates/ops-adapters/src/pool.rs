use std::{
    collections::HashMap,
    future::Future,
    sync::Arc,
    time::Duration,
};

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

use crate::error::AdapterError;

/// A bounded, per-endpoint pool of reusable backend connections.
///
/// Mirrors the spec's "connections are pooled per host and reused across
/// calls" contract (§4.6): at most `max_per_endpoint` connections are live
/// for any one key at a time, and acquiring beyond that blocks up to
/// `acquire_timeout` before failing.
pub struct AdapterPool<T> {
    max_per_endpoint: usize,
    acquire_timeout: Duration,
    semaphores: Mutex<HashMap<String, Arc<Semaphore>>>,
    idle: Mutex<HashMap<String, Vec<T>>>,
}

impl<T: Send + 'static> AdapterPool<T> {
    pub fn new(max_per_endpoint: usize, acquire_timeout: Duration) -> Self {
        Self {
            max_per_endpoint,
            acquire_timeout,
            semaphores: Mutex::new(HashMap::new()),
            idle: Mutex::new(HashMap::new()),
        }
    }

    async fn semaphore_for(&self, key: &str) -> Arc<Semaphore> {
        let mut guard = self.semaphores.lock().await;
        guard
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_per_endpoint)))
            .clone()
    }

    /// Acquires a lease for `key`, reusing an idle connection if one exists
    /// or calling `create` to open a new one. Blocks (bounded by
    /// `acquire_timeout`) if `max_per_endpoint` connections for this key are
    /// already checked out.
    pub async fn acquire<F, Fut>(&self, key: &str, create: F) -> Result<Lease<'_, T>, AdapterError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        let semaphore = self.semaphore_for(key).await;
        let permit = tokio::time::timeout(self.acquire_timeout, semaphore.acquire_owned())
            .await
            .map_err(|_| AdapterError::PoolTimeout(key.to_string(), self.acquire_timeout))?
            .expect("pool semaphore is never closed");

        let existing = {
            let mut idle = self.idle.lock().await;
            idle.get_mut(key).and_then(Vec::pop)
        };
        let value = match existing {
            Some(value) => value,
            None => create().await?,
        };

        Ok(Lease {
            pool: self,
            key: key.to_string(),
            value: Some(value),
            permit: Some(permit),
            discard: false,
        })
    }

    async fn release(&self, key: &str, value: T) {
        let mut idle = self.idle.lock().await;
        idle.entry(key.to_string()).or_default().push(value);
    }
}

/// A checked-out connection. Returned to the pool on drop unless
/// [`Lease::discard`] was called (on auth failure or transport error, per
/// the spec's eviction rule).
pub struct Lease<'a, T> {
    pool: &'a AdapterPool<T>,
    key: String,
    value: Option<T>,
    permit: Option<OwnedSemaphorePermit>,
    discard: bool,
}

impl<T> Lease<'_, T> {
    pub fn get(&self) -> &T {
        self.value.as_ref().expect("lease value present until drop")
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.value.as_mut().expect("lease value present until drop")
    }

    /// Marks this connection for eviction instead of being returned to the
    /// pool once the lease is dropped.
    pub fn discard(&mut self) {
        self.discard = true;
    }
}

impl<T: Send + 'static> Drop for Lease<'_, T> {
    fn drop(&mut self) {
        let permit = self.permit.take();
        let value = self.value.take();
        let discard = self.discard;
        if let (Some(value), false) = (value, discard) {
            let pool = self.pool;
            let key = std::mem::take(&mut self.key);
            // Connections are plain owned values (no Tokio handle captured
            // by reference), so returning them from a detached task is safe
            // even if the lease is dropped during shutdown.
            tokio::spawn(async move {
                pool.release(&key, value).await;
                drop(permit);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn reuses_released_connections() {
        let pool = AdapterPool::<u32>::new(2, Duration::from_secs(1));
        let created = Arc::new(AtomicUsize::new(0));

        {
            let created = created.clone();
            let lease = pool
                .acquire("h1", || async move {
                    created.fetch_add(1, Ordering::SeqCst);
                    Ok(42u32)
                })
                .await
                .unwrap();
            assert_eq!(*lease.get(), 42);
        }

        // give the drop-spawned release task a chance to run
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let created2 = created.clone();
        let lease2 = pool
            .acquire("h1", || async move {
                created2.fetch_add(1, Ordering::SeqCst);
                Ok(99u32)
            })
            .await
            .unwrap();
        assert_eq!(*lease2.get(), 42);
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn discarded_lease_is_not_reused() {
        let pool = AdapterPool::<u32>::new(2, Duration::from_secs(1));
        {
            let mut lease = pool.acquire("h1", || async { Ok(1u32) }).await.unwrap();
            lease.discard();
        }
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let lease2 = pool.acquire("h1", || async { Ok(2u32) }).await.unwrap();
        assert_eq!(*lease2.get(), 2);
    }

    #[tokio::test]
    async fn acquire_times_out_when_pool_is_exhausted() {
        let pool = AdapterPool::<u32>::new(1, Duration::from_millis(20));
        let _lease = pool.acquire("h1", || async { Ok(1u32) }).await.unwrap();
        let result = pool.acquire("h1", || async { Ok(2u32) }).await;
        assert!(matches!(result, Err(AdapterError::PoolTimeout(_, _))));
    }
}
