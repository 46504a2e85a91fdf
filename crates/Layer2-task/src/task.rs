//! Task handle and manual completion source

use crate::state::TaskStatus;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use task_notify_foundation::{is_cancellation, primary_cause, Error};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Generate a new random TaskId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Resolution state held by a [`TaskHandle`]
#[derive(Debug)]
pub(crate) enum Settlement<T> {
    Pending,
    Succeeded(T),
    Canceled,
    Faulted(Arc<anyhow::Error>),
}

impl<T> Settlement<T> {
    /// Classify a computation error. Aggregates never survive this.
    fn from_error(err: anyhow::Error) -> Self {
        let err = primary_cause(err);
        if is_cancellation(&err) {
            Settlement::Canceled
        } else {
            Settlement::Faulted(Arc::new(err))
        }
    }

    pub(crate) fn status(&self) -> TaskStatus {
        match self {
            Settlement::Pending => TaskStatus::Pending,
            Settlement::Succeeded(_) => TaskStatus::RanToCompletion,
            Settlement::Canceled => TaskStatus::Canceled,
            Settlement::Faulted(_) => TaskStatus::Faulted,
        }
    }

    pub(crate) fn value(&self) -> Option<&T> {
        match self {
            Settlement::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn fault(&self) -> Option<&Arc<anyhow::Error>> {
        match self {
            Settlement::Faulted(err) => Some(err),
            _ => None,
        }
    }
}

/// Handle onto a computation that settles exactly once.
///
/// Clones share the same cell; the first settlement wins and every later
/// attempt is ignored.
pub struct TaskHandle<T> {
    id: TaskId,
    cell: Arc<watch::Sender<Settlement<T>>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}

impl<T> TaskHandle<T> {
    fn pending() -> Self {
        let (cell, _) = watch::channel(Settlement::Pending);
        Self {
            id: TaskId::new(),
            cell: Arc::new(cell),
        }
    }

    fn settled_with(outcome: Settlement<T>) -> Self {
        let handle = Self::pending();
        handle.settle(outcome);
        handle
    }

    /// Create an unresolved handle together with the [`Resolver`] that settles it.
    pub fn channel() -> (Resolver<T>, Self) {
        let handle = Self::pending();
        let resolver = Resolver {
            handle: handle.clone(),
            on_abandon: Abandon::Fault,
        };
        (resolver, handle)
    }

    /// Handle that already ran to completion
    pub fn succeeded(value: T) -> Self {
        Self::settled_with(Settlement::Succeeded(value))
    }

    /// Handle that already failed.
    ///
    /// A fault whose primary cause is [`Error::Cancelled`] yields a canceled handle.
    pub fn failed(err: impl Into<anyhow::Error>) -> Self {
        Self::settled_with(Settlement::from_error(err.into()))
    }

    /// Handle that was already canceled
    pub fn canceled() -> Self {
        Self::settled_with(Settlement::Canceled)
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Current status
    pub fn status(&self) -> TaskStatus {
        self.cell.borrow().status()
    }

    /// Check if the handle reached a terminal status
    pub fn is_settled(&self) -> bool {
        self.status().is_terminal()
    }

    /// The single fault, if the computation faulted
    pub fn error(&self) -> Option<Arc<anyhow::Error>> {
        self.cell.borrow().fault().cloned()
    }

    /// Whether both handles point at the same computation
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    /// Wait until the computation settles and return its terminal status.
    ///
    /// Returns immediately for a handle that is already settled.
    pub async fn settled(&self) -> TaskStatus {
        let mut rx = self.cell.subscribe();
        let status = match rx.wait_for(|settlement| settlement.status().is_terminal()).await {
            Ok(settlement) => settlement.status(),
            Err(_) => self.status(),
        };
        status
    }

    /// Read the settlement under a single borrow
    pub(crate) fn inspect<R>(&self, f: impl FnOnce(&Settlement<T>) -> R) -> R {
        f(&self.cell.borrow())
    }

    fn settle(&self, outcome: Settlement<T>) -> bool {
        self.cell.send_if_modified(|current| {
            if current.status().is_pending() {
                *current = outcome;
                true
            } else {
                false
            }
        })
    }
}

impl<T: Clone> TaskHandle<T> {
    /// The value, if the computation ran to completion
    pub fn result(&self) -> Option<T> {
        self.cell.borrow().value().cloned()
    }
}

impl<T> TaskHandle<T>
where
    T: Send + Sync + 'static,
{
    /// Run a future on the ambient tokio runtime and settle from its output.
    ///
    /// - `Ok(value)` runs to completion
    /// - `Err` whose primary cause is [`Error::Cancelled`] is canceled
    /// - any other `Err`, or a panic, faults
    ///
    /// If the runtime drops the future before it finishes, the handle is canceled.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn<Fut>(future: Fut) -> Self
    where
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let (mut resolver, handle) = Self::channel();
        resolver.on_abandon = Abandon::Cancel;

        let id = handle.id;
        tokio::spawn(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(value)) => resolver.succeed(value),
                Ok(Err(err)) => resolver.fail(err),
                Err(payload) => {
                    warn!(task_id = %id, "Computation panicked");
                    resolver.fail(panic_fault("computation", payload));
                }
            }
        });

        handle
    }

    /// Like [`TaskHandle::spawn`], but a fired `token` settles the handle as canceled.
    ///
    /// The token stays with the caller; nothing here ever fires it.
    pub fn spawn_cancellable<Fut>(token: CancellationToken, future: Fut) -> Self
    where
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(Error::Cancelled.into()),
                result = future => result,
            }
        })
    }
}

/// What a dropped, unresolved [`Resolver`] does to its handle
#[derive(Debug, Clone, Copy)]
enum Abandon {
    Fault,
    Cancel,
}

/// Settles the [`TaskHandle`] it was created with.
///
/// Dropping a resolver without settling faults the handle with
/// [`Error::ResolverDropped`].
pub struct Resolver<T> {
    handle: TaskHandle<T>,
    on_abandon: Abandon,
}

impl<T> Resolver<T> {
    /// Handle this resolver settles
    pub fn handle(&self) -> TaskHandle<T> {
        self.handle.clone()
    }

    /// Settle with a value
    pub fn succeed(self, value: T) {
        self.handle.settle(Settlement::Succeeded(value));
    }

    /// Settle with a fault (a cancellation fault cancels instead)
    pub fn fail(self, err: impl Into<anyhow::Error>) {
        self.handle.settle(Settlement::from_error(err.into()));
    }

    /// Settle as canceled
    pub fn cancel(self) {
        self.handle.settle(Settlement::Canceled);
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if self.handle.is_settled() {
            return;
        }

        let outcome = match self.on_abandon {
            Abandon::Fault => Settlement::Faulted(Arc::new(Error::ResolverDropped.into())),
            Abandon::Cancel => Settlement::Canceled,
        };

        if self.handle.settle(outcome) {
            debug!(task_id = %self.handle.id, "Resolver dropped before completion");
        }
    }
}

/// Turn a panic payload into a fault
pub(crate) fn panic_fault(origin: &str, payload: Box<dyn Any + Send>) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());

    anyhow::anyhow!("{} panicked: {}", origin, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_resolver_settles_once() {
        let (resolver, handle) = TaskHandle::<i32>::channel();
        let twin = resolver.handle();
        assert_eq!(handle.status(), TaskStatus::Pending);

        resolver.succeed(7);

        assert_eq!(handle.settled().await, TaskStatus::RanToCompletion);
        assert_eq!(twin.result(), Some(7));
        assert!(twin.ptr_eq(&handle));

        // 두 번째 settle 시도는 무시된다
        assert!(!handle.settle(Settlement::Canceled));
        assert_eq!(handle.status(), TaskStatus::RanToCompletion);
    }

    #[tokio::test]
    async fn test_dropped_resolver_faults() {
        let (resolver, handle) = TaskHandle::<i32>::channel();
        drop(resolver);

        assert_eq!(handle.settled().await, TaskStatus::Faulted);
        let err = handle.error().expect("fault expected");
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::ResolverDropped)
        ));
    }

    #[tokio::test]
    async fn test_fail_with_cancellation_cancels() {
        let (resolver, handle) = TaskHandle::<i32>::channel();
        resolver.fail(Error::Cancelled);

        assert_eq!(handle.status(), TaskStatus::Canceled);
        assert!(handle.error().is_none());
    }

    #[tokio::test]
    async fn test_failed_unwraps_aggregate() {
        let handle = TaskHandle::<i32>::failed(Error::aggregate([
            anyhow::anyhow!("first"),
            anyhow::anyhow!("second"),
        ]));

        let err = handle.error().expect("fault expected");
        assert_eq!(err.to_string(), "first");
        assert!(handle.result().is_none());
    }

    #[tokio::test]
    async fn test_spawn_success() {
        let handle = TaskHandle::spawn(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, anyhow::Error>("done".to_string())
        });

        assert_eq!(handle.settled().await, TaskStatus::RanToCompletion);
        assert_eq!(handle.result().as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn test_spawn_panic_faults() {
        async fn explode() -> anyhow::Result<i32> {
            panic!("kaboom")
        }

        let handle = TaskHandle::spawn(explode());

        assert_eq!(handle.settled().await, TaskStatus::Faulted);
        let message = handle.error().map(|e| e.to_string()).unwrap_or_default();
        assert!(message.contains("kaboom"), "unexpected message: {}", message);
    }

    #[tokio::test]
    async fn test_spawn_cancellable() {
        let token = CancellationToken::new();
        let handle = TaskHandle::spawn_cancellable(token.clone(), async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, anyhow::Error>(1)
        });

        token.cancel();

        assert_eq!(handle.settled().await, TaskStatus::Canceled);
        assert!(handle.result().is_none());
        assert!(handle.error().is_none());
    }

    #[test]
    fn test_pre_settled_constructors() {
        assert_eq!(TaskHandle::succeeded(3).status(), TaskStatus::RanToCompletion);
        assert_eq!(TaskHandle::<i32>::canceled().status(), TaskStatus::Canceled);
        assert_eq!(
            TaskHandle::<i32>::failed(anyhow::anyhow!("bad")).status(),
            TaskStatus::Faulted
        );
        assert_ne!(TaskHandle::succeeded(1).id(), TaskHandle::succeeded(1).id());
    }
}
