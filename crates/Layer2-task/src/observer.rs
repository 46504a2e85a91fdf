//! Task Observer - exposes one computation as an observable snapshot
//!
//! ```text
//!  factory() ──► TaskHandle ──settles──► completion wait (spawned)
//!                    │                         │
//!                    ▼                         ▼
//!            status / result / error    ChangeBus::publish
//!            (read any time)            result|canceled|faulted,error
//!                                       then status, completed
//! ```

use crate::state::TaskStatus;
use crate::task::{panic_fault, TaskHandle};
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, Weak};
use task_notify_foundation::{
    Attribute, ChangeBus, ChangeEvent, ChangeListener, Error, ListenerId, NotifyConfig, Result,
};
use tracing::{debug, info, warn};

/// Label used when neither the builder nor the config names the observer
pub const DEFAULT_LABEL: &str = "task";

type Factory<T> = Box<dyn FnOnce() -> TaskHandle<T> + Send>;

/// Observable adapter over a single computation.
///
/// The factory runs on the first [`start`](TaskObserver::start) and never
/// again. Every accessor is derived from the handle it produced, so reads are
/// always consistent with [`status`](TaskObserver::status).
pub struct TaskObserver<T> {
    inner: Arc<ObserverInner<T>>,
}

impl<T> Clone for TaskObserver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ObserverInner<T> {
    label: String,
    factory: Mutex<Option<Factory<T>>>,
    handle: OnceLock<TaskHandle<T>>,
    bus: ChangeBus,
}

impl<T> ObserverInner<T> {
    fn notify(&self, attribute: Attribute) {
        self.bus.publish(ChangeEvent::new(self.label.clone(), attribute));
    }

    /// Type-specific notifications first, then the generic ones.
    fn publish_completion(&self, status: TaskStatus) {
        match status {
            TaskStatus::RanToCompletion => {
                info!(observer = %self.label, "Task ran to completion");
                self.notify(Attribute::Result);
                self.notify(Attribute::SuccessfullyCompleted);
            }
            TaskStatus::Canceled => {
                info!(observer = %self.label, "Task canceled");
                self.notify(Attribute::Canceled);
            }
            TaskStatus::Faulted => {
                let message = self
                    .handle
                    .get()
                    .and_then(|handle| handle.error())
                    .map(|err| format!("{:#}", err))
                    .unwrap_or_default();
                warn!(observer = %self.label, error = %message, "Task faulted");
                self.notify(Attribute::Faulted);
                self.notify(Attribute::Error);
                self.notify(Attribute::ErrorMessage);
            }
            TaskStatus::Pending => {
                warn!(observer = %self.label, "Completion wait ended while pending");
                return;
            }
        }

        self.notify(Attribute::Status);
        self.notify(Attribute::Completed);
        self.notify(Attribute::NotCompleted);
    }
}

impl<T> TaskObserver<T>
where
    T: Send + Sync + 'static,
{
    /// Start building an observer
    pub fn builder() -> TaskObserverBuilder<T> {
        TaskObserverBuilder::new()
    }

    /// Create an observer with default configuration
    pub fn new<F>(factory: F) -> Self
    where
        F: FnOnce() -> TaskHandle<T> + Send + 'static,
    {
        Self::from_parts(
            DEFAULT_LABEL.to_string(),
            NotifyConfig::default(),
            Box::new(factory),
        )
    }

    /// Create an observer, failing with [`Error::InvalidArgument`] when no
    /// factory is given. Nothing is invoked yet.
    pub fn create<F>(factory: Option<F>) -> Result<Self>
    where
        F: FnOnce() -> TaskHandle<T> + Send + 'static,
    {
        let factory = factory.ok_or_else(|| Error::InvalidArgument("factory".to_string()))?;
        Ok(Self::new(factory))
    }

    /// Create an observer whose factory spawns the future returned by `make`
    pub fn from_future<F, Fut>(make: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self::new(move || TaskHandle::spawn(make()))
    }

    fn from_parts(label: String, config: NotifyConfig, factory: Factory<T>) -> Self {
        Self {
            inner: Arc::new(ObserverInner {
                label,
                factory: Mutex::new(Some(factory)),
                handle: OnceLock::new(),
                bus: ChangeBus::with_config(config.bus),
            }),
        }
    }

    /// Invoke the factory and begin watching the computation it returns.
    ///
    /// Returns before any notification is delivered; the completion protocol
    /// runs on a task spawned onto the current tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidOperation`] if the observer was already started
    /// - [`Error::InvalidOperation`] if called outside a tokio runtime
    pub fn start(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            Error::InvalidOperation("start must be called inside a tokio runtime".to_string())
        })?;

        let Some(factory) = self.inner.factory.lock().take() else {
            warn!(observer = %self.inner.label, "Observer already watching");
            return Err(Error::InvalidOperation("can only watch once".to_string()));
        };

        let handle = catch_unwind(AssertUnwindSafe(factory))
            .unwrap_or_else(|payload| TaskHandle::failed(panic_fault("factory", payload)));

        debug!(observer = %self.inner.label, task_id = %handle.id(), "Watching task");

        // Started from here on. Visible before the completion wait is scheduled.
        let _ = self.inner.handle.set(handle.clone());

        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            let status = handle.settled().await;
            inner.publish_completion(status);
        });

        Ok(())
    }

    /// Register a callback that receives this observer alongside each event.
    ///
    /// The callback holds the observer weakly; it does not keep it alive.
    pub fn subscribe<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&TaskObserver<T>, &ChangeEvent) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(Arc::new(ObserverListener {
            target: Arc::downgrade(&self.inner),
            callback,
        }))
    }
}

impl<T> TaskObserver<T> {
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Notification channel
    pub fn bus(&self) -> &ChangeBus {
        &self.inner.bus
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.bus.unsubscribe(id)
    }

    /// True once the factory's handle is stored; never true without one
    pub fn is_started(&self) -> bool {
        self.inner.handle.get().is_some()
    }

    /// The handle produced by the factory, `None` before start
    pub fn handle(&self) -> Option<&TaskHandle<T>> {
        self.inner.handle.get()
    }

    /// Mirrors the handle; `Pending` before start
    pub fn status(&self) -> TaskStatus {
        self.handle()
            .map(|handle| handle.status())
            .unwrap_or_default()
    }

    pub fn is_completed(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn is_not_completed(&self) -> bool {
        !self.is_completed()
    }

    pub fn is_successfully_completed(&self) -> bool {
        self.status().is_success()
    }

    pub fn is_canceled(&self) -> bool {
        self.status() == TaskStatus::Canceled
    }

    pub fn is_faulted(&self) -> bool {
        self.status() == TaskStatus::Faulted
    }

    /// The single underlying fault, if faulted
    pub fn error(&self) -> Option<Arc<anyhow::Error>> {
        self.handle().and_then(|handle| handle.error())
    }

    /// The fault rendered with its context chain
    pub fn error_message(&self) -> Option<String> {
        self.error().map(|err| format!("{:#}", err))
    }
}

impl<T: Clone> TaskObserver<T> {
    /// The value, if the computation ran to completion
    pub fn result(&self) -> Option<T> {
        self.handle().and_then(|handle| handle.result())
    }

    /// All observable fields, read under a single borrow of the handle
    pub fn snapshot(&self) -> ObserverSnapshot<T> {
        let handle = self.handle();
        let (status, result, error_message) = match handle {
            Some(handle) => handle.inspect(|settlement| {
                (
                    settlement.status(),
                    settlement.value().cloned(),
                    settlement.fault().map(|err| format!("{:#}", err)),
                )
            }),
            None => (TaskStatus::Pending, None, None),
        };

        ObserverSnapshot {
            label: self.inner.label.clone(),
            started: handle.is_some(),
            status,
            is_completed: status.is_terminal(),
            is_successfully_completed: status.is_success(),
            is_canceled: status == TaskStatus::Canceled,
            is_faulted: status == TaskStatus::Faulted,
            result,
            error_message,
        }
    }
}

impl<T: Clone + Default> TaskObserver<T> {
    /// The value, or `T::default()` unless the computation ran to completion
    pub fn result_or_default(&self) -> T {
        self.result().unwrap_or_default()
    }
}

impl<T> std::fmt::Debug for TaskObserver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskObserver")
            .field("label", &self.inner.label)
            .field("started", &self.is_started())
            .field("status", &self.status())
            .finish()
    }
}

/// Owned, mutually consistent copy of an observer's state
#[derive(Debug, Clone, Serialize)]
pub struct ObserverSnapshot<T> {
    pub label: String,
    pub started: bool,
    pub status: TaskStatus,
    pub is_completed: bool,
    pub is_successfully_completed: bool,
    pub is_canceled: bool,
    pub is_faulted: bool,
    pub result: Option<T>,
    pub error_message: Option<String>,
}

/// Bus listener that hands callbacks the observer itself
struct ObserverListener<T, F> {
    target: Weak<ObserverInner<T>>,
    callback: F,
}

impl<T, F> ChangeListener for ObserverListener<T, F>
where
    T: Send + Sync + 'static,
    F: Fn(&TaskObserver<T>, &ChangeEvent) + Send + Sync,
{
    fn name(&self) -> &str {
        "observer-callback"
    }

    fn on_change(&self, event: &ChangeEvent) {
        if let Some(inner) = self.target.upgrade() {
            (self.callback)(&TaskObserver { inner }, event);
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`TaskObserver`]
pub struct TaskObserverBuilder<T> {
    config: NotifyConfig,
    factory: Option<Factory<T>>,
}

impl<T> TaskObserverBuilder<T>
where
    T: Send + Sync + 'static,
{
    fn new() -> Self {
        Self {
            config: NotifyConfig::default(),
            factory: None,
        }
    }

    /// Name used as the source of every notification
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = Some(label.into());
        self
    }

    /// Apply a loaded configuration. A label set earlier wins over one
    /// missing from `config`.
    pub fn config(mut self, config: NotifyConfig) -> Self {
        let label = self.config.label.take();
        self.config = config;
        if self.config.label.is_none() {
            self.config.label = label;
        }
        self
    }

    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: FnOnce() -> TaskHandle<T> + Send + 'static,
    {
        self.factory = Some(Box::new(factory));
        self
    }

    /// Factory that spawns the future returned by `make`
    pub fn future<F, Fut>(self, make: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.factory(move || TaskHandle::spawn(make()))
    }

    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if no factory was supplied
    /// - [`Error::Config`] if the configuration does not validate
    pub fn build(self) -> Result<TaskObserver<T>> {
        let factory = self
            .factory
            .ok_or_else(|| Error::InvalidArgument("factory".to_string()))?;
        self.config.validate()?;

        let label = self
            .config
            .label
            .clone()
            .unwrap_or_else(|| DEFAULT_LABEL.to_string());

        Ok(TaskObserver::from_parts(label, self.config, factory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use task_notify_foundation::ChangeBusConfig;

    fn recorder<T: Send + Sync + 'static>(
        observer: &TaskObserver<T>,
    ) -> Arc<Mutex<Vec<Attribute>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        observer
            .bus()
            .subscribe_fn("recorder", move |event| sink.lock().push(event.attribute));
        seen
    }

    async fn settle_all<T: Send + Sync + 'static>(observer: &TaskObserver<T>) {
        let mut rx = observer.bus().receiver();
        if let Some(handle) = observer.handle() {
            handle.settled().await;
        }
        while let Ok(event) = rx.recv().await {
            if event.attribute == Attribute::NotCompleted {
                break;
            }
        }
    }

    #[test]
    fn test_new_observer_is_pending() {
        let observer = TaskObserver::new(|| TaskHandle::succeeded(1));

        assert!(!observer.is_started());
        assert!(observer.handle().is_none());
        assert_eq!(observer.status(), TaskStatus::Pending);
        assert!(observer.is_not_completed());
        assert_eq!(observer.result(), None);
        assert!(observer.error().is_none());
        assert_eq!(observer.label(), DEFAULT_LABEL);
    }

    #[test]
    fn test_create_without_factory() {
        let result = TaskObserver::<i32>::create(None::<fn() -> TaskHandle<i32>>);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        let result = TaskObserver::<i32>::builder().label("empty").build();
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_start_outside_runtime() {
        let observer = TaskObserver::new(|| TaskHandle::succeeded(1));

        assert!(matches!(observer.start(), Err(Error::InvalidOperation(_))));
        // 런타임 없이 실패한 start는 started로 기록되지 않는다
        assert!(!observer.is_started());
    }

    #[tokio::test]
    async fn test_factory_invoked_once_and_handle_visible() {
        let (resolver, handle) = TaskHandle::<u8>::channel();
        let expected = handle.clone();
        let observer = TaskObserver::new(move || handle);

        observer.start().unwrap();

        let watched = observer.handle().expect("handle set by start");
        assert!(watched.ptr_eq(&expected));
        assert!(observer.is_started());
        assert_eq!(observer.status(), TaskStatus::Pending);

        resolver.succeed(5);
        settle_all(&observer).await;
        assert_eq!(observer.result(), Some(5));
    }

    #[tokio::test]
    async fn test_pre_settled_handle_notifies_after_start_returns() {
        let observer = TaskObserver::new(|| TaskHandle::succeeded(42));
        let seen = recorder(&observer);

        observer.start().unwrap();
        assert!(seen.lock().is_empty(), "no notification during start");

        settle_all(&observer).await;
        assert_eq!(
            *seen.lock(),
            vec![
                Attribute::Result,
                Attribute::SuccessfullyCompleted,
                Attribute::Status,
                Attribute::Completed,
                Attribute::NotCompleted,
            ]
        );
    }

    #[tokio::test]
    async fn test_fault_notifications_in_order() {
        let observer =
            TaskObserver::<i32>::new(|| TaskHandle::failed(anyhow::anyhow!("bad input")));
        let seen = recorder(&observer);

        observer.start().unwrap();
        settle_all(&observer).await;

        assert_eq!(
            *seen.lock(),
            vec![
                Attribute::Faulted,
                Attribute::Error,
                Attribute::ErrorMessage,
                Attribute::Status,
                Attribute::Completed,
                Attribute::NotCompleted,
            ]
        );
        assert_eq!(observer.error_message().as_deref(), Some("bad input"));
        assert_eq!(observer.result_or_default(), 0);
    }

    #[tokio::test]
    async fn test_panicking_factory_faults() {
        let observer = TaskObserver::<i32>::new(|| panic!("factory exploded"));

        observer.start().unwrap();
        assert!(observer.handle().is_some());
        assert!(observer.is_faulted());

        let message = observer.error_message().unwrap_or_default();
        assert!(message.contains("factory exploded"), "unexpected message: {}", message);
    }

    #[tokio::test]
    async fn test_builder_applies_config() {
        let config = NotifyConfig::default()
            .with_label("from-config")
            .with_bus(ChangeBusConfig {
                history_size: 2,
                ..Default::default()
            });

        let observer = TaskObserver::builder()
            .config(config)
            .factory(TaskHandle::<i32>::canceled)
            .build()
            .unwrap();
        assert_eq!(observer.label(), "from-config");

        observer.start().unwrap();
        settle_all(&observer).await;

        let history = observer.bus().history(None);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].attribute, Attribute::NotCompleted);
        assert!(history.iter().all(|e| e.source == "from-config"));
    }

    #[tokio::test]
    async fn test_builder_label_survives_unlabeled_config() {
        let observer = TaskObserver::builder()
            .label("explicit")
            .config(NotifyConfig::default())
            .future(|| async { Ok::<_, anyhow::Error>(1) })
            .build()
            .unwrap();

        assert_eq!(observer.label(), "explicit");
    }

    #[tokio::test]
    async fn test_snapshot_is_consistent() {
        let observer = TaskObserver::new(|| TaskHandle::succeeded("ready".to_string()));
        let before = observer.snapshot();
        assert!(!before.started);
        assert_eq!(before.status, TaskStatus::Pending);

        observer.start().unwrap();
        settle_all(&observer).await;

        let after = observer.snapshot();
        assert!(after.started);
        assert!(after.is_completed && after.is_successfully_completed);
        assert!(!after.is_canceled && !after.is_faulted);
        assert_eq!(after.result.as_deref(), Some("ready"));
        assert!(after.error_message.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_does_not_keep_observer_alive() {
        let observer = TaskObserver::new(|| TaskHandle::succeeded(1));
        let weak = Arc::downgrade(&observer.inner);
        observer.subscribe(|_, _| {});

        drop(observer);
        assert!(weak.upgrade().is_none());
    }
}
