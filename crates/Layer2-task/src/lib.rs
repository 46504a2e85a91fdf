//! # task-notify-task
//!
//! Observable task completion for task-notify.
//! Wraps one asynchronous computation and republishes its lifecycle as
//! attribute change notifications plus a synchronous snapshot.
//!
//! ## Features
//!
//! - Single-use observer with race-free start (`TaskObserver`)
//! - Settle-once computation handles (`TaskHandle`, `Resolver`)
//! - Cancellation observed through `tokio_util::sync::CancellationToken`
//! - **Faults exposed as data, always a single primary cause**

pub mod observer;
pub mod state;
pub mod task;

pub use observer::{ObserverSnapshot, TaskObserver, TaskObserverBuilder, DEFAULT_LABEL};
pub use state::TaskStatus;
pub use task::{Resolver, TaskHandle, TaskId};

// Re-exported so callers need only this crate
pub use task_notify_foundation::{Attribute, ChangeEvent, Error, ListenerId, NotifyConfig, Result};
pub use tokio_util::sync::CancellationToken;
