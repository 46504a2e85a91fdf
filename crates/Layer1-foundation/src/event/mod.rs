//! Change Notification - 속성 변경 발행/구독 시스템
//!
//! Observer가 상태 전이를 알리는 통로입니다.
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ChangeBus                             │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │  publish(ChangeEvent) ────────────────────────────┐ │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! │         │  (등록 순서대로, 동기 전달)                        │
//! │         ▼                                                   │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
//! │  │  Listener 1  │  │  Listener 2  │  │  broadcast   │      │
//! │  │  (UI)        │  │  (Logger)    │  │  receiver    │      │
//! │  └──────────────┘  └──────────────┘  └──────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod bus;
pub mod types;

// Re-exports
pub use bus::{ChangeBus, ChangeBusConfig, ChangeFilter, ChangeListener, FnListener, ListenerId};
pub use types::{Attribute, ChangeEvent};
