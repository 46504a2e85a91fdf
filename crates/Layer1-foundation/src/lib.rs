//! # task-notify-foundation
//!
//! Foundation layer for task-notify:
//! - Error: 에러 분류 및 fault 분석 (aggregate unwrap, 취소 판별)
//! - Event: 속성 변경 알림 버스 (ChangeBus)
//! - Config: 통합 설정 (NotifyConfig)
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  TaskObserver (task-notify-task)                         │
//! │                     │                                   │
//! │          ┌─────────┴─────────┐                         │
//! │          ▼                   ▼                         │
//! │   primary_cause()       ChangeBus                      │
//! │   (single fault)        (listeners, history)           │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;

// ============================================================================
// Error
// ============================================================================
pub use error::{is_cancellation, primary_cause, Error, Result};

// ============================================================================
// Event
// ============================================================================
pub use event::{
    Attribute, ChangeBus, ChangeBusConfig, ChangeEvent, ChangeFilter, ChangeListener, FnListener,
    ListenerId,
};

// ============================================================================
// Config
// ============================================================================
pub use config::{project_config_path, NotifyConfig, CONFIG_DIR_NAME, SETTINGS_FILE};
