//! Config - task-notify 설정
//!
//! - `notify.rs` - NotifyConfig (observer 이름, 버스 설정)

mod notify;

pub use notify::{project_config_path, NotifyConfig, CONFIG_DIR_NAME, SETTINGS_FILE};
