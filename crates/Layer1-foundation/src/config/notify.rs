//! Notify Configuration - observer 및 변경 버스 설정
//!
//! 설정 파일 위치: `.task-notify/settings.json`
//!
//! ```json
//! {
//!   "label": "download",
//!   "bus": { "channel_capacity": 64, "history_size": 32, "debug_mode": false }
//! }
//! ```

use crate::event::ChangeBusConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 설정 폴더 이름
pub const CONFIG_DIR_NAME: &str = ".task-notify";

/// 설정 파일명
pub const SETTINGS_FILE: &str = "settings.json";

/// 프로젝트 설정 파일 경로
pub fn project_config_path(working_dir: &Path) -> PathBuf {
    working_dir.join(CONFIG_DIR_NAME).join(SETTINGS_FILE)
}

/// task-notify 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Observer 이름 (알림의 source로 사용)
    pub label: Option<String>,

    /// 변경 버스 설정
    pub bus: ChangeBusConfig,
}

impl NotifyConfig {
    /// 파일에서 설정 로드
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;

        debug!(path = %path.display(), "Loaded notify config");
        Ok(config)
    }

    /// 파일이 없으면 기본 설정 사용
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "No notify config, using defaults");
            Ok(Self::default())
        }
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.bus.channel_capacity == 0 {
            return Err(Error::Config(
                "bus.channel_capacity must be greater than zero".to_string(),
            ));
        }

        if matches!(self.label.as_deref(), Some(label) if label.trim().is_empty()) {
            return Err(Error::Config("label must not be blank".to_string()));
        }

        Ok(())
    }

    /// 이름 설정
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// 버스 설정
    pub fn with_bus(mut self, bus: ChangeBusConfig) -> Self {
        self.bus = bus;
        self
    }
}
