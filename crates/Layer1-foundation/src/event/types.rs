//! Change Event Types - observer가 발행하는 변경 알림 정의

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Attribute
// ============================================================================

/// 변경된 속성 이름
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    /// 결과 값 (성공 시)
    Result,
    /// 성공 완료 여부
    SuccessfullyCompleted,
    /// 취소 여부
    Canceled,
    /// 실패 여부
    Faulted,
    /// 실패 원인
    Error,
    /// 실패 원인 메시지
    ErrorMessage,
    /// 상태
    Status,
    /// 완료 여부
    Completed,
    /// 미완료 여부
    NotCompleted,
}

impl Attribute {
    /// 속성 이름 문자열 반환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Result => "result",
            Self::SuccessfullyCompleted => "successfully_completed",
            Self::Canceled => "canceled",
            Self::Faulted => "faulted",
            Self::Error => "error",
            Self::ErrorMessage => "error_message",
            Self::Status => "status",
            Self::Completed => "completed",
            Self::NotCompleted => "not_completed",
        }
    }
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ChangeEvent
// ============================================================================

/// 속성 변경 알림
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// 버스 내 발행 순번 (publish 시 부여)
    pub sequence: u64,

    /// 발행한 observer 이름
    pub source: String,

    /// 변경된 속성
    pub attribute: Attribute,

    /// 발생 시간
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// 새 이벤트 생성
    pub fn new(source: impl Into<String>, attribute: Attribute) -> Self {
        Self {
            sequence: 0,
            source: source.into(),
            attribute,
            timestamp: Utc::now(),
        }
    }
}
