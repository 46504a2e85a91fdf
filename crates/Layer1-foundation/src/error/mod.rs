//! Error types for task-notify
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// task-notify 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 사용 오류 (observer 생성/시작)
    // ========================================================================
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    // ========================================================================
    // 계산 결과
    // ========================================================================
    /// Returned by a computation to signal a deliberate abort.
    #[error("Cancelled")]
    Cancelled,

    /// Several faults raised by one computation.
    #[error("One or more errors occurred ({} causes)", .0.len())]
    Aggregate(Vec<anyhow::Error>),

    #[error("Resolver dropped before completion")]
    ResolverDropped,

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 사용자 실수로 인한 에러인지 확인
    pub fn is_misuse(&self) -> bool {
        matches!(self, Error::InvalidArgument(_) | Error::InvalidOperation(_))
    }

    /// Aggregate 에러 생성 헬퍼
    pub fn aggregate(causes: impl IntoIterator<Item = anyhow::Error>) -> Self {
        Error::Aggregate(causes.into_iter().collect())
    }
}

// ============================================================================
// Fault 분석
// ============================================================================

/// Unwraps nested [`Error::Aggregate`] containers down to their first cause.
///
/// An empty aggregate has no cause to promote and is returned as is.
pub fn primary_cause(mut err: anyhow::Error) -> anyhow::Error {
    while is_non_empty_aggregate(&err) {
        err = match err.downcast::<Error>() {
            Ok(Error::Aggregate(causes)) => match causes.into_iter().next() {
                Some(first) => first,
                None => return Error::Aggregate(Vec::new()).into(),
            },
            Ok(other) => return other.into(),
            Err(err) => return err,
        };
    }
    err
}

/// Whether the fault's primary cause is [`Error::Cancelled`].
pub fn is_cancellation(err: &anyhow::Error) -> bool {
    let mut current = err;
    loop {
        match current.downcast_ref::<Error>() {
            Some(Error::Cancelled) => return true,
            Some(Error::Aggregate(causes)) => match causes.first() {
                Some(first) => current = first,
                None => return false,
            },
            _ => return false,
        }
    }
}

fn is_non_empty_aggregate(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<Error>(), Some(Error::Aggregate(causes)) if !causes.is_empty())
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_primary_cause_unwraps_nested_aggregates() {
        let inner = Error::aggregate([anyhow!("disk full"), anyhow!("network down")]);
        let outer = Error::aggregate([anyhow::Error::from(inner), anyhow!("ignored")]);

        let cause = primary_cause(outer.into());
        assert_eq!(cause.to_string(), "disk full");
        assert!(cause.downcast_ref::<Error>().is_none());
    }

    #[test]
    fn test_primary_cause_keeps_plain_errors() {
        let cause = primary_cause(Error::InvalidArgument("value".into()).into());
        assert!(matches!(
            cause.downcast_ref::<Error>(),
            Some(Error::InvalidArgument(_))
        ));

        let empty = primary_cause(Error::Aggregate(Vec::new()).into());
        assert!(matches!(
            empty.downcast_ref::<Error>(),
            Some(Error::Aggregate(causes)) if causes.is_empty()
        ));
    }

    #[test]
    fn test_is_cancellation() {
        assert!(is_cancellation(&Error::Cancelled.into()));
        let wrapped = Error::aggregate([anyhow::Error::from(Error::Cancelled)]);
        assert!(is_cancellation(&wrapped.into()));
        assert!(!is_cancellation(&anyhow!("boom")));
        assert!(!is_cancellation(&Error::ResolverDropped.into()));
    }

    #[test]
    fn test_is_misuse() {
        assert!(Error::InvalidOperation("twice".into()).is_misuse());
        assert!(!Error::Cancelled.is_misuse());
    }
}
