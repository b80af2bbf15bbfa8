//! 트래픽 집계 에러 타입
//!
//! [`AccountingError`]는 집계 엔진 내부에서 발생하는 실패를 표현합니다.
//! `From<AccountingError> for TomError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 프레임 스킵과 범위 밖 주소는 에러가 아니며 여기에 포함되지 않습니다.

use tom_core::error::{AccountingFailure, TomError};

/// 트래픽 집계 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum AccountingError {
    /// 대상 서브넷 등록 실패 (형식 오류, 프리픽스 초과 등)
    #[error("invalid target '{target}': {reason}")]
    InvalidTarget {
        /// 문제가 된 대상 (텍스트 형태)
        target: String,
        /// 거부 사유
        reason: String,
    },

    /// 호스트 기록 파일 경로 에러
    #[error("log path error: {path}: {reason}")]
    LogPath {
        /// 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 기록 라인 파싱 실패
    #[error("malformed log record '{line}': {reason}")]
    MalformedRecord {
        /// 원본 라인
        line: String,
        /// 실패 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<AccountingError> for TomError {
    fn from(err: AccountingError) -> Self {
        match err {
            AccountingError::InvalidTarget { .. } | AccountingError::MalformedRecord { .. } => {
                TomError::Accounting(AccountingFailure::InvalidArgument(err.to_string()))
            }
            AccountingError::LogPath { .. } | AccountingError::Io(_) => {
                TomError::Accounting(AccountingFailure::Sink(err.to_string()))
            }
        }
    }
}
