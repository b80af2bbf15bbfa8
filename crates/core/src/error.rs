//! 에러 타입 — 도메인별 에러 정의
//!
//! 패킷 스킵(지원하지 않는 프레임, 대상 범위 밖 주소)은 에러가 아닙니다.
//! 이런 경우는 각 모듈의 결과 enum으로 표현하며, 여기에는 호출자가
//! 처리해야 하는 진짜 실패만 정의합니다.

/// tom 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum TomError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 패킷 캡처 에러
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    /// 트래픽 집계 에러
    #[error("accounting error: {0}")]
    Accounting(#[from] AccountingFailure),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TomError {
    /// 캡처 루프를 종료시켜야 하는 에러인지 확인합니다.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TomError::Capture(CaptureError::Fatal(_)))
    }
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 패킷 캡처 에러
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// 캡처 장치 열기 실패
    #[error("failed to open capture on '{interface}': {reason}")]
    Open { interface: String, reason: String },

    /// BPF 필터 적용 실패
    #[error("invalid capture filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    /// 복구 불가능한 캡처 실패 (캡처 루프 종료)
    #[error("fatal capture error: {0}")]
    Fatal(String),
}

/// 트래픽 집계 에러
#[derive(Debug, thiserror::Error)]
pub enum AccountingFailure {
    /// 잘못된 인자 (대상 서브넷 등록 실패 등)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// 호스트 기록 실패
    #[error("host sink failed: {0}")]
    Sink(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_tom_error() {
        let err: TomError = ConfigError::InvalidValue {
            field: "accounting.log_dir".to_owned(),
            reason: "must not be empty".to_owned(),
        }
        .into();
        assert!(matches!(err, TomError::Config(_)));
        assert!(err.to_string().contains("accounting.log_dir"));
    }

    #[test]
    fn only_fatal_capture_errors_are_fatal() {
        let fatal: TomError = CaptureError::Fatal("device went away".to_owned()).into();
        assert!(fatal.is_fatal());

        let open: TomError = CaptureError::Open {
            interface: "eth1".to_owned(),
            reason: "permission denied".to_owned(),
        }
        .into();
        assert!(!open.is_fatal());

        let sink: TomError = AccountingFailure::Sink("disk full".to_owned()).into();
        assert!(!sink.is_fatal());
    }

    #[test]
    fn filter_error_display_includes_filter() {
        let err = CaptureError::Filter {
            filter: "ip and".to_owned(),
            reason: "syntax error".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ip and"));
        assert!(msg.contains("syntax error"));
    }
}
