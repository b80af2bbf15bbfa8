//! 설정 관리 — tom.toml 파싱 및 런타임 설정
//!
//! [`TomConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`TOM_CAPTURE_INTERFACE=eth1` 형식)
//! 3. 설정 파일 (`tom.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), tom_core::error::TomError> {
//! use tom_core::config::TomConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = TomConfig::load("tom.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = TomConfig::parse("[accounting]\ntargets = [\"10.0.0.0/8\"]")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, TomError};

/// tom 통합 설정
///
/// `tom.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 패킷 캡처 설정
    #[serde(default)]
    pub capture: CaptureConfig,
    /// 트래픽 집계 설정
    #[serde(default)]
    pub accounting: AccountingConfig,
}

impl TomConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TomError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TomError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TomError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TomError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, TomError> {
        toml::from_str(toml_str).map_err(|e| {
            TomError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `TOM_{SECTION}_{FIELD}`
    /// 예: `TOM_ACCOUNTING_IDLE_TIMEOUT_SECS=600`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "TOM_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TOM_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "TOM_GENERAL_PID_FILE");

        // Capture
        override_string(&mut self.capture.interface, "TOM_CAPTURE_INTERFACE");
        override_i32(&mut self.capture.snaplen, "TOM_CAPTURE_SNAPLEN");
        override_bool(&mut self.capture.promiscuous, "TOM_CAPTURE_PROMISCUOUS");
        override_i32(&mut self.capture.timeout_ms, "TOM_CAPTURE_TIMEOUT_MS");
        override_string(&mut self.capture.bpf_filter, "TOM_CAPTURE_BPF_FILTER");

        // Accounting
        override_csv(&mut self.accounting.targets, "TOM_ACCOUNTING_TARGETS");
        override_string(&mut self.accounting.log_dir, "TOM_ACCOUNTING_LOG_DIR");
        override_u64(
            &mut self.accounting.idle_timeout_secs,
            "TOM_ACCOUNTING_IDLE_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.accounting.purge_interval_secs,
            "TOM_ACCOUNTING_PURGE_INTERVAL_SECS",
        );
        override_bool(
            &mut self.accounting.flush_on_shutdown,
            "TOM_ACCOUNTING_FLUSH_ON_SHUTDOWN",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 대상 서브넷 문자열의 형식 검증은 등록 시점에 accounting 크레이트가 수행합니다.
    pub fn validate(&self) -> Result<(), TomError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.capture.interface.is_empty() {
            return Err(invalid("capture.interface", "must not be empty".to_owned()));
        }

        if self.capture.snaplen <= 0 {
            return Err(invalid("capture.snaplen", "must be positive".to_owned()));
        }

        // 종료 신호는 읽기 타임아웃마다 확인되므로 무한 대기는 허용하지 않습니다.
        if self.capture.timeout_ms <= 0 {
            return Err(invalid(
                "capture.timeout_ms",
                "must be positive (shutdown is checked between reads)".to_owned(),
            ));
        }

        if self.accounting.targets.is_empty() {
            return Err(invalid(
                "accounting.targets",
                "at least one target subnet is required".to_owned(),
            ));
        }

        if self.accounting.log_dir.is_empty() {
            return Err(invalid("accounting.log_dir", "must not be empty".to_owned()));
        }

        if self.accounting.idle_timeout_secs == 0 {
            return Err(invalid(
                "accounting.idle_timeout_secs",
                "must be greater than zero".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> TomError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 생성하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 패킷 캡처 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// 캡처할 네트워크 인터페이스
    pub interface: String,
    /// 패킷당 최대 캡처 바이트
    pub snaplen: i32,
    /// promiscuous 모드
    pub promiscuous: bool,
    /// 읽기 타임아웃 (밀리초, 양수)
    ///
    /// 타임아웃마다 유휴 호스트 정리와 종료 신호 확인이 수행됩니다.
    pub timeout_ms: i32,
    /// BPF 필터 (빈 문자열이면 미적용)
    pub bpf_filter: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: "eth0".to_owned(),
            snaplen: 65536,
            promiscuous: true,
            timeout_ms: 1000,
            bpf_filter: String::new(),
        }
    }
}

/// 트래픽 집계 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountingConfig {
    /// 대상 서브넷 목록 (`A.B.C.D/N`)
    pub targets: Vec<String>,
    /// 호스트별 기록 파일 디렉토리
    pub log_dir: String,
    /// 유휴 호스트 제거 임계값 (초)
    pub idle_timeout_secs: u64,
    /// 정리 주기 (초, 0이면 매 캡처 사이클마다)
    pub purge_interval_secs: u64,
    /// 종료 시 남은 호스트의 카운터 기록 여부
    pub flush_on_shutdown: bool,
}

impl AccountingConfig {
    /// 유휴 임계값을 `Duration`으로 반환합니다.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// 정리 주기를 반환합니다. `None`이면 매 사이클마다 정리합니다.
    pub fn purge_interval(&self) -> Option<Duration> {
        (self.purge_interval_secs > 0).then(|| Duration::from_secs(self.purge_interval_secs))
    }
}

impl Default for AccountingConfig {
    fn default() -> Self {
        Self {
            targets: vec!["10.0.0.0/8".to_owned()],
            log_dir: "/var/log/tom".to_owned(),
            idle_timeout_secs: 300,
            purge_interval_secs: 0,
            flush_on_shutdown: false,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_i32(target: &mut i32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<i32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse i32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
