//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 패킷 소스와 집계 엔진이 주고받는 캡처 단위를 정의합니다.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

/// 캡처된 링크 계층 프레임 하나
///
/// `data`는 실제로 캡처된 바이트이며, 원본 프레임보다 짧을 수 있습니다.
#[derive(Debug, Clone)]
pub struct Frame {
    /// 캡처된 원시 바이트 (이더넷 헤더부터)
    pub data: Bytes,
    /// 캡처 길이 (바이트). 집계에 더해지는 값입니다.
    pub capture_len: u32,
    /// 캡처 시각 (Unix epoch 초)
    pub timestamp: u64,
}

impl Frame {
    /// 바이트와 타임스탬프로 프레임을 생성합니다. 캡처 길이는 데이터 길이와 같습니다.
    pub fn new(data: impl Into<Bytes>, timestamp: u64) -> Self {
        let data = data.into();
        let capture_len = u32::try_from(data.len()).unwrap_or(u32::MAX);
        Self {
            data,
            capture_len,
            timestamp,
        }
    }

    /// 분류기가 읽을 수 있는 바이트 범위를 반환합니다.
    ///
    /// `capture_len`이 버퍼보다 작으면 그 길이까지만 노출합니다.
    pub fn captured(&self) -> &[u8] {
        let len = usize::try_from(self.capture_len)
            .unwrap_or(usize::MAX)
            .min(self.data.len());
        &self.data[..len]
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame caplen={} ts={}", self.capture_len, self.timestamp)
    }
}

/// 패킷 소스 한 번의 읽기 결과
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    /// 프레임 수신
    Frame(Frame),
    /// 읽기 타임아웃 (재시도 가능)
    Timeout,
}

/// 현재 시각을 Unix epoch 초로 반환합니다.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
