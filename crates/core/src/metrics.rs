//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다. 레코더는 설치하지 않으며, 임베딩하는 애플리케이션이
//! 원하는 레코더를 설치할 수 있습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `tom_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use tom_core::metrics as m;
//!
//! metrics::counter!(m::FRAMES_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 스킵 사유 레이블 키 (ethertype, ip_version, header_length, truncated)
pub const LABEL_REASON: &str = "reason";

/// 방향 레이블 키 (tx, rx)
pub const LABEL_DIRECTION: &str = "direction";

// ─── 캡처 메트릭 ───────────────────────────────────────────────────

/// 수신한 전체 프레임 수 (counter)
pub const FRAMES_TOTAL: &str = "tom_frames_total";

/// 분류 단계에서 스킵된 프레임 수 (counter, label: reason)
pub const FRAMES_SKIPPED_TOTAL: &str = "tom_frames_skipped_total";

/// 캡처 타임아웃 횟수 (counter)
pub const CAPTURE_TIMEOUTS_TOTAL: &str = "tom_capture_timeouts_total";

// ─── 집계 메트릭 ───────────────────────────────────────────────────

/// 집계된 바이트 수 (counter, label: direction)
pub const BYTES_ACCOUNTED_TOTAL: &str = "tom_bytes_accounted_total";

/// 현재 추적 중인 호스트 수 (gauge)
pub const HOSTS_TRACKED: &str = "tom_hosts_tracked";

/// 유휴 상태로 제거된 호스트 수 (counter)
pub const HOSTS_PURGED_TOTAL: &str = "tom_hosts_purged_total";

/// 호스트 기록 실패 수 (counter)
pub const HOST_FLUSH_FAILURES_TOTAL: &str = "tom_host_flush_failures_total";

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다. 레코더가 없으면 아무 일도 하지 않습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(FRAMES_TOTAL, "Total frames read from the packet source");
    describe_counter!(
        FRAMES_SKIPPED_TOTAL,
        "Frames skipped by the classifier (non-IPv4, malformed, truncated)"
    );
    describe_counter!(
        CAPTURE_TIMEOUTS_TOTAL,
        "Read timeouts reported by the packet source"
    );
    describe_counter!(
        BYTES_ACCOUNTED_TOTAL,
        "Captured bytes accounted against tracked hosts"
    );
    describe_gauge!(HOSTS_TRACKED, "Hosts currently held in the host table");
    describe_counter!(HOSTS_PURGED_TOTAL, "Hosts evicted after going idle");
    describe_counter!(
        HOST_FLUSH_FAILURES_TOTAL,
        "Failed attempts to append a host record"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        FRAMES_TOTAL,
        FRAMES_SKIPPED_TOTAL,
        CAPTURE_TIMEOUTS_TOTAL,
        BYTES_ACCOUNTED_TOTAL,
        HOSTS_TRACKED,
        HOSTS_PURGED_TOTAL,
        HOST_FLUSH_FAILURES_TOTAL,
    ];

    #[test]
    fn all_metrics_start_with_tom_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("tom_"),
                "Metric '{}' does not start with 'tom_' prefix",
                name
            );
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // 레코더가 없어도 패닉하지 않아야 한다
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_REASON, LABEL_DIRECTION] {
            assert_eq!(label.to_lowercase(), label);
        }
    }
}
