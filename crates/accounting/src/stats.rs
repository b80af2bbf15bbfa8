//! 세션 통계
//!
//! [`SessionStats`]는 캡처 세션의 누적 카운터를 보관하고,
//! 값이 바뀔 때마다 `metrics` 파사드에도 반영합니다.
//! 레코더가 설치되지 않았다면 메트릭 호출은 아무 일도 하지 않습니다.

use tom_core::metrics as m;

use crate::classifier::SkipReason;
use crate::engine::{AccountOutcome, Direction, PacketOutcome};
use crate::purge::PurgeReport;

/// 캡처 세션 누적 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// 소스에서 읽은 프레임 수
    pub frames: u64,
    /// 분류 단계에서 스킵된 프레임 수
    pub skipped: u64,
    /// 양쪽 모두 범위 밖이라 집계되지 않은 프레임 수
    pub out_of_scope: u64,
    /// 캡처 타임아웃 횟수
    pub timeouts: u64,
    /// 송신 방향으로 집계된 바이트
    pub tx_bytes: u64,
    /// 수신 방향으로 집계된 바이트
    pub rx_bytes: u64,
    /// 새로 추적을 시작한 호스트 수
    pub hosts_created: u64,
    /// 유휴 정리로 제거된 호스트 수
    pub hosts_purged: u64,
    /// 호스트 기록 실패 수
    pub flush_failures: u64,
}

impl SessionStats {
    /// 제로 초기화된 통계를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 프레임 수신을 기록합니다.
    pub fn record_frame(&mut self) {
        self.frames += 1;
        metrics::counter!(m::FRAMES_TOTAL).increment(1);
    }

    /// 분류 스킵을 기록합니다.
    pub fn record_skip(&mut self, reason: SkipReason) {
        self.skipped += 1;
        metrics::counter!(m::FRAMES_SKIPPED_TOTAL, m::LABEL_REASON => reason.as_str())
            .increment(1);
    }

    /// 타임아웃을 기록합니다.
    pub fn record_timeout(&mut self) {
        self.timeouts += 1;
        metrics::counter!(m::CAPTURE_TIMEOUTS_TOTAL).increment(1);
    }

    /// 패킷 집계 결과를 기록합니다.
    pub fn record_packet(&mut self, outcome: &PacketOutcome, capture_len: u32) {
        if !outcome.src.is_accounted() && !outcome.dst.is_accounted() {
            self.out_of_scope += 1;
            return;
        }
        for (side, direction) in [(outcome.src, Direction::Tx), (outcome.dst, Direction::Rx)] {
            if !side.is_accounted() {
                continue;
            }
            if side == AccountOutcome::Created {
                self.hosts_created += 1;
            }
            let bytes = u64::from(capture_len);
            match direction {
                Direction::Tx => self.tx_bytes = self.tx_bytes.saturating_add(bytes),
                Direction::Rx => self.rx_bytes = self.rx_bytes.saturating_add(bytes),
            }
            metrics::counter!(m::BYTES_ACCOUNTED_TOTAL, m::LABEL_DIRECTION => direction.as_str())
                .increment(bytes);
        }
    }

    /// 정리 결과를 기록합니다.
    pub fn record_purge(&mut self, report: &PurgeReport) {
        let evicted = report.evicted as u64;
        let failures = report.flush_failures as u64;
        self.hosts_purged += evicted;
        self.flush_failures += failures;
        if evicted > 0 {
            metrics::counter!(m::HOSTS_PURGED_TOTAL).increment(evicted);
        }
        if failures > 0 {
            metrics::counter!(m::HOST_FLUSH_FAILURES_TOTAL).increment(failures);
        }
    }

    /// 현재 추적 중인 호스트 수를 게이지에 반영합니다.
    pub fn observe_table_size(&self, hosts: usize) {
        metrics::gauge!(m::HOSTS_TRACKED).set(hosts as f64);
    }

    /// 통계를 초기화합니다.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
