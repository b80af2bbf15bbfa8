//! 유휴 호스트 정리
//!
//! [`PurgeManager`]는 유휴 임계값을 넘긴 호스트를 찾아 기록 후 제거합니다.
//! 트래픽이 없던 호스트는 기록 없이 제거하고, 기록 실패는 로그만 남긴 채
//! 나머지 호스트 정리를 계속합니다.
//!
//! [`PurgeSchedule`]은 캡처 루프에서 정리를 언제 돌릴지 결정합니다.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::address::Address;
use crate::logger::HostSink;
use crate::table::HostTable;

/// 정리 한 번의 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// 제거된 호스트 수
    pub evicted: usize,
    /// 제거 전에 기록된 호스트 수
    pub flushed: usize,
    /// 기록에 실패한 호스트 수 (그래도 제거됨)
    pub flush_failures: usize,
}

impl PurgeReport {
    /// 아무 일도 하지 않았는지 여부
    pub fn is_empty(&self) -> bool {
        self.evicted == 0
    }
}

/// 유휴 호스트 정리기
#[derive(Debug, Clone, Copy)]
pub struct PurgeManager {
    idle_threshold: Duration,
}

impl PurgeManager {
    /// 유휴 임계값으로 생성합니다.
    pub fn new(idle_threshold: Duration) -> Self {
        Self { idle_threshold }
    }

    /// 유휴 임계값
    pub fn idle_threshold(&self) -> Duration {
        self.idle_threshold
    }

    /// `now - last_traffic_time > threshold`인 호스트를 정리합니다.
    ///
    /// 임계값과 정확히 같은 유휴 시간은 정리 대상이 아닙니다.
    pub fn purge(&self, table: &mut HostTable, sink: &mut dyn HostSink, now: u64) -> PurgeReport {
        let threshold = self.idle_threshold.as_secs();
        let idle: Vec<Address> = table
            .iter()
            .filter(|host| host.idle_for(now) > threshold)
            .map(|host| *host.address())
            .collect();

        let mut report = PurgeReport::default();
        for address in idle {
            if let Some(host) = table.get_mut(&address) {
                if host.has_traffic() {
                    match sink.flush(host, now) {
                        Ok(()) => report.flushed += 1,
                        Err(e) => {
                            report.flush_failures += 1;
                            warn!(host = %address, error = %e, "failed to record idle host, evicting anyway");
                        }
                    }
                }
            }
            if let Some(host) = table.remove(&address) {
                debug!(
                    host = %address,
                    tx = host.tx_bytes,
                    rx = host.rx_bytes,
                    idle_secs = host.idle_for(now),
                    "idle host evicted"
                );
                report.evicted += 1;
            }
        }

        if !report.is_empty() {
            info!(
                evicted = report.evicted,
                flushed = report.flushed,
                flush_failures = report.flush_failures,
                remaining = table.len(),
                "idle hosts purged"
            );
        }
        report
    }
}

/// 정리 주기 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgePolicy {
    /// 매 캡처 사이클마다
    EveryCycle,
    /// 지정한 간격마다
    Interval(Duration),
}

impl PurgePolicy {
    /// 설정값에서 정책을 만듭니다. `None`이면 매 사이클입니다.
    pub fn from_interval(interval: Option<Duration>) -> Self {
        match interval {
            Some(interval) if !interval.is_zero() => PurgePolicy::Interval(interval),
            _ => PurgePolicy::EveryCycle,
        }
    }
}

/// 정책에 따라 정리 시점을 판단합니다.
#[derive(Debug)]
pub struct PurgeSchedule {
    policy: PurgePolicy,
    last_run: Option<Instant>,
}

impl PurgeSchedule {
    /// 아직 한 번도 실행하지 않은 스케줄을 생성합니다.
    pub fn new(policy: PurgePolicy) -> Self {
        Self {
            policy,
            last_run: None,
        }
    }

    /// 정책
    pub fn policy(&self) -> PurgePolicy {
        self.policy
    }

    /// 지금 정리를 돌려야 하면 `true`를 반환하고 실행 시각을 기록합니다.
    pub fn due(&mut self, now: Instant) -> bool {
        let due = match (self.policy, self.last_run) {
            (PurgePolicy::EveryCycle, _) | (PurgePolicy::Interval(_), None) => true,
            (PurgePolicy::Interval(interval), Some(last)) => now.duration_since(last) >= interval,
        };
        if due {
            self.last_run = Some(now);
        }
        due
    }
}
