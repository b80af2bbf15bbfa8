//! 캡처 세션 — 패킷 소스에서 호스트 기록까지의 단일 스레드 루프
//!
//! [`AccountingSession`]은 패킷 소스, 집계 엔진, 정리기, 호스트 기록기를 소유합니다.
//! 프레임 하나를 읽고 분류·집계를 모두 마친 뒤에 다음 프레임을 읽으며,
//! 정리는 같은 스레드에서 사이클 사이에 [`PurgePolicy`]에 따라 실행됩니다.
//!
//! # 사이클
//! ```text
//! next_frame ──▶ classify ──▶ account ──▶ (purge due?) ──▶ purge
//!     │ Timeout ─────────────────────────▶ (purge due?)
//!     │ Err ──▶ 루프 종료
//! ```
//!
//! # 종료
//! 루프는 종료 플래그가 설정되거나 소스가 복구 불가능한 에러를 보고하면 끝납니다.
//! 종료 시 임계값에 도달하지 않은 호스트의 카운터는 기본적으로 버려지며,
//! `flush_on_shutdown`을 켜면 트래픽이 있는 호스트를 모두 기록합니다.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tom_core::config::AccountingConfig;
use tom_core::error::{AccountingFailure, TomError};
use tom_core::pipeline::PacketSource;
use tom_core::types::{CaptureOutcome, Frame, unix_now};
use tracing::{debug, info, warn};

use crate::classifier::{Classification, SkipReason, classify};
use crate::engine::{AccountingEngine, PacketOutcome};
use crate::logger::HostSink;
use crate::purge::{PurgeManager, PurgePolicy, PurgeReport, PurgeSchedule};
use crate::stats::SessionStats;

/// 세션 동작 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// 유휴 임계값
    pub idle_timeout: Duration,
    /// 정리 주기 정책
    pub purge_policy: PurgePolicy,
    /// 종료 시 남은 호스트 기록 여부
    pub flush_on_shutdown: bool,
}

impl SessionConfig {
    /// 공통 설정의 `[accounting]` 섹션에서 변환합니다.
    pub fn from_core(config: &AccountingConfig) -> Self {
        Self {
            idle_timeout: config.idle_timeout(),
            purge_policy: PurgePolicy::from_interval(config.purge_interval()),
            flush_on_shutdown: config.flush_on_shutdown,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_core(&AccountingConfig::default())
    }
}

/// 캡처 사이클 하나의 결과
#[derive(Debug, Clone, Copy)]
pub enum CycleOutcome {
    /// 프레임을 분류하고 집계함 (범위 밖 포함)
    Accounted(PacketOutcome),
    /// 분류 단계에서 스킵됨
    Skipped(SkipReason),
    /// 소스 타임아웃
    Timeout,
}

/// 세션 종료 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// 세션 전체 통계
    pub stats: SessionStats,
    /// 종료 시 기록된 호스트 수
    pub flushed_on_shutdown: usize,
    /// 종료 시 기록 없이 버려진, 트래픽이 있던 호스트 수
    pub discarded_with_traffic: usize,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frames={} skipped={} timeouts={} purged={} flush_failures={}",
            self.stats.frames,
            self.stats.skipped,
            self.stats.timeouts,
            self.stats.hosts_purged,
            self.stats.flush_failures
        )
    }
}

/// 세션 시계 (Unix epoch 초)
pub type Clock = Box<dyn Fn() -> u64 + Send>;

/// 트래픽 집계 세션
pub struct AccountingSession<S: PacketSource, K: HostSink> {
    source: S,
    sink: K,
    engine: AccountingEngine,
    purger: PurgeManager,
    schedule: PurgeSchedule,
    flush_on_shutdown: bool,
    stats: SessionStats,
    clock: Clock,
}

/// 세션 빌더
///
/// 소스와 기록기는 필수이며, 나머지는 기본값을 사용합니다.
pub struct AccountingSessionBuilder<S: PacketSource, K: HostSink> {
    source: Option<S>,
    sink: Option<K>,
    engine: Option<AccountingEngine>,
    config: SessionConfig,
    clock: Option<Clock>,
}

impl<S: PacketSource, K: HostSink> AccountingSessionBuilder<S, K> {
    fn new() -> Self {
        Self {
            source: None,
            sink: None,
            engine: None,
            config: SessionConfig::default(),
            clock: None,
        }
    }

    /// 패킷 소스를 지정합니다.
    pub fn source(mut self, source: S) -> Self {
        self.source = Some(source);
        self
    }

    /// 호스트 기록기를 지정합니다.
    pub fn sink(mut self, sink: K) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 대상이 등록된 집계 엔진을 지정합니다.
    pub fn engine(mut self, engine: AccountingEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// 세션 설정을 지정합니다.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// 정리와 기록에 쓰이는 시계를 지정합니다 (기본: 시스템 시계).
    pub fn clock(mut self, clock: impl Fn() -> u64 + Send + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// 세션을 생성합니다.
    ///
    /// # 에러
    /// - 소스나 기록기가 없으면 `AccountingFailure::InvalidArgument`
    pub fn build(self) -> Result<AccountingSession<S, K>, TomError> {
        let source = self.source.ok_or_else(|| {
            AccountingFailure::InvalidArgument("packet source is required".to_owned())
        })?;
        let sink = self.sink.ok_or_else(|| {
            AccountingFailure::InvalidArgument("host sink is required".to_owned())
        })?;
        let engine = self.engine.unwrap_or_default();
        if engine.targets().is_empty() {
            warn!("no targets registered; no traffic will be accounted");
        }

        Ok(AccountingSession {
            source,
            sink,
            engine,
            purger: PurgeManager::new(self.config.idle_timeout),
            schedule: PurgeSchedule::new(self.config.purge_policy),
            flush_on_shutdown: self.config.flush_on_shutdown,
            stats: SessionStats::new(),
            clock: self.clock.unwrap_or_else(|| Box::new(unix_now) as Clock),
        })
    }
}

impl<S: PacketSource, K: HostSink> AccountingSession<S, K> {
    /// 빌더를 반환합니다.
    pub fn builder() -> AccountingSessionBuilder<S, K> {
        AccountingSessionBuilder::new()
    }

    /// 누적 통계
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// 집계 엔진
    pub fn engine(&self) -> &AccountingEngine {
        &self.engine
    }

    /// 호스트 기록기
    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// 소스에서 하나를 읽어 처리합니다.
    ///
    /// # 에러
    /// 소스가 보고한 에러를 그대로 반환합니다. 루프를 종료해야 합니다.
    pub fn capture_one(&mut self) -> Result<CycleOutcome, TomError> {
        let outcome = match self.source.next_frame()? {
            CaptureOutcome::Frame(frame) => self.process_frame(&frame),
            CaptureOutcome::Timeout => {
                self.stats.record_timeout();
                CycleOutcome::Timeout
            }
        };
        self.maybe_purge();
        Ok(outcome)
    }

    /// 프레임 하나를 분류하고 집계합니다.
    pub fn process_frame(&mut self, frame: &Frame) -> CycleOutcome {
        self.stats.record_frame();
        match classify(frame.captured()) {
            Classification::Ip(pair) => {
                let outcome = self
                    .engine
                    .account(&pair, frame.capture_len, frame.timestamp);
                self.stats.record_packet(&outcome, frame.capture_len);
                CycleOutcome::Accounted(outcome)
            }
            Classification::Skipped(reason) => {
                self.stats.record_skip(reason);
                CycleOutcome::Skipped(reason)
            }
        }
    }

    /// 정책상 정리 시점이면 유휴 호스트를 정리합니다.
    pub fn maybe_purge(&mut self) -> Option<PurgeReport> {
        if !self.schedule.due(Instant::now()) {
            return None;
        }
        Some(self.purge_now())
    }

    /// 즉시 유휴 호스트를 정리합니다.
    pub fn purge_now(&mut self) -> PurgeReport {
        let now = (self.clock)();
        let report = self
            .purger
            .purge(self.engine.table_mut(), &mut self.sink, now);
        self.stats.record_purge(&report);
        self.stats.observe_table_size(self.engine.table().len());
        report
    }

    /// 종료 플래그가 설정되거나 소스가 실패할 때까지 루프를 돕니다.
    ///
    /// 어느 경우든 [`shutdown`](Self::shutdown)을 거쳐 요약을 만듭니다.
    /// 소스 실패는 요약과 함께 반환되지 않고 에러로 전파됩니다.
    pub fn run(mut self, shutdown: &AtomicBool) -> Result<SessionSummary, TomError> {
        info!(
            source = self.source.name(),
            targets = self.engine.targets().len(),
            idle_timeout_secs = self.purger.idle_threshold().as_secs(),
            purge_policy = ?self.schedule.policy(),
            "accounting session started"
        );

        while !shutdown.load(Ordering::SeqCst) {
            if let Err(e) = self.capture_one() {
                warn!(source = self.source.name(), error = %e, "packet source failed, stopping session");
                let summary = self.shutdown();
                info!(summary = %summary, "accounting session stopped after source failure");
                return Err(e);
            }
        }

        let summary = self.shutdown();
        info!(summary = %summary, "accounting session stopped");
        Ok(summary)
    }

    /// 세션을 종료하고 남은 호스트를 처리합니다.
    ///
    /// `flush_on_shutdown`이 꺼져 있으면 남은 호스트는 기록 없이 버려집니다.
    pub fn shutdown(mut self) -> SessionSummary {
        let now = (self.clock)();
        let mut summary = SessionSummary::default();

        let remaining: Vec<_> = self.engine.table_mut().drain().collect();
        for mut host in remaining {
            if !host.has_traffic() {
                continue;
            }
            if !self.flush_on_shutdown {
                summary.discarded_with_traffic += 1;
                continue;
            }
            match self.sink.flush(&mut host, now) {
                Ok(()) => summary.flushed_on_shutdown += 1,
                Err(e) => {
                    self.stats.flush_failures += 1;
                    warn!(host = %host.address(), error = %e, "failed to record host on shutdown");
                }
            }
        }

        if summary.discarded_with_traffic > 0 {
            warn!(
                hosts = summary.discarded_with_traffic,
                "discarding unrecorded counters of active hosts (flush_on_shutdown is off)"
            );
        }
        debug!(
            flushed = summary.flushed_on_shutdown,
            discarded = summary.discarded_with_traffic,
            "host table released"
        );
        self.stats.observe_table_size(0);

        summary.stats = self.stats;
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU64;

    use tom_core::error::CaptureError;

    use crate::address::Address;
    use crate::classifier::tests::ipv4_frame;
    use crate::error::AccountingError;
    use crate::table::Host;

    /// 준비된 결과를 순서대로 돌려주는 소스. 다 쓰면 fatal 에러.
    struct ScriptedSource {
        script: VecDeque<Result<CaptureOutcome, TomError>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<CaptureOutcome, TomError>>) -> Self {
            Self {
                script: script.into(),
            }
        }
    }

    impl PacketSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        fn next_frame(&mut self) -> Result<CaptureOutcome, TomError> {
            self.script
                .pop_front()
                .unwrap_or_else(|| Err(CaptureError::Fatal("script exhausted".to_owned()).into()))
        }
    }

    #[derive(Default)]
    struct MemorySink {
        records: Vec<(String, u64, u64, u64)>,
    }

    impl HostSink for MemorySink {
        fn flush(&mut self, host: &mut Host, now: u64) -> Result<(), AccountingError> {
            self.records.push((
                host.address().to_string(),
                host.last_logged_time,
                host.tx_bytes,
                host.rx_bytes,
            ));
            host.last_logged_time = now;
            Ok(())
        }
    }

    fn frame(src: [u8; 4], dst: [u8; 4], ts: u64) -> Result<CaptureOutcome, TomError> {
        Ok(CaptureOutcome::Frame(Frame::new(
            ipv4_frame(&[], src, dst, 66),
            ts,
        )))
    }

    fn session(
        script: Vec<Result<CaptureOutcome, TomError>>,
        config: SessionConfig,
        clock: Arc<AtomicU64>,
    ) -> AccountingSession<ScriptedSource, MemorySink> {
        AccountingSession::builder()
            .source(ScriptedSource::new(script))
            .sink(MemorySink::default())
            .engine(AccountingEngine::from_targets(["10.0.0.0/8"]).unwrap())
            .config(config)
            .clock(move || clock.load(Ordering::SeqCst))
            .build()
            .unwrap()
    }

    fn config(idle_secs: u64, flush_on_shutdown: bool) -> SessionConfig {
        SessionConfig {
            idle_timeout: Duration::from_secs(idle_secs),
            purge_policy: PurgePolicy::EveryCycle,
            flush_on_shutdown,
        }
    }

    #[test]
    fn build_requires_source_and_sink() {
        let result = AccountingSession::<ScriptedSource, MemorySink>::builder()
            .sink(MemorySink::default())
            .build();
        assert!(matches!(
            result,
            Err(TomError::Accounting(AccountingFailure::InvalidArgument(_)))
        ));
    }

    #[test]
    fn capture_one_accounts_frame() {
        let clock = Arc::new(AtomicU64::new(1_000));
        let mut session = session(
            vec![frame([10, 0, 0, 1], [8, 8, 8, 8], 1_000)],
            config(300, false),
            clock,
        );

        let outcome = session.capture_one().unwrap();
        assert!(matches!(outcome, CycleOutcome::Accounted(_)));

        let host = session
            .engine()
            .table()
            .get(&Address::ipv4([10, 0, 0, 1]))
            .unwrap();
        assert_eq!(host.tx_bytes, 100);
        assert_eq!(session.stats().tx_bytes, 100);
        assert_eq!(session.stats().rx_bytes, 0);
    }

    #[test]
    fn skipped_and_timeout_cycles() {
        let clock = Arc::new(AtomicU64::new(0));
        let mut session = session(
            vec![
                Ok(CaptureOutcome::Frame(Frame::new(vec![0u8; 10], 0))),
                Ok(CaptureOutcome::Timeout),
            ],
            config(300, false),
            clock,
        );

        assert!(matches!(
            session.capture_one().unwrap(),
            CycleOutcome::Skipped(SkipReason::Truncated)
        ));
        assert!(matches!(session.capture_one().unwrap(), CycleOutcome::Timeout));
        assert!(session.capture_one().is_err());
        assert_eq!(session.stats().skipped, 1);
        assert_eq!(session.stats().timeouts, 1);
    }

    #[test]
    fn timeout_cycle_purges_idle_hosts() {
        let clock = Arc::new(AtomicU64::new(1_000));
        let mut session = session(
            vec![
                frame([10, 0, 0, 1], [10, 0, 0, 2], 1_000),
                Ok(CaptureOutcome::Timeout),
            ],
            config(60, false),
            Arc::clone(&clock),
        );

        session.capture_one().unwrap();
        assert_eq!(session.engine().table().len(), 2);

        clock.store(1_061, Ordering::SeqCst);
        session.capture_one().unwrap();

        assert!(session.engine().table().is_empty());
        assert_eq!(session.stats().hosts_purged, 2);
        let mut records = session.sink().records.clone();
        records.sort();
        assert_eq!(
            records,
            vec![
                ("10.0.0.1".to_owned(), 1_000, 100, 0),
                ("10.0.0.2".to_owned(), 1_000, 0, 100),
            ]
        );
    }

    #[test]
    fn run_stops_on_fatal_source_error() {
        let clock = Arc::new(AtomicU64::new(0));
        let session = session(vec![Ok(CaptureOutcome::Timeout)], config(300, false), clock);
        let flag = AtomicBool::new(false);

        let err = session.run(&flag).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn run_returns_immediately_when_flag_set() {
        let clock = Arc::new(AtomicU64::new(0));
        let session = session(vec![], config(300, false), clock);
        let flag = AtomicBool::new(true);

        let summary = session.run(&flag).unwrap();
        assert_eq!(summary.stats.frames, 0);
    }

    #[test]
    fn shutdown_discards_by_default() {
        let clock = Arc::new(AtomicU64::new(5));
        let mut session = session(
            vec![frame([10, 0, 0, 1], [10, 0, 0, 2], 5)],
            config(300, false),
            clock,
        );
        session.capture_one().unwrap();

        let summary = session.shutdown();
        assert_eq!(summary.discarded_with_traffic, 2);
        assert_eq!(summary.flushed_on_shutdown, 0);
    }

    #[test]
    fn shutdown_flushes_when_enabled() {
        let clock = Arc::new(AtomicU64::new(5));
        let mut session = session(
            vec![frame([10, 0, 0, 1], [192, 168, 0, 1], 5)],
            config(300, true),
            clock,
        );
        session.capture_one().unwrap();

        let summary = session.shutdown();
        assert_eq!(summary.flushed_on_shutdown, 1);
        assert_eq!(summary.discarded_with_traffic, 0);
        assert_eq!(summary.stats.frames, 1);
    }

    #[test]
    fn session_config_from_core_defaults() {
        let cfg = SessionConfig::from_core(&AccountingConfig::default());
        assert_eq!(cfg.idle_timeout, Duration::from_secs(300));
        assert_eq!(cfg.purge_policy, PurgePolicy::EveryCycle);
        assert!(!cfg.flush_on_shutdown);
    }
}
