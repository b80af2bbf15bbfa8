//! 집계 엔진 — 대상 서브넷 매칭과 호스트별 바이트 누적
//!
//! [`AccountingEngine`]은 대상 목록([`TargetList`])과 호스트 테이블([`HostTable`])을
//! 소유합니다. 패킷마다 송신 주소는 tx로, 수신 주소는 rx로 집계하며
//! 어느 대상 서브넷에도 속하지 않는 주소는 [`AccountOutcome::OutOfScope`]로 건너뜁니다.
//!
//! # 사용 예시
//! ```ignore
//! let mut engine = AccountingEngine::from_targets(["10.0.0.0/8"])?;
//! if let Classification::Ip(pair) = classify(frame.captured()) {
//!     engine.account(&pair, frame.capture_len, frame.timestamp);
//! }
//! ```

use std::fmt;

use tracing::{debug, trace, warn};

use crate::address::{Address, AddressKind, subnet_contains};
use crate::classifier::IpPair;
use crate::error::AccountingError;
use crate::table::HostTable;

/// IPv4 대상에 허용되는 최대 프리픽스 길이
pub const MAX_IPV4_TARGET_PREFIX: u8 = 24;

/// IPv6 대상에 허용되는 최대 프리픽스 길이
pub const MAX_IPV6_TARGET_PREFIX: u8 = 128;

/// 집계 대상 서브넷 목록
///
/// 시작 시 채워지고 캡처 루프 동안에는 바뀌지 않습니다.
/// 순서는 매칭 결과에 영향을 주지 않습니다.
#[derive(Debug, Clone, Default)]
pub struct TargetList {
    targets: Vec<Address>,
}

impl TargetList {
    /// 빈 목록을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 대상 서브넷을 등록합니다.
    ///
    /// # 에러
    /// IPv4 프리픽스가 /24를 넘거나 IPv6 프리픽스가 /128을 넘으면 `InvalidTarget`.
    pub fn add(&mut self, target: Address) -> Result<(), AccountingError> {
        let max = match target.kind() {
            AddressKind::Ipv4 => MAX_IPV4_TARGET_PREFIX,
            AddressKind::Ipv6 => MAX_IPV6_TARGET_PREFIX,
        };
        if target.prefix_len() > max {
            return Err(AccountingError::InvalidTarget {
                target: format!("{}/{}", target, target.prefix_len()),
                reason: format!("{} prefix must be at most /{}", target.kind(), max),
            });
        }

        if target.kind() == AddressKind::Ipv6 {
            warn!(
                subnet = %target,
                prefix_len = target.prefix_len(),
                "ipv6 target registered; frames are classified as ipv4 only, so it never matches"
            );
        }

        debug!(subnet = %target, prefix_len = target.prefix_len(), "target registered");
        self.targets.push(target);
        Ok(())
    }

    /// 주소가 하나 이상의 대상 서브넷에 속하는지 확인합니다.
    pub fn matches(&self, address: &Address) -> bool {
        self.targets.iter().any(|t| subnet_contains(address, t))
    }

    /// 등록된 대상 수
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// 등록 순서대로 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.targets.iter()
    }
}

/// 집계 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// 송신 (패킷의 src)
    Tx,
    /// 수신 (패킷의 dst)
    Rx,
}

impl Direction {
    /// 메트릭 레이블 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Tx => "tx",
            Direction::Rx => "rx",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 주소 하나에 대한 집계 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountOutcome {
    /// 새 호스트를 만들고 집계함
    Created,
    /// 기존 호스트에 집계함
    Updated,
    /// 대상 범위 밖이라 집계하지 않음
    OutOfScope,
}

impl AccountOutcome {
    /// 집계가 일어났는지 여부
    pub fn is_accounted(&self) -> bool {
        !matches!(self, AccountOutcome::OutOfScope)
    }
}

/// 패킷 하나에 대한 집계 결과 (송신/수신 각각)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketOutcome {
    /// 송신 주소 결과
    pub src: AccountOutcome,
    /// 수신 주소 결과
    pub dst: AccountOutcome,
}

/// 호스트별 트래픽 집계 엔진
#[derive(Debug, Default)]
pub struct AccountingEngine {
    targets: TargetList,
    table: HostTable,
}

impl AccountingEngine {
    /// 대상이 없는 엔진을 생성합니다. 대상이 없으면 아무것도 집계하지 않습니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 텍스트 대상 목록으로 엔진을 생성합니다.
    ///
    /// 첫 번째 잘못된 대상에서 중단하고 에러를 반환합니다.
    pub fn from_targets<I, T>(targets: I) -> Result<Self, AccountingError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut engine = Self::new();
        for text in targets {
            let target = Address::parse_target(text.as_ref())?;
            engine.add_target(target)?;
        }
        Ok(engine)
    }

    /// 대상 서브넷을 등록합니다.
    pub fn add_target(&mut self, target: Address) -> Result<(), AccountingError> {
        self.targets.add(target)
    }

    /// 대상 목록
    pub fn targets(&self) -> &TargetList {
        &self.targets
    }

    /// 주소가 집계 범위 안인지 확인합니다.
    pub fn in_scope(&self, address: &Address) -> bool {
        self.targets.matches(address)
    }

    /// 패킷 하나를 집계합니다.
    ///
    /// 송신 주소의 `tx_bytes`와 수신 주소의 `rx_bytes`에 `capture_len`을 더합니다.
    /// 범위 밖 주소는 건드리지 않습니다.
    pub fn account(&mut self, pair: &IpPair, capture_len: u32, capture_time: u64) -> PacketOutcome {
        let outcome = PacketOutcome {
            src: self.account_address(&pair.src, Direction::Tx, capture_len, capture_time),
            dst: self.account_address(&pair.dst, Direction::Rx, capture_len, capture_time),
        };
        trace!(
            src = %pair.src,
            dst = %pair.dst,
            len = capture_len,
            src_outcome = ?outcome.src,
            dst_outcome = ?outcome.dst,
            "packet accounted"
        );
        outcome
    }

    /// 주소 하나를 한 방향으로 집계합니다.
    pub fn account_address(
        &mut self,
        address: &Address,
        direction: Direction,
        capture_len: u32,
        capture_time: u64,
    ) -> AccountOutcome {
        if !self.targets.matches(address) {
            return AccountOutcome::OutOfScope;
        }

        let (host, created) = self.table.get_or_insert(address, capture_time);
        host.last_traffic_time = capture_time;
        let bytes = u64::from(capture_len);
        match direction {
            Direction::Tx => host.tx_bytes = host.tx_bytes.saturating_add(bytes),
            Direction::Rx => host.rx_bytes = host.rx_bytes.saturating_add(bytes),
        }

        if created {
            debug!(host = %address, direction = %direction, "new host tracked");
            AccountOutcome::Created
        } else {
            AccountOutcome::Updated
        }
    }

    /// 호스트 테이블
    pub fn table(&self) -> &HostTable {
        &self.table
    }

    /// 호스트 테이블 (가변)
    pub fn table_mut(&mut self) -> &mut HostTable {
        &mut self.table
    }
}
