//! 호스트 테이블 — 추적 중인 호스트와 누적 카운터
//!
//! 주소 바이트를 키로 하는 맵입니다. 같은 주소는 항상 하나의 엔트리만 가지며,
//! 엔트리는 처음 관측될 때 생성되고 유휴 정리 시 제거됩니다.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::address::{ADDR_SIZE, Address, AddressKind};

/// 추적 중인 호스트 하나
#[derive(Debug, Clone)]
pub struct Host {
    address: Address,
    /// 마지막 트래픽 시각 (Unix epoch 초)
    pub last_traffic_time: u64,
    /// 마지막 기록 시각 (Unix epoch 초). 생성 시 최초 관측 시각으로 설정됩니다.
    pub last_logged_time: u64,
    /// 송신 바이트 누적
    pub tx_bytes: u64,
    /// 수신 바이트 누적
    pub rx_bytes: u64,
}

impl Host {
    /// 처음 관측된 호스트를 생성합니다. 카운터는 0입니다.
    pub fn new(address: Address, now: u64) -> Self {
        Self {
            address,
            last_traffic_time: now,
            last_logged_time: now,
            tx_bytes: 0,
            rx_bytes: 0,
        }
    }

    /// 호스트 주소
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// 생성 이후 트래픽이 있었는지 여부
    pub fn has_traffic(&self) -> bool {
        self.tx_bytes > 0 || self.rx_bytes > 0
    }

    /// `now` 기준 유휴 시간 (초). 시계가 뒤로 가면 0입니다.
    pub fn idle_for(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_traffic_time)
    }
}

/// 테이블 키. 프리픽스 길이는 포함하지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct HostKey {
    kind: AddressKind,
    bytes: [u8; ADDR_SIZE],
}

impl From<&Address> for HostKey {
    fn from(address: &Address) -> Self {
        let mut bytes = [0u8; ADDR_SIZE];
        let octets = address.octets();
        bytes[..octets.len()].copy_from_slice(octets);
        Self {
            kind: address.kind(),
            bytes,
        }
    }
}

/// 주소 → 호스트 맵
#[derive(Debug, Default)]
pub struct HostTable {
    hosts: HashMap<HostKey, Host>,
}

impl HostTable {
    /// 빈 테이블을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 호스트 수
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// 주소로 호스트를 조회합니다.
    pub fn get(&self, address: &Address) -> Option<&Host> {
        self.hosts.get(&HostKey::from(address))
    }

    /// 주소로 호스트를 가변 조회합니다.
    pub fn get_mut(&mut self, address: &Address) -> Option<&mut Host> {
        self.hosts.get_mut(&HostKey::from(address))
    }

    /// 호스트를 조회하고, 없으면 `now` 시각으로 생성합니다.
    ///
    /// 두 번째 값은 새로 생성되었는지 여부입니다.
    pub fn get_or_insert(&mut self, address: &Address, now: u64) -> (&mut Host, bool) {
        match self.hosts.entry(HostKey::from(address)) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => (entry.insert(Host::new(address.to_host(), now)), true),
        }
    }

    /// 호스트를 제거하고 반환합니다.
    pub fn remove(&mut self, address: &Address) -> Option<Host> {
        self.hosts.remove(&HostKey::from(address))
    }

    /// 모든 호스트를 순회합니다. 순서는 보장하지 않습니다.
    pub fn iter(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    /// 모든 호스트를 가변 순회합니다.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Host> {
        self.hosts.values_mut()
    }

    /// 모든 호스트를 제거하고 반환합니다.
    pub fn drain(&mut self) -> impl Iterator<Item = Host> + '_ {
        self.hosts.drain().map(|(_, host)| host)
    }
}
