//! 주소 매칭 — 서브넷 포함 여부, 주소 동일성, 텍스트 변환
//!
//! [`Address`]는 IPv4/IPv6 주소와 프리픽스 길이를 함께 담습니다.
//! 대상 서브넷과 추적 호스트 모두 같은 타입을 사용하며,
//! 호스트 주소는 항상 전체 폭 프리픽스(/32, /128)를 가집니다.
//!
//! # 매칭 규칙
//! - [`same`]: 종류가 같고 주소 폭만큼의 바이트가 모두 같으면 `true` (프리픽스 무시)
//! - [`subnet_contains`]: 종류가 같고 앞쪽 `prefix_len` 비트가 같으면 `true`
//!
//! IPv6 값도 표현과 매칭은 가능하지만, 프레임 분류기는 IPv4만 생성합니다.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::AccountingError;

/// 주소 저장 공간 크기 (IPv6 기준)
pub const ADDR_SIZE: usize = 16;

/// 주소 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    /// IPv4 (4바이트)
    Ipv4,
    /// IPv6 (16바이트)
    Ipv6,
}

impl AddressKind {
    /// 주소 폭 (바이트)
    pub const fn width(self) -> usize {
        match self {
            AddressKind::Ipv4 => 4,
            AddressKind::Ipv6 => 16,
        }
    }

    /// 최대 프리픽스 길이 (비트)
    pub const fn max_prefix(self) -> u8 {
        match self {
            AddressKind::Ipv4 => 32,
            AddressKind::Ipv6 => 128,
        }
    }
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressKind::Ipv4 => write!(f, "ipv4"),
            AddressKind::Ipv6 => write!(f, "ipv6"),
        }
    }
}

/// IP 주소 + 프리픽스 길이
///
/// `bytes`의 앞쪽 `kind.width()` 바이트만 의미가 있고 나머지는 0입니다.
/// 프리픽스 길이는 항상 주소 폭(비트) 이하입니다.
#[derive(Debug, Clone, Copy)]
pub struct Address {
    kind: AddressKind,
    prefix_len: u8,
    bytes: [u8; ADDR_SIZE],
}

impl Address {
    /// 전체 폭(/32) IPv4 주소를 생성합니다.
    pub fn ipv4(octets: [u8; 4]) -> Self {
        let mut bytes = [0u8; ADDR_SIZE];
        bytes[..4].copy_from_slice(&octets);
        Self {
            kind: AddressKind::Ipv4,
            prefix_len: 32,
            bytes,
        }
    }

    /// 전체 폭(/128) IPv6 주소를 생성합니다.
    pub fn ipv6(octets: [u8; 16]) -> Self {
        Self {
            kind: AddressKind::Ipv6,
            prefix_len: 128,
            bytes: octets,
        }
    }

    /// 프리픽스 길이를 지정한 사본을 반환합니다.
    ///
    /// # 에러
    /// 프리픽스가 주소 폭을 넘으면 `InvalidTarget`을 반환합니다.
    pub fn with_prefix(self, prefix_len: u8) -> Result<Self, AccountingError> {
        if prefix_len > self.kind.max_prefix() {
            return Err(AccountingError::InvalidTarget {
                target: format!("{}/{}", self, prefix_len),
                reason: format!(
                    "prefix length exceeds {} address width ({} bits)",
                    self.kind,
                    self.kind.max_prefix()
                ),
            });
        }
        Ok(Self { prefix_len, ..self })
    }

    /// 전체 폭 프리픽스로 바꾼 사본 (호스트 주소)
    pub fn to_host(self) -> Self {
        Self {
            prefix_len: self.kind.max_prefix(),
            ..self
        }
    }

    /// `A.B.C.D/N` 또는 `x::y/N` 형식의 대상 문자열을 파싱합니다.
    ///
    /// `/N`이 없으면 전체 폭 프리픽스로 간주합니다.
    pub fn parse_target(text: &str) -> Result<Self, AccountingError> {
        let text = text.trim();
        let (addr_part, prefix_part) = match text.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (text, None),
        };

        let ip: IpAddr = addr_part
            .parse()
            .map_err(|e: std::net::AddrParseError| AccountingError::InvalidTarget {
                target: text.to_owned(),
                reason: e.to_string(),
            })?;
        let address = Self::from(ip);

        match prefix_part {
            None => Ok(address),
            Some(prefix) => {
                let prefix_len =
                    prefix
                        .parse::<u8>()
                        .map_err(|e| AccountingError::InvalidTarget {
                            target: text.to_owned(),
                            reason: format!("invalid prefix length '{}': {}", prefix, e),
                        })?;
                address.with_prefix(prefix_len)
            }
        }
    }

    /// 주소 종류
    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// 프리픽스 길이 (비트)
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// 주소 폭만큼의 바이트
    pub fn octets(&self) -> &[u8] {
        &self.bytes[..self.kind.width()]
    }

    /// 표준 라이브러리 `IpAddr`로 변환합니다.
    pub fn to_ip(&self) -> IpAddr {
        match self.kind {
            AddressKind::Ipv4 => IpAddr::V4(Ipv4Addr::new(
                self.bytes[0],
                self.bytes[1],
                self.bytes[2],
                self.bytes[3],
            )),
            AddressKind::Ipv6 => IpAddr::V6(Ipv6Addr::from(self.bytes)),
        }
    }
}

impl From<IpAddr> for Address {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Self::ipv4(v4.octets()),
            IpAddr::V6(v6) => Self::ipv6(v6.octets()),
        }
    }
}

/// 주소만 출력합니다 (프리픽스 제외). 호스트 기록 파일 이름으로 쓰입니다.
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ip())
    }
}

/// 두 주소가 같은 호스트인지 확인합니다.
///
/// 종류가 다르면 항상 `false`입니다. 프리픽스 길이는 비교하지 않습니다.
pub fn same(a: &Address, b: &Address) -> bool {
    a.kind == b.kind && a.octets() == b.octets()
}

/// `candidate`가 `subnet`에 포함되는지 확인합니다.
///
/// 프리픽스가 8비트 이상 남아 있는 동안은 바이트 단위로 비교하고,
/// 마지막 부분 바이트는 상위 비트만 시프트해서 비교합니다.
/// 프리픽스 0은 같은 종류의 모든 주소와 매칭됩니다.
pub fn subnet_contains(candidate: &Address, subnet: &Address) -> bool {
    if candidate.kind != subnet.kind {
        return false;
    }

    let mut remaining = u32::from(subnet.prefix_len);
    for (c, s) in candidate.octets().iter().zip(subnet.octets()) {
        if remaining == 0 {
            break;
        }
        if remaining < 8 {
            let shift = 8 - remaining;
            return (c >> shift) == (s >> shift);
        }
        if c != s {
            return false;
        }
        remaining -= 8;
    }
    true
}

/// 주소를 텍스트로 변환합니다 (IPv4는 점 표기).
pub fn to_text(address: &Address) -> String {
    address.to_string()
}
