//! 프레임 분류기 — 이더넷 프레임에서 IPv4 송신/수신 주소 추출
//!
//! 링크 계층 프레임(이더넷 프레이밍)을 받아 [`IpPair`]를 만들거나
//! 스킵 사유를 반환합니다. 스킵은 에러가 아니라 정상적인 결과입니다.
//!
//! # 헤더 레이아웃
//! ```text
//! 0            6            12      14
//! +------------+------------+-------+-------------------
//! | dst MAC    | src MAC    | type  | (VLAN 태그) ...
//! +------------+------------+-------+-------------------
//! ```
//! - 0x88A8 (802.1ad): 추가로 8바이트 건너뜀
//! - 0x8100 (802.1Q): 추가로 4바이트 건너뜀
//! - 0x0800 (IPv4): 그대로 진행
//! - 그 외: 스킵
//!
//! 이후 2바이트 ethertype 필드를 건너뛴 위치가 IPv4 헤더 시작입니다.
//! 태그 뒤의 내부 ethertype은 다시 검사하지 않고 IP 버전 니블로 판별합니다.
//!
//! 모든 읽기는 캡처된 바이트 범위 안에서만 일어나며,
//! 범위를 벗어나는 프레임은 [`SkipReason::Truncated`]로 스킵됩니다.

use std::fmt;

use crate::address::Address;

/// IPv4 ethertype
pub const ETHERTYPE_IPV4: u16 = 0x0800;

/// 802.1Q VLAN 태그
pub const ETHERTYPE_VLAN: u16 = 0x8100;

/// 802.1ad (QinQ) 외부 태그
pub const ETHERTYPE_QINQ: u16 = 0x88A8;

/// 두 MAC 주소 필드 뒤 ethertype 위치
const ETHERTYPE_OFFSET: usize = 12;

/// ethertype/length 필드 크기
const ETHERTYPE_LEN: usize = 2;

/// 최소 IPv4 헤더 크기 (주소 필드까지 포함)
const IPV4_MIN_HEADER: usize = 20;

/// IPv4 헤더 내 송신 주소 오프셋
const IPV4_SRC_OFFSET: usize = 12;

/// IPv4 헤더 내 수신 주소 오프셋
const IPV4_DST_OFFSET: usize = 16;

/// 프레임 스킵 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 필요한 오프셋이 캡처 길이를 벗어남
    Truncated,
    /// 지원하지 않는 ethertype
    UnsupportedEthertype(u16),
    /// IPv4가 아닌 IP 버전
    UnsupportedIpVersion(u8),
    /// IHL 필드가 [5, 15] 범위 밖
    BadHeaderLength(u8),
}

impl SkipReason {
    /// 메트릭 레이블 값
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Truncated => "truncated",
            SkipReason::UnsupportedEthertype(_) => "ethertype",
            SkipReason::UnsupportedIpVersion(_) => "ip_version",
            SkipReason::BadHeaderLength(_) => "header_length",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Truncated => write!(f, "truncated frame"),
            SkipReason::UnsupportedEthertype(t) => write!(f, "unsupported ethertype 0x{t:04x}"),
            SkipReason::UnsupportedIpVersion(v) => write!(f, "unsupported ip version {v}"),
            SkipReason::BadHeaderLength(ihl) => write!(f, "bad ipv4 header length {ihl}"),
        }
    }
}

/// 패킷 하나의 송신/수신 주소 쌍
#[derive(Debug, Clone, Copy)]
pub struct IpPair {
    /// 송신 주소 (tx로 집계)
    pub src: Address,
    /// 수신 주소 (rx로 집계)
    pub dst: Address,
}

/// 분류 결과
#[derive(Debug, Clone, Copy)]
pub enum Classification {
    /// IPv4 주소 쌍 추출 성공
    Ip(IpPair),
    /// 스킵
    Skipped(SkipReason),
}

impl Classification {
    /// 주소 쌍을 반환합니다. 스킵이면 `None`.
    pub fn pair(&self) -> Option<&IpPair> {
        match self {
            Classification::Ip(pair) => Some(pair),
            Classification::Skipped(_) => None,
        }
    }
}

/// 캡처된 프레임 바이트를 분류합니다.
///
/// `data`는 캡처된 바이트 전체이며, 그 이상은 절대 읽지 않습니다.
pub fn classify(data: &[u8]) -> Classification {
    match locate_ipv4(data) {
        Ok(pair) => Classification::Ip(pair),
        Err(reason) => Classification::Skipped(reason),
    }
}

fn locate_ipv4(data: &[u8]) -> Result<IpPair, SkipReason> {
    let tag = read_u16(data, ETHERTYPE_OFFSET)?;
    let tag_len = match tag {
        ETHERTYPE_QINQ => 8,
        ETHERTYPE_VLAN => 4,
        ETHERTYPE_IPV4 => 0,
        other => return Err(SkipReason::UnsupportedEthertype(other)),
    };
    let ip_start = ETHERTYPE_OFFSET + tag_len + ETHERTYPE_LEN;

    let first = *data.get(ip_start).ok_or(SkipReason::Truncated)?;
    let version = first >> 4;
    if version != 4 {
        return Err(SkipReason::UnsupportedIpVersion(version));
    }
    let ihl = first & 0x0f;
    if !(5..=15).contains(&ihl) {
        return Err(SkipReason::BadHeaderLength(ihl));
    }

    let header = data
        .get(ip_start..ip_start + IPV4_MIN_HEADER)
        .ok_or(SkipReason::Truncated)?;
    Ok(IpPair {
        src: Address::ipv4(read_octets(header, IPV4_SRC_OFFSET)?),
        dst: Address::ipv4(read_octets(header, IPV4_DST_OFFSET)?),
    })
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16, SkipReason> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(SkipReason::Truncated)
}

fn read_octets(header: &[u8], offset: usize) -> Result<[u8; 4], SkipReason> {
    header
        .get(offset..offset + 4)
        .and_then(|b| <[u8; 4]>::try_from(b).ok())
        .ok_or(SkipReason::Truncated)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::address::same;

    /// 테스트용 이더넷 + IPv4 프레임을 생성합니다.
    pub(crate) fn ipv4_frame(tags: &[u16], src: [u8; 4], dst: [u8; 4], payload: usize) -> Vec<u8> {
        let mut frame = vec![0xaa; 6];
        frame.extend_from_slice(&[0xbb; 6]);
        for tag in tags {
            frame.extend_from_slice(&tag.to_be_bytes());
            // 태그 제어 정보 (QinQ는 외부 + 내부 태그로 6바이트를 채움)
            if *tag == ETHERTYPE_QINQ {
                frame.extend_from_slice(&[0x00, 0x64, 0x81, 0x00, 0x00, 0xc8]);
            } else {
                frame.extend_from_slice(&[0x00, 0x64]);
            }
        }
        frame.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());

        let mut ip = vec![0u8; IPV4_MIN_HEADER];
        ip[0] = 0x45;
        ip[9] = 6;
        ip[12..16].copy_from_slice(&src);
        ip[16..20].copy_from_slice(&dst);
        frame.extend_from_slice(&ip);
        frame.extend(std::iter::repeat_n(0u8, payload));
        frame
    }

    fn expect_pair(data: &[u8]) -> IpPair {
        match classify(data) {
            Classification::Ip(pair) => pair,
            Classification::Skipped(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    fn expect_skip(data: &[u8]) -> SkipReason {
        match classify(data) {
            Classification::Skipped(reason) => reason,
            Classification::Ip(pair) => panic!("unexpected pair: {:?}", pair),
        }
    }

    #[test]
    fn plain_ipv4_frame() {
        let frame = ipv4_frame(&[], [10, 0, 0, 1], [192, 168, 1, 20], 40);
        let pair = expect_pair(&frame);
        assert!(same(&pair.src, &Address::ipv4([10, 0, 0, 1])));
        assert!(same(&pair.dst, &Address::ipv4([192, 168, 1, 20])));
        assert_eq!(pair.src.prefix_len(), 32);
    }

    #[test]
    fn vlan_tagged_frame() {
        let frame = ipv4_frame(&[ETHERTYPE_VLAN], [172, 16, 5, 5], [8, 8, 8, 8], 0);
        let pair = expect_pair(&frame);
        assert!(same(&pair.src, &Address::ipv4([172, 16, 5, 5])));
        assert!(same(&pair.dst, &Address::ipv4([8, 8, 8, 8])));
    }

    #[test]
    fn qinq_tagged_frame() {
        let frame = ipv4_frame(&[ETHERTYPE_QINQ], [1, 2, 3, 4], [5, 6, 7, 8], 0);
        let pair = expect_pair(&frame);
        assert!(same(&pair.src, &Address::ipv4([1, 2, 3, 4])));
        assert!(same(&pair.dst, &Address::ipv4([5, 6, 7, 8])));
    }

    #[test]
    fn arp_is_skipped() {
        let mut frame = ipv4_frame(&[], [1, 1, 1, 1], [2, 2, 2, 2], 0);
        frame[12..14].copy_from_slice(&0x0806u16.to_be_bytes());
        assert_eq!(
            expect_skip(&frame),
            SkipReason::UnsupportedEthertype(0x0806)
        );
    }

    #[test]
    fn ipv6_version_is_skipped() {
        let mut frame = ipv4_frame(&[], [1, 1, 1, 1], [2, 2, 2, 2], 0);
        frame[14] = 0x60;
        assert_eq!(expect_skip(&frame), SkipReason::UnsupportedIpVersion(6));
    }

    #[test]
    fn header_length_out_of_range_is_skipped() {
        let mut frame = ipv4_frame(&[], [1, 1, 1, 1], [2, 2, 2, 2], 0);
        frame[14] = 0x44;
        assert_eq!(expect_skip(&frame), SkipReason::BadHeaderLength(4));

        frame[14] = 0x4f;
        assert!(classify(&frame).pair().is_some());
    }

    #[test]
    fn truncated_before_ethertype() {
        assert_eq!(expect_skip(&[0u8; 13]), SkipReason::Truncated);
        assert_eq!(expect_skip(&[]), SkipReason::Truncated);
    }

    #[test]
    fn truncated_inside_ip_header() {
        let frame = ipv4_frame(&[], [10, 0, 0, 1], [10, 0, 0, 2], 0);
        // 수신 주소 마지막 바이트 직전에서 잘림
        assert_eq!(expect_skip(&frame[..frame.len() - 1]), SkipReason::Truncated);
        // IP 헤더 시작 직전에서 잘림
        assert_eq!(expect_skip(&frame[..14]), SkipReason::Truncated);
    }

    #[test]
    fn truncated_vlan_frame() {
        let frame = ipv4_frame(&[ETHERTYPE_VLAN], [10, 0, 0, 1], [10, 0, 0, 2], 0);
        assert_eq!(expect_skip(&frame[..20]), SkipReason::Truncated);
    }

    #[test]
    fn skip_reason_labels() {
        assert_eq!(SkipReason::Truncated.as_str(), "truncated");
        assert_eq!(SkipReason::UnsupportedEthertype(1).as_str(), "ethertype");
        assert_eq!(SkipReason::UnsupportedIpVersion(6).as_str(), "ip_version");
        assert_eq!(SkipReason::BadHeaderLength(3).as_str(), "header_length");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arbitrary_bytes_never_panic(data in proptest::collection::vec(any::<u8>(), 0..128)) {
                let _ = classify(&data);
            }

            #[test]
            fn truncation_below_minimum_always_skips(
                src in any::<[u8; 4]>(),
                dst in any::<[u8; 4]>(),
                cut in 0usize..34,
            ) {
                let frame = ipv4_frame(&[], src, dst, 0);
                prop_assert_eq!(frame.len(), 34);
                let truncated = &frame[..cut];
                prop_assert!(matches!(classify(truncated), Classification::Skipped(_)));
            }

            #[test]
            fn well_formed_frames_yield_their_addresses(
                src in any::<[u8; 4]>(),
                dst in any::<[u8; 4]>(),
                payload in 0usize..64,
            ) {
                let frame = ipv4_frame(&[], src, dst, payload);
                let pair = expect_pair(&frame);
                prop_assert_eq!(pair.src.octets(), &src[..]);
                prop_assert_eq!(pair.dst.octets(), &dst[..]);
            }
        }
    }
}
