#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use tom_accounting::{AccountingEngine, Address, IpPair};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 대상 서브넷 (주소, 프리픽스)
    targets: Vec<([u8; 4], u8)>,
    /// 패킷 (src, dst, 캡처 길이)
    packets: Vec<([u8; 4], [u8; 4], u32)>,
}

fuzz_target!(|input: FuzzInput| {
    let mut engine = AccountingEngine::new();
    for (octets, prefix) in input.targets.iter().take(8) {
        // 잘못된 프리픽스는 에러로 거부되어야 한다
        if let Ok(target) = Address::ipv4(*octets).with_prefix(*prefix) {
            let _ = engine.add_target(target);
        }
    }

    let mut expected_total: u128 = 0;
    for (i, (src, dst, len)) in input.packets.iter().take(256).enumerate() {
        let pair = IpPair {
            src: Address::ipv4(*src),
            dst: Address::ipv4(*dst),
        };
        let outcome = engine.account(&pair, *len, i as u64);
        if outcome.src.is_accounted() {
            expected_total += u128::from(*len);
        }
        if outcome.dst.is_accounted() {
            expected_total += u128::from(*len);
        }
    }

    // 집계된 바이트 합은 호스트 카운터 합과 같아야 한다
    let counted: u128 = engine
        .table()
        .iter()
        .map(|h| u128::from(h.tx_bytes) + u128::from(h.rx_bytes))
        .sum();
    assert_eq!(counted, expected_total);
    assert!(engine.table().iter().all(|h| engine.in_scope(h.address())));
});
