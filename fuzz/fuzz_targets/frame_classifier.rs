#![no_main]

use libfuzzer_sys::fuzz_target;
use tom_accounting::{Classification, classify};
use tom_core::types::Frame;

fuzz_target!(|data: &[u8]| {
    // 캡처 길이를 임의로 줄여도 범위 밖을 읽지 않아야 한다
    for cut in [data.len(), data.len() / 2, data.len().min(33)] {
        let mut frame = Frame::new(data.to_vec(), 0);
        frame.capture_len = u32::try_from(cut).unwrap_or(u32::MAX);

        if let Classification::Ip(pair) = classify(frame.captured()) {
            // 주소를 얻었다면 최소 IPv4 헤더까지 캡처된 프레임이어야 한다
            assert!(cut >= 34);
            assert_eq!(pair.src.prefix_len(), 32);
        }
    }
});
