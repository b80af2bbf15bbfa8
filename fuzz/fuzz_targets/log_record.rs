#![no_main]

use libfuzzer_sys::fuzz_target;
use tom_accounting::parse_record;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };

    // 파싱에 성공한 레코드는 같은 줄로 다시 출력되어야 한다
    if let Ok(record) = parse_record(line) {
        let reparsed = parse_record(&record.to_string()).expect("formatted record must parse");
        assert_eq!(record, reparsed);
    }
});
