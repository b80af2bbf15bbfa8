//! 파이프라인 trait — 모듈 확장 포인트 정의

use crate::error::TomError;
use crate::types::CaptureOutcome;

/// 링크 계층 프레임을 하나씩 공급하는 trait
///
/// 새로운 캡처 백엔드(live 인터페이스, pcap 파일, 테스트용 목 등)를
/// 지원하려면 이 trait을 구현합니다.
///
/// # 반환 규약
/// - `Ok(CaptureOutcome::Frame(..))`: 프레임 하나
/// - `Ok(CaptureOutcome::Timeout)`: 타임아웃, 다시 호출하면 됩니다
/// - `Err(..)`: 복구 불가능한 실패, 캡처 루프를 종료합니다
///
/// 호출은 블로킹일 수 있으며 캡처 루프의 유일한 대기 지점입니다.
pub trait PacketSource: Send {
    /// 소스 이름 (로그용)
    fn name(&self) -> &str;

    /// 다음 프레임을 읽습니다.
    fn next_frame(&mut self) -> Result<CaptureOutcome, TomError>;
}
