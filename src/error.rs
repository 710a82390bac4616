//! 에러 타입 정의

use thiserror::Error;

use crate::packet::PacketKind;
use crate::state::LifecycleState;

/// HSP 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("페이로드 크기 초과: {len} bytes (최대 {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("페이로드 길이 불일치: declared {declared}, actual {actual}")]
    PayloadLengthMismatch { declared: u16, actual: usize },

    #[error("스트림 절단: {during} 수신 중 연결 종료")]
    TruncatedStream { during: &'static str },

    #[error("유효하지 않은 플래그: 0x{flags:04X}")]
    InvalidFlags { flags: u16 },

    #[error("예상치 못한 패킷: state={state}, expected {expected}, got {got}")]
    UnexpectedPacket {
        state: LifecycleState,
        expected: PacketKind,
        got: PacketKind,
    },

    #[error("수신 타임아웃: state={state}")]
    ReadTimeout { state: LifecycleState },

    #[error("연결 종료")]
    ConnectionClosed,
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
