//! # HSP (Handshake Stream Protocol)
//!
//! 신뢰성 있는 바이트 스트림(연결된 TCP 소켓) 위에서 동작하는
//! 명시적 SYN / SYN-ACK / ACK 핸드쉐이크 프로토콜
//!
//! ## 핵심 특징
//! - **명시적 핸드쉐이크**: SYN → SYN-ACK → ACK 3단계 연결 수립
//! - **단일 데이터 교환**: 연결당 정확히 하나의 DATA 패킷 수신
//! - **명시적 종료**: FIN → FIN-ACK 교환으로 연결 해제
//! - **고정 와이어 포맷**: 12바이트 빅엔디안 헤더 + 가변 페이로드
//! - **순차 상태 머신**: 순서 위반은 즉시 수명주기 실패로 처리
//! - **엔드포인트 독점 소유**: 성공/실패 모든 경로에서 종료 보장

pub mod config;
pub mod connection;
pub mod error;
pub mod packet;
pub mod state;
pub mod stats;

pub use config::Config;
pub use connection::{Connection, LifecycleReport};
pub use error::{Error, Result};
pub use packet::{Packet, PacketHeader, PacketKind};
pub use state::{Lifecycle, LifecycleState};
pub use stats::LifecycleStats;

/// 페이로드 최대 크기 (바이트)
pub const MAX_PAYLOAD_SIZE: usize = 2048;

/// 와이어 헤더 크기 (바이트)
/// seq(4) + ack(4) + payload_len(2) + flags(2)
pub const HEADER_SIZE: usize = 12;
