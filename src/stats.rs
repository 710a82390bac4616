//! 수명주기 통계

use std::time::{Duration, Instant};

use crate::packet::Packet;
use crate::HEADER_SIZE;

/// 연결 하나의 수명주기 동안 집계되는 통계
#[derive(Debug, Clone)]
pub struct LifecycleStats {
    /// 수신 패킷 수
    pub packets_received: u64,

    /// 송신 패킷 수
    pub packets_sent: u64,

    /// 수신 바이트 (헤더 포함)
    pub bytes_received: u64,

    /// 송신 바이트 (헤더 포함)
    pub bytes_sent: u64,

    /// 수명주기 시작 시간
    started_at: Instant,
}

impl LifecycleStats {
    pub fn new() -> Self {
        Self {
            packets_received: 0,
            packets_sent: 0,
            bytes_received: 0,
            bytes_sent: 0,
            started_at: Instant::now(),
        }
    }

    /// 패킷 수신 기록
    pub fn record_received(&mut self, packet: &Packet) {
        self.packets_received += 1;
        self.bytes_received += (HEADER_SIZE + packet.payload.len()) as u64;
    }

    /// 패킷 송신 기록
    pub fn record_sent(&mut self, packet: &Packet) {
        self.packets_sent += 1;
        self.bytes_sent += (HEADER_SIZE + packet.payload.len()) as u64;
    }

    /// 시작 이후 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for LifecycleStats {
    fn default() -> Self {
        Self::new()
    }
}
