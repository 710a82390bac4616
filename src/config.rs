//! 프로토콜 설정

use std::time::Duration;

/// HSP 프로토콜 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 서버측 초기 시퀀스 번호 (ISN)
    /// SYN-ACK의 seq 필드로 사용됨
    pub initial_seq_no: u32,

    /// 패킷 수신 타임아웃 (밀리초)
    /// 0이면 무한 대기 (기본 계약)
    pub read_timeout_ms: u64,

    /// DATA 페이로드를 로그에 포함할지 여부
    pub log_payload: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_seq_no: 0,     // SYN-ACK seq = 0
            read_timeout_ms: 0,    // 무한 대기
            log_payload: true,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 수신 타임아웃 반환 (0이면 None)
    pub fn read_timeout(&self) -> Option<Duration> {
        if self.read_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.read_timeout_ms))
        }
    }

    /// 대화형 테스트용 설정 (느긋한 타임아웃)
    pub fn interactive() -> Self {
        Self {
            initial_seq_no: 0,
            read_timeout_ms: 30_000,  // 30초
            log_payload: true,
        }
    }

    /// LAN 환경용 설정 (짧은 타임아웃)
    pub fn lan() -> Self {
        Self {
            initial_seq_no: 0,
            read_timeout_ms: 2_000,   // 2초
            log_payload: false,
        }
    }
}
