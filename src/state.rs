//! 핸드쉐이크 / 종료 상태 머신
//!
//! 엔드포인트 하나의 수명주기를 엄격한 순서로 진행시킨다.
//! 분기 없음, 재시도 없음. 기대와 다른 패킷은 즉시 수명주기 위반.
//!
//! ```text
//! LISTENING ──SYN 수신──▶ SYN_RECEIVED ──SYN-ACK 송신──▶ SYN_ACK_SENT
//!                                                            │
//!                                                  ACK 수신  │
//!                                                            ▼
//! CLOSED ◀──FIN-ACK 수신── FIN_SENT ◀──FIN 송신── DATA_RECEIVED ◀──DATA 수신── ESTABLISHED
//! ```
//!
//! 시퀀스/확인 번호 규칙:
//! - SYN-ACK: seq = 서버 ISN, ack = 클라이언트 SYN seq + 1
//! - 클라이언트 ACK는 ack = 서버 ISN + 1 을 기대 (불일치는 경고만)
//! - FIN: seq = 클라이언트 ISN + 1, ack = 0
//!
//! 이 모듈은 IO를 하지 않는다. 송수신은 [`crate::connection`] 담당.

use bytes::Bytes;
use tracing::warn;

use crate::packet::{Packet, PacketKind};
use crate::{Error, Result};

/// 수명주기 상태 (엄격히 순차적, CLOSED가 종단)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// SYN 대기 중 (초기 상태)
    Listening,
    /// SYN 수신됨, SYN-ACK 송신 대기
    SynReceived,
    /// SYN-ACK 송신됨, ACK 대기
    SynAckSent,
    /// 핸드쉐이크 완료, DATA 패킷 하나 대기
    Established,
    /// DATA 수신됨, FIN 송신 대기
    DataReceived,
    /// FIN 송신됨, FIN-ACK 대기
    FinSent,
    /// 수명주기 종료 (종단 상태)
    Closed,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecycleState::Listening => "LISTENING",
            LifecycleState::SynReceived => "SYN_RECEIVED",
            LifecycleState::SynAckSent => "SYN_ACK_SENT",
            LifecycleState::Established => "ESTABLISHED",
            LifecycleState::DataReceived => "DATA_RECEIVED",
            LifecycleState::FinSent => "FIN_SENT",
            LifecycleState::Closed => "CLOSED",
        };
        write!(f, "{name}")
    }
}

/// 수명주기 순서기
///
/// 패킷 수신([`on_packet`])과 송신할 응답 생성([`poll_send`])으로
/// 상태를 진행시키는 순수 상태 머신.
///
/// [`on_packet`]: Lifecycle::on_packet
/// [`poll_send`]: Lifecycle::poll_send
#[derive(Debug)]
pub struct Lifecycle {
    state: LifecycleState,

    /// 서버측 초기 시퀀스 번호 (SYN-ACK의 seq)
    local_seq: u32,

    /// 클라이언트 SYN의 시퀀스 번호
    peer_seq: u32,

    /// 수신된 DATA 페이로드
    payload: Option<Bytes>,
}

impl Lifecycle {
    /// 새 수명주기 생성 (LISTENING 상태)
    pub fn new(initial_seq_no: u32) -> Self {
        Self {
            state: LifecycleState::Listening,
            local_seq: initial_seq_no,
            peer_seq: 0,
            payload: None,
        }
    }

    /// 현재 상태
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// 종단 상태 도달 여부
    pub fn is_closed(&self) -> bool {
        self.state == LifecycleState::Closed
    }

    /// 다음에 수신을 허용할 패킷 종류 (CLOSED면 None)
    ///
    /// 송신 대기 상태(SYN_RECEIVED, DATA_RECEIVED)에서도 송신 이후
    /// 이어질 수신 기대를 반환한다.
    pub fn expected(&self) -> Option<PacketKind> {
        match self.state {
            LifecycleState::Listening => Some(PacketKind::Syn),
            LifecycleState::SynReceived | LifecycleState::SynAckSent => Some(PacketKind::Ack),
            LifecycleState::Established => Some(PacketKind::Data),
            LifecycleState::DataReceived | LifecycleState::FinSent => Some(PacketKind::FinAck),
            LifecycleState::Closed => None,
        }
    }

    /// 수신 패킷으로 상태 진행
    ///
    /// 플래그가 닫힌 집합 밖이면 InvalidFlags, 기대와 다른 종류면
    /// UnexpectedPacket. 어느 쪽이든 수명주기에는 치명적이다.
    pub fn on_packet(&mut self, packet: &Packet) -> Result<()> {
        if self.state == LifecycleState::Closed {
            return Err(Error::ConnectionClosed);
        }

        let got = packet
            .kind()
            .ok_or(Error::InvalidFlags {
                flags: packet.header.flags,
            })?;

        match (self.state, got) {
            (LifecycleState::Listening, PacketKind::Syn) => {
                self.peer_seq = packet.header.seq_no;
                self.state = LifecycleState::SynReceived;
                Ok(())
            }
            (LifecycleState::SynAckSent, PacketKind::Ack) => {
                let expected_ack = self.local_seq.wrapping_add(1);
                if packet.header.ack_no != expected_ack {
                    warn!(
                        "ACK 번호 불일치: expected {}, got {}",
                        expected_ack, packet.header.ack_no
                    );
                }
                self.state = LifecycleState::Established;
                Ok(())
            }
            (LifecycleState::Established, PacketKind::Data) => {
                self.payload = Some(packet.payload.clone());
                self.state = LifecycleState::DataReceived;
                Ok(())
            }
            (LifecycleState::FinSent, PacketKind::FinAck) => {
                self.state = LifecycleState::Closed;
                Ok(())
            }
            (state, got) => {
                // CLOSED는 위에서 걸러졌으므로 기대값이 항상 존재함
                let expected = self.expected().unwrap_or(got);
                Err(Error::UnexpectedPacket {
                    state,
                    expected,
                    got,
                })
            }
        }
    }

    /// 송신할 응답 패킷 생성 (송신 상태 전이 포함)
    ///
    /// SYN_RECEIVED → SYN_ACK_SENT (SYN-ACK 반환)
    /// DATA_RECEIVED → FIN_SENT (FIN 반환)
    /// 그 외 상태에서는 None.
    pub fn poll_send(&mut self) -> Option<Packet> {
        match self.state {
            LifecycleState::SynReceived => {
                self.state = LifecycleState::SynAckSent;
                // SYN-ACK: ack는 클라이언트 SYN seq + 1
                Some(Packet::syn(self.local_seq, self.peer_seq.wrapping_add(1)))
            }
            LifecycleState::DataReceived => {
                self.state = LifecycleState::FinSent;
                // FIN: seq는 핸드쉐이크 이후의 클라이언트 시퀀스 위치
                Some(Packet::fin(self.peer_seq.wrapping_add(1), 0))
            }
            _ => None,
        }
    }

    /// 수신된 DATA 페이로드 꺼내기
    pub fn take_payload(&mut self) -> Option<Bytes> {
        self.payload.take()
    }
}
