//! 연결 드라이버
//!
//! 연결된 엔드포인트 하나를 독점 소유하고, 코덱으로 패킷을 주고받으며
//! 상태 머신을 CLOSED까지 진행시킨다.
//!
//! - 호출 하나가 엔드포인트 하나의 수명주기를 정확히 한 번 처리
//! - 재시도 없음, 동시성 없음. 한 번에 하나의 송신/수신만 수행
//! - 성공/위반/IO 실패 어느 경로로 끝나든 엔드포인트는 반드시 종료됨

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::packet::Packet;
use crate::state::Lifecycle;
use crate::stats::LifecycleStats;
use crate::{Config, Error, Result};

/// 수명주기 성공 결과
#[derive(Debug, Clone)]
pub struct LifecycleReport {
    /// 수신된 DATA 페이로드
    pub payload: Bytes,

    /// 수명주기 통계
    pub stats: LifecycleStats,
}

/// 엔드포인트 하나의 수명주기를 담당하는 드라이버
pub struct Connection<S> {
    stream: S,
    config: Config,
    machine: Lifecycle,
    stats: LifecycleStats,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    /// 기본 설정으로 드라이버 생성
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, Config::default())
    }

    /// 설정을 지정하여 드라이버 생성
    pub fn with_config(stream: S, config: Config) -> Self {
        Self {
            stream,
            machine: Lifecycle::new(config.initial_seq_no),
            config,
            stats: LifecycleStats::new(),
        }
    }

    /// 수명주기 전체를 CLOSED까지 실행
    ///
    /// 어떤 경로로 끝나든 반환 전에 엔드포인트를 종료한다.
    /// (이미 닫힌 엔드포인트에 대한 종료는 무해하게 무시됨)
    pub async fn run(mut self) -> Result<LifecycleReport> {
        let result = self.drive().await;

        if let Err(e) = &result {
            warn!("수명주기 실패: state={}, error={}", self.machine.state(), e);
        }

        let _ = self.stream.shutdown().await;
        result
    }

    async fn drive(&mut self) -> Result<LifecycleReport> {
        info!("수명주기 시작: state={}", self.machine.state());

        loop {
            while let Some(packet) = self.machine.poll_send() {
                self.send(&packet).await?;
            }

            if self.machine.is_closed() {
                break;
            }

            let packet = self.recv().await?;
            self.machine.on_packet(&packet)?;
        }

        let payload = self.machine.take_payload().unwrap_or_default();
        info!(
            "수명주기 완료: recv {} / sent {} packets, payload {} bytes, {:.2}ms",
            self.stats.packets_received,
            self.stats.packets_sent,
            payload.len(),
            self.stats.elapsed().as_secs_f64() * 1000.0
        );

        Ok(LifecycleReport {
            payload,
            stats: self.stats.clone(),
        })
    }

    async fn recv(&mut self) -> Result<Packet> {
        let packet = match self.config.read_timeout() {
            Some(limit) => {
                match tokio::time::timeout(limit, Packet::read_from(&mut self.stream)).await {
                    Ok(read) => read?,
                    Err(_) => {
                        return Err(Error::ReadTimeout {
                            state: self.machine.state(),
                        })
                    }
                }
            }
            None => Packet::read_from(&mut self.stream).await?,
        };

        self.stats.record_received(&packet);
        self.log_packet("recv", &packet);
        Ok(packet)
    }

    async fn send(&mut self, packet: &Packet) -> Result<()> {
        packet.write_to(&mut self.stream).await?;
        self.stats.record_sent(packet);
        self.log_packet("send", packet);
        Ok(())
    }

    /// 패킷 분류와 헤더 필드를 관찰 가능한 로그로 남김
    fn log_packet(&self, direction: &str, packet: &Packet) {
        let kind = match packet.kind() {
            Some(kind) => kind.to_string(),
            None => format!("UNKNOWN(0x{:04X})", packet.header.flags),
        };

        if packet.is_data() && self.config.log_payload {
            info!(
                "{} {}: seq={} ack={} len={} payload={:?}",
                direction,
                kind,
                packet.header.seq_no,
                packet.header.ack_no,
                packet.header.payload_len,
                String::from_utf8_lossy(&packet.payload)
            );
        } else {
            info!(
                "{} {}: seq={} ack={} len={}",
                direction, kind, packet.header.seq_no, packet.header.ack_no, packet.header.payload_len
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketKind;
    use crate::state::LifecycleState;
    use tokio::io::AsyncReadExt;

    async fn expect_eof<R: AsyncRead + Unpin>(stream: &mut R) {
        let mut buf = [0u8; 1];
        assert_eq!(stream.read(&mut buf).await.unwrap(), 0, "엔드포인트가 닫혀 있어야 함");
    }

    #[tokio::test]
    async fn test_run_completes_full_lifecycle() {
        let (server_side, mut client_side) = tokio::io::duplex(4096);
        let handle = tokio::spawn(Connection::new(server_side).run());

        // 클라이언트 측 스크립트 (SYN seq=100 시나리오)
        Packet::syn(100, 0).write_to(&mut client_side).await.unwrap();

        let syn_ack = Packet::read_from(&mut client_side).await.unwrap();
        assert!(syn_ack.is_syn());
        assert_eq!(syn_ack.header.seq_no, 0);
        assert_eq!(syn_ack.header.ack_no, 101);

        Packet::ack(101, 1).write_to(&mut client_side).await.unwrap();
        Packet::data(101, 1, Bytes::from_static(b"hello"))
            .write_to(&mut client_side)
            .await
            .unwrap();

        let fin = Packet::read_from(&mut client_side).await.unwrap();
        assert!(fin.is_fin());
        assert_eq!(fin.header.seq_no, 101);
        assert_eq!(fin.header.ack_no, 0);

        Packet::fin_ack(102, 102).write_to(&mut client_side).await.unwrap();

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.payload.as_ref(), b"hello");
        assert_eq!(report.stats.packets_received, 4);
        assert_eq!(report.stats.packets_sent, 2);

        // 성공 경로에서 엔드포인트 종료 확인
        expect_eof(&mut client_side).await;
    }

    #[tokio::test]
    async fn test_run_rejects_out_of_order_packet() {
        let (server_side, mut client_side) = tokio::io::duplex(4096);
        let handle = tokio::spawn(Connection::new(server_side).run());

        Packet::syn(100, 0).write_to(&mut client_side).await.unwrap();
        let _syn_ack = Packet::read_from(&mut client_side).await.unwrap();

        // ACK 자리에 FIN
        Packet::fin(101, 0).write_to(&mut client_side).await.unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedPacket {
                state: LifecycleState::SynAckSent,
                expected: PacketKind::Ack,
                got: PacketKind::Fin,
            }
        ));

        // 실패 경로에서도 엔드포인트 종료 확인
        expect_eof(&mut client_side).await;
    }

    #[tokio::test]
    async fn test_run_fails_on_truncated_stream() {
        let (server_side, mut client_side) = tokio::io::duplex(4096);
        let handle = tokio::spawn(Connection::new(server_side).run());

        Packet::syn(100, 0).write_to(&mut client_side).await.unwrap();
        let _syn_ack = Packet::read_from(&mut client_side).await.unwrap();

        // ACK 대기 중 연결 끊김
        drop(client_side);

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::TruncatedStream { during: "header" }));
    }

    #[tokio::test]
    async fn test_run_rejects_unknown_flags() {
        let (server_side, mut client_side) = tokio::io::duplex(4096);
        let handle = tokio::spawn(Connection::new(server_side).run());

        Packet::new(0, 0, 0x1F, Bytes::new())
            .write_to(&mut client_side)
            .await
            .unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::InvalidFlags { flags: 0x1F }));
        expect_eof(&mut client_side).await;
    }

    #[tokio::test]
    async fn test_read_timeout_elapses() {
        let (server_side, _client_side) = tokio::io::duplex(4096);
        let config = Config {
            read_timeout_ms: 50,
            ..Config::default()
        };
        let err = Connection::with_config(server_side, config)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ReadTimeout {
                state: LifecycleState::Listening
            }
        ));
    }

    #[tokio::test]
    async fn test_peer_shutdown_after_script_is_clean() {
        let (server_side, mut client_side) = tokio::io::duplex(4096);
        let handle = tokio::spawn(Connection::new(server_side).run());

        Packet::syn(100, 0).write_to(&mut client_side).await.unwrap();
        let _syn_ack = Packet::read_from(&mut client_side).await.unwrap();
        Packet::ack(101, 1).write_to(&mut client_side).await.unwrap();
        Packet::data(101, 1, Bytes::from_static(b"hi"))
            .write_to(&mut client_side)
            .await
            .unwrap();
        let _fin = Packet::read_from(&mut client_side).await.unwrap();
        Packet::fin_ack(102, 102).write_to(&mut client_side).await.unwrap();

        // 클라이언트가 먼저 닫아도 결과는 변하지 않음
        client_side.shutdown().await.unwrap();
        // 이미 닫힌 쪽에 다시 종료를 호출해도 에러가 아님
        client_side.shutdown().await.unwrap();

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.payload.as_ref(), b"hi");
    }

    #[tokio::test]
    async fn test_custom_initial_seq_in_syn_ack() {
        let (server_side, mut client_side) = tokio::io::duplex(4096);
        let config = Config {
            initial_seq_no: 7777,
            ..Config::default()
        };
        let handle = tokio::spawn(Connection::with_config(server_side, config).run());

        Packet::syn(42, 0).write_to(&mut client_side).await.unwrap();
        let syn_ack = Packet::read_from(&mut client_side).await.unwrap();
        assert_eq!(syn_ack.header.seq_no, 7777);
        assert_eq!(syn_ack.header.ack_no, 43);

        drop(client_side);
        let _ = handle.await.unwrap();
    }
}
