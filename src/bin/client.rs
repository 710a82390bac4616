//! HSP 클라이언트 (개시자) - Handshake Stream Protocol
//!
//! 서버에 접속해 수명주기의 반대편 절반을 수행하는 클라이언트
//! - SYN 송신 → SYN-ACK 수신 → ACK 송신 → DATA 송신 → FIN 수신 → FIN-ACK 송신
//!
//! 사용법:
//!   cargo run --release --bin hsp-client -- [OPTIONS]
//!
//! 예시:
//!   # 기본 메시지 전송
//!   cargo run --release --bin hsp-client -- --server 127.0.0.1:9000
//!
//!   # 시퀀스 번호와 메시지 지정
//!   cargo run --release --bin hsp-client -- -s 127.0.0.1:9000 --seq 100 -m "hello"

use std::net::SocketAddr;

use bytes::Bytes;
use rand::Rng;
use tokio::net::TcpStream;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use hsp::packet::Packet;
use hsp::MAX_PAYLOAD_SIZE;

/// 클라이언트 설정
struct ClientConfig {
    server_addr: SocketAddr,
    initial_seq_no: Option<u32>,
    message: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:9000".parse().unwrap(),
            initial_seq_no: None,
            message: "hello".to_string(),
        }
    }
}

fn parse_args() -> ClientConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ClientConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--server" | "-s" => {
                if i + 1 < args.len() {
                    config.server_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--seq" => {
                if i + 1 < args.len() {
                    config.initial_seq_no =
                        Some(args[i + 1].parse().expect("유효한 숫자 필요"));
                    i += 1;
                }
            }
            "--message" | "-m" => {
                if i + 1 < args.len() {
                    config.message = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!(
                    r#"HSP Client - Handshake Stream Protocol 클라이언트

TCP 스트림 위의 명시적 SYN/ACK/FIN 핸드쉐이크 프로토콜 클라이언트
- 핸드쉐이크 후 DATA 패킷 하나를 보내고 서버 주도 종료를 따름

사용법:
  cargo run --release --bin hsp-client -- [OPTIONS]

옵션:
  -s, --server <ADDR>   서버 주소 (기본: 127.0.0.1:9000)
  --seq <N>             초기 시퀀스 번호 (기본: 랜덤)
  -m, --message <TEXT>  DATA 페이로드로 보낼 메시지 (기본: "hello")
  -h, --help            이 도움말 출력

예시:
  # 기본 전송
  cargo run --release --bin hsp-client -- --server 192.168.1.100:9000

  # 고정 시퀀스 번호로 전송
  cargo run --release --bin hsp-client -- -s 127.0.0.1:9000 --seq 100 -m "hello"
"#
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let client_config = parse_args();

    if client_config.message.len() > MAX_PAYLOAD_SIZE {
        return Err(format!(
            "메시지가 너무 큼: {} bytes (최대 {})",
            client_config.message.len(),
            MAX_PAYLOAD_SIZE
        )
        .into());
    }

    // 초기 시퀀스 번호 (지정 없으면 랜덤)
    let isn = client_config
        .initial_seq_no
        .unwrap_or_else(|| rand::thread_rng().gen_range(1..=0x7FFF_FFFF));

    info!("HSP Client starting...");
    info!("Server address: {}", client_config.server_addr);
    info!("Initial seq no: {}", isn);

    let mut stream = TcpStream::connect(client_config.server_addr).await?;
    info!("Connected to {}", client_config.server_addr);

    // === Phase 1: 핸드쉐이크 (SYN → SYN-ACK → ACK) ===
    let syn = Packet::syn(isn, 0);
    syn.write_to(&mut stream).await?;
    info!("SYN sent: seq={}", isn);

    let syn_ack = Packet::read_from(&mut stream).await?;
    if !syn_ack.is_syn() {
        return Err(format!(
            "핸드쉐이크 실패: SYN-ACK 대신 flags=0x{:04X} 수신",
            syn_ack.header.flags
        )
        .into());
    }
    info!(
        "SYN-ACK received: seq={} ack={}",
        syn_ack.header.seq_no, syn_ack.header.ack_no
    );
    if syn_ack.header.ack_no != isn.wrapping_add(1) {
        warn!(
            "SYN-ACK 번호 불일치: expected ack {}, got {}",
            isn.wrapping_add(1),
            syn_ack.header.ack_no
        );
    }

    let ack = Packet::ack(isn.wrapping_add(1), syn_ack.header.seq_no.wrapping_add(1));
    ack.write_to(&mut stream).await?;
    info!(
        "ACK sent: seq={} ack={}",
        ack.header.seq_no, ack.header.ack_no
    );

    // === Phase 2: 데이터 전송 ===
    let payload = Bytes::from(client_config.message.clone());
    let data = Packet::data(
        isn.wrapping_add(1),
        syn_ack.header.seq_no.wrapping_add(1),
        payload,
    );
    data.write_to(&mut stream).await?;
    info!(
        "DATA sent: {} bytes ({:?})",
        data.header.payload_len, client_config.message
    );

    // === Phase 3: 종료 (FIN 수신 → FIN-ACK 송신) ===
    let fin = Packet::read_from(&mut stream).await?;
    if !fin.is_fin() {
        return Err(format!(
            "종료 실패: FIN 대신 flags=0x{:04X} 수신",
            fin.header.flags
        )
        .into());
    }
    info!("FIN received: seq={} ack={}", fin.header.seq_no, fin.header.ack_no);

    let fin_ack = Packet::fin_ack(isn.wrapping_add(1), fin.header.seq_no.wrapping_add(1));
    fin_ack.write_to(&mut stream).await?;
    info!(
        "FIN-ACK sent: seq={} ack={}",
        fin_ack.header.seq_no, fin_ack.header.ack_no
    );

    info!("Lifecycle complete");

    Ok(())
}
