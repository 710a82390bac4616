//! HSP 서버 (수신자) - Handshake Stream Protocol
//!
//! TCP 스트림 위에서 명시적 핸드쉐이크/종료 수명주기를 수행하는 서버
//! - 연결 하나를 수락하고 SYN → SYN-ACK → ACK → DATA → FIN → FIN-ACK 순서 진행
//! - 순서 위반, 스트림 절단은 즉시 수명주기 실패
//!
//! 사용법:
//!   cargo run --release --bin hsp-server -- [OPTIONS]
//!
//! 예시:
//!   # 기본 실행 (연결 하나 처리 후 종료)
//!   cargo run --release --bin hsp-server -- --bind 0.0.0.0:9000
//!
//!   # 연속 수락 모드 + 수신 타임아웃
//!   cargo run --release --bin hsp-server -- -b 0.0.0.0:9000 --persist --timeout 5000

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use hsp::{Config, Connection};

/// 서버 설정
struct ServerConfig {
    bind_addr: SocketAddr,
    persist: bool,
    config: Config,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9000".parse().unwrap(),
            persist: false,
            config: Config::default(),
        }
    }
}

fn parse_args() -> ServerConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.bind_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--seq" => {
                if i + 1 < args.len() {
                    config.config.initial_seq_no =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--timeout" | "-t" => {
                if i + 1 < args.len() {
                    config.config.read_timeout_ms =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--persist" | "-p" => {
                config.persist = true;
            }
            "--help" | "-h" => {
                println!(
                    r#"HSP Server - Handshake Stream Protocol 서버

TCP 스트림 위의 명시적 SYN/ACK/FIN 핸드쉐이크 프로토콜 서버
- 연결당 정확히 한 번의 핸드쉐이크, 데이터 교환, 종료 수행
- 기대와 다른 패킷이 오면 수명주기 실패로 보고

사용법:
  cargo run --release --bin hsp-server -- [OPTIONS]

옵션:
  -b, --bind <ADDR>     바인드 주소 (기본: 0.0.0.0:9000)
  --seq <N>             서버 초기 시퀀스 번호 (기본: 0)
  -t, --timeout <MS>    패킷 수신 타임아웃 밀리초 (기본: 0 = 무한 대기)
  -p, --persist         연결 하나 처리 후 종료하지 않고 계속 수락
  -h, --help            이 도움말 출력

예시:
  # 연결 하나 처리 후 종료
  cargo run --release --bin hsp-server -- --bind 0.0.0.0:9000

  # 5초 수신 타임아웃 + 연속 수락
  cargo run --release --bin hsp-server -- -b 0.0.0.0:9000 -t 5000 --persist
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

    let server_config = parse_args();

    info!("HSP Server starting...");
    info!("Bind address: {}", server_config.bind_addr);
    info!("Initial seq no: {}", server_config.config.initial_seq_no);
    if server_config.config.read_timeout_ms > 0 {
        info!("Read timeout: {} ms", server_config.config.read_timeout_ms);
    }

    let listener = TcpListener::bind(server_config.bind_addr).await?;
    info!("Server listening on {}", server_config.bind_addr);

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        info!("Connection accepted from: {}", peer_addr);

        // 연결마다 독립적인 드라이버와 상태 (공유 상태 없음)
        let connection = Connection::with_config(stream, server_config.config.clone());

        match connection.run().await {
            Ok(report) => {
                info!("Lifecycle complete for {}", peer_addr);
                info!("  Payload: {} bytes", report.payload.len());
                info!("  Payload text: {:?}", String::from_utf8_lossy(&report.payload));
                info!(
                    "  Packets: {} received / {} sent",
                    report.stats.packets_received, report.stats.packets_sent
                );
                info!("  Elapsed: {:.2}ms", report.stats.elapsed().as_secs_f64() * 1000.0);
            }
            Err(e) => {
                warn!("Lifecycle failed for {}: {}", peer_addr, e);
                if !server_config.persist {
                    // 단일 연결 모드에서는 실패를 종료 코드로 전달
                    return Err(e.into());
                }
            }
        }

        if !server_config.persist {
            break;
        }
    }

    Ok(())
}
