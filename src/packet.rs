//! 패킷 정의와 와이어 코덱
//!
//! 스트림 위에서 교환되는 모든 단위는 [`Packet`] 하나다.
//! - 고정 12바이트 헤더 + `payload_len` 바이트 페이로드
//! - 모든 멀티바이트 정수는 **빅엔디안** (네트워크 바이트 순서)
//! - 코덱은 호출 간 상태를 유지하지 않음 (스트림 IO 외 부수효과 없음)
//!
//! ```text
//! +--------------------+--------------------+
//! |    seq_no (4)      |    ack_no (4)      |
//! +----------+---------+----------+---------+
//! | len (2)  | flags(2)| payload ...        |
//! +----------+---------+--------------------+
//! ```
//!
//! 플래그 값은 닫힌 집합이며 정확히 일치해야 분류된다.
//! SYN-ACK은 별도 플래그 조합이 아니라 ack 필드를 채운 SYN 패킷이다.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Result, HEADER_SIZE, MAX_PAYLOAD_SIZE};

/// 플래그 상수 (정확히 일치해야 함, 비트 OR 해석 없음)
pub mod flags {
    /// 연결 수립 요청 (SYN-ACK도 이 값 사용)
    pub const SYN: u16 = 0x02;
    /// 핸드쉐이크 확인
    pub const ACK: u16 = 0x10;
    /// 데이터 패킷 (페이로드 필수)
    pub const DATA: u16 = 0x00;
    /// 연결 종료 요청
    pub const FIN: u16 = 0x01;
    /// 종료 확인
    pub const FIN_ACK: u16 = 0x11;
}

// 헤더 내 각 필드의 바이트 오프셋
const OFF_SEQ: usize = 0;
const OFF_ACK: usize = 4;
const OFF_LEN: usize = 8;
const OFF_FLAGS: usize = 10;

/// 패킷 종류 (다섯 가지 플래그 조합 각각에 대응)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Syn,
    Ack,
    Data,
    Fin,
    FinAck,
}

impl std::fmt::Display for PacketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PacketKind::Syn => "SYN",
            PacketKind::Ack => "ACK",
            PacketKind::Data => "DATA",
            PacketKind::Fin => "FIN",
            PacketKind::FinAck => "FIN-ACK",
        };
        write!(f, "{name}")
    }
}

/// 패킷 헤더
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// 시퀀스 번호
    pub seq_no: u32,

    /// 확인(acknowledgment) 번호
    pub ack_no: u32,

    /// 페이로드 길이 (0 ..= MAX_PAYLOAD_SIZE)
    pub payload_len: u16,

    /// 플래그 (닫힌 집합 중 하나)
    pub flags: u16,
}

impl PacketHeader {
    /// 플래그로부터 패킷 종류 분류
    ///
    /// 정의된 다섯 값 외에는 None.
    /// DATA는 payload_len > 0 이어야 DATA로 분류됨.
    pub fn kind(&self) -> Option<PacketKind> {
        match self.flags {
            flags::SYN => Some(PacketKind::Syn),
            flags::ACK => Some(PacketKind::Ack),
            flags::FIN => Some(PacketKind::Fin),
            flags::FIN_ACK => Some(PacketKind::FinAck),
            flags::DATA if self.payload_len > 0 => Some(PacketKind::Data),
            _ => None,
        }
    }
}

/// 프로토콜 패킷 (헤더 + 페이로드)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// 패킷 헤더
    pub header: PacketHeader,

    /// 페이로드 (DATA 패킷에서만 의미 있음)
    pub payload: Bytes,
}

impl Packet {
    /// 새 패킷 생성 (payload_len은 페이로드에서 계산)
    pub fn new(seq_no: u32, ack_no: u32, flags: u16, payload: Bytes) -> Self {
        Self {
            header: PacketHeader {
                seq_no,
                ack_no,
                payload_len: payload.len() as u16,
                flags,
            },
            payload,
        }
    }

    /// SYN 패킷 생성 (SYN-ACK은 ack를 채운 SYN)
    pub fn syn(seq_no: u32, ack_no: u32) -> Self {
        Self::new(seq_no, ack_no, flags::SYN, Bytes::new())
    }

    /// ACK 패킷 생성
    pub fn ack(seq_no: u32, ack_no: u32) -> Self {
        Self::new(seq_no, ack_no, flags::ACK, Bytes::new())
    }

    /// FIN 패킷 생성
    pub fn fin(seq_no: u32, ack_no: u32) -> Self {
        Self::new(seq_no, ack_no, flags::FIN, Bytes::new())
    }

    /// FIN-ACK 패킷 생성
    pub fn fin_ack(seq_no: u32, ack_no: u32) -> Self {
        Self::new(seq_no, ack_no, flags::FIN_ACK, Bytes::new())
    }

    /// DATA 패킷 생성 (페이로드 그대로 복사)
    pub fn data(seq_no: u32, ack_no: u32, payload: Bytes) -> Self {
        Self::new(seq_no, ack_no, flags::DATA, payload)
    }

    /// 패킷 종류 분류
    pub fn kind(&self) -> Option<PacketKind> {
        self.header.kind()
    }

    pub fn is_syn(&self) -> bool {
        self.header.flags == flags::SYN
    }

    pub fn is_ack(&self) -> bool {
        self.header.flags == flags::ACK
    }

    pub fn is_fin(&self) -> bool {
        self.header.flags == flags::FIN
    }

    pub fn is_fin_ack(&self) -> bool {
        self.header.flags == flags::FIN_ACK
    }

    /// DATA 판정은 플래그 일치에 더해 페이로드가 있어야 함
    pub fn is_data(&self) -> bool {
        self.header.flags == flags::DATA && self.header.payload_len > 0
    }

    /// 패킷을 바이트로 직렬화
    ///
    /// payload_len이 MAX_PAYLOAD_SIZE를 넘거나 실제 페이로드 길이와
    /// 다르면 IO 없이 즉시 실패한다.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let len = self.header.payload_len as usize;

        if len > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                len,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        if len != self.payload.len() {
            return Err(Error::PayloadLengthMismatch {
                declared: self.header.payload_len,
                actual: self.payload.len(),
            });
        }

        let mut buf = vec![0u8; HEADER_SIZE + len];
        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.header.seq_no.to_be_bytes());
        buf[OFF_ACK..OFF_ACK + 4].copy_from_slice(&self.header.ack_no.to_be_bytes());
        buf[OFF_LEN..OFF_LEN + 2].copy_from_slice(&self.header.payload_len.to_be_bytes());
        buf[OFF_FLAGS..OFF_FLAGS + 2].copy_from_slice(&self.header.flags.to_be_bytes());
        buf[HEADER_SIZE..].copy_from_slice(&self.payload);

        Ok(buf)
    }

    /// 바이트 슬라이스에서 패킷 하나를 역직렬화
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::TruncatedStream { during: "header" });
        }

        let header = decode_header(&buf[..HEADER_SIZE]);
        let len = header.payload_len as usize;

        if len > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                len,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        if buf.len() < HEADER_SIZE + len {
            return Err(Error::TruncatedStream { during: "payload" });
        }
        if buf.len() > HEADER_SIZE + len {
            return Err(Error::PayloadLengthMismatch {
                declared: header.payload_len,
                actual: buf.len() - HEADER_SIZE,
            });
        }

        Ok(Self {
            header,
            payload: Bytes::copy_from_slice(&buf[HEADER_SIZE..]),
        })
    }

    /// 스트림에서 패킷 하나를 블로킹 수신 (헤더 → 페이로드 순)
    ///
    /// 헤더나 페이로드 도중 스트림이 닫히면 TruncatedStream.
    pub async fn read_from<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Self> {
        let mut header_buf = [0u8; HEADER_SIZE];
        stream
            .read_exact(&mut header_buf)
            .await
            .map_err(|e| map_eof(e, "header"))?;

        let header = decode_header(&header_buf);
        let len = header.payload_len as usize;

        if len > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut payload = vec![0u8; len];
        stream
            .read_exact(&mut payload)
            .await
            .map_err(|e| map_eof(e, "payload"))?;

        Ok(Self {
            header,
            payload: Bytes::from(payload),
        })
    }

    /// 패킷 하나를 스트림에 기록
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut W) -> Result<()> {
        let buf = self.encode()?;
        stream.write_all(&buf).await?;
        Ok(())
    }
}

fn decode_header(buf: &[u8]) -> PacketHeader {
    PacketHeader {
        seq_no: u32::from_be_bytes(buf[OFF_SEQ..OFF_SEQ + 4].try_into().unwrap()),
        ack_no: u32::from_be_bytes(buf[OFF_ACK..OFF_ACK + 4].try_into().unwrap()),
        payload_len: u16::from_be_bytes(buf[OFF_LEN..OFF_LEN + 2].try_into().unwrap()),
        flags: u16::from_be_bytes(buf[OFF_FLAGS..OFF_FLAGS + 2].try_into().unwrap()),
    }
}

fn map_eof(e: std::io::Error, during: &'static str) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::TruncatedStream { during }
    } else {
        Error::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_data_packet() {
        let packet = Packet::data(101, 1, Bytes::from_static(b"hello"));
        let bytes = packet.encode().unwrap();
        let restored = Packet::decode(&bytes).unwrap();

        assert_eq!(packet, restored);
        assert_eq!(restored.header.payload_len, 5);
        assert_eq!(restored.payload.as_ref(), b"hello");
    }

    #[test]
    fn test_roundtrip_control_packets() {
        for packet in [
            Packet::syn(100, 0),
            Packet::ack(101, 1),
            Packet::fin(101, 0),
            Packet::fin_ack(102, 102),
        ] {
            let restored = Packet::decode(&packet.encode().unwrap()).unwrap();
            assert_eq!(packet, restored);
            assert_eq!(restored.header.payload_len, 0);
        }
    }

    #[test]
    fn test_encode_max_payload() {
        let packet = Packet::data(1, 0, Bytes::from(vec![0xAB; MAX_PAYLOAD_SIZE]));
        let bytes = packet.encode().unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_encode_over_max_payload() {
        let packet = Packet::data(1, 0, Bytes::from(vec![0xAB; MAX_PAYLOAD_SIZE + 1]));
        let err = packet.encode().unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { len, .. } if len == MAX_PAYLOAD_SIZE + 1));
    }

    #[test]
    fn test_encode_length_mismatch() {
        let mut packet = Packet::data(1, 0, Bytes::from_static(b"abc"));
        packet.header.payload_len = 7;
        let err = packet.encode().unwrap_err();
        assert!(matches!(
            err,
            Error::PayloadLengthMismatch {
                declared: 7,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_classification_exclusive() {
        // 정의된 다섯 값 각각에 대해 정확히 하나의 판정만 참
        let cases = [
            (Packet::syn(0, 0), PacketKind::Syn),
            (Packet::ack(0, 0), PacketKind::Ack),
            (Packet::data(0, 0, Bytes::from_static(b"x")), PacketKind::Data),
            (Packet::fin(0, 0), PacketKind::Fin),
            (Packet::fin_ack(0, 0), PacketKind::FinAck),
        ];

        for (packet, expected) in cases {
            assert_eq!(packet.kind(), Some(expected));
            let hits = [
                packet.is_syn(),
                packet.is_ack(),
                packet.is_data(),
                packet.is_fin(),
                packet.is_fin_ack(),
            ]
            .iter()
            .filter(|&&b| b)
            .count();
            assert_eq!(hits, 1, "{expected}는 단 하나의 판정만 참이어야 함");
        }
    }

    #[test]
    fn test_unknown_flags_classify_nothing() {
        for foreign in [0x03u16, 0x12, 0x20, 0xFF, 0xFFFF] {
            let packet = Packet::new(0, 0, foreign, Bytes::new());
            assert_eq!(packet.kind(), None);
            assert!(!packet.is_syn());
            assert!(!packet.is_ack());
            assert!(!packet.is_data());
            assert!(!packet.is_fin());
            assert!(!packet.is_fin_ack());
        }
    }

    #[test]
    fn test_empty_data_is_not_data() {
        // flags=0x00 이라도 페이로드가 없으면 DATA가 아님
        let packet = Packet::new(5, 0, flags::DATA, Bytes::new());
        assert_eq!(packet.kind(), None);
        assert!(!packet.is_data());
    }

    #[test]
    fn test_decode_truncated_header() {
        let err = Packet::decode(&[0u8; HEADER_SIZE - 1]).unwrap_err();
        assert!(matches!(err, Error::TruncatedStream { during: "header" }));
    }

    #[test]
    fn test_decode_truncated_payload() {
        let mut bytes = Packet::data(1, 0, Bytes::from_static(b"data")).encode().unwrap();
        bytes.pop();
        let err = Packet::decode(&bytes).unwrap_err();
        assert!(matches!(err, Error::TruncatedStream { during: "payload" }));
    }

    #[test]
    fn test_big_endian_on_wire() {
        let packet = Packet::new(0x0102_0304, 0x0506_0708, flags::ACK, Bytes::new());
        let bytes = packet.encode().unwrap();
        assert_eq!(&bytes[0..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&bytes[4..8], &[0x05, 0x06, 0x07, 0x08]);
        assert_eq!(&bytes[8..10], &[0x00, 0x00]);
        assert_eq!(&bytes[10..12], &[0x00, 0x10]);
    }

    #[test]
    fn test_header_size_constant() {
        // seq(4) + ack(4) + payload_len(2) + flags(2) = 12
        assert_eq!(HEADER_SIZE, 12);
        let bytes = Packet::syn(0, 0).encode().unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
    }

    #[tokio::test]
    async fn test_read_from_stream() {
        let packet = Packet::data(101, 1, Bytes::from_static(b"hello"));
        let bytes = packet.encode().unwrap();

        let mut stream = bytes.as_slice();
        let restored = Packet::read_from(&mut stream).await.unwrap();
        assert_eq!(packet, restored);
    }

    #[tokio::test]
    async fn test_read_from_truncated_stream() {
        let bytes = Packet::data(1, 0, Bytes::from_static(b"hello"))
            .encode()
            .unwrap();

        // 헤더 도중 절단
        let mut stream = &bytes[..HEADER_SIZE - 3];
        let err = Packet::read_from(&mut stream).await.unwrap_err();
        assert!(matches!(err, Error::TruncatedStream { during: "header" }));

        // 페이로드 도중 절단
        let mut stream = &bytes[..HEADER_SIZE + 2];
        let err = Packet::read_from(&mut stream).await.unwrap_err();
        assert!(matches!(err, Error::TruncatedStream { during: "payload" }));
    }
}
