use crate::error::{AdbError, Result};
use crate::tcpusb::packet::{Packet, HEADER_LENGTH};
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 16 * 1024;

/// Reassembles packets from arbitrarily split input.
///
/// Alternates between waiting for a 24 byte header and waiting for the
/// body it announces. A bad magic or checksum halts the decoder for good.
#[derive(Debug, Default)]
pub struct PacketDecoder {
    buffer: BytesMut,
    header: Option<Packet>,
    halted: bool,
}

impl PacketDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        if !self.halted {
            self.buffer.extend_from_slice(chunk);
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Bytes waiting for a complete header or body.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// The next complete packet, if one is buffered.
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        if self.halted {
            return Ok(None);
        }
        if self.header.is_none() {
            if self.buffer.len() < HEADER_LENGTH {
                return Ok(None);
            }
            let mut header = [0u8; HEADER_LENGTH];
            self.buffer.copy_to_slice(&mut header);
            let packet = Packet::from_header(&header);
            if !packet.verify_magic() {
                self.halt();
                return Err(AdbError::Magic(packet));
            }
            if packet.length == 0 {
                return Ok(Some(packet));
            }
            self.header = Some(packet);
        }

        let length = self.header.as_ref().map_or(0, |packet| packet.length as usize);
        if self.buffer.len() < length {
            return Ok(None);
        }
        let Some(mut packet) = self.header.take() else {
            return Ok(None);
        };
        packet.data = self.buffer.split_to(length).freeze();
        if !packet.verify_checksum() {
            self.halt();
            return Err(AdbError::Checksum(packet));
        }
        Ok(Some(packet))
    }

    fn halt(&mut self) {
        self.halted = true;
        self.header = None;
        self.buffer.clear();
    }
}

/// Reads packets from a byte stream.
pub struct PacketReader<R> {
    reader: R,
    decoder: PacketDecoder,
    ended: bool,
}

impl<R: AsyncRead + Unpin> PacketReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            decoder: PacketDecoder::new(),
            ended: false,
        }
    }

    /// Next packet, or `None` once the stream ended or the reader halted.
    ///
    /// Cancel safe: input already received stays buffered.
    pub async fn read_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            if let Some(packet) = self.decoder.next_packet()? {
                return Ok(Some(packet));
            }
            if self.ended || self.decoder.is_halted() {
                return Ok(None);
            }
            let mut chunk = BytesMut::with_capacity(READ_CHUNK);
            if self.reader.read_buf(&mut chunk).await? == 0 {
                self.ended = true;
            } else {
                self.decoder.push(&chunk);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tcpusb::packet::{A_CNXN, A_OKAY, A_WRTE};

    fn stream_of(packets: &[bytes::Bytes]) -> Vec<u8> {
        packets.iter().flat_map(|p| p.iter().copied()).collect()
    }

    #[test]
    fn test_header_only_packet() {
        let mut decoder = PacketDecoder::new();
        decoder.push(&Packet::assemble(A_OKAY, 1, 2, &[]));
        let packet = decoder.next_packet().unwrap().unwrap();
        assert_eq!(packet.command, A_OKAY);
        assert!(packet.data.is_empty());
        assert!(decoder.next_packet().unwrap().is_none());
    }

    #[test]
    fn test_byte_by_byte_input() {
        let input = stream_of(&[
            Packet::assemble(A_CNXN, 0x0100_0000, 4096, b"host::\0"),
            Packet::assemble(A_WRTE, 3, 4, b"payload"),
        ]);
        let mut decoder = PacketDecoder::new();
        let mut packets = Vec::new();
        for byte in input {
            decoder.push(&[byte]);
            while let Some(packet) = decoder.next_packet().unwrap() {
                packets.push(packet);
            }
        }
        assert_eq!(packets.len(), 2);
        assert_eq!(&packets[0].data[..], b"host::\0");
        assert_eq!(&packets[1].data[..], b"payload");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_header_split_across_chunks() {
        let input = Packet::assemble(A_OKAY, 5, 6, &[]);
        let mut decoder = PacketDecoder::new();
        decoder.push(&input[..10]);
        assert!(decoder.next_packet().unwrap().is_none());
        decoder.push(&input[10..]);
        let packet = decoder.next_packet().unwrap().unwrap();
        assert_eq!((packet.command, packet.arg0, packet.arg1), (A_OKAY, 5, 6));
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_data_split_after_header() {
        let input = Packet::assemble(A_WRTE, 1, 2, b"0123456789abcd");
        let mut decoder = PacketDecoder::new();
        decoder.push(&input[..10]);
        decoder.push(&input[10..24]);
        assert!(decoder.next_packet().unwrap().is_none());
        decoder.push(&input[24..]);
        let packet = decoder.next_packet().unwrap().unwrap();
        assert_eq!(&packet.data[..], b"0123456789abcd");
    }

    #[test]
    fn test_one_large_chunk() {
        let input = stream_of(&[
            Packet::assemble(A_WRTE, 1, 1, &[1u8; 1000]),
            Packet::assemble(A_OKAY, 1, 1, &[]),
            Packet::assemble(A_WRTE, 1, 1, &[2u8; 10]),
        ]);
        let mut decoder = PacketDecoder::new();
        decoder.push(&input);
        let mut lengths = Vec::new();
        while let Some(packet) = decoder.next_packet().unwrap() {
            lengths.push(packet.data.len());
        }
        assert_eq!(lengths, vec![1000, 0, 10]);
    }

    #[test]
    fn test_bad_magic_halts() {
        let mut chunk = Packet::assemble(A_OKAY, 1, 2, &[]).to_vec();
        chunk[20] ^= 1;
        let mut decoder = PacketDecoder::new();
        decoder.push(&chunk);
        decoder.push(&Packet::assemble(A_OKAY, 1, 2, &[]));
        assert!(matches!(decoder.next_packet(), Err(AdbError::Magic(_))));
        assert!(decoder.next_packet().unwrap().is_none());
    }

    #[test]
    fn test_bad_checksum() {
        let mut chunk = Packet::assemble(A_WRTE, 1, 2, b"abc").to_vec();
        let last = chunk.len() - 1;
        chunk[last] = b'd';
        let mut decoder = PacketDecoder::new();
        decoder.push(&chunk);
        match decoder.next_packet() {
            Err(AdbError::Checksum(packet)) => assert_eq!(&packet.data[..], b"abd"),
            other => panic!("expected checksum error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reader_over_stream() {
        let input = stream_of(&[
            Packet::assemble(A_WRTE, 1, 2, b"first"),
            Packet::assemble(A_WRTE, 1, 2, b"second"),
        ]);
        let mut reader = PacketReader::new(&input[..]);
        assert_eq!(&reader.read_packet().await.unwrap().unwrap().data[..], b"first");
        assert_eq!(&reader.read_packet().await.unwrap().unwrap().data[..], b"second");
        assert!(reader.read_packet().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_truncated_stream_ends_quietly() {
        let input = Packet::assemble(A_WRTE, 1, 2, b"cut short");
        let mut reader = PacketReader::new(&input[..input.len() - 3]);
        assert!(reader.read_packet().await.unwrap().is_none());
    }
}
