use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

pub const A_SYNC: u32 = 0x434e5953;
pub const A_CNXN: u32 = 0x4e584e43;
pub const A_OPEN: u32 = 0x4e45504f;
pub const A_OKAY: u32 = 0x59414b4f;
pub const A_CLSE: u32 = 0x45534c43;
pub const A_WRTE: u32 = 0x45545257;
pub const A_AUTH: u32 = 0x48545541;

// AUTH packet types, sent in arg0
pub const AUTH_TOKEN: u32 = 1;
pub const AUTH_SIGNATURE: u32 = 2;
pub const AUTH_RSAPUBLICKEY: u32 = 3;

pub const HEADER_LENGTH: usize = 24;

/// One ADB transport packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub command: u32,
    pub arg0: u32,
    pub arg1: u32,
    pub length: u32,
    pub check: u32,
    pub magic: u32,
    pub data: Bytes,
}

impl Packet {
    /// Sum of all payload bytes, truncated to 32 bits.
    pub fn checksum(data: &[u8]) -> u32 {
        data.iter().fold(0u32, |sum, &b| sum.wrapping_add(u32::from(b)))
    }

    pub fn magic_of(command: u32) -> u32 {
        command ^ 0xffff_ffff
    }

    pub fn swap32(n: u32) -> u32 {
        n.swap_bytes()
    }

    /// Serialize a packet with a correct length, checksum and magic.
    pub fn assemble(command: u32, arg0: u32, arg1: u32, data: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LENGTH + data.len());
        buf.put_u32_le(command);
        buf.put_u32_le(arg0);
        buf.put_u32_le(arg1);
        buf.put_u32_le(data.len() as u32);
        buf.put_u32_le(Self::checksum(data));
        buf.put_u32_le(Self::magic_of(command));
        buf.put_slice(data);
        buf.freeze()
    }

    /// Parse a 24 byte header. The payload is filled in separately.
    pub fn from_header(header: &[u8; HEADER_LENGTH]) -> Self {
        let field = |index: usize| {
            let at = index * 4;
            u32::from_le_bytes([header[at], header[at + 1], header[at + 2], header[at + 3]])
        };
        Self {
            command: field(0),
            arg0: field(1),
            arg1: field(2),
            length: field(3),
            check: field(4),
            magic: field(5),
            data: Bytes::new(),
        }
    }

    /// A zero checksum is accepted, newer peers don't compute it.
    pub fn verify_checksum(&self) -> bool {
        self.check == 0 || self.check == Self::checksum(&self.data)
    }

    pub fn verify_magic(&self) -> bool {
        self.magic == Self::magic_of(self.command)
    }

    pub fn type_name(&self) -> Option<&'static str> {
        match self.command {
            A_SYNC => Some("SYNC"),
            A_CNXN => Some("CNXN"),
            A_OPEN => Some("OPEN"),
            A_OKAY => Some("OKAY"),
            A_CLSE => Some("CLSE"),
            A_WRTE => Some("WRTE"),
            A_AUTH => Some("AUTH"),
            _ => None,
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.type_name() {
            Some(name) => write!(f, "{}", name)?,
            None => write!(f, "0x{:08x}", self.command)?,
        }
        write!(
            f,
            " arg0={} arg1={} length={}",
            self.arg0, self.arg1, self.length
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        assert_eq!(Packet::checksum(&[]), 0);
        assert_eq!(Packet::checksum(&[1, 2, 3]), 6);
        assert_eq!(Packet::checksum(&[0xff; 4]), 0x3fc);
    }

    #[test]
    fn test_magic() {
        assert_eq!(Packet::magic_of(A_CNXN), !A_CNXN);
        assert_eq!(Packet::magic_of(0), 0xffff_ffff);
    }

    #[test]
    fn test_swap32() {
        assert_eq!(Packet::swap32(0x0100_0000), 1);
        assert_eq!(Packet::swap32(0x1234_5678), 0x7856_3412);
    }

    #[test]
    fn test_assemble_header() {
        let chunk = Packet::assemble(A_WRTE, 1, 2, b"hi");
        let header: [u8; HEADER_LENGTH] = chunk[..HEADER_LENGTH].try_into().unwrap();
        let packet = Packet::from_header(&header);
        assert_eq!(packet.command, A_WRTE);
        assert_eq!(packet.arg0, 1);
        assert_eq!(packet.arg1, 2);
        assert_eq!(packet.length, 2);
        assert_eq!(packet.check, u32::from(b'h') + u32::from(b'i'));
        assert!(packet.verify_magic());
        assert_eq!(&chunk[HEADER_LENGTH..], b"hi");
    }

    #[test]
    fn test_assemble_without_data() {
        let chunk = Packet::assemble(A_OKAY, 3, 4, &[]);
        assert_eq!(chunk.len(), HEADER_LENGTH);
        assert_eq!(&chunk[12..20], &[0u8; 8]);
    }

    #[test]
    fn test_zero_checksum_is_accepted() {
        let mut packet = Packet::from_header(&[0u8; HEADER_LENGTH]);
        packet.data = Bytes::from_static(b"abc");
        assert!(packet.verify_checksum());
        packet.check = 1;
        assert!(!packet.verify_checksum());
    }

    #[test]
    fn test_display() {
        let header: [u8; HEADER_LENGTH] = Packet::assemble(A_OPEN, 5, 0, b"shell:\0")[..HEADER_LENGTH]
            .try_into()
            .unwrap();
        assert_eq!(
            Packet::from_header(&header).to_string(),
            "OPEN arg0=5 arg1=0 length=7"
        );
    }
}
