use crate::error::{AdbError, Result};
use bytes::{BufMut, Bytes, BytesMut};

// Reply tokens
pub const OKAY: &str = "OKAY";
pub const FAIL: &str = "FAIL";

// Sync sub-protocol tokens
pub const STAT: &str = "STAT";
pub const STA2: &str = "STA2";
pub const LIST: &str = "LIST";
pub const DENT: &str = "DENT";
pub const RECV: &str = "RECV";
pub const DATA: &str = "DATA";
pub const DONE: &str = "DONE";
pub const SEND: &str = "SEND";
pub const QUIT: &str = "QUIT";

/// Largest length that fits the 4 hex digit prefix.
pub const MAX_LENGTH: usize = 0xFFFF;

// File mode constants, from `man 2 stat`
pub const S_IFMT: u32 = 0o170000; // bit mask for the file type bit field
pub const S_IFSOCK: u32 = 0o140000; // socket
pub const S_IFLNK: u32 = 0o120000; // symbolic link
pub const S_IFREG: u32 = 0o100000; // regular file
pub const S_IFBLK: u32 = 0o060000; // block device
pub const S_IFDIR: u32 = 0o040000; // directory
pub const S_IFCHR: u32 = 0o020000; // character device
pub const S_IFIFO: u32 = 0o010000; // FIFO

/// Parse a 4 character hex length prefix. Case-insensitive.
pub fn decode_length(length: &str) -> Result<u32> {
    let digits = length.as_bytes();
    if digits.len() != 4 || !digits.iter().all(u8::is_ascii_hexdigit) {
        return Err(AdbError::unexpected(length, "a 4 digit hex length"));
    }
    u32::from_str_radix(length, 16)
        .map_err(|_| AdbError::unexpected(length, "a 4 digit hex length"))
}

/// Format a length as 4 uppercase hex digits.
pub fn encode_length(length: usize) -> String {
    format!("{:04X}", length)
}

/// Prefix a payload with its encoded length.
pub fn encode_data(data: impl AsRef<[u8]>) -> Bytes {
    let data = data.as_ref();
    let mut buf = BytesMut::with_capacity(4 + data.len());
    buf.put_slice(encode_length(data.len()).as_bytes());
    buf.put_slice(data);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_length() {
        assert_eq!(decode_length("0x0046").ok(), None);
        assert_eq!(decode_length("0046").unwrap(), 0x46);
        assert_eq!(decode_length("ffff").unwrap(), 0xFFFF);
        assert_eq!(decode_length("FfFf").unwrap(), 0xFFFF);
    }

    #[test]
    fn test_decode_length_rejects_garbage() {
        let err = decode_length("zz!!").unwrap_err();
        assert!(matches!(err, AdbError::UnexpectedData { .. }));
    }

    #[test]
    fn test_decode_length_needs_four_hex_digits() {
        assert!(decode_length("+00A").is_err());
        assert!(decode_length("-001").is_err());
        assert!(decode_length(" 0A0").is_err());
        assert!(decode_length("00A").is_err());
        assert!(decode_length("000A0").is_err());
    }

    #[test]
    fn test_encode_length() {
        assert_eq!(encode_length(0), "0000");
        assert_eq!(encode_length(0x46), "0046");
        assert_eq!(encode_length(0xabc), "0ABC");
        assert_eq!(encode_length(MAX_LENGTH), "FFFF");
    }

    #[test]
    fn test_length_round_trip_boundaries() {
        for n in [0usize, 1, 15, 16, 255, 256, 4095, 4096, MAX_LENGTH] {
            let encoded = encode_length(n);
            assert_eq!(encoded.len(), 4);
            assert_eq!(decode_length(&encoded).unwrap() as usize, n);
        }
    }

    #[test]
    fn test_encode_data() {
        assert_eq!(&encode_data("host:version")[..], b"000Chost:version");
        assert_eq!(&encode_data(b"")[..], b"0000");
        assert_eq!(&encode_data(vec![0u8, 1, 2])[..], b"0003\x00\x01\x02");
    }
}
