//! Hex encoding for blob literals and cells.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InvalidHex;

pub(crate) fn encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Decode an even-length string of hex digits (either case).
pub(crate) fn decode(s: &str) -> Result<Vec<u8>, InvalidHex> {
    if s.len() % 2 != 0 {
        return Err(InvalidHex);
    }
    s.as_bytes()
        .chunks(2)
        .map(|pair| Ok(nibble(pair[0])? << 4 | nibble(pair[1])?))
        .collect()
}

fn nibble(c: u8) -> Result<u8, InvalidHex> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(InvalidHex),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(encode(b"Hello"), "48656c6c6f");
        assert_eq!(encode(&[]), "");
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode("48656C6c6f").unwrap(), b"Hello");
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
        assert_eq!(decode("abc"), Err(InvalidHex));
        assert_eq!(decode("zz"), Err(InvalidHex));
    }
}
