pub(crate) fn encode_uleb128(value: u32) -> Vec<u8> {
    let mut result = Vec::new();
    let mut remaining = value;

    if remaining == 0 {
        result.push(0);
        return result;
    }

    while remaining != 0 {
        let mut byte = (remaining & 0x7F) as u8;
        remaining >>= 7;

        if remaining != 0 {
            byte |= 0x80;
        }

        result.push(byte);
    }

    result
}

pub(crate) fn decode_uleb128(encoded: &[u8]) -> (u32, usize) {
    let mut value: u32 = 0;
    let mut shift: u32 = 0;
    let mut count: usize = 0;

    for &byte in encoded {
        count += 1;

        let low = (byte & 0x7F) as u32;
        if shift < 32 {
            value = value.wrapping_add(low.wrapping_shl(shift));
        }

        let cont = (byte & 0x80) != 0;
        shift = shift.saturating_add(7);

        // uleb128 values are 32-bit, so a valid encoding is at most 5 bytes
        if !cont || count == 5 {
            break;
        }
    }

    (value, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_uleb128() {
        let cases = vec![
            (0, vec![0x00]),
            (1, vec![0x01]),
            (127, vec![0x7F]),
            (128, vec![0x80, 0x01]),
            (16256, vec![0x80, 0x7F]),
            (624485, vec![0xE5, 0x8E, 0x26]),
        ];

        for (value, expected) in cases {
            assert_eq!(encode_uleb128(value), expected);
        }
    }

    #[test]
    fn test_decode_uleb128() {
        let cases = vec![
            (vec![0x00], 0),
            (vec![0x01], 1),
            (vec![0x7F], 127),
            (vec![0x80, 0x01], 128),
            (vec![0x80, 0x7F], 16256),
            (vec![0xE5, 0x8E, 0x26], 624485),
        ];

        for (encoded, expected) in cases {
            let (v, _) = decode_uleb128(&encoded);
            assert_eq!(v, expected);
        }
    }

    #[test]
    fn test_uleb128_roundtrip_cursor() {
        for value in [0u32, 5, 0x7F, 0x80, 0x3FFF, 0x4000, u32::MAX] {
            let encoded = encode_uleb128(value);
            let (v, consumed) = decode_uleb128(&encoded);
            assert_eq!(v, value);
            assert_eq!(consumed, encoded.len());
        }
    }
}
