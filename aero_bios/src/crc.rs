//! CRC-32 (IEEE 802.3, reflected polynomial `0xEDB88320`) and the 16-bit
//! additive checksum used by the status block.

/// Byte-wise lookup table, built at compile time.
const CRC32_TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Standard CRC-32: init `0xFFFFFFFF`, final XOR `0xFFFFFFFF`.
pub fn crc32(data: &[u8]) -> u32 {
    !data.iter().fold(0xFFFF_FFFF_u32, |crc, &b| {
        (crc >> 8) ^ CRC32_TABLE[((crc ^ u32::from(b)) & 0xFF) as usize]
    })
}

/// Wrapping sum of all bytes.
pub fn calculate_checksum(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u16, |sum, &b| sum.wrapping_add(u16::from(b)))
}

#[inline]
pub fn verify_data_integrity(data: &[u8], expected_crc: u32) -> bool {
    crc32(data) == expected_crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn crc32_check_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(&[]), 0);
    }

    #[test]
    fn table_matches_reference_entries() {
        assert_eq!(CRC32_TABLE[1], 0x7707_3096);
        assert_eq!(CRC32_TABLE[255], 0x2D02_EF8D);
    }

    #[test]
    fn checksum_wraps() {
        assert_eq!(calculate_checksum(&[1, 2, 3]), 6);
        // 255 * 258 = 65790 wraps to 254
        assert_eq!(calculate_checksum(&[0xFF; 258]), 254);
    }

    proptest! {
        #[test]
        fn single_bit_flip_changes_crc(
            data in proptest::collection::vec(any::<u8>(), 1..512),
            pos in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let crc = crc32(&data);
            let mut corrupted = data.clone();
            corrupted[pos.index(data.len())] ^= 1 << bit;
            prop_assert!(verify_data_integrity(&data, crc));
            prop_assert!(!verify_data_integrity(&corrupted, crc));
        }
    }
}
