use core::convert::TryInto;

/// Compute the log-base-two of the next power of two: 8 -> 3, 9 -> 4.
///
pub fn ceil_log2(x: usize) -> usize {
    let mut n = 0;
    while 1 << n < x {
        n += 1
    }
    n
}

/// Read an `f64` out of the first eight bytes of a message. Short messages
/// decode as NaN, which then propagates through any reduction.
///
pub fn decode_f64(bytes: &[u8]) -> f64 {
    bytes
        .get(..8)
        .and_then(|b| b.try_into().ok())
        .map_or(f64::NAN, f64::from_le_bytes)
}




// ============================================================================
#[cfg(test)]
mod test {

    #[test]
    fn ceil_log2_works() {
        assert_eq!(super::ceil_log2(1), 0);
        assert_eq!(super::ceil_log2(2), 1);
        assert_eq!(super::ceil_log2(8), 3);
        assert_eq!(super::ceil_log2(9), 4);
    }

    #[test]
    fn f64_decoding_tolerates_short_messages() {
        assert_eq!(super::decode_f64(&2.5f64.to_le_bytes()), 2.5);
        assert!(super::decode_f64(&[1, 2]).is_nan());
    }
}
