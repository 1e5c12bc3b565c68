pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

/// Round and saturate a float channel value into `0..=255`.
pub fn clamp_u8(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    v.round().clamp(0.0, 255.0) as u8
}

/// Clamp-to-edge addressing: map any coordinate onto `0..len`.
///
/// `len` must be non-zero.
pub fn clamp_index(v: i64, len: u32) -> u32 {
    v.clamp(0, i64::from(len) - 1) as u32
}

/// SplitMix64 finalizer; used as a stateless hash for deterministic "random" patterns.
pub(crate) fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Deterministic value in `[0, 1)` for `(seed, i)`.
pub(crate) fn hash01(seed: u64, i: u64) -> f64 {
    let h = mix64(seed ^ mix64(i.wrapping_add(0x9E37_79B9_7F4A_7C15)));
    (h >> 11) as f64 / (1u64 << 53) as f64
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Fnv1a64(u64);

impl Fnv1a64 {
    pub(crate) const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01B3;

    pub(crate) fn new_default() -> Self {
        Self(Self::OFFSET_BASIS)
    }

    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) {
        let mut h = self.0;
        for &b in bytes {
            h ^= u64::from(b);
            h = h.wrapping_mul(Self::PRIME);
        }
        self.0 = h;
    }

    pub(crate) fn finish(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div255_rounds_to_nearest() {
        assert_eq!(mul_div255_u8(255, 255), 255);
        assert_eq!(mul_div255_u8(128, 255), 128);
        assert_eq!(mul_div255_u8(0, 200), 0);
        assert_eq!(mul_div255_u8(100, 128), 50);
    }

    #[test]
    fn clamp_u8_saturates_and_rounds() {
        assert_eq!(clamp_u8(-3.0), 0);
        assert_eq!(clamp_u8(300.0), 255);
        assert_eq!(clamp_u8(12.5), 13);
        assert_eq!(clamp_u8(f32::NAN), 0);
    }

    #[test]
    fn clamp_index_replicates_edges() {
        assert_eq!(clamp_index(-5, 10), 0);
        assert_eq!(clamp_index(4, 10), 4);
        assert_eq!(clamp_index(99, 10), 9);
    }

    #[test]
    fn hash01_is_deterministic_and_in_range() {
        for i in 0..64 {
            let a = hash01(7, i);
            assert_eq!(a, hash01(7, i));
            assert!((0.0..1.0).contains(&a));
        }
        assert_ne!(hash01(1, 0), hash01(2, 0));
    }

    #[test]
    fn fnv_distinguishes_inputs() {
        let mut a = Fnv1a64::new_default();
        a.write_bytes(b"abc");
        let mut b = Fnv1a64::new_default();
        b.write_bytes(b"abd");
        assert_ne!(a.finish(), b.finish());
    }
}
