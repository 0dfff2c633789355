//! Crash Point Generation
//!
//! Derives each round's terminal multiplier from a fresh seed:
//!
//! 1. `hash = HMAC-SHA256(key = hex(seed), msg = CRASH_SALT)`
//! 2. if the hash, read as a big number, is divisible by `crash_per`
//!    the round crashes instantly at 1.00x
//! 3. otherwise `h` = first 52 bits of the hash and the crash point is
//!    `floor((100 * 2^52 - h) / (2^52 - h)) / 100`
//!
//! Step 2 fires with probability ~`1 / crash_per` and is the house edge
//! (RTP ~ `1 - 1 / crash_per`). Step 3 is heavy-tailed: each doubling of the
//! multiplier roughly halves its probability.

use std::num::NonZeroU32;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::rng::{EntropySource, RoundSeed};

type HmacSha256 = Hmac<Sha256>;

/// Public salt hashed under every round seed.
pub const CRASH_SALT: &str = "0000000000000000000fa3b65e43e4240d71762a5bf397d5304b2596d116859c";

/// Multiplier of an instant crash.
pub const INSTANT_CRASH: f64 = 1.0;

/// 2^52, the range of the hash prefix used for the multiplier.
const E_52: f64 = 4_503_599_627_370_496.0;

/// Outcome of one crash point draw.
#[derive(Clone, Debug, PartialEq)]
pub struct CrashRoll {
    /// Seed the round was derived from.
    pub seed: RoundSeed,
    /// HMAC digest of the salt under the seed.
    pub hash: [u8; 32],
    /// Whether the divisibility check forced a 1.00x crash.
    pub instant: bool,
    /// Terminal multiplier, always >= 1.0, two decimals.
    pub multiplier: f64,
}

impl CrashRoll {
    /// Hex digest, as the hash is conventionally displayed.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Hex seed. Feeding it back through [`roll_from_seed`] re-derives the round.
    pub fn seed_hex(&self) -> String {
        hex::encode(self.seed)
    }
}

/// Draws crash points from an injected entropy source.
#[derive(Debug)]
pub struct CrashPointGenerator<E> {
    entropy: E,
}

impl<E: EntropySource> CrashPointGenerator<E> {
    /// Wrap an entropy source.
    pub fn new(entropy: E) -> Self {
        Self { entropy }
    }

    /// Draw a fresh seed and derive the round's crash point.
    pub fn generate(&mut self, crash_per: NonZeroU32) -> CrashRoll {
        let seed = self.entropy.next_seed();
        roll_from_seed(&seed, crash_per)
    }
}

/// Deterministic crash point for a given seed.
pub fn roll_from_seed(seed: &RoundSeed, crash_per: NonZeroU32) -> CrashRoll {
    let key = hex::encode(seed);
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(CRASH_SALT.as_bytes());
    let hash: [u8; 32] = mac.finalize().into_bytes().into();

    if divisible(&hash, crash_per.get()) {
        return CrashRoll {
            seed: *seed,
            hash,
            instant: true,
            multiplier: INSTANT_CRASH,
        };
    }

    CrashRoll {
        seed: *seed,
        hash,
        instant: false,
        multiplier: multiplier_from_prefix(hash_prefix_52(&hash)),
    }
}

/// Whether `digest`, read as a big-endian number, is divisible by `modulus`.
///
/// Consumes the digest in 16-bit chunks (four hex characters each). When the
/// length is not a whole number of chunks the short leading remainder is
/// skipped, mirroring how the hex form is trimmed to a multiple of four.
pub fn divisible(digest: &[u8], modulus: u32) -> bool {
    if modulus <= 1 {
        return true;
    }
    let modulus = modulus as u64;
    let skip = digest.len() % 2;

    let val = digest[skip..]
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]) as u64)
        .fold(0u64, |val, chunk| ((val << 16) + chunk) % modulus);

    val == 0
}

/// First 52 bits (13 hex characters) of the digest.
#[inline]
fn hash_prefix_52(hash: &[u8; 32]) -> u64 {
    let mut buf = [0u8; 8];
    buf[1..].copy_from_slice(&hash[..7]);
    u64::from_be_bytes(buf) >> 4
}

/// Heavy-tailed multiplier from the 52-bit prefix, rounded to cents.
#[inline]
fn multiplier_from_prefix(h: u64) -> f64 {
    let h = h as f64;
    let raw = ((100.0 * E_52 - h) / (E_52 - h)).floor() / 100.0;
    (raw * 100.0).round() / 100.0
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::DeterministicRng;

    fn per(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    struct FixedEntropy(RoundSeed);

    impl EntropySource for FixedEntropy {
        fn next_seed(&mut self) -> RoundSeed {
            self.0
        }
    }

    #[test]
    fn test_known_hash() {
        let roll = roll_from_seed(&[0u8; 16], per(20));
        assert_eq!(
            roll.hash_hex(),
            "453103a537f295775d850f2ce3323a3af07209338c01fd0c541433c3a3dc8cb6"
        );
    }

    #[test]
    fn test_known_crash_points() {
        let seq: RoundSeed = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

        assert_eq!(roll_from_seed(&[0u8; 16], per(20)).multiplier, 1.36);
        assert_eq!(roll_from_seed(&seq, per(20)).multiplier, 2.72);
        assert_eq!(roll_from_seed(&[0xff; 16], per(20)).multiplier, 1.55);
        assert_eq!(roll_from_seed(&[7; 16], per(33)).multiplier, 1.42);
    }

    #[test]
    fn test_known_instant_crash() {
        // The zero-seed digest happens to be a multiple of 101.
        let roll = roll_from_seed(&[0u8; 16], per(101));
        assert!(roll.instant);
        assert_eq!(roll.multiplier, INSTANT_CRASH);
    }

    #[test]
    fn test_crash_per_one_always_instant() {
        let mut rng = DeterministicRng::new(99);
        let mut generator = CrashPointGenerator::new(&mut rng);
        for _ in 0..100 {
            let roll = generator.generate(per(1));
            assert!(roll.instant);
            assert_eq!(roll.multiplier, 1.0);
        }
    }

    #[test]
    fn test_generator_reproducible() {
        let mut a = CrashPointGenerator::new(DeterministicRng::new(7));
        let mut b = CrashPointGenerator::new(DeterministicRng::new(7));
        for _ in 0..50 {
            assert_eq!(a.generate(per(20)), b.generate(per(20)));
        }

        let mut c = CrashPointGenerator::new(DeterministicRng::new(7));
        assert_eq!(c.generate(per(20)).multiplier, 2.17);
    }

    #[test]
    fn test_injected_seed_is_used() {
        let mut generator = CrashPointGenerator::new(FixedEntropy([0xff; 16]));
        let roll = generator.generate(per(20));
        assert_eq!(roll.seed, [0xff; 16]);
        assert_eq!(roll.multiplier, 1.55);
    }

    #[test]
    fn test_instant_rate_matches_house_edge() {
        let mut generator = CrashPointGenerator::new(DeterministicRng::new(2024));
        let trials = 20_000;
        let mut instant = 0;
        let mut at_one = 0;

        for _ in 0..trials {
            let roll = generator.generate(per(20));
            assert!(roll.multiplier >= 1.0);
            if roll.instant {
                assert_eq!(roll.multiplier, 1.0);
                instant += 1;
            }
            if roll.multiplier == 1.0 {
                at_one += 1;
            }
        }

        let rate = instant as f64 / trials as f64;
        assert!(rate > 0.04 && rate < 0.06, "instant crash rate {}", rate);

        // Non-instant prefixes below 2^52 / 100 also floor to 1.00x, about
        // 1% of the rest, so rounds ending at 1.00x run near 5.95%.
        let at_one_rate = at_one as f64 / trials as f64;
        assert!(at_one > instant, "{} at 1.00x, {} instant", at_one, instant);
        assert!(
            at_one_rate > 0.055 && at_one_rate < 0.065,
            "1.00x rate {}",
            at_one_rate
        );
    }

    #[test]
    fn test_two_decimal_places() {
        let mut generator = CrashPointGenerator::new(DeterministicRng::new(3));
        for _ in 0..1000 {
            let m = generator.generate(per(20)).multiplier;
            assert!(((m * 100.0).round() - m * 100.0).abs() < 1e-6, "{}", m);
        }
    }

    #[test]
    fn test_divisible() {
        assert!(divisible(&[0x00, 0x14], 20));
        assert!(!divisible(&[0x00, 0x15], 20));
        // 0x0001_0000 = 65536 = 2^16
        assert!(divisible(&[0x00, 0x01, 0x00, 0x00], 256));
        assert!(!divisible(&[0x00, 0x01, 0x00, 0x01], 256));
        // Odd leading byte is dropped: 0xff is ignored.
        assert!(divisible(&[0xff, 0x00, 0x14], 20));
        assert!(divisible(&[0x12, 0x34], 1));
    }

    #[test]
    fn test_multiplier_from_prefix_bounds() {
        assert_eq!(multiplier_from_prefix(0), 1.0);
        // Top of the range runs into the heavy tail.
        assert!(multiplier_from_prefix((1u64 << 52) - (1u64 << 40)) > 1000.0);
    }

    #[test]
    fn test_hash_prefix_52() {
        let mut hash = [0u8; 32];
        hash[..7].copy_from_slice(&[0x45, 0x31, 0x03, 0xa5, 0x37, 0xf2, 0x95]);
        assert_eq!(hash_prefix_52(&hash), 0x453103a537f29);
    }
}
