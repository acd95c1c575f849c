//! Pseudorandom generator used to shuffle validators
//!
//! Every 64-byte block is `sha512(seed || shard || workchain || catchain_seqno)`
//! read as eight big-endian words. The seed is a 256-bit big-endian counter
//! bumped after every block.

use anyhow::{Result, bail};
use byteorder::{BigEndian, ByteOrder};
use sha2::{Digest, Sha512};

const WORDS_PER_HASH: usize = 8;

#[derive(Debug, Clone)]
pub struct ValidatorPrng {
    seed: [u8; 32],
    shard: u64,
    workchain: i32,
    catchain_seqno: u32,
    hash: [u8; 64],
    pos: usize,
    limit: usize,
}

impl ValidatorPrng {
    /// `seed` is either empty (all zeroes) or exactly 32 bytes
    pub fn new(seed: &[u8], shard: u64, workchain: i32, catchain_seqno: u32) -> Result<Self> {
        let mut full_seed = [0u8; 32];
        match seed.len() {
            0 => {}
            32 => full_seed.copy_from_slice(seed),
            len => bail!("validator prng seed must be 32 bytes, got {len}"),
        }
        Ok(Self {
            seed: full_seed,
            shard,
            workchain,
            catchain_seqno,
            hash: [0u8; 64],
            pos: 0,
            limit: 0,
        })
    }

    pub fn next_u64(&mut self) -> u64 {
        if self.pos < self.limit {
            let word = BigEndian::read_u64(&self.hash[self.pos * 8..]);
            self.pos += 1;
            return word;
        }
        self.rebuild_hash();
        self.increase_seed();
        self.pos = 1;
        self.limit = WORDS_PER_HASH;
        BigEndian::read_u64(&self.hash)
    }

    /// A value in `0..range`, as `(next * range) >> 64`
    pub fn next_ranged(&mut self, range: u64) -> u64 {
        ((self.next_u64() as u128 * range as u128) >> 64) as u64
    }

    fn increase_seed(&mut self) {
        for byte in self.seed.iter_mut().rev() {
            *byte = byte.wrapping_add(1);
            if *byte != 0 {
                break;
            }
        }
    }

    fn rebuild_hash(&mut self) {
        let mut tail = [0u8; 16];
        BigEndian::write_u64(&mut tail[..8], self.shard);
        BigEndian::write_i32(&mut tail[8..12], self.workchain);
        BigEndian::write_u32(&mut tail[12..], self.catchain_seqno);

        let mut hasher = Sha512::new();
        hasher.update(self.seed);
        hasher.update(tail);
        self.hash.copy_from_slice(&hasher.finalize());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn masterchain_prng() -> ValidatorPrng {
        ValidatorPrng::new(&[], 0x8000_0000_0000_0000, -1, 0).unwrap()
    }

    #[test]
    fn test_next_u64() {
        let expected: [u64; 10] = [
            6186953295200455061,
            9716249430906648876,
            893850564141714240,
            16362499097668570104,
            7550721807492789767,
            8027788155046975774,
            2198044665159296191,
            15889925754150310949,
            2854201576873883948,
            3908958851740847745,
        ];
        let mut prng = masterchain_prng();
        for value in expected {
            assert_eq!(prng.next_u64(), value);
        }
    }

    #[test]
    fn test_next_ranged() {
        for (range, expected) in [(5, 1), (18_324, 6_145), (10_000_000_000, 3_353_954_101)] {
            assert_eq!(masterchain_prng().next_ranged(range), expected);
        }
    }

    #[test]
    fn test_increase_seed() {
        let mut prng = masterchain_prng();
        prng.increase_seed();
        assert_eq!(prng.seed[31], 1);

        let mut prng = masterchain_prng();
        for _ in 0..40 {
            prng.increase_seed();
        }
        assert_eq!(prng.seed[31], 40);

        let mut prng = masterchain_prng();
        for _ in 0..256 {
            prng.increase_seed();
        }
        assert_eq!(prng.seed[31], 0);
        assert_eq!(prng.seed[30], 1);
    }

    #[test]
    fn test_rebuild_hash() {
        let mut prng = masterchain_prng();
        prng.seed[31] = 32;
        prng.rebuild_hash();
        let expected: [u8; 64] = [
            74, 27, 97, 202, 222, 150, 35, 10, 94, 215, 240, 213, 147, 229, 252, 235, 220, 93, 61,
            153, 58, 129, 85, 207, 18, 223, 177, 238, 191, 27, 82, 201, 215, 138, 181, 138, 211,
            64, 181, 135, 235, 229, 167, 89, 39, 106, 210, 242, 97, 239, 129, 126, 111, 113, 182,
            53, 72, 200, 103, 177, 156, 208, 84, 20,
        ];
        assert_eq!(prng.hash, expected);
    }

    #[test]
    fn test_seed_length() {
        assert!(ValidatorPrng::new(&[1; 31], 0, 0, 0).is_err());
        assert!(ValidatorPrng::new(&[1; 32], 0, 0, 0).is_ok());
    }
}
