//! AES-KDF: iterated block-cipher stretching of the master key.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, trace};
use zeroize::Zeroize;

use super::primitive::{AesFactory, BlockPrimitive, PrimitiveFactory};
use super::{BLOCK_LEN, KEY_LEN};
use crate::error::CoreError;

/// Rounds between two checks of the cancellation flag.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformParams {
    seed: [u8; KEY_LEN],
    rounds: u64,
}

impl TransformParams {
    /// Default number of transformation rounds.
    pub const DEFAULT_ROUNDS: u64 = 60_000;

    pub fn new(seed: [u8; KEY_LEN], rounds: u64) -> Self {
        Self { seed, rounds }
    }

    /// Creates parameters with a fresh random seed.
    pub fn random(rounds: u64) -> Result<Self, CoreError> {
        Ok(Self::new(super::generate_seed()?, rounds))
    }

    pub fn seed(&self) -> &[u8; KEY_LEN] {
        &self.seed
    }

    pub fn rounds(&self) -> u64 {
        self.rounds
    }
}

/// Iterated block-cipher key transformation (AES-KDF).
///
/// Each 16-byte half of the key is encrypted `rounds` times with the
/// primitive keyed by the seed. The loop is sequential on purpose: its cost
/// is what makes brute-forcing the master password expensive.
pub struct KeyTransformer<F = AesFactory> {
    params: TransformParams,
    factory: F,
}

impl KeyTransformer<AesFactory> {
    pub fn new(params: TransformParams) -> Self {
        Self::with_factory(params, AesFactory)
    }
}

impl<F: PrimitiveFactory> KeyTransformer<F> {
    pub fn with_factory(params: TransformParams, factory: F) -> Self {
        Self { params, factory }
    }

    pub fn params(&self) -> &TransformParams {
        &self.params
    }

    /// Transforms `key` in place.
    ///
    /// # Panics
    ///
    /// Panics if the factory yields a primitive whose block size is not 16.
    pub fn transform(&self, key: &mut [u8; KEY_LEN]) {
        let primitive = self.primitive();
        for _ in 0..self.params.rounds {
            round(primitive.as_ref(), key);
        }
        debug!(rounds = self.params.rounds, "key transformation finished");
    }

    /// Like [`transform`](Self::transform), but aborts between rounds once
    /// `cancel` is set. A cancelled key is wiped before returning.
    pub fn transform_cancellable(
        &self,
        key: &mut [u8; KEY_LEN],
        cancel: &AtomicBool,
    ) -> Result<(), CoreError> {
        let primitive = self.primitive();
        for i in 0..self.params.rounds {
            if i % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
                key.zeroize();
                debug!(completed = i, "key transformation cancelled");
                return Err(CoreError::Cancelled);
            }
            round(primitive.as_ref(), key);
        }
        debug!(rounds = self.params.rounds, "key transformation finished");
        Ok(())
    }

    /// Counts how many rounds complete within `budget`, working in batches
    /// of `step` rounds. Saturates at `u64::MAX`.
    pub fn benchmark(&self, budget: Duration, step: u64) -> u64 {
        let step = step.max(1);
        let mut key = [0u8; KEY_LEN];
        for (i, b) in key.iter_mut().enumerate() {
            *b = i as u8;
        }
        let primitive = self.factory.create(&key);
        check_block_size(primitive.as_ref());

        let start = Instant::now();
        let mut rounds: u64 = 0;
        loop {
            for _ in 0..step {
                round(primitive.as_ref(), &mut key);
            }
            rounds = match rounds.checked_add(step) {
                Some(r) => r,
                None => break u64::MAX,
            };
            trace!(rounds, "benchmark progress");
            if start.elapsed() > budget {
                break rounds;
            }
        }
    }

    fn primitive(&self) -> Box<dyn BlockPrimitive> {
        let primitive = self.factory.create(&self.params.seed);
        check_block_size(primitive.as_ref());
        primitive
    }
}

fn check_block_size(primitive: &dyn BlockPrimitive) {
    assert_eq!(
        primitive.block_size(),
        BLOCK_LEN,
        "key transformation requires a 128-bit block primitive"
    );
}

fn round(primitive: &dyn BlockPrimitive, key: &mut [u8; KEY_LEN]) {
    let (lo, hi) = key.split_at_mut(BLOCK_LEN);
    primitive.encrypt_block(lo);
    primitive.encrypt_block(hi);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingFactory {
        calls: Rc<Cell<u64>>,
        block_size: usize,
    }

    struct CountingPrimitive {
        calls: Rc<Cell<u64>>,
        block_size: usize,
    }

    impl PrimitiveFactory for CountingFactory {
        fn create(&self, _key: &[u8; KEY_LEN]) -> Box<dyn BlockPrimitive> {
            Box::new(CountingPrimitive {
                calls: Rc::clone(&self.calls),
                block_size: self.block_size,
            })
        }
    }

    impl BlockPrimitive for CountingPrimitive {
        fn block_size(&self) -> usize {
            self.block_size
        }

        fn encrypt_block(&self, block: &mut [u8]) {
            self.calls.set(self.calls.get() + 1);
            for b in block.iter_mut() {
                *b = b.wrapping_add(1);
            }
        }
    }

    fn sample_key() -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        for (i, b) in key.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(7);
        }
        key
    }

    #[test]
    fn transform_is_deterministic() {
        let params = TransformParams::new([42u8; 32], 1000);

        let mut k1 = sample_key();
        let mut k2 = sample_key();
        KeyTransformer::new(params).transform(&mut k1);
        KeyTransformer::new(params).transform(&mut k2);

        assert_eq!(k1, k2);
        assert_ne!(k1, sample_key());
    }

    #[test]
    fn zero_rounds_leaves_key_unchanged() {
        let mut key = sample_key();
        KeyTransformer::new(TransformParams::new([1u8; 32], 0)).transform(&mut key);
        assert_eq!(key, sample_key());
    }

    #[test]
    fn one_round_encrypts_each_half_once() {
        use aes::Aes256;
        use aes::cipher::{BlockEncrypt, KeyInit, generic_array::GenericArray};

        let seed = [9u8; 32];
        let mut key = sample_key();
        KeyTransformer::new(TransformParams::new(seed, 1)).transform(&mut key);

        let aes = Aes256::new(GenericArray::from_slice(&seed));
        let mut expected = sample_key();
        aes.encrypt_block(GenericArray::from_mut_slice(&mut expected[..16]));
        aes.encrypt_block(GenericArray::from_mut_slice(&mut expected[16..]));

        assert_eq!(key, expected);
    }

    #[test]
    fn halves_are_independent_chains() {
        let params = TransformParams::new([3u8; 32], 5);
        let mut a = sample_key();
        let mut b = sample_key();
        b[31] ^= 0xff;

        KeyTransformer::new(params).transform(&mut a);
        KeyTransformer::new(params).transform(&mut b);

        assert_eq!(a[..16], b[..16]);
        assert_ne!(a[16..], b[16..]);
    }

    #[test]
    fn different_seeds_produce_different_keys() {
        let mut k1 = sample_key();
        let mut k2 = sample_key();
        KeyTransformer::new(TransformParams::new([1u8; 32], 10)).transform(&mut k1);
        KeyTransformer::new(TransformParams::new([2u8; 32], 10)).transform(&mut k2);
        assert_ne!(k1, k2);
    }

    #[test]
    fn injected_primitive_sees_two_blocks_per_round() {
        let factory = CountingFactory {
            calls: Rc::new(Cell::new(0)),
            block_size: 16,
        };
        let transformer = KeyTransformer::with_factory(TransformParams::new([0u8; 32], 7), &factory);

        let mut key = [0u8; KEY_LEN];
        transformer.transform(&mut key);

        assert_eq!(factory.calls.get(), 14);
        assert_eq!(key, [7u8; KEY_LEN]);
    }

    #[test]
    #[should_panic(expected = "128-bit block primitive")]
    fn wrong_block_size_panics() {
        let factory = CountingFactory {
            calls: Rc::new(Cell::new(0)),
            block_size: 8,
        };
        let mut key = [0u8; KEY_LEN];
        KeyTransformer::with_factory(TransformParams::new([0u8; 32], 1), factory)
            .transform(&mut key);
    }

    #[test]
    fn cancelled_transform_wipes_key() {
        let cancel = AtomicBool::new(true);
        let mut key = sample_key();

        let result = KeyTransformer::new(TransformParams::new([5u8; 32], 10_000))
            .transform_cancellable(&mut key, &cancel);

        assert!(matches!(result, Err(CoreError::Cancelled)));
        assert_eq!(key, [0u8; KEY_LEN]);
    }

    #[test]
    fn uncancelled_transform_matches_plain_transform() {
        let params = TransformParams::new([5u8; 32], 2_500);
        let cancel = AtomicBool::new(false);

        let mut a = sample_key();
        let mut b = sample_key();
        KeyTransformer::new(params)
            .transform_cancellable(&mut a, &cancel)
            .unwrap();
        KeyTransformer::new(params).transform(&mut b);

        assert_eq!(a, b);
    }

    #[test]
    fn benchmark_counts_whole_steps() {
        let transformer = KeyTransformer::new(TransformParams::new([0u8; 32], 0));
        let rounds = transformer.benchmark(Duration::from_millis(5), 101);
        assert!(rounds >= 101);
        assert_eq!(rounds % 101, 0);
    }
}
