//! Block cipher primitive used by the key transformation.

use aes::Aes256;
use aes::cipher::{Block, BlockEncrypt, BlockSizeUser, KeyInit};

use super::KEY_LEN;

/// A keyed block permutation operating in the encrypt direction.
pub trait BlockPrimitive {
    /// Block size in bytes.
    fn block_size(&self) -> usize;

    /// Encrypts exactly one block in place.
    fn encrypt_block(&self, block: &mut [u8]);
}

/// Creates block primitives keyed with a 32-byte seed.
///
/// Handed to [`KeyTransformer`](super::KeyTransformer) at construction so
/// alternate primitives (or counting fakes in tests) can be substituted.
pub trait PrimitiveFactory {
    fn create(&self, key: &[u8; KEY_LEN]) -> Box<dyn BlockPrimitive>;
}

/// The default factory: AES-256.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesFactory;

impl PrimitiveFactory for AesFactory {
    fn create(&self, key: &[u8; KEY_LEN]) -> Box<dyn BlockPrimitive> {
        Box::new(AesPrimitive(Aes256::new(key.into())))
    }
}

struct AesPrimitive(Aes256);

impl BlockPrimitive for AesPrimitive {
    fn block_size(&self) -> usize {
        Aes256::block_size()
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        self.0.encrypt_block(Block::<Aes256>::from_mut_slice(block));
    }
}

impl<F: PrimitiveFactory + ?Sized> PrimitiveFactory for &F {
    fn create(&self, key: &[u8; KEY_LEN]) -> Box<dyn BlockPrimitive> {
        (**self).create(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // FIPS-197 appendix C.3
    #[test]
    fn aes_primitive_matches_fips_197() {
        let mut key = [0u8; 32];
        for (i, b) in key.iter_mut().enumerate() {
            *b = i as u8;
        }
        let mut block: Vec<u8> = (0..16u8).map(|i| (i << 4) | i).collect();

        let primitive = AesFactory.create(&key);
        assert_eq!(primitive.block_size(), 16);
        primitive.encrypt_block(&mut block);

        assert_eq!(hex::encode(block), "8ea2b7ca516745bfeafc49904b496089");
    }
}
