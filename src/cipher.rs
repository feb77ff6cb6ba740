//! AES-128 frame cipher
//!
//! Each 16-byte block of a frame is encrypted independently (ECB). There is
//! no IV, no padding and no authentication tag, so identical plaintext blocks
//! produce identical ciphertext blocks. This keeps the wire format
//! bit-compatible with the existing devices; it only protects against casual
//! eavesdropping.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Block};
use std::fmt;

use crate::constants::CIPHER_BLOCK_SIZE;
use crate::error::CipherError;

/// 128-bit symmetric key shared by both lanes for the process lifetime
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CipherKey([u8; 16]);

impl CipherKey {
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CipherError> {
        let bytes: [u8; 16] = bytes
            .try_into()
            .map_err(|_| CipherError::InvalidKeyLength(bytes.len()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CipherKey(..)")
    }
}

impl From<[u8; 16]> for CipherKey {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

/// Block cipher over whole frames
///
/// The key schedule is expanded once at construction; each lane owns its
/// own instance.
#[derive(Clone)]
pub struct FrameCipher {
    aes: Aes128,
}

impl FrameCipher {
    pub fn new(key: &CipherKey) -> Self {
        Self {
            aes: Aes128::new(GenericArray::from_slice(key.as_bytes())),
        }
    }

    /// Encrypt `buf` in place, block by block
    pub fn encrypt_in_place(&self, buf: &mut [u8]) -> Result<(), CipherError> {
        check_aligned(buf)?;
        for chunk in buf.chunks_exact_mut(CIPHER_BLOCK_SIZE) {
            self.aes.encrypt_block(Block::from_mut_slice(chunk));
        }
        Ok(())
    }

    /// Decrypt `buf` in place, block by block
    pub fn decrypt_in_place(&self, buf: &mut [u8]) -> Result<(), CipherError> {
        check_aligned(buf)?;
        for chunk in buf.chunks_exact_mut(CIPHER_BLOCK_SIZE) {
            self.aes.decrypt_block(Block::from_mut_slice(chunk));
        }
        Ok(())
    }
}

fn check_aligned(buf: &[u8]) -> Result<(), CipherError> {
    if buf.len() % CIPHER_BLOCK_SIZE != 0 {
        return Err(CipherError::UnalignedLength(buf.len()));
    }
    Ok(())
}

/// Round `len` up to the next block boundary
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(CIPHER_BLOCK_SIZE) * CIPHER_BLOCK_SIZE
}
