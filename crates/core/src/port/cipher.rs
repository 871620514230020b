// Encryption Capability Port

use crate::error::Result;

/// Symmetric encryption of serialized status payloads.
///
/// `decrypt` fails with [`crate::SyncError::DecryptionFailed`] on any tampered,
/// truncated or foreign ciphertext.
pub trait StatusCipher: Send + Sync {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

pub mod mocks {
    use super::*;
    use crate::error::SyncError;

    /// Identity transform
    pub struct PassthroughCipher;

    impl StatusCipher for PassthroughCipher {
        fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
            Ok(plaintext.to_vec())
        }

        fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
            Ok(ciphertext.to_vec())
        }
    }

    /// Encrypts normally (identity) but never decrypts
    pub struct UndecryptableCipher;

    impl StatusCipher for UndecryptableCipher {
        fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
            Ok(plaintext.to_vec())
        }

        fn decrypt(&self, _ciphertext: &[u8]) -> Result<Vec<u8>> {
            Err(SyncError::DecryptionFailed("key rotated".to_string()))
        }
    }
}
