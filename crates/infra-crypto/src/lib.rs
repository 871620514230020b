// Refund Sync Infrastructure - Encryption Adapter
// Implements: StatusCipher

mod cipher;
mod master_key;

pub use cipher::AesGcmStatusCipher;
pub use master_key::{load_or_generate_key, MASTER_KEY_LEN};
