// Master key file management

use rand::RngCore;
use std::io;
use std::path::Path;
use tracing::info;

pub const MASTER_KEY_LEN: usize = 32;

/// Load the master key from `path`, or generate and persist one if the file
/// does not exist yet. A file of the wrong length is an error, never replaced.
pub fn load_or_generate_key(path: &Path) -> io::Result<[u8; MASTER_KEY_LEN]> {
    if path.exists() {
        let bytes = std::fs::read(path)?;
        let key: [u8; MASTER_KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "master key file must be exactly {} bytes, got {}",
                    MASTER_KEY_LEN,
                    bytes.len()
                ),
            )
        })?;
        return Ok(key);
    }

    let mut key = [0u8; MASTER_KEY_LEN];
    rand::thread_rng().fill_bytes(&mut key);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_private(path, &key)?;
    info!(path = %path.display(), "Generated new master key");
    Ok(key)
}

#[cfg(unix)]
fn write_private(path: &Path, key: &[u8]) -> io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(key)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, key: &[u8]) -> io::Result<()> {
    std::fs::write(path, key)
}
