//! Optional encryption of packaged files
//!
//! AES-256-GCM in the STREAM construction (big-endian 32-bit counter), so a
//! file of any size is sealed in fixed chunks without holding it in memory.
//! The encrypted file is a versioned envelope:
//!
//! ```text
//! version (1 byte) || stream nonce (7 bytes) || chunk_0 + tag || ... || chunk_n + tag
//! ```
//!
//! Every chunk but the last carries exactly `CHUNK_SIZE` plaintext bytes; the
//! last is flagged in its nonce, so truncation at a chunk boundary is detected.
//!
//! Keys come from configuration, either as `base64:<32 raw bytes>` or as a
//! passphrase stretched with PBKDF2-HMAC-SHA256. Key bytes are zeroized on drop.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::stream::{DecryptorBE32, EncryptorBE32};
use aes_gcm::aead::KeyInit;
use aes_gcm::Aes256Gcm;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::Hmac;
use rand::Rng;
use sha2::{Digest, Sha256};
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::compress::PackagedFile;

/// Envelope format version
pub const ENVELOPE_VERSION: u8 = 1;

/// PBKDF2 rounds for passphrase-derived keys
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Prefix marking a raw base64 key in configuration
pub const RAW_KEY_PREFIX: &str = "base64:";

/// Plaintext bytes per sealed chunk
pub const CHUNK_SIZE: usize = 64 * 1024;

const KEY_SALT: &[u8] = b"artifact-publisher-v1/encryption-key";
/// 96-bit GCM nonce minus the 5 bytes STREAM uses for counter and last flag
const STREAM_NONCE_LEN: usize = 7;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + STREAM_NONCE_LEN;
const MIN_ENVELOPE_LEN: usize = HEADER_LEN + TAG_LEN;

/// Errors building an encryption key
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("encryption key must not be empty")]
    Empty,

    #[error("invalid base64 key: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("invalid key size: expected 32 bytes, got {0}")]
    InvalidKeySize(usize),

    #[error("key derivation failed: {0}")]
    Derivation(String),
}

/// Errors for encryption and decryption
#[derive(Debug, thiserror::Error)]
pub enum EncryptError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("encryption failed: {0}")]
    Cipher(String),

    #[error("ciphertext too short: {0} bytes (minimum 24)")]
    CiphertextTooShort(usize),

    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u8),

    #[error("decryption failed: wrong key or corrupted data")]
    Decryption,
}

/// 256-bit symmetric key
#[derive(Clone, ZeroizeOnDrop)]
pub struct EncryptionKey {
    key: [u8; 32],
}

impl EncryptionKey {
    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Parse a configured key: `base64:<32 bytes>` or a passphrase.
    pub fn from_config_value(value: &str) -> Result<Self, KeyError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(KeyError::Empty);
        }

        match value.strip_prefix(RAW_KEY_PREFIX) {
            Some(encoded) => {
                let decoded = Zeroizing::new(STANDARD.decode(encoded.trim())?);
                let key: [u8; 32] = decoded
                    .as_slice()
                    .try_into()
                    .map_err(|_| KeyError::InvalidKeySize(decoded.len()))?;
                Ok(Self::from_bytes(key))
            }
            None => Self::from_passphrase(value),
        }
    }

    /// Stretch a passphrase with PBKDF2-HMAC-SHA256.
    pub fn from_passphrase(passphrase: &str) -> Result<Self, KeyError> {
        let mut key = [0u8; 32];
        pbkdf2::pbkdf2::<Hmac<Sha256>>(passphrase.as_bytes(), KEY_SALT, PBKDF2_ITERATIONS, &mut key)
            .map_err(|e| KeyError::Derivation(e.to_string()))?;
        Ok(Self::from_bytes(key))
    }

    /// Short, non-reversible identifier for logs and metadata.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.key);
        hex::encode(&digest[..8])
    }

    fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Replaces a packaged file with its encrypted form.
pub trait Encryptor: Send + Sync {
    /// Encrypt `file`. The plaintext file is released whether or not this succeeds.
    fn encrypt(&self, file: PackagedFile, key: &EncryptionKey) -> Result<PackagedFile, EncryptError>;
}

/// AES-256-GCM envelope encryptor
#[derive(Debug, Clone, Default)]
pub struct AesGcmEncryptor {
    temp_dir: Option<PathBuf>,
}

impl AesGcmEncryptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write encrypted files here instead of next to the plaintext
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }
}

impl Encryptor for AesGcmEncryptor {
    fn encrypt(&self, file: PackagedFile, key: &EncryptionKey) -> Result<PackagedFile, EncryptError> {
        let dir = match &self.temp_dir {
            Some(dir) => dir.clone(),
            None => file
                .path()
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(std::env::temp_dir),
        };
        let suffix = file
            .path()
            .file_name()
            .map(|n| format!("-{}.enc", n.to_string_lossy()))
            .unwrap_or_else(|| ".enc".to_string());

        let mut temp = tempfile::Builder::new()
            .prefix("encrypted-")
            .suffix(&suffix)
            .tempfile_in(dir)?;
        seal_stream(File::open(file.path())?, &mut temp, key)?;
        temp.flush()?;

        let mode = file.mode();
        drop(file);
        Ok(PackagedFile::seal(temp, mode, true)?)
    }
}

/// Encrypt when a key is configured, pass the file through otherwise.
pub fn maybe_encrypt(
    encryptor: &dyn Encryptor,
    file: PackagedFile,
    key: Option<&EncryptionKey>,
) -> Result<PackagedFile, EncryptError> {
    match key {
        Some(key) => encryptor.encrypt(file, key),
        None => Ok(file),
    }
}

fn cipher(key: &EncryptionKey) -> Result<Aes256Gcm, EncryptError> {
    Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|e| EncryptError::Cipher(e.to_string()))
}

/// Fill `buf` from `reader`, stopping early only at end of input.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Seal `input` into an envelope written to `output`. Returns the envelope length.
pub fn seal_stream<R: Read, W: Write>(
    mut input: R,
    mut output: W,
    key: &EncryptionKey,
) -> Result<u64, EncryptError> {
    let nonce: [u8; STREAM_NONCE_LEN] = rand::thread_rng().gen();
    let mut stream = EncryptorBE32::from_aead(cipher(key)?, GenericArray::from_slice(&nonce));

    output.write_all(&[ENVELOPE_VERSION])?;
    output.write_all(&nonce)?;
    let mut written = HEADER_LEN as u64;

    let mut current = Zeroizing::new(vec![0u8; CHUNK_SIZE]);
    let mut next = Zeroizing::new(vec![0u8; CHUNK_SIZE]);
    let mut current_len = read_full(&mut input, &mut current)?;

    loop {
        // A short chunk is the last one; a full one needs a lookahead.
        let next_len = if current_len == CHUNK_SIZE {
            read_full(&mut input, &mut next)?
        } else {
            0
        };

        if next_len == 0 {
            let sealed = stream
                .encrypt_last(&current[..current_len])
                .map_err(|e| EncryptError::Cipher(e.to_string()))?;
            output.write_all(&sealed)?;
            written += sealed.len() as u64;
            break;
        }

        let sealed = stream
            .encrypt_next(&current[..current_len])
            .map_err(|e| EncryptError::Cipher(e.to_string()))?;
        output.write_all(&sealed)?;
        written += sealed.len() as u64;

        std::mem::swap(&mut current, &mut next);
        current_len = next_len;
    }

    Ok(written)
}

/// Open an envelope read from `input`, writing plaintext to `output`.
/// Returns the plaintext length.
pub fn open_stream<R: Read, W: Write>(
    mut input: R,
    mut output: W,
    key: &EncryptionKey,
) -> Result<u64, EncryptError> {
    let mut header = [0u8; HEADER_LEN];
    let header_len = read_full(&mut input, &mut header)?;
    if header_len < HEADER_LEN {
        return Err(EncryptError::CiphertextTooShort(header_len));
    }
    if header[0] != ENVELOPE_VERSION {
        return Err(EncryptError::UnsupportedVersion(header[0]));
    }
    let mut stream = DecryptorBE32::from_aead(cipher(key)?, GenericArray::from_slice(&header[1..]));

    const BLOCK: usize = CHUNK_SIZE + TAG_LEN;
    let mut current = vec![0u8; BLOCK];
    let mut next = vec![0u8; BLOCK];
    let mut current_len = read_full(&mut input, &mut current)?;
    let mut plaintext_len = 0u64;

    loop {
        let next_len = if current_len == BLOCK {
            read_full(&mut input, &mut next)?
        } else {
            0
        };

        if next_len == 0 {
            let plain = Zeroizing::new(
                stream
                    .decrypt_last(&current[..current_len])
                    .map_err(|_| EncryptError::Decryption)?,
            );
            output.write_all(&plain)?;
            plaintext_len += plain.len() as u64;
            break;
        }

        let plain = Zeroizing::new(
            stream
                .decrypt_next(&current[..current_len])
                .map_err(|_| EncryptError::Decryption)?,
        );
        output.write_all(&plain)?;
        plaintext_len += plain.len() as u64;

        std::mem::swap(&mut current, &mut next);
        current_len = next_len;
    }

    Ok(plaintext_len)
}

/// Recover the plaintext of an envelope produced by `AesGcmEncryptor`.
pub fn decrypt(envelope: &[u8], key: &EncryptionKey) -> Result<Vec<u8>, EncryptError> {
    if envelope.len() < MIN_ENVELOPE_LEN {
        return Err(EncryptError::CiphertextTooShort(envelope.len()));
    }
    let mut plaintext = Vec::with_capacity(envelope.len() - MIN_ENVELOPE_LEN);
    open_stream(envelope, &mut plaintext, key)?;
    Ok(plaintext)
}
