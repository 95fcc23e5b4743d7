//! # StrKey Encoding
//!
//! Human-facing key strings. A StrKey is:
//!
//! ```text
//! base32( version_byte || payload (32 bytes) || crc16_xmodem(version || payload) as LE )
//! ```
//!
//! The version byte is chosen so the first base32 character is a stable
//! prefix: `G` for account addresses (public keys) and `S` for seeds
//! (secret keys). The CRC catches typos; it is not a security feature.
//!
//! Base32 here is RFC 4648 with the standard alphabet and no padding.
//! 35 bytes always encode to exactly 56 characters.

use crc::{Crc, CRC_16_XMODEM};
use data_encoding::{DecodeKind, BASE32_NOPAD};
use thiserror::Error;

/// Version byte for account addresses. Encodes to a leading `G`.
pub const VERSION_ACCOUNT_ID: u8 = 6 << 3;

/// Version byte for secret seeds. Encodes to a leading `S`.
pub const VERSION_SEED: u8 = 18 << 3;

/// Length of an encoded StrKey for a 32-byte payload.
pub const ENCODED_LENGTH: usize = 56;

const PAYLOAD_LENGTH: usize = 32;
const RAW_LENGTH: usize = 1 + PAYLOAD_LENGTH + 2;

/// Errors produced while decoding a StrKey.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrKeyError {
    #[error("invalid strkey length: expected {ENCODED_LENGTH} characters, got {0}")]
    InvalidLength(usize),

    #[error("invalid base32 character {0:?}")]
    InvalidCharacter(char),

    #[error("unexpected version byte: expected {expected:#04x}, got {got:#04x}")]
    InvalidVersion { expected: u8, got: u8 },

    #[error("checksum mismatch")]
    InvalidChecksum,
}

/// What kind of key a StrKey string holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// A `G…` account address.
    Address,
    /// An `S…` secret seed.
    Seed,
}

impl KeyKind {
    fn version(self) -> u8 {
        match self {
            Self::Address => VERSION_ACCOUNT_ID,
            Self::Seed => VERSION_SEED,
        }
    }
}

/// Encodes a 32-byte payload under the given key kind.
pub fn encode(kind: KeyKind, payload: &[u8; 32]) -> String {
    let mut raw = Vec::with_capacity(RAW_LENGTH);
    raw.push(kind.version());
    raw.extend_from_slice(payload);
    let crc = crc16_xmodem(&raw);
    raw.extend_from_slice(&crc.to_le_bytes());
    BASE32_NOPAD.encode(&raw)
}

/// Decodes a StrKey, checking length, version byte, and checksum.
pub fn decode(kind: KeyKind, s: &str) -> Result<[u8; 32], StrKeyError> {
    if s.len() != ENCODED_LENGTH {
        return Err(StrKeyError::InvalidLength(s.len()));
    }

    let raw = base32_decode(s)?;
    if raw.len() != RAW_LENGTH {
        return Err(StrKeyError::InvalidLength(s.len()));
    }

    let expected = kind.version();
    if raw[0] != expected {
        return Err(StrKeyError::InvalidVersion {
            expected,
            got: raw[0],
        });
    }

    let (body, checksum) = raw.split_at(RAW_LENGTH - 2);
    let crc = u16::from_le_bytes([checksum[0], checksum[1]]);
    if crc16_xmodem(body) != crc {
        return Err(StrKeyError::InvalidChecksum);
    }

    let mut payload = [0u8; 32];
    payload.copy_from_slice(&body[1..]);
    Ok(payload)
}

/// Returns `true` if `s` is a well-formed account address.
pub fn is_valid_address(s: &str) -> bool {
    decode(KeyKind::Address, s).is_ok()
}

/// Returns `true` if `s` is a well-formed secret seed.
pub fn is_valid_seed(s: &str) -> bool {
    decode(KeyKind::Seed, s).is_ok()
}

/// CRC16 with polynomial 0x1021, initial value 0, no reflection.
pub fn crc16_xmodem(data: &[u8]) -> u16 {
    XMODEM.checksum(data)
}

const XMODEM: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

fn base32_decode(s: &str) -> Result<Vec<u8>, StrKeyError> {
    BASE32_NOPAD.decode(s.as_bytes()).map_err(|e| match e.kind {
        DecodeKind::Symbol => {
            let c = s.get(e.position..).and_then(|rest| rest.chars().next());
            StrKeyError::InvalidCharacter(c.unwrap_or(char::REPLACEMENT_CHARACTER))
        }
        _ => StrKeyError::InvalidLength(s.len()),
    })
}
