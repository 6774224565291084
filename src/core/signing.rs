//! Personal message signing (EIP-191, version 0x45)
//!
//! The signed digest is
//! `keccak256("\x19Ethereum Signed Message:\n" ‖ len(message) ‖ message)`
//! with the length written in decimal. Signatures are recoverable: the
//! signer's address can be rebuilt from the digest and the 65-byte
//! signature alone.

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::Message;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::core::address::{keccak256, Address};
use crate::core::bip44::{secret_key, SECP};
use crate::core::credentials::SigningKey;
use crate::core::errors::WalletError;

pub const MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Length of the `r ‖ s ‖ v` wire form.
pub const SIGNATURE_LEN: usize = 65;

const V_OFFSET: u8 = 27;

/// Recoverable ECDSA signature with `v` in {27, 28}.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignatureData {
    r: [u8; 32],
    s: [u8; 32],
    v: u8,
}

impl SignatureData {
    /// Build from components. `v` may be given as 0/1 or 27/28.
    pub fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Result<Self, WalletError> {
        Ok(Self { r, s, v: normalize_v(v)? })
    }

    pub fn r(&self) -> &[u8; 32] {
        &self.r
    }

    pub fn s(&self) -> &[u8; 32] {
        &self.s
    }

    /// 27 or 28.
    pub fn v(&self) -> u8 {
        self.v
    }

    pub fn recovery_id(&self) -> u8 {
        self.v - V_OFFSET
    }

    /// `r ‖ s ‖ v`
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        let mut out = [0u8; SIGNATURE_LEN];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(WalletError::InvalidSignature(format!(
                "expected {} bytes, got {}",
                SIGNATURE_LEN,
                bytes.len()
            )));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Self::new(r, s, bytes[64])
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    fn to_recoverable(self) -> Result<RecoverableSignature, WalletError> {
        let rec_id = RecoveryId::from_i32(i32::from(self.recovery_id()))
            .map_err(|e| WalletError::InvalidSignature(e.to_string()))?;
        let mut compact = [0u8; 64];
        compact[..32].copy_from_slice(&self.r);
        compact[32..].copy_from_slice(&self.s);
        RecoverableSignature::from_compact(&compact, rec_id)
            .map_err(|e| WalletError::InvalidSignature(e.to_string()))
    }
}

impl fmt::Display for SignatureData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for SignatureData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureData({})", self.to_hex())
    }
}

impl FromStr for SignatureData {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| WalletError::InvalidSignature(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

/// EIP-191 digest of `message`.
pub fn hash_message(message: &[u8]) -> [u8; 32] {
    let len = message.len().to_string();
    let mut data = Vec::with_capacity(MESSAGE_PREFIX.len() + len.len() + message.len());
    data.extend_from_slice(MESSAGE_PREFIX.as_bytes());
    data.extend_from_slice(len.as_bytes());
    data.extend_from_slice(message);
    keccak256(&data)
}

/// Sign `message` as a personal message.
pub fn sign_message(message: &[u8], key: &SigningKey) -> Result<SignatureData, WalletError> {
    debug!(message_len = message.len(), "Signing personal message");
    sign_hash(&hash_message(message), key)
}

/// Sign a precomputed 32-byte digest with an RFC6979 deterministic nonce.
pub fn sign_hash(hash: &[u8; 32], key: &SigningKey) -> Result<SignatureData, WalletError> {
    let secret = secret_key(key.expose_bytes())?;
    let msg = Message::from_slice(hash).map_err(|e| WalletError::InvalidKey(e.to_string()))?;

    let signature = SECP.sign_ecdsa_recoverable(&msg, &secret);
    let (rec_id, compact) = signature.serialize_compact();
    let (r, s) = split_components(&compact)?;

    let rec = u8::try_from(rec_id.to_i32())
        .map_err(|_| WalletError::InvalidSignature("recovery id out of range".to_string()))?;
    SignatureData::new(r, s, rec)
}

/// Recover the signer's address for a personal message.
pub fn recover_address(message: &[u8], signature: &SignatureData) -> Result<Address, WalletError> {
    recover_address_from_hash(&hash_message(message), signature)
}

/// Recover the signer's address for a precomputed digest.
pub fn recover_address_from_hash(
    hash: &[u8; 32],
    signature: &SignatureData,
) -> Result<Address, WalletError> {
    let msg = Message::from_slice(hash).map_err(|e| WalletError::InvalidSignature(e.to_string()))?;
    let recoverable = signature.to_recoverable()?;
    let public = SECP
        .recover_ecdsa(&msg, &recoverable)
        .map_err(|e| WalletError::InvalidSignature(e.to_string()))?;
    Ok(Address::from_public_key(&public))
}

/// True when `signature` over `message` was produced by `expected`.
pub fn verify_message(
    message: &[u8],
    signature: &SignatureData,
    expected: &Address,
) -> Result<bool, WalletError> {
    Ok(recover_address(message, signature)? == *expected)
}

fn split_components(compact: &[u8]) -> Result<([u8; 32], [u8; 32]), WalletError> {
    if compact.len() != 64 {
        return Err(WalletError::InvalidSignature(format!(
            "compact signature must be 64 bytes, got {}",
            compact.len()
        )));
    }
    let (r_slice, s_slice) = compact.split_at(32);
    let r: [u8; 32] = r_slice
        .try_into()
        .map_err(|_| WalletError::InvalidSignature("r must be 32 bytes".to_string()))?;
    let s: [u8; 32] = s_slice
        .try_into()
        .map_err(|_| WalletError::InvalidSignature("s must be 32 bytes".to_string()))?;
    Ok((r, s))
}

fn normalize_v(v: u8) -> Result<u8, WalletError> {
    match v {
        0 | 1 => Ok(v + V_OFFSET),
        27 | 28 => Ok(v),
        other => Err(WalletError::InvalidSignature(format!("unsupported v value {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> SigningKey {
        SigningKey::from_bytes([byte; 32]).unwrap()
    }

    #[test]
    fn test_hash_message_vector() {
        assert_eq!(
            hex::encode(hash_message(b"hello world")),
            "d9eba16ed0ecae432b71fe008c98cc872bb4cc214d3220a36f365326cf807d68"
        );
    }

    #[test]
    fn test_sign_and_recover() {
        let k = key(0x11);
        let sig = sign_message(b"test", &k).unwrap();
        assert_eq!(recover_address(b"test", &sig).unwrap(), k.address());
        assert!(verify_message(b"test", &sig, &k.address()).unwrap());
    }

    #[test]
    fn test_empty_message() {
        let k = key(0x22);
        let sig = sign_message(b"", &k).unwrap();
        assert_eq!(recover_address(b"", &sig).unwrap(), k.address());
    }

    #[test]
    fn test_signing_is_deterministic() {
        let k = key(0x33);
        assert_eq!(sign_message(b"abc", &k).unwrap(), sign_message(b"abc", &k).unwrap());
    }

    #[test]
    fn test_wrong_message_recovers_other_address() {
        let k = key(0x44);
        let sig = sign_message(b"test", &k).unwrap();
        assert!(!verify_message(b"tset", &sig, &k.address()).unwrap());
    }

    #[test]
    fn test_wire_format() {
        let sig = sign_message(b"test", &key(0x55)).unwrap();
        let bytes = sig.to_bytes();
        assert_eq!(bytes.len(), SIGNATURE_LEN);
        assert!(bytes[64] == 27 || bytes[64] == 28);
        assert_eq!(&bytes[..32], sig.r());
        assert_eq!(&bytes[32..64], sig.s());

        let hex = sig.to_hex();
        assert!(hex.starts_with("0x"));
        assert_eq!(hex.len(), 2 + 130);
        assert_eq!(hex, hex.to_lowercase());
        assert_eq!(hex.parse::<SignatureData>().unwrap(), sig);
    }

    #[test]
    fn test_v_normalization() {
        let sig = sign_message(b"test", &key(0x66)).unwrap();
        let mut raw = sig.to_bytes();
        raw[64] -= 27;
        assert_eq!(SignatureData::from_bytes(&raw).unwrap(), sig);

        raw[64] = 29;
        assert!(matches!(SignatureData::from_bytes(&raw), Err(WalletError::InvalidSignature(_))));
    }

    #[test]
    fn test_invalid_signature_bytes() {
        assert!(matches!(
            SignatureData::from_bytes(&[0u8; 64]),
            Err(WalletError::InvalidSignature(_))
        ));
        // r = s = 0 cannot be recovered
        let zero = SignatureData::new([0u8; 32], [0u8; 32], 27).unwrap();
        assert!(matches!(recover_address(b"test", &zero), Err(WalletError::InvalidSignature(_))));
        assert!("0xzz".parse::<SignatureData>().is_err());
    }

    #[test]
    fn test_split_components_rejects_short_input() {
        assert!(split_components(&[0u8; 63]).is_err());
    }
}
