//! BIP32/BIP44 HD key derivation
//!
//! Path format: m/44'/coin_type'/account'/change/address_index
//!
//! The Ethereum default account lives at `m/44'/60'/0'/0/0`: three hardened
//! steps followed by two normal ones. Any wallet reading the same mnemonic
//! expects exactly this path.

use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use ripemd::Ripemd160;
use secp256k1::{All, PublicKey, Scalar, Secp256k1, SecretKey};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use zeroize::Zeroizing;

use crate::core::errors::WalletError;

type HmacSha512 = Hmac<Sha512>;

pub(crate) static SECP: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Index offset for hardened children (2^31).
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// BIP44 purpose field.
pub const PURPOSE: u32 = 44;

/// SLIP-44 coin type for Ethereum.
pub const ETHEREUM_COIN_TYPE: u32 = 60;

/// Default Ethereum account path.
pub const ETHEREUM_DEFAULT: &str = "m/44'/60'/0'/0/0";

const XPRV_VERSION: [u8; 4] = [0x04, 0x88, 0xAD, 0xE4];
const XPUB_VERSION: [u8; 4] = [0x04, 0x88, 0xB2, 0x1E];

/// One step of a derivation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChildNumber {
    index: u32,
    hardened: bool,
}

impl ChildNumber {
    /// `index` must be below 2^31; use `hardened` to request the hardened child.
    pub fn new(index: u32, hardened: bool) -> Result<Self, WalletError> {
        if index >= HARDENED_OFFSET {
            return Err(WalletError::InvalidChildIndex(format!(
                "index {} out of range (must be < 2^31)",
                index
            )));
        }
        Ok(Self { index, hardened })
    }

    pub fn normal(index: u32) -> Result<Self, WalletError> {
        Self::new(index, false)
    }

    pub fn hardened(index: u32) -> Result<Self, WalletError> {
        Self::new(index, true)
    }

    /// Interpret a raw BIP32 index; values >= 2^31 are hardened.
    pub fn from_raw(raw: u32) -> Self {
        if raw >= HARDENED_OFFSET {
            Self { index: raw - HARDENED_OFFSET, hardened: true }
        } else {
            Self { index: raw, hardened: false }
        }
    }

    /// Raw BIP32 index as used on the wire and in the HMAC input.
    pub fn to_raw(self) -> u32 {
        if self.hardened {
            self.index | HARDENED_OFFSET
        } else {
            self.index
        }
    }

    pub fn index(self) -> u32 {
        self.index
    }

    pub fn is_hardened(self) -> bool {
        self.hardened
    }
}

impl fmt::Display for ChildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hardened {
            write!(f, "{}'", self.index)
        } else {
            write!(f, "{}", self.index)
        }
    }
}

impl FromStr for ChildNumber {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (digits, hardened) = match s.strip_suffix(|c: char| c == '\'' || c == 'h' || c == 'H') {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(WalletError::InvalidDerivationPath(format!("bad path step '{}'", s)));
        }
        let index: u32 = digits
            .parse()
            .map_err(|_| WalletError::InvalidChildIndex(format!("index '{}' out of range", digits)))?;
        Self::new(index, hardened)
    }
}

/// Ordered list of derivation steps, e.g. `m/44'/60'/0'/0/0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DerivationPath(Vec<ChildNumber>);

impl DerivationPath {
    pub fn new(steps: Vec<ChildNumber>) -> Self {
        Self(steps)
    }

    /// `m/44'/60'/account'/change/address_index`
    pub fn ethereum(account: u32, change: u32, address_index: u32) -> Result<Self, WalletError> {
        Ok(Self(vec![
            ChildNumber::hardened(PURPOSE)?,
            ChildNumber::hardened(ETHEREUM_COIN_TYPE)?,
            ChildNumber::hardened(account)?,
            ChildNumber::normal(change)?,
            ChildNumber::normal(address_index)?,
        ]))
    }

    /// The canonical default account `m/44'/60'/0'/0/0`.
    pub fn ethereum_default() -> Self {
        Self(
            [PURPOSE | HARDENED_OFFSET, ETHEREUM_COIN_TYPE | HARDENED_OFFSET, HARDENED_OFFSET, 0, 0]
                .into_iter()
                .map(ChildNumber::from_raw)
                .collect(),
        )
    }

    pub fn steps(&self) -> &[ChildNumber] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// New path with one more step appended.
    pub fn child(&self, step: ChildNumber) -> Self {
        let mut steps = self.0.clone();
        steps.push(step);
        Self(steps)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for step in &self.0 {
            write!(f, "/{}", step)?;
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('/');
        match parts.next() {
            Some("m") | Some("M") => {}
            _ => {
                return Err(WalletError::InvalidDerivationPath(format!(
                    "path '{}' must start with 'm'",
                    s
                )))
            }
        }
        let steps = parts.map(ChildNumber::from_str).collect::<Result<Vec<_>, _>>()?;
        Ok(Self(steps))
    }
}

enum KeyMaterial {
    Private { secret: Zeroizing<[u8; 32]>, public: PublicKey },
    Public(PublicKey),
}

/// BIP32 extended key: key material, chain code and position metadata.
pub struct ExtendedKey {
    key: KeyMaterial,
    chain_code: [u8; 32],
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: ChildNumber,
}

impl ExtendedKey {
    /// Master key from a BIP39 seed: HMAC-SHA512("Bitcoin seed", seed).
    pub fn master(seed: &[u8]) -> Result<Self, WalletError> {
        if !(16..=64).contains(&seed.len()) {
            return Err(WalletError::InvalidKey(format!(
                "seed must be 16..=64 bytes, got {}",
                seed.len()
            )));
        }

        let i = hmac_sha512(b"Bitcoin seed", seed)?;
        let (il, ir) = i.split_at(32);

        let secret = SecretKey::from_slice(il)
            .map_err(|e| WalletError::InvalidKey(format!("unusable master key: {}", e)))?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(ir);

        Ok(Self {
            key: KeyMaterial::private(&secret),
            chain_code,
            depth: 0,
            parent_fingerprint: [0u8; 4],
            child_number: ChildNumber::from_raw(0),
        })
    }

    /// Derive a single child (CKDpriv or CKDpub depending on the key).
    pub fn derive_child(&self, child: ChildNumber) -> Result<Self, WalletError> {
        let depth = self
            .depth
            .checked_add(1)
            .ok_or_else(|| WalletError::InvalidChildIndex("maximum depth reached".to_string()))?;

        let parent_public = self.public_key();
        let mut data = Zeroizing::new(Vec::with_capacity(37));
        match (&self.key, child.is_hardened()) {
            (KeyMaterial::Private { secret, .. }, true) => {
                data.push(0x00);
                data.extend_from_slice(&secret[..]);
            }
            (KeyMaterial::Public(_), true) => return Err(WalletError::HardenedFromPublicOnly),
            (_, false) => data.extend_from_slice(&parent_public.serialize()),
        }
        data.extend_from_slice(&child.to_raw().to_be_bytes());

        let i = hmac_sha512(&self.chain_code, &data)?;
        let (il, ir) = i.split_at(32);

        let mut il_bytes = Zeroizing::new([0u8; 32]);
        il_bytes.copy_from_slice(il);
        let tweak = Scalar::from_be_bytes(*il_bytes).map_err(|_| {
            WalletError::InvalidChildIndex(format!("child {} yields an invalid key", child))
        })?;

        let key = match &self.key {
            KeyMaterial::Private { secret, .. } => {
                let parent = secret_key(secret)?;
                let derived = parent.add_tweak(&tweak).map_err(|_| {
                    WalletError::InvalidChildIndex(format!("child {} yields an invalid key", child))
                })?;
                KeyMaterial::private(&derived)
            }
            KeyMaterial::Public(public) => {
                let derived = public.add_exp_tweak(&*SECP, &tweak).map_err(|_| {
                    WalletError::InvalidChildIndex(format!("child {} yields an invalid key", child))
                })?;
                KeyMaterial::Public(derived)
            }
        };

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(ir);

        Ok(Self {
            key,
            chain_code,
            depth,
            parent_fingerprint: fingerprint_of(&parent_public),
            child_number: child,
        })
    }

    /// Apply every step of `path` in order.
    pub fn derive(&self, path: &DerivationPath) -> Result<Self, WalletError> {
        debug!(path = %path, depth = self.depth, "Deriving extended key");
        let mut current = self.clone_key();
        for step in path.steps() {
            current = current.derive_child(*step)?;
        }
        Ok(current)
    }

    /// Public-only copy of this key.
    pub fn neuter(&self) -> Self {
        Self {
            key: KeyMaterial::Public(self.public_key()),
            chain_code: self.chain_code,
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child_number: self.child_number,
        }
    }

    pub fn has_private_key(&self) -> bool {
        matches!(self.key, KeyMaterial::Private { .. })
    }

    pub fn public_key(&self) -> PublicKey {
        match &self.key {
            KeyMaterial::Private { public, .. } => *public,
            KeyMaterial::Public(public) => *public,
        }
    }

    /// The 32-byte private scalar, if present.
    pub fn private_key_bytes(&self) -> Option<&[u8; 32]> {
        match &self.key {
            KeyMaterial::Private { secret, .. } => Some(secret),
            KeyMaterial::Public(_) => None,
        }
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn parent_fingerprint(&self) -> [u8; 4] {
        self.parent_fingerprint
    }

    pub fn child_number(&self) -> ChildNumber {
        self.child_number
    }

    /// HASH160(compressed public key)[0..4]
    pub fn fingerprint(&self) -> [u8; 4] {
        fingerprint_of(&self.public_key())
    }

    /// Serialize as a Base58Check `xprv` string. This is the only place
    /// private key material leaves the type.
    pub fn to_xprv(&self) -> Result<String, WalletError> {
        let secret = self.private_key_bytes().ok_or_else(|| {
            WalletError::InvalidKey("cannot export xprv from a public-only key".to_string())
        })?;
        let mut key_data = Zeroizing::new([0u8; 33]);
        key_data[1..].copy_from_slice(secret);
        Ok(self.serialize(XPRV_VERSION, &key_data))
    }

    /// Serialize as a Base58Check `xpub` string.
    pub fn to_xpub(&self) -> String {
        self.serialize(XPUB_VERSION, &self.public_key().serialize())
    }

    fn serialize(&self, version: [u8; 4], key_data: &[u8; 33]) -> String {
        let mut payload = Zeroizing::new(Vec::with_capacity(82));
        payload.extend_from_slice(&version);
        payload.push(self.depth);
        payload.extend_from_slice(&self.parent_fingerprint);
        payload.extend_from_slice(&self.child_number.to_raw().to_be_bytes());
        payload.extend_from_slice(&self.chain_code);
        payload.extend_from_slice(key_data);

        let checksum = Sha256::digest(Sha256::digest(&payload[..]));
        payload.extend_from_slice(&checksum[..4]);
        bs58::encode(&payload[..]).into_string()
    }

    fn clone_key(&self) -> Self {
        let key = match &self.key {
            KeyMaterial::Private { secret, public } => {
                KeyMaterial::Private { secret: secret.clone(), public: *public }
            }
            KeyMaterial::Public(public) => KeyMaterial::Public(*public),
        };
        Self {
            key,
            chain_code: self.chain_code,
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child_number: self.child_number,
        }
    }
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedKey")
            .field("private", &self.has_private_key())
            .field("public_key", &hex::encode(self.public_key().serialize()))
            .field("depth", &self.depth)
            .field("parent_fingerprint", &hex::encode(self.parent_fingerprint))
            .field("child_number", &self.child_number)
            .finish_non_exhaustive()
    }
}

impl KeyMaterial {
    fn private(secret: &SecretKey) -> Self {
        KeyMaterial::Private {
            secret: Zeroizing::new(secret.secret_bytes()),
            public: PublicKey::from_secret_key(&*SECP, secret),
        }
    }
}

pub(crate) fn secret_key(bytes: &[u8; 32]) -> Result<SecretKey, WalletError> {
    SecretKey::from_slice(bytes).map_err(|e| WalletError::InvalidKey(e.to_string()))
}

fn fingerprint_of(public: &PublicKey) -> [u8; 4] {
    let hash160 = Ripemd160::digest(Sha256::digest(public.serialize()));
    let mut fp = [0u8; 4];
    fp.copy_from_slice(&hash160[..4]);
    fp
}

fn hmac_sha512(key: &[u8], data: &[u8]) -> Result<Zeroizing<[u8; 64]>, WalletError> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| WalletError::InvalidKey(format!("HMAC initialization failed: {}", e)))?;
    mac.update(data);
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // BIP32 test vector 1
    const TV1_SEED: &str = "000102030405060708090a0b0c0d0e0f";

    #[test]
    fn test_bip44_path() {
        let path = DerivationPath::ethereum_default();
        let raw: Vec<u32> = path.steps().iter().map(|c| c.to_raw()).collect();

        assert_eq!(raw.len(), 5);
        assert_eq!(raw[0], 0x8000002C); // 44'
        assert_eq!(raw[1], 0x8000003C); // 60'
        assert_eq!(raw[2], 0x80000000); // 0'
        assert_eq!(raw[3], 0); // 0
        assert_eq!(raw[4], 0); // 0
        assert_eq!(path.to_string(), ETHEREUM_DEFAULT);
    }

    #[test]
    fn test_path_parse_roundtrip() {
        let parsed: DerivationPath = ETHEREUM_DEFAULT.parse().unwrap();
        assert_eq!(parsed, DerivationPath::ethereum_default());
        assert_eq!(parsed, DerivationPath::ethereum(0, 0, 0).unwrap());

        let alt: DerivationPath = "m/44h/60H/1'/0/7".parse().unwrap();
        assert_eq!(alt.to_string(), "m/44'/60'/1'/0/7");

        let root: DerivationPath = "m".parse().unwrap();
        assert!(root.is_empty());
    }

    #[test]
    fn test_path_parse_errors() {
        assert!(matches!(
            "44'/60'".parse::<DerivationPath>(),
            Err(WalletError::InvalidDerivationPath(_))
        ));
        assert!(matches!(
            "m/44'/x".parse::<DerivationPath>(),
            Err(WalletError::InvalidDerivationPath(_))
        ));
        assert!(matches!(
            "m/2147483648".parse::<DerivationPath>(),
            Err(WalletError::InvalidChildIndex(_))
        ));
        assert!(matches!(
            "m/99999999999".parse::<DerivationPath>(),
            Err(WalletError::InvalidChildIndex(_))
        ));
    }

    #[test]
    fn test_child_number_range() {
        assert!(ChildNumber::new(HARDENED_OFFSET, true).is_err());
        assert!(ChildNumber::new(HARDENED_OFFSET - 1, false).is_ok());
        let c = ChildNumber::from_raw(HARDENED_OFFSET + 5);
        assert!(c.is_hardened());
        assert_eq!(c.index(), 5);
    }

    #[test]
    fn test_master_key_vector_1() {
        let seed = hex::decode(TV1_SEED).unwrap();
        let master = ExtendedKey::master(&seed).unwrap();
        assert_eq!(
            master.to_xprv().unwrap(),
            "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi"
        );
        assert_eq!(
            master.to_xpub(),
            "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8"
        );
    }

    #[test]
    fn test_hardened_child_vector_1() {
        let seed = hex::decode(TV1_SEED).unwrap();
        let child = ExtendedKey::master(&seed)
            .unwrap()
            .derive(&"m/0'".parse().unwrap())
            .unwrap();
        assert_eq!(
            child.to_xprv().unwrap(),
            "xprv9uHRZZhk6KAJC1avXpDAp4MDc3sQKNxDiPvvkX8Br5ngLNv1TxvUxt4cV1rGL5hj6KCesnDYUhd7oWgT11eZG7XnxHrnYeSvkzY7d2bhkJ7"
        );
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let seed = [7u8; 64];
        let path = DerivationPath::ethereum_default();
        let a = ExtendedKey::master(&seed).unwrap().derive(&path).unwrap();
        let b = ExtendedKey::master(&seed).unwrap().derive(&path).unwrap();
        assert_eq!(a.private_key_bytes(), b.private_key_bytes());
        assert_eq!(a.chain_code(), b.chain_code());
        assert_eq!(a.depth(), 5);
    }

    #[test]
    fn test_each_path_step_changes_key() {
        let master = ExtendedKey::master(&[7u8; 64]).unwrap();
        let base = DerivationPath::ethereum_default();
        let base_key = master.derive(&base).unwrap();

        for i in 0..base.len() {
            let mut steps = base.steps().to_vec();
            let step = steps[i];
            steps[i] = ChildNumber::new(step.index() + 1, step.is_hardened()).unwrap();
            let varied = master.derive(&DerivationPath::new(steps)).unwrap();
            assert_ne!(varied.private_key_bytes(), base_key.private_key_bytes(), "step {i}");
        }
    }

    #[test]
    fn test_hardened_from_public_only_fails() {
        let seed = [1u8; 64];
        let public = ExtendedKey::master(&seed).unwrap().neuter();
        let err = public.derive_child(ChildNumber::hardened(0).unwrap()).unwrap_err();
        assert!(matches!(err, WalletError::HardenedFromPublicOnly));
    }

    #[test]
    fn test_public_derivation_matches_private() {
        let seed = [3u8; 64];
        let account: DerivationPath = "m/44'/60'/0'".parse().unwrap();
        let account_key = ExtendedKey::master(&seed).unwrap().derive(&account).unwrap();

        let tail: DerivationPath = "m/0/5".parse().unwrap();
        let from_private = account_key.derive(&tail).unwrap();
        let from_public = account_key.neuter().derive(&tail).unwrap();

        assert!(!from_public.has_private_key());
        assert_eq!(from_private.public_key(), from_public.public_key());
        assert_eq!(from_private.chain_code(), from_public.chain_code());
        assert_eq!(from_private.to_xpub(), from_public.to_xpub());
    }

    #[test]
    fn test_parent_fingerprint_links_keys() {
        let master = ExtendedKey::master(&[9u8; 32]).unwrap();
        let child = master.derive_child(ChildNumber::normal(1).unwrap()).unwrap();
        assert_eq!(child.parent_fingerprint(), master.fingerprint());
        assert_eq!(child.child_number(), ChildNumber::normal(1).unwrap());
    }

    #[test]
    fn test_seed_length_bounds() {
        assert!(ExtendedKey::master(&[0u8; 15]).is_err());
        assert!(ExtendedKey::master(&[0u8; 65]).is_err());
        assert!(ExtendedKey::master(&[0u8; 16]).is_ok());
    }

    #[test]
    fn test_xprv_requires_private_key() {
        let public = ExtendedKey::master(&[1u8; 32]).unwrap().neuter();
        assert!(public.to_xprv().is_err());
        assert!(public.private_key_bytes().is_none());
    }

    #[test]
    fn test_debug_does_not_leak_private_key() {
        let key = ExtendedKey::master(&[5u8; 32]).unwrap();
        let secret_hex = hex::encode(key.private_key_bytes().unwrap());
        assert!(!format!("{:?}", key).contains(&secret_hex));
    }
}
