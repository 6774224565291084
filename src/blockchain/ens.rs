//! ENS name resolution helpers (EIP-137)
//!
//! Resolution is two `eth_call`s against the chain:
//! 1. `registry.resolver(namehash(name))` returns the resolver contract,
//! 2. `resolver.addr(namehash(name))` returns the address record.
//!
//! A zero address at either step means the name has no record.

use crate::core::address::{Address, ADDRESS_LEN};
use crate::core::errors::LedgerError;

/// `resolver(bytes32)`
pub const RESOLVER_SELECTOR: [u8; 4] = [0x01, 0x78, 0xb8, 0xbf];

/// `addr(bytes32)`
pub const ADDR_SELECTOR: [u8; 4] = [0x3b, 0x3b, 0x57, 0xde];

const WORD_LEN: usize = 32;

/// Lowercase and trim a name; `None` if it is empty or has an empty label.
pub fn normalize(name: &str) -> Option<String> {
    let name = name.trim();
    let name = name.strip_suffix('.').unwrap_or(name).to_lowercase();
    if name.is_empty() || name.split('.').any(|label| label.is_empty()) {
        return None;
    }
    Some(name)
}

/// EIP-137 namehash. The empty name hashes to 32 zero bytes.
pub fn namehash(name: &str) -> [u8; 32] {
    ethers::providers::ens::namehash(name).to_fixed_bytes()
}

/// ABI-encode a call taking a single `bytes32` argument.
pub fn encode_call(selector: [u8; 4], node: &[u8; 32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + WORD_LEN);
    data.extend_from_slice(&selector);
    data.extend_from_slice(node);
    data
}

/// Decode an ABI `address` return value. Empty output (no contract at the
/// target) and the zero address both mean "no record".
pub fn decode_address_word(data: &[u8]) -> Result<Option<Address>, LedgerError> {
    if data.is_empty() {
        return Ok(None);
    }
    if data.len() < WORD_LEN {
        return Err(LedgerError::Malformed(format!(
            "address return value is {} bytes, expected {}",
            data.len(),
            WORD_LEN
        )));
    }

    let word = &data[..WORD_LEN];
    let padding = WORD_LEN - ADDRESS_LEN;
    if word[..padding].iter().any(|b| *b != 0) {
        return Err(LedgerError::Malformed(format!(
            "address word has non-zero padding: 0x{}",
            hex::encode(word)
        )));
    }

    let address = Address::from_slice(&word[padding..])
        .map_err(|e| LedgerError::Malformed(e.to_string()))?;
    Ok((!address.is_zero()).then_some(address))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address::keccak256;

    #[test]
    fn test_selectors_match_signatures() {
        assert_eq!(keccak256(b"resolver(bytes32)")[..4], RESOLVER_SELECTOR);
        assert_eq!(keccak256(b"addr(bytes32)")[..4], ADDR_SELECTOR);
    }

    #[test]
    fn test_namehash_vectors() {
        assert_eq!(namehash(""), [0u8; 32]);
        assert_eq!(
            hex::encode(namehash("eth")),
            "93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae"
        );
        assert_eq!(
            hex::encode(namehash("foo.eth")),
            "de9b09fd7c5f901e23a3f19fecc54828e9c848539801e86591bd9801b019f84f"
        );
        assert_eq!(namehash("michalzalecki.test"), namehash(&normalize("MichalZalecki.Test.").unwrap()));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(" Vitalik.ETH ").as_deref(), Some("vitalik.eth"));
        assert_eq!(normalize("michalzalecki.test.").as_deref(), Some("michalzalecki.test"));
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("foo..eth"), None);
        assert_eq!(normalize(".eth"), None);
        assert_eq!(normalize("foo.."), None);
    }

    #[test]
    fn test_encode_call_layout() {
        let node = namehash("eth");
        let data = encode_call(ADDR_SELECTOR, &node);
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &ADDR_SELECTOR);
        assert_eq!(&data[4..], &node);
    }

    #[test]
    fn test_decode_address_word() {
        assert_eq!(decode_address_word(&[]).unwrap(), None);
        assert_eq!(decode_address_word(&[0u8; 32]).unwrap(), None);

        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&[0xab; 20]);
        assert_eq!(
            decode_address_word(&word).unwrap(),
            Some(Address::from_bytes([0xab; 20]))
        );

        assert!(matches!(decode_address_word(&[1u8; 8]), Err(LedgerError::Malformed(_))));
        assert!(matches!(decode_address_word(&[1u8; 32]), Err(LedgerError::Malformed(_))));
    }
}
