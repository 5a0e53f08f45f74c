use std::fmt;

use k256::ecdsa::SigningKey;
use thiserror::Error;

use super::abi::{format_hex_prefixed, keccak256, parse_hex_prefixed};

pub type Address = [u8; 20];

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Parse a `0x`-prefixed 20-byte address.
pub fn parse_address(input: &str) -> Result<Address, String> {
    let bytes = parse_hex_prefixed(input.trim()).map_err(|e| e.to_string())?;
    Address::try_from(bytes.as_slice())
        .map_err(|_| format!("expected 20 bytes, got {}", bytes.len()))
}

pub fn format_address(address: &Address) -> String {
    format_hex_prefixed(address)
}

/// The keeper's single signing credential.
///
/// `Debug` only shows the derived address.
pub struct Signer {
    key: SigningKey,
    address: Address,
}

impl Signer {
    pub fn from_hex(secret: &str) -> Result<Self, SignerError> {
        let bytes = parse_hex_prefixed(secret.trim())
            .map_err(|_| SignerError::InvalidKey("not hex".into()))?;
        if bytes.len() != 32 {
            return Err(SignerError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let key = SigningKey::from_slice(&bytes)
            .map_err(|_| SignerError::InvalidKey("scalar out of range".into()))?;
        let address = address_of(&key);
        Ok(Self { key, address })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Sign `tx` and return the raw RLP bytes ready for `eth_sendRawTransaction`.
    pub fn sign(&self, tx: &LegacyTransaction) -> Result<Vec<u8>, SignerError> {
        let hash = tx.signing_hash();
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&hash)
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        let bytes = signature.to_bytes();
        let (r, s) = bytes.split_at(32);
        let v = u64::from(recovery_id.to_byte()) + 35 + 2 * tx.chain_id;
        Ok(tx.encode_signed(v, r, s))
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("address", &format_address(&self.address))
            .finish_non_exhaustive()
    }
}

fn address_of(key: &SigningKey) -> Address {
    let point = key.verifying_key().to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

/// Pre-EIP-2718 transaction with EIP-155 replay protection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: u128,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

impl LegacyTransaction {
    fn encode_body(&self, out: &mut Vec<u8>) {
        rlp::encode_uint(u128::from(self.nonce), out);
        rlp::encode_uint(self.gas_price, out);
        rlp::encode_uint(u128::from(self.gas_limit), out);
        rlp::encode_bytes(&self.to, out);
        rlp::encode_uint(self.value, out);
        rlp::encode_bytes(&self.data, out);
    }

    pub fn signing_hash(&self) -> [u8; 32] {
        let mut payload = Vec::new();
        self.encode_body(&mut payload);
        rlp::encode_uint(u128::from(self.chain_id), &mut payload);
        rlp::encode_uint(0, &mut payload);
        rlp::encode_uint(0, &mut payload);
        let mut out = Vec::with_capacity(payload.len() + 3);
        rlp::encode_list(&payload, &mut out);
        keccak256(&out)
    }

    fn encode_signed(&self, v: u64, r: &[u8], s: &[u8]) -> Vec<u8> {
        let mut payload = Vec::new();
        self.encode_body(&mut payload);
        rlp::encode_uint(u128::from(v), &mut payload);
        rlp::encode_scalar(r, &mut payload);
        rlp::encode_scalar(s, &mut payload);
        let mut out = Vec::with_capacity(payload.len() + 3);
        rlp::encode_list(&payload, &mut out);
        out
    }
}

mod rlp {
    pub fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
        if bytes.len() == 1 && bytes[0] < 0x80 {
            out.push(bytes[0]);
        } else {
            encode_header(0x80, bytes.len(), out);
            out.extend_from_slice(bytes);
        }
    }

    pub fn encode_uint(value: u128, out: &mut Vec<u8>) {
        encode_scalar(&value.to_be_bytes(), out);
    }

    /// Big-endian integer with leading zeros stripped.
    pub fn encode_scalar(be: &[u8], out: &mut Vec<u8>) {
        let first = be.iter().position(|b| *b != 0).unwrap_or(be.len());
        encode_bytes(&be[first..], out);
    }

    pub fn encode_list(payload: &[u8], out: &mut Vec<u8>) {
        encode_header(0xc0, payload.len(), out);
        out.extend_from_slice(payload);
    }

    fn encode_header(offset: u8, len: usize, out: &mut Vec<u8>) {
        if len <= 55 {
            out.push(offset + len as u8);
        } else {
            let be = (len as u64).to_be_bytes();
            let first = be.iter().position(|b| *b != 0).unwrap_or(be.len());
            out.push(offset + 55 + (be.len() - first) as u8);
            out.extend_from_slice(&be[first..]);
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    // Example transaction from EIP-155.
    fn eip155_example() -> LegacyTransaction {
        LegacyTransaction {
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            to: [0x35; 20],
            value: 1_000_000_000_000_000_000,
            data: vec![],
            chain_id: 1,
        }
    }

    #[test]
    fn eip155_signing_hash() {
        assert_eq!(
            hex::encode(eip155_example().signing_hash()),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn eip155_signed_transaction() {
        let signer = Signer::from_hex(&format!("0x{}", "46".repeat(32))).unwrap();
        let raw = signer.sign(&eip155_example()).unwrap();
        assert_eq!(
            hex::encode(raw),
            "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a7640000\
             8025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d899\
             7f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
    }

    #[test]
    fn address_from_secret_key_one() {
        let signer = Signer::from_hex(&format!("{}01", "00".repeat(31))).unwrap();
        assert_eq!(
            format_address(signer.address()),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn rejects_bad_keys() {
        assert!(Signer::from_hex("0x1234").is_err());
        assert!(Signer::from_hex("not-a-key").is_err());
        assert!(Signer::from_hex(&"00".repeat(32)).is_err());
    }

    #[test]
    fn debug_hides_key() {
        let signer = Signer::from_hex(&"46".repeat(32)).unwrap();
        let rendered = format!("{signer:?}");
        assert!(!rendered.contains(&"46".repeat(32)));
        assert!(rendered.contains("address"));
    }

    #[test]
    fn parses_addresses() {
        let addr = parse_address("0x8e6b0c11e3c98fcf40001269759083cf0d3ccbfb").unwrap();
        assert_eq!(format_address(&addr), "0x8e6b0c11e3c98fcf40001269759083cf0d3ccbfb");
        assert!(parse_address("0x8e6b").is_err());
    }
}
