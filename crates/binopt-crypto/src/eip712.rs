//! EIP-712 typed structured data hashing
//!
//! Messages describe themselves as a type name plus an ordered list of
//! fields. The type string, type hash, struct hash and final digest are all
//! derived from that description, so a message cannot disagree with its own
//! encoding.
//!
//! ```text
//! digest = keccak256(0x19 0x01 || domainSeparator || hashStruct(message))
//! ```

use crate::hash::{keccak256, keccak256_concat};
use binopt_types::Address;

const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// A value of one of the Solidity types the protocol signs over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eip712Value {
    Address(Address),
    Uint(u128),
    Bool(bool),
    String(String),
}

impl Eip712Value {
    /// Solidity type name used in the encoded type string
    pub fn solidity_type(&self) -> &'static str {
        match self {
            Eip712Value::Address(_) => "address",
            Eip712Value::Uint(_) => "uint256",
            Eip712Value::Bool(_) => "bool",
            Eip712Value::String(_) => "string",
        }
    }

    /// 32-byte `encodeData` word
    pub fn encode(&self) -> [u8; 32] {
        match self {
            Eip712Value::Address(a) => {
                let mut word = [0u8; 32];
                word[12..].copy_from_slice(a.as_bytes());
                word
            }
            Eip712Value::Uint(v) => uint_word(*v),
            Eip712Value::Bool(b) => uint_word(u128::from(*b)),
            Eip712Value::String(s) => keccak256(s.as_bytes()),
        }
    }
}

/// Big-endian uint256 word
pub fn uint_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// A named field of a typed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip712Field {
    pub name: &'static str,
    pub value: Eip712Value,
}

impl Eip712Field {
    pub fn new(name: &'static str, value: Eip712Value) -> Self {
        Self { name, value }
    }
}

/// EIP-712 signing domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Domain {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        chain_id: u64,
        verifying_contract: Address,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            chain_id,
            verifying_contract,
        }
    }

    /// Domain used by the router and the registrar
    pub fn validator(chain_id: u64, verifying_contract: Address) -> Self {
        Self::new("Validator", "1", chain_id, verifying_contract)
    }

    /// Domain used by the token for permits
    pub fn token(chain_id: u64, token: Address) -> Self {
        Self::new("Token", "1", chain_id, token)
    }

    pub fn separator(&self) -> [u8; 32] {
        keccak256_concat(&[
            &keccak256(DOMAIN_TYPE.as_bytes()),
            &keccak256(self.name.as_bytes()),
            &keccak256(self.version.as_bytes()),
            &uint_word(u128::from(self.chain_id)),
            &Eip712Value::Address(self.verifying_contract).encode(),
        ])
    }
}

/// A message that can be hashed as EIP-712 typed data
pub trait TypedMessage {
    /// Primary type name, e.g. `RegisterAccount`
    fn type_name(&self) -> &'static str;

    /// Fields in declaration order
    fn fields(&self) -> Vec<Eip712Field>;

    /// `Name(type1 field1,type2 field2,...)`
    fn type_string(&self) -> String {
        let members: Vec<String> = self
            .fields()
            .iter()
            .map(|f| format!("{} {}", f.value.solidity_type(), f.name))
            .collect();
        format!("{}({})", self.type_name(), members.join(","))
    }

    fn type_hash(&self) -> [u8; 32] {
        keccak256(self.type_string().as_bytes())
    }

    fn struct_hash(&self) -> [u8; 32] {
        let fields = self.fields();
        let mut encoded = Vec::with_capacity(32 * (fields.len() + 1));
        encoded.extend_from_slice(&self.type_hash());
        for field in &fields {
            encoded.extend_from_slice(&field.value.encode());
        }
        keccak256(&encoded)
    }
}

/// Final digest to be signed for `message` under `domain`
pub fn typed_data_hash<M: TypedMessage + ?Sized>(domain: &Domain, message: &M) -> [u8; 32] {
    keccak256_concat(&[b"\x19\x01", &domain.separator(), &message.struct_hash()])
}
