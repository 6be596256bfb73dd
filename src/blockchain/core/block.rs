use crate::crypto::{hash_data, KeyPair};
use crate::error::ChainError;
use crate::transaction::Transaction;
use crate::utils::{gen_timestamp, serialize};
use serde_json::{json, Map, Value};

/// A set of transactions proposed by one node.
///
/// The block id is never stored: it is the content hash of the canonical
/// body and is recomputed whenever it is needed.
#[derive(Debug, Clone)]
pub struct Block {
    pub transactions: Vec<Transaction>,
    pub node_pubkey: Option<String>,
    pub timestamp: String,
    pub voters: Vec<String>,
    pub signature: Option<String>,
}

impl Default for Block {
    fn default() -> Self {
        Block::new(Vec::new())
    }
}

impl Block {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Block {
            transactions,
            node_pubkey: None,
            timestamp: gen_timestamp(),
            voters: Vec::new(),
            signature: None,
        }
    }

    pub fn with_node_pubkey(mut self, node_pubkey: impl Into<String>) -> Self {
        self.node_pubkey = Some(node_pubkey.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn with_voters(mut self, voters: Vec<String>) -> Self {
        self.voters = voters;
        self
    }

    /// The canonical body. A block without a claimed signer has no body.
    pub fn body(&self) -> Result<Value, ChainError> {
        let node_pubkey = self
            .node_pubkey
            .as_ref()
            .ok_or(ChainError::MissingNodePubkey)?;
        let transactions = self
            .transactions
            .iter()
            .map(Transaction::to_dict)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(json!({
            "timestamp": self.timestamp,
            "transactions": transactions,
            "node_pubkey": node_pubkey,
            "voters": self.voters,
        }))
    }

    /// Canonical body bytes; the input to both the hash and the signature.
    pub fn serialize(&self) -> Result<String, ChainError> {
        serialize(&self.body()?)
    }

    pub fn id(&self) -> Result<String, ChainError> {
        Ok(hash_data(self.serialize()?.as_bytes()))
    }

    pub fn to_dict(&self) -> Result<Value, ChainError> {
        let body = self.body()?;
        Ok(json!({
            "id": hash_data(serialize(&body)?.as_bytes()),
            "block": body,
            "signature": self.signature,
        }))
    }

    /// Rebuilds a block from its dict form. The embedded id is checked
    /// against the hash of the raw body before anything else is looked at.
    pub fn from_dict(data: &Value) -> Result<Self, ChainError> {
        let body = data.get("block").cloned().unwrap_or(Value::Null);
        let computed = hash_data(serialize(&body)?.as_bytes());
        let claimed = data.get("id").and_then(Value::as_str);
        if claimed != Some(computed.as_str()) {
            return Err(ChainError::InvalidHash(format!(
                "block id {} does not match its content hash {}",
                claimed.unwrap_or("<missing>"),
                computed
            )));
        }

        let body = body.as_object().ok_or_else(|| {
            ChainError::TypeMismatch(format!(
                "block body must be an object, got {}",
                json_type(&body)
            ))
        })?;

        let transactions = match list_field(body, "transactions")? {
            Some(items) => items
                .iter()
                .map(Transaction::from_dict)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        let voters = match list_field(body, "voters")? {
            Some(items) => items
                .iter()
                .map(|v| {
                    v.as_str().map(str::to_string).ok_or_else(|| {
                        ChainError::TypeMismatch(format!(
                            "voters must be strings, got {}",
                            json_type(v)
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        let timestamp = match body.get("timestamp") {
            Some(Value::String(ts)) => ts.clone(),
            Some(other) => {
                return Err(ChainError::TypeMismatch(format!(
                    "`timestamp` must be a string, got {}",
                    json_type(other)
                )))
            }
            None => {
                return Err(ChainError::TypeMismatch(
                    "block has no `timestamp`".to_string(),
                ))
            }
        };

        Ok(Block {
            transactions,
            node_pubkey: optional_string(body.get("node_pubkey"), "node_pubkey")?,
            timestamp,
            voters,
            signature: optional_string(data.get("signature"), "signature")?,
        })
    }

    /// Returns a copy of this block signed over its canonical body.
    pub fn sign(&self, key: &KeyPair) -> Result<Self, ChainError> {
        let message = self.serialize()?;
        let signature = key.sign(message.as_bytes())?;
        Ok(Block {
            signature: Some(signature),
            ..self.clone()
        })
    }

    /// Verifies the signature against the claimed `node_pubkey`.
    pub fn verify_signature(&self) -> Result<(), ChainError> {
        let node_pubkey = self
            .node_pubkey
            .as_deref()
            .ok_or(ChainError::MissingNodePubkey)?;
        let signature = self
            .signature
            .as_deref()
            .ok_or_else(|| ChainError::InvalidSignature("block is not signed".to_string()))?;
        let message = self.serialize()?;
        crate::crypto::verify_signature(node_pubkey, message.as_bytes(), signature).map_err(|e| {
            ChainError::InvalidSignature(format!(
                "block signature does not verify against {}: {}",
                node_pubkey, e
            ))
        })
    }

    pub fn is_signature_valid(&self) -> bool {
        self.verify_signature().is_ok()
    }

    pub fn transaction_ids(&self) -> impl Iterator<Item = &str> {
        self.transactions.iter().map(|tx| tx.id.as_str())
    }
}

/// Two blocks are the same block when their contents match; the signature
/// is not part of a block's identity.
impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.transactions == other.transactions
            && self.node_pubkey == other.node_pubkey
            && self.timestamp == other.timestamp
            && self.voters == other.voters
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn list_field<'a>(
    body: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Vec<Value>>, ChainError> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(ChainError::TypeMismatch(format!(
            "`{}` must be a list or null, got {}",
            key,
            json_type(other)
        ))),
    }
}

fn optional_string(value: Option<&Value>, key: &str) -> Result<Option<String>, ChainError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ChainError::TypeMismatch(format!(
            "`{}` must be a string or null, got {}",
            key,
            json_type(other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_tx(owner: &KeyPair, nonce: u64) -> Transaction {
        Transaction::create(
            vec![owner.public_key_hex()],
            vec![(vec![owner.public_key_hex()], 1)],
            None,
            Some(json!({ "nonce": nonce })),
        )
        .unwrap()
        .sign(std::slice::from_ref(owner))
        .unwrap()
    }

    #[test]
    fn test_block_initialization() {
        let block = Block::default();
        assert!(block.transactions.is_empty());
        assert!(block.voters.is_empty());
        assert!(block.node_pubkey.is_none());
        assert!(block.signature.is_none());
        assert!(block.timestamp.parse::<i64>().is_ok());
    }

    #[test]
    fn test_block_serialization() {
        let me = KeyPair::generate().unwrap();
        let transactions = vec![create_tx(&me, 1)];
        let voters = vec!["Qaaa".to_string(), "Qbbb".to_string()];
        let block = Block::new(transactions.clone())
            .with_node_pubkey(me.public_key_hex())
            .with_timestamp("1")
            .with_voters(voters.clone());

        let expected_body = json!({
            "timestamp": "1",
            "transactions": [transactions[0].to_dict().unwrap()],
            "node_pubkey": me.public_key_hex(),
            "voters": voters,
        });
        let expected = json!({
            "id": hash_data(serialize(&expected_body).unwrap().as_bytes()),
            "block": expected_body,
            "signature": null,
        });
        assert_eq!(block.to_dict().unwrap(), expected);
    }

    #[test]
    fn test_block_without_signer_cannot_serialize() {
        let block = Block::new(Vec::new());
        assert_eq!(block.to_dict(), Err(ChainError::MissingNodePubkey));
        assert_eq!(block.id(), Err(ChainError::MissingNodePubkey));
    }

    #[test]
    fn test_block_round_trip() {
        let me = KeyPair::generate().unwrap();
        let block = Block::new(vec![create_tx(&me, 1), create_tx(&me, 2)])
            .with_node_pubkey(me.public_key_hex())
            .with_voters(vec!["Qaaa".to_string()])
            .sign(&me)
            .unwrap();

        let back = Block::from_dict(&block.to_dict().unwrap()).unwrap();
        assert_eq!(back, block);
        assert_eq!(back.signature, block.signature);
        assert_eq!(back.id().unwrap(), block.id().unwrap());
    }

    #[test]
    fn test_block_invalid_id_deserialization() {
        let me = KeyPair::generate().unwrap();
        let data = json!({
            "id": "an invalid id",
            "block": { "node_pubkey": me.public_key_hex() },
        });
        assert!(matches!(
            Block::from_dict(&data),
            Err(ChainError::InvalidHash(_))
        ));
    }

    #[test]
    fn test_block_type_mismatch() {
        let body = json!({
            "timestamp": "1",
            "transactions": "not a list or null",
            "node_pubkey": "abc",
            "voters": [],
        });
        let data = json!({
            "id": hash_data(serialize(&body).unwrap().as_bytes()),
            "block": body,
            "signature": null,
        });
        assert!(matches!(
            Block::from_dict(&data),
            Err(ChainError::TypeMismatch(_))
        ));

        let body = json!({
            "timestamp": "1",
            "transactions": null,
            "node_pubkey": "abc",
            "voters": "not a list or null",
        });
        let data = json!({
            "id": hash_data(serialize(&body).unwrap().as_bytes()),
            "block": body,
        });
        assert!(matches!(
            Block::from_dict(&data),
            Err(ChainError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_sign_block() {
        let me = KeyPair::generate().unwrap();
        let block = Block::new(vec![create_tx(&me, 1)]).with_node_pubkey(me.public_key_hex());
        let signed = block.sign(&me).unwrap();

        assert!(block.signature.is_none());
        assert!(signed.is_signature_valid());
        let message = block.serialize().unwrap();
        assert!(crate::crypto::verify_signature(
            &me.public_key_hex(),
            message.as_bytes(),
            signed.signature.as_deref().unwrap()
        )
        .is_ok());
    }

    #[test]
    fn test_block_invalid_signature() {
        let me = KeyPair::generate().unwrap();
        let other = KeyPair::generate().unwrap();
        let block = Block::new(vec![create_tx(&me, 1)]).with_node_pubkey(me.public_key_hex());

        let mut forged = block.clone();
        forged.signature = Some("an invalid signature".to_string());
        assert!(matches!(
            forged.verify_signature(),
            Err(ChainError::InvalidSignature(_))
        ));

        let wrong_key = block.sign(&other).unwrap();
        assert!(matches!(
            wrong_key.verify_signature(),
            Err(ChainError::InvalidSignature(_))
        ));

        assert!(matches!(
            block.verify_signature(),
            Err(ChainError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_compare_blocks() {
        let me = KeyPair::generate().unwrap();
        let transactions = vec![create_tx(&me, 1)];
        let a = Block::new(transactions.clone()).with_timestamp("5");
        let b = Block::new(transactions).with_timestamp("5");
        assert_eq!(a, b);
        assert_ne!(a, Block::new(Vec::new()).with_timestamp("5"));
    }
}
