use crate::encoding::EncodingError;
use crate::types::blockchain::{block_type, precommit_type, Block, BlockProof};
use crate::types::primitives::{Hash, PublicKey};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while checking a block's precommits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    #[error("Precommit names validator {validator}, but only {total} validators are known")]
    UnknownValidator { validator: u32, total: usize },

    #[error("Precommit from validator {validator} is for height {got}, block is at {expected}")]
    HeightMismatch {
        validator: u32,
        expected: u64,
        got: u64,
    },

    #[error("Precommit from validator {validator} votes for block {got}, expected {expected}")]
    BlockHashMismatch {
        validator: u32,
        expected: Hash,
        got: Hash,
    },

    #[error("Precommit from validator {validator} is for round {got}, others are for round {expected}")]
    RoundMismatch {
        validator: u32,
        expected: u32,
        got: u32,
    },

    #[error("Invalid precommit signature from validator {validator}")]
    InvalidSignature { validator: u32 },

    #[error("Insufficient quorum: {signed}/{total} validators signed (need more than {threshold})")]
    InsufficientQuorum {
        signed: usize,
        total: usize,
        threshold: usize,
    },

    #[error("Failed to serialize consensus message: {0}")]
    Encoding(#[from] EncodingError),
}

/// Hash of a block header: `sha256` of its 116-byte serialization.
pub fn block_hash(block: &Block) -> Result<Hash, EncodingError> {
    block_type()?.hash(&block.to_record())
}

/// Largest signer count that does NOT finalize a block among `validators`.
///
/// A block needs strictly more than `floor(2n / 3)` distinct signers.
pub fn quorum_threshold(validators: usize) -> usize {
    validators.saturating_mul(2) / 3
}

/// Verify that `proof.block` was finalized by a supermajority of `validators`.
///
/// Every precommit must name a known validator, match the block's height and
/// hash, share a single round and carry a valid signature over its
/// pre-signature message bytes. Any bad precommit rejects the whole proof.
/// Duplicate precommits from one validator count once.
pub fn verify_block(proof: &BlockProof, validators: &[PublicKey]) -> Result<(), ConsensusError> {
    let block = &proof.block;
    let expected_hash = block_hash(block)?;
    let precommit_type = precommit_type()?;

    let mut round = None;
    let mut signers = BTreeSet::new();
    for precommit in &proof.precommits {
        let body = &precommit.body;
        let validator = body.validator;

        let public_key = usize::try_from(validator)
            .ok()
            .and_then(|index| validators.get(index))
            .ok_or(ConsensusError::UnknownValidator {
                validator,
                total: validators.len(),
            })?;

        if body.height != block.height {
            return Err(ConsensusError::HeightMismatch {
                validator,
                expected: block.height,
                got: body.height,
            });
        }
        if body.block_hash != expected_hash {
            return Err(ConsensusError::BlockHashMismatch {
                validator,
                expected: expected_hash,
                got: body.block_hash,
            });
        }
        match round {
            None => round = Some(body.round),
            Some(expected) if expected != body.round => {
                return Err(ConsensusError::RoundMismatch {
                    validator,
                    expected,
                    got: body.round,
                })
            }
            Some(_) => {}
        }

        if !precommit_type.verify_signature(&body.to_record(), &precommit.signature, public_key)? {
            warn!(validator, height = block.height, "Invalid precommit signature");
            return Err(ConsensusError::InvalidSignature { validator });
        }
        signers.insert(validator);
    }

    let total = validators.len();
    let threshold = quorum_threshold(total);
    if signers.len() <= threshold {
        warn!(
            signed = signers.len(),
            total,
            height = block.height,
            "Block lacks a supermajority of precommits"
        );
        return Err(ConsensusError::InsufficientQuorum {
            signed: signers.len(),
            total,
            threshold,
        });
    }

    debug!(
        height = block.height,
        signed = signers.len(),
        total,
        "Block commit verified"
    );
    Ok(())
}

/// `true` iff [`verify_block`] accepts the proof.
pub fn is_block_committed(proof: &BlockProof, validators: &[PublicKey]) -> bool {
    verify_block(proof, validators).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::types::blockchain::{Precommit, SignedPrecommit};

    fn validators(n: u8) -> Vec<KeyPair> {
        (0..n).map(|i| KeyPair::from_seed([i + 1; 32])).collect()
    }

    fn sample_block() -> Block {
        Block {
            height: 10,
            propose_round: 2,
            time: 42,
            prev_hash: Hash::new([1; 32]),
            tx_hash: Hash::new([2; 32]),
            state_hash: Hash::new([3; 32]),
        }
    }

    fn precommit(keys: &[KeyPair], validator: u32, block: &Block) -> SignedPrecommit {
        let body = Precommit {
            validator,
            height: block.height,
            round: 2,
            propose_hash: Hash::new([9; 32]),
            block_hash: block_hash(block).unwrap(),
        };
        let signature = precommit_type()
            .unwrap()
            .sign(&body.to_record(), &keys[validator as usize].secret_key)
            .unwrap();
        SignedPrecommit { body, signature }
    }

    fn public_keys(keys: &[KeyPair]) -> Vec<PublicKey> {
        keys.iter().map(|k| k.public_key).collect()
    }

    #[test]
    fn test_quorum_threshold() {
        assert_eq!(quorum_threshold(0), 0);
        assert_eq!(quorum_threshold(1), 0);
        assert_eq!(quorum_threshold(3), 2);
        assert_eq!(quorum_threshold(4), 2);
        assert_eq!(quorum_threshold(7), 4);
    }

    #[test]
    fn test_single_validator() {
        let keys = validators(1);
        let block = sample_block();
        let proof = BlockProof {
            precommits: vec![precommit(&keys, 0, &block)],
            block,
        };
        assert_eq!(verify_block(&proof, &public_keys(&keys)), Ok(()));
    }

    #[test]
    fn test_unknown_validator() {
        let keys = validators(2);
        let block = sample_block();
        let mut signed = precommit(&keys, 1, &block);
        signed.body.validator = 5;
        let proof = BlockProof {
            block,
            precommits: vec![signed],
        };
        assert_eq!(
            verify_block(&proof, &public_keys(&keys)),
            Err(ConsensusError::UnknownValidator {
                validator: 5,
                total: 2
            })
        );
    }

    #[test]
    fn test_tampered_body_fails_signature() {
        let keys = validators(1);
        let block = sample_block();
        let mut signed = precommit(&keys, 0, &block);
        signed.body.propose_hash = Hash::new([8; 32]);
        let proof = BlockProof {
            block,
            precommits: vec![signed],
        };
        assert_eq!(
            verify_block(&proof, &public_keys(&keys)),
            Err(ConsensusError::InvalidSignature { validator: 0 })
        );
    }

    #[test]
    fn test_no_validators_never_commits() {
        let proof = BlockProof {
            block: sample_block(),
            precommits: Vec::new(),
        };
        assert!(!is_block_committed(&proof, &[]));
    }
}
