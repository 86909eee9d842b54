use lantern_core::crypto::KeyPair;
use lantern_core::{
    block_hash, is_block_committed, precommit_type, verify_block, Block, BlockProof, ConsensusError, Hash,
    Precommit, PublicKey, SignedPrecommit,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

struct Network {
    keys: Vec<KeyPair>,
    block: Block,
}

impl Network {
    fn new(validators: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(2024);
        Self {
            keys: (0..validators).map(|_| KeyPair::generate(&mut rng)).collect(),
            block: Block {
                height: 1_000,
                propose_round: 3,
                time: 1_700_000_000_000_000_000,
                prev_hash: Hash::new([0xA1; 32]),
                tx_hash: Hash::new([0xB2; 32]),
                state_hash: Hash::new([0xC3; 32]),
            },
        }
    }

    fn public_keys(&self) -> Vec<PublicKey> {
        self.keys.iter().map(|k| k.public_key).collect()
    }

    fn precommit(&self, validator: u32) -> SignedPrecommit {
        let body = Precommit {
            validator,
            height: self.block.height,
            round: 3,
            propose_hash: Hash::new([0xDD; 32]),
            block_hash: block_hash(&self.block).unwrap(),
        };
        self.sign(body)
    }

    fn sign(&self, body: Precommit) -> SignedPrecommit {
        let signature = precommit_type()
            .unwrap()
            .sign(&body.to_record(), &self.keys[body.validator as usize].secret_key)
            .unwrap();
        SignedPrecommit { body, signature }
    }

    fn proof(&self, precommits: Vec<SignedPrecommit>) -> BlockProof {
        BlockProof {
            block: self.block.clone(),
            precommits,
        }
    }
}

#[test]
fn test_three_of_four_commits() {
    let net = Network::new(4);
    let proof = net.proof((0..3).map(|v| net.precommit(v)).collect());
    assert_eq!(verify_block(&proof, &net.public_keys()), Ok(()));
}

#[test]
fn test_two_of_four_does_not_commit() {
    let net = Network::new(4);
    let proof = net.proof(vec![net.precommit(1), net.precommit(3)]);
    assert_eq!(
        verify_block(&proof, &net.public_keys()),
        Err(ConsensusError::InsufficientQuorum {
            signed: 2,
            total: 4,
            threshold: 2
        })
    );
}

#[test]
fn test_duplicate_precommits_count_once() {
    let net = Network::new(4);
    let proof = net.proof(vec![net.precommit(0), net.precommit(0), net.precommit(2), net.precommit(2)]);
    assert!(!is_block_committed(&proof, &net.public_keys()));
}

#[test]
fn test_height_mismatch() {
    let net = Network::new(4);
    let mut body = net.precommit(1).body;
    body.height += 1;
    let proof = net.proof(vec![net.precommit(0), net.sign(body), net.precommit(2)]);
    assert!(matches!(
        verify_block(&proof, &net.public_keys()),
        Err(ConsensusError::HeightMismatch { validator: 1, .. })
    ));
}

#[test]
fn test_vote_for_other_block() {
    let net = Network::new(4);
    let mut body = net.precommit(2).body;
    body.block_hash = Hash::new([0xEE; 32]);
    let proof = net.proof(vec![net.precommit(0), net.precommit(1), net.sign(body)]);
    assert!(matches!(
        verify_block(&proof, &net.public_keys()),
        Err(ConsensusError::BlockHashMismatch { validator: 2, .. })
    ));
}

#[test]
fn test_mixed_rounds_rejected() {
    let net = Network::new(4);
    let mut body = net.precommit(2).body;
    body.round = 4;
    let proof = net.proof(vec![net.precommit(0), net.precommit(1), net.sign(body)]);
    assert_eq!(
        verify_block(&proof, &net.public_keys()),
        Err(ConsensusError::RoundMismatch {
            validator: 2,
            expected: 3,
            got: 4
        })
    );
}

#[test]
fn test_signature_from_wrong_validator() {
    let net = Network::new(4);
    let mut forged = net.precommit(0);
    forged.body.validator = 3;
    let proof = net.proof(vec![net.precommit(1), net.precommit(2), forged]);
    assert_eq!(
        verify_block(&proof, &net.public_keys()),
        Err(ConsensusError::InvalidSignature { validator: 3 })
    );
}

#[test]
fn test_block_proof_from_json() {
    let net = Network::new(4);
    let proof = net.proof((1..4).map(|v| net.precommit(v)).collect());
    let json = serde_json::to_string(&proof).unwrap();
    let parsed: BlockProof = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, proof);

    let keys: Vec<PublicKey> =
        serde_json::from_value(serde_json::to_value(net.public_keys()).unwrap()).unwrap();
    assert!(is_block_committed(&parsed, &keys));
}
