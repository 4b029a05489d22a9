//! Header, seal and commit-signature verification tests.

mod common;

use common::*;
use meridian_config::ChainConfig;
use meridian_crypto::SerializedSignature;
use meridian_engine::{Engine, EngineError, GenesisSelector};
use meridian_shard::schedule::ShardSchedule;
use meridian_shard::ShardState;
use meridian_types::Header;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Pre-staking configuration: staking activates far in the future.
fn pre_staking_config() -> ChainConfig {
    let mut config = ChainConfig::default();
    config.forks.pre_staking_epoch = Some(0);
    config.forks.staking_epoch = Some(100);
    config
}

/// Staking-era configuration: everything active from epoch 0.
fn staking_config() -> ChainConfig {
    let mut config = ChainConfig::default();
    config.forks.pre_staking_epoch = Some(0);
    config.forks.staking_epoch = Some(0);
    config
}

fn empty_engine() -> Arc<Engine> {
    Arc::new(Engine::new(Arc::new(GenesisSelector::new(
        ShardSchedule::new(vec![]),
    ))))
}

/// A beacon chain with a 7-slot pre-staking committee at epoch 3, a parent
/// block at number 10 and the tip past it.
fn beacon_fixture() -> (Arc<MockChain>, TestCommittee, Header) {
    let chain = Arc::new(MockChain::new(0, pre_staking_config()));
    let committee = build_committee(0, &[None; 7]);
    chain.insert_shard_state(ShardState {
        epoch: 3,
        shards: vec![committee.committee.clone()],
    });

    let parent = Header {
        shard_id: 0,
        number: 10,
        epoch: 3,
        view_id: 12,
        ..Default::default()
    };
    chain.insert_header(parent.clone());

    let tip = Header {
        shard_id: 0,
        number: 11,
        epoch: 3,
        parent_hash: parent.hash(),
        ..Default::default()
    };
    chain.set_tip(tip);

    (chain, committee, parent)
}

#[test]
fn genesis_seal_bypass() {
    let chain = MockChain::new(0, pre_staking_config());
    chain.set_tip(Header {
        number: 1,
        ..Default::default()
    });
    let engine = empty_engine();

    // A synthetic header with no commit data at all: the tip is at block 1,
    // so seal verification must succeed without consulting signatures.
    let header = Header {
        number: 2,
        ..Default::default()
    };
    engine.verify_seal(&chain, &header).unwrap();
    engine
        .verify_header_signature(&chain, &header, &SerializedSignature::default(), &[])
        .unwrap();
    assert_eq!(engine.aggregate_verifications(), 0);
}

#[test]
fn quorum_miss_with_four_of_seven() {
    let (chain, committee, parent) = beacon_fixture();
    let engine = empty_engine();

    let (sig, bitmap) = sign_commit(&committee, &[0, 1, 2, 3], &parent);
    let err = engine
        .verify_header_signature(chain.as_ref(), &parent, &sig, &bitmap)
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientQuorum));
}

#[test]
fn five_of_seven_reaches_quorum() {
    let (chain, committee, parent) = beacon_fixture();
    let engine = empty_engine();

    let (sig, bitmap) = sign_commit(&committee, &[0, 1, 2, 3, 4], &parent);
    engine
        .verify_header_signature(chain.as_ref(), &parent, &sig, &bitmap)
        .unwrap();
}

#[test]
fn forged_signature_is_rejected() {
    let (chain, committee, parent) = beacon_fixture();
    let engine = empty_engine();

    // A valid quorum bitmap but a signature over a different block: the
    // aggregate fails pairing, not decoding.
    let other = Header {
        number: 99,
        ..parent.clone()
    };
    let (wrong_sig, _) = sign_commit(&committee, &[0, 1, 2, 3, 4], &other);
    let (_, bitmap) = sign_commit(&committee, &[0, 1, 2, 3, 4], &parent);
    let err = engine
        .verify_header_signature(chain.as_ref(), &parent, &wrong_sig, &bitmap)
        .unwrap_err();
    assert!(matches!(err, EngineError::SignatureMismatch { .. }));
}

#[test]
fn undecodable_signature_is_a_decode_failure() {
    let (chain, committee, parent) = beacon_fixture();
    let engine = empty_engine();

    let (_, bitmap) = sign_commit(&committee, &[0, 1, 2, 3, 4], &parent);
    let garbage = SerializedSignature([0xAB; 96]);
    let err = engine
        .verify_header_signature(chain.as_ref(), &parent, &garbage, &bitmap)
        .unwrap_err();
    assert!(matches!(err, EngineError::SignatureDecode(_)));
}

#[test]
fn oversized_bitmap_is_a_decode_failure() {
    let (chain, committee, parent) = beacon_fixture();
    let engine = empty_engine();

    let (sig, _) = sign_commit(&committee, &[0, 1, 2, 3, 4], &parent);
    let oversized = vec![0u8; 65];
    let err = engine
        .verify_header_signature(chain.as_ref(), &parent, &sig, &oversized)
        .unwrap_err();
    assert!(matches!(err, EngineError::SignatureDecode(_)));
}

#[test]
fn memo_hit_skips_bls_verification() {
    let (chain, committee, parent) = beacon_fixture();
    let engine = empty_engine();

    let (sig, bitmap) = sign_commit(&committee, &[0, 1, 2, 3, 4], &parent);
    engine
        .verify_header_signature(chain.as_ref(), &parent, &sig, &bitmap)
        .unwrap();
    assert_eq!(engine.aggregate_verifications(), 1);
    let chain_reads = chain.read_shard_state_calls.load(Ordering::SeqCst);

    // Identical triple: the memo answers before any chain read or pairing.
    engine
        .verify_header_signature(chain.as_ref(), &parent, &sig, &bitmap)
        .unwrap();
    assert_eq!(engine.aggregate_verifications(), 1);
    assert_eq!(
        chain.read_shard_state_calls.load(Ordering::SeqCst),
        chain_reads
    );

    // A different signer set is a different key: verification re-runs.
    let (sig6, bitmap6) = sign_commit(&committee, &[0, 1, 2, 3, 4, 5], &parent);
    engine
        .verify_header_signature(chain.as_ref(), &parent, &sig6, &bitmap6)
        .unwrap();
    assert_eq!(engine.aggregate_verifications(), 2);
}

#[test]
fn failures_are_not_memoized() {
    let (chain, committee, parent) = beacon_fixture();
    let engine = empty_engine();

    let other = Header {
        number: 99,
        ..parent.clone()
    };
    let (wrong_sig, _) = sign_commit(&committee, &[0, 1, 2, 3, 4], &other);
    let (_, bitmap) = sign_commit(&committee, &[0, 1, 2, 3, 4], &parent);

    for _ in 0..2 {
        let err = engine
            .verify_header_signature(chain.as_ref(), &parent, &wrong_sig, &bitmap)
            .unwrap_err();
        assert!(matches!(err, EngineError::SignatureMismatch { .. }));
    }
    // Both attempts ran the pairing: negative verdicts re-verify.
    assert_eq!(engine.aggregate_verifications(), 2);
}

#[test]
fn verify_header_checks_parent_linkage() {
    let (chain, committee, parent) = beacon_fixture();
    let engine = empty_engine();

    let (sig, bitmap) = sign_commit(&committee, &[0, 1, 2, 3, 4], &parent);
    let child = Header {
        shard_id: 0,
        number: 11,
        epoch: 3,
        parent_hash: parent.hash(),
        last_commit_signature: sig,
        last_commit_bitmap: bitmap,
        ..Default::default()
    };
    engine.verify_header(chain.as_ref(), &child, true).unwrap();

    let orphan = Header {
        shard_id: 0,
        number: 50,
        epoch: 3,
        parent_hash: meridian_types::H256::keccak256(b"nowhere"),
        ..Default::default()
    };
    let err = engine
        .verify_header(chain.as_ref(), &orphan, false)
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownAncestor { number: 50 }));
}

#[test]
fn seal_verification_uses_parent_committee_epoch() {
    // Invariant: verify_header(seal) succeeds exactly when the embedded
    // commit verifies against the parent.
    let (chain, committee, parent) = beacon_fixture();
    let engine = empty_engine();

    let (sig, bitmap) = sign_commit(&committee, &[1, 2, 3, 4, 5], &parent);
    let child = Header {
        shard_id: 0,
        number: 11,
        epoch: 3,
        parent_hash: parent.hash(),
        last_commit_signature: sig,
        last_commit_bitmap: bitmap.clone(),
        ..Default::default()
    };
    engine.verify_header(chain.as_ref(), &child, true).unwrap();
    engine
        .verify_header_signature(chain.as_ref(), &parent, &child.last_commit_signature, &bitmap)
        .unwrap();
}

#[test]
fn cross_shard_pre_staking_lookup_recomputes() {
    // Engine on shard 1 verifying a shard-0 header at a pre-staking epoch:
    // the resolver must recompute the committee, not read stored state.
    let chain = Arc::new(MockChain::new(1, pre_staking_config()));
    let committee = build_committee(0, &[None; 4]);
    let schedule = ShardSchedule::new(vec![committee.committee.clone()]);
    let selector = Arc::new(CountingSelector::new(schedule));
    let engine = Arc::new(Engine::new(Arc::clone(&selector) as _));

    chain.set_tip(Header {
        shard_id: 1,
        number: 20,
        ..Default::default()
    });

    let foreign = Header {
        shard_id: 0,
        number: 9,
        epoch: 4,
        view_id: 9,
        ..Default::default()
    };
    let (sig, bitmap) = sign_commit(&committee, &[0, 1, 2], &foreign);
    engine
        .verify_header_signature(chain.as_ref(), &foreign, &sig, &bitmap)
        .unwrap();

    assert_eq!(selector.calls.load(Ordering::SeqCst), 1);
    assert_eq!(chain.read_shard_state_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn stake_weighted_quorum_in_staking_era() {
    let chain = Arc::new(MockChain::new(0, staking_config()));
    let committee = build_committee(0, &[Some(70), Some(20), Some(10)]);
    chain.insert_shard_state(ShardState {
        epoch: 2,
        shards: vec![committee.committee.clone()],
    });
    chain.set_tip(Header {
        number: 30,
        ..Default::default()
    });
    let engine = empty_engine();

    let header = Header {
        shard_id: 0,
        number: 25,
        epoch: 2,
        view_id: 26,
        ..Default::default()
    };

    // The 70-stake slot alone exceeds two-thirds of the power.
    let (sig, bitmap) = sign_commit(&committee, &[0], &header);
    engine
        .verify_header_signature(chain.as_ref(), &header, &sig, &bitmap)
        .unwrap();

    // Two slots holding 30 together do not, despite being a slot majority.
    let (sig, bitmap) = sign_commit(&committee, &[1, 2], &header);
    let err = engine
        .verify_header_signature(chain.as_ref(), &header, &sig, &bitmap)
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientQuorum));
}

#[test]
fn batch_verification_returns_ordered_results() {
    let (chain, committee, parent) = beacon_fixture();
    let engine = empty_engine();

    let (sig, bitmap) = sign_commit(&committee, &[0, 1, 2, 3, 4], &parent);
    let good = Header {
        shard_id: 0,
        number: 11,
        epoch: 3,
        parent_hash: parent.hash(),
        last_commit_signature: sig,
        last_commit_bitmap: bitmap,
        ..Default::default()
    };
    let orphan = Header {
        shard_id: 0,
        number: 12,
        epoch: 3,
        parent_hash: meridian_types::H256::keccak256(b"missing"),
        ..Default::default()
    };

    let chain_dyn: Arc<dyn meridian_engine::ChainReader> = chain.clone();
    let (_abort, results) =
        engine.verify_headers(chain_dyn, vec![(good, true), (orphan, false)]);

    assert!(results.recv().unwrap().is_ok());
    assert!(matches!(
        results.recv().unwrap(),
        Err(EngineError::UnknownAncestor { number: 12 })
    ));
    // Worker is done: the channel closes.
    assert!(results.recv().is_err());
}

#[test]
fn batch_verification_stops_after_abort() {
    let (chain, _committee, parent) = beacon_fixture();
    let engine = empty_engine();

    let batch: Vec<_> = (0..64)
        .map(|i| {
            (
                Header {
                    shard_id: 0,
                    number: 11 + i,
                    epoch: 3,
                    parent_hash: parent.hash(),
                    ..Default::default()
                },
                false,
            )
        })
        .collect();

    let chain_dyn: Arc<dyn meridian_engine::ChainReader> = chain.clone();
    let (abort, results) = engine.verify_headers(chain_dyn, batch);
    abort.send(()).unwrap();

    // The worker exits at the next abort check; whatever was already
    // verified arrives in order, then the channel closes.
    let mut received = 0usize;
    while results.recv().is_ok() {
        received += 1;
    }
    assert!(received <= 64);
}
