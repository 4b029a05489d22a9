//! Shared fixtures for engine integration tests: an in-memory chain, an
//! in-memory state and committee/commit builders.

#![allow(dead_code)]

use meridian_config::ChainConfig;
use meridian_crypto::{BlsSecretKey, BlsSignature, SerializedSignature};
use meridian_engine::signature::construct_commit_payload;
use meridian_engine::{ChainReader, CommitteeSelector, EngineError, Result, StateDB};
use meridian_shard::schedule::ShardSchedule;
use meridian_shard::{Committee, ShardState, Slot};
use meridian_staking::{StakingError, ValidatorWrapper};
use meridian_types::{Address, Header, H256};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A committee fixture with the secret keys behind its slots.
pub struct TestCommittee {
    pub secret_keys: Vec<BlsSecretKey>,
    pub committee: Committee,
}

/// Builds a committee of `n` slots on `shard_id`.
///
/// `stakes[i]` staked per slot; `None` entries produce pre-staking slots.
/// Keys are derived from `(shard_id, slot index)` so fixtures are
/// reproducible.
pub fn build_committee(shard_id: u32, stakes: &[Option<u128>]) -> TestCommittee {
    let secret_keys: Vec<BlsSecretKey> = (0..stakes.len())
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = shard_id as u8 + 1;
            seed[1] = i as u8 + 1;
            BlsSecretKey::from_seed(&seed).unwrap()
        })
        .collect();
    let slots = secret_keys
        .iter()
        .zip(stakes)
        .enumerate()
        .map(|(i, (key, stake))| Slot {
            address: slot_address(shard_id, i),
            bls_public_key: key.public_key().serialized(),
            effective_stake: *stake,
        })
        .collect();
    TestCommittee {
        secret_keys,
        committee: Committee { shard_id, slots },
    }
}

/// The deterministic address of slot `i` on `shard_id`.
pub fn slot_address(shard_id: u32, i: usize) -> Address {
    let mut bytes = [0u8; 20];
    bytes[0] = shard_id as u8 + 1;
    bytes[1] = i as u8 + 1;
    Address::new(bytes)
}

/// Aggregates a commit over `header` from the listed slot indices and
/// returns the serialized signature plus the matching bitmap.
pub fn sign_commit(
    committee: &TestCommittee,
    signer_indices: &[usize],
    header: &Header,
) -> (SerializedSignature, Vec<u8>) {
    let payload =
        construct_commit_payload(header.epoch, &header.hash(), header.number, header.view_id);
    let signatures: Vec<BlsSignature> = signer_indices
        .iter()
        .map(|&i| committee.secret_keys[i].sign(&payload))
        .collect();
    let refs: Vec<&BlsSignature> = signatures.iter().collect();
    let aggregate = BlsSignature::aggregate(&refs).unwrap();

    let mut bitmap = vec![0u8; (committee.secret_keys.len() + 7) / 8];
    for &i in signer_indices {
        bitmap[i / 8] |= 1 << (i % 8);
    }
    (aggregate.serialized(), bitmap)
}

/// In-memory `ChainReader` with call counters for cache observability.
pub struct MockChain {
    pub config: ChainConfig,
    pub shard_id: u32,
    pub tip: Mutex<Header>,
    pub headers: Mutex<HashMap<(H256, u64), Header>>,
    pub shard_states: Mutex<HashMap<u64, ShardState>>,
    pub validator_list: Mutex<Vec<Address>>,
    pub next_committee: Mutex<Option<ShardState>>,
    pub read_shard_state_calls: AtomicUsize,
}

impl MockChain {
    pub fn new(shard_id: u32, config: ChainConfig) -> Self {
        Self {
            config,
            shard_id,
            tip: Mutex::new(Header::default()),
            headers: Mutex::new(HashMap::new()),
            shard_states: Mutex::new(HashMap::new()),
            validator_list: Mutex::new(Vec::new()),
            next_committee: Mutex::new(None),
            read_shard_state_calls: AtomicUsize::new(0),
        }
    }

    pub fn insert_header(&self, header: Header) {
        self.headers
            .lock()
            .insert((header.hash(), header.number), header);
    }

    pub fn set_tip(&self, header: Header) {
        self.insert_header(header.clone());
        *self.tip.lock() = header;
    }

    pub fn insert_shard_state(&self, state: ShardState) {
        self.shard_states.lock().insert(state.epoch, state);
    }
}

impl ChainReader for MockChain {
    fn config(&self) -> &ChainConfig {
        &self.config
    }

    fn shard_id(&self) -> u32 {
        self.shard_id
    }

    fn current_header(&self) -> Header {
        self.tip.lock().clone()
    }

    fn get_header(&self, hash: &H256, number: u64) -> Option<Header> {
        self.headers.lock().get(&(*hash, number)).cloned()
    }

    fn read_shard_state(&self, epoch: u64) -> Result<ShardState> {
        self.read_shard_state_calls.fetch_add(1, Ordering::SeqCst);
        self.shard_states
            .lock()
            .get(&epoch)
            .cloned()
            .ok_or(EngineError::MissingShardState {
                epoch,
                reason: "not stored".to_string(),
            })
    }

    fn read_validator_list(&self) -> Result<Vec<Address>> {
        Ok(self.validator_list.lock().clone())
    }

    fn next_epoch_committee(
        &self,
        _beacon: &dyn ChainReader,
        header: &Header,
    ) -> Result<ShardState> {
        self.next_committee
            .lock()
            .clone()
            .ok_or(EngineError::MissingShardState {
                epoch: header.epoch + 1,
                reason: "next committee not set".to_string(),
            })
    }
}

/// A committee selector that counts invocations, for asserting which
/// resolution path the engine takes.
pub struct CountingSelector {
    pub schedule: ShardSchedule,
    pub calls: AtomicUsize,
}

impl CountingSelector {
    pub fn new(schedule: ShardSchedule) -> Self {
        Self {
            schedule,
            calls: AtomicUsize::new(0),
        }
    }
}

impl CommitteeSelector for CountingSelector {
    fn compute(&self, epoch: u64, _chain: &dyn ChainReader) -> Result<ShardState> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.schedule.compute(epoch)?)
    }
}

/// In-memory `StateDB` with a deterministic content root and a mutation log.
#[derive(Default)]
pub struct MemStateDB {
    pub wrappers: BTreeMap<Address, ValidatorWrapper>,
    pub balances: BTreeMap<Address, u128>,
    pub op_log: Vec<String>,
}

impl MemStateDB {
    pub fn insert_wrapper(&mut self, wrapper: ValidatorWrapper) {
        self.wrappers.insert(wrapper.address, wrapper);
    }

    pub fn balance(&self, address: &Address) -> u128 {
        self.balances.get(address).copied().unwrap_or(0)
    }
}

impl StateDB for MemStateDB {
    fn validator_wrapper(
        &self,
        address: &Address,
    ) -> std::result::Result<ValidatorWrapper, StakingError> {
        self.wrappers
            .get(address)
            .cloned()
            .ok_or(StakingError::ValidatorLookup(*address))
    }

    fn update_validator_wrapper(
        &mut self,
        address: &Address,
        wrapper: ValidatorWrapper,
    ) -> std::result::Result<(), StakingError> {
        self.op_log.push(format!("wrapper:{}", address));
        self.wrappers.insert(*address, wrapper);
        Ok(())
    }

    fn add_balance(&mut self, address: &Address, amount: u128) {
        self.op_log.push(format!("balance:{}:{}", address, amount));
        *self.balances.entry(*address).or_default() += amount;
    }

    fn intermediate_root(&mut self, is_s3: bool) -> H256 {
        // Content-addressed: identical state always yields identical roots,
        // which is what the determinism tests compare.
        let encoded = serde_json::to_vec(&(&self.wrappers, &self.balances, is_s3)).unwrap();
        H256::keccak256(&encoded)
    }
}

/// Sends `value` on a fresh channel and returns the receiver, mimicking the
/// consensus layer announcing that commit signatures are populated.
pub fn sigs_ready(value: bool) -> std::sync::mpsc::Receiver<bool> {
    let (tx, rx) = std::sync::mpsc::channel();
    tx.send(value).unwrap();
    rx
}
