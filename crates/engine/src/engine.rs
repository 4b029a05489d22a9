//! The verification and finalization engine.

use crate::context::{
    EpochCtx, EpochCtxKey, VerifiedSigKey, EPOCH_CTX_CACHE, VERIFIED_SIG_CACHE,
    VOTING_POWER_CACHE,
};
use crate::reward::{self, RewardReport};
use crate::signature::construct_commit_payload;
use crate::traits::{ChainReader, CommitteeSelector};
use crate::{EngineError, Result, StateDB};
use lru::LruCache;
use meridian_crypto::{decode_sig_bitmap, SerializedSignature};
use meridian_shard::votepower::Roster;
use meridian_shard::{
    decode_wrapper, encode_wrapper, Committee, QuorumVerifier, ShardState, BEACON_SHARD_ID,
};
use meridian_staking::{availability, slash, LOCK_PERIOD_IN_EPOCHS, LOCK_PERIOD_IN_EPOCHS_V2};
use meridian_types::{
    Block, CxReceipt, CxReceiptsProof, Header, Receipt, StakingTransaction, Transaction,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

/// The block-finalization and header-verification engine.
///
/// One engine instance serves one shard chain. The beacon-chain handle is a
/// back-reference installed after construction ([`Engine::set_beacon`]) -
/// the engine never owns the beacon chain, it only reads from it.
///
/// The two verification caches are local accelerators: epoch contexts and
/// positive signature verdicts are pure functions of their keys, so cache
/// state never influences results. Both are safe for concurrent callers.
pub struct Engine {
    beacon: RwLock<Option<Arc<dyn ChainReader>>>,
    selector: Arc<dyn CommitteeSelector>,
    epoch_ctx_cache: Mutex<LruCache<EpochCtxKey, Arc<EpochCtx>>>,
    verified_sig_cache: Mutex<LruCache<VerifiedSigKey, ()>>,
    voting_power_cache: Mutex<LruCache<(u64, u32), Arc<Roster>>>,
    aggregate_verifications: AtomicU64,
}

impl Engine {
    /// Creates an engine with the given committee selector and empty caches.
    pub fn new(selector: Arc<dyn CommitteeSelector>) -> Self {
        Self {
            beacon: RwLock::new(None),
            selector,
            epoch_ctx_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(EPOCH_CTX_CACHE).unwrap(),
            )),
            verified_sig_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(VERIFIED_SIG_CACHE).unwrap(),
            )),
            voting_power_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(VOTING_POWER_CACHE).unwrap(),
            )),
            aggregate_verifications: AtomicU64::new(0),
        }
    }

    /// Number of aggregate-signature pairings actually performed, memo hits
    /// excluded. Exposed for metrics.
    pub fn aggregate_verifications(&self) -> u64 {
        self.aggregate_verifications.load(Ordering::Relaxed)
    }

    /// Returns the beacon-chain handle, if installed.
    pub fn beacon(&self) -> Option<Arc<dyn ChainReader>> {
        self.beacon.read().clone()
    }

    /// Installs the beacon-chain handle.
    pub fn set_beacon(&self, beacon: Arc<dyn ChainReader>) {
        *self.beacon.write() = Some(beacon);
    }

    /// Checks that a header links to a known parent and, when `seal` is set,
    /// that it carries a valid commit for that parent.
    ///
    /// Each header carries the aggregated commit signature **of its parent**.
    pub fn verify_header(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        seal: bool,
    ) -> Result<()> {
        let parent_number = header.number.saturating_sub(1);
        if chain.get_header(&header.parent_hash, parent_number).is_none() {
            return Err(EngineError::UnknownAncestor {
                number: header.number,
            });
        }
        if seal {
            self.verify_seal(chain, header)?;
        }
        Ok(())
    }

    /// Verifies a batch of headers on a worker thread.
    ///
    /// Returns an abort sender and an ordered result receiver. Although the
    /// interface allows async consumption, headers are verified strictly one
    /// at a time: a header can only be verified once its predecessor has
    /// been committed to the chain, so callers must write each block before
    /// reading the next result.
    pub fn verify_headers(
        self: &Arc<Self>,
        chain: Arc<dyn ChainReader>,
        batch: Vec<(Header, bool)>,
    ) -> (Sender<()>, Receiver<Result<()>>) {
        let (abort_tx, abort_rx) = mpsc::channel::<()>();
        let (result_tx, result_rx) = mpsc::channel();
        let engine = Arc::clone(self);

        thread::spawn(move || {
            for (header, seal) in batch {
                if abort_rx.try_recv().is_ok() {
                    return;
                }
                let verdict = engine.verify_header(chain.as_ref(), &header, seal);
                if result_tx.send(verdict).is_err() {
                    return;
                }
            }
        });

        (abort_tx, result_rx)
    }

    /// Verifies the commit seal a header carries for its parent.
    ///
    /// Succeeds unconditionally while the tip is at block 1 or below: no
    /// parent commits exist yet.
    pub fn verify_seal(&self, chain: &dyn ChainReader, header: &Header) -> Result<()> {
        if chain.current_header().number <= 1 {
            return Ok(());
        }
        let parent = chain
            .get_header(&header.parent_hash, header.number.saturating_sub(1))
            .ok_or(EngineError::UnknownAncestor {
                number: header.number,
            })?;
        self.verify_header_signature_cached(
            chain,
            &parent,
            &header.last_commit_signature,
            &header.last_commit_bitmap,
        )
    }

    /// Verifies an explicit commit signature and bitmap against a header.
    ///
    /// Unlike [`verify_seal`], the caller chooses which signature attests
    /// the header; this is what cross-shard header verification uses, where
    /// the commit arrives separately from the header.
    ///
    /// [`verify_seal`]: Engine::verify_seal
    pub fn verify_header_signature(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        commit_sig: &SerializedSignature,
        commit_bitmap: &[u8],
    ) -> Result<()> {
        if chain.current_header().number <= 1 {
            return Ok(());
        }
        self.verify_header_signature_cached(chain, header, commit_sig, commit_bitmap)
    }

    fn verify_header_signature_cached(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        commit_sig: &SerializedSignature,
        commit_bitmap: &[u8],
    ) -> Result<()> {
        let key = VerifiedSigKey::new(header.hash(), commit_sig, commit_bitmap);
        if self.verified_sig_cache.lock().get(&key).is_some() {
            return Ok(());
        }
        self.verify_header_signature_uncached(chain, header, commit_sig, commit_bitmap)?;
        self.verified_sig_cache.lock().put(key, ());
        Ok(())
    }

    fn verify_header_signature_uncached(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        commit_sig: &SerializedSignature,
        commit_bitmap: &[u8],
    ) -> Result<()> {
        let ctx = self.epoch_ctx(chain, header.epoch, header.shard_id)?;

        let (aggregate, mask) = decode_sig_bitmap(commit_sig, commit_bitmap, &ctx.pub_keys)
            .map_err(EngineError::SignatureDecode)?;

        if !ctx.verifier.is_quorum_achieved(&mask) {
            return Err(EngineError::InsufficientQuorum);
        }

        let payload =
            construct_commit_payload(header.epoch, &header.hash(), header.number, header.view_id);
        let aggregate_key = mask
            .aggregate_public()
            .map_err(EngineError::SignatureDecode)?;
        self.aggregate_verifications.fetch_add(1, Ordering::Relaxed);
        if !aggregate.verify(&payload, &aggregate_key) {
            return Err(EngineError::SignatureMismatch {
                hash: header.hash(),
            });
        }
        Ok(())
    }

    /// Checks the shard state a header advertises at an epoch boundary.
    ///
    /// The expected next-epoch super-committee is recomputed locally and
    /// compared byte-for-byte against the header's encoded blob. An empty
    /// blob passes: the proposer may withhold the shard state, which is
    /// checked elsewhere.
    pub fn verify_shard_state(
        &self,
        chain: &dyn ChainReader,
        beacon: &dyn ChainReader,
        header: &Header,
    ) -> Result<()> {
        if chain.shard_id() != header.shard_id {
            return Err(EngineError::ShardIdMismatch {
                local: chain.shard_id(),
                header: header.shard_id,
            });
        }
        if !header.has_shard_state() {
            return Ok(());
        }

        let expected = chain.next_epoch_committee(beacon, header)?;
        let staking = chain.config().is_staking(expected.epoch);
        let expected_bytes = encode_wrapper(&expected, staking)?;

        if expected_bytes != header.shard_state {
            return Err(EngineError::ShardStateMismatch);
        }
        Ok(())
    }

    /// Finalizes a block: applies every state mutation the block implies,
    /// seals the header and assembles the block.
    ///
    /// Phases run in strict order - the state root depends on it:
    /// committee-selection bookkeeping (undelegation payout, committee-epoch
    /// stamping, EPoS recomputation), reward accumulation, slashing, view-id
    /// stamping, state-root commit, block assembly.
    ///
    /// Not cancellable once started; on error the caller must discard the
    /// partially mutated state.
    #[allow(clippy::too_many_arguments)]
    pub fn finalize(
        &self,
        chain: &dyn ChainReader,
        mut header: Header,
        state: &mut dyn StateDB,
        transactions: Vec<Transaction>,
        receipts: Vec<Receipt>,
        outgoing_receipts: Vec<CxReceipt>,
        incoming_receipts: Vec<CxReceiptsProof>,
        staking_transactions: Vec<StakingTransaction>,
        double_signers: slash::Records,
        sigs_ready: Receiver<bool>,
        view_id: impl FnOnce() -> u64,
    ) -> Result<(Block, RewardReport)> {
        let is_beacon_chain = header.shard_id == BEACON_SHARD_ID;
        let in_staking_era = chain.config().is_staking(header.epoch);

        // Undelegations, committee-epoch stamping and EPoS status must all
        // settle before reward accumulation touches the signing counters.
        if is_committee_selection_block(chain, &header) {
            payout_undelegations(chain, &header, state)?;

            // Payout reads the old last_epoch_in_committee, so the stamp
            // comes strictly after it.
            set_last_epoch_in_committee(&header, state)?;

            let current_state = chain.read_shard_state(chain.current_header().epoch)?;
            for address in current_state.staked_validators() {
                availability::compute_and_mutate_epos_status(state, &address)?;
            }
        }

        let payout = reward::accumulate_rewards_and_count_sigs(
            chain,
            state,
            &header,
            self.beacon(),
            sigs_ready,
        )?;

        if is_beacon_chain && in_staking_era && !double_signers.is_empty() {
            self.apply_slashes(chain, &header, state, &double_signers)?;
        } else if !double_signers.is_empty() {
            return Err(EngineError::SlashesInWrongChain);
        }

        // After rewards so the reward pipeline can overlap the view-id fetch.
        header.set_view_id(view_id());

        let root = state.intermediate_root(chain.config().is_s3(header.epoch));
        header.set_state_root(root);

        let block = Block::new(
            header,
            transactions,
            receipts,
            outgoing_receipts,
            incoming_receipts,
            staking_transactions,
        );
        Ok((block, payout))
    }

    /// Applies double-sign slashes deterministically.
    ///
    /// Evidence is grouped by `(shard, height, view, epoch)` so the same
    /// offense witnessed by several reporters collapses into one
    /// application; groups apply in ascending key order and records within
    /// a group in canonical order, making the mutations a pure function of
    /// the evidence set.
    fn apply_slashes(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        state: &mut dyn StateDB,
        double_signers: &[slash::Record],
    ) -> Result<()> {
        let mut grouped: BTreeMap<(u32, u64, u64, u64), slash::Records> = BTreeMap::new();
        for record in double_signers {
            let moment = record.evidence.moment;
            grouped
                .entry((moment.shard_id, moment.height, moment.view_id, moment.epoch))
                .or_default()
                .push(record.clone());
        }

        for ((shard_id, height, view_id, epoch), mut records) in grouped {
            records.sort_by(|a, b| {
                (a.evidence.offender, a.reporter).cmp(&(b.evidence.offender, b.reporter))
            });

            let super_committee = chain.read_shard_state(epoch)?;
            let committee = super_committee.find_committee(shard_id)?;
            let voting_power = self.voting_power(chain, epoch, committee)?;

            let rate_bps = slash::rate(&voting_power, &records);
            info!(
                block = header.number,
                shard = shard_id,
                height,
                view = view_id,
                epoch,
                rate_bps,
                records = %serde_json::to_string(&records).unwrap_or_default(),
                "applying double-sign slash during finalization"
            );

            let applied = slash::apply(state, &records, rate_bps)?;
            info!(
                rate_bps,
                applied = %serde_json::to_string(&applied).unwrap_or_default(),
                "slash applied"
            );
        }
        Ok(())
    }

    /// Resolves the epoch context for `(shard, epoch)`, reading through the
    /// cache.
    fn epoch_ctx(
        &self,
        chain: &dyn ChainReader,
        epoch: u64,
        shard_id: u32,
    ) -> Result<Arc<EpochCtx>> {
        let key = EpochCtxKey { shard_id, epoch };
        if let Some(ctx) = self.epoch_ctx_cache.lock().get(&key) {
            return Ok(Arc::clone(ctx));
        }
        let ctx = Arc::new(self.read_epoch_ctx_from_chain(chain, epoch, shard_id)?);
        self.epoch_ctx_cache.lock().put(key, Arc::clone(&ctx));
        Ok(ctx)
    }

    fn read_epoch_ctx_from_chain(
        &self,
        chain: &dyn ChainReader,
        epoch: u64,
        shard_id: u32,
    ) -> Result<EpochCtx> {
        let shard_state = self.read_shard_state_for(chain, epoch, shard_id)?;
        let committee = shard_state.find_committee(shard_id)?;
        let pub_keys = committee.bls_public_keys()?;
        let staking = chain.config().is_staking(epoch);
        let verifier = QuorumVerifier::new(committee, staking)?;
        Ok(EpochCtx { pub_keys, verifier })
    }

    /// Obtains the shard state for `(epoch, shard)`.
    ///
    /// A transaction shard does not retain other shards' pre-staking
    /// committees, so a cross-shard lookup in a pre-staking epoch
    /// recomputes the state through the injected selector instead of
    /// reading stored state.
    fn read_shard_state_for(
        &self,
        chain: &dyn ChainReader,
        epoch: u64,
        target_shard: u32,
    ) -> Result<ShardState> {
        if need_recompute_shard_state(chain, epoch, target_shard) {
            debug!(epoch, shard = target_shard, "recomputing cross-shard committee");
            self.selector.compute(epoch, chain)
        } else {
            chain.read_shard_state(epoch)
        }
    }

    /// Looks up the cached voting-power roster for `(epoch, committee)`.
    fn voting_power(
        &self,
        chain: &dyn ChainReader,
        epoch: u64,
        committee: &Committee,
    ) -> Result<Arc<Roster>> {
        let key = (epoch, committee.shard_id);
        if let Some(roster) = self.voting_power_cache.lock().get(&key) {
            return Ok(Arc::clone(roster));
        }
        let roster = Arc::new(Roster::compute(
            committee,
            chain.config().is_staking(epoch),
        )?);
        self.voting_power_cache.lock().put(key, Arc::clone(&roster));
        Ok(roster)
    }
}

/// Recomputation applies only to non-staking epochs and foreign shards.
fn need_recompute_shard_state(chain: &dyn ChainReader, epoch: u64, target_shard: u32) -> bool {
    if chain.config().is_staking(epoch) {
        return false;
    }
    target_shard != chain.shard_id()
}

/// Checks whether a header is a committee-selection block: the last block of
/// an epoch on the beacon chain, on or after pre-staking activation.
pub fn is_committee_selection_block(chain: &dyn ChainReader, header: &Header) -> bool {
    header.shard_id == BEACON_SHARD_ID
        && header.last_in_epoch
        && chain.config().is_pre_staking(header.epoch)
}

/// Returns the undelegation lock period active at `epoch`.
///
/// The redelegation branch intentionally resolves to the same period as the
/// default.
pub fn lock_period_in_epochs(chain: &dyn ChainReader, epoch: u64) -> u64 {
    let mut lock_period = LOCK_PERIOD_IN_EPOCHS;
    if chain.config().is_redelegation(epoch) {
        lock_period = LOCK_PERIOD_IN_EPOCHS;
    } else if chain.config().is_quick_unlock(epoch) {
        lock_period = LOCK_PERIOD_IN_EPOCHS_V2;
    }
    lock_period
}

/// Pays out every undelegation that has matured by the header's epoch.
///
/// Uses each validator's **old** `last_epoch_in_committee`; must therefore
/// run before the committee-epoch stamp for the new shard state.
fn payout_undelegations(
    chain: &dyn ChainReader,
    header: &Header,
    state: &mut dyn StateDB,
) -> Result<()> {
    let validators = chain.read_validator_list()?;
    let lock_period = lock_period_in_epochs(chain, header.epoch);
    let no_early_unlock = chain.config().is_no_early_unlock(header.epoch);

    let mut count_track: HashMap<String, usize> = HashMap::new();
    for validator in validators {
        let mut wrapper = state.validator_wrapper(&validator)?;
        let last_epoch_in_committee = wrapper.last_epoch_in_committee;
        for delegation in &mut wrapper.delegations {
            let total_withdraw = delegation.remove_unlocked_undelegations(
                header.epoch,
                last_epoch_in_committee,
                lock_period,
                no_early_unlock,
            );
            if total_withdraw != 0 {
                state.add_balance(&delegation.delegator_address, total_withdraw);
            }
        }
        count_track.insert(validator.to_hex(), wrapper.delegations.len());
        state.update_validator_wrapper(&validator, wrapper)?;
    }

    debug!(
        epoch = header.epoch,
        block = header.number,
        count_track = %serde_json::to_string(&count_track).unwrap_or_default(),
        "paid out matured undelegations"
    );
    Ok(())
}

/// Stamps `last_epoch_in_committee` for every staked validator in the
/// header's new shard state.
fn set_last_epoch_in_committee(header: &Header, state: &mut dyn StateDB) -> Result<()> {
    let new_shard_state = decode_wrapper(&header.shard_state)?;
    for address in new_shard_state.staked_validators() {
        let mut wrapper = state.validator_wrapper(&address)?;
        wrapper.last_epoch_in_committee = new_shard_state.epoch;
        state.update_validator_wrapper(&address, wrapper)?;
    }
    Ok(())
}
