use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_shared::address::Protocol;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::crypto::signature::SECP_SIG_LEN;
use fvm_shared::econ::TokenAmount;
use fvm_shared::message::Message;
use fvm_shared::version::NetworkVersion;
use lazy_static::lazy_static;
use log::{info, warn};

use crate::factory::{ActorOverride, VmContext, VmFactory};
use crate::rand::{RandomnessMatch, ReplayingRand};
use crate::ExecutionResult;

// TODO: take base fee and network version from the vector's preconditions and variants.
/// The only network version the FVM supports, matching the built-in actors v12 bundle.
pub const NETWORK_VERSION: NetworkVersion = NetworkVersion::V21;

lazy_static! {
    pub static ref BASE_FEE: TokenAmount = TokenAmount::from_atto(100);
    pub static ref CIRCULATING_SUPPLY: TokenAmount = fvm_shared::TOTAL_FILECOIN.clone();
}

// Signature type byte plus CBOR framing of a signed message envelope.
const SECP_ENVELOPE_OVERHEAD: usize = 4;

/// Applies single messages to a prior state through a VM built by the factory.
/// Every VM is configured with the same base fee and network version, replays the
/// driver's recorded randomness, and registers the chaos actor.
pub struct Driver<F> {
    factory: F,
    chaos: ActorOverride,
    randomness: ReplayingRand,
}

impl<F> Driver<F> {
    pub fn new(factory: F, chaos: ActorOverride) -> Self {
        Self { factory, chaos, randomness: ReplayingRand::default() }
    }

    /// Replays recorded randomness in VMs created after this call.
    pub fn with_randomness(mut self, recorded: Vec<RandomnessMatch>) -> Self {
        self.randomness = ReplayingRand::new(recorded);
        self
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn base_fee(&self) -> &TokenAmount {
        &BASE_FEE
    }

    pub fn network_version(&self) -> NetworkVersion {
        NETWORK_VERSION
    }

    /// Applies a message on top of `pre_root` at `epoch`.
    /// Returns the execution result and the state root after application.
    /// State is only flushed after the message has been applied successfully.
    pub fn execute_message<B>(
        &self,
        msg: &Message,
        pre_root: &Cid,
        store: B,
        epoch: ChainEpoch,
    ) -> anyhow::Result<(ExecutionResult, Cid)>
    where
        B: Blockstore,
        F: VmFactory<B>,
    {
        info!("execution sanity check");
        {
            let state = self.factory.load_state(&store, pre_root)?;
            match state.find_actor(&msg.from) {
                Ok(Some(actor)) => info!("from actor found: {:?}", actor),
                Ok(None) => info!("from actor not found: {}", msg.from),
                Err(e) => warn!("from actor not found: {} ({})", msg.from, e),
            }
        }

        info!("creating vm");
        let ctx = VmContext {
            state_root: *pre_root,
            epoch,
            network_version: NETWORK_VERSION,
            base_fee: BASE_FEE.clone(),
            circ_supply: CIRCULATING_SUPPLY.clone(),
            randomness: self.randomness.clone(),
            actors: vec![self.chaos.clone()],
        };
        let mut vm = self.factory.create_vm(store, &ctx)?;

        info!("applying message");
        let msg_length = chain_message_length(msg)?;
        let ret = vm.apply_message(msg.clone(), msg_length)?;
        info!("applied message: {:?}", ret.receipt);

        info!("flushing");
        let root = vm.flush()?;
        Ok((ret, root))
    }
}

/// The length of a message as it appears on chain.
/// Messages from secp256k1 accounts are included with their signature; BLS signatures are
/// aggregated per block and do not count.
pub fn chain_message_length(msg: &Message) -> anyhow::Result<usize> {
    let mut length = fvm_ipld_encoding::to_vec(msg)?.len();
    if msg.from.protocol() == Protocol::Secp256k1 {
        length += SECP_SIG_LEN + SECP_ENVELOPE_OVERHEAD;
    }
    Ok(length)
}
