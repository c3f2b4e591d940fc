use cid::Cid;
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use fvm_shared::receipt::Receipt;

pub use driver::{Driver, BASE_FEE, CIRCULATING_SUPPLY, NETWORK_VERSION};
pub use factory::{
    ActorOverride, MessageVm, StateView, VmContext, VmFactory, CHAOS_ACTOR_CODE_ID, CHAOS_ACTOR_NAME,
};
pub use rand::{RandomnessKind, RandomnessMatch, RandomnessRule, ReplayingRand};

pub mod driver;
pub mod factory;
pub mod rand;
pub mod testing;
pub mod trace;

/// The result of applying a single message.
/// This mirrors the FVM's internal application result, but is independent of any VM.
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    /// Message receipt for the transaction.
    pub receipt: Receipt,
    /// Gas penalty from transaction, if any.
    pub penalty: TokenAmount,
    /// Tip given to miner from message.
    pub miner_tip: TokenAmount,

    // Gas accounting
    pub gas_burned: u64,
    pub base_fee_burn: TokenAmount,
    pub over_estimation_burn: TokenAmount,

    /// Execution trace information, for debugging.
    pub trace: trace::ExecutionTrace,
    /// Description of the failure, empty if the message succeeded.
    pub message: String,
}

/// The top-level state of an actor, as read from a state tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActorState {
    /// Link to code for the actor.
    pub code: Cid,
    /// Link to the state of the actor.
    pub state: Cid,
    /// Sequence of the actor.
    pub sequence: u64,
    /// Tokens available to the actor.
    pub balance: TokenAmount,
    /// The actor's "delegated" address, if assigned.
    pub delegated_address: Option<Address>,
}
