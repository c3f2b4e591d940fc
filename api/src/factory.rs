use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::IPLD_RAW;
use fvm_shared::address::Address;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::econ::TokenAmount;
use fvm_shared::message::Message;
use fvm_shared::version::NetworkVersion;
use fvm_shared::IDENTITY_HASH;
use lazy_static::lazy_static;
use multihash::Multihash;

use crate::rand::ReplayingRand;
use crate::{ActorState, ExecutionResult};

pub const CHAOS_ACTOR_NAME: &str = "chaos";

lazy_static! {
    /// The code CID by which test vectors reference the chaos actor.
    pub static ref CHAOS_ACTOR_CODE_ID: Cid = Cid::new_v1(
        IPLD_RAW,
        Multihash::wrap(IDENTITY_HASH, b"fil/1/chaos").expect("identity hash fits in a multihash"),
    );
}

/// A factory for single-use VM instances positioned at some prior state.
/// The driver talks to the VM only through this trait, so the same pipeline can run against
/// the real FVM or a recording fake.
pub trait VmFactory<B: Blockstore> {
    /// Loads the state tree rooted at `root`.
    /// Fails if the root (or the tree's top-level structure) is not present in the store.
    fn load_state<'a>(&'a self, store: &'a B, root: &Cid)
        -> anyhow::Result<Box<dyn StateView + 'a>>;

    /// Constructs a VM over the store, configured by the context.
    fn create_vm(&self, store: B, ctx: &VmContext) -> anyhow::Result<Box<dyn MessageVm>>;
}

impl<B, F> VmFactory<B> for &F
where
    B: Blockstore,
    F: VmFactory<B>,
{
    fn load_state<'a>(
        &'a self,
        store: &'a B,
        root: &Cid,
    ) -> anyhow::Result<Box<dyn StateView + 'a>> {
        (**self).load_state(store, root)
    }

    fn create_vm(&self, store: B, ctx: &VmContext) -> anyhow::Result<Box<dyn MessageVm>> {
        (**self).create_vm(store, ctx)
    }
}

/// Read access to a loaded state tree.
pub trait StateView {
    /// Looks up an actor by any of its addresses.
    /// Returns None if the address does not resolve to an actor.
    fn find_actor(&self, addr: &Address) -> anyhow::Result<Option<ActorState>>;
}

/// A VM instance ready to apply messages.
pub trait MessageVm {
    /// Applies an explicit message: the sender's nonce is checked and gas is charged.
    /// `msg_length` is the length of the message as included on chain.
    fn apply_message(&mut self, msg: Message, msg_length: usize)
        -> anyhow::Result<ExecutionResult>;

    /// Writes pending state to the store and returns the new state root.
    fn flush(&mut self) -> anyhow::Result<Cid>;
}

/// The configuration bundle from which a VM is constructed.
#[derive(Clone, Debug, PartialEq)]
pub struct VmContext {
    pub state_root: Cid,
    pub epoch: ChainEpoch,
    pub network_version: NetworkVersion,
    pub base_fee: TokenAmount,
    pub circ_supply: TokenAmount,
    pub randomness: ReplayingRand,
    /// Actor types to register in addition to those in the state's built-in manifest.
    pub actors: Vec<ActorOverride>,
}

/// An actor type to add to the VM's actor registry.
#[derive(Clone, PartialEq, Eq)]
pub struct ActorOverride {
    /// Name under which the actor is entered in the manifest.
    pub name: String,
    /// The code CID by which actors of this type are referenced from the state tree.
    pub code_cid: Cid,
    /// Wasm bytecode, stored under `code_cid`.
    pub wasm: Vec<u8>,
}

impl ActorOverride {
    pub fn new(name: impl Into<String>, code_cid: Cid, wasm: Vec<u8>) -> Self {
        Self { name: name.into(), code_cid, wasm }
    }

    /// The fault-injection actor that test vectors address by `CHAOS_ACTOR_CODE_ID`.
    pub fn chaos(wasm: Vec<u8>) -> Self {
        Self::new(CHAOS_ACTOR_NAME, *CHAOS_ACTOR_CODE_ID, wasm)
    }
}

impl std::fmt::Debug for ActorOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorOverride")
            .field("name", &self.name)
            .field("code_cid", &self.code_cid)
            .field("wasm_len", &self.wasm.len())
            .finish()
    }
}
