use anyhow::{anyhow, Context};
use cid::Cid;
use fil_actors_runtime::runtime::builtins::Type;
use fil_actors_runtime::{
    BURNT_FUNDS_ACTOR_ADDR, BURNT_FUNDS_ACTOR_ID, CRON_ACTOR_ID, INIT_ACTOR_ID, REWARD_ACTOR_ID,
    STORAGE_MARKET_ACTOR_ADDR, STORAGE_MARKET_ACTOR_ID, STORAGE_POWER_ACTOR_ADDR,
    STORAGE_POWER_ACTOR_ID, SYSTEM_ACTOR_ID,
};
use futures::executor::block_on;
use fvm::machine::Manifest;
use fvm::state_tree::{ActorState, StateTree};
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_car::load_car_unchecked;
use fvm_ipld_encoding::ser::Serialize;
use fvm_ipld_encoding::CborStore;
use fvm_shared::address::{Address, BLS_PUB_LEN};
use fvm_shared::bigint::Zero;
use fvm_shared::econ::TokenAmount;
use fvm_shared::sector::StoragePower;
use fvm_shared::state::StateTreeVersion;
use fvm_shared::ActorID;
use multihash::Code;

pub use fil_builtin_actors_bundle::BUNDLE_CAR as BUILTIN_ACTORS_BUNDLE;

/// Builds a state tree of built-in actors, using code from an imported bundle.
pub struct GenesisBuilder<B: Blockstore> {
    state_tree: StateTree<B>,
    manifest_data_cid: Cid,
    manifest: Manifest,
}

impl<B: Blockstore> GenesisBuilder<B> {
    /// Imports built-in actor code and manifest from a bundle in CAR format.
    /// Does not create any actors.
    pub fn new_with_bundle(
        store: B,
        state_tree_version: StateTreeVersion,
        bundle: &[u8],
    ) -> anyhow::Result<Self> {
        let bundle_root = import_bundle(&store, bundle)?;
        let (manifest_version, manifest_data_cid): (u32, Cid) = store
            .get_cbor(&bundle_root)?
            .ok_or_else(|| anyhow!("no manifest information in bundle root {}", bundle_root))?;
        let manifest = Manifest::load(&store, &manifest_data_cid, manifest_version)?;
        let state_tree = StateTree::new(store, state_tree_version).map_err(anyhow::Error::from)?;
        Ok(Self { state_tree, manifest_data_cid, manifest })
    }

    pub fn store(&self) -> &B {
        self.state_tree.store()
    }

    /// The CID of the manifest data, as referenced by the system actor.
    pub fn manifest_data_cid(&self) -> Cid {
        self.manifest_data_cid
    }

    pub fn code_by_type(&self, actor_type: Type) -> anyhow::Result<Cid> {
        self.manifest
            .code_by_id(actor_type as u32)
            .copied()
            .ok_or_else(|| anyhow!("no code for built-in actor type {:?}", actor_type))
    }

    /// Creates a singleton actor at a fixed ID.
    /// A singleton actor does not have a robust address resolved via the Init actor.
    pub fn create_singleton_actor(
        &mut self,
        actor_type: Type,
        id: ActorID,
        state: &impl Serialize,
        balance: TokenAmount,
    ) -> anyhow::Result<()> {
        let code = self.code_by_type(actor_type)?;
        self.set_actor(code, id, state, balance)
    }

    /// Creates a non-singleton actor, registering its address with the Init actor.
    /// Returns the assigned ActorID.
    pub fn create_builtin_actor(
        &mut self,
        actor_type: Type,
        address: &Address,
        state: &impl Serialize,
        balance: TokenAmount,
    ) -> anyhow::Result<ActorID> {
        let code = self.code_by_type(actor_type)?;
        let id = self.state_tree.register_new_address(address)?;
        self.set_actor(code, id, state, balance)?;
        Ok(id)
    }

    /// Creates an actor with arbitrary code, registering its address with the Init actor.
    pub fn create_actor_with_code(
        &mut self,
        code: Cid,
        address: &Address,
        state: &impl Serialize,
        balance: TokenAmount,
    ) -> anyhow::Result<ActorID> {
        let id = self.state_tree.register_new_address(address)?;
        self.set_actor(code, id, state, balance)?;
        Ok(id)
    }

    /// Writes the state tree to the store and returns its root.
    pub fn flush(&mut self) -> anyhow::Result<Cid> {
        self.state_tree.flush().map_err(anyhow::Error::from)
    }

    fn set_actor(
        &mut self,
        code: Cid,
        id: ActorID,
        state: &impl Serialize,
        balance: TokenAmount,
    ) -> anyhow::Result<()> {
        let state_cid = self
            .state_tree
            .store()
            .put_cbor(state, Code::Blake2b256)
            .context("failed to put actor state while installing")?;
        self.state_tree.set_actor(
            id,
            ActorState { code, state: state_cid, sequence: 0, balance, delegated_address: None },
        );
        Ok(())
    }
}

/// The actors to install at genesis.
pub struct GenesisSpec {
    pub reward_balance: TokenAmount,
    pub faucet: Address,
    pub faucet_balance: TokenAmount,
    /// Further funded accounts, created after the faucet.
    pub accounts: Vec<(Address, TokenAmount)>,
}

impl Default for GenesisSpec {
    fn default() -> Self {
        GenesisSpec {
            reward_balance: TokenAmount::from_whole(1_100_000_000),
            // Faucet is installed in user-actor address space and needs a BLS/SECP address
            faucet: Address::new_bls(&[201; BLS_PUB_LEN]).unwrap(),
            faucet_balance: TokenAmount::from_whole(900_000_000),
            accounts: vec![],
        }
    }
}

pub struct GenesisResult {
    pub faucet_id: ActorID,
    pub account_ids: Vec<ActorID>,
}

impl GenesisResult {
    pub fn faucet_address(&self) -> Address {
        Address::new_id(self.faucet_id)
    }
}

/// Creates the actors that any message application touches: system, init, reward, cron,
/// power, market and burnt funds, followed by the faucet and funded accounts.
pub fn create_genesis_actors<B: Blockstore>(
    builder: &mut GenesisBuilder<B>,
    spec: &GenesisSpec,
) -> anyhow::Result<GenesisResult> {
    // System actor
    let system_state = fil_actor_system::State { builtin_actors: builder.manifest_data_cid() };
    builder.create_singleton_actor(
        Type::System,
        SYSTEM_ACTOR_ID,
        &system_state,
        TokenAmount::zero(),
    )?;

    // Init actor
    let init_state = fil_actor_init::State::new(builder.store(), "fvm-tvx".to_string())?;
    builder.create_singleton_actor(Type::Init, INIT_ACTOR_ID, &init_state, TokenAmount::zero())?;

    // Reward actor
    let reward_state = fil_actor_reward::State::new(StoragePower::zero());
    builder.create_singleton_actor(
        Type::Reward,
        REWARD_ACTOR_ID,
        &reward_state,
        spec.reward_balance.clone(),
    )?;

    // Cron actor
    let cron_state = fil_actor_cron::State {
        entries: vec![
            fil_actor_cron::Entry {
                receiver: STORAGE_POWER_ACTOR_ADDR,
                method_num: fil_actor_power::Method::OnEpochTickEnd as u64,
            },
            fil_actor_cron::Entry {
                receiver: STORAGE_MARKET_ACTOR_ADDR,
                method_num: fil_actor_market::Method::CronTick as u64,
            },
        ],
    };
    builder.create_singleton_actor(Type::Cron, CRON_ACTOR_ID, &cron_state, TokenAmount::zero())?;

    // Power actor
    let power_state = fil_actor_power::State::new(builder.store())?;
    builder.create_singleton_actor(
        Type::Power,
        STORAGE_POWER_ACTOR_ID,
        &power_state,
        TokenAmount::zero(),
    )?;

    // Market actor
    let market_state = fil_actor_market::State::new(builder.store())?;
    builder.create_singleton_actor(
        Type::Market,
        STORAGE_MARKET_ACTOR_ID,
        &market_state,
        TokenAmount::zero(),
    )?;

    // Burnt funds account
    let burnt_state = fil_actor_account::State { address: BURNT_FUNDS_ACTOR_ADDR };
    builder.create_singleton_actor(
        Type::Account,
        BURNT_FUNDS_ACTOR_ID,
        &burnt_state,
        TokenAmount::zero(),
    )?;

    // Faucet and other accounts
    let faucet_state = fil_actor_account::State { address: spec.faucet };
    let faucet_id = builder.create_builtin_actor(
        Type::Account,
        &spec.faucet,
        &faucet_state,
        spec.faucet_balance.clone(),
    )?;
    let account_ids = spec
        .accounts
        .iter()
        .map(|(address, balance)| {
            let state = fil_actor_account::State { address: *address };
            builder.create_builtin_actor(Type::Account, address, &state, balance.clone())
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(GenesisResult { faucet_id, account_ids })
}

fn import_bundle(store: &impl Blockstore, bundle: &[u8]) -> anyhow::Result<Cid> {
    match &*block_on(async { load_car_unchecked(store, bundle).await })? {
        [root] => Ok(*root),
        _ => Err(anyhow!("multiple root CIDs in bundle")),
    }
}
