use anyhow::anyhow;
use cid::Cid;
use fvm::call_manager::DefaultCallManager;
use fvm::engine::EnginePool;
use fvm::executor::DefaultExecutor;
use fvm::machine::{DefaultMachine, MachineContext, NetworkConfig};
use fvm::state_tree::StateTree;
use fvm_ipld_blockstore::Blockstore;
use fvm_shared::address::Address;
use fvm_shared::clock::{ChainEpoch, EPOCH_DURATION_SECONDS};
use fvm_shared::version::NetworkVersion;
use fvm_tvx_api::{ActorState, MessageVm, StateView, VmContext, VmFactory};
use log::debug;

use crate::externs::TestExterns;
use crate::kernel::TestKernel;
use crate::machine::FvmVm;
use crate::manifest::install_actors;

pub type TestExecutor<B> =
    DefaultExecutor<TestKernel<DefaultCallManager<DefaultMachine<B, TestExterns>>>>;

/// A factory for VMs backed by a real FVM, with fake signature and proof verification.
/// The engine pool is shared by all VMs from the factory, so actor code is compiled once.
pub struct FvmFactory {
    network_version: NetworkVersion,
    engines: EnginePool,
}

impl FvmFactory {
    /// Creates a factory for VMs at a single network version.
    pub fn new(network_version: NetworkVersion) -> anyhow::Result<Self> {
        let network = network_config(network_version);
        let engines = EnginePool::new_default((&network).into())?;
        Ok(Self { network_version, engines })
    }

    pub fn network_version(&self) -> NetworkVersion {
        self.network_version
    }
}

impl<B> VmFactory<B> for FvmFactory
where
    B: Blockstore + 'static,
{
    fn load_state<'a>(
        &'a self,
        store: &'a B,
        root: &Cid,
    ) -> anyhow::Result<Box<dyn StateView + 'a>> {
        let tree = StateTree::new_from_root(store, root).map_err(anyhow::Error::from)?;
        Ok(Box::new(FvmStateView { tree }))
    }

    fn create_vm(&self, store: B, ctx: &VmContext) -> anyhow::Result<Box<dyn MessageVm>> {
        if ctx.network_version != self.network_version {
            return Err(anyhow!(
                "factory engines are configured for network version {:?}, not {:?}",
                self.network_version,
                ctx.network_version
            ));
        }

        let mut network = network_config(ctx.network_version);
        if !ctx.actors.is_empty() {
            let bundle_root = install_actors(&store, &ctx.state_root, &ctx.actors)?;
            debug!("overriding built-in actors with bundle {}", bundle_root);
            network.override_actors(bundle_root);
        }

        let machine_ctx = MachineContext {
            network,
            epoch: ctx.epoch,
            timestamp: epoch_timestamp(ctx.epoch)?,
            base_fee: ctx.base_fee.clone(),
            initial_state_root: ctx.state_root,
            circ_supply: ctx.circ_supply.clone(),
            tracing: true,
        };
        let machine =
            DefaultMachine::new(&machine_ctx, store, TestExterns::new(ctx.randomness.clone()))?;
        let executor = TestExecutor::<B>::new(self.engines.clone(), machine)?;
        Ok(Box::new(FvmVm::new(executor)))
    }
}

// Seconds since genesis at the start of an epoch.
fn epoch_timestamp(epoch: ChainEpoch) -> anyhow::Result<u64> {
    epoch
        .checked_mul(EPOCH_DURATION_SECONDS)
        .and_then(|t| u64::try_from(t).ok())
        .ok_or_else(|| anyhow!("epoch {} has no timestamp", epoch))
}

fn network_config(nv: NetworkVersion) -> NetworkConfig {
    let mut network = NetworkConfig::new(nv);
    // Enabling debugging is necessary to get log events in traces.
    network.enable_actor_debugging();
    network
}

/// A state tree loaded for inspection.
pub struct FvmStateView<S: Blockstore> {
    tree: StateTree<S>,
}

impl<S: Blockstore> StateView for FvmStateView<S> {
    fn find_actor(&self, addr: &Address) -> anyhow::Result<Option<ActorState>> {
        let id = match self
            .tree
            .lookup_id(addr)
            .map_err(|e| anyhow!("failed to resolve address {}: {}", addr, e))?
        {
            Some(id) => id,
            None => return Ok(None),
        };
        let raw = self
            .tree
            .get_actor(id)
            .map_err(|e| anyhow!("failed to load actor {}: {}", id, e))?;
        // convert from the FVM-internal actor state to the API type
        Ok(raw.map(|a| ActorState {
            code: a.code,
            state: a.state,
            sequence: a.sequence,
            balance: a.balance,
            delegated_address: a.delegated_address,
        }))
    }
}
