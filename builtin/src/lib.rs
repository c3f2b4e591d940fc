use cid::Cid;
use fvm_actor_utils::shared_blockstore::SharedMemoryBlockstore;
use fvm_shared::state::StateTreeVersion;
use genesis::{create_genesis_actors, GenesisBuilder, GenesisResult, GenesisSpec};

pub mod genesis;

/// A store seeded with built-in actors, and the root of that state.
pub struct Genesis {
    pub store: SharedMemoryBlockstore,
    pub state_root: Cid,
    pub manifest_data_cid: Cid,
    pub actors: GenesisResult,
}

/// Creates a pre-state with the built-in actors a message needs, from the bundled actor code.
pub fn setup(spec: &GenesisSpec) -> anyhow::Result<Genesis> {
    let store = SharedMemoryBlockstore::new();
    let mut builder = GenesisBuilder::new_with_bundle(
        store.clone(),
        StateTreeVersion::V5,
        genesis::BUILTIN_ACTORS_BUNDLE,
    )?;
    let actors = create_genesis_actors(&mut builder, spec)?;
    let state_root = builder.flush()?;
    Ok(Genesis { store, state_root, manifest_data_cid: builder.manifest_data_cid(), actors })
}
