use anyhow::{anyhow, Context};
use cid::Cid;
use fvm::state_tree::StateTree;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::tuple::*;
use fvm_ipld_encoding::CborStore;
use fvm_shared::ActorID;
use fvm_tvx_api::ActorOverride;
use log::debug;
use multihash::Code;

/// The only manifest format the FVM loads.
pub const MANIFEST_VERSION: u32 = 1;

const SYSTEM_ACTOR_ID: ActorID = 0;

#[derive(Serialize_tuple, Deserialize_tuple)]
struct SystemState {
    // Manifest data: Vec<(String, Cid)>
    builtin_actors: Cid,
}

/// Writes a built-in actor bundle root that extends the manifest of the state at `state_root`
/// with the given actors, for use as the machine's actor override.
/// Each actor's code is written to the store under its code CID.
/// The state tree is not modified.
pub fn install_actors<B: Blockstore>(
    store: &B,
    state_root: &Cid,
    actors: &[ActorOverride],
) -> anyhow::Result<Cid> {
    let manifest_data = builtin_manifest_data(store, state_root)?;
    let mut entries: Vec<(String, Cid)> = store
        .get_cbor(&manifest_data)?
        .ok_or_else(|| anyhow!("no built-in actor manifest at {}", manifest_data))?;

    for actor in actors {
        store.put_keyed(&actor.code_cid, &actor.wasm)?;
        if entries.iter().any(|(_, code)| *code == actor.code_cid) {
            debug!("actor code {} already in manifest", actor.code_cid);
            continue;
        }
        entries.push((actor.name.clone(), actor.code_cid));
    }

    let data_cid = store.put_cbor(&entries, Code::Blake2b256)?;
    store.put_cbor(&(MANIFEST_VERSION, data_cid), Code::Blake2b256)
}

/// Returns the CID of the manifest data referenced by the system actor.
fn builtin_manifest_data<B: Blockstore>(store: &B, state_root: &Cid) -> anyhow::Result<Cid> {
    let tree = StateTree::new_from_root(store, state_root).map_err(anyhow::Error::from)?;
    let system = tree
        .get_actor(SYSTEM_ACTOR_ID)
        .map_err(anyhow::Error::from)?
        .context("system actor not found")?;
    let state: SystemState =
        store.get_cbor(&system.state)?.context("system actor state not found")?;
    Ok(state.builtin_actors)
}

#[cfg(test)]
mod tests {
    use fvm::state_tree::ActorState;
    use fvm_ipld_blockstore::MemoryBlockstore;
    use fvm_shared::econ::TokenAmount;
    use fvm_shared::state::StateTreeVersion;
    use multihash::MultihashDigest;
    use num_traits::Zero;

    use super::*;

    fn code(name: &str) -> Cid {
        Cid::new_v1(fvm_ipld_encoding::IPLD_RAW, Code::Blake2b256.digest(name.as_bytes()))
    }

    // Writes a state tree holding only a system actor, whose manifest names two actors.
    fn system_only_state(store: &MemoryBlockstore) -> Cid {
        let entries =
            vec![("system".to_string(), code("system")), ("init".to_string(), code("init"))];
        let manifest_data = store.put_cbor(&entries, Code::Blake2b256).unwrap();
        let state = store
            .put_cbor(&SystemState { builtin_actors: manifest_data }, Code::Blake2b256)
            .unwrap();
        let mut tree = StateTree::new(store, StateTreeVersion::V5).unwrap();
        tree.set_actor(
            SYSTEM_ACTOR_ID,
            ActorState {
                code: code("system"),
                state,
                sequence: 0,
                balance: TokenAmount::zero(),
                delegated_address: None,
            },
        );
        tree.flush().unwrap()
    }

    fn load_override(store: &MemoryBlockstore, root: &Cid) -> Vec<(String, Cid)> {
        let (version, data): (u32, Cid) = store.get_cbor(root).unwrap().unwrap();
        assert_eq!(MANIFEST_VERSION, version);
        store.get_cbor(&data).unwrap().unwrap()
    }

    #[test]
    fn appends_actor_and_stores_code() {
        let _ = env_logger::builder().is_test(true).try_init();
        let store = MemoryBlockstore::new();
        let state_root = system_only_state(&store);
        let chaos = ActorOverride::new("chaos", code("chaos"), b"\0asm chaos".to_vec());

        let root = install_actors(&store, &state_root, &[chaos.clone()]).unwrap();
        let entries = load_override(&store, &root);
        assert_eq!(3, entries.len());
        assert_eq!(("chaos".to_string(), chaos.code_cid), entries[2]);
        assert_eq!(Some(chaos.wasm), store.get(&chaos.code_cid).unwrap());
    }

    #[test]
    fn known_code_is_not_duplicated() {
        let store = MemoryBlockstore::new();
        let state_root = system_only_state(&store);
        let again = ActorOverride::new("init-again", code("init"), vec![1]);

        let root = install_actors(&store, &state_root, &[again]).unwrap();
        assert_eq!(2, load_override(&store, &root).len());
    }

    #[test]
    fn requires_system_actor() {
        let store = MemoryBlockstore::new();
        let mut tree = StateTree::new(&store, StateTreeVersion::V5).unwrap();
        let empty_root = tree.flush().unwrap();
        let err = install_actors(&store, &empty_root, &[]).unwrap_err();
        assert!(err.to_string().contains("system actor not found"));
    }
}
