use cid::Cid;
use fvm::externs::{Chain, Consensus, Externs, Rand};
use fvm_ipld_encoding::DAG_CBOR;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::consensus;
use fvm_shared::IDENTITY_HASH;
use fvm_tvx_api::ReplayingRand;
use multihash::Multihash;

/// VM externs for replaying test vectors.
/// Randomness is replayed from recordings, falling back to a fixed value.
/// No consensus faults are ever reported, and every epoch has the same tipset CID.
#[derive(Clone, Debug)]
pub struct TestExterns {
    randomness: ReplayingRand,
    tipset: Cid,
}

impl TestExterns {
    pub fn new(randomness: ReplayingRand) -> Self {
        Self {
            randomness,
            tipset: Cid::new_v1(
                DAG_CBOR,
                Multihash::wrap(IDENTITY_HASH, &0u64.to_be_bytes())
                    .expect("identity hash fits in a multihash"),
            ),
        }
    }
}

impl Default for TestExterns {
    fn default() -> Self {
        Self::new(ReplayingRand::default())
    }
}

impl Externs for TestExterns {}

impl Rand for TestExterns {
    fn get_chain_randomness(&self, epoch: ChainEpoch) -> anyhow::Result<[u8; 32]> {
        Ok(self.randomness.chain_digest(epoch))
    }

    fn get_beacon_randomness(&self, epoch: ChainEpoch) -> anyhow::Result<[u8; 32]> {
        Ok(self.randomness.beacon_digest(epoch))
    }
}

impl Consensus for TestExterns {
    fn verify_consensus_fault(
        &self,
        _h1: &[u8],
        _h2: &[u8],
        _extra: &[u8],
    ) -> anyhow::Result<(Option<consensus::ConsensusFault>, i64)> {
        Ok((None, 0))
    }
}

impl Chain for TestExterns {
    fn get_tipset_cid(&self, _epoch: ChainEpoch) -> anyhow::Result<Cid> {
        Ok(self.tipset)
    }
}
