use cid::Cid;
use fvm::call_manager::CallManager;
use fvm::gas::{Gas, GasTimer, PriceList};
use fvm::kernel::{
    ActorOps, BlockId, BlockRegistry, BlockStat, CircSupplyOps, CryptoOps, DebugOps, EventOps,
    ExecutionError, GasOps, IpldBlockOps, LimiterOps, MessageOps, NetworkOps, RandomnessOps,
    SelfOps, SendResult,
};
use fvm::{DefaultKernel, Kernel};
use fvm_shared::address::Address;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::consensus::ConsensusFault;
use fvm_shared::crypto::signature::{
    SignatureType, SECP_PUB_LEN, SECP_SIG_LEN, SECP_SIG_MESSAGE_HASH_SIZE,
};
use fvm_shared::econ::TokenAmount;
use fvm_shared::piece::PieceInfo;
use fvm_shared::randomness::RANDOMNESS_LENGTH;
use fvm_shared::sector::{
    AggregateSealVerifyProofAndInfos, RegisteredSealProof, ReplicaUpdateInfo, SealVerifyInfo,
    WindowPoStVerifyInfo,
};
use fvm_shared::sys::out::network::NetworkContext;
use fvm_shared::sys::out::vm::MessageContext;
use fvm_shared::sys::{EventEntry, SendFlags};
use fvm_shared::{ActorID, MethodNum};
use multihash::MultihashGeneric;

pub type Result<T> = std::result::Result<T, ExecutionError>;

/// A kernel that accepts every signature, charging the gas real verification would.
/// All other operations, proof verification included, go to the default kernel.
pub struct TestKernel<C: CallManager> {
    inner: DefaultKernel<C>,
    price_list: PriceList,
}

impl<C: CallManager> TestKernel<C> {
    fn charge(&self, name: &str, gas: Gas) -> Result<()> {
        let _ = self.inner.charge_gas(name, gas)?;
        Ok(())
    }
}

impl<C> Kernel for TestKernel<C>
where
    C: CallManager,
{
    type CallManager = C;

    fn into_inner(self) -> (Self::CallManager, BlockRegistry)
    where
        Self: Sized,
    {
        self.inner.into_inner()
    }

    fn new(
        mgr: Self::CallManager,
        blocks: BlockRegistry,
        caller: ActorID,
        actor_id: ActorID,
        method: MethodNum,
        value_received: TokenAmount,
        read_only: bool,
    ) -> Self
    where
        Self: Sized,
    {
        let inner =
            DefaultKernel::new(mgr, blocks, caller, actor_id, method, value_received, read_only);
        let price_list = inner.price_list().clone();
        TestKernel { inner, price_list }
    }

    fn machine(&self) -> &<Self::CallManager as CallManager>::Machine {
        self.inner.machine()
    }

    fn send<K: Kernel<CallManager = Self::CallManager>>(
        &mut self,
        recipient: &Address,
        method: u64,
        params: BlockId,
        value: &TokenAmount,
        gas_limit: Option<Gas>,
        flags: SendFlags,
    ) -> fvm::kernel::Result<SendResult> {
        // Nested calls must run in a test kernel too.
        self.inner.send::<TestKernel<C>>(recipient, method, params, value, gas_limit, flags)
    }
}

impl<C> CryptoOps for TestKernel<C>
where
    C: CallManager,
{
    // Faked: every signature is valid.
    fn verify_signature(
        &self,
        sig_type: SignatureType,
        _signature: &[u8],
        _signer: &Address,
        plaintext: &[u8],
    ) -> Result<bool> {
        let charge = self.price_list.on_verify_signature(sig_type, plaintext.len());
        self.charge(&charge.name, charge.total())?;
        Ok(true)
    }

    fn batch_verify_seals(&self, vis: &[SealVerifyInfo]) -> Result<Vec<bool>> {
        self.inner.batch_verify_seals(vis)
    }

    fn verify_post(&self, vi: &WindowPoStVerifyInfo) -> Result<bool> {
        self.inner.verify_post(vi)
    }

    fn verify_aggregate_seals(&self, agg: &AggregateSealVerifyProofAndInfos) -> Result<bool> {
        self.inner.verify_aggregate_seals(agg)
    }

    fn verify_replica_update(&self, rep: &ReplicaUpdateInfo) -> Result<bool> {
        self.inner.verify_replica_update(rep)
    }

    // Consensus faults come from the externs, which never report one.
    fn verify_consensus_fault(
        &self,
        h1: &[u8],
        h2: &[u8],
        extra: &[u8],
    ) -> Result<Option<ConsensusFault>> {
        self.inner.verify_consensus_fault(h1, h2, extra)
    }

    fn hash(&self, code: u64, data: &[u8]) -> Result<MultihashGeneric<64>> {
        self.inner.hash(code, data)
    }

    fn compute_unsealed_sector_cid(
        &self,
        proof_type: RegisteredSealProof,
        pieces: &[PieceInfo],
    ) -> Result<Cid> {
        self.inner.compute_unsealed_sector_cid(proof_type, pieces)
    }

    fn recover_secp_public_key(
        &self,
        hash: &[u8; SECP_SIG_MESSAGE_HASH_SIZE],
        signature: &[u8; SECP_SIG_LEN],
    ) -> Result<[u8; SECP_PUB_LEN]> {
        self.inner.recover_secp_public_key(hash, signature)
    }
}

impl<C> ActorOps for TestKernel<C>
where
    C: CallManager,
{
    fn resolve_address(&self, address: &Address) -> Result<ActorID> {
        self.inner.resolve_address(address)
    }

    fn get_actor_code_cid(&self, id: ActorID) -> Result<Cid> {
        self.inner.get_actor_code_cid(id)
    }

    fn next_actor_address(&self) -> Result<Address> {
        self.inner.next_actor_address()
    }

    fn create_actor(
        &mut self,
        code_id: Cid,
        actor_id: ActorID,
        delegated_address: Option<Address>,
    ) -> Result<()> {
        self.inner.create_actor(code_id, actor_id, delegated_address)
    }

    fn get_builtin_actor_type(&self, code_cid: &Cid) -> Result<u32> {
        self.inner.get_builtin_actor_type(code_cid)
    }

    fn get_code_cid_for_type(&self, typ: u32) -> Result<Cid> {
        self.inner.get_code_cid_for_type(typ)
    }

    fn balance_of(&self, actor_id: ActorID) -> Result<TokenAmount> {
        self.inner.balance_of(actor_id)
    }

    fn lookup_delegated_address(&self, actor_id: ActorID) -> Result<Option<Address>> {
        self.inner.lookup_delegated_address(actor_id)
    }
}

impl<C> IpldBlockOps for TestKernel<C>
where
    C: CallManager,
{
    fn block_open(&mut self, cid: &Cid) -> Result<(BlockId, BlockStat)> {
        self.inner.block_open(cid)
    }

    fn block_create(&mut self, codec: u64, data: &[u8]) -> Result<BlockId> {
        self.inner.block_create(codec, data)
    }

    fn block_link(&mut self, id: BlockId, hash_fun: u64, hash_len: u32) -> Result<Cid> {
        self.inner.block_link(id, hash_fun, hash_len)
    }

    fn block_read(&self, id: BlockId, offset: u32, buf: &mut [u8]) -> Result<i32> {
        self.inner.block_read(id, offset, buf)
    }

    fn block_stat(&self, id: BlockId) -> Result<BlockStat> {
        self.inner.block_stat(id)
    }
}

impl<C> CircSupplyOps for TestKernel<C>
where
    C: CallManager,
{
    fn total_fil_circ_supply(&self) -> Result<TokenAmount> {
        self.inner.total_fil_circ_supply()
    }
}

impl<C> DebugOps for TestKernel<C>
where
    C: CallManager,
{
    fn log(&self, msg: String) {
        self.inner.log(msg)
    }

    fn debug_enabled(&self) -> bool {
        self.inner.debug_enabled()
    }

    fn store_artifact(&self, name: &str, data: &[u8]) -> Result<()> {
        self.inner.store_artifact(name, data)
    }
}

impl<C> GasOps for TestKernel<C>
where
    C: CallManager,
{
    fn gas_used(&self) -> Gas {
        self.inner.gas_used()
    }

    fn charge_gas(&self, name: &str, compute: Gas) -> Result<GasTimer> {
        self.inner.charge_gas(name, compute)
    }

    fn price_list(&self) -> &PriceList {
        self.inner.price_list()
    }

    fn gas_available(&self) -> Gas {
        self.inner.gas_available()
    }
}

impl<C> MessageOps for TestKernel<C>
where
    C: CallManager,
{
    fn msg_context(&self) -> Result<MessageContext> {
        self.inner.msg_context()
    }
}

impl<C> NetworkOps for TestKernel<C>
where
    C: CallManager,
{
    fn network_context(&self) -> Result<NetworkContext> {
        self.inner.network_context()
    }

    fn tipset_cid(&self, epoch: ChainEpoch) -> Result<Cid> {
        self.inner.tipset_cid(epoch)
    }
}

impl<C> RandomnessOps for TestKernel<C>
where
    C: CallManager,
{
    fn get_randomness_from_tickets(
        &self,
        rand_epoch: ChainEpoch,
    ) -> Result<[u8; RANDOMNESS_LENGTH]> {
        self.inner.get_randomness_from_tickets(rand_epoch)
    }

    fn get_randomness_from_beacon(
        &self,
        rand_epoch: ChainEpoch,
    ) -> Result<[u8; RANDOMNESS_LENGTH]> {
        self.inner.get_randomness_from_beacon(rand_epoch)
    }
}

impl<C> SelfOps for TestKernel<C>
where
    C: CallManager,
{
    fn root(&mut self) -> Result<Cid> {
        self.inner.root()
    }

    fn set_root(&mut self, root: Cid) -> Result<()> {
        self.inner.set_root(root)
    }

    fn current_balance(&self) -> Result<TokenAmount> {
        self.inner.current_balance()
    }

    fn self_destruct(&mut self, burn_unspent: bool) -> Result<()> {
        self.inner.self_destruct(burn_unspent)
    }
}

impl<C> EventOps for TestKernel<C>
where
    C: CallManager,
{
    fn emit_event(
        &mut self,
        event_headers: &[EventEntry],
        raw_key: &[u8],
        raw_val: &[u8],
    ) -> Result<()> {
        self.inner.emit_event(event_headers, raw_key, raw_val)
    }
}

impl<C> LimiterOps for TestKernel<C>
where
    C: CallManager,
{
    type Limiter = <DefaultKernel<C> as LimiterOps>::Limiter;

    fn limiter_mut(&mut self) -> &mut Self::Limiter {
        self.inner.limiter_mut()
    }
}
