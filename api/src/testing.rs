//! A recording fake VM, for testing code that drives a `VmFactory` without a real VM.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::anyhow;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::{RawBytes, DAG_CBOR};
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use fvm_shared::message::Message;
use fvm_shared::receipt::Receipt;
use multihash::{Code, MultihashDigest};
use num_traits::Zero;

use crate::factory::{MessageVm, StateView, VmContext, VmFactory};
use crate::trace::ExecutionTrace;
use crate::{ActorState, ExecutionResult};

/// A deterministic CID derived from a seed.
pub fn test_root(seed: &[u8]) -> Cid {
    Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(seed))
}

/// The root a fake VM reports after applying one message on top of `root`.
pub fn successor_root(root: &Cid) -> Cid {
    test_root(&root.to_bytes())
}

/// A call made through the fake factory or one of its VMs.
#[derive(Clone, Debug, PartialEq)]
pub enum FakeCall {
    LoadState(Cid),
    CreateVm(VmContext),
    Apply(Message),
    Flush,
}

/// A step at which the fake can be made to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Load,
    FindActor,
    Create,
    Apply,
    Flush,
}

/// A VM factory that records calls and returns scripted results.
/// VMs created by the factory share its call log and receipt script.
#[derive(Clone, Default)]
pub struct FakeFactory {
    calls: Rc<RefCell<Vec<FakeCall>>>,
    receipts: Rc<RefCell<VecDeque<Receipt>>>,
    failing: Option<Step>,
    no_actors: bool,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every call at the given step.
    pub fn failing_at(mut self, step: Step) -> Self {
        self.failing = Some(step);
        self
    }

    /// Resolves no addresses in loaded state.
    pub fn without_actors(mut self) -> Self {
        self.no_actors = true;
        self
    }

    /// Queues receipts to be returned by successive applications.
    /// Once exhausted, applications return a successful empty receipt.
    pub fn with_receipts(self, receipts: impl IntoIterator<Item = Receipt>) -> Self {
        self.receipts.borrow_mut().extend(receipts);
        self
    }

    /// Returns all calls made so far, in order.
    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: FakeCall) {
        self.calls.borrow_mut().push(call);
    }

    fn check(&self, step: Step) -> anyhow::Result<()> {
        match self.failing {
            Some(s) if s == step => Err(anyhow!("fake {:?} failure", step)),
            _ => Ok(()),
        }
    }
}

impl<B: Blockstore> VmFactory<B> for FakeFactory {
    fn load_state<'a>(
        &'a self,
        _store: &'a B,
        root: &Cid,
    ) -> anyhow::Result<Box<dyn StateView + 'a>> {
        self.record(FakeCall::LoadState(*root));
        self.check(Step::Load).map_err(|e| anyhow!("failed to load state tree {}: {}", root, e))?;
        Ok(Box::new(FakeState { factory: self }))
    }

    fn create_vm(&self, _store: B, ctx: &VmContext) -> anyhow::Result<Box<dyn MessageVm>> {
        self.record(FakeCall::CreateVm(ctx.clone()));
        self.check(Step::Create)?;
        Ok(Box::new(FakeVm { factory: self.clone(), root: ctx.state_root }))
    }
}

struct FakeState<'a> {
    factory: &'a FakeFactory,
}

impl StateView for FakeState<'_> {
    fn find_actor(&self, addr: &Address) -> anyhow::Result<Option<ActorState>> {
        self.factory.check(Step::FindActor)?;
        if self.factory.no_actors {
            return Ok(None);
        }
        Ok(Some(ActorState {
            code: test_root(b"account"),
            state: test_root(&addr.to_bytes()),
            sequence: 0,
            balance: TokenAmount::zero(),
            delegated_address: None,
        }))
    }
}

struct FakeVm {
    factory: FakeFactory,
    root: Cid,
}

impl MessageVm for FakeVm {
    fn apply_message(
        &mut self,
        msg: Message,
        _msg_length: usize,
    ) -> anyhow::Result<ExecutionResult> {
        self.factory.record(FakeCall::Apply(msg));
        self.factory.check(Step::Apply)?;
        let receipt = self.factory.receipts.borrow_mut().pop_front().unwrap_or(Receipt {
            exit_code: ExitCode::OK,
            return_data: RawBytes::default(),
            gas_used: 0,
            events_root: None,
        });
        let message = if receipt.exit_code.is_success() {
            String::new()
        } else {
            format!("fake exit {}", receipt.exit_code)
        };
        Ok(ExecutionResult {
            receipt,
            penalty: TokenAmount::zero(),
            miner_tip: TokenAmount::zero(),
            gas_burned: 0,
            base_fee_burn: TokenAmount::zero(),
            over_estimation_burn: TokenAmount::zero(),
            trace: ExecutionTrace::default(),
            message,
        })
    }

    fn flush(&mut self) -> anyhow::Result<Cid> {
        self.factory.record(FakeCall::Flush);
        self.factory.check(Step::Flush)?;
        Ok(successor_root(&self.root))
    }
}
