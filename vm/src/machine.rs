use cid::Cid;
use fvm::executor::{ApplyKind, ApplyRet, Executor};
use fvm::trace::ExecutionEvent as FvmEvent;
use fvm_ipld_blockstore::Blockstore;
use fvm_shared::message::Message;
use fvm_tvx_api::trace::{ExecutionEvent, ExecutionTrace};
use fvm_tvx_api::{ExecutionResult, MessageVm};

use crate::factory::TestExecutor;

/// A single-use VM backed by a real FVM executor.
pub struct FvmVm<B>
where
    B: Blockstore + 'static,
{
    executor: TestExecutor<B>,
}

impl<B> FvmVm<B>
where
    B: Blockstore + 'static,
{
    pub fn new(executor: TestExecutor<B>) -> Self {
        Self { executor }
    }
}

impl<B> MessageVm for FvmVm<B>
where
    B: Blockstore + 'static,
{
    fn apply_message(
        &mut self,
        msg: Message,
        msg_length: usize,
    ) -> anyhow::Result<ExecutionResult> {
        self.executor.execute_message(msg, ApplyKind::Explicit, msg_length).map(ret_as_result)
    }

    fn flush(&mut self) -> anyhow::Result<Cid> {
        self.executor.flush()
    }
}

// Converts an FVM-internal application result to an API execution result.
fn ret_as_result(ret: ApplyRet) -> ExecutionResult {
    ExecutionResult {
        receipt: ret.msg_receipt,
        penalty: ret.penalty,
        miner_tip: ret.miner_tip,
        gas_burned: ret.gas_burned,
        base_fee_burn: ret.base_fee_burn,
        over_estimation_burn: ret.over_estimation_burn,
        trace: trace_as_trace(ret.exec_trace),
        message: ret.failure_info.map_or_else(String::new, |f| f.to_string()),
    }
}

// Converts an FVM-internal trace to an API trace.
// Events without an API counterpart are dropped.
fn trace_as_trace(fvm_trace: fvm::trace::ExecutionTrace) -> ExecutionTrace {
    let events = fvm_trace
        .into_iter()
        .filter_map(|e| match e {
            FvmEvent::GasCharge(c) => Some(ExecutionEvent::GasCharge {
                name: c.name,
                compute_milli: c.compute_gas.as_milligas(),
                other_milli: c.other_gas.as_milligas(),
            }),
            FvmEvent::Call { from, to, method, params, value, .. } => {
                Some(ExecutionEvent::Call { from, to, method, params, value })
            }
            FvmEvent::CallReturn(exit_code, return_value) => {
                Some(ExecutionEvent::CallReturn { exit_code, return_value })
            }
            FvmEvent::CallError(e) => Some(ExecutionEvent::CallError { reason: e.0, errno: e.1 }),
            FvmEvent::InvokeActor(code) => Some(ExecutionEvent::InvokeActor { code }),
            _ => None,
        })
        .collect();
    ExecutionTrace::new(events)
}
