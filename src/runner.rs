use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::RawBytes;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::error::ExitCode;
use fvm_shared::receipt::Receipt;
use fvm_tvx_api::{ActorOverride, Driver, ExecutionResult, VmFactory, BASE_FEE};
use log::{debug, info, warn};
use num_traits::ToPrimitive;
use thiserror::Error;

use crate::vector::{MessageVector, ReceiptVector, MESSAGE_CLASS};

/// Ways a vector can fail to match its postconditions, or fail to be runnable at all.
#[derive(Debug, Error)]
pub enum VectorError {
    #[error("unsupported vector class {0}")]
    UnsupportedClass(String),
    #[error("randomness recorded at epoch {epoch} has {len} bytes, expected 32")]
    MalformedRandomness { epoch: ChainEpoch, len: usize },
    #[error("vector applies {messages} messages but expects {receipts} receipts")]
    ReceiptCount { messages: usize, receipts: usize },
    #[error("message {index}: expected exit code {expected}, got {actual}: {reason}")]
    ExitCode { index: usize, expected: ExitCode, actual: ExitCode, reason: String },
    #[error("message {index}: expected return {expected:?}, got {actual:?}")]
    ReturnData { index: usize, expected: RawBytes, actual: RawBytes },
    #[error("message {index}: expected gas used {expected}, got {actual}")]
    GasUsed { index: usize, expected: u64, actual: u64 },
    #[error("expected post-state root {expected}, got {actual}")]
    StateRoot { expected: Cid, actual: Cid },
}

/// The outcome of a vector whose postconditions all matched.
#[derive(Debug)]
pub struct VectorRun {
    pub results: Vec<ExecutionResult>,
    pub post_root: Cid,
}

/// Imports a message vector's state into the store and applies its messages in order,
/// each on top of the previous message's state root, checking every receipt and the final
/// root against the postconditions.
/// Clones of `store` must share the same underlying blocks.
/// The chaos actor is registered for every message, whatever the vector's selector says.
pub fn run_vector<F, B>(
    factory: F,
    chaos: ActorOverride,
    vector: &MessageVector,
    store: B,
) -> anyhow::Result<VectorRun>
where
    B: Blockstore + Clone,
    F: VmFactory<B>,
{
    if vector.class != MESSAGE_CLASS {
        return Err(VectorError::UnsupportedClass(vector.class.clone()).into());
    }
    let expected = &vector.postconditions.receipts;
    if vector.apply_messages.len() != expected.len() {
        return Err(VectorError::ReceiptCount {
            messages: vector.apply_messages.len(),
            receipts: expected.len(),
        }
        .into());
    }
    if let Some(basefee) = vector.preconditions.basefee {
        if BASE_FEE.atto().to_f64() != Some(basefee) {
            warn!("vector base fee {} ignored, applying with {}", basefee, *BASE_FEE);
        }
    }

    info!("running vector {}", vector.id());
    let roots = vector.load_car(&store)?;
    debug!("imported CAR with roots {:?}", roots);

    let driver = Driver::new(factory, chaos).with_randomness(vector.recorded_randomness()?);
    let base_epoch = vector.preconditions.base_epoch();
    let mut root = vector.preconditions.state_tree.root_cid;
    let mut results = Vec::with_capacity(expected.len());
    for (index, (apply, want)) in vector.apply_messages.iter().zip(expected).enumerate() {
        let msg = apply.message()?;
        let epoch = base_epoch + apply.epoch_offset.unwrap_or_default();
        let (ret, post_root) = driver.execute_message(&msg, &root, store.clone(), epoch)?;
        if let Err(e) = check_receipt(index, want, &ret.receipt, &ret.message) {
            debug!("trace of message {}:\n{}", index, ret.trace.format());
            return Err(e.into());
        }
        root = post_root;
        results.push(ret);
    }

    let expected_root = vector.postconditions.state_tree.root_cid;
    if root != expected_root {
        return Err(VectorError::StateRoot { expected: expected_root, actual: root }.into());
    }
    Ok(VectorRun { results, post_root: root })
}

fn check_receipt(
    index: usize,
    expected: &ReceiptVector,
    actual: &Receipt,
    reason: &str,
) -> Result<(), VectorError> {
    if expected.exit_code() != actual.exit_code {
        return Err(VectorError::ExitCode {
            index,
            expected: expected.exit_code(),
            actual: actual.exit_code,
            reason: reason.to_string(),
        });
    }
    if expected.return_data() != actual.return_data {
        return Err(VectorError::ReturnData {
            index,
            expected: expected.return_data(),
            actual: actual.return_data.clone(),
        });
    }
    if expected.gas_used != actual.gas_used {
        return Err(VectorError::GasUsed {
            index,
            expected: expected.gas_used,
            actual: actual.gas_used,
        });
    }
    Ok(())
}
