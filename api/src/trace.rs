use std::borrow::Cow;

use cid::Cid;
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::{ErrorNumber, ExitCode};
use fvm_shared::{ActorID, MethodNum};
use itertools::Itertools;

/// A trace of a single message execution comprising a series of events.
#[derive(Clone, Debug, Default)]
pub struct ExecutionTrace {
    events: Vec<ExecutionEvent>,
}

impl ExecutionTrace {
    pub fn new(events: Vec<ExecutionEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[ExecutionEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Sum of all gas charges, in milligas.
    pub fn total_gas_milli(&self) -> u64 {
        self.events
            .iter()
            .map(|e| match e {
                ExecutionEvent::GasCharge { compute_milli, other_milli, .. } => {
                    compute_milli + other_milli
                }
                _ => 0,
            })
            .sum()
    }

    /// Formats the trace one event per line, indenting nested calls.
    pub fn format(&self) -> String {
        let mut depth = 0usize;
        self.events
            .iter()
            .map(|e| {
                if matches!(e, ExecutionEvent::CallReturn { .. } | ExecutionEvent::CallError { .. })
                {
                    depth = depth.saturating_sub(1);
                }
                let line = format!("{}{}", "  ".repeat(depth), e.summary());
                if matches!(e, ExecutionEvent::Call { .. }) {
                    depth += 1;
                }
                line
            })
            .join("\n")
    }
}

/// An event forming part of an execution trace.
/// Closely modelled on the FVM's internal execution event type,
/// but usable without depending on the FVM directly.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum ExecutionEvent {
    GasCharge {
        name: Cow<'static, str>,
        compute_milli: u64,
        other_milli: u64,
    },
    Call {
        from: ActorID,
        to: Address,
        method: MethodNum,
        params: Option<IpldBlock>,
        value: TokenAmount,
    },
    CallReturn {
        exit_code: ExitCode,
        return_value: Option<IpldBlock>,
    },
    CallError {
        reason: String,
        errno: ErrorNumber,
    },
    InvokeActor {
        code: Cid,
    },
}

impl ExecutionEvent {
    fn summary(&self) -> String {
        match self {
            ExecutionEvent::GasCharge { name, compute_milli, other_milli } => {
                format!("gas {} compute={} other={}", name, compute_milli, other_milli)
            }
            ExecutionEvent::Call { from, to, method, value, .. } => {
                format!("call f0{} -> {} method={} value={}", from, to, method, value)
            }
            ExecutionEvent::CallReturn { exit_code, .. } => format!("return {}", exit_code),
            ExecutionEvent::CallError { reason, errno } => {
                format!("error {:?}: {}", errno, reason)
            }
            ExecutionEvent::InvokeActor { code } => format!("invoke {}", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gas(name: &'static str, compute: u64, other: u64) -> ExecutionEvent {
        ExecutionEvent::GasCharge { name: name.into(), compute_milli: compute, other_milli: other }
    }

    fn call(from: ActorID, to: ActorID) -> ExecutionEvent {
        ExecutionEvent::Call {
            from,
            to: Address::new_id(to),
            method: 2,
            params: None,
            value: TokenAmount::from_atto(5),
        }
    }

    #[test]
    fn sums_gas_charges() {
        let trace = ExecutionTrace::new(vec![
            gas("OnChainMessage", 1000, 200),
            call(100, 101),
            gas("OnMethodInvocation", 30, 0),
            ExecutionEvent::CallReturn { exit_code: ExitCode::OK, return_value: None },
        ]);
        assert_eq!(1230, trace.total_gas_milli());
        assert!(ExecutionTrace::default().is_empty());
    }

    #[test]
    fn formats_nested_calls() {
        let trace = ExecutionTrace::new(vec![
            call(100, 101),
            call(101, 102),
            ExecutionEvent::CallError { reason: "boom".to_string(), errno: ErrorNumber::NotFound },
            ExecutionEvent::CallReturn { exit_code: ExitCode::USR_FORBIDDEN, return_value: None },
        ]);
        let lines: Vec<String> = trace.format().lines().map(String::from).collect();
        assert_eq!(4, lines.len());
        assert!(lines[0].starts_with("call f0100"));
        assert!(lines[1].starts_with("  call f0101"));
        assert!(lines[2].starts_with("  error"));
        assert!(lines[3].starts_with("return"));
    }
}
