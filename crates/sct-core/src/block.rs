//! Block executor: applies carriers in ledger order
//!
//! Later transactions see everything earlier ones committed, so order is
//! part of the input. A hard error aborts only its own transaction; the
//! block carries on with the next carrier.

use crate::carrier::ExecutionCarrier;
use crate::condensing::CondensingTransaction;
use crate::context::BlockContext;
use crate::dispatcher::TransactionDispatcher;
use crate::error::Error;
use crate::result::ExecutionResult;
use crate::state::StateStore;

/// Outcome of one carrier at a given position in the block
#[derive(Debug)]
pub struct TransactionReceipt {
    pub index: usize,
    pub outcome: Result<ExecutionResult, Error>,
}

impl TransactionReceipt {
    pub fn is_success(&self) -> bool {
        matches!(&self.outcome, Ok(result) if !result.revert)
    }

    pub fn gas_consumed(&self) -> u64 {
        self.outcome.as_ref().map(|r| r.gas_consumed).unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct BlockOutcome {
    pub receipts: Vec<TransactionReceipt>,
}

impl BlockOutcome {
    pub fn total_gas(&self) -> u64 {
        self.receipts
            .iter()
            .map(TransactionReceipt::gas_consumed)
            .fold(0u64, u64::saturating_add)
    }

    /// Condensing transactions to append to the block, in carrier order
    pub fn condensing_transactions(&self) -> Vec<&CondensingTransaction> {
        self.receipts
            .iter()
            .filter_map(|r| r.outcome.as_ref().ok())
            .flat_map(|r| r.internal_transactions.iter())
            .collect()
    }

    pub fn failed(&self) -> usize {
        self.receipts.iter().filter(|r| !r.is_success()).count()
    }
}

pub struct BlockExecutor<'d> {
    dispatcher: &'d TransactionDispatcher,
}

impl<'d> BlockExecutor<'d> {
    pub fn new(dispatcher: &'d TransactionDispatcher) -> Self {
        BlockExecutor { dispatcher }
    }

    pub fn execute_block<'c, S, I>(&self, store: &mut S, block: &BlockContext, carriers: I) -> BlockOutcome
    where
        S: StateStore,
        I: IntoIterator<Item = &'c ExecutionCarrier>,
    {
        let span = tracing::info_span!("block", number = block.number);
        let _enter = span.enter();

        let mut outcome = BlockOutcome::default();
        for (index, carrier) in carriers.into_iter().enumerate() {
            let result = self.dispatcher.execute(store, carrier, block);
            if let Err(err) = &result {
                tracing::warn!(index, kind = %err.kind(), error = %err, "transaction aborted");
            }
            outcome.receipts.push(TransactionReceipt { index, outcome: result });
        }
        tracing::info!(
            transactions = outcome.receipts.len(),
            failed = outcome.failed(),
            gas = outcome.total_gas(),
            "block executed"
        );
        outcome
    }
}
