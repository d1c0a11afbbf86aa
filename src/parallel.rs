//! Block-level parallelism
//!
//! Blocks are independent once assigned, so each worker takes a contiguous
//! range of blocks and writes its results into slots indexed by block number.
//! Output order therefore never depends on thread scheduling. Per-worker state
//! (statistics, scratch buffers) lives in the worker's clone of the processor
//! and is handed back after the join for merging.

use std::thread;

use tracing::debug;

use crate::error::Result;

/// Trait for types that turn one block of input into one block of output.
///
/// Each worker thread receives its own clone.
pub trait BlockProcessor: Send + Clone {
    type Input: Sync;
    type Output: Send;

    /// Process a single block
    fn process_block(&mut self, block_index: usize, input: &Self::Input) -> Result<Self::Output>;

    /// Called when a thread finishes its range of blocks
    /// Default implementation does nothing
    fn on_batch_complete(&mut self) -> Result<()> {
        Ok(())
    }

    /// Set the thread ID for this processor
    fn set_tid(&mut self, _tid: usize) {
        // Default implementation does nothing
    }

    /// Get the thread ID for this processor
    fn get_tid(&self) -> Option<usize> {
        None
    }
}

/// Resolves the worker count: 0 means all available cores
#[must_use]
pub fn resolve_threads(num_threads: usize) -> usize {
    if num_threads == 0 {
        num_cpus::get()
    } else {
        num_threads.min(num_cpus::get())
    }
}

/// Runs `processor` over every block on up to `num_threads` threads
///
/// # Returns
///
/// The outputs in block order and the worker processors (one per thread that
/// received blocks) for merging thread-local state.
///
/// The first error in block order is returned, tagged with its block index.
pub fn process_blocks_parallel<P: BlockProcessor>(
    processor: &P,
    inputs: &[P::Input],
    num_threads: usize,
) -> Result<(Vec<P::Output>, Vec<P>)> {
    if inputs.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    let num_threads = resolve_threads(num_threads).min(inputs.len());
    let blocks_per_thread = inputs.len().div_ceil(num_threads);
    debug!(
        blocks = inputs.len(),
        threads = num_threads,
        "processing blocks"
    );

    let mut slots: Vec<Option<Result<P::Output>>> = Vec::with_capacity(inputs.len());
    slots.resize_with(inputs.len(), || None);

    let workers = thread::scope(|scope| {
        let mut handles = Vec::new();
        for (tid, (chunk, slot_chunk)) in inputs
            .chunks(blocks_per_thread)
            .zip(slots.chunks_mut(blocks_per_thread))
            .enumerate()
        {
            let mut worker = processor.clone();
            worker.set_tid(tid);

            let handle = scope.spawn(move || -> Result<P> {
                let offset = tid * blocks_per_thread;
                for (idx, (input, slot)) in chunk.iter().zip(slot_chunk.iter_mut()).enumerate() {
                    let block_index = offset + idx;
                    let result = worker
                        .process_block(block_index, input)
                        .map_err(|e| e.in_block(block_index));
                    let failed = result.is_err();
                    *slot = Some(result);
                    if failed {
                        break;
                    }
                }
                worker.on_batch_complete()?;
                Ok(worker)
            });
            handles.push(handle);
        }

        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect::<Vec<_>>()
    });

    let mut outputs = Vec::with_capacity(inputs.len());
    for slot in slots {
        match slot {
            Some(result) => outputs.push(result?),
            // slots after a failing block stay empty; the failure came first
            None => break,
        }
    }
    let workers = workers.into_iter().collect::<Result<Vec<_>>>()?;
    Ok((outputs, workers))
}
