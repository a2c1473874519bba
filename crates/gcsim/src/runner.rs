//! Runner - one engine per worker thread
//!
//! Budgets are partitioned and every engine is constructed before the first
//! thread starts, so configuration errors surface without any allocation
//! having happened. Workers share nothing but the collector.

use std::any::Any;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use chrono::Utc;

use crate::collector::Collector;
use crate::config::{AllocType, Args};
use crate::engine::{Engine, EngineTotals};
use crate::error::{Result, SimError};
use crate::object::{FlatItem, GraphItem};
use crate::report::RunReport;

/// An engine over whichever object shape the phase asks for
#[derive(Debug)]
enum Worker {
    Flat(Engine<FlatItem>),
    Graph(Engine<GraphItem>),
}

impl Worker {
    fn run(self) -> Result<EngineTotals> {
        match self {
            Worker::Flat(engine) => engine.run(),
            Worker::Graph(engine) => engine.run(),
        }
    }
}

/// Run the configured workload to completion
///
/// # Errors
///
/// Configuration errors before any thread starts; the first worker error
/// (by thread index) otherwise. A panicking worker is reported as
/// [`SimError::WorkerPanicked`].
pub fn run(args: &Args, collector: Arc<dyn Collector>) -> Result<RunReport> {
    let per_thread = args.per_thread_args()?;
    let alloc_type = args.phases[0].alloc_type;

    let workers = per_thread
        .into_iter()
        .map(|thread_args| {
            let collector = Arc::clone(&collector);
            Ok(match alloc_type {
                AllocType::Simple => Worker::Flat(Engine::new(thread_args, collector)?),
                AllocType::Reference => Worker::Graph(Engine::new(thread_args, collector)?),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    log::info!(
        "starting {} workers ({:?}, {:?})",
        workers.len(),
        args.phases[0].test_kind,
        alloc_type
    );

    let start = Utc::now();
    let timer = Instant::now();

    let handles = spawn_workers(workers, |index, worker| {
        thread::Builder::new()
            .name(format!("gcsim-worker-{}", index))
            .spawn(move || worker.run())
    })?;

    // Join everything before reporting the first failure.
    let results = join_all(handles);
    let totals = results.into_iter().collect::<Result<Vec<_>>>()?;

    let seconds_taken = timer.elapsed().as_secs_f64();
    let end = Utc::now();
    log::info!("all workers finished in {:.3}s", seconds_taken);

    Ok(RunReport::new(start, end, seconds_taken, collector.as_ref(), totals))
}

/// Start one thread per worker
///
/// If a spawn fails, the threads already started are joined before the
/// error is returned, so no worker outlives the call.
fn spawn_workers<W, T, S>(workers: Vec<W>, mut spawn: S) -> Result<Vec<JoinHandle<Result<T>>>>
where
    S: FnMut(usize, W) -> std::io::Result<JoinHandle<Result<T>>>,
{
    let mut handles = Vec::with_capacity(workers.len());
    for (index, worker) in workers.into_iter().enumerate() {
        match spawn(index, worker) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                log::error!("failed to spawn worker {}: {}", index, e);
                join_all(handles);
                return Err(e.into());
            },
        }
    }
    Ok(handles)
}

/// Join every handle in order, mapping panics to [`SimError::WorkerPanicked`]
fn join_all<T>(handles: Vec<JoinHandle<Result<T>>>) -> Vec<Result<T>> {
    handles
        .into_iter()
        .enumerate()
        .map(|(index, handle)| {
            handle.join().unwrap_or_else(|payload| {
                Err(SimError::WorkerPanicked {
                    index,
                    message: panic_message(payload.as_ref()),
                })
            })
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
