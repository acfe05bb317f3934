//! Background solving.
//!
//! Solves block on web requests and external binaries, so
//! [`SolveTaskRunner`] runs them on the tokio blocking pool. The image
//! solution moves into the task and comes back inside a [`SolveOutcome`] on
//! the runner's channel.
//!
//! [`SolveTaskRunner::cancel`] raises the shared [`CancellationFlag`]. Running
//! solves stop with [`ExarataError::Cancelled`] at their next web request.
//!
//! A task that panics (a [`crate::exarata_errors::TerminalError`]) sends no
//! outcome; [`SolveTaskRunner::next_outcome`] resumes the panic in the caller.
use std::panic;

use tokio::{
    sync::mpsc,
    task::{AbortHandle, JoinSet},
};
use tracing::{debug, info, warn};

use crate::{
    config::ExarataConfig,
    engine::{AnyEngine, EngineArgument, EngineDomain, VehicleArgs},
    exarata_errors::ExarataError,
    http::{CancellationFlag, ExarataHttp},
    opihi::OpihiSolution,
};

/// One solve of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveStep {
    pub engine: AnyEngine,
    pub vehicle_args: VehicleArgs,
}

impl SolveStep {
    pub fn new(engine: AnyEngine) -> Self {
        SolveStep {
            engine,
            vehicle_args: VehicleArgs::new(),
        }
    }

    pub fn with_args(engine: AnyEngine, vehicle_args: VehicleArgs) -> Self {
        SolveStep { engine, vehicle_args }
    }
}

/// Sent back once a task is over.
#[derive(Debug)]
pub struct SolveOutcome {
    /// Domain of the last step attempted.
    pub domain: EngineDomain,
    pub solution: OpihiSolution,
    pub result: Result<(), ExarataError>,
}

pub struct SolveTaskRunner {
    http: ExarataHttp,
    sender: mpsc::UnboundedSender<SolveOutcome>,
    receiver: mpsc::UnboundedReceiver<SolveOutcome>,
    tasks: JoinSet<()>,
}

impl SolveTaskRunner {
    pub fn new(config: &ExarataConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        SolveTaskRunner {
            http: ExarataHttp::new(config, CancellationFlag::new()),
            sender,
            receiver,
            tasks: JoinSet::new(),
        }
    }

    /// Solve one domain in the background.
    pub fn spawn_solve(&mut self, solution: OpihiSolution, step: SolveStep) -> AbortHandle {
        self.spawn_pipeline(solution, vec![step])
    }

    /// Solve several domains in order, stopping at the first failure.
    ///
    /// A single outcome is sent, for the last step attempted. An empty
    /// pipeline sends nothing.
    pub fn spawn_pipeline(&mut self, mut solution: OpihiSolution, steps: Vec<SolveStep>) -> AbortHandle {
        let http = self.http.clone();
        self.spawn_job(move || {
            let mut last = None;
            for step in steps {
                let domain = step.engine.domain();
                debug!(%domain, engine = %step.engine, "background solve started");
                let result = solution.solve(&EngineArgument::Class(step.engine), &step.vehicle_args, &http);
                let failed = result.is_err();
                last = Some((domain, result));
                if failed {
                    break;
                }
            }
            let (domain, result) = last?;
            info!(%domain, ok = result.is_ok(), "background solve finished");
            Some(SolveOutcome { domain, solution, result })
        })
    }

    fn spawn_job<F>(&mut self, job: F) -> AbortHandle
    where
        F: FnOnce() -> Option<SolveOutcome> + Send + 'static,
    {
        let sender = self.sender.clone();
        self.tasks.spawn_blocking(move || {
            if let Some(outcome) = job() {
                // a dropped receiver means nobody waits for the outcome
                let _ = sender.send(outcome);
            }
        })
    }

    /// Wait for the next finished task.
    ///
    /// Return
    /// ----------
    /// * The next outcome, or `None` once no task is running and every
    ///   outcome has been taken.
    ///
    /// A panic of a task is resumed here.
    pub async fn next_outcome(&mut self) -> Option<SolveOutcome> {
        loop {
            if let Ok(outcome) = self.receiver.try_recv() {
                return Some(outcome);
            }
            match self.tasks.join_next().await? {
                Ok(()) => {}
                Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
                Err(err) => warn!(error = %err, "background solve aborted"),
            }
        }
    }

    /// Stop running solves at their next web request.
    pub fn cancel(&self) {
        info!("cancelling background solves");
        self.http.cancellation().cancel();
    }

    /// The flag shared by every task of this runner.
    pub fn cancellation(&self) -> CancellationFlag {
        self.http.cancellation().clone()
    }

    /// Allow web requests again after a [`SolveTaskRunner::cancel`].
    pub fn reset(&self) {
        self.http.cancellation().reset();
    }

    pub fn is_cancelled(&self) -> bool {
        self.http.cancellation().is_cancelled()
    }
}
