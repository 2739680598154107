//! Step scheduling and run lifecycle.
//!
//! The [`Scheduler`] is the sole owner of one simulation run: its
//! [`Param`], its [`ResourceManager`], the step's [`SpatialIndex`], the
//! mechanical resolver, the registered collaborators and, optionally, a
//! dedicated rayon pool. There are no global singletons; two schedulers in
//! one process are two independent runs.
//!
//! ## Lifecycle
//!
//! ```text
//! Scheduler::new ─▶ setup (at most once) ─▶ run(n) ─▶ run(m) ... ─▶ teardown
//! ```
//!
//! `setup` is only accepted before the first step. After `teardown` every
//! operation that would touch cells fails with [`LifecycleError::TornDown`].
//!
//! ## Step pipeline
//!
//! Every step executes the same five stages, in this order and without
//! skipping:
//!
//! 1. [`Stage::RebuildIndex`] — rebuild the spatial index from committed
//!    positions.
//! 2. [`Stage::RunBehaviorModules`] — run every module of every cell, in
//!    parallel per container. Divisions go to the append buffers.
//! 3. [`Stage::CommitAppends`] — merge the append buffers in mother order and
//!    refresh the index so that it covers daughters and grown cells.
//! 4. [`Stage::ResolveMechanics`] — compute every displacement from the
//!    refreshed index, then apply them all.
//! 5. [`Stage::NotifyCollaborators`] — hand a read-only snapshot to every
//!    collaborator.
//!
//! Stage boundaries are full barriers: a stage starts only after the previous
//! one has finished on every worker.
//!
//! ## Determinism
//!
//! A run is a function of its parameters and initial population. The worker
//! count does not change the result: random streams are per cell, daughters
//! are merged in mother order and mechanics reads old state before writing.
//!
//! ## Cancellation
//!
//! A [`StopHandle`] can be cloned to any thread. The scheduler checks it
//! between steps only, so a stopped run always ends on a complete step.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::engine::error::{LifecycleError, ParamError, SimError, SimResult};
use crate::engine::manager::ResourceManager;
use crate::engine::mechanics::MechanicalResolver;
use crate::engine::param::Param;
use crate::engine::snapshot::{Collaborator, ContainerView, Snapshot};
use crate::engine::spatial::SpatialIndex;
use crate::engine::storage::{CellStorage, SoaStorage};
use crate::engine::timing::TimingAggregator;
use crate::engine::types::Step;


/// Stages of one simulation step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Rebuild the spatial index.
    RebuildIndex,
    /// Run every behavior module of every cell.
    RunBehaviorModules,
    /// Merge daughters and refresh the index.
    CommitAppends,
    /// Compute and apply displacements.
    ResolveMechanics,
    /// Hand the snapshot to collaborators.
    NotifyCollaborators,
}

impl Stage {
    /// Execution order of the stages within a step.
    pub const ORDER: [Stage; 5] = [
        Stage::RebuildIndex,
        Stage::RunBehaviorModules,
        Stage::CommitAppends,
        Stage::ResolveMechanics,
        Stage::NotifyCollaborators,
    ];

    /// Name used for timing spans and log records.
    pub fn name(self) -> &'static str {
        match self {
            Stage::RebuildIndex => "rebuild-index",
            Stage::RunBehaviorModules => "run-behavior-modules",
            Stage::CommitAppends => "commit-appends",
            Stage::ResolveMechanics => "resolve-mechanics",
            Stage::NotifyCollaborators => "notify-collaborators",
        }
    }
}

/// Cloneable request to stop a run at the next step boundary.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Requests a stop at the next step boundary.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns `true` once a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RunState {
    Fresh,
    Ready,
    TornDown,
}

/// Outcome of one step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepReport {
    /// Step this report belongs to.
    pub step: Step,
    /// Committed cells at the end of the step.
    pub population: usize,
    /// Divisions performed.
    pub divisions: usize,
    /// Division requests rejected.
    pub rejected_divisions: usize,
    /// Cells moved by mechanics.
    pub moved: usize,
    /// Collaborators whose `notify` failed.
    pub collaborator_failures: usize,
}

/// Outcome of one call to [`Scheduler::run`].
#[derive(Clone, Debug, Default)]
pub struct RunReport {
    /// One report per executed step.
    pub steps: Vec<StepReport>,
    /// Committed cells when the run ended.
    pub final_population: usize,
    /// Divisions performed.
    pub divisions: usize,
    /// Division requests rejected.
    pub rejected_divisions: usize,
    /// `true` if the stop handle ended the run before all steps were done.
    pub stopped_early: bool,
    /// Stage timings accumulated over the run.
    pub timings: TimingAggregator,
}

impl RunReport {
    /// Number of executed steps.
    pub fn steps_run(&self) -> usize {
        self.steps.len()
    }

    /// Population at the end of each executed step.
    pub fn populations(&self) -> Vec<usize> {
        self.steps.iter().map(|s| s.population).collect()
    }
}

/// Owner and driver of one simulation run.
pub struct Scheduler<S: CellStorage = SoaStorage> {
    param: Param,
    manager: ResourceManager<S>,
    index: SpatialIndex,
    resolver: MechanicalResolver,
    collaborators: Vec<Box<dyn Collaborator>>,
    pool: Option<ThreadPool>,
    stop: StopHandle,
    state: RunState,
    step: Step,
}

impl<S: CellStorage> Scheduler<S> {
    /// Creates a scheduler with an empty registry.
    ///
    /// If `param.threads` is set, the run gets a dedicated rayon pool of that
    /// size; otherwise it uses the global pool.
    pub fn new(param: Param) -> Result<Self, ParamError> {
        param.validate()?;
        let pool = param
            .threads
            .map(|n| {
                ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("cellsim-worker-{i}"))
                    .build()
            })
            .transpose()
            .map_err(|e| ParamError::ThreadPool(e.to_string()))?;

        Ok(Self {
            resolver: MechanicalResolver::from_param(&param),
            param,
            manager: ResourceManager::new(),
            index: SpatialIndex::new(),
            collaborators: Vec::new(),
            pool,
            stop: StopHandle::default(),
            state: RunState::Fresh,
            step: 0,
        })
    }

    /// Parameters of the run.
    pub fn param(&self) -> &Param {
        &self.param
    }

    /// Registry of agent types and containers.
    pub fn manager(&self) -> &ResourceManager<S> {
        &self.manager
    }

    /// Mutable registry access between steps.
    pub fn manager_mut(&mut self) -> Result<&mut ResourceManager<S>, LifecycleError> {
        if self.state == RunState::TornDown {
            return Err(LifecycleError::TornDown);
        }
        Ok(&mut self.manager)
    }

    /// Spatial index as of the last completed step.
    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    /// Number of completed steps.
    pub fn step(&self) -> Step {
        self.step
    }

    /// Returns a handle that stops the run from any thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Registers a collaborator notified at the end of every step.
    pub fn add_collaborator(&mut self, collaborator: impl Collaborator + 'static) {
        self.collaborators.push(Box::new(collaborator));
    }

    /// Populates the registry. Accepted once, before the first step.
    ///
    /// Cells appended by `init` are committed before this returns. If `init`
    /// or the commit fails, the registry is emptied and setup may be retried.
    pub fn setup<F>(&mut self, init: F) -> SimResult<()>
    where
        F: FnOnce(&mut ResourceManager<S>) -> SimResult<()>,
    {
        match self.state {
            RunState::Fresh => {}
            RunState::Ready => return Err(LifecycleError::SetupAlreadyDone.into()),
            RunState::TornDown => return Err(LifecycleError::TornDown.into()),
        }
        let populated = init(&mut self.manager).and_then(|()| Ok(self.manager.commit_all()?));
        if let Err(e) = populated {
            warn!("setup failed, discarding partial population: {e}");
            self.manager.clear();
            return Err(e);
        }
        self.state = RunState::Ready;
        info!(
            "setup complete: {} agent types, {} cells, layout {}",
            self.manager.agent_types().count(),
            self.manager.total_cells(),
            S::LAYOUT
        );
        Ok(())
    }

    /// Advances the simulation by up to `steps` steps.
    ///
    /// ## Errors
    /// Any fatal error aborts the run at the failing step and is returned;
    /// the report of the steps completed before it is lost. Rejected divisions
    /// and collaborator failures are logged and counted, not returned.
    pub fn run(&mut self, steps: u64) -> SimResult<RunReport> {
        match self.state {
            RunState::TornDown => return Err(LifecycleError::TornDown.into()),
            RunState::Fresh => self.state = RunState::Ready,
            RunState::Ready => {}
        }
        self.stop.reset();
        self.manager.commit_all()?;

        info!(
            "running {} steps from step {} with {} cells",
            steps,
            self.step,
            self.manager.total_cells()
        );

        let pool = self.pool.take();
        let result = match &pool {
            Some(pool) => pool.install(|| self.run_steps(steps)),
            None => self.run_steps(steps),
        };
        self.pool = pool;

        match &result {
            Ok(report) => info!(
                "run finished at step {}: {} cells, {} divisions, {} rejected{}",
                self.step,
                report.final_population,
                report.divisions,
                report.rejected_divisions,
                if report.stopped_early { " (stopped early)" } else { "" }
            ),
            Err(e) if e.is_fatal() => error!("run aborted at step {}: {e}", self.step),
            Err(e) => warn!("run failed at step {}: {e}", self.step),
        }
        result
    }

    fn run_steps(&mut self, steps: u64) -> SimResult<RunReport> {
        let mut report = RunReport::default();
        for _ in 0..steps {
            if self.stop.is_stopped() {
                report.stopped_early = true;
                break;
            }
            let step_report = self.execute_step(&mut report.timings)?;
            report.divisions += step_report.divisions;
            report.rejected_divisions += step_report.rejected_divisions;
            report.steps.push(step_report);
            self.step += 1;
        }
        report.final_population = self.manager.total_cells();
        Ok(report)
    }

    fn execute_step(&mut self, timings: &mut TimingAggregator) -> Result<StepReport, SimError> {
        let step = self.step;
        let margin = self.param.interaction_margin();
        self.manager.set_step(step);

        let mut report = StepReport { step, ..StepReport::default() };

        {
            let _g = timings.span(Stage::RebuildIndex.name());
            self.index.rebuild(self.manager.containers(), margin, step);
        }

        {
            let _g = timings.span(Stage::RunBehaviorModules.name());
            for container in self.manager.containers_mut() {
                let dispatch = container.run_behavior_modules(&self.param, &self.index, step)?;
                report.divisions += dispatch.divisions;
                report.rejected_divisions += dispatch.rejected.len();
            }
        }

        {
            let _g = timings.span(Stage::CommitAppends.name());
            self.manager.commit_all()?;
            self.index.rebuild(self.manager.containers(), margin, step);
        }

        {
            let _g = timings.span(Stage::ResolveMechanics.name());
            report.moved = self.resolver.resolve(&mut self.manager, &self.index)?.moved;
        }

        report.population = self.manager.total_cells();

        {
            let _g = timings.span(Stage::NotifyCollaborators.name());
            let views: Vec<&dyn ContainerView> =
                self.manager.containers().map(|c| c as &dyn ContainerView).collect();
            let snapshot = Snapshot::new(step, views);
            for collaborator in &mut self.collaborators {
                if let Err(e) = collaborator.notify(&snapshot) {
                    warn!("collaborator `{}` failed at step {step}: {e}", collaborator.name());
                    report.collaborator_failures += 1;
                }
            }
        }

        debug!(
            "step {step}: {} cells, {} divisions, {} rejected, {} moved",
            report.population, report.divisions, report.rejected_divisions, report.moved
        );
        Ok(report)
    }

    /// Ends the run and drops every cell. Idempotent.
    pub fn teardown(&mut self) {
        if self.state == RunState::TornDown {
            return;
        }
        info!("teardown after {} steps ({} cells)", self.step, self.manager.total_cells());
        self.manager.clear();
        self.index.clear();
        self.state = RunState::TornDown;
    }
}
