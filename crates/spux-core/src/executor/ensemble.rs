use super::worker::EnsembleWorker;
use super::{Capability, Executor, ExecutorState, ParticleFactory};
use crate::balancer::{Adaptive, Balancer};
use crate::comm::local::{self, LocalManager, SpawnOptions};
use crate::comm::{ManagerLink, Message};
use crate::consts::{TIMING_CALL, TIMING_CONNECT, TIMING_RESAMPLE, TIMING_ROUTING, TIMING_WAIT};
use crate::error::{SpuxError, SpuxResult};
use crate::timing::Timing;
use crate::{CallRequest, Ensemble, Instruction, ParticleIndex, Traffic};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const SUPPORTED: &[Capability] = &[
    Capability::Connect,
    Capability::Call,
    Capability::Resample,
    Capability::Disconnect,
];

/// Manager of a group of ensemble workers.
///
/// Owns the per-worker ensembles between rounds and drives every state
/// transition; workers only ever see their own slice of the routing.
pub struct EnsembleExecutor<L: ManagerLink, B: Balancer = Adaptive> {
    link: L,
    balancer: B,
    state: ExecutorState,
    ensembles: Vec<Ensemble>,
    timing: Timing,
}

impl<L: ManagerLink> EnsembleExecutor<L, Adaptive> {
    pub fn bootup(link: L) -> SpuxResult<Self> {
        Self::with_balancer(link, Adaptive)
    }
}

impl EnsembleExecutor<LocalManager, Adaptive> {
    /// Boots `workers` in-process workers building particles with `factory`.
    pub fn spawn_local<F>(workers: usize, factory: F) -> SpuxResult<Self>
    where
        F: ParticleFactory + 'static,
    {
        let factory = Arc::new(factory);
        let options = SpawnOptions::builder().workers(workers).build();
        let link = local::spawn(options, move |link| {
            EnsembleWorker::new(link, Arc::clone(&factory)).run()
        })?;
        Self::bootup(link)
    }
}

impl<L: ManagerLink, B: Balancer> EnsembleExecutor<L, B> {
    pub fn with_balancer(link: L, balancer: B) -> SpuxResult<Self> {
        if link.workers() < 1 {
            return Err(SpuxError::Configuration(format!(
                "executor needs at least 1 worker, got {}",
                link.workers()
            )));
        }
        info!("Executor: booted with {} workers", link.workers());
        Ok(Self {
            link,
            balancer,
            state: ExecutorState::Idle,
            ensembles: Vec::new(),
            timing: Timing::new(),
        })
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Current particle indices per worker.
    pub fn ensembles(&self) -> &[Ensemble] {
        &self.ensembles
    }

    /// Distributes `indices` over the workers, each building its particles
    /// from `template`.
    pub fn connect(&mut self, template: Value, indices: &[ParticleIndex]) -> SpuxResult<()> {
        self.state.require(&[ExecutorState::Idle], "connect")?;
        self.timing.start(TIMING_CONNECT);

        let ensembles = self.balancer.ensembles(indices, self.link.workers())?;

        self.link.broadcast(Message::Instruction(Instruction::Init))?;
        self.link.broadcast(Message::Template(template))?;
        self.link
            .scatter(ensembles.iter().cloned().map(Message::Ensemble).collect())?;
        self.wait()?;
        self.acknowledge("connect")?;

        self.ensembles = ensembles;
        self.state = ExecutorState::Ready;
        self.timing.time(TIMING_CONNECT);
        info!(
            "Executor: connected {} particles over {} workers",
            indices.len(),
            self.link.workers()
        );
        Ok(())
    }

    /// Runs `method` on every particle. With `expect_results`, returns one
    /// value per particle ordered by particle index; otherwise returns
    /// nothing and does not wait for the workers.
    pub fn call(
        &mut self,
        method: &str,
        args: Vec<Value>,
        expect_results: bool,
    ) -> SpuxResult<Vec<Value>> {
        self.state.require(&[ExecutorState::Ready], "call")?;
        self.timing.start(TIMING_CALL);

        self.link.broadcast(Message::Instruction(Instruction::Call))?;
        self.link.broadcast(Message::Call(CallRequest::new(
            method,
            args,
            expect_results,
        )))?;

        if !expect_results {
            self.timing.time(TIMING_CALL);
            return Ok(Vec::new());
        }

        let gathered = self.link.gather()?;
        let mut results = Vec::new();
        for (worker, message) in gathered.into_iter().enumerate() {
            let entries = match message {
                Message::Results(entries) => entries,
                other => return Err(other.unexpected("results")),
            };
            for (index, value) in entries {
                match value {
                    Some(value) => results.push((index, value)),
                    None => {
                        error!(
                            "Executor: worker {} returned no result for particle {} in '{}'",
                            worker, index, method
                        );
                        self.abort();
                        return Err(SpuxError::WorkerFailure {
                            worker,
                            index: Some(index),
                        });
                    }
                }
            }
        }
        results.sort_by_key(|(index, _)| *index);

        self.timing.time(TIMING_CALL);
        Ok(results.into_iter().map(|(_, value)| value).collect())
    }

    /// Kills and clones particles so that exactly `indices` survive, then
    /// rebalances. Returns the round's traffic and, for every new particle
    /// index, the old index it came from.
    pub fn resample(
        &mut self,
        indices: &[ParticleIndex],
    ) -> SpuxResult<(Traffic, Vec<ParticleIndex>)> {
        self.state.require(&[ExecutorState::Ready], "resample")?;
        self.timing.start(TIMING_RESAMPLE);

        self.timing.start(TIMING_ROUTING);
        let (ensembles, routings) = self.balancer.routings(&self.ensembles, indices)?;
        let traffic = self.balancer.traffic(&routings);
        let sources = self.balancer.sources(&routings)?;
        self.timing.time(TIMING_ROUTING);

        self.link
            .broadcast(Message::Instruction(Instruction::Resample))?;
        self.link
            .scatter(routings.into_iter().map(Message::Routings).collect())?;
        self.wait()?;
        self.acknowledge("resample")?;
        self.ensembles = ensembles;

        self.timing.time(TIMING_RESAMPLE);
        debug!(
            "Executor: resampled {} particles (move {:.3}, copy {:.3}, cost {:.3})",
            indices.len(),
            traffic.moves,
            traffic.copy,
            traffic.cost
        );
        Ok((traffic, sources))
    }

    /// Tears the particles down and returns each worker's timing.
    pub fn disconnect(&mut self) -> SpuxResult<Vec<Timing>> {
        self.state.require(&[ExecutorState::Ready], "disconnect")?;

        self.link.broadcast(Message::Instruction(Instruction::Done))?;
        let timings = self
            .link
            .gather()?
            .into_iter()
            .map(|message| match message {
                Message::Timing(timing) => Ok(timing),
                other => Err(other.unexpected("timing")),
            })
            .collect::<SpuxResult<Vec<_>>>()?;

        self.ensembles.clear();
        self.state = ExecutorState::Idle;
        info!("Executor: disconnected");
        Ok(timings)
    }

    fn wait(&mut self) -> SpuxResult<()> {
        self.timing.start(TIMING_WAIT);
        self.link.barrier()?;
        self.timing.time(TIMING_WAIT);
        Ok(())
    }

    /// Collects the status every worker sends after a collective step and
    /// aborts the group if any of them failed.
    fn acknowledge(&mut self, operation: &str) -> SpuxResult<()> {
        let statuses = match self.link.gather() {
            Ok(statuses) => statuses,
            Err(e) => {
                self.abort();
                return Err(e);
            }
        };
        for (worker, message) in statuses.into_iter().enumerate() {
            match message {
                Message::Status(None) => {}
                Message::Status(Some(message)) => {
                    error!(
                        "Executor: worker {} failed during {}: {}",
                        worker, operation, message
                    );
                    self.abort();
                    return Err(SpuxError::WorkerError { worker, message });
                }
                other => {
                    self.abort();
                    return Err(other.unexpected("status"));
                }
            }
        }
        Ok(())
    }

    /// Stops every worker without tearing particles down first.
    fn abort(&mut self) {
        if self.state == ExecutorState::Terminated {
            return;
        }
        warn!("Executor: aborting worker group");
        self.state = ExecutorState::Terminated;
        self.ensembles.clear();
        if let Err(e) = self.link.broadcast(Message::Instruction(Instruction::Exit)) {
            warn!("Executor: {}", e);
        }
        if let Err(e) = self.link.release() {
            error!("Executor: abort incomplete: {}", e);
        }
    }
}

impl<L: ManagerLink, B: Balancer> Executor for EnsembleExecutor<L, B> {
    fn workers(&self) -> usize {
        self.link.workers()
    }

    fn supported(&self) -> &'static [Capability] {
        SUPPORTED
    }

    fn report(&self) -> Timing {
        self.timing.clone()
    }

    fn shutdown(&mut self) -> SpuxResult<()> {
        self.state.require(
            &[ExecutorState::Idle, ExecutorState::Ready],
            "shutdown",
        )?;
        if self.state == ExecutorState::Ready {
            self.disconnect()?;
        }

        self.link.broadcast(Message::Instruction(Instruction::Exit))?;
        self.state = ExecutorState::Terminated;
        self.link.release()?;
        info!("Executor: shut down");
        Ok(())
    }
}

impl<L: ManagerLink, B: Balancer> Drop for EnsembleExecutor<L, B> {
    fn drop(&mut self) {
        self.abort();
    }
}
