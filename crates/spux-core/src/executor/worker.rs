use super::{Particle, ParticleFactory};
use crate::comm::{Message, WorkerLink};
use crate::consts::{TIMING_CALL, TIMING_CONNECT, TIMING_RESAMPLE};
use crate::error::{SpuxError, SpuxResult};
use crate::timing::Timing;
use crate::{Ensemble, Instruction, ParticleIndex, Routing, WorkerId};
use rayon::prelude::*;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Worker side of an [`EnsembleExecutor`](super::EnsembleExecutor).
///
/// Holds the particles of one ensemble and follows the manager's
/// instructions until told to exit.
pub struct EnsembleWorker<W: WorkerLink, F: ParticleFactory> {
    link: W,
    factory: Arc<F>,
    template: Option<Value>,
    ensemble: Ensemble,
    particles: BTreeMap<ParticleIndex, F::Particle>,
    timing: Timing,
}

impl<W: WorkerLink, F: ParticleFactory> EnsembleWorker<W, F> {
    pub fn new(link: W, factory: Arc<F>) -> Self {
        Self {
            link,
            factory,
            template: None,
            ensemble: Vec::new(),
            particles: BTreeMap::new(),
            timing: Timing::new(),
        }
    }

    pub fn run(mut self) -> SpuxResult<()> {
        loop {
            let instruction = match self.link.receive()? {
                Message::Instruction(instruction) => instruction,
                other => return Err(other.unexpected("instruction")),
            };
            debug!("Worker {}: {}", self.link.address(), instruction);

            match instruction {
                Instruction::Init => self.init()?,
                Instruction::Call => self.call()?,
                Instruction::Resample => self.resample()?,
                Instruction::Done => self.done()?,
                Instruction::Exit => return Ok(()),
            }
        }
    }

    fn init(&mut self) -> SpuxResult<()> {
        self.timing.start(TIMING_CONNECT);
        let template = match self.link.receive()? {
            Message::Template(template) => template,
            other => return Err(other.unexpected("template")),
        };
        let ensemble = match self.link.receive()? {
            Message::Ensemble(ensemble) => ensemble,
            other => return Err(other.unexpected("ensemble")),
        };

        let created = ensemble
            .iter()
            .map(|&index| Ok((index, self.factory.create(&template, index)?)))
            .collect::<SpuxResult<BTreeMap<_, _>>>();

        // Reach the barrier even on failure so the manager is not left waiting,
        // then report the outcome so it can abort the group.
        self.link.barrier()?;
        self.link.reply(status(&created))?;
        self.particles = created?;
        self.ensemble = ensemble;
        self.template = Some(template);
        self.timing.time(TIMING_CONNECT);
        Ok(())
    }

    fn call(&mut self) -> SpuxResult<()> {
        let request = match self.link.receive()? {
            Message::Call(request) => request,
            other => return Err(other.unexpected("call")),
        };
        self.timing.start(TIMING_CALL);
        debug!(
            "Worker {}: '{}' on {} particles",
            self.link.address(),
            request.method,
            self.ensemble.len()
        );

        let results: Vec<(ParticleIndex, Option<Value>)> = self
            .particles
            .par_iter_mut()
            .map(|(&index, particle)| (index, particle.call(&request.method, &request.args)))
            .collect();

        self.timing.time(TIMING_CALL);
        if request.expect_results {
            self.link.reply(Message::Results(results))?;
        }
        Ok(())
    }

    fn resample(&mut self) -> SpuxResult<()> {
        let table = match self.link.receive()? {
            Message::Routings(table) => table,
            other => return Err(other.unexpected("routings")),
        };
        self.timing.start(TIMING_RESAMPLE);

        let outcome = self.apply(&table);

        // Peers may still be sending to us until everyone is here.
        self.link.barrier()?;
        self.link.reply(status(&outcome))?;
        outcome?;
        self.timing.time(TIMING_RESAMPLE);
        Ok(())
    }

    /// Ships outgoing particles, collects incoming ones and rebuilds the
    /// local ensemble in routing order.
    fn apply(&mut self, table: &[Routing]) -> SpuxResult<()> {
        let me = self.link.address();

        // Peers block on what the table promises them, so the exchange always
        // runs to completion and the first failure is reported afterwards.
        let mut failure: Option<SpuxError> = table.iter().find(|r| !r.touches(me)).map(|r| {
            SpuxError::Invariant(format!(
                "worker {} was sent the routing of particle {} between {:?} and {:?}",
                me, r.index, r.source, r.destination
            ))
        });

        // Each particle crosses to a given peer once; extra clones are
        // duplicated on arrival.
        let mut shipped: HashSet<(ParticleIndex, WorkerId)> = HashSet::new();
        for routing in table {
            if let (Some(source), Some(destination)) = (routing.source, routing.destination) {
                if source == me && destination != me && shipped.insert((routing.index, destination))
                {
                    let state = self
                        .particles
                        .get(&routing.index)
                        .ok_or_else(|| missing(me, routing.index))
                        .and_then(|particle| Ok(serde_json::to_value(particle)?));
                    let message = match state {
                        Ok(state) => Message::Particle {
                            index: routing.index,
                            state,
                        },
                        Err(e) => {
                            let message = Message::Status(Some(e.to_string()));
                            failure.get_or_insert(e);
                            message
                        }
                    };
                    self.link.send(destination, message)?;
                }
            }
        }

        let mut expected: BTreeMap<WorkerId, BTreeSet<ParticleIndex>> = BTreeMap::new();
        for routing in table {
            if let (Some(source), Some(destination)) = (routing.source, routing.destination) {
                if destination == me && source != me {
                    expected.entry(source).or_default().insert(routing.index);
                }
            }
        }

        let mut arrived: HashMap<ParticleIndex, F::Particle> = HashMap::new();
        for (source, indices) in &expected {
            for _ in 0..indices.len() {
                let received = match self.link.recv(*source)? {
                    Message::Particle { index, state } if indices.contains(&index) => {
                        serde_json::from_value(state)
                            .map(|particle| {
                                arrived.insert(index, particle);
                            })
                            .map_err(SpuxError::from)
                    }
                    Message::Particle { index, .. } => Err(SpuxError::Invariant(format!(
                        "worker {} received unexpected particle {} from worker {}",
                        me, index, source
                    ))),
                    Message::Status(reason) => Err(SpuxError::Invariant(format!(
                        "worker {} could not ship to worker {}: {}",
                        source,
                        me,
                        reason.unwrap_or_default()
                    ))),
                    other => Err(other.unexpected("particle")),
                };
                if let Err(e) = received {
                    failure.get_or_insert(e);
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }

        let mut particles = BTreeMap::new();
        let mut ensemble = Vec::new();
        for routing in table.iter().filter(|r| r.destination == Some(me)) {
            let reindex = routing.reindex.ok_or_else(|| {
                SpuxError::Invariant(format!(
                    "routing of particle {} to worker {} has no reindex",
                    routing.index, me
                ))
            })?;

            let mut particle = match routing.source {
                Some(source) if source == me => self
                    .particles
                    .get(&routing.index)
                    .cloned()
                    .ok_or_else(|| missing(me, routing.index))?,
                Some(_) => arrived
                    .get(&routing.index)
                    .cloned()
                    .ok_or_else(|| missing(me, routing.index))?,
                None => {
                    let template = self.template.as_ref().ok_or_else(|| {
                        SpuxError::Invariant(format!("worker {} has no template", me))
                    })?;
                    self.factory.create(template, reindex)?
                }
            };
            particle.relabel(reindex);
            particles.insert(reindex, particle);
            ensemble.push(reindex);
        }

        debug!(
            "Worker {}: resampled {} -> {} particles ({} shipped, {} arrived)",
            me,
            self.particles.len(),
            particles.len(),
            shipped.len(),
            arrived.len()
        );

        // Old particles not routed here are dropped with the previous map.
        self.particles = particles;
        self.ensemble = ensemble;
        Ok(())
    }

    fn done(&mut self) -> SpuxResult<()> {
        self.particles.clear();
        self.ensemble.clear();
        self.template = None;
        let timing = std::mem::take(&mut self.timing);
        self.link.reply(Message::Timing(timing))
    }
}

/// Status reply closing a collective step; carries the error text on failure.
fn status<T>(outcome: &SpuxResult<T>) -> Message {
    Message::Status(outcome.as_ref().err().map(ToString::to_string))
}

fn missing(worker: WorkerId, index: ParticleIndex) -> SpuxError {
    SpuxError::Invariant(format!("worker {} does not hold particle {}", worker, index))
}
