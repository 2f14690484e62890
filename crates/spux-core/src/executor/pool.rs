use super::{Capability, Executor, ExecutorState, Task};
use crate::comm::local::{self, LocalManager, SpawnOptions};
use crate::comm::{ManagerLink, Message, WorkerLink};
use crate::consts::TIMING_MAP;
use crate::error::{SpuxError, SpuxResult};
use crate::timing::Timing;
use crate::{Evaluation, Instruction, WorkerId};
use serde_json::Value;
use tracing::{debug, error, info, warn};

const SUPPORTED: &[Capability] = &[Capability::Map];

/// Dynamic dispatcher: hands out one task at a time and gives the next one
/// to whichever worker finishes first.
pub struct PoolExecutor<L: ManagerLink> {
    link: L,
    state: ExecutorState,
    timing: Timing,
}

impl<L: ManagerLink> PoolExecutor<L> {
    pub fn bootup(link: L) -> SpuxResult<Self> {
        if link.workers() < 1 {
            return Err(SpuxError::Configuration(format!(
                "pool needs at least 1 worker, got {}",
                link.workers()
            )));
        }
        info!("Pool: booted with {} workers", link.workers());
        Ok(Self {
            link,
            state: ExecutorState::Idle,
            timing: Timing::new(),
        })
    }

    /// Evaluates every task; results come back in task order.
    pub fn map(&mut self, tasks: Vec<Value>) -> SpuxResult<Vec<Evaluation>> {
        self.state.require(&[ExecutorState::Idle], "map")?;
        self.timing.start(TIMING_MAP);

        let total = tasks.len();
        let mut results: Vec<Option<Evaluation>> = (0..total).map(|_| None).collect();
        let mut queue = tasks.into_iter().enumerate();
        let mut pending = 0usize;

        for worker in 0..self.link.workers() {
            let Some((id, parameters)) = queue.next() else {
                break;
            };
            self.link.send(worker, Message::Task { id, parameters })?;
            pending += 1;
        }

        while pending > 0 {
            let (worker, message) = self.link.recv_any()?;
            pending -= 1;

            match message {
                Message::Outcome {
                    id,
                    evaluation: Some(evaluation),
                } if id < total => results[id] = Some(evaluation),
                Message::Outcome {
                    id,
                    evaluation: None,
                } => {
                    error!("Pool: worker {} returned no result for task {}", worker, id);
                    self.abort();
                    return Err(SpuxError::WorkerFailure {
                        worker,
                        index: Some(id),
                    });
                }
                Message::Outcome { id, .. } => {
                    return Err(SpuxError::Invariant(format!(
                        "worker {} answered unknown task {}",
                        worker, id
                    )));
                }
                other => return Err(other.unexpected("outcome")),
            }

            if let Some((id, parameters)) = queue.next() {
                self.link.send(worker, Message::Task { id, parameters })?;
                pending += 1;
            }
        }

        self.timing.time(TIMING_MAP);
        debug!("Pool: evaluated {} tasks", total);

        results
            .into_iter()
            .enumerate()
            .map(|(id, result)| {
                result.ok_or_else(|| SpuxError::Invariant(format!("task {} was never evaluated", id)))
            })
            .collect()
    }

    /// Collects and resets every worker's timing.
    pub fn timings(&mut self) -> SpuxResult<Vec<Timing>> {
        self.state.require(&[ExecutorState::Idle], "collect timings")?;
        self.link.broadcast(Message::Instruction(Instruction::Done))?;
        self.link
            .gather()?
            .into_iter()
            .map(|message| match message {
                Message::Timing(timing) => Ok(timing),
                other => Err(other.unexpected("timing")),
            })
            .collect()
    }

    fn abort(&mut self) {
        if self.state == ExecutorState::Terminated {
            return;
        }
        warn!("Pool: aborting worker group");
        self.state = ExecutorState::Terminated;
        if let Err(e) = self.link.broadcast(Message::Instruction(Instruction::Exit)) {
            warn!("Pool: {}", e);
        }
        if let Err(e) = self.link.release() {
            error!("Pool: abort incomplete: {}", e);
        }
    }
}

impl PoolExecutor<LocalManager> {
    /// Boots `workers` in-process workers, each owning the task built by
    /// `make` for its address.
    pub fn spawn_local<T, F>(workers: usize, make: F) -> SpuxResult<Self>
    where
        T: Task + 'static,
        F: Fn(WorkerId) -> T + Send + Sync + 'static,
    {
        let options = SpawnOptions::builder().workers(workers).build();
        let link = local::spawn(options, move |link| {
            let task = make(link.address());
            PoolWorker::new(link, task).run()
        })?;
        Self::bootup(link)
    }
}

impl<L: ManagerLink> Executor for PoolExecutor<L> {
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
        self.state.require(&[ExecutorState::Idle], "shutdown")?;
        self.link.broadcast(Message::Instruction(Instruction::Exit))?;
        self.state = ExecutorState::Terminated;
        self.link.release()?;
        info!("Pool: shut down");
        Ok(())
    }
}

impl<L: ManagerLink> Drop for PoolExecutor<L> {
    fn drop(&mut self) {
        self.abort();
    }
}

pub struct PoolWorker<W: WorkerLink, T: Task> {
    link: W,
    task: T,
    timing: Timing,
}

impl<W: WorkerLink, T: Task> PoolWorker<W, T> {
    pub fn new(link: W, task: T) -> Self {
        Self {
            link,
            task,
            timing: Timing::new(),
        }
    }

    pub fn run(mut self) -> SpuxResult<()> {
        loop {
            match self.link.receive()? {
                Message::Task { id, parameters } => {
                    self.timing.start(TIMING_MAP);
                    let evaluation = self.task.evaluate(&parameters);
                    self.timing.time(TIMING_MAP);
                    self.link.reply(Message::Outcome { id, evaluation })?;
                }
                Message::Instruction(Instruction::Done) => {
                    let timing = std::mem::take(&mut self.timing);
                    self.link.reply(Message::Timing(timing))?;
                }
                Message::Instruction(instruction) if instruction.is_terminal() => return Ok(()),
                other => return Err(other.unexpected("task")),
            }
        }
    }
}
