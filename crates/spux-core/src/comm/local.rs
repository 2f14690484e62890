//! In-process worker group: one OS thread per worker, crossbeam channels for
//! every link and a shared barrier for synchronization.

use super::{ManagerLink, Message, WorkerLink};
use crate::consts::{WORKER_STACK_SIZE, WORKER_THREAD_PREFIX};
use crate::error::{SpuxError, SpuxResult};
use crate::WorkerId;
use crossbeam_channel::{unbounded, Receiver, Select, Sender};
use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};
use tracing::{debug, error};
use typed_builder::TypedBuilder;

#[derive(TypedBuilder, Debug, Clone)]
pub struct SpawnOptions {
    pub workers: usize,
    #[builder(default = WORKER_STACK_SIZE)]
    pub stack_size: usize,
    #[builder(default = WORKER_THREAD_PREFIX.to_string(), setter(into))]
    pub thread_prefix: String,
}

pub struct LocalManager {
    downlinks: Vec<Sender<Message>>,
    uplinks: Vec<Receiver<Message>>,
    barrier: Arc<Barrier>,
    handles: Vec<JoinHandle<SpuxResult<()>>>,
}

pub struct LocalWorker {
    address: WorkerId,
    inbox: Receiver<Message>,
    outbox: Sender<Message>,
    // indexed by destination
    peer_out: Vec<Sender<Message>>,
    // indexed by source
    peer_in: Vec<Receiver<Message>>,
    barrier: Arc<Barrier>,
}

/// Wires a manager and `workers` worker links together without starting
/// any threads.
pub fn group(workers: usize) -> SpuxResult<(LocalManager, Vec<LocalWorker>)> {
    if workers < 1 {
        return Err(SpuxError::Configuration(format!(
            "worker group needs at least 1 worker, got {}",
            workers
        )));
    }

    let barrier = Arc::new(Barrier::new(workers + 1));
    let (downlinks, inboxes): (Vec<_>, Vec<_>) = (0..workers).map(|_| unbounded()).unzip();
    let (outboxes, uplinks): (Vec<_>, Vec<_>) = (0..workers).map(|_| unbounded()).unzip();

    // peers[source][destination]
    let peers: Vec<Vec<(Sender<Message>, Receiver<Message>)>> = (0..workers)
        .map(|_| (0..workers).map(|_| unbounded()).collect())
        .collect();

    let links = inboxes
        .into_iter()
        .zip(outboxes)
        .enumerate()
        .map(|(address, (inbox, outbox))| LocalWorker {
            address,
            inbox,
            outbox,
            peer_out: (0..workers)
                .map(|dst| peers[address][dst].0.clone())
                .collect(),
            peer_in: (0..workers)
                .map(|src| peers[src][address].1.clone())
                .collect(),
            barrier: Arc::clone(&barrier),
        })
        .collect();

    let manager = LocalManager {
        downlinks,
        uplinks,
        barrier,
        handles: Vec::new(),
    };
    Ok((manager, links))
}

/// Starts one named thread per worker running `body` on its link.
pub fn spawn<F>(options: SpawnOptions, body: F) -> SpuxResult<LocalManager>
where
    F: Fn(LocalWorker) -> SpuxResult<()> + Send + Sync + 'static,
{
    let (mut manager, links) = group(options.workers)?;
    let body = Arc::new(body);

    for link in links {
        let body = Arc::clone(&body);
        let handle = thread::Builder::new()
            .name(format!("{}-{}", options.thread_prefix, link.address))
            .stack_size(options.stack_size)
            .spawn(move || body(link))?;
        manager.handles.push(handle);
    }

    debug!("Local group: spawned {} workers", options.workers);
    Ok(manager)
}

fn hung_up(what: &str, worker: WorkerId) -> SpuxError {
    SpuxError::Disconnected(format!("{} of worker {} is closed", what, worker))
}

fn check_address(worker: WorkerId, workers: usize) -> SpuxResult<()> {
    if worker >= workers {
        return Err(SpuxError::Configuration(format!(
            "worker {} is outside the group of {}",
            worker, workers
        )));
    }
    Ok(())
}

impl ManagerLink for LocalManager {
    fn workers(&self) -> usize {
        self.downlinks.len()
    }

    fn broadcast(&self, message: Message) -> SpuxResult<()> {
        // Deliver to every live worker before reporting a closed one.
        let mut first_error = None;
        for (worker, tx) in self.downlinks.iter().enumerate() {
            if tx.send(message.clone()).is_err() {
                first_error.get_or_insert(hung_up("downlink", worker));
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn scatter(&self, messages: Vec<Message>) -> SpuxResult<()> {
        if messages.len() != self.workers() {
            return Err(SpuxError::Configuration(format!(
                "scatter needs {} messages, got {}",
                self.workers(),
                messages.len()
            )));
        }
        for (worker, (tx, message)) in self.downlinks.iter().zip(messages).enumerate() {
            tx.send(message).map_err(|_| hung_up("downlink", worker))?;
        }
        Ok(())
    }

    fn gather(&self) -> SpuxResult<Vec<Message>> {
        self.uplinks
            .iter()
            .enumerate()
            .map(|(worker, rx)| rx.recv().map_err(|_| hung_up("uplink", worker)))
            .collect()
    }

    fn barrier(&self) -> SpuxResult<()> {
        self.barrier.wait();
        Ok(())
    }

    fn send(&self, worker: WorkerId, message: Message) -> SpuxResult<()> {
        check_address(worker, self.workers())?;
        self.downlinks[worker]
            .send(message)
            .map_err(|_| hung_up("downlink", worker))
    }

    fn recv_any(&self) -> SpuxResult<(WorkerId, Message)> {
        let mut select = Select::new();
        for rx in &self.uplinks {
            select.recv(rx);
        }
        let operation = select.select();
        let worker = operation.index();
        let message = operation
            .recv(&self.uplinks[worker])
            .map_err(|_| hung_up("uplink", worker))?;
        Ok((worker, message))
    }

    fn release(&mut self) -> SpuxResult<()> {
        let mut first_error = None;
        for (worker, handle) in self.handles.drain(..).enumerate() {
            let outcome = match handle.join() {
                Ok(result) => result,
                Err(_) => Err(SpuxError::Disconnected(format!(
                    "worker {} panicked",
                    worker
                ))),
            };
            if let Err(e) = outcome {
                error!("Worker {} terminated with error: {}", worker, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl WorkerLink for LocalWorker {
    fn address(&self) -> WorkerId {
        self.address
    }

    fn workers(&self) -> usize {
        self.peer_out.len()
    }

    fn receive(&self) -> SpuxResult<Message> {
        self.inbox
            .recv()
            .map_err(|_| SpuxError::Disconnected("manager hung up".to_string()))
    }

    fn reply(&self, message: Message) -> SpuxResult<()> {
        self.outbox
            .send(message)
            .map_err(|_| SpuxError::Disconnected("manager hung up".to_string()))
    }

    fn barrier(&self) -> SpuxResult<()> {
        self.barrier.wait();
        Ok(())
    }

    fn send(&self, peer: WorkerId, message: Message) -> SpuxResult<()> {
        check_address(peer, self.workers())?;
        self.peer_out[peer]
            .send(message)
            .map_err(|_| hung_up("peer link", peer))
    }

    fn recv(&self, peer: WorkerId) -> SpuxResult<Message> {
        check_address(peer, self.workers())?;
        self.peer_in[peer]
            .recv()
            .map_err(|_| hung_up("peer link", peer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Instruction;

    #[test]
    fn zero_workers_is_a_configuration_error() {
        assert!(matches!(group(0), Err(SpuxError::Configuration(_))));
    }

    #[test]
    fn scatter_delivers_by_address() {
        let (manager, links) = group(3).unwrap();
        manager
            .scatter((0..3).map(|w| Message::Ensemble(vec![w * 10])).collect())
            .unwrap();
        for link in &links {
            match link.receive().unwrap() {
                Message::Ensemble(e) => assert_eq!(e, vec![link.address() * 10]),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn scatter_length_must_match() {
        let (manager, _links) = group(2).unwrap();
        let err = manager.scatter(vec![Message::Ensemble(vec![])]).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn gather_orders_by_worker() {
        let (manager, links) = group(2).unwrap();
        links[1].reply(Message::Ensemble(vec![1])).unwrap();
        links[0].reply(Message::Ensemble(vec![0])).unwrap();
        let gathered = manager.gather().unwrap();
        assert!(matches!(&gathered[0], Message::Ensemble(e) if e == &vec![0]));
        assert!(matches!(&gathered[1], Message::Ensemble(e) if e == &vec![1]));
    }

    #[test]
    fn peers_exchange_point_to_point() {
        let (_manager, links) = group(2).unwrap();
        links[0]
            .send(1, Message::Instruction(Instruction::Call))
            .unwrap();
        assert!(matches!(
            links[1].recv(0).unwrap(),
            Message::Instruction(Instruction::Call)
        ));
        assert!(links[1].send(2, Message::Ensemble(vec![])).is_err());
    }

    #[test]
    fn recv_any_reports_sender() {
        let (manager, links) = group(3).unwrap();
        links[2].reply(Message::Ensemble(vec![])).unwrap();
        let (worker, _) = manager.recv_any().unwrap();
        assert_eq!(worker, 2);
    }

    #[test]
    fn spawned_workers_join_on_release() {
        let options = SpawnOptions::builder().workers(2).build();
        let mut manager = spawn(options, |link| match link.receive()? {
            Message::Instruction(Instruction::Exit) => Ok(()),
            other => Err(other.unexpected("exit")),
        })
        .unwrap();
        manager
            .broadcast(Message::Instruction(Instruction::Exit))
            .unwrap();
        manager.release().unwrap();
    }
}
