use std::time;

use crate::coordinator::Coordinator;
use crate::error::Error;
use crate::local;
use crate::message::ProcessID;
use crate::registry::Registry;

#[derive(Copy, Clone, Debug)]
pub struct Config {
    /// Total number of processes
    count: u32,

    /// Upper bound on waiting for a grant, if any
    timeout: Option<time::Duration>,
}

impl Config {
    pub fn new(count: u32) -> Self {
        Config {
            count,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: time::Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the registry, one coordinator per process, and spawns every
    /// process's inbox task. Must be called from within a tokio runtime.
    pub fn spawn(self) -> Result<Cluster, Error> {
        let (rxs, txs): (Vec<_>, Vec<_>) = (0..self.count)
            .map(|_| local::new())
            .unzip();

        let network = local::LocalNetwork::new(Registry::new(
            (0..self.count).map(ProcessID).zip(txs)
        ));

        let mut nodes = Vec::with_capacity(self.count as usize);
        let mut tasks = Vec::with_capacity(self.count as usize);

        for (id, rx) in (0..self.count).map(ProcessID).zip(rxs) {
            let mut coordinator = Coordinator::new(id, network.registry(), network.clone())?;
            if let Some(timeout) = self.timeout {
                coordinator = coordinator.with_timeout(timeout);
            }
            let inbox = local::Inbox::new(coordinator.clone(), rx);
            tasks.push(tokio::spawn(inbox.run()));
            nodes.push(coordinator);
        }

        info!("started {} processes", self.count);
        Ok(Cluster { nodes, tasks })
    }
}

/// Running in-process system. Inbox tasks are aborted on drop.
#[derive(Debug)]
pub struct Cluster {
    nodes: Vec<Coordinator<local::LocalNetwork>>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: ProcessID) -> Option<&Coordinator<local::LocalNetwork>> {
        self.nodes.get(id.0 as usize)
    }

    pub fn nodes(&self) -> &[Coordinator<local::LocalNetwork>] {
        &self.nodes
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
