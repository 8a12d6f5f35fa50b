//! In-process coordination store.
//!
//! [`InMemoryEnsemble`] keeps a node tree shared by any number of
//! [`InMemoryZooKeeper`] clients, each with its own session. It models the
//! parts of ZooKeeper the lock recipes depend on: ephemeral and sequential
//! nodes, one-shot existence watches, connection state, and the failures a
//! real ensemble produces (outages, expired sessions, lost acknowledgements).
//!
//! # Example
//!
//! ```rust
//! use distributed_lock_zookeeper::memory::InMemoryEnsemble;
//!
//! let ensemble = InMemoryEnsemble::new();
//! let client = ensemble.connect();
//! ensemble.stop();  // every client sees `Disconnected`
//! ensemble.start(); // and `Connected` again
//! # drop(client);
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::debug;

use crate::client::{
    ConnectionState, CreateRequest, CreateResult, DeleteResult, ExistsResult, GetChildrenResult,
    NodeEvent, NodeWatcher, WatchedEvent, ZooKeeperClient, ZooKeeperStatus,
};
use crate::path;

/// Store operations, for fault injection and accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Delete,
    Exists,
    GetChildren,
}

/// A failure to report for the next matching operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub operation: Operation,
    pub status: ZooKeeperStatus,
    /// Apply the operation before reporting `status`, as when the reply of a
    /// committed request is lost.
    pub applied: bool,
}

impl Fault {
    /// The request never reaches the store.
    pub fn rejected(operation: Operation, status: ZooKeeperStatus) -> Self {
        Self {
            operation,
            status,
            applied: false,
        }
    }

    /// The request is committed but its reply is lost.
    pub fn lost_reply(operation: Operation, status: ZooKeeperStatus) -> Self {
        Self {
            operation,
            status,
            applied: true,
        }
    }
}

type ClientId = u64;
type SessionId = u64;

#[derive(Debug)]
struct Node {
    data: Vec<u8>,
    owner: Option<SessionId>,
    next_sequence: u64,
}

impl Node {
    fn new(data: Vec<u8>, owner: Option<SessionId>) -> Self {
        Self {
            data,
            owner,
            next_sequence: 0,
        }
    }
}

#[derive(Debug)]
struct Session {
    id: SessionId,
    state: watch::Sender<ConnectionState>,
    closed: bool,
}

#[derive(Debug)]
struct EnsembleState {
    running: bool,
    nodes: BTreeMap<String, Node>,
    clients: HashMap<ClientId, Session>,
    watches: HashMap<String, Vec<(ClientId, NodeWatcher)>>,
    faults: VecDeque<Fault>,
    counters: HashMap<Operation, usize>,
    next_client: ClientId,
    next_session: SessionId,
}

impl EnsembleState {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(path::ROOT.to_string(), Node::new(Vec::new(), None));
        Self {
            running: true,
            nodes,
            clients: HashMap::new(),
            watches: HashMap::new(),
            faults: VecDeque::new(),
            counters: HashMap::new(),
            next_client: 0,
            next_session: 0,
        }
    }

    fn new_session(&mut self) -> SessionId {
        self.next_session += 1;
        self.next_session
    }

    /// Resolves the session a request runs in, or the status to fail with.
    fn session_of(&self, client: ClientId) -> Result<SessionId, ZooKeeperStatus> {
        match self.clients.get(&client) {
            None => Err(ZooKeeperStatus::Died),
            Some(session) if session.closed => Err(ZooKeeperStatus::Died),
            Some(_) if !self.running => Err(ZooKeeperStatus::ConnectionLoss),
            Some(session) => Ok(session.id),
        }
    }

    fn take_fault(&mut self, operation: Operation) -> Option<Fault> {
        let index = self.faults.iter().position(|f| f.operation == operation)?;
        self.faults.remove(index)
    }

    fn fire(&mut self, path: &str, event: NodeEvent) {
        if let Some(watchers) = self.watches.remove(path) {
            for (_, watcher) in watchers {
                let _ = watcher.send(WatchedEvent {
                    event,
                    path: path.to_string(),
                });
            }
        }
    }

    fn children_of(&self, parent: &str) -> Vec<String> {
        let prefix = if parent == path::ROOT {
            path::ROOT.to_string()
        } else {
            format!("{parent}{}", path::SEPARATOR)
        };
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, _)| {
                let rest = &key[prefix.len()..];
                (!rest.is_empty() && !rest.contains(path::SEPARATOR)).then(|| rest.to_string())
            })
            .collect()
    }

    fn create(&mut self, request: &CreateRequest, session: SessionId) -> CreateResult {
        let requested = request.path.as_str();
        if !path::is_valid(requested) || requested == path::ROOT {
            return CreateResult::unsuccessful(ZooKeeperStatus::BadArguments, requested, None);
        }
        let Some(parent) = path::parent(requested) else {
            return CreateResult::unsuccessful(ZooKeeperStatus::BadArguments, requested, None);
        };

        if !self.nodes.contains_key(parent) {
            if !request.create_parents {
                return CreateResult::unsuccessful(ZooKeeperStatus::NodeNotFound, requested, None);
            }
            if let Err(status) = self.create_ancestors(parent) {
                return CreateResult::unsuccessful(status, requested, None);
            }
        }

        let Some(parent_node) = self.nodes.get_mut(parent) else {
            return CreateResult::unsuccessful(ZooKeeperStatus::NodeNotFound, requested, None);
        };
        if parent_node.owner.is_some() {
            return CreateResult::unsuccessful(
                ZooKeeperStatus::ChildrenForEphemeralsAreNotAllowed,
                requested,
                None,
            );
        }

        let new_path = if request.mode.is_sequential() {
            let sequence = parent_node.next_sequence;
            parent_node.next_sequence += 1;
            format!("{requested}{sequence:0width$}", width = path::SEQUENTIAL_SUFFIX_LENGTH)
        } else {
            requested.to_string()
        };

        if self.nodes.contains_key(&new_path) {
            return CreateResult::unsuccessful(ZooKeeperStatus::NodeAlreadyExists, requested, None);
        }

        let owner = request.mode.is_ephemeral().then_some(session);
        self.nodes
            .insert(new_path.clone(), Node::new(request.data.clone(), owner));
        self.fire(&new_path, NodeEvent::Created);

        CreateResult::successful(requested, new_path)
    }

    fn create_ancestors(&mut self, path: &str) -> Result<(), ZooKeeperStatus> {
        if self.nodes.contains_key(path) {
            return Ok(());
        }
        let parent = path::parent(path).ok_or(ZooKeeperStatus::BadArguments)?;
        self.create_ancestors(parent)?;

        if self.nodes.get(parent).is_some_and(|node| node.owner.is_some()) {
            return Err(ZooKeeperStatus::ChildrenForEphemeralsAreNotAllowed);
        }
        self.nodes.insert(path.to_string(), Node::new(Vec::new(), None));
        self.fire(path, NodeEvent::Created);
        Ok(())
    }

    fn delete(&mut self, path: &str) -> DeleteResult {
        if !path::is_valid(path) || path == path::ROOT {
            return DeleteResult::unsuccessful(ZooKeeperStatus::BadArguments, path, None);
        }
        if !self.nodes.contains_key(path) {
            return DeleteResult::unsuccessful(ZooKeeperStatus::NodeNotFound, path, None);
        }
        if !self.children_of(path).is_empty() {
            return DeleteResult::unsuccessful(ZooKeeperStatus::NotEmpty, path, None);
        }

        self.nodes.remove(path);
        self.fire(path, NodeEvent::Deleted);
        DeleteResult::successful(path)
    }

    /// Removes the ephemeral nodes of `session`, notifying their watchers.
    fn expire(&mut self, session: SessionId) {
        let owned: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.owner == Some(session))
            .map(|(path, _)| path.clone())
            .collect();

        for path in owned {
            self.nodes.remove(&path);
            self.fire(&path, NodeEvent::Deleted);
        }
    }

    fn forget_watches(&mut self, client: ClientId) {
        for watchers in self.watches.values_mut() {
            watchers.retain(|(owner, _)| *owner != client);
        }
        self.watches.retain(|_, watchers| !watchers.is_empty());
    }

    fn count(&mut self, operation: Operation) {
        *self.counters.entry(operation).or_default() += 1;
    }
}

/// Shared node tree and session registry. Cloning yields another handle to
/// the same ensemble.
#[derive(Debug, Clone)]
pub struct InMemoryEnsemble {
    state: Arc<Mutex<EnsembleState>>,
}

impl Default for InMemoryEnsemble {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEnsemble {
    /// Creates a running ensemble holding only the root node.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EnsembleState::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EnsembleState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Opens a client with a fresh session.
    pub fn connect(&self) -> InMemoryZooKeeper {
        let mut state = self.lock();
        state.next_client += 1;
        let id = state.next_client;
        let session = state.new_session();
        let initial = if state.running {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
        let (sender, _) = watch::channel(initial);
        state.clients.insert(
            id,
            Session {
                id: session,
                state: sender,
                closed: false,
            },
        );

        InMemoryZooKeeper {
            id,
            state: self.state.clone(),
        }
    }

    /// Takes the ensemble down. Requests fail with `ConnectionLoss` and every
    /// client reports `Disconnected` until [`start`](Self::start).
    pub fn stop(&self) {
        let mut state = self.lock();
        state.running = false;
        for session in state.clients.values().filter(|s| !s.closed) {
            session.state.send_replace(ConnectionState::Disconnected);
        }
        debug!("in-memory ensemble stopped");
    }

    /// Brings the ensemble back. Sessions survive the outage.
    pub fn start(&self) {
        let mut state = self.lock();
        state.running = true;
        for session in state.clients.values().filter(|s| !s.closed) {
            session.state.send_replace(ConnectionState::Connected);
        }
        debug!("in-memory ensemble started");
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Expires the session of `client`: its ephemeral nodes and watches are
    /// dropped, then the client reconnects under a new session.
    pub fn kill_session(&self, client: &InMemoryZooKeeper) {
        let mut state = self.lock();
        let Some(session) = state.clients.get(&client.id).filter(|s| !s.closed) else {
            return;
        };
        let expired = session.id;

        state.expire(expired);
        state.forget_watches(client.id);

        let renewed = state.new_session();
        let running = state.running;
        if let Some(session) = state.clients.get_mut(&client.id) {
            session.id = renewed;
            session.state.send_replace(ConnectionState::Expired);
            if running {
                session.state.send_replace(ConnectionState::Connected);
            } else {
                session.state.send_replace(ConnectionState::Disconnected);
            }
        }
        debug!(session = expired, "in-memory session killed");
    }

    /// Queues a failure for the next operation of `fault.operation`.
    pub fn inject(&self, fault: Fault) {
        self.lock().faults.push_back(fault);
    }

    /// Number of requests of `operation` received so far, failed ones included.
    pub fn operation_count(&self, operation: Operation) -> usize {
        self.lock().counters.get(&operation).copied().unwrap_or(0)
    }

    /// Number of watches registered on `path` that have not fired yet.
    pub fn watch_count(&self, path: &str) -> usize {
        self.lock().watches.get(path).map_or(0, Vec::len)
    }

    /// Names of the children of `path`, empty if it does not exist.
    pub fn children(&self, path: &str) -> Vec<String> {
        let state = self.lock();
        if !state.nodes.contains_key(path) {
            return Vec::new();
        }
        state.children_of(path)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.lock().nodes.contains_key(path)
    }

    pub fn data(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().nodes.get(path).map(|node| node.data.clone())
    }

    /// Deletes a node and everything below it.
    pub fn delete_recursive(&self, path: &str) {
        let mut state = self.lock();
        let mut doomed: Vec<String> = state
            .nodes
            .keys()
            .filter(|key| {
                key.as_str() == path
                    || key.starts_with(&format!("{}{}", path.trim_end_matches(path::SEPARATOR), path::SEPARATOR))
            })
            .filter(|key| key.as_str() != path::ROOT)
            .cloned()
            .collect();
        // Children first, so that every watcher sees a consistent tree.
        doomed.sort_by_key(|key| std::cmp::Reverse(key.len()));
        for key in doomed {
            state.nodes.remove(&key);
            state.fire(&key, NodeEvent::Deleted);
        }
    }
}

/// A client of an [`InMemoryEnsemble`]. Dropping it closes the session.
#[derive(Debug)]
pub struct InMemoryZooKeeper {
    id: ClientId,
    state: Arc<Mutex<EnsembleState>>,
}

impl InMemoryZooKeeper {
    fn lock(&self) -> MutexGuard<'_, EnsembleState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Closes the client. Its ephemeral nodes disappear, its state becomes
    /// [`ConnectionState::Died`] and every later request fails with
    /// [`ZooKeeperStatus::Died`].
    pub fn close(&self) {
        let mut state = self.lock();
        let Some(session) = state.clients.get_mut(&self.id) else {
            return;
        };
        if session.closed {
            return;
        }
        session.closed = true;
        session.state.send_replace(ConnectionState::Died);
        let expired = session.id;

        state.expire(expired);
        state.forget_watches(self.id);
    }

    /// Counts the request, consults injected faults and runs `apply` in the
    /// client's session.
    fn execute<T>(
        &self,
        operation: Operation,
        apply: impl FnOnce(&mut EnsembleState, SessionId) -> T,
        fail: impl FnOnce(ZooKeeperStatus) -> T,
    ) -> T {
        let mut state = self.lock();
        state.count(operation);

        let session = match state.session_of(self.id) {
            Ok(session) => session,
            Err(status) => return fail(status),
        };

        match state.take_fault(operation) {
            Some(fault) => {
                if fault.applied {
                    apply(&mut state, session);
                }
                fail(fault.status)
            }
            None => apply(&mut state, session),
        }
    }
}

impl Drop for InMemoryZooKeeper {
    fn drop(&mut self) {
        self.close();
    }
}

impl ZooKeeperClient for InMemoryZooKeeper {
    async fn create(&self, request: CreateRequest) -> CreateResult {
        tokio::task::yield_now().await;
        self.execute(
            Operation::Create,
            |state, session| state.create(&request, session),
            |status| CreateResult::unsuccessful(status, request.path.clone(), None),
        )
    }

    async fn delete(&self, path: &str) -> DeleteResult {
        tokio::task::yield_now().await;
        self.execute(
            Operation::Delete,
            |state, _| state.delete(path),
            |status| DeleteResult::unsuccessful(status, path, None),
        )
    }

    async fn exists(&self, path: &str, watcher: Option<NodeWatcher>) -> ExistsResult {
        tokio::task::yield_now().await;
        let client = self.id;
        self.execute(
            Operation::Exists,
            |state, _| {
                if !path::is_valid(path) {
                    return ExistsResult::unsuccessful(ZooKeeperStatus::BadArguments, path, None);
                }
                if let Some(watcher) = watcher {
                    let watchers = state.watches.entry(path.to_string()).or_default();
                    // Waiters that gave up leave closed senders behind.
                    watchers.retain(|(_, w)| !w.is_closed());
                    watchers.push((client, watcher));
                }
                ExistsResult::found(path, state.nodes.contains_key(path))
            },
            |status| ExistsResult::unsuccessful(status, path, None),
        )
    }

    async fn get_children(&self, path: &str) -> GetChildrenResult {
        tokio::task::yield_now().await;
        self.execute(
            Operation::GetChildren,
            |state, _| {
                if !path::is_valid(path) {
                    return GetChildrenResult::unsuccessful(
                        ZooKeeperStatus::BadArguments,
                        path,
                        None,
                    );
                }
                if !state.nodes.contains_key(path) {
                    return GetChildrenResult::unsuccessful(
                        ZooKeeperStatus::NodeNotFound,
                        path,
                        None,
                    );
                }
                GetChildrenResult::found(path, state.children_of(path))
            },
            |status| GetChildrenResult::unsuccessful(status, path, None),
        )
    }

    fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        let state = self.lock();
        match state.clients.get(&self.id) {
            Some(session) => session.state.subscribe(),
            None => watch::channel(ConnectionState::Died).1,
        }
    }
}
