//! Session registry for connected players
//!
//! This module tracks every client connection the server has admitted:
//! - Session lifecycle (connecting, active, departing, closed)
//! - Player numbering and capacity limits
//! - Per-session outbound queues and fan-out of object updates
//!
//! The registry never touches sockets. Reader and writer tasks own the two
//! halves of a connection and watch their session's state to know when to stop.

use log::debug;
use shared::{GameObject, Guid};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

use crate::queue::OutboundQueue;

/// Lifecycle of a session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    /// Registered, I/O tasks not running yet
    Connecting,
    /// Reader and writer tasks are running
    Active,
    /// Departure has started; I/O tasks must stop
    Departing,
    /// Departure finished and the character is gone from the world
    Closed,
}

impl SessionState {
    pub fn is_departing(self) -> bool {
        self >= SessionState::Departing
    }
}

/// A connected player and the pipe of objects waiting to be sent to them
///
/// Each session carries:
/// - The GUID of the player's character, which doubles as the session key
/// - The player number shown on the scoreboard
/// - An outbound queue filled by any task and drained by the writer task
/// - A watch channel broadcasting lifecycle changes to its I/O tasks
#[derive(Debug)]
pub struct ClientSession {
    /// GUID of the character this session controls
    pub guid: Guid,
    /// Player number assigned on admission
    pub player_id: u32,
    /// Remote address, for logging
    pub addr: SocketAddr,
    queue: OutboundQueue,
    state: watch::Sender<SessionState>,
}

impl ClientSession {
    /// Creates a session whose queue already holds the handshake snapshot
    ///
    /// The snapshot is queued before the session becomes visible to other
    /// tasks, so anything broadcast afterwards is guaranteed to be sent
    /// after it.
    pub fn new(guid: Guid, player_id: u32, addr: SocketAddr, snapshot: Vec<GameObject>) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            guid,
            player_id,
            addr,
            queue: OutboundQueue::with_pending(snapshot),
            state,
        }
    }

    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Subscribes to lifecycle changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Advances the lifecycle to `next`
    ///
    /// Returns false when the session is already at or past `next`, which
    /// makes repeated departure signals harmless.
    pub fn advance(&self, next: SessionState) -> bool {
        self.state.send_if_modified(|current| {
            if next > *current {
                *current = next;
                true
            } else {
                false
            }
        })
    }
}

/// Resolves once `state` reports a departure, or once the session is dropped
pub async fn departed(state: &mut watch::Receiver<SessionState>) {
    loop {
        if state.borrow_and_update().is_departing() {
            return;
        }
        if state.changed().await.is_err() {
            return;
        }
    }
}

/// Registry of all admitted sessions
///
/// The ClientManager enforces the server's capacity limit, hands out player
/// numbers and fans object updates out to session queues. Callers hold the
/// world lock while using it for multi-step operations so that registry
/// changes and world changes are observed together.
#[derive(Debug)]
pub struct ClientManager {
    /// Sessions indexed by character GUID
    sessions: HashMap<Guid, Arc<ClientSession>>,
    /// Next player number for new sessions
    next_player_id: u32,
    /// Maximum number of concurrent sessions
    max_clients: usize,
}

impl ClientManager {
    /// Creates an empty registry with the given capacity
    ///
    /// Player numbers start from 1 and are never reused.
    pub fn new(max_clients: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            next_player_id: 1,
            max_clients,
        }
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    pub fn is_full(&self) -> bool {
        self.sessions.len() >= self.max_clients
    }

    /// Reserves the next player number
    ///
    /// Returns None when the registry is at capacity.
    pub fn reserve_player_id(&mut self) -> Option<u32> {
        if self.is_full() {
            return None;
        }
        let player_id = self.next_player_id;
        self.next_player_id += 1;
        Some(player_id)
    }

    /// Registers a session under its character GUID
    pub fn add_session(&mut self, session: Arc<ClientSession>) {
        debug!(
            "Registered session for player {} ({})",
            session.player_id, session.addr
        );
        self.sessions.insert(session.guid, session);
    }

    /// Unregisters a session
    ///
    /// Returns the session if it was still registered. Removing a session
    /// twice is harmless.
    pub fn remove_session(&mut self, guid: Guid) -> Option<Arc<ClientSession>> {
        self.sessions.remove(&guid)
    }

    pub fn get(&self, guid: Guid) -> Option<Arc<ClientSession>> {
        self.sessions.get(&guid).cloned()
    }

    /// Queues `object` on every session except `exclude`
    pub fn broadcast(&self, exclude: Option<Guid>, object: &GameObject) {
        for session in self.others(exclude) {
            session.queue().enqueue(object.clone());
        }
    }

    /// Queues a batch of objects on every session except `exclude`
    pub fn broadcast_many(&self, exclude: Option<Guid>, objects: &[GameObject]) {
        if objects.is_empty() {
            return;
        }
        for session in self.others(exclude) {
            session.queue().enqueue_many(objects.iter().cloned());
        }
    }

    fn others(&self, exclude: Option<Guid>) -> impl Iterator<Item = &Arc<ClientSession>> + '_ {
        self.sessions
            .values()
            .filter(move |session| Some(session.guid) != exclude)
    }

    /// Character GUIDs of all registered sessions
    pub fn guids(&self) -> Vec<Guid> {
        self.sessions.keys().copied().collect()
    }

    /// Returns the number of registered sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no sessions are registered
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Color, ObjectKind};
    use std::time::Duration;
    use tokio::time::timeout;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn session(guid: Guid, player_id: u32) -> Arc<ClientSession> {
        Arc::new(ClientSession::new(guid, player_id, test_addr(), Vec::new()))
    }

    fn platform(guid: Guid) -> GameObject {
        let mut platform =
            GameObject::platform(ObjectKind::HorizontalPlatform, 0, 50, 20, 5, Color::BLACK);
        platform.guid = guid;
        platform
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(5);
        assert_eq!(manager.max_clients(), 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_player_ids_increase() {
        let mut manager = ClientManager::new(3);
        assert_eq!(manager.reserve_player_id(), Some(1));
        assert_eq!(manager.reserve_player_id(), Some(2));
    }

    #[test]
    fn test_capacity_enforced() {
        let mut manager = ClientManager::new(1);
        let id = manager.reserve_player_id().unwrap();
        manager.add_session(session(10, id));

        assert!(manager.is_full());
        assert_eq!(manager.reserve_player_id(), None);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_session_twice() {
        let mut manager = ClientManager::new(2);
        manager.add_session(session(10, 1));

        assert!(manager.remove_session(10).is_some());
        assert!(manager.remove_session(10).is_none());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_broadcast_skips_excluded_session() {
        let mut manager = ClientManager::new(4);
        manager.add_session(session(10, 1));
        manager.add_session(session(11, 2));
        manager.add_session(session(12, 3));

        manager.broadcast(Some(11), &platform(99));

        assert_eq!(manager.get(10).unwrap().queue().len(), 1);
        assert_eq!(manager.get(11).unwrap().queue().len(), 0);
        assert_eq!(manager.get(12).unwrap().queue().len(), 1);
    }

    #[test]
    fn test_broadcast_many_reaches_everyone() {
        let mut manager = ClientManager::new(4);
        manager.add_session(session(10, 1));
        manager.add_session(session(11, 2));

        manager.broadcast_many(None, &[platform(98), platform(99)]);

        for guid in manager.guids() {
            let batch = manager.get(guid).unwrap().queue().drain_all();
            assert_eq!(batch.iter().map(|o| o.guid).collect::<Vec<_>>(), vec![98, 99]);
        }
    }

    #[test]
    fn test_session_state_only_moves_forward() {
        let session = session(10, 1);
        assert_eq!(session.state(), SessionState::Connecting);
        assert!(session.advance(SessionState::Active));
        assert!(session.advance(SessionState::Departing));
        assert!(!session.advance(SessionState::Departing));
        assert!(!session.advance(SessionState::Active));
        assert!(session.advance(SessionState::Closed));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_departed_wakes_watchers() {
        let session = session(10, 1);
        session.advance(SessionState::Active);
        let mut state = session.subscribe();

        let watcher = tokio::spawn(async move { departed(&mut state).await });
        tokio::task::yield_now().await;
        session.advance(SessionState::Departing);

        timeout(Duration::from_millis(200), watcher)
            .await
            .expect("watcher should wake up")
            .unwrap();
    }

    #[tokio::test]
    async fn test_departed_returns_immediately_when_already_gone() {
        let session = session(10, 1);
        session.advance(SessionState::Closed);
        let mut state = session.subscribe();

        timeout(Duration::from_millis(50), departed(&mut state))
            .await
            .expect("already departed");
    }
}
