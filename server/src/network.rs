use crate::client_manager::{departed, ClientManager, ClientSession, SessionState};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::level::generate_level;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::physics::{advance_platforms, place_at_spawn_point};
use shared::protocol::{read_packet, write_packet, Packet, ProtocolError};
use shared::{Color, GameObject, Guid, Hue, ObjectKind, SpawnError, World, WorldState};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};

/// State shared by the accept loop, the tick driver and every session task.
///
/// Lock order is world, then sessions, then a session's queue. Every
/// operation that must look atomic to other sessions (admission, departure,
/// applying an update, a tick) holds the world lock throughout.
pub struct ServerContext {
    world: World,
    clients: RwLock<ClientManager>,
    tick: AtomicU64,
}

impl ServerContext {
    pub fn new(world: WorldState, max_clients: usize) -> Self {
        Self {
            world: World::new(world),
            clients: RwLock::new(ClientManager::new(max_clients)),
            tick: AtomicU64::new(0),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn clients(&self) -> &RwLock<ClientManager> {
        &self.clients
    }

    pub fn tick_count(&self) -> u64 {
        self.tick.load(Ordering::Relaxed)
    }

    /// Admits a new player without any socket I/O.
    ///
    /// Spawns the character, snapshots everything else into the new
    /// session's queue and tells the other sessions about the newcomer.
    pub async fn register_session(
        &self,
        addr: SocketAddr,
    ) -> Result<(Arc<ClientSession>, GameObject), ServerError> {
        let mut world = self.world.lock().await;
        let mut clients = self.clients.write().await;

        let player_id = clients
            .reserve_player_id()
            .ok_or(ServerError::ServerFull(clients.max_clients()))?;

        let mut character = {
            let mut rng = rand::thread_rng();
            let mut character = GameObject::character(player_id, Color::shade(Hue::Red, &mut rng));
            place_at_spawn_point(&world, &mut character, &mut rng)?;
            character
        };
        character = world.add(character)?;

        let snapshot = world.snapshot_except(character.guid);
        let session = Arc::new(ClientSession::new(
            character.guid,
            player_id,
            addr,
            snapshot,
        ));

        clients.broadcast(None, &character);
        clients.add_session(Arc::clone(&session));

        info!(
            "Player {} joined from {} as object {}",
            player_id, addr, character.guid
        );
        Ok((session, character))
    }

    /// Accepts a character update from the session that owns `guid`.
    ///
    /// The stored extents and radius always win over the client's, and the
    /// position is clamped to the window. Returns Ok(false) when the
    /// character is already gone, which happens when an update races the
    /// owner's departure.
    pub async fn apply_character_update(
        &self,
        guid: Guid,
        mut update: GameObject,
    ) -> Result<bool, ServerError> {
        if update.guid != guid || update.kind != ObjectKind::Character || update.is_removed() {
            return Err(ServerError::ProtocolViolation {
                session: guid,
                claimed: update.guid,
            });
        }

        let mut world = self.world.lock().await;
        match world.get(guid).filter(|o| !o.is_removed()) {
            Some(stored) => update.copy_shape_from(stored),
            None => return Ok(false),
        }
        update.normalize(world.window_size());
        if !world.replace(guid, update.clone()) {
            return Ok(false);
        }

        let clients = self.clients.read().await;
        clients.broadcast(Some(guid), &update);
        Ok(true)
    }

    /// Runs the departure protocol for the session owning `guid`.
    ///
    /// Only the first caller does the work and gets true back. The tombstone
    /// reaches every other session before the character leaves the world.
    pub async fn handle_departure(&self, guid: Guid) -> bool {
        let mut world = self.world.lock().await;
        let tombstone = match world.mark_removed(guid) {
            Some(tombstone) => tombstone,
            None => return false,
        };

        let mut clients = self.clients.write().await;
        let session = clients.remove_session(guid);
        if let Some(session) = &session {
            session.advance(SessionState::Departing);
        }

        clients.broadcast(Some(guid), &tombstone);
        world.remove(guid);

        if let Some(session) = session {
            session.advance(SessionState::Closed);
            info!(
                "Player {} ({}) has left the game",
                session.player_id, session.addr
            );
        }
        true
    }

    /// Advances all moving platforms by one tick and queues the changed ones
    /// for every session. Returns the number of changed objects.
    pub async fn advance_tick(&self) -> usize {
        let mut world = self.world.lock().await;
        let changed = {
            let mut rng = rand::thread_rng();
            advance_platforms(&mut world, &mut rng)
        };

        let clients = self.clients.read().await;
        clients.broadcast_many(None, &changed);

        let tick = self.tick.fetch_add(1, Ordering::Relaxed) + 1;
        if tick % 60 == 0 && !clients.is_empty() {
            debug!(
                "Tick {}: {} clients, {} objects, {} moved",
                tick,
                clients.len(),
                world.len(),
                changed.len()
            );
        }
        changed.len()
    }

    /// Registers a connection and starts its reader and writer tasks.
    async fn admit(self: &Arc<Self>, stream: TcpStream, addr: SocketAddr) -> Result<(), ServerError> {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle for {}: {}", addr, e);
        }

        let (session, character) = self.register_session(addr).await?;
        let (reader, writer) = stream.into_split();

        session.advance(SessionState::Active);
        tokio::spawn(read_loop(Arc::clone(self), Arc::clone(&session), reader));
        tokio::spawn(write_loop(Arc::clone(self), session, writer, character));
        Ok(())
    }
}

/// Reads character updates until the peer goes away, misbehaves, or the
/// session departs for another reason.
async fn read_loop(ctx: Arc<ServerContext>, session: Arc<ClientSession>, mut reader: OwnedReadHalf) {
    let guid = session.guid;
    let mut state = session.subscribe();

    loop {
        let packet = tokio::select! {
            _ = departed(&mut state) => return,
            packet = read_packet(&mut reader) => packet,
        };

        let result = match packet {
            Ok(Packet::CharacterUpdate(update)) => {
                ctx.apply_character_update(guid, update).await.map(|_| ())
            }
            Ok(other) => Err(ServerError::UnexpectedPacket(other.name())),
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            match e {
                ServerError::Protocol(ProtocolError::ConnectionClosed) => {
                    debug!("Player {} closed the connection", session.player_id)
                }
                ServerError::ProtocolViolation { .. } | ServerError::UnexpectedPacket(_) => {
                    warn!("Dropping player {}: {}", session.player_id, e)
                }
                _ => debug!("Read from player {} failed: {}", session.player_id, e),
            }
            break;
        }
    }

    ctx.handle_departure(guid).await;
}

/// Sends the handshake, then drains the session queue into `Objects` frames.
async fn write_loop(
    ctx: Arc<ServerContext>,
    session: Arc<ClientSession>,
    mut writer: OwnedWriteHalf,
    character: GameObject,
) {
    let guid = session.guid;
    let mut state = session.subscribe();
    let window_size = ctx.world.lock().await.window_size();

    let mut result = write_packet(
        &mut writer,
        &Packet::Assigned {
            character,
            window_size,
        },
    )
    .await;

    // The snapshot goes out even when it is empty
    if result.is_ok() {
        let snapshot = session.queue().drain_all();
        result = write_packet(&mut writer, &Packet::Objects(snapshot)).await;
    }

    while result.is_ok() {
        tokio::select! {
            _ = departed(&mut state) => break,
            _ = session.queue().wait() => {
                let batch = session.queue().drain_all();
                if !batch.is_empty() {
                    result = write_packet(&mut writer, &Packet::Objects(batch)).await;
                }
            }
        }
    }

    if let Err(e) = result {
        debug!("Write to player {} failed: {}", session.player_id, e);
    }
    if let Err(e) = writer.shutdown().await {
        debug!("Shutdown for player {} failed: {}", session.player_id, e);
    }
    ctx.handle_departure(guid).await;
}

/// TCP front end: accepts players and drives the simulation tick.
pub struct Server {
    listener: TcpListener,
    context: Arc<ServerContext>,
    config: ServerConfig,
}

impl Server {
    /// Generates a level from `config.level` and binds the listener.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let mut rng = match config.level.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let world = generate_level(&config.level, &mut rng)?;
        Self::with_world(config, world).await
    }

    /// Binds the listener around an existing world.
    ///
    /// Fails when the world has no spawn points, since nobody could join.
    pub async fn with_world(config: ServerConfig, world: WorldState) -> Result<Self, ServerError> {
        if world.filter_by_kind(ObjectKind::SpawnPoint).next().is_none() {
            return Err(SpawnError::NoSpawnPoints.into());
        }

        let listener = TcpListener::bind(config.bind_address()).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            context: Arc::new(ServerContext::new(world, config.max_clients)),
            config,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn context(&self) -> Arc<ServerContext> {
        Arc::clone(&self.context)
    }

    /// Writes the bound port number to `path`
    pub fn publish_port(&self, path: &Path) -> Result<(), ServerError> {
        let port = self.local_addr()?.port();
        std::fs::write(path, port.to_string())?;
        info!("Wrote port {} to {}", port, path.display());
        Ok(())
    }

    /// Accepts connections until a fatal error occurs. Does not tick.
    pub async fn serve(self) -> Result<(), ServerError> {
        loop {
            self.accept_one().await?;
        }
    }

    /// Accepts connections and ticks at the configured rate until Ctrl+C.
    ///
    /// Accepting runs on its own task so a slow admission never delays a tick
    /// and a tick never cancels an admission halfway.
    pub async fn run(self) -> Result<(), ServerError> {
        let mut tick_interval = interval(self.config.tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let context = self.context();

        info!(
            "Server started ({} Hz, up to {} players)",
            self.config.tick_rate, self.config.max_clients
        );

        let mut acceptor = tokio::spawn(self.serve());
        loop {
            tokio::select! {
                result = &mut acceptor => return result?,
                _ = tick_interval.tick() => {
                    context.advance_tick().await;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Server shutting down");
                    acceptor.abort();
                    break;
                }
            }
        }

        Ok(())
    }

    async fn accept_one(&self) -> Result<(), ServerError> {
        let (stream, addr) = match self.listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Error accepting connection: {}", e);
                return Ok(());
            }
        };

        match self.context.admit(stream, addr).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => {
                error!("Cannot admit players any more: {}", e);
                Err(e)
            }
            Err(e) => {
                warn!("Rejected connection from {}: {}", addr, e);
                Ok(())
            }
        }
    }
}
