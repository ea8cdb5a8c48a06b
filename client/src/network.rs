use crate::game::ClientGameState;
use crate::input::{Autopilot, InputManager, KeyEvent};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::protocol::{read_packet, write_packet, Packet, ProtocolError};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Handshake failed: expected {expected}, got {got}")]
    Handshake {
        expected: &'static str,
        got: &'static str,
    },
}

/// Connection to the game server plus the local simulation it feeds
pub struct Client {
    state: Arc<Mutex<ClientGameState>>,
    reader: Option<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    input: InputManager,
    autopilot: Option<Autopilot<StdRng>>,
    pending_events: Vec<KeyEvent>,
}

impl Client {
    /// Connects and completes the handshake: own character first, then the
    /// snapshot of everything else.
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        info!("Connecting to {}...", addr);
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (mut reader, writer) = stream.into_split();

        let (character, window_size) = match read_packet(&mut reader).await? {
            Packet::Assigned {
                character,
                window_size,
            } => (character, window_size),
            other => {
                return Err(ClientError::Handshake {
                    expected: "Assigned",
                    got: other.name(),
                })
            }
        };
        let snapshot = match read_packet(&mut reader).await? {
            Packet::Objects(snapshot) => snapshot,
            other => {
                return Err(ClientError::Handshake {
                    expected: "Objects",
                    got: other.name(),
                })
            }
        };

        info!(
            "Connected! Player {} (object {}), {} objects in the world",
            character.player_id().unwrap_or_default(),
            character.guid,
            snapshot.len()
        );

        let state = ClientGameState::from_handshake(character, snapshot, window_size);
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            reader: Some(reader),
            writer,
            input: InputManager::new(),
            autopilot: None,
            pending_events: Vec::new(),
        })
    }

    pub fn state(&self) -> Arc<Mutex<ClientGameState>> {
        Arc::clone(&self.state)
    }

    pub fn enable_autopilot(&mut self, seed: Option<u64>) {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.autopilot = Some(Autopilot::new(rng));
        info!("Autopilot enabled");
    }

    /// Queues a key event for the next frame
    pub fn push_key(&mut self, event: KeyEvent) {
        self.pending_events.push(event);
    }

    /// Runs one frame: input, local simulation, then an update to the server
    /// if the character changed. Returns whether an update was sent.
    pub async fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<bool, ClientError> {
        let mut events = std::mem::take(&mut self.pending_events);
        if let Some(pilot) = self.autopilot.as_mut() {
            events.extend(pilot.next_events());
        }

        let update = {
            let mut state = self.state.lock().await;
            let input = &mut self.input;
            for event in events {
                state.with_character_state(|character| input.apply(event, character));
            }
            state.step(rng)
        };

        match update {
            Some(character) => {
                write_packet(&mut self.writer, &Packet::CharacterUpdate(character)).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Main client loop: receives on a background task and simulates at
    /// `tick_rate` until the server goes away or `max_ticks` frames ran.
    pub async fn run(&mut self, tick_rate: u32, max_ticks: Option<u64>) -> Result<(), ClientError> {
        let reader = match self.reader.take() {
            Some(reader) => reader,
            None => {
                warn!("Client loop already ran on this connection");
                return Ok(());
            }
        };

        let mut receiver = tokio::spawn(receive_loop(reader, Arc::clone(&self.state)));
        let mut tick_interval = interval(Duration::from_secs_f64(1.0 / tick_rate.max(1) as f64));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut rng = StdRng::from_entropy();
        let score_every = u64::from(tick_rate.max(1)) * 5;
        let mut ticks: u64 = 0;

        loop {
            tokio::select! {
                result = &mut receiver => {
                    match result {
                        Ok(Ok(())) => info!("Game server has shut down"),
                        Ok(Err(e)) => warn!("Lost connection to server: {}", e),
                        Err(e) => error!("Receive task failed: {}", e),
                    }
                    break;
                }
                _ = tick_interval.tick() => {
                    if let Err(e) = self.tick(&mut rng).await {
                        warn!("Failed to send update: {}", e);
                        break;
                    }
                    ticks += 1;

                    if ticks % score_every == 0 {
                        info!("Scores: {}", self.state.lock().await.scoreboard());
                    }
                    if max_ticks.map_or(false, |max| ticks >= max) {
                        info!("Stopping after {} ticks", ticks);
                        break;
                    }
                }
            }
        }

        receiver.abort();
        if let Err(e) = self.writer.shutdown().await {
            debug!("Shutdown failed: {}", e);
        }
        Ok(())
    }
}

/// Applies every batch from the server to the replica. Ends cleanly when
/// the server closes the connection.
async fn receive_loop(
    mut reader: OwnedReadHalf,
    state: Arc<Mutex<ClientGameState>>,
) -> Result<(), ProtocolError> {
    loop {
        match read_packet(&mut reader).await {
            Ok(Packet::Objects(batch)) => {
                let applied = state.lock().await.apply_updates(batch);
                debug!("Applied {} objects from server", applied);
            }
            Ok(other) => warn!("Unexpected {} packet from server", other.name()),
            Err(ProtocolError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}
