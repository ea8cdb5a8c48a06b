//! # Platformer Server Library
//!
//! This library provides the authoritative server for the networked
//! multiplayer platformer. It owns the world, admits players over TCP,
//! relays each player's character to everyone else and moves the platforms.
//!
//! ## Core Responsibilities
//!
//! ### World Ownership
//! The server holds the one true copy of every object: scoreboard, window
//! boundaries, platforms, spawn points and the death and win zones. Players
//! simulate their own character locally and send the result back; the server
//! stores it and forwards it to the other players.
//!
//! ### Session Management
//! Handles the complete lifecycle of a player connection:
//! - Spawning a character next to a free spawn point
//! - Handshake: the player's own character, then a snapshot of the world
//! - Validating every update a player sends
//! - Departure, announced to everyone else with a tombstone
//!
//! ### Platform Simulation
//! On every tick the horizontal and vertical platforms move and bounce. Only
//! platforms that actually changed are sent out.
//!
//! ## Architecture Design
//!
//! ### Task per Connection Half
//! Each player gets a reader task and a writer task. The reader applies
//! incoming updates directly; the writer sleeps on the session's outbound
//! queue and sends everything pending as one batch. A watch channel carries
//! the session's lifecycle so either task can stop the other.
//!
//! ### One World Lock
//! All multi-step operations (admission, departure, applying an update, a
//! tick) run while holding the world lock. Other sessions therefore never
//! see a half-finished change and per-object ordering is the lock order.
//!
//! ### Framed TCP
//! Messages are length-prefixed bincode frames defined in the `shared`
//! crate, so the same codec is used on both ends.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Session registry, lifecycle states and fan-out to outbound queues.
//!
//! ### Queue Module (`queue`)
//! The multi-producer outbound queue with coalescing wake-ups.
//!
//! ### Network Module (`network`)
//! Listener, accept loop, per-session tasks, departure and the tick driver.
//!
//! ### Level Module (`level`)
//! Random level generation with placement retries.
//!
//! ### Config and Error Modules (`config`, `error`)
//! Runtime settings and the server-wide error type.

pub mod client_manager;
pub mod config;
pub mod error;
pub mod level;
pub mod network;
pub mod queue;

pub use config::{LevelConfig, ServerConfig};
pub use error::ServerError;
pub use network::{Server, ServerContext};
