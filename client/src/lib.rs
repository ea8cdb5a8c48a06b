//! # Platformer Client Library
//!
//! Headless client for the multiplayer platformer. It keeps a replica of the
//! server's world, simulates the player's own character locally and reports
//! it back whenever it changes.
//!
//! ## Core Components
//!
//! ### Game State (`game`)
//! The replica world. Batches from the server insert, overwrite or remove
//! objects by GUID; the local character is never overwritten by the server.
//!
//! ### Input Handling (`input`)
//! Key events become character intents: direction and jump. A jump only
//! starts again after the jump key was released. The autopilot produces
//! random key events for unattended clients.
//!
//! ### Network Layer (`network`)
//! Connects, performs the two-message handshake, applies incoming batches on
//! a background task and sends a `CharacterUpdate` after each frame in which
//! the character changed.
//!
//! ## Frame Loop
//!
//! 1. Apply pending key events to the character
//! 2. Advance the jump, add the carry of the platform touched last frame
//! 3. Move along Y, then X, resolving collisions
//! 4. Send the character if it differs from the last one sent

pub mod game;
pub mod input;
pub mod network;
