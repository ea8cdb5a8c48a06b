pub mod object;
pub mod physics;
pub mod protocol;
pub mod world;

pub use object::{
    Axis, Bounds, CharacterState, Color, Direction, GameObject, Guid, Hue, ObjectKind, Reaction,
    RenderItem,
};
pub use physics::SpawnError;
pub use protocol::{read_packet, write_packet, Packet, ProtocolError};
pub use world::{World, WorldError, WorldState};

pub const WINDOW_SIZE: i32 = 500;

pub const CHARACTER_SIZE: i32 = 10;
pub const CHARACTER_RADIUS: i32 = 5;
pub const CHARACTER_SPEED: i32 = 5;
pub const JUMP_TICKS: u32 = 20;

pub const PLATFORM_RADIUS: i32 = 2;
pub const PLATFORM_MIN_SPEED: i32 = 1;
pub const PLATFORM_MAX_SPEED: i32 = 3;

pub const BOUNDARY_THICKNESS: i32 = 1;
pub const ZONE_THICKNESS: i32 = 1;
pub const SCOREBOARD_HEIGHT: i32 = 20;

pub const MAX_BACKOUT_ATTEMPTS: u32 = 100;
pub const MAX_SPAWN_ATTEMPTS: u32 = 100;
