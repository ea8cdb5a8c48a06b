use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    CHARACTER_RADIUS, CHARACTER_SIZE, CHARACTER_SPEED, JUMP_TICKS, PLATFORM_RADIUS,
    SCOREBOARD_HEIGHT,
};

/// Identifier of an object inside a world. Zero means "not yet assigned".
pub type Guid = u32;

/// Movement axis used by the per-axis collision pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

/// How a moving object reacts when its own movement makes it collide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// Never reacts (static geometry, zones, markers)
    Inert,
    /// Backs out and reverses when blocked on `axis`. Platforms that carry
    /// riders keep pushing through a rider unless the rider would be crushed.
    Patrol { axis: Axis, carries_riders: bool },
    /// Player-controlled character handling
    Character,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Character,
    StaticPlatform,
    HorizontalPlatform,
    VerticalPlatform,
    Boundary,
    DeathZone,
    WinZone,
    Scoreboard,
    SpawnPoint,
}

impl ObjectKind {
    pub fn is_collidable(self) -> bool {
        !matches!(self, ObjectKind::SpawnPoint)
    }

    pub fn is_moveable(self) -> bool {
        matches!(
            self,
            ObjectKind::Character
                | ObjectKind::StaticPlatform
                | ObjectKind::HorizontalPlatform
                | ObjectKind::VerticalPlatform
        )
    }

    pub fn is_renderable(self) -> bool {
        matches!(
            self,
            ObjectKind::Character
                | ObjectKind::StaticPlatform
                | ObjectKind::HorizontalPlatform
                | ObjectKind::VerticalPlatform
                | ObjectKind::Scoreboard
        )
    }

    pub fn is_platform(self) -> bool {
        matches!(
            self,
            ObjectKind::StaticPlatform
                | ObjectKind::HorizontalPlatform
                | ObjectKind::VerticalPlatform
        )
    }

    pub fn reaction(self) -> Reaction {
        match self {
            ObjectKind::HorizontalPlatform => Reaction::Patrol {
                axis: Axis::X,
                carries_riders: false,
            },
            ObjectKind::VerticalPlatform => Reaction::Patrol {
                axis: Axis::Y,
                carries_riders: true,
            },
            ObjectKind::Character => Reaction::Character,
            _ => Reaction::Inert,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ObjectKind::Character => "character",
            ObjectKind::StaticPlatform => "static platform",
            ObjectKind::HorizontalPlatform => "horizontal platform",
            ObjectKind::VerticalPlatform => "vertical platform",
            ObjectKind::Boundary => "boundary",
            ObjectKind::DeathZone => "death zone",
            ObjectKind::WinZone => "win zone",
            ObjectKind::Scoreboard => "scoreboard",
            ObjectKind::SpawnPoint => "spawn point",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Base tint for randomly shaded colors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hue {
    Red,
    Yellow,
    Green,
    Blue,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Picks a random shade of `hue`
    pub fn shade<R: Rng + ?Sized>(hue: Hue, rng: &mut R) -> Self {
        let strong = rng.gen_range(160..=255);
        let weak = rng.gen_range(0..=80);
        match hue {
            Hue::Red => Color::rgb(strong, weak, weak),
            Hue::Yellow => Color::rgb(strong, strong, weak),
            Hue::Green => Color::rgb(weak, strong, weak),
            Hue::Blue => Color::rgb(weak, weak, strong),
        }
    }
}

/// Axis-aligned rectangle in integer window coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Strict overlap test: touching edges do not count and empty rectangles
    /// never overlap anything.
    pub fn overlaps(&self, other: &Bounds) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.x < other.x.saturating_add(other.width)
            && other.x < self.x.saturating_add(self.width)
            && self.y < other.y.saturating_add(other.height)
            && other.y < self.y.saturating_add(self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Idle,
    Right,
}

impl Direction {
    pub fn sign(self) -> i32 {
        match self {
            Direction::Left => -1,
            Direction::Idle => 0,
            Direction::Right => 1,
        }
    }
}

/// Player-specific state carried by character objects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterState {
    pub player_id: u32,
    pub jumping: bool,
    /// Cleared when a jump starts, set again once the jump key is released
    pub jump_allowed: bool,
    pub jump_counter: u32,
    pub direction: Direction,
    pub score: i32,
    /// Self-propelled velocity before any platform carry is added
    pub base_vel_x: i32,
    pub base_vel_y: i32,
    /// Object hit during the previous frame, used for platform carry
    pub last_collided: Option<Guid>,
}

impl CharacterState {
    pub fn new(player_id: u32) -> Self {
        Self {
            player_id,
            jumping: false,
            jump_allowed: true,
            jump_counter: 0,
            direction: Direction::Idle,
            score: 0,
            base_vel_x: 0,
            base_vel_y: CHARACTER_SPEED,
            last_collided: None,
        }
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
        self.base_vel_x = direction.sign() * CHARACTER_SPEED;
    }

    /// Starts a jump if one is allowed. Returns whether the jump started.
    pub fn start_jump(&mut self) -> bool {
        if self.jumping || !self.jump_allowed {
            return false;
        }
        self.jumping = true;
        self.jump_allowed = false;
        self.jump_counter = 0;
        true
    }

    pub fn release_jump(&mut self) {
        self.jump_allowed = true;
    }

    pub fn stop_jump(&mut self) {
        self.jumping = false;
        self.jump_counter = 0;
    }

    /// Advances the jump by one frame: rise for `JUMP_TICKS` frames, then
    /// fall under gravity.
    pub fn advance_jump(&mut self) {
        if self.jumping && self.jump_counter < JUMP_TICKS {
            self.base_vel_y = -CHARACTER_SPEED;
            self.jump_counter += 1;
        } else {
            self.stop_jump();
            self.base_vel_y = CHARACTER_SPEED;
        }
    }
}

/// A single entity in the world.
///
/// Geometry and velocity are private so every write goes through the clamping
/// setters: positions stay inside `[0, window - extent]` and each velocity
/// component stays strictly smaller than the extent on the same axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameObject {
    pub guid: Guid,
    pub kind: ObjectKind,
    removed: bool,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    radius: i32,
    pub color: Color,
    vel_x: i32,
    vel_y: i32,
    pub character: Option<CharacterState>,
}

impl GameObject {
    /// Creates an object with no GUID. Clamping against the window happens
    /// when the object is added to a world.
    pub fn new(kind: ObjectKind, x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            guid: 0,
            kind,
            removed: false,
            x,
            y,
            width: width.max(0),
            height: height.max(0),
            radius: 0,
            color: Color::BLACK,
            vel_x: 0,
            vel_y: 0,
            character: None,
        }
    }

    pub fn character(player_id: u32, color: Color) -> Self {
        let mut object = Self::new(ObjectKind::Character, 0, 0, CHARACTER_SIZE, CHARACTER_SIZE)
            .with_radius(CHARACTER_RADIUS)
            .with_color(color);
        object.set_vel_y(CHARACTER_SPEED);
        object.character = Some(CharacterState::new(player_id));
        object
    }

    pub fn platform(kind: ObjectKind, x: i32, y: i32, width: i32, height: i32, color: Color) -> Self {
        Self::new(kind, x, y, width, height)
            .with_radius(PLATFORM_RADIUS)
            .with_color(color)
    }

    pub fn spawn_point(x: i32, y: i32) -> Self {
        Self::new(ObjectKind::SpawnPoint, x, y, 0, 0)
    }

    pub fn boundary(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(ObjectKind::Boundary, x, y, width, height)
    }

    pub fn death_zone(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(ObjectKind::DeathZone, x, y, width, height)
    }

    pub fn win_zone(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(ObjectKind::WinZone, x, y, width, height)
    }

    pub fn scoreboard(window_size: i32) -> Self {
        Self::new(ObjectKind::Scoreboard, 0, 0, window_size, SCOREBOARD_HEIGHT)
            .with_color(Color::WHITE)
    }

    pub fn with_velocity(mut self, vel_x: i32, vel_y: i32) -> Self {
        self.set_vel_x(vel_x);
        self.set_vel_y(vel_y);
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_radius(mut self, radius: i32) -> Self {
        self.radius = radius.max(0);
        self
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn radius(&self) -> i32 {
        self.radius
    }

    pub fn vel_x(&self) -> i32 {
        self.vel_x
    }

    pub fn vel_y(&self) -> i32 {
        self.vel_y
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.x, self.y, self.width, self.height)
    }

    pub fn overlaps(&self, other: &GameObject) -> bool {
        self.bounds().overlaps(&other.bounds())
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// One-way transition; the store refuses to hand out a way back.
    pub(crate) fn mark_removed(&mut self) {
        self.removed = true;
    }

    pub fn set_x(&mut self, x: i32, window_size: i32) {
        self.x = x.clamp(0, (window_size - self.width).max(0));
    }

    pub fn set_y(&mut self, y: i32, window_size: i32) {
        self.y = y.clamp(0, (window_size - self.height).max(0));
    }

    pub fn move_to(&mut self, x: i32, y: i32, window_size: i32) {
        self.set_x(x, window_size);
        self.set_y(y, window_size);
    }

    pub fn set_vel_x(&mut self, vel_x: i32) {
        self.vel_x = clamp_velocity(vel_x, self.width);
    }

    pub fn set_vel_y(&mut self, vel_y: i32) {
        self.vel_y = clamp_velocity(vel_y, self.height);
    }

    pub fn reverse_course(&mut self) {
        self.vel_x = -self.vel_x;
        self.vel_y = -self.vel_y;
    }

    pub fn stop_moving(&mut self) {
        self.vel_x = 0;
        self.vel_y = 0;
    }

    /// Copies extents and radius from `other`. Call `normalize` afterwards.
    pub fn copy_shape_from(&mut self, other: &GameObject) {
        self.width = other.width;
        self.height = other.height;
        self.radius = other.radius;
    }

    /// Re-applies every clamp, e.g. after the object arrived over the wire.
    pub fn normalize(&mut self, window_size: i32) {
        self.width = self.width.max(0);
        self.height = self.height.max(0);
        self.radius = self.radius.max(0);
        self.move_to(self.x, self.y, window_size);
        self.set_vel_x(self.vel_x);
        self.set_vel_y(self.vel_y);
    }

    pub fn player_id(&self) -> Option<u32> {
        self.character.as_ref().map(|c| c.player_id)
    }

    pub fn score(&self) -> Option<i32> {
        self.character.as_ref().map(|c| c.score)
    }
}

fn clamp_velocity(velocity: i32, extent: i32) -> i32 {
    if extent <= 1 {
        0
    } else if velocity >= extent {
        extent - 1
    } else if velocity <= -extent {
        -extent + 1
    } else {
        velocity
    }
}

/// Draw data for one renderable object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderItem {
    pub guid: Guid,
    pub kind: ObjectKind,
    pub bounds: Bounds,
    pub radius: i32,
    pub color: Color,
    /// Text drawn inside the object (scoreboard only)
    pub label: Option<String>,
}
