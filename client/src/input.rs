//! Client input management: key events to character intents

use rand::Rng;
use shared::{CharacterState, Direction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Left,
    Right,
    Jump,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Pressed(Key),
    Released(Key),
}

/// Tracks held movement keys and turns key events into character intents
#[derive(Debug, Default)]
pub struct InputManager {
    left_held: bool,
    right_held: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one key event to the character's player state
    pub fn apply(&mut self, event: KeyEvent, state: &mut CharacterState) {
        match event {
            KeyEvent::Pressed(Key::Left) => {
                self.left_held = true;
                state.set_direction(Direction::Left);
            }
            KeyEvent::Pressed(Key::Right) => {
                self.right_held = true;
                state.set_direction(Direction::Right);
            }
            KeyEvent::Released(Key::Left) => {
                self.left_held = false;
                state.set_direction(self.held_direction());
            }
            KeyEvent::Released(Key::Right) => {
                self.right_held = false;
                state.set_direction(self.held_direction());
            }
            KeyEvent::Pressed(Key::Jump) => {
                state.start_jump();
            }
            KeyEvent::Released(Key::Jump) => state.release_jump(),
        }
    }

    // Releasing one key falls back to the other if it is still down
    fn held_direction(&self) -> Direction {
        match (self.left_held, self.right_held) {
            (true, false) => Direction::Left,
            (false, true) => Direction::Right,
            _ => Direction::Idle,
        }
    }
}

/// Random key presser for running clients without a keyboard
pub struct Autopilot<R: Rng> {
    rng: R,
    jump_down: bool,
}

impl<R: Rng> Autopilot<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            jump_down: false,
        }
    }

    /// Events for the next frame; usually none
    pub fn next_events(&mut self) -> Vec<KeyEvent> {
        let mut events = Vec::new();

        if self.jump_down {
            self.jump_down = false;
            events.push(KeyEvent::Released(Key::Jump));
        }

        match self.rng.gen_range(0..40) {
            0 => events.push(KeyEvent::Pressed(Key::Left)),
            1 => events.push(KeyEvent::Pressed(Key::Right)),
            2 => {
                events.push(KeyEvent::Released(Key::Left));
                events.push(KeyEvent::Released(Key::Right));
            }
            3 => {
                self.jump_down = true;
                events.push(KeyEvent::Pressed(Key::Jump));
            }
            _ => {}
        }
        events
    }
}
