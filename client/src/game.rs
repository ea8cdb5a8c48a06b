use log::debug;
use rand::Rng;
use shared::physics::step_character;
use shared::{CharacterState, GameObject, Guid, RenderItem, WorldState};

/// Local replica of the server's world plus the player's own character.
///
/// The character is simulated here every frame; everything else is applied
/// as the server sends it.
pub struct ClientGameState {
    world: WorldState,
    my_guid: Guid,
    last_sent: Option<GameObject>,
}

impl ClientGameState {
    /// Builds the replica from the two handshake messages
    pub fn from_handshake(
        character: GameObject,
        snapshot: Vec<GameObject>,
        window_size: i32,
    ) -> Self {
        let my_guid = character.guid;
        let mut world = WorldState::new(window_size);
        for object in snapshot.into_iter().filter(|o| !o.is_removed()) {
            world.upsert(object);
        }
        world.upsert(character);

        Self {
            world,
            my_guid,
            last_sent: None,
        }
    }

    pub fn my_guid(&self) -> Guid {
        self.my_guid
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn my_character(&self) -> Option<&GameObject> {
        self.world.get(self.my_guid)
    }

    /// Applies a batch from the server. Returns how many objects changed.
    ///
    /// Updates about the local character are ignored because the client is
    /// authoritative for it.
    pub fn apply_updates(&mut self, batch: Vec<GameObject>) -> usize {
        let mut applied = 0;
        for object in batch {
            if object.guid == self.my_guid {
                debug!("Ignoring server copy of own character");
                continue;
            }
            if object.is_removed() {
                if self.world.remove(object.guid).is_some() {
                    applied += 1;
                }
                continue;
            }
            self.world.upsert(object);
            applied += 1;
        }
        applied
    }

    /// Mutates the local character's player state, e.g. from input
    pub fn with_character_state<F>(&mut self, f: F)
    where
        F: FnOnce(&mut CharacterState),
    {
        if let Some(mut character) = self.my_character().cloned() {
            if let Some(state) = character.character.as_mut() {
                f(state);
                self.world.replace(self.my_guid, character);
            }
        }
    }

    /// Runs one frame of local simulation.
    ///
    /// Returns the character when it differs from what was last reported to
    /// the server.
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<GameObject> {
        let character = step_character(&mut self.world, self.my_guid, rng)?;
        if self.last_sent.as_ref() == Some(&character) {
            return None;
        }
        self.last_sent = Some(character.clone());
        Some(character)
    }

    pub fn render_snapshot(&self) -> Vec<RenderItem> {
        self.world.render_snapshot()
    }

    pub fn scoreboard(&self) -> String {
        self.world.scoreboard_label()
    }
}
