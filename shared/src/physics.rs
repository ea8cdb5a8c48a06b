//! Per-axis movement and collision handling.
//!
//! Every moving object advances along Y first and then along X. After each
//! axis step the store is queried for overlaps and the object's
//! [`Reaction`] decides what happens.

use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::object::{Axis, Bounds, GameObject, Guid, ObjectKind, Reaction};
use crate::world::WorldState;
use crate::{MAX_BACKOUT_ATTEMPTS, MAX_SPAWN_ATTEMPTS};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpawnError {
    #[error("world has no spawn points")]
    NoSpawnPoints,
    #[error("no collision-free position found near any spawn point")]
    NoFreeSpawnPoint,
}

/// Moves the stored object `guid` by its velocity and resolves collisions.
///
/// Returns the updated object, or None when the GUID is unknown or removed.
pub fn update_location<R: Rng + ?Sized>(
    world: &mut WorldState,
    guid: Guid,
    rng: &mut R,
) -> Option<GameObject> {
    let mut mover = world.get(guid).filter(|o| !o.is_removed())?.clone();
    let window = world.window_size();

    mover.set_y(mover.y() + mover.vel_y(), window);
    resolve_axis(world, &mut mover, Axis::Y, rng);

    mover.set_x(mover.x() + mover.vel_x(), window);
    resolve_axis(world, &mut mover, Axis::X, rng);

    world.replace(guid, mover.clone());
    Some(mover)
}

fn resolve_axis<R: Rng + ?Sized>(
    world: &WorldState,
    mover: &mut GameObject,
    axis: Axis,
    rng: &mut R,
) {
    let hits = colliders(world, mover);
    if !hits.is_empty() {
        handle_collision(world, mover, &hits, axis, rng);
    }
}

fn colliders(world: &WorldState, mover: &GameObject) -> Vec<GameObject> {
    world
        .overlapping(mover.bounds(), &[mover.guid])
        .cloned()
        .collect()
}

fn collides(world: &WorldState, mover: &GameObject) -> bool {
    world.is_space_occupied(mover.bounds(), &[mover.guid])
}

/// Applies the mover's reaction to a non-empty set of colliding objects.
pub fn handle_collision<R: Rng + ?Sized>(
    world: &WorldState,
    mover: &mut GameObject,
    hits: &[GameObject],
    axis: Axis,
    rng: &mut R,
) {
    match mover.kind.reaction() {
        Reaction::Inert => {}
        Reaction::Patrol {
            axis: patrol_axis,
            carries_riders,
        } => {
            if axis != patrol_axis {
                return;
            }
            if carries_riders && !rider_blocks(world, mover, hits) {
                return;
            }
            back_out(world, mover, axis);
            mover.reverse_course();
        }
        Reaction::Character => character_collision(world, mover, hits, axis, rng),
    }
}

/// Decides whether a rider-carrying platform has to back off.
///
/// The platform keeps pushing only while it moves up through a character and
/// the space the character would be pushed into is free.
fn rider_blocks(world: &WorldState, platform: &GameObject, hits: &[GameObject]) -> bool {
    let rider = match hits.iter().find(|o| o.kind == ObjectKind::Character) {
        Some(rider) => rider,
        None => return true,
    };
    if platform.vel_y() >= 0 {
        return true;
    }

    let top = platform
        .y()
        .saturating_add(platform.vel_y())
        .saturating_sub(rider.height());
    let bottom = platform
        .y()
        .saturating_add(platform.height())
        .saturating_add(platform.vel_y());
    let ahead = Bounds::new(platform.x(), top, platform.width(), bottom.saturating_sub(top));
    world.is_space_occupied(ahead, &[platform.guid, rider.guid])
}

/// Steps the mover back one unit at a time, against its velocity on `axis`,
/// until it no longer overlaps anything or the attempt budget runs out.
pub fn back_out(world: &WorldState, mover: &mut GameObject, axis: Axis) {
    let window = world.window_size();
    let step = match axis {
        Axis::X => -mover.vel_x().signum(),
        Axis::Y => -mover.vel_y().signum(),
    };
    if step == 0 {
        return;
    }

    for _ in 0..MAX_BACKOUT_ATTEMPTS {
        if !collides(world, mover) {
            return;
        }
        match axis {
            Axis::X => mover.set_x(mover.x() + step, window),
            Axis::Y => mover.set_y(mover.y() + step, window),
        }
    }
    debug!("Object {} still overlapping after back-out", mover.guid);
}

fn collision_priority(kind: ObjectKind) -> u8 {
    match kind {
        ObjectKind::StaticPlatform
        | ObjectKind::HorizontalPlatform
        | ObjectKind::VerticalPlatform => 0,
        ObjectKind::DeathZone => 1,
        ObjectKind::WinZone => 2,
        ObjectKind::Character => 3,
        ObjectKind::Boundary => 4,
        _ => 5,
    }
}

fn character_collision<R: Rng + ?Sized>(
    world: &WorldState,
    mover: &mut GameObject,
    hits: &[GameObject],
    axis: Axis,
    rng: &mut R,
) {
    // min_by_key keeps the first of equally ranked hits
    let important = match hits.iter().min_by_key(|o| collision_priority(o.kind)) {
        Some(hit) => hit,
        None => return,
    };

    match important.kind {
        ObjectKind::DeathZone | ObjectKind::WinZone => {
            let delta = if important.kind == ObjectKind::WinZone { 1 } else { -1 };
            if let Some(state) = mover.character.as_mut() {
                state.score += delta;
            }
            if let Err(e) = place_at_spawn_point(world, mover, rng) {
                warn!("Could not respawn character {}: {}", mover.guid, e);
            }
        }
        _ => {
            back_out(world, mover, axis);
            if let Some(state) = mover.character.as_mut() {
                state.stop_jump();
                state.last_collided = Some(important.guid);
            }
        }
    }
}

/// Moves a character to a collision-free spot next to a random spawn point.
///
/// Each spawn point is tried in random order. Around a point the position is
/// jittered up to `MAX_SPAWN_ATTEMPTS` times. On failure the character stays
/// at the last candidate position.
pub fn place_at_spawn_point<R: Rng + ?Sized>(
    world: &WorldState,
    mover: &mut GameObject,
    rng: &mut R,
) -> Result<(), SpawnError> {
    let window = world.window_size();
    if let Some(state) = mover.character.as_mut() {
        state.stop_jump();
        state.last_collided = None;
    }
    mover.stop_moving();

    let mut points: Vec<(i32, i32)> = world
        .filter_by_kind(ObjectKind::SpawnPoint)
        .map(|p| (p.x(), p.y()))
        .collect();
    if points.is_empty() {
        return Err(SpawnError::NoSpawnPoints);
    }
    points.shuffle(rng);

    for (x, y) in points {
        mover.move_to(x, y, window);
        for _ in 0..MAX_SPAWN_ATTEMPTS {
            if !collides(world, mover) {
                return Ok(());
            }
            let dx = rng.gen_range(-3..=5);
            let dy = rng.gen_range(-3..=5);
            mover.move_to(mover.x() + dx, mover.y() - dy, window);
        }
        if !collides(world, mover) {
            return Ok(());
        }
    }
    Err(SpawnError::NoFreeSpawnPoint)
}

/// Advances every moveable object that patrols (the moving platforms) by
/// one tick, in GUID order.
///
/// Returns the platforms whose state changed.
pub fn advance_platforms<R: Rng + ?Sized>(world: &mut WorldState, rng: &mut R) -> Vec<GameObject> {
    let guids: Vec<Guid> = world
        .iter()
        .filter(|o| o.kind.is_moveable() && matches!(o.kind.reaction(), Reaction::Patrol { .. }))
        .map(|o| o.guid)
        .collect();

    let mut changed = Vec::new();
    for guid in guids {
        let before = world.get(guid).cloned();
        if let Some(after) = update_location(world, guid, rng) {
            if before.as_ref() != Some(&after) {
                changed.push(after);
            }
        }
    }
    changed
}

/// Runs one frame of a locally simulated character: jump status, platform
/// carry from the previous frame, then movement.
pub fn step_character<R: Rng + ?Sized>(
    world: &mut WorldState,
    guid: Guid,
    rng: &mut R,
) -> Option<GameObject> {
    let mut character = world.get(guid).filter(|o| !o.is_removed())?.clone();
    let state = character.character.as_mut()?;

    state.advance_jump();

    let mut vel_x = state.base_vel_x;
    let mut vel_y = state.base_vel_y;
    if let Some(last) = state.last_collided.take() {
        if let Some(platform) = world.get(last).filter(|o| o.kind.is_platform()) {
            vel_x += platform.vel_x();
            vel_y += platform.vel_y();
        }
    }
    character.set_vel_x(vel_x);
    character.set_vel_y(vel_y);

    world.replace(guid, character);
    update_location(world, guid, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Color;
    use crate::{CHARACTER_SPEED, WINDOW_SIZE};
    use rand::{rngs::StdRng, SeedableRng};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn static_platform(x: i32, y: i32, w: i32, h: i32) -> GameObject {
        GameObject::platform(ObjectKind::StaticPlatform, x, y, w, h, Color::BLACK)
    }

    fn arena() -> WorldState {
        let mut world = WorldState::new(WINDOW_SIZE);
        world.add(GameObject::boundary(0, 0, 500, 1)).unwrap();
        world.add(GameObject::boundary(499, 0, 1, 500)).unwrap();
        world.add(GameObject::boundary(0, 499, 500, 1)).unwrap();
        world.add(GameObject::boundary(0, 0, 1, 500)).unwrap();
        world
    }

    #[test]
    fn test_moves_y_before_x() {
        let mut world = arena();
        // Block sits right of the mover on its current rows only
        world.add(static_platform(110, 100, 10, 5)).unwrap();
        let mut mover = GameObject::character(1, Color::BLACK);
        mover.move_to(100, 100, WINDOW_SIZE);
        let mover = world.add(mover.with_velocity(5, 5)).unwrap();

        let moved = update_location(&mut world, mover.guid, &mut rng()).unwrap();
        assert_eq!((moved.x(), moved.y()), (105, 105));
        assert_eq!(moved.character.unwrap().last_collided, None);
    }

    #[test]
    fn test_horizontal_platform_reverses_at_wall() {
        let mut world = arena();
        let platform = world
            .add(
                GameObject::platform(ObjectKind::HorizontalPlatform, 480, 100, 15, 5, Color::BLACK)
                    .with_velocity(3, 0),
            )
            .unwrap();

        let first = update_location(&mut world, platform.guid, &mut rng()).unwrap();
        assert_eq!(first.x(), 483);
        assert_eq!(first.vel_x(), 3);

        let second = update_location(&mut world, platform.guid, &mut rng()).unwrap();
        assert_eq!(second.x(), 484);
        assert_eq!(second.vel_x(), -3);
        assert!(!world.is_space_occupied(second.bounds(), &[second.guid]));
    }

    #[test]
    fn test_vertical_platform_reverses_without_rider() {
        let mut world = arena();
        world.add(static_platform(100, 280, 40, 10)).unwrap();
        let platform = world
            .add(
                GameObject::platform(ObjectKind::VerticalPlatform, 100, 292, 40, 10, Color::BLACK)
                    .with_velocity(0, -3),
            )
            .unwrap();

        let moved = update_location(&mut world, platform.guid, &mut rng()).unwrap();
        assert_eq!(moved.y(), 290);
        assert_eq!(moved.vel_y(), 3);
    }

    #[test]
    fn test_vertical_platform_carries_rider_through_free_space() {
        let mut world = arena();
        let platform = world
            .add(
                GameObject::platform(ObjectKind::VerticalPlatform, 100, 300, 40, 10, Color::BLACK)
                    .with_velocity(0, -3),
            )
            .unwrap();
        let mut rider = GameObject::character(1, Color::BLACK);
        rider.move_to(110, 290, WINDOW_SIZE);
        world.add(rider).unwrap();

        let moved = update_location(&mut world, platform.guid, &mut rng()).unwrap();
        assert_eq!(moved.y(), 297);
        assert_eq!(moved.vel_y(), -3);
    }

    #[test]
    fn test_vertical_platform_refuses_to_crush_rider() {
        let mut world = arena();
        let platform = world
            .add(
                GameObject::platform(ObjectKind::VerticalPlatform, 100, 300, 40, 10, Color::BLACK)
                    .with_velocity(0, -3),
            )
            .unwrap();
        let mut rider = GameObject::character(1, Color::BLACK);
        rider.move_to(110, 290, WINDOW_SIZE);
        world.add(rider).unwrap();
        // Ceiling just above the rider's head
        world.add(static_platform(100, 279, 40, 6)).unwrap();

        let moved = update_location(&mut world, platform.guid, &mut rng()).unwrap();
        assert_eq!(moved.y(), 300);
        assert_eq!(moved.vel_y(), 3);
    }

    #[test]
    fn test_crush_check_handles_huge_rider() {
        let mut world = arena();
        let platform = world
            .add(
                GameObject::platform(ObjectKind::VerticalPlatform, 100, 300, 40, 10, Color::BLACK)
                    .with_velocity(0, -3),
            )
            .unwrap();
        let mut giant = GameObject::new(ObjectKind::Character, 110, 0, 10, i32::MAX);
        giant.guid = 999;

        // The look-ahead reaches the top boundary
        assert!(rider_blocks(&world, &platform, &[giant]));
    }

    #[test]
    fn test_descending_platform_backs_off_rider_below() {
        let mut world = arena();
        let platform = world
            .add(
                GameObject::platform(ObjectKind::VerticalPlatform, 100, 278, 40, 10, Color::BLACK)
                    .with_velocity(0, 3),
            )
            .unwrap();
        let mut below = GameObject::character(1, Color::BLACK);
        below.move_to(110, 290, WINDOW_SIZE);
        world.add(below).unwrap();

        let moved = update_location(&mut world, platform.guid, &mut rng()).unwrap();
        assert_eq!(moved.y(), 280);
        assert_eq!(moved.vel_y(), -3);
    }

    #[test]
    fn test_back_out_is_bounded() {
        let mut world = arena();
        world.add(static_platform(0, 0, 500, 500)).unwrap();
        let mut stuck = GameObject::character(1, Color::BLACK);
        stuck.move_to(200, 200, WINDOW_SIZE);
        stuck.set_vel_y(5);

        back_out(&world, &mut stuck, Axis::Y);
        assert_eq!(stuck.y(), 200 - MAX_BACKOUT_ATTEMPTS as i32);
    }

    #[test]
    fn test_character_lands_on_platform() {
        let mut world = arena();
        let floor = world.add(static_platform(100, 400, 50, 10)).unwrap();
        let mut character = GameObject::character(1, Color::BLACK);
        character.move_to(110, 388, WINDOW_SIZE);
        let character = world.add(character).unwrap();

        let landed = step_character(&mut world, character.guid, &mut rng()).unwrap();
        assert_eq!(landed.y(), 390);
        let state = landed.character.unwrap();
        assert_eq!(state.last_collided, Some(floor.guid));
        assert!(!state.jumping);
    }

    #[test]
    fn test_character_rides_rising_platform() {
        let mut world = arena();
        let platform = world
            .add(
                GameObject::platform(ObjectKind::VerticalPlatform, 100, 300, 40, 10, Color::BLACK)
                    .with_velocity(0, -3),
            )
            .unwrap();
        let mut character = GameObject::character(1, Color::BLACK);
        character.move_to(110, 290, WINDOW_SIZE);
        let character = world.add(character).unwrap();
        let mut rng = rng();

        for _ in 0..5 {
            advance_platforms(&mut world, &mut rng);
            step_character(&mut world, character.guid, &mut rng);
        }

        let platform = world.get(platform.guid).unwrap();
        let rider = world.get(character.guid).unwrap();
        assert_eq!(platform.y(), 285);
        assert_eq!(rider.y() + rider.height(), platform.y());
    }

    #[test]
    fn test_death_zone_costs_a_point_and_respawns() {
        let mut world = arena();
        world.add(static_platform(100, 400, 50, 10)).unwrap();
        world.add(GameObject::spawn_point(100, 389)).unwrap();
        world.add(GameObject::death_zone(0, 499, 500, 1)).unwrap();
        let mut character = GameObject::character(1, Color::BLACK);
        character.move_to(200, 487, WINDOW_SIZE);
        let character = world.add(character).unwrap();

        let respawned = step_character(&mut world, character.guid, &mut rng()).unwrap();
        assert_eq!((respawned.x(), respawned.y()), (100, 389));
        assert_eq!(respawned.score(), Some(-1));
    }

    #[test]
    fn test_win_zone_awards_a_point() {
        let mut world = arena();
        world.add(GameObject::spawn_point(100, 389)).unwrap();
        world.add(GameObject::win_zone(0, 20, 500, 1)).unwrap();
        let mut character = GameObject::character(1, Color::BLACK);
        character.move_to(200, 25, WINDOW_SIZE);
        if let Some(state) = character.character.as_mut() {
            state.start_jump();
        }
        let character = world.add(character).unwrap();

        let respawned = step_character(&mut world, character.guid, &mut rng()).unwrap();
        assert_eq!(respawned.score(), Some(1));
        assert_eq!((respawned.x(), respawned.y()), (100, 389));
        assert!(!respawned.character.unwrap().jumping);
    }

    #[test]
    fn test_platform_outranks_boundary() {
        let mut world = arena();
        let ledge = world.add(static_platform(100, 495, 50, 4)).unwrap();
        let mut character = GameObject::character(1, Color::BLACK);
        character.move_to(110, 486, WINDOW_SIZE);
        let character = world.add(character).unwrap();

        let landed = step_character(&mut world, character.guid, &mut rng()).unwrap();
        assert_eq!(landed.y(), 485);
        assert_eq!(landed.character.unwrap().last_collided, Some(ledge.guid));
    }

    #[test]
    fn test_spawn_jitters_around_occupied_point() {
        let mut world = arena();
        world.add(GameObject::spawn_point(100, 389)).unwrap();
        let mut squatter = GameObject::character(1, Color::BLACK);
        squatter.move_to(100, 389, WINDOW_SIZE);
        world.add(squatter).unwrap();

        let mut newcomer = GameObject::character(2, Color::BLACK);
        place_at_spawn_point(&world, &mut newcomer, &mut rng()).unwrap();
        assert!(!world.is_space_occupied(newcomer.bounds(), &[newcomer.guid]));
        assert_eq!(newcomer.vel_y(), 0);
    }

    #[test]
    fn test_spawn_without_points_fails() {
        let world = arena();
        let mut character = GameObject::character(1, Color::BLACK);
        assert_eq!(
            place_at_spawn_point(&world, &mut character, &mut rng()),
            Err(SpawnError::NoSpawnPoints)
        );
    }

    #[test]
    fn test_spawn_gives_up_when_everything_is_blocked() {
        let mut world = WorldState::new(WINDOW_SIZE);
        world.add(static_platform(0, 0, 500, 500)).unwrap();
        world.add(GameObject::spawn_point(100, 389)).unwrap();

        let mut character = GameObject::character(1, Color::BLACK);
        assert_eq!(
            place_at_spawn_point(&world, &mut character, &mut rng()),
            Err(SpawnError::NoFreeSpawnPoint)
        );
    }

    #[test]
    fn test_advance_platforms_reports_changes_only() {
        let mut world = arena();
        world.add(static_platform(100, 100, 40, 10)).unwrap();
        let mover = world
            .add(
                GameObject::platform(ObjectKind::HorizontalPlatform, 200, 200, 20, 5, Color::BLACK)
                    .with_velocity(2, 0),
            )
            .unwrap();

        let changed = advance_platforms(&mut world, &mut rng());
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].guid, mover.guid);
        assert_eq!(changed[0].x(), 202);
    }

    #[test]
    fn test_static_platform_never_patrols() {
        let mut world = arena();
        let slab = world
            .add(static_platform(100, 100, 40, 10).with_velocity(3, 3))
            .unwrap();

        assert!(advance_platforms(&mut world, &mut rng()).is_empty());
        let slab = world.get(slab.guid).unwrap();
        assert_eq!((slab.x(), slab.y()), (100, 100));
    }

    #[test]
    fn test_gravity_applies_without_input() {
        let mut world = arena();
        let mut character = GameObject::character(1, Color::BLACK);
        character.move_to(200, 100, WINDOW_SIZE);
        let character = world.add(character).unwrap();

        let fallen = step_character(&mut world, character.guid, &mut rng()).unwrap();
        assert_eq!(fallen.y(), 100 + CHARACTER_SPEED);
    }
}
