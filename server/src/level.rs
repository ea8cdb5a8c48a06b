//! Level generation: window frame, scoreboard, random platforms, spawn points
//! and the two scoring zones.

use log::debug;
use rand::Rng;
use shared::{
    Color, GameObject, Hue, ObjectKind, WorldError, WorldState, BOUNDARY_THICKNESS,
    CHARACTER_SIZE, PLATFORM_MAX_SPEED, PLATFORM_MIN_SPEED, SCOREBOARD_HEIGHT, ZONE_THICKNESS,
};
use thiserror::Error;

use crate::config::LevelConfig;

const MAX_PLACEMENT_ATTEMPTS: u32 = 1000;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("no free space for a {kind} after {attempts} attempts")]
    NoRoom {
        kind: &'static str,
        attempts: u32,
    },
    #[error("window of {0} px is too small for a level")]
    WindowTooSmall(i32),
    #[error("{0} platforms do not fit in one level")]
    TooManyPlatforms(usize),
    #[error(transparent)]
    World(#[from] WorldError),
}

pub fn generate_level<R: Rng + ?Sized>(
    config: &LevelConfig,
    rng: &mut R,
) -> Result<WorldState, LevelError> {
    let window = config.window_size;
    if window <= min_platform_y() {
        return Err(LevelError::WindowTooSmall(window));
    }

    let mut world = WorldState::new(window);
    world.add(GameObject::scoreboard(window))?;
    add_boundaries(&mut world)?;
    add_platforms(&mut world, config, rng)?;
    add_spawn_points(&mut world)?;
    add_zones(&mut world)?;

    debug!(
        "Generated level with {} objects ({} static, {} moving platforms)",
        world.len(),
        config.static_platforms,
        config.moving_platforms
    );
    Ok(world)
}

fn add_boundaries(world: &mut WorldState) -> Result<(), LevelError> {
    let window = world.window_size();
    let t = BOUNDARY_THICKNESS;
    world.add(GameObject::boundary(0, 0, window, t))?;
    world.add(GameObject::boundary(window - t, 0, t, window))?;
    world.add(GameObject::boundary(0, window - t, window, t))?;
    world.add(GameObject::boundary(0, 0, t, window))?;
    Ok(())
}

fn min_platform_y() -> i32 {
    CHARACTER_SIZE * 4 + SCOREBOARD_HEIGHT
}

/// Sizes follow an even split of a fifth of the window area across all
/// platforms. With few static platforms they are made wide enough to spawn on.
fn add_platforms<R: Rng + ?Sized>(
    world: &mut WorldState,
    config: &LevelConfig,
    rng: &mut R,
) -> Result<(), LevelError> {
    let window = world.window_size();
    let requested = config
        .static_platforms
        .saturating_add(config.moving_platforms);
    let total = i32::try_from(requested)
        .map_err(|_| LevelError::TooManyPlatforms(requested))?
        .max(1);
    let platform_area = i64::from(window) * i64::from(window) / 5;
    let guess = ((platform_area / i64::from(total)) as f64).sqrt() as i32;
    let guess = guess.max(2);

    let static_min_width = if config.static_platforms < 10 {
        CHARACTER_SIZE * 3
    } else {
        1
    };
    let static_max_width = guess.max(static_min_width) + 1;
    let max_length = guess + 1;
    let min_travel = PLATFORM_MAX_SPEED + 1;

    for _ in 0..config.static_platforms {
        let width = rng.gen_range(static_min_width..static_max_width);
        let height = rng.gen_range(1..max_length);
        let color = Color::shade(Hue::Blue, rng);
        let platform = GameObject::platform(ObjectKind::StaticPlatform, 0, 0, width, height, color);
        place_randomly(world, platform, rng)?;
    }

    let horizontal = config.moving_platforms / 2;
    let vertical = config.moving_platforms - horizontal;

    for _ in 0..horizontal {
        let width = rng.gen_range(1..max_length).max(min_travel);
        let height = (rng.gen_range(1..max_length) / 2).max(1);
        let speed = rng.gen_range(PLATFORM_MIN_SPEED..=PLATFORM_MAX_SPEED);
        let color = Color::shade(Hue::Yellow, rng);
        let platform =
            GameObject::platform(ObjectKind::HorizontalPlatform, 0, 0, width, height, color)
                .with_velocity(speed, 0);
        place_randomly(world, platform, rng)?;
    }

    for _ in 0..vertical {
        let width = (rng.gen_range(1..max_length) / 2).max(1);
        let height = rng.gen_range(1..max_length).max(min_travel);
        let speed = rng.gen_range(PLATFORM_MIN_SPEED..=PLATFORM_MAX_SPEED);
        let speed = if rng.gen_bool(0.5) { speed } else { -speed };
        let color = Color::shade(Hue::Green, rng);
        let platform =
            GameObject::platform(ObjectKind::VerticalPlatform, 0, 0, width, height, color)
                .with_velocity(0, speed);
        place_randomly(world, platform, rng)?;
    }

    Ok(())
}

fn place_randomly<R: Rng + ?Sized>(
    world: &mut WorldState,
    mut platform: GameObject,
    rng: &mut R,
) -> Result<(), LevelError> {
    let window = world.window_size();
    for _ in 0..MAX_PLACEMENT_ATTEMPTS {
        let x = rng.gen_range(0..window);
        let y = rng.gen_range(min_platform_y()..window);
        platform.move_to(x, y, window);
        if !world.is_space_occupied(platform.bounds(), &[]) {
            world.add(platform)?;
            return Ok(());
        }
    }
    Err(LevelError::NoRoom {
        kind: platform.kind.name(),
        attempts: MAX_PLACEMENT_ATTEMPTS,
    })
}

/// One spawn point just above the top-left corner of every static platform
fn add_spawn_points(world: &mut WorldState) -> Result<(), LevelError> {
    let points: Vec<GameObject> = world
        .filter_by_kind(ObjectKind::StaticPlatform)
        .map(|p| GameObject::spawn_point(p.x(), p.y() - 1 - CHARACTER_SIZE))
        .collect();
    for point in points {
        world.add(point)?;
    }
    Ok(())
}

fn add_zones(world: &mut WorldState) -> Result<(), LevelError> {
    let window = world.window_size();
    world.add(GameObject::death_zone(
        0,
        window - ZONE_THICKNESS,
        window,
        ZONE_THICKNESS,
    ))?;
    world.add(GameObject::win_zone(
        0,
        SCOREBOARD_HEIGHT,
        window,
        ZONE_THICKNESS,
    ))?;
    Ok(())
}
