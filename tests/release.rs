use fallout::{
    engine::{self, ExecutionMode, GridSpec, ReleaseParams},
    grid::BoundsPolicy,
    particle::Position,
    wind::WindWeights,
};

fn release(
    origin: Position,
    altitude: u32,
    weights: WindWeights,
    speed: u32,
    count: u32,
) -> ReleaseParams {
    ReleaseParams::new(origin, altitude, weights, speed, count).with_seed(2024)
}

/// Mean (dx, dy) of the landings relative to `origin`, read back off the grid.
fn mean_offset(outcome: &engine::RunOutcome, origin: Position) -> (f64, f64) {
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    for (y, row) in outcome.grid.rows().enumerate() {
        for (x, &count) in row.iter().enumerate() {
            sum_x += (x as f64 - origin.x as f64) * f64::from(count);
            sum_y += (y as f64 - origin.y as f64) * f64::from(count);
        }
    }
    let total = outcome.grid.total() as f64;
    (sum_x / total, sum_y / total)
}

#[test]
fn ground_release_lands_on_origin() {
    let outcome = engine::run(release(
        Position::new(250, 250),
        0,
        WindWeights::uniform(),
        1,
        1,
    ))
    .unwrap();
    assert_eq!(outcome.grid.get(250, 250), Some(1));
    assert_eq!(outcome.grid.total(), 1);
    assert_eq!(outcome.max_duration, 0);
}

#[test]
fn one_metre_release_stays_next_to_origin() {
    let origin = Position::new(250, 250);
    let outcome = engine::run(release(origin, 1, WindWeights::uniform(), 1, 1_000)).unwrap();

    assert_eq!(outcome.max_duration, 1);
    assert_eq!(outcome.grid.total(), 1_000);
    let mut near = 0;
    for dy in -1..=1 {
        for dx in -1..=1 {
            near += outcome.grid.get(origin.x + dx, origin.y + dy).unwrap_or(0);
        }
    }
    assert_eq!(near, 1_000, "every particle should land within one cell");
    // 20% of particles never drift at speed 1
    let stayed = outcome.grid.get(origin.x, origin.y).unwrap();
    assert!((120..=280).contains(&stayed), "{stayed} stayed on the origin");
}

#[test]
fn north_wind_carries_particles_north() {
    let origin = Position::new(250, 100);
    let weights = WindWeights::new(1.0, 0.0, 0.0, 0.0).unwrap();
    let outcome = engine::run(release(origin, 80, weights, 4, 500)).unwrap();

    assert_eq!(outcome.grid.total() + outcome.rejected(), 500);
    let (dx, dy) = mean_offset(&outcome, origin);
    assert_eq!(dx, 0.0, "no sideways drift without east/west weight");
    assert!(dy > 100.0, "mean northward drift was only {dy}");
    assert!(outcome.max_duration >= 80);
}

#[test]
fn prevailing_easterly_beats_crosswind() {
    let origin = Position::new(150, 250);
    let weights = WindWeights::from_balance(50.0, 95.0).unwrap();
    let outcome = engine::run(release(origin, 75, weights, 1, 2_000)).unwrap();
    let (dx, dy) = mean_offset(&outcome, origin);
    assert!(dx > 20.0, "east drift {dx}");
    assert!(dy.abs() < dx / 4.0, "crosswind {dy} vs east {dx}");
}

#[test]
fn seeded_runs_replay_exactly() {
    let params = release(Position::new(250, 250), 100, WindWeights::uniform(), 3, 800);
    let first = engine::run(params.clone()).unwrap();
    let second = engine::run(params.clone()).unwrap();
    assert_eq!(first.grid, second.grid);
    assert_eq!(first.max_duration, second.max_duration);
    assert_eq!(first.longest, second.longest);

    let other = engine::run(params.with_seed(99)).unwrap();
    assert_ne!(first.grid, other.grid);
}

#[test]
fn parallel_statistics_match_sequential() {
    let origin = Position::new(250, 250);
    let weights = WindWeights::from_balance(40.0, 60.0).unwrap();
    let sequential = engine::run(release(origin, 75, weights, 2, 3_000).with_seed(1)).unwrap();
    let parallel = engine::run(
        release(origin, 75, weights, 2, 3_000)
            .with_seed(2)
            .with_mode(ExecutionMode::Parallel),
    )
    .unwrap();

    assert_eq!(parallel.landed, 3_000);
    let ratio = parallel.mean_distance / sequential.mean_distance;
    assert!(
        (0.9..1.1).contains(&ratio),
        "mean distances diverge: {} vs {}",
        sequential.mean_distance,
        parallel.mean_distance
    );
}

#[test]
fn rejected_landings_are_counted() {
    let grid = GridSpec {
        width: 12,
        height: 12,
        bounds: BoundsPolicy::Reject,
    };
    let params = release(Position::new(6, 6), 120, WindWeights::uniform(), 4, 600).with_grid(grid);
    let outcome = engine::run(params).unwrap();
    assert!(outcome.rejected() > 0);
    assert_eq!(outcome.grid.total() + outcome.rejected(), 600);
    assert_eq!(outcome.landed, 600);
}

#[test]
fn clamped_landings_stay_on_the_grid() {
    let grid = GridSpec {
        width: 12,
        height: 12,
        bounds: BoundsPolicy::Clamp,
    };
    let params = release(Position::new(6, 6), 120, WindWeights::uniform(), 4, 600)
        .with_grid(grid)
        .with_mode(ExecutionMode::Parallel);
    let outcome = engine::run(params).unwrap();
    assert!(outcome.clamped() > 0);
    assert_eq!(outcome.rejected(), 0);
    assert_eq!(outcome.grid.total(), 600);
}
