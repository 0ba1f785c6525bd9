//! Performance benchmarks for the hot paths of a tick

use server::config::SimConfig;
use server::delta::Replicator;
use server::game::{GameState, BUNDLED_LEVELS};
use server::level::Level;
use server::pathfind::find_path;
use shared::{ClientMessage, ConsumableView, Profession, Race, ServerMessage};
use std::time::Instant;

/// Benchmarks line of sight across an open map
#[test]
fn benchmark_line_of_sight() {
    let level = Level::parse(1, BUNDLED_LEVELS[0]).unwrap();
    let iterations = 20_000;
    let start = Instant::now();

    let mut clear = 0;
    for i in 0..iterations {
        let from = (1 + i % 8, 1 + i % 5);
        let to = (30 + i % 8, 9 + i % 4);
        if level.grid.has_line_of_sight(from, to) {
            clear += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Line of sight: {} checks ({} clear) in {:?} ({:.2} μs/check)",
        iterations,
        clear,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}

/// Benchmarks bounded A* between distant rooms
#[test]
fn benchmark_pathfinding() {
    let level = Level::parse(1, BUNDLED_LEVELS[0]).unwrap();
    let iterations = 2_000;
    let start = Instant::now();

    let mut found = 0;
    for i in 0..iterations {
        let from = (1 + i % 7, 1 + i % 5);
        let to = (30 + i % 6, 9 + i % 3);
        if !find_path(&level.grid, from, to, 40).is_empty() {
            found += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Pathfinding: {} searches ({} found) in {:?} ({:.2} μs/search)",
        iterations,
        found,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(found > 0);
    assert!(duration.as_millis() < 3000);
}

/// Benchmarks change detection over a frame of unchanged entities
#[test]
fn benchmark_delta_frames() {
    let frame: Vec<_> = (1..=200u32)
        .map(|id| {
            (
                id,
                ServerMessage::Consumable(ConsumableView {
                    id,
                    subtype: "healthPotion".to_string(),
                    x: (id % 40) as i32,
                    y: (id / 40) as i32,
                    magnitude: 8,
                    gone: false,
                }),
            )
        })
        .collect();

    let mut replicator = Replicator::new();
    let iterations = 500;
    let start = Instant::now();
    let mut sent = 0;
    for tick in 1..=iterations {
        sent += replicator.diff(tick, frame.clone()).len();
    }

    let duration = start.elapsed();
    println!(
        "Delta frames: {} frames of {} entities in {:?} ({:.2} μs/frame)",
        iterations,
        frame.len(),
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(sent, frame.len());
    assert!(duration.as_millis() < 3000);
}

/// Benchmarks full ticks with a crowd of players
#[test]
fn benchmark_full_ticks() {
    let mut game = GameState::with_bundled_levels(SimConfig::default(), 77).unwrap();
    let professions = [Profession::Fighter, Profession::Rogue, Profession::Mage, Profession::Cleric];
    for client in 1..=16u32 {
        game.apply_command(
            client,
            ClientMessage::Login {
                name: format!("bot{}", client),
                race: Race::Human,
                profession: professions[client as usize % professions.len()],
            },
        );
    }

    let ticks = 300;
    let start = Instant::now();
    for tick in 0..ticks {
        if tick % 10 == 0 {
            for client in 1..=16u32 {
                let x = 2 + ((tick + client as u64 * 3) % 36) as i32;
                let y = 1 + ((tick / 10 + client as u64) % 12) as i32;
                game.apply_command(client, ClientMessage::SetDestination { x, y });
            }
        }
        game.advance_tick().unwrap();
        game.outbound();
    }

    let duration = start.elapsed();
    println!(
        "Full ticks: {} ticks with 16 players in {:?} ({:.2} ms/tick)",
        ticks,
        duration,
        duration.as_millis() as f64 / ticks as f64
    );

    // Comfortably inside a 100ms tick budget on average.
    assert!(duration.as_millis() < ticks as u128 * 20);
}
