//! Dice rolling.
//!
//! Rolls are pure functions of the dice and the generator handed in; the
//! server owns a single seeded generator so a fixed seed replays the same
//! fight.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type GameRng = ChaCha8Rng;

pub fn seeded_rng(seed: u64) -> GameRng {
    ChaCha8Rng::seed_from_u64(seed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dice {
    pub count: u32,
    pub sides: u32,
}

impl Dice {
    pub const D20: Dice = Dice::new(1, 20);
    pub const NONE: Dice = Dice::new(0, 0);

    pub const fn new(count: u32, sides: u32) -> Self {
        Self { count, sides }
    }

    pub fn max(&self) -> i32 {
        (self.count * self.sides) as i32
    }
}

impl fmt::Display for Dice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)
    }
}

/// Outcome of one roll, kept only for the duration of a combat resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roll {
    pub total: i32,
    pub raw: i32,
    pub bonus: i32,
    pub faces: Vec<i32>,
}

/// Rolls `dice` and adds `bonus`. Zero-sided dice always show 0.
pub fn roll<R: Rng + ?Sized>(dice: Dice, bonus: i32, rng: &mut R) -> Roll {
    let faces: Vec<i32> = (0..dice.count)
        .map(|_| {
            if dice.sides == 0 {
                0
            } else {
                rng.gen_range(1..=dice.sides) as i32
            }
        })
        .collect();
    let raw = faces.iter().sum();
    Roll {
        total: raw + bonus,
        raw,
        bonus,
        faces,
    }
}
