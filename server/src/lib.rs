//! # Dungeon Crawl Server Library
//!
//! Authoritative, tick-driven simulation of a multiplayer dungeon crawler.
//! Clients send intents (where to walk, what to pick up, which attack
//! channels to allow) and the server decides everything else: paths,
//! attacks, deaths, loot and level changes. After each tick every
//! connection receives only the entity states that changed since it last
//! heard about them.
//!
//! ## Module Organization
//!
//! ### Rules
//! - `dice`: dice expressions and the seeded generator behind every roll
//! - `stats`: base stats, race and profession modifiers, level tables
//! - `item` and `monster`: static catalogs, equipment slots and loot
//! - `combat`: attack resolution and experience for kills
//!
//! ### World
//! - `grid`: walls, occupancy and line of sight
//! - `pathfind`: bounded 8-directional A*
//! - `mob`: the actor shared by players and monsters, and its state machine
//! - `level`: one floor with its registries, loot and stairs
//! - `game`: every level plus sessions, command routing and the tick driver
//!
//! ### Wire
//! - `delta`: per-connection change detection by content hash
//! - `client_manager`: address to client id mapping and timeouts
//! - `network`: the datagram server and its background tasks
//!
//! ## Tick Order
//!
//! One call to [`game::GameState::advance_tick`]:
//! 1. admits queued logins
//! 2. clears last tick's logs and collected loot on every level
//! 3. updates monsters, then players, level by level
//! 4. rebuilds occupancy where anything moved
//! 5. moves players standing on linked stairs
//! 6. removes queued logouts
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::SimConfig;
//! use server::game::GameState;
//! use server::network::{Server, ServerOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), server::network::BoxError> {
//!     let game = GameState::with_bundled_levels(SimConfig::default(), 42)?;
//!     let mut server = Server::new("127.0.0.1:8080", game, ServerOptions::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod combat;
pub mod config;
pub mod delta;
pub mod dice;
pub mod error;
pub mod game;
pub mod grid;
pub mod item;
pub mod level;
pub mod mob;
pub mod monster;
pub mod network;
pub mod pathfind;
pub mod stats;
pub mod utils;
