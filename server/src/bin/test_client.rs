//! Headless bot that logs in, wanders to random floor tiles and reports
//! what the server tells it.

use clap::Parser;
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use shared::{ClientMessage, Profession, Race, ServerMessage, FLOOR_GLYPH, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, timeout, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,

    /// Character name
    #[arg(short, long, default_value = "bot")]
    name: String,

    /// Seconds to play before logging out
    #[arg(short, long, default_value = "30")]
    duration: u64,

    /// Seconds between new wander targets
    #[arg(short, long, default_value = "4")]
    wander_secs: u64,
}

async fn send(socket: &UdpSocket, server: SocketAddr, message: &ClientMessage) -> Result<(), Box<dyn std::error::Error>> {
    let data = serde_json::to_vec(message)?;
    socket.send_to(&data, server).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    info!("Client socket bound to {}", socket.local_addr()?);

    let mut rng = rand::thread_rng();
    let race = *[Race::Human, Race::Elf, Race::Dwarf].choose(&mut rng).unwrap_or(&Race::Human);
    let profession = *[Profession::Fighter, Profession::Rogue, Profession::Mage, Profession::Cleric]
        .choose(&mut rng)
        .unwrap_or(&Profession::Fighter);
    info!("Logging in to {} as {} ({:?} {:?})", args.server, args.name, race, profession);
    send(
        &socket,
        args.server,
        &ClientMessage::Login {
            name: args.name.clone(),
            race,
            profession,
        },
    )
    .await?;

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let mut floor: Vec<(i32, i32)> = Vec::new();
    let mut heartbeat = interval(Duration::from_secs(1));
    let mut wander = interval(Duration::from_secs(args.wander_secs.max(1)));
    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut received = 0usize;

    while Instant::now() < deadline {
        tokio::select! {
            _ = heartbeat.tick() => {
                send(&socket, args.server, &ClientMessage::Heartbeat).await?;
            }
            _ = wander.tick() => {
                if let Some(&(x, y)) = floor.choose(&mut rng) {
                    debug!("Heading for ({}, {})", x, y);
                    send(&socket, args.server, &ClientMessage::SetDestination { x, y }).await?;
                }
            }
            result = timeout(Duration::from_millis(500), socket.recv_from(&mut buf)) => {
                let Ok(result) = result else { continue };
                let (len, _) = result?;
                received += 1;
                match serde_json::from_slice::<ServerMessage>(&buf[..len]) {
                    Ok(ServerMessage::Map { tiles, level_id }) => {
                        floor = tiles
                            .iter()
                            .enumerate()
                            .flat_map(|(y, row)| {
                                row.chars()
                                    .enumerate()
                                    .filter(|(_, glyph)| *glyph == FLOOR_GLYPH)
                                    .map(move |(x, _)| (x as i32, y as i32))
                            })
                            .collect();
                        info!("Entered level {} ({} floor tiles)", level_id, floor.len());
                    }
                    Ok(ServerMessage::SelfPlayer(view)) => {
                        for line in &view.mob.log {
                            info!("{}", line);
                        }
                        debug!("At ({}, {}) hp {}/{}", view.mob.x, view.mob.y, view.mob.hp, view.mob.max_hp);
                    }
                    Ok(ServerMessage::Dead(summary)) => {
                        info!(
                            "Died with {} gold, {} kills, {} damage dealt",
                            summary.gold, summary.kills, summary.damage_done
                        );
                        break;
                    }
                    Ok(ServerMessage::Disconnected { reason }) => {
                        warn!("Disconnected: {}", reason);
                        return Ok(());
                    }
                    Ok(other) => debug!("{:?}", other),
                    Err(e) => warn!("Unreadable message: {}", e),
                }
            }
        }
    }

    send(&socket, args.server, &ClientMessage::Logout).await?;
    info!("Logged out after {} messages", received);
    Ok(())
}
