//! Shrinkzone headless harness
//!
//! Runs one match with scripted bots over in-process channels and logs a
//! summary. Usage: `shrinkzone [--config path] [--map id] [--bots n] [--seconds s]`

use std::f32::consts::TAU;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;

use shrinkzone::Config;
use shrinkzone::server::{GameCommand, GameDirectory, GameHandle};
use shrinkzone::sim::{
    Catalog, ChannelSink, Game, InputAction, MovementIntent, ObjectId, PlayerInput, ServerPacket,
};

const DEFAULT_BOTS: usize = 8;
const DEFAULT_SECONDS: u64 = 120;
/// How often bots change their mind
const BOT_INPUT_INTERVAL: Duration = Duration::from_millis(200);

struct Bot {
    id: ObjectId,
    name: String,
    packets: Receiver<Vec<u8>>,
    received: usize,
    bytes: usize,
    result: Option<(bool, usize)>,
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    let mut config = match arg_value(&args, "--config") {
        Some(path) => Config::load_or_default(path),
        None => Config::default(),
    };
    if let Some(map) = arg_value(&args, "--map") {
        config.map = map.to_string();
    }
    let bots = parse_arg(&args, "--bots").unwrap_or(DEFAULT_BOTS);
    let seconds = parse_arg(&args, "--seconds").unwrap_or(DEFAULT_SECONDS);
    config.min_players_to_start = config.min_players_to_start.min(bots.max(1));

    let catalog = match Catalog::builtin() {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            log::error!("Failed to load the built-in catalog: {}", e);
            std::process::exit(1);
        }
    };

    let directory = Arc::new(GameDirectory::new(config.max_games));
    let Some(game_id) = directory.find_game().game_id else {
        log::error!("No free game slot");
        std::process::exit(1);
    };
    let game = match Game::new(game_id, Arc::new(config), catalog) {
        Ok(game) => game,
        Err(e) => {
            log::error!("Failed to create game {}: {}", game_id, e);
            std::process::exit(1);
        }
    };
    let handle = GameHandle::spawn(game, Arc::clone(&directory));

    let mut roster = Vec::with_capacity(bots);
    for i in 0..bots {
        let name = format!("bot-{i}");
        let (tx, rx) = mpsc::channel();
        match handle.join_player(name.clone(), None, Box::new(ChannelSink(tx))) {
            Ok(id) => roster.push(Bot {
                id,
                name,
                packets: rx,
                received: 0,
                bytes: 0,
                result: None,
            }),
            Err(e) => log::warn!("{} could not join: {}", name, e),
        }
    }
    log::info!("{} bots joined game {}", roster.len(), game_id);

    let mut rng = rand::rng();
    let deadline = Instant::now() + Duration::from_secs(seconds);
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            log::info!("Time limit reached, disconnecting bots");
            for bot in &roster {
                if let Err(e) = handle.send(GameCommand::Leave { player: bot.id }) {
                    log::warn!("{}: {}", bot.name, e);
                }
            }
            break;
        }
        for bot in &mut roster {
            drain(bot);
            if bot.result.is_some() {
                continue;
            }
            let input = bot_input(&mut rng);
            if let Err(e) = handle.send(GameCommand::Input { player: bot.id, input }) {
                log::warn!("{}: {}", bot.name, e);
            }
        }
        thread::sleep(BOT_INPUT_INTERVAL);
    }

    if let Err(e) = handle.wait() {
        log::error!("Game {} ended with an error: {}", game_id, e);
    }
    for bot in &mut roster {
        drain(bot);
        match bot.result {
            Some((won, rank)) => log::info!(
                "{}: rank {}{} ({} packets, {} bytes)",
                bot.name,
                rank,
                if won { " (winner)" } else { "" },
                bot.received,
                bot.bytes
            ),
            None => log::info!("{}: still alive ({} packets, {} bytes)", bot.name, bot.received, bot.bytes),
        }
    }
}

/// Wander, turn, and now and then shoot or pick something up
fn bot_input<R: Rng + ?Sized>(rng: &mut R) -> PlayerInput {
    let mut actions = Vec::new();
    if rng.random_bool(0.3) {
        actions.push(InputAction::Interact);
    }
    if rng.random_bool(0.1) {
        actions.push(InputAction::EquipSlot(rng.random_range(0..3)));
    }
    if rng.random_bool(0.05) {
        actions.push(InputAction::Reload);
    }
    PlayerInput {
        movement: MovementIntent {
            up: rng.random_bool(0.3),
            down: rng.random_bool(0.3),
            left: rng.random_bool(0.3),
            right: rng.random_bool(0.3),
        },
        touch: None,
        attacking: rng.random_bool(0.4),
        rotation: rng.random_range(0.0..TAU),
        actions,
    }
}

fn drain(bot: &mut Bot) {
    for bytes in bot.packets.try_iter() {
        bot.received += 1;
        bot.bytes += bytes.len();
        if let Ok(ServerPacket::GameOver(over)) = serde_json::from_slice(&bytes) {
            bot.result = Some((over.won, over.rank));
        }
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    arg_value(args, flag).and_then(|value| value.parse().ok())
}
