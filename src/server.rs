//! Runtime layer
//!
//! Each game runs on its own thread inside a [`GameLoop`]. The thread owns
//! the [`Game`] outright; the outside world talks to it through a command
//! channel and reads its status from the shared [`GameDirectory`], which is
//! only written between ticks.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::sim::{ClientSink, Game, GameStatus, ObjectId, PlayerInput};

/// Requests handled at the start of the next tick
pub enum GameCommand {
    Join {
        name: String,
        password: Option<String>,
        sink: Box<dyn ClientSink>,
        reply: Sender<Result<ObjectId, SimError>>,
    },
    Input {
        player: ObjectId,
        input: PlayerInput,
    },
    Leave {
        player: ObjectId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindGameResponse {
    pub success: bool,
    /// Game to join, or the free slot a new game should be created in
    pub game_id: Option<u32>,
}

/// Status of every running game, shared by the game threads
#[derive(Debug)]
pub struct GameDirectory {
    games: RwLock<BTreeMap<u32, GameStatus>>,
    max_games: usize,
}

impl GameDirectory {
    pub fn new(max_games: usize) -> Self {
        Self {
            games: RwLock::new(BTreeMap::new()),
            max_games,
        }
    }

    pub fn publish(&self, status: GameStatus) {
        self.games.write().insert(status.id, status);
    }

    pub fn remove(&self, id: u32) {
        self.games.write().remove(&id);
    }

    pub fn status(&self, id: u32) -> Option<GameStatus> {
        self.games.read().get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.games.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.read().is_empty()
    }

    /// Pick the joinable game with the most players alive. With none open,
    /// hand out the lowest free id if another game fits.
    pub fn find_game(&self) -> FindGameResponse {
        let games = self.games.read();
        let open = games
            .values()
            .filter(|g| g.allow_join && !g.over)
            .max_by_key(|g| (g.alive_count, std::cmp::Reverse(g.id)));
        if let Some(game) = open {
            return FindGameResponse {
                success: true,
                game_id: Some(game.id),
            };
        }
        if games.len() < self.max_games {
            let free = (0u32..).find(|id| !games.contains_key(id));
            return FindGameResponse {
                success: free.is_some(),
                game_id: free,
            };
        }
        FindGameResponse {
            success: false,
            game_id: None,
        }
    }
}

/// Drives one game at its configured rate
pub struct GameLoop {
    game: Game,
    commands: Receiver<GameCommand>,
    directory: Arc<GameDirectory>,
    interval: Duration,
}

impl GameLoop {
    pub fn new(game: Game, commands: Receiver<GameCommand>, directory: Arc<GameDirectory>) -> Self {
        let interval = Duration::from_millis(game.config.tick_interval_ms());
        directory.publish(game.status());
        Self {
            game,
            commands,
            directory,
            interval,
        }
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Tick until the game tears itself down, sleeping off whatever is left
    /// of each interval. A tick error ends the game.
    pub fn run(mut self) -> Result<(), SimError> {
        let id = self.game.id;
        let clock = Instant::now();
        log::info!("Game {} running at {:?} per tick", id, self.interval);
        while !self.game.stopped {
            let started = Instant::now();
            let now = clock.elapsed().as_millis() as u64;
            if let Err(e) = self.step(now) {
                log::error!("Game {} crashed: {}", id, e);
                self.directory.remove(id);
                return Err(e);
            }
            let duration = started.elapsed();
            match self.interval.checked_sub(duration) {
                Some(rest) => thread::sleep(rest),
                None => log::debug!("Game {} tick took {:?}", id, duration),
            }
        }
        self.directory.remove(id);
        log::info!("Game {} stopped", id);
        Ok(())
    }

    /// Apply queued commands, tick once at `now` and publish the status
    pub fn step(&mut self, now: u64) -> Result<(), SimError> {
        self.drain_commands()?;
        self.game.tick(now)?;
        self.directory.publish(self.game.status());
        Ok(())
    }

    fn drain_commands(&mut self) -> Result<(), SimError> {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                GameCommand::Join {
                    name,
                    password,
                    sink,
                    reply,
                } => {
                    let joined = self.game.add_player(name, password.as_deref(), sink);
                    if let Err(e) = &joined {
                        log::warn!("Game {}: join refused: {}", self.game.id, e);
                    }
                    // The requester may have given up waiting
                    let _ = reply.send(joined);
                }
                GameCommand::Input { player, input } => match self.game.apply_input(player, input) {
                    Err(SimError::UnknownPlayer(id)) => {
                        log::warn!("Game {}: input for unknown player {}", self.game.id, id);
                    }
                    other => other?,
                },
                GameCommand::Leave { player } => {
                    if let Err(e) = self.game.remove_player(player) {
                        log::warn!("Game {}: leave failed: {}", self.game.id, e);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Owner's side of a running game thread
pub struct GameHandle {
    pub id: u32,
    commands: Sender<GameCommand>,
    thread: JoinHandle<Result<(), SimError>>,
}

impl GameHandle {
    /// Start `game` on its own thread
    pub fn spawn(game: Game, directory: Arc<GameDirectory>) -> Self {
        let id = game.id;
        let (commands, rx) = mpsc::channel();
        let game_loop = GameLoop::new(game, rx, directory);
        let thread = thread::spawn(move || game_loop.run());
        Self { id, commands, thread }
    }

    /// Queue a join and wait for the game thread to answer
    pub fn join_player(
        &self,
        name: impl Into<String>,
        password: Option<String>,
        sink: Box<dyn ClientSink>,
    ) -> Result<ObjectId, SimError> {
        let (reply, answer) = mpsc::channel();
        self.send(GameCommand::Join {
            name: name.into(),
            password,
            sink,
            reply,
        })?;
        answer.recv().map_err(|_| SimError::GameStopped(self.id))?
    }

    pub fn send(&self, command: GameCommand) -> Result<(), SimError> {
        self.commands.send(command).map_err(|_| SimError::GameStopped(self.id))
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the game thread to end
    pub fn wait(self) -> Result<(), SimError> {
        match self.thread.join() {
            Ok(result) => result,
            Err(_) => {
                log::error!("Game {} thread panicked", self.id);
                Err(SimError::GameStopped(self.id))
            }
        }
    }
}
