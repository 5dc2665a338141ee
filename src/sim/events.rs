//! Game event bus
//!
//! Listeners subscribe per event kind and run synchronously, in subscription
//! order, at fixed points of the tick. A listener that fails or panics is
//! logged and skipped; the rest still run. Cancellable events hand every
//! listener the same [`Cancellation`] token and the game checks it before
//! applying the default effect.

use std::collections::HashMap;
use std::error::Error;
use std::panic::{AssertUnwindSafe, catch_unwind};

use super::ids::ObjectId;

pub type ListenerError = Box<dyn Error + Send + Sync>;

type Listener = Box<dyn FnMut(&GameEvent, &mut Cancellation) -> Result<(), ListenerError> + Send>;

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    GameStarted,
    GameEnded {
        winner: Option<ObjectId>,
    },
    PlayerJoin {
        player: ObjectId,
        name: String,
    },
    PlayerLeave {
        player: ObjectId,
    },
    PlayerDamage {
        player: ObjectId,
        source: Option<ObjectId>,
        weapon: Option<String>,
        amount: f32,
    },
    PlayerKill {
        victim: ObjectId,
        killer: Option<ObjectId>,
        weapon: Option<String>,
    },
    ObstacleDamage {
        obstacle: ObjectId,
        source: Option<ObjectId>,
        amount: f32,
    },
    ObstacleDestroy {
        obstacle: ObjectId,
        definition: String,
    },
    LootPickup {
        player: ObjectId,
        loot: ObjectId,
        item: String,
    },
    Interact {
        player: ObjectId,
        target: ObjectId,
    },
    GasAdvance {
        stage: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GameStarted,
    GameEnded,
    PlayerJoin,
    PlayerLeave,
    PlayerDamage,
    PlayerKill,
    ObstacleDamage,
    ObstacleDestroy,
    LootPickup,
    Interact,
    GasAdvance,
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::GameStarted => EventKind::GameStarted,
            GameEvent::GameEnded { .. } => EventKind::GameEnded,
            GameEvent::PlayerJoin { .. } => EventKind::PlayerJoin,
            GameEvent::PlayerLeave { .. } => EventKind::PlayerLeave,
            GameEvent::PlayerDamage { .. } => EventKind::PlayerDamage,
            GameEvent::PlayerKill { .. } => EventKind::PlayerKill,
            GameEvent::ObstacleDamage { .. } => EventKind::ObstacleDamage,
            GameEvent::ObstacleDestroy { .. } => EventKind::ObstacleDestroy,
            GameEvent::LootPickup { .. } => EventKind::LootPickup,
            GameEvent::Interact { .. } => EventKind::Interact,
            GameEvent::GasAdvance { .. } => EventKind::GasAdvance,
        }
    }
}

impl EventKind {
    /// Whether listeners may veto the default effect
    pub fn is_cancellable(self) -> bool {
        matches!(
            self,
            EventKind::PlayerDamage
                | EventKind::ObstacleDamage
                | EventKind::LootPickup
                | EventKind::Interact
        )
    }
}

/// Shared veto flag for one dispatch
#[derive(Debug, Default)]
pub struct Cancellation {
    cancelled: bool,
}

impl Cancellation {
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<EventKind, Vec<(String, Listener)>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<_, _> = self.listeners.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `listener` to every event of `kind`
    pub fn on<F>(&mut self, kind: EventKind, name: impl Into<String>, listener: F)
    where
        F: FnMut(&GameEvent, &mut Cancellation) -> Result<(), ListenerError> + Send + 'static,
    {
        self.listeners
            .entry(kind)
            .or_default()
            .push((name.into(), Box::new(listener)));
    }

    /// Run every listener for `event`. Returns `true` when the default effect
    /// should go ahead, which is always the case for non-cancellable events.
    pub fn emit(&mut self, event: &GameEvent) -> bool {
        let kind = event.kind();
        let Some(listeners) = self.listeners.get_mut(&kind) else {
            return true;
        };
        let mut cancellation = Cancellation::default();
        for (name, listener) in listeners.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| listener(event, &mut cancellation))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::warn!("Listener `{}` failed on {:?}: {}", name, kind, e),
                Err(_) => log::error!("Listener `{}` panicked on {:?}", name, kind),
            }
        }
        !(kind.is_cancellable() && cancellation.is_cancelled())
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn damage_event() -> GameEvent {
        GameEvent::PlayerDamage {
            player: ObjectId(1),
            source: None,
            weapon: None,
            amount: 10.0,
        }
    }

    #[test]
    fn test_failing_listeners_do_not_stop_dispatch() {
        let mut bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        bus.on(EventKind::PlayerDamage, "errors", |_, _| Err("nope".into()));
        bus.on(EventKind::PlayerDamage, "panics", |_, _| panic!("listener blew up"));
        let counter = Arc::clone(&calls);
        bus.on(EventKind::PlayerDamage, "counts", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(bus.emit(&damage_event()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancellation_is_shared_and_ordered() {
        let mut bus = EventBus::new();
        bus.on(EventKind::PlayerDamage, "veto", |_, cancel| {
            cancel.cancel();
            Ok(())
        });
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_by_later = Arc::clone(&seen);
        bus.on(EventKind::PlayerDamage, "observer", move |_, cancel| {
            if cancel.is_cancelled() {
                seen_by_later.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        });
        assert!(!bus.emit(&damage_event()));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_non_cancellable_events_ignore_veto() {
        let mut bus = EventBus::new();
        bus.on(EventKind::PlayerKill, "veto", |_, cancel| {
            cancel.cancel();
            Ok(())
        });
        assert!(bus.emit(&GameEvent::PlayerKill {
            victim: ObjectId(2),
            killer: None,
            weapon: None,
        }));
    }
}
