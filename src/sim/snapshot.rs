//! Outgoing packets
//!
//! Each tick every connected client gets one [`UpdatePacket`] holding only
//! what changed inside its view: objects that entered it or changed
//! structurally (full), objects that only moved or changed state (partial),
//! and ids that left it. The encoding is behind [`PacketEncoder`] and the
//! connection behind [`ClientSink`]; the simulation never looks at bytes.

use std::collections::BTreeMap;
use std::sync::mpsc::Sender;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::Game;
use super::gas::GasSnapshot;
use super::ids::ObjectId;
use super::inventory::{ActionKind, InventoryItem};
use super::objects::{ObjectKind, Player};
use crate::Orientation;
use crate::error::SendError;

/// Everything a client needs to create an object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ObjectSnapshot {
    Player {
        id: ObjectId,
        name: String,
        position: Vec2,
        rotation: f32,
        active_weapon: Option<String>,
        helmet: Option<String>,
        vest: Option<String>,
        backpack: String,
        action: Option<String>,
    },
    Obstacle {
        id: ObjectId,
        definition: String,
        position: Vec2,
        rotation: f32,
        orientation: Orientation,
        scale: f32,
        dead: bool,
        door_offset: Option<Orientation>,
    },
    Building {
        id: ObjectId,
        definition: String,
        position: Vec2,
        orientation: Orientation,
        ceiling_dead: bool,
    },
    Loot {
        id: ObjectId,
        definition: String,
        count: u32,
        position: Vec2,
    },
    Decal {
        id: ObjectId,
        definition: String,
        position: Vec2,
        rotation: f32,
    },
    Particle {
        id: ObjectId,
        definition: String,
        position: Vec2,
        velocity: Vec2,
    },
}

impl ObjectSnapshot {
    pub fn id(&self) -> ObjectId {
        match self {
            ObjectSnapshot::Player { id, .. }
            | ObjectSnapshot::Obstacle { id, .. }
            | ObjectSnapshot::Building { id, .. }
            | ObjectSnapshot::Loot { id, .. }
            | ObjectSnapshot::Decal { id, .. }
            | ObjectSnapshot::Particle { id, .. } => *id,
        }
    }
}

/// State that changes often without changing what the object is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PartialSnapshot {
    Player {
        id: ObjectId,
        position: Vec2,
        rotation: f32,
        active_weapon: Option<String>,
        action: Option<String>,
    },
    Obstacle {
        id: ObjectId,
        scale: f32,
        dead: bool,
        door_offset: Option<Orientation>,
    },
    Building {
        id: ObjectId,
        ceiling_dead: bool,
    },
    Loot {
        id: ObjectId,
        position: Vec2,
    },
    Particle {
        id: ObjectId,
        position: Vec2,
    },
}

impl PartialSnapshot {
    pub fn id(&self) -> ObjectId {
        match self {
            PartialSnapshot::Player { id, .. }
            | PartialSnapshot::Obstacle { id, .. }
            | PartialSnapshot::Building { id, .. }
            | PartialSnapshot::Loot { id, .. }
            | PartialSnapshot::Particle { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletSnapshot {
    pub id: u16,
    pub source: ObjectId,
    /// Gun that fired it
    pub definition: String,
    pub position: Vec2,
    pub rotation: f32,
    pub reflection_count: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplosionSnapshot {
    pub definition: String,
    pub position: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmoteSnapshot {
    pub player: ObjectId,
    pub emote: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillFeedEntry {
    pub victim: ObjectId,
    pub victim_name: String,
    pub killer: Option<ObjectId>,
    pub killer_name: Option<String>,
    pub weapon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponSnapshot {
    pub id: String,
    pub ammo: Option<u32>,
    pub kills: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub items: BTreeMap<String, u32>,
    pub scope: String,
    pub scopes: Vec<String>,
    pub helmet: Option<String>,
    pub vest: Option<String>,
    pub backpack: String,
}

/// The receiving player's own state. Only fields marked dirty are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerData {
    /// Id of the player whose view this is
    pub id: Option<ObjectId>,
    pub spectating: bool,
    pub health: Option<f32>,
    pub adrenaline: Option<f32>,
    pub zoom: Option<f32>,
    pub inventory: Option<InventorySnapshot>,
    pub weapons: Option<Vec<Option<WeaponSnapshot>>>,
    pub active_slot: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatePacket {
    pub tick: u64,
    pub player: PlayerData,
    pub full_objects: Vec<ObjectSnapshot>,
    pub partial_objects: Vec<PartialSnapshot>,
    pub deleted: Vec<ObjectId>,
    pub bullets: Vec<BulletSnapshot>,
    pub explosions: Vec<ExplosionSnapshot>,
    pub emotes: Vec<EmoteSnapshot>,
    pub kill_feed: Vec<KillFeedEntry>,
    pub gas: Option<GasSnapshot>,
    pub gas_progress: Option<f32>,
    pub alive_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameOverPacket {
    pub player: ObjectId,
    pub won: bool,
    pub rank: usize,
    pub kills: u32,
    pub damage_done: f32,
    pub damage_taken: f32,
    pub time_alive_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerPacket {
    Update(UpdatePacket),
    GameOver(GameOverPacket),
}

/// Turns packets into bytes
pub trait PacketEncoder: Send {
    fn encode(&self, packet: &ServerPacket) -> Result<Vec<u8>, SendError>;
}

/// Plain JSON; fine for tests and the local harness
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEncoder;

impl PacketEncoder for JsonEncoder {
    fn encode(&self, packet: &ServerPacket) -> Result<Vec<u8>, SendError> {
        Ok(serde_json::to_vec(packet)?)
    }
}

/// One client connection
pub trait ClientSink: Send {
    /// Fire and forget; an error means the client is gone
    fn send(&mut self, bytes: &[u8]) -> Result<(), SendError>;
}

/// In-process connection over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink(pub Sender<Vec<u8>>);

impl ClientSink for ChannelSink {
    fn send(&mut self, bytes: &[u8]) -> Result<(), SendError> {
        self.0.send(bytes.to_vec()).map_err(|_| SendError::Disconnected)
    }
}

fn action_name(player: &Player) -> Option<String> {
    player.action.as_ref().map(|a| match &a.kind {
        ActionKind::Reload => "reload".to_string(),
        ActionKind::Heal(def) => def.id.clone(),
    })
}

fn weapon_snapshot(item: &InventoryItem) -> WeaponSnapshot {
    match item {
        InventoryItem::Gun(g) => WeaponSnapshot {
            id: g.def.id.clone(),
            ammo: Some(g.ammo),
            kills: g.kills,
        },
        InventoryItem::Melee(m) => WeaponSnapshot {
            id: m.def.id.clone(),
            ammo: None,
            kills: m.kills,
        },
    }
}

impl Game {
    pub fn full_snapshot(&self, id: ObjectId) -> Option<ObjectSnapshot> {
        let snapshot = match self.kinds.get(&id)? {
            ObjectKind::Player => {
                let p = self.players.get(&id)?;
                let inv = &p.inventory;
                ObjectSnapshot::Player {
                    id,
                    name: p.name.clone(),
                    position: p.position,
                    rotation: p.rotation,
                    active_weapon: inv.active_item().map(|i| i.id().to_string()),
                    helmet: inv.helmet.as_ref().map(|a| a.id.clone()),
                    vest: inv.vest.as_ref().map(|a| a.id.clone()),
                    backpack: inv.backpack.id.clone(),
                    action: action_name(p),
                }
            }
            ObjectKind::Obstacle => {
                let o = self.obstacles.get(&id)?;
                ObjectSnapshot::Obstacle {
                    id,
                    definition: o.def.id.clone(),
                    position: o.position,
                    rotation: o.rotation,
                    orientation: o.orientation,
                    scale: o.scale,
                    dead: o.dead,
                    door_offset: o.door.as_ref().map(|d| d.offset),
                }
            }
            ObjectKind::Building => {
                let b = self.buildings.get(&id)?;
                ObjectSnapshot::Building {
                    id,
                    definition: b.def.id.clone(),
                    position: b.position,
                    orientation: b.orientation,
                    ceiling_dead: b.ceiling_dead,
                }
            }
            ObjectKind::Loot => {
                let l = self.loot.get(&id)?;
                ObjectSnapshot::Loot {
                    id,
                    definition: l.item.id().to_string(),
                    count: l.count,
                    position: l.position,
                }
            }
            ObjectKind::Decal => {
                let d = self.decals.get(&id)?;
                ObjectSnapshot::Decal {
                    id,
                    definition: d.definition.clone(),
                    position: d.position,
                    rotation: d.rotation,
                }
            }
            ObjectKind::Particle => {
                let p = self.particles.get(&id)?;
                ObjectSnapshot::Particle {
                    id,
                    definition: p.definition.clone(),
                    position: p.position,
                    velocity: p.velocity,
                }
            }
        };
        Some(snapshot)
    }

    /// `None` for unknown ids and for kinds that never change (decals)
    pub fn partial_snapshot(&self, id: ObjectId) -> Option<PartialSnapshot> {
        let snapshot = match self.kinds.get(&id)? {
            ObjectKind::Player => {
                let p = self.players.get(&id)?;
                PartialSnapshot::Player {
                    id,
                    position: p.position,
                    rotation: p.rotation,
                    active_weapon: p.inventory.active_item().map(|i| i.id().to_string()),
                    action: action_name(p),
                }
            }
            ObjectKind::Obstacle => {
                let o = self.obstacles.get(&id)?;
                PartialSnapshot::Obstacle {
                    id,
                    scale: o.scale,
                    dead: o.dead,
                    door_offset: o.door.as_ref().map(|d| d.offset),
                }
            }
            ObjectKind::Building => {
                let b = self.buildings.get(&id)?;
                PartialSnapshot::Building {
                    id,
                    ceiling_dead: b.ceiling_dead,
                }
            }
            ObjectKind::Loot => {
                let l = self.loot.get(&id)?;
                PartialSnapshot::Loot { id, position: l.position }
            }
            ObjectKind::Particle => {
                let p = self.particles.get(&id)?;
                PartialSnapshot::Particle { id, position: p.position }
            }
            ObjectKind::Decal => return None,
        };
        Some(snapshot)
    }

    /// Own-view fields of `player` that are marked dirty
    pub fn player_data(&self, player: &Player) -> PlayerData {
        let inv = &player.inventory;
        let dirty = player.dirty;
        PlayerData {
            id: dirty.id.then_some(player.id),
            spectating: player.dead,
            health: dirty.health.then_some(player.health),
            adrenaline: dirty.adrenaline.then_some(player.adrenaline),
            zoom: dirty.zoom.then_some(player.zoom),
            inventory: dirty.inventory.then(|| InventorySnapshot {
                items: inv.stacks().map(|(k, v)| (k.to_string(), v)).collect(),
                scope: inv.scope().id.clone(),
                scopes: inv.scopes().iter().map(|s| s.id.clone()).collect(),
                helmet: inv.helmet.as_ref().map(|a| a.id.clone()),
                vest: inv.vest.as_ref().map(|a| a.id.clone()),
                backpack: inv.backpack.id.clone(),
            }),
            weapons: dirty.weapons.then(|| {
                (0..super::inventory::SLOT_COUNT)
                    .map(|slot| inv.slot(slot).ok().flatten().map(weapon_snapshot))
                    .collect()
            }),
            active_slot: dirty.weapons.then_some(inv.active_slot()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_channel_sink_reports_disconnect() {
        let (tx, rx) = mpsc::channel();
        let mut sink = ChannelSink(tx);
        assert!(sink.send(&[1, 2, 3]).is_ok());
        assert_eq!(rx.try_recv().unwrap(), vec![1, 2, 3]);
        drop(rx);
        assert!(matches!(sink.send(&[4]), Err(SendError::Disconnected)));
    }

    #[test]
    fn test_json_encoder_output_decodes() {
        let packet = ServerPacket::Update(UpdatePacket {
            tick: 7,
            deleted: vec![ObjectId(3)],
            alive_count: 2,
            ..Default::default()
        });
        let bytes = JsonEncoder.encode(&packet).unwrap();
        let back: ServerPacket = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, packet);
    }
}
