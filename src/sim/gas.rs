//! Shrinking safe zone
//!
//! The gas walks a static stage table. Waiting stages pick the next safe
//! circle; advancing stages interpolate toward it. Radii in the table are
//! fractions of the map size.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{GasConfig, GasMode};
use crate::consts::GAS_DAMAGE_INTERVAL_TICKS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GasState {
    Inactive,
    Waiting,
    Advancing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasStage {
    pub state: GasState,
    /// Seconds; zero ends advancement
    pub duration: f32,
    pub old_radius: f32,
    pub new_radius: f32,
    pub dps: f32,
    pub prevent_join: bool,
}

const fn stage(
    state: GasState,
    duration: f32,
    old_radius: f32,
    new_radius: f32,
    dps: f32,
    prevent_join: bool,
) -> GasStage {
    GasStage {
        state,
        duration,
        old_radius,
        new_radius,
        dps,
        prevent_join,
    }
}

use GasState::{Advancing, Inactive, Waiting};

pub const GAS_STAGES: &[GasStage] = &[
    stage(Inactive, 0.0, 0.762, 0.762, 0.0, false),
    stage(Waiting, 75.0, 0.762, 0.355, 0.0, false),
    stage(Advancing, 20.0, 0.762, 0.355, 1.0, false),
    stage(Waiting, 60.0, 0.355, 0.18, 1.0, false),
    stage(Advancing, 15.0, 0.355, 0.18, 1.5, false),
    stage(Waiting, 45.0, 0.18, 0.0915, 2.0, true),
    stage(Advancing, 10.0, 0.18, 0.0915, 2.5, true),
    stage(Waiting, 30.0, 0.0915, 0.046, 3.0, true),
    stage(Advancing, 10.0, 0.0915, 0.046, 3.5, true),
    stage(Waiting, 20.0, 0.046, 0.0171, 4.0, true),
    stage(Advancing, 8.0, 0.046, 0.0171, 5.0, true),
    stage(Waiting, 10.0, 0.0171, 0.0, 6.0, true),
    stage(Advancing, 6.0, 0.0171, 0.0, 7.0, true),
    stage(Waiting, 0.0, 0.0, 0.0, 8.0, true),
];

/// Stage fields sent to clients when they change
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GasSnapshot {
    pub stage: usize,
    pub state: GasState,
    pub duration: f32,
    pub old_position: Vec2,
    pub new_position: Vec2,
    pub old_radius: f32,
    pub new_radius: f32,
}

/// What [`Gas::advance`] did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasAdvance {
    pub stage: usize,
    /// Delay until the next advance, if any
    pub next_in_ms: Option<u64>,
    pub prevent_join: bool,
}

#[derive(Debug, Clone)]
pub struct Gas {
    stages: Vec<GasStage>,
    mode: GasMode,
    override_duration: f32,
    map_size: f32,

    pub stage: usize,
    pub state: GasState,
    pub duration: f32,
    pub countdown_start: u64,
    pub old_position: Vec2,
    pub new_position: Vec2,
    pub current_position: Vec2,
    pub old_radius: f32,
    pub new_radius: f32,
    pub current_radius: f32,
    pub dps: f32,
    /// Fraction of the current stage elapsed
    pub percentage: f32,

    pub dirty: bool,
    pub percentage_dirty: bool,
    /// Set on the ticks that deal damage
    pub damage_pulse: bool,
    ticks_since_damage: u32,
}

impl Gas {
    pub fn new(width: f32, height: f32, config: &GasConfig) -> Self {
        Self::with_stages(width, height, config, GAS_STAGES.to_vec())
    }

    pub fn with_stages(width: f32, height: f32, config: &GasConfig, stages: Vec<GasStage>) -> Self {
        let map_size = (width + height) / 2.0;
        let center = Vec2::new(width, height) / 2.0;
        let first = stages.first().copied().unwrap_or(stage(Inactive, 0.0, 1.0, 1.0, 0.0, false));
        Self {
            mode: config.mode,
            override_duration: config.override_duration,
            map_size,
            stage: 0,
            state: first.state,
            duration: first.duration,
            countdown_start: 0,
            old_position: center,
            new_position: center,
            current_position: center,
            old_radius: first.old_radius * map_size,
            new_radius: first.new_radius * map_size,
            current_radius: first.old_radius * map_size,
            dps: first.dps,
            percentage: 0.0,
            dirty: true,
            percentage_dirty: false,
            damage_pulse: false,
            ticks_since_damage: 0,
            stages,
        }
    }

    /// Move to the next stage. `None` when the gas is disabled or the table
    /// is exhausted.
    pub fn advance<R: Rng + ?Sized>(&mut self, now: u64, rng: &mut R) -> Option<GasAdvance> {
        if self.mode == GasMode::Disabled {
            return None;
        }
        let next = *self.stages.get(self.stage + 1)?;
        self.stage += 1;

        self.state = next.state;
        self.duration = if self.mode == GasMode::Debug && next.duration != 0.0 {
            self.override_duration
        } else {
            next.duration
        };
        self.old_position = self.new_position;
        self.old_radius = next.old_radius * self.map_size;
        self.new_radius = next.new_radius * self.map_size;
        self.current_radius = self.old_radius;
        self.current_position = self.old_position;
        self.dps = next.dps;
        self.countdown_start = now;
        self.percentage = 0.0;

        if next.state == Waiting && next.new_radius != 0.0 && self.mode != GasMode::Debug {
            let reach = (self.old_radius - self.new_radius).max(0.0);
            let angle = rng.random_range(0.0..std::f32::consts::TAU);
            let distance = reach * rng.random::<f32>().sqrt();
            self.new_position = self.old_position + Vec2::from_angle(angle) * distance;
        }

        self.dirty = true;
        self.percentage_dirty = true;
        log::debug!(
            "Gas stage {} ({:?}) radius {:.1} -> {:.1}",
            self.stage,
            self.state,
            self.old_radius,
            self.new_radius
        );

        let next_in_ms = (self.duration > 0.0).then(|| (self.duration * 1000.0) as u64);
        Some(GasAdvance {
            stage: self.stage,
            next_in_ms,
            prevent_join: next.prevent_join,
        })
    }

    /// Per-tick update: progress, interpolation and the damage pulse
    pub fn tick(&mut self, now: u64) {
        self.damage_pulse = false;
        if self.state == Inactive {
            return;
        }
        let elapsed = now.saturating_sub(self.countdown_start) as f32;
        self.percentage = if self.duration > 0.0 {
            (elapsed / (self.duration * 1000.0)).min(1.0)
        } else {
            1.0
        };
        self.percentage_dirty = true;

        self.ticks_since_damage += 1;
        if self.ticks_since_damage >= GAS_DAMAGE_INTERVAL_TICKS {
            self.ticks_since_damage = 0;
            self.damage_pulse = true;
        }

        if self.state == Advancing {
            self.current_position = self.old_position.lerp(self.new_position, self.percentage);
            self.current_radius = crate::lerp(self.old_radius, self.new_radius, self.percentage);
        }
    }

    pub fn is_in_gas(&self, position: Vec2) -> bool {
        position.distance_squared(self.current_position) >= self.current_radius * self.current_radius
    }

    pub fn snapshot(&self) -> GasSnapshot {
        GasSnapshot {
            stage: self.stage,
            state: self.state,
            duration: self.duration,
            old_position: self.old_position,
            new_position: self.new_position,
            old_radius: self.old_radius,
            new_radius: self.new_radius,
        }
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
        self.percentage_dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn config(mode: GasMode) -> GasConfig {
        GasConfig {
            mode,
            override_duration: 2.0,
        }
    }

    #[test]
    fn test_radius_never_grows() {
        let mut gas = Gas::new(1024.0, 1024.0, &config(GasMode::Normal));
        let mut rng = Pcg32::seed_from_u64(11);
        let mut now = 0;
        let mut last = gas.current_radius;
        while let Some(step) = gas.advance(now, &mut rng) {
            let Some(delay) = step.next_in_ms else { break };
            let end = now + delay;
            while now < end {
                now += 33;
                gas.tick(now.min(end));
                assert!(gas.current_radius <= last + 1e-3, "grew {} -> {}", last, gas.current_radius);
                last = gas.current_radius;
            }
        }
        assert_eq!(gas.stage, GAS_STAGES.len() - 1);
        assert!(gas.current_radius < 1e-3);
    }

    #[test]
    fn test_zero_radius_waiting_keeps_center() {
        let stages = vec![
            stage(Inactive, 0.0, 0.5, 0.5, 0.0, false),
            stage(Waiting, 5.0, 0.5, 0.2, 0.0, false),
            stage(Advancing, 5.0, 0.5, 0.2, 1.0, false),
            stage(Waiting, 5.0, 0.2, 0.0, 1.0, false),
            stage(Advancing, 5.0, 0.2, 0.0, 2.0, false),
        ];
        let mut gas = Gas::with_stages(512.0, 512.0, &config(GasMode::Normal), stages);
        let mut rng = Pcg32::seed_from_u64(5);
        gas.advance(0, &mut rng);
        gas.advance(5000, &mut rng);
        gas.tick(10_000);
        let settled = gas.new_position;
        assert_eq!(gas.current_position, settled);

        gas.advance(10_000, &mut rng);
        assert_eq!(gas.state, Waiting);
        assert_eq!(gas.new_position, settled);
        assert_eq!(gas.current_position, settled);

        gas.advance(15_000, &mut rng);
        gas.tick(17_500);
        assert_eq!(gas.current_position, settled);
    }

    #[test]
    fn test_damage_pulse_every_interval() {
        let mut gas = Gas::new(512.0, 512.0, &config(GasMode::Debug));
        let mut rng = Pcg32::seed_from_u64(1);
        gas.advance(0, &mut rng);
        let pulses = (1..=90).filter(|t| {
            gas.tick(t * 33);
            gas.damage_pulse
        });
        assert_eq!(pulses.count(), 3);
    }

    #[test]
    fn test_debug_mode_overrides_duration_and_center() {
        let mut gas = Gas::new(512.0, 512.0, &config(GasMode::Debug));
        let mut rng = Pcg32::seed_from_u64(1);
        let step = gas.advance(0, &mut rng).unwrap();
        assert_eq!(step.next_in_ms, Some(2000));
        assert_eq!(gas.new_position, Vec2::splat(256.0));
    }

    #[test]
    fn test_disabled_never_advances() {
        let mut gas = Gas::new(512.0, 512.0, &config(GasMode::Disabled));
        assert!(gas.advance(0, &mut Pcg32::seed_from_u64(1)).is_none());
        assert_eq!(gas.state, Inactive);
    }

    #[test]
    fn test_in_gas_boundary() {
        let mut gas = Gas::new(100.0, 100.0, &config(GasMode::Normal));
        gas.current_position = Vec2::ZERO;
        gas.current_radius = 10.0;
        assert!(!gas.is_in_gas(Vec2::new(9.99, 0.0)));
        assert!(gas.is_in_gas(Vec2::new(10.0, 0.0)));
    }
}
