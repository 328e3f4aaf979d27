//! Operative roster and anomaly profiles handed to a mission at reset.

use serde::{Deserialize, Serialize};

use crate::rng::Rng;
use crate::types::{AnomalyStats, Attributes};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Leader,
    Scout,
    Medic,
    Breacher,
    Sniper,
    Tech,
}

pub const SQUAD_ROLES: [Role; 6] = [
    Role::Leader,
    Role::Scout,
    Role::Medic,
    Role::Breacher,
    Role::Sniper,
    Role::Tech,
];

const SQUAD_NAMES: [&str; 6] = ["Vega", "Kline", "Mori", "Ash", "Rook", "Silva"];

const ANOMALY_CODES: [&str; 5] = ["SCP-███", "SCP-Δ13", "SCP-2470", "SCP-Ω9", "SCP-██-K"];

const ATTRIBUTE_JITTER: i32 = 4;

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::Leader => "Leader",
            Role::Scout => "Scout",
            Role::Medic => "Medic",
            Role::Breacher => "Breacher",
            Role::Sniper => "Sniper",
            Role::Tech => "Tech",
        }
    }

    /// Baseline attribute spread before per-operative jitter.
    pub fn template(self) -> Attributes {
        let a = |speed, perception, tactics, aim, endurance, courage, medical, containment| {
            Attributes {
                speed,
                perception,
                tactics,
                aim,
                endurance,
                courage,
                medical,
                containment,
            }
        };
        match self {
            Role::Leader => a(10, 12, 16, 12, 12, 16, 6, 12),
            Role::Scout => a(16, 17, 10, 10, 10, 12, 5, 10),
            Role::Medic => a(10, 12, 10, 8, 12, 12, 18, 10),
            Role::Breacher => a(11, 10, 12, 12, 17, 13, 6, 14),
            Role::Sniper => a(10, 16, 10, 18, 9, 11, 4, 9),
            Role::Tech => a(9, 11, 14, 10, 10, 10, 8, 16),
        }
    }

    pub fn weapon(self) -> WeaponKind {
        match self {
            Role::Leader => WeaponKind::Rifle,
            Role::Scout => WeaponKind::Smg,
            Role::Medic => WeaponKind::Pistol,
            Role::Breacher => WeaponKind::Shotgun,
            Role::Sniper => WeaponKind::Sniper,
            Role::Tech => WeaponKind::Carbine,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeaponKind {
    Rifle,
    Smg,
    Shotgun,
    Sniper,
    Carbine,
    Pistol,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeaponProfile {
    pub name: String,
    #[serde(rename = "damageMin")]
    pub damage_min: f32,
    #[serde(rename = "damageMax")]
    pub damage_max: f32,
    pub range: i32,
    /// Shots per second.
    #[serde(rename = "fireRate")]
    pub fire_rate: f32,
    pub accuracy: f32,
    #[serde(rename = "magazineSize")]
    pub magazine_size: u32,
    #[serde(rename = "reloadTime")]
    pub reload_time: f32,
}

impl WeaponKind {
    pub fn profile(self) -> WeaponProfile {
        let (name, damage_min, damage_max, range, fire_rate, accuracy, magazine_size, reload_time) =
            match self {
                WeaponKind::Rifle => ("Rifle", 10.0, 16.0, 9, 3.0, 0.62, 30, 1.9),
                WeaponKind::Smg => ("SMG", 7.0, 12.0, 7, 5.2, 0.50, 28, 1.7),
                WeaponKind::Shotgun => ("Shotgun", 14.0, 24.0, 4, 1.4, 0.56, 6, 2.3),
                WeaponKind::Sniper => ("Sniper", 18.0, 32.0, 13, 0.9, 0.78, 5, 2.5),
                WeaponKind::Carbine => ("Carbine", 9.0, 14.0, 8, 3.6, 0.58, 25, 1.8),
                WeaponKind::Pistol => ("Pistol", 6.0, 10.0, 6, 2.2, 0.46, 12, 1.5),
            };
        WeaponProfile {
            name: name.to_string(),
            damage_min,
            damage_max,
            range,
            fire_rate,
            accuracy,
            magazine_size,
            reload_time,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    pub role: String,
    pub attributes: Attributes,
    pub weapon: WeaponProfile,
}

impl RosterEntry {
    pub fn from_role(name: &str, role: Role, attributes: Attributes) -> Self {
        Self {
            name: name.to_string(),
            role: role.label().to_string(),
            attributes: attributes.clamped(),
            weapon: role.weapon().profile(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnomalyProfile {
    pub code: String,
    pub stats: AnomalyStats,
}

fn jitter(rng: &mut Rng, base: u8) -> u8 {
    (i32::from(base) + rng.int(-ATTRIBUTE_JITTER, ATTRIBUTE_JITTER)).clamp(0, 20) as u8
}

/// Six-operative squad, one per role, with every template attribute jittered
/// by up to ±4.
pub fn default_squad(rng: &mut Rng) -> Vec<RosterEntry> {
    SQUAD_ROLES
        .iter()
        .zip(SQUAD_NAMES)
        .map(|(role, name)| {
            let t = role.template();
            let attributes = Attributes {
                speed: jitter(rng, t.speed),
                perception: jitter(rng, t.perception),
                tactics: jitter(rng, t.tactics),
                aim: jitter(rng, t.aim),
                endurance: jitter(rng, t.endurance),
                courage: jitter(rng, t.courage),
                medical: jitter(rng, t.medical),
                containment: jitter(rng, t.containment),
            };
            RosterEntry::from_role(name, *role, attributes)
        })
        .collect()
}

pub fn roll_anomaly(rng: &mut Rng) -> AnomalyProfile {
    let code = ANOMALY_CODES[rng.pick_index(ANOMALY_CODES.len())].to_string();
    let mut roll = |lo: i32, hi: i32| rng.int(lo, hi) as u8;
    let stats = AnomalyStats {
        threat: roll(8, 18),
        speed: roll(8, 18),
        stealth: roll(6, 18),
        aggression: roll(8, 18),
        resilience: roll(8, 18),
    };
    AnomalyProfile { code, stats }
}
