//! Combat and containment odds. Everything here is a pure function of its
//! inputs; rolls happen in the callers.

use crate::constants::{
    ATTRIBUTE_MAX, CONTAINMENT_CHANCE_MAX, CONTAINMENT_CHANCE_MIN, IMMOBILIZED_CONTAINMENT_BONUS,
};
use crate::roster::WeaponProfile;

fn ratio(attr: u8) -> f32 {
    f32::from(attr) / ATTRIBUTE_MAX
}

pub fn fire_cooldown(weapon: &WeaponProfile) -> f32 {
    1.0 / weapon.fire_rate.max(0.2)
}

/// Squad shot against the anomaly at Manhattan distance `distance`.
pub fn operative_hit_chance(
    weapon: &WeaponProfile,
    aim: u8,
    injured: bool,
    distance: i32,
    cover: f32,
    stealth: u8,
) -> f32 {
    let d = distance.max(1) as f32;
    let falloff = (1.0 - d / (weapon.range as f32 + 2.0) * 0.35).clamp(0.55, 1.0);
    let mut base = weapon.accuracy * (0.55 + 0.45 * ratio(aim));
    if injured {
        base *= 0.78;
    }
    let stealth_pen = ratio(stealth) * (0.06 + 0.02 * d);
    (base * falloff - cover - stealth_pen).clamp(0.05, 0.88)
}

/// `roll` is uniform in [0, 1).
pub fn shot_damage(weapon: &WeaponProfile, tactics: u8, roll: f32) -> f32 {
    let raw = weapon.damage_min + (weapon.damage_max - weapon.damage_min) * roll;
    raw * (0.92 + 0.16 * ratio(tactics))
}

pub fn stability_loss_on_hit(damage: f32) -> f32 {
    3.0 + damage * 0.15
}

#[derive(Clone, Copy, Debug)]
pub struct ContainmentInputs {
    pub containment: u8,
    pub kit_integrity: f32,
    pub stability: f32,
    /// Active operatives adjacent to the anomaly, including the attempter.
    pub adjacent: usize,
    pub immobilized: bool,
    pub resilience: u8,
}

pub fn containment_skill(containment: u8, kit_integrity: f32) -> f32 {
    ratio(containment) * (0.55 + 0.45 * (kit_integrity / 100.0))
}

pub fn containment_chance(inputs: ContainmentInputs) -> f32 {
    let skill = containment_skill(inputs.containment, inputs.kit_integrity);
    let stability_factor = 1.0 - inputs.stability / 100.0;
    let team_factor = 1.0 + (inputs.adjacent.max(1) - 1) as f32 * 0.35;
    let imm = if inputs.immobilized {
        IMMOBILIZED_CONTAINMENT_BONUS
    } else {
        1.0
    };
    let chance = (0.05 + 0.35 * skill)
        * (0.35 + 0.65 * stability_factor)
        * team_factor
        * imm
        * (1.0 - 0.45 * ratio(inputs.resilience));
    chance.clamp(CONTAINMENT_CHANCE_MIN, CONTAINMENT_CHANCE_MAX)
}

pub fn backlash_chance(threat: u8) -> f32 {
    0.20 + 0.35 * ratio(threat)
}

pub fn suppression_chance(aim: u8, injured: bool) -> f32 {
    let base = 0.25 + 0.55 * ratio(aim);
    if injured {
        base * 0.75
    } else {
        base
    }
}

pub fn suppression_pressure(aim: u8) -> f32 {
    4.0 + 10.0 * ratio(aim)
}

pub fn anomaly_attack_gate(aggro: f32) -> f32 {
    0.35 + (aggro / 100.0) * 0.55
}

/// `bonus` is uniform in [0, 6).
pub fn melee_damage(threat: u8, stability: f32, bonus: f32) -> f32 {
    let lethality = (9.0 + ratio(threat) * 20.0) * (0.85 + 0.15 * (stability / 100.0));
    lethality + bonus
}

pub fn ranged_hit_chance(threat: u8, cover: f32, courage: u8) -> f32 {
    let base = (0.35 + ratio(threat) * 0.35 - cover) * (0.85 + 0.15 * (1.0 - ratio(courage)));
    base.clamp(0.08, 0.75)
}

/// `bonus` is uniform in [0, 6).
pub fn ranged_damage(threat: u8, bonus: f32) -> f32 {
    7.0 + ratio(threat) * 16.0 + bonus
}

pub fn near_miss_panic(courage: u8) -> f32 {
    6.0 * (1.1 - ratio(courage))
}

/// Low courage turns damage into more panic.
pub fn panic_gain(amount: f32, courage: u8) -> f32 {
    amount * (1.2 - ratio(courage))
}

pub fn panic_decay(dt: f32, courage: u8) -> f32 {
    dt * (8.0 + 12.0 * ratio(courage))
}

pub fn flee_chance(panic: f32, courage: u8) -> f32 {
    (0.15 + (panic - 65.0) / 100.0) * (1.0 - ratio(courage))
}

pub fn heal_rate(medical: u8) -> f32 {
    2.0 + 8.0 * ratio(medical)
}

pub fn observation_chance(stealth: u8) -> f32 {
    0.90 - ratio(stealth) * 0.20
}

pub fn stability_regen(dt: f32, resilience: u8) -> f32 {
    dt * (2.0 + 5.0 * ratio(resilience))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::WeaponKind;

    fn inputs() -> ContainmentInputs {
        ContainmentInputs {
            containment: 12,
            kit_integrity: 100.0,
            stability: 50.0,
            adjacent: 1,
            immobilized: false,
            resilience: 10,
        }
    }

    #[test]
    fn containment_chance_is_clamped_at_both_ends() {
        let hopeless = ContainmentInputs {
            containment: 0,
            kit_integrity: 0.0,
            stability: 100.0,
            resilience: 20,
            ..inputs()
        };
        assert_eq!(containment_chance(hopeless), CONTAINMENT_CHANCE_MIN);

        let ideal = ContainmentInputs {
            containment: 20,
            kit_integrity: 100.0,
            stability: 0.0,
            adjacent: 6,
            immobilized: true,
            resilience: 0,
        };
        assert_eq!(containment_chance(ideal), CONTAINMENT_CHANCE_MAX);
    }

    #[test]
    fn immobilization_and_teammates_raise_odds() {
        let solo = containment_chance(inputs());
        let pinned = containment_chance(ContainmentInputs {
            immobilized: true,
            ..inputs()
        });
        let team = containment_chance(ContainmentInputs {
            adjacent: 3,
            ..inputs()
        });
        assert!(pinned > solo);
        assert!(team > solo);
    }

    #[test]
    fn worn_kit_lowers_containment_skill() {
        assert!(containment_skill(15, 20.0) < containment_skill(15, 100.0));
    }

    #[test]
    fn hit_chance_stays_in_band_for_extreme_inputs() {
        let sniper = WeaponKind::Sniper.profile();
        let pistol = WeaponKind::Pistol.profile();
        assert_eq!(operative_hit_chance(&pistol, 0, true, 40, 0.22, 20), 0.05);
        let best = operative_hit_chance(&sniper, 20, false, 1, 0.0, 0);
        assert!(best <= 0.88 && best > 0.5);
    }

    #[test]
    fn shot_damage_respects_profile_range() {
        let rifle = WeaponKind::Rifle.profile();
        let low = shot_damage(&rifle, 0, 0.0);
        let high = shot_damage(&rifle, 20, 0.999);
        assert!((low - 10.0 * 0.92).abs() < 1e-4);
        assert!(high <= 16.0 * 1.08 + 1e-3);
    }

    #[test]
    fn ranged_hit_chance_is_clamped() {
        assert_eq!(ranged_hit_chance(0, 1.0, 20), 0.08);
        assert!(ranged_hit_chance(20, 0.0, 0) <= 0.75);
    }

    #[test]
    fn courage_dampens_panic_and_flight() {
        assert!(panic_gain(20.0, 20) < panic_gain(20.0, 0));
        assert!(flee_chance(90.0, 18) < flee_chance(90.0, 2));
        assert!(panic_decay(1.0, 20) > panic_decay(1.0, 0));
        assert!(flee_chance(65.0, 20) <= 0.0);
    }

    #[test]
    fn attack_gate_grows_with_aggro() {
        assert!((anomaly_attack_gate(0.0) - 0.35).abs() < 1e-6);
        assert!((anomaly_attack_gate(100.0) - 0.90).abs() < 1e-6);
    }
}
