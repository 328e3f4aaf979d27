//! Behavior selection as explicit transition tables. The first row whose
//! condition holds wins, so row order is the priority order.

use crate::types::Behavior;

/// What an operative knows when it re-plans.
#[derive(Clone, Copy, Debug, Default)]
pub struct OperativeFacts {
    pub alive: bool,
    pub fleeing: bool,
    pub retreat_ordered: bool,
    pub extraction_phase: bool,
    pub has_manual_target: bool,
    /// Injured and a qualifying healer exists but is not adjacent.
    pub needs_medic: bool,
    pub anomaly_reported: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperativeCondition {
    Down,
    Panicked,
    Withdrawing,
    Waypoint,
    NeedsMedic,
    LeadOnAnomaly,
    Always,
}

impl OperativeCondition {
    pub fn holds(self, facts: &OperativeFacts) -> bool {
        match self {
            OperativeCondition::Down => !facts.alive,
            OperativeCondition::Panicked => facts.fleeing,
            OperativeCondition::Withdrawing => facts.retreat_ordered || facts.extraction_phase,
            OperativeCondition::Waypoint => facts.has_manual_target,
            OperativeCondition::NeedsMedic => facts.needs_medic,
            OperativeCondition::LeadOnAnomaly => facts.anomaly_reported,
            OperativeCondition::Always => true,
        }
    }
}

pub const OPERATIVE_TRANSITIONS: [(OperativeCondition, Behavior); 7] = [
    (OperativeCondition::Down, Behavior::Dead),
    (OperativeCondition::Panicked, Behavior::Flee),
    (OperativeCondition::Withdrawing, Behavior::Extract),
    (OperativeCondition::Waypoint, Behavior::Manual),
    (OperativeCondition::NeedsMedic, Behavior::Regroup),
    (OperativeCondition::LeadOnAnomaly, Behavior::Chase),
    (OperativeCondition::Always, Behavior::Search),
];

pub fn next_operative_behavior(facts: &OperativeFacts) -> Behavior {
    OPERATIVE_TRANSITIONS
        .iter()
        .find(|(condition, _)| condition.holds(facts))
        .map(|(_, behavior)| *behavior)
        .unwrap_or(Behavior::Search)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnomalyMode {
    Dormant,
    Evade,
    SlipAway,
    Roam,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AnomalyFacts {
    pub contained: bool,
    pub observed: bool,
    /// Unseen for more than half the escape threshold and the drift roll hit.
    pub drift_window: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnomalyCondition {
    Contained,
    Observed,
    DriftWindow,
    Always,
}

impl AnomalyCondition {
    pub fn holds(self, facts: &AnomalyFacts) -> bool {
        match self {
            AnomalyCondition::Contained => facts.contained,
            AnomalyCondition::Observed => facts.observed,
            AnomalyCondition::DriftWindow => facts.drift_window,
            AnomalyCondition::Always => true,
        }
    }
}

pub const ANOMALY_TRANSITIONS: [(AnomalyCondition, AnomalyMode); 4] = [
    (AnomalyCondition::Contained, AnomalyMode::Dormant),
    (AnomalyCondition::Observed, AnomalyMode::Evade),
    (AnomalyCondition::DriftWindow, AnomalyMode::SlipAway),
    (AnomalyCondition::Always, AnomalyMode::Roam),
];

pub fn next_anomaly_mode(facts: &AnomalyFacts) -> AnomalyMode {
    ANOMALY_TRANSITIONS
        .iter()
        .find(|(condition, _)| condition.holds(facts))
        .map(|(_, mode)| *mode)
        .unwrap_or(AnomalyMode::Roam)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alive() -> OperativeFacts {
        OperativeFacts {
            alive: true,
            ..OperativeFacts::default()
        }
    }

    #[test]
    fn idle_operative_searches() {
        assert_eq!(next_operative_behavior(&alive()), Behavior::Search);
    }

    #[test]
    fn retreat_beats_waypoint_and_sighting() {
        let facts = OperativeFacts {
            retreat_ordered: true,
            has_manual_target: true,
            anomaly_reported: true,
            ..alive()
        };
        assert_eq!(next_operative_behavior(&facts), Behavior::Extract);
    }

    #[test]
    fn waypoint_beats_regroup_which_beats_chase() {
        let facts = OperativeFacts {
            has_manual_target: true,
            needs_medic: true,
            anomaly_reported: true,
            ..alive()
        };
        assert_eq!(next_operative_behavior(&facts), Behavior::Manual);
        let facts = OperativeFacts {
            has_manual_target: false,
            ..facts
        };
        assert_eq!(next_operative_behavior(&facts), Behavior::Regroup);
        let facts = OperativeFacts {
            needs_medic: false,
            ..facts
        };
        assert_eq!(next_operative_behavior(&facts), Behavior::Chase);
    }

    #[test]
    fn dead_and_fleeing_take_priority() {
        let facts = OperativeFacts {
            alive: false,
            fleeing: true,
            ..OperativeFacts::default()
        };
        assert_eq!(next_operative_behavior(&facts), Behavior::Dead);
        let facts = OperativeFacts {
            fleeing: true,
            has_manual_target: true,
            ..alive()
        };
        assert_eq!(next_operative_behavior(&facts), Behavior::Flee);
    }

    #[test]
    fn anomaly_modes_follow_priority() {
        let mut facts = AnomalyFacts {
            contained: true,
            observed: true,
            drift_window: true,
        };
        assert_eq!(next_anomaly_mode(&facts), AnomalyMode::Dormant);
        facts.contained = false;
        assert_eq!(next_anomaly_mode(&facts), AnomalyMode::Evade);
        facts.observed = false;
        assert_eq!(next_anomaly_mode(&facts), AnomalyMode::SlipAway);
        facts.drift_window = false;
        assert_eq!(next_anomaly_mode(&facts), AnomalyMode::Roam);
    }
}
