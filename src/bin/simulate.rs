use chrono::{SecondsFormat, Utc};
use clap::Parser;
use containment_ops::config::{GeneratorKind, MissionConfig};
use containment_ops::constants::{BUILDING_COUNT, MAP_HEIGHT, MAP_WIDTH, TICK_RATE, TICK_SECS};
use containment_ops::engine::MissionEngine;
use containment_ops::server_utils::{
    normalize_building_count, normalize_deadline_secs, normalize_map_side,
};
use containment_ops::types::{MissionOutcome, Phase, RuntimeEvent, Snapshot};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

const MAX_RUNS: u32 = 500;
const TICK_LIMIT_GRACE_SECS: u64 = 5;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    runs: Option<u32>,
    #[arg(long)]
    minutes: Option<i64>,
    #[arg(long)]
    buildings: Option<i64>,
    #[arg(long)]
    width: Option<i64>,
    #[arg(long)]
    height: Option<i64>,
    #[arg(long)]
    cave: bool,
    #[arg(long)]
    max_ticks: Option<u64>,
    #[arg(long)]
    run_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug)]
struct MissionRun {
    seed: u64,
    config: MissionConfig,
    max_ticks: u64,
}

#[derive(Clone, Debug, Serialize)]
struct MissionResultLine {
    seed: u64,
    outcome: Option<MissionOutcome>,
    phase: Phase,
    #[serde(rename = "durationSecs")]
    duration_secs: f32,
    ticks: u64,
    survivors: usize,
    kia: usize,
    #[serde(rename = "containmentAttempts")]
    containment_attempts: u32,
    #[serde(rename = "shotsFired")]
    shots_fired: u32,
    #[serde(rename = "shotsHit")]
    shots_hit: u32,
    sightings: u32,
    #[serde(rename = "fleeEvents")]
    flee_events: u32,
    violations: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct ViolationRecord {
    tick: u64,
    message: String,
}

#[derive(Clone, Debug)]
struct MissionRunResult {
    result: MissionResultLine,
    violation_records: Vec<ViolationRecord>,
    tick_limit_hit: bool,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "runId")]
    run_id: String,
    #[serde(rename = "startedAt")]
    started_at: String,
    #[serde(rename = "finishedAt")]
    finished_at: String,
    #[serde(rename = "missionCount")]
    mission_count: usize,
    #[serde(rename = "violationCount")]
    violation_count: usize,
    #[serde(rename = "averageDurationSecs")]
    average_duration_secs: f32,
    #[serde(rename = "outcomeCounts")]
    outcome_counts: BTreeMap<String, usize>,
    missions: Vec<MissionResultLine>,
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine {
    timestamp: String,
    level: String,
    event: String,
    #[serde(rename = "runId")]
    run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tick: Option<u64>,
    details: Value,
}

fn main() {
    let cli = Cli::parse();
    let runs = resolve_runs(&cli);
    let started_at = now_rfc3339();
    let seed_hint = runs.first().map(|run| run.seed).unwrap_or(0);
    let run_id = cli
        .run_id
        .clone()
        .unwrap_or_else(|| default_run_id(seed_hint, Utc::now().timestamp_millis()));
    let mut failed = false;
    let mut results = Vec::new();
    let mut outcome_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_duration_secs = 0.0f32;
    let mut total_violations = 0usize;

    for run in runs {
        emit_log(
            "info",
            "mission_started",
            &run_id,
            Some(run.seed),
            None,
            json!({
                "width": run.config.map_width,
                "height": run.config.map_height,
                "buildings": run.config.building_count,
                "generator": run.config.generator,
                "deadlineSecs": run.config.deadline_secs,
            }),
        );
        let mission = match run_mission(&run) {
            Ok(mission) => mission,
            Err(error) => {
                emit_log(
                    "error",
                    "mission_rejected",
                    &run_id,
                    Some(run.seed),
                    None,
                    json!({ "error": error }),
                );
                failed = true;
                continue;
            }
        };

        for violation in &mission.violation_records {
            emit_log(
                "warn",
                "violation_detected",
                &run_id,
                Some(run.seed),
                Some(violation.tick),
                json!({ "message": violation.message }),
            );
        }
        if mission.tick_limit_hit {
            emit_log(
                "error",
                "tick_limit_exceeded",
                &run_id,
                Some(run.seed),
                Some(mission.result.ticks),
                json!({ "maxTicks": run.max_ticks }),
            );
        }
        if mission.tick_limit_hit || !mission.result.violations.is_empty() {
            failed = true;
        }
        total_violations += mission.violation_records.len();
        total_duration_secs += mission.result.duration_secs;
        *outcome_counts
            .entry(outcome_key(mission.result.outcome))
            .or_insert(0) += 1;

        emit_log(
            "info",
            "mission_finished",
            &run_id,
            Some(run.seed),
            Some(mission.result.ticks),
            json!({
                "outcome": mission.result.outcome,
                "durationSecs": mission.result.duration_secs,
                "survivors": mission.result.survivors,
                "violationCount": mission.violation_records.len(),
            }),
        );

        match serde_json::to_string(&mission.result) {
            Ok(line) => println!("{line}"),
            Err(error) => eprintln!("[simulate] result serialization failed: {error}"),
        }
        results.push(mission.result);
    }

    let summary = build_run_summary(
        run_id.clone(),
        started_at,
        now_rfc3339(),
        results,
        outcome_counts,
        total_violations,
        total_duration_secs,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                "error",
                "summary_write_failed",
                &run_id,
                None,
                None,
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        "info",
        "run_finished",
        &run_id,
        None,
        None,
        json!({
            "missionCount": summary.mission_count,
            "violationCount": summary.violation_count,
            "averageDurationSecs": summary.average_duration_secs,
            "outcomeCounts": summary.outcome_counts,
            "summaryOut": summary_out_written,
        }),
    );

    if failed {
        std::process::exit(1);
    }
}

fn run_mission(run: &MissionRun) -> Result<MissionRunResult, String> {
    let mut engine = MissionEngine::new(Vec::new(), run.seed, run.config.clone())
        .map_err(|error| error.to_string())?;

    let mut violations = Vec::new();
    let mut violation_records = Vec::new();
    let mut violation_seen = HashSet::new();
    let mut sightings = 0;
    let mut flee_events = 0;
    let mut previous_phase = engine.phase();
    let mut tick_limit_hit = false;

    while !engine.is_ended() {
        engine.step(TICK_SECS);
        let snapshot = engine.build_snapshot(true);
        for message in collect_snapshot_violations(&snapshot, previous_phase) {
            push_violation(
                &mut violations,
                &mut violation_records,
                &mut violation_seen,
                snapshot.tick,
                message,
            );
        }
        previous_phase = snapshot.phase;

        for event in &snapshot.events {
            match event {
                RuntimeEvent::AnomalySighted { .. } => sightings += 1,
                RuntimeEvent::OperativeFled { .. } => flee_events += 1,
                _ => {}
            }
        }

        if snapshot.tick >= run.max_ticks && !engine.is_ended() {
            tick_limit_hit = true;
            break;
        }
    }

    let summary = engine.build_summary();
    Ok(MissionRunResult {
        result: MissionResultLine {
            seed: run.seed,
            outcome: summary.outcome,
            phase: summary.phase,
            duration_secs: (summary.duration_secs * 100.0).round() / 100.0,
            ticks: summary.ticks,
            survivors: summary.survivors,
            kia: summary.kia,
            containment_attempts: summary.containment_attempts,
            shots_fired: summary.shots_fired,
            shots_hit: summary.shots_hit,
            sightings,
            flee_events,
            violations,
        },
        violation_records,
        tick_limit_hit,
    })
}

fn phase_rank(phase: Phase) -> u8 {
    match phase {
        Phase::Operation => 0,
        Phase::Extraction => 1,
        Phase::Success | Phase::Failure => 2,
    }
}

fn collect_snapshot_violations(snapshot: &Snapshot, previous_phase: Phase) -> Vec<String> {
    let mut violations = Vec::new();
    if phase_rank(snapshot.phase) < phase_rank(previous_phase) {
        violations.push(format!(
            "phase moved backwards: {previous_phase:?} -> {:?}",
            snapshot.phase
        ));
    }
    if snapshot.phase.is_terminal() != snapshot.outcome.is_some() {
        violations.push(format!(
            "outcome {:?} does not match phase {:?}",
            snapshot.outcome, snapshot.phase
        ));
    }

    for op in &snapshot.operatives {
        if !(0.0..=op.hp_max).contains(&op.hp) {
            violations.push(format!("operative hp out of range: {} {}/{}", op.name, op.hp, op.hp_max));
        }
        if !(0.0..=100.0).contains(&op.panic) || !(0.0..=100.0).contains(&op.kit_integrity) {
            violations.push(format!("operative meter out of range: {}", op.name));
        }
        if !op.alive && !op.incapacitated {
            violations.push(format!("dead operative still active: {}", op.name));
        }
        if op.ammo > op.magazine_size {
            violations.push(format!("ammo above magazine size: {}", op.name));
        }
    }

    if let Some(anomaly) = &snapshot.anomaly {
        if !(0.0..=100.0).contains(&anomaly.stability) || !(0.0..=100.0).contains(&anomaly.aggro) {
            violations.push(format!("anomaly meter out of range: {}", anomaly.code));
        }
    }
    violations
}

fn resolve_runs(cli: &Cli) -> Vec<MissionRun> {
    let seed = cli.seed.unwrap_or_else(|| Utc::now().timestamp_millis() as u64);
    let count = cli.runs.unwrap_or(1).clamp(1, MAX_RUNS);
    let config = MissionConfig {
        map_width: normalize_map_side(cli.width, MAP_WIDTH),
        map_height: normalize_map_side(cli.height, MAP_HEIGHT),
        building_count: normalize_building_count(cli.buildings, BUILDING_COUNT),
        generator: if cli.cave {
            GeneratorKind::Cave
        } else {
            GeneratorKind::Facility
        },
        deadline_secs: normalize_deadline_secs(cli.minutes.map(|minutes| minutes.saturating_mul(60))),
        ..MissionConfig::default()
    };
    let max_ticks = cli
        .max_ticks
        .unwrap_or_else(|| default_max_ticks(config.deadline_secs));

    (0..u64::from(count))
        .map(|offset| MissionRun {
            seed: seed.wrapping_add(offset),
            config: config.clone(),
            max_ticks,
        })
        .collect()
}

/// Every mission ends by its deadline; the limit only trips on a stuck clock.
fn default_max_ticks(deadline_secs: f32) -> u64 {
    (deadline_secs.ceil() as u64 + TICK_LIMIT_GRACE_SECS) * u64::from(TICK_RATE)
}

fn push_violation(
    violations: &mut Vec<String>,
    violation_records: &mut Vec<ViolationRecord>,
    violation_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    violation_records.push(ViolationRecord {
        tick,
        message: message.clone(),
    });
    if violation_seen.insert(message.clone()) {
        violations.push(message);
    }
}

fn default_run_id(seed: u64, timestamp_ms: i64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn outcome_key(outcome: Option<MissionOutcome>) -> String {
    outcome
        .map(MissionOutcome::key)
        .unwrap_or("unfinished")
        .to_string()
}

fn build_run_summary(
    run_id: String,
    started_at: String,
    finished_at: String,
    missions: Vec<MissionResultLine>,
    outcome_counts: BTreeMap<String, usize>,
    violation_count: usize,
    total_duration_secs: f32,
) -> RunSummary {
    let mission_count = missions.len();
    let average_duration_secs = if mission_count == 0 {
        0.0
    } else {
        total_duration_secs / mission_count as f32
    };
    RunSummary {
        run_id,
        started_at,
        finished_at,
        mission_count,
        violation_count,
        average_duration_secs,
        outcome_counts,
        missions,
    }
}

fn emit_log(
    level: &str,
    event: &str,
    run_id: &str,
    seed: Option<u64>,
    tick: Option<u64>,
    details: Value,
) {
    let log_line = StructuredLogLine {
        timestamp: now_rfc3339(),
        level: level.to_string(),
        event: event.to_string(),
        run_id: run_id.to_string(),
        seed,
        tick,
        details,
    };
    match serde_json::to_string(&log_line) {
        Ok(line) => eprintln!("{line}"),
        Err(error) => eprintln!("[simulate] log serialization failed: {error}"),
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_result(outcome: MissionOutcome, duration_secs: f32) -> MissionResultLine {
        MissionResultLine {
            seed: 42,
            outcome: Some(outcome),
            phase: outcome.phase(),
            duration_secs,
            ticks: (duration_secs * TICK_RATE as f32) as u64,
            survivors: 4,
            kia: 2,
            containment_attempts: 3,
            shots_fired: 40,
            shots_hit: 12,
            sightings: 1,
            flee_events: 0,
            violations: Vec::new(),
        }
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("simulate").chain(args.iter().copied()))
    }

    #[test]
    fn default_run_id_contains_seed_and_timestamp() {
        assert_eq!(default_run_id(42, 123456789), "sim-42-123456789");
    }

    #[test]
    fn build_run_summary_calculates_average_duration() {
        let summary = build_run_summary(
            "sim-42-1".to_string(),
            "a".to_string(),
            "b".to_string(),
            vec![
                make_result(MissionOutcome::Timeout, 60.0),
                make_result(MissionOutcome::Contained, 90.0),
            ],
            BTreeMap::from([
                ("timeout".to_string(), 1usize),
                ("contained".to_string(), 1usize),
            ]),
            0,
            150.0,
        );
        assert_eq!(summary.average_duration_secs, 75.0);
        assert_eq!(summary.mission_count, 2);
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let target = std::env::temp_dir()
            .join(format!("containment-ops-missing-{}", Utc::now().timestamp_millis()))
            .join("summary.json");
        let summary = build_run_summary(
            "sim-1-1".to_string(),
            "a".to_string(),
            "b".to_string(),
            vec![make_result(MissionOutcome::Timeout, 60.0)],
            BTreeMap::from([("timeout".to_string(), 1usize)]),
            0,
            60.0,
        );
        assert!(write_summary(&target, &summary).is_err());
    }

    #[test]
    fn runs_use_consecutive_seeds_and_clamped_flags() {
        let runs = resolve_runs(&cli(&[
            "--seed", "10", "--runs", "3", "--buildings", "99", "--width", "2", "--cave",
        ]));
        let seeds: Vec<u64> = runs.iter().map(|run| run.seed).collect();
        assert_eq!(seeds, vec![10, 11, 12]);
        assert_eq!(runs[0].config.building_count, 32);
        assert_eq!(runs[0].config.map_width, 6);
        assert_eq!(runs[0].config.generator, GeneratorKind::Cave);
        assert!(runs[0].config.validate().is_ok());
    }

    #[test]
    fn default_tick_limit_leaves_room_past_the_deadline() {
        let runs = resolve_runs(&cli(&["--seed", "1", "--minutes", "2"]));
        assert_eq!(runs[0].config.deadline_secs, 120.0);
        assert_eq!(runs[0].max_ticks, 125 * u64::from(TICK_RATE));
    }

    #[test]
    fn short_mission_runs_to_an_outcome() {
        let runs = resolve_runs(&cli(&["--seed", "5", "--minutes", "1", "--width", "30", "--height", "20"]));
        let mission = run_mission(&runs[0]).expect("valid config");
        assert!(!mission.tick_limit_hit);
        assert!(mission.result.outcome.is_some());
        assert!(mission.result.violations.is_empty(), "{:?}", mission.result.violations);
    }

    #[test]
    fn push_violation_keeps_records_and_deduplicates_messages() {
        let mut violations = Vec::new();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        push_violation(&mut violations, &mut records, &mut seen, 10, "same".to_string());
        push_violation(&mut violations, &mut records, &mut seen, 11, "same".to_string());
        assert_eq!(violations.len(), 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].tick, 11);
    }

    #[test]
    fn unfinished_outcome_has_its_own_key() {
        assert_eq!(outcome_key(None), "unfinished");
        assert_eq!(outcome_key(Some(MissionOutcome::SquadLost)), "squad_lost");
    }
}
