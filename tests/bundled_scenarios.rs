//! ---
//! mvcc_section: "08-testing"
//! mvcc_subsection: "integration-tests"
//! mvcc_type: "source"
//! mvcc_scope: "test"
//! mvcc_description: "Every bundled scenario played end to end against recording sessions."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use mvcc_common::{Dialect, RunnerConfig, SlotLayout};
use mvcc_core::{ScenarioRunner, ScheduledAction};
use mvcc_scenario::{list_tests, parse};
use mvcc_testharness::{Event, RecordingHost, StaticProbe};

const DIALECTS: [Dialect; 4] = [
    Dialect::Oracle,
    Dialect::Mysql,
    Dialect::Postgres,
    Dialect::Sqlserver,
];

fn workspace_path(path: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join(path)
}

fn read(path: &str) -> String {
    let full = workspace_path(path);
    fs::read_to_string(&full)
        .unwrap_or_else(|err| panic!("failed to read {}: {}", full.display(), err))
}

#[tokio::test(start_paused = true)]
async fn every_bundled_test_plays_through_prepared_sessions() {
    let raw = read("scenarios/mvcc_tests.yml");
    let path = workspace_path("scenarios/mvcc_tests.yml");

    for dialect in DIALECTS {
        let profile = dialect.profile();
        for test in list_tests(&raw, dialect).unwrap() {
            let expected = parse(&raw, dialect, &test.id).unwrap().scenario;
            let runner = ScenarioRunner::new(
                RunnerConfig::default(),
                RecordingHost::connecting(dialect),
                StaticProbe(true),
            );

            let outcome = runner
                .run(dialect, &test.id, &path)
                .await
                .unwrap_or_else(|err| panic!("{dialect} {}: {err}", test.id));
            assert_eq!(outcome.comment, test.comment);
            assert_eq!(outcome.sessions, expected.session_count());

            let statements: Vec<&str> = expected
                .steps
                .iter()
                .flat_map(|step| step.statements.iter().map(String::as_str))
                .collect();
            let sent: Vec<&str> = outcome
                .transcript
                .sends()
                .into_iter()
                .map(|(_, statement)| statement)
                .collect();
            assert_eq!(sent, statements, "{dialect} {}", test.id);

            let recorder = runner.host().recorder();
            for session in 0..expected.session_count() {
                let inputs = recorder.inputs_for(session);
                let clears = inputs
                    .iter()
                    .filter(|text| *text == profile.clear_command)
                    .count();
                assert_eq!(clears, 1, "{dialect} {} session {session}", test.id);
            }
            assert!(recorder.contains(&Event::Attached));
        }
    }
}

#[tokio::test(start_paused = true)]
async fn read_only_anomaly_routes_by_layout() {
    let path = workspace_path("scenarios/mvcc_tests.yml");
    for (layout, expected) in [
        (SlotLayout::Direct, [0, 1, 2, 0]),
        (SlotLayout::Legacy, [2, 0, 1, 2]),
    ] {
        let config = RunnerConfig {
            slot_layout: layout,
            ..RunnerConfig::default()
        };
        let runner = ScenarioRunner::new(
            config,
            RecordingHost::connecting(Dialect::Postgres),
            StaticProbe(true),
        );
        let outcome = runner.run(Dialect::Postgres, "test3", &path).await.unwrap();

        let mut step_slots: Vec<usize> = Vec::new();
        let mut last_step = "";
        for action in &outcome.transcript.actions {
            if let ScheduledAction::Send { step, slot, .. } = action {
                if step != last_step {
                    step_slots.push(*slot);
                    last_step = step.as_str();
                }
            }
        }
        assert_eq!(step_slots, expected, "{layout:?}");
        assert_eq!(outcome.transcript.pauses(), 3);
    }
}

#[test]
fn example_configuration_is_valid() {
    let config: RunnerConfig = read("configs/mvcc-sim.toml").parse().unwrap();
    assert_eq!(config.scenario_path, Path::new("scenarios/mvcc_tests.yml"));
    assert_eq!(config.slot_layout, SlotLayout::Direct);
    assert!(config.teardown_on_failure);
}
