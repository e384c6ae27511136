//! ---
//! mvcc_section: "04-execution-engine"
//! mvcc_subsection: "tests"
//! mvcc_type: "source"
//! mvcc_scope: "test"
//! mvcc_description: "Session pool establishment order and schema initialization."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use mvcc_common::{Dialect, RunnerConfig, SlotLayout};
use mvcc_core::{CancelToken, ConnectError, PoolError, RunContext, SessionPool, SessionState};
use mvcc_scenario::TransactionTag;
use mvcc_testharness::{loaded, Behavior, Event, RecordingHost};

const INIT: &[&str] = &[
    "DROP TABLE IF EXISTS accounts;",
    "CREATE TABLE accounts (id INT, balance INT);",
    "COMMIT;",
];

const THREE_WAY: &[(&str, &[&str])] = &[
    ("step1_T1", &["BEGIN;"]),
    ("step2_T2", &["BEGIN;"]),
    ("step3_T3", &["BEGIN;"]),
];

fn context(dialect: Dialect, steps: &[(&str, &[&str])]) -> RunContext {
    RunContext::new(
        loaded(dialect, INIT, steps),
        RunnerConfig::default(),
        CancelToken::new(),
    )
}

fn pool_for(host: &RecordingHost, ctx: &RunContext) -> SessionPool {
    let count = ctx.scenario.session_count();
    SessionPool::new(
        host.handles(count),
        &ctx.scenario.transactions,
        ctx.config.slot_layout,
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn first_session_is_initialized_before_others_connect() {
    let ctx = context(Dialect::Postgres, THREE_WAY);
    let host = RecordingHost::connecting(Dialect::Postgres);
    let mut pool = pool_for(&host, &ctx);

    pool.establish(&ctx).await.unwrap();
    assert!(pool.all_connected());

    let recorder = host.recorder();
    let mut expected = vec![
        ctx.profile.connection_command(&ctx.connection),
        "\\set AUTOCOMMIT on".to_owned(),
    ];
    expected.extend(INIT.iter().map(|s| s.to_string()));
    expected.extend(["\\set AUTOCOMMIT off", "\\! clear", ""].map(String::from));
    assert_eq!(recorder.inputs_for(0), expected);

    let last_init = recorder
        .position(|event| {
            matches!(event, Event::Input { session: 0, text } if text.is_empty())
        })
        .unwrap();
    for other in [1, 2] {
        let first_touch = recorder
            .position(|event| match event {
                Event::Input { session, .. } | Event::Capture { session } => *session == other,
                _ => false,
            })
            .unwrap();
        assert!(first_touch > last_init, "session {other} touched before init finished");
        assert_eq!(
            recorder.inputs_for(other)[1..],
            ["\\set AUTOCOMMIT off", "\\! clear", ""].map(String::from)
        );
    }

    let connects: Vec<_> = recorder
        .inputs()
        .into_iter()
        .filter(|(_, text)| text.contains("psql"))
        .map(|(session, _)| session)
        .collect();
    assert_eq!(connects, [0, 1, 2]);
}

#[tokio::test(start_paused = true)]
async fn sqlserver_submits_each_init_statement_and_configures_snapshots() {
    let ctx = context(Dialect::Sqlserver, &THREE_WAY[..1]);
    let host = RecordingHost::connecting(Dialect::Sqlserver);
    let mut pool = pool_for(&host, &ctx);

    pool.establish(&ctx).await.unwrap();

    let inputs = host.recorder().inputs_for(0);
    assert_eq!(
        inputs[1..],
        [
            "SET IMPLICIT_TRANSACTIONS OFF",
            "DROP TABLE IF EXISTS accounts;",
            "GO",
            "CREATE TABLE accounts (id INT, balance INT);",
            "GO",
            "ALTER DATABASE mvcc SET READ_COMMITTED_SNAPSHOT ON;",
            "GO",
            "ALTER DATABASE mvcc SET ALLOW_SNAPSHOT_ISOLATION ON;",
            "GO",
            "SET IMPLICIT_TRANSACTIONS ON",
            ":RESET",
            "",
        ]
        .map(String::from)
    );

    let events = host.recorder().events();
    let isolation_at = events
        .iter()
        .find(|recorded| {
            matches!(&recorded.event, Event::Input { text, .. } if text.contains("READ_COMMITTED_SNAPSHOT"))
        })
        .map(|recorded| recorded.at)
        .unwrap();
    let timing = &ctx.config.timing;
    // one poll to connect, two submit pauses, then the isolation pause
    assert_eq!(
        isolation_at,
        timing.poll_interval + timing.init_submit_pause * 2 + timing.isolation_setup_pause
    );
}

#[tokio::test(start_paused = true)]
async fn connect_failure_aborts_and_leaves_sessions_open() {
    let ctx = context(Dialect::Mysql, THREE_WAY);
    let host = RecordingHost::scripted(
        vec![
            Behavior::prompt(Dialect::Mysql),
            Behavior::respond("ERROR 1045 (28000): Access denied for user 'tester'"),
        ],
        Behavior::prompt(Dialect::Mysql),
    );
    let mut pool = pool_for(&host, &ctx);

    let err = pool.establish(&ctx).await.unwrap_err();
    assert!(matches!(err, ConnectError::Authentication { .. }));

    let states: Vec<_> = pool.sessions().iter().map(|s| s.state()).collect();
    assert_eq!(
        states,
        [
            SessionState::Connected,
            SessionState::Failed,
            SessionState::Unconnected
        ]
    );
    let recorder = host.recorder();
    assert!(recorder.inputs_for(2).is_empty());
    assert!(!recorder.contains(&Event::Reset { session: 0 }));

    pool.teardown().await;
    for session in 0..3 {
        assert!(recorder.contains(&Event::Reset { session }));
    }
    assert!(pool
        .sessions()
        .iter()
        .all(|s| s.state() == SessionState::Unconnected));
}

#[test]
fn pool_size_must_match_transactions() {
    let host = RecordingHost::connecting(Dialect::Oracle);
    let tags = [TransactionTag::new("T1"), TransactionTag::new("T2")];

    let err = SessionPool::new(host.handles(3), &tags, SlotLayout::Direct).unwrap_err();
    assert_eq!(
        err,
        PoolError::SessionCount {
            transactions: 2,
            sessions: 3
        }
    );
    assert_eq!(
        SessionPool::new(Vec::new(), &[], SlotLayout::Direct).unwrap_err(),
        PoolError::Size(0)
    );

    let pool = SessionPool::new(host.handles(2), &tags, SlotLayout::Direct).unwrap();
    assert_eq!(pool.slot_for(&tags[1]), Some(1));
    assert_eq!(pool.session_for(&tags[0]).map(|s| s.slot()), Some(0));
    assert!(pool.slot_for(&TransactionTag::new("T9")).is_none());
}
