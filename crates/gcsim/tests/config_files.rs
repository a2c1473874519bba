//! Loading configuration files from disk

mod common;

use common::write_config;
use gcsim::{AllocType, Args, FlagArgs, SimError, SizeRange, TestKind};

const TEXT_CONFIG: &str = "\
; two buckets, graph objects
threadCount 2
verifyLiveSize true

[phase]
testKind time
allocType reference
totalLiveBytes 2000000
totalAllocBytes 2000000

[bucket]
sizeRange 100-1000
survInterval 3
weight 9

[bucket]
lowSize 8000
highSize 9000
survInterval 2
pinInterval 2
weight 1
";

#[test]
fn test_text_file_loads_and_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "workload.txt", TEXT_CONFIG);

    let args = Args::load_from_path(&path).unwrap();
    assert_eq!(args.thread_count, 2);
    assert_eq!(args.phases[0].alloc_type, AllocType::Reference);
    assert_eq!(args.phases[0].buckets.len(), 2);
    assert_eq!(args.phases[0].buckets[1].pin_interval, 2);

    let report = gcsim::run(&args, common::system_collector()).unwrap();
    assert_eq!(report.threads.len(), 2);
}

#[test]
fn test_text_file_matches_equivalent_flags() {
    let flags = FlagArgs {
        threads: Some(2),
        total_live_gb: 0.25,
        total_alloc_gb: Some(2.0),
        total_minutes: 1.5,
        test_kind: TestKind::Time,
        alloc_type: AllocType::Reference,
        soh_size_range: SizeRange::new(100, 2000),
        soh_surv_interval: 20,
        soh_finalizable_interval: 7,
        loh_size_range: SizeRange::new(100 * 1024, 200 * 1024),
        loh_surv_interval: 4,
        loh_pin_interval: 3,
        loh_finalizable_interval: 0,
        loh_alloc_ratio: 50,
        poh_size_range: SizeRange::new(200, 800),
        poh_surv_interval: 10,
        poh_finalizable_interval: 0,
        poh_alloc_ratio: 25,
        verify_live_size: true,
        print_every_nth_iter: 1000,
        handle_test: true,
    };

    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        "same.txt",
        "\
threadCount 2
verifyLiveSize true
printEveryNthIter 1000
handleTest true

[phase]
testKind time
allocType reference
totalLiveGB 0.25
totalAllocGB 2
totalMinutes 1.5

; small objects
[bucket]
sizeRange 100-2000
survInterval 20
finalizableInterval 7
weight 925

; large objects
[bucket]
lowSize 102400
highSize 204800
survInterval 4
pinInterval 3
weight 50

; pinned objects, every survivor pinned
[bucket]
sizeRange 200-800
survInterval 10
pinInterval 1
weight 25
",
    );

    let from_text = Args::load_from_path(&path).unwrap();
    let from_flags = flags.into_args().unwrap();
    assert_eq!(from_text, from_flags);
}

#[test]
fn test_toml_file_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        "workload.toml",
        r#"
thread_count = 1

[[phases]]
test_kind = "highSurvival"
total_live_bytes = 10000
total_alloc_bytes = 10000
total_minutes = 0.5

[[phases.buckets]]
size_range = { low = 100, high = 100 }
surv_interval = 1
"#,
    );
    let args = Args::load_from_path(&path).unwrap();
    assert_eq!(args.phases[0].test_kind, TestKind::HighSurvival);
    assert_eq!(args.phases[0].buckets[0].weight, 1);
}

#[test]
fn test_parse_error_reports_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "bad.txt", "threadCount 2\n[phase]\ntotalAllocBytes lots\n");
    match Args::load_from_path(&path) {
        Err(SimError::Parse { line, .. }) => assert_eq!(line, 3),
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn test_two_phases_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let content = format!(
        "{}\n[phase]\ntotalLiveBytes 100\ntotalAllocBytes 100\n[bucket]\nsizeRange 1-2\n",
        TEXT_CONFIG
    );
    let path = write_config(dir.path(), "two.txt", &content);
    assert!(matches!(
        Args::load_from_path(&path),
        Err(SimError::UnsupportedPhaseCount(2))
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Args::load_from_path(&dir.path().join("nope.txt")).unwrap_err();
    assert!(matches!(err, SimError::Io(_)));
    assert!(!err.is_bug());
}
