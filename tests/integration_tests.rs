//! End-to-end library tests: compile, persist, mmap-load, scan

use graphscan::{compile, Database, EngineError, Matching, Pattern, PatternFlags, ScanMode, Scratch};
use std::sync::Arc;
use tempfile::TempDir;

fn build_db(patterns: &[&str]) -> Database {
    let patterns: Vec<Pattern> = patterns
        .iter()
        .enumerate()
        .map(|(i, p)| Pattern::new(*p, i as u32))
        .collect();
    compile(&patterns, ScanMode::Block).unwrap()
}

#[test]
fn compile_save_open_scan_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("graph.gsdb");

    let db = build_db(&["needle", "n[aeiou]+dle"]);
    db.save(&path).unwrap();

    let loaded = Database::open(&path).unwrap();
    let mut scratch = Scratch::for_database(&loaded);
    let events = loaded.find_all(b"a needle in a haystack", &mut scratch).unwrap();

    // Both patterns match "needle" ending at the same offset; ascending id
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].id, 0);
    assert_eq!(events[1].id, 1);
    assert_eq!(events[0].to, events[1].to);

    // The mmap-backed database behaves identically to the in-memory one
    let mut scratch2 = Scratch::for_database(&db);
    let direct = db.find_all(b"a needle in a haystack", &mut scratch2).unwrap();
    assert_eq!(events, direct);
}

#[test]
fn idempotent_across_fresh_scratch() {
    let db = build_db(&["ab+c", "b{2}", "c$"]);
    let data = b"zabbbc abc bbc";

    let mut baseline = None;
    for _ in 0..5 {
        let mut scratch = Scratch::for_database(&db);
        let events = db.find_all(data, &mut scratch).unwrap();
        match &baseline {
            None => baseline = Some(events),
            Some(expected) => assert_eq!(&events, expected),
        }
    }
}

#[test]
fn database_shared_across_threads_with_private_scratch() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("graph.gsdb");
    build_db(&["alpha", "bet+a"]).save(&path).unwrap();

    let db = Arc::new(Database::open(&path).unwrap());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = db.clone();
            std::thread::spawn(move || {
                let mut scratch = Scratch::for_database(&db);
                let events = db.find_all(b"alpha betta alpha", &mut scratch).unwrap();
                events.iter().map(|e| (e.id, e.to)).collect::<Vec<_>>()
            })
        })
        .collect();

    let first = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .reduce(|a, b| {
            assert_eq!(a, b);
            a
        })
        .unwrap();
    assert_eq!(first.len(), 3);
}

#[test]
fn one_scratch_serves_multiple_databases_after_growth() {
    let small = build_db(&["ok"]);
    let large = build_db(&["a[0-9]{3,6}b", "longer(pattern|alternative)+here"]);

    let mut scratch = Scratch::for_database(&small);
    assert!(matches!(
        large.find_all(b"a123b", &mut scratch),
        Err(EngineError::ScratchMismatch { .. })
    ));

    scratch.grow_for(&large);
    assert_eq!(large.find_all(b"a123b", &mut scratch).unwrap().len(), 1);
    assert_eq!(small.find_all(b"ok", &mut scratch).unwrap().len(), 1);
}

#[test]
fn callback_count_equals_match_count() {
    let db = build_db(&["x."]);
    let mut scratch = Scratch::for_database(&db);

    let mut callbacks = 0usize;
    db.scan(b"x1 x2 x3", &mut scratch, |_| {
        callbacks += 1;
        Matching::Continue
    })
    .unwrap();

    let events = db.find_all(b"x1 x2 x3", &mut scratch).unwrap();
    assert_eq!(callbacks, events.len());
    assert_eq!(callbacks, 3);
}

#[test]
fn dotall_flag_survives_serialization() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("graph.gsdb");

    let flags = PatternFlags {
        dot_all: true,
        ..Default::default()
    };
    compile(&[Pattern::with_flags("a.c", 9, flags)], ScanMode::Block)
        .unwrap()
        .save(&path)
        .unwrap();

    let db = Database::open(&path).unwrap();
    assert!(db.pattern_flags(0).unwrap().dot_all);
    assert_eq!(db.expression(0), Some("a.c"));

    let mut scratch = Scratch::for_database(&db);
    let events = db.find_all(b"a\nc", &mut scratch).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, 9);
}

#[test]
fn tampered_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("graph.gsdb");
    build_db(&["abc"]).save(&path).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0x55;
    std::fs::write(&path, &bytes).unwrap();

    assert!(Database::open(&path).is_err());
}
