use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper to create a graphscan command
fn graphscan_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("graphscan"))
}

/// Compile a pattern list into a database file inside `dir`
fn compile_patterns(dir: &Path, patterns: &str, extra_args: &[&str]) -> PathBuf {
    let pattern_file = dir.join("patterns.txt");
    fs::write(&pattern_file, patterns).unwrap();

    let db_file = dir.join("patterns.gsdb");
    let mut cmd = graphscan_cmd();
    cmd.arg("compile")
        .arg(&pattern_file)
        .arg("-o")
        .arg(&db_file);
    for arg in extra_args {
        cmd.arg(arg);
    }
    cmd.assert().success();
    db_file
}

#[test]
fn test_help() {
    graphscan_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Block-mode multi-pattern scanning engine",
        ));
}

#[test]
fn test_version() {
    graphscan_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("graphscan"));
}

#[test]
fn test_compile_help() {
    graphscan_cmd()
        .arg("compile")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Compile a pattern list into a graph database",
        ));
}

#[test]
fn test_bench_help() {
    graphscan_cmd()
        .arg("bench")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Benchmark repeated scans"));
}

#[test]
fn test_compile_and_inspect() {
    let temp = TempDir::new().unwrap();
    let db_file = compile_patterns(temp.path(), "abc\nfoo(bar)+\n", &[]);

    graphscan_cmd()
        .arg("inspect")
        .arg(&db_file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Patterns:       2"))
        .stdout(predicate::str::contains("Mode:           block"));
}

#[test]
fn test_inspect_json() {
    let temp = TempDir::new().unwrap();
    let db_file = compile_patterns(temp.path(), "abc\n", &[]);

    graphscan_cmd()
        .arg("inspect")
        .arg(&db_file)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"patterns\": 1"));
}

#[test]
fn test_inspect_verbose_lists_patterns() {
    let temp = TempDir::new().unwrap();
    let db_file = compile_patterns(temp.path(), "7:abc\n12:x[yz]\n", &[]);

    graphscan_cmd()
        .arg("inspect")
        .arg(&db_file)
        .arg("--verbose")
        .assert()
        .success()
        .stdout(predicate::str::contains("abc"))
        .stdout(predicate::str::contains("x[yz]"));
}

#[test]
fn test_scan_prints_matches() {
    let temp = TempDir::new().unwrap();
    let db_file = compile_patterns(temp.path(), "needle\n", &[]);

    let input = temp.path().join("input.bin");
    fs::write(&input, "hay needle hay needle").unwrap();

    graphscan_cmd()
        .arg("scan")
        .arg(&db_file)
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Match: pattern 0 from 4 to 10"))
        .stdout(predicate::str::contains("Match: pattern 0 from 15 to 21"))
        .stdout(predicate::str::contains("Scan complete: 2 matches"));
}

#[test]
fn test_scan_limit_terminates_early() {
    let temp = TempDir::new().unwrap();
    let db_file = compile_patterns(temp.path(), "a\n", &[]);

    let input = temp.path().join("input.bin");
    fs::write(&input, "aaaaa").unwrap();

    graphscan_cmd()
        .arg("scan")
        .arg(&db_file)
        .arg(&input)
        .arg("--limit")
        .arg("2")
        .assert()
        .success()
        .stdout(predicate::str::contains("Scan terminated after 2 matches"));
}

#[test]
fn test_bench_reports_each_run_and_average() {
    let temp = TempDir::new().unwrap();
    let db_file = compile_patterns(temp.path(), "abc\n", &[]);

    let input = temp.path().join("input.bin");
    fs::write(&input, "xxabcxx").unwrap();

    let output = graphscan_cmd()
        .arg("bench")
        .arg(&db_file)
        .arg(&input)
        .arg("3")
        .assert()
        .success()
        .get_output()
        .clone();

    let stdout = String::from_utf8(output.stdout).unwrap();
    let timings: Vec<f64> = stdout
        .lines()
        .filter_map(|l| l.strip_prefix("Time elapsed in ms: "))
        .map(|v| v.parse().unwrap())
        .collect();
    let averages: Vec<f64> = stdout
        .lines()
        .filter_map(|l| l.strip_prefix("Average time elapsed in ms: "))
        .map(|v| v.parse().unwrap())
        .collect();
    assert_eq!(timings.len(), 3);
    assert_eq!(averages.len(), 1);

    // The printed average is the arithmetic mean of the printed runs
    let mean = timings.iter().sum::<f64>() / timings.len() as f64;
    assert!((averages[0] - mean).abs() < 1e-3);

    // The match prints once per run
    let match_lines = stdout
        .lines()
        .filter(|l| *l == "Match at offset 5")
        .count();
    assert_eq!(match_lines, 3);
}

#[test]
fn test_bench_dotall_crosses_newline() {
    let temp = TempDir::new().unwrap();
    let db_file = compile_patterns(temp.path(), "a.c\n", &["--dotall"]);

    let input = temp.path().join("input.bin");
    fs::write(&input, "xa\ncxx").unwrap();

    graphscan_cmd()
        .arg("bench")
        .arg(&db_file)
        .arg(&input)
        .arg("1")
        .assert()
        .success()
        .stdout(predicate::str::contains("Match at offset 4"));
}

#[test]
fn test_bench_rejects_zero_runs() {
    let temp = TempDir::new().unwrap();
    let db_file = compile_patterns(temp.path(), "abc\n", &[]);

    let input = temp.path().join("input.bin");
    fs::write(&input, "abc").unwrap();

    graphscan_cmd()
        .arg("bench")
        .arg(&db_file)
        .arg(&input)
        .arg("0")
        .assert()
        .failure();
}

#[test]
fn test_empty_input_file_fails() {
    let temp = TempDir::new().unwrap();
    let db_file = compile_patterns(temp.path(), "abc\n", &[]);

    let input = temp.path().join("empty.bin");
    fs::write(&input, "").unwrap();

    graphscan_cmd()
        .arg("bench")
        .arg(&db_file)
        .arg(&input)
        .arg("1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("is empty"));
}

#[test]
fn test_missing_input_file_fails_with_path() {
    let temp = TempDir::new().unwrap();
    let db_file = compile_patterns(temp.path(), "abc\n", &[]);

    graphscan_cmd()
        .arg("bench")
        .arg(&db_file)
        .arg(temp.path().join("no-such-file.bin"))
        .arg("1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no-such-file.bin"));
}

#[test]
fn test_missing_graph_file_fails() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("input.bin");
    fs::write(&input, "abc").unwrap();

    graphscan_cmd()
        .arg("bench")
        .arg(temp.path().join("no-such-graph.gsdb"))
        .arg(&input)
        .arg("1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no-such-graph.gsdb"));
}

#[test]
fn test_compile_rejects_bad_pattern() {
    let temp = TempDir::new().unwrap();
    let pattern_file = temp.path().join("patterns.txt");
    fs::write(&pattern_file, "valid\na(b\n").unwrap();

    graphscan_cmd()
        .arg("compile")
        .arg(&pattern_file)
        .arg("-o")
        .arg(temp.path().join("out.gsdb"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("a(b"));
}

#[test]
fn test_compile_rejects_empty_pattern_file() {
    let temp = TempDir::new().unwrap();
    let pattern_file = temp.path().join("patterns.txt");
    fs::write(&pattern_file, "# only comments here\n\n").unwrap();

    graphscan_cmd()
        .arg("compile")
        .arg(&pattern_file)
        .arg("-o")
        .arg(temp.path().join("out.gsdb"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no patterns"));
}

#[test]
fn test_compile_case_insensitive() {
    let temp = TempDir::new().unwrap();
    let db_file = compile_patterns(temp.path(), "abc\n", &["-i"]);

    let input = temp.path().join("input.bin");
    fs::write(&input, "xABCx").unwrap();

    graphscan_cmd()
        .arg("scan")
        .arg(&db_file)
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Scan complete: 1 matches"));
}

#[test]
fn test_scan_rejects_truncated_database() {
    let temp = TempDir::new().unwrap();
    let db_file = compile_patterns(temp.path(), "abc\n", &[]);

    let bytes = fs::read(&db_file).unwrap();
    let truncated = temp.path().join("truncated.gsdb");
    fs::write(&truncated, &bytes[..bytes.len() / 2]).unwrap();

    let input = temp.path().join("input.bin");
    fs::write(&input, "abc").unwrap();

    graphscan_cmd()
        .arg("scan")
        .arg(&truncated)
        .arg(&input)
        .assert()
        .failure();
}
