use regex::Regex;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct TestContext {
    dir: TempDir,
    candidates: PathBuf,
    region: PathBuf,
    results: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let candidates = dir.path().join("candidates.json");
        let region = dir.path().join("region.geojson");
        let results = dir.path().join("results");

        // 4x4 grid of cell centres over the unit square
        let mut coords = Vec::new();
        for row in 0..4 {
            for col in 0..4 {
                coords.push(format!("[{}, {}]", 0.125 + col as f64 * 0.25, 0.125 + row as f64 * 0.25));
            }
        }
        fs::write(&candidates, format!("[{}]", coords.join(", "))).unwrap();

        fs::write(
            &region,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"name": "unit"}, "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}}
            ]}"#,
        )
        .unwrap();

        Self {
            dir,
            candidates,
            region,
            results,
        }
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_siteforge"))
            .args(args)
            .args([
                "--candidates",
                self.candidates.to_str().unwrap(),
                "--region",
                self.region.to_str().unwrap(),
                "--results",
                self.results.to_str().unwrap(),
            ])
            .output()
            .expect("Failed to execute binary")
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }
}

fn fitness_of(stdout: &str) -> f64 {
    let re = Regex::new(r"Fitness\s*\|\s*(?:\x1b\[[0-9;]*m)?(-?[\d.]+)").unwrap();
    let caps = re
        .captures(stdout)
        .unwrap_or_else(|| panic!("no fitness row in output:\n{}", stdout));
    caps[1].parse().unwrap()
}

#[test]
fn test_evaluate_balanced_sites() {
    let ctx = TestContext::new();
    let sites = ctx.write("sites.json", "[[0.25, 0.5], [0.75, 0.5]]");
    let output = ctx.run(&[
        "evaluate",
        "--sites",
        sites.to_str().unwrap(),
        "--density",
        "1000",
        "--service-level",
        "500",
    ]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(fitness_of(&stdout).abs() < 1.0);
    assert!(stdout.contains("Coverage cells"));
}

#[test]
fn test_evaluate_saves_named_result() {
    let ctx = TestContext::new();
    let sites = ctx.write("sites.json", "[[0.05, 0.5], [0.15, 0.5]]");
    let args = [
        "evaluate",
        "--sites",
        sites.to_str().unwrap(),
        "--density",
        "1000",
        "--service-level",
        "500",
        "--save",
        "current",
    ];
    let output = ctx.run(&args);
    assert!(output.status.success());
    let fitness = fitness_of(&String::from_utf8_lossy(&output.stdout));
    assert!((fitness - 400.0).abs() < 1.0, "fitness {}", fitness);

    let saved = ctx.results.join("current.json");
    let record: serde_json::Value = serde_json::from_str(&fs::read_to_string(&saved).unwrap()).unwrap();
    assert_eq!(record["solution_coords"].as_array().unwrap().len(), 2);
    assert_eq!(record["voronoi_polygons"].as_array().unwrap().len(), 2);

    // Saving under the same name again fails instead of overwriting
    let again = ctx.run(&args);
    assert_eq!(again.status.code(), Some(1));
}

#[test]
fn test_ga_run_writes_result() {
    let ctx = TestContext::new();
    let output = ctx.run(&[
        "ga",
        "--generations",
        "2",
        "--population-size",
        "6",
        "--parents-number",
        "4",
        "--max-active",
        "3",
        "--service-level",
        "300",
        "--density",
        "1000",
        "-S",
        "7",
    ]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(fitness_of(&stdout) >= 0.0);

    let saved = ctx.results.join("genetic_algorithm.json");
    let record: serde_json::Value = serde_json::from_str(&fs::read_to_string(&saved).unwrap()).unwrap();
    let bits = record["solution"].as_array().unwrap();
    assert_eq!(bits.len(), 16);
    let active = bits.iter().filter(|b| b.as_u64() == Some(1)).count();
    assert!(active <= 3);
}

#[test]
fn test_heuristic_respects_budget() {
    let ctx = TestContext::new();
    let output = ctx.run(&[
        "heuristic",
        "--kind",
        "max-population",
        "--max-active",
        "4",
        "--walk-speed",
        "2000",
        "--density",
        "1000",
        "--service-level",
        "250",
    ]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("max-population"));

    let saved = ctx.results.join("max_population_heuristic.json");
    let record: serde_json::Value = serde_json::from_str(&fs::read_to_string(&saved).unwrap()).unwrap();
    assert_eq!(record["solution_coords"].as_array().unwrap().len(), 4);
}

#[test]
fn test_config_file_is_overridden_by_flags() {
    let ctx = TestContext::new();
    let config = ctx.write(
        "config.json",
        r#"{"search": {"max_active": 40}, "scoring": {"service_level": 500}}"#,
    );
    let sites = ctx.write("sites.json", "[[0.25, 0.5], [0.75, 0.5]]");

    // The file budget exceeds the 16 candidates, but evaluate never checks it
    let output = ctx.run(&[
        "evaluate",
        "--config",
        config.to_str().unwrap(),
        "--sites",
        sites.to_str().unwrap(),
        "--density",
        "1000",
        "--service-level",
        "100",
    ]);
    assert!(output.status.success());
    // 500 per cell over a level of 100 leaves 400 surplus in each
    let fitness = fitness_of(&String::from_utf8_lossy(&output.stdout));
    assert!((fitness - 800.0).abs() < 1.0, "fitness {}", fitness);
}

#[test]
fn test_budget_above_candidate_count_fails() {
    let ctx = TestContext::new();
    let output = ctx.run(&["ga", "--max-active", "17", "--density", "1000", "--no-save"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("max_active"), "stderr: {}", stderr);
}

#[test]
fn test_missing_population_source_fails() {
    let ctx = TestContext::new();
    let sites = ctx.write("sites.json", "[[0.25, 0.5], [0.75, 0.5]]");
    let output = ctx.run(&["evaluate", "--sites", sites.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--density"));
}

#[test]
fn test_tune_ga_with_heuristic_init_uses_its_own_study() {
    let ctx = TestContext::new();
    let output = ctx.run(&[
        "tune",
        "--target",
        "ga",
        "--init",
        "heuristic",
        "--trials",
        "2",
        "--generations",
        "1",
        "--max-active",
        "3",
        "--walk-speed",
        "2000",
        "--density",
        "1000",
        "--service-level",
        "300",
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let log = fs::read_to_string(ctx.results.join("trials.jsonl")).unwrap();
    assert_eq!(log.lines().count(), 2);
    assert!(log
        .lines()
        .all(|l| l.contains("\"study\":\"ga-heuristic-init-optimization\"")));
}

#[test]
fn test_evaluate_warns_about_sites_outside_region() {
    let ctx = TestContext::new();
    let sites = ctx.write("sites.json", "[[0.25, 0.5], [0.75, 0.5], [3.0, 3.0]]");
    let output = ctx.run(&[
        "evaluate",
        "--sites",
        sites.to_str().unwrap(),
        "--density",
        "1000",
    ]);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("1 of 3 sites lie outside the region"), "stderr: {}", stderr);
}
