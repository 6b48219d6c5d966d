//! # Windload CLI
//!
//! Runs wind load jobs described in JSON files.
//!
//! ```text
//! windload preview    <job.json>  [--config cfg.json] [--out plan.json]
//! windload apply      <job.json>  --store loads.json [--config cfg.json]
//! windload apply-plan <plan.json> --store loads.json [--config cfg.json]
//! ```
//!
//! `preview` prints the summary and plan rows without touching any store;
//! `--out` saves the rows so they can be edited and sent with `apply-plan`.

mod logging;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use serde::Deserialize;
use serde_json::json;

use windload_core::debug::{DebugSink, JsonDirSink, TracingSink};
use windload_core::file_io::{read_json, write_json_atomic};
use windload_core::loads::{LoadFamily, RawPlanRow};
use windload_core::model::ModelSnapshot;
use windload_core::pipeline::{RawFamilyTables, WindTables};
use windload_core::store::JsonFileStore;
use windload_core::{
    load_config, GroupTarget, LoadError, LoadResult, PlanApplier, WindLoadConfig, WindLoadGenerator,
};

const USAGE: &str = "usage:
  windload preview    <job.json>  [--config cfg.json] [--out plan.json]
  windload apply      <job.json>  --store loads.json [--config cfg.json]
  windload apply-plan <plan.json> --store loads.json [--config cfg.json]";

/// Contents of a job file
#[derive(Debug, Deserialize)]
struct Job {
    model: ModelSnapshot,
    targets: Vec<GroupTarget>,
    #[serde(default)]
    tables: BTreeMap<LoadFamily, RawFamilyTables>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Preview,
    Apply,
    ApplyPlan,
}

#[derive(Debug)]
struct Args {
    command: Command,
    input: PathBuf,
    config: Option<PathBuf>,
    store: Option<PathBuf>,
    out: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let command = match args.next().as_deref() {
        Some("preview") => Command::Preview,
        Some("apply") => Command::Apply,
        Some("apply-plan") => Command::ApplyPlan,
        Some(other) => return Err(format!("unknown command '{}'", other)),
        None => return Err("missing command".to_string()),
    };

    let mut input = None;
    let mut config = None;
    let mut store = None;
    let mut out = None;
    while let Some(arg) = args.next() {
        let slot = match arg.as_str() {
            "--config" => &mut config,
            "--store" => &mut store,
            "--out" => &mut out,
            flag if flag.starts_with("--") => return Err(format!("unknown option '{}'", flag)),
            _ => {
                if input.replace(PathBuf::from(&arg)).is_some() {
                    return Err(format!("unexpected argument '{}'", arg));
                }
                continue;
            }
        };
        let value = args.next().ok_or_else(|| format!("{} needs a value", arg))?;
        *slot = Some(PathBuf::from(value));
    }

    let input = input.ok_or_else(|| "missing input file".to_string())?;
    if command != Command::Preview && store.is_none() {
        return Err("--store is required".to_string());
    }
    Ok(Args {
        command,
        input,
        config,
        store,
        out,
    })
}

fn user_id() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "windload".to_string())
}

fn print_json(value: &serde_json::Value) -> LoadResult<()> {
    let text =
        serde_json::to_string_pretty(value).map_err(|e| LoadError::serialization(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn open_store(args: &Args) -> LoadResult<JsonFileStore> {
    let path = args.store.as_deref().unwrap_or_else(|| Path::new("loads.json"));
    JsonFileStore::open(path, user_id())
}

fn run(args: &Args) -> LoadResult<()> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => WindLoadConfig::default().normalized(),
    };

    let dir_sink = if config.debug.enabled {
        Some(JsonDirSink::create(&config.debug.dir, &config.debug.run_label)?)
    } else {
        None
    };
    let sink: &dyn DebugSink = match &dir_sink {
        Some(sink) => sink,
        None => &TracingSink,
    };

    if args.command == Command::ApplyPlan {
        let rows: Vec<RawPlanRow> = read_json(&args.input)?;
        let mut store = open_store(args)?;
        let mut applier = PlanApplier::new(config.apply.clone()).with_sink(sink);
        let report = applier.apply_raw(&mut store, &rows)?;
        return print_json(&json!({ "apply": report }));
    }

    let job: Job = read_json(&args.input)?;
    let tables = WindTables::from_raw(&job.tables)?;
    let generator = WindLoadGenerator::new(&job.model, &job.model, config).with_sink(sink);

    match args.command {
        Command::Preview => {
            let plan = generator.build_plan(&job.targets, &tables)?;
            if let Some(out) = &args.out {
                let raw: Vec<RawPlanRow> = plan.rows.iter().map(RawPlanRow::from).collect();
                write_json_atomic(&raw, out)?;
                tracing::info!(path = %out.display(), rows = raw.len(), "plan saved");
            }
            print_json(&json!({ "summary": plan.summary, "rows": plan.rows }))
        }
        _ => {
            let mut store = open_store(args)?;
            let summary = generator.generate_and_apply(&mut store, &job.targets, &tables)?;
            print_json(&json!({ "summary": summary }))
        }
    }
}

fn main() -> ExitCode {
    logging::init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("error: {}\n\n{}", message, USAGE);
            return ExitCode::from(2);
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.error_code(), "{}", e);
            if let Ok(details) = serde_json::to_string(&e) {
                eprintln!("{}", details);
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, String> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_preview() {
        let parsed = args(&["preview", "job.json", "--out", "plan.json"]).unwrap();
        assert_eq!(parsed.command, Command::Preview);
        assert_eq!(parsed.input, PathBuf::from("job.json"));
        assert_eq!(parsed.out, Some(PathBuf::from("plan.json")));
        assert!(parsed.store.is_none());
    }

    #[test]
    fn test_apply_requires_store() {
        assert!(args(&["apply", "job.json"]).is_err());
        let parsed = args(&["apply", "--store", "loads.json", "job.json"]).unwrap();
        assert_eq!(parsed.store, Some(PathBuf::from("loads.json")));
    }

    #[test]
    fn test_parse_errors() {
        assert!(args(&[]).is_err());
        assert!(args(&["render", "job.json"]).is_err());
        assert!(args(&["preview", "a.json", "b.json"]).is_err());
        assert!(args(&["preview", "a.json", "--config"]).is_err());
        assert!(args(&["preview", "a.json", "--verbose"]).is_err());
    }

    #[test]
    fn test_job_deserializes() {
        let job: Job = serde_json::from_str(
            r#"{
                "model": {"elements": {"1": 10}, "groups": {"Deck": [1]}},
                "targets": [{"name": "Deck", "family": "LiveWind"}],
                "tables": {"LiveWind": {"cases": [
                    {"category": "WL", "angle": 0, "case_name": "WL_A0"}
                ]}}
            }"#,
        )
        .unwrap();
        assert_eq!(job.targets[0].angle_offset, 0.0);
        assert!(WindTables::from_raw(&job.tables).is_ok());
    }
}
