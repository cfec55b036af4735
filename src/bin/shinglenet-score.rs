//! Score query audio files against candidate files with a shingle embedder.

use std::path::PathBuf;

use burn::prelude::*;
use shinglenet::backend::{self, BackendKind, CpuBackend, CpuDevice, GpuDevice, WgpuBackend};
#[cfg(feature = "cuda")]
use shinglenet::backend::{CudaBackend, CudaGpuDevice};
use shinglenet::pipeline::{ScoreReport, score_files};
use shinglenet::{ModelConfig, Redux, ShingleEmbedder, ShingleParams, checkpoint, logging};
use tracing::warn;

fn main() {
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

#[derive(Debug, Clone)]
struct CliOptions {
    config: Option<PathBuf>,
    checkpoint: Option<PathBuf>,
    backend: Option<String>,
    redux: Redux,
    shingle: ShingleParams,
    queries: Vec<PathBuf>,
    candidates: Vec<PathBuf>,
    json: bool,
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    let config = match &options.config {
        Some(path) => ModelConfig::load(path).map_err(|err| err.to_string())?,
        None => ModelConfig::default(),
    };
    let kind = match options.backend.as_deref() {
        Some(name) => BackendKind::parse(Some(name)),
        None => BackendKind::from_env(),
    };
    kind.prepare_runtime();
    let report = match kind {
        BackendKind::Wgpu => score::<WgpuBackend>(&options, config, &GpuDevice::default())?,
        BackendKind::Cpu => score::<CpuBackend>(&options, config, &CpuDevice::default())?,
        #[cfg(feature = "cuda")]
        BackendKind::Cuda => score::<CudaBackend>(&options, config, &CudaGpuDevice::default())?,
    };
    if options.json {
        let text = serde_json::to_string_pretty(&report).map_err(|err| err.to_string())?;
        println!("{text}");
    } else {
        print_report(&report);
    }
    Ok(())
}

fn score<B: Backend>(
    options: &CliOptions,
    config: ModelConfig,
    device: &B::Device,
) -> Result<ScoreReport, String> {
    let embedder = load_embedder::<B>(options, config, device)?;
    score_files(
        &embedder,
        &options.queries,
        &options.candidates,
        options.shingle,
        options.redux,
        device,
    )
    .map_err(|err| err.to_string())
}

fn load_embedder<B: Backend>(
    options: &CliOptions,
    config: ModelConfig,
    device: &B::Device,
) -> Result<ShingleEmbedder<B>, String> {
    let path = match &options.checkpoint {
        Some(path) => path.clone(),
        None => {
            let path = backend::checkpoint_path().map_err(|err| err.to_string())?;
            if !path.is_file() {
                warn!(
                    "No checkpoint at {}; scoring with an untrained network.",
                    path.display()
                );
                return ShingleEmbedder::new(config, device).map_err(|err| err.to_string());
            }
            path
        }
    };
    checkpoint::load_embedder(config, &path, device).map_err(|err| err.to_string())
}

fn print_report(report: &ScoreReport) {
    println!("redux: {}", report.redux);
    println!("distance matrix (rows=queries, cols=candidates):");
    for (row, query) in report.distances.iter().zip(&report.queries) {
        let cells: String = row.iter().map(|value| format!("{value:9.4}")).collect();
        println!("{cells}  {}", query.display());
    }
    println!();
    for (query, ranking) in report.queries.iter().zip(&report.rankings) {
        println!("{}", query.display());
        for (rank, entry) in ranking.iter().enumerate() {
            println!(
                "  {:>3}. {:.4}  {}",
                rank + 1,
                entry.distance,
                report.candidates[entry.index].display()
            );
        }
    }
}

fn parse_args(args: Vec<String>) -> Result<Option<CliOptions>, String> {
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!("{}", help_text());
        return Ok(None);
    }
    let mut config = None;
    let mut checkpoint = None;
    let mut backend = None;
    let mut redux = Redux::default();
    let mut shingle = ShingleParams::default();
    let mut queries = Vec::new();
    let mut candidates = Vec::new();
    let mut json = false;

    let mut idx = 0usize;
    while idx < args.len() {
        let flag = args[idx].as_str();
        match flag {
            "--json" => json = true,
            "--config" => config = Some(PathBuf::from(take_value(&args, &mut idx, flag)?)),
            "--checkpoint" => {
                checkpoint = Some(PathBuf::from(take_value(&args, &mut idx, flag)?));
            }
            "--backend" => backend = Some(take_value(&args, &mut idx, flag)?.to_string()),
            "--redux" => {
                let value = take_value(&args, &mut idx, flag)?;
                redux = value.parse().map_err(|err: shinglenet::EmbedError| err.to_string())?;
            }
            "--shingle-len" => shingle.len = Some(parse_seconds(&args, &mut idx, flag)?),
            "--shingle-hop" => shingle.hop = Some(parse_seconds(&args, &mut idx, flag)?),
            "--query" => queries.push(PathBuf::from(take_value(&args, &mut idx, flag)?)),
            "--candidate" => candidates.push(PathBuf::from(take_value(&args, &mut idx, flag)?)),
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    if queries.is_empty() {
        return Err("at least one --query is required".to_string());
    }
    if candidates.is_empty() {
        return Err("at least one --candidate is required".to_string());
    }
    Ok(Some(CliOptions {
        config,
        checkpoint,
        backend,
        redux,
        shingle,
        queries,
        candidates,
        json,
    }))
}

fn take_value<'a>(args: &'a [String], idx: &mut usize, flag: &str) -> Result<&'a str, String> {
    *idx += 1;
    args.get(*idx)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn parse_seconds(args: &[String], idx: &mut usize, flag: &str) -> Result<f32, String> {
    let value = take_value(args, idx, flag)?;
    match value.parse::<f32>() {
        Ok(seconds) if seconds.is_finite() && seconds > 0.0 => Ok(seconds),
        _ => Err(format!("Invalid {flag} value: {value}")),
    }
}

fn help_text() -> String {
    [
        "shinglenet-score",
        "",
        "Usage:",
        "  shinglenet-score --query <file>... --candidate <file>... [options]",
        "",
        "Options:",
        "  --config <model.toml>     Model config (default: built-in defaults).",
        "  --checkpoint <file.bpk>   Network weights (default: app models dir).",
        "  --backend <cpu|wgpu|cuda> Overrides SHINGLENET_BACKEND.",
        "  --redux <mean|min|max>    Shingle distance reduction (default: min).",
        "  --shingle-len <seconds>   Override the configured shingle length.",
        "  --shingle-hop <seconds>   Override the configured shingle hop.",
        "  --json                    Print the report as JSON.",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn help_is_not_an_error() {
        assert!(parse_args(args(&["--help"])).unwrap().is_none());
        assert!(parse_args(args(&["--query", "a.wav", "-h"])).unwrap().is_none());
    }

    #[test]
    fn unknown_argument_lists_usage() {
        let err = parse_args(args(&["--frobnicate"])).unwrap_err();
        assert!(err.starts_with("Unknown argument: --frobnicate"));
        assert!(err.contains("Usage:"));
    }

    #[test]
    fn parses_queries_candidates_and_overrides() {
        let options = parse_args(args(&[
            "--query",
            "q.wav",
            "--candidate",
            "a.wav",
            "--candidate",
            "b.wav",
            "--redux",
            "mean",
            "--shingle-len",
            "2.5",
            "--json",
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(options.queries, vec![PathBuf::from("q.wav")]);
        assert_eq!(options.candidates.len(), 2);
        assert_eq!(options.redux, Redux::Mean);
        assert_eq!(options.shingle.len, Some(2.5));
        assert!(options.json);
    }

    #[test]
    fn missing_candidates_are_rejected() {
        let err = parse_args(args(&["--query", "q.wav"])).unwrap_err();
        assert!(err.contains("--candidate"));
    }
}
