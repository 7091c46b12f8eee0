//! Command-line surface
//!
//! ```text
//! train       --model cf|content [--out DIR]
//! recommend   --model-path PATH [--test-file PATH] [--n N] [--submission PATH]
//! grid-search [--cf-model PATH] [--cb-model PATH] [--truth PATH]
//! evaluate    --submission PATH --truth PATH [--k K]
//! ```
//!
//! Paths not given on the command line fall back to `PATHS_*`.

use crate::config::Config;
use crate::models::{GroundTruth, InteractionRecord, ItemMetadata, Recommendation, TruthPair};
use crate::services::evaluation::{evaluate, grid_search, GridSpec};
use crate::services::{
    generate, Engine, EngineKind, InteractionMatrix, InteractionMatrixBuilder, Recommender,
};
use crate::storage;
use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

const SUBMISSION_FILE: &str = "submission.jsonl";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Train {
        model: EngineKind,
        out: Option<PathBuf>,
    },
    Recommend {
        model_path: PathBuf,
        test_file: Option<PathBuf>,
        n: Option<usize>,
        submission: Option<PathBuf>,
    },
    GridSearch {
        cf_model: Option<PathBuf>,
        cb_model: Option<PathBuf>,
        truth: Option<PathBuf>,
    },
    Evaluate {
        submission: PathBuf,
        truth: PathBuf,
        k: Option<usize>,
    },
}

/// `--flag value` pairs following the subcommand.
struct Flags(HashMap<String, String>);

impl Flags {
    fn parse<I: Iterator<Item = String>>(mut args: I) -> Result<Self> {
        let mut flags = HashMap::new();
        while let Some(arg) = args.next() {
            let Some(name) = arg.strip_prefix("--") else {
                bail!("unexpected argument: {}", arg);
            };
            let value = args
                .next()
                .ok_or_else(|| anyhow!("missing value for --{}", name))?;
            flags.insert(name.to_string(), value);
        }
        Ok(Flags(flags))
    }

    fn path(&self, name: &str) -> Option<PathBuf> {
        self.0.get(name).map(PathBuf::from)
    }

    fn required_path(&self, name: &str) -> Result<PathBuf> {
        self.path(name)
            .ok_or_else(|| anyhow!("--{} is required", name))
    }

    fn number(&self, name: &str) -> Result<Option<usize>> {
        self.0
            .get(name)
            .map(|v| v.parse::<usize>().with_context(|| format!("--{} must be a number", name)))
            .transpose()
    }
}

impl Command {
    /// Parse arguments after the binary name.
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut args = args.into_iter();
        let sub = args.next().ok_or_else(|| anyhow!("missing command"))?;
        let flags = Flags::parse(args)?;

        match sub.as_str() {
            "train" => {
                let model = flags
                    .0
                    .get("model")
                    .ok_or_else(|| anyhow!("--model is required"))?
                    .parse()?;
                Ok(Command::Train {
                    model,
                    out: flags.path("out"),
                })
            }
            "recommend" => Ok(Command::Recommend {
                model_path: flags.required_path("model-path")?,
                test_file: flags.path("test-file"),
                n: flags.number("n")?,
                submission: flags.path("submission"),
            }),
            "grid-search" => Ok(Command::GridSearch {
                cf_model: flags.path("cf-model"),
                cb_model: flags.path("cb-model"),
                truth: flags.path("truth"),
            }),
            "evaluate" => Ok(Command::Evaluate {
                submission: flags.required_path("submission")?,
                truth: flags.required_path("truth")?,
                k: flags.number("k")?,
            }),
            other => bail!("unknown command: {}", other),
        }
    }
}

pub fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Train { model, out } => {
            let out_dir = out.unwrap_or_else(|| config.paths.model_dir.clone());
            train(model, &out_dir, config)
        }
        Command::Recommend {
            model_path,
            test_file,
            n,
            submission,
        } => {
            let test_file = test_file.unwrap_or_else(|| config.paths.truth.clone());
            let submission =
                submission.unwrap_or_else(|| config.paths.model_dir.join(SUBMISSION_FILE));
            let n = n.unwrap_or(config.hybrid.output_size);
            recommend(&model_path, &test_file, n, &submission, config)
        }
        Command::GridSearch {
            cf_model,
            cb_model,
            truth,
        } => {
            let cf_model = cf_model
                .unwrap_or_else(|| config.paths.model_dir.join(EngineKind::Cf.artifact_name()));
            let cb_model = cb_model.unwrap_or_else(|| {
                config
                    .paths
                    .model_dir
                    .join(EngineKind::Content.artifact_name())
            });
            let truth = truth.unwrap_or_else(|| config.paths.truth.clone());
            search(&cf_model, &cb_model, &truth, config)
        }
        Command::Evaluate {
            submission,
            truth,
            k,
        } => {
            let recs: Vec<Recommendation> = storage::read_jsonl(&submission)
                .with_context(|| format!("Failed to read {}", submission.display()))?;
            let truth = load_truth(&truth)?;
            let report = evaluate(&recs, &truth, k.unwrap_or(config.hybrid.eval_k));
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

fn build_matrix(config: &Config) -> Result<InteractionMatrix> {
    let records: Vec<InteractionRecord> = storage::read_jsonl(&config.paths.interactions)
        .context("Failed to read interaction log")?;
    Ok(InteractionMatrixBuilder::from_config(&config.matrix).build(&records))
}

fn load_truth(path: &Path) -> Result<GroundTruth> {
    let pairs: Vec<TruthPair> = storage::read_jsonl(path)
        .with_context(|| format!("Failed to read ground truth {}", path.display()))?;
    Ok(GroundTruth::from_pairs(pairs))
}

fn load_engine(path: &Path, expected: EngineKind) -> Result<Engine> {
    let engine = Engine::load(path)
        .with_context(|| format!("Failed to load model {}", path.display()))?;
    if engine.kind() != expected {
        bail!(
            "{} holds a {} model, expected {}",
            path.display(),
            engine.kind(),
            expected
        );
    }
    Ok(engine)
}

fn train(kind: EngineKind, out_dir: &Path, config: &Config) -> Result<()> {
    let matrix = build_matrix(config)?;
    let metadata: Vec<ItemMetadata> = match kind {
        EngineKind::Content => {
            storage::read_jsonl(&config.paths.metadata).context("Failed to read item metadata")?
        }
        EngineKind::Cf => Vec::new(),
    };

    let engine = Engine::train(kind, &matrix, &metadata, config)?;
    let path = out_dir.join(kind.artifact_name());
    engine
        .save(&path)
        .with_context(|| format!("Failed to save model to {}", path.display()))?;
    info!(engine = %kind, path = %path.display(), "Training complete");
    Ok(())
}

fn recommend(
    model_path: &Path,
    test_file: &Path,
    n: usize,
    submission: &Path,
    config: &Config,
) -> Result<()> {
    let engine = Engine::load(model_path)
        .with_context(|| format!("Failed to load model {}", model_path.display()))?;
    let users = load_truth(test_file)?;

    // CF masks seen items itself; content needs the interaction history.
    let history = match engine.kind() {
        EngineKind::Content => Some(build_matrix(config)?),
        EngineKind::Cf => None,
    };

    let rows = generate(&engine, users.users(), n, history.as_ref());
    storage::write_jsonl(submission, &rows)
        .with_context(|| format!("Failed to write {}", submission.display()))?;
    Ok(())
}

fn search(cf_path: &Path, cb_path: &Path, truth_path: &Path, config: &Config) -> Result<()> {
    let cf = load_engine(cf_path, EngineKind::Cf)?;
    let cb = load_engine(cb_path, EngineKind::Content)?;
    let truth = load_truth(truth_path)?;

    let spec = GridSpec {
        output_size: config.hybrid.output_size,
        k: config.hybrid.eval_k,
        ..Default::default()
    };
    let report = grid_search(&cf, &cb, &truth, &spec);

    for point in &report.points {
        println!(
            "alpha={:.1} CF_K={} CB_K={} -> precision={:.4} recall={:.4} ndcg={:.4}",
            point.params.alpha,
            point.params.cf_k,
            point.params.cb_k,
            point.metrics.precision,
            point.metrics.recall,
            point.metrics.ndcg
        );
    }
    match report.best {
        Some(best) => println!(
            "best: alpha={:.1} CF_K={} CB_K={} precision={:.4}",
            best.params.alpha, best.params.cf_k, best.params.cb_k, best.metrics.precision
        ),
        None => println!("best: none (empty grid)"),
    }
    Ok(())
}
