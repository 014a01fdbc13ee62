//! strategist CLI.
//!
//! Detects simplification strategies in a source/target pair, inspects the
//! confidence profiles and salience ranking, and validates configuration
//! files.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use strategist_core::{
    AnalysisMode, DetectionReport, DetectorConfig, FrequencyTable, HeuristicParser,
    LexicalSimilarity, SalienceProvider, StrategyCode, StrategyDetector,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
    Text,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Analyze a sentence window (fast)
    Performance,
    /// Analyze the whole texts
    Complete,
}

impl From<Mode> for AnalysisMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Performance => AnalysisMode::Performance,
            Mode::Complete => AnalysisMode::Complete,
        }
    }
}

#[derive(Parser)]
#[command(name = "strategist", author, version, about)]
struct Cli {
    /// Log debug output to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect strategies between a source text and its simplification
    Detect {
        /// Source text file (`-` for stdin)
        #[arg(long, short = 's')]
        source: PathBuf,

        /// Target text file (`-` for stdin)
        #[arg(long, short = 't')]
        target: PathBuf,

        /// Configuration file (YAML or JSON)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Override the configured analysis mode
        #[arg(long, short = 'm', value_enum)]
        mode: Option<Mode>,

        /// Activate omission (OM+) detection
        #[arg(long)]
        omission: bool,

        /// Word frequency table (TSV: word, count) for lexical complexity
        #[arg(long)]
        frequencies: Option<PathBuf>,

        /// Sentence window for performance mode
        #[arg(long)]
        max_sentences: Option<usize>,

        /// Run without the heuristic parser (voice and pronoun features off)
        #[arg(long)]
        no_parser: bool,

        /// Run without similarity (similarity gates skipped)
        #[arg(long)]
        no_similarity: bool,

        #[arg(long, short = 'f', value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the confidence profiles in use
    Profiles {
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Only this strategy code
        #[arg(long)]
        code: Option<String>,

        #[arg(long, short = 'f', value_enum, default_value = "yaml")]
        format: OutputFormat,
    },

    /// Rank the salient terms of a text
    Salience {
        /// Text file (`-` for stdin)
        #[arg(long, short = 'i')]
        input: PathBuf,

        #[arg(long, default_value = "frequency")]
        method: String,

        #[arg(long, short = 'n', default_value_t = 10)]
        max_units: usize,

        #[arg(long, short = 'f', value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Validate a configuration file
    ValidateConfig { config: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Detect {
            source,
            target,
            config,
            mode,
            omission,
            frequencies,
            max_sentences,
            no_parser,
            no_similarity,
            format,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(mode) = mode {
                config.cascade.mode = mode.into();
            }
            if let Some(max) = max_sentences {
                config.cascade.performance_max_sentences = max;
            }
            if omission {
                config.policy.set_active(StrategyCode::Omission, true);
            }

            let mut builder = StrategyDetector::builder().config(config);
            if !no_parser {
                builder = builder.parser(Arc::new(HeuristicParser::new()));
            }
            if !no_similarity {
                builder = builder.similarity(Arc::new(LexicalSimilarity::new()));
            }
            if let Some(path) = frequencies {
                let table = FrequencyTable::from_file(&path)
                    .with_context(|| format!("Failed to load frequency table {}", path.display()))?;
                builder = builder.frequency_table(table);
            }
            let detector = builder.build().context("Failed to build detector")?;

            let (source, target) = read_pair(&source, &target)?;
            let report = detector.detect(&source, &target);
            match format {
                OutputFormat::Text => print_report(&report),
                _ => print_structured(&report, format)?,
            }
        }

        Command::Profiles {
            config,
            code,
            format,
        } => {
            let config = load_config(config.as_deref())?;
            let detector = StrategyDetector::builder()
                .config(config)
                .build()
                .context("Failed to build detector")?;
            let mut profiles = detector.profiles().clone();
            if let Some(code) = code {
                profiles.retain(|k, _| *k == code);
                if profiles.is_empty() {
                    bail!("No profile for '{}'; it would be scored with the default profile", code);
                }
            }
            match format {
                OutputFormat::Text => {
                    for (code, profile) in &profiles {
                        println!(
                            "{:<5} base {:.2}  min {:.2}  semantic weight {:.2}  features {}",
                            code,
                            profile.base_confidence,
                            profile.quality_thresholds.min_confidence,
                            profile.semantic_multiplier_weight,
                            profile.feature_weights.len()
                        );
                    }
                }
                _ => print_structured(&profiles, format)?,
            }
        }

        Command::Salience {
            input,
            method,
            max_units,
            format,
        } => {
            let provider = SalienceProvider::for_method(&method, 1)
                .with_context(|| format!("Unknown salience method '{}'", method))?;
            let text = read_input(&input)?;
            let result = provider.extract(&text, max_units);
            match format {
                OutputFormat::Text => {
                    for unit in &result.units {
                        println!("{:.3}  {}", unit.weight, unit.unit);
                    }
                }
                _ => print_structured(&result, format)?,
            }
        }

        Command::ValidateConfig { config } => {
            DetectorConfig::from_file(&config)
                .with_context(|| format!("Invalid configuration: {}", config.display()))?;
            println!("{}: ok", config.display());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<DetectorConfig> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "Loading configuration");
            DetectorConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))
        }
        None => Ok(DetectorConfig::default()),
    }
}

fn is_stdin(path: &Path) -> bool {
    path == Path::new("-")
}

/// Read the source and target texts. Only one of them may come from stdin.
fn read_pair(source: &Path, target: &Path) -> Result<(String, String)> {
    if is_stdin(source) && is_stdin(target) {
        bail!("--source and --target cannot both read from stdin");
    }
    Ok((read_input(source)?, read_input(target)?))
}

fn read_input(path: &Path) -> Result<String> {
    if is_stdin(path) {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
        _ => serde_json::to_string_pretty(value)?,
    };
    println!("{}", rendered);
    Ok(())
}

fn print_report(report: &DetectionReport) {
    println!(
        "{} mode, {} source / {} target sentences analyzed",
        match report.mode {
            AnalysisMode::Performance => "performance",
            AnalysisMode::Complete => "complete",
        },
        report.source_sentences_analyzed,
        report.target_sentences_analyzed
    );
    for warning in &report.warnings {
        println!("warning: {}", warning);
    }
    if report.strategies.is_empty() {
        println!("no strategies detected");
        return;
    }
    for strategy in &report.strategies {
        println!(
            "{:<5} {:.2} ({}) [{} stage] {}",
            strategy.strategy_code,
            strategy.confidence,
            strategy.confidence_level,
            strategy.stage,
            strategy.strategy_code.description()
        );
        for example in &strategy.examples {
            println!("      - {}", example);
        }
    }
    println!(
        "{} detections, average confidence {:.2}",
        report.summary.total, report.summary.average_confidence
    );
}
