use anyhow::{Context, Result, bail};
use brandshift_core::{Dimension, run};
use brandshift_ingest::{brand_lookup_from_records, load_brand_lookup, load_records, period_counts};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;
mod output;

use config::{Config, init_config, load_config};
use output::{AnalysisOutput, render_text};

#[derive(Parser, Debug)]
#[command(
    name = "brandshift",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BRANDSHIFT_BUILD_SHA"), ")"),
    about = "Decompose period-over-period purchase shifts into a three-layer flow graph"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the flow decomposition and print / write the graph and reports
    Analyze(AnalyzeArgs),

    /// Write a default brandshift.toml
    InitConfig {
        /// Target path (default: ./brandshift.toml)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// List the periods present in an input file
    Periods {
        #[arg(long)]
        input: PathBuf,

        /// Config file supplying column names
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct AnalyzeArgs {
    /// Records CSV (account_id, period, category_key, amount[, brand])
    #[arg(long)]
    input: PathBuf,

    /// Optional key -> brand CSV (category_key, brand)
    #[arg(long)]
    brands: Option<PathBuf>,

    /// Config file (default: ./brandshift.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    start: Option<String>,

    #[arg(long)]
    end: Option<String>,

    /// Product, brand or store to center the analysis on
    #[arg(long)]
    focal: Option<String>,

    #[arg(long, value_enum)]
    dimension: Option<DimensionArg>,

    /// Keep only the N largest keys per side
    #[arg(long)]
    top_n: Option<usize>,

    /// Highlight nodes containing this keyword (case-insensitive)
    #[arg(long)]
    highlight: Option<String>,

    /// Write the JSON result here
    #[arg(long)]
    out: Option<PathBuf>,

    /// Stdout format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DimensionArg {
    Product,
    Brand,
    Store,
}

impl From<DimensionArg> for Dimension {
    fn from(d: DimensionArg) -> Self {
        match d {
            DimensionArg::Product => Dimension::Product,
            DimensionArg::Brand => Dimension::Brand,
            DimensionArg::Store => Dimension::Store,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Analyze(args) => analyze(args)?,
        Command::InitConfig { path } => init_config(path.as_deref())?,
        Command::Periods { input, config } => {
            let cfg = load_config(config.as_deref())?;
            let records = load_records(&input, &cfg.columns)?;
            println!("Periods in {}:", input.display());
            for (period, rows) in period_counts(&records) {
                println!("  {period}: {rows} rows");
            }
        }
    }

    Ok(())
}

/// Logs go to stderr so JSON on stdout stays clean.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn apply_overrides(cfg: &mut Config, args: &AnalyzeArgs) {
    let a = &mut cfg.analysis;
    if let Some(s) = &args.start {
        a.start_period = s.clone();
    }
    if let Some(e) = &args.end {
        a.end_period = e.clone();
    }
    if let Some(f) = &args.focal {
        a.focal = f.clone();
    }
    if let Some(d) = args.dimension {
        a.dimension = d.into();
    }
    if args.top_n.is_some() {
        a.top_n = args.top_n;
    }
    if let Some(h) = &args.highlight {
        a.layout.highlight = Some(h.clone());
    }
}

fn analyze(args: AnalyzeArgs) -> Result<()> {
    let mut cfg = load_config(args.config.as_deref())?;
    apply_overrides(&mut cfg, &args);
    // fail on bad parameters before reading any data
    cfg.analysis.validate()?;

    if !args.input.exists() {
        bail!("input not found: {} (pass --input <path>)", args.input.display());
    }
    let records = load_records(&args.input, &cfg.columns)
        .with_context(|| format!("loading {}", args.input.display()))?;
    tracing::info!(rows = records.len(), input = %args.input.display(), "loaded records");

    let brands = match &args.brands {
        Some(path) => load_brand_lookup(path, &cfg.columns)?,
        None => brand_lookup_from_records(&records),
    };

    let analysis = run(&records, &brands, &cfg.analysis)?;
    let out = AnalysisOutput::new(&analysis, &cfg.analysis, chrono::Utc::now());

    if let Some(path) = &args.out {
        out.write(path)?;
        tracing::info!(path = %path.display(), "wrote analysis");
    }
    match args.format {
        Format::Text => print!("{}", render_text(&analysis)),
        Format::Json => println!("{}", out.to_json()?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> AnalyzeArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Analyze(a) => a,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse(&[
            "brandshift", "analyze", "--input", "x.csv", "--start", "2023", "--end", "2024",
            "--focal", "Acme", "--dimension", "brand", "--top-n", "3", "--highlight", "acme",
        ]);
        let mut cfg = Config::default();
        cfg.analysis.top_n = Some(10);
        apply_overrides(&mut cfg, &args);
        assert_eq!(cfg.analysis.start_period, "2023");
        assert_eq!(cfg.analysis.dimension, Dimension::Brand);
        assert_eq!(cfg.analysis.top_n, Some(3));
        assert_eq!(cfg.analysis.layout.highlight.as_deref(), Some("acme"));
        assert!(cfg.analysis.validate().is_ok());
    }

    #[test]
    fn test_absent_flags_keep_config() {
        let args = parse(&["brandshift", "analyze", "--input", "x.csv"]);
        let mut cfg = Config::default();
        cfg.analysis.focal = "P1".to_string();
        cfg.analysis.top_n = Some(10);
        apply_overrides(&mut cfg, &args);
        assert_eq!(cfg.analysis.focal, "P1");
        assert_eq!(cfg.analysis.top_n, Some(10));
        assert_eq!(args.format, Format::Text);
    }

    #[test]
    fn test_analyze_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("records.csv");
        std::fs::write(
            &input,
            "account_id,period,category_key,amount,brand\n\
             c1,2023,P1,10,Acme\n\
             c1,2024,P1,4,Acme\n\
             c1,2024,P2,6,Acme\n",
        )
        .unwrap();
        let out = dir.path().join("out.json");
        let input_arg = input.to_string_lossy().to_string();
        let out_arg = out.to_string_lossy().to_string();
        let cfg_arg = dir.path().join("empty.toml");
        std::fs::write(&cfg_arg, "").unwrap();
        let cfg_arg = cfg_arg.to_string_lossy().to_string();
        let args = parse(&[
            "brandshift", "analyze", "--input", &input_arg, "--config", &cfg_arg, "--start", "2023",
            "--end", "2024", "--focal", "P1", "--out", &out_arg,
        ]);
        analyze(args).unwrap();

        let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        let keys: Vec<&str> = v["graph"]["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|n| n["key"].as_str())
            .collect();
        assert!(keys.contains(&"label:end_same_brand"));
        assert!(keys.contains(&"end:P2"));
    }

    #[test]
    fn test_same_periods_fail_before_loading() {
        let args = parse(&[
            "brandshift", "analyze", "--input", "does-not-exist.csv", "--start", "2023", "--end",
            "2023", "--focal", "P1",
        ]);
        let err = analyze(args).unwrap_err();
        assert!(err.to_string().contains("configuration error"), "{err}");
    }
}
