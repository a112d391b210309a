//! Command-line interface for `sbox-ineq`.

#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use sbox_core::{catalog, record, SBox, TableKind, TransitionSet};
use sbox_ineq_gen::{
    run_batch, validate, DirectSearchBounds, InequalitySet, JobConfig, JobOutcome, Strategy,
    Summary, TieBreak, TieBreakRule,
};

/// S-box linear inequality generator.
#[derive(Parser)]
#[command(
    name = "sboxineq",
    version,
    author,
    about = "Minimal linear inequality descriptions of S-box property tables"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where S-boxes come from.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct Source {
    /// JSON file with an array of S-box records.
    #[arg(long, value_name = "FILE")]
    input: Option<PathBuf>,
    /// Name of a built-in S-box (see `list`).
    #[arg(long, value_name = "NAME")]
    builtin: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    /// One `[a_1, ..., a_n, b]` list per line.
    Text,
    /// JSON array of lists.
    Json,
    /// `bincode` encoding of the full job outcome.
    Bin,
}

impl OutputFormat {
    fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Json => "json",
            OutputFormat::Bin => "bin",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate inequalities for every S-box of the source.
    Run {
        #[command(flatten)]
        source: Source,
        /// TOML job configuration; flags override its values.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Property table (difference, linear, boomerang, division).
        #[arg(long)]
        table: Option<TableKind>,
        /// Cover strategy (greedy, exact, direct, search-reduce).
        #[arg(long)]
        strategy: Option<Strategy>,
        /// Facets summed per augmented candidate; below 2 disables augmentation.
        #[arg(long)]
        arity: Option<usize>,
        /// Greedy tie-break rule (first, last, middle, random).
        #[arg(long)]
        tie_break: Option<TieBreak>,
        /// Seed for the random tie-break rule.
        #[arg(long)]
        seed: Option<u64>,
        /// Coefficient bound for the direct strategies.
        #[arg(long, requires = "constant_bound")]
        coefficient_bound: Option<i64>,
        /// Constant bound for the direct strategies.
        #[arg(long, requires = "coefficient_bound")]
        constant_bound: Option<i64>,
        /// Node budget of one direct search round.
        #[arg(long)]
        round_node_limit: Option<usize>,
        /// Directory for one inequality file per S-box.
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
        /// Format of the inequality files.
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Write the batch summaries as JSON.
        #[arg(long, value_name = "FILE")]
        summary: Option<PathBuf>,
    },
    /// Print a property table.
    Table {
        #[command(flatten)]
        source: Source,
        /// Property table to print.
        #[arg(long, default_value_t = TableKind::Difference)]
        table: TableKind,
    },
    /// Check an inequality file against a property table.
    Check {
        #[command(flatten)]
        source: Source,
        /// Property table the inequalities describe.
        #[arg(long, default_value_t = TableKind::Difference)]
        table: TableKind,
        /// Inequality file in text format.
        #[arg(long, value_name = "FILE")]
        inequalities: PathBuf,
    },
    /// List the built-in S-boxes.
    List,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            source,
            config,
            table,
            strategy,
            arity,
            tie_break,
            seed,
            coefficient_bound,
            constant_bound,
            round_node_limit,
            out_dir,
            format,
            summary,
        } => {
            let mut job = match &config {
                Some(path) => JobConfig::load(path)?,
                None => JobConfig::default(),
            };
            if let Some(table) = table {
                job.table = table;
            }
            if let Some(strategy) = strategy {
                job.strategy = strategy;
            }
            if let Some(arity) = arity {
                job.augment_arity = arity;
            }
            if let Some(rule) = tie_break {
                job.tie_break = TieBreakRule::from(rule);
            }
            if let Some(seed) = seed {
                job.seed = seed;
            }
            if let (Some(coefficient), Some(constant)) = (coefficient_bound, constant_bound) {
                job.bounds = Some(DirectSearchBounds {
                    coefficient,
                    constant,
                });
            }
            if let Some(limit) = round_node_limit {
                job.round_node_limit = limit;
            }
            job.check()?;
            cmd_run(&source, &job, out_dir.as_deref(), format, summary.as_deref())
        }
        Commands::Table { source, table } => cmd_table(&source, table),
        Commands::Check {
            source,
            table,
            inequalities,
        } => cmd_check(&source, table, &inequalities),
        Commands::List => cmd_list(),
    }
}

fn cmd_run(
    source: &Source,
    job: &JobConfig,
    out_dir: Option<&Path>,
    format: OutputFormat,
    summary_path: Option<&Path>,
) -> Result<()> {
    let sboxes = load_sboxes(source)?;
    info!(
        "running {} jobs ({} table, {} strategy)",
        sboxes.len(),
        job.table,
        job.strategy
    );
    if let Some(dir) = out_dir {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }

    let reports = run_batch(&sboxes, job);
    let mut summaries: Vec<Summary> = Vec::new();
    let mut failures = 0usize;
    println!("{}", Summary::header());
    for report in &reports {
        match &report.result {
            Ok(outcome) => {
                println!("{}", outcome.summary);
                if let Some(dir) = out_dir {
                    write_outcome(dir, outcome, format)?;
                }
                summaries.push(outcome.summary.clone());
            }
            Err(err) => {
                failures += 1;
                println!("{:<16} FAILED: {err}", report.name);
            }
        }
    }

    if let Some(path) = summary_path {
        let json = serde_json::to_string_pretty(&summaries).context("serialize summary")?;
        fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    }
    if failures > 0 {
        bail!("{failures} of {} jobs failed", reports.len());
    }
    Ok(())
}

fn cmd_table(source: &Source, kind: TableKind) -> Result<()> {
    for sbox in load_sboxes(source)? {
        let table = kind
            .generate(&sbox)
            .with_context(|| format!("{kind} table of {}", sbox.name()))?;
        println!("{} ({kind}):", sbox.name());
        print!("{table}");
    }
    Ok(())
}

fn cmd_check(source: &Source, kind: TableKind, path: &Path) -> Result<()> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let set = InequalitySet::parse_text(&text).context("parse inequalities")?;
    let mut failures = 0usize;
    for sbox in load_sboxes(source)? {
        if let Some(ineq) = set.iter().find(|ineq| ineq.dims() != sbox.point_bits() as usize) {
            bail!(
                "{ineq} has {} coefficients but {} needs {}",
                ineq.dims(),
                sbox.name(),
                sbox.point_bits()
            );
        }
        let table = kind
            .generate(&sbox)
            .with_context(|| format!("{kind} table of {}", sbox.name()))?;
        let transitions = TransitionSet::from_table(&table);
        match validate(&transitions, &set) {
            Ok(()) => println!("{}: ok ({} inequalities)", sbox.name(), set.len()),
            Err(err) => {
                failures += 1;
                println!("{}: {err}", sbox.name());
            }
        }
    }
    if failures > 0 {
        bail!("inequalities do not describe {failures} S-box tables");
    }
    Ok(())
}

fn cmd_list() -> Result<()> {
    for name in catalog::names() {
        if let Some(sbox) = catalog::builtin(name) {
            println!(
                "{:<12} {}x{} bits",
                name,
                sbox.input_bits(),
                sbox.output_bits()
            );
        }
    }
    Ok(())
}

fn load_sboxes(source: &Source) -> Result<Vec<SBox>> {
    match (&source.input, &source.builtin) {
        (Some(path), _) => {
            let json =
                fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
            record::parse_records(&json).with_context(|| format!("parse {}", path.display()))
        }
        (None, Some(name)) => match catalog::builtin(name) {
            Some(sbox) => Ok(vec![sbox]),
            None => bail!("unknown built-in S-box '{name}'"),
        },
        (None, None) => bail!("either --input or --builtin is required"),
    }
}

fn write_outcome(dir: &Path, outcome: &JobOutcome, format: OutputFormat) -> Result<()> {
    let path = dir.join(format!("{}.{}", outcome.name, format.extension()));
    let bytes = match format {
        OutputFormat::Text => outcome.inequalities.to_text().into_bytes(),
        OutputFormat::Json => {
            serde_json::to_vec_pretty(&outcome.inequalities).context("serialize inequalities")?
        }
        OutputFormat::Bin => outcome.to_bytes().context("serialize outcome")?,
    };
    fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
