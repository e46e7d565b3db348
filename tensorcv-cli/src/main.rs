// tensorcv command line interface
// Descriptor matching, benchmarks and binding configuration from the shell

mod input;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use input::{read_descriptors, InputFormat};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::path::PathBuf;
use std::time::Instant;
use tensorcv_core::descriptor::validate_descriptor_length;
use tensorcv_core::{
    BinaryMatcher, BindingConfig, DescriptorSet, MatchOptions, MatchReport, SearchRange,
};
use tensorcv_vision::{Binding, HostFunction};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tensorcv")]
#[command(about = "Binary descriptor matching and vision bindings", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Binding configuration file (JSON or TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Match two descriptor files
    Match {
        /// Query descriptors
        query: PathBuf,

        /// Train descriptors
        train: PathBuf,

        /// Accept matches strictly closer than this many bits
        #[arg(long, short)]
        threshold: Option<i64>,

        /// Row width for raw files and empty JSON arrays
        #[arg(long, default_value = "64")]
        bytes_per_descriptor: usize,

        #[arg(long, value_enum, default_value = "auto")]
        input: InputFormat,

        /// Consider every train row, not only rows at or after the query row
        #[arg(long)]
        full_scan: bool,

        /// Spread query rows over all cores
        #[arg(long)]
        parallel: bool,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Time the matcher on random descriptor sets
    Bench {
        #[arg(long, default_value = "2000")]
        rows: usize,

        #[arg(long, default_value = "64")]
        bytes_per_descriptor: usize,

        #[arg(long, default_value = "64")]
        threshold: u32,

        /// Bits flipped in each query row relative to its train row
        #[arg(long, default_value = "16")]
        noise: usize,

        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Only check that the configuration is valid
        #[arg(long)]
        check: bool,
    },

    /// List host functions and whether this build provides them
    Exports {
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Match {
            query,
            train,
            threshold,
            bytes_per_descriptor,
            input,
            full_scan,
            parallel,
            format,
        } => {
            let mut config = config;
            if full_scan {
                config.matcher.search_range = SearchRange::Full;
            }
            config.matcher.parallel |= parallel;
            let threshold = threshold.unwrap_or(config.matcher.threshold as i64);
            let binding = Binding::new(config)?;

            let query = read_descriptors(&query, input, bytes_per_descriptor)?;
            let train = read_descriptors(&train, input, bytes_per_descriptor)?;
            let report = binding.match_freak(&query.to_tensor()?, &train.to_tensor()?, threshold)?;
            print_report(&report, format)?;
        }
        Commands::Bench {
            rows,
            bytes_per_descriptor,
            threshold,
            noise,
            seed,
        } => {
            run_bench(rows, bytes_per_descriptor, threshold, noise, seed)?;
        }
        Commands::Config { check } => {
            Binding::new(config.clone())?;
            if check {
                println!("configuration is valid");
            } else {
                print!("{}", config.to_toml()?);
            }
        }
        Commands::Exports { json } => {
            let binding = Binding::new(config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&binding.describe())?);
            } else {
                for f in HostFunction::ALL {
                    let status = if f.is_available() { "available" } else { "needs opencv" };
                    println!("  {:<28} {}", f.name(), status);
                }
            }
        }
        Commands::Version => {
            let binding = Binding::new(config)?;
            println!("tensorcv {}", env!("CARGO_PKG_VERSION"));
            println!("vision library: {}", binding.version());
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<BindingConfig> {
    let mut config = match path {
        Some(path) => BindingConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => BindingConfig::default(),
    };
    config.apply_env();
    Ok(config)
}

fn print_report(report: &MatchReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let value = json!({
                "count": report.count(),
                "query_rows": report.query_rows,
                "train_rows": report.train_rows,
                "matches": report.matches,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Table => {
            println!("{:>8} {:>8} {:>8}", "query", "train", "distance");
            for m in &report.matches {
                println!("{:>8} {:>8} {:>8}", m.query, m.train, m.distance);
            }
            println!(
                "{} matches ({} query rows, {} train rows)",
                report.count(),
                report.query_rows,
                report.train_rows
            );
        }
    }
    Ok(())
}

/// Train rows are random; query row i is train row i with `noise` bits flipped.
fn random_sets(
    rows: usize,
    bytes: usize,
    noise: usize,
    seed: u64,
) -> anyhow::Result<(DescriptorSet, DescriptorSet)> {
    validate_descriptor_length(bytes)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = vec![0u8; rows * bytes];
    rng.fill(train.as_mut_slice());
    let mut query = train.clone();
    for row in query.chunks_exact_mut(bytes) {
        for _ in 0..noise {
            let bit = rng.gen_range(0..bytes * 8);
            row[bit / 8] ^= 1 << (bit % 8);
        }
    }
    Ok((
        DescriptorSet::new(query, bytes)?,
        DescriptorSet::new(train, bytes)?,
    ))
}

fn run_bench(
    rows: usize,
    bytes: usize,
    threshold: u32,
    noise: usize,
    seed: u64,
) -> anyhow::Result<()> {
    let (query, train) = random_sets(rows, bytes, noise, seed)?;
    info!(rows, bytes, threshold, noise, "starting matcher benchmark");

    println!("Hamming matcher: {} x {} descriptors of {} bytes", rows, rows, bytes);
    println!("----------------------------------------------------");
    for search_range in [SearchRange::FromRow, SearchRange::Full] {
        for parallel in [false, true] {
            let matcher = BinaryMatcher::new(MatchOptions {
                search_range,
                parallel,
            });
            let start = Instant::now();
            let report = matcher.run(&query, &train, threshold)?;
            let duration = start.elapsed();
            let comparisons = match search_range {
                SearchRange::FromRow => rows * (rows + 1) / 2,
                SearchRange::Full => rows * rows,
            };
            println!(
                "  {:<9} {:<10} {:>6} matches in {:?} ({:.2} M comparisons/sec)",
                format!("{:?}", search_range),
                if parallel { "parallel" } else { "sequential" },
                report.count(),
                duration,
                comparisons as f64 / duration.as_secs_f64().max(f64::EPSILON) / 1e6
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_sets_are_reproducible() {
        let (q1, t1) = random_sets(10, 8, 2, 7).unwrap();
        let (q2, t2) = random_sets(10, 8, 2, 7).unwrap();
        assert_eq!(q1, q2);
        assert_eq!(t1, t2);
    }

    #[test]
    fn test_random_sets_reject_bad_width() {
        assert!(random_sets(4, 0, 1, 1).is_err());
        assert!(random_sets(4, 12, 1, 1).is_err());
        let (query, _) = random_sets(0, 8, 1, 1).unwrap();
        assert!(query.is_empty());
    }

    #[test]
    fn test_bench_rejects_zero_width() {
        assert!(run_bench(4, 0, 10, 1, 1).is_err());
    }

    #[test]
    fn test_noisy_query_matches_its_own_row() {
        let (query, train) = random_sets(50, 64, 4, 1).unwrap();
        let report = BinaryMatcher::default().run(&query, &train, 64).unwrap();
        // at most 4 flipped bits, random rows differ by ~256
        assert_eq!(report.count(), 50);
        assert!(report.matches.iter().all(|m| m.query == m.train && m.distance <= 4));
    }

    #[test]
    fn test_cli_parses_match() {
        let cli = Cli::try_parse_from([
            "tensorcv", "match", "a.bin", "b.bin", "--threshold", "30", "--full-scan",
        ])
        .unwrap();
        match cli.command {
            Commands::Match {
                threshold,
                full_scan,
                ..
            } => {
                assert_eq!(threshold, Some(30));
                assert!(full_scan);
            }
            _ => panic!("expected match"),
        }
    }
}
