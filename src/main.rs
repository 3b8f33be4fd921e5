use std::env;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use osmpbfreader::OsmPbfReader;
use tracing::level_filters::LevelFilter;

use osm_tag_normalizer::logging::{init_logging, LogConfig, LogFormat};
use osm_tag_normalizer::osm::{pbf_entities, InputFormat, OsmXmlEntities};
use osm_tag_normalizer::{CsvSink, NormalizationPipeline, PipelineSummary, ReferenceTable};

#[derive(Parser)]
#[command(
    name = "osm-tag-normalizer",
    version,
    about = "Normalize OpenStreetMap tags into CSV tables",
    long_about = "Normalize OpenStreetMap node and way tags into CSV tables.\n\n\
                  Postal codes, counties and states are cleaned and checked \
                  against the Census FIPS county table."
)]
struct Cli {
    /// Path to a .osm or .pbf file. Defaults to the only one in the current folder.
    #[arg(long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Census county FIPS table (StateName,State_FIPS,County_FIPS,County_Name,FIPS_Class).
    #[arg(long, value_name = "FILE")]
    fips: PathBuf,

    /// Directory receiving nodes.csv, nodes_tags.csv, ways.csv, ways_tags.csv and ways_nodes.csv.
    #[arg(long = "output-dir", value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Input format; `auto` picks XML for `.osm` and PBF otherwise.
    #[arg(long, value_enum, default_value = "auto")]
    format: FormatArg,

    /// Worker threads used to resolve entities.
    #[arg(long, short = 'j', default_value_t = 1)]
    jobs: usize,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    verbosity: Verbosity<WarnLevel>,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum)]
    log_level: Option<LogLevelArg>,

    /// Log output format.
    #[arg(long = "log-format", value_enum, default_value = "pretty")]
    log_format: LogFormatArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Auto,
    Xml,
    Pbf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let level_filter = match cli.log_level {
        Some(LogLevelArg::Error) => LevelFilter::ERROR,
        Some(LogLevelArg::Warn) => LevelFilter::WARN,
        Some(LogLevelArg::Info) => LevelFilter::INFO,
        Some(LogLevelArg::Debug) => LevelFilter::DEBUG,
        Some(LogLevelArg::Trace) => LevelFilter::TRACE,
        None => cli.verbosity.tracing_level_filter(),
    };
    LogConfig {
        level_filter,
        use_env_filter: !(cli.verbosity.is_present() || cli.log_level.is_some()),
        format: match cli.log_format {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        },
        with_ansi: io::stderr().is_terminal(),
    }
}

fn find_default_input(folder: &Path) -> Result<PathBuf> {
    let mut inputs = Vec::new();
    for entry in folder
        .read_dir()
        .with_context(|| format!("failed to list {}", folder.display()))?
    {
        let path = entry?.path();
        if matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("osm" | "pbf")
        ) {
            inputs.push(path);
        }
    }
    inputs.sort();

    match inputs.len() {
        0 => bail!("no .osm or .pbf files found in {}", folder.display()),
        1 => Ok(inputs.remove(0)),
        _ => bail!("multiple .osm/.pbf files found; pass --input explicitly"),
    }
}

fn input_format(path: &Path, format: FormatArg) -> InputFormat {
    match format {
        FormatArg::Auto => InputFormat::from_path(path),
        FormatArg::Xml => InputFormat::Xml,
        FormatArg::Pbf => InputFormat::Pbf,
    }
}

fn normalize(cli: &Cli, input_path: &Path) -> Result<PipelineSummary> {
    let lookup = ReferenceTable::load(&cli.fips)
        .with_context(|| format!("failed to load FIPS table {}", cli.fips.display()))?;
    let pipeline = NormalizationPipeline::new(lookup).with_jobs(cli.jobs);
    let mut sink = CsvSink::create(&cli.output_dir)
        .with_context(|| format!("failed to create tables in {}", cli.output_dir.display()))?;

    let summary = match input_format(input_path, cli.format) {
        InputFormat::Xml => {
            let entities = OsmXmlEntities::open(input_path)
                .with_context(|| format!("failed to open {}", input_path.display()))?;
            pipeline.run(entities, &mut sink)
        }
        InputFormat::Pbf => {
            let file = File::open(input_path)
                .with_context(|| format!("failed to open {}", input_path.display()))?;
            let mut pbf = OsmPbfReader::new(file);
            pipeline.run(pbf_entities(&mut pbf), &mut sink)
        }
    };
    summary.with_context(|| format!("failed to normalize {}", input_path.display()))
}

fn run(cli: &Cli) -> Result<()> {
    let input_path = match &cli.input {
        Some(path) => path.clone(),
        None => find_default_input(&env::current_dir()?)?,
    };
    let summary = normalize(cli, &input_path)?;
    println!("{}", summary_line(&summary));
    Ok(())
}

fn summary_line(summary: &PipelineSummary) -> String {
    format!(
        "{} nodes, {} ways, {} tag rows ({} tags dropped, {} unidentifiable values)",
        summary.nodes, summary.ways, summary.records, summary.dropped_tags, summary.unidentifiable
    )
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = init_logging(&log_config_from_cli(&cli)) {
        eprintln!("error: failed to initialize logging: {err}");
        std::process::exit(1);
    }
    if let Err(err) = run(&cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn default_input_is_the_only_osm_or_pbf() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join("wv.osm"), "<osm/>").unwrap();
        assert_eq!(
            find_default_input(dir.path()).unwrap(),
            dir.path().join("wv.osm")
        );

        fs::write(dir.path().join("wv.osm.pbf"), "").unwrap();
        assert!(find_default_input(dir.path()).is_err());
    }

    #[test]
    fn default_input_requires_a_candidate() {
        let dir = tempdir().unwrap();
        assert!(find_default_input(dir.path()).is_err());
    }

    #[test]
    fn cli_defaults_and_format_override() {
        let cli = Cli::try_parse_from(["osm-tag-normalizer", "--fips", "fips.csv"]).unwrap();
        assert_eq!(cli.output_dir, PathBuf::from("."));
        assert_eq!(cli.jobs, 1);
        assert_eq!(
            input_format(Path::new("wv.osm"), cli.format),
            InputFormat::Xml
        );

        let cli = Cli::try_parse_from([
            "osm-tag-normalizer",
            "--fips",
            "fips.csv",
            "--format",
            "pbf",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(
            input_format(Path::new("wv.osm"), cli.format),
            InputFormat::Pbf
        );
        let config = log_config_from_cli(&cli);
        assert_eq!(config.level_filter, LevelFilter::DEBUG);
        assert!(!config.use_env_filter);
    }

    #[test]
    fn summary_counts_every_unidentifiable_value() {
        let summary = PipelineSummary {
            entities: 2,
            nodes: 1,
            ways: 1,
            records: 5,
            dropped_tags: 1,
            unidentifiable: 2,
            cancelled: false,
        };
        assert_eq!(
            summary_line(&summary),
            "1 nodes, 1 ways, 5 tag rows (1 tags dropped, 2 unidentifiable values)"
        );
    }

    #[test]
    fn fips_table_is_required() {
        assert!(Cli::try_parse_from(["osm-tag-normalizer"]).is_err());
    }
}
