//! Stockset CLI: download daily prices and prepare datasets.
//!
//! Commands:
//! - `listing`: save the instruments listed on a date
//! - `download`: save one `{code}.csv` per instrument selected by listings
//! - `index-members`: save index constituents for each day of a range
//! - `prepare`: aggregate a directory of per-symbol files into one dataset
//! - `inspect`: summarise a prepared dataset, optionally split it

mod obs;
mod progress;

use anyhow::{anyhow, bail, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use obs::LogFormat;
use progress::BarProgress;
use std::path::{Path, PathBuf};
use stockset_core::config::AppConfig;
use stockset_core::data::{Downloader, DumpMode, HistoryRequest, IndexKind, SyntheticProvider};
use stockset_core::dataset::meta::sidecar_path;
use stockset_core::dataset::{CsvDataSet, DataSet, Dataset, DatasetMeta};

#[derive(Parser)]
#[command(
    name = "stockset",
    about = "Stockset CLI: daily stock prices to date-ordered datasets"
)]
struct Cli {
    /// TOML config file. Flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `stockset_core=debug`. STOCKSET_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save the listing of one date as `{date}-stock_ids.csv`.
    Listing {
        /// Listing date (YYYY-MM-DD).
        #[arg(long, value_parser = parse_date)]
        date: NaiveDate,

        /// Output directory. Defaults to the configured listing directory.
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Use the built-in synthetic provider.
        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
    /// Download the history of every code selected by the start/end listings.
    Download {
        /// Start date (YYYY-MM-DD).
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,

        /// End date (YYYY-MM-DD).
        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,

        /// Which listing(s) select the codes.
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Comma-separated field list.
        #[arg(long, value_delimiter = ',')]
        fields: Option<Vec<String>>,

        /// Directory holding `{date}-stock_ids.csv`. Defaults to --dir.
        #[arg(long)]
        listing_dir: Option<PathBuf>,

        /// Output directory for `{code}.csv` files.
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Use the built-in synthetic provider.
        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
    /// Save index constituents for each day of a range.
    IndexMembers {
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,

        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,

        #[arg(long, value_enum)]
        index: Option<IndexArg>,

        #[arg(long)]
        dir: Option<PathBuf>,

        /// Use the built-in synthetic provider.
        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
    /// Aggregate per-symbol CSV files into one date-ordered dataset.
    Prepare {
        /// Directory of per-symbol files.
        #[arg(long)]
        source: PathBuf,

        /// Dataset file to create. Must not exist.
        #[arg(long)]
        dest: PathBuf,

        /// Keep the result in memory only; the destination file is removed.
        #[arg(long, default_value_t = false)]
        no_persist: bool,

        /// Lag of the returns column.
        #[arg(long)]
        delay_day: Option<usize>,

        /// Skip building the (date, code) index; duplicate keys are then kept.
        #[arg(long, default_value_t = false)]
        no_multi_index: bool,
    },
    /// Summarise a prepared dataset.
    Inspect {
        /// Dataset file.
        #[arg(long)]
        path: PathBuf,

        /// Train,validation,test ratios, e.g. 0.7,0.15,0.15.
        #[arg(long, value_delimiter = ',')]
        split: Option<Vec<f64>>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Start,
    End,
    Intersection,
    Union,
}

impl From<ModeArg> for DumpMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Start => DumpMode::StartDate,
            ModeArg::End => DumpMode::EndDate,
            ModeArg::Intersection => DumpMode::Intersection,
            ModeArg::Union => DumpMode::Union,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum IndexArg {
    Sz50,
    Hs300,
    Zz500,
}

impl From<IndexArg> for IndexKind {
    fn from(index: IndexArg) -> Self {
        match index {
            IndexArg::Sz50 => IndexKind::Sz50,
            IndexArg::Hs300 => IndexKind::Hs300,
            IndexArg::Zz500 => IndexKind::Zz500,
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    obs::init_tracing(&cli.log_level, cli.log_format)?;

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Listing {
            date,
            dir,
            synthetic,
        } => {
            let dir = dir.unwrap_or_else(|| config.fetch.listing_dir().to_path_buf());
            run_listing(date, &dir, synthetic)
        }
        Commands::Download {
            start,
            end,
            mode,
            fields,
            listing_dir,
            dir,
            synthetic,
        } => {
            let fetch = &mut config.fetch;
            if let Some(start) = start {
                fetch.start_date = start;
            }
            if let Some(end) = end {
                fetch.end_date = end;
            }
            if let Some(mode) = mode {
                fetch.mode = mode.into();
            }
            if let Some(fields) = fields {
                fetch.fields = fields;
            }
            if let Some(dir) = dir {
                fetch.data_dir = dir;
            }
            if listing_dir.is_some() {
                fetch.listing_dir = listing_dir;
            }
            config.validate()?;
            run_download(&config, synthetic)
        }
        Commands::IndexMembers {
            start,
            end,
            index,
            dir,
            synthetic,
        } => {
            let fetch = &mut config.fetch;
            if let Some(start) = start {
                fetch.start_date = start;
            }
            if let Some(end) = end {
                fetch.end_date = end;
            }
            if let Some(index) = index {
                fetch.index = index.into();
            }
            if let Some(dir) = dir {
                fetch.data_dir = dir;
            }
            config.validate()?;
            run_index_members(&config, synthetic)
        }
        Commands::Prepare {
            source,
            dest,
            no_persist,
            delay_day,
            no_multi_index,
        } => {
            if let Some(delay_day) = delay_day {
                config.dataset.delay_day = delay_day;
            }
            if no_multi_index {
                config.dataset.use_multi_index = false;
            }
            config.validate()?;
            run_prepare(&config, &source, &dest, !no_persist)
        }
        Commands::Inspect { path, split } => run_inspect(&config, &path, split),
    }
}

/// The only bundled provider. A vendor-backed `HistoryProvider` plugs in here.
fn provider(synthetic: bool) -> Result<SyntheticProvider> {
    if !synthetic {
        bail!("no network history provider is bundled; pass --synthetic to use generated data");
    }
    Ok(SyntheticProvider::new())
}

fn run_listing(date: NaiveDate, dir: &Path, synthetic: bool) -> Result<()> {
    let mut downloader = Downloader::new(provider(synthetic)?);
    let path = downloader.dump_listing(date, dir)?;
    println!("Listing saved to: {}", path.display());
    Ok(())
}

fn run_download(config: &AppConfig, synthetic: bool) -> Result<()> {
    let fetch = &config.fetch;
    let request = HistoryRequest {
        start: fetch.start_date,
        end: fetch.end_date,
        fields: fetch.fields.clone(),
        mode: fetch.mode,
        listing_dir: fetch.listing_dir().to_path_buf(),
        save_dir: fetch.data_dir.clone(),
    };

    let mut downloader = Downloader::new(provider(synthetic)?).with_span(tracing::info_span!(
        "download",
        mode = ?fetch.mode,
        dir = %fetch.data_dir.display()
    ));
    let summary = downloader.dump_history(&request, &BarProgress::new("download"))?;

    println!(
        "Downloaded {}/{} symbols to {}",
        summary.succeeded,
        summary.total,
        fetch.data_dir.display()
    );
    if !summary.all_succeeded() {
        for (code, err) in &summary.errors {
            eprintln!("Error for {code}: {err}");
        }
        bail!("{} of {} downloads failed", summary.failed, summary.total);
    }
    Ok(())
}

fn run_index_members(config: &AppConfig, synthetic: bool) -> Result<()> {
    let fetch = &config.fetch;
    let mut downloader = Downloader::new(provider(synthetic)?).with_span(tracing::info_span!(
        "index_members",
        index = fetch.index.name(),
        dir = %fetch.data_dir.display()
    ));
    let files = downloader.dump_index_members(
        fetch.start_date,
        fetch.end_date,
        fetch.index,
        &fetch.data_dir,
    )?;
    println!(
        "Saved {} {} constituent file(s) to {}",
        files.len(),
        fetch.index.name(),
        fetch.data_dir.display()
    );
    Ok(())
}

fn run_prepare(config: &AppConfig, source: &Path, dest: &Path, persist: bool) -> Result<()> {
    let mut dataset = CsvDataSet::new(config.dataset.clone())
        .with_span(tracing::info_span!(
            "prepare",
            source = %source.display(),
            dest = %dest.display()
        ))
        .with_progress(BarProgress::new("prepare"));
    let data = dataset.prepare(source, dest, persist)?;

    print_summary(data)?;
    if persist {
        println!("Dataset saved to: {}", dest.display());
    }
    Ok(())
}

fn run_inspect(config: &AppConfig, path: &Path, split: Option<Vec<f64>>) -> Result<()> {
    let mut dataset = CsvDataSet::new(config.dataset.clone());
    let data = dataset.load(path)?;
    print_summary(data)?;
    println!("{}", data.frame().head(Some(5)));

    let meta_path = sidecar_path(path);
    if meta_path.exists() {
        let meta = DatasetMeta::read(&meta_path)?;
        println!();
        println!("--- Metadata ---");
        println!("{}", serde_json::to_string_pretty(&meta)?);
    }

    if let Some(ratios) = split {
        let ratios: [f64; 3] = ratios
            .try_into()
            .map_err(|_| anyhow!("--split takes exactly three ratios"))?;
        let parts = dataset.split(ratios)?;
        println!();
        println!("--- Split ---");
        println!("Train:          {} rows", parts.train.height());
        println!("Validation:     {} rows", parts.validation.height());
        println!("Test:           {} rows", parts.test.height());
    }
    Ok(())
}

fn print_summary(data: &Dataset) -> Result<()> {
    println!();
    println!("=== Dataset ===");
    println!("Rows:           {}", data.height());
    println!("Symbols:        {}", data.codes()?.len());
    if let Some((start, end)) = data.date_range()? {
        println!("Period:         {start} to {end}");
    }
    println!("Indexed:        {}", data.is_indexed());
    println!("Columns:        {}", data.columns().join(", "));
    println!();
    Ok(())
}
