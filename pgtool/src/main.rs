mod error;
mod io;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use pgcore::algorithm::alignment::{AlignmentParams, PolynomialAligner};
use pgcore::algorithm::clustering::{ClusterHooks, ClusterParams};
use pgcore::algorithm::compare::GroupOrder;
use pgcore::algorithm::correlation::{EicQuery, MassCutoff, TraceCorrelator};
use pgcore::algorithm::statistics::RankParams;
use pgcore::report::{column_order, group_summary_rows, peak_detail_rows};
use pgcore::{QuantType, Sample};

use crate::error::{Result, ToolError};

#[derive(Parser)]
#[command(name = "pgtool")]
#[command(about = "Cluster, rank and align peak-group tables", long_about = None)]
struct Cli {
    /// Input table (JSON)
    #[arg(short, long)]
    input: PathBuf,

    /// Output path; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Parameter file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Quality cutoff for good-peak counting
    #[arg(long)]
    min_quality: Option<f32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print group (or peak) rows as JSON
    Summary {
        #[arg(long, value_enum, default_value_t = QuantArg::AreaTop)]
        quant: QuantArg,
        /// One row per peak instead of one per group
        #[arg(long, default_value_t = false)]
        peaks: bool,
    },
    /// Correlation clustering of co-eluting groups
    Cluster {
        #[arg(long)]
        max_rt_diff: Option<f32>,
        #[arg(long)]
        min_rt_overlap: Option<f32>,
        #[arg(long)]
        min_sample_correlation: Option<f32>,
        #[arg(long)]
        min_rt_correlation: Option<f32>,
        /// Trace extraction tolerance in ppm
        #[arg(long)]
        ppm: Option<f32>,
    },
    /// Rank groups and sort the table
    Rank {
        #[arg(long, value_enum, default_value_t = OrderArg::Rank)]
        order: OrderArg,
        /// Penalize distance to the expected retention time
        #[arg(long, default_value_t = false)]
        delta_rt_check: bool,
    },
    /// Retention-time alignment across samples
    Align {
        #[arg(long)]
        degree: Option<usize>,
        #[arg(long)]
        max_iterations: Option<usize>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum QuantArg {
    AreaTop,
    Area,
    Height,
    AreaNotCorrected,
    RetentionTime,
    Quality,
    SnRatio,
    AreaTopNotCorrected,
}

impl From<QuantArg> for QuantType {
    fn from(q: QuantArg) -> Self {
        match q {
            QuantArg::AreaTop => QuantType::AreaTop,
            QuantArg::Area => QuantType::Area,
            QuantArg::Height => QuantType::Height,
            QuantArg::AreaNotCorrected => QuantType::AreaNotCorrected,
            QuantArg::RetentionTime => QuantType::RetentionTime,
            QuantArg::Quality => QuantType::Quality,
            QuantArg::SnRatio => QuantType::SNRatio,
            QuantArg::AreaTopNotCorrected => QuantType::AreaTopNotCorrected,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OrderArg {
    Rt,
    Mz,
    Intensity,
    Area,
    Quality,
    Rank,
    Ratio,
    PValue,
    C13,
    MetaGroup,
}

impl From<OrderArg> for GroupOrder {
    fn from(o: OrderArg) -> Self {
        match o {
            OrderArg::Rt => GroupOrder::Rt,
            OrderArg::Mz => GroupOrder::Mz,
            OrderArg::Intensity => GroupOrder::Intensity,
            OrderArg::Area => GroupOrder::Area,
            OrderArg::Quality => GroupOrder::Quality,
            OrderArg::Rank => GroupOrder::Rank,
            OrderArg::Ratio => GroupOrder::Ratio,
            OrderArg::PValue => GroupOrder::PValue,
            OrderArg::C13 => GroupOrder::C13,
            OrderArg::MetaGroup => GroupOrder::MetaGroup,
        }
    }
}

/// Parameters read from `--config`; command-line flags win.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct ToolConfig {
    min_quality: f32,
    cluster: ClusterParams,
    rank: RankParams,
    alignment: AlignmentParams,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            min_quality: 0.5,
            cluster: ClusterParams::default(),
            rank: RankParams::default(),
            alignment: AlignmentParams::default(),
        }
    }
}

impl ToolConfig {
    fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => io::read_json(p),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_quality) {
            return Err(pgcore::PgError::invalid("min_quality", "must lie in [0, 1]").into());
        }
        self.cluster.validate()?;
        self.rank.validate()?;
        self.alignment.validate()?;
        Ok(())
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = ToolConfig::load(cli.config.as_deref())?;
    if let Some(q) = cli.min_quality {
        config.min_quality = q;
    }

    let io::LoadedTable { mut table, eics } = io::load_table(&cli.input)?;
    let output = cli.output.as_deref();

    match cli.command {
        Commands::Summary { quant, peaks } => {
            config.validate()?;
            table.update_statistics(config.min_quality);
            let rendered = if peaks {
                serde_json::to_string_pretty(&peak_detail_rows(table.groups()))
            } else {
                serde_json::to_string_pretty(&group_summary_rows(table.groups(), &column_order(table.samples()), quant.into()))
            };
            let json = rendered.map_err(|source| ToolError::Json { path: "<output>".into(), source })?;
            return io::emit(output, &json);
        }
        Commands::Cluster { max_rt_diff, min_rt_overlap, min_sample_correlation, min_rt_correlation, ppm } => {
            let params = &mut config.cluster;
            if let Some(v) = max_rt_diff {
                params.max_rt_diff = v;
            }
            if let Some(v) = min_rt_overlap {
                params.min_rt_overlap = v;
            }
            if let Some(v) = min_sample_correlation {
                params.min_sample_correlation = v;
            }
            if let Some(v) = min_rt_correlation {
                params.min_rt_correlation = v;
            }
            if let Some(v) = ppm {
                params.mass_cutoff = MassCutoff::Ppm(v);
            }
            config.validate()?;
            table.update_statistics(config.min_quality);

            let hooks = ClusterHooks {
                progress: Some(Box::new(|done: usize, total: usize| log::info!("clustering {}/{}", done, total))),
                cancel: None,
            };
            let outcome = if eics.is_empty() {
                log::warn!("no traces in {}, peak-shape gate always passes", cli.input.display());
                let pass = |_: &Sample, _: &EicQuery| 1.0f32;
                table.cluster(&config.cluster, &pass, &hooks)
            } else {
                let store = TraceCorrelator::from_traces(eics.clone());
                table.cluster(&config.cluster, &store, &hooks)
            };
            log::info!("{} clusters over {} groups", outcome.clusters, table.len());
        }
        Commands::Rank { order, delta_rt_check } => {
            config.rank.delta_rt_check |= delta_rt_check;
            config.validate()?;
            table.update_statistics(config.min_quality);
            table.rank(&config.rank);
            let order: GroupOrder = order.into();
            table.sort(order);
            log::info!("ranked {} groups, sorted by {}", table.len(), order);
        }
        Commands::Align { degree, max_iterations } => {
            if let Some(d) = degree {
                config.alignment.polynomial_degree = d;
            }
            if let Some(n) = max_iterations {
                config.alignment.max_iterations = n;
            }
            config.validate()?;
            table.update_statistics(config.min_quality);
            let aligner = PolynomialAligner::new(config.alignment.clone());
            let report = table.align(&aligner);
            for fit in &report.fits {
                log::info!(
                    "sample {}: {} anchors, {} iterations, rmse {:.4}",
                    fit.sample_id,
                    fit.points,
                    fit.iterations,
                    fit.rmse
                );
            }
            if !report.skipped_samples.is_empty() {
                log::warn!("samples left unaligned: {:?}", report.skipped_samples);
            }
        }
    }

    io::emit(output, &io::to_json(&table, &eics)?)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
