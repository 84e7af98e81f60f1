//! `udrs` CLI: analyze tracked deliveries, run synthetic scenarios.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sim::record::{save_record, DeliveryRecord};
use sim::scenarios::{Scenario, ScenarioKind};
use std::path::PathBuf;
use trajectory_core::export::{parse_observations, write_report, AnalysisReport};
use trajectory_core::pipeline::{Analysis, Pipeline, PipelineConfig};

#[derive(Parser)]
#[command(name = "udrs", about = "Ball-trajectory analysis and LBW decision engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a tracked observation sequence and produce a decision report.
    Analyze {
        /// Path to the observation JSON (one record per tracked frame)
        input: PathBuf,
        /// Pipeline configuration JSON (defaults apply when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the full analysis report to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Generate a named synthetic scenario and analyze it end to end.
    RunScenario {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Write the full analysis report to this file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also save the generated observations + ground truth
        #[arg(long)]
        save_record: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            config,
            output,
        } => run_analyze(&input, config.as_deref(), output.as_deref()),
        Commands::RunScenario {
            scenario,
            seed,
            output,
            save_record: record_path,
        } => run_scenario(&scenario, seed, output.as_deref(), record_path.as_deref()),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) => {
            let json = std::fs::read_to_string(p)
                .with_context(|| format!("reading config {}", p.display()))?;
            Ok(PipelineConfig::from_json_str(&json)?)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn run_analyze(
    input: &std::path::Path,
    config_path: Option<&std::path::Path>,
    output: Option<&std::path::Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let file = std::fs::File::open(input)
        .with_context(|| format!("opening observations {}", input.display()))?;
    let observations = parse_observations(std::io::BufReader::new(file))?;
    println!(
        "Analyzing {} ({} tracked frames)...",
        input.display(),
        observations.len()
    );

    let frame_rate = config.frame_rate;
    let pipeline = Pipeline::new(config)?;
    let analysis = pipeline.run(&observations)?;
    print_summary(&analysis);

    if let Some(opath) = output {
        let report = AnalysisReport::from_analysis(&analysis, frame_rate);
        let file = std::fs::File::create(opath)?;
        write_report(std::io::BufWriter::new(file), &report)?;
        println!("Report saved to {}", opath.display());
    }
    Ok(())
}

fn run_scenario(
    kind: &ScenarioKind,
    seed: u64,
    output: Option<&std::path::Path>,
    record_path: Option<&std::path::Path>,
) -> Result<()> {
    let scenario = Scenario::build(kind, seed);
    println!("Running scenario '{}' (seed={seed})...", scenario.name);

    let (observations, ground_truth) = scenario.generate();
    println!(
        "Generated {} frames ({} detected)",
        observations.len(),
        observations.iter().filter(|o| o.detected).count()
    );

    if let Some(rpath) = record_path {
        let record = DeliveryRecord {
            scenario_name: scenario.name.clone(),
            seed,
            frame_rate: scenario.frame_rate,
            observations: observations.clone(),
            ground_truth,
        };
        save_record(&record, rpath)?;
        println!("Record saved to {}", rpath.display());
    }

    let config = PipelineConfig {
        frame_rate: scenario.frame_rate,
        ..Default::default()
    };
    let frame_rate = config.frame_rate;
    let pipeline = Pipeline::new(config)?;
    let analysis = pipeline.run(&observations)?;
    print_summary(&analysis);

    if let Some(opath) = output {
        let report = AnalysisReport::from_analysis(&analysis, frame_rate);
        let file = std::fs::File::create(opath)?;
        write_report(std::io::BufWriter::new(file), &report)?;
        println!("Report saved to {}", opath.display());
    }
    Ok(())
}

fn print_summary(analysis: &Analysis) {
    let d = &analysis.decision;
    println!(
        "Verdict: {:?}  (impact x={:.3} y={:.3} z={:.3} m, margin {:+.3} m)",
        d.verdict, d.impact_point.x, d.impact_point.y, d.impact_point.z, d.margin
    );
    println!(
        "Track: {} filtered frames, {} world states, {} arc(s), {} bounce(s)",
        analysis.filtered.len(),
        analysis.world_track.len(),
        analysis.trajectory.arcs.len(),
        analysis.trajectory.bounces.len()
    );
    println!(
        "Timing: smooth {}µs, reconstruct {}µs, predict {}µs, decide {}µs (total {}µs)",
        analysis.timings.smooth_us,
        analysis.timings.reconstruct_us,
        analysis.timings.predict_us,
        analysis.timings.decide_us,
        analysis.timings.total_us
    );
}
