use anyhow::{Context, bail};
use celltrack::{
    Experiment, TimePoint, about,
    cluster_finder::find_clusters,
    error_checker::{ErrorChecker, tracks_with_errors},
    io,
    lineage_drawing::export_lineage_svg,
    lineage_finder::find_cell_deaths,
    linking_differences::linking_differences,
    linking_errors::Severity,
    parameters::AnalysisParameters,
    position::Position,
    positions_comparison::{
        DEFAULT_REJECTION_DISTANCE_UM, DetectionCounts, DEFAULT_MAX_DISTANCE_UM, compare_positions,
    },
    tracks::TrackId,
};
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashSet},
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::Level;

#[derive(Serialize)]
struct ErrorRow {
    position: Position,
    code: u32,
    name: String,
    severity: Severity,
    message: String,
}

#[derive(Serialize)]
struct TrackSummary {
    id: TrackId,
    first_time_point: i32,
    last_time_point: i32,
    positions: usize,
    previous_tracks: Vec<TrackId>,
    next_tracks: Vec<TrackId>,
}

#[derive(Serialize)]
struct ComparisonSummary {
    totals: DetectionCounts,
    recall: f64,
    precision: f64,
    f1_score: f64,
    rejected: usize,
    per_time_point: BTreeMap<i32, DetectionCounts>,
}

struct GlobalOptions {
    config: Option<PathBuf>,
    log_level: Level,
}

fn usage() {
    eprintln!(
        "Usage:\n  \
  celltrack_cli --version\n  \
  celltrack_cli [--config PATH] [--log-level LEVEL] summary FILE\n  \
  celltrack_cli [--config PATH] [--log-level LEVEL] errors FILE\n  \
  celltrack_cli [--config PATH] [--log-level LEVEL] tracks FILE\n  \
  celltrack_cli [--config PATH] [--log-level LEVEL] clusters FILE TIME_POINT\n  \
  celltrack_cli [--config PATH] [--log-level LEVEL] deaths FILE\n  \
  celltrack_cli [--config PATH] [--log-level LEVEL] differences FILE\n  \
  celltrack_cli [--config PATH] [--log-level LEVEL] compare GROUND_TRUTH AUTOMATIC [MAX_UM]\n  \
  celltrack_cli [--config PATH] [--log-level LEVEL] lineage-svg FILE OUTPUT.svg\n  \
  celltrack_cli [--config PATH] [--log-level LEVEL] export-csv FILE OUTPUT.csv\n  \
  celltrack_cli [--config PATH] [--log-level LEVEL] convert INPUT OUTPUT.aut\n\n  \
  Data files are .aut or .json; the config file is a JSON parameter set"
    );
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let text =
        serde_json::to_string_pretty(value).context("Could not serialize JSON output")?;
    println!("{text}");
    Ok(())
}

fn parse_level(text: &str) -> anyhow::Result<Level> {
    Level::from_str(text.trim()).map_err(|_| anyhow::anyhow!("Unknown log level '{text}'"))
}

/// Reads the options before the command. Returns them and the index of the command.
fn parse_global_options(args: &[String]) -> anyhow::Result<(GlobalOptions, usize)> {
    let mut options = GlobalOptions {
        config: None,
        log_level: env::var("RUST_LOG")
            .ok()
            .and_then(|text| parse_level(&text).ok())
            .unwrap_or(Level::INFO),
    };
    let mut index = 1;
    while index < args.len() {
        match args[index].as_str() {
            "--config" => {
                let Some(path) = args.get(index + 1) else {
                    bail!("Missing path for --config");
                };
                options.config = Some(PathBuf::from(path));
            }
            "--log-level" => {
                let Some(level) = args.get(index + 1) else {
                    bail!("Missing level for --log-level");
                };
                options.log_level = parse_level(level)?;
            }
            _ => break,
        }
        index += 2;
    }
    Ok((options, index))
}

fn load_parameters(options: &GlobalOptions) -> anyhow::Result<AnalysisParameters> {
    match &options.config {
        Some(path) => AnalysisParameters::load_from_path(path)
            .with_context(|| format!("Could not read config '{}'", path.display())),
        None => Ok(AnalysisParameters::default()),
    }
}

fn load_experiment(path: &str, parameters: &AnalysisParameters) -> anyhow::Result<Experiment> {
    io::load_data_file(
        Path::new(path),
        parameters.min_time_point,
        parameters.max_time_point,
    )
    .with_context(|| format!("Could not load '{path}'"))
}

fn error_checker<'a>(experiment: &Experiment, parameters: &'a AnalysisParameters) -> ErrorChecker<'a> {
    let checker = ErrorChecker::new(parameters, experiment.resolution());
    match (
        experiment.first_time_point_number(),
        experiment.last_time_point_number(),
    ) {
        (Some(first), Some(last)) => checker.with_time_point_range(first, last),
        _ => checker,
    }
}

/// Fetches the positional arguments of a command, or prints the usage.
fn command_args<const N: usize>(args: &[String], command_index: usize) -> anyhow::Result<&[String; N]> {
    let start = command_index + 1;
    match args.get(start..start + N) {
        Some(values) => Ok(values.try_into()?),
        None => {
            usage();
            bail!("{} requires {N} argument(s)", args[command_index])
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        usage();
        bail!("Missing command");
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{}", about::version_cli_text());
        return Ok(());
    }

    let (options, command_index) = parse_global_options(&args)?;
    tracing_subscriber::fmt()
        .with_max_level(options.log_level)
        .with_target(false)
        .init();
    if args.len() <= command_index {
        usage();
        bail!("Missing command");
    }
    let parameters = load_parameters(&options)?;
    let command = args[command_index].as_str();

    match command {
        "summary" => {
            let [file] = command_args::<1>(&args, command_index)?;
            let experiment = load_experiment(file, &parameters)?;
            print_json(&experiment.summarize())
        }
        "errors" => {
            let [file] = command_args::<1>(&args, command_index)?;
            let experiment = load_experiment(file, &parameters)?;
            let annotations = error_checker(&experiment, &parameters).find_errors(
                experiment.links_baseline_else_scratch(),
                &experiment.scores,
                None,
            );
            tracing::info!(errors = annotations.len(), "Checked links");
            let rows: Vec<ErrorRow> = annotations
                .iter()
                .map(|(position, kind)| ErrorRow {
                    position,
                    code: kind.code(),
                    name: kind.to_string(),
                    severity: kind.severity(),
                    message: kind.message(),
                })
                .collect();
            print_json(&rows)
        }
        "tracks" => {
            let [file] = command_args::<1>(&args, command_index)?;
            let experiment = load_experiment(file, &parameters)?;
            let tracks = experiment.links_baseline_else_scratch().tracks();
            let summaries: Vec<TrackSummary> = tracks
                .iter()
                .map(|track| TrackSummary {
                    id: track.id(),
                    first_time_point: track.min_time_point_number(),
                    last_time_point: track.max_time_point_number(),
                    positions: track.len(),
                    previous_tracks: track.previous_tracks().to_vec(),
                    next_tracks: track.next_tracks().to_vec(),
                })
                .collect();
            print_json(&summaries)
        }
        "clusters" => {
            let [file, time_point] = command_args::<2>(&args, command_index)?;
            let time_point_number: i32 = time_point
                .parse()
                .with_context(|| format!("'{time_point}' is not a time point number"))?;
            let experiment = load_experiment(file, &parameters)?;
            let clusters: Vec<Vec<Position>> = find_clusters(
                &experiment.positions,
                &experiment.connections,
                TimePoint::new(time_point_number),
            )
            .into_iter()
            .map(|cluster| cluster.positions.into_iter().collect())
            .collect();
            print_json(&clusters)
        }
        "deaths" => {
            let [file] = command_args::<1>(&args, command_index)?;
            let experiment = load_experiment(file, &parameters)?;
            let Some(last) = experiment.last_time_point_number() else {
                return print_json(&Vec::<Position>::new());
            };
            print_json(&find_cell_deaths(
                experiment.links_baseline_else_scratch(),
                last,
            ))
        }
        "differences" => {
            let [file] = command_args::<1>(&args, command_index)?;
            let experiment = load_experiment(file, &parameters)?;
            print_json(&linking_differences(
                &experiment.scratch_links,
                &experiment.baseline_links,
            ))
        }
        "compare" => {
            let [ground_truth_file, automatic_file] = command_args::<2>(&args, command_index)?;
            let max_distance_um = match args.get(command_index + 3) {
                Some(text) => text
                    .parse()
                    .with_context(|| format!("'{text}' is not a distance"))?,
                None => DEFAULT_MAX_DISTANCE_UM,
            };
            let ground_truth = load_experiment(ground_truth_file, &parameters)?;
            let automatic = load_experiment(automatic_file, &parameters)?;
            let report = compare_positions(
                &ground_truth.positions,
                &automatic.positions,
                &ground_truth.resolution(),
                max_distance_um,
                DEFAULT_REJECTION_DISTANCE_UM,
            );
            tracing::info!("{report}");
            print_json(&ComparisonSummary {
                totals: report.totals,
                recall: report.recall(),
                precision: report.precision(),
                f1_score: report.f1_score(),
                rejected: report.rejected.len(),
                per_time_point: report.per_time_point.clone(),
            })
        }
        "lineage-svg" => {
            let [file, output] = command_args::<2>(&args, command_index)?;
            let experiment = load_experiment(file, &parameters)?;
            let links = experiment.links_baseline_else_scratch();
            let annotations =
                error_checker(&experiment, &parameters).find_errors(links, &experiment.scores, None);
            let tracks = links.tracks();
            let errored: HashSet<TrackId> =
                tracks_with_errors(&tracks, &annotations).into_iter().collect();
            let (svg, width) = export_lineage_svg(&tracks, |track| {
                if errored.contains(&track.id()) {
                    "red".to_string()
                } else {
                    "black".to_string()
                }
            });
            fs::write(output, svg)
                .with_context(|| format!("Could not write SVG output '{output}'"))?;
            println!("Wrote lineage tree of {width} column(s) to '{output}'");
            Ok(())
        }
        "export-csv" => {
            let [file, output] = command_args::<2>(&args, command_index)?;
            let experiment = load_experiment(file, &parameters)?;
            io::export_positions_to_csv(&experiment, Path::new(output))
                .with_context(|| format!("Could not write CSV output '{output}'"))?;
            println!("Wrote {} position(s) to '{output}'", experiment.positions.len());
            Ok(())
        }
        "convert" => {
            let [input, output] = command_args::<2>(&args, command_index)?;
            let experiment = load_experiment(input, &parameters)?;
            io::save_data_to_json(&experiment, Path::new(output))
                .with_context(|| format!("Could not save '{output}'"))?;
            println!("Converted '{input}' to '{output}'");
            Ok(())
        }
        _ => {
            usage();
            bail!("Unknown command '{command}'")
        }
    }
}
