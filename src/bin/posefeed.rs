use std::{path::PathBuf, sync::Arc};

use clap::{Parser, ValueEnum};
use colored::Colorize;
use posefeed::{
    CancellationToken, DryRunEngine, EngineConfig, FrameSource, HeadlessViewer, PoseEngine,
    ReconstructionType, ReplayError, RunConfig, RunMode, RunReport, SessionFactory,
    TerminalViewer, VideoFile, Visualization, reconstruct, set_decoder_log_level,
};

const CLI_AFTER_HELP: &str = "Examples:\n  posefeed -v orb_vocab.dbow2 -i walk.mp4 -c camera.yaml -p walk.map --auto-term\n  posefeed -v orb_vocab.dbow2 -i walk.mp4 -c camera.yaml -p walk.map -t localization --trajectory-path walk_tum.txt\n  posefeed -v orb_vocab.dbow2 -i walk.mp4 -c camera.yaml -t slam --frame-skip 2 --no-sleep --viewer headless";

#[derive(Debug, Parser)]
#[command(
    name = "posefeed",
    version,
    about = "Replay a recorded video into a pose-estimation engine",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    /// Vocabulary file path.
    #[arg(short = 'v', long)]
    vocab: PathBuf,

    /// Video file path.
    #[arg(short = 'i', long)]
    video_path: PathBuf,

    /// Engine configuration (YAML) path.
    #[arg(short = 'c', long)]
    config: PathBuf,

    /// Mask image, or a directory of per-frame masks named NNNN.jpg.
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Feed only frames whose index is a multiple of this.
    #[arg(long, default_value_t = 1)]
    frame_skip: u64,

    /// Feed as fast as possible instead of at the camera frame rate.
    #[arg(long)]
    no_sleep: bool,

    /// Close the viewer once feeding finishes.
    #[arg(long)]
    auto_term: bool,

    /// Debug logging, including FFmpeg's own messages.
    #[arg(long)]
    debug: bool,

    /// Map database to save (mapping) or load (localization).
    #[arg(short = 'p', long)]
    map_db: Option<PathBuf>,

    /// Reconstruction type: slam, localization or full.
    #[arg(short = 't', long, default_value = "full")]
    recon_type: String,

    /// Scale applied to every frame before feeding.
    #[arg(long, alias = "downsample_scalar", default_value_t = 1.0)]
    downsample_scalar: f64,

    /// Write the frame trajectory and tracking times after mapping.
    #[arg(long)]
    eval_log: bool,

    /// Number of mapping passes over the video.
    #[arg(short = 'r', long, default_value_t = 2)]
    repeat_times: u32,

    /// Keep the mapping module enabled during localization.
    #[arg(long)]
    mapping: bool,

    /// Trajectory output path for localization.
    #[arg(long, alias = "trajectory_path")]
    trajectory_path: Option<PathBuf>,

    /// Viewer front end.
    #[arg(long, value_enum, default_value_t = ViewerKind::Terminal)]
    viewer: ViewerKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ViewerKind {
    Terminal,
    Headless,
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    set_decoder_log_level(debug);
}

fn run_config(cli: &Cli, engine_config: &EngineConfig) -> Result<RunConfig, ReplayError> {
    let reconstruction: ReconstructionType = cli.recon_type.parse()?;

    let mut config = RunConfig::new(engine_config.fps)
        .with_frame_skip(cli.frame_skip)
        .with_no_sleep(cli.no_sleep)
        .with_auto_terminate(cli.auto_term)
        .with_repeat_passes(cli.repeat_times)
        .with_downsample_scalar(cli.downsample_scalar)
        .with_mapping_enabled(cli.mapping)
        .with_reconstruction(reconstruction)
        .with_eval_log(cli.eval_log);
    if let Some(mask) = &cli.mask {
        config = config.with_mask_path(mask);
    }
    if let Some(map_db) = &cli.map_db {
        config = config.with_map_db_path(map_db);
    }
    if let Some(trajectory_path) = &cli.trajectory_path {
        config = config.with_trajectory_path(trajectory_path);
    }

    config.validate()?;
    Ok(config)
}

/// Opens the dry-run engine, the video file and the chosen viewer per run.
struct CliSession<'a> {
    cli: &'a Cli,
    stop: CancellationToken,
}

impl SessionFactory for CliSession<'_> {
    fn open_source(&mut self) -> Result<Box<dyn FrameSource>, ReplayError> {
        let video = VideoFile::open(&self.cli.video_path)?;
        println!(
            "{} {}",
            "video:".cyan().bold(),
            self.cli.video_path.display()
        );
        println!("{}", video.metadata());
        Ok(Box::new(video))
    }

    fn open_engine(&mut self, mode: RunMode) -> Result<Box<dyn PoseEngine>, ReplayError> {
        log::debug!("opening engine for {mode} run");
        let engine = DryRunEngine::new(&self.cli.vocab, self.stop.clone())?;
        Ok(Box::new(engine))
    }

    fn open_viewer(&mut self, _mode: RunMode) -> Visualization {
        match self.cli.viewer {
            ViewerKind::Terminal => {
                let viewer = Arc::new(TerminalViewer::new().with_user_stop(self.stop.clone()));
                Visualization {
                    viewer: viewer.clone(),
                    progress: Some(viewer),
                }
            }
            ViewerKind::Headless => Visualization {
                viewer: Arc::new(HeadlessViewer::new().with_user_stop(self.stop.clone())),
                progress: None,
            },
        }
    }
}

fn print_report(report: &RunReport) {
    println!(
        "{} {} of {} frames fed{}",
        format!("{}:", report.mode).green().bold(),
        report.fed,
        report.visited,
        if report.terminated_early {
            " (terminated early)"
        } else {
            ""
        }
    );
    if let Some(summary) = &report.summary {
        println!("median tracking time: {}[s]", summary.median);
        println!("mean tracking time: {}[s]", summary.mean);
    }
    for path in &report.exported {
        println!("{} {}", "wrote".cyan(), path.display());
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let engine_config = EngineConfig::load(&cli.config)?;
    engine_config.require_monocular()?;
    let config = run_config(&cli, &engine_config)?;

    let stop = CancellationToken::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        log::warn!("interrupt received; stopping");
        handler_stop.cancel();
    })?;

    let mut session = CliSession { cli: &cli, stop };
    let reports = reconstruct(&config, &mut session)?;
    for report in &reports {
        print_report(report);
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
