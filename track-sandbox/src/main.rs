mod export;
mod replay;

use cv_track::{CancelToken, ImageSequence, PropagationPolicy, TrackSettings, Tracker};
use export::Export;
use log::*;
use replay::ReplayDetector;
use std::error::Error;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use structopt::StructOpt;
use zhang::Zhang;

#[derive(StructOpt, Clone)]
#[structopt(
    name = "track-sandbox",
    about = "Calibrates a camera from recorded pattern detections and tracks the pattern"
)]
struct Opt {
    /// The file with the recorded detections.
    ///
    /// This is a JSON array of `{"frame": index, "points": [[x, y], ...]}` objects.
    #[structopt(short, long, default_value = "detections.json")]
    detections: PathBuf,
    /// The file where settings are specified.
    ///
    /// This is in the format of `cv_track::TrackSettings`. Defaults are used if it is missing.
    #[structopt(short, long, default_value = "track-settings.json")]
    settings: PathBuf,
    /// Overrides the number of frames skipped after every detection.
    #[structopt(long)]
    skip_interval: Option<usize>,
    /// Overrides the propagation policy ("hold" or "interpolate").
    #[structopt(long)]
    policy: Option<PropagationPolicy>,
    /// Nominal frame rate of the sequence, used for timestamps.
    #[structopt(long, default_value = "30.0")]
    frame_rate: f64,
    /// Do not measure the reprojection error.
    #[structopt(long)]
    no_diagnostic: bool,
    /// Output JSON file, standard output if not given.
    #[structopt(short, long)]
    output: Option<PathBuf>,
    /// List of image files in playback order, or a single directory of frames.
    #[structopt(parse(from_os_str))]
    images: Vec<PathBuf>,
}

/// Reads the settings file, falling back to the defaults if the file does not exist.
fn load_settings(path: &Path) -> Result<TrackSettings, Box<dyn Error>> {
    match File::open(path) {
        Ok(file) => {
            let settings = serde_json::from_reader(BufReader::new(file))?;
            info!("loaded settings from {}", path.display());
            Ok(settings)
        }
        Err(e) => {
            info!("used default settings ({}: {})", path.display(), e);
            Ok(TrackSettings::default())
        }
    }
}

fn open_sequence(images: &[PathBuf], frame_rate: f64) -> Result<ImageSequence, Box<dyn Error>> {
    let sequence = match images {
        [dir] if dir.is_dir() => ImageSequence::open_dir(dir, frame_rate)?,
        _ => ImageSequence::open(images, frame_rate)?,
    };
    Ok(sequence)
}

fn run(opt: Opt) -> Result<(), Box<dyn Error>> {
    let mut settings = load_settings(&opt.settings)?;
    if let Some(skip_interval) = opt.skip_interval {
        settings.skip_interval = skip_interval;
    }
    if let Some(policy) = opt.policy {
        settings.policy = policy;
    }
    info!(
        "tracking a {}x{} board, skip interval {}, {} policy",
        settings.board.grid.width,
        settings.board.grid.height,
        settings.skip_interval,
        settings.policy
    );

    let detector = ReplayDetector::from_reader(BufReader::new(File::open(&opt.detections)?))?;
    let sequence = open_sequence(&opt.images, opt.frame_rate)?;

    let tracker = Tracker::new(detector, Zhang::new(), settings);
    let track = tracker.track(&sequence, &CancelToken::new())?;
    let report = if opt.no_diagnostic {
        None
    } else {
        tracker.diagnose(sequence.frames(), &track)
    };

    let export = Export::new(&track, &sequence, &settings.view, report.as_ref());
    match opt.output {
        Some(path) => {
            export.write(BufWriter::new(File::create(&path)?))?;
            info!("wrote {}", path.display());
        }
        None => export.write(std::io::stdout().lock())?,
    }
    Ok(())
}

fn main() {
    pretty_env_logger::init_timed();
    let opt = Opt::from_args();
    if let Err(e) = run(opt) {
        error!("{}", e);
        std::process::exit(1);
    }
}
