use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use qhyccd::{Control, Driver, QhyCcdLibrary, Session, SessionConfig, SimulatedDriver};

mod stats;

/// Control QHYCCD cameras
#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Use a simulated camera instead of the QHYCCD SDK.
    #[arg(long, global = true)]
    simulate: bool,

    /// Location of the QHYCCD SDK shared library.
    #[arg(long, env = "QHYCCD_LIBRARY", global = true)]
    library: Option<PathBuf>,

    /// Also write the log to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct OpenArgs {
    /// Session configuration in TOML format.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Index of the camera to open, overriding the configuration.
    #[arg(long)]
    camera: Option<u32>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the control parameters known to the driver.
    Controls,
    /// Print the default session configuration.
    DefaultConfig,
    #[command(flatten)]
    Camera(CameraCommand),
}

#[derive(Debug, Subcommand)]
enum CameraCommand {
    /// Open a camera and print what it reports about itself.
    Info {
        #[command(flatten)]
        open: OpenArgs,
    },
    /// Acquire frames and print their statistics.
    Acquire {
        #[command(flatten)]
        open: OpenArgs,
        #[arg(long)]
        gain: Option<f64>,
        #[arg(long)]
        offset: Option<f64>,
        /// Exposure time in seconds.
        #[arg(long)]
        exposure: Option<f64>,
        #[arg(long)]
        bit_depth: Option<u32>,
        #[arg(long, default_value_t = 1)]
        frames: usize,
    },
    /// Read a control parameter, e.g. `CONTROL_GAIN`.
    Get {
        #[command(flatten)]
        open: OpenArgs,
        control: String,
    },
    /// Write a control parameter.
    Set {
        #[command(flatten)]
        open: OpenArgs,
        control: String,
        value: f64,
    },
}

fn load_config(open: &OpenArgs) -> Result<SessionConfig> {
    let mut cfg = match &open.config {
        Some(path) => qhyccd::config::parse_config_file(path)
            .with_context(|| format!("While parsing configuration file {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if let Some(camera) = open.camera {
        cfg.camera_index = camera;
    }
    Ok(cfg)
}

fn fmt_area(area: &qhyccd::Area) -> String {
    format!(
        "{}x{} at ({}, {})",
        area.size[0], area.size[1], area.start[0], area.start[1]
    )
}

fn info<D: Driver>(mut session: Session<D>) -> Result<()> {
    let chip = session.chip_info()?;
    println!("SDK version:      {}", session.sdk_version()?);
    println!("firmware version: {}", session.firmware_version()?);
    println!(
        "camera:           {} ({} of {})",
        session.camera_id().unwrap_or("?"),
        session.camera_index(),
        session.camera_count()
    );
    println!(
        "sensor:           {} {:.3}x{:.3} mm",
        if session.is_color()? { "color" } else { "mono" },
        chip.chip_size_mm[0],
        chip.chip_size_mm[1]
    );
    println!(
        "image:            {}x{} px, {} bit",
        chip.image_size[0], chip.image_size[1], chip.bpp
    );
    println!(
        "pixel:            {:.2}x{:.2} um",
        chip.pixel_size_um[0], chip.pixel_size_um[1]
    );
    println!("overscan area:    {}", fmt_area(&session.overscan_area()?));
    println!("effective area:   {}", fmt_area(&session.effective_area()?));
    println!("controls:");
    for control in session.available_controls()? {
        println!("  {:<36} {}", control.name(), control.description());
    }
    session.close()?;
    Ok(())
}

fn run<D: Driver>(driver: D, command: CameraCommand) -> Result<()> {
    match command {
        CameraCommand::Info { open } => {
            let cfg = load_config(&open)?;
            info(Session::open(driver, &cfg)?)
        }
        CameraCommand::Acquire {
            open,
            gain,
            offset,
            exposure,
            bit_depth,
            frames,
        } => {
            let mut cfg = load_config(&open)?;
            cfg.gain = gain.or(cfg.gain);
            cfg.offset = offset.or(cfg.offset);
            cfg.exposure_time = exposure.or(cfg.exposure_time);
            cfg.bit_depth = bit_depth.or(cfg.bit_depth);
            let mut session = Session::open(driver, &cfg)?;
            for _ in 0..frames {
                let image = session.acquire()?;
                let (mean, std) = stats::mean_std(&image.samples());
                let fno = image.host_timing().map(|t| t.fno).unwrap_or_default();
                println!(
                    "frame {fno}: shape {:?}, {} bit, mean {mean:.3}, std {std:.3}",
                    image.shape(),
                    image.bit_depth(),
                );
            }
            session.close()?;
            Ok(())
        }
        CameraCommand::Get { open, control } => {
            let control: Control = control.parse()?;
            let session = Session::open(driver, &load_config(&open)?)?;
            println!("{control} = {}", session.query_control(control)?);
            session.close()?;
            Ok(())
        }
        CameraCommand::Set {
            open,
            control,
            value,
        } => {
            let control: Control = control.parse()?;
            let mut session = Session::open(driver, &load_config(&open)?)?;
            session.set_control(control, value)?;
            println!("{control} = {}", session.query_control(control)?);
            session.close()?;
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = qhyccd_logger::initiate_logging(&qhyccd_logger::LogOptions {
        path: cli.log_file.as_deref(),
        ..Default::default()
    })?;
    tracing::debug!("{:?}", cli);

    match cli.command {
        Command::Controls => {
            for control in Control::ALL {
                println!(
                    "{:>2} {:<36} {}",
                    control.code(),
                    control.name(),
                    control.description()
                );
            }
            Ok(())
        }
        Command::DefaultConfig => {
            print!("{}", SessionConfig::default().to_toml()?);
            Ok(())
        }
        Command::Camera(command) => {
            if cli.simulate {
                run(SimulatedDriver::new(), command)
            } else {
                let lib = match &cli.library {
                    Some(path) => QhyCcdLibrary::from_path(path)?,
                    None => QhyCcdLibrary::new()?,
                };
                run(lib, command)
            }
        }
    }
}
