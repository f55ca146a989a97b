use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use systolic::acquire::{Acquisition, CancelToken};
use systolic::channel::{upload_profile, FrontEndChannel, SerialChannel, DEFAULT_BAUD};
use systolic::config::{AcquisitionConfig, MainsFrequency};
use systolic::heart_rate::estimate_heart_rate;
use systolic::leads::WaveformSet;
use systolic::lookup::{self, BandwidthProfile};
use systolic::pipeline::capture;
use systolic::plot::{render_spectrum_png, render_waveform_png, PlotStyle};
use systolic::sim::SimulatedFrontEnd;
use systolic::spectrum::SpectrumBuilder;

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Acquire and interpret a six-lead ECG over a serial front end"
)]
struct Args {
    /// Serial port of the front end, e.g. /dev/ttyUSB0.
    #[clap(short, long)]
    port: Option<String>,

    /// List detected serial ports and exit.
    #[clap(long)]
    list_ports: bool,

    /// Run against the built-in simulator instead of hardware.
    #[clap(long)]
    simulate: bool,

    /// Analog bandwidth to configure, in Hz.
    #[clap(short, long, default_value_t = 160)]
    bandwidth: u32,

    /// Capture length in seconds.
    #[clap(short, long, default_value_t = 5.0)]
    duration: f64,

    /// Mains frequency to notch out, 50 or 60.
    #[clap(long, default_value_t = 50)]
    mains: u32,

    /// Write a six-panel waveform PNG here.
    #[clap(long)]
    plot: Option<PathBuf>,

    /// Write a lead spectra PNG here.
    #[clap(long)]
    spectrum: Option<PathBuf>,

    /// Serial baud rate.
    #[clap(long, default_value_t = DEFAULT_BAUD)]
    baud: u32,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list_ports {
        for name in SerialChannel::available_ports()? {
            println!("{name}");
        }
        return Ok(());
    }

    let mains = match args.mains {
        50 => MainsFrequency::Hz50,
        60 => MainsFrequency::Hz60,
        other => bail!("unsupported mains frequency {other} Hz, expected 50 or 60"),
    };
    let profile = lookup::resolve(args.bandwidth)
        .with_context(|| format!("no decimation profile for {} Hz", args.bandwidth))?;
    let config = AcquisitionConfig::for_duration(profile, args.duration);
    config.validate()?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("interrupt received, stopping acquisition");
        handler_token.cancel();
    })
    .context("failed to install the interrupt handler")?;

    let set = if args.simulate {
        let mut channel =
            SimulatedFrontEnd::new(profile.output_data_rate_hz as f64, profile.full_scale_code);
        run_session(&mut channel, profile, config, mains, cancel)?
    } else {
        let Some(port) = args.port.as_deref() else {
            bail!("pass --port or --simulate, or use --list-ports to discover devices");
        };
        let mut channel = SerialChannel::open(port, args.baud)
            .with_context(|| format!("cannot open {port}"))?;
        run_session(&mut channel, profile, config, mains, cancel)?
    };

    let estimate = estimate_heart_rate(&set)?;
    println!(
        "{} samples per lead at {:.1} Hz measured, {estimate}",
        set.len(),
        set.sample_rate_hz()
    );

    if let Some(path) = args.plot {
        let png = render_waveform_png(&set, PlotStyle::default())?;
        std::fs::write(&path, png).with_context(|| format!("cannot write {}", path.display()))?;
        info!("wrote waveform grid to {}", path.display());
    }
    if let Some(path) = args.spectrum {
        let spectrum = SpectrumBuilder::default().compute(&set);
        let png = render_spectrum_png(&spectrum, PlotStyle::default())?;
        std::fs::write(&path, png).with_context(|| format!("cannot write {}", path.display()))?;
        info!("wrote lead spectra to {}", path.display());
    }
    Ok(())
}

fn run_session<C: FrontEndChannel>(
    channel: &mut C,
    profile: &'static BandwidthProfile,
    config: AcquisitionConfig,
    mains: MainsFrequency,
    cancel: CancelToken,
) -> Result<WaveformSet> {
    upload_profile(channel, profile);
    let total = config.sample_count;
    info!(
        "acquiring {total} samples at {} Hz nominal ({} Hz bandwidth)",
        config.output_data_rate_hz, config.bandwidth_hz
    );
    let mut last_percent = 0;
    let acquisition = Acquisition::new(channel, config)
        .with_cancel(cancel)
        .on_progress(move |done, total| {
            let percent = done * 100 / total.max(1);
            if percent >= last_percent + 10 {
                last_percent = percent;
                info!("collected {done}/{total} samples");
            }
        });
    Ok(capture(acquisition, mains)?)
}
