use std::path::PathBuf;

use anyhow::{Context, Result};
use openscope::dsp::ProcessorUpdate;
use openscope::scope::channel::FlushStats;
use openscope::settings::{self, ScopeSettings};
use openscope::util::telemetry;
use openscope::{ChannelInput, ScopeBlock};
use tracing::{debug, info};

const BLOCK_FRAMES: usize = 512;
const TONE_HZ: f32 = 1_000.0;

fn main() -> Result<()> {
    telemetry::init();

    let mut args = std::env::args().skip(1);
    let settings = match args.next() {
        Some(path) => {
            let path = PathBuf::from(path);
            ScopeSettings::load(&path)
                .with_context(|| format!("loading settings from {}", path.display()))?
        }
        None => ScopeSettings::load_or_default(&settings::default_path()),
    };
    let seconds: f32 = args
        .next()
        .map(|s| s.parse())
        .transpose()
        .context("duration must be a number of seconds")?
        .unwrap_or(2.0);

    let mut scope = settings.build().context("failed to initialise oscilloscope")?;
    let channels = scope.layout().channels();
    let rate = scope.sample_rate();
    let total = (rate * seconds.max(0.0)) as usize;

    let mut x = vec![0.0f32; BLOCK_FRAMES];
    let mut y = vec![0.0f32; BLOCK_FRAMES];
    let mut stats = FlushStats::default();
    let mut position = 0usize;

    while position < total {
        let frames = BLOCK_FRAMES.min(total - position);
        for (i, (sx, sy)) in x.iter_mut().zip(y.iter_mut()).take(frames).enumerate() {
            let phase = std::f32::consts::TAU * TONE_HZ * (position + i) as f32 / rate;
            *sx = phase.cos();
            *sy = phase.sin();
        }

        let inputs: Vec<ChannelInput<'_>> = (0..channels)
            .map(|_| ChannelInput::new(&x[..frames], &y[..frames], &y[..frames]))
            .collect();
        if let ProcessorUpdate::Snapshot(report) =
            scope.process(&ScopeBlock::new(frames, &inputs), &mut [])
        {
            debug!(position, windows = report.stats.windows, "block flushed");
            stats.merge(report.stats);
        }
        position += frames;
    }

    info!(
        seconds,
        channels,
        windows = stats.windows,
        flushes = stats.flushes,
        points = stats.points,
        frames = stats.frames,
        "acquisition finished"
    );

    for index in 0..channels {
        if let Some(sink) = scope.sink(index) {
            info!(channel = index, status = ?sink.status(), "stream");
        }
    }

    let state = scope.serialize_state()?;
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
