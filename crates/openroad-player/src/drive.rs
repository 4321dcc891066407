//! The `run` command: feed the engine a steady drive and report what it built

use anyhow::{Context, Result};
use clap::Args;
use openroad_common::{AppConfig, GameInput};
use openroad_engine::{RoadEngine, RoadRam, TickReport};
use openroad_track::TrackSet;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct RunArgs {
    /// Track file (TOML)
    pub track: Option<PathBuf>,

    /// Host frames to run
    #[arg(long, default_value_t = 600)]
    pub frames: u32,

    /// Car speed (integer part of the car increment)
    #[arg(long, default_value_t = 0x100)]
    pub speed: u16,

    /// Car lateral position
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub car_x: i16,

    /// Stage to start on
    #[arg(long, default_value_t = 0)]
    pub stage: u8,

    /// Request the road split from this frame on
    #[arg(long)]
    pub split_at: Option<u32>,

    /// Request the bonus road from this frame on
    #[arg(long)]
    pub bonus_at: Option<u32>,

    /// Frames between progress lines
    #[arg(long, default_value_t = 60)]
    pub log_every: u32,

    /// Write tick reports and the final tables as JSON ("-" for stdout)
    #[arg(long)]
    pub dump: Option<PathBuf>,
}

#[derive(Serialize)]
struct Dump<'a> {
    track: &'a str,
    config: &'a AppConfig,
    frames: &'a [TickReport],
    last: openroad_engine::Snapshot<'a>,
    road_ram: &'a RoadRam,
}

pub fn run(mut track: TrackSet, config: &AppConfig, args: &RunArgs) -> Result<()> {
    let mut engine = RoadEngine::new(config.engine.clone());
    let mut ram = RoadRam::new();
    engine.init_hardware(&mut ram);

    tracing::info!(
        "Driving '{}' for {} frames at speed {:#x} ({} tick(s) per frame)",
        track.name,
        args.frames,
        args.speed,
        config.engine.ticks_per_frame
    );

    let mut reports = Vec::with_capacity(args.frames as usize);
    let mut crests = 0;
    let mut aborted = 0;

    for frame in 0..args.frames {
        let input = GameInput {
            speed: args.speed,
            car_x: args.car_x,
            camera_x_offset: 0,
            road_ctrl: config.engine.road_ctrl,
            stage: args.stage,
            request_split: args.split_at.is_some_and(|at| frame >= at),
            request_bonus: args.bonus_at.is_some_and(|at| frame >= at),
        };
        let report = engine.frame(&mut track, &input, &mut ram);

        if let Some(select) = report.loaded {
            tracing::info!("Frame {}: loaded {}", frame, select);
        }
        if report.change != 0 && report.curve_entries.is_none() {
            aborted += 1;
        }
        crests = crests.max(report.raster.priority_runs);

        if args.log_every > 0 && frame % args.log_every == 0 {
            tracing::info!(
                "Frame {:>5}: pos {:>5} fine {:>5} horizon {:>4} lines {:>3} crests {:>2} width {}",
                frame,
                report.position,
                engine.pos_fine(),
                report.horizon_y,
                report.raster.lines,
                report.raster.priority_runs,
                engine.road_width()
            );
        }
        reports.push(report);
    }

    tracing::info!(
        "Done: {} ticks, position {}, most crests {}, curve passes cut short {}",
        engine.ticks(),
        engine.position(),
        crests,
        aborted
    );

    if let Some(path) = &args.dump {
        let dump = Dump {
            track: &track.name,
            config,
            frames: &reports,
            last: engine.snapshot(),
            road_ram: &ram,
        };
        write_dump(path, &dump)?;
    }
    Ok(())
}

fn write_dump(path: &Path, dump: &Dump<'_>) -> Result<()> {
    if path.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        serde_json::to_writer_pretty(&mut out, dump).context("Failed to write dump")?;
        writeln!(out)?;
        return Ok(());
    }

    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, dump).context("Failed to write dump")?;
    out.flush()?;
    tracing::info!("Wrote {}", path.display());
    Ok(())
}
