//! modrender: play a 4-channel MOD file or render it to WAV or raw PCM.
//!
//! Usage:
//!   modrender path/to/file.mod
//!   modrender path/to/file.mod --wav output.wav
//!   modrender path/to/file.mod --raw output.pcm --format u8

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use mr_master::{Controller, Module, PcmFormat};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "modrender")]
#[command(about = "Play or render 4-channel tracker modules")]
struct Cli {
    /// Module file to load
    path: PathBuf,

    /// Render to a 16-bit stereo WAV file instead of playing
    #[arg(long, conflicts_with = "raw")]
    wav: Option<PathBuf>,

    /// Render interleaved raw PCM to a file instead of playing
    #[arg(long)]
    raw: Option<PathBuf>,

    /// Raw PCM encoding
    #[arg(long, value_enum, default_value_t = Format::S16)]
    format: Format,

    /// Output sample rate for offline renders
    #[arg(long, default_value_t = 44100)]
    rate: u32,

    /// Stop offline renders after this many seconds
    #[arg(long, default_value_t = 300)]
    seconds: u32,

    /// Loop back to the first order at the end of the song
    #[arg(long)]
    repeat: bool,

    /// Print the order table and the first pattern
    #[arg(long)]
    info: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Signed 16-bit, interpolated, 70/30 cross-mix
    S16,
    /// Signed 16-bit, nearest-sample
    S16Fast,
    /// Unsigned 8-bit
    U8,
}

impl From<Format> for PcmFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::S16 => PcmFormat::S16,
            Format::S16Fast => PcmFormat::S16Fast,
            Format::U8 => PcmFormat::U8,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let data = std::fs::read(&cli.path)
        .with_context(|| format!("failed to read {}", cli.path.display()))?;

    let mut ctrl = Controller::new();
    ctrl.load_mod(data)
        .with_context(|| format!("failed to parse {}", cli.path.display()))?;
    ctrl.set_repeat(cli.repeat);

    {
        let module = ctrl.module();
        print_summary(&module);
        if cli.info {
            print_patterns(&module);
        }
    }

    if let Some(path) = &cli.wav {
        tracing::info!("rendering WAV at {} Hz", cli.rate);
        let wav = ctrl.render_to_wav(cli.rate, cli.seconds);
        std::fs::write(path, &wav)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!("wrote {} bytes to {}", wav.len(), path.display());
    } else if let Some(path) = &cli.raw {
        let max_frames = cli.rate as usize * cli.seconds as usize;
        let pcm = ctrl.render_pcm(cli.format.into(), cli.rate, max_frames);
        std::fs::write(path, &pcm)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!("wrote {} bytes to {}", pcm.len(), path.display());
    } else {
        play(&mut ctrl);
    }
    Ok(())
}

fn print_summary(module: &Module<'_>) {
    println!("Title:    {}", module.name());
    println!("Format:   {}", module.signature.tag().escape_ascii());
    println!("Orders:   {}", module.song_length);
    println!("Patterns: {}", module.pattern_count());
    println!();
    println!(" #  Name                    Length  Fine  Vol  Loop");
    for (i, sample) in module.samples.iter().enumerate() {
        if sample.is_empty() {
            continue;
        }
        println!(
            "{:2}  {:22}  {:6}  {:4}  {:3}  {}+{}",
            i + 1,
            sample.name(),
            sample.length,
            sample.finetune,
            sample.volume,
            sample.loop_start,
            sample.loop_length
        );
    }
    println!();
}

fn print_patterns(module: &Module<'_>) {
    let orders: Vec<String> = module.order[..module.song_length as usize]
        .iter()
        .map(|p| format!("{:02}", p))
        .collect();
    println!("Order: {}", orders.join(" "));

    let Some(pattern) = module.patterns.get(module.pattern_at(0)) else {
        return;
    };
    println!("Pattern {:02}:", module.pattern_at(0));
    for row in 0..mr_ir::ROWS {
        print!("{:02} |", row);
        for cell in pattern.row(row) {
            print!(
                " {} {:02X} {:03X} |",
                mr_ir::note_name(cell.period),
                cell.sample,
                cell.effect
            );
        }
        println!();
    }
    println!();
}

fn play(ctrl: &mut Controller) {
    ctrl.play();
    println!("Playing...");

    while !ctrl.is_finished() {
        if let Some(pos) = ctrl.position() {
            print!(
                "\rOrd: {:02X} | Pat: {:02X} | Row: {:02X}",
                pos.order, pos.pattern, pos.row
            );
            let _ = std::io::stdout().flush();
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    println!("\rDone.                          ");
}
