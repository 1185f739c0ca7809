mod dashboard;
mod geo;
mod host;
mod screens;
mod services;
mod settings;
mod surface;

use anyhow::Context;
use clap::Parser;
use dashboard::{Control, Dashboard};
use sentinel_core::PriorityConfig;
use settings::Settings;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;

#[derive(Parser, Debug)]
#[command(name = "sentinel", about = "Headless home-monitoring dashboard")]
struct Args {
    /// Frames per second of the update/render loop.
    #[arg(long)]
    fps: Option<u32>,

    /// Screen to show first ("auto" = first registered module).
    #[arg(long)]
    startup_screen: Option<String>,

    /// JSON file with the priority configuration (timeout, idle cycle, rules).
    #[arg(long)]
    priorities: Option<PathBuf>,

    /// Stop after this many frames (0 = run until Ctrl-C or `q`).
    #[arg(long, default_value_t = 0)]
    frames: u64,

    /// Log the composed screen at least this often, in seconds.
    #[arg(long, default_value_t = 5.0)]
    print_every: f64,

    /// Print the JSON Schema of the priority configuration and exit.
    #[arg(long)]
    schema: bool,
}

fn load_settings(args: &Args) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();
    if let Some(fps) = args.fps {
        settings.core.fps = fps;
    }
    if let Some(screen) = &args.startup_screen {
        settings.core.startup_screen = screen.clone();
    }
    if let Some(path) = &args.priorities {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read priorities {}", path.display()))?;
        let raw: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse priorities {}", path.display()))?;
        settings.priorities = PriorityConfig::from_value(&raw);
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.schema {
        println!("{}", serde_json::to_string_pretty(&sentinel_core::config_schema())?);
        return Ok(());
    }

    let settings = load_settings(&args)?;
    let fps = settings.core.fps.clamp(1, 240);
    log::info!(
        "sentinel starting: {} fps, {} module(s), {} rule(s)",
        fps,
        settings.modules.len(),
        settings.priorities.rules.len()
    );

    let mut dashboard = Dashboard::new(settings);
    dashboard.start_services();

    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / fps as f64));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let mut last_tick = Instant::now();
    let mut last_print = Instant::now();
    let mut last_view: Option<(Option<String>, String)> = None;
    let mut frame: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                let dt = now.duration_since(last_tick).as_secs_f64();
                last_tick = now;
                dashboard.frame(dt);
                frame += 1;

                let view = (dashboard.app().current_screen(), dashboard.app().header().title);
                if last_view.as_ref() != Some(&view)
                    || now.duration_since(last_print).as_secs_f64() >= args.print_every
                {
                    log::info!("\n{}", dashboard.compose());
                    last_view = Some(view);
                    last_print = now;
                }

                if args.frames > 0 && frame >= args.frames {
                    break;
                }
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if dashboard.input(&line) == Control::Quit {
                        break;
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    log::warn!("stdin closed: {}", e);
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                log::info!("interrupt received, exiting main loop");
                break;
            }
        }
    }

    dashboard.shutdown();
    Ok(())
}
