use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use pico_args::Arguments;
use std::{
    env,
    fs::File,
    io::{self, BufReader},
    path::PathBuf,
};

use handctl::config::{Profile, ProfileStore};
use handctl::metrics::TargetSpace;
use handctl::replay;
use handctl::signal::LogSink;
use handctl::ControlPipeline;

const DEFAULT_WIDTH: f32 = 1280.0;
const DEFAULT_HEIGHT: f32 = 720.0;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("replay") => {
            let config: Option<PathBuf> = pargs.opt_value_from_str("--config")?;
            let profile_name: Option<String> = pargs.opt_value_from_str("--profile")?;
            let width: f32 = pargs
                .opt_value_from_str("--width")?
                .unwrap_or(DEFAULT_WIDTH);
            let height: f32 = pargs
                .opt_value_from_str("--height")?
                .unwrap_or(DEFAULT_HEIGHT);
            let quiet = pargs.contains("--quiet");
            let input: Option<String> = pargs.opt_free_from_str()?;

            let profile = resolve_profile(config, profile_name)?;
            replay_frames(input, profile, TargetSpace::new(width, height), quiet)
        }

        Some("list") => {
            let store = ProfileStore::load_or_install_default()?;
            for name in store.list_profiles() {
                let mark = if name == store.active_name { '*' } else { ' ' };
                println!("{mark} {name}");
            }
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl use <profile_name>"))?;
            let mut store = ProfileStore::load_or_install_default()?;
            store.set_active(&name)?;
            println!("handctl: active profile is now '{}'", store.active_name);
            Ok(())
        }

        Some("show") => {
            let config: Option<PathBuf> = pargs.opt_value_from_str("--config")?;
            let profile_name: Option<String> = pargs.opt_value_from_str("--profile")?;
            let profile = resolve_profile(config, profile_name)?;
            print_response(&serde_json::to_value(&profile)?);
            Ok(())
        }

        Some("status") => {
            let store = ProfileStore::load_or_install_default()?;
            print_response(&store.status_report());
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn resolve_profile(config: Option<PathBuf>, name: Option<String>) -> Result<Profile> {
    if let Some(path) = config {
        return Profile::from_file(&path)
            .with_context(|| format!("failed to load {}", path.display()));
    }
    profile_from_store(ProfileStore::load_or_install_default(), name.as_deref())
}

// `--profile` picks a profile for this run only; `use` is what moves the pointer.
fn profile_from_store(
    store: handctl::Result<ProfileStore>,
    name: Option<&str>,
) -> Result<Profile> {
    match (store, name) {
        (Ok(store), Some(name)) => {
            info!("using profile '{name}'");
            Ok(store.load_named(name)?)
        }
        (Ok(store), None) => {
            info!("using profile '{}'", store.active_name);
            Ok(store.profile)
        }
        (Err(e), None) => {
            warn!("profile store unavailable ({e}); using built-in defaults");
            Ok(Profile::default())
        }
        (Err(e), Some(_)) => Err(e.into()),
    }
}

fn replay_frames(
    input: Option<String>,
    profile: Profile,
    space: TargetSpace,
    quiet: bool,
) -> Result<()> {
    let mut sink = LogSink::new();
    sink.set_enabled(!quiet);
    let mut pipeline = ControlPipeline::new(&profile, sink);

    let (rx, reader) = match input.as_deref() {
        None | Some("-") => replay::spawn_reader(BufReader::new(io::stdin()), space),
        Some(path) => {
            let file = File::open(path).with_context(|| format!("failed to open {path}"))?;
            replay::spawn_reader(BufReader::new(file), space)
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = replay::run(rx, &mut pipeline, &mut out)?;
    reader
        .join()
        .map_err(|_| anyhow!("replay reader thread panicked"))?;

    let stats = pipeline.tracker().stats();
    info!(
        "replayed {} frame(s): {} observation(s), {} detection(s), {} control update(s)",
        summary.frames, stats.observations, stats.detections, summary.updates
    );
    Ok(())
}

fn print_help() {
    println!(
        r#"handctl — two-hand pinch control from keypoint detections

USAGE:
  handctl help [command]                  Show general or command-specific help
  handctl replay [FILE|-] [options]       Run recorded detector frames through the tracker
  handctl list                            List profiles
  handctl use <name>                      Switch active profile
  handctl show [--config PATH|--profile NAME]
                                          Print the resolved profile as JSON
  handctl status                          Show profile directory state

REPLAY OPTIONS:
  --config PATH     Load the profile from a TOML file
  --profile NAME    Use a named profile from the profile directory
  --width W         Default target width  (default 1280)
  --height H        Default target height (default 720)
  --quiet           Do not log control updates

TIPS:
  - Profiles: ~/.config/handctl/profiles
  - Active profile pointer: ~/.config/handctl/active
  - Logging: RUST_LOG=debug handctl replay frames.jsonl
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "replay" => println!(
            "usage: handctl replay [FILE|-] [--config PATH] [--profile NAME] [--width W] [--height H] [--quiet]\n\
             Reads one JSON frame per line and writes one JSON report per frame to stdout."
        ),
        "list" => {
            println!("usage: handctl list\nLists available profiles; marks active with '*'.")
        }
        "use" => {
            println!("usage: handctl use <name>\nSwitches active profile to <name>.")
        }
        "show" => println!(
            "usage: handctl show [--config PATH] [--profile NAME]\nPrints the resolved profile."
        ),
        "status" => println!("usage: handctl status\nShows profile directory and active profile."),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
