//! `nocturne`: play an ambient mix from the terminal until the sleep timer
//! runs out.

use std::fs::File;
use std::io::BufRead;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Receiver;

use nocturne_audio::{build_port, default_sample_rate, BackendKind, OutputStream};
use nocturne_core::{Config, EngineCmd, EngineFeedback, JsonFileRepository, MixHandle};
use nocturne_types::{SoundId, SoundRegistry, CURATED_MIXES, TIMER_PRESETS};

const USAGE: &str = "usage: nocturne [-v] [--backend auto|synth|service|null] [--timer MINUTES]
                [--preset KEY | --mix SHARE | --saved ID | --random | --sounds ID,ID,..]
       nocturne --list

While running, type a command and press enter:
  add ID | remove ID | vol ID 0-100 | master 0-100 | pause | timer MINUTES
  save NAME | saved | load ID | share | status | quit";

fn init_logging(verbose: bool) {
    use simplelog::*;

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let log_path = dirs::config_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("nocturne")
        .join("nocturne.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = match File::create(&log_path).or_else(|_| File::create("/tmp/nocturne.log")) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("nocturne: logging disabled, cannot create log file: {e}");
            return;
        }
    };

    if let Err(e) = WriteLogger::init(log_level, Config::default(), log_file) {
        eprintln!("nocturne: logging disabled: {e}");
        return;
    }

    log::info!("nocturne starting (log level: {:?})", log_level);
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn print_catalog() {
    let registry = SoundRegistry::new();
    for sound in registry.all() {
        println!("{:<20} {:<12} {}", sound.id, sound.category, sound.name);
    }
    println!();
    for mix in &CURATED_MIXES {
        println!("preset {:<18} {}", mix.key, mix.description);
    }
    let presets: Vec<String> = TIMER_PRESETS.iter().map(|m| m.to_string()).collect();
    println!("\ntimer presets (minutes): {}", presets.join(", "));
}

/// Lines typed on stdin, read on their own thread.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Translate one typed line. Returns false to quit.
fn handle_line(handle: &mut MixHandle, line: &str) -> bool {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return true;
    };
    let arg = words.next();
    match (verb, arg) {
        ("quit" | "exit" | "q", _) => return false,
        ("add", Some(id)) => handle.send(EngineCmd::AddSound(SoundId::new(id))),
        ("remove" | "rm", Some(id)) => handle.send(EngineCmd::RemoveSound(SoundId::new(id))),
        ("vol", Some(id)) => match words.next().and_then(|v| v.parse::<u8>().ok()) {
            Some(volume) => handle.send(EngineCmd::SetVolume {
                id: SoundId::new(id),
                volume,
            }),
            None => eprintln!("vol needs a volume 0-100"),
        },
        ("master", Some(v)) => match v.parse::<u8>() {
            Ok(volume) => handle.send(EngineCmd::SetMasterVolume(volume)),
            Err(_) => eprintln!("master needs a volume 0-100"),
        },
        ("pause", _) => handle.send(EngineCmd::TogglePause),
        ("timer", Some(m)) => match m.parse::<u32>() {
            Ok(minutes) => {
                handle.send(EngineCmd::SetTimerDuration(minutes.saturating_mul(60)));
                handle.send(EngineCmd::StartTimer);
            }
            Err(_) => eprintln!("timer needs minutes"),
        },
        ("save", Some(_)) => {
            let name = line.trim_start()[verb.len()..].trim().to_string();
            handle.send(EngineCmd::SaveMix { name });
        }
        ("saved", _) => handle.send(EngineCmd::ListSavedMixes),
        ("load", Some(id)) => handle.send(EngineCmd::LoadSaved(id.to_string())),
        ("share", _) => println!("{}", handle.read_state().share_link()),
        ("status", _) => print_status(handle),
        _ => eprintln!("{USAGE}"),
    }
    true
}

fn print_status(handle: &MixHandle) {
    let state = handle.read_state();
    let mix = &state.mix;
    println!(
        "{} sound(s), master {}{}",
        mix.len(),
        mix.master_volume,
        if mix.paused { ", paused" } else { "" }
    );
    for sound in &mix.sounds {
        println!("  {:<20} {:>3}", sound.id, sound.volume);
    }
    let timer = &state.timer;
    if timer.total_time > 0 {
        println!(
            "timer {}:{:02} left{}",
            timer.time_left / 60,
            timer.time_left % 60,
            if timer.is_running { "" } else { " (paused)" }
        );
    }
}

/// Print feedback. Returns false once the session is over.
fn report(feedback: &EngineFeedback) -> bool {
    match feedback {
        EngineFeedback::TimerExpired => {
            println!("Sleep timer finished. Good night.");
            return false;
        }
        EngineFeedback::CapacityReached { rejected } => {
            let ids: Vec<String> = rejected.iter().map(|id| id.to_string()).collect();
            eprintln!("Mix is full; left out: {}", ids.join(", "));
        }
        EngineFeedback::DecodeFailure(e) => eprintln!("{e}"),
        EngineFeedback::SyncFailed(e) => eprintln!("playback: {e}"),
        EngineFeedback::Error(e) => eprintln!("{e}"),
        EngineFeedback::SavedMixes(list) => {
            for mix in list {
                println!("{}  {} ({} sounds)", mix.id, mix.name, mix.sounds.len());
            }
        }
        EngineFeedback::MixChanged(_) | EngineFeedback::TimerChanged(_) => {}
    }
    true
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{USAGE}");
        return;
    }
    if args.iter().any(|a| a == "--list") {
        print_catalog();
        return;
    }
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    init_logging(verbose);

    let config = Config::load();
    let kind = match arg_value(&args, "--backend") {
        Some(s) => BackendKind::parse(s).unwrap_or_else(|| {
            eprintln!("Unknown backend {s:?}, using auto");
            BackendKind::Auto
        }),
        None => config.backend_kind(),
    };
    let sample_rate = default_sample_rate().unwrap_or_else(|| config.sample_rate());
    let backend = build_port(kind, sample_rate, config.asset_root());

    // Output stops when the stream is dropped at the end of main.
    let _stream = backend.mixer.clone().and_then(|mixer| match OutputStream::open(mixer) {
        Ok(stream) => Some(stream),
        Err(e) => {
            log::warn!(target: "backend", "{}", e);
            eprintln!("No audio output ({e}); continuing silently");
            None
        }
    });

    let repo = Box::new(JsonFileRepository::default_location());
    let mut handle = MixHandle::spawn(backend.port.clone(), &config, repo);

    if let Some(minutes) = arg_value(&args, "--timer") {
        match minutes.parse::<u32>() {
            Ok(m) => handle.send(EngineCmd::SetTimerDuration(m.saturating_mul(60))),
            Err(_) => eprintln!("Ignoring --timer {minutes:?}: expected minutes"),
        }
    }

    if let Some(key) = arg_value(&args, "--preset") {
        handle.send(EngineCmd::LoadPreset(key.to_string()));
    } else if let Some(shared) = arg_value(&args, "--mix") {
        handle.send(EngineCmd::LoadShared(shared.to_string()));
    } else if let Some(id) = arg_value(&args, "--saved") {
        handle.send(EngineCmd::LoadSaved(id.to_string()));
    } else if args.iter().any(|a| a == "--random") {
        handle.send(EngineCmd::Randomize);
    } else if let Some(ids) = arg_value(&args, "--sounds") {
        for id in ids.split(',').map(str::trim).filter(|id| !id.is_empty()) {
            handle.send(EngineCmd::AddSound(SoundId::new(id)));
        }
    } else {
        handle.send(EngineCmd::LoadPreset(CURATED_MIXES[0].key.to_string()));
    }
    handle.send(EngineCmd::StartTimer);

    println!("Playing on the {} backend. Type 'status' or 'quit'.", backend.kind.as_str());
    let lines = spawn_stdin_reader();
    'session: loop {
        if let Some(feedback) = handle.wait_feedback(Duration::from_millis(200)) {
            if !report(&feedback) {
                break;
            }
        }
        for feedback in handle.drain_feedback() {
            if !report(&feedback) {
                break 'session;
            }
        }
        while let Ok(line) = lines.try_recv() {
            if !handle_line(&mut handle, &line) {
                break 'session;
            }
        }
    }

    handle.shutdown();
    log::info!("nocturne exiting");
}
