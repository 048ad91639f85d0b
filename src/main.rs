pub(crate) mod animators;
pub(crate) mod config;
pub(crate) mod dispatcher;
pub(crate) mod error;
pub(crate) mod intervaltimer;
pub(crate) mod mqtt;
pub(crate) mod olaoutput;
pub(crate) mod sink;
pub(crate) mod transmission;
pub(crate) mod trigger;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;

use crate::animators::pulse::PulseAnimator;
use crate::animators::spring::SpringAnimator;
use crate::animators::{AnimatorSlot, SharedAnimator};
use crate::config::{AnimatorKind, Config};
use crate::dispatcher::TriggerDispatcher;
use crate::error::ConfigError;
use crate::mqtt::MqttClient;
use crate::olaoutput::OlaOutput;
use crate::sink::{DryRunSink, LightSink};
use crate::transmission::TransmissionLoop;

#[derive(Parser)]
struct Cli {
    /// Configuration file (TOML, JSON or YAML); built-in defaults otherwise
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Animation to run, overriding the config file
    #[arg(short, long, value_enum)]
    animator: Option<AnimatorKind>,

    /// Number of lights, overriding the config file
    #[arg(short, long)]
    light_count: Option<usize>,

    /// Log frames instead of sending them to OLA
    #[arg(long)]
    dry_run: bool,

    /// Read trigger payloads as JSON lines from stdin instead of MQTT
    #[arg(long)]
    stdin: bool,

    /// Log the transmission rate once per second
    #[arg(long)]
    measure_fps: bool,
}

fn load_config(args: &Cli) -> Result<Config, ConfigError> {
    let mut config = match args.config.as_deref() {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(animator) = args.animator {
        config.animator = animator;
    }
    if let Some(light_count) = args.light_count {
        config.light_count = light_count;
    }
    config.measure_fps |= args.measure_fps;

    config.validate()?;
    Ok(config)
}

fn create_animator(config: &Config) -> SharedAnimator {
    match config.animator {
        AnimatorKind::Spring => {
            SharedAnimator::new(SpringAnimator::new(config.light_count, config.spring)).into_dyn()
        }
        AnimatorKind::Pulse => {
            SharedAnimator::new(PulseAnimator::new(config.light_count, config.pulse)).into_dyn()
        }
    }
}

fn create_sink(args: &Cli, config: &Config) -> Result<Box<dyn LightSink>, String> {
    if args.dry_run {
        return Ok(Box::new(DryRunSink::new(config.frequency_hz as u64)));
    }

    match OlaOutput::new(&config.ola) {
        Ok(ola) => Ok(Box::new(ola)),
        Err(err) => Err(err.to_string()),
    }
}

/// Dispatches one trigger payload per line until `input` ends or fails.
fn feed_triggers(input: impl BufRead, dispatcher: &TriggerDispatcher) {
    for line in input.lines() {
        match line {
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => {
                // Rejections are logged by the dispatcher.
                let _ = dispatcher.dispatch(&line);
            }
            Err(err) => {
                log::error!("Cannot read stdin: {err}");
                break;
            }
        }
    }
}

/// Feeds `input` and then stops the whole process, like an interrupt does.
fn run_trigger_source(input: impl BufRead, dispatcher: &TriggerDispatcher, running: &AtomicBool) {
    feed_triggers(input, dispatcher);
    log::info!("End of input, shutting down");
    running.store(false, Ordering::SeqCst);
}

fn spawn_stdin_source(dispatcher: TriggerDispatcher, running: Arc<AtomicBool>) -> io::Result<()> {
    thread::Builder::new().name("Stdin".to_string()).spawn(move || {
        run_trigger_source(io::stdin().lock(), &dispatcher, &running);
    })?;
    Ok(())
}

fn fail(msg: &str) -> ! {
    log::error!("{msg}");
    process::exit(1);
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Cli::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => fail(&err.to_string()),
    };

    let running = Arc::new(AtomicBool::new(true));
    let handler_running = Arc::clone(&running);
    if let Err(err) = ctrlc::set_handler(move || {
        log::info!("Interrupted, shutting down");
        handler_running.store(false, Ordering::SeqCst);
    }) {
        fail(&format!("Cannot install signal handler: {err}"));
    }

    let sink = match create_sink(&args, &config) {
        Ok(sink) => sink,
        Err(msg) => fail(&format!("Cannot set up OLA output: {msg}")),
    };

    let slot = AnimatorSlot::default();
    let mut transmission = TransmissionLoop::new(
        slot.clone(),
        sink,
        config.frequency_hz,
        config.measure_fps,
        Arc::clone(&running),
    );
    let transmission_thread = match thread::Builder::new()
        .name("Transmission".to_string())
        .spawn(move || {
            transmission.run();
        }) {
        Ok(handle) => handle,
        Err(error) => fail(&format!("Failed to create thread: {}", error)),
    };

    let animator = create_animator(&config);
    log::info!(
        "Running {:?} animation on {} lights",
        config.animator,
        animator.light_count()
    );
    slot.attach(animator.clone());
    let dispatcher = TriggerDispatcher::new(animator);

    let mut result = Ok(());
    if args.stdin {
        match spawn_stdin_source(dispatcher, Arc::clone(&running)) {
            Ok(()) => {
                while running.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(100));
                }
            }
            Err(err) => result = Err(format!("Failed to create thread: {err}")),
        }
    } else {
        match MqttClient::new(&config.mqtt, dispatcher, Arc::clone(&running)) {
            Ok(mqtt_client) => {
                if let Err(msg) = mqtt_client.run() {
                    result = Err(format!("MQTT client stopped: {msg}"));
                }
            }
            Err(msg) => result = Err(format!("Cannot set up MQTT: {msg}")),
        }
    }

    running.store(false, Ordering::SeqCst);
    if transmission_thread.join().is_err() {
        fail("Transmission thread panicked");
    }
    if let Err(msg) = result {
        fail(&msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animators::tests::CountingAnimator;
    use std::io::Cursor;

    const VALID: &str =
        r#"{"north_color": [1, 2, 3], "south_color": [4, 5, 6], "result_color": [7, 8, 9]}"#;

    #[test]
    fn feeds_every_valid_line() {
        let animator = SharedAnimator::new(CountingAnimator::new(2));
        let dispatcher = TriggerDispatcher::new(animator.clone().into_dyn());
        let input = format!("{VALID}\n\n   \nnot json\n{VALID}\n");

        feed_triggers(Cursor::new(input), &dispatcher);

        assert_eq!(animator.with(|a| a.triggers), 2);
    }

    #[test]
    fn end_of_input_stops_the_process() {
        let animator = SharedAnimator::new(CountingAnimator::new(1));
        let running = Arc::new(AtomicBool::new(true));
        let slot = AnimatorSlot::default();
        slot.attach(animator.clone().into_dyn());

        let mut transmission = TransmissionLoop::new(
            slot,
            Box::new(DryRunSink::new(1000)),
            200.0,
            false,
            Arc::clone(&running),
        );
        let transmission_thread = thread::spawn(move || transmission.run());

        let dispatcher = TriggerDispatcher::new(animator.clone().into_dyn());
        run_trigger_source(Cursor::new(format!("{VALID}\n")), &dispatcher, &running);

        assert!(!running.load(Ordering::SeqCst));
        transmission_thread.join().unwrap();
        assert_eq!(animator.with(|a| a.triggers), 1);
    }
}
