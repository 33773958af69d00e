//! Task dispatcher demo
//!
//! Runs a typical online session through a dispatcher: a chain of serial
//! calls which must happen in order, plus a couple of independent parallel
//! calls, and prints the order in which their completion delegates fired.

use clap::Parser;
use log::info;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use threaded_async_tasks::{BoxedMessage, BoxedTask, CooperativeDispatcher,
                           Dispatcher, DispatcherConfig, DispatcherError,
                           FnMessage, FnTask, TaskResult, TickContext};


/// Command-line options
#[derive(Parser, Debug)]
#[command(about = "Run a sample online session through the task dispatcher")]
struct Cli {
    /// TOML file holding the dispatcher configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tick tasks on the main thread instead of a worker thread
    #[arg(long)]
    cooperative: bool,

    /// Maximum number of frames to run before giving up
    #[arg(long, default_value_t = 120)]
    frames: u32,

    /// Duration of a frame, in milliseconds
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,
}


/// Order in which completion delegates fired
type CallbackLog = Arc<Mutex<Vec<String>>>;


/// Build a task which succeeds after a given number of ticks, and records its
/// name in the callback log when its delegates are triggered
fn sample_task(name: &str, ticks: u32, log: &CallbackLog) -> BoxedTask {
    let mut remaining = ticks;
    let log = log.clone();
    let name_copy = name.to_owned();
    Box::new(
        FnTask::new(name, move |_: &mut TickContext| {
            remaining = remaining.saturating_sub(1);
            if remaining == 0 { Some(Ok(())) } else { None }
        }).on_complete(move |result: &TaskResult<()>| {
            info!("{} completed: {:?}", name_copy, result);
            log.lock().push(name_copy);
        })
    )
}


/// One-shot message announcing the player's presence
fn presence_message() -> BoxedMessage {
    Box::new(FnMessage::new("SetPresence", || info!("Presence set to online")))
}


/// Serial chain followed by parallel calls, as (name, ticks, serial)
const SESSION: [(&str, u32, bool); 5] = [
    ("Login", 1, true),
    ("ReadFriends", 1, true),
    ("ReadAchievements", 1, true),
    ("Ping", 3, false),
    ("Fetch", 1, false),
];


fn run(cli: &Cli) -> Result<Vec<String>, DispatcherError> {
    let config = match cli.config {
        Some(ref path) => DispatcherConfig::from_file(path)?,
        None => DispatcherConfig::default(),
    };
    let frame = Duration::from_millis(cli.frame_ms);
    let log = CallbackLog::default();
    let done = || log.lock().len() == SESSION.len();

    if cli.cooperative {
        let mut dispatcher = CooperativeDispatcher::new(|| {});
        dispatcher.message_sender().send(presence_message());
        for &(name, ticks, serial) in SESSION.iter() {
            let task = sample_task(name, ticks, &log);
            if serial {
                dispatcher.submit_serial(task);
            } else {
                dispatcher.submit_parallel(task);
            }
        }
        for _ in 0..cli.frames {
            dispatcher.tick();
            if done() {
                break;
            }
            thread::sleep(frame);
        }
        info!("Dispatcher stats: {:?}", dispatcher.stats());
    } else {
        let mut dispatcher = Dispatcher::start(&config, || {})?;
        dispatcher.message_sender().send(presence_message());
        for &(name, ticks, serial) in SESSION.iter() {
            let task = sample_task(name, ticks, &log);
            if serial {
                dispatcher.submit_serial(task);
            } else {
                dispatcher.submit_parallel(task);
            }
        }
        for _ in 0..cli.frames {
            dispatcher.game_tick();
            if done() {
                break;
            }
            thread::sleep(frame);
        }
        dispatcher.stop();
        dispatcher.join();
        info!("Dispatcher stats: {:?}", dispatcher.stats());
    }

    let order = log.lock().clone();
    Ok(order)
}


fn main() -> ExitCode {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(order) => {
            println!("Callback order: {:?}", order);
            if order.len() == SESSION.len() {
                ExitCode::SUCCESS
            } else {
                eprintln!("Only {} of {} tasks completed", order.len(), SESSION.len());
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        },
    }
}
