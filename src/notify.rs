use std::process::Command;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{debug, warn};

/// Side effects announced by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Text to read out loud.
    Speak(String),
    /// The learned model was rewritten.
    ModelUpdated,
}

/// Fire-and-forget sink for [`Notice`]s. Must not block and must not fail.
pub trait Notifier: Send {
    fn notify(&self, notice: Notice);
}

/// Drops every notice.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notice: Notice) {}
}

impl Notifier for Sender<Notice> {
    fn notify(&self, notice: Notice) {
        // A closed receiver only means nobody is listening any more.
        let _ = self.send(notice);
    }
}

/// Runs external commands for notices on a dedicated worker thread.
///
/// `speech` gets the text appended as its last argument; `model_updated` runs
/// as-is. Empty argv lists disable the corresponding notice.
pub struct CommandNotifier {
    tx: Option<Sender<Notice>>,
    worker: Option<JoinHandle<()>>,
}

impl CommandNotifier {
    pub fn spawn(speech: Vec<String>, model_updated: Vec<String>) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Notice>();
        let worker = thread::Builder::new()
            .name("facelearn-notify".into())
            .spawn(move || {
                for notice in rx {
                    match notice {
                        Notice::Speak(text) => run(&speech, Some(text.as_str())),
                        Notice::ModelUpdated => run(&model_updated, None),
                    }
                }
            })?;
        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, notice: Notice) {
        if let Some(tx) = &self.tx {
            tx.notify(notice);
        }
    }
}

impl Drop for CommandNotifier {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain what is queued and exit.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("notification worker panicked");
            }
        }
    }
}

fn run(argv: &[String], extra: Option<&str>) {
    let Some((program, args)) = argv.split_first() else {
        return;
    };
    let start = Instant::now();
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(extra) = extra {
        cmd.arg(extra);
    }
    match cmd.status() {
        Ok(status) if status.success() => {
            debug!("{} finished in {:.2} ms", program, start.elapsed().as_secs_f64() * 1000.0)
        }
        Ok(status) => warn!("{} exited with {}", program, status),
        Err(e) => warn!("failed to run {}: {}", program, e),
    }
}
