use anyhow::Result;
use std::io::{self, Write};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::parallel::ImportTracker;

// Cross-platform signal handling
#[cfg(unix)]
use signal_hook::{
    consts::{SIGINT, SIGTERM, SIGUSR1},
    iterator::Signals,
};

// Progress on CTRL-T
#[cfg(all(
    unix,
    any(
        target_os = "macos",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    )
))]
use signal_hook::consts::SIGINFO;

#[cfg(windows)]
use signal_hook::{consts::SIGINT, flag};

/// Standard Unix exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    SignalInt = 130,  // 128 + SIGINT (2)
    SignalPipe = 141, // 128 + SIGPIPE (13)
    SignalTerm = 143, // 128 + SIGTERM (15)
}

impl ExitCode {
    pub fn exit(self) -> ! {
        process::exit(self as i32)
    }
}

/// Cooperative cancellation flag shared between a caller and an import run.
///
/// Cloning yields a handle to the same flag. A cancel stays set until the
/// run it stopped has returned.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

/// Signal handler for graceful shutdown
///
/// The first SIGINT or SIGTERM cancels the import so it can drain; a second
/// one exits the process immediately.
pub struct SignalHandler {
    _handle: thread::JoinHandle<()>,
}

impl SignalHandler {
    /// Initialize signal handling - cross-platform
    pub fn new(cancel: CancelToken, tracker: ImportTracker) -> Result<Self> {
        #[cfg(unix)]
        {
            #[allow(unused_mut)]
            let mut signals_to_handle = vec![SIGINT, SIGTERM, SIGUSR1];

            #[cfg(all(
                unix,
                any(
                    target_os = "macos",
                    target_os = "freebsd",
                    target_os = "openbsd",
                    target_os = "netbsd",
                    target_os = "dragonfly"
                )
            ))]
            signals_to_handle.push(SIGINFO);

            let mut signals = Signals::new(&signals_to_handle)?;

            let handle = thread::spawn(move || {
                let mut shutdown_count = 0;
                for sig in signals.forever() {
                    match sig {
                        SIGINT | SIGTERM => {
                            shutdown_count += 1;
                            if shutdown_count > 1 {
                                if sig == SIGINT {
                                    ExitCode::SignalInt.exit();
                                }
                                ExitCode::SignalTerm.exit();
                            }
                            tracing::warn!(
                                signal = sig,
                                "shutdown requested; draining in-flight work (signal again to exit now)"
                            );
                            cancel.cancel();
                        }
                        SIGUSR1 => log_progress(&tracker),
                        #[cfg(all(
                            unix,
                            any(
                                target_os = "macos",
                                target_os = "freebsd",
                                target_os = "openbsd",
                                target_os = "netbsd",
                                target_os = "dragonfly"
                            )
                        ))]
                        SIGINFO => log_progress(&tracker),
                        _ => tracing::debug!(signal = sig, "ignoring unexpected signal"),
                    }
                }
            });

            Ok(SignalHandler { _handle: handle })
        }

        #[cfg(windows)]
        {
            let _ = tracker;
            let term_flag = Arc::new(AtomicBool::new(false));
            flag::register(SIGINT, Arc::clone(&term_flag))?;

            let handle = thread::spawn(move || {
                let mut shutdown_count = 0;
                loop {
                    thread::sleep(std::time::Duration::from_millis(100));
                    if term_flag.swap(false, Ordering::Relaxed) {
                        shutdown_count += 1;
                        if shutdown_count > 1 {
                            ExitCode::SignalInt.exit();
                        }
                        cancel.cancel();
                    }
                }
            });

            Ok(SignalHandler { _handle: handle })
        }
    }
}

fn log_progress(tracker: &ImportTracker) {
    let stats = tracker.snapshot();
    tracing::info!(
        elapsed = ?tracker.elapsed(),
        lines = stats.lines_total,
        valid = stats.valid,
        invalid = stats.invalid(),
        batches = stats.batches_persisted,
        "{}",
        stats.format_progress()
    );
}

/// Safe wrapper for writing to stdout that handles broken pipes and other I/O errors
pub struct SafeStdout {
    stdout: io::Stdout,
}

impl Default for SafeStdout {
    fn default() -> Self {
        Self::new()
    }
}

impl SafeStdout {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
        }
    }

    /// Write a line to stdout, exiting quietly on a broken pipe
    pub fn writeln(&mut self, data: &str) -> Result<()> {
        let result = writeln!(self.stdout, "{}", data).and_then(|_| self.stdout.flush());
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => ExitCode::SignalPipe.exit(),
            Err(e) => Err(anyhow::anyhow!("Failed to write to stdout: {}", e)),
        }
    }
}
