//! Cancellable periodic task
//!
//! A `Notifier` runs a closure at a fixed period on a dedicated timer thread.
//! It is used to trigger work which must run at a different rate to the main
//! control cycle, such as streaming buffered data to a device.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use log::warn;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A periodic task running on its own timer thread.
///
/// The task is stopped either explicitly with [`Notifier::stop`] or when the
/// `Notifier` is dropped. Stopping joins the timer thread, so once `stop`
/// returns the closure is guaranteed not to run again.
pub struct Notifier {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Notifier {
    /// Start running the given closure every `period`.
    ///
    /// The first execution happens one full period after this call.
    pub fn start_periodic<F>(period: Duration, mut func: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();

        let handle = thread::spawn(move || {
            let mut next_fire = Instant::now() + period;

            loop {
                // Sleep up to the next fire time in small increments so a stop
                // request is honoured promptly
                loop {
                    if thread_stop.load(Ordering::Relaxed) {
                        return;
                    }

                    let now = Instant::now();
                    if now >= next_fire {
                        break;
                    }

                    thread::sleep((next_fire - now).min(period / 4));
                }

                func();

                // Schedule relative to the previous fire time to avoid drift
                next_fire += period;

                // If we have overrun by more than a period, resynchronise
                // rather than firing back-to-back
                let now = Instant::now();
                if next_fire + period < now {
                    next_fire = now + period;
                }
            }
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop the periodic task and wait for the timer thread to exit.
    ///
    /// Calling `stop` more than once is a no-op.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Notifier timer thread panicked");
            }
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.stop();
    }
}
