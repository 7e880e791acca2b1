//! Periodic background passes.
//!
//! Both sweepers (auto-cancel and escrow release) run on [`Ticker`]: a worker
//! thread with an explicit stop signal that is deterministically joined on
//! stop, never an uncontrolled timer.

mod auto_cancel;

pub use auto_cancel::*;

use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// A cancellable periodic task.
///
/// The pass closure runs once per period until [`Ticker::stop`] is called or
/// the ticker is dropped; both tear the thread down and wait for it to
/// finish, so no pass can still be running afterwards.
pub struct Ticker {
    stop_tx: mpsc::Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Ticker {
    /// Spawn a named ticker running `pass` every `period`.
    pub fn spawn<F>(name: &str, period: Duration, mut pass: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(format!("ticker-{}", name))
            .spawn(move || loop {
                match stop_rx.recv_timeout(period) {
                    Err(mpsc::RecvTimeoutError::Timeout) => pass(),
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            })?;
        Ok(Self {
            stop_tx,
            handle: Some(handle),
        })
    }

    /// Stop the ticker and wait for the worker to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
