//! Background thread running the orchestrator.
//!
//! Each `Worker` owns exactly one thread. Dropping it requests shutdown and
//! joins; the loop exits after the mainboard read in flight completes (at
//! most one read timeout).

use std::thread::JoinHandle;

use crate::barbot::BarBot;
use crate::error::{BarBotError, Result};
use crate::handle::BarBotHandle;

#[derive(Debug)]
pub struct Worker {
    handle: BarBotHandle,
    join_handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Move `bot` onto a new thread and start its loop.
    pub fn spawn(mut bot: BarBot) -> Result<Self> {
        let handle = bot.handle();
        let join_handle = std::thread::Builder::new()
            .name("barbot".into())
            .spawn(move || bot.run())
            .map_err(|e| eyre::eyre!("spawning orchestrator thread failed: {e}"))?;
        Ok(Self {
            handle,
            join_handle: Some(join_handle),
        })
    }

    pub fn handle(&self) -> &BarBotHandle {
        &self.handle
    }

    pub fn is_running(&self) -> bool {
        self.join_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Request shutdown and wait for the loop to exit.
    pub fn stop(mut self) -> std::result::Result<(), BarBotError> {
        self.shutdown_and_join()
    }

    fn shutdown_and_join(&mut self) -> std::result::Result<(), BarBotError> {
        self.handle.shutdown();
        match self.join_handle.take() {
            Some(h) => h.join().map_err(|_| BarBotError::WorkerPanicked),
            None => Ok(()),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown_and_join() {
            // In Drop; log only.
            tracing::warn!(error = %e, "orchestrator thread did not stop cleanly");
        } else {
            tracing::trace!("orchestrator thread joined");
        }
    }
}
