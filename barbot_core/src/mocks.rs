//! Test and helper mocks for barbot_core

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use barbot_traits::{BoxError, LineSender, Transport};

#[derive(Debug, Clone)]
pub enum Scripted {
    Line(String),
    Timeout,
    /// I/O failure; the link goes down.
    Fail(String),
}

#[derive(Debug, Default)]
struct Script {
    connected: bool,
    replies: VecDeque<Scripted>,
    sent: Vec<String>,
}

/// Transport that replays a fixed list of replies and records what was sent.
/// An exhausted script reads as a timeout.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    /// A connected transport with an empty script.
    pub fn new() -> Self {
        let t = Self::default();
        t.lock().connected = true;
        t
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push_line(&self, line: &str) -> &Self {
        self.lock().replies.push_back(Scripted::Line(line.to_string()));
        self
    }

    pub fn push_lines(&self, lines: &[&str]) -> &Self {
        for l in lines {
            self.push_line(l);
        }
        self
    }

    pub fn push(&self, reply: Scripted) -> &Self {
        self.lock().replies.push_back(reply);
        self
    }

    /// Lines sent so far, terminator stripped.
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    pub fn remaining(&self) -> usize {
        self.lock().replies.len()
    }
}

impl Transport for ScriptedTransport {
    fn connect(&mut self, _identifier: &str) -> Result<(), BoxError> {
        self.lock().connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.lock().connected = false;
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn send(&mut self, line: &str) -> Result<(), BoxError> {
        let mut s = self.lock();
        if !s.connected {
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "port not open",
            )));
        }
        s.sent.push(line.trim_end_matches('\r').to_string());
        Ok(())
    }

    fn read_line(&mut self) -> Result<String, BoxError> {
        let mut s = self.lock();
        match s.replies.pop_front() {
            Some(Scripted::Line(l)) => Ok(l),
            Some(Scripted::Fail(reason)) => {
                s.connected = false;
                Err(Box::new(std::io::Error::other(reason)))
            }
            Some(Scripted::Timeout) | None => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "read timed out",
            ))),
        }
    }

    fn find_device(&mut self) -> Option<String> {
        None
    }

    fn sender(&self) -> Option<Box<dyn LineSender>> {
        Some(Box::new(self.clone()))
    }
}

impl LineSender for ScriptedTransport {
    fn send_line(&mut self, line: &str) -> Result<(), BoxError> {
        self.lock().sent.push(line.trim_end_matches('\r').to_string());
        Ok(())
    }
}
