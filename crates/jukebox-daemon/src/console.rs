//! Tag reader fed from stdin, one tag id per line.
//!
//! Stands in for the MFRC522 driver on machines without the SPI reader.
//! Typing a line is one scan; a scan is consumed by whichever side
//! (dispatcher or registration) reads it first.
//!
//! An abandoned registration leaves its blocking read waiting on the
//! channel, so the first line typed afterwards goes to that orphaned read
//! and is lost. Type the tag again.

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Mutex, TryLockError};

use jukebox_core::error::ReaderError;
use jukebox_core::reader::TagReader;
use tracing::{debug, info};

pub struct ConsoleReader {
    scans: Mutex<Receiver<String>>,
}

impl ConsoleReader {
    /// Start the stdin pump thread.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let tag = line.trim();
                if tag.is_empty() {
                    continue;
                }
                if tx.send(tag.to_string()).is_err() {
                    break;
                }
            }
            info!("console reader: stdin closed");
        });
        Self::from_receiver(rx)
    }

    fn from_receiver(scans: Receiver<String>) -> Self {
        Self {
            scans: Mutex::new(scans),
        }
    }
}

impl TagReader for ConsoleReader {
    fn poll(&self) -> Result<Option<String>, ReaderError> {
        // A blocking read still holding the receiver (an orphaned
        // registration) reads as "no tag" rather than stalling the caller.
        let scans = match self.scans.try_lock() {
            Ok(scans) => scans,
            Err(TryLockError::WouldBlock) => return Ok(None),
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
        };
        match scans.try_recv() {
            Ok(tag) => Ok(Some(tag)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ReaderError::Closed),
        }
    }

    fn read_blocking(&self) -> Result<String, ReaderError> {
        let scans = self.scans.lock().unwrap_or_else(|e| e.into_inner());
        scans.recv().map_err(|_| ReaderError::Closed)
    }

    fn release(&self) {
        debug!("console reader: release (nothing to free)");
    }
}
