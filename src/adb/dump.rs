use crate::error::Result;
use log::warn;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const DUMP_ENV: &str = "ADBRIDGE_DUMP";
pub const DUMP_FILE: &str = "adbridge.dump";

/// Receives a copy of every chunk written to the ADB server.
pub trait WireDump: Send + Sync {
    fn record(&self, chunk: &[u8]);
}

pub struct NoDump;

impl WireDump for NoDump {
    fn record(&self, _chunk: &[u8]) {}
}

/// Appends written chunks to a file.
pub struct FileDump {
    file: Mutex<File>,
}

impl FileDump {
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl WireDump for FileDump {
    fn record(&self, chunk: &[u8]) {
        if let Ok(mut file) = self.file.lock() {
            if let Err(e) = file.write_all(chunk) {
                warn!("Unable to write wire dump: {}", e);
            }
        }
    }
}

/// File dump when `ADBRIDGE_DUMP` is set, no-op otherwise.
pub fn from_env() -> Arc<dyn WireDump> {
    if std::env::var_os(DUMP_ENV).is_none() {
        return Arc::new(NoDump);
    }
    match FileDump::create(Path::new(DUMP_FILE)) {
        Ok(dump) => Arc::new(dump),
        Err(e) => {
            warn!("Unable to open {}: {}", DUMP_FILE, e);
            Arc::new(NoDump)
        }
    }
}
