//! Common test utilities and helpers

#![allow(dead_code)]

use anyhow::Result;
use autotest::{EventKind, HarnessConfig, Process};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const HELLO: EventKind = EventKind(0);
pub const READY: EventKind = EventKind(1);
pub const FAILED: EventKind = EventKind(2);

/// Install the test subscriber once; `RUST_LOG` overrides the level
pub fn init_logging() {
    let _ = autotest::logging::init_tracing("warn");
}

/// A `bash -c` process with the given script
pub fn bash(script: &str) -> Process {
    init_logging();
    Process::new("bash", ["-c", script])
}

/// Temporary directory holding scripts and config files for one test
pub struct Fixture {
    temp_dir: TempDir,
}

impl Fixture {
    pub fn new() -> Result<Self> {
        init_logging();
        Ok(Self {
            temp_dir: TempDir::new()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write `contents` to `name` inside the fixture and return its path
    pub fn write(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Load a harness config from a TOML file written into the fixture
    pub fn config(&self, toml: &str) -> Result<HarnessConfig> {
        let path = self.write("autotest.toml", toml)?;
        HarnessConfig::load(&path)
    }
}
