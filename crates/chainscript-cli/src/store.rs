//! JSON file persistence for a registry snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing::debug;

use chainscript_ledger::{LedgerConfig, RegistrySnapshot, StoryReader, StoryRegistry};

pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write an empty store. Refuses to clobber an existing file unless
    /// `force` is set.
    pub fn init(&self, force: bool) -> anyhow::Result<()> {
        if self.exists() && !force {
            bail!(
                "{} already exists; pass --force to overwrite",
                self.path.display()
            );
        }
        self.write(&RegistrySnapshot::default())
    }

    pub fn load(&self, config: LedgerConfig) -> anyhow::Result<StoryRegistry> {
        let raw = fs::read_to_string(&self.path).with_context(|| {
            format!(
                "reading store {} (run `chainscript init` first)",
                self.path.display()
            )
        })?;
        let snapshot: RegistrySnapshot = serde_json::from_str(&raw)
            .with_context(|| format!("parsing store {}", self.path.display()))?;

        debug!(path = %self.path.display(), stories = snapshot.len(), "store loaded");
        let registry = StoryRegistry::from_records(config, snapshot.stories)?;
        Ok(registry)
    }

    pub fn save(&self, registry: &StoryRegistry) -> anyhow::Result<()> {
        self.write(&registry.snapshot()?)
    }

    /// Write through a sibling temp file and rename, so a failed write
    /// leaves the previous store intact.
    fn write(&self, snapshot: &RegistrySnapshot) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(snapshot)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing store {}", self.path.display()))?;
        debug!(path = %self.path.display(), stories = snapshot.len(), "store saved");
        Ok(())
    }
}
