use std::fs;
use std::path::Path;

use anyhow::Context;

use chainscript_ledger::LedgerConfig;

/// Load ledger settings from a TOML file, or the defaults when no file is
/// given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<LedgerConfig> {
    let Some(path) = path else {
        return Ok(LedgerConfig::default());
    };

    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: LedgerConfig =
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}
