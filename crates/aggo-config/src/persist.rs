use std::path::PathBuf;

use serde::Deserialize;

/// Snapshot persistence. The whole `[persist]` section may be omitted, in
/// which case open windows are drained through the sinks on shutdown.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    /// Snapshot file. Relative paths are resolved against the config file's
    /// parent directory.
    pub snapshot: Option<PathBuf>,
}
