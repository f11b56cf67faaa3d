use std::collections::HashMap;
use std::path::Path;

use aggo_core::RuleBucket;
use aggo_core::snapshot;
use orion_error::compat_prelude::*;
use orion_error::prelude::*;

use crate::error::RuntimeResult;

/// Read a snapshot written by [`save_snapshot`]. A missing file is not an
/// error and yields `None`.
pub fn load_snapshot(path: &Path) -> RuntimeResult<Option<HashMap<String, RuleBucket>>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).owe_sys(),
    };
    let buckets = snapshot::decode(&content).err_conv()?;
    ag_info!(res, path = %path.display(), rules = buckets.len(), "snapshot loaded");
    Ok(Some(buckets))
}

/// Write `buckets` to `path` through a sibling temp file, so a crash never
/// leaves a truncated snapshot behind.
pub fn save_snapshot(path: &Path, buckets: &HashMap<String, RuleBucket>) -> RuntimeResult<()> {
    let json = snapshot::encode(buckets).err_conv()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).owe_sys()?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json).owe_sys()?;
    std::fs::rename(&tmp, path).owe_sys()?;
    let pending: usize = buckets.values().map(|b| b.events.len()).sum();
    ag_info!(res, path = %path.display(), rules = buckets.len(), pending_events = pending, "snapshot saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggo_core::{Event, Rule};
    use std::sync::Arc;

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_snapshot(&dir.path().join("none.json")).unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/snapshot.json");
        let mut bucket = RuleBucket::new(Rule::new("r1", ["a"], 100));
        bucket
            .events
            .push(Arc::new(Event::new("a", serde_json::json!({"n": 1}))));
        let buckets = HashMap::from([("r1".to_string(), bucket)]);

        save_snapshot(&path, &buckets).unwrap();
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(load_snapshot(&path).unwrap(), Some(buckets));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, "{").unwrap();
        assert!(load_snapshot(&path).is_err());
    }
}
