//! Whole-file replacement for the JSON stores.

use crate::VocabError;
use std::fs;
use std::path::Path;

/// Write `contents` next to `path` and rename it into place.
///
/// The temp file never outlives a failed write.
pub(crate) fn replace_file(path: &Path, contents: &[u8]) -> Result<(), VocabError> {
    let temp_path = path.with_extension("json.tmp");
    if let Err(e) = fs::write(&temp_path, contents) {
        let _ = fs::remove_file(&temp_path);
        return Err(VocabError::Persistence(format!(
            "cannot write {}: {}",
            temp_path.display(),
            e
        )));
    }
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(VocabError::Persistence(format!(
            "cannot replace {}: {}",
            path.display(),
            e
        )));
    }
    Ok(())
}
