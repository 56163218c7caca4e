//! Post-build handling of emitted TypeScript declarations

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::WalkDir;

/// Move `*.d.ts` files from `<staging>/js` into `<staging>/types`,
/// keeping their relative layout. Returns how many files moved.
pub fn reorganize_type_definitions(staging: &Path) -> Result<usize> {
    let js_dir = staging.join("js");
    if !js_dir.is_dir() {
        return Ok(0);
    }
    let types_dir = staging.join("types");

    let declarations: Vec<_> = WalkDir::new(&js_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name().to_string_lossy().ends_with(".d.ts"))
        .map(|e| e.into_path())
        .collect();

    for source in &declarations {
        let relative = source.strip_prefix(&js_dir).unwrap_or(source);
        let target = types_dir.join(relative);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        // rename fails across filesystems; fall back to copy + remove
        if fs::rename(source, &target).is_err() {
            fs::copy(source, &target)
                .with_context(|| format!("Failed to copy {}", source.display()))?;
            fs::remove_file(source)
                .with_context(|| format!("Failed to remove {}", source.display()))?;
        }
        debug!("Moved {} -> {}", source.display(), target.display());
    }

    Ok(declarations.len())
}
