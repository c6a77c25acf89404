//! Download-target bookkeeping: per-site folders, file-number directory
//! resolution, filename sanitizing/collision handling, and download polling.
//!
//! Directory resolution is advisory best-effort: concurrent requests for the
//! same file number can both miss the existing folder and create it. That
//! race is inherited from the workflow design and deliberately not locked
//! away here (see DESIGN.md).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::DEFAULT_SITE_URL;
use crate::error::{Result, ScrapeError};
use crate::wait::WaitPolicy;

/// Subfolder for town/lot/block captures.
pub const TOWN_LOT_BLOCK_SUBFOLDER: &str = "Town_Lot_Block";

/// Map a portal URL (or explicit county) to the local site folder name.
pub fn site_folder(site_url: Option<&str>, county: Option<&str>) -> String {
    if let Some(county) = county {
        let c = county.trim();
        if !c.is_empty() {
            return c.to_lowercase();
        }
    }

    let url = site_url.filter(|u| !u.trim().is_empty()).unwrap_or(DEFAULT_SITE_URL);
    for known in ["atlantic", "bergen", "middlesex"] {
        if url.contains(known) {
            return known.to_string();
        }
    }
    "other".to_string()
}

fn site_base_dir(root: &Path, site_url: Option<&str>, county: Option<&str>) -> Result<PathBuf> {
    let base = root.join(site_folder(site_url, county));
    std::fs::create_dir_all(&base)?;
    Ok(base)
}

/// Find an existing directory in `base` whose name starts with `file_number`.
///
/// An external process may rename `{file_number}` to `{file_number}_X`;
/// capturing must keep resolving into that folder rather than creating a
/// duplicate.
fn find_existing_file_dir(base: &Path, file_number: &str) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(base)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(file_number))
                .unwrap_or(false)
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

fn resolve_file_dir(
    root: &Path,
    site_url: Option<&str>,
    county: Option<&str>,
    file_number: &str,
    subfolder: &str,
) -> Result<PathBuf> {
    let base = site_base_dir(root, site_url, county)?;
    let target = find_existing_file_dir(&base, file_number)
        .unwrap_or_else(|| base.join(file_number));
    let full = target.join(subfolder);
    std::fs::create_dir_all(&full)?;
    debug!("Resolved download dir: {}", full.display());
    Ok(full)
}

/// Download directory for a party-name search.
pub fn resolve_party_dir(
    root: &Path,
    site_url: Option<&str>,
    county: Option<&str>,
    file_number: &str,
    folder_name: Option<&str>,
) -> Result<PathBuf> {
    let subfolder = folder_name.filter(|f| !f.trim().is_empty()).unwrap_or("party");
    resolve_file_dir(root, site_url, county, file_number, subfolder)
}

/// Download directory for a town/lot/block search.
pub fn resolve_town_lot_block_dir(
    root: &Path,
    site_url: Option<&str>,
    county: Option<&str>,
    file_number: &str,
) -> Result<PathBuf> {
    resolve_file_dir(root, site_url, county, file_number, TOWN_LOT_BLOCK_SUBFOLDER)
}

/// Replace path-illegal characters (and spaces) with underscores.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | '*' | '?' | ':' | '"' | '<' | '>' | '|' | ' ' => '_',
            other => other,
        })
        .collect()
}

/// Resolve `{base}.pdf` in `dir`, appending `_{n}` until the name is unused.
/// Never yields a path that would overwrite an existing file.
pub fn unique_pdf_path(dir: &Path, base: &str) -> PathBuf {
    let mut path = dir.join(format!("{base}.pdf"));
    let mut counter = 1;
    while path.exists() {
        path = dir.join(format!("{base}_{counter}.pdf"));
        counter += 1;
    }
    path
}

/// List the PDFs currently in `dir`. Taken immediately before the action
/// that triggers a download, so the post-action diff is as narrow as
/// possible.
pub fn pdf_snapshot(dir: &Path) -> Result<HashSet<PathBuf>> {
    let mut set = HashSet::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e.eq_ignore_ascii_case("pdf")).unwrap_or(false) {
            set.insert(path);
        }
    }
    Ok(set)
}

/// Poll `dir` for a PDF that was not in `snapshot` and is no longer
/// mid-transfer (no `.crdownload` sidecar).
pub async fn wait_for_new_pdf(
    dir: &Path,
    snapshot: &HashSet<PathBuf>,
    policy: WaitPolicy,
) -> Result<PathBuf> {
    let dir = dir.to_path_buf();
    crate::wait::wait_until(policy, "new PDF in download directory", || {
        let dir = dir.clone();
        let snapshot = snapshot.clone();
        async move {
            let current = pdf_snapshot(&dir)?;
            for path in current.difference(&snapshot) {
                let mut sidecar = path.clone().into_os_string();
                sidecar.push(".crdownload");
                if !Path::new(&sidecar).exists() {
                    return Ok(Some(path.clone()));
                }
            }
            Ok(None)
        }
    })
    .await
    .map_err(|e| match e {
        ScrapeError::Timeout(_) => ScrapeError::DownloadTimeout(dir.display().to_string()),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "lrs_paths_{tag}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn site_folder_prefers_explicit_county() {
        assert_eq!(site_folder(Some("https://x.bergen.example/"), Some("Atlantic")), "atlantic");
        assert_eq!(site_folder(Some("https://x.bergen.example/"), None), "bergen");
        assert_eq!(site_folder(Some("https://unknown.example/"), None), "other");
        assert_eq!(site_folder(None, None), "bergen");
    }

    #[test]
    fn resolve_dir_is_idempotent() {
        let root = temp_root("idem");
        let a = resolve_party_dir(&root, None, Some("bergen"), "12345", None).unwrap();
        let b = resolve_party_dir(&root, None, Some("bergen"), "12345", None).unwrap();
        assert_eq!(a, b);
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn resolve_dir_reuses_suffixed_folder() {
        let root = temp_root("suffix");
        let first = resolve_party_dir(&root, None, Some("bergen"), "777", None).unwrap();
        // Simulate an external rename of the file-number folder.
        let base = root.join("bergen");
        std::fs::rename(base.join("777"), base.join("777_5")).unwrap();

        let second = resolve_party_dir(&root, None, Some("bergen"), "777", None).unwrap();
        assert!(second.starts_with(base.join("777_5")));
        assert_ne!(first, second);
        assert!(!base.join("777").exists(), "must not recreate the bare folder");
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn town_lot_block_dir_uses_fixed_subfolder() {
        let root = temp_root("tlb");
        let dir = resolve_town_lot_block_dir(&root, None, Some("middlesex"), "42").unwrap();
        assert!(dir.ends_with(Path::new("42").join(TOWN_LOT_BLOCK_SUBFOLDER)));
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn sanitize_replaces_illegal_chars() {
        assert_eq!(sanitize_filename("DEED W/S 1:2"), "DEED_W_S_1_2");
        assert_eq!(sanitize_filename("plain"), "plain");
    }

    #[test]
    fn unique_pdf_path_is_injective() {
        let root = temp_root("uniq");
        let mut seen = HashSet::new();
        for _ in 0..4 {
            let path = unique_pdf_path(&root, "DEED_123");
            std::fs::write(&path, b"x").unwrap();
            assert!(seen.insert(path));
        }
        assert_eq!(seen.len(), 4);
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn wait_for_new_pdf_ignores_snapshot_and_partials() {
        let root = temp_root("dl");
        std::fs::write(root.join("old.pdf"), b"x").unwrap();
        let snapshot = pdf_snapshot(&root).unwrap();

        std::fs::write(root.join("new.pdf"), b"y").unwrap();
        let policy = WaitPolicy::new(
            std::time::Duration::from_secs(2),
            std::time::Duration::from_millis(10),
        );
        let found = wait_for_new_pdf(&root, &snapshot, policy).await.unwrap();
        assert!(found.ends_with("new.pdf"));
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn wait_for_new_pdf_times_out_as_download_error() {
        let root = temp_root("dl_timeout");
        let snapshot = pdf_snapshot(&root).unwrap();
        let policy = WaitPolicy::new(
            std::time::Duration::from_millis(30),
            std::time::Duration::from_millis(10),
        );
        let err = wait_for_new_pdf(&root, &snapshot, policy).await.unwrap_err();
        assert!(matches!(err, ScrapeError::DownloadTimeout(_)));
        std::fs::remove_dir_all(&root).ok();
    }
}
