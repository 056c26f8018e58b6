// Locating the external renderer and building its command line.
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::path::{Path, PathBuf};

use crate::config::RendererConfig;

#[cfg(windows)]
const INSTALL_CANDIDATES: &[&str] = &[
    r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
];
#[cfg(not(windows))]
const INSTALL_CANDIDATES: &[&str] = &[];

#[cfg(windows)]
const PATH_CANDIDATES: &[&str] = &["msedge.exe", "chrome.exe"];
#[cfg(not(windows))]
const PATH_CANDIDATES: &[&str] = &[
    "msedge",
    "microsoft-edge",
    "microsoft-edge-stable",
    "chromium",
    "chromium-browser",
    "google-chrome",
];

/// Characters escaped in file URL paths.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Resolve the renderer executable: the configured path, then well-known
/// install locations, then a `PATH` search.
pub fn find_renderer(config: &RendererConfig) -> Option<PathBuf> {
    if let Some(path) = &config.path {
        if path.is_file() {
            return Some(path.clone());
        }
        tracing::warn!(path = %path.display(), "Configured renderer not found, searching defaults");
    }
    INSTALL_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
        .or_else(|| PATH_CANDIDATES.iter().find_map(|name| search_path(name)))
}

fn search_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Build a `file://` URL for a local document.
pub fn file_url(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let encoded = utf8_percent_encode(&raw, PATH_SEGMENT).to_string();
    if encoded.starts_with('/') {
        format!("file://{}", encoded)
    } else {
        // Windows drive paths such as C:/Users/...
        format!("file:///{}", encoded)
    }
}

/// Expand `{url}`, `{file}` and `{profile}` in the configured argument list.
pub fn build_args(template: &[String], document: &Path, profile_dir: &Path) -> Vec<String> {
    let url = file_url(document);
    let file = document.to_string_lossy();
    let profile = profile_dir.to_string_lossy();
    template
        .iter()
        .map(|arg| {
            arg.replace("{url}", &url)
                .replace("{file}", &file)
                .replace("{profile}", &profile)
        })
        .collect()
}
