//! Default [`MetadataResolver`] implementation: shells out to `yt-dlp`.
//!
//! This is the one concrete edge of the otherwise-abstract media-fetcher
//! collaborator, grounded directly in
//! `audio_sources/yt_dlp_audio_source.py`, which does the equivalent via
//! the Python `yt_dlp` library (`extract_info(download=False)` for
//! metadata, then a second pass with `ydl.download()`). We invoke the CLI
//! instead of linking a Rust yt-dlp binding, since none of the corpus's
//! dependency stacks vendor one.

use std::path::{Path, PathBuf};
use std::process::Command as BlockingCommand;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::source::{Author, MetadataResolver, RemoteQueryKind, ResolvedMetadata};

/// Author-type precedence when `yt-dlp`'s metadata offers more than one
/// (composer takes priority over uploader, etc).
const AUTHOR_TYPES: &[&str] = &["composer", "artist", "uploader"];

#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    composer: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
}

impl YtDlpInfo {
    fn author(&self) -> Author {
        let by_type = [
            ("composer", &self.composer),
            ("artist", &self.artist),
            ("uploader", &self.uploader),
        ];
        for author_type in AUTHOR_TYPES {
            if let Some((_, Some(name))) = by_type.iter().find(|(t, _)| t == author_type)
                && !name.is_empty()
            {
                return Author {
                    role: author_type.to_string(),
                    name: name.clone(),
                };
            }
        }
        Author {
            role: "uploader".to_string(),
            name: "<unknown>".to_string(),
        }
    }
}

/// Resolves and downloads via the `yt-dlp` binary on `$PATH`.
pub struct YtDlpResolver {
    binary: String,
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
        }
    }
}

impl YtDlpResolver {
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

#[async_trait]
impl MetadataResolver for YtDlpResolver {
    async fn resolve(&self, query: &RemoteQueryKind) -> Result<ResolvedMetadata> {
        let target = match query {
            RemoteQueryKind::Url(url) => url.clone(),
            RemoteQueryKind::Search(text) => format!("ytsearch:{text}"),
        };

        let output = Command::new(&self.binary)
            .arg("--dump-json")
            .arg("--no-playlist")
            .arg(&target)
            .output()
            .await
            .map_err(|e| Error::download(format!("failed to spawn {}: {e}", self.binary)))?;

        if !output.status.success() {
            return Err(Error::download(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        // ytsearch: emits one JSON object per line; take the first result.
        let first_line = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .ok_or_else(|| Error::download("no results found"))?
            .to_string();

        let info: YtDlpInfo = serde_json::from_str(&first_line)
            .map_err(|e| Error::download(format!("couldn't parse yt-dlp metadata: {e}")))?;

        Ok(ResolvedMetadata {
            author: info.author(),
            duration: Duration::from_secs_f64(info.duration.max(0.0)),
            url: info
                .webpage_url
                .clone()
                .unwrap_or_else(|| target.clone()),
            title: info.title,
        })
    }

    fn download_blocking(&self, resolved: &ResolvedMetadata, resource_dir: &Path) -> Result<PathBuf> {
        let output_template = resource_dir.join("%(title)s.%(ext)s");

        let status = BlockingCommand::new(&self.binary)
            .arg("--no-playlist")
            .arg("--format")
            .arg("m4a/bestaudio/best")
            .arg("--output")
            .arg(&output_template)
            .arg(&resolved.url)
            .status()
            .map_err(|e| Error::download(format!("failed to spawn {}: {e}", self.binary)))?;

        if !status.success() {
            return Err(Error::download(format!("{} exited with {status}", self.binary)));
        }

        find_downloaded_file(resource_dir)
    }
}

/// `yt-dlp` picks its own extension based on the source format, so we can't
/// predict the exact output filename; take whichever single non-hidden
/// file landed in the (freshly claimed, otherwise-empty) resource dir.
/// Grounded in `yt_dlp_audio_source.py`'s `_download_thread`, which applies
/// the same "glob the resource dir" fallback when the predicted stem
/// doesn't match what yt-dlp actually wrote.
fn find_downloaded_file(resource_dir: &Path) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(resource_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && !path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with('.'))
                    .unwrap_or(false)
        })
        .collect();

    match candidates.len() {
        0 => Err(Error::download("download failed: no downloaded file found")),
        1 => Ok(candidates.remove(0)),
        _ => {
            tracing::warn!(
                "ambiguous download: found {} files in resource dir, using the first",
                candidates.len()
            );
            candidates.sort();
            Ok(candidates.remove(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_prefers_composer_over_artist_and_uploader() {
        let info = YtDlpInfo {
            title: "t".into(),
            duration: 1.0,
            composer: Some("Bach".into()),
            artist: Some("Someone".into()),
            uploader: Some("Uploader".into()),
            webpage_url: None,
        };
        let author = info.author();
        assert_eq!(author.role, "composer");
        assert_eq!(author.name, "Bach");
    }

    #[test]
    fn test_author_falls_back_to_uploader() {
        let info = YtDlpInfo {
            title: "t".into(),
            duration: 1.0,
            composer: None,
            artist: None,
            uploader: Some("Uploader".into()),
            webpage_url: None,
        };
        assert_eq!(info.author().role, "uploader");
    }

    #[test]
    fn test_find_downloaded_file_picks_sole_candidate() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("song.m4a"), b"data").unwrap();
        let found = find_downloaded_file(dir.path()).unwrap();
        assert_eq!(found.file_name().unwrap(), "song.m4a");
    }

    #[test]
    fn test_find_downloaded_file_errors_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_downloaded_file(dir.path()).unwrap_err();
        assert!(err.to_string().contains("no downloaded file"));
    }
}
