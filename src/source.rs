//! Audio sources: the capability set `{download, title, duration, author,
//! url}` a queued element needs, modeled as a trait object rather than an enum
//! with inline behavior — each variant owns genuinely different async work
//! (a blocking subprocess download vs. a chat-file download vs. a no-op
//! path copy), so a `dyn AudioSource` dispatch table reads more like the
//! "tagged variants over inheritance" design note than a closed `match`
//! would once a fourth source type shows up.
//!
//! Grounded in `audio_sources/__init__.py` (the `AudioSource` ABC) and its
//! three concrete children (`yt_dlp_audio_source.py`, `telegram_file_audio_source.py`,
//! `local_audio_source.py`).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::resource::Resource;

/// Who to credit a track to, and what relation they have to it — an
/// `(author_role, author_name)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub role: String,
    pub name: String,
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role, self.name)
    }
}

/// The capability set every queued element's source must provide.
#[async_trait]
pub trait AudioSource: Send + Sync + fmt::Debug {
    /// Fetch the audio into `resource`'s directory and return the path to
    /// the playable file. Blocking I/O — callers must run this on a
    /// worker thread, never on the scheduling thread.
    async fn download(&self, resource: &Resource) -> Result<PathBuf>;

    fn title(&self) -> &str;

    fn duration(&self) -> Duration;

    fn author(&self) -> Author;

    /// The source's canonical URL, if it has one (local files and some
    /// uploaded blobs don't).
    fn url(&self) -> Option<&str>;
}

/// The out-of-scope media-fetcher collaborator's seam: given a URL or a
/// search string, resolve enough metadata to build a [`RemoteQuery`] and
/// perform the eventual blocking download. A real implementation shells out
/// to (or links) a fetcher like yt-dlp; tests use a canned resolver.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve(&self, query: &RemoteQueryKind) -> Result<ResolvedMetadata>;

    /// Perform the actual (blocking) download of a previously resolved
    /// query into `resource_dir`, returning the path to the file. Takes a
    /// bare path rather than a [`Resource`] because it runs inside
    /// `spawn_blocking`, off the async executor that owns the `Resource`.
    fn download_blocking(&self, resolved: &ResolvedMetadata, resource_dir: &Path) -> Result<PathBuf>;
}

/// What the user typed, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteQueryKind {
    Url(String),
    Search(String),
}

/// What a [`MetadataResolver`] learns about a query before any bytes move.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMetadata {
    pub title: String,
    pub duration: Duration,
    pub author: Author,
    pub url: String,
}

/// A URL or search-text request, resolved eagerly through a
/// [`MetadataResolver`]; its [`download`](AudioSource::download) is blocking
/// I/O invoked from the queue on a worker thread.
#[derive(Debug)]
pub struct RemoteQuery {
    resolved: ResolvedMetadata,
    resolver: std::sync::Arc<dyn MetadataResolver>,
}

impl RemoteQuery {
    /// Resolve `query`'s metadata eagerly, before any bytes move.
    pub async fn resolve(
        query: RemoteQueryKind,
        resolver: std::sync::Arc<dyn MetadataResolver>,
    ) -> Result<Self> {
        let resolved = resolver.resolve(&query).await?;
        Ok(Self { resolved, resolver })
    }
}

#[async_trait]
impl AudioSource for RemoteQuery {
    async fn download(&self, resource: &Resource) -> Result<PathBuf> {
        let resolved = self.resolved.clone();
        let resolver = std::sync::Arc::clone(&self.resolver);
        let resource_dir = resource.path().to_path_buf();
        // The resolver's actual fetch is blocking I/O (subprocess + disk);
        // route it through spawn_blocking so the scheduling thread is free
        // for the rest of the queue.
        tokio::task::spawn_blocking(move || resolver.download_blocking(&resolved, &resource_dir))
            .await
            .map_err(|e| crate::error::Error::download(format!("download task panicked: {e}")))?
    }

    fn title(&self) -> &str {
        &self.resolved.title
    }

    fn duration(&self) -> Duration {
        self.resolved.duration
    }

    fn author(&self) -> Author {
        self.resolved.author.clone()
    }

    fn url(&self) -> Option<&str> {
        Some(&self.resolved.url)
    }
}

/// A chat-provided file, fetched through the out-of-scope chat-transport
/// collaborator. The file bytes are handed to us already (the transport's
/// job, not ours); we just place them in the element's resource directory.
#[derive(Debug)]
pub struct UploadedBlob {
    title: String,
    duration: Duration,
    author: Author,
    /// Already-downloaded bytes, or a path the transport wrote to — the
    /// transport SDK boundary means this crate never talks HTTP for blobs.
    bytes: Vec<u8>,
    file_name: String,
}

impl UploadedBlob {
    pub fn new(title: String, duration: Duration, author: Author, file_name: String, bytes: Vec<u8>) -> Self {
        Self {
            title,
            duration,
            author,
            bytes,
            file_name,
        }
    }
}

#[async_trait]
impl AudioSource for UploadedBlob {
    async fn download(&self, resource: &Resource) -> Result<PathBuf> {
        let dest = resource.path().join(&self.file_name);
        tokio::fs::write(&dest, &self.bytes).await?;
        Ok(dest)
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn author(&self) -> Author {
        self.author.clone()
    }

    fn url(&self) -> Option<&str> {
        None
    }
}

/// A file already on disk — `download` is a no-op copy into the element's
/// own resource dir so the resource-ownership invariant still holds: all
/// downloaded and intermediate files of one element live under its
/// resource dir.
#[derive(Debug)]
pub struct LocalFile {
    path: PathBuf,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AudioSource for LocalFile {
    async fn download(&self, resource: &Resource) -> Result<PathBuf> {
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| crate::error::Error::download("local file path has no file name"))?;
        let dest = resource.path().join(file_name);
        tokio::fs::copy(&self.path, &dest).await?;
        Ok(dest)
    }

    fn title(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("<unknown local audio file>")
    }

    fn duration(&self) -> Duration {
        Duration::ZERO
    }

    fn author(&self) -> Author {
        Author {
            role: "performer".to_string(),
            name: "<unknown>".to_string(),
        }
    }

    fn url(&self) -> Option<&str> {
        None
    }
}

/// For the sfx lane, which enqueues local files directly with no resource
/// of their own.
pub fn sfx_source(path: impl Into<PathBuf>) -> LocalFile {
    LocalFile::new(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_file_download_copies_into_resource() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("source.wav");
        tokio::fs::write(&src, b"hello").await.unwrap();

        let handler = crate::resource::ResourceHandler::new(dir.path().join("resources")).unwrap();
        let resource = handler.claim().unwrap();

        let source = LocalFile::new(&src);
        let out = source.download(&resource).await.unwrap();
        assert_eq!(tokio::fs::read(&out).await.unwrap(), b"hello");
        assert_eq!(source.title(), "source");
        assert!(source.url().is_none());
    }

    #[tokio::test]
    async fn test_uploaded_blob_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let handler = crate::resource::ResourceHandler::new(dir.path().join("resources")).unwrap();
        let resource = handler.claim().unwrap();

        let blob = UploadedBlob::new(
            "a title".into(),
            Duration::from_secs(5),
            Author {
                role: "performer".into(),
                name: "someone".into(),
            },
            "clip.ogg".into(),
            b"sound bytes".to_vec(),
        );
        let out = blob.download(&resource).await.unwrap();
        assert_eq!(tokio::fs::read(&out).await.unwrap(), b"sound bytes");
        assert_eq!(blob.title(), "a title");
    }

    struct StaticResolver;

    #[async_trait]
    impl MetadataResolver for StaticResolver {
        async fn resolve(&self, query: &RemoteQueryKind) -> Result<ResolvedMetadata> {
            let title = match query {
                RemoteQueryKind::Url(u) => u.clone(),
                RemoteQueryKind::Search(s) => s.clone(),
            };
            Ok(ResolvedMetadata {
                title,
                duration: Duration::from_secs(180),
                author: Author {
                    role: "artist".into(),
                    name: "Someone".into(),
                },
                url: "https://example.com/track".into(),
            })
        }

        fn download_blocking(&self, resolved: &ResolvedMetadata, resource_dir: &Path) -> Result<PathBuf> {
            let dest = resource_dir.join("track.m4a");
            std::fs::write(&dest, resolved.title.as_bytes())?;
            Ok(dest)
        }
    }

    #[tokio::test]
    async fn test_remote_query_resolves_then_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let handler = crate::resource::ResourceHandler::new(dir.path().join("resources")).unwrap();
        let resource = handler.claim().unwrap();

        let resolver: std::sync::Arc<dyn MetadataResolver> = std::sync::Arc::new(StaticResolver);
        let source = RemoteQuery::resolve(RemoteQueryKind::Search("my song".into()), resolver)
            .await
            .unwrap();

        assert_eq!(source.title(), "my song");
        assert_eq!(source.duration(), Duration::from_secs(180));
        assert_eq!(source.url(), Some("https://example.com/track"));

        let path = source.download(&resource).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"my song");
    }
}
