//! Local save destinations.

use std::future::Future;
use std::io::{self, SeekFrom};
use std::path::PathBuf;
use std::pin::Pin;

use lanyue_transfer::validate_file_name;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt, BufWriter};
use tracing::debug;

/// Boxed future returned by the sink seam traits.
pub type SinkFuture<'a, T> = Pin<Box<dyn Future<Output = io::Result<T>> + Send + 'a>>;

/// Hands out a writable sink for a suggested file name.
pub trait SaveTarget: Send + Sync {
    fn acquire(&self, name: &str) -> SinkFuture<'_, Box<dyn SaveSink>>;
}

/// A sequential byte sink.
pub trait SaveSink: Send {
    /// Bytes already present from an earlier, interrupted download.
    fn resume_offset(&self) -> u64;

    fn write<'a>(&'a mut self, data: &'a [u8]) -> SinkFuture<'a, ()>;

    /// Discards everything written so far.
    fn rewind(&mut self) -> SinkFuture<'_, ()>;

    /// Flushes and releases the sink. Only a `completed` download becomes
    /// visible under its final name.
    fn close(&mut self, completed: bool) -> SinkFuture<'_, ()>;
}

/// Suffix of the file a download is written to until it completes.
const PART_SUFFIX: &str = ".part";

/// Saves downloads as files inside a directory.
///
/// Bytes go to `<name>.part` first; the file is renamed to `<name>` once the
/// download completes. An existing `<name>` is never appended to.
#[derive(Debug, Clone)]
pub struct DirectorySaveTarget {
    dir: PathBuf,
    resume: bool,
}

impl DirectorySaveTarget {
    /// With `resume`, a `.part` file left by an interrupted download is
    /// continued, and kept on failure for the next attempt.
    pub fn new(dir: impl Into<PathBuf>, resume: bool) -> Self {
        Self {
            dir: dir.into(),
            resume,
        }
    }

    async fn open(&self, name: &str) -> io::Result<FileSink> {
        validate_file_name(name)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let dest = self.dir.join(name);
        let part = self.dir.join(format!("{name}{PART_SUFFIX}"));
        let (file, offset) = if self.resume {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(false)
                .open(&part)
                .await?;
            let offset = file.seek(SeekFrom::End(0)).await?;
            (file, offset)
        } else {
            (File::create(&part).await?, 0)
        };
        debug!(path = %part.display(), offset, "save target opened");

        Ok(FileSink {
            writer: Some(BufWriter::new(file)),
            offset,
            part,
            dest,
            keep_partial: self.resume,
        })
    }
}

impl SaveTarget for DirectorySaveTarget {
    fn acquire(&self, name: &str) -> SinkFuture<'_, Box<dyn SaveSink>> {
        let name = name.to_string();
        Box::pin(async move {
            let sink = self.open(&name).await?;
            Ok(Box::new(sink) as Box<dyn SaveSink>)
        })
    }
}

struct FileSink {
    writer: Option<BufWriter<File>>,
    offset: u64,
    part: PathBuf,
    dest: PathBuf,
    keep_partial: bool,
}

impl FileSink {
    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::other("save target already closed"))
    }
}

impl SaveSink for FileSink {
    fn resume_offset(&self) -> u64 {
        self.offset
    }

    fn write<'a>(&'a mut self, data: &'a [u8]) -> SinkFuture<'a, ()> {
        Box::pin(async move { self.writer()?.write_all(data).await })
    }

    fn rewind(&mut self) -> SinkFuture<'_, ()> {
        Box::pin(async move {
            let writer = self.writer()?;
            writer.flush().await?;
            let file = writer.get_mut();
            file.set_len(0).await?;
            file.seek(SeekFrom::Start(0)).await?;
            self.offset = 0;
            Ok(())
        })
    }

    fn close(&mut self, completed: bool) -> SinkFuture<'_, ()> {
        Box::pin(async move {
            let Some(mut writer) = self.writer.take() else {
                return Ok(());
            };
            writer.flush().await?;
            writer.get_mut().sync_all().await?;
            drop(writer);

            if completed {
                tokio::fs::rename(&self.part, &self.dest).await?;
                debug!(path = %self.dest.display(), "download saved");
            } else if !self.keep_partial {
                match tokio::fs::remove_file(&self.part).await {
                    Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
                    _ => {}
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(dir: &tempfile::TempDir, name: &str) -> Vec<u8> {
        std::fs::read(dir.path().join(name)).unwrap()
    }

    #[tokio::test]
    async fn completed_download_replaces_the_final_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"stale data").unwrap();
        let target = DirectorySaveTarget::new(dir.path(), false);

        let mut sink = target.acquire("a.txt").await.unwrap();
        assert_eq!(sink.resume_offset(), 0);
        sink.write(b"hello ").await.unwrap();
        sink.write(b"world").await.unwrap();
        // Nothing visible under the real name until the download completes.
        assert_eq!(read(&dir, "a.txt"), b"stale data");
        sink.close(true).await.unwrap();

        assert_eq!(read(&dir, "a.txt"), b"hello world");
        assert!(!dir.path().join("a.txt.part").exists());
    }

    #[tokio::test]
    async fn existing_file_is_never_resumed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report.txt"), b"OLD-UNRELATED").unwrap();
        let target = DirectorySaveTarget::new(dir.path(), true);

        let mut sink = target.acquire("report.txt").await.unwrap();
        assert_eq!(sink.resume_offset(), 0);
        sink.write(b"brand new report contents").await.unwrap();
        sink.close(true).await.unwrap();
        assert_eq!(read(&dir, "report.txt"), b"brand new report contents");
    }

    #[tokio::test]
    async fn resume_continues_the_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin.part"), b"0123").unwrap();
        let target = DirectorySaveTarget::new(dir.path(), true);

        let mut sink = target.acquire("a.bin").await.unwrap();
        assert_eq!(sink.resume_offset(), 4);
        sink.write(b"4567").await.unwrap();
        sink.close(true).await.unwrap();
        assert_eq!(read(&dir, "a.bin"), b"01234567");
    }

    #[tokio::test]
    async fn failed_download_keeps_partial_only_when_resuming() {
        let dir = tempfile::tempdir().unwrap();

        let mut sink = DirectorySaveTarget::new(dir.path(), true)
            .acquire("a.bin")
            .await
            .unwrap();
        sink.write(b"01").await.unwrap();
        sink.close(false).await.unwrap();
        assert_eq!(read(&dir, "a.bin.part"), b"01");
        assert!(!dir.path().join("a.bin").exists());

        let mut sink = DirectorySaveTarget::new(dir.path(), false)
            .acquire("a.bin")
            .await
            .unwrap();
        sink.write(b"xy").await.unwrap();
        sink.close(false).await.unwrap();
        assert!(!dir.path().join("a.bin.part").exists());
        assert!(!dir.path().join("a.bin").exists());
    }

    #[tokio::test]
    async fn rewind_discards_partial_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin.part"), b"0123").unwrap();
        let target = DirectorySaveTarget::new(dir.path(), true);

        let mut sink = target.acquire("a.bin").await.unwrap();
        sink.rewind().await.unwrap();
        assert_eq!(sink.resume_offset(), 0);
        sink.write(b"full").await.unwrap();
        sink.close(true).await.unwrap();
        assert_eq!(read(&dir, "a.bin"), b"full");
    }

    #[tokio::test]
    async fn closing_twice_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySaveTarget::new(dir.path(), false)
            .acquire("a.txt")
            .await
            .unwrap();
        sink.write(b"x").await.unwrap();
        sink.close(true).await.unwrap();
        sink.close(true).await.unwrap();
        assert!(sink.write(b"y").await.is_err());
        assert_eq!(read(&dir, "a.txt"), b"x");
    }

    #[tokio::test]
    async fn rejects_traversal_names() {
        let dir = tempfile::tempdir().unwrap();
        let target = DirectorySaveTarget::new(dir.path().join("out"), false);
        let err = target.acquire("../escape.txt").await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
