//! Writing a download stream to disk with an atomic commit.

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use super::DownloadError;

/// Writes every buffer of `stream` to `path`, returning the byte count.
///
/// Bytes go to a temporary file next to `path`, which replaces `path` only
/// after the stream ends without error. On any failure (including a digest
/// mismatch reported by a [`HashVerifier`](super::HashVerifier)) the temporary
/// file is removed and `path` is left untouched.
///
/// A replaced file keeps its permissions; a new file gets the same mode as
/// any file created under the process umask.
///
/// # Errors
///
/// Returns the stream's own error, or [`DownloadError::Io`] if the file
/// cannot be created, written or renamed.
#[instrument(skip(stream), fields(path = %path.display()))]
pub async fn save_stream<S>(mut stream: S, path: &Path) -> Result<u64, DownloadError>
where
    S: Stream<Item = Result<Bytes, DownloadError>> + Unpin,
{
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut builder = tempfile::Builder::new();
    builder.prefix(".rangefetch-").suffix(".part");
    // tempfile defaults to 0600; a new download gets the umask default instead.
    #[cfg(unix)]
    builder.permissions(std::fs::Permissions::from_mode(0o666));
    let temp = builder
        .tempfile_in(dir)
        .map_err(|e| DownloadError::io(dir, e))?;
    let std_file = temp.reopen().map_err(|e| DownloadError::io(temp.path(), e))?;
    let mut file = tokio::fs::File::from_std(std_file);
    debug!(temp = %temp.path().display(), "writing to temporary file");

    let mut written: u64 = 0;
    while let Some(item) = stream.next().await {
        let bytes = item?;
        file.write_all(&bytes)
            .await
            .map_err(|e| DownloadError::io(temp.path(), e))?;
        written += bytes.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::io(temp.path(), e))?;
    file.sync_all()
        .await
        .map_err(|e| DownloadError::io(temp.path(), e))?;
    drop(file);

    if let Ok(existing) = tokio::fs::metadata(path).await {
        tokio::fs::set_permissions(temp.path(), existing.permissions())
            .await
            .map_err(|e| DownloadError::io(temp.path(), e))?;
    }

    temp.persist(path)
        .map_err(|e| DownloadError::io(path, e.error))?;
    info!(bytes = written, "file saved");
    Ok(written)
}
