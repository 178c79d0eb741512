use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::TransferError;

/// Spools an unsized stream into a temporary file and returns the file
/// guard plus the number of bytes written.
///
/// The returned [`NamedTempFile`] unlinks its file on drop, which covers
/// every exit path of the surrounding put call. Used when a source backend
/// cannot report an object's size up front; the uploader needs the total
/// size before the first chunk goes out.
pub async fn spool_to_temp<R>(reader: &mut R) -> Result<(NamedTempFile, i64), TransferError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let temp = tempfile::Builder::new()
        .prefix("vault-transit-")
        .tempfile()?;
    let mut file = tokio::fs::File::from_std(temp.reopen()?);
    let written = tokio::io::copy(reader, &mut file).await?;
    file.flush().await?;
    tracing::debug!(bytes = written, path = %temp.path().display(), "spooled unsized stream");
    Ok((temp, written as i64))
}
