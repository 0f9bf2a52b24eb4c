use indicatif::ProgressBar;
use object_store::{ObjectStore, WriteMultipart, path::Path as ObjectPath};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use super::error::{Result, UploadError};

const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Most parts a single multipart upload may have
pub const MAX_PARTS: u64 = 10_000;

/// Largest part B2 accepts (5 GiB)
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct UploadOptions {
    /// Parts allowed in flight at once
    pub concurrency: usize,
    /// Preferred part size in bytes
    pub part_size: usize,
}

/// Number of concurrent upload streams for a raw writer count
pub fn stream_count(writers: i64) -> usize {
    if writers < 1 {
        1
    } else {
        usize::try_from(writers).unwrap_or(usize::MAX)
    }
}

/// Part size for a file of `len` bytes: the preferred size, grown so the
/// upload stays within `MAX_PARTS`, never above `MAX_PART_SIZE`
pub fn part_size_for(len: u64, preferred: usize) -> usize {
    let needed = len.div_ceil(MAX_PARTS);
    let size = (preferred as u64).max(needed).min(MAX_PART_SIZE);
    usize::try_from(size).unwrap_or(usize::MAX)
}

/// Upload one local file to `key`, returning the number of bytes committed
///
/// The object only exists remotely once this returns `Ok`. If copying fails
/// the multipart upload is aborted and the copy error is returned.
pub async fn upload_file(
    store: &dyn ObjectStore,
    local_path: &Path,
    key: &str,
    options: UploadOptions,
    pb: Option<&ProgressBar>,
) -> Result<u64> {
    let file = File::open(local_path)
        .await
        .map_err(|source| UploadError::OpenFile {
            path: local_path.display().to_string(),
            source,
        })?;

    let len = file
        .metadata()
        .await
        .map_err(|source| UploadError::ReadFile {
            path: local_path.display().to_string(),
            source,
        })?
        .len();

    if let Some(pb) = pb {
        pb.set_length(len);
        pb.set_position(0);
        pb.set_message(key.to_string());
    }

    let part_size = part_size_for(len, options.part_size);
    if part_size != options.part_size {
        debug!(
            "Raising part size for {} to {} bytes to stay within {} parts",
            key, part_size, MAX_PARTS
        );
    }

    let upload = store
        .put_multipart(&ObjectPath::from(key))
        .await
        .map_err(|e| UploadError::part(key, e))?;

    let writer = WriteMultipart::new_with_chunk_size(upload, part_size);
    write_object(file, writer, local_path, key, options.concurrency, pb).await
}

async fn write_object(
    mut file: File,
    mut writer: WriteMultipart,
    local_path: &Path,
    key: &str,
    concurrency: usize,
    pb: Option<&ProgressBar>,
) -> Result<u64> {
    match copy(&mut file, &mut writer, local_path, key, concurrency, pb).await {
        Ok(bytes) => {
            writer
                .finish()
                .await
                .map_err(|e| UploadError::commit(key, e))?;
            Ok(bytes)
        }
        Err(e) => {
            if let Err(abort) = writer.abort().await {
                warn!("Failed to abort multipart upload for {}: {}", key, abort);
            }
            Err(e)
        }
    }
}

async fn copy(
    file: &mut File,
    writer: &mut WriteMultipart,
    local_path: &Path,
    key: &str,
    concurrency: usize,
    pb: Option<&ProgressBar>,
) -> Result<u64> {
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let mut copied = 0u64;

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .await
            .map_err(|source| UploadError::ReadFile {
                path: local_path.display().to_string(),
                source,
            })?;

        if bytes_read == 0 {
            break; // EOF
        }

        writer
            .wait_for_capacity(concurrency)
            .await
            .map_err(|e| UploadError::part(key, e))?;
        writer.write(&buffer[..bytes_read]);

        copied += bytes_read as u64;
        if let Some(pb) = pb {
            pb.inc(bytes_read as u64);
        }
    }

    // Settle every part here so a failed one is aborted, not left pending
    writer
        .wait_for_capacity(1)
        .await
        .map_err(|e| UploadError::part(key, e))?;

    Ok(copied)
}
