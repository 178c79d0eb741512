//! Deposit lifecycle and the per-object chunk loop.
//!
//! One deposit is registered per process lifetime, on the first put, and
//! any number of objects may be appended to it concurrently. The deposit
//! reaches a terminal state exactly once: `finalize` on a normal shutdown,
//! `terminate` through the termination watch on an abnormal one.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vault_api::{ChunkMeta, NodeType, RegisterDepositRequest, VaultApi, UPLOAD_CHUNK_TIMEOUT};
use vault_transfer::{
    derive_flow_identifier, spool_to_temp, total_chunks, Chunker, Digests, Fibonacci, MultiHasher,
    SpeedCalculator,
};

use crate::config::VaultConfig;
use crate::error::BackendError;
use crate::fs::SourceInfo;
use crate::resolver;

/// Backoff base for chunk upload retries.
const BACKOFF_BASE: Duration = Duration::from_millis(100);

/// Backoff cap for chunk upload retries.
const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Fallback MIME when sniffing is disabled or finds nothing.
const OCTET_STREAM: &str = "application/octet-stream";

/// Snapshot of a completed upload: the source's size plus the digests of
/// the bytes that went on the wire.
#[derive(Debug, Clone)]
pub struct UploadedObject {
    pub remote: String,
    pub size: i64,
    pub digests: Digests,
}

#[derive(Debug)]
struct DepositState {
    deposit_id: i64,
    started: Option<Instant>,
}

/// Per-process deposit state machine and chunk uploader.
#[derive(Debug)]
pub struct DepositUploader {
    api: Arc<VaultApi>,
    root: String,
    chunk_size: i64,
    skip_content_type_detection: bool,
    suppress_progress: bool,
    speed: SpeedCalculator,
    state: tokio::sync::Mutex<DepositState>,
}

impl DepositUploader {
    /// Creates an uploader rooted at the backend's absolute root path.
    ///
    /// A non-zero `resume_deposit_id` skips registration: chunks go
    /// straight to the resumed deposit, which is still finalized on
    /// shutdown.
    pub fn new(api: Arc<VaultApi>, root: &str, config: &VaultConfig) -> Self {
        Self {
            api,
            root: root.to_string(),
            chunk_size: config.chunk_size,
            skip_content_type_detection: config.skip_content_type_detection,
            suppress_progress: config.suppress_progress_bar,
            speed: SpeedCalculator::new(),
            state: tokio::sync::Mutex::new(DepositState {
                deposit_id: config.resume_deposit_id,
                started: None,
            }),
        }
    }

    /// Current deposit identifier, 0 when none is inflight.
    pub async fn deposit_id(&self) -> i64 {
        self.state.lock().await.deposit_id
    }

    /// Transfer-speed accounting over recent chunks, for the host tool's
    /// progress reporting.
    pub fn speed(&self) -> &SpeedCalculator {
        &self.speed
    }

    /// Registers a deposit if none is inflight and returns its identifier.
    ///
    /// Test-and-set under the state mutex, so any number of concurrent
    /// puts produce exactly one registration. Resolves the backend root
    /// first, creating missing parents, and classifies it into the
    /// register payload: a COLLECTION root deposits by collection id, a
    /// FOLDER root by parent node id. Depositing directly under the
    /// organization is not supported.
    pub async fn ensure_deposit(&self) -> Result<i64, BackendError> {
        let mut state = self.state.lock().await;
        if state.deposit_id != 0 {
            return Ok(state.deposit_id);
        }

        let parent = match resolver::resolve_path(&self.api, &self.root).await {
            Ok(node) => node,
            Err(BackendError::ObjectNotFound) => {
                debug!(root = %self.root, "deposit root not found, creating");
                resolver::mkdir(&self.api, &self.root).await?;
                resolver::resolve_path(&self.api, &self.root).await?
            }
            Err(other) => return Err(other),
        };

        let mut request = RegisterDepositRequest::default();
        match parent.node_type {
            NodeType::Collection => {
                let collection_id = self
                    .api
                    .tree_node_to_collection(&parent)
                    .await?
                    .and_then(|c| c.identifier())
                    .ok_or(BackendError::ObjectNotFound)?;
                request.collection_id = Some(collection_id);
            }
            NodeType::Folder => {
                request.parent_node_id = Some(parent.id);
            }
            _ => return Err(BackendError::CannotCreateAtRoot),
        }

        let deposit_id = self.api.register_deposit(&request).await?;
        if deposit_id == 0 {
            return Err(BackendError::MissingDepositIdentifier);
        }
        state.deposit_id = deposit_id;
        state.started = Some(Instant::now());
        info!(deposit = deposit_id, "registered deposit");
        Ok(deposit_id)
    }

    /// Uploads one object as an ordered sequence of chunks.
    ///
    /// Sources that cannot report their size are spooled to a temporary
    /// file first (deleted on every exit path). Within the object, chunks
    /// go out strictly in order; across objects any interleaving is fine,
    /// all against the same deposit.
    pub async fn upload<R>(
        &self,
        src: &SourceInfo,
        mut reader: R,
    ) -> Result<UploadedObject, BackendError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let deposit_id = self.ensure_deposit().await?;
        let started = self.state.lock().await.started.unwrap_or_else(Instant::now);

        let (spooled, total_size) = match src.size {
            Some(size) => (None, size),
            None => {
                let (temp, size) = spool_to_temp(&mut reader).await?;
                debug!(remote = %src.remote, size, "source has no size, spooled to temp file");
                (Some(temp), size)
            }
        };

        let chunker = match &spooled {
            Some(temp) => Some(Chunker::new(temp.path(), self.chunk_size).await?),
            None => None,
        };

        let flow_identifier = derive_flow_identifier(&self.root, &src.remote);
        let total = total_chunks(total_size, self.chunk_size);
        let filename = resolver::base_name(&src.remote).to_string();
        let user_mtime = src.mod_time.to_rfc3339();

        let mut hasher = MultiHasher::new();
        let mut mimetype = OCTET_STREAM.to_string();

        for number in 1..=total {
            let expected = if number < total {
                self.chunk_size
            } else {
                total_size - (total - 1) * self.chunk_size
            };
            let data = match &chunker {
                Some(chunker) => {
                    let mut chunk = chunker.chunk_reader(number - 1).await?;
                    let mut buf = Vec::with_capacity(expected.max(0) as usize);
                    chunk.read_to_end(&mut buf).await.map_err(BackendError::Io)?;
                    buf
                }
                None => read_chunk(&mut reader, expected.max(0) as usize).await?,
            };
            hasher.update(&data);
            if number == 1 && !self.skip_content_type_detection {
                mimetype = sniff_mime(&data);
            }

            info!(
                remote = %src.remote,
                chunk = number,
                total,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "uploading chunk"
            );
            let meta = ChunkMeta {
                deposit_id,
                chunk_number: number,
                chunk_size: self.chunk_size,
                current_chunk_size: data.len() as i64,
                filename: filename.clone(),
                flow_identifier: flow_identifier.clone(),
                relative_path: src.remote.clone(),
                total_chunks: total,
                total_size,
                mimetype: mimetype.clone(),
                user_mtime: user_mtime.clone(),
            };
            let sent = data.len() as i64;
            self.send_chunk_with_retry(&meta, data).await?;
            if !self.suppress_progress {
                self.speed.add_sample(sent);
            }
        }

        Ok(UploadedObject {
            remote: src.remote.clone(),
            size: total_size,
            digests: hasher.finalize(),
        })
    }

    /// Sends one chunk, retrying transport errors and 5xx responses with
    /// capped Fibonacci backoff.
    ///
    /// The caller's cancellation deliberately does not reach this loop:
    /// each chunk gets a fresh ceiling so a cancelled outer context still
    /// lets the deposit reach a terminal state through the exit hook. A
    /// 4xx stops the upload immediately; the deposit may have closed early
    /// server-side.
    async fn send_chunk_with_retry(
        &self,
        meta: &ChunkMeta,
        data: Vec<u8>,
    ) -> Result<(), BackendError> {
        let attempt_loop = async {
            let mut backoff = Fibonacci::new(BACKOFF_BASE).capped(BACKOFF_CAP);
            loop {
                match self.api.send_chunk(meta, data.clone()).await {
                    Ok(()) => return Ok(()),
                    Err(err) if err.is_retryable() => {
                        let delay = backoff.next().unwrap_or(BACKOFF_CAP);
                        warn!(
                            chunk = meta.chunk_number,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "chunk upload retry"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Err(err) => return Err(BackendError::Api(err)),
                }
            }
        };
        match tokio::time::timeout(UPLOAD_CHUNK_TIMEOUT, attempt_loop).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "chunk upload deadline exceeded",
            ))),
        }
    }

    /// Finalizes the inflight deposit. No-op when none is inflight; on a
    /// non-200 the identifier is kept so the caller may retry shutdown.
    pub async fn finalize(&self) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        if state.deposit_id == 0 {
            return Ok(());
        }
        self.api.finalize_deposit(state.deposit_id).await?;
        info!(deposit = state.deposit_id, "finalized deposit");
        state.deposit_id = 0;
        Ok(())
    }

    /// Best-effort cancellation of the inflight deposit; errors are logged
    /// and swallowed. Safe to call after a successful finalize, which
    /// leaves nothing to terminate.
    pub async fn terminate(&self) {
        let mut state = self.state.lock().await;
        if state.deposit_id == 0 {
            return;
        }
        match self.api.terminate_deposit(state.deposit_id).await {
            Ok(()) => {
                info!(deposit = state.deposit_id, "terminated deposit");
                state.deposit_id = 0;
            }
            Err(err) => {
                warn!(deposit = state.deposit_id, error = %err, "terminate deposit failed");
            }
        }
    }
}

/// Reads up to `want` bytes from a stream (short only at EOF).
async fn read_chunk<R: AsyncRead + Unpin>(
    reader: &mut R,
    want: usize,
) -> Result<Vec<u8>, BackendError> {
    let mut buf = vec![0u8; want];
    let mut filled = 0;
    while filled < want {
        let n = reader.read(&mut buf[filled..]).await.map_err(BackendError::Io)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

/// Detects the MIME type of the first chunk by magic bytes.
fn sniff_mime(data: &[u8]) -> String {
    match infer::get(data) {
        Some(kind) => kind.mime_type().to_string(),
        None => OCTET_STREAM.to_string(),
    }
}

/// Runs until either `release` fires (normal shutdown already finalized
/// the deposit) or `signal` completes, in which case the inflight deposit
/// is terminated best-effort.
///
/// Generic over the signal future so tests can drive it without raising a
/// real signal.
pub async fn run_termination_watch<S>(
    uploader: Arc<DepositUploader>,
    release: CancellationToken,
    signal: S,
) where
    S: Future<Output = ()>,
{
    tokio::select! {
        _ = release.cancelled() => {}
        _ = signal => {
            debug!("interrupt observed, terminating inflight deposit");
            uploader.terminate().await;
        }
    }
}

/// Owned registration of the abnormal-exit hook.
///
/// The façade holds one of these instead of a process-wide handler and
/// releases it on a successful shutdown, after which the interrupt path
/// observes no inflight deposit and does nothing.
#[derive(Debug)]
pub struct TerminationWatch {
    release: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl TerminationWatch {
    /// Spawns the watch listening for Ctrl-C.
    pub fn spawn(uploader: Arc<DepositUploader>) -> Self {
        let release = CancellationToken::new();
        let token = release.clone();
        let handle = tokio::spawn(async move {
            run_termination_watch(uploader, token, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await;
        });
        Self { release, handle }
    }

    /// Releases the hook; the watch task exits without terminating.
    pub fn release(&self) {
        self.release.cancel();
        self.handle.abort();
    }
}
