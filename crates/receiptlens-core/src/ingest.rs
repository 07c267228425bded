//! Receipt ingestion pipeline
//!
//! Drives one receipt image from selection through upload to a parsed
//! receipt. The backend gives no upload progress, so progress is simulated:
//! while the request is in flight a ticker fires every 400 ms and each tick
//! adds a tenth, capped at 0.9. Success snaps progress to 1.0; failure
//! resets it to 0.
//!
//! ```text
//! Idle --begin_upload--> Uploading --complete(Ok)--> Succeeded
//!                                  \--complete(Err)-> Failed
//! select_image / clear_image from any state -> Idle
//! ```
//!
//! Progress is kept as whole tenths so repeated ticks never accumulate
//! floating point error. Observers follow along through a `watch` channel.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::{Mutation, QueryCache};
use crate::error::{Error, Result, SESSION_EXPIRED_MESSAGE};
use crate::models::Receipt;

/// Period of the simulated progress ticker
pub const PROGRESS_TICK: Duration = Duration::from_millis(400);

/// Ticking alone never takes progress past 9 tenths
const MAX_TICK_TENTHS: u8 = 9;
const DONE_TENTHS: u8 = 10;

pub const NO_IMAGE_MESSAGE: &str = "Please select an image first";
pub const UPLOAD_FAILED_MESSAGE: &str = "Failed to process receipt";

const DEFAULT_FILE_NAME: &str = "receipt.jpg";
const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// An image ready to be uploaded
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptImage {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl ReceiptImage {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    /// Read an image from disk, deriving its name and content type from the path
    pub async fn from_path(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path).await?;
        if data.is_empty() {
            return Err(Error::Validation(format!(
                "Image file is empty: {}",
                path.display()
            )));
        }
        let (file_name, content_type) = describe_path(path);
        Ok(Self {
            file_name,
            content_type,
            data,
        })
    }
}

/// File name and `image/<ext>` content type for a path
fn describe_path(path: &Path) -> (String, String) {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_FILE_NAME)
        .to_string();

    let content_type = Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!("image/{}", e.to_lowercase()))
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    (file_name, content_type)
}

/// Sends a receipt image to the backend for parsing
#[async_trait]
pub trait ReceiptUploader: Send + Sync {
    async fn upload_receipt(&self, image: &ReceiptImage) -> Result<Receipt>;
}

/// Source of progress ticks
#[async_trait]
pub trait Ticker: Send {
    async fn tick(&mut self);
}

/// Ticks on a fixed tokio interval, skipping the immediate first tick
pub struct IntervalTicker {
    interval: Interval,
    primed: bool,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            primed: false,
        }
    }
}

impl Default for IntervalTicker {
    fn default() -> Self {
        Self::new(PROGRESS_TICK)
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        if !self.primed {
            // First tick completes immediately
            self.interval.tick().await;
            self.primed = true;
        }
        self.interval.tick().await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestState {
    Idle,
    Uploading,
    Succeeded(Receipt),
    Failed(String),
}

impl IngestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }
}

/// What observers see on the watch channel
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSnapshot {
    pub state: IngestState,
    /// 0.0..=1.0
    pub progress: f64,
}

/// State machine for one receipt at a time
pub struct IngestionPipeline {
    image: Option<ReceiptImage>,
    state: IngestState,
    tenths: u8,
    snapshots: watch::Sender<IngestSnapshot>,
}

impl Default for IngestionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestionPipeline {
    pub fn new() -> Self {
        let (snapshots, _) = watch::channel(IngestSnapshot {
            state: IngestState::Idle,
            progress: 0.0,
        });
        Self {
            image: None,
            state: IngestState::Idle,
            tenths: 0,
            snapshots,
        }
    }

    pub fn state(&self) -> &IngestState {
        &self.state
    }

    pub fn progress(&self) -> f64 {
        f64::from(self.tenths) / 10.0
    }

    pub fn image(&self) -> Option<&ReceiptImage> {
        self.image.as_ref()
    }

    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            state: self.state.clone(),
            progress: self.progress(),
        }
    }

    /// Follow state and progress changes
    pub fn subscribe(&self) -> watch::Receiver<IngestSnapshot> {
        self.snapshots.subscribe()
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }

    /// Choose the image to upload, discarding any previous outcome
    pub fn select_image(&mut self, image: ReceiptImage) {
        debug!("Selected receipt image {}", image.file_name);
        self.image = Some(image);
        self.reset();
    }

    pub fn clear_image(&mut self) {
        self.image = None;
        self.reset();
    }

    fn reset(&mut self) {
        self.state = IngestState::Idle;
        self.tenths = 0;
        self.publish();
    }

    /// Enter `Uploading` and hand back the image to send
    pub fn begin_upload(&mut self) -> Result<ReceiptImage> {
        if self.state == IngestState::Uploading {
            return Err(Error::UploadInProgress);
        }
        let image = self
            .image
            .clone()
            .ok_or_else(|| Error::Validation(NO_IMAGE_MESSAGE.into()))?;

        self.state = IngestState::Uploading;
        self.tenths = 0;
        self.publish();
        info!("Uploading receipt {}", image.file_name);
        Ok(image)
    }

    /// Advance simulated progress; ignored unless uploading
    pub fn tick(&mut self) {
        if self.state != IngestState::Uploading {
            return;
        }
        if self.tenths < MAX_TICK_TENTHS {
            self.tenths += 1;
            self.publish();
        }
    }

    /// Record the upload outcome
    ///
    /// A result arriving after the pipeline left `Uploading` (the image was
    /// reselected or cleared) is passed back without touching state.
    pub fn complete(&mut self, outcome: Result<Receipt>) -> Result<Receipt> {
        if self.state != IngestState::Uploading {
            debug!("Discarding upload result, pipeline is {}", self.state.as_str());
            return outcome;
        }
        match outcome {
            Ok(receipt) => {
                info!("Receipt {} processed", receipt.id);
                self.tenths = DONE_TENTHS;
                self.state = IngestState::Succeeded(receipt.clone());
                self.publish();
                Ok(receipt)
            }
            Err(e) => {
                let message = failure_message(&e);
                warn!("Receipt upload failed: {}", message);
                self.tenths = 0;
                self.state = IngestState::Failed(message);
                self.publish();
                Err(e)
            }
        }
    }

    /// Upload the selected image, ticking progress until the response lands
    ///
    /// The ticker is dropped as soon as the upload resolves. On success the
    /// receipt-derived query groups are invalidated once.
    pub async fn run<T: Ticker>(
        &mut self,
        uploader: &dyn ReceiptUploader,
        cache: &QueryCache,
        mut ticker: T,
    ) -> Result<Receipt> {
        let image = self.begin_upload()?;

        let outcome = {
            let mut upload = uploader.upload_receipt(&image);
            loop {
                tokio::select! {
                    result = &mut upload => break result,
                    _ = ticker.tick() => self.tick(),
                }
            }
        };
        drop(ticker);

        let receipt = self.complete(outcome)?;
        if matches!(self.state, IngestState::Succeeded(_)) {
            cache.invalidate_for(Mutation::IngestReceipt);
        }
        Ok(receipt)
    }
}

/// Backend detail verbatim, else the generic failure message
///
/// A 401 only ever reads as an expired session; the gateway has already
/// signed the user out.
fn failure_message(error: &Error) -> String {
    match error {
        Error::Validation(msg) => msg.clone(),
        Error::Backend {
            detail: Some(detail),
            ..
        } => detail.clone(),
        Error::Unauthorized { .. } => SESSION_EXPIRED_MESSAGE.to_string(),
        _ => UPLOAD_FAILED_MESSAGE.to_string(),
    }
}
