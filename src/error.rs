use thiserror::Error;

/// Errors surfaced by the fallible edges of the crate.
///
/// Layout, geometry extraction and drawing never fail; they degrade instead
/// (missing fonts are skipped, broken attachments get a placeholder metric).
/// Only resource acquisition reports errors.
#[derive(Debug, Error)]
pub enum LabelError {
    #[error("Image decoding failed: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("Font loading failed: {0}")]
    FontLoad(#[from] std::io::Error),

    #[error("Failed to spawn layout worker: {0}")]
    WorkerSpawn(std::io::Error),

    #[error("Layout worker is no longer running")]
    WorkerDisconnected,
}
