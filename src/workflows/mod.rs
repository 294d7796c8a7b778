//! Multi-step workflows built on top of the request layer.

pub mod batch;
pub mod download;
pub mod upload;

pub use batch::BatchWorkflow;
pub use download::DownloadWorkflow;
pub use upload::UploadWorkflow;
