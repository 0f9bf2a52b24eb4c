pub mod client;
pub mod error;
pub mod upload;

pub use client::{B2Client, bucket_store};
pub use upload::{UploadOptions, stream_count, upload_file};
