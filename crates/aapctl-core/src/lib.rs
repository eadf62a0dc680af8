pub mod cleanup;
pub mod client;
pub mod download;
pub mod error;
pub mod manifest;
pub mod populate;

pub use cleanup::{Cleaner, CleanupSummary};
pub use client::{ApiFlavor, Auth, ClientConfig, ControllerClient, DeleteOutcome};
pub use download::{DownloadReport, Downloader};
pub use error::{AapError, Result};
pub use manifest::Manifest;
pub use populate::{PopulateOptions, PopulateReport, Populator};
