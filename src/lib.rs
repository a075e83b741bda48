pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{FileCopyArgs, VerifyArgs};
pub use config::{FactoryEndpoints, Settings};

pub use core::file_copy::{CopyOptions, CopySummary, PostLaunchCopy};
pub use core::verify::{InstanceVerifier, VerifyOutcome, VerifyPolicy, VerifySummary};
pub use utils::error::{MgnError, Result};
