#[cfg(feature = "cli")]
pub mod cli;
pub mod endpoints;
pub mod settings;

#[cfg(feature = "cli")]
pub use cli::{CommonArgs, FileCopyArgs, VerifyArgs};
pub use endpoints::FactoryEndpoints;
pub use settings::Settings;
