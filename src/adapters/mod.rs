// Adapters layer: concrete implementations of the domain ports (factory REST
// API, AWS, local processes, terminal).

pub mod aws;
pub mod factory;
pub mod prompt;
pub mod remote;

pub use aws::{AwsGateway, AwsSecrets};
pub use factory::FactoryClient;
pub use prompt::NoPrompter;
#[cfg(feature = "cli")]
pub use prompt::TerminalPrompter;
pub use remote::ProcessCopier;
