pub mod credentials;
pub mod file_copy;
pub mod matching;
pub mod verify;

pub use crate::domain::model::{
    AccountServers, AccountTarget, Credentials, FactoryServer, InstanceHealth, SourceServer,
    StatusCheck, TargetInstance, WaveServers,
};
pub use crate::domain::ports::{FactoryApi, MigrationCloud, PostLaunchCopier, Prompter, SecretStore};
pub use crate::utils::error::Result;
