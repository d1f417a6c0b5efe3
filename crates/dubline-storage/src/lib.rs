pub mod error;
pub mod factory;
pub mod host_override;
pub mod oss;
pub mod s3_compatible;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use factory::build;
pub use host_override::HostOverrideStore;
pub use oss::OssStore;
pub use s3_compatible::S3CompatibleStore;
pub use traits::ObjectStore;
