//! Application Layer
//!
//! Registry, provisioners and the default-substitution layer.

pub mod builder_registry;
pub mod datasource_provisioner;
pub mod pipeline;
pub mod registry;
pub mod session_provisioner;
pub mod substitution;
pub mod transaction_provisioner;

pub use builder_registry::BuilderRegistry;
pub use datasource_provisioner::DatasourceProvisioner;
pub use pipeline::{PipelineSettings, ProvisioningPipeline};
pub use registry::{Registry, Resource};
pub use session_provisioner::SessionProvisioner;
pub use substitution::Substitution;
pub use transaction_provisioner::TransactionProvisioner;
