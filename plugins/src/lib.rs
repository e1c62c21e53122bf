pub mod bmc;
pub mod factory;
pub mod fetch;
pub mod http;
pub mod inventory;
pub mod publish;
pub mod services;

pub use services::PluginServicesFactory;
