mod load;
mod types;

pub use load::{apply_env_overrides, get_bioscfg_data_dir, load, load_default, load_from_path};
pub use types::{
    AppConfig, BmcConfig, DispatchConfig, FetchConfig, FleetDbConfig, InventoryConfig,
    InventoryProvider, LoggingConfig, PublishConfig, StaticInventoryConfig,
};
