pub mod fleetdb;

pub use fleetdb::FleetDbRepository;
