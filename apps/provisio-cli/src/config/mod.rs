//! Configuration management for the provisio CLI

mod paths;
mod settings;

pub use paths::ConfigLocation;
pub use settings::{Config, IamBackend, IamSection, InfobloxSection};
