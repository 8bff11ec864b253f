pub mod handler;
pub mod relay;
pub mod settings;

pub use relay::Relay;
pub use settings::RelaySettings;
