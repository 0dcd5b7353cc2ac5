//! Aircraft lookups and emergency squawk alerts backed by an ADS-B REST API.

pub mod aircraft;
pub mod api;
pub mod embeds;
pub mod photos;
pub mod poller;

pub use aircraft::{Aircraft, AircraftResponse, EmergencySquawk};
pub use api::{AircraftQuery, SkySearchApi};
pub use photos::PhotoLookup;
pub use poller::{AlertSubscription, EmergencyPoller};
