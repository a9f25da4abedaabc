pub mod api;
pub mod fixture;
pub mod http;

pub use api::SimulationApi;
pub use fixture::FixtureSimulationApi;
pub use http::HttpSimulationApi;
