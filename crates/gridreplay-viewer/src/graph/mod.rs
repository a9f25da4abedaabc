pub mod layout;
pub mod model;
pub mod state;
pub mod view;

pub use layout::{layout, RadialOptions};
pub use state::GraphState;
pub use view::{build_view, Thresholds, ViewCounts};
