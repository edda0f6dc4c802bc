//! Core data types shared by adapters, reconciler, detector and extractor

mod column;
mod series;
mod shock;
mod source;

pub use column::Column;
pub use series::{CanonicalSeries, SeriesError, SolarWindSample};
pub use shock::{ShockCandidate, StormWindow};
pub use source::{Satellite, SourceSelector};
