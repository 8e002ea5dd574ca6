// data module
pub mod data {
    pub mod sample;
    pub mod peak;
    pub mod slice;
    pub mod label;
    pub mod peak_group;
}

// algorithm module
pub mod algorithm {
    pub mod statistics;
    pub mod correlation;
    pub mod clustering;
    pub mod compare;
    pub mod alignment;
}

pub mod table;
pub mod report;
pub mod error;

// Re-export commonly used types
pub use data::peak::{Peak, QuantType};
pub use data::peak_group::{GroupUid, PeakGroup};
pub use data::label::{ClassifiedLabel, EffectiveLabel, UserLabel};
pub use data::sample::Sample;
pub use error::PgError;
pub use table::PeakTable;
