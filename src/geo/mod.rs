//! 地理位置数据源与记录合并

pub mod chain;
pub mod locale;
pub mod merger;
pub mod model;
pub mod records;

pub use chain::{GeoLookup, GeoSourceChain, GeoSourceError, GeoSourcePaths, SourceAvailability};
pub use locale::pick_name;
pub use merger::RecordMerger;
pub use model::GeoRecord;
pub use records::{AsnData, CityData, CountryData};
