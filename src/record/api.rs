//! Public surface of the record module

pub use crate::record::app::{
    App, AppChange, INSTALL_DATE_UNKNOWN, INSTALL_DATE_UNSET, RATING_UNSET, SIZE_MISSING,
    SIZE_UNKNOWN,
};
pub use crate::record::flags::{Kudos, RefineFlags};
pub use crate::record::media::{Review, Screenshot};
pub use crate::record::quality::Tiered;
pub use crate::record::types::{
    kind_from_string, kind_to_string, AppKind, AppState, IdKind, Quality, RatingKind, Relation,
    UpdateSeverity, UrlKind,
};

/// A batch of records returned by an operation
pub type AppList = Vec<std::sync::Arc<App>>;
