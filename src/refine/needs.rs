//! Needs-refine predicates
//!
//! A requirement flag is satisfied when its field is already present on the
//! record, or when a previous pass already asked the plugins for it.

use crate::record::api::{
    App, AppState, RefineFlags, UpdateSeverity, UrlKind, RATING_UNSET, SIZE_UNKNOWN,
};

/// Whether the field behind a single flag is present
fn has_field(app: &App, flag: RefineFlags) -> bool {
    let updatable = app.state() == AppState::Updatable;
    let checks: [(RefineFlags, &dyn Fn() -> bool); 15] = [
        (RefineFlags::REQUIRE_LICENCE, &|| app.licence().is_some()),
        (RefineFlags::REQUIRE_URL, &|| app.url(UrlKind::Homepage).is_some()),
        (RefineFlags::REQUIRE_SIZE, &|| app.size() != SIZE_UNKNOWN),
        (RefineFlags::REQUIRE_DESCRIPTION, &|| app.description().is_some()),
        (RefineFlags::REQUIRE_VERSION, &|| app.version().is_some()),
        (RefineFlags::REQUIRE_HISTORY, &|| !app.history().is_empty()),
        (RefineFlags::REQUIRE_UPDATE_DETAILS, &|| {
            !updatable || app.update_details().is_some()
        }),
        (RefineFlags::REQUIRE_UPDATE_SEVERITY, &|| {
            !updatable || app.update_severity() != UpdateSeverity::Unknown
        }),
        (RefineFlags::REQUIRE_ORIGIN, &|| app.origin().is_some()),
        (RefineFlags::REQUIRE_RELATED, &|| !app.related().is_empty()),
        (RefineFlags::REQUIRE_MENU_PATH, &|| !app.menu_path().is_empty()),
        (RefineFlags::REQUIRE_ADDONS, &|| !app.addons().is_empty()),
        (RefineFlags::REQUIRE_RATING, &|| app.rating() != RATING_UNSET),
        (RefineFlags::REQUIRE_REVIEWS, &|| !app.reviews().is_empty()),
        (RefineFlags::REQUIRE_SCREENSHOTS, &|| !app.screenshots().is_empty()),
    ];
    // setup-action has no field of its own
    checks
        .iter()
        .find(|(wanted, _)| *wanted == flag)
        .is_some_and(|(_, present)| present())
}

/// Flags from `flags` that `app` still lacks
pub fn missing(app: &App, flags: RefineFlags) -> RefineFlags {
    let refined = app.refined();
    flags
        .iter()
        .filter(|flag| !refined.contains(*flag) && !has_field(app, *flag))
        .collect()
}

/// Whether a refine pass for `flags` could change anything on `app`
pub fn needs_refine(app: &App, flags: RefineFlags) -> bool {
    app.state() == AppState::Unknown || !missing(app, flags).is_empty()
}
