//! Bitmask types carried by records: refine requirements and kudos

use bitflags::bitflags;

bitflags! {
    /// Fields a caller needs populated by a refine pass
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RefineFlags: u64 {
        const REQUIRE_LICENCE = 1 << 0;
        const REQUIRE_URL = 1 << 1;
        const REQUIRE_SIZE = 1 << 2;
        const REQUIRE_DESCRIPTION = 1 << 3;
        const REQUIRE_VERSION = 1 << 4;
        const REQUIRE_HISTORY = 1 << 5;
        const REQUIRE_SETUP_ACTION = 1 << 6;
        const REQUIRE_UPDATE_DETAILS = 1 << 7;
        const REQUIRE_ORIGIN = 1 << 8;
        const REQUIRE_RELATED = 1 << 9;
        const REQUIRE_MENU_PATH = 1 << 10;
        const REQUIRE_ADDONS = 1 << 11;
        const REQUIRE_UPDATE_SEVERITY = 1 << 12;
        const REQUIRE_RATING = 1 << 13;
        const REQUIRE_REVIEWS = 1 << 14;
        const REQUIRE_SCREENSHOTS = 1 << 15;
    }
}

impl RefineFlags {
    /// No extra requirements: resolve state and identity only
    pub const DEFAULT: Self = Self::empty();

    /// Short name of a single flag, `REQUIRE_UPDATE_DETAILS` -> `update-details`
    fn short_name(name: &str) -> String {
        name.trim_start_matches("REQUIRE_")
            .to_ascii_lowercase()
            .replace('_', "-")
    }

    /// Parse a comma-separated list of short flag names
    pub fn from_names(list: &str) -> Result<Self, String> {
        let mut flags = Self::empty();
        for wanted in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let wanted = wanted.to_ascii_lowercase();
            let found = Self::all()
                .iter_names()
                .find(|(name, _)| Self::short_name(name) == wanted);
            match found {
                Some((_, flag)) => flags |= flag,
                None => return Err(format!("unknown refine flag '{}'", wanted)),
            }
        }
        Ok(flags)
    }

    /// Short names of the flags that are set
    pub fn names(&self) -> Vec<String> {
        self.iter_names()
            .map(|(name, _)| Self::short_name(name))
            .collect()
    }
}

bitflags! {
    /// Boolean quality signals used to derive a heuristic rating
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Kudos: u64 {
        const MY_LANGUAGE = 1 << 0;
        const RECENT_RELEASE = 1 << 1;
        const FEATURED_RECOMMENDED = 1 << 2;
        const MODERN_TOOLKIT = 1 << 3;
        const SEARCH_PROVIDER = 1 << 4;
        const INSTALLS_USER_DOCS = 1 << 5;
        const USES_NOTIFICATIONS = 1 << 6;
        const HAS_KEYWORDS = 1 << 7;
        const USES_APP_MENU = 1 << 8;
        const HAS_SCREENSHOTS = 1 << 9;
        const POPULAR = 1 << 10;
        const IBUS_HAS_SYMBOL = 1 << 11;
        const PERFECT_SCREENSHOTS = 1 << 12;
        const HIGH_CONTRAST = 1 << 13;
        const HI_DPI_ICON = 1 << 14;
    }
}

impl Kudos {
    /// Each kudo is worth 20%, capped at 100
    pub fn percentage(&self) -> u32 {
        (self.bits().count_ones() * 20).min(100)
    }
}
