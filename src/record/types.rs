//! Enumerations describing an application record
//!
//! All enums round-trip through their kebab-case string form, which is what
//! plugins, the CLI and log lines use.

use serde::Serialize;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// What kind of software a record describes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter, IntoStaticStr, Serialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum AppKind {
    #[default]
    Unknown,
    /// An application with a desktop presence
    Normal,
    /// A component shipped with the OS
    System,
    /// A raw package with no application metadata
    Package,
    OsUpdate,
    /// A placeholder for something that should exist but could not be found
    Missing,
    /// A repository or other software source
    Source,
    Addon,
    /// A core OS package that must never be removed
    Core,
}

/// The kind of identifier the record was created from
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter, IntoStaticStr, Serialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum IdKind {
    #[default]
    Unknown,
    Desktop,
    WebApp,
    Font,
    InputMethod,
    Firmware,
    Codec,
    Source,
}

/// Lifecycle state of a record; see [`AppState::can_transition_to`]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter, IntoStaticStr, Serialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum AppState {
    #[default]
    Unknown,
    Available,
    /// Available from a local file rather than a repository
    AvailableLocal,
    Installed,
    Unavailable,
    Updatable,
    QueuedForInstall,
    Installing,
    Removing,
}

impl AppState {
    /// Whether a record in this state may move to `to`
    ///
    /// Moving to or from `Unknown` is always allowed; everything else follows
    /// the install/remove lifecycle.
    pub fn can_transition_to(self, to: AppState) -> bool {
        use AppState::*;

        if self == Unknown || to == Unknown {
            return true;
        }
        matches!(
            (self, to),
            (Available, QueuedForInstall)
                | (Available, Installing)
                | (AvailableLocal, Installing)
                | (QueuedForInstall, Installing)
                | (QueuedForInstall, Available)
                | (Installing, Installed)
                | (Installing, Available)
                | (Installing, AvailableLocal)
                | (Installing, QueuedForInstall)
                | (Installing, Updatable)
                | (Installed, Removing)
                | (Installed, Updatable)
                | (Installed, Unavailable)
                | (Updatable, Removing)
                | (Updatable, Installed)
                | (Updatable, Installing)
                | (Removing, Available)
                | (Removing, Unavailable)
                | (Removing, Installed)
                | (Removing, Updatable)
                | (Unavailable, Available)
        )
    }

    /// States that only exist while an action is running
    pub fn is_transient(self) -> bool {
        matches!(self, AppState::Installing | AppState::Removing)
    }

    pub fn is_installed(self) -> bool {
        matches!(
            self,
            AppState::Installed | AppState::Updatable | AppState::Removing
        )
    }
}

/// Quality tier attached to a descriptive field write
///
/// Ordered: a write only replaces a stored value of the same or lower tier.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Quality {
    #[default]
    Unknown,
    Lowest,
    Normal,
    Highest,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter, IntoStaticStr, Serialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum UpdateSeverity {
    #[default]
    Unknown,
    Normal,
    Important,
    Security,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter, IntoStaticStr, Serialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum RatingKind {
    #[default]
    Unknown,
    /// Rated by the user on this machine
    User,
    /// Rated by a ratings service
    System,
    /// Derived from the kudos percentage
    Kudos,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum UrlKind {
    Homepage,
    Bugtracker,
    Faq,
    Help,
    Donation,
    Translate,
    /// Explains why the software is missing
    Missing,
}

/// Relation from one record to another, stored by id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Relation {
    Addon,
    Related,
    History,
}

pub fn kind_to_string(kind: AppKind) -> &'static str {
    kind.into()
}

pub fn kind_from_string(value: &str) -> Option<AppKind> {
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_kind_round_trip() {
        for kind in AppKind::iter() {
            assert_eq!(kind_from_string(kind_to_string(kind)), Some(kind));
        }
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(kind_to_string(AppKind::OsUpdate), "os-update");
        assert_eq!(kind_to_string(AppKind::Normal), "normal");
        assert_eq!(kind_from_string("not-a-kind"), None);
    }

    #[test]
    fn test_state_round_trip() {
        for state in AppState::iter() {
            assert_eq!(state.to_string().parse::<AppState>().unwrap(), state);
        }
        assert_eq!(AppState::QueuedForInstall.to_string(), "queued-for-install");
    }

    #[test]
    fn test_other_enums_round_trip() {
        for kind in IdKind::iter() {
            assert_eq!(kind.to_string().parse::<IdKind>().unwrap(), kind);
        }
        for severity in UpdateSeverity::iter() {
            assert_eq!(severity.to_string().parse::<UpdateSeverity>().unwrap(), severity);
        }
        for kind in UrlKind::iter() {
            assert_eq!(kind.to_string().parse::<UrlKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_quality_ordering() {
        assert!(Quality::Unknown < Quality::Lowest);
        assert!(Quality::Lowest < Quality::Normal);
        assert!(Quality::Normal < Quality::Highest);
    }

    #[test]
    fn test_unknown_reaches_every_state() {
        for state in AppState::iter() {
            assert!(AppState::Unknown.can_transition_to(state));
            assert!(state.can_transition_to(AppState::Unknown));
        }
    }

    #[test]
    fn test_install_lifecycle_transitions() {
        use AppState::*;

        assert!(Available.can_transition_to(Installing));
        assert!(AvailableLocal.can_transition_to(Installing));
        assert!(QueuedForInstall.can_transition_to(Installing));
        assert!(QueuedForInstall.can_transition_to(Available));
        assert!(Installing.can_transition_to(Installed));
        assert!(Installed.can_transition_to(Removing));
        assert!(Updatable.can_transition_to(Removing));
        assert!(Removing.can_transition_to(Available));
        assert!(Removing.can_transition_to(Unavailable));
        assert!(Removing.can_transition_to(Installed));
    }

    #[test]
    fn test_rejected_transitions() {
        use AppState::*;

        assert!(!Available.can_transition_to(Installed));
        assert!(!Installed.can_transition_to(Installing));
        assert!(!Unavailable.can_transition_to(Installed));
        assert!(!AvailableLocal.can_transition_to(Removing));
        assert!(!Removing.can_transition_to(Installing));
    }
}
