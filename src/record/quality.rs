//! Quality-tiered field storage

use crate::record::types::Quality;

/// A field value tagged with the quality of the write that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Tiered<T> {
    value: Option<T>,
    quality: Quality,
}

impl<T> Default for Tiered<T> {
    fn default() -> Self {
        Self {
            value: None,
            quality: Quality::Unknown,
        }
    }
}

impl<T> Tiered<T> {
    /// Store `value` unless the current value came from a higher tier
    ///
    /// Equal tiers resolve to the last write. Returns whether the value was stored.
    pub fn offer(&mut self, value: T, quality: Quality) -> bool {
        if quality < self.quality {
            return false;
        }
        self.value = Some(value);
        self.quality = quality;
        true
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }
}

impl<T: Clone> Tiered<T> {
    /// Fold another tiered value into this one with the same precedence rule
    pub fn merge_from(&mut self, other: &Tiered<T>) -> bool {
        match &other.value {
            Some(value) => self.offer(value.clone(), other.quality),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_higher_tier_replaces_lower() {
        let mut name = Tiered::default();
        assert!(name.offer("Foo".to_string(), Quality::Lowest));
        assert!(name.offer("Bar".to_string(), Quality::Normal));
        assert!(!name.offer("Baz".to_string(), Quality::Lowest));

        assert_eq!(name.value().map(String::as_str), Some("Bar"));
        assert_eq!(name.quality(), Quality::Normal);
    }

    #[test]
    fn test_equal_tier_is_last_write_wins() {
        let mut name = Tiered::default();
        name.offer("first", Quality::Normal);
        assert!(name.offer("second", Quality::Normal));
        assert_eq!(name.value(), Some(&"second"));
    }

    #[test]
    fn test_tier_is_monotonic_over_any_sequence() {
        let tiers = [
            Quality::Normal,
            Quality::Lowest,
            Quality::Highest,
            Quality::Unknown,
            Quality::Normal,
            Quality::Highest,
            Quality::Lowest,
        ];
        let mut field = Tiered::default();
        let mut previous = field.quality();
        for (i, tier) in tiers.iter().enumerate() {
            field.offer(i, *tier);
            assert!(field.quality() >= previous);
            previous = field.quality();
        }
        assert_eq!(field.quality(), Quality::Highest);
        assert_eq!(field.value(), Some(&5));
    }

    #[test]
    fn test_merge_from_unset_is_noop() {
        let mut target = Tiered::default();
        target.offer(1, Quality::Lowest);
        assert!(!target.merge_from(&Tiered::default()));
        assert_eq!(target.value(), Some(&1));
    }
}
