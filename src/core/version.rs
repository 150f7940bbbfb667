//! Build metadata generated by `build.rs`

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Plugin API version as a `YYYYMMDD` number
pub fn get_api_version() -> u32 {
    PLUGIN_API_VERSION.parse().unwrap_or(20251016)
}

/// Major part of an API version; plugins are compatible within the same year
pub fn api_major(api_version: u32) -> u32 {
    api_version / 10000
}

pub fn build_time() -> &'static str {
    BUILD_TIME
}

pub fn git_hash() -> &'static str {
    GIT_HASH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_major_is_year() {
        assert_eq!(api_major(20251016), 2025);
        assert_eq!(api_major(20240101), 2024);
    }

    #[test]
    fn test_api_version_parses() {
        assert!(get_api_version() > 20000000);
    }
}
