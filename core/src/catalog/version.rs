use semver::Version;

/// Parses a launcher or tool version. Strict semver first; otherwise up to
/// three leading numeric fields (`2`, `2.1`, `v2.1.0`, `2.1.0.4`), missing
/// fields read as zero.
pub fn parse_version(raw: &str) -> Option<Version> {
    let s = raw.trim();
    let s = s
        .strip_prefix('v')
        .or_else(|| s.strip_prefix('V'))
        .unwrap_or(s);
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = Version::parse(s) {
        return Some(v);
    }

    let mut fields = [0u64; 3];
    for (i, part) in s.split('.').enumerate() {
        if i >= 3 {
            // A fourth (build) field does not take part in ordering.
            part.parse::<u64>().ok()?;
            continue;
        }
        fields[i] = part.parse::<u64>().ok()?;
    }
    Some(Version::new(fields[0], fields[1], fields[2]))
}

/// True only when both versions parse and `available` orders after `current`.
/// Build metadata never takes part in the ordering.
pub fn is_newer(available: &str, current: &str) -> bool {
    match (parse_version(available), parse_version(current)) {
        (Some(a), Some(c)) => a.cmp_precedence(&c).is_gt(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_compare_numerically() {
        assert!(is_newer("1.10.0", "1.9.0"));
        assert!(!is_newer("1.9.0", "1.10.0"));
        assert!(is_newer("2.0", "1.99.99"));
        assert!(is_newer("v1.2.1", "1.2"));
    }

    #[test]
    fn equal_and_unparsable_never_signal() {
        assert!(!is_newer("1.2.0", "1.2.0"));
        assert!(!is_newer("1.2", "1.2.0"));
        assert!(!is_newer("latest", "1.0.0"));
        assert!(!is_newer("1.0.0", ""));
    }

    #[test]
    fn build_field_is_ignored() {
        assert_eq!(parse_version("2.1.0.4"), Some(Version::new(2, 1, 0)));
        assert_eq!(parse_version("2.1.0.x"), None);
    }

    #[test]
    fn build_metadata_is_not_an_update() {
        assert!(!is_newer("1.2.0+build.5", "1.2.0"));
        assert!(!is_newer("1.2.0", "1.2.0+build.5"));
        assert!(is_newer("1.2.1+build.1", "1.2.0+build.9"));
        assert!(is_newer("1.2.0", "1.2.0-rc.1"));
    }
}
