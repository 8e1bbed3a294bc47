//! Platform tag matching
//!
//! Catalog entries advertise the build target they were compiled for as a
//! hyphen-delimited `OS-ARCH-FLOATSIZE` tag (for example
//! `Linux-amd64-32`). This module decides whether such a tag is
//! compatible with the running host: the OS and float-size segments must
//! match exactly, and the architecture segment must be one of the
//! aliases the host architecture is published under.
//!
//! # Examples
//!
//! ```
//! use dekpm::platform;
//!
//! // Compatible only when compiled for that exact OS/arch/float-size
//! let tag = format!("{}-{}-{}", platform::OS, platform::MACHINE[0], platform::FLOAT_SIZE);
//! assert!(platform::matches(&tag));
//! ```

/// OS name used in catalog platform tags.
#[cfg(target_os = "linux")]
pub const OS: &str = "Linux";
#[cfg(target_os = "macos")]
pub const OS: &str = "Darwin";
#[cfg(target_os = "windows")]
pub const OS: &str = "Windows";
#[cfg(target_os = "freebsd")]
pub const OS: &str = "FreeBSD";
#[cfg(target_os = "netbsd")]
pub const OS: &str = "NetBSD";
#[cfg(target_os = "openbsd")]
pub const OS: &str = "OpenBSD";
#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "windows",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd"
)))]
pub const OS: &str = "Unknown";

/// Float size of the patch engine we install externals for.
#[cfg(not(feature = "double-precision"))]
pub const FLOAT_SIZE: &str = "32";
#[cfg(feature = "double-precision")]
pub const FLOAT_SIZE: &str = "64";

/// Architecture aliases the host machine accepts.
///
/// Catalogs are inconsistent about arch naming, so each host matches a
/// small family of spellings.
#[cfg(target_arch = "x86_64")]
pub const MACHINE: &[&str] = &["amd64", "x86_64"];
#[cfg(target_arch = "x86")]
pub const MACHINE: &[&str] = &["i386", "i686", "i586"];
#[cfg(target_arch = "aarch64")]
pub const MACHINE: &[&str] = &["arm64"];
#[cfg(target_arch = "arm")]
pub const MACHINE: &[&str] = &["armv7l", "armv7", "armv6l", "armv6", "arm"];
#[cfg(any(target_arch = "powerpc", target_arch = "powerpc64"))]
pub const MACHINE: &[&str] = &["ppc", "PowerPC"];
#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "x86",
    target_arch = "aarch64",
    target_arch = "arm",
    target_arch = "powerpc",
    target_arch = "powerpc64"
)))]
pub const MACHINE: &[&str] = &[];

/// Check whether a catalog platform tag is compatible with this host.
pub fn matches(platform_tag: &str) -> bool {
    matches_tag(platform_tag, OS, FLOAT_SIZE, MACHINE)
}

/// Tag check against explicit host parameters.
///
/// All three segments must pass: leading OS exactly, trailing float size
/// exactly, and the middle arch segment by alias-set membership.
pub(crate) fn matches_tag(tag: &str, os: &str, float_size: &str, machine: &[&str]) -> bool {
    let Some((tag_os, rest)) = tag.split_once('-') else {
        return false;
    };
    if tag_os != os {
        return false;
    }

    let Some((arch, tag_float)) = rest.rsplit_once('-') else {
        return false;
    };
    if tag_float != float_size {
        return false;
    }

    machine.contains(&arch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const AMD64: &[&str] = &["amd64", "x86_64"];

    #[test]
    fn test_matching_tag() {
        assert!(matches_tag("Linux-amd64-32", "Linux", "32", AMD64));
        assert!(matches_tag("Linux-x86_64-32", "Linux", "32", AMD64));
    }

    #[test]
    fn test_each_segment_must_match() {
        // Flip one segment at a time; every flip must reject the tag
        assert!(!matches_tag("Darwin-amd64-32", "Linux", "32", AMD64));
        assert!(!matches_tag("Linux-arm64-32", "Linux", "32", AMD64));
        assert!(!matches_tag("Linux-amd64-64", "Linux", "32", AMD64));
    }

    #[test]
    fn test_arch_alias_set() {
        let arm = &["armv7l", "armv7", "armv6l", "armv6", "arm"];
        assert!(matches_tag("Linux-armv6-32", "Linux", "32", arm));
        assert!(matches_tag("Linux-arm-32", "Linux", "32", arm));
        assert!(!matches_tag("Linux-armv8-32", "Linux", "32", arm));
    }

    #[test]
    fn test_malformed_tags() {
        assert!(!matches_tag("", "Linux", "32", AMD64));
        assert!(!matches_tag("Linux", "Linux", "32", AMD64));
        assert!(!matches_tag("Linux-32", "Linux", "32", AMD64));
        assert!(!matches_tag("amd64-Linux-32", "Linux", "32", AMD64));
    }

    #[test]
    fn test_host_tag_matches_itself() {
        if MACHINE.is_empty() {
            return;
        }
        let tag = format!("{}-{}-{}", OS, MACHINE[0], FLOAT_SIZE);
        assert!(matches(&tag));
    }
}
