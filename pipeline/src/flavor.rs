use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A platform/variant selector such as `platform=desktop;quality=high`.
///
/// A flavor is a set of tags. The empty set, written `*`, is the universal
/// flavor. A transformer declares a flavor *pattern*; it is compatible with
/// a target flavor when every tag of the pattern is present in the target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct Flavor {
    tags: BTreeSet<String>,
}

impl Flavor {
    /// The universal flavor, `*`.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Self {
        let tags = text
            .split(';')
            .map(str::trim)
            .filter(|tag| !tag.is_empty() && *tag != "*")
            .map(str::to_owned)
            .collect();
        Self { tags }
    }

    pub fn is_any(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    /// Whether `self`, used as a pattern, accepts the `target` flavor.
    pub fn matches(&self, target: &Flavor) -> bool {
        self.tags.is_subset(&target.tags)
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tags.is_empty() {
            return f.write_str("*");
        }
        let mut first = true;
        for tag in &self.tags {
            if !first {
                f.write_str(";")?;
            }
            f.write_str(tag)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Flavor {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for Flavor {
    fn from(text: String) -> Self {
        Self::parse(&text)
    }
}

impl From<Flavor> for String {
    fn from(flavor: Flavor) -> Self {
        flavor.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("*", "*", true)]
    #[case("*", "platform=desktop", true)]
    #[case("platform=desktop", "*", false)]
    #[case("platform=desktop", "platform=desktop;quality=high", true)]
    #[case("platform=mobile", "platform=desktop;quality=high", false)]
    #[case("quality=high;platform=desktop", "platform=desktop;quality=high", true)]
    fn pattern_matching(#[case] pattern: &str, #[case] target: &str, #[case] expected: bool) {
        assert_eq!(Flavor::parse(pattern).matches(&Flavor::parse(target)), expected);
    }

    #[test]
    fn display_is_sorted() {
        let flavor = Flavor::parse("b=2; a=1");
        assert_eq!(flavor.to_string(), "a=1;b=2");
        assert_eq!(Flavor::any().to_string(), "*");
    }

    #[test]
    fn serializes_as_string() {
        let flavor = Flavor::parse("platform=desktop");
        let json = serde_json::to_string(&flavor).unwrap();
        assert_eq!(json, "\"platform=desktop\"");
        let back: Flavor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flavor);
    }
}
