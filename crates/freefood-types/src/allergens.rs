use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the nine dietary flags a post can be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AllergenFlag {
    Vegan,
    Vegetarian,
    GlutenFree,
    DairyFree,
    NutFree,
    FishFree,
    ShellFree,
    WheatFree,
    SoyFree,
}

impl AllergenFlag {
    pub const ALL: [AllergenFlag; 9] = [
        Self::Vegan,
        Self::Vegetarian,
        Self::GlutenFree,
        Self::DairyFree,
        Self::NutFree,
        Self::FishFree,
        Self::ShellFree,
        Self::WheatFree,
        Self::SoyFree,
    ];

    /// Wire name, also the column name in the `allergens` table.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vegan => "vegan",
            Self::Vegetarian => "vegetarian",
            Self::GlutenFree => "gluten_free",
            Self::DairyFree => "dairy_free",
            Self::NutFree => "nut_free",
            Self::FishFree => "fish_free",
            Self::ShellFree => "shell_free",
            Self::WheatFree => "wheat_free",
            Self::SoyFree => "soy_free",
        }
    }
}

impl fmt::Display for AllergenFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFlag(pub String);

impl fmt::Display for UnknownFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown allergen flag: {}", self.0)
    }
}

impl std::error::Error for UnknownFlag {}

impl FromStr for AllergenFlag {
    type Err = UnknownFlag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|flag| flag.as_str() == s)
            .ok_or_else(|| UnknownFlag(s.to_string()))
    }
}

/// Parse a comma separated filter string such as `"vegan, nut_free"`.
///
/// Names are trimmed; unknown names are dropped and duplicates collapse.
/// An empty string yields no flags, which matches every tag set.
pub fn parse_filter(raw: &str) -> Vec<AllergenFlag> {
    let mut flags: Vec<AllergenFlag> = raw
        .split(',')
        .filter_map(|name| name.trim().parse().ok())
        .collect();
    flags.sort();
    flags.dedup();
    flags
}

/// The nine dietary flags attached to a post. Unspecified flags are `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllergenTags {
    pub vegan: bool,
    pub vegetarian: bool,
    pub gluten_free: bool,
    pub dairy_free: bool,
    pub nut_free: bool,
    pub fish_free: bool,
    pub shell_free: bool,
    pub wheat_free: bool,
    pub soy_free: bool,
}

impl AllergenTags {
    pub fn get(&self, flag: AllergenFlag) -> bool {
        match flag {
            AllergenFlag::Vegan => self.vegan,
            AllergenFlag::Vegetarian => self.vegetarian,
            AllergenFlag::GlutenFree => self.gluten_free,
            AllergenFlag::DairyFree => self.dairy_free,
            AllergenFlag::NutFree => self.nut_free,
            AllergenFlag::FishFree => self.fish_free,
            AllergenFlag::ShellFree => self.shell_free,
            AllergenFlag::WheatFree => self.wheat_free,
            AllergenFlag::SoyFree => self.soy_free,
        }
    }

    pub fn with(mut self, flag: AllergenFlag) -> Self {
        let slot = match flag {
            AllergenFlag::Vegan => &mut self.vegan,
            AllergenFlag::Vegetarian => &mut self.vegetarian,
            AllergenFlag::GlutenFree => &mut self.gluten_free,
            AllergenFlag::DairyFree => &mut self.dairy_free,
            AllergenFlag::NutFree => &mut self.nut_free,
            AllergenFlag::FishFree => &mut self.fish_free,
            AllergenFlag::ShellFree => &mut self.shell_free,
            AllergenFlag::WheatFree => &mut self.wheat_free,
            AllergenFlag::SoyFree => &mut self.soy_free,
        };
        *slot = true;
        self
    }

    /// True when every requested flag is set. Flags not requested are ignored.
    pub fn satisfies(&self, requested: &[AllergenFlag]) -> bool {
        requested.iter().all(|flag| self.get(*flag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_names_round_trip() {
        for flag in AllergenFlag::ALL {
            assert_eq!(flag.as_str().parse::<AllergenFlag>(), Ok(flag));
        }
        assert!("glutenFree".parse::<AllergenFlag>().is_err());
    }

    #[test]
    fn parse_filter_drops_unknown_and_trims() {
        let flags = parse_filter(" vegan,location, nut_free ,bogus,vegan");
        assert_eq!(flags, vec![AllergenFlag::Vegan, AllergenFlag::NutFree]);
    }

    #[test]
    fn parse_filter_empty_is_unconstrained() {
        assert!(parse_filter("").is_empty());
        assert!(parse_filter(" , ,").is_empty());
    }

    #[test]
    fn missing_fields_default_to_false() {
        let tags: AllergenTags = serde_json::from_str(r#"{"vegan": true}"#).unwrap();
        assert_eq!(tags, AllergenTags::default().with(AllergenFlag::Vegan));
    }

    #[test]
    fn satisfies_only_checks_requested_flags() {
        let tags = AllergenTags::default()
            .with(AllergenFlag::Vegetarian)
            .with(AllergenFlag::NutFree)
            .with(AllergenFlag::SoyFree);

        assert!(tags.satisfies(&[]));
        assert!(tags.satisfies(&[AllergenFlag::Vegetarian, AllergenFlag::NutFree]));
        assert!(!tags.satisfies(&[AllergenFlag::Vegan]));
    }
}
