//! Script-era categories a glyph image can belong to.

use std::{fmt, str::FromStr};

use crate::error::ParseCategoryError;

/// Script-era variant of a glyph image.
///
/// The lower-case name doubles as the category directory name in a crawled
/// tree and as the persisted category label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Oracle-bone script.
    Oracle,
    /// Bronze inscription script.
    Bronze,
    /// Seal script.
    Seal,
    /// Liushutong script.
    Lst,
}

impl Category {
    /// Every category, in the order the reference pages list them.
    pub const ALL: [Self; 4] = [Self::Oracle, Self::Bronze, Self::Seal, Self::Lst];

    /// Byte length of the longest category name.
    pub const MAX_NAME_LEN: usize = 6;

    /// Lower-case name of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Oracle => "oracle",
            Self::Bronze => "bronze",
            Self::Seal => "seal",
            Self::Lst => "lst",
        }
    }

    /// Element id of the page section that lists this category's images.
    #[must_use]
    pub const fn marker_id(self) -> &'static str {
        match self {
            Self::Oracle => "OracleImages",
            Self::Bronze => "BronzeImages",
            Self::Seal => "SealImages",
            Self::Lst => "LstImages",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == raw)
            .ok_or_else(|| ParseCategoryError {
                provided: raw.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case("oracle", Category::Oracle)]
    #[case("bronze", Category::Bronze)]
    #[case("seal", Category::Seal)]
    #[case("lst", Category::Lst)]
    fn names_round_trip(#[case] raw: &str, #[case] expected: Category) {
        assert_eq!(raw.parse::<Category>(), Ok(expected));
        assert_eq!(expected.to_string(), raw);
    }

    #[rstest]
    #[case("Oracle")]
    #[case("clerical")]
    #[case("")]
    fn rejects_unknown_names(#[case] raw: &str) {
        assert!(raw.parse::<Category>().is_err());
    }

    #[test]
    fn longest_name_fits_the_declared_width() {
        let longest = Category::ALL
            .iter()
            .map(|category| category.as_str().len())
            .max();
        assert_eq!(longest, Some(Category::MAX_NAME_LEN));
    }
}
