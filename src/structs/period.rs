use std::fmt;

use serde::{Deserialize, Serialize};

/// Calendar unit a chart window spans.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    All,
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    pub const EVERY: [Period; 5] = [
        Period::Day,
        Period::Week,
        Period::Month,
        Period::Year,
        Period::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::All => "all",
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
        }
    }

    pub fn path(&self) -> String {
        format!("/{}", self.as_str())
    }

    /// `all` has no older/newer pages.
    pub fn is_navigable(&self) -> bool {
        !matches!(self, Period::All)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[test]
pub fn test_period_paths() {
    assert_eq!(Period::Week.path(), "/week");
    assert_eq!(Period::All.to_string(), "all");
    assert!(!Period::All.is_navigable());
    assert!(Period::Year.is_navigable());
}
