//! Dataset partitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Named data split. Selects the subdirectory under the dataset root and
/// whether labels are read at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    #[default]
    Train,
    #[serde(rename = "val", alias = "validation")]
    Validation,
    Test,
}

impl Split {
    /// Subdirectory name under the dataset root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "val",
            Split::Test => "test",
        }
    }

    /// Test splits ship without ground truth.
    #[inline]
    pub fn has_labels(&self) -> bool {
        !matches!(self, Split::Test)
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Split {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Split::Train),
            "val" | "validation" => Ok(Split::Validation),
            "test" => Ok(Split::Test),
            other => Err(format!(
                "unknown split '{}', expected one of: train, val, test",
                other
            )),
        }
    }
}
