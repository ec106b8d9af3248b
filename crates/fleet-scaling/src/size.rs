//! Size tags and the compute they stand for

use crate::error::ScalingError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Symbolic instance size
///
/// Declaration order is the size order; `Ord` is derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SizeTag {
    #[serde(rename = "micro")]
    Micro,
    #[serde(rename = "small")]
    Small,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "large")]
    Large,
    #[serde(rename = "xlarge")]
    XLarge,
    #[serde(rename = "2xlarge")]
    XLarge2,
    #[serde(rename = "4xlarge")]
    XLarge4,
}

impl SizeTag {
    /// Every tag, smallest first
    pub const ALL: [SizeTag; 7] = [
        SizeTag::Micro,
        SizeTag::Small,
        SizeTag::Medium,
        SizeTag::Large,
        SizeTag::XLarge,
        SizeTag::XLarge2,
        SizeTag::XLarge4,
    ];

    /// Compute allocation for one instance of this size
    pub fn allocation(&self) -> ComputeAllocation {
        match self {
            SizeTag::Micro => ComputeAllocation::new(256, 512),
            SizeTag::Small => ComputeAllocation::new(512, 1024),
            SizeTag::Medium => ComputeAllocation::new(1024, 2048),
            SizeTag::Large => ComputeAllocation::new(2048, 4096),
            SizeTag::XLarge => ComputeAllocation::new(4096, 8192),
            SizeTag::XLarge2 => ComputeAllocation::new(8192, 16384),
            SizeTag::XLarge4 => ComputeAllocation::new(16384, 32768),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeTag::Micro => "micro",
            SizeTag::Small => "small",
            SizeTag::Medium => "medium",
            SizeTag::Large => "large",
            SizeTag::XLarge => "xlarge",
            SizeTag::XLarge2 => "2xlarge",
            SizeTag::XLarge4 => "4xlarge",
        }
    }
}

impl std::fmt::Display for SizeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SizeTag {
    type Err = ScalingError;

    /// Tags are matched exactly; `Small` or ` small` are unknown
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SizeTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| ScalingError::UnknownSizeTag(s.to_string()))
    }
}

/// Concrete compute for one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComputeAllocation {
    /// CPU units (1024 = one vCPU)
    pub cpu_units: u32,

    /// Memory in MiB
    pub memory_mb: u32,
}

impl ComputeAllocation {
    pub const fn new(cpu_units: u32, memory_mb: u32) -> Self {
        Self {
            cpu_units,
            memory_mb,
        }
    }

    /// Both dimensions at least as large as `other`'s
    pub fn covers(&self, other: &ComputeAllocation) -> bool {
        self.cpu_units >= other.cpu_units && self.memory_mb >= other.memory_mb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_tags() {
        assert_eq!("micro".parse::<SizeTag>().unwrap(), SizeTag::Micro);
        assert_eq!("2xlarge".parse::<SizeTag>().unwrap(), SizeTag::XLarge2);
        assert_eq!("4xlarge".parse::<SizeTag>().unwrap(), SizeTag::XLarge4);
    }

    #[test]
    fn test_parse_is_exact() {
        for raw in ["Small", " small", "3xlarge", ""] {
            assert_eq!(
                raw.parse::<SizeTag>(),
                Err(ScalingError::UnknownSizeTag(raw.to_string()))
            );
        }
    }

    #[test]
    fn test_order_follows_declaration() {
        assert!(SizeTag::Micro < SizeTag::Small);
        assert!(SizeTag::XLarge < SizeTag::XLarge2);
        let mut shuffled = vec![SizeTag::Large, SizeTag::Micro, SizeTag::XLarge4];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![SizeTag::Micro, SizeTag::Large, SizeTag::XLarge4]
        );
    }

    #[test]
    fn test_serde_uses_tag_names() {
        let json = serde_json::to_string(&SizeTag::XLarge2).unwrap();
        assert_eq!(json, "\"2xlarge\"");
    }
}
