use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

use log::trace;

use crate::core::{CqlMapError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsistencyLevel {
    Any,
    One,
    Two,
    Three,
    Quorum,
    LocalOne,
    LocalQuorum,
    EachQuorum,
    All,
}

impl ConsistencyLevel {
    pub const ALL_LEVELS: [ConsistencyLevel; 9] = [
        Self::Any,
        Self::One,
        Self::Two,
        Self::Three,
        Self::Quorum,
        Self::LocalOne,
        Self::LocalQuorum,
        Self::EachQuorum,
        Self::All,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Any => "ANY",
            Self::One => "ONE",
            Self::Two => "TWO",
            Self::Three => "THREE",
            Self::Quorum => "QUORUM",
            Self::LocalOne => "LOCAL_ONE",
            Self::LocalQuorum => "LOCAL_QUORUM",
            Self::EachQuorum => "EACH_QUORUM",
            Self::All => "ALL",
        }
    }

    /// Counters need at least one replica acknowledgement; `ANY` only hints.
    pub fn is_valid_for_counter(&self) -> bool {
        !matches!(self, Self::Any)
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ConsistencyLevel {
    type Err = CqlMapError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase();
        Self::ALL_LEVELS
            .iter()
            .copied()
            .find(|level| level.name() == normalized)
            .ok_or_else(|| {
                CqlMapError::BeanMapping(format!("Unknown consistency level '{}'", s))
            })
    }
}

/// Read/write consistency levels per table, filled once per entity type at parse time.
#[derive(Debug)]
pub struct ConsistencyLevelPolicy {
    default_read: ConsistencyLevel,
    default_write: ConsistencyLevel,
    read_levels: RwLock<HashMap<String, ConsistencyLevel>>,
    write_levels: RwLock<HashMap<String, ConsistencyLevel>>,
}

impl ConsistencyLevelPolicy {
    pub fn new(default_read: ConsistencyLevel, default_write: ConsistencyLevel) -> Self {
        Self {
            default_read,
            default_write,
            read_levels: RwLock::new(HashMap::new()),
            write_levels: RwLock::new(HashMap::new()),
        }
    }

    pub fn default_global_read_level(&self) -> ConsistencyLevel {
        self.default_read
    }

    pub fn default_global_write_level(&self) -> ConsistencyLevel {
        self.default_write
    }

    pub fn set_read_level_for_table(&self, level: ConsistencyLevel, table: &str) -> Result<()> {
        trace!("Set read consistency level {} for table '{}'", level, table);
        self.read_levels.write()?.insert(table.to_string(), level);
        Ok(())
    }

    pub fn set_write_level_for_table(&self, level: ConsistencyLevel, table: &str) -> Result<()> {
        trace!("Set write consistency level {} for table '{}'", level, table);
        self.write_levels.write()?.insert(table.to_string(), level);
        Ok(())
    }

    pub fn read_level_for_table(&self, table: &str) -> Result<ConsistencyLevel> {
        Ok(self
            .read_levels
            .read()?
            .get(table)
            .copied()
            .unwrap_or(self.default_read))
    }

    pub fn write_level_for_table(&self, table: &str) -> Result<ConsistencyLevel> {
        Ok(self
            .write_levels
            .read()?
            .get(table)
            .copied()
            .unwrap_or(self.default_write))
    }

    pub fn has_table(&self, table: &str) -> Result<bool> {
        Ok(self.read_levels.read()?.contains_key(table)
            || self.write_levels.read()?.contains_key(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire_names() {
        assert_eq!(
            "LOCAL_QUORUM".parse::<ConsistencyLevel>().unwrap(),
            ConsistencyLevel::LocalQuorum
        );
        assert_eq!("one".parse::<ConsistencyLevel>().unwrap(), ConsistencyLevel::One);
        assert!("MOST".parse::<ConsistencyLevel>().is_err());
    }

    #[test]
    fn test_policy_falls_back_to_defaults() {
        let policy = ConsistencyLevelPolicy::new(ConsistencyLevel::One, ConsistencyLevel::All);
        assert_eq!(policy.read_level_for_table("users").unwrap(), ConsistencyLevel::One);

        policy
            .set_write_level_for_table(ConsistencyLevel::Quorum, "users")
            .unwrap();
        assert_eq!(policy.write_level_for_table("users").unwrap(), ConsistencyLevel::Quorum);
        assert_eq!(policy.write_level_for_table("other").unwrap(), ConsistencyLevel::All);
        assert!(policy.has_table("users").unwrap());
    }
}
