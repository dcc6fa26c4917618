use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four resource collections exposed by the shop API.
///
/// Every supported endpoint maps to exactly one variant, and every variant
/// owns exactly one local table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Customers,
    Orders,
    Employees,
    SuitTypes,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Customers,
        EntityKind::Orders,
        EntityKind::Employees,
        EntityKind::SuitTypes,
    ];

    /// Path segment used by the remote API (`/api/<segment>`).
    pub fn segment(&self) -> &'static str {
        match self {
            EntityKind::Customers => "customers",
            EntityKind::Orders => "orders",
            EntityKind::Employees => "employees",
            EntityKind::SuitTypes => "suit-types",
        }
    }

    /// Name of the local SQLite table.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Customers => "customers",
            EntityKind::Orders => "orders",
            EntityKind::Employees => "employees",
            EntityKind::SuitTypes => "suit_types",
        }
    }

    /// Exact match against an API path segment. No prefix or substring
    /// matching: a typo is a miss, not a mis-route.
    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.segment() == segment)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segment())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_lowercase().replace('_', "-");
        Self::from_segment(&normalized).ok_or_else(|| {
            format!(
                "Invalid entity kind '{}'. Valid options: customers, orders, employees, suit-types",
                s
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_are_distinct_from_tables_only_for_suit_types() {
        for kind in EntityKind::ALL {
            if kind == EntityKind::SuitTypes {
                assert_ne!(kind.segment(), kind.table());
            } else {
                assert_eq!(kind.segment(), kind.table());
            }
        }
    }

    #[test]
    fn test_from_segment_exact_match_only() {
        assert_eq!(
            EntityKind::from_segment("suit-types"),
            Some(EntityKind::SuitTypes)
        );
        assert_eq!(EntityKind::from_segment("customer"), None);
        assert_eq!(EntityKind::from_segment("customers-archive"), None);
        assert_eq!(EntityKind::from_segment("Orders"), None);
    }

    #[test]
    fn test_from_str_accepts_table_and_segment_spellings() {
        assert_eq!(
            EntityKind::from_str("suit_types").unwrap(),
            EntityKind::SuitTypes
        );
        assert_eq!(
            EntityKind::from_str("SUIT-TYPES").unwrap(),
            EntityKind::SuitTypes
        );
        assert_eq!(EntityKind::from_str("Orders").unwrap(), EntityKind::Orders);
        assert!(EntityKind::from_str("tailors").is_err());
    }
}
