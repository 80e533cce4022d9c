use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A fulfillment role, in the recommended workflow order.
///
/// The display name is also the wire and storage representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "Procurement")]
    Procurement,
    #[serde(rename = "Inventory QC - IN")]
    InventoryQcIn,
    #[serde(rename = "QC - Preppers")]
    QcPreppers,
    #[serde(rename = "Pre-stagers")]
    PreStagers,
    #[serde(rename = "Extra Service Preppers")]
    ExtraServicePreppers,
    #[serde(rename = "Pickers and Packers")]
    PickersAndPackers,
    #[serde(rename = "QC-out")]
    QcOut,
    #[serde(rename = "Stock handler 1")]
    StockHandler1,
    #[serde(rename = "Stock handler 2")]
    StockHandler2,
    #[serde(rename = "Manifester")]
    Manifester,
    /// Completion requires delivery statistics.
    #[serde(rename = "Driver")]
    Driver,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid role. Must be one of: {}", Role::names().join(", "))]
pub struct InvalidRole;

impl Role {
    pub const ALL: [Role; 11] = [
        Role::Procurement,
        Role::InventoryQcIn,
        Role::QcPreppers,
        Role::PreStagers,
        Role::ExtraServicePreppers,
        Role::PickersAndPackers,
        Role::QcOut,
        Role::StockHandler1,
        Role::StockHandler2,
        Role::Manifester,
        Role::Driver,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Procurement => "Procurement",
            Role::InventoryQcIn => "Inventory QC - IN",
            Role::QcPreppers => "QC - Preppers",
            Role::PreStagers => "Pre-stagers",
            Role::ExtraServicePreppers => "Extra Service Preppers",
            Role::PickersAndPackers => "Pickers and Packers",
            Role::QcOut => "QC-out",
            Role::StockHandler1 => "Stock handler 1",
            Role::StockHandler2 => "Stock handler 2",
            Role::Manifester => "Manifester",
            Role::Driver => "Driver",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|role| role.as_str()).collect()
    }

    /// Zero-based position in the workflow.
    pub fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|role| *role == self)
            .unwrap_or_default()
    }

    /// One-based position in the workflow, as shown to operators.
    pub fn order(self) -> u8 {
        self.index() as u8 + 1
    }

    pub fn previous(self) -> Option<Role> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    pub fn next(self) -> Option<Role> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn is_driver(self) -> bool {
        self == Role::Driver
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == trimmed)
            .ok_or(InvalidRole)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_order() {
        assert_eq!(Role::COUNT, 11);
        assert_eq!(Role::Procurement.order(), 1);
        assert_eq!(Role::Driver.order(), 11);
        assert_eq!(Role::QcOut.index(), 6);
    }

    #[test]
    fn test_previous_and_next() {
        assert_eq!(Role::Procurement.previous(), None);
        assert_eq!(Role::QcPreppers.previous(), Some(Role::InventoryQcIn));
        assert_eq!(Role::Procurement.next(), Some(Role::InventoryQcIn));
        assert_eq!(Role::Driver.next(), None);
    }

    #[test]
    fn test_parse_trims_but_is_case_sensitive() {
        assert_eq!(" QC - Preppers ".parse::<Role>(), Ok(Role::QcPreppers));
        assert_eq!("qc-out".parse::<Role>(), Err(InvalidRole));
        assert_eq!("Janitor".parse::<Role>(), Err(InvalidRole));
    }

    #[test]
    fn test_serde_uses_display_names() {
        let json = serde_json::to_string(&Role::InventoryQcIn).unwrap();
        assert_eq!(json, "\"Inventory QC - IN\"");
        let role: Role = serde_json::from_str("\"Stock handler 2\"").unwrap();
        assert_eq!(role, Role::StockHandler2);
    }

    #[test]
    fn test_invalid_role_message_lists_roles() {
        let message = InvalidRole.to_string();
        assert!(message.starts_with("Invalid role. Must be one of: Procurement, "));
        assert!(message.ends_with("Manifester, Driver"));
    }
}
