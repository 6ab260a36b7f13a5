// src/transaction/package.rs

//! Transaction items

use crate::package::{Package, PackageId, Reason};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Kind of object a transaction item acts on
///
/// The engine only produces `Package` items; the other kinds keep the
/// serialized form compatible with callers that know about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionItemType {
    Package,
    Group,
    Environment,
    Module,
}

impl TransactionItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionItemType::Package => "Package",
            TransactionItemType::Group => "Group",
            TransactionItemType::Environment => "Environment",
            TransactionItemType::Module => "Module",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionItemAction {
    Install,
    Upgrade,
    Downgrade,
    Reinstall,
    Remove,
    Replaced,
    Obsoleted,
    ReasonChange,
}

impl TransactionItemAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionItemAction::Install => "Install",
            TransactionItemAction::Upgrade => "Upgrade",
            TransactionItemAction::Downgrade => "Downgrade",
            TransactionItemAction::Reinstall => "Reinstall",
            TransactionItemAction::Remove => "Remove",
            TransactionItemAction::Replaced => "Replaced",
            TransactionItemAction::Obsoleted => "Obsoleted",
            TransactionItemAction::ReasonChange => "Reason Change",
        }
    }

    /// Brings a package onto the system
    pub fn is_inbound(&self) -> bool {
        matches!(
            self,
            TransactionItemAction::Install
                | TransactionItemAction::Upgrade
                | TransactionItemAction::Downgrade
                | TransactionItemAction::Reinstall
        )
    }

    /// Takes a package off the system
    pub fn is_outbound(&self) -> bool {
        matches!(
            self,
            TransactionItemAction::Remove
                | TransactionItemAction::Replaced
                | TransactionItemAction::Obsoleted
        )
    }

    /// Position of the item group in the item list
    pub(crate) fn group_rank(&self) -> u8 {
        match self {
            TransactionItemAction::Install => 0,
            TransactionItemAction::Reinstall => 1,
            TransactionItemAction::Upgrade => 2,
            TransactionItemAction::Downgrade => 3,
            TransactionItemAction::Remove => 4,
            TransactionItemAction::Replaced | TransactionItemAction::Obsoleted => 5,
            TransactionItemAction::ReasonChange => 6,
        }
    }
}

impl fmt::Display for TransactionItemAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution state of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionItemState {
    #[default]
    Started,
    Ok,
    Error,
}

/// One package action of a transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionPackage {
    #[serde(serialize_with = "serialize_package")]
    pub package: Arc<Package>,
    pub action: TransactionItemAction,
    pub reason: Reason,
    /// Installed packages this inbound item takes the place of
    pub replaces: Vec<PackageId>,
    /// The inbound item that takes this outbound item's place
    pub replaced_by: Vec<PackageId>,
    pub state: TransactionItemState,
}

fn serialize_package<S: serde::Serializer>(
    pkg: &Arc<Package>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    use serde::ser::SerializeStruct;
    let mut s = serializer.serialize_struct("Package", 4)?;
    s.serialize_field("id", &pkg.id)?;
    s.serialize_field("nevra", &pkg.nevra())?;
    s.serialize_field("repo_id", &pkg.repo_id)?;
    s.serialize_field("location", &pkg.location)?;
    s.end()
}

impl TransactionPackage {
    pub fn new(package: Arc<Package>, action: TransactionItemAction, reason: Reason) -> Self {
        Self {
            package,
            action,
            reason,
            replaces: Vec::new(),
            replaced_by: Vec::new(),
            state: TransactionItemState::Started,
        }
    }

    pub fn item_type(&self) -> TransactionItemType {
        TransactionItemType::Package
    }

    pub fn id(&self) -> PackageId {
        self.package.id
    }

    pub fn nevra(&self) -> String {
        self.package.nevra()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction() {
        assert!(TransactionItemAction::Upgrade.is_inbound());
        assert!(!TransactionItemAction::Upgrade.is_outbound());
        assert!(TransactionItemAction::Obsoleted.is_outbound());
        assert!(!TransactionItemAction::ReasonChange.is_inbound());
        assert!(!TransactionItemAction::ReasonChange.is_outbound());
    }

    #[test]
    fn test_group_order() {
        let order = [
            TransactionItemAction::Install,
            TransactionItemAction::Reinstall,
            TransactionItemAction::Upgrade,
            TransactionItemAction::Downgrade,
            TransactionItemAction::Remove,
            TransactionItemAction::Replaced,
            TransactionItemAction::ReasonChange,
        ];
        assert!(order.windows(2).all(|w| w[0].group_rank() < w[1].group_rank()));
    }
}
