//! Cluster directory handlers

pub mod filesystem;
pub mod memory;

pub use filesystem::FilesystemDirectoryHandler;
pub use memory::{MemoryDirectory, MemoryDirectoryHandler};

use sshproxy_core::{DataBag, ProxyError, ProxyResult, Scope, UnitId};

/// Reject writes to another unit's bag
pub(crate) fn check_write_scope(writer: &UnitId, scope: &Scope) -> ProxyResult<()> {
    match scope {
        Scope::Unit(owner) if owner != writer => Err(ProxyError::permission_denied(format!(
            "unit {writer} cannot write the bag of {owner}"
        ))),
        _ => Ok(()),
    }
}

/// Merge `updates` into `bag`; empty values delete. Returns whether anything changed.
pub(crate) fn merge_bag(bag: &mut DataBag, updates: DataBag) -> bool {
    let mut changed = false;
    for (key, value) in updates {
        if value.is_empty() {
            changed |= bag.remove(&key).is_some();
        } else if bag.get(&key) != Some(&value) {
            bag.insert(key, value);
            changed = true;
        }
    }
    changed
}
