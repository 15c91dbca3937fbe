//! Proxy contracts
//!
//! A contract is the identity of a generated implementation: the base type
//! plus the set of interfaces it must satisfy. Order and repeats in the
//! requested interface list do not change the identity.

use std::hash::{Hash, Hasher};

use veil_types::TypeHandle;

/// Base type plus interface set
#[derive(Debug, Clone)]
pub struct Contract {
    base: TypeHandle,
    interfaces: Vec<TypeHandle>,
    members: Vec<TypeHandle>,
}

impl Contract {
    /// Build a contract. Duplicate interfaces are dropped, keeping the first
    /// occurrence's position.
    pub fn new(base: TypeHandle, interfaces: &[TypeHandle]) -> Self {
        let mut ordered = Vec::with_capacity(interfaces.len());
        for iface in interfaces {
            if !ordered.contains(iface) {
                ordered.push(*iface);
            }
        }

        let mut members = ordered.clone();
        members.push(base);
        members.sort_unstable();
        members.dedup();

        Self {
            base,
            interfaces: ordered,
            members,
        }
    }

    pub fn base(&self) -> TypeHandle {
        self.base
    }

    /// Requested interfaces in first-seen order, without repeats
    pub fn interfaces(&self) -> &[TypeHandle] {
        &self.interfaces
    }

    /// Distinct participating types, base included
    pub fn members(&self) -> &[TypeHandle] {
        &self.members
    }

    /// XOR of the identity hashes of every distinct participating type
    pub fn identity_hash(&self) -> u64 {
        self.members
            .iter()
            .fold(0, |acc, ty| acc ^ ty.identity_hash())
    }
}

impl PartialEq for Contract {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base && self.members == other.members
    }
}

impl Eq for Contract {}

impl Hash for Contract {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.identity_hash());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_types::{TypeDefinition, TypeTable};

    fn handles() -> (TypeHandle, TypeHandle, TypeHandle) {
        let mut table = TypeTable::new();
        let base = table.define(TypeDefinition::class("Base")).unwrap();
        let a = table.define(TypeDefinition::interface("IA")).unwrap();
        let b = table.define(TypeDefinition::interface("IB")).unwrap();
        (base, a, b)
    }

    #[test]
    fn test_order_and_duplicates_do_not_matter() {
        let (base, a, b) = handles();
        let c1 = Contract::new(base, &[a, b]);
        let c2 = Contract::new(base, &[b, a, b, a]);
        assert_eq!(c1, c2);
        assert_eq!(c1.identity_hash(), c2.identity_hash());
        assert_eq!(c2.interfaces(), &[b, a]);
    }

    #[test]
    fn test_hash_is_xor_of_members() {
        let (base, a, b) = handles();
        let c = Contract::new(base, &[a, b, a]);
        assert_eq!(
            c.identity_hash(),
            base.identity_hash() ^ a.identity_hash() ^ b.identity_hash()
        );
    }

    #[test]
    fn test_base_is_part_of_identity() {
        let (base, a, b) = handles();
        assert_ne!(Contract::new(base, &[a]), Contract::new(base, &[a, b]));
        assert_ne!(Contract::new(a, &[b]), Contract::new(b, &[a]));
    }
}
