//! Method selection
//!
//! Decides which interfaces a generated type implements and which methods
//! receive a forwarding body:
//!
//! - requested interfaces are expanded to their transitive closure
//! - an interface base joins the closure and `veil.ProxyBase` becomes the
//!   structural parent
//! - overridable (virtual or abstract) public instance methods of the parent
//!   are selected
//! - interface methods not already selected by signature are added, even
//!   when the parent has a statically bound method of the same shape
//! - methods of `veil.Persistable` are set aside for the fixed implementation

use rustc_hash::FxHashSet;
use veil_types::{MethodDef, MethodHandle, Overridability, SignatureKey, TypeHandle, TypeTable};

use crate::error::{ProxyError, ProxyResult};

/// A method chosen for a forwarding body
#[derive(Debug, Clone)]
pub struct SelectedMethod {
    /// Method as declared (closed over the contract's generic arguments)
    pub handle: MethodHandle,
    /// Snapshot of the declaration
    pub def: MethodDef,
    /// Signature identity used for dispatch by key
    pub key: SignatureKey,
}

impl SelectedMethod {
    fn new(table: &TypeTable, handle: MethodHandle) -> Option<Self> {
        let def = table.method(handle)?.clone();
        let key = SignatureKey::of(&def);
        Some(Self { handle, def, key })
    }
}

/// Result of selection for one contract
#[derive(Debug, Clone)]
pub struct Selection {
    /// Structural parent of the generated type
    pub parent: TypeHandle,
    /// Interface closure, in discovery order
    pub interfaces: Vec<TypeHandle>,
    /// Methods that get forwarding bodies
    pub methods: Vec<SelectedMethod>,
    /// Marker interface methods, implemented by hand
    pub marker_methods: Vec<SelectedMethod>,
}

/// Reject types that can never be a proxy base
pub fn check_base(table: &TypeTable, ty: TypeHandle) -> ProxyResult<()> {
    let def = table.type_def(ty)?;
    let reason = if !def.kind.is_reference() {
        Some("not a reference type")
    } else if def.sealed {
        Some("type is sealed")
    } else if def.is_generic_definition() {
        Some("open generic type")
    } else if !def.is_complete() {
        Some("type has no members yet")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ProxyError::Ineligible {
            name: table.qualified_name(ty),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Check a whole contract before any synthesis work
pub fn check_contract(table: &TypeTable, base: TypeHandle, interfaces: &[TypeHandle]) -> ProxyResult<()> {
    check_base(table, base)?;
    for iface in interfaces {
        let def = table.type_def(*iface)?;
        if !def.is_interface() {
            return Err(ProxyError::InvalidContract(format!(
                "{} is not an interface",
                table.qualified_name(*iface)
            )));
        }
        if def.is_generic_definition() {
            return Err(ProxyError::InvalidContract(format!(
                "{} is an open generic interface",
                table.qualified_name(*iface)
            )));
        }
    }
    Ok(())
}

/// Whether a type can be proxied with every public method intercepted.
///
/// Interfaces always can. Classes qualify when they are unsealed reference
/// types and none of their public instance methods is statically bound;
/// sealed overrides are simply left alone.
pub fn can_be_proxied(table: &TypeTable, ty: TypeHandle) -> bool {
    if check_base(table, ty).is_err() {
        return false;
    }
    match table.get(ty) {
        Some(def) if def.is_interface() => true,
        Some(_) => table.public_instance_methods(ty).iter().all(|m| {
            table
                .method(*m)
                .map(|def| def.overridability != Overridability::NonVirtual)
                .unwrap_or(false)
        }),
        None => false,
    }
}

/// Compute interfaces and methods for a contract
pub fn select(table: &TypeTable, base: TypeHandle, interfaces: &[TypeHandle]) -> ProxyResult<Selection> {
    check_contract(table, base, interfaces)?;

    let base_is_interface = table.type_def(base)?.is_interface();
    let parent = if base_is_interface {
        table.builtins().proxy_base
    } else {
        base
    };

    let mut closure = Vec::new();
    let roots = base_is_interface.then_some(base).into_iter().chain(interfaces.iter().copied());
    for iface in roots {
        if !closure.contains(&iface) {
            closure.push(iface);
        }
        for inherited in table.interface_closure(iface) {
            if !closure.contains(&inherited) {
                closure.push(inherited);
            }
        }
    }

    let persistable = table.builtins().persistable;
    let mut seen = FxHashSet::default();
    let mut methods = Vec::new();
    let mut marker_methods = Vec::new();

    for handle in table.public_instance_methods(parent) {
        let Some(selected) = SelectedMethod::new(table, handle) else {
            continue;
        };
        // Most-derived declaration only, so a sealed override hides the
        // virtual method it replaces
        if selected.def.overridability.is_overridable() && seen.insert(selected.key.clone()) {
            methods.push(selected);
        }
    }

    for iface in &closure {
        for handle in table.public_instance_methods(*iface) {
            let Some(selected) = SelectedMethod::new(table, handle) else {
                continue;
            };
            if *iface == persistable {
                marker_methods.push(selected);
                continue;
            }
            if seen.insert(selected.key.clone()) {
                methods.push(selected);
            }
        }
    }

    Ok(Selection {
        parent,
        interfaces: closure,
        methods,
        marker_methods,
    })
}
