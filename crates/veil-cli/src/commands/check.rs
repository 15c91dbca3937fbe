//! `veil check`: report whether catalog types can be proxied.

use std::path::Path;

use veil_engine::proxy::selector::check_base;
use veil_engine::Runtime;
use veil_types::{Overridability, TypeHandle};

use crate::output::StyledOutput;

/// Proxy eligibility of one type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eligibility {
    pub name: String,
    /// Why the type cannot be a proxy base at all
    pub rejected: Option<String>,
    /// Public methods a proxy cannot intercept
    pub bound_methods: Vec<String>,
}

impl Eligibility {
    /// Every public method would be intercepted
    pub fn is_full(&self) -> bool {
        self.rejected.is_none() && self.bound_methods.is_empty()
    }
}

pub fn evaluate(runtime: &Runtime, ty: TypeHandle) -> Eligibility {
    let types = runtime.types();
    let name = types.qualified_name(ty);
    if let Err(err) = check_base(&types, ty) {
        return Eligibility {
            name,
            rejected: Some(err.to_string()),
            bound_methods: Vec::new(),
        };
    }

    let bound_methods = types
        .public_instance_methods(ty)
        .into_iter()
        .filter(|m| {
            types
                .method(*m)
                .map_or(false, |def| def.overridability == Overridability::NonVirtual)
        })
        .map(|m| types.describe_method(m))
        .collect();

    Eligibility {
        name,
        rejected: None,
        bound_methods,
    }
}

pub fn execute(out: &mut StyledOutput, catalog: &Path, names: &[String]) -> anyhow::Result<()> {
    let (runtime, declared) = super::load_runtime(catalog)?;
    let handles = if names.is_empty() {
        declared
    } else {
        names
            .iter()
            .map(|name| super::resolve(&runtime, name))
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    for ty in handles {
        let report = evaluate(&runtime, ty);
        if let Some(reason) = &report.rejected {
            out.error("  no       ");
            out.plain(&report.name);
            out.info(&format!("  {}", reason));
        } else if report.bound_methods.is_empty() {
            out.success("  yes      ");
            out.plain(&report.name);
        } else {
            out.warning("  partial  ");
            out.plain(&report.name);
            for method in &report.bound_methods {
                out.newline();
                out.info(&format!("             not intercepted: {}", method));
            }
        }
        out.newline();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::write_catalog;
    use crate::commands::{load_runtime, resolve};

    fn report(name: &str) -> Eligibility {
        let (_dir, path) = write_catalog();
        let (runtime, _) = load_runtime(&path).unwrap();
        let ty = resolve(&runtime, name).unwrap();
        evaluate(&runtime, ty)
    }

    #[test]
    fn test_interface_is_fully_proxied() {
        let audit = report("app.IAudit");
        assert!(audit.is_full());
        assert_eq!(audit.name, "app.IAudit");
    }

    #[test]
    fn test_abstract_class_is_fully_proxied() {
        assert!(report("app.Shape").is_full());
    }

    #[test]
    fn test_bound_methods_are_listed() {
        let calc = report("app.Calculator");
        assert!(calc.rejected.is_none());
        assert!(!calc.is_full());
        assert_eq!(calc.bound_methods, vec!["app.Calculator.version() -> string"]);
    }

    #[test]
    fn test_rejected_types() {
        let token = report("app.Token");
        assert!(token.rejected.as_deref().unwrap().contains("sealed"));

        let bag = report("app.IBag");
        assert!(bag.rejected.as_deref().unwrap().contains("open generic"));

        let string = report("string");
        assert!(!string.is_full());

        // Closing the generic makes it eligible
        assert!(report("app.IBag<i32>").is_full());
    }
}
