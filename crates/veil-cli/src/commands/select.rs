//! `veil select`: show the proxy type generated for a contract.

use std::path::Path;

use veil_engine::{FactoryOptions, ProxyFactory, Runtime};
use veil_types::TypeHandle;

use crate::output::StyledOutput;

/// Shape of a generated proxy type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionReport {
    pub name: String,
    pub parent: String,
    pub interfaces: Vec<String>,
    pub serializable: bool,
    /// Descriptions of the intercepted methods
    pub methods: Vec<String>,
}

pub fn describe(
    runtime: &Runtime,
    base: TypeHandle,
    interfaces: &[TypeHandle],
    options: FactoryOptions,
) -> anyhow::Result<SelectionReport> {
    let factory = ProxyFactory::new(runtime.clone()).with_options(options);
    let ty = factory.create_implementation(base, interfaces)?;

    let types = runtime.types();
    Ok(SelectionReport {
        name: ty.name(),
        parent: types.qualified_name(ty.parent()),
        interfaces: ty.interfaces().iter().map(|i| types.qualified_name(*i)).collect(),
        serializable: ty.is_serializable(),
        methods: ty.methods().iter().map(|m| m.description.clone()).collect(),
    })
}

pub fn execute(
    out: &mut StyledOutput,
    catalog: &Path,
    base: &str,
    interfaces: &[String],
    options: FactoryOptions,
) -> anyhow::Result<()> {
    let (runtime, _) = super::load_runtime(catalog)?;
    let base = super::resolve(&runtime, base)?;
    let interfaces = interfaces
        .iter()
        .map(|name| super::resolve(&runtime, name))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let report = describe(&runtime, base, &interfaces, options)?;
    out.field("Type:", &report.name);
    out.field("Parent:", &report.parent);
    if report.interfaces.is_empty() {
        out.field("Interfaces:", "(none)");
    } else {
        out.field("Interfaces:", &report.interfaces.join(", "));
    }
    out.field("Persistable:", if report.serializable { "yes" } else { "no" });
    out.newline();
    out.bold(&format!("Intercepted methods ({}):", report.methods.len()));
    out.newline();
    for method in &report.methods {
        out.info(&format!("  {}", method));
        out.newline();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::write_catalog;
    use crate::commands::{load_runtime, resolve};

    #[test]
    fn test_class_contract() {
        let (_dir, path) = write_catalog();
        let (runtime, _) = load_runtime(&path).unwrap();
        let calc = resolve(&runtime, "app.Calculator").unwrap();
        let audit = resolve(&runtime, "app.IAudit").unwrap();

        let report = describe(&runtime, calc, &[audit], FactoryOptions::default()).unwrap();
        assert_eq!(report.name, "app.CalculatorProxy");
        assert_eq!(report.parent, "app.Calculator");
        assert_eq!(report.interfaces, vec!["app.IAudit"]);
        assert!(report.serializable);
        assert!(report.methods.contains(&"app.Calculator.add(i32 a, i32 b) -> i32".to_string()));
        assert!(report.methods.contains(&"app.IAudit.audit(string entry)".to_string()));
        assert!(!report.methods.iter().any(|m| m.contains("version")));
    }

    #[test]
    fn test_interface_contract_with_options() {
        let (_dir, path) = write_catalog();
        let (runtime, _) = load_runtime(&path).unwrap();
        let parse = resolve(&runtime, "app.IParse").unwrap();

        let options = FactoryOptions::default()
            .with_serializable(false)
            .with_type_name_suffix("Stub");
        let report = describe(&runtime, parse, &[], options).unwrap();
        assert_eq!(report.name, "app.IParseStub");
        assert_eq!(report.parent, "veil.ProxyBase");
        assert!(!report.serializable);
        assert!(report
            .methods
            .contains(&"app.IParse.try_parse(string text, out i32 value) -> bool".to_string()));
    }

    #[test]
    fn test_rejected_contract() {
        let (_dir, path) = write_catalog();
        let (runtime, _) = load_runtime(&path).unwrap();
        let token = resolve(&runtime, "app.Token").unwrap();
        let calc = resolve(&runtime, "app.Calculator").unwrap();

        assert!(describe(&runtime, token, &[], FactoryOptions::default()).is_err());
        let err = describe(&runtime, calc, &[calc], FactoryOptions::default()).unwrap_err();
        assert!(err.to_string().contains("not an interface"));
    }
}
