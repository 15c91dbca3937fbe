//! `veil info`: display version and environment info.

use veil_engine::{FactoryOptions, Runtime};

use crate::output::StyledOutput;

pub fn execute(out: &mut StyledOutput, options: &FactoryOptions) -> anyhow::Result<()> {
    out.bold(&format!("veil v{}", env!("CARGO_PKG_VERSION")));
    out.newline();
    out.newline();

    out.field(
        "Platform:",
        &format!("{} ({})", std::env::consts::OS, std::env::consts::ARCH),
    );

    let runtime = Runtime::new();
    {
        let types = runtime.types();
        let builtins = types.builtins();
        out.field("Proxy base:", &types.qualified_name(builtins.proxy_base));
        out.field("Marker:", &types.qualified_name(builtins.persistable));
    }

    out.newline();
    out.field("Serializable:", &options.serializable.to_string());
    out.field("Call sites:", &options.capture_call_site.to_string());
    out.field("Name suffix:", &options.type_name_suffix);

    out.newline();
    print_env(out, "VEIL_LOG");
    print_env(out, "NO_COLOR");
    Ok(())
}

fn print_env(out: &mut StyledOutput, var: &str) {
    match std::env::var(var) {
        Ok(value) => out.field(&format!("{}:", var), &value),
        Err(_) => out.field(&format!("{}:", var), "(not set)"),
    }
}
