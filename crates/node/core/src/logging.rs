//! Logging configuration for the MeshLink node.

use eyre::{Result, eyre};
use tracing_subscriber::EnvFilter;

use crate::args::LogArgs;

/// Initialize logging based on command line arguments.
///
/// The filter is built with the following precedence:
/// 1. If `--quiet` is set, only errors are shown
/// 2. Otherwise, start with `RUST_LOG` if set, or a level from `-v` flags
/// 3. Apply any custom directives from `--log.filter`
pub fn init_logging(args: &LogArgs) -> Result<()> {
    let filter = build_filter(args);

    let result = if args.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };
    result.map_err(|e| eyre!("failed to install tracing subscriber: {e}"))?;

    if !args.quiet && !args.json {
        log_startup_banner();
    }

    Ok(())
}

fn build_filter(args: &LogArgs) -> EnvFilter {
    if args.quiet {
        return EnvFilter::new("error");
    }

    let base_level = match args.verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base_level));

    if let Some(custom) = &args.filter {
        for directive in custom.split(',').filter(|d| !d.is_empty()) {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => eprintln!("ignoring invalid log directive {directive:?}: {e}"),
            }
        }
    }

    filter
}

fn log_startup_banner() {
    println!(
        r#"
  _ __ ___   ___  ___| |__ | (_)_ __ | | __
 | '_ ` _ \ / _ \/ __| '_ \| | | '_ \| |/ /
 | | | | | |  __/\__ \ | | | | | | | |   <
 |_| |_| |_|\___||___/_| |_|_|_|_| |_|_|\_\

 MeshLink v{}
"#,
        crate::version::VERSION
    );
}
