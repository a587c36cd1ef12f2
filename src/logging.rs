use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

/// Install the process-wide subscriber.
///
/// Production logs warnings and above as JSON lines; `dev` switches to
/// human-readable output at info, `verbose` to debug. `RUST_LOG` wins over both.
pub fn init(config: &AppConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(config)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if config.dev {
        builder.try_init()
    } else {
        builder.json().try_init()
    };
    installed.map_err(|e| anyhow::anyhow!(e))?;

    tracing::debug!("set logging to verbose");
    Ok(())
}

fn default_level(config: &AppConfig) -> &'static str {
    if config.verbose {
        "debug"
    } else if config.dev {
        "info"
    } else {
        "warn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level() {
        let mut config = AppConfig::default();
        assert_eq!(default_level(&config), "warn");
        config.dev = true;
        assert_eq!(default_level(&config), "info");
        config.verbose = true;
        assert_eq!(default_level(&config), "debug");
    }
}
