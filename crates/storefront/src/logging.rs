//! Tracing bootstrap for binaries

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber: `RUST_LOG` wins, then `filter`, then
/// `info`. SQL statement logging is kept at `warn`.
pub fn init_tracing(filter: Option<&str>) -> Result<()> {
    let env_filter = build_filter(filter)?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

fn build_filter(filter: Option<&str>) -> Result<EnvFilter> {
    let base = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => EnvFilter::try_new(filter.unwrap_or("info"))
            .with_context(|| format!("Invalid log filter '{}'", filter.unwrap_or("info")))?,
    };
    Ok(base.add_directive("sqlx=warn".parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_configured_filter_is_used_without_env() {
        std::env::remove_var("RUST_LOG");
        let filter = build_filter(Some("debug")).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("debug"));
        assert!(rendered.contains("sqlx=warn"));
    }

    #[test]
    #[serial]
    fn test_invalid_filter_is_rejected() {
        std::env::remove_var("RUST_LOG");
        assert!(build_filter(Some("storefront=loud")).is_err());
    }
}
