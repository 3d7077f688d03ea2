//! Command-line options.

use std::path::PathBuf;

use clap::Parser;

/// Per-application volume control with global hotkeys.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "knob", about, version)]
pub struct Cli {
    /// Configuration file (default: config.toml next to the executable)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging regardless of the configuration
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let cli = Cli::parse_from(["knob", "--config", "C:/knob/config.toml", "--debug"]);
        assert_eq!(cli.config, Some(PathBuf::from("C:/knob/config.toml")));
        assert!(cli.debug);

        let cli = Cli::parse_from(["knob"]);
        assert_eq!(cli.config, None);
        assert!(!cli.debug);
    }
}
