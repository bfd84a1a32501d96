use clap::Parser;
use config::{Config, RestartMode};
use std::path::PathBuf;

/// Command line interface for needrestart-rs.
#[derive(Debug, Parser, Clone)]
#[command(about, long_about, version)]
pub struct Cli {
    /// Path to a configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to a directory containing additional TOML config files.
    #[arg(long, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Emit the machine-parsable batch report instead of the human list.
    #[arg(short, long)]
    pub batch: bool,

    /// Override the configured restart mode (list|interactive|automatic).
    #[arg(short = 'r', long, value_name = "MODE")]
    pub restart_mode: Option<String>,

    /// Skip the interpreter prober pass.
    #[arg(long)]
    pub no_interpscan: bool,

    /// Skip the kernel image scan.
    #[arg(long)]
    pub no_kernelhints: bool,

    /// Directory to scan for kernel images.
    #[arg(long, value_name = "DIR")]
    pub boot_dir: Option<PathBuf>,

    /// Directory holding package-manager hook scripts.
    #[arg(long, value_name = "DIR")]
    pub hook_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Resolve configuration paths in layering order (earlier overridden
    /// by later). An explicit `-c` pins that file; otherwise the system
    /// config, its `config.d`, and the user config are layered. An
    /// explicit `--config-dir` always layers last.
    pub fn resolve_config_paths(&self) -> Result<Vec<PathBuf>, std::io::Error> {
        let mut paths = Vec::new();

        if let Some(config) = &self.config {
            if !config.is_file() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("config file not found: {}", config.display()),
                ));
            }
            paths.push(config.clone());
            self.layer_extra_dir(&mut paths)?;
            return Ok(paths);
        }

        let system = PathBuf::from("/etc/needrestart-rs/config.toml");
        if system.exists() {
            paths.push(system);
        }

        if let Ok(entries) = glob::glob("/etc/needrestart-rs/config.d/*.toml") {
            let mut extra: Vec<PathBuf> = entries.filter_map(Result::ok).collect();
            extra.sort();
            paths.extend(extra);
        }

        if let Some(path) = user_config_path()
            && path.exists()
        {
            paths.push(path);
        }

        self.layer_extra_dir(&mut paths)?;
        Ok(paths)
    }

    /// Append the `--config-dir` TOML files, sorted by name. The flag was
    /// given explicitly, so a directory that cannot be listed is an error
    /// rather than an empty layer.
    fn layer_extra_dir(&self, paths: &mut Vec<PathBuf>) -> Result<(), std::io::Error> {
        let Some(dir) = &self.config_dir else {
            return Ok(());
        };
        if !dir.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("not a usable config directory: {}", dir.display()),
            ));
        }

        let mut found: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        found.sort();
        paths.append(&mut found);
        Ok(())
    }

    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) -> Result<(), std::io::Error> {
        if self.no_interpscan {
            config.scan.interpscan = false;
        }
        if self.no_kernelhints {
            config.scan.kernelhints = false;
        }
        if let Some(dir) = &self.boot_dir {
            config.scan.boot_dir = dir.clone();
        }
        if let Some(dir) = &self.hook_dir {
            config.scan.hook_dir = dir.clone();
        }
        if let Some(mode) = &self.restart_mode {
            config.ui.restart_mode = match mode.as_str() {
                "list" => RestartMode::List,
                "interactive" => RestartMode::Interactive,
                "automatic" => RestartMode::Automatic,
                other => {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("invalid restart mode: {other}"),
                    ));
                }
            };
        }
        Ok(())
    }
}

fn user_config_path() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg).join("needrestart-rs/config.toml"));
    }
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(".config/needrestart-rs/config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_flags() {
        let cli = Cli::parse_from([
            "needrestart-rs",
            "-b",
            "-r",
            "automatic",
            "--no-kernelhints",
            "-vv",
        ]);
        assert!(cli.batch);
        assert_eq!(cli.restart_mode.as_deref(), Some("automatic"));
        assert!(cli.no_kernelhints);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn overrides_apply_to_config() {
        let cli = Cli::parse_from(["needrestart-rs", "--no-interpscan", "-r", "interactive"]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config).unwrap();
        assert!(!config.scan.interpscan);
        assert_eq!(config.ui.restart_mode, RestartMode::Interactive);
    }

    #[test]
    fn invalid_restart_mode_is_fatal() {
        let cli = Cli::parse_from(["needrestart-rs", "-r", "reboot"]);
        let mut config = Config::default();
        assert!(cli.apply_overrides(&mut config).is_err());
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let cli = Cli::parse_from(["needrestart-rs", "-c", "/nonexistent/needrestart.toml"]);
        assert!(cli.resolve_config_paths().is_err());
    }

    #[test]
    fn explicit_config_dir_layers_sorted_toml() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("main.toml");
        std::fs::write(&conf, "").unwrap();
        let extra = dir.path().join("conf.d");
        std::fs::create_dir(&extra).unwrap();
        std::fs::write(extra.join("b.toml"), "").unwrap();
        std::fs::write(extra.join("a.toml"), "").unwrap();
        std::fs::write(extra.join("ignore.txt"), "").unwrap();

        let cli = Cli::parse_from([
            "needrestart-rs",
            "-c",
            conf.to_str().unwrap(),
            "--config-dir",
            extra.to_str().unwrap(),
        ]);
        let paths = cli.resolve_config_paths().unwrap();
        assert_eq!(
            paths,
            vec![conf, extra.join("a.toml"), extra.join("b.toml")]
        );
    }

    #[test]
    fn missing_config_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("main.toml");
        std::fs::write(&conf, "").unwrap();

        let cli = Cli::parse_from([
            "needrestart-rs",
            "-c",
            conf.to_str().unwrap(),
            "--config-dir",
            dir.path().join("nope").to_str().unwrap(),
        ]);
        assert!(cli.resolve_config_paths().is_err());
    }
}
