use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration file handler for geoimport
///
/// INI dialect:
///
/// ```ini
/// # prepended to the arguments of `geoimport import`
/// defaults = --workers 8 --batch-size 4096
///
/// [database]
/// path = /var/lib/geoimport/geo.db
/// busy_timeout_ms = 10000
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub defaults: Option<String>,
    pub database_path: Option<PathBuf>,
    pub busy_timeout_ms: Option<u64>,
}

impl ConfigFile {
    /// Find project-level .geoimportrc by walking up directory tree
    pub fn find_project_config() -> Option<PathBuf> {
        let mut current = env::current_dir().ok()?;
        loop {
            let config_path = current.join(".geoimportrc");
            if config_path.exists() {
                return Some(config_path);
            }
            if !current.pop() {
                // Reached filesystem root
                break;
            }
        }
        None
    }

    /// Get list of user config file locations in order of preference
    pub fn get_user_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if cfg!(windows) {
            if let Ok(appdata) = env::var("APPDATA") {
                paths.push(PathBuf::from(appdata).join("geoimport").join("config.ini"));
            }
            if let Ok(userprofile) = env::var("USERPROFILE") {
                paths.push(PathBuf::from(userprofile).join(".geoimportrc"));
            }
        } else {
            // 1. $XDG_CONFIG_HOME/geoimport/config.ini
            // 2. ~/.config/geoimport/config.ini (XDG fallback)
            // 3. ~/.geoimportrc
            let xdg_config = env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    env::var("HOME")
                        .map(|h| PathBuf::from(h).join(".config"))
                        .unwrap_or_else(|_| PathBuf::from(".config"))
                });

            paths.push(xdg_config.join("geoimport").join("config.ini"));

            if let Ok(home) = env::var("HOME") {
                paths.push(PathBuf::from(home).join(".geoimportrc"));
            }
        }

        paths
    }

    /// Load configuration with proper precedence: project > user > defaults
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // User config has the lowest precedence; first existing file wins
        if let Some(path) = Self::get_user_config_paths()
            .into_iter()
            .find(|p| p.exists())
        {
            config = Self::merge_configs(config, Self::load_from_path(&path)?);
        }

        if let Some(project_path) = Self::find_project_config() {
            let project_config = Self::load_from_path(&project_path)?;
            config = Self::merge_configs(config, project_config);
        }

        Ok(config)
    }

    /// Load configuration with optional custom config file path
    pub fn load_with_custom_path(custom_path: Option<&str>) -> Result<Self> {
        match custom_path {
            Some(path) => Self::load_from_path(Path::new(path)),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse_ini_content(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse INI content from string
    fn parse_ini_content(content: &str) -> Result<Self> {
        let mut config = Self::default();
        let mut current_section = String::new();

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                current_section = line[1..line.len() - 1].trim().to_string();
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match (current_section.as_str(), key) {
                ("", "defaults") => config.defaults = Some(value.to_string()),
                ("database", "path") => config.database_path = Some(PathBuf::from(value)),
                ("database", "busy_timeout_ms") => {
                    let millis = value.parse::<u64>().map_err(|_| {
                        anyhow!(
                            "line {}: busy_timeout_ms must be a whole number of milliseconds, got '{}'",
                            line_no + 1,
                            value
                        )
                    })?;
                    config.busy_timeout_ms = Some(millis);
                }
                // Ignore unknown keys and sections
                _ => {}
            }
        }

        Ok(config)
    }

    /// Merge two configuration objects, with the second taking precedence
    fn merge_configs(base: Self, overlay: Self) -> Self {
        Self {
            defaults: overlay.defaults.or(base.defaults),
            database_path: overlay.database_path.or(base.database_path),
            busy_timeout_ms: overlay.busy_timeout_ms.or(base.busy_timeout_ms),
        }
    }

    /// Insert the configured defaults right after the `import` subcommand so
    /// explicit arguments, which come later, override them.
    pub fn process_args(&self, args: Vec<String>) -> Result<Vec<String>> {
        let Some(defaults) = &self.defaults else {
            return Ok(args);
        };
        let Some(position) = subcommand_position(&args) else {
            return Ok(args);
        };
        if args[position] != "import" {
            return Ok(args);
        }
        let insert_at = position + 1;

        let default_args = shell_words::split(defaults)
            .with_context(|| "Invalid defaults: failed to parse arguments".to_string())?;

        let mut result = Vec::with_capacity(args.len() + default_args.len());
        result.extend_from_slice(&args[..insert_at]);
        result.extend(default_args);
        result.extend_from_slice(&args[insert_at..]);
        Ok(result)
    }
}

/// Index of the subcommand token: the first argument after the program name
/// that is neither a global flag nor the value of `--config-file`.
fn subcommand_position(args: &[String]) -> Option<usize> {
    let mut index = 1;
    while index < args.len() {
        let arg = args[index].as_str();
        if arg == "--config-file" {
            index += 2;
        } else if arg == "--" {
            return None;
        } else if arg.starts_with('-') {
            index += 1;
        } else {
            return Some(index);
        }
    }
    None
}
