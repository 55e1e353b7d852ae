//! Display preferences for the REPL and batch tools. The kernel's own
//! operational settings (locking, capacity, snapshots, logging) live in
//! `keyquarry::config::Configuration`, loaded from the same config file;
//! this struct is just the CLI chrome layered on top, in the same
//! `Option<T>`-field-plus-accessor shape as the teacher's `ConfigLoad`
//! (`kv-cli/src/server/config.rs`).

use std::path::Path;

use anyhow::anyhow;
use keyquarry::config::Configuration;
use serde_derive::{Deserialize, Serialize};

pub const DEFAULT_PROMPT: &str = "keyquarry";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigLoad {
    /// Prompt text shown in the REPL.
    pub prompt: Option<String>,

    /// Show stats after executing queries. Only works with non-interactive mode.
    pub show_stats: Option<bool>,

    /// Show "N keys affected" after each mutating command.
    show_affected: Option<bool>,

    /// Fix up a partial command, default false.
    auto_append_part_cmd: Option<bool>,
    /// Statement terminator used when `auto_append_part_cmd` is set.
    auto_append_part_cmd_symbol: Option<char>,

    /// Multi line mode, default true.
    pub multi_line: Option<bool>,

    /// Whether to replace literal `\n` with an actual newline, default true.
    pub replace_newline: Option<bool>,

    /// The kernel configuration, loaded from the same file. Not part of
    /// the CLI's own on-disk shape, so it's not (de)serialized with the
    /// rest of this struct.
    #[serde(skip)]
    pub kernel: Configuration,
}

impl Default for ConfigLoad {
    fn default() -> Self {
        ConfigLoad {
            prompt: Some(DEFAULT_PROMPT.to_string()),
            show_stats: Some(false),
            show_affected: Some(false),
            auto_append_part_cmd: Some(false),
            auto_append_part_cmd_symbol: Some(';'),
            multi_line: Some(true),
            replace_newline: Some(true),
            kernel: Configuration::default(),
        }
    }
}

impl ConfigLoad {
    /// Loads the kernel configuration from `path` (if it exists) and
    /// layers environment overrides onto it, the same way a standalone
    /// `keyquarryd` process would.
    pub fn new(path: &str) -> anyhow::Result<Self> {
        let mut settings = ConfigLoad::default();
        if Path::new(path).exists() {
            settings.kernel =
                Configuration::from_file(Path::new(path)).map_err(|e| anyhow!(e.to_string()))?;
        }
        settings.kernel.apply_env_overrides();
        Ok(settings)
    }

    pub fn is_show_affected(&self) -> bool {
        self.show_affected.unwrap_or(false)
    }

    /// Fix part cmd options. Default false.
    pub fn get_auto_append_part_cmd(&self) -> bool {
        self.auto_append_part_cmd.unwrap_or(false)
    }

    /// Statement-terminator symbol.
    pub fn get_auto_append_part_cmd_symbol(&self) -> char {
        self.auto_append_part_cmd_symbol.unwrap_or(';')
    }

    /// Change one setting at runtime via the REPL's `.cmd_name cmd_value`
    /// control syntax.
    pub fn inject_cmd(&mut self, cmd_name: &str, cmd_value: &str) -> anyhow::Result<()> {
        match cmd_name {
            "show_affected" => self.show_affected = Some(cmd_value.parse()?),
            "show_stats" => self.show_stats = Some(cmd_value.parse()?),
            "auto_append_part_cmd" => self.auto_append_part_cmd = Some(cmd_value.parse()?),
            "auto_append_part_cmd_symbol" => {
                self.auto_append_part_cmd_symbol = Some(cmd_value.parse()?)
            }
            "multi_line" => self.multi_line = Some(cmd_value.parse()?),
            "replace_newline" => self.replace_newline = Some(cmd_value.parse()?),
            _ => return Err(anyhow!("Unknown command: {}", cmd_name)),
        }
        Ok(())
    }

    pub fn terminal_update(&mut self) {
        self.show_stats = Some(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_interactive_friendly() {
        let cfg = ConfigLoad::default();
        assert_eq!(cfg.prompt.as_deref(), Some(DEFAULT_PROMPT));
        assert!(!cfg.is_show_affected());
        assert!(!cfg.kernel.is_readonly());
    }

    #[test]
    fn inject_cmd_updates_show_affected() {
        let mut cfg = ConfigLoad::default();
        cfg.inject_cmd("show_affected", "true").unwrap();
        assert!(cfg.is_show_affected());
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let cfg = ConfigLoad::new("/no/such/path.conf").unwrap();
        assert_eq!(cfg.kernel.max_keys(), 0);
    }
}
