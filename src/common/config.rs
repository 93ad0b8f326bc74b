use std::path::Path;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Hard bound on the number of workspaces the desktop will create.
pub const MAX_WORKSPACES: usize = 9;

fn default_workspace_count() -> usize { MAX_WORKSPACES }
fn default_inner_gap() -> i32 { 5 }
fn default_outer_gap() -> i32 { 10 }

/// Layout policy new views are assigned to by default. Maximized and
/// fullscreen are per-view toggles, never a workspace default.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    #[default]
    Floating,
    Tiling,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct DesktopSettings {
    #[serde(default)]
    pub workspaces: WorkspaceSettings,
    /// Gap configuration applied to every output until overridden per output.
    #[serde(default)]
    pub gaps: GapSettings,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceSettings {
    #[serde(default = "default_workspace_count")]
    pub count: usize,
    /// Default layout for workspaces not covered by `layouts`.
    #[serde(default)]
    pub default_layout: LayoutMode,
    /// Per-workspace layout overrides, index-based.
    #[serde(default)]
    pub layouts: Vec<LayoutMode>,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            count: default_workspace_count(),
            default_layout: LayoutMode::default(),
            layouts: Vec::new(),
        }
    }
}

impl WorkspaceSettings {
    pub fn layout_for(&self, index: usize) -> LayoutMode {
        self.layouts.get(index).copied().unwrap_or(self.default_layout)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.count == 0 {
            issues.push("workspaces.count must be at least 1".to_string());
        }
        if self.count > MAX_WORKSPACES {
            issues.push(format!("workspaces.count must not exceed {}", MAX_WORKSPACES));
        }
        if self.layouts.len() > self.count {
            issues.push(format!(
                "{} layout overrides provided but only {} workspaces configured",
                self.layouts.len(),
                self.count
            ));
        }

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;

        if self.count == 0 {
            self.count = 1;
            fixes += 1;
        }
        if self.count > MAX_WORKSPACES {
            self.count = MAX_WORKSPACES;
            fixes += 1;
        }
        if self.layouts.len() > self.count {
            self.layouts.truncate(self.count);
            fixes += 1;
        }

        fixes
    }
}

/// Gap configuration for tiled window spacing, in pixels.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
#[serde(deny_unknown_fields)]
pub struct GapSettings {
    /// Gap reserved on view edges facing a sibling view.
    #[serde(default = "default_inner_gap")]
    pub inner: i32,
    /// Gap reserved on view edges facing the edge of the tiled area.
    #[serde(default = "default_outer_gap")]
    pub outer: i32,
}

impl Default for GapSettings {
    fn default() -> Self {
        Self {
            inner: default_inner_gap(),
            outer: default_outer_gap(),
        }
    }
}

impl GapSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.inner < 0 {
            issues.push(format!("gaps.inner must be non-negative, got {}", self.inner));
        }
        if self.outer < 0 {
            issues.push(format!("gaps.outer must be non-negative, got {}", self.outer));
        }

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;

        if self.inner < 0 {
            self.inner = default_inner_gap();
            fixes += 1;
        }
        if self.outer < 0 {
            self.outer = default_outer_gap();
            fixes += 1;
        }

        fixes
    }
}

impl DesktopSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        issues.extend(self.workspaces.validate());
        issues.extend(self.gaps.validate());

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        self.workspaces.auto_fix_values() + self.gaps.auto_fix_values()
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let mut settings: DesktopSettings =
            toml::from_str(raw).context("failed to parse desktop settings")?;
        let fixed = settings.auto_fix_values();
        if fixed > 0 {
            warn!("auto-fixed {fixed} invalid settings value(s)");
        }
        let issues = settings.validate();
        if !issues.is_empty() {
            bail!("invalid desktop settings: {}", issues.join("; "));
        }
        Ok(settings)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = DesktopSettings::default();
        assert!(settings.validate().is_empty());
        assert_eq!(settings.workspaces.count, MAX_WORKSPACES);
    }

    #[test]
    fn parses_partial_config() {
        let settings = DesktopSettings::from_toml(
            r#"
            [workspaces]
            count = 4
            default_layout = "tiling"
            layouts = ["floating", "tiling"]

            [gaps]
            inner = 2
            outer = 0
            "#,
        )
        .unwrap();

        assert_eq!(settings.workspaces.count, 4);
        assert_eq!(settings.workspaces.layout_for(0), LayoutMode::Floating);
        assert_eq!(settings.workspaces.layout_for(1), LayoutMode::Tiling);
        // Past the override list, the default applies.
        assert_eq!(settings.workspaces.layout_for(3), LayoutMode::Tiling);
        assert_eq!(settings.gaps.inner, 2);
        assert_eq!(settings.gaps.outer, 0);
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(DesktopSettings::from_toml("[workspaces]\nbogus = 1\n").is_err());
    }

    #[test]
    fn auto_fix_clamps_workspace_count() {
        let mut settings = DesktopSettings::default();
        settings.workspaces.count = 50;
        assert_eq!(settings.auto_fix_values(), 1);
        assert_eq!(settings.workspaces.count, MAX_WORKSPACES);
    }

    #[test]
    fn auto_fix_restores_negative_gaps() {
        let mut settings = DesktopSettings::default();
        settings.gaps.inner = -3;
        settings.gaps.outer = -1;
        assert_eq!(settings.auto_fix_values(), 2);
        assert!(settings.validate().is_empty());
    }

    #[test]
    fn load_reads_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[gaps]\ninner = 7\nouter = 3\n").unwrap();
        let settings = DesktopSettings::load(file.path()).unwrap();
        assert_eq!(settings.gaps.inner, 7);
        assert_eq!(settings.gaps.outer, 3);
    }
}
