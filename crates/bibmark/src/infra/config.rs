//! Configuration management utilities.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::cite::FootnoteFormat;

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = "bibmark.toml";
static MKDOCS_CONFIG: &str = "mkdocs.yml";
static MKDOCS_PLUGIN_NAME: &str = "bibtex";

/// Layered configuration loaded from defaults, user, workspace, mkdocs.yml, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub bibtex: Bibtex,
    #[serde(default)]
    pub docs: Docs,
}

/// Options of the citation processor. Same keys as the MkDocs plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Bibtex {
    #[serde(default)]
    pub bib_file: Option<PathBuf>,
    #[serde(default)]
    pub bib_dir: Option<PathBuf>,
    #[serde(default)]
    bib_command: Option<String>,
    #[serde(default)]
    full_bib_command: Option<String>,
    #[serde(default)]
    pub csl_file: Option<PathBuf>,
    #[serde(default)]
    pub entry_template: Option<PathBuf>,
    #[serde(default)]
    footnote_format: Option<String>,
    #[serde(default)]
    bib_by_default: Option<bool>,
    #[serde(default)]
    strict: Option<bool>,
}

impl Bibtex {
    fn default_bib_command() -> &'static str {
        "\\bibliography"
    }

    fn default_full_bib_command() -> &'static str {
        "\\full_bibliography"
    }

    fn default_footnote_format() -> &'static str {
        "{number}"
    }

    pub fn bib_command(&self) -> &str {
        self.bib_command
            .as_deref()
            .unwrap_or(Self::default_bib_command())
    }

    pub fn full_bib_command(&self) -> &str {
        self.full_bib_command
            .as_deref()
            .unwrap_or(Self::default_full_bib_command())
    }

    pub fn footnote_format(&self) -> &str {
        self.footnote_format
            .as_deref()
            .unwrap_or(Self::default_footnote_format())
    }

    pub fn bib_by_default(&self) -> bool {
        self.bib_by_default.unwrap_or(false)
    }

    pub fn strict(&self) -> bool {
        self.strict.unwrap_or(false)
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.strict = Some(strict);
    }

    pub fn set_bib_by_default(&mut self, enabled: bool) {
        self.bib_by_default = Some(enabled);
    }

    pub fn set_footnote_format(&mut self, format: impl Into<String>) {
        self.footnote_format = Some(format.into());
    }

    /// Check referenced files exist and the footnote format is usable.
    pub fn validate(&self) -> Result<()> {
        if let Some(file) = &self.bib_file
            && !file.is_file()
        {
            bail!("bib_file does not exist: {}", file.display());
        }
        if let Some(dir) = &self.bib_dir
            && !dir.is_dir()
        {
            bail!("bib_dir does not exist: {}", dir.display());
        }
        if let Some(csl) = &self.csl_file
            && !csl.is_file()
        {
            bail!("csl_file does not exist: {}", csl.display());
        }
        if let Some(template) = &self.entry_template
            && !template.is_file()
        {
            bail!("entry_template does not exist: {}", template.display());
        }
        FootnoteFormat::new(self.footnote_format())?;
        Ok(())
    }
}

/// Where pages are read from and written to by `build`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Docs {
    #[serde(default)]
    dir: Option<PathBuf>,
    #[serde(default)]
    out_dir: Option<PathBuf>,
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl Docs {
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| PathBuf::from("docs"))
    }

    pub fn out_dir(&self) -> PathBuf {
        self.out_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("site-md"))
    }

    pub fn set_dir(&mut self, dir: impl Into<PathBuf>) {
        self.dir = Some(dir.into());
    }

    pub fn set_out_dir(&mut self, dir: impl Into<PathBuf>) {
        self.out_dir = Some(dir.into());
    }
}

/// Environment overrides for bibliography sources.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    bib_file: Option<PathBuf>,
    bib_dir: Option<PathBuf>,
    csl_file: Option<PathBuf>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            bib_file: env::var_os("BIBMARK_BIB_FILE").map(PathBuf::from),
            bib_dir: env::var_os("BIBMARK_BIB_DIR").map(PathBuf::from),
            csl_file: env::var_os("BIBMARK_CSL_FILE").map(PathBuf::from),
        }
    }

    #[cfg(test)]
    fn for_tests(bib_file: &str) -> Self {
        Self {
            bib_file: Some(PathBuf::from(bib_file)),
            ..Self::default()
        }
    }
}

/// Files consulted while loading, in increasing precedence.
#[derive(Debug, Default, Clone)]
pub struct ConfigSources {
    pub global: Option<PathBuf>,
    pub workspace: Option<PathBuf>,
    pub mkdocs: Option<PathBuf>,
}

impl Config {
    /// Load configuration from defaults, global config, workspace config, mkdocs.yml, and env.
    ///
    /// An explicit path replaces discovery: `.yml`/`.yaml` files are read as
    /// MkDocs configs, anything else as TOML.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env = EnvOverrides::from_env();
        let sources = match explicit {
            Some(path) if is_yaml(path) => ConfigSources {
                global: global_config_path(),
                workspace: None,
                mkdocs: Some(path.to_path_buf()),
            },
            Some(path) => {
                if !path.exists() {
                    bail!("config file not found: {}", path.display());
                }
                ConfigSources {
                    global: global_config_path(),
                    workspace: Some(path.to_path_buf()),
                    mkdocs: None,
                }
            }
            None => discover_sources()?,
        };
        Self::load_with_layers(sources, env)
    }

    fn load_with_layers(sources: ConfigSources, env_overrides: EnvOverrides) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = sources.global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = sources.workspace.filter(|path| path.exists()) {
            layers.push(Self::from_file(&workspace_path)?);
        }

        if let Some(mkdocs_path) = sources.mkdocs.filter(|path| path.exists()) {
            layers.push(Self::from_mkdocs(&mkdocs_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    /// Read a TOML layer; relative paths resolve against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config = Self::from_str(&data)
            .with_context(|| format!("invalid config file: {}", path.display()))?;
        Ok(config.resolved_against(parent_dir(path)))
    }

    /// Read the `bibtex` plugin options and `docs_dir` from an MkDocs config.
    pub fn from_mkdocs(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read mkdocs config: {}", path.display()))?;
        let document: serde_yaml::Value = serde_yaml::from_str(&data)
            .with_context(|| format!("failed to parse YAML in {}", path.display()))?;

        let mut config = Config::default();
        if let Some(docs_dir) = document.get("docs_dir").and_then(|value| value.as_str()) {
            config.docs.dir = Some(PathBuf::from(docs_dir));
        }

        let plugins = document
            .get("plugins")
            .and_then(|value| value.as_sequence())
            .cloned()
            .unwrap_or_default();
        for plugin in plugins {
            if let Some(options) = plugin.get(MKDOCS_PLUGIN_NAME) {
                config.bibtex = serde_yaml::from_value(options.clone()).with_context(|| {
                    format!("invalid bibtex plugin options in {}", path.display())
                })?;
            }
        }
        Ok(config.resolved_against(parent_dir(path)))
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn resolved_against(mut self, base: &Path) -> Self {
        let resolve = |path: &mut Option<PathBuf>| {
            if let Some(inner) = path.as_mut()
                && inner.is_relative()
            {
                *inner = base.join(&*inner);
            }
        };
        resolve(&mut self.bibtex.bib_file);
        resolve(&mut self.bibtex.bib_dir);
        resolve(&mut self.bibtex.csl_file);
        resolve(&mut self.bibtex.entry_template);
        resolve(&mut self.docs.dir);
        resolve(&mut self.docs.out_dir);
        self
    }

    fn merge(self, other: Self) -> Self {
        Self {
            bibtex: merge_bibtex(self.bibtex, other.bibtex),
            docs: merge_docs(self.docs, other.docs),
        }
    }
}

fn merge_bibtex(mut base: Bibtex, overlay: Bibtex) -> Bibtex {
    // A file or directory from a later layer replaces both sources below it.
    if overlay.bib_file.is_some() || overlay.bib_dir.is_some() {
        base.bib_file = overlay.bib_file;
        base.bib_dir = overlay.bib_dir;
    }
    if let Some(value) = overlay.bib_command {
        base.bib_command = Some(value);
    }
    if let Some(value) = overlay.full_bib_command {
        base.full_bib_command = Some(value);
    }
    if let Some(value) = overlay.csl_file {
        base.csl_file = Some(value);
    }
    if let Some(value) = overlay.entry_template {
        base.entry_template = Some(value);
    }
    if let Some(value) = overlay.footnote_format {
        base.footnote_format = Some(value);
    }
    if let Some(value) = overlay.bib_by_default {
        base.bib_by_default = Some(value);
    }
    if let Some(value) = overlay.strict {
        base.strict = Some(value);
    }
    base
}

fn merge_docs(base: Docs, overlay: Docs) -> Docs {
    let mut ignore: BTreeSet<String> = base.ignore.into_iter().collect();
    ignore.extend(overlay.ignore);

    Docs {
        dir: overlay.dir.or(base.dir),
        out_dir: overlay.out_dir.or(base.out_dir),
        ignore: ignore.into_iter().collect(),
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext, "yml" | "yaml"))
}

fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("bibmark/config.toml"))
}

fn discover_sources() -> Result<ConfigSources> {
    let cwd = env::current_dir()?;
    let root = find_repo_root(&cwd).unwrap_or_else(|| cwd.clone());
    let mkdocs = [cwd.join(MKDOCS_CONFIG), root.join(MKDOCS_CONFIG)]
        .into_iter()
        .find(|path| path.exists());
    Ok(ConfigSources {
        global: global_config_path(),
        workspace: Some(root.join(DEFAULT_WORKSPACE_CONFIG_PATH)),
        mkdocs,
    })
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return Some(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if env.bib_file.is_some() || env.bib_dir.is_some() {
        config.bibtex.bib_file = env.bib_file;
        config.bibtex.bib_dir = env.bib_dir;
    }
    if let Some(csl_file) = env.csl_file {
        config.bibtex.csl_file = Some(csl_file);
    }
    config
}
