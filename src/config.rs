//! Layered key/value configuration.
//!
//! Settings come from a fixed list of candidate files, later files
//! overriding earlier ones key by key, on top of built-in defaults. Values
//! may reference other keys with `%(name)s`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{NotesError, Result};

pub const SECTION: &str = "nvnotes";
pub const CONFIG_ENV: &str = "NVNOTES_CONFIG";
const MAX_INTERPOLATION_DEPTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Gstyle,
    Regexp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    Alphabetical,
    LastModified,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app_dir: PathBuf,
    pub home: PathBuf,
    /// Files that were found and parsed, in read order.
    pub files_read: Vec<PathBuf>,
    /// False when files were read but none had an `[nvnotes]` section.
    pub ok: bool,

    pub sn_username: String,
    pub sn_password: String,
    pub simplenote_sync: bool,
    pub db_path: PathBuf,
    pub notes_as_txt: bool,
    pub txt_path: PathBuf,
    pub search_mode: SearchMode,
    pub case_sensitive: bool,
    pub search_tags: bool,
    pub sort_mode: SortMode,
    pub pinned_ontop: bool,
    pub housekeeping_interval: u64,

    pub font_family: String,
    pub font_size: u32,
    pub list_font_family: String,
    pub list_font_family_fixed: String,
    pub list_font_size: u32,
    pub layout: String,
    pub print_columns: u32,
    pub background_color: String,
    pub rest_css_path: Option<PathBuf>,
}

/// A user-facing message produced while loading the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub title: String,
    pub message: String,
}

impl Config {
    /// Load from the standard candidate paths under `home`, plus
    /// `$NVNOTES_CONFIG` when set.
    pub fn load(app_dir: &Path, home: &Path) -> Result<Self> {
        let mut candidates = candidate_paths(app_dir, home);
        if let Ok(extra) = std::env::var(CONFIG_ENV) {
            candidates.push(PathBuf::from(extra));
        }
        Self::load_from(app_dir, home, &candidates)
    }

    pub fn load_from(
        app_dir: &Path,
        home: &Path,
        candidates: &[PathBuf],
    ) -> Result<Self> {
        let mut ini = IniFile::default();
        let mut files_read = Vec::new();
        for path in candidates {
            // Unreadable candidates are skipped, same as missing ones.
            if let Ok(raw) = fs::read_to_string(path) {
                ini.merge(&raw);
                files_read.push(path.clone());
            }
        }
        tracing::debug!(files = ?files_read, "config read");

        let ok = ini.sections.contains_key(SECTION);
        let values = Values::new(defaults(app_dir, home), ini.section(SECTION));

        let sn_username = values.raw("sn_username");
        let simplenote_sync =
            values.get_flag("simplenote_sync")? && !sn_username.is_empty();

        let rest_css_path = values
            .get_opt("rest_css_path")?
            .and_then(|css| resolve_css_path(&css, home));

        Ok(Self {
            app_dir: app_dir.to_path_buf(),
            home: home.to_path_buf(),
            files_read,
            ok,
            sn_password: values.raw("sn_password"),
            sn_username,
            simplenote_sync,
            db_path: PathBuf::from(values.get("db_path")?),
            notes_as_txt: values.get_flag("notes_as_txt")?,
            txt_path: home.join(values.get("txt_path")?),
            search_mode: match values.get("search_mode")?.as_str() {
                "regexp" => SearchMode::Regexp,
                _ => SearchMode::Gstyle,
            },
            case_sensitive: values.get_flag("case_sensitive")?,
            search_tags: values.get_flag("search_tags")?,
            sort_mode: if values.get_int("sort_mode")? == 0 {
                SortMode::Alphabetical
            } else {
                SortMode::LastModified
            },
            pinned_ontop: values.get_flag("pinned_ontop")?,
            housekeeping_interval: values.get_int("housekeeping_interval")?.max(0)
                as u64,
            font_family: values.get("font_family")?,
            font_size: values.get_int("font_size")?.max(1) as u32,
            list_font_family: values.get("list_font_family")?,
            list_font_family_fixed: values.get("list_font_family_fixed")?,
            list_font_size: values.get_int("list_font_size")?.max(1) as u32,
            layout: values.get("layout")?,
            print_columns: values.get_int("print_columns")?.max(0) as u32,
            background_color: values.get("background_color")?,
            rest_css_path,
        })
    }

    /// Warnings to show the user before the main loop starts.
    pub fn warnings(&self) -> Vec<ConfigWarning> {
        if self.files_read.is_empty() {
            vec![ConfigWarning {
                title: "No config file".to_string(),
                message: "Could not read any configuration files. Defaults are in use."
                    .to_string(),
            }]
        } else if !self.ok {
            let files: Vec<String> =
                self.files_read.iter().map(|p| p.display().to_string()).collect();
            vec![ConfigWarning {
                title: "Rename config section".to_string(),
                message: format!(
                    "Please rename [default] to [{SECTION}] in {}.",
                    files.join(", ")
                ),
            }]
        } else {
            Vec::new()
        }
    }

    /// `key = value` lines describing the effective settings. Credentials
    /// are masked.
    pub fn describe(&self) -> Vec<(String, String)> {
        let flag = |b: bool| if b { "1" } else { "0" }.to_string();
        vec![
            ("db_path".into(), self.db_path.display().to_string()),
            ("txt_path".into(), self.txt_path.display().to_string()),
            ("notes_as_txt".into(), flag(self.notes_as_txt)),
            ("sn_username".into(), self.sn_username.clone()),
            (
                "sn_password".into(),
                if self.sn_password.is_empty() { "" } else { "********" }.into(),
            ),
            ("simplenote_sync".into(), flag(self.simplenote_sync)),
            (
                "search_mode".into(),
                match self.search_mode {
                    SearchMode::Gstyle => "gstyle",
                    SearchMode::Regexp => "regexp",
                }
                .into(),
            ),
            ("case_sensitive".into(), flag(self.case_sensitive)),
            ("search_tags".into(), flag(self.search_tags)),
            (
                "sort_mode".into(),
                match self.sort_mode {
                    SortMode::Alphabetical => "0",
                    SortMode::LastModified => "1",
                }
                .into(),
            ),
            ("pinned_ontop".into(), flag(self.pinned_ontop)),
            ("housekeeping_interval".into(), self.housekeeping_interval.to_string()),
            ("font_family".into(), self.font_family.clone()),
            ("font_size".into(), self.font_size.to_string()),
            ("list_font_family".into(), self.list_font_family.clone()),
            ("list_font_family_fixed".into(), self.list_font_family_fixed.clone()),
            ("list_font_size".into(), self.list_font_size.to_string()),
            ("layout".into(), self.layout.clone()),
            ("print_columns".into(), self.print_columns.to_string()),
            ("background_color".into(), self.background_color.clone()),
            (
                "rest_css_path".into(),
                self.rest_css_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            ),
        ]
    }
}

pub fn candidate_paths(app_dir: &Path, home: &Path) -> Vec<PathBuf> {
    vec![
        app_dir.join("nvnotes.cfg"),
        home.join("nvnotes.cfg"),
        home.join(".nvnotes.cfg"),
        home.join(".nvnotes"),
        home.join(".nvnotesrc"),
    ]
}

fn defaults(app_dir: &Path, home: &Path) -> BTreeMap<String, String> {
    let app_dir = app_dir.display().to_string();
    let home_s = home.display().to_string();
    let pairs: Vec<(&str, String)> = vec![
        ("app_dir", app_dir.clone()),
        ("appdir", app_dir),
        ("home", home_s),
        ("notes_as_txt", "0".into()),
        ("housekeeping_interval", "2".into()),
        ("search_mode", "gstyle".into()),
        ("case_sensitive", "1".into()),
        ("search_tags", "1".into()),
        ("sort_mode", "1".into()),
        ("pinned_ontop", "1".into()),
        ("db_path", home.join(".nvnotes").display().to_string()),
        ("txt_path", home.join(".nvnotes").join("notes").display().to_string()),
        ("font_family", "Courier".into()),
        ("font_size", "10".into()),
        ("list_font_family", "Helvetica".into()),
        ("list_font_family_fixed", "Courier".into()),
        ("list_font_size", "10".into()),
        ("layout", "horizontal".into()),
        ("print_columns", "0".into()),
        ("background_color", "white".into()),
        ("sn_username", String::new()),
        ("sn_password", String::new()),
        ("simplenote_sync", "1".into()),
        ("rest_css_path", String::new()),
    ];
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn resolve_css_path(css: &str, home: &Path) -> Option<PathBuf> {
    let path = match css.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(css),
    };
    if path.exists() {
        Some(path)
    } else {
        tracing::debug!(css = %path.display(), "stylesheet not found; ignoring");
        None
    }
}

/// Minimal INI reader: `[section]` headers, `key = value` or `key: value`
/// pairs, `#`/`;` comments. Keys are case-insensitive.
#[derive(Debug, Default)]
struct IniFile {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl IniFile {
    fn merge(&mut self, raw: &str) {
        let mut current: Option<String> = None;
        for line in raw.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }
            if let Some(name) =
                trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']'))
            {
                let name = name.trim().to_string();
                self.sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }
            let Some(section) = &current else { continue };
            let split = trimmed.find(['=', ':']);
            if let Some(idx) = split {
                let key = trimmed[..idx].trim().to_lowercase();
                let value = trimmed[idx + 1..].trim().to_string();
                if let Some(map) = self.sections.get_mut(section) {
                    map.insert(key, value);
                }
            }
        }
    }

    fn section(&self, name: &str) -> BTreeMap<String, String> {
        self.sections.get(name).cloned().unwrap_or_default()
    }
}

/// Section values layered over defaults, with `%(name)s` interpolation.
struct Values {
    merged: BTreeMap<String, String>,
}

impl Values {
    fn new(
        defaults: BTreeMap<String, String>,
        section: BTreeMap<String, String>,
    ) -> Self {
        let mut merged = defaults;
        merged.extend(section);
        Self { merged }
    }

    fn raw(&self, key: &str) -> String {
        self.merged.get(key).cloned().unwrap_or_default()
    }

    fn get(&self, key: &str) -> Result<String> {
        self.interpolate(key, &self.raw(key), 0)
    }

    fn get_opt(&self, key: &str) -> Result<Option<String>> {
        let v = self.get(key)?;
        Ok(if v.trim().is_empty() { None } else { Some(v) })
    }

    fn get_int(&self, key: &str) -> Result<i64> {
        let v = self.get(key)?;
        v.trim().parse::<i64>().map_err(|_| {
            NotesError::Config(format!("{key} must be an integer, got '{v}'"))
        })
    }

    fn get_flag(&self, key: &str) -> Result<bool> {
        Ok(self.get_int(key)? != 0)
    }

    fn interpolate(&self, key: &str, value: &str, depth: usize) -> Result<String> {
        if depth > MAX_INTERPOLATION_DEPTH {
            return Err(NotesError::Config(format!(
                "interpolation too deep while expanding {key}"
            )));
        }
        let mut out = String::new();
        let mut rest = value;
        while let Some(pos) = rest.find('%') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            if let Some(tail) = after.strip_prefix('%') {
                out.push('%');
                rest = tail;
            } else if let Some(inner) = after.strip_prefix('(') {
                let end = inner.find(")s").ok_or_else(|| {
                    NotesError::Config(format!("bad interpolation syntax in {key}"))
                })?;
                let name = inner[..end].to_lowercase();
                let referenced = self.merged.get(&name).ok_or_else(|| {
                    NotesError::Config(format!("{key} references unknown key '{name}'"))
                })?;
                out.push_str(&self.interpolate(&name, referenced, depth + 1)?);
                rest = &inner[end + 2..];
            } else {
                return Err(NotesError::Config(format!(
                    "'%' must be followed by '%' or '(' in {key}"
                )));
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}
