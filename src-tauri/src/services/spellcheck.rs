//! Spell-check language selection.

use std::path::PathBuf;

/// Something that can switch spell-check languages.
pub trait SpellCheckProvider {
    /// Applies `languages` and returns the subset that took effect.
    fn set_languages(&mut self, languages: &[String]) -> Vec<String>;
}

/// Applies the requested languages, falling back to `system_locales` when
/// none of them could be applied.
pub fn apply_languages<P: SpellCheckProvider + ?Sized>(
    provider: &mut P,
    requested: &[String],
    system_locales: &[String],
) -> Vec<String> {
    let applied = provider.set_languages(requested);
    if !applied.is_empty() {
        log::info!("Spell checker languages: {}", applied.join(", "));
        return applied;
    }

    let mut fallback: Vec<String> = Vec::with_capacity(system_locales.len());
    for locale in system_locales {
        if !fallback.contains(locale) {
            fallback.push(locale.clone());
        }
    }

    log::debug!(
        "No requested spell checker language available, falling back to {}",
        fallback.join(", ")
    );
    provider.set_languages(&fallback)
}

/// Lookup of installed Hunspell dictionaries.
///
/// Reports which requested languages have a dictionary on disk so the
/// fallback to system locales can kick in. It does not switch the webview's
/// own spell checker, which follows the system configuration.
#[derive(Debug, Clone)]
pub struct HunspellDictionaries {
    search_dirs: Vec<PathBuf>,
}

impl Default for HunspellDictionaries {
    fn default() -> Self {
        Self::new(vec![
            PathBuf::from("/usr/share/hunspell"),
            PathBuf::from("/usr/share/myspell"),
            PathBuf::from("/usr/share/myspell/dicts"),
        ])
    }
}

impl HunspellDictionaries {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }

    /// `en-US` is stored as `en_US.dic`.
    fn is_installed(&self, language: &str) -> bool {
        let file_name = format!("{}.dic", language.replace('-', "_"));
        self.search_dirs
            .iter()
            .any(|dir| dir.join(&file_name).is_file())
    }
}

impl SpellCheckProvider for HunspellDictionaries {
    fn set_languages(&mut self, languages: &[String]) -> Vec<String> {
        let (available, missing): (Vec<String>, Vec<String>) = languages
            .iter()
            .cloned()
            .partition(|language| self.is_installed(language));

        if !missing.is_empty() {
            log::warn!("No dictionary for: {}", missing.join(", "));
        }

        available
    }
}
