use markdown_relay_engine::{ParserFlags, RendererFlags};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// Option flags for parsing and rendering, as stored on disk.
///
/// ```toml
/// [parser]
/// flags = 0x0100
/// strikethrough = true
///
/// [renderer]
/// xhtml = true
/// ```
///
/// The named booleans are OR-ed onto the raw `flags` integer, so a file can
/// use either form or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub parser: ParserSection,
    pub renderer: RendererSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserSection {
    /// Raw bitmask. Bits the engine does not know are kept.
    pub flags: u32,
    pub collapse_whitespace: bool,
    pub permissive_atx_headers: bool,
    pub permissive_url_autolinks: bool,
    pub permissive_email_autolinks: bool,
    pub no_indented_code_blocks: bool,
    pub no_html_blocks: bool,
    pub no_html_spans: bool,
    pub tables: bool,
    pub strikethrough: bool,
    pub permissive_www_autolinks: bool,
    pub tasklists: bool,
    pub latex_math_spans: bool,
    pub wikilinks: bool,
    pub underline: bool,
    pub permissive_autolinks: bool,
    pub no_html: bool,
    pub dialect_github: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSection {
    pub flags: u32,
    pub debug: bool,
    pub verbatim_entities: bool,
    pub skip_utf8_bom: bool,
    pub xhtml: bool,
}

impl ParserSection {
    pub fn flags(&self) -> ParserFlags {
        let named = [
            (self.collapse_whitespace, ParserFlags::COLLAPSE_WHITESPACE),
            (self.permissive_atx_headers, ParserFlags::PERMISSIVE_ATX_HEADERS),
            (self.permissive_url_autolinks, ParserFlags::PERMISSIVE_URL_AUTOLINKS),
            (self.permissive_email_autolinks, ParserFlags::PERMISSIVE_EMAIL_AUTOLINKS),
            (self.no_indented_code_blocks, ParserFlags::NO_INDENTED_CODE_BLOCKS),
            (self.no_html_blocks, ParserFlags::NO_HTML_BLOCKS),
            (self.no_html_spans, ParserFlags::NO_HTML_SPANS),
            (self.tables, ParserFlags::TABLES),
            (self.strikethrough, ParserFlags::STRIKETHROUGH),
            (self.permissive_www_autolinks, ParserFlags::PERMISSIVE_WWW_AUTOLINKS),
            (self.tasklists, ParserFlags::TASKLISTS),
            (self.latex_math_spans, ParserFlags::LATEX_MATH_SPANS),
            (self.wikilinks, ParserFlags::WIKILINKS),
            (self.underline, ParserFlags::UNDERLINE),
            (self.permissive_autolinks, ParserFlags::PERMISSIVE_AUTOLINKS),
            (self.no_html, ParserFlags::NO_HTML),
            (self.dialect_github, ParserFlags::DIALECT_GITHUB),
        ];
        named
            .into_iter()
            .filter(|(enabled, _)| *enabled)
            .fold(ParserFlags::from_bits_retain(self.flags), |acc, (_, flag)| {
                acc | flag
            })
    }
}

impl RendererSection {
    pub fn flags(&self) -> RendererFlags {
        let named = [
            (self.debug, RendererFlags::DEBUG),
            (self.verbatim_entities, RendererFlags::VERBATIM_ENTITIES),
            (self.skip_utf8_bom, RendererFlags::SKIP_UTF8_BOM),
            (self.xhtml, RendererFlags::XHTML),
        ];
        named
            .into_iter()
            .filter(|(enabled, _)| *enabled)
            .fold(RendererFlags::from_bits_retain(self.flags), |acc, (_, flag)| {
                acc | flag
            })
    }
}

impl Config {
    pub fn parser_flags(&self) -> ParserFlags {
        self.parser.flags()
    }

    pub fn renderer_flags(&self) -> RendererFlags {
        self.renderer.flags()
    }

    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/markdown-relay");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        assert!(!path_str.starts_with('~'));
        assert!(path_str.ends_with(".config/markdown-relay/config.toml"));
    }

    #[test]
    fn test_empty_config_means_no_flags() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.parser_flags(), ParserFlags::empty());
        assert_eq!(config.renderer_flags(), RendererFlags::empty());
    }

    #[test]
    fn test_booleans_are_ored_onto_raw_flags() {
        let config: Config = toml::from_str(
            r#"
[parser]
flags = 0x0100
strikethrough = true
wikilinks = true

[renderer]
flags = 1
xhtml = true
"#,
        )
        .unwrap();

        assert_eq!(
            config.parser_flags(),
            ParserFlags::TABLES | ParserFlags::STRIKETHROUGH | ParserFlags::WIKILINKS
        );
        assert_eq!(
            config.renderer_flags(),
            RendererFlags::DEBUG | RendererFlags::XHTML
        );
    }

    #[rstest]
    #[case("dialect_github = true", ParserFlags::DIALECT_GITHUB)]
    #[case("no_html = true", ParserFlags::NO_HTML_BLOCKS | ParserFlags::NO_HTML_SPANS)]
    #[case(
        "permissive_autolinks = true",
        ParserFlags::PERMISSIVE_URL_AUTOLINKS
            | ParserFlags::PERMISSIVE_EMAIL_AUTOLINKS
            | ParserFlags::PERMISSIVE_WWW_AUTOLINKS
    )]
    #[case("underline = true\ncollapse_whitespace = true", ParserFlags::UNDERLINE | ParserFlags::COLLAPSE_WHITESPACE)]
    fn test_composite_parser_keywords(#[case] body: &str, #[case] expected: ParserFlags) {
        let config: Config = toml::from_str(&format!("[parser]\n{body}\n")).unwrap();
        assert_eq!(config.parser_flags(), expected);
    }

    #[test]
    fn test_unknown_bits_are_retained() {
        let config: Config = toml::from_str("[parser]\nflags = 0x80000000\n").unwrap();
        assert_eq!(config.parser_flags().bits(), 0x8000_0000);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let non_existent_config = temp_dir.path().join("nonexistent.toml");

        let result = Config::load_from_path(&non_existent_config).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("nested/config.toml");
        let mut test_config = Config::default();
        test_config.parser.tables = true;
        test_config.parser.flags = ParserFlags::TASKLISTS.bits();
        test_config.renderer.skip_utf8_bom = true;

        test_config.save_to_path(&config_file).unwrap();
        let loaded_config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded_config, test_config);
        assert_eq!(
            loaded_config.parser_flags(),
            ParserFlags::TABLES | ParserFlags::TASKLISTS
        );
    }

    #[test]
    fn test_invalid_toml_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "[parser]\ntables = \"yes\"\n").unwrap();

        let err = Config::load_from_path(&config_file).unwrap_err();

        match err {
            ConfigError::ConfigParseError { config_path, .. } => {
                assert_eq!(config_path, config_file)
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
