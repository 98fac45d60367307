//! Option bitmasks selected when a session is constructed.
//!
//! The bit values are the ones md4c uses, so masks written for other
//! md4c front-ends keep their meaning here. Unknown bits are retained:
//! the engine never interprets a flag itself, it only hands the mask to
//! the tokenizer or the HTML renderer.

use bitflags::bitflags;

bitflags! {
    /// Markdown dialect extensions understood by the tokenizer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ParserFlags: u32 {
        /// Collapse runs of whitespace in normal text into a single space.
        const COLLAPSE_WHITESPACE = 0x0001;
        /// Do not require a space after `#` in ATX headings.
        const PERMISSIVE_ATX_HEADERS = 0x0002;
        /// Recognize bare `https://...` URLs as links.
        const PERMISSIVE_URL_AUTOLINKS = 0x0004;
        /// Recognize bare e-mail addresses as links.
        const PERMISSIVE_EMAIL_AUTOLINKS = 0x0008;
        /// Disable indented code blocks.
        const NO_INDENTED_CODE_BLOCKS = 0x0010;
        /// Treat raw HTML blocks as ordinary text.
        const NO_HTML_BLOCKS = 0x0020;
        /// Treat inline raw HTML as ordinary text.
        const NO_HTML_SPANS = 0x0040;
        /// GFM tables.
        const TABLES = 0x0100;
        /// GFM strikethrough.
        const STRIKETHROUGH = 0x0200;
        /// Recognize bare `www.` hosts as links.
        const PERMISSIVE_WWW_AUTOLINKS = 0x0400;
        /// GFM task lists.
        const TASKLISTS = 0x0800;
        /// `$inline$` and `$$display$$` LaTeX math.
        const LATEX_MATH_SPANS = 0x1000;
        /// `[[wiki links]]`.
        const WIKILINKS = 0x2000;
        /// Underscore delimiters produce underline instead of emphasis.
        const UNDERLINE = 0x4000;

        const PERMISSIVE_AUTOLINKS = Self::PERMISSIVE_URL_AUTOLINKS.bits()
            | Self::PERMISSIVE_EMAIL_AUTOLINKS.bits()
            | Self::PERMISSIVE_WWW_AUTOLINKS.bits();
        const NO_HTML = Self::NO_HTML_BLOCKS.bits() | Self::NO_HTML_SPANS.bits();

        const DIALECT_COMMONMARK = 0;
        const DIALECT_GITHUB = Self::PERMISSIVE_AUTOLINKS.bits()
            | Self::TABLES.bits()
            | Self::STRIKETHROUGH.bits()
            | Self::TASKLISTS.bits();

        // Keep bits we do not know about.
        const _ = !0;
    }
}

bitflags! {
    /// Options for the HTML-mode renderer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RendererFlags: u32 {
        /// Log every block and span the renderer opens and closes.
        const DEBUG = 0x0001;
        /// Copy entity references to the output without decoding them.
        const VERBATIM_ENTITIES = 0x0002;
        /// Ignore a UTF-8 byte order mark at the start of the input.
        const SKIP_UTF8_BOM = 0x0004;
        /// Emit XHTML-style self-closing tags (`<br />`).
        const XHTML = 0x0008;

        const _ = !0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_dialect_is_the_gfm_extension_set() {
        let gfm = ParserFlags::DIALECT_GITHUB;
        assert!(gfm.contains(ParserFlags::TABLES));
        assert!(gfm.contains(ParserFlags::STRIKETHROUGH));
        assert!(gfm.contains(ParserFlags::TASKLISTS));
        assert!(gfm.contains(ParserFlags::PERMISSIVE_WWW_AUTOLINKS));
        assert!(!gfm.contains(ParserFlags::WIKILINKS));
        assert_eq!(gfm.bits(), 0x0f0c);
    }

    #[test]
    fn unknown_bits_survive() {
        let flags = ParserFlags::from_bits_retain(0x8000_0100);
        assert!(flags.contains(ParserFlags::TABLES));
        assert_eq!(flags.bits(), 0x8000_0100);

        let renderer = RendererFlags::from_bits_retain(0x10 | 0x8);
        assert!(renderer.contains(RendererFlags::XHTML));
        assert_eq!(renderer.bits(), 0x18);
    }

    #[test]
    fn commonmark_dialect_is_empty() {
        assert!(ParserFlags::DIALECT_COMMONMARK.is_empty());
        assert_eq!(ParserFlags::default(), ParserFlags::DIALECT_COMMONMARK);
    }
}
