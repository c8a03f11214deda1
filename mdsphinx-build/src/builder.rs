//! Output format × builder variant → generator builder.
//!
//! | format     | default      | single             |
//! |------------|--------------|--------------------|
//! | pdf        | `latex`      | unsupported        |
//! | html       | `html`       | `singlehtml`       |
//! | confluence | `confluence` | `singleconfluence` |

use std::fmt;
use std::str::FromStr;

use crate::error::BuildError;

/// Requested output format; also the `build/<format>` directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    #[default]
    Pdf,
    Html,
    Confluence,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Html => "html",
            OutputFormat::Confluence => "confluence",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(OutputFormat::Pdf),
            "html" => Ok(OutputFormat::Html),
            "confluence" => Ok(OutputFormat::Confluence),
            other => Err(format!(
                "unknown output format '{other}'; expected: pdf, html, confluence"
            )),
        }
    }
}

/// Which flavour of builder to use for a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BuilderVariant {
    #[default]
    Default,
    Single,
}

impl fmt::Display for BuilderVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuilderVariant::Default => "default",
            BuilderVariant::Single => "single",
        })
    }
}

impl FromStr for BuilderVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(BuilderVariant::Default),
            "single" => Ok(BuilderVariant::Single),
            other => Err(format!("unknown builder '{other}'; expected: default, single")),
        }
    }
}

/// A concrete generator builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Latex,
    Html,
    SingleHtml,
    Confluence,
    SingleConfluence,
}

impl Target {
    pub fn resolve(format: OutputFormat, variant: BuilderVariant) -> Result<Self, BuildError> {
        use BuilderVariant::{Default, Single};
        match (format, variant) {
            (OutputFormat::Pdf, Default) => Ok(Target::Latex),
            (OutputFormat::Html, Default) => Ok(Target::Html),
            (OutputFormat::Html, Single) => Ok(Target::SingleHtml),
            (OutputFormat::Confluence, Default) => Ok(Target::Confluence),
            (OutputFormat::Confluence, Single) => Ok(Target::SingleConfluence),
            (OutputFormat::Pdf, Single) => Err(BuildError::UnsupportedBuilder { format, variant }),
        }
    }

    /// Name passed to `sphinx-build -b`.
    pub fn builder_name(&self) -> &'static str {
        match self {
            Target::Latex => "latex",
            Target::Html => "html",
            Target::SingleHtml => "singlehtml",
            Target::Confluence => "confluence",
            Target::SingleConfluence => "singleconfluence",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(OutputFormat::Pdf, BuilderVariant::Default, "latex")]
    #[case(OutputFormat::Html, BuilderVariant::Default, "html")]
    #[case(OutputFormat::Html, BuilderVariant::Single, "singlehtml")]
    #[case(OutputFormat::Confluence, BuilderVariant::Default, "confluence")]
    #[case(OutputFormat::Confluence, BuilderVariant::Single, "singleconfluence")]
    fn resolves_builder(
        #[case] format: OutputFormat,
        #[case] variant: BuilderVariant,
        #[case] expected: &str,
    ) {
        assert_eq!(Target::resolve(format, variant).unwrap().builder_name(), expected);
    }

    #[test]
    fn single_pdf_is_unsupported() {
        let err = Target::resolve(OutputFormat::Pdf, BuilderVariant::Single).unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedBuilder { .. }));
        assert_eq!(err.to_string(), "no 'single' builder for pdf output");
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("HTML".parse::<OutputFormat>().unwrap(), OutputFormat::Html);
        assert_eq!("Single".parse::<BuilderVariant>().unwrap(), BuilderVariant::Single);
        assert!("docx".parse::<OutputFormat>().is_err());
    }
}
