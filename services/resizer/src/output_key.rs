//! Output key templates.
//!
//! A template such as `{outputdir}/{label}/{key}` is parsed once at startup
//! and rendered for every derivative. Placeholders:
//!
//! | Placeholder   | Value                                                   |
//! |---------------|---------------------------------------------------------|
//! | `{key}`       | decoded source key                                      |
//! | `{dir}`       | directory of the source key                             |
//! | `{name}`      | file name without extension                             |
//! | `{ext}`       | file extension without the dot (may be empty)           |
//! | `{type}`      | subtype of the source content type (`image/png` → `png`)|
//! | `{label}`     | size label, e.g. `1_2`                                  |
//! | `{outputdir}` | output directory of the resolved profile                |

use crate::profile::directory_of;
use thiserror::Error;

pub const DEFAULT_KEY_TEMPLATE: &str = "{outputdir}/{label}/{key}";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),

    #[error("unclosed '{{' at byte {0}")]
    Unclosed(usize),

    #[error("unexpected '}}' at byte {0}")]
    UnexpectedClose(usize),

    #[error("template must contain {{{0}}}")]
    MissingPlaceholder(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Key,
    Dir,
    Name,
    Ext,
    Type,
    Label,
    OutputDir,
}

impl Placeholder {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "key" => Some(Self::Key),
            "dir" => Some(Self::Dir),
            "name" => Some(Self::Name),
            "ext" => Some(Self::Ext),
            "type" => Some(Self::Type),
            "label" => Some(Self::Label),
            "outputdir" => Some(Self::OutputDir),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Placeholder),
}

/// Source object facts available to a template
#[derive(Debug, Clone, Copy)]
pub struct KeyContext<'a> {
    /// Decoded source key
    pub key: &'a str,
    /// Content type reported by the object store
    pub content_type: Option<&'a str>,
}

/// Parsed output key template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplate {
    segments: Vec<Segment>,
}

impl KeyTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;
        let mut offset = 0;

        while let Some(pos) = rest.find(['{', '}']) {
            if rest.as_bytes()[pos] == b'}' {
                return Err(TemplateError::UnexpectedClose(offset + pos));
            }

            literal.push_str(&rest[..pos]);
            let after_open = &rest[pos + 1..];
            let close = after_open
                .find('}')
                .ok_or(TemplateError::Unclosed(offset + pos))?;
            let name = &after_open[..close];
            let field = Placeholder::parse(name)
                .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?;

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Field(field));

            let consumed = pos + 1 + close + 1;
            offset += consumed;
            rest = &rest[consumed..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        let template = Self { segments };

        // Both are needed for distinct sources and sizes to land on distinct keys
        if !template.contains(Placeholder::Key) {
            return Err(TemplateError::MissingPlaceholder("key"));
        }
        if !template.contains(Placeholder::Label) {
            return Err(TemplateError::MissingPlaceholder("label"));
        }

        Ok(template)
    }

    fn contains(&self, placeholder: Placeholder) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Field(p) if *p == placeholder))
    }

    /// Render the output key for one derivative
    pub fn render(&self, context: &KeyContext<'_>, label: &str, output_dir: &str) -> String {
        let (name, ext) = split_file_name(context.key);
        let content_subtype = context
            .content_type
            .and_then(|t| t.split(';').next())
            .and_then(|t| t.split_once('/'))
            .map(|(_, subtype)| subtype.trim())
            .unwrap_or("");

        let mut rendered = KeyBuilder::with_capacity(context.key.len() + output_dir.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_layout(text),
                Segment::Field(Placeholder::Key) => rendered.push_source(context.key),
                Segment::Field(Placeholder::Dir) => rendered.push_source(directory_of(context.key)),
                Segment::Field(Placeholder::Name) => rendered.push_source(name),
                Segment::Field(Placeholder::Ext) => rendered.push_source(ext),
                Segment::Field(Placeholder::Type) => rendered.push_layout(content_subtype),
                Segment::Field(Placeholder::Label) => rendered.push_layout(label),
                Segment::Field(Placeholder::OutputDir) => rendered.push_layout(output_dir),
            }
        }

        rendered.finish()
    }
}

/// Accumulates a rendered key.
///
/// Slashes coming from the template layout (literals, output directory,
/// label, content type) collapse against each other and never lead the key.
/// Text taken from the source key is copied verbatim, so distinct source
/// keys keep distinct output keys.
struct KeyBuilder {
    out: String,
    at_boundary: bool,
}

impl KeyBuilder {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            out: String::with_capacity(capacity),
            at_boundary: true,
        }
    }

    fn push_layout(&mut self, text: &str) {
        for c in text.chars() {
            if c == '/' && self.at_boundary {
                continue;
            }
            self.out.push(c);
            self.at_boundary = c == '/';
        }
    }

    fn push_source(&mut self, text: &str) {
        if !text.is_empty() {
            self.out.push_str(text);
            self.at_boundary = false;
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

/// Build an output key from a template string.
///
/// Prefer parsing a [`KeyTemplate`] once and calling [`KeyTemplate::render`].
pub fn make_key(
    template: &str,
    context: &KeyContext<'_>,
    label: &str,
    output_dir: &str,
) -> Result<String, TemplateError> {
    Ok(KeyTemplate::parse(template)?.render(context, label, output_dir))
}

/// Split the last path segment into (stem, extension)
fn split_file_name(key: &str) -> (&str, &str) {
    let file = key.rsplit_once('/').map(|(_, f)| f).unwrap_or(key);
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext),
        _ => (file, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sizes::SIZE_LABELS;
    use std::collections::HashSet;

    fn ctx(key: &str) -> KeyContext<'_> {
        KeyContext {
            key,
            content_type: Some("image/jpeg"),
        }
    }

    #[test]
    fn test_default_template() {
        let template = KeyTemplate::parse(DEFAULT_KEY_TEMPLATE).unwrap();
        assert_eq!(
            template.render(&ctx("photos/cat.jpg"), "1_2", "resized"),
            "resized/1_2/photos/cat.jpg"
        );
    }

    #[test]
    fn test_all_placeholders() {
        let template =
            KeyTemplate::parse("{outputdir}/{dir}/{name}-{label}.{ext}?{type}#{key}").unwrap();
        assert_eq!(
            template.render(&ctx("photos/2024/cat.jpeg"), "1_6", "out"),
            "out/photos/2024/cat-1_6.jpeg?jpeg#photos/2024/cat.jpeg"
        );
    }

    #[test]
    fn test_render_normalizes_slashes() {
        let template = KeyTemplate::parse(DEFAULT_KEY_TEMPLATE).unwrap();
        assert_eq!(template.render(&ctx("cat.jpg"), "1", ""), "1/cat.jpg");
        assert_eq!(template.render(&ctx("cat.jpg"), "1", "out/"), "out/1/cat.jpg");
        assert_eq!(template.render(&ctx("cat.jpg"), "1", "/out//"), "out/1/cat.jpg");
    }

    #[test]
    fn test_source_key_slashes_are_preserved() {
        let template = KeyTemplate::parse(DEFAULT_KEY_TEMPLATE).unwrap();
        let render = |key| template.render(&ctx(key), "1_2", "resized");

        assert_eq!(render("photos//cat.jpg"), "resized/1_2/photos//cat.jpg");
        assert_eq!(render("/cat.jpg"), "resized/1_2//cat.jpg");
        assert_ne!(render("photos//cat.jpg"), render("photos/cat.jpg"));
        assert_ne!(render("/cat.jpg"), render("cat.jpg"));
        assert_ne!(render("dir/"), render("dir"));
    }

    #[test]
    fn test_trailing_slash_in_key_does_not_merge_with_layout() {
        let template = KeyTemplate::parse("{outputdir}/{key}/{label}").unwrap();
        let render = |key| template.render(&ctx(key), "1_2", "resized");

        assert_eq!(render("a/"), "resized/a//1_2");
        assert_ne!(render("a/"), render("a"));
    }

    #[test]
    fn test_content_type_parameters_are_ignored() {
        let template = KeyTemplate::parse("{type}/{label}/{key}").unwrap();
        let context = KeyContext {
            key: "a.png",
            content_type: Some("image/png; charset=binary"),
        };
        assert_eq!(template.render(&context, "1", "out"), "png/1/a.png");

        let unknown = KeyContext {
            key: "a.png",
            content_type: None,
        };
        assert_eq!(template.render(&unknown, "1", "out"), "1/a.png");
    }

    #[test]
    fn test_make_key_is_deterministic() {
        let first = make_key(DEFAULT_KEY_TEMPLATE, &ctx("a/b.jpg"), "1_3", "out").unwrap();
        let second = make_key(DEFAULT_KEY_TEMPLATE, &ctx("a/b.jpg"), "1_3", "out").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_distinct_keys_and_labels_do_not_collide() {
        let template = KeyTemplate::parse("{outputdir}/{name}_{label}/{key}").unwrap();
        let keys = ["a.jpg", "b.jpg", "dir/a.jpg", "a b.jpg", "a_1.jpg"];

        let mut seen = HashSet::new();
        for key in keys {
            for label in SIZE_LABELS {
                assert!(seen.insert(template.render(&ctx(key), label, "out")));
            }
        }
        assert_eq!(seen.len(), keys.len() * SIZE_LABELS.len());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            KeyTemplate::parse("{outputdir}/{size}/{key}"),
            Err(TemplateError::UnknownPlaceholder("size".to_string()))
        );
        assert_eq!(
            KeyTemplate::parse("{label}/{key"),
            Err(TemplateError::Unclosed(8))
        );
        assert_eq!(
            KeyTemplate::parse("{label}}/{key}"),
            Err(TemplateError::UnexpectedClose(7))
        );
        assert_eq!(
            KeyTemplate::parse("{outputdir}/{key}"),
            Err(TemplateError::MissingPlaceholder("label"))
        );
        assert_eq!(
            KeyTemplate::parse("{outputdir}/{label}/{name}"),
            Err(TemplateError::MissingPlaceholder("key"))
        );
    }

    #[test]
    fn test_split_file_name() {
        assert_eq!(split_file_name("a/b/cat.jpg"), ("cat", "jpg"));
        assert_eq!(split_file_name("cat.tar.gz"), ("cat.tar", "gz"));
        assert_eq!(split_file_name("a/.hidden"), (".hidden", ""));
        assert_eq!(split_file_name("a/README"), ("README", ""));
    }
}
