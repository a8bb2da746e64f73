//! XYZ tile URL templates.
//!
//! A template is a URL with `{z}`, `{x}` and `{y}` placeholders, e.g.
//! `https://tiles.example.com/{z}/{x}/{y}.png`. Doubled braces (`{{`, `}}`)
//! stand for literal braces. Templates are parsed once and then expanded per
//! tile without further validation.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tile_common::TileCoord;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template '{template}' is missing the {{{placeholder}}} placeholder")]
    MissingPlaceholder {
        template: String,
        placeholder: &'static str,
    },

    #[error("template '{template}' has unknown placeholder {{{name}}}")]
    UnknownPlaceholder { template: String, name: String },

    #[error("template '{template}' has an unbalanced brace at byte {position}")]
    UnbalancedBrace { template: String, position: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Z,
    X,
    Y,
}

/// A parsed tile URL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl UrlTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let unbalanced = |position| TemplateError::UnbalancedBrace {
            template: template.to_string(),
            position,
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if chars.peek().map(|&(_, n)| n) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().map(|&(_, n)| n) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, n) in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        name.push(n);
                    }
                    if !closed {
                        return Err(unbalanced(pos));
                    }
                    let segment = match name.as_str() {
                        "z" => Segment::Z,
                        "x" => Segment::X,
                        "y" => Segment::Y,
                        _ => {
                            return Err(TemplateError::UnknownPlaceholder {
                                template: template.to_string(),
                                name,
                            })
                        }
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                }
                '}' => return Err(unbalanced(pos)),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        for (segment, placeholder) in [(Segment::Z, "z"), (Segment::X, "x"), (Segment::Y, "y")] {
            if !segments.contains(&segment) {
                return Err(TemplateError::MissingPlaceholder {
                    template: template.to_string(),
                    placeholder,
                });
            }
        }

        Ok(Self {
            raw: template.to_string(),
            segments,
        })
    }

    /// Substitute the tile's z/x/y.
    pub fn expand(&self, tile: &TileCoord) -> String {
        let mut url = String::with_capacity(self.raw.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => url.push_str(s),
                Segment::Z => url.push_str(&tile.z.to_string()),
                Segment::X => url.push_str(&tile.x.to_string()),
                Segment::Y => url.push_str(&tile.y.to_string()),
            }
        }
        url
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for UrlTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
