use serde_json::Value;
use thiserror::Error;

use crate::display::DisplayError;
use crate::state::view::DerivedViewModel;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum TemplateError {
    #[error("unclosed tag at {0}")]
    UnclosedTag(usize),
    #[error("unclosed section \"{name}\" at {position}")]
    UnclosedSection { name: String, position: usize },
    #[error("unopened section \"{name}\" at {position}")]
    UnopenedSection { name: String, position: usize },
    #[error("unsupported tag \"{tag}\" at {position}")]
    UnsupportedTag { tag: String, position: usize },
    #[error("could not prepare template data: {0}")]
    Data(String),
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum MessageError {
    #[error(transparent)]
    Display(#[from] DisplayError),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

pub fn render_message(
    renderer: &dyn MessageRenderer,
    format: &str,
    view: &Result<DerivedViewModel, DisplayError>,
) -> Result<String, MessageError> {
    let view = view.as_ref().map_err(Clone::clone)?;
    Ok(renderer.render(format, view)?)
}

pub trait MessageRenderer: Send + Sync {
    fn render(&self, template: &str, data: &DerivedViewModel) -> Result<String, TemplateError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Mustache;

impl MessageRenderer for Mustache {
    fn render(&self, template: &str, data: &DerivedViewModel) -> Result<String, TemplateError> {
        let value = serde_json::to_value(data).map_err(|err| TemplateError::Data(err.to_string()))?;
        render_value(template, &value)
    }
}

pub fn render_value(template: &str, data: &Value) -> Result<String, TemplateError> {
    let tokens = parse(template)?;
    let mut out = String::with_capacity(template.len());
    let mut stack = vec![data];
    render_tokens(&tokens, &mut stack, &mut out);
    Ok(out)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Text(String),
    Variable {
        name: String,
        escape: bool,
    },
    Section {
        name: String,
        inverted: bool,
        children: Vec<Token>,
    },
}

struct OpenSection {
    name: String,
    inverted: bool,
    position: usize,
    children: Vec<Token>,
}

fn parse(template: &str) -> Result<Vec<Token>, TemplateError> {
    let mut root = Vec::new();
    let mut open: Vec<OpenSection> = Vec::new();
    let mut cursor = 0;

    while cursor < template.len() {
        let rest = &template[cursor..];
        let Some(start) = rest.find("{{") else {
            current(&mut root, &mut open).push(Token::Text(rest.to_string()));
            break;
        };
        if start > 0 {
            current(&mut root, &mut open).push(Token::Text(rest[..start].to_string()));
        }

        let tag_position = cursor + start;
        let after_open = &template[tag_position + 2..];
        let (content, consumed, triple) = if let Some(inner) = after_open.strip_prefix('{') {
            let end = inner
                .find("}}}")
                .ok_or(TemplateError::UnclosedTag(tag_position))?;
            (&inner[..end], 2 + 1 + end + 3, true)
        } else {
            let end = after_open
                .find("}}")
                .ok_or(TemplateError::UnclosedTag(tag_position))?;
            (&after_open[..end], 2 + end + 2, false)
        };
        cursor = tag_position + consumed;

        let content = content.trim();
        if triple {
            current(&mut root, &mut open).push(Token::Variable {
                name: content.to_string(),
                escape: false,
            });
            continue;
        }

        let mut chars = content.chars();
        match chars.next() {
            Some('!') => {}
            Some(sigil @ ('#' | '^')) => open.push(OpenSection {
                name: chars.as_str().trim().to_string(),
                inverted: sigil == '^',
                position: tag_position,
                children: Vec::new(),
            }),
            Some('/') => {
                let name = chars.as_str().trim();
                let Some(section) = open.pop() else {
                    return Err(TemplateError::UnopenedSection {
                        name: name.to_string(),
                        position: tag_position,
                    });
                };
                if section.name != name {
                    return Err(TemplateError::UnclosedSection {
                        name: section.name,
                        position: tag_position,
                    });
                }
                current(&mut root, &mut open).push(Token::Section {
                    name: section.name,
                    inverted: section.inverted,
                    children: section.children,
                });
            }
            Some('&') => current(&mut root, &mut open).push(Token::Variable {
                name: chars.as_str().trim().to_string(),
                escape: false,
            }),
            Some(sigil @ ('>' | '=')) => {
                return Err(TemplateError::UnsupportedTag {
                    tag: sigil.to_string(),
                    position: tag_position,
                });
            }
            _ => current(&mut root, &mut open).push(Token::Variable {
                name: content.to_string(),
                escape: true,
            }),
        }
    }

    if let Some(section) = open.pop() {
        return Err(TemplateError::UnclosedSection {
            name: section.name,
            position: section.position,
        });
    }
    Ok(root)
}

fn current<'a>(root: &'a mut Vec<Token>, open: &'a mut [OpenSection]) -> &'a mut Vec<Token> {
    match open.last_mut() {
        Some(section) => &mut section.children,
        None => root,
    }
}

fn render_tokens<'v>(tokens: &[Token], stack: &mut Vec<&'v Value>, out: &mut String) {
    for token in tokens {
        match token {
            Token::Text(text) => out.push_str(text),
            Token::Variable { name, escape } => {
                let Some(value) = lookup(name, stack) else {
                    continue;
                };
                let text = value_text(value);
                if *escape {
                    escape_html(&text, out);
                } else {
                    out.push_str(&text);
                }
            }
            Token::Section {
                name,
                inverted,
                children,
            } => {
                let value = lookup(name, stack);
                if *inverted {
                    if !value.is_some_and(is_truthy) {
                        render_tokens(children, stack, out);
                    }
                    continue;
                }
                let Some(value) = value.filter(|value| is_truthy(value)) else {
                    continue;
                };
                match value {
                    Value::Array(items) => {
                        for item in items {
                            stack.push(item);
                            render_tokens(children, stack, out);
                            stack.pop();
                        }
                    }
                    Value::Bool(_) => render_tokens(children, stack, out),
                    other => {
                        stack.push(other);
                        render_tokens(children, stack, out);
                        stack.pop();
                    }
                }
            }
        }
    }
}

fn lookup<'v>(name: &str, stack: &[&'v Value]) -> Option<&'v Value> {
    if name == "." {
        return stack.last().copied();
    }
    stack.iter().rev().find_map(|context| {
        name.split('.')
            .try_fold(*context, |value, segment| value.as_object()?.get(segment))
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn escape_html(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '/' => out.push_str("&#x2F;"),
            '`' => out.push_str("&#x60;"),
            '=' => out.push_str("&#x3D;"),
            other => out.push(other),
        }
    }
}
