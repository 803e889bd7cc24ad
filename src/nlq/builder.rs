//! Query builder
//!
//! Turns a matched rule plus extracted parameters into the query text and
//! the parameter set to bind. Values are bound, never interpolated.

use crate::nlq::pattern::{PatternSpec, QuerySource};
use crate::nlq::{NlqError, NlqResult};
use crate::value::{Params, Value};

/// Query text and the parameters it binds
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub text: String,
    pub params: Params,
}

/// `$name` placeholders in `text`, in order of first appearance
pub fn placeholders(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        if let Some(open) = quote {
            match ch {
                '\\' => {
                    chars.next();
                }
                c if c == open => quote = None,
                _ => {}
            }
            continue;
        }
        match ch {
            '\'' | '"' => {
                quote = Some(ch);
                continue;
            }
            '$' => {}
            _ => continue,
        }
        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            let valid = if name.is_empty() {
                next.is_ascii_alphabetic() || next == '_'
            } else {
                next.is_ascii_alphanumeric() || next == '_'
            };
            if !valid {
                break;
            }
            name.push(next);
            chars.next();
        }
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Build the executable query for `spec`.
///
/// Fixed queries ignore `params`. Templates bind exactly the placeholders
/// they reference; a missing one is an error when the spec requires its
/// parameters, and binds null otherwise.
pub fn build_query(spec: &PatternSpec, params: &Params) -> NlqResult<BuiltQuery> {
    match &spec.query {
        QuerySource::Fixed(text) => Ok(BuiltQuery {
            text: text.clone(),
            params: Params::new(),
        }),
        QuerySource::Template(text) => {
            let mut bound = Params::new();
            for name in placeholders(text) {
                let value = match params.get(&name) {
                    Some(value) => value.clone(),
                    None if spec.requires_params => {
                        return Err(NlqError::MissingParameter {
                            pattern: spec.description.clone(),
                            name,
                        })
                    }
                    None => Value::Null,
                };
                bound.insert(name, value);
            }
            Ok(BuiltQuery {
                text: text.clone(),
                params: bound,
            })
        }
    }
}
