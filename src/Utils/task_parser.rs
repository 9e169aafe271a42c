//! Parser of task files: a sequence of titled sections, each holding `key: v1, v2` pairs.
//!
//! ```text
//! solver
//!   method: universal
//!   tolerance: 1e-12
//! process
//!   task: task1
//!   temperature: 350, 650, 10
//! ```
//! Lines starting with `//`, `#` or `%` are comments.
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{alpha1, alphanumeric1, multispace0, space0},
    combinator::{map, recognize},
    multi::{many0, many1, separated_list0},
    sequence::{delimited, pair, separated_pair, terminated},
};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

pub type SectionMap = HashMap<String, Vec<Value>>;
pub type DocumentMap = HashMap<String, SectionMap>;

/// A single value of a key
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Float(f64),
    Integer(i64),
    Boolean(bool),
}

impl Value {
    pub fn as_string(&self) -> Option<&String> {
        if let Value::String(s) = self {
            Some(s)
        } else {
            None
        }
    }

    /// integers are numbers too
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        if let Value::Integer(i) = self {
            Some(*i)
        } else {
            None
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        if let Value::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Float(val) => write!(f, "{}", val),
            Value::Integer(val) => write!(f, "{}", val),
            Value::Boolean(val) => write!(f, "{}", val),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskError {
    Io { path: String, message: String },
    Syntax(String),
    /// text left over after the last section
    Trailing(String),
    MissingKey { section: String, key: String },
    WrongType { section: String, key: String, expected: &'static str },
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskError::Io { path, message } => {
                write!(f, "Cannot read task file {}: {}", path, message)
            }
            TaskError::Syntax(msg) => write!(f, "Task file syntax error: {}", msg),
            TaskError::Trailing(rest) => write!(f, "Cannot parse task file from '{}'", rest),
            TaskError::MissingKey { section, key } => {
                write!(f, "Section {} has no key {}", section, key)
            }
            TaskError::WrongType {
                section,
                key,
                expected,
            } => write!(f, "{}.{} must be {}", section, key, expected),
        }
    }
}

impl std::error::Error for TaskError {}

/// identifier: a letter or underscore followed by letters, digits and underscores
fn identifier(input: &str) -> IResult<&str, String> {
    let parser = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ));
    map(parser, String::from).parse(input)
}

pub(crate) fn parse_title(input: &str) -> IResult<&str, String> {
    let (input, title) = identifier(input)?;
    Ok((input.trim(), title))
}

pub(crate) fn parse_key(input: &str) -> IResult<&str, String> {
    identifier(input)
}

/// anything up to a comma, whitespace or semicolon; typed as integer, float, bool or string
pub(crate) fn parse_value(input: &str) -> IResult<&str, Value> {
    let token = take_while1(|c: char| !matches!(c, ',' | ' ' | '\t' | '\n' | '\r' | ';'));
    map(token, |s: &str| {
        if let Ok(val) = s.parse::<i64>() {
            Value::Integer(val)
        } else if let Ok(val) = s.parse::<f64>() {
            Value::Float(val)
        } else if let Ok(val) = s.parse::<bool>() {
            Value::Boolean(val)
        } else {
            Value::String(s.to_string())
        }
    })
    .parse(input)
}

pub(crate) fn parse_value_list(input: &str) -> IResult<&str, Vec<Value>> {
    let (input, _) = multispace0(input)?;
    let comma = delimited(space0, tag(","), space0);
    separated_list0(comma, parse_value).parse(input)
}

pub(crate) fn parse_key_value_pair(input: &str) -> IResult<&str, (String, Vec<Value>)> {
    let colon = delimited(space0, tag(":"), space0);
    let (input, result) = separated_pair(parse_key, colon, parse_value_list).parse(input)?;
    Ok((input.trim(), result))
}

pub(crate) fn parse_section(input: &str) -> IResult<&str, (String, SectionMap)> {
    let (input, _) = space0(input)?;
    let (input, title) = parse_title(input)?;
    let (input, _) = multispace0(input)?;
    let (input, pairs) = many1(terminated(parse_key_value_pair, space0)).parse(input)?;
    Ok((input, (title, pairs.into_iter().collect())))
}

fn filter_comments(input: &str) -> String {
    input
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.starts_with("//")
                && !trimmed.starts_with('#')
                && !trimmed.starts_with('%')
                && !trimmed.is_empty()
        })
        .collect::<Vec<&str>>()
        .join("\n")
}

/// All sections of a document; a repeated title replaces the earlier section
pub fn parse_document(input: &str) -> IResult<&str, DocumentMap> {
    let (input, _) = multispace0(input)?;
    let (input, sections) = many1(delimited(space0, parse_section, multispace0)).parse(input)?;
    Ok((input, sections.into_iter().collect()))
}

/// Parsed task file with typed access to its values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDocument {
    sections: DocumentMap,
}

impl TaskDocument {
    pub fn parse(text: &str) -> Result<Self, TaskError> {
        let text = filter_comments(text);
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let (remaining, sections) =
            parse_document(&text).map_err(|e| TaskError::Syntax(format!("{:?}", e)))?;
        if !remaining.trim().is_empty() {
            return Err(TaskError::Trailing(remaining.trim().to_string()));
        }
        Ok(Self { sections })
    }

    pub fn from_file(path: &Path) -> Result<Self, TaskError> {
        let text = fs::read_to_string(path).map_err(|e| TaskError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&text)
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    pub fn section(&self, section: &str) -> Option<&SectionMap> {
        self.sections.get(section)
    }

    /// None when the section or the key is absent
    pub fn values(&self, section: &str, key: &str) -> Option<&[Value]> {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .map(|v| v.as_slice())
    }

    fn wrong_type(section: &str, key: &str, expected: &'static str) -> TaskError {
        TaskError::WrongType {
            section: section.to_string(),
            key: key.to_string(),
            expected,
        }
    }

    fn single(&self, section: &str, key: &str) -> Option<Result<&Value, TaskError>> {
        self.values(section, key).map(|values| match values {
            [value] => Ok(value),
            _ => Err(Self::wrong_type(section, key, "a single value")),
        })
    }

    pub fn get_f64(&self, section: &str, key: &str) -> Result<Option<f64>, TaskError> {
        self.single(section, key)
            .map(|v| v?.as_number().ok_or_else(|| Self::wrong_type(section, key, "a number")))
            .transpose()
    }

    pub fn get_usize(&self, section: &str, key: &str) -> Result<Option<usize>, TaskError> {
        self.single(section, key)
            .map(|v| {
                v?.as_integer()
                    .and_then(|i| usize::try_from(i).ok())
                    .ok_or_else(|| Self::wrong_type(section, key, "a non-negative integer"))
            })
            .transpose()
    }

    /// numbers are accepted and rendered as text
    pub fn get_string(&self, section: &str, key: &str) -> Result<Option<String>, TaskError> {
        self.single(section, key).map(|v| Ok(v?.to_string())).transpose()
    }

    pub fn get_f64_list(&self, section: &str, key: &str) -> Result<Option<Vec<f64>>, TaskError> {
        self.values(section, key)
            .map(|values| {
                values
                    .iter()
                    .map(|v| v.as_number().ok_or_else(|| Self::wrong_type(section, key, "a list of numbers")))
                    .collect::<Result<Vec<f64>, TaskError>>()
            })
            .transpose()
    }

    pub fn require<T>(
        value: Option<T>,
        section: &str,
        key: &str,
    ) -> Result<T, TaskError> {
        value.ok_or_else(|| TaskError::MissingKey {
            section: section.to_string(),
            key: key.to_string(),
        })
    }
}
