//! Generic group tree produced by the block parser.
//!
//! The tree does not know what a `cell` or a `pin` is; every block is a
//! [`Group`] with a name, positional arguments, ordered attributes and
//! ordered child groups. The semantic builder narrows it into typed entities.

use std::fmt;

/// A scalar value on the right-hand side of an attribute or in a group's
/// argument list.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Bare identifier, e.g. `input` or `C`
    Identifier(String),
    /// Quoted string, e.g. `"(A*B)"`
    String(String),
    /// Numeric literal
    Number(f64),
    /// `true` / `false`
    Bool(bool),
    /// Argument list of a complex attribute, e.g. `capacitive_load_unit(1, pf);`
    List(Vec<Value>),
}

impl Value {
    /// Text of an identifier or string value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Identifier(s) | Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Short description of the value's type for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Identifier(_) => "identifier",
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::List(_) => "argument list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Identifier(s) => write!(f, "{}", s),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Source bytes dropped while decoding a string literal: an escaped quote
/// or a backslash line continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elision {
    /// Byte index in the decoded text where the bytes were dropped
    pub at: usize,
    /// Number of source bytes dropped
    pub len: usize,
}

/// A `key : value ;` (or `key(args) ;`) statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub key: String,
    pub value: Value,
    /// Offset of the key
    pub offset: usize,
    /// Offset of the value's first character
    pub value_offset: usize,
    /// Decoding gaps of a string value, in order
    pub elisions: Vec<Elision>,
}

impl Attribute {
    /// Absolute source offset of byte `text_offset` of the value's text.
    ///
    /// Skips the opening quote of a string and every byte dropped while
    /// decoding it.
    pub fn source_offset(&self, text_offset: usize) -> usize {
        match self.value {
            Value::String(_) => {
                let dropped: usize = self
                    .elisions
                    .iter()
                    .filter(|e| e.at <= text_offset)
                    .map(|e| e.len)
                    .sum();
                self.value_offset + 1 + text_offset + dropped
            }
            _ => self.value_offset + text_offset,
        }
    }
}

/// A named block: `name(args) { attributes... children... }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// Group kind, e.g. `library`, `cell`, `pin`, `ff`
    pub name: String,
    /// Positional arguments in parentheses
    pub args: Vec<Value>,
    /// Attributes in source order
    pub attributes: Vec<Attribute>,
    /// Nested groups in source order
    pub groups: Vec<Group>,
    /// Offset of the group name
    pub offset: usize,
}

impl Group {
    /// Create an empty group.
    pub fn new(name: impl Into<String>, args: Vec<Value>, offset: usize) -> Self {
        Self {
            name: name.into(),
            args,
            attributes: Vec::new(),
            groups: Vec::new(),
            offset,
        }
    }

    /// Look up an attribute by key.
    pub fn attribute(&self, key: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.key == key)
    }

    /// Child groups with the given name.
    pub fn groups_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Group> + 'a {
        self.groups.iter().filter(move |g| g.name == name)
    }

    /// Label for messages, e.g. `cell(AND)` or `ff(IQ, IQN)`.
    pub fn label(&self) -> String {
        if self.args.is_empty() {
            return self.name.clone();
        }
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| match arg.as_text() {
                Some(text) => text.to_string(),
                None => arg.to_string(),
            })
            .collect();
        format!("{}({})", self.name, args.join(", "))
    }
}
