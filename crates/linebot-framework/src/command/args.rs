//! Typed positional arguments.

use std::fmt;

use crate::error::{CommandError, CommandResult};

/// Type of a positional parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    /// Decimal `i64`.
    Int,
    /// `f64`.
    Float,
    /// `true|false|1|0|yes|no`, case-insensitive.
    Bool,
    /// The token as-is.
    Str,
}

impl ArgType {
    /// Name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Str => "string",
        }
    }

    /// Converts one token.
    pub fn coerce(self, token: &str) -> Option<ArgValue> {
        match self {
            Self::Int => token.parse().ok().map(ArgValue::Int),
            Self::Float => token.parse().ok().map(ArgValue::Float),
            Self::Bool => match token.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(ArgValue::Bool(true)),
                "false" | "0" | "no" => Some(ArgValue::Bool(false)),
                _ => None,
            },
            Self::Str => Some(ArgValue::Str(token.to_string())),
        }
    }
}

/// A converted argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// String.
    Str(String),
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// One entry of a command's parameter schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Parameter name.
    pub name: String,
    /// Type; the rest parameter is always a string.
    pub ty: ArgType,
    /// Value used when the token is missing.
    pub default: Option<ArgValue>,
    /// Takes the rest of the line.
    pub rest: bool,
}

/// Arguments handed to a command body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: Vec<(String, ArgValue)>,
}

impl Args {
    /// Looks up an argument by name.
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// An integer argument.
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            ArgValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// A float argument. Integer defaults widen.
    pub fn float(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            ArgValue::Float(v) => Some(*v),
            ArgValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// A boolean argument.
    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            ArgValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// A string argument.
    pub fn str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            ArgValue::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates arguments in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }
}

/// Binds `tokens` to `schema`.
///
/// Tokens beyond the schema are ignored unless a rest parameter takes them.
pub fn bind(schema: &[Param], tokens: &[&str]) -> CommandResult<Args> {
    let mut values = Vec::with_capacity(schema.len());

    for (index, param) in schema.iter().enumerate() {
        let value = if param.rest {
            let rest = tokens.get(index..).map(|t| t.join(" ")).unwrap_or_default();
            (!rest.is_empty()).then_some(ArgValue::Str(rest))
        } else {
            match tokens.get(index) {
                Some(token) => Some(param.ty.coerce(token).ok_or_else(|| {
                    CommandError::InvalidArgument {
                        name: param.name.clone(),
                        value: token.to_string(),
                        expected: param.ty.name(),
                    }
                })?),
                None => None,
            }
        };

        let value = value.or_else(|| param.default.clone()).ok_or_else(|| {
            CommandError::MissingArgument {
                name: param.name.clone(),
            }
        })?;
        values.push((param.name.clone(), value));
    }

    Ok(Args { values })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(name: &str, ty: ArgType) -> Param {
        Param {
            name: name.into(),
            ty,
            default: None,
            rest: false,
        }
    }

    fn rest(name: &str) -> Param {
        Param {
            name: name.into(),
            ty: ArgType::Str,
            default: None,
            rest: true,
        }
    }

    #[test]
    fn coercion_rules() {
        assert_eq!(ArgType::Int.coerce("-42"), Some(ArgValue::Int(-42)));
        assert_eq!(ArgType::Int.coerce("4.2"), None);
        assert_eq!(ArgType::Float.coerce("4.5"), Some(ArgValue::Float(4.5)));
        assert_eq!(ArgType::Bool.coerce("YES"), Some(ArgValue::Bool(true)));
        assert_eq!(ArgType::Bool.coerce("0"), Some(ArgValue::Bool(false)));
        assert_eq!(ArgType::Bool.coerce("maybe"), None);
        assert_eq!(ArgType::Str.coerce("x"), Some(ArgValue::Str("x".into())));
    }

    #[test]
    fn rest_joins_remaining_tokens() {
        let schema = [typed("times", ArgType::Int), rest("reason")];
        let args = bind(&schema, &["3", "because", "thirsty"]).unwrap();
        assert_eq!(args.int("times"), Some(3));
        assert_eq!(args.str("reason"), Some("because thirsty"));
    }

    #[test]
    fn missing_and_invalid() {
        let schema = [typed("times", ArgType::Int), rest("reason")];
        assert!(matches!(
            bind(&schema, &[]),
            Err(CommandError::MissingArgument { name }) if name == "times"
        ));
        assert!(matches!(
            bind(&schema, &["3"]),
            Err(CommandError::MissingArgument { name }) if name == "reason"
        ));
        assert!(matches!(
            bind(&schema, &["three", "x"]),
            Err(CommandError::InvalidArgument { expected: "int", .. })
        ));
    }

    #[test]
    fn defaults_fill_gaps() {
        let mut times = typed("times", ArgType::Int);
        times.default = Some(ArgValue::Int(1));
        let mut reason = rest("reason");
        reason.default = Some("none".into());

        let args = bind(&[times, reason], &[]).unwrap();
        assert_eq!(args.int("times"), Some(1));
        assert_eq!(args.str("reason"), Some("none"));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn extra_tokens_are_ignored() {
        let args = bind(&[typed("n", ArgType::Int)], &["1", "2"]).unwrap();
        assert_eq!(args.len(), 1);
    }
}
