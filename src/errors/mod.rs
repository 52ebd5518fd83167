//! Marshaling errors
//!
//! Every failure is raised at the point it is detected and propagated with `?`
//! up through the binder. Messages are the only diagnostic the host user sees,
//! so their wording is part of the contract.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    NullNotAllowed { param: String },
    ArgumentTypeMismatch { param: String, expected: String, found: String },
    UnsupportedType { name: String, context: String },
    TypeGuessFailure { found: String },
    ArrayLengthUndeterminable { array: String },
    NumericOutOfRange { param: String, expected: String, value: f64 },
    NativeCallFailed { domain: String, code: i32, message: String },
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullNotAllowed { param } => {
                write!(f, "Argument '{}' may not be null or undefined", param)
            }
            Self::ArgumentTypeMismatch { param, expected, found } => {
                write!(
                    f,
                    "Expected type '{}' for Argument '{}' but got type '{}'",
                    expected, param, found
                )
            }
            Self::UnsupportedType { name, context } => {
                write!(f, "{} \"{}\" is unsupported", context, name)
            }
            Self::TypeGuessFailure { found } => {
                write!(f, "Unable to guess a native value type for host type '{}'", found)
            }
            Self::ArrayLengthUndeterminable { array } if array.is_empty() => {
                write!(f, "unable to determine array length for C array")
            }
            Self::ArrayLengthUndeterminable { array } => {
                write!(f, "unable to determine array length for C array '{}'", array)
            }
            Self::NumericOutOfRange { param, expected, value } => {
                write!(
                    f,
                    "Value {} does not fit type '{}' of Argument '{}'",
                    value, expected, param
                )
            }
            Self::NativeCallFailed { domain, code, message } => {
                write!(f, "{} error {}: {}", domain, code, message)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarshalError {
    pub kind: ErrorKind,
    pub callable: Option<String>,
    pub hints: Vec<String>,
}

pub type Result<T> = std::result::Result<T, MarshalError>;

impl MarshalError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            callable: None,
            hints: Vec::new(),
        }
    }

    /// Attach the callable being marshaled; the first callable wins.
    pub fn with_callable(mut self, callable: impl Into<String>) -> Self {
        if self.callable.is_none() {
            self.callable = Some(callable.into());
        }
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    pub fn null_not_allowed(param: impl Into<String>) -> Self {
        Self::new(ErrorKind::NullNotAllowed { param: param.into() })
    }

    pub fn type_mismatch(
        param: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::ArgumentTypeMismatch {
            param: param.into(),
            expected: expected.into(),
            found: found.into(),
        })
    }

    pub fn unsupported(name: impl Into<String>, context: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedType {
            name: name.into(),
            context: context.into(),
        })
    }

    pub fn guess_failure(found: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeGuessFailure { found: found.into() })
    }

    pub fn array_length() -> Self {
        Self::new(ErrorKind::ArrayLengthUndeterminable { array: String::new() })
            .with_hint("declare a fixed size, zero termination or a length parameter")
    }

    pub fn out_of_range(param: impl Into<String>, expected: impl Into<String>, value: f64) -> Self {
        Self::new(ErrorKind::NumericOutOfRange {
            param: param.into(),
            expected: expected.into(),
            value,
        })
    }

    pub fn native(domain: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NativeCallFailed {
            domain: domain.into(),
            code,
            message: message.into(),
        })
    }

    /// Fill in the parameter name of an error raised below the argument level
    pub fn for_parameter(self, param: &str) -> Self {
        let kind = match self.kind {
            ErrorKind::NumericOutOfRange { param: inner, expected, value } if inner.is_empty() => {
                ErrorKind::NumericOutOfRange {
                    param: param.to_string(),
                    expected,
                    value,
                }
            }
            ErrorKind::NullNotAllowed { param: inner } if inner.is_empty() => {
                ErrorKind::NullNotAllowed { param: param.to_string() }
            }
            ErrorKind::ArrayLengthUndeterminable { array } if array.is_empty() => {
                ErrorKind::ArrayLengthUndeterminable { array: param.to_string() }
            }
            other => other,
        };
        Self { kind, ..self }
    }

    /// Re-label an error raised while converting a value so that it names the
    /// argument, the argument's declared type and the host type actually given.
    pub fn for_argument(self, param: &str, expected: &str, found: &str) -> Self {
        match self.kind {
            ErrorKind::ArgumentTypeMismatch { .. } => Self {
                kind: ErrorKind::ArgumentTypeMismatch {
                    param: param.to_string(),
                    expected: expected.to_string(),
                    found: found.to_string(),
                },
                ..self
            },
            _ => self.for_parameter(param),
        }
    }

    pub fn is_null_not_allowed(&self) -> bool {
        matches!(self.kind, ErrorKind::NullNotAllowed { .. })
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(self.kind, ErrorKind::ArgumentTypeMismatch { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self.kind, ErrorKind::UnsupportedType { .. })
    }
}

impl fmt::Display for MarshalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(callable) = &self.callable {
            write!(f, "{}: ", callable)?;
        }
        write!(f, "{}", self.kind)?;

        for hint in &self.hints {
            write!(f, "\n  hint: {}", hint)?;
        }

        Ok(())
    }
}

impl std::error::Error for MarshalError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_message() {
        let err = MarshalError::type_mismatch("label", "utf8", "number");
        assert_eq!(
            err.to_string(),
            "Expected type 'utf8' for Argument 'label' but got type 'number'"
        );
    }

    #[test]
    fn test_null_message_with_callable() {
        let err = MarshalError::null_not_allowed("window").with_callable("gtk_widget_show");
        assert_eq!(
            err.to_string(),
            "gtk_widget_show: Argument 'window' may not be null or undefined"
        );
    }

    #[test]
    fn test_for_argument_relabels_mismatch_only() {
        let err = MarshalError::type_mismatch("", "gint32", "string")
            .for_argument("count", "array", "object");
        assert_eq!(
            err.kind,
            ErrorKind::ArgumentTypeMismatch {
                param: "count".into(),
                expected: "array".into(),
                found: "object".into(),
            }
        );

        let err = MarshalError::unsupported("GList", "argument type")
            .for_argument("count", "array", "object");
        assert!(err.is_unsupported());
        assert_eq!(err.to_string(), "argument type \"GList\" is unsupported");
    }

    #[test]
    fn test_hints_render_on_new_lines() {
        let err = MarshalError::array_length();
        let text = err.to_string();
        assert!(text.starts_with("unable to determine array length for C array\n"));
        assert!(text.contains("\n  hint: "));

        let err = MarshalError::array_length().for_parameter("items");
        assert!(err.to_string().starts_with("unable to determine array length for C array 'items'"));
    }
}
