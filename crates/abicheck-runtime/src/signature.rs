//! Signature lexer
//!
//! Turns signature text such as `d{ic}ip` into a return type followed by
//! positioned argument tokens. The first token is always the return type.
//! Aggregate tokens are resolved through the `AggregateRegistry`, which also
//! supplies their length; the lexer does not look inside them.
//!
//! The token list is produced once per case and shared by the marshal pass and
//! the verification pass.

use crate::registry::{AggregateRef, AggregateRegistry};
use crate::types::{ScalarType, AGGREGATE_TAG, VOID_TAG};
use thiserror::Error;

/// Signature grammar errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("empty signature")]
    Empty,

    #[error("unknown rtype sig at '{rest}'")]
    UnknownReturnAggregate { rest: String },

    #[error("unknown rtype '{tag}'")]
    UnknownReturnType { tag: char },

    #[error("unknown sig at '{rest}' (offset {offset})")]
    UnknownAggregate { offset: usize, rest: String },

    #[error("unknown atype '{tag}' (offset {offset})")]
    UnknownArgumentType { tag: char, offset: usize },
}

/// Return type of a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnType {
    Void,
    Scalar(ScalarType),
    Aggregate(AggregateRef),
}

/// What an argument token holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Scalar(ScalarType),
    Aggregate(AggregateRef),
}

/// One argument of a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgToken {
    pub kind: ArgKind,
    /// 1-based argument position, the index into the value tables
    pub position: usize,
    /// Byte offset of the token in the signature text
    pub offset: usize,
}

impl ArgToken {
    /// Signature tag of this token (`{` for aggregates)
    pub fn tag(&self) -> char {
        match self.kind {
            ArgKind::Scalar(ty) => ty.tag(),
            ArgKind::Aggregate(_) => AGGREGATE_TAG,
        }
    }
}

/// A lexed signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    text: String,
    ret: ReturnType,
    args: Vec<ArgToken>,
}

impl Signature {
    /// Lex a signature against the given registry
    ///
    /// # Examples
    ///
    /// ```
    /// # use abicheck_runtime::registry::AggregateRegistry;
    /// # use abicheck_runtime::signature::{ReturnType, Signature};
    /// # use abicheck_runtime::types::ScalarType;
    /// let sig = Signature::parse("ifd", &AggregateRegistry::new()).unwrap();
    /// assert_eq!(sig.return_type(), ReturnType::Scalar(ScalarType::Int));
    /// assert_eq!(sig.args().len(), 2);
    /// assert_eq!(sig.last_position(), 2);
    /// ```
    pub fn parse(text: &str, registry: &AggregateRegistry) -> Result<Self, SignatureError> {
        let first = text.chars().next().ok_or(SignatureError::Empty)?;

        let (ret, mut cursor) = if first == AGGREGATE_TAG {
            let found = registry
                .resolve(text)
                .ok_or_else(|| SignatureError::UnknownReturnAggregate {
                    rest: text.to_string(),
                })?;
            (ReturnType::Aggregate(found), found.len)
        } else if first == VOID_TAG {
            (ReturnType::Void, first.len_utf8())
        } else {
            let ty = ScalarType::from_tag(first)
                .ok_or(SignatureError::UnknownReturnType { tag: first })?;
            (ReturnType::Scalar(ty), first.len_utf8())
        };

        let mut args = Vec::new();
        while let Some(tag) = text[cursor..].chars().next() {
            let position = args.len() + 1;
            let offset = cursor;

            let (kind, len) = if tag == AGGREGATE_TAG {
                let rest = &text[cursor..];
                let found =
                    registry
                        .resolve(rest)
                        .ok_or_else(|| SignatureError::UnknownAggregate {
                            offset,
                            rest: rest.to_string(),
                        })?;
                (ArgKind::Aggregate(found), found.len)
            } else {
                let ty = ScalarType::from_tag(tag)
                    .ok_or(SignatureError::UnknownArgumentType { tag, offset })?;
                (ArgKind::Scalar(ty), tag.len_utf8())
            };

            args.push(ArgToken {
                kind,
                position,
                offset,
            });
            cursor += len;
        }

        Ok(Self {
            text: text.to_string(),
            ret,
            args,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn return_type(&self) -> ReturnType {
        self.ret
    }

    pub fn args(&self) -> &[ArgToken] {
        &self.args
    }

    /// Position of the last argument; 0 when there are none
    ///
    /// The return value is checked against the expected table at this position.
    pub fn last_position(&self) -> usize {
        self.args.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{AggregateDescriptor, Field};
    use crate::registry::AggregateEntry;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn cc() -> AggregateDescriptor {
        AggregateDescriptor::new(vec![Field::scalar(ScalarType::Char).repeated(2)])
    }

    fn icc_d() -> AggregateDescriptor {
        AggregateDescriptor::new(vec![
            Field::scalar(ScalarType::Int),
            Field::aggregate(cc()),
            Field::scalar(ScalarType::Double),
        ])
    }

    fn registry() -> AggregateRegistry {
        AggregateRegistry::new()
            .with(AggregateEntry::new("{c[2]}", cc, |a, b| a == b))
            .with(AggregateEntry::new("{i{c[2]}d}", icc_d, |a, b| a == b))
    }

    #[test]
    fn test_scalar_signature() {
        let sig = Signature::parse("vicsjlpfd", &registry()).unwrap();
        assert_eq!(sig.return_type(), ReturnType::Void);

        let tags: String = sig.args().iter().map(ArgToken::tag).collect();
        assert_eq!(tags, "icsjlpfd");

        let positions: Vec<usize> = sig.args().iter().map(|a| a.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(sig.last_position(), 8);
    }

    #[test]
    fn test_aggregate_tokens_consume_registry_length() {
        let sig = Signature::parse("{c[2]}i{i{c[2]}d}{c[2]}", &registry()).unwrap();

        assert_eq!(
            sig.return_type(),
            ReturnType::Aggregate(AggregateRef { index: 0, len: 6 })
        );
        assert_eq!(
            sig.args(),
            &[
                ArgToken {
                    kind: ArgKind::Scalar(ScalarType::Int),
                    position: 1,
                    offset: 6,
                },
                ArgToken {
                    kind: ArgKind::Aggregate(AggregateRef { index: 1, len: 10 }),
                    position: 2,
                    offset: 7,
                },
                ArgToken {
                    kind: ArgKind::Aggregate(AggregateRef { index: 0, len: 6 }),
                    position: 3,
                    offset: 17,
                },
            ]
        );
    }

    #[test]
    fn test_return_only_signature() {
        let sig = Signature::parse("d", &registry()).unwrap();
        assert!(sig.args().is_empty());
        assert_eq!(sig.last_position(), 0);
    }

    #[rstest]
    #[case::empty("", SignatureError::Empty)]
    #[case::unknown_return_tag("xi", SignatureError::UnknownReturnType { tag: 'x' })]
    #[case::unknown_return_aggregate(
        "{zz}i",
        SignatureError::UnknownReturnAggregate { rest: "{zz}i".to_string() }
    )]
    #[case::unknown_arg_tag("iiq", SignatureError::UnknownArgumentType { tag: 'q', offset: 2 })]
    #[case::void_argument("vv", SignatureError::UnknownArgumentType { tag: 'v', offset: 1 })]
    #[case::unknown_arg_aggregate(
        "v{...}",
        SignatureError::UnknownAggregate { offset: 1, rest: "{...}".to_string() }
    )]
    fn test_grammar_errors(#[case] text: &str, #[case] expected: SignatureError) {
        assert_eq!(Signature::parse(text, &registry()), Err(expected));
    }

    #[test]
    fn test_return_type_checked_before_arguments() {
        assert_eq!(
            Signature::parse("xq", &registry()),
            Err(SignatureError::UnknownReturnType { tag: 'x' })
        );
    }

    #[test]
    fn test_error_messages() {
        let err = Signature::parse("v{...}", &registry()).unwrap_err();
        assert_eq!(err.to_string(), "unknown sig at '{...}' (offset 1)");
    }
}
