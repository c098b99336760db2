//! Declared call signatures of entrypoint objects

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    VarPositional,
    KeywordOnly,
    VarKeyword,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub has_default: bool,
}

impl Param {
    pub fn positional(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ParamKind::PositionalOrKeyword,
            has_default: false,
        }
    }

    pub fn optional(name: &str) -> Self {
        Self {
            has_default: true,
            ..Self::positional(name)
        }
    }

    pub fn of_kind(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            has_default: false,
        }
    }

    fn is_required_positional(&self) -> bool {
        !self.has_default
            && matches!(
                self.kind,
                ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword
            )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    params: Vec<Param>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no signature available for {0}")]
pub struct SignatureError(pub String);

impl Signature {
    pub const fn new(params: Vec<Param>) -> Self {
        Self { params }
    }

    /// Signature with the given required positional parameter names
    pub fn positional(names: &[&str]) -> Self {
        Self::new(names.iter().map(|n| Param::positional(n)).collect())
    }

    #[must_use]
    pub fn with(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Parameters a caller must pass positionally: positional-only or
    /// positional-or-keyword, without a default.
    pub fn required_positional(&self) -> usize {
        self.params
            .iter()
            .filter(|p| p.is_required_positional())
            .count()
    }
}
