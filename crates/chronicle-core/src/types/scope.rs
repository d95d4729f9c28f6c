use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChronicleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Read,
    Write,
}

/// How far a grant reaches: every record, or only records whose authority
/// is the credential's own identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Breadth {
    Mine,
    All,
}

/// One authorization grant: an access mode paired with a breadth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Scope {
    pub mode: AccessMode,
    pub breadth: Breadth,
}

impl Scope {
    pub const READ_ALL: Scope = Scope {
        mode: AccessMode::Read,
        breadth: Breadth::All,
    };
    pub const READ_MINE: Scope = Scope {
        mode: AccessMode::Read,
        breadth: Breadth::Mine,
    };
    pub const WRITE_ALL: Scope = Scope {
        mode: AccessMode::Write,
        breadth: Breadth::All,
    };
    pub const WRITE_MINE: Scope = Scope {
        mode: AccessMode::Write,
        breadth: Breadth::Mine,
    };
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            AccessMode::Read => "read",
            AccessMode::Write => "write",
        };
        match self.breadth {
            Breadth::All => write!(f, "statements/{mode}"),
            Breadth::Mine => write!(f, "statements/{mode}/mine"),
        }
    }
}

impl FromStr for Scope {
    type Err = ChronicleError;

    /// Parse the credential-file scope notation: `statements/read`,
    /// `statements/read/mine`, `statements/write`, `statements/write/mine`.
    /// The `statements/` prefix is optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix("statements/").unwrap_or(s);
        let (mode, breadth) = match trimmed.split_once('/') {
            Some((mode, "mine")) => (mode, Breadth::Mine),
            Some(_) => {
                return Err(ChronicleError::Config(format!("unknown scope {s:?}")));
            }
            None => (trimmed, Breadth::All),
        };
        let mode = match mode {
            "read" => AccessMode::Read,
            "write" => AccessMode::Write,
            _ => return Err(ChronicleError::Config(format!("unknown scope {s:?}"))),
        };
        Ok(Scope { mode, breadth })
    }
}

impl TryFrom<String> for Scope {
    type Error = ChronicleError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.to_string()
    }
}

/// The scopes a credential resolved to, bound to its authority identity.
///
/// Resolved per request through the access gate; never outlives the gate's
/// time-bounded cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSet {
    scopes: Vec<Scope>,
    authority: String,
}

impl ScopeSet {
    pub fn new(authority: impl Into<String>, scopes: Vec<Scope>) -> Self {
        Self {
            scopes,
            authority: authority.into(),
        }
    }

    /// The identity statements written under this credential are attributed
    /// to, and that `Mine`-breadth reads are narrowed to.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// The widest breadth granted for `mode`, if any. `All` beats `Mine`.
    pub fn grant(&self, mode: AccessMode) -> Option<Breadth> {
        self.scopes
            .iter()
            .filter(|s| s.mode == mode)
            .map(|s| s.breadth)
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_scope_notation() {
        assert_eq!("statements/read".parse::<Scope>().unwrap(), Scope::READ_ALL);
        assert_eq!(
            "statements/read/mine".parse::<Scope>().unwrap(),
            Scope::READ_MINE
        );
        assert_eq!("write".parse::<Scope>().unwrap(), Scope::WRITE_ALL);
        assert!("statements/admin".parse::<Scope>().is_err());
        assert!("read/theirs".parse::<Scope>().is_err());
    }

    #[test]
    fn widest_grant_wins() {
        let set = ScopeSet::new("mailto:a@b", vec![Scope::READ_MINE, Scope::READ_ALL]);
        assert_eq!(set.grant(AccessMode::Read), Some(Breadth::All));
        assert_eq!(set.grant(AccessMode::Write), None);

        let mine_only = ScopeSet::new("mailto:a@b", vec![Scope::READ_MINE]);
        assert_eq!(mine_only.grant(AccessMode::Read), Some(Breadth::Mine));
    }
}
