// Copyright 2025 Meridian Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The OAuth2 scope grammar and scope trees.
//!
//! Meridian scopes may depend on other scopes. A transfer scope, for
//! example, depends on the data-access scopes of the collections it moves
//! data between. The authorization service expresses these relationships in
//! a small grammar: a scope name, optionally followed by a bracketed,
//! space-separated list of dependencies, each of which may be prefixed with
//! `*` to mark it optional:
//!
//! ```text
//! transfer_scope[*data_access_a data_access_b[data_access_c]]
//! ```
//!
//! [Scope] models one node of such a tree. [parse_scopes] converts the wire
//! form into trees, and the [Display][std::fmt::Display] implementation
//! converts them back, byte-for-byte for canonical inputs.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The URN prefix for scopes owned by a Meridian resource server.
const SCOPE_URN_PREFIX: &str = "urn:meridian:auth:scope";

/// Errors raised while parsing or constructing scope trees.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    /// The scope string does not match the grammar.
    #[error("malformed scope string at offset {offset}: {message}")]
    Parse {
        /// A description of the problem.
        message: String,
        /// The byte offset where the problem was detected.
        offset: usize,
    },

    /// A scope depends, directly or indirectly, on itself.
    #[error("scope dependency cycle: {}", path.join(" -> "))]
    Cycle {
        /// The dependency chain that closes the cycle.
        path: Vec<String>,
    },
}

/// A scope and its dependent scopes.
///
/// Equality considers the name, the optional flag, and the ordered
/// dependency list. Dependency order is preserved by parsing and
/// serialization; duplicate dependencies are permitted and preserved.
///
/// # Example
/// ```
/// # use meridian_auth::scopes::Scope;
/// let mut scope = Scope::new("transfer");
/// scope.add_dependency(Scope::optional("data_access"));
/// assert_eq!(scope.to_string(), "transfer[*data_access]");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scope {
    name: String,
    optional: bool,
    dependencies: Vec<Scope>,
}

impl Scope {
    /// Creates a scope with no dependencies.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or contains one of the reserved grammar
    /// characters (space, `[`, `]`, `*`).
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self::with_flag(name, false)
    }

    /// Creates a scope marked optional for the scope that depends on it.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or contains one of the reserved grammar
    /// characters (space, `[`, `]`, `*`).
    pub fn optional<S: Into<String>>(name: S) -> Self {
        Self::with_flag(name, true)
    }

    fn with_flag<S: Into<String>>(name: S, optional: bool) -> Self {
        let name = name.into();
        assert!(
            !name.is_empty() && !name.contains([' ', '[', ']', '*']),
            "invalid scope name: {name:?}"
        );
        Self {
            name,
            optional,
            dependencies: Vec::new(),
        }
    }

    /// Creates the well-known URN scope for a resource server.
    ///
    /// # Example
    /// ```
    /// # use meridian_auth::scopes::Scope;
    /// let scope = Scope::url("transfer.api.meridian.science", "all");
    /// assert_eq!(
    ///     scope.name(),
    ///     "urn:meridian:auth:scope:transfer.api.meridian.science:all"
    /// );
    /// ```
    pub fn url(resource_server: &str, name: &str) -> Self {
        Self::new(format!("{SCOPE_URN_PREFIX}:{resource_server}:{name}"))
    }

    /// The scope name, the identifier sent to the authorization service.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this scope is optional for the scope that depends on it.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// The ordered dependency list.
    pub fn dependencies(&self) -> &[Scope] {
        &self.dependencies
    }

    /// Appends `scope` to the dependency list.
    pub fn add_dependency(&mut self, scope: Scope) {
        self.dependencies.push(scope);
    }

    /// Appends `scope` to the dependency list, returning the extended scope.
    pub fn with_dependency(mut self, scope: Scope) -> Self {
        self.add_dependency(scope);
        self
    }

    /// Reports whether a grant of `self` subsumes a requirement of `other`.
    ///
    /// `self` contains `other` when the names match and every dependency of
    /// `other` is contained by some dependency of `self`. Optional flags do
    /// not affect containment, only the presence of names does.
    ///
    /// # Example
    /// ```
    /// # use meridian_auth::scopes::Scope;
    /// let granted = Scope::new("a").with_dependency(Scope::new("b"));
    /// assert!(granted.contains(&Scope::new("a")));
    /// assert!(!granted.contains(&Scope::new("a").with_dependency(Scope::new("c"))));
    /// ```
    pub fn contains(&self, other: &Scope) -> bool {
        self.name == other.name
            && other
                .dependencies
                .iter()
                .all(|required| self.dependencies.iter().any(|dep| dep.contains(required)))
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.optional {
            write!(f, "*")?;
        }
        write!(f, "{}", self.name)?;
        if let Some((first, rest)) = self.dependencies.split_first() {
            write!(f, "[{first}")?;
            for dep in rest {
                write!(f, " {dep}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

impl FromStr for Scope {
    type Err = ScopeError;

    /// Parses a string containing exactly one scope tree.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut scopes = parse_scopes(s)?;
        match (scopes.pop(), scopes.is_empty()) {
            (Some(scope), true) => Ok(scope),
            _ => Err(ScopeError::Parse {
                message: "expected exactly one scope".to_string(),
                offset: 0,
            }),
        }
    }
}

/// Parses a scope string into a list of scope trees.
///
/// The input may contain multiple space-separated top-level scopes. An
/// empty (or all-whitespace) input yields an empty list, not an error.
///
/// # Example
/// ```
/// # use meridian_auth::scopes::parse_scopes;
/// let scopes = parse_scopes("openid transfer[*data_access]")?;
/// assert_eq!(scopes.len(), 2);
/// # Ok::<(), meridian_auth::scopes::ScopeError>(())
/// ```
pub fn parse_scopes(text: &str) -> Result<Vec<Scope>, ScopeError> {
    let tokens = tokenize(text);
    let mut parser = Parser { tokens, pos: 0 };
    let mut scopes = Vec::new();
    while !parser.at_end() {
        let mut path = Vec::new();
        scopes.push(parser.scope(&mut path)?);
    }
    Ok(scopes)
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Word(String),
    Star,
    LBracket,
    RBracket,
}

fn tokenize(text: &str) -> Vec<(Token, usize)> {
    let mut tokens = Vec::new();
    let mut word_start: Option<usize> = None;
    for (offset, c) in text.char_indices() {
        match c {
            ' ' | '[' | ']' | '*' => {
                if let Some(start) = word_start.take() {
                    tokens.push((Token::Word(text[start..offset].to_string()), start));
                }
                match c {
                    '[' => tokens.push((Token::LBracket, offset)),
                    ']' => tokens.push((Token::RBracket, offset)),
                    '*' => tokens.push((Token::Star, offset)),
                    _ => {}
                }
            }
            _ => {
                word_start.get_or_insert(offset);
            }
        }
    }
    if let Some(start) = word_start {
        tokens.push((Token::Word(text[start..].to_string()), start));
    }
    tokens
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&(Token, usize)> {
        self.tokens.get(self.pos)
    }

    fn end_offset(&self) -> usize {
        self.tokens
            .last()
            .map(|(t, o)| {
                o + match t {
                    Token::Word(w) => w.len(),
                    _ => 1,
                }
            })
            .unwrap_or(0)
    }

    fn error(&self, message: impl Into<String>) -> ScopeError {
        let offset = self
            .peek()
            .map(|(_, o)| *o)
            .unwrap_or_else(|| self.end_offset());
        ScopeError::Parse {
            message: message.into(),
            offset,
        }
    }

    // scope := '*'? name ('[' scope+ ']')?
    //
    // `path` holds the ancestor names; a dependency matching one of them
    // closes a cycle.
    fn scope(&mut self, path: &mut Vec<String>) -> Result<Scope, ScopeError> {
        let optional = matches!(self.peek(), Some((Token::Star, _)));
        if optional {
            self.pos += 1;
        }

        let name = match self.peek() {
            Some((Token::Word(name), _)) => name.clone(),
            _ => return Err(self.error("expected a scope name")),
        };
        self.pos += 1;

        if path.iter().any(|ancestor| ancestor == &name) {
            let mut cycle = path.clone();
            cycle.push(name);
            return Err(ScopeError::Cycle { path: cycle });
        }

        let mut scope = Scope {
            name: name.clone(),
            optional,
            dependencies: Vec::new(),
        };
        if matches!(self.peek(), Some((Token::LBracket, _))) {
            self.pos += 1;
            path.push(name);
            loop {
                match self.peek() {
                    Some((Token::RBracket, _)) => {
                        if scope.dependencies.is_empty() {
                            return Err(self.error("empty dependency list"));
                        }
                        self.pos += 1;
                        break;
                    }
                    Some(_) => scope.add_dependency(self.scope(path)?),
                    None => return Err(self.error("unbalanced brackets, expected `]`")),
                }
            }
            path.pop();
        }
        Ok(scope)
    }
}
