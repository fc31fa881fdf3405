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

//! Consent trees reported by the authorization service.
//!
//! A consent records that a user allowed an application a given scope. When
//! a scope depends on other scopes, the dependent grants are recorded as
//! separate consents referencing each other by id. The authorization
//! service reports them as a flat list; [ConsentForest] reassembles that
//! list into trees, rooted at the consents no other consent depends on.
//!
//! The forest is read-only: build it from a service response, query it, and
//! discard it.

use crate::scopes::Scope;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Errors raised while assembling a [ConsentForest].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConsentForestError {
    /// A consent references a dependency id absent from the response.
    #[error("consent {referenced_by} depends on unknown consent {id}")]
    MissingConsent {
        /// The id that could not be resolved.
        id: u64,
        /// The consent whose dependency list references it.
        referenced_by: u64,
    },

    /// Following dependency edges revisits a consent already on the path.
    #[error("consent dependency cycle: {path:?}")]
    Cycle {
        /// The dependency chain that closes the cycle.
        path: Vec<u64>,
    },

    /// The response lists the same consent id twice.
    #[error("duplicate consent id {0}")]
    DuplicateConsent(u64),
}

/// One consent entry as reported by the authorization service.
///
/// Unknown response fields are ignored.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct ConsentRecord {
    /// The consent id, unique within the response.
    pub id: u64,
    /// The name of the granted scope.
    pub scope_name: String,
    /// Ids of the consents this one depends on.
    #[serde(default)]
    pub dependencies: Vec<u64>,
}

impl ConsentRecord {
    /// Creates a record, mostly useful in tests.
    pub fn new<S: Into<String>>(id: u64, scope_name: S, dependencies: Vec<u64>) -> Self {
        Self {
            id,
            scope_name: scope_name.into(),
            dependencies,
        }
    }
}

/// A granted scope and the dependent grants it relies on.
#[derive(Debug)]
pub struct Consent {
    id: u64,
    scope_name: String,
    dependencies: Vec<Arc<Consent>>,
}

impl Consent {
    /// The consent id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The name of the granted scope.
    pub fn scope_name(&self) -> &str {
        &self.scope_name
    }

    /// The consents this one depends on.
    pub fn dependencies(&self) -> &[Arc<Consent>] {
        &self.dependencies
    }

    // A consent satisfies a scope requirement when the names match at every
    // level of the requirement tree.
    fn satisfies(&self, scope: &Scope) -> bool {
        self.scope_name == scope.name()
            && scope
                .dependencies()
                .iter()
                .all(|required| self.dependencies.iter().any(|dep| dep.satisfies(required)))
    }
}

/// The consent trees granted to an application.
///
/// # Example
/// ```
/// # use meridian_auth::consents::{ConsentForest, ConsentRecord};
/// let forest = ConsentForest::new(vec![
///     ConsentRecord::new(1, "transfer", vec![2]),
///     ConsentRecord::new(2, "data_access", vec![]),
/// ])?;
/// assert_eq!(forest.roots().len(), 1);
/// assert!(forest.contains(&"transfer[data_access]".parse()?));
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct ConsentForest {
    roots: Vec<Arc<Consent>>,
    nodes: HashMap<u64, Arc<Consent>>,
}

impl ConsentForest {
    /// Assembles a forest from the flat consent list of a service response.
    ///
    /// Dependency ids are resolved to shared subtrees: when several
    /// consents depend on the same id, they share one [Consent] node. The
    /// roots are the consents no other consent references.
    pub fn new(records: Vec<ConsentRecord>) -> Result<Self, ConsentForestError> {
        let mut index = HashMap::new();
        for record in &records {
            if index.insert(record.id, record).is_some() {
                return Err(ConsentForestError::DuplicateConsent(record.id));
            }
        }

        let referenced: HashSet<u64> = records
            .iter()
            .flat_map(|r| r.dependencies.iter().copied())
            .collect();

        let mut nodes: HashMap<u64, Arc<Consent>> = HashMap::new();
        for record in &records {
            build_subtree(record.id, &index, &mut nodes)?;
        }

        let roots = records
            .iter()
            .filter(|r| !referenced.contains(&r.id))
            .map(|r| nodes[&r.id].clone())
            .collect();
        Ok(Self { roots, nodes })
    }

    /// The trees no other consent depends on, in response order.
    pub fn roots(&self) -> &[Arc<Consent>] {
        &self.roots
    }

    /// Looks up a consent, root or not, by id.
    pub fn get(&self, id: u64) -> Option<&Consent> {
        self.nodes.get(&id).map(Arc::as_ref)
    }

    /// Reports whether some tree grants the given scope requirement.
    ///
    /// The requirement is matched from the roots down: the scope name must
    /// match a root, and every dependency of the requirement must be
    /// satisfied by a dependent consent, recursively. Optional markers in
    /// the requirement are ignored, a consent either exists or does not.
    pub fn contains(&self, scope: &Scope) -> bool {
        self.roots.iter().any(|root| root.satisfies(scope))
    }

    /// Reports whether every scope in `scopes` is granted.
    ///
    /// The requirements are parsed scope trees, typically from
    /// [parse_scopes][crate::scopes::parse_scopes].
    pub fn contains_scopes<'a, I>(&self, scopes: I) -> bool
    where
        I: IntoIterator<Item = &'a Scope>,
    {
        scopes.into_iter().all(|scope| self.contains(scope))
    }
}

// The construction walk for one subtree.
//
// Iterative, with an explicit stack and visiting set: a cyclic response
// must surface as an error, not as a stack overflow.
fn build_subtree(
    start: u64,
    index: &HashMap<u64, &ConsentRecord>,
    nodes: &mut HashMap<u64, Arc<Consent>>,
) -> Result<(), ConsentForestError> {
    enum Visit {
        Enter(u64),
        Exit(u64),
    }

    let mut on_path: HashSet<u64> = HashSet::new();
    let mut path: Vec<u64> = Vec::new();
    let mut stack = vec![Visit::Enter(start)];

    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Enter(id) => {
                if nodes.contains_key(&id) {
                    // Memoized from an earlier walk, or shared within this one.
                    continue;
                }
                on_path.insert(id);
                path.push(id);
                stack.push(Visit::Exit(id));

                let record = index[&id];
                for &dep in &record.dependencies {
                    if !index.contains_key(&dep) {
                        return Err(ConsentForestError::MissingConsent {
                            id: dep,
                            referenced_by: id,
                        });
                    }
                    if on_path.contains(&dep) {
                        let mut cycle = path.clone();
                        cycle.push(dep);
                        return Err(ConsentForestError::Cycle { path: cycle });
                    }
                    if !nodes.contains_key(&dep) {
                        stack.push(Visit::Enter(dep));
                    }
                }
            }
            Visit::Exit(id) => {
                on_path.remove(&id);
                path.pop();

                let record = index[&id];
                let dependencies = record
                    .dependencies
                    .iter()
                    .map(|dep| nodes[dep].clone())
                    .collect();
                nodes.insert(
                    id,
                    Arc::new(Consent {
                        id,
                        scope_name: record.scope_name.clone(),
                        dependencies,
                    }),
                );
            }
        }
    }
    Ok(())
}
