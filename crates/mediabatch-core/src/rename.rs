//! Rename order resolution.
//!
//! Renames form a graph over locations: every source has one edge to its
//! destination. A rename may only run once its destination has been vacated,
//! so the order is a topological sort of the reversed graph. Locations
//! nobody renames away from are free from the start.
//!
//! The sort runs as a step function so callers can put a suspend point
//! between steps.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::path::{Path, PathBuf};

/// Why a file cannot be renamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameIssue {
    /// Another file renames to the same destination
    NotUnique,
    /// The destination exists and is not renamed away
    DestinationExists { destination: PathBuf },
    /// Part of (or waiting on) a rename cycle
    Circular { remaining: usize },
}

impl fmt::Display for RenameIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenameIssue::NotUnique => f.write_str("Destination not unique"),
            RenameIssue::DestinationExists { destination } => {
                write!(f, "Destination {} exists", destination.display())
            }
            RenameIssue::Circular { remaining } => {
                write!(f, "Circular rename ({remaining} pending)")
            }
        }
    }
}

/// One rename, identified by a caller key.
#[derive(Debug, Clone)]
pub struct RenameRequest<K> {
    pub key: K,
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Result of one resolver step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Done,
}

/// Execution order plus the issues found on the way.
#[derive(Debug, Clone)]
pub struct Resolution<K> {
    /// Keys in an order where no rename overwrites a pending source
    pub order: Vec<K>,
    /// Issues by key; when non-empty the order must not be executed
    pub issues: HashMap<K, RenameIssue>,
}

impl<K> Resolution<K> {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

#[derive(Debug)]
enum Phase {
    Sorting,
    Leftovers(std::vec::IntoIter<PathBuf>),
    Done,
}

/// Kahn sort over rename locations, one location per step.
#[derive(Debug)]
pub struct RenameResolver<K> {
    sources: BTreeMap<PathBuf, (K, PathBuf)>,
    incoming: BTreeMap<PathBuf, Vec<PathBuf>>,
    out_degree: BTreeMap<PathBuf, usize>,
    ready: Vec<PathBuf>,
    order: Vec<K>,
    issues: HashMap<K, RenameIssue>,
    phase: Phase,
}

impl<K: Copy + Eq + Hash> RenameResolver<K> {
    /// Build the graph and validate destinations. `exists` tells whether a
    /// location is occupied on disk.
    pub fn new<I, F>(requests: I, exists: F) -> Self
    where
        I: IntoIterator<Item = RenameRequest<K>>,
        F: Fn(&Path) -> bool,
    {
        let mut sources = BTreeMap::new();
        let mut incoming: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
        let mut out_degree = BTreeMap::new();

        for request in requests {
            incoming
                .entry(request.destination.clone())
                .or_default()
                .push(request.source.clone());
            *out_degree.entry(request.source.clone()).or_insert(0) += 1;
            out_degree.entry(request.destination.clone()).or_insert(0);
            sources.insert(request.source, (request.key, request.destination));
        }

        let mut issues = HashMap::new();
        for (destination, contributors) in &incoming {
            if contributors.len() > 1 {
                for source in contributors {
                    if let Some((key, _)) = sources.get(source) {
                        issues.insert(*key, RenameIssue::NotUnique);
                    }
                }
            } else if !sources.contains_key(destination) && exists(destination) {
                if let Some((key, _)) = sources.get(&contributors[0]) {
                    issues.insert(
                        *key,
                        RenameIssue::DestinationExists {
                            destination: destination.clone(),
                        },
                    );
                }
            }
        }

        // Popped from the back, so reverse to start with the first location
        let ready = out_degree
            .iter()
            .rev()
            .filter(|(_, degree)| **degree == 0)
            .map(|(location, _)| location.clone())
            .collect();

        Self {
            sources,
            incoming,
            out_degree,
            ready,
            order: Vec::new(),
            issues,
            phase: Phase::Sorting,
        }
    }

    /// Process one location, or one leftover source once sorting is done.
    pub fn step(&mut self) -> Step {
        match &mut self.phase {
            Phase::Done => Step::Done,
            Phase::Sorting => {
                let Some(location) = self.ready.pop() else {
                    let leftovers: Vec<PathBuf> = self
                        .sources
                        .keys()
                        .filter(|source| self.out_degree.get(*source).is_some_and(|d| *d > 0))
                        .cloned()
                        .collect();
                    self.phase = Phase::Leftovers(leftovers.into_iter());
                    return Step::Continue;
                };

                if let Some(contributors) = self.incoming.get(&location) {
                    for source in contributors {
                        if let Some(degree) = self.out_degree.get_mut(source) {
                            *degree -= 1;
                            if *degree == 0 {
                                self.ready.push(source.clone());
                            }
                        }
                    }
                }
                if let Some((key, _)) = self.sources.get(&location) {
                    self.order.push(*key);
                }
                Step::Continue
            }
            Phase::Leftovers(leftovers) => {
                let Some(source) = leftovers.next() else {
                    self.phase = Phase::Done;
                    return Step::Done;
                };
                if let Some((key, destination)) = self.sources.get(&source) {
                    // A file renamed onto itself just stays where it is
                    if *destination != source {
                        let remaining = self.out_degree.get(&source).copied().unwrap_or(0);
                        self.issues
                            .insert(*key, RenameIssue::Circular { remaining });
                    }
                }
                Step::Continue
            }
        }
    }

    /// Run the remaining steps and return the result.
    pub fn resolve(mut self) -> Resolution<K> {
        while self.step() == Step::Continue {}
        self.finish()
    }

    /// Result so far; complete once [`step`](Self::step) returned `Done`.
    pub fn finish(self) -> Resolution<K> {
        Resolution {
            order: self.order,
            issues: self.issues,
        }
    }
}
