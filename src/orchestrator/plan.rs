//! Dependency-ordered execution stages.

use crate::config::ConfigError;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Detectors grouped into stages. Every detector's dependencies sit in an
/// earlier stage; within a stage, declaration order is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    stages: Vec<Vec<String>>,
}

impl ExecutionPlan {
    /// Build a plan over `order`.
    ///
    /// With no explicit `dependencies`, each detector depends on the one
    /// declared before it. Detectors for which `enabled` is false are left
    /// out, and whoever depended on them inherits their dependencies.
    pub fn build(
        order: &[String],
        dependencies: &BTreeMap<String, Vec<String>>,
        enabled: impl Fn(&str) -> bool,
    ) -> Result<Self, ConfigError> {
        let mut names: Vec<&str> = Vec::with_capacity(order.len());
        for name in order {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }

        let edges = edges(&names, dependencies)?;
        check_acyclic(&names, &edges)?;

        let active: Vec<&str> = names.iter().copied().filter(|n| enabled(n)).collect();
        let active_set: HashSet<&str> = active.iter().copied().collect();
        let bridged: HashMap<&str, HashSet<&str>> = active
            .iter()
            .map(|&name| (name, effective_deps(name, &edges, &active_set)))
            .collect();

        let mut placed: HashMap<&str, usize> = HashMap::new();
        let mut stages = Vec::new();
        while placed.len() < active.len() {
            let stage: Vec<&str> = active
                .iter()
                .copied()
                .filter(|n| !placed.contains_key(n))
                .filter(|n| bridged[n].iter().all(|d| placed.contains_key(d)))
                .collect();
            if stage.is_empty() {
                // Only reachable if check_acyclic let a cycle through.
                return Err(ConfigError::CyclicDependency(
                    active
                        .iter()
                        .filter(|n| !placed.contains_key(*n))
                        .map(|n| n.to_string())
                        .collect(),
                ));
            }
            for &name in &stage {
                placed.insert(name, stages.len());
            }
            stages.push(stage.into_iter().map(str::to_string).collect());
        }

        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Vec<String>] {
        &self.stages
    }

    pub fn stage_of(&self, name: &str) -> Option<usize> {
        self.stages
            .iter()
            .position(|stage| stage.iter().any(|n| n == name))
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Every planned detector, stage by stage.
    pub fn detectors(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().flatten().map(String::as_str)
    }
}

fn edges<'a>(
    names: &[&'a str],
    dependencies: &'a BTreeMap<String, Vec<String>>,
) -> Result<HashMap<&'a str, Vec<&'a str>>, ConfigError> {
    let mut edges: HashMap<&str, Vec<&str>> = names.iter().map(|&n| (n, Vec::new())).collect();

    if dependencies.is_empty() {
        for pair in names.windows(2) {
            if let Some(deps) = edges.get_mut(pair[1]) {
                deps.push(pair[0]);
            }
        }
        return Ok(edges);
    }

    for (detector, deps) in dependencies {
        let Some(&key) = names.iter().find(|&&n| n == detector.as_str()) else {
            return Err(ConfigError::UnknownDetector(detector.clone()));
        };
        for dep in deps {
            let Some(&dep) = names.iter().find(|&&n| n == dep.as_str()) else {
                return Err(ConfigError::UnknownDependency {
                    detector: detector.clone(),
                    dependency: dep.clone(),
                });
            };
            if let Some(list) = edges.get_mut(key) {
                list.push(dep);
            }
        }
    }
    Ok(edges)
}

fn check_acyclic(names: &[&str], edges: &HashMap<&str, Vec<&str>>) -> Result<(), ConfigError> {
    let mut remaining: Vec<&str> = names.to_vec();
    let mut done: HashSet<&str> = HashSet::new();
    loop {
        let ready: Vec<&str> = remaining
            .iter()
            .copied()
            .filter(|n| edges[n].iter().all(|d| done.contains(d)))
            .collect();
        if ready.is_empty() {
            break;
        }
        done.extend(ready);
        remaining.retain(|n| !done.contains(n));
    }

    if remaining.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::CyclicDependency(
            remaining.into_iter().map(str::to_string).collect(),
        ))
    }
}

/// Dependencies of `name`, looking through disabled detectors.
fn effective_deps<'a>(
    name: &'a str,
    edges: &HashMap<&'a str, Vec<&'a str>>,
    active: &HashSet<&'a str>,
) -> HashSet<&'a str> {
    let mut out = HashSet::new();
    let mut seen = HashSet::new();
    let mut stack: Vec<&str> = edges[name].clone();
    while let Some(dep) = stack.pop() {
        if !seen.insert(dep) {
            continue;
        }
        if active.contains(dep) {
            out.insert(dep);
        } else {
            stack.extend(edges[dep].iter().copied());
        }
    }
    out
}
