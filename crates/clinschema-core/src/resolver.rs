//! Dependency resolution.
//!
//! Orders a [`SchemaModel`] so every object comes strictly after everything in
//! its `depends_on`. Uses Kahn's algorithm; among objects that are ready at
//! the same time, the one with the smallest `(kind rank, name)` goes first, so
//! the order is fully determined by the model and not by insertion order.

use crate::catalog::{ObjectId, SchemaModel, SchemaObject};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Errors that prevent a valid order from existing. Fatal to a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The dependency graph has a cycle.
    #[error("cyclic dependency: {}", format_cycle(.cycle))]
    CyclicDependency {
        /// One participating cycle, in dependency direction. The first
        /// object is repeated at the end.
        cycle: Vec<ObjectId>,
    },

    /// An object depends on something that is not in the model.
    #[error("{object} depends on {missing}, which is not in the model")]
    UnresolvedDependency {
        /// The dependent object.
        object: ObjectId,
        /// The missing dependency.
        missing: ObjectId,
    },
}

fn format_cycle(cycle: &[ObjectId]) -> String {
    cycle
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Topological sorter for schema models.
pub struct DependencyResolver;

impl DependencyResolver {
    /// Resolve the model into an apply order, returning owned objects.
    pub fn resolve(model: &SchemaModel) -> Result<Vec<SchemaObject>, ResolveError> {
        let objects: Vec<&SchemaObject> = model.iter().collect();
        let order = Self::sort(&objects)?;
        Ok(order.into_iter().map(|idx| objects[idx].clone()).collect())
    }

    /// Resolve the model into an ordered list of identifiers.
    pub fn order(model: &SchemaModel) -> Result<Vec<ObjectId>, ResolveError> {
        let objects: Vec<&SchemaObject> = model.iter().collect();
        let order = Self::sort(&objects)?;
        Ok(order.into_iter().map(|idx| objects[idx].id()).collect())
    }

    fn sort(objects: &[&SchemaObject]) -> Result<Vec<usize>, ResolveError> {
        let ids: Vec<ObjectId> = objects.iter().map(|o| o.id()).collect();
        let positions: HashMap<&ObjectId, usize> =
            ids.iter().enumerate().map(|(idx, id)| (id, idx)).collect();

        let mut in_degree = vec![0usize; objects.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); objects.len()];

        for (idx, object) in objects.iter().enumerate() {
            for dep in &object.depends_on {
                let &dep_idx =
                    positions
                        .get(dep)
                        .ok_or_else(|| ResolveError::UnresolvedDependency {
                            object: ids[idx].clone(),
                            missing: dep.clone(),
                        })?;
                in_degree[idx] += 1;
                dependents[dep_idx].push(idx);
            }
        }

        // Ordered by (kind rank, name); the index only breaks ties between
        // equal ids, which the model forbids.
        let mut ready: BTreeSet<(&ObjectId, usize)> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &degree)| degree == 0)
            .map(|(idx, _)| (&ids[idx], idx))
            .collect();

        let mut order = Vec::with_capacity(objects.len());
        let mut emitted = vec![false; objects.len()];

        while let Some((_, idx)) = ready.pop_first() {
            order.push(idx);
            emitted[idx] = true;
            for &dependent in &dependents[idx] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert((&ids[dependent], dependent));
                }
            }
        }

        if order.len() < objects.len() {
            let cycle = Self::find_cycle(objects, &ids, &positions, &emitted);
            tracing::error!(cycle = %format_cycle(&cycle), "dependency cycle detected");
            return Err(ResolveError::CyclicDependency { cycle });
        }

        Ok(order)
    }

    /// Walk unemitted dependencies from the smallest blocked object until a
    /// node repeats. Every blocked object has at least one blocked
    /// dependency, so the walk always closes a cycle.
    fn find_cycle(
        objects: &[&SchemaObject],
        ids: &[ObjectId],
        positions: &HashMap<&ObjectId, usize>,
        emitted: &[bool],
    ) -> Vec<ObjectId> {
        let start = (0..objects.len())
            .filter(|&idx| !emitted[idx])
            .min_by(|&a, &b| ids[a].cmp(&ids[b]));

        let Some(mut current) = start else {
            return Vec::new();
        };

        let mut path: Vec<usize> = Vec::new();
        let mut seen_at: HashMap<usize, usize> = HashMap::new();

        loop {
            if let Some(&pos) = seen_at.get(&current) {
                let mut cycle: Vec<ObjectId> =
                    path[pos..].iter().map(|&idx| ids[idx].clone()).collect();
                cycle.push(ids[current].clone());
                return cycle;
            }
            seen_at.insert(current, path.len());
            path.push(current);

            let next = objects[current]
                .depends_on
                .iter()
                .filter_map(|dep| positions.get(dep).copied())
                .find(|&idx| !emitted[idx]);

            match next {
                Some(idx) => current = idx,
                None => return path.iter().map(|&idx| ids[idx].clone()).collect(),
            }
        }
    }
}
