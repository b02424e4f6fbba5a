//! Lazy relationship descriptors
//!
//! One descriptor exists per (entity, relationship name). It walks
//! Unresolved -> Resolving -> Resolved; the façade runs the depth-1
//! expansion in between. A resolved value is cached until `invalidate`.

use super::expand::ExpandPlan;
use crate::error::{OgmError, OgmResult};
use crate::graph::{Cardinality, EntityIdentity, RelationshipSpec};
use crate::session::EntityKey;
use tracing::warn;

/// Resolved relationship value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Related {
    One(Option<EntityKey>),
    Many(Vec<EntityKey>),
}

impl Related {
    /// Targets in resolution order
    pub fn keys(&self) -> Vec<EntityKey> {
        match self {
            Related::One(key) => key.iter().copied().collect(),
            Related::Many(keys) => keys.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Unresolved,
    Resolving,
    Resolved,
}

#[derive(Debug, Clone, PartialEq)]
enum Resolution {
    Unresolved,
    Resolving,
    Resolved(Related),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipDescriptor {
    name: String,
    spec: RelationshipSpec,
    state: Resolution,
}

impl RelationshipDescriptor {
    pub fn new(name: impl Into<String>, spec: RelationshipSpec) -> Self {
        RelationshipDescriptor {
            name: name.into(),
            spec,
            state: Resolution::Unresolved,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &RelationshipSpec {
        &self.spec
    }

    pub fn state(&self) -> ResolutionState {
        match self.state {
            Resolution::Unresolved => ResolutionState::Unresolved,
            Resolution::Resolving => ResolutionState::Resolving,
            Resolution::Resolved(_) => ResolutionState::Resolved,
        }
    }

    pub fn cached(&self) -> Option<&Related> {
        match &self.state {
            Resolution::Resolved(related) => Some(related),
            _ => None,
        }
    }

    /// Start an access. Returns None when a cached value is available,
    /// otherwise the expansion to run. `origin` is None for a transient entity.
    pub fn begin(
        &mut self,
        entity: &str,
        origin: Option<&EntityIdentity>,
        max_depth: u32,
    ) -> OgmResult<Option<ExpandPlan>> {
        if let Resolution::Resolved(_) = self.state {
            return Ok(None);
        }
        let origin = origin.ok_or_else(|| OgmError::UnboundRelationship {
            entity: entity.to_string(),
            relation: self.name.clone(),
        })?;
        if self.state == Resolution::Resolving {
            warn!("restarting stale resolution of `{}` on {}", self.name, entity);
        }
        let plan = ExpandPlan::new(
            origin.clone(),
            &self.spec.edge_label,
            self.spec.direction,
            1,
            max_depth,
        )?
        .target_label(&self.spec.target_label)?
        .keep_duplicates();
        self.state = Resolution::Resolving;
        Ok(Some(plan))
    }

    /// Finish an access with the targets the expansion produced
    pub fn complete(&mut self, entity: &str, targets: Vec<EntityKey>) -> OgmResult<Related> {
        let related = match self.spec.cardinality {
            Cardinality::One if targets.len() > 1 => {
                self.state = Resolution::Unresolved;
                return Err(OgmError::DataIntegrity {
                    entity: entity.to_string(),
                    reason: format!(
                        "relationship `{}` has cardinality one but {} `{}` edges qualify",
                        self.name,
                        targets.len(),
                        self.spec.edge_label
                    ),
                });
            }
            Cardinality::One => Related::One(targets.into_iter().next()),
            Cardinality::Many => Related::Many(targets),
        };
        self.state = Resolution::Resolved(related.clone());
        Ok(related)
    }

    /// Back to Unresolved after a failed round trip
    pub fn abort(&mut self) {
        if self.state == Resolution::Resolving {
            self.state = Resolution::Unresolved;
        }
    }

    /// Drop the cached value; the next access queries again
    pub fn invalidate(&mut self) {
        self.state = Resolution::Unresolved;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PropertyMap;
    use crate::session::{Entity, Session};

    fn keys(n: usize) -> Vec<EntityKey> {
        let mut session = Session::new();
        (0..n)
            .map(|_| session.track(Entity::vertex("Company", PropertyMap::new())))
            .collect()
    }

    #[test]
    fn test_transient_origin_is_unbound() {
        let mut desc = RelationshipDescriptor::new("employer", RelationshipSpec::one("WORKS_AT", "Company"));
        let err = desc.begin("transient vertex Person", None, 5).unwrap_err();
        assert!(matches!(err, OgmError::UnboundRelationship { ref relation, .. } if relation == "employer"));
        assert_eq!(desc.state(), ResolutionState::Unresolved);
    }

    #[test]
    fn test_resolve_then_cached() {
        let origin = EntityIdentity::new("Person", 1);
        let mut desc = RelationshipDescriptor::new("employer", RelationshipSpec::one("WORKS_AT", "Company"));
        let plan = desc.begin("Person[1]", Some(&origin), 5).unwrap().unwrap();
        assert_eq!(plan.depth(), 1);
        assert_eq!(desc.state(), ResolutionState::Resolving);

        let target = keys(1);
        let related = desc.complete("Person[1]", target.clone()).unwrap();
        assert_eq!(related, Related::One(Some(target[0])));
        assert!(desc.begin("Person[1]", Some(&origin), 5).unwrap().is_none());
        assert_eq!(desc.cached(), Some(&related));

        desc.invalidate();
        assert!(desc.begin("Person[1]", Some(&origin), 5).unwrap().is_some());
    }

    #[test]
    fn test_cardinality_one_ambiguity() {
        let origin = EntityIdentity::new("Person", 1);
        let mut desc = RelationshipDescriptor::new("employer", RelationshipSpec::one("WORKS_AT", "Company"));
        desc.begin("Person[1]", Some(&origin), 5).unwrap();
        let err = desc.complete("Person[1]", keys(2)).unwrap_err();
        assert!(matches!(err, OgmError::DataIntegrity { .. }));
        assert_eq!(desc.state(), ResolutionState::Unresolved);
    }

    #[test]
    fn test_many_keeps_order_and_abort() {
        let origin = EntityIdentity::new("Person", 1);
        let mut desc = RelationshipDescriptor::new("friends", RelationshipSpec::many("KNOWS", "Person"));
        desc.begin("Person[1]", Some(&origin), 5).unwrap();
        desc.abort();
        assert_eq!(desc.state(), ResolutionState::Unresolved);

        desc.begin("Person[1]", Some(&origin), 5).unwrap();
        let targets = keys(3);
        let related = desc.complete("Person[1]", targets.clone()).unwrap();
        assert_eq!(related.keys(), targets);
    }
}
