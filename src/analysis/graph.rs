//! Symbolic result graph
//!
//! Interpretations ("inters") produced for a system, linked by support and exclusion
//! relations. Key retrieval reads clef inters produced earlier, and writes key alter and
//! key inters plus the relations between them.

use super::result::{ClefKind, Shape};
use crate::sheet::Rect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What an inter stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterKind {
    /// A clef candidate
    Clef(ClefKind),
    /// One alteration of a key signature
    KeyAlter(Shape),
    /// A whole key signature
    Key {
        /// Signed alteration count
        fifths: i32,
    },
}

/// An interpretation node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inter {
    /// Unique id within the graph
    pub id: usize,
    /// Interpretation
    pub kind: InterKind,
    /// Containing staff
    pub staff_id: usize,
    /// Intrinsic grade (0.0-1.0)
    pub grade: f64,
    /// Bounding box
    pub bounds: Rect,
}

/// Why two inters cannot coexist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExclusionCause {
    /// Musically incompatible (a key pattern contradicting a clef)
    Incompatible,
    /// Competing for the same pixels
    Overlap,
}

/// Relation between two inters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    /// Mutual support between alterations of the same key
    KeyAlters,
    /// Clef compatible with key
    ClefKey,
    /// Mutual exclusion
    Exclusion(ExclusionCause),
}

/// An edge of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Source inter id
    pub source: usize,
    /// Target inter id
    pub target: usize,
    /// Relation carried
    pub relation: Relation,
}

impl Edge {
    /// The other end of the edge, if `id` is one of its ends
    pub fn opposite(&self, id: usize) -> Option<usize> {
        if self.source == id {
            Some(self.target)
        } else if self.target == id {
            Some(self.source)
        } else {
            None
        }
    }
}

/// Inters and relations of a system
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterGraph {
    inters: BTreeMap<usize, Inter>,
    edges: Vec<Edge>,
    next_id: usize,
}

impl InterGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            inters: BTreeMap::new(),
            edges: Vec::new(),
            next_id: 1,
        }
    }

    /// Register a new inter, returning its id
    pub fn add_inter(&mut self, kind: InterKind, staff_id: usize, grade: f64, bounds: Rect) -> usize {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        self.inters.insert(
            id,
            Inter {
                id,
                kind,
                staff_id,
                grade,
                bounds,
            },
        );
        id
    }

    /// Register a clef candidate
    pub fn add_clef(&mut self, staff_id: usize, kind: ClefKind, grade: f64, bounds: Rect) -> usize {
        self.add_inter(InterKind::Clef(kind), staff_id, grade, bounds)
    }

    /// Inter by id
    pub fn inter(&self, id: usize) -> Option<&Inter> {
        self.inters.get(&id)
    }

    /// Update the grade of an inter
    pub fn set_grade(&mut self, id: usize, grade: f64) {
        if let Some(inter) = self.inters.get_mut(&id) {
            inter.grade = grade;
        }
    }

    /// Remove an inter and all its relations
    ///
    /// Returns false if no such inter exists.
    pub fn remove_inter(&mut self, id: usize) -> bool {
        if self.inters.remove(&id).is_none() {
            return false;
        }

        self.edges.retain(|e| e.source != id && e.target != id);
        true
    }

    /// All inters, by increasing id
    pub fn inters(&self) -> impl Iterator<Item = &Inter> {
        self.inters.values()
    }

    /// Number of inters
    pub fn len(&self) -> usize {
        self.inters.len()
    }

    /// True if the graph holds no inter
    pub fn is_empty(&self) -> bool {
        self.inters.is_empty()
    }

    /// All edges
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Link two existing inters
    pub fn add_relation(&mut self, source: usize, target: usize, relation: Relation) {
        if !self.inters.contains_key(&source) || !self.inters.contains_key(&target) {
            log::warn!("Relation {:?} on unknown inter {} or {}", relation, source, target);
            return;
        }

        self.edges.push(Edge {
            source,
            target,
            relation,
        });
    }

    /// Declare two inters mutually exclusive
    pub fn insert_exclusion(&mut self, a: usize, b: usize, cause: ExclusionCause) {
        self.add_relation(a, b, Relation::Exclusion(cause));
    }

    /// Relations involving `id`
    pub fn relations_of(&self, id: usize) -> impl Iterator<Item = &Edge> {
        self.edges
            .iter()
            .filter(move |e| e.source == id || e.target == id)
    }

    /// True if a relation of this kind links `a` and `b`, in either direction
    pub fn has_relation(&self, a: usize, b: usize, relation: Relation) -> bool {
        self.relations_of(a)
            .any(|e| e.relation == relation && e.opposite(a) == Some(b))
    }

    /// Inters excluded by `id`, whatever the cause
    pub fn exclusion_partners(&self, id: usize) -> Vec<usize> {
        self.relations_of(id)
            .filter(|e| matches!(e.relation, Relation::Exclusion(_)))
            .filter_map(|e| e.opposite(id))
            .collect()
    }

    /// Clef inters of a staff, sorted by abscissa
    pub fn staff_clefs(&self, staff_id: usize) -> Vec<&Inter> {
        let mut clefs: Vec<&Inter> = self
            .inters
            .values()
            .filter(|i| i.staff_id == staff_id && matches!(i.kind, InterKind::Clef(_)))
            .collect();
        clefs.sort_by_key(|i| (i.bounds.x, i.id));
        clefs
    }

    /// Grade of an inter, raised by the support of its `KeyAlters` partners
    ///
    /// With `g` the intrinsic grade and `c = sum((support_ratio - 1) * partner_grade)`,
    /// the contextual grade is `g * (1 + c) / (1 + g * c)`.
    pub fn contextual_grade(&self, id: usize, support_ratio: f64) -> f64 {
        let grade = match self.inters.get(&id) {
            Some(inter) => inter.grade,
            None => return 0.0,
        };

        let contribution: f64 = self
            .relations_of(id)
            .filter(|e| e.relation == Relation::KeyAlters)
            .filter_map(|e| e.opposite(id))
            .filter_map(|partner| self.inters.get(&partner))
            .map(|partner| (support_ratio - 1.0) * partner.grade)
            .sum();

        grade * (1.0 + contribution) / (1.0 + grade * contribution)
    }
}
