use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::models::{People, PersonId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("person {person} references unknown {role} {referenced}")]
    UnknownReference {
        person: PersonId,
        role: &'static str,
        referenced: PersonId,
    },
    #[error("ancestry cycle through {}", members.join(" -> "))]
    Cycle { members: Vec<PersonId> },
}

/// Parent/child adjacency over a people map. Building one validates every
/// reference; resolver passes additionally demand acyclicity up front instead
/// of recursing into a loop the way the old scripts could.
#[derive(Debug, Default)]
pub struct FamilyGraph {
    parents: HashMap<PersonId, Vec<PersonId>>,
    children: HashMap<PersonId, Vec<PersonId>>,
}

impl FamilyGraph {
    pub fn build(people: &People) -> Result<Self, GraphError> {
        let mut g = FamilyGraph::default();

        for (id, person) in people {
            for (role, parent) in [("father", &person.father), ("mother", &person.mother)] {
                if let Some(pid) = parent {
                    if !people.contains_key(pid) {
                        return Err(GraphError::UnknownReference {
                            person: id.clone(),
                            role,
                            referenced: pid.clone(),
                        });
                    }
                    g.parents.entry(id.clone()).or_default().push(pid.clone());
                    g.children.entry(pid.clone()).or_default().push(id.clone());
                }
            }
            for child in person.child_ids() {
                if !people.contains_key(child) {
                    return Err(GraphError::UnknownReference {
                        person: id.clone(),
                        role: "child",
                        referenced: child.clone(),
                    });
                }
                let kids = g.children.entry(id.clone()).or_default();
                if !kids.contains(child) {
                    kids.push(child.clone());
                }
                let pars = g.parents.entry(child.clone()).or_default();
                if !pars.contains(id) {
                    pars.push(id.clone());
                }
            }
        }

        Ok(g)
    }

    pub fn parents_of(&self, id: &str) -> &[PersonId] {
        self.parents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn children_of(&self, id: &str) -> &[PersonId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterative DFS over parent edges. Returns the members of the first
    /// ancestry cycle found, in walk order.
    pub fn find_cycle(&self, people: &People) -> Option<Vec<PersonId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            InProgress,
            Done,
        }

        let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(people.len());

        for start in people.keys() {
            if marks.contains_key(start.as_str()) {
                continue;
            }
            // (node, next-parent index) pairs form the explicit DFS stack.
            let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];
            marks.insert(start.as_str(), Mark::InProgress);

            while let Some((node, idx)) = stack.pop() {
                let parents = self.parents_of(node);
                if idx < parents.len() {
                    stack.push((node, idx + 1));
                    let next = parents[idx].as_str();
                    match marks.get(next) {
                        Some(Mark::InProgress) => {
                            // Walk the stack back to the repeated node.
                            let mut cycle: Vec<PersonId> = stack
                                .iter()
                                .skip_while(|(n, _)| *n != next)
                                .map(|(n, _)| n.to_string())
                                .collect();
                            cycle.push(next.to_string());
                            return Some(cycle);
                        }
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(next, Mark::InProgress);
                            stack.push((next, 0));
                        }
                    }
                } else {
                    marks.insert(node, Mark::Done);
                }
            }
        }

        None
    }

    pub fn ensure_acyclic(&self, people: &People) -> Result<(), GraphError> {
        match self.find_cycle(people) {
            Some(members) => Err(GraphError::Cycle { members }),
            None => Ok(()),
        }
    }
}

/// The subset the consistency checker walks: parents of everyone marked
/// alive, deduplicated in first-seen order.
pub fn living_focus(people: &People) -> Vec<PersonId> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut focus = Vec::new();
    for person in people.values() {
        if !person.is_alive() {
            continue;
        }
        for parent in [&person.father, &person.mother].into_iter().flatten() {
            if people.contains_key(parent) && seen.insert(parent.as_str()) {
                focus.push(parent.clone());
            }
        }
    }
    focus
}
