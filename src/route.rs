//! Synthesis routes extracted from a search tree.
//!
//! A [`Route`] is the chain of reactions leading from the target to one tree
//! node, plus the molecules left at that node. It serializes to the nested
//! molecule/reaction dictionary used in responses.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::chem::{Molecule, Reaction};

/// A molecule remaining at the end of a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteLeaf {
    /// The molecule.
    pub molecule: Molecule,
    /// True when the molecule is purchasable.
    pub in_stock: bool,
}

/// A route from the target to one search state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// The target compound.
    pub target: Molecule,
    /// Reactions in the order they were applied.
    pub reactions: Vec<Reaction>,
    /// Molecules left once every reaction has been applied.
    pub leaves: Vec<RouteLeaf>,
    /// Score of the final state.
    pub state_score: f64,
    /// True when every leaf is in stock.
    pub is_solved: bool,
}

impl Route {
    /// Number of reactions in the route.
    #[must_use]
    pub fn number_of_reactions(&self) -> usize {
        self.reactions.len()
    }

    /// Number of leaf molecules.
    #[must_use]
    pub fn number_of_precursors(&self) -> usize {
        self.leaves.len()
    }

    /// Number of leaf molecules in stock.
    #[must_use]
    pub fn number_of_precursors_in_stock(&self) -> usize {
        self.leaves.iter().filter(|l| l.in_stock).count()
    }

    /// Stable identity of the route.
    ///
    /// Two routes applying the same reactions in a different order share a key.
    #[must_use]
    pub fn hash_key(&self) -> String {
        let mut steps: Vec<String> = self.reactions.iter().map(Reaction::smiles).collect();
        steps.sort();

        let mut hasher = blake3::Hasher::new();
        hasher.update(self.target.smiles().as_bytes());
        for step in &steps {
            hasher.update(b"\n");
            hasher.update(step.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Nested molecule/reaction dictionary rooted at the target.
    #[must_use]
    pub fn to_dict(&self) -> Value {
        let mut used = vec![false; self.reactions.len()];
        self.molecule_dict(&self.target, &mut used)
    }

    fn molecule_dict(&self, molecule: &Molecule, used: &mut [bool]) -> Value {
        let mut node = Map::new();
        node.insert("type".to_string(), json!("mol"));
        node.insert("smiles".to_string(), json!(molecule.smiles()));

        let made_by = self
            .reactions
            .iter()
            .enumerate()
            .find(|(idx, rxn)| !used[*idx] && rxn.product == *molecule)
            .map(|(idx, _)| idx);

        match made_by {
            Some(idx) => {
                used[idx] = true;
                let reaction = &self.reactions[idx];
                let children: Vec<Value> = reaction
                    .precursors
                    .iter()
                    .map(|p| self.molecule_dict(p, used))
                    .collect();
                node.insert("in_stock".to_string(), json!(false));
                node.insert(
                    "children".to_string(),
                    json!([{
                        "type": "reaction",
                        "smiles": reaction.smiles(),
                        "metadata": {
                            "policy": reaction.policy,
                            "prior": reaction.prior,
                            "template": reaction.template,
                        },
                        "children": children,
                    }]),
                );
            }
            None => {
                let in_stock = self
                    .leaves
                    .iter()
                    .any(|l| l.in_stock && l.molecule == *molecule);
                node.insert("in_stock".to_string(), json!(in_stock));
            }
        }
        Value::Object(node)
    }
}
