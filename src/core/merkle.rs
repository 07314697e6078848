// Merkle tree commitment over transaction IDs, with SPV inclusion proofs
//
// Nodes live in a flat arena and refer to their children by index. When a
// level has an odd node count its last node is carried up unchanged and placed
// first in the next level, so a lone node is never hashed with itself more
// than once (only the leaf level duplicates its last element).

use crate::core::{sha256_pair, Hash256};

/// Which child of a node the path descends into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    /// Match lies in the left subtree
    Left = 0,
    /// Match lies in the right subtree
    Right = 1,
}

impl Direction {
    pub fn as_bit(self) -> u8 {
        self as u8
    }
}

/// Inclusion proof recorded top-down (root first, leaf parent last)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MerkleProof {
    pub directions: Vec<Direction>,
    /// Hash of the subtree not taken at each depth
    pub siblings: Vec<Hash256>,
}

impl MerkleProof {
    pub fn len(&self) -> usize {
        self.directions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    fn push(&mut self, direction: Direction, sibling: Hash256) {
        self.directions.push(direction);
        self.siblings.push(sibling);
    }

    fn pop(&mut self) {
        self.directions.pop();
        self.siblings.pop();
    }
}

#[derive(Debug, Clone)]
struct MerkleNode {
    data: Hash256,
    children: Option<(usize, usize)>,
}

#[derive(Debug, Clone)]
pub struct MerkleTree {
    nodes: Vec<MerkleNode>,
    root: Option<usize>,
}

impl MerkleTree {
    /// Build the tree over an ordered list of leaves
    pub fn new(leaves: &[Hash256]) -> Self {
        let Some(last) = leaves.last() else {
            return Self { nodes: Vec::new(), root: None };
        };

        let mut nodes: Vec<MerkleNode> = leaves
            .iter()
            .map(|leaf| MerkleNode { data: *leaf, children: None })
            .collect();
        if leaves.len() % 2 != 0 {
            nodes.push(MerkleNode { data: *last, children: None });
        }

        let mut level: Vec<usize> = (0..nodes.len()).collect();
        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len() / 2 + 1);
            if level.len() % 2 != 0 {
                next.push(level[level.len() - 1]);
            }
            for pair in level.chunks_exact(2) {
                let (left, right) = (pair[0], pair[1]);
                let data = sha256_pair(&nodes[left].data, &nodes[right].data);
                nodes.push(MerkleNode { data, children: Some((left, right)) });
                next.push(nodes.len() - 1);
            }
            level = next;
        }

        Self {
            nodes,
            root: Some(level[0]),
        }
    }

    /// Root commitment (zero hash for an empty tree)
    pub fn root(&self) -> Hash256 {
        self.root
            .map(|idx| self.nodes[idx].data)
            .unwrap_or_else(Hash256::zero)
    }

    /// Depth-first search for a leaf, left subtree first
    pub fn find_path(&self, leaf: &Hash256) -> Option<MerkleProof> {
        let root = self.root?;
        let mut proof = MerkleProof::default();
        if self.search(root, leaf, &mut proof) {
            Some(proof)
        } else {
            None
        }
    }

    fn search(&self, idx: usize, leaf: &Hash256, proof: &mut MerkleProof) -> bool {
        let node = &self.nodes[idx];
        let Some((left, right)) = node.children else {
            return node.data == *leaf;
        };

        proof.push(Direction::Left, self.nodes[right].data);
        if self.search(left, leaf, proof) {
            return true;
        }
        proof.pop();

        proof.push(Direction::Right, self.nodes[left].data);
        if self.search(right, leaf, proof) {
            return true;
        }
        proof.pop();

        false
    }
}

/// Rebuild the leaf-to-root chain from a top-down proof and compare roots
pub fn verify_inclusion(leaf: &Hash256, claimed_root: &Hash256, proof: &MerkleProof) -> bool {
    if proof.directions.len() != proof.siblings.len() {
        return false;
    }

    let running = proof
        .directions
        .iter()
        .zip(&proof.siblings)
        .rev()
        .fold(*leaf, |running, (direction, sibling)| match direction {
            Direction::Left => sha256_pair(&running, sibling),
            Direction::Right => sha256_pair(sibling, &running),
        });

    running == *claimed_root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sha256;

    fn leaves(n: usize) -> Vec<Hash256> {
        (0..n).map(|i| sha256(format!("tx-{}", i).as_bytes())).collect()
    }

    #[test]
    fn test_empty_tree() {
        let tree = MerkleTree::new(&[]);
        assert_eq!(tree.root(), Hash256::zero());
        assert!(tree.find_path(&sha256(b"x")).is_none());
    }

    #[test]
    fn test_single_leaf_is_duplicated() {
        let l = leaves(1);
        let tree = MerkleTree::new(&l);
        assert_eq!(tree.root(), sha256_pair(&l[0], &l[0]));
    }

    #[test]
    fn test_three_leaves_duplicate_last() {
        let l = leaves(3);
        let tree = MerkleTree::new(&l);
        let expected = sha256_pair(&sha256_pair(&l[0], &l[1]), &sha256_pair(&l[2], &l[2]));
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn test_odd_level_carries_last_node_first() {
        // 5 leaves -> 6 after duplication -> 3 parents: the third is carried up in front
        let l = leaves(5);
        let tree = MerkleTree::new(&l);

        let ab = sha256_pair(&l[0], &l[1]);
        let cd = sha256_pair(&l[2], &l[3]);
        let ee = sha256_pair(&l[4], &l[4]);
        let expected = sha256_pair(&ee, &sha256_pair(&ab, &cd));
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn test_inclusion_for_batch_sizes() {
        for n in [1usize, 2, 3, 4, 5, 8] {
            let l = leaves(n);
            let tree = MerkleTree::new(&l);
            let root = tree.root();

            for leaf in &l {
                let proof = tree
                    .find_path(leaf)
                    .unwrap_or_else(|| panic!("leaf missing from tree of {}", n));
                assert!(verify_inclusion(leaf, &root, &proof), "size {}", n);
            }

            let absent = sha256(b"not in the batch");
            assert!(tree.find_path(&absent).is_none(), "size {}", n);
        }
    }

    #[test]
    fn test_directions_are_recorded_top_down() {
        let l = leaves(4);
        let tree = MerkleTree::new(&l);

        // Leaf 2 sits under the right child of the root, then the left child
        let proof = tree.find_path(&l[2]).unwrap();
        assert_eq!(proof.directions, vec![Direction::Right, Direction::Left]);
        assert_eq!(proof.siblings[0], sha256_pair(&l[0], &l[1]));
        assert_eq!(proof.siblings[1], l[3]);
        assert_eq!(proof.directions[0].as_bit(), 1);
    }

    #[test]
    fn test_tampered_proof_rejected() {
        let l = leaves(8);
        let tree = MerkleTree::new(&l);
        let root = tree.root();
        let mut proof = tree.find_path(&l[5]).unwrap();

        proof.siblings[1] = sha256(b"forged");
        assert!(!verify_inclusion(&l[5], &root, &proof));
    }

    #[test]
    fn test_wrong_leaf_or_root_rejected() {
        let l = leaves(4);
        let tree = MerkleTree::new(&l);
        let proof = tree.find_path(&l[1]).unwrap();

        assert!(!verify_inclusion(&l[0], &tree.root(), &proof));
        assert!(!verify_inclusion(&l[1], &sha256(b"other root"), &proof));
    }

    #[test]
    fn test_mismatched_proof_lengths_rejected() {
        let l = leaves(2);
        let tree = MerkleTree::new(&l);
        let mut proof = tree.find_path(&l[0]).unwrap();
        proof.siblings.push(Hash256::zero());
        assert!(!verify_inclusion(&l[0], &tree.root(), &proof));
    }
}
