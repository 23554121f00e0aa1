//! Per-file SHA-256 Merkle tree: leaf-per-chunk hashing, bottom-up
//! construction, inclusion proofs, and durable (de)serialization.
//!
//! Odd-sibling rule: when a level has an odd number of nodes, the last
//! node is paired with itself (`H(L || L)`) rather than promoted
//! unchanged. This differs from a "promote the odd node" scheme, so
//! trees built here are not byte-compatible with one that uses that
//! alternative.

use sha2::{Digest, Sha256};
use yproto_core::varint::{Cursor, Writer};

use crate::error::MerkleError;

const HASH_LEN: usize = 32;

fn hash_leaf(chunk: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(chunk);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// The node counts of every level, leaves first, root last, implied by
/// a leaf count and the odd-sibling rule. Level sizes are fully
/// determined by `chunk_count`, which is what lets `deserialize`
/// reconstruct the level structure from a flat byte stream.
fn level_sizes(chunk_count: usize) -> Vec<usize> {
    let mut sizes = vec![chunk_count];
    while *sizes.last().unwrap() > 1 {
        let prev = *sizes.last().unwrap();
        sizes.push(prev.div_ceil(2));
    }
    sizes
}

/// A built Merkle tree: every level from leaves to root, kept so that
/// `proof` can walk down to the requested leaf without rehashing.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    /// Build a tree over a file's chunks.
    ///
    /// # Errors
    ///
    /// Returns [`MerkleError::EmptyInput`] if `chunks` is empty.
    pub fn build(chunks: &[Vec<u8>]) -> Result<Self, MerkleError> {
        if chunks.is_empty() {
            return Err(MerkleError::EmptyInput);
        }

        let leaves: Vec<[u8; 32]> = chunks.iter().map(|c| hash_leaf(c)).collect();
        let mut levels = vec![leaves];

        while levels.last().unwrap().len() > 1 {
            let current = levels.last().unwrap();
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            let mut i = 0;
            while i < current.len() {
                let left = &current[i];
                let right = current.get(i + 1).unwrap_or(left);
                next.push(hash_pair(left, right));
                i += 2;
            }
            levels.push(next);
        }

        Ok(Self { levels })
    }

    /// The root hash, i.e. the file's content id.
    #[must_use]
    pub fn root(&self) -> [u8; 32] {
        self.levels.last().unwrap()[0]
    }

    /// The root hash, base64-encoded, as it is carried on the wire.
    #[must_use]
    pub fn root_base64(&self) -> String {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD.encode(self.root())
    }

    /// Number of leaf chunks the tree was built over.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.levels[0].len()
    }

    /// The ordered sibling hashes from leaf `index` to the root.
    ///
    /// # Errors
    ///
    /// Returns [`MerkleError::IndexOutOfRange`] if `index` is not a
    /// valid leaf index for this tree.
    pub fn proof(&self, index: usize) -> Result<Vec<[u8; 32]>, MerkleError> {
        let len = self.chunk_count();
        if index >= len {
            return Err(MerkleError::IndexOutOfRange { index, len });
        }

        let mut proof = Vec::with_capacity(self.levels.len() - 1);
        let mut i = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = if i % 2 == 0 {
                *level.get(i + 1).unwrap_or(&level[i])
            } else {
                level[i - 1]
            };
            proof.push(sibling);
            i /= 2;
        }
        Ok(proof)
    }

    /// Serialize the tree for durable caching: a header giving the
    /// chunk count and hash length, followed by every node's hash
    /// bytes in breadth-first order, leaves first.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let total_nodes: usize = self.levels.iter().map(Vec::len).sum();
        let mut w = Writer::with_capacity(8 + total_nodes * HASH_LEN);
        w.write_varuint(self.chunk_count() as u64);
        w.write_u8(HASH_LEN as u8);
        w.write_varuint(total_nodes as u64);
        for level in &self.levels {
            for node in level {
                w.write_bytes(node);
            }
        }
        w.into_bytes()
    }

    /// Reconstruct a tree from [`serialize`](Self::serialize)d bytes,
    /// given the chunk count the tree was built over (level sizes are
    /// otherwise ambiguous from the flat node list alone).
    ///
    /// # Errors
    ///
    /// Returns [`MerkleError::CorruptSerialization`] if the header
    /// doesn't match `chunk_count`, the hash length isn't 32, or the
    /// buffer is too short for the declared node count.
    pub fn deserialize(bytes: &[u8], chunk_count: usize) -> Result<Self, MerkleError> {
        let mut c = Cursor::new(bytes);
        let header_count = c.read_varuint().map_err(|_| MerkleError::CorruptSerialization {
            reason: "truncated header",
        })? as usize;
        if header_count != chunk_count {
            return Err(MerkleError::CorruptSerialization {
                reason: "chunk count mismatch",
            });
        }
        let hash_len = c
            .read_u8()
            .map_err(|_| MerkleError::CorruptSerialization {
                reason: "truncated header",
            })? as usize;
        if hash_len != HASH_LEN {
            return Err(MerkleError::CorruptSerialization {
                reason: "unsupported hash length",
            });
        }
        let node_count = c.read_varuint().map_err(|_| MerkleError::CorruptSerialization {
            reason: "truncated header",
        })? as usize;

        let sizes = level_sizes(chunk_count);
        let expected_total: usize = sizes.iter().sum();
        if node_count != expected_total {
            return Err(MerkleError::CorruptSerialization {
                reason: "node count does not match chunk count's implied tree shape",
            });
        }

        let mut levels = Vec::with_capacity(sizes.len());
        for size in sizes {
            let mut level = Vec::with_capacity(size);
            for _ in 0..size {
                let slice = c.read_bytes(HASH_LEN).map_err(|_| MerkleError::CorruptSerialization {
                    reason: "truncated node list",
                })?;
                let mut node = [0u8; HASH_LEN];
                node.copy_from_slice(slice);
                level.push(node);
            }
            levels.push(level);
        }
        if !c.is_empty() {
            return Err(MerkleError::CorruptSerialization {
                reason: "trailing bytes after node list",
            });
        }

        Ok(Self { levels })
    }
}

/// Verify that `chunk` at leaf `index` is included under `root`, given
/// its proof. Hashes the chunk, walks the proof using `index`'s bit
/// pattern to pick which side the sibling hashes onto, and compares
/// the final hash to `root` bytewise.
#[must_use]
pub fn verify(chunk: &[u8], proof: &[[u8; 32]], root: &[u8; 32], index: usize) -> bool {
    let mut hash = hash_leaf(chunk);
    let mut i = index;
    for sibling in proof {
        hash = if i % 2 == 0 {
            hash_pair(&hash, sibling)
        } else {
            hash_pair(sibling, &hash)
        };
        i /= 2;
    }
    &hash == root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha256(data: &[u8]) -> [u8; 32] {
        hash_leaf(data)
    }

    #[test]
    fn two_leaf_tree_matches_hand_computed_root() {
        let chunks = vec![vec![1, 2, 3], vec![4, 5]];
        let tree = MerkleTree::build(&chunks).unwrap();

        let expected_root = hash_pair(&sha256(&[1, 2, 3]), &sha256(&[4, 5]));
        assert_eq!(tree.root(), expected_root);

        assert_eq!(tree.proof(0).unwrap(), vec![sha256(&[4, 5])]);
        assert_eq!(tree.proof(1).unwrap(), vec![sha256(&[1, 2, 3])]);
    }

    #[test]
    fn single_leaf_tree_has_empty_proof() {
        let chunks = vec![vec![7, 8, 9]];
        let tree = MerkleTree::build(&chunks).unwrap();

        assert_eq!(tree.root(), sha256(&[7, 8, 9]));
        let proof = tree.proof(0).unwrap();
        assert!(proof.is_empty());
        assert!(verify(&[7, 8, 9], &proof, &tree.root(), 0));
    }

    #[test]
    fn build_rejects_empty_input() {
        assert_eq!(MerkleTree::build(&[]).unwrap_err(), MerkleError::EmptyInput);
    }

    #[test]
    fn proof_out_of_range_errors() {
        let tree = MerkleTree::build(&[vec![1], vec![2]]).unwrap();
        assert_eq!(
            tree.proof(5).unwrap_err(),
            MerkleError::IndexOutOfRange { index: 5, len: 2 }
        );
    }

    #[test]
    fn every_leaf_verifies_against_its_own_proof() {
        let chunks: Vec<Vec<u8>> = (0u8..11).map(|i| vec![i; 3]).collect();
        let tree = MerkleTree::build(&chunks).unwrap();
        let root = tree.root();

        for (i, chunk) in chunks.iter().enumerate() {
            let proof = tree.proof(i).unwrap();
            assert!(verify(chunk, &proof, &root, i), "leaf {i} failed to verify");
        }
    }

    #[test]
    fn mutated_chunk_fails_verification() {
        let chunks: Vec<Vec<u8>> = vec![vec![1; 8], vec![2; 8], vec![3; 8]];
        let tree = MerkleTree::build(&chunks).unwrap();
        let root = tree.root();
        let proof = tree.proof(1).unwrap();

        assert!(verify(&chunks[1], &proof, &root, 1));
        let mutated = vec![9u8; 8];
        assert!(!verify(&mutated, &proof, &root, 1));
    }

    #[test]
    fn mutated_root_fails_all_proofs() {
        let chunks: Vec<Vec<u8>> = vec![vec![1; 4], vec![2; 4], vec![3; 4], vec![4; 4]];
        let tree = MerkleTree::build(&chunks).unwrap();
        let mut bad_root = tree.root();
        bad_root[0] ^= 0xFF;

        for (i, chunk) in chunks.iter().enumerate() {
            let proof = tree.proof(i).unwrap();
            assert!(!verify(chunk, &proof, &bad_root, i));
        }
    }

    #[test]
    fn serialize_roundtrip_preserves_root() {
        let chunks: Vec<Vec<u8>> = (0u8..7).map(|i| vec![i; 5]).collect();
        let tree = MerkleTree::build(&chunks).unwrap();
        let bytes = tree.serialize();

        let restored = MerkleTree::deserialize(&bytes, chunks.len()).unwrap();
        assert_eq!(restored.root(), tree.root());
        for i in 0..chunks.len() {
            assert_eq!(restored.proof(i).unwrap(), tree.proof(i).unwrap());
        }
    }

    #[test]
    fn deserialize_rejects_wrong_chunk_count() {
        let tree = MerkleTree::build(&[vec![1], vec![2], vec![3]]).unwrap();
        let bytes = tree.serialize();
        assert!(MerkleTree::deserialize(&bytes, 4).is_err());
    }

    #[test]
    fn different_contents_produce_different_roots() {
        let a = MerkleTree::build(&[vec![1, 2, 3, 4]]).unwrap();
        let b = MerkleTree::build(&[vec![1, 2, 3, 5]]).unwrap();
        assert_ne!(a.root(), b.root());
    }
}
