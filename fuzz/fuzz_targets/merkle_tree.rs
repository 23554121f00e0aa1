//! Fuzz target for the Merkle tree: build, proof, and verify must
//! never panic on arbitrary chunk sets, and a proof generated for one
//! chunk must always verify against that same tree's root.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use yproto_files::merkle::{verify, MerkleTree};

#[derive(Debug, Arbitrary)]
struct MerkleInput {
    chunks: Vec<Vec<u8>>,
    probe_index: usize,
}

fuzz_target!(|input: MerkleInput| {
    // Cap the number of chunks so a single fuzz iteration stays cheap.
    let chunks: Vec<Vec<u8>> = input.chunks.into_iter().take(64).collect();
    if chunks.is_empty() {
        assert!(MerkleTree::build(&chunks).is_err());
        return;
    }

    let tree = MerkleTree::build(&chunks).expect("non-empty input must build");
    let root = tree.root();

    let index = input.probe_index % chunks.len();
    let proof = tree.proof(index).expect("in-range index must produce a proof");
    assert!(verify(&chunks[index], &proof, &root, index));

    // Out-of-range indices must error, not panic.
    let out_of_range = chunks.len().saturating_add(input.probe_index).max(chunks.len());
    assert!(tree.proof(out_of_range).is_err());

    // Serialize/deserialize must round-trip the root.
    let bytes = tree.serialize();
    let restored = MerkleTree::deserialize(&bytes, chunks.len())
        .expect("serialize output must deserialize with the same chunk count");
    assert_eq!(restored.root(), root);
});
