// Raffle program - refund merkle proofs
//
// Entitlements are committed to by a keccak-256 root. Pairs are always hashed
// smaller-first, so a proof is just the list of sibling hashes and carries no
// left/right flags. `ClaimsTree` builds trees in the same convention.

use solana_program::{keccak, pubkey::Pubkey};
use std::convert::TryInto;

pub type MerkleHash = [u8; 32];

/// Hashes one refund entitlement: `keccak256(index_le || account || ticket_count_le)`.
pub fn claim_leaf(index: u64, account: &Pubkey, ticket_count: u64) -> MerkleHash {
    keccak::hashv(&[
        &index.to_le_bytes(),
        account.as_ref(),
        &ticket_count.to_le_bytes(),
    ])
    .to_bytes()
}

/// Combines two nodes, ordering them so the result is independent of position.
pub fn hash_pair(a: &MerkleHash, b: &MerkleHash) -> MerkleHash {
    if a <= b {
        keccak::hashv(&[&a[..], &b[..]]).to_bytes()
    } else {
        keccak::hashv(&[&b[..], &a[..]]).to_bytes()
    }
}

/// Folds `proof` over `leaf` and returns the resulting root.
pub fn compute_root(leaf: MerkleHash, proof: &[MerkleHash]) -> MerkleHash {
    proof
        .iter()
        .fold(leaf, |node, sibling| hash_pair(&node, sibling))
}

pub fn verify(proof: &[MerkleHash], root: &MerkleHash, leaf: MerkleHash) -> bool {
    compute_root(leaf, proof) == *root
}

/// Claim payload submitted by a refund claimant; the account half of the leaf
/// is always the signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimLeafData {
    pub index: u64,
    pub ticket_count: u64,
}

impl ClaimLeafData {
    pub const LEN: usize = 16;

    pub fn unpack(src: &[u8]) -> Option<Self> {
        let index = src.get(..8)?.try_into().ok().map(u64::from_le_bytes)?;
        let ticket_count = src.get(8..16)?.try_into().ok().map(u64::from_le_bytes)?;
        Some(Self {
            index,
            ticket_count,
        })
    }

    pub fn pack(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[..8].copy_from_slice(&self.index.to_le_bytes());
        out[8..].copy_from_slice(&self.ticket_count.to_le_bytes());
        out
    }

    pub fn leaf(&self, account: &Pubkey) -> MerkleHash {
        claim_leaf(self.index, account, self.ticket_count)
    }
}

/// One refund allocation as published by the raffle operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundAllocation {
    pub account: Pubkey,
    pub ticket_count: u64,
}

/// Merkle tree over refund allocations, indexed by position in the allocation list.
#[derive(Debug, Clone)]
pub struct ClaimsTree {
    layers: Vec<Vec<MerkleHash>>,
}

impl ClaimsTree {
    pub fn new(allocations: &[RefundAllocation]) -> Self {
        let leaves = allocations
            .iter()
            .enumerate()
            .map(|(index, a)| claim_leaf(index as u64, &a.account, a.ticket_count))
            .collect();
        Self::from_leaves(leaves)
    }

    /// Builds a tree from raw leaves. Leaves are sorted and deduplicated; an odd
    /// node at the end of a layer is promoted unchanged.
    pub fn from_leaves(mut leaves: Vec<MerkleHash>) -> Self {
        leaves.sort_unstable();
        leaves.dedup();

        let mut layers = vec![leaves];
        while layers.last().map_or(false, |layer| layer.len() > 1) {
            let next: Vec<MerkleHash> = layers
                .last()
                .map(|layer| {
                    layer
                        .chunks(2)
                        .map(|pair| match pair.get(1) {
                            Some(right) => hash_pair(&pair[0], right),
                            None => pair[0],
                        })
                        .collect()
                })
                .unwrap_or_default();
            layers.push(next);
        }
        Self { layers }
    }

    /// Root of the tree, all zeroes for an empty tree
    pub fn root(&self) -> MerkleHash {
        self.layers
            .last()
            .and_then(|layer| layer.first().copied())
            .unwrap_or([0u8; 32])
    }

    /// Sibling path for `leaf`, or `None` if the leaf is not in the tree.
    pub fn proof(&self, leaf: &MerkleHash) -> Option<Vec<MerkleHash>> {
        let mut position = self.layers.first()?.binary_search(leaf).ok()?;
        let mut proof = Vec::with_capacity(self.layers.len());
        for layer in &self.layers[..self.layers.len() - 1] {
            if let Some(sibling) = layer.get(position ^ 1) {
                proof.push(*sibling);
            }
            position /= 2;
        }
        Some(proof)
    }

    pub fn proof_for(&self, index: u64, account: &Pubkey, ticket_count: u64) -> Option<Vec<MerkleHash>> {
        self.proof(&claim_leaf(index, account, ticket_count))
    }
}
