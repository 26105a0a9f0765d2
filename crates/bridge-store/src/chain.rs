//! Per-lead activity hash chain
//!
//! Every activity stores the hash of its predecessor and a hash over its own
//! content plus that predecessor hash. Rewriting or removing an entry breaks
//! every later link.

use serde::Serialize;

/// Field separator inside the hashed preimage
const SEP: &[u8] = &[0x1f];

/// Inputs of one chain link, in stored text form
pub(crate) struct LinkInput<'a> {
    pub(crate) prev_hash: Option<&'a str>,
    pub(crate) lead_id: &'a str,
    pub(crate) seq: i64,
    pub(crate) kind: &'a str,
    pub(crate) actor_id: &'a str,
    pub(crate) actor_role: &'a str,
    pub(crate) description: &'a str,
    pub(crate) metadata: &'a str,
    pub(crate) created_at: &'a str,
}

impl LinkInput<'_> {
    pub(crate) fn hash(&self) -> String {
        let seq = self.seq.to_le_bytes();
        let parts: [&[u8]; 9] = [
            self.prev_hash.unwrap_or("").as_bytes(),
            self.lead_id.as_bytes(),
            &seq,
            self.kind.as_bytes(),
            self.actor_id.as_bytes(),
            self.actor_role.as_bytes(),
            self.description.as_bytes(),
            self.metadata.as_bytes(),
            self.created_at.as_bytes(),
        ];
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(part);
            hasher.update(SEP);
        }
        hex::encode(hasher.finalize().as_bytes())
    }
}

/// Outcome of re-walking a lead's activity chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    /// Entries checked
    pub entries: usize,
    /// First sequence number whose link does not verify
    pub broken_at: Option<i64>,
}

impl ChainReport {
    #[inline]
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.broken_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link<'a>(prev: Option<&'a str>, description: &'a str) -> LinkInput<'a> {
        LinkInput {
            prev_hash: prev,
            lead_id: "01J0000000000000000000000",
            seq: 1,
            kind: "note_added",
            actor_id: "agent-1",
            actor_role: "agent",
            description,
            metadata: "{}",
            created_at: "2025-01-01T00:00:00.000000Z",
        }
    }

    #[test]
    fn hash_depends_on_content_and_predecessor() {
        let base = link(None, "called customer").hash();
        assert_eq!(base.len(), 64);
        assert_eq!(base, link(None, "called customer").hash());
        assert_ne!(base, link(None, "called customer!").hash());
        assert_ne!(base, link(Some("00"), "called customer").hash());
    }

    #[test]
    fn separator_prevents_field_shifting() {
        let mut a = link(None, "ab");
        a.actor_role = "agent";
        let mut b = link(None, "b");
        b.actor_role = "agenta";
        assert_ne!(a.hash(), b.hash());
    }
}
