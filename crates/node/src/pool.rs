//! Outbound transaction staging.

use ezchain_types::Hash;

/// The node's outbound staging area.
///
/// Freshly minted transactions are keyed in the blob store and queued here
/// until sealing. At most one sealed set is in flight at a time: a new set
/// is only broadcast once the previous one has been observed in an AC
/// block (required for proof continuity — an author never has two unsealed
/// sets racing).
#[derive(Debug, Default)]
pub struct InfStaging {
    /// Store keys (TX namespace) of transactions awaiting sealing.
    pool: Vec<String>,
    /// Digest of the broadcast-but-not-yet-packed set, if any.
    in_flight: Option<Hash>,
}

impl InfStaging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: String) {
        self.pool.push(key);
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pool)
    }

    pub fn in_flight(&self) -> Option<Hash> {
        self.in_flight
    }

    pub fn set_in_flight(&mut self, abs: Hash) {
        self.in_flight = Some(abs);
    }

    /// Clear the in-flight marker if `abs` matches it. Returns whether it
    /// matched.
    pub fn confirm(&mut self, abs: &Hash) -> bool {
        if self.in_flight.as_ref() == Some(abs) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_flow() {
        let mut staging = InfStaging::new();
        assert!(staging.is_empty());
        staging.push("1".into());
        staging.push("2".into());
        assert_eq!(staging.len(), 2);
        assert_eq!(staging.drain(), vec!["1".to_string(), "2".to_string()]);
        assert!(staging.is_empty());
    }

    #[test]
    fn test_in_flight_confirm() {
        let mut staging = InfStaging::new();
        let abs = Hash::digest(b"set");
        staging.set_in_flight(abs);
        assert!(!staging.confirm(&Hash::digest(b"other")));
        assert_eq!(staging.in_flight(), Some(abs));
        assert!(staging.confirm(&abs));
        assert_eq!(staging.in_flight(), None);
    }
}
