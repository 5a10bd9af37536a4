//! API key rotation
//!
//! Several access/secret pairs may be configured; each call takes the next
//! pair in strict round-robin order.

use std::sync::Mutex;

/// Header carrying the credentials
pub const API_KEYS_HEADER: &str = "X-ApiKeys";

/// One access/secret key pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access_key: String,
    pub secret_key: String,
}

impl CredentialPair {
    pub fn new(access_key: &str, secret_key: &str) -> Self {
        Self {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    /// Value for the `X-ApiKeys` header
    pub fn header_value(&self) -> String {
        format!(
            "accessKey={};secretKey={}",
            self.access_key, self.secret_key
        )
    }
}

/// Round-robin credential source shared by every transport clone.
#[derive(Debug)]
pub struct CredentialRing {
    pairs: Vec<CredentialPair>,
    next: Mutex<usize>,
}

impl CredentialRing {
    pub fn new(pairs: Vec<CredentialPair>) -> Self {
        Self {
            pairs,
            next: Mutex::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Header value for the next call, `None` if no keys are configured.
    pub fn next_header(&self) -> Option<String> {
        if self.pairs.is_empty() {
            return None;
        }
        let index = {
            let mut next = self.next.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let index = *next % self.pairs.len();
            *next = next.wrapping_add(1);
            index
        };
        Some(self.pairs[index].header_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn two_pairs() -> CredentialRing {
        CredentialRing::new(vec![
            CredentialPair::new("a0", "s0"),
            CredentialPair::new("a1", "s1"),
        ])
    }

    #[test]
    fn test_header_format() {
        assert_eq!(
            CredentialPair::new("AK", "SK").header_value(),
            "accessKey=AK;secretKey=SK"
        );
    }

    #[test]
    fn test_strict_round_robin() {
        let ring = two_pairs();
        let headers: Vec<String> = (0..10).filter_map(|_| ring.next_header()).collect();

        assert_eq!(headers.len(), 10);
        for (i, header) in headers.iter().enumerate() {
            let expected = format!("accessKey=a{};secretKey=s{}", i % 2, i % 2);
            assert_eq!(header, &expected, "call {}", i);
        }
    }

    #[test]
    fn test_empty_ring() {
        let ring = CredentialRing::new(vec![]);
        assert!(ring.is_empty());
        assert!(ring.next_header().is_none());
    }

    #[test]
    fn test_concurrent_calls_spread_evenly() {
        let ring = Arc::new(two_pairs());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ring = ring.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .filter_map(|_| ring.next_header())
                        .filter(|h| h.starts_with("accessKey=a0"))
                        .count()
                })
            })
            .collect();
        let first_pair: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(first_pair, 100);
    }
}
