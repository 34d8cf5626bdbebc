/// Key layout and encoding utilities for the ledger partitions.
///
/// Partition structure:
/// - `links`: link:{normalized_uri} -> Link (JSON)
/// - `checks`: check:{check_id} -> Check (JSON)
/// - `link_checks`: lc:{link_id}:{created_ms:016}:{check_id} -> check_id (recency index)
/// - `batches`: batch:{batch_id} -> Batch (JSON)
/// - `check_batches`: cb:{check_id}:{batch_id} -> batch_id (reverse index)
/// - `metadata`: meta:{key} -> value

/// Encode a link key: link:{uri}
pub fn encode_link_key(uri: &str) -> Vec<u8> {
    format!("link:{uri}").into_bytes()
}

/// Encode a check key: check:{check_id}
pub fn encode_check_key(check_id: &str) -> Vec<u8> {
    format!("check:{check_id}").into_bytes()
}

/// Encode a link-checks index key: lc:{link_id}:{created_ms:016}:{check_id}
///
/// The zero-padded millisecond timestamp keeps the index in chronological
/// order under lexicographic iteration, so the newest check for a link is
/// the last entry under the prefix. The check id suffix disambiguates
/// same-millisecond creations.
pub fn encode_link_check_key(link_id: &str, created_ms: u64, check_id: &str) -> Vec<u8> {
    format!("lc:{link_id}:{created_ms:016}:{check_id}").into_bytes()
}

/// Encode a link-checks prefix for range scan: lc:{link_id}:
pub fn encode_link_check_prefix(link_id: &str) -> Vec<u8> {
    format!("lc:{link_id}:").into_bytes()
}

/// Encode a batch key: batch:{batch_id}
pub fn encode_batch_key(batch_id: &str) -> Vec<u8> {
    format!("batch:{batch_id}").into_bytes()
}

/// Decode a batch key: batch:{batch_id} -> batch_id
pub fn decode_batch_key(key: &[u8]) -> Option<String> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str.strip_prefix("batch:").map(String::from)
}

/// Encode a check-batches index key: cb:{check_id}:{batch_id}
pub fn encode_check_batch_key(check_id: &str, batch_id: &str) -> Vec<u8> {
    format!("cb:{check_id}:{batch_id}").into_bytes()
}

/// Encode a check-batches prefix for range scan: cb:{check_id}:
pub fn encode_check_batch_prefix(check_id: &str) -> Vec<u8> {
    format!("cb:{check_id}:").into_bytes()
}

/// Encode a metadata key: meta:{key}
pub fn encode_meta_key(key: &str) -> Vec<u8> {
    format!("meta:{key}").into_bytes()
}
