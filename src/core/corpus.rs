// src/core/corpus.rs
use crate::core::trie::Trie;
use crate::error::{AnalyzerError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Extracts the password from an `identifier:password` line.
///
/// Everything after the first colon, trimmed, is the password. Lines without
/// a colon or with nothing after it yield `None`.
pub fn parse_password(line: &str) -> Option<&str> {
    let (_, password) = line.split_once(':')?;
    let password = password.trim();
    (!password.is_empty()).then_some(password)
}

/// Builds a fresh trie from every password in `reader`.
///
/// Invalid UTF-8 is replaced rather than rejected, since leaked corpora are
/// frequently Latin-1.
pub fn load_passwords<R: BufRead>(mut reader: R, trie: &mut Trie) -> std::io::Result<u64> {
    let mut buf = Vec::new();
    let mut inserted = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        if let Some(password) = parse_password(&line) {
            trie.insert(password);
            inserted += 1;
        }
    }
    Ok(inserted)
}

/// Opens one corpus file and indexes its passwords.
pub fn load_corpus(path: &Path) -> Result<Trie> {
    let read_err = |source| AnalyzerError::CorpusRead { path: path.to_path_buf(), source };
    let file = File::open(path).map_err(read_err)?;
    let mut trie = Trie::new();
    let inserted = load_passwords(BufReader::new(file), &mut trie).map_err(read_err)?;
    tracing::debug!(
        "Indexed {} passwords from {} ({} nodes)",
        inserted,
        path.display(),
        trie.node_count()
    );
    Ok(trie)
}
