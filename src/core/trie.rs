// --- File: src/core/trie.rs
use crate::core::types::{Count, FollowingCounts, PrefixRecord};
use std::collections::HashMap;

const ROOT: usize = 0;

#[derive(Debug)]
struct TrieNode {
    children: HashMap<char, usize>,
    /// Entries ending exactly at this node.
    end_of_word: Count,
    /// `end_of_word` plus the subtree totals of all children.
    subtree_total: Count,
}

impl TrieNode {
    fn new() -> Self {
        Self { children: HashMap::new(), end_of_word: 0, subtree_total: 0 }
    }
}

/// A per-corpus prefix index over passwords, keyed by code point.
///
/// Nodes live in a flat arena and refer to their children by index, so the
/// tree has a single owner and no reference cycles. Each node caches its
/// subtree total; `insert` keeps the cache current along the inserted path,
/// which makes every count query O(k) in the prefix length.
#[derive(Debug)]
pub struct Trie {
    nodes: Vec<TrieNode>,
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl Trie {
    pub fn new() -> Self {
        Self { nodes: vec![TrieNode::new()] }
    }

    /// Records one occurrence of `word`.
    /// O(k) complexity where k is the number of code points.
    pub fn insert(&mut self, word: &str) {
        let mut node_idx = ROOT;
        self.nodes[ROOT].subtree_total += 1;
        for c in word.chars() {
            let next_idx = if let Some(&id) = self.nodes[node_idx].children.get(&c) {
                id
            } else {
                let new_node_id = self.nodes.len();
                self.nodes.push(TrieNode::new());
                self.nodes[node_idx].children.insert(c, new_node_id);
                new_node_id
            };
            node_idx = next_idx;
            self.nodes[node_idx].subtree_total += 1;
        }
        self.nodes[node_idx].end_of_word += 1;
    }

    fn find(&self, prefix: &str) -> Option<usize> {
        let mut node_idx = ROOT;
        for c in prefix.chars() {
            node_idx = *self.nodes[node_idx].children.get(&c)?;
        }
        Some(node_idx)
    }

    /// Number of entries equal to `prefix`.
    pub fn count_standalone_occurrences(&self, prefix: &str) -> Count {
        self.find(prefix).map_or(0, |idx| self.nodes[idx].end_of_word)
    }

    /// Number of entries starting with `prefix`, exact matches included.
    pub fn count_words_with_prefix(&self, prefix: &str) -> Count {
        self.find(prefix).map_or(0, |idx| self.nodes[idx].subtree_total)
    }

    /// Subtree total of every immediate child of `prefix`'s node.
    pub fn following_character_counts(&self, prefix: &str) -> FollowingCounts {
        match self.find(prefix) {
            Some(idx) => self.child_counts(idx),
            None => FollowingCounts::new(),
        }
    }

    fn child_counts(&self, idx: usize) -> FollowingCounts {
        self.nodes[idx]
            .children
            .iter()
            .map(|(&c, &child)| (c, self.nodes[child].subtree_total))
            .collect()
    }

    pub fn prefix_record(&self, prefix: &str) -> Option<PrefixRecord> {
        self.find(prefix).map(|idx| self.record_at(idx, prefix.to_string()))
    }

    fn record_at(&self, idx: usize, prefix: String) -> PrefixRecord {
        let node = &self.nodes[idx];
        PrefixRecord {
            prefix,
            standalone_count: node.end_of_word,
            following_count: node.subtree_total - node.end_of_word,
        }
    }

    /// Prefixes whose standalone count is strictly greater than `threshold`.
    ///
    /// The walk descends below qualifying nodes too, so a longer prefix can
    /// qualify on its own. Results are in code-point lexicographic order.
    pub fn qualifying_prefixes(&self, threshold: Count) -> Vec<String> {
        self.qualifying_records(threshold).into_iter().map(|r| r.prefix).collect()
    }

    /// Like [`Trie::qualifying_prefixes`], with the counts attached.
    pub fn qualifying_records(&self, threshold: Count) -> Vec<PrefixRecord> {
        let mut results = Vec::new();
        // Iterative DFS; passwords can be long enough to blow the call stack.
        let mut stack: Vec<(usize, String)> = vec![(ROOT, String::new())];
        while let Some((idx, prefix)) = stack.pop() {
            let node = &self.nodes[idx];
            // A node below the threshold may still have qualifying descendants,
            // but a subtree whose total cannot exceed it is skipped entirely.
            if node.subtree_total <= threshold {
                continue;
            }
            for (&c, &child) in &node.children {
                let mut child_prefix = prefix.clone();
                child_prefix.push(c);
                stack.push((child, child_prefix));
            }
            if node.end_of_word > threshold {
                results.push(self.record_at(idx, prefix));
            }
        }
        results.sort_by(|a, b| a.prefix.cmp(&b.prefix));
        results
    }

    /// Total number of inserted entries.
    pub fn len(&self) -> Count {
        self.nodes[ROOT].subtree_total
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie_of(words: &[&str]) -> Trie {
        let mut trie = Trie::new();
        for w in words {
            trie.insert(w);
        }
        trie
    }

    #[test]
    fn standalone_counts_repeated_inserts() {
        let trie = trie_of(&["pass", "pass", "pass", "password"]);
        assert_eq!(trie.count_standalone_occurrences("pass"), 3);
        assert_eq!(trie.count_standalone_occurrences("password"), 1);
        assert_eq!(trie.count_standalone_occurrences("passw"), 0);
        assert_eq!(trie.count_standalone_occurrences("missing"), 0);
    }

    #[test]
    fn words_with_prefix_include_exact_matches() {
        let trie = trie_of(&["abc", "abd", "ab", "b", "abcd"]);
        assert_eq!(trie.count_words_with_prefix("ab"), 4);
        assert_eq!(trie.count_words_with_prefix("abc"), 2);
        assert_eq!(trie.count_words_with_prefix(""), 5);
        assert_eq!(trie.count_words_with_prefix("zz"), 0);
        assert_eq!(trie.len(), 5);
    }

    #[test]
    fn following_counts_are_child_subtree_totals() {
        let trie = trie_of(&["ab", "abc", "abcd", "abx", "abx", "ab"]);
        let counts = trie.following_character_counts("ab");
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&'c'], 2);
        assert_eq!(counts[&'x'], 2);
        assert!(trie.following_character_counts("q").is_empty());
        assert!(trie.following_character_counts("abcd").is_empty());
    }

    #[test]
    fn multibyte_characters_are_single_edges() {
        let trie = trie_of(&["pässe", "päss", "päß"]);
        let counts = trie.following_character_counts("pä");
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&'s'], 2);
        assert_eq!(counts[&'ß'], 1);
        assert_eq!(trie.count_words_with_prefix("pä"), 3);
    }

    #[test]
    fn prefix_record_splits_standalone_and_following() {
        let trie = trie_of(&["x", "x", "x1", "x22"]);
        let rec = trie.prefix_record("x").unwrap();
        assert_eq!(rec.standalone_count, 2);
        assert_eq!(rec.following_count, 2);
        assert!(trie.prefix_record("y").is_none());
    }

    #[test]
    fn qualifying_prefixes_is_strict_and_descends() {
        let mut trie = Trie::new();
        for _ in 0..5 {
            trie.insert("love");
            trie.insert("lovely");
        }
        for _ in 0..3 {
            trie.insert("abc");
        }
        trie.insert("lovel");
        assert_eq!(trie.qualifying_prefixes(4), vec!["love", "lovely"]);
        assert_eq!(trie.qualifying_prefixes(2), vec!["abc", "love", "lovely"]);
        assert!(trie.qualifying_prefixes(5).is_empty());
    }

    #[test]
    fn subtree_invariant_holds_on_every_prefix() {
        let words = ["a", "ab", "abc", "abc", "b", "ba", "", "bab"];
        let trie = trie_of(&words);
        for prefix in ["", "a", "ab", "abc", "b", "ba", "bab"] {
            let expected = words.iter().filter(|w| w.starts_with(prefix)).count() as Count;
            assert_eq!(trie.count_words_with_prefix(prefix), expected, "prefix {prefix:?}");
            let following: Count = trie.following_character_counts(prefix).values().sum();
            assert_eq!(
                trie.count_standalone_occurrences(prefix) + following,
                expected
            );
        }
    }
}
