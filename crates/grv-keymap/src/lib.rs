//! Keymap trie and dispatch loop (spec.md §4.5).
//!
//! Each view owns a trie over tokenised key sequences; a synthetic `All`
//! trie applies underneath every view. `Dispatcher` runs the longest-match
//! loop described in spec.md §4.5: prefix buffers suspend until more input
//! arrives, mappings re-expand, and unmatched input falls through as a
//! literal key-press to the active view.

use grv_events::{Action, KeyToken};
use smallvec::SmallVec;
use std::collections::HashMap;

/// A trie entry: either a dispatched action or a further key-string to
/// re-expand and re-resolve.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Action(Action),
    Mapping(Vec<KeyToken>),
}

#[derive(Debug, Clone)]
pub struct MappingSpec {
    pub sequence: Vec<KeyToken>,
    pub binding: Binding,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    tok: KeyToken,
    next: usize,
}

#[derive(Debug, Default)]
struct Node {
    terminal: Option<usize>,
    edges: SmallVec<[Edge; 4]>,
}

/// Result of attempting to resolve a buffer of tokens against a trie.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// `consumed` tokens formed a complete binding. `ambiguous` is set when
    /// the matched node still has outgoing edges, i.e. a longer binding
    /// could also apply if more input arrives.
    Matched {
        consumed: usize,
        binding: Binding,
        ambiguous: bool,
    },
    /// The buffer is a strict prefix of some binding; wait for more input.
    NeedMore,
    /// No binding starts with the buffer's first token; caller should treat
    /// it as a literal key-press.
    FallbackLiteral(KeyToken),
}

pub struct MappingTrie {
    nodes: Vec<Node>,
    mappings: Vec<MappingSpec>,
}

impl MappingTrie {
    pub fn build(specs: Vec<MappingSpec>) -> Self {
        let mut nodes = vec![Node::default()];
        let mut mappings = Vec::new();
        for spec in specs {
            let mut cur = 0usize;
            for tok in &spec.sequence {
                let existing = nodes[cur]
                    .edges
                    .iter()
                    .find(|e| e.tok == *tok)
                    .map(|e| e.next);
                cur = match existing {
                    Some(n) => n,
                    None => {
                        nodes.push(Node::default());
                        let new_idx = nodes.len() - 1;
                        nodes[cur].edges.push(Edge { tok: *tok, next: new_idx });
                        new_idx
                    }
                };
            }
            let mapping_idx = mappings.len();
            nodes[cur].terminal = Some(mapping_idx);
            mappings.push(spec);
        }
        Self { nodes, mappings }
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn resolve(&self, buffer: &[KeyToken]) -> Resolution {
        if buffer.is_empty() {
            return Resolution::NeedMore;
        }
        let mut cur = 0usize;
        let mut last_terminal: Option<(usize, usize)> = None;

        for (i, tok) in buffer.iter().enumerate() {
            let next = self.nodes[cur].edges.iter().find(|e| e.tok == *tok).map(|e| e.next);
            match next {
                Some(n) => {
                    cur = n;
                    if let Some(idx) = self.nodes[cur].terminal {
                        last_terminal = Some((i + 1, idx));
                    }
                }
                None => {
                    return match last_terminal {
                        Some((consumed, idx)) => Resolution::Matched {
                            consumed,
                            binding: self.mappings[idx].binding.clone(),
                            ambiguous: false,
                        },
                        None => Resolution::FallbackLiteral(buffer[0]),
                    };
                }
            }
        }

        // Consumed the whole buffer without hitting a dead end.
        let has_more_edges = !self.nodes[cur].edges.is_empty();
        match (self.nodes[cur].terminal, has_more_edges) {
            (Some(idx), ambiguous) => Resolution::Matched {
                consumed: buffer.len(),
                binding: self.mappings[idx].binding.clone(),
                ambiguous,
            },
            (None, true) => Resolution::NeedMore,
            (None, false) => match last_terminal {
                Some((consumed, idx)) => Resolution::Matched {
                    consumed,
                    binding: self.mappings[idx].binding.clone(),
                    ambiguous: false,
                },
                None => Resolution::FallbackLiteral(buffer[0]),
            },
        }
    }
}

/// Registry of per-view tries plus the synthetic `All` trie that applies
/// underneath every view (spec.md §4.5, §9 "Per-view trie with override").
pub struct KeymapRegistry {
    by_view: HashMap<String, MappingTrie>,
    all: MappingTrie,
}

impl KeymapRegistry {
    pub fn new(all: MappingTrie) -> Self {
        Self {
            by_view: HashMap::new(),
            all,
        }
    }

    pub fn register_view(&mut self, view: impl Into<String>, trie: MappingTrie) {
        self.by_view.insert(view.into(), trie);
    }

    /// Resolve `buffer` by trying each view in `chain` (deepest-first),
    /// falling back to the `All` trie last.
    pub fn resolve_chain(&self, chain: &[String], buffer: &[KeyToken]) -> Resolution {
        for view in chain {
            if let Some(trie) = self.by_view.get(view) {
                match trie.resolve(buffer) {
                    Resolution::FallbackLiteral(_) => continue,
                    other => return other,
                }
            }
        }
        self.all.resolve(buffer)
    }
}

/// A single step of the dispatch loop: either an action fired, a literal
/// key-press that fell through, or a pending prefix.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Pending,
    Action(Action),
    Literal(KeyToken),
}

/// Input buffer plus the dispatch loop described in spec.md §4.5.
#[derive(Default)]
pub struct Dispatcher {
    buffer: Vec<KeyToken>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed one key token in; returns every outcome produced synchronously
    /// (an action, a fallen-through literal, or nothing if the buffer is
    /// still a pending prefix). At-most-once: each produced action appears
    /// exactly once in the returned vector.
    pub fn feed(
        &mut self,
        registry: &KeymapRegistry,
        chain: &[String],
        token: KeyToken,
    ) -> Vec<DispatchOutcome> {
        self.buffer.push(token);
        let mut outcomes = Vec::new();

        loop {
            match registry.resolve_chain(chain, &self.buffer) {
                Resolution::NeedMore => {
                    break;
                }
                Resolution::FallbackLiteral(tok) => {
                    self.buffer.remove(0);
                    outcomes.push(DispatchOutcome::Literal(tok));
                    if self.buffer.is_empty() {
                        break;
                    }
                }
                Resolution::Matched {
                    consumed, binding, ..
                } => {
                    self.buffer.drain(0..consumed);
                    match binding {
                        Binding::Action(action) => outcomes.push(DispatchOutcome::Action(action)),
                        Binding::Mapping(expansion) => {
                            let mut new_buf = expansion;
                            new_buf.extend(self.buffer.drain(..));
                            self.buffer = new_buf;
                        }
                    }
                    if self.buffer.is_empty() {
                        break;
                    }
                }
            }
        }

        if outcomes.is_empty() {
            outcomes.push(DispatchOutcome::Pending);
        }
        outcomes
    }
}

/// A minimal baseline trie covering the defaults named in spec.md §6's help
/// hints, usable as the `All` trie before any `map` directives are applied.
pub fn baseline_all_specs() -> Vec<MappingSpec> {
    use Action::*;
    use KeyToken::*;
    vec![
        MappingSpec {
            sequence: vec![Char('j')],
            binding: Binding::Action(NextLine),
        },
        MappingSpec {
            sequence: vec![Char('k')],
            binding: Binding::Action(PrevLine),
        },
        MappingSpec {
            sequence: vec![Char('g'), Char('g')],
            binding: Binding::Action(FirstLine),
        },
        MappingSpec {
            sequence: vec![Char('G')],
            binding: Binding::Action(LastLine),
        },
        MappingSpec {
            sequence: vec![Char(':')],
            binding: Binding::Action(Prompt),
        },
        MappingSpec {
            sequence: vec![Char('/')],
            binding: Binding::Action(SearchPrompt),
        },
        MappingSpec {
            sequence: vec![Char('?')],
            binding: Binding::Action(ReverseSearchPrompt),
        },
        MappingSpec {
            sequence: vec![Char('q')],
            binding: Binding::Action(Exit),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie(specs: Vec<MappingSpec>) -> MappingTrie {
        MappingTrie::build(specs)
    }

    #[test]
    fn single_key_match() {
        let t = trie(vec![MappingSpec {
            sequence: vec![KeyToken::Char('j')],
            binding: Binding::Action(Action::NextLine),
        }]);
        assert_eq!(
            t.resolve(&[KeyToken::Char('j')]),
            Resolution::Matched {
                consumed: 1,
                binding: Binding::Action(Action::NextLine),
                ambiguous: false
            }
        );
    }

    #[test]
    fn need_more_for_prefix() {
        let t = trie(vec![MappingSpec {
            sequence: vec![KeyToken::Char('g'), KeyToken::Char('g')],
            binding: Binding::Action(Action::FirstLine),
        }]);
        assert_eq!(t.resolve(&[KeyToken::Char('g')]), Resolution::NeedMore);
    }

    #[test]
    fn multi_key_longest_match_fires_once_remainder_supplied() {
        let t = trie(vec![MappingSpec {
            sequence: vec![KeyToken::Char('g'), KeyToken::Char('g')],
            binding: Binding::Action(Action::FirstLine),
        }]);
        assert_eq!(
            t.resolve(&[KeyToken::Char('g'), KeyToken::Char('g')]),
            Resolution::Matched {
                consumed: 2,
                binding: Binding::Action(Action::FirstLine),
                ambiguous: false
            }
        );
    }

    #[test]
    fn fallback_literal_for_unbound_key() {
        let t = trie(vec![MappingSpec {
            sequence: vec![KeyToken::Char('j')],
            binding: Binding::Action(Action::NextLine),
        }]);
        assert_eq!(
            t.resolve(&[KeyToken::Char('x')]),
            Resolution::FallbackLiteral(KeyToken::Char('x'))
        );
    }

    #[test]
    fn dispatcher_prefix_does_not_fire_until_remainder_arrives() {
        let all = trie(vec![MappingSpec {
            sequence: vec![KeyToken::Char('g'), KeyToken::Char('g')],
            binding: Binding::Action(Action::FirstLine),
        }]);
        let registry = KeymapRegistry::new(all);
        let mut dispatcher = Dispatcher::new();
        let chain = vec!["CommitView".to_string()];

        let out1 = dispatcher.feed(&registry, &chain, KeyToken::Char('g'));
        assert_eq!(out1, vec![DispatchOutcome::Pending]);

        let out2 = dispatcher.feed(&registry, &chain, KeyToken::Char('g'));
        assert_eq!(out2, vec![DispatchOutcome::Action(Action::FirstLine)]);
    }

    #[test]
    fn dispatcher_mapping_reexpands_and_fires_once() {
        let all = trie(vec![
            MappingSpec {
                sequence: vec![KeyToken::Char('Z')],
                binding: Binding::Mapping(vec![KeyToken::Char('g'), KeyToken::Char('g')]),
            },
            MappingSpec {
                sequence: vec![KeyToken::Char('g'), KeyToken::Char('g')],
                binding: Binding::Action(Action::FirstLine),
            },
        ]);
        let registry = KeymapRegistry::new(all);
        let mut dispatcher = Dispatcher::new();
        let chain = vec!["CommitView".to_string()];

        let out = dispatcher.feed(&registry, &chain, KeyToken::Char('Z'));
        assert_eq!(out, vec![DispatchOutcome::Action(Action::FirstLine)]);
    }

    #[test]
    fn dispatcher_unmapped_key_falls_through_as_literal() {
        let all = trie(vec![MappingSpec {
            sequence: vec![KeyToken::Char('j')],
            binding: Binding::Action(Action::NextLine),
        }]);
        let registry = KeymapRegistry::new(all);
        let mut dispatcher = Dispatcher::new();
        let chain = vec!["CommitView".to_string()];

        let out = dispatcher.feed(&registry, &chain, KeyToken::Char('x'));
        assert_eq!(out, vec![DispatchOutcome::Literal(KeyToken::Char('x'))]);
    }

    #[test]
    fn view_specific_trie_overrides_all_trie() {
        let all = trie(vec![MappingSpec {
            sequence: vec![KeyToken::Char('j')],
            binding: Binding::Action(Action::NextLine),
        }]);
        let mut registry = KeymapRegistry::new(all);
        registry.register_view(
            "RefView",
            trie(vec![MappingSpec {
                sequence: vec![KeyToken::Char('j')],
                binding: Binding::Action(Action::Select),
            }]),
        );
        let chain = vec!["RefView".to_string()];
        assert_eq!(
            registry.resolve_chain(&chain, &[KeyToken::Char('j')]),
            Resolution::Matched {
                consumed: 1,
                binding: Binding::Action(Action::Select),
                ambiguous: false
            }
        );
    }
}
