use std::collections::HashMap;
use std::fmt;

use chatmark_fingerprint::{truncate_utf16, Fingerprint};
use chatmark_types::{Annotation, Item, Reference};
use serde::Serialize;
use tracing::debug;

/// Number of leading snippet UTF-16 units compared by the snippet tier.
pub const SNIPPET_PREFIX_LEN: usize = 40;

/// Which tier placed a reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchTier {
    /// An item's fingerprint equals the reference's.
    Fingerprint,
    /// A same-role item's snippet starts with the reference's snippet prefix.
    SnippetPrefix,
    /// The same-role item closest to the reference's ordinal hint.
    NearestOrdinal,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fingerprint => write!(f, "fingerprint"),
            Self::SnippetPrefix => write!(f, "snippet-prefix"),
            Self::NearestOrdinal => write!(f, "nearest-ordinal"),
        }
    }
}

/// A placed reference: index into the scan slice plus the tier that found it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Match {
    pub index: usize,
    pub tier: MatchTier,
}

/// Outcome of resolving one reference against one scan.
///
/// Holds an index rather than a borrowed item so results can be kept next to
/// the host's own per-scan handles. Never persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub matched: Option<Match>,
}

impl Resolution {
    pub const MISSING: Self = Self { matched: None };

    /// No tier could place the reference.
    pub fn is_missing(&self) -> bool {
        self.matched.is_none()
    }

    pub fn tier(&self) -> Option<MatchTier> {
        self.matched.map(|m| m.tier)
    }

    /// The matched item within the scan this resolution was computed for.
    pub fn item<'a>(&self, items: &'a [Item]) -> Option<&'a Item> {
        self.matched.and_then(|m| items.get(m.index))
    }
}

/// An annotation paired with its resolution in the current scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedAnnotation<'a> {
    pub annotation: &'a Annotation,
    pub item: Option<&'a Item>,
    pub tier: Option<MatchTier>,
    pub missing: bool,
}

/// Per-tier counts for one resolution pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionSummary {
    pub fingerprint: usize,
    pub snippet_prefix: usize,
    pub nearest_ordinal: usize,
    pub missing: usize,
}

impl ResolutionSummary {
    pub fn from_resolutions(resolutions: &[Resolution]) -> Self {
        Self::from_tiers(resolutions.iter().map(Resolution::tier))
    }

    /// Count tiers; `None` counts as missing.
    pub fn from_tiers<I>(tiers: I) -> Self
    where
        I: IntoIterator<Item = Option<MatchTier>>,
    {
        let mut summary = Self::default();
        for tier in tiers {
            match tier {
                Some(MatchTier::Fingerprint) => summary.fingerprint += 1,
                Some(MatchTier::SnippetPrefix) => summary.snippet_prefix += 1,
                Some(MatchTier::NearestOrdinal) => summary.nearest_ordinal += 1,
                None => summary.missing += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.fingerprint + self.snippet_prefix + self.nearest_ordinal + self.missing
    }
}

/// Lookup structures for one scan, built once and shared by every reference
/// resolved against it.
pub struct ScanIndex<'a> {
    items: &'a [Item],
    /// First index (scan order) holding each fingerprint.
    first_by_fingerprint: HashMap<&'a Fingerprint, usize>,
    /// Lowercased snippets, parallel to `items`.
    lowered: Vec<String>,
}

impl<'a> ScanIndex<'a> {
    pub fn new(items: &'a [Item]) -> Self {
        let mut first_by_fingerprint = HashMap::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            first_by_fingerprint.entry(&item.fingerprint).or_insert(idx);
        }
        let lowered = items.iter().map(|i| i.snippet.to_lowercase()).collect();
        Self {
            items,
            first_by_fingerprint,
            lowered,
        }
    }

    pub fn items(&self) -> &'a [Item] {
        self.items
    }

    /// Resolve one reference, stopping at the first tier that matches.
    pub fn resolve(&self, reference: &Reference) -> Resolution {
        let matched = self
            .by_fingerprint(reference)
            .map(|index| Match {
                index,
                tier: MatchTier::Fingerprint,
            })
            .or_else(|| {
                self.by_snippet_prefix(reference).map(|index| Match {
                    index,
                    tier: MatchTier::SnippetPrefix,
                })
            })
            .or_else(|| {
                self.by_nearest_ordinal(reference).map(|index| Match {
                    index,
                    tier: MatchTier::NearestOrdinal,
                })
            });
        Resolution { matched }
    }

    fn by_fingerprint(&self, reference: &Reference) -> Option<usize> {
        let fingerprint = reference.fingerprint.as_ref().filter(|fp| !fp.is_empty())?;
        self.first_by_fingerprint.get(fingerprint).copied()
    }

    // First same-role match wins even when several items share the prefix.
    fn by_snippet_prefix(&self, reference: &Reference) -> Option<usize> {
        let snippet = reference.snippet()?;
        let prefix = truncate_utf16(snippet, SNIPPET_PREFIX_LEN).to_lowercase();
        self.items
            .iter()
            .zip(&self.lowered)
            .position(|(item, lowered)| item.role == reference.role && lowered.starts_with(&prefix))
    }

    fn by_nearest_ordinal(&self, reference: &Reference) -> Option<usize> {
        let hint = reference.ordinal_hint?;
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.role == reference.role)
            // `min_by_key` keeps the first of equal minima: ties go to scan order.
            .min_by_key(|(_, item)| item.ordinal.abs_diff(hint))
            .map(|(idx, _)| idx)
    }
}

/// Resolve each reference against `items`, one result per reference, in
/// input order.
pub fn resolve<'r, I>(references: I, items: &[Item]) -> Vec<Resolution>
where
    I: IntoIterator<Item = &'r Reference>,
{
    let index = ScanIndex::new(items);
    let resolutions: Vec<Resolution> = references
        .into_iter()
        .map(|reference| index.resolve(reference))
        .collect();

    let summary = ResolutionSummary::from_resolutions(&resolutions);
    debug!(
        items = items.len(),
        references = summary.total(),
        fingerprint = summary.fingerprint,
        snippet_prefix = summary.snippet_prefix,
        nearest_ordinal = summary.nearest_ordinal,
        missing = summary.missing,
        "resolution pass"
    );
    resolutions
}

/// Resolve every annotation's reference and pair the result with it.
pub fn resolve_annotations<'a>(
    annotations: &'a [Annotation],
    items: &'a [Item],
) -> Vec<ResolvedAnnotation<'a>> {
    let resolutions = resolve(annotations.iter().map(|a| &a.reference), items);
    annotations
        .iter()
        .zip(resolutions)
        .map(|(annotation, resolution)| ResolvedAnnotation {
            annotation,
            item: resolution.item(items),
            tier: resolution.tier(),
            missing: resolution.is_missing(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatmark_types::{make_reference, scan_items, AnnotationId, MarkerColor};
    use proptest::prelude::*;

    fn reference(role: &str, fp: &str, snippet: Option<&str>, hint: Option<u32>) -> Reference {
        Reference {
            role: role.into(),
            fingerprint: Some(Fingerprint::new(fp)),
            snippet: snippet.map(str::to_string),
            ordinal_hint: hint,
        }
    }

    #[test]
    fn exact_fingerprint_match() {
        let items = scan_items([("user", "question"), ("assistant", "answer")]);
        let r = make_reference(&items[1]);
        let res = resolve([&r], &items);
        assert_eq!(
            res[0].matched,
            Some(Match {
                index: 1,
                tier: MatchTier::Fingerprint
            })
        );
        assert_eq!(res[0].item(&items).unwrap().text, "answer");
    }

    #[test]
    fn fingerprint_beats_closer_ordinal() {
        let items = scan_items([
            ("assistant", "first answer"),
            ("assistant", "second answer"),
            ("assistant", "third answer"),
        ]);
        let mut r = make_reference(&items[0]);
        // Positionally the reference now points at item 2.
        r.ordinal_hint = Some(2);
        let res = resolve([&r], &items);
        assert_eq!(res[0].tier(), Some(MatchTier::Fingerprint));
        assert_eq!(res[0].matched.unwrap().index, 0);
    }

    #[test]
    fn duplicate_fingerprints_resolve_to_first_in_scan_order() {
        let items = scan_items([
            ("user", "ok"),
            ("assistant", "x"),
            ("user", "ok"),
        ]);
        let r = make_reference(&items[2]);
        assert_eq!(resolve([&r], &items)[0].matched.unwrap().index, 0);
    }

    #[test]
    fn snippet_prefix_tier_is_case_insensitive() {
        let items = scan_items([
            ("user", "q0"),
            ("assistant", "a1"),
            ("user", "q2"),
            ("user", "q3"),
            ("assistant", "hello world, edited since the note was made"),
        ]);
        let r = reference("assistant", "zz9", Some("Hello world"), Some(3));
        let res = resolve([&r], &items);
        assert_eq!(
            res[0].matched,
            Some(Match {
                index: 4,
                tier: MatchTier::SnippetPrefix
            })
        );
        assert_eq!(res[0].item(&items).unwrap().ordinal, 4);
    }

    #[test]
    fn snippet_prefix_requires_same_role() {
        let items = scan_items([("user", "Hello world")]);
        let r = reference("assistant", "zz9", Some("Hello world"), None);
        assert!(resolve([&r], &items)[0].is_missing());
    }

    #[test]
    fn snippet_prefix_uses_only_first_forty_chars() {
        let stored = format!("{}{}", "a".repeat(SNIPPET_PREFIX_LEN), " old ending");
        let current = format!("{}{}", "A".repeat(SNIPPET_PREFIX_LEN), " new ending");
        let items = scan_items([("user", current.as_str())]);
        let r = reference("user", "nope", Some(&stored), None);
        assert_eq!(resolve([&r], &items)[0].tier(), Some(MatchTier::SnippetPrefix));
    }

    #[test]
    fn empty_snippet_skips_prefix_tier() {
        let items = scan_items([("user", "anything")]);
        let r = reference("user", "nope", Some(""), None);
        assert!(resolve([&r], &items)[0].is_missing());
    }

    #[test]
    fn nearest_ordinal_ties_go_to_first_encountered() {
        let items = scan_items([
            ("user", "u0"),
            ("assistant", "a1"),
            ("user", "u2"),
            ("user", "u3"),
            ("user", "u4"),
            ("assistant", "a5"),
            ("assistant", "a6"),
        ]);
        let r = reference("assistant", "zz9", Some("Hello world"), Some(3));
        let res = resolve([&r], &items);
        assert_eq!(res[0].tier(), Some(MatchTier::NearestOrdinal));
        assert_eq!(res[0].item(&items).unwrap().ordinal, 1);
    }

    #[test]
    fn nearest_ordinal_picks_closest() {
        let items = scan_items([
            ("assistant", "a0"),
            ("user", "u1"),
            ("assistant", "a2"),
            ("assistant", "a3"),
        ]);
        let r = reference("assistant", "zz9", None, Some(4));
        assert_eq!(resolve([&r], &items)[0].item(&items).unwrap().ordinal, 3);
    }

    #[test]
    fn total_miss_is_missing_not_error() {
        let items = scan_items([("user", "only user messages")]);
        let r = reference("assistant", "zz9", Some("Hello world"), Some(3));
        let res = resolve([&r], &items);
        assert!(res[0].is_missing());
        assert_eq!(res[0].item(&items), None);

        let legacy = Reference {
            role: "user".into(),
            fingerprint: None,
            snippet: None,
            ordinal_hint: None,
        };
        assert!(resolve([&legacy], &items)[0].is_missing());
    }

    #[test]
    fn empty_scan_leaves_everything_missing() {
        let r = reference("user", "abc", Some("x"), Some(0));
        assert_eq!(resolve([&r, &r], &[]), vec![Resolution::MISSING; 2]);
    }

    #[test]
    fn results_preserve_input_order() {
        let items = scan_items([("user", "one"), ("user", "two"), ("user", "three")]);
        let refs: Vec<Reference> = items.iter().rev().map(make_reference).collect();
        let indices: Vec<usize> = resolve(&refs, &items)
            .iter()
            .map(|r| r.matched.unwrap().index)
            .collect();
        assert_eq!(indices, vec![2, 1, 0]);
    }

    #[test]
    fn annotations_are_paired_with_items() {
        let items = scan_items([("user", "hi"), ("assistant", "hello")]);
        let found = Annotation::with_id(
            AnnotationId::new("cm-1"),
            make_reference(&items[1]),
            "note",
            None,
            MarkerColor::Blue,
        )
        .unwrap();
        let lost = Annotation::with_id(
            AnnotationId::new("cm-2"),
            reference("system", "gone", None, None),
            "lost",
            None,
            MarkerColor::Red,
        )
        .unwrap();
        let annotations = vec![found, lost];

        let resolved = resolve_annotations(&annotations, &items);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].item.map(|i| i.text.as_str()), Some("hello"));
        assert!(!resolved[0].missing);
        assert!(resolved[1].missing);
        assert_eq!(resolved[1].tier, None);
    }

    #[test]
    fn summary_counts_tiers() {
        let items = scan_items([("user", "a"), ("assistant", "b")]);
        let refs = vec![
            make_reference(&items[0]),
            reference("assistant", "zz", Some("B"), None),
            reference("assistant", "zz", None, Some(9)),
            reference("tool", "zz", None, Some(0)),
        ];
        let summary = ResolutionSummary::from_resolutions(&resolve(&refs, &items));
        assert_eq!(
            summary,
            ResolutionSummary {
                fingerprint: 1,
                snippet_prefix: 1,
                nearest_ordinal: 1,
                missing: 1,
            }
        );
        assert_eq!(summary.total(), 4);
    }

    #[test]
    fn snippet_prefix_counts_utf16_units() {
        // 19 emoji fill 38 units; the 40-unit prefix then takes "ab".
        let head = "\u{1F600}".repeat(19);
        let stored = format!("{head}ab old ending");
        let current = format!("{head}AB new ending");
        let items = scan_items([("user", current.as_str())]);
        let r = reference("user", "nope", Some(&stored), None);
        assert_eq!(resolve([&r], &items)[0].tier(), Some(MatchTier::SnippetPrefix));
    }

    fn scan_strategy() -> impl Strategy<Value = Vec<Item>> {
        prop::collection::vec((prop::sample::select(vec!["user", "assistant"]), "[ab]{0,2}"), 1..12)
            .prop_map(scan_items)
    }

    fn reference_strategy() -> impl Strategy<Value = Reference> {
        (
            prop::sample::select(vec!["user", "assistant", "tool"]),
            prop::option::of("[a-z0-9]{1,6}"),
            prop::option::of("[abAB]{0,3}"),
            prop::option::of(0u32..16),
        )
            .prop_map(|(role, fingerprint, snippet, ordinal_hint)| Reference {
                role: role.into(),
                fingerprint: fingerprint.map(Fingerprint::new),
                snippet,
                ordinal_hint,
            })
    }

    proptest! {
        #[test]
        fn one_result_per_reference_in_input_order(
            items in scan_strategy(),
            mut refs in prop::collection::vec(reference_strategy(), 0..10),
        ) {
            let forward = resolve(&refs, &items);
            prop_assert_eq!(forward.len(), refs.len());

            refs.reverse();
            let mut backward = resolve(&refs, &items);
            backward.reverse();
            prop_assert_eq!(forward, backward);
        }

        #[test]
        fn fingerprint_tier_wins_over_any_ordinal_hint(
            items in scan_strategy(),
            pick in any::<prop::sample::Index>(),
            hint in prop::option::of(0u32..32),
        ) {
            let target = &items[pick.index(items.len())];
            let mut r = make_reference(target);
            r.ordinal_hint = hint;
            let first = items
                .iter()
                .position(|item| item.fingerprint == target.fingerprint)
                .unwrap();

            let res = resolve([&r], &items);
            prop_assert_eq!(
                res[0].matched,
                Some(Match { index: first, tier: MatchTier::Fingerprint })
            );
        }
    }
}
