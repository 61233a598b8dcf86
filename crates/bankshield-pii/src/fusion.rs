//! Overlap resolution across detectors
//!
//! Candidates are sorted by start offset (stable, so ties keep emission order)
//! and scanned once. A candidate that starts inside the open entity and has the
//! same category is merged into it; anything else closes the open entity.
//! Overlaps between different categories are kept apart for the validator.

use bankshield_core::{CandidateEntity, FusedEntity};
use tracing::debug;

/// Merges candidate entities from all detectors
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityFuser;

impl EntityFuser {
    pub fn new() -> Self {
        Self
    }

    /// Merge overlapping same-category candidates
    ///
    /// The merged entity spans to the furthest end seen, keeps the maximum
    /// score and joins the provenance of both sides. Its text is the later
    /// candidate's, unless the later candidate lies inside the open span.
    pub fn merge(&self, candidates: &[CandidateEntity]) -> Vec<FusedEntity> {
        let mut sorted = candidates.to_vec();
        sorted.sort_by_key(|c| c.start);

        let mut fused = Vec::with_capacity(sorted.len());
        let mut pending = sorted.into_iter();
        let Some(mut current) = pending.next() else {
            return fused;
        };

        for next in pending {
            if next.start < current.end && next.category == current.category {
                debug!(
                    category = %current.category,
                    "Merging {}..{} into {}..{}",
                    next.start,
                    next.end,
                    current.start,
                    current.end
                );
                if next.end >= current.end {
                    current.text = next.text;
                    current.end = next.end;
                }
                current.score = current.score.max(next.score);
                current.method = current.method.join(&next.method);
            } else {
                fused.push(std::mem::replace(&mut current, next));
            }
        }
        fused.push(current);

        fused
    }

    /// Merge, then re-slice every entity's text from `source`
    ///
    /// After a partial overlap the representative text can be shorter than the
    /// merged span; re-slicing keeps `source[start..end] == text` for every
    /// fused entity.
    pub fn fuse(&self, source: &str, candidates: &[CandidateEntity]) -> Vec<FusedEntity> {
        let mut fused = self.merge(candidates);
        for entity in &mut fused {
            if let Some(slice) = source.get(entity.start..entity.end) {
                if slice != entity.text {
                    entity.text = slice.to_string();
                }
            }
        }
        fused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankshield_core::DetectionMethod;

    fn candidate(
        category: &str,
        source: &str,
        start: usize,
        end: usize,
        score: f32,
        method: DetectionMethod,
    ) -> CandidateEntity {
        CandidateEntity::from_span(category, source, start, end, score, method)
    }

    #[test]
    fn test_empty_input() {
        assert!(EntityFuser::new().merge(&[]).is_empty());
        assert!(EntityFuser::new().fuse("anything", &[]).is_empty());
    }

    #[test]
    fn test_same_span_from_two_detectors() {
        let text = "arun@x.co";
        let regex = candidate("EMAIL", text, 0, 9, 0.95, DetectionMethod::Regex);
        let ml = candidate("EMAIL", text, 0, 9, 0.80, DetectionMethod::Ml);

        let fused = EntityFuser::new().merge(&[regex, ml]);

        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].method.to_string(), "regex+ml");
        assert_eq!(fused[0].score, 0.95);
        assert_eq!(fused[0].text, "arun@x.co");
    }

    #[test]
    fn test_different_categories_are_kept_apart() {
        let text = "ABCPD1234E";
        let pan = candidate("PAN", text, 0, 10, 0.95, DetectionMethod::Regex);
        let voter = candidate("VOTERID", text, 0, 10, 0.60, DetectionMethod::Ml);

        let fused = EntityFuser::new().merge(&[pan, voter]);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].category, "PAN");
        assert_eq!(fused[1].category, "VOTERID");
    }

    #[test]
    fn test_longest_span_wins() {
        let text = "Arun Kumar Sharma";
        let short = candidate("FULLNAME", text, 0, 10, 0.95, DetectionMethod::NamePattern);
        let long = candidate("FULLNAME", text, 5, 17, 0.90, DetectionMethod::Regex);

        let fused = EntityFuser::new().fuse(text, &[long, short]);

        assert_eq!(fused.len(), 1);
        assert_eq!((fused[0].start, fused[0].end), (0, 17));
        assert_eq!(fused[0].text, "Arun Kumar Sharma");
        assert_eq!(fused[0].score, 0.95);
        assert_eq!(fused[0].method.to_string(), "name_pattern+regex");
    }

    #[test]
    fn test_contained_candidate_keeps_outer_text() {
        let text = "Call +91 9876543210";
        let outer = candidate("TELEPHONENUM", text, 5, 19, 0.9, DetectionMethod::Contextual);
        let inner = candidate("TELEPHONENUM", text, 9, 15, 0.7, DetectionMethod::Ml);

        let fused = EntityFuser::new().merge(&[outer, inner]);

        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].text, "+91 9876543210");
        assert_eq!(fused[0].end, 19);
    }

    #[test]
    fn test_touching_spans_do_not_merge() {
        let text = "12345678";
        let a = candidate("ACCOUNTNUM", text, 0, 4, 0.9, DetectionMethod::Regex);
        let b = candidate("ACCOUNTNUM", text, 4, 8, 0.9, DetectionMethod::Regex);

        assert_eq!(EntityFuser::new().merge(&[a, b]).len(), 2);
    }

    #[test]
    fn test_output_sorted_by_start_with_stable_ties() {
        let text = "PAN ABCPD1234E phone 9876543210";
        let phone = candidate("TELEPHONENUM", text, 21, 31, 0.9, DetectionMethod::Regex);
        let pan_ml = candidate("PAN", text, 4, 14, 0.8, DetectionMethod::Ml);
        let voter = candidate("VOTERID", text, 4, 14, 0.8, DetectionMethod::Regex);

        let fused = EntityFuser::new().merge(&[phone, pan_ml, voter]);
        let order: Vec<&str> = fused.iter().map(|e| e.category.as_str()).collect();

        assert_eq!(order, vec!["PAN", "VOTERID", "TELEPHONENUM"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let text = "Email arun@x.co or call Arun Kumar on 9876543210";
        let candidates = vec![
            candidate("EMAIL", text, 6, 15, 0.95, DetectionMethod::Regex),
            candidate("FULLNAME", text, 24, 34, 0.9, DetectionMethod::NamePattern),
            candidate("EMAIL", text, 6, 15, 0.8, DetectionMethod::Ml),
            candidate("TELEPHONENUM", text, 38, 48, 0.95, DetectionMethod::Regex),
            candidate("FULLNAME", text, 24, 34, 0.95, DetectionMethod::NamePattern),
            candidate("TELEPHONENUM", text, 40, 48, 0.6, DetectionMethod::Ml),
        ];

        let fuser = EntityFuser::new();
        let once = fuser.merge(&candidates);
        let twice = fuser.merge(&once);

        assert_eq!(once.len(), 3);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_fuse_restores_span_validity() {
        let text = "Arun Kumar Sharma";
        // Later candidate ends at the same place but starts later: its text is
        // shorter than the merged span
        let first = candidate("FULLNAME", text, 0, 17, 0.9, DetectionMethod::Regex);
        let second = candidate("FULLNAME", text, 5, 17, 0.95, DetectionMethod::NamePattern);

        let merged = EntityFuser::new().merge(&[first.clone(), second.clone()]);
        assert_eq!(merged[0].text, "Kumar Sharma");

        let fused = EntityFuser::new().fuse(text, &[first, second]);
        assert_eq!(fused[0].text, &text[fused[0].start..fused[0].end]);
    }
}
