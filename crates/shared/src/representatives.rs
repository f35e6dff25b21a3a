use std::collections::HashMap;

use crate::models::{Article, Lean};

/// Articles used when no member carries a known lean
const FALLBACK_REPS: usize = 3;

/// Picks a viewpoint-balanced subset of each story group
pub struct RepresentativeSelector {
    max_per_lean: usize,
}

impl RepresentativeSelector {
    pub fn new(max_per_lean: usize) -> Self {
        Self { max_per_lean }
    }

    /// Choose representatives among `members` (article ids, in input order).
    ///
    /// Leans are drawn left, center, right, up to `max_per_lean` each. Result
    /// is non-empty whenever `members` is.
    pub fn select(&self, members: &[usize], articles: &[Article]) -> Vec<usize> {
        let mut by_lean: HashMap<Lean, Vec<usize>> = HashMap::new();
        for &id in members {
            by_lean.entry(articles[id].lean).or_default().push(id);
        }

        let mut reps: Vec<usize> = Lean::PRIORITY
            .iter()
            .filter_map(|lean| by_lean.get(lean))
            .flat_map(|ids| ids.iter().take(self.max_per_lean).copied())
            .collect();

        if reps.is_empty() {
            reps = members.iter().take(FALLBACK_REPS).copied().collect();
        }
        reps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArticleRecord;

    fn articles(leans: &[Lean]) -> Vec<Article> {
        leans
            .iter()
            .enumerate()
            .map(|(i, lean)| {
                Article::from_record(
                    i,
                    ArticleRecord {
                        url: format!("https://example.com/{}", i),
                        title: format!("Story {}", i),
                        text: None,
                        source: format!("Outlet {}", i),
                        lean: *lean,
                        summary: String::new(),
                    },
                    100,
                )
            })
            .collect()
    }

    #[test]
    fn test_orders_by_lean_priority() {
        let arts = articles(&[Lean::Right, Lean::Center, Lean::Left]);
        let reps = RepresentativeSelector::new(5).select(&[0, 1, 2], &arts);
        assert_eq!(reps, vec![2, 1, 0]);
    }

    #[test]
    fn test_caps_each_lean() {
        let arts = articles(&[Lean::Left, Lean::Left, Lean::Left, Lean::Right, Lean::Right]);
        let reps = RepresentativeSelector::new(2).select(&[0, 1, 2, 3, 4], &arts);
        assert_eq!(reps, vec![0, 1, 3, 4]);
    }

    #[test]
    fn test_bound_and_subset() {
        let leans: Vec<Lean> = (0..20)
            .map(|i| Lean::PRIORITY[i % 3])
            .collect();
        let arts = articles(&leans);
        let members: Vec<usize> = (0..20).collect();
        let reps = RepresentativeSelector::new(2).select(&members, &arts);

        assert!(reps.len() <= 3 * 2);
        assert!(reps.iter().all(|r| members.contains(r)));
    }

    #[test]
    fn test_unknown_leans_fall_back_to_first_members() {
        let arts = articles(&[Lean::Unknown; 5]);
        let reps = RepresentativeSelector::new(5).select(&[0, 1, 2, 3, 4], &arts);
        assert_eq!(reps, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_members() {
        let arts = articles(&[Lean::Left]);
        assert!(RepresentativeSelector::new(5).select(&[], &arts).is_empty());
    }
}
