//! Similarity clustering of embedded articles into story groups.
//!
//! A complete-linkage agglomerative pass proposes coarse groups, then each
//! group is split into connected components of the similarity graph so that
//! every final group is connected by edges at or above the threshold.

use crate::config::ClusterConfig;
use crate::embedding::cosine_similarity;

/// Slack for similarities that land exactly on the threshold after rounding
const SIMILARITY_EPSILON: f64 = 1e-9;

pub struct SimilarityClusterer {
    config: ClusterConfig,
}

impl SimilarityClusterer {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// Partition article indices `0..embeddings.len()` into story groups.
    ///
    /// Every index appears in exactly one group. Members are ascending within
    /// a group; groups are ordered by descending size, then by first member.
    pub fn cluster<V: AsRef<[f32]>>(&self, embeddings: &[V]) -> Vec<Vec<usize>> {
        let n = embeddings.len();
        if n < 2 {
            return (0..n).map(|i| vec![i]).collect();
        }

        let threshold = self.config.similarity_threshold;
        let min_size = self.config.min_cluster_size;
        let sim = similarity_matrix(embeddings);

        let coarse = complete_linkage(&sim, threshold);

        // Undersized groups keep their members together; splitting them
        // would separate articles joined by an edge at or above the threshold
        let mut groups: Vec<Vec<usize>> = coarse
            .iter()
            .flat_map(|group| connected_components(group, &sim, threshold))
            .collect();

        let qualified = groups.iter().filter(|group| group.len() >= min_size).count();
        if qualified == 0 {
            tracing::info!(min_size, "no clusters reach the minimum size, keeping components as found");
        }

        for group in groups.iter_mut() {
            group.sort_unstable();
        }
        groups.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));

        tracing::info!(
            clusters = groups.len(),
            qualified,
            articles = n,
            "story clusters built"
        );
        groups
    }
}

fn is_edge(similarity: f64, threshold: f64) -> bool {
    similarity >= threshold - SIMILARITY_EPSILON
}

fn similarity_matrix<V: AsRef<[f32]>>(embeddings: &[V]) -> Vec<Vec<f64>> {
    let n = embeddings.len();
    let mut sim = vec![vec![0.0; n]; n];
    for i in 0..n {
        sim[i][i] = 1.0;
        for j in (i + 1)..n {
            let s = cosine_similarity(embeddings[i].as_ref(), embeddings[j].as_ref());
            sim[i][j] = s;
            sim[j][i] = s;
        }
    }
    sim
}

/// Agglomerative clustering with complete linkage over cosine distance.
///
/// Two clusters merge only while the largest pairwise distance between their
/// members is at most `1 - threshold`. Ties go to the lowest index pair.
fn complete_linkage(sim: &[Vec<f64>], threshold: f64) -> Vec<Vec<usize>> {
    let n = sim.len();
    let cut = 1.0 - threshold;

    let mut dist: Vec<Vec<f64>> = sim
        .iter()
        .map(|row| row.iter().map(|s| 1.0 - s).collect())
        .collect();
    let mut clusters: Vec<Option<Vec<usize>>> = (0..n).map(|i| Some(vec![i])).collect();

    loop {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..n {
            if clusters[i].is_none() {
                continue;
            }
            for j in (i + 1)..n {
                if clusters[j].is_none() {
                    continue;
                }
                if best.map_or(true, |(_, _, d)| dist[i][j] < d) {
                    best = Some((i, j, dist[i][j]));
                }
            }
        }

        let Some((i, j, d)) = best else { break };
        if !is_edge(1.0 - d, 1.0 - cut) {
            break;
        }

        let absorbed = clusters[j].take().unwrap_or_default();
        if let Some(target) = clusters[i].as_mut() {
            target.extend(absorbed);
        }
        for k in 0..n {
            if k == i || clusters[k].is_none() {
                continue;
            }
            let merged = dist[i][k].max(dist[j][k]);
            dist[i][k] = merged;
            dist[k][i] = merged;
        }
    }

    clusters.into_iter().flatten().collect()
}

/// Connected components of the threshold graph restricted to `members`
fn connected_components(members: &[usize], sim: &[Vec<f64>], threshold: f64) -> Vec<Vec<usize>> {
    if members.len() <= 1 {
        return vec![members.to_vec()];
    }

    let adjacency: Vec<Vec<usize>> = members
        .iter()
        .enumerate()
        .map(|(a, &i)| {
            members
                .iter()
                .enumerate()
                .filter(|&(b, &j)| a != b && is_edge(sim[i][j], threshold))
                .map(|(b, _)| b)
                .collect()
        })
        .collect();

    let mut seen = vec![false; members.len()];
    let mut components = Vec::new();

    for start in 0..members.len() {
        if seen[start] {
            continue;
        }
        seen[start] = true;
        let mut stack = vec![start];
        let mut component = Vec::new();

        while let Some(node) = stack.pop() {
            component.push(members[node]);
            for &next in &adjacency[node] {
                if !seen[next] {
                    seen[next] = true;
                    stack.push(next);
                }
            }
        }

        components.push(component);
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::normalize_rows;

    fn clusterer(threshold: f64, min_size: usize) -> SimilarityClusterer {
        SimilarityClusterer::new(ClusterConfig {
            similarity_threshold: threshold,
            min_cluster_size: min_size,
        })
    }

    fn unit(rows: Vec<Vec<f32>>) -> Vec<Vec<f32>> {
        let mut rows = rows;
        normalize_rows(&mut rows);
        rows
    }

    /// Two budget stories at similarity 0.8, a sports story at 0.1 to both
    fn budget_and_sports() -> Vec<Vec<f32>> {
        let y = (0.1 - 0.08) / 0.6;
        let z = (1.0f64 - 0.01 - y * y).sqrt();
        vec![
            vec![1.0, 0.0, 0.0],
            vec![0.8, 0.6, 0.0],
            vec![0.1, y as f32, z as f32],
        ]
    }

    fn assert_partition(groups: &[Vec<usize>], n: usize) {
        let mut all: Vec<usize> = groups.iter().flatten().copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn test_budget_example_min_size_one() {
        let groups = clusterer(0.6, 1).cluster(&budget_and_sports());
        assert_eq!(groups, vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_budget_example_min_size_two_keeps_singleton() {
        let groups = clusterer(0.6, 2).cluster(&budget_and_sports());
        assert_eq!(groups, vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_undersized_group_stays_together() {
        let embeddings: Vec<Vec<f32>> = vec![
            vec![1.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.0, 1.0],
            vec![0.0, 1.0],
        ];
        let groups = clusterer(0.6, 3).cluster(&embeddings);
        assert_eq!(groups, vec![vec![2, 3, 4], vec![0, 1]]);

        let sim = similarity_matrix(&embeddings);
        for (a, group) in groups.iter().enumerate() {
            for other in &groups[a + 1..] {
                for &i in group {
                    assert!(other.iter().all(|&j| !is_edge(sim[i][j], 0.6)));
                }
            }
        }
    }

    #[test]
    fn test_empty_and_single_input() {
        assert!(clusterer(0.6, 2).cluster::<Vec<f32>>(&[]).is_empty());
        assert_eq!(clusterer(0.6, 2).cluster(&[vec![1.0f32]]), vec![vec![0]]);
    }

    #[test]
    fn test_complete_linkage_prevents_chaining() {
        // a~b and b~c at 0.707, a and c orthogonal
        let embeddings = unit(vec![vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0, 1.0]]);
        let groups = clusterer(0.6, 1).cluster(&embeddings);
        assert_eq!(groups, vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_no_neighbors_gives_singletons() {
        let embeddings = unit(vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]]);
        let groups = clusterer(0.6, 2).cluster(&embeddings);
        assert_eq!(groups, vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn test_groups_ordered_by_size_then_input_order() {
        let embeddings = unit(vec![
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 0.05],
            vec![1.0, -0.05],
            vec![0.05, 1.0],
        ]);
        let groups = clusterer(0.9, 1).cluster(&embeddings);
        assert_eq!(groups, vec![vec![1, 2, 3], vec![0, 4]]);
    }

    #[test]
    fn test_partition_and_connectivity() {
        let embeddings = unit(
            (0..24)
                .map(|i| {
                    let angle = (i as f32) * 0.37;
                    vec![angle.cos(), angle.sin(), ((i % 5) as f32) * 0.2]
                })
                .collect(),
        );
        let threshold = 0.8;
        let groups = clusterer(threshold, 2).cluster(&embeddings);
        assert_partition(&groups, embeddings.len());

        let sim = similarity_matrix(&embeddings);
        for group in &groups {
            // Every group must be a single connected component
            let components = connected_components(group, &sim, threshold);
            assert_eq!(components.len(), 1, "group {:?} is not connected", group);
        }
    }

    #[test]
    fn test_connected_components_splits_disjoint_members() {
        let embeddings = unit(vec![vec![1.0, 0.0], vec![1.0, 0.1], vec![0.0, 1.0]]);
        let sim = similarity_matrix(&embeddings);
        let components = connected_components(&[0, 1, 2], &sim, 0.6);
        assert_eq!(components.len(), 2);
    }
}
