use std::collections::HashSet;

use regex::Regex;

use super::{group_text, Criterion, ImportanceScores};
use crate::models::Article;

/// Chars of group text examined by the heuristic
const TEXT_CAP: usize = 6000;

/// Count-based features pulled from a group's text
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Features {
    numbers: usize,
    money: usize,
    geo: usize,
    government: usize,
    corporate: usize,
    conflict: usize,
    public_notice: usize,
    wrongdoing: usize,
    transparency: usize,
    ramifications: usize,
    mentions_vote: bool,
}

struct Patterns {
    numbers: Regex,
    money: Regex,
    geo: Regex,
    government: Regex,
    corporate: Regex,
    conflict: Regex,
    public_notice: Regex,
    wrongdoing: Regex,
    transparency: Regex,
    ramifications: Regex,
}

impl Patterns {
    fn new() -> Self {
        let re = |pattern: &str| Regex::new(pattern).expect("static pattern compiles");
        Self {
            numbers: re(r"\b\d{1,4}\b"),
            money: re(r"\$\d+|\b(billion|million|trillion)\b"),
            geo: re(r"\b(us|uk|eu|china|india|russia|state|federal|city|county|province)\b"),
            government: re(
                r"\b(white house|congress|senate|parliament|ministry|supreme court|regulator|fcc|sec|ftc)\b",
            ),
            corporate: re(r"\b(google|apple|amazon|meta|microsoft|exxon|pfizer|boeing|tesla|ford)\b"),
            conflict: re(
                r"\b(protest|strike|lawsuit|sue|ban|clash|attack|war|sanction|boycott|indict|charges?)\b",
            ),
            public_notice: re(
                r"\b(how to|deadline|register|apply|eligib|recall|evacuate|boil water|polls? open)\b",
            ),
            wrongdoing: re(
                r"\b(bribe|fraud|corruption|misconduct|cover-?up|whistleblower|leak|investigation|audit)\b",
            ),
            transparency: re(
                r"\b(leaked|unsealed|newly released|foia|internal memo|whistleblower)\b",
            ),
            ramifications: re(r"\b(precedent|landmark|sweeping|far-?reaching|nationwide|global)\b"),
        }
    }
}

/// Deterministic feature-based importance estimate
pub struct HeuristicEstimator {
    patterns: Patterns,
}

impl Default for HeuristicEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicEstimator {
    pub fn new() -> Self {
        Self {
            patterns: Patterns::new(),
        }
    }

    fn features(&self, text: &str) -> Features {
        let p = &self.patterns;
        let count = |re: &Regex| re.find_iter(text).count();
        Features {
            numbers: count(&p.numbers),
            money: count(&p.money),
            geo: count(&p.geo),
            government: count(&p.government),
            corporate: count(&p.corporate),
            conflict: count(&p.conflict),
            public_notice: count(&p.public_notice),
            wrongdoing: count(&p.wrongdoing),
            transparency: count(&p.transparency),
            ramifications: count(&p.ramifications),
            mentions_vote: text.contains("vote") || text.contains("election"),
        }
    }

    pub fn estimate(&self, members: &[usize], articles: &[Article]) -> ImportanceScores {
        let text = group_text(members, articles, TEXT_CAP).to_lowercase();
        let f = self.features(&text);
        let size = members.len() as f64;
        let diversity = source_diversity(members, articles);

        let impact = 2.0
            + saturate(size, 6.0)
            + saturate((f.numbers + f.money + f.geo) as f64, 40.0)
            + 3.0 * diversity;
        let conflict = 1.0 + saturate(f.conflict as f64, 10.0) + saturate(size, 6.0);
        let ramifications =
            1.5 + saturate((f.ramifications + f.government + f.corporate) as f64, 18.0);
        let accountability = 1.0 + saturate((f.wrongdoing + f.government) as f64, 12.0);
        let informed_public = 1.0 + saturate(f.public_notice as f64, 8.0) + 1.5 * diversity;
        let citizen_responsibility = saturate(f.public_notice as f64, 8.0)
            + if f.mentions_vote { 0.8 } else { 0.0 };
        let transparency = saturate(f.transparency as f64, 6.0);

        let mut scores = ImportanceScores::default();
        scores.set(Criterion::Impact, impact);
        scores.set(Criterion::Conflict, conflict);
        scores.set(Criterion::Ramifications, ramifications);
        scores.set(Criterion::Accountability, accountability);
        scores.set(Criterion::InformedPublic, informed_public);
        scores.set(Criterion::CitizenResponsibility, citizen_responsibility);
        scores.set(Criterion::Transparency, transparency);
        scores
    }
}

/// Scale `value` against `saturation` onto 0..10
fn saturate(value: f64, saturation: f64) -> f64 {
    if saturation <= 0.0 {
        return 0.0;
    }
    (10.0 * value / saturation).clamp(0.0, 10.0)
}

/// Outlet and lean spread of a group, in [0, 1]
pub fn source_diversity(members: &[usize], articles: &[Article]) -> f64 {
    let outlets: HashSet<&str> = members.iter().map(|&id| articles[id].source.as_str()).collect();
    let leans: HashSet<_> = members.iter().map(|&id| articles[id].lean).collect();
    ((outlets.len() as f64 / 4.0 + leans.len() as f64 / 3.0) / 2.0).min(1.0)
}
