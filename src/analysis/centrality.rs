// Degree centrality: core / hub / utility / isolated / standard

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::round3;
use crate::graph::CallGraph;
use crate::index::{Index, SymbolKey};

pub const MIN_IN_THRESHOLD: usize = 3;
pub const MIN_OUT_THRESHOLD: usize = 5;
/// Below this many symbols a 95th percentile is noise; use the floors.
pub const MIN_POPULATION: usize = 20;
pub const TOP_N: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CentralityClass {
    Core,
    Hub,
    Utility,
    Isolated,
    Standard,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Degrees {
    pub in_degree: usize,
    pub out_degree: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    pub high_in: usize,
    pub high_out: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub core: usize,
    pub hub: usize,
    pub utility: usize,
    pub isolated: usize,
    pub standard: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedSymbol {
    pub key: SymbolKey,
    pub in_degree: usize,
    pub out_degree: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CentralityReport {
    pub population: usize,
    pub thresholds: Thresholds,
    pub mean_in_degree: f64,
    pub mean_out_degree: f64,
    pub counts: ClassCounts,
    #[serde(default)]
    pub core: Vec<RankedSymbol>,
    #[serde(default)]
    pub hub: Vec<RankedSymbol>,
    #[serde(default)]
    pub utility: Vec<RankedSymbol>,
    #[serde(default)]
    pub isolated: Vec<RankedSymbol>,
}

/// Degrees of every symbol with at least one edge in or out.
pub fn degrees(index: &Index, graph: &CallGraph) -> BTreeMap<SymbolKey, Degrees> {
    let mut out = BTreeMap::new();
    for symbol in index.symbols.iter() {
        let key = symbol.key();
        let d = Degrees {
            in_degree: graph.in_degree(&key),
            out_degree: symbol.calls.len(),
        };
        if d.in_degree > 0 || d.out_degree > 0 {
            out.insert(key, d);
        }
    }
    out
}

/// 95th percentile of `values`: the value at index `ceil(n/20)` of the
/// descending sort, clamped to `floor`.
pub fn percentile_threshold(values: &[usize], floor: usize) -> usize {
    let n = values.len();
    if n < MIN_POPULATION {
        return floor;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let idx = n.div_ceil(20).min(n - 1);
    sorted[idx].max(floor)
}

/// First matching rule wins, so every symbol lands in exactly one class.
pub fn classify(d: Degrees, thresholds: Thresholds, mean_in: f64, mean_out: f64) -> CentralityClass {
    let in_degree = d.in_degree as f64;
    let out_degree = d.out_degree as f64;

    if d.in_degree >= thresholds.high_in {
        CentralityClass::Core
    } else if d.out_degree >= thresholds.high_out && in_degree <= mean_in {
        CentralityClass::Hub
    } else if in_degree > mean_in && out_degree <= mean_out {
        CentralityClass::Utility
    } else if d.in_degree == 0 && d.out_degree <= 2 {
        CentralityClass::Isolated
    } else {
        CentralityClass::Standard
    }
}

pub fn compute(index: &Index, graph: &CallGraph) -> CentralityReport {
    let degrees = degrees(index, graph);
    let n = degrees.len();
    if n == 0 {
        return CentralityReport::default();
    }

    let ins: Vec<usize> = degrees.values().map(|d| d.in_degree).collect();
    let outs: Vec<usize> = degrees.values().map(|d| d.out_degree).collect();
    let thresholds = Thresholds {
        high_in: percentile_threshold(&ins, MIN_IN_THRESHOLD),
        high_out: percentile_threshold(&outs, MIN_OUT_THRESHOLD),
    };
    let mean_in = ins.iter().sum::<usize>() as f64 / n as f64;
    let mean_out = outs.iter().sum::<usize>() as f64 / n as f64;

    let mut report = CentralityReport {
        population: n,
        thresholds,
        mean_in_degree: round3(mean_in),
        mean_out_degree: round3(mean_out),
        ..Default::default()
    };

    for (key, d) in &degrees {
        let ranked = RankedSymbol {
            key: key.clone(),
            in_degree: d.in_degree,
            out_degree: d.out_degree,
        };
        match classify(*d, thresholds, mean_in, mean_out) {
            CentralityClass::Core => {
                report.counts.core += 1;
                report.core.push(ranked);
            }
            CentralityClass::Hub => {
                report.counts.hub += 1;
                report.hub.push(ranked);
            }
            CentralityClass::Utility => {
                report.counts.utility += 1;
                report.utility.push(ranked);
            }
            CentralityClass::Isolated => {
                report.counts.isolated += 1;
                report.isolated.push(ranked);
            }
            CentralityClass::Standard => report.counts.standard += 1,
        }
    }

    rank(&mut report.core, |r| r.in_degree);
    rank(&mut report.utility, |r| r.in_degree);
    rank(&mut report.hub, |r| r.out_degree);
    report.isolated.sort_by(|a, b| {
        (a.key.bare_name(), &a.key).cmp(&(b.key.bare_name(), &b.key))
    });
    report.isolated.truncate(TOP_N);

    report
}

fn rank(list: &mut Vec<RankedSymbol>, by: impl Fn(&RankedSymbol) -> usize) {
    list.sort_by(|a, b| by(b).cmp(&by(a)).then_with(|| a.key.cmp(&b.key)));
    list.truncate(TOP_N);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::index_from_sources;
    use proptest::prelude::*;

    const T: Thresholds = Thresholds {
        high_in: 3,
        high_out: 5,
    };

    #[test]
    fn test_isolated_scenario() {
        let d = Degrees {
            in_degree: 0,
            out_degree: 1,
        };
        assert_eq!(classify(d, T, 0.5, 1.2), CentralityClass::Isolated);
    }

    #[test]
    fn test_classification_order() {
        let class = |i, o| classify(Degrees { in_degree: i, out_degree: o }, T, 1.0, 2.0);
        assert_eq!(class(3, 10), CentralityClass::Core);
        assert_eq!(class(1, 6), CentralityClass::Hub);
        assert_eq!(class(2, 1), CentralityClass::Utility);
        assert_eq!(class(0, 2), CentralityClass::Isolated);
        assert_eq!(class(0, 3), CentralityClass::Standard);
        assert_eq!(class(2, 4), CentralityClass::Standard);
    }

    #[test]
    fn test_threshold_floors_small_population() {
        assert_eq!(percentile_threshold(&[50, 40, 1], MIN_IN_THRESHOLD), 3);
        assert_eq!(percentile_threshold(&[], MIN_OUT_THRESHOLD), 5);
    }

    #[test]
    fn test_threshold_percentile() {
        let mut values: Vec<usize> = (1..=40).collect();
        // idx = ceil(40/20) = 2 into [40, 39, 38, ...]
        assert_eq!(percentile_threshold(&values, 3), 38);
        values.iter_mut().for_each(|v| *v = 1);
        assert_eq!(percentile_threshold(&values, 3), 3);
    }

    #[test]
    fn test_compute_on_index() {
        let index = index_from_sources(&[
            ("util.py", "def log():\n    pass\n"),
            ("a.py", "def a():\n    log()\n"),
            ("b.py", "def b():\n    log()\n"),
            ("c.py", "def c():\n    log()\n"),
            ("d.py", "def lonely():\n    pass\n"),
        ]);
        let graph = CallGraph::build(&index);
        let report = compute(&index, &graph);

        // lonely has no edges and is not in the population
        assert_eq!(report.population, 4);
        assert_eq!(report.thresholds, T);
        assert_eq!(report.counts.core, 1);
        assert_eq!(report.core[0].key, SymbolKey::new("util.py", "log"));
        assert_eq!(report.counts.isolated, 3);
    }

    proptest! {
        #[test]
        fn prop_classification_is_a_partition(
            degs in prop::collection::vec((0usize..30, 0usize..30), 1..60)
        ) {
            let ins: Vec<usize> = degs.iter().map(|d| d.0).collect();
            let outs: Vec<usize> = degs.iter().map(|d| d.1).collect();
            let thresholds = Thresholds {
                high_in: percentile_threshold(&ins, MIN_IN_THRESHOLD),
                high_out: percentile_threshold(&outs, MIN_OUT_THRESHOLD),
            };
            prop_assert!(thresholds.high_in >= MIN_IN_THRESHOLD);
            prop_assert!(thresholds.high_out >= MIN_OUT_THRESHOLD);

            let mean_in = ins.iter().sum::<usize>() as f64 / ins.len() as f64;
            let mean_out = outs.iter().sum::<usize>() as f64 / outs.len() as f64;
            let mut counts = ClassCounts::default();
            for (i, o) in degs {
                let class = classify(Degrees { in_degree: i, out_degree: o }, thresholds, mean_in, mean_out);
                match class {
                    CentralityClass::Core => counts.core += 1,
                    CentralityClass::Hub => counts.hub += 1,
                    CentralityClass::Utility => counts.utility += 1,
                    CentralityClass::Isolated => counts.isolated += 1,
                    CentralityClass::Standard => counts.standard += 1,
                }
                if i >= thresholds.high_in {
                    prop_assert_eq!(class, CentralityClass::Core);
                }
            }
            let total = counts.core + counts.hub + counts.utility + counts.isolated + counts.standard;
            prop_assert_eq!(total, ins.len());
        }
    }
}
