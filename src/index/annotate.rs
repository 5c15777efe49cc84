// Port for external collaborators that attach data to symbols

use std::fmt;

use super::Symbol;

/// What an annotator contributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub summaries: bool,
    pub embeddings: bool,
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.summaries {
            parts.push("summaries");
        }
        if self.embeddings {
            parts.push("embeddings");
        }
        if parts.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", parts.join(","))
        }
    }
}

/// An external producer of per-symbol annotations (summaries, vectors).
///
/// Annotators only ever see symbols rebuilt by the current scan and may only
/// write into `Symbol::extra`. Errors are reported and ignored.
pub trait Annotator: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    fn annotate(&self, symbol: &mut Symbol) -> anyhow::Result<()>;
}

/// Run every annotator over `symbols`, returning how many annotations failed.
pub fn run_annotators<'a, I>(annotators: &[Box<dyn Annotator>], symbols: I) -> usize
where
    I: IntoIterator<Item = &'a mut Symbol>,
{
    if annotators.is_empty() {
        return 0;
    }

    let mut failures = 0;
    for symbol in symbols {
        for annotator in annotators {
            if let Err(e) = annotator.annotate(symbol) {
                failures += 1;
                tracing::warn!(
                    "Annotator {} failed on {}: {}",
                    annotator.name(),
                    symbol.key(),
                    e
                );
            }
        }
    }
    failures
}
