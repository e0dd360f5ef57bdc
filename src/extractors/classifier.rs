// src/extractors/classifier.rs

// --- Imports ---
use once_cell::sync::Lazy;
use regex::Regex;

// --- Regex Patterns (Lazy Static) ---
// Integer-or-decimal tokens; thousands separators are stripped before parsing.
static NUMBER_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\d,]+(?:\.\d+)?").expect("Failed to compile NUMBER_TOKEN_RE")
});

static EPS_WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\beps\b").expect("Failed to compile EPS_WORD_RE")
});

// --- Data Structures ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Revenue,
    NetProfit,
    Operating,
    Eps,
}

/// A figure pulled out of one line, already routed to the record field it fills.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Revenue(f64),
    NetProfit(f64),
    OperatingMarginPct(f64),
    OperatingProfitAmt(f64),
    Eps(f64),
}

enum Matcher {
    AnyOf(&'static [&'static str]),
    Pattern(&'static Lazy<Regex>),
}

enum Selection {
    /// First number strictly above the bound.
    Above(f64),
    /// First number present.
    First,
}

/// One row of the lexicon: how to recognise a kind and which number to take.
pub struct LexiconEntry {
    pub kind: MetricKind,
    matcher: Matcher,
    selection: Selection,
    /// When the line matched and the record already holds this kind, later
    /// kinds are not evaluated for the line.
    pub claims_line: bool,
}

// Evaluation order matters: entries are tried top to bottom.
static LEXICON: Lazy<Vec<LexiconEntry>> = Lazy::new(|| {
    vec![
        LexiconEntry {
            kind: MetricKind::Revenue,
            matcher: Matcher::AnyOf(&["total revenue", "sales", "total income", "revenue"]),
            selection: Selection::Above(1000.0),
            claims_line: true,
        },
        LexiconEntry {
            kind: MetricKind::NetProfit,
            matcher: Matcher::AnyOf(&["net profit", "profit after tax", "profit after tax (pat)"]),
            selection: Selection::Above(100.0),
            claims_line: true,
        },
        LexiconEntry {
            kind: MetricKind::Operating,
            matcher: Matcher::AnyOf(&["operating profit", "profit before tax", "ebit", "operating margin", "opm"]),
            selection: Selection::First,
            claims_line: false,
        },
        LexiconEntry {
            kind: MetricKind::Eps,
            matcher: Matcher::Pattern(&EPS_WORD_RE),
            selection: Selection::First,
            claims_line: false,
        },
    ]
});

impl LexiconEntry {
    fn matches(&self, lowered: &str) -> bool {
        match &self.matcher {
            Matcher::AnyOf(keywords) => keywords.iter().any(|k| lowered.contains(k)),
            Matcher::Pattern(re) => re.is_match(lowered),
        }
    }

    /// Picks this entry's figure out of the line's numeric tokens.
    pub fn select(&self, line: &str, numbers: &[Option<f64>]) -> Option<MetricValue> {
        let picked = match self.selection {
            Selection::Above(bound) => numbers.iter().flatten().copied().find(|n| *n > bound),
            Selection::First => numbers.iter().flatten().copied().next(),
        }?;

        Some(match self.kind {
            MetricKind::Revenue => MetricValue::Revenue(picked),
            MetricKind::NetProfit => MetricValue::NetProfit(picked),
            MetricKind::Operating => {
                let lowered = line.to_lowercase();
                if line.contains('%') || lowered.contains("margin") || lowered.contains("opm") {
                    MetricValue::OperatingMarginPct(picked)
                } else {
                    MetricValue::OperatingProfitAmt(picked)
                }
            }
            MetricKind::Eps => MetricValue::Eps(picked),
        })
    }
}

// --- Public API ---

/// Every numeric token in the line, in order. Tokens that do not parse to a
/// finite number (a lone ",", say) are kept as `None`.
pub fn numeric_tokens(line: &str) -> Vec<Option<f64>> {
    NUMBER_TOKEN_RE
        .find_iter(line)
        .map(|m| {
            m.as_str()
                .replace(',', "")
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
        })
        .collect()
}

/// Lexicon entries whose keywords appear in the line, in evaluation order.
pub fn matching_entries(line: &str) -> impl Iterator<Item = &'static LexiconEntry> {
    let lowered = line.to_lowercase();
    LEXICON.iter().filter(move |entry| entry.matches(&lowered))
}

/// Classifies one line. `held` reports which kinds the record already has:
/// a line that matches a line-claiming kind (revenue, net profit) stops there
/// once that kind is, or has just become, known.
pub fn classify_line<F>(line: &str, held: F) -> Vec<MetricValue>
where
    F: Fn(MetricKind) -> bool,
{
    let numbers = numeric_tokens(line);
    if numbers.is_empty() {
        return Vec::new();
    }

    let mut values = Vec::new();
    for entry in matching_entries(line) {
        let value = entry.select(line, &numbers);
        let claimed = entry.claims_line && (value.is_some() || held(entry.kind));
        values.extend(value);
        if claimed {
            break;
        }
    }
    values
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn classify(line: &str) -> Vec<MetricValue> {
        classify_line(line, |_| false)
    }

    #[test]
    fn test_numeric_tokens_strip_separators() {
        assert_eq!(
            numeric_tokens("Total Revenue 1,23,456.78 vs 99"),
            vec![Some(123456.78), Some(99.0)]
        );
        assert_eq!(numeric_tokens("no digits here"), Vec::<Option<f64>>::new());
        // A bare comma matches the token pattern but is not a number
        assert_eq!(numeric_tokens("Sales , 2,000"), vec![None, Some(2000.0)]);
    }

    #[test]
    fn test_revenue_threshold() {
        assert_eq!(classify("Total Revenue 12,345"), vec![MetricValue::Revenue(12345.0)]);
        assert_eq!(classify("Revenue growth 12 percent, 1000 exactly"), vec![]);
        // First number above 1000, not the first number overall
        assert_eq!(classify("Q2 sales 45 units worth 5,400"), vec![MetricValue::Revenue(5400.0)]);
    }

    #[test]
    fn test_net_profit_threshold() {
        assert_eq!(classify("Net profit 2,310"), vec![MetricValue::NetProfit(2310.0)]);
        assert_eq!(classify("Profit after tax (PAT) 100"), vec![]);
        assert_eq!(classify("PROFIT AFTER TAX 100.5"), vec![MetricValue::NetProfit(100.5)]);
    }

    #[test]
    fn test_operating_margin_vs_amount() {
        assert_eq!(classify("Operating margin 24.6%"), vec![MetricValue::OperatingMarginPct(24.6)]);
        assert_eq!(classify("OPM 25.1"), vec![MetricValue::OperatingMarginPct(25.1)]);
        assert_eq!(classify("EBIT 3,450"), vec![MetricValue::OperatingProfitAmt(3450.0)]);
        assert_eq!(classify("Profit before tax 4,020.5"), vec![MetricValue::OperatingProfitAmt(4020.5)]);
    }

    #[test]
    fn test_eps_requires_whole_word() {
        assert_eq!(classify("Basic EPS (Rs.) 32.4"), vec![MetricValue::Eps(32.4)]);
        assert_eq!(classify("Steps taken 12"), vec![]);
        assert_eq!(classify("epsilon 3"), vec![]);
    }

    #[test]
    fn test_lines_without_numbers_yield_nothing() {
        assert!(classify("Total revenue").is_empty());
        assert!(classify("").is_empty());
    }

    #[test]
    fn test_claiming_line_stops_later_kinds() {
        assert_eq!(classify("Revenue 5,000 and EPS 12"), vec![MetricValue::Revenue(5000.0)]);
        // Revenue already held: the line stays claimed even without a qualifying figure
        assert_eq!(classify_line("EPS 12 on revenue 40", |k| k == MetricKind::Revenue), vec![]);
        assert_eq!(classify("EPS 12 on revenue 40"), vec![MetricValue::Eps(12.0)]);
    }

    #[test]
    fn test_matching_entries_order() {
        let kinds: Vec<MetricKind> = matching_entries("Revenue 5,000 and EPS 12").map(|e| e.kind).collect();
        assert_eq!(kinds, vec![MetricKind::Revenue, MetricKind::Eps]);
    }
}
