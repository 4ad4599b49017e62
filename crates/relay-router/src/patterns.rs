//! Deterministic routing tables.
//!
//! The fast path checks, in this order: unambiguous math vocabulary,
//! unambiguous dwell-time vocabulary, then the SQL and CSV ambiguous-term
//! tables. The first hit decides the route. Reordering changes which route
//! wins for queries that mention several domains.

use regex::Regex;

use relay_core::Route;

use crate::disambiguation::{self, Domain};

/// Phrasings that ask about the conversation itself.
pub const META_PHRASES: &[&str] = &[
    "last question",
    "previous question",
    "what did i ask",
    "my question",
    "asked before",
    "earlier question",
    "what was my",
    "what i asked",
];

// Bare "sum", "product", "percent", "power" and "difference" are absent: they
// show up in data questions ("sum of requested quantity", "power plant",
// "difference between requested and actual").
const MATH_KEYWORDS: &[&str] = &[
    "calculate",
    "calculation",
    "compute",
    "math",
    "add",
    "subtract",
    "multiply",
    "multiplied by",
    "divide",
    "divided by",
    "quotient",
    "plus",
    "minus",
    "square root",
    "sqrt",
    "power of",
    "to the power",
    "raised to",
    "exponent",
    "modulo",
    "remainder",
    "factorial",
    "logarithm",
    "log",
    "sine",
    "cosine",
    "tangent",
    "sin",
    "cos",
    "tan",
];

const MATH_KEYWORDS_AR: &[&str] = &[
    "حساب",
    "احسب",
    "حسابات",
    "جمع",
    "طرح",
    "ضرب",
    "قسمة",
    "زائد",
    "ناقص",
    "مضروب",
    "مقسوم",
    "الجذر",
    "جذر تربيعي",
    "النسبة المئوية",
    "المئوية",
];

// Digit-operator-digit. "-" and unspaced "/" are left out because dates use them.
const MATH_EXPRESSION: &str = r"\d\s*[+*^×÷]\s*\d|\d\s+/\s+\d|\d\s+(?:times|x)\s+\d";

const CSV_KEYWORDS: &[&str] = &[
    "driver_id",
    "vehicle_name",
    "zone_name",
    "dwell_hrs",
    "dwell_minutes",
    "entry_time",
    "exit_time",
    "dwell time",
    "dwell",
    "stay time",
    "stay duration",
    "zone",
    "zones",
    "geofence",
    "geofences",
    "driver",
    "drivers",
    "vehicle",
    "vehicles",
    "truck",
    "trucks",
    "trip",
    "trips",
    "visit",
    "visits",
];

const CSV_KEYWORDS_AR: &[&str] = &[
    "سائق", "سائقين", "منطقة", "مناطق", "سيارة", "سيارات", "شاحنة", "رحلة", "رحلات",
];

/// Why the fast path picked a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchKind {
    /// Vocabulary that belongs to exactly one collaborator.
    Keyword,
    /// A column term the receiving collaborator will ask about.
    AmbiguousTerm,
}

/// A fast-path hit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FastPathMatch {
    pub route: Route,
    pub kind: MatchKind,
    /// The text that matched.
    pub matched: String,
}

impl FastPathMatch {
    pub fn reason(&self) -> String {
        match self.kind {
            MatchKind::Keyword => format!(
                "Query contains '{}' which maps to the {} data source",
                self.matched, self.route
            ),
            MatchKind::AmbiguousTerm => format!(
                "Query contains column term '{}' that maps to the {} data source",
                self.matched, self.route
            ),
        }
    }
}

/// An unambiguous vocabulary rule for one route.
struct KeywordRule {
    route: Route,
    /// Latin keywords and expressions, matched on word boundaries.
    regex: Regex,
    /// Arabic keywords, matched as substrings.
    arabic: &'static [&'static str],
}

impl KeywordRule {
    fn new(route: Route, keywords: &[&str], extra: Option<&str>, arabic: &'static [&'static str]) -> Self {
        let alternation = keywords
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let mut pattern = format!(r"(?i)\b(?:{})\b", alternation);
        if let Some(extra) = extra {
            pattern.push('|');
            pattern.push_str(extra);
        }
        Self {
            route,
            regex: Regex::new(&pattern).expect("Invalid fast-path regex"),
            arabic,
        }
    }

    fn find(&self, query: &str, query_lower: &str) -> Option<String> {
        if let Some(m) = self.regex.find(query) {
            return Some(m.as_str().to_string());
        }
        self.arabic
            .iter()
            .find(|k| query_lower.contains(*k))
            .map(|k| k.to_string())
    }
}

/// Ordered fast-path tables, compiled once and reused.
pub struct FastPathTable {
    keyword_rules: Vec<KeywordRule>,
}

impl Default for FastPathTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FastPathTable {
    pub fn new() -> Self {
        let keyword_rules = vec![
            KeywordRule::new(Route::Math, MATH_KEYWORDS, Some(MATH_EXPRESSION), MATH_KEYWORDS_AR),
            KeywordRule::new(Route::Csv, CSV_KEYWORDS, None, CSV_KEYWORDS_AR),
        ];
        Self { keyword_rules }
    }

    /// Whether the query asks about the conversation rather than the data.
    pub fn is_meta(&self, query: &str) -> bool {
        let lower = query.to_lowercase();
        META_PHRASES.iter().any(|p| lower.contains(p))
    }

    /// First fast-path rule that fires, in table order.
    pub fn match_query(&self, query: &str) -> Option<FastPathMatch> {
        let query_lower = query.to_lowercase();

        for rule in &self.keyword_rules {
            if let Some(matched) = rule.find(query, &query_lower) {
                return Some(FastPathMatch {
                    route: rule.route,
                    kind: MatchKind::Keyword,
                    matched,
                });
            }
        }

        for domain in [Domain::Sql, Domain::Csv] {
            if let Some(term) = disambiguation::first_term(&query_lower, domain) {
                return Some(FastPathMatch {
                    route: domain.route(),
                    kind: MatchKind::AmbiguousTerm,
                    matched: term.to_string(),
                });
            }
        }

        None
    }
}
