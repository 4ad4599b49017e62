//! Column disambiguation.
//!
//! Some words in a data question map to more than one column ("quantity"
//! could be requested or actual). [`detect`] finds the first such word the
//! user has not already narrowed down and produces a clarifying question;
//! [`resolve`] rewrites the original query once the user picks a column.
//!
//! Both functions are pure. Remembering that a question is pending is the
//! caller's job.

use serde::{Deserialize, Serialize};

use relay_core::Route;

/// Which collaborator's vocabulary to check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Waybill database columns.
    Sql,
    /// Dwell-time dataset columns.
    Csv,
}

impl Domain {
    pub fn route(&self) -> Route {
        match self {
            Domain::Sql => Route::Sql,
            Domain::Csv => Route::Csv,
        }
    }

    /// Only the structured-data routes have column vocabularies.
    pub fn from_route(route: Route) -> Option<Self> {
        match route {
            Route::Sql => Some(Domain::Sql),
            Route::Csv => Some(Domain::Csv),
            _ => None,
        }
    }

    /// Ambiguous terms of this domain, in matching order.
    pub fn terms(&self) -> &'static [AmbiguousTerm] {
        match self {
            Domain::Sql => SQL_AMBIGUOUS_TERMS,
            Domain::Csv => CSV_AMBIGUOUS_TERMS,
        }
    }
}

/// A candidate column for an ambiguous term.
#[derive(Debug)]
pub struct CandidateColumn {
    pub name: &'static str,
    pub description: &'static str,
}

/// A word that could mean several columns.
#[derive(Debug)]
pub struct AmbiguousTerm {
    pub term: &'static str,
    pub question: &'static str,
    pub columns: &'static [CandidateColumn],
}

impl AmbiguousTerm {
    /// The query already names one of the candidate columns, either verbatim
    /// or with underscores read as spaces.
    fn already_specific(&self, query_lower: &str) -> bool {
        self.columns.iter().any(|c| {
            let name = c.name.to_lowercase();
            query_lower.contains(&name) || query_lower.contains(&name.replace('_', " "))
        })
    }
}

const fn col(name: &'static str, description: &'static str) -> CandidateColumn {
    CandidateColumn { name, description }
}

// =============================================================================
// Term tables
// =============================================================================

/// Waybill database terms. English and Arabic entries share candidates.
pub static SQL_AMBIGUOUS_TERMS: &[AmbiguousTerm] = &[
    AmbiguousTerm {
        term: "quantity",
        question: "Which quantity do you mean?",
        columns: &[
            col("Requested Quantity", "The quantity requested for delivery"),
            col("Actual Quantity", "The actual delivered quantity"),
        ],
    },
    AmbiguousTerm {
        term: "الكمية",
        question: "أي كمية تقصد؟",
        columns: &[
            col("Requested Quantity", "الكمية المطلوبة للتسليم"),
            col("Actual Quantity", "الكمية الفعلية المسلمة"),
        ],
    },
    AmbiguousTerm {
        term: "date",
        question: "Which date do you mean?",
        columns: &[
            col("Scheduled Date", "The scheduled delivery date"),
            col("Actual Date", "The actual delivery date"),
            col("Loading Date", "The date when loading occurred"),
        ],
    },
    AmbiguousTerm {
        term: "تاريخ",
        question: "أي تاريخ تقصد؟",
        columns: &[
            col("Scheduled Date", "تاريخ التسليم المجدول"),
            col("Actual Date", "تاريخ التسليم الفعلي"),
            col("Loading Date", "تاريخ التحميل"),
        ],
    },
    AmbiguousTerm {
        term: "name",
        question: "Which name do you mean?",
        columns: &[
            col("Contractor Name", "The name of the contractor/vendor"),
            col("Plant Name", "The source plant name"),
            col("Power Plant Name", "The destination power plant"),
        ],
    },
    AmbiguousTerm {
        term: "اسم",
        question: "أي اسم تقصد؟",
        columns: &[
            col("Contractor Name", "اسم المقاول"),
            col("Plant Name", "اسم المصنع المصدر"),
            col("Power Plant Name", "اسم محطة الطاقة"),
        ],
    },
    AmbiguousTerm {
        term: "status",
        question: "Which status do you mean?",
        columns: &[
            col("Waybill Status", "Current status of the waybill"),
            col("Delivery Status", "Delivery completion status"),
        ],
    },
    AmbiguousTerm {
        term: "حالة",
        question: "أي حالة تقصد؟",
        columns: &[
            col("Waybill Status", "حالة بوليصة الشحن الحالية"),
            col("Delivery Status", "حالة اكتمال التسليم"),
        ],
    },
];

/// Dwell-time dataset terms.
pub static CSV_AMBIGUOUS_TERMS: &[AmbiguousTerm] = &[
    AmbiguousTerm {
        term: "duration",
        question: "Which duration format do you prefer?",
        columns: &[
            col("dwell_hrs", "Duration in hours (e.g., 2.5 hours)"),
            col("dwell_minutes", "Duration in minutes (e.g., 150 minutes)"),
        ],
    },
    AmbiguousTerm {
        term: "مدة",
        question: "أي صيغة للمدة تفضل؟",
        columns: &[
            col("dwell_hrs", "المدة بالساعات"),
            col("dwell_minutes", "المدة بالدقائق"),
        ],
    },
    AmbiguousTerm {
        term: "time",
        question: "Which time do you mean?",
        columns: &[
            col("entry_time", "When the vehicle entered the zone"),
            col("exit_time", "When the vehicle exited the zone"),
        ],
    },
    AmbiguousTerm {
        term: "وقت",
        question: "أي وقت تقصد؟",
        columns: &[
            col("entry_time", "وقت دخول السيارة للمنطقة"),
            col("exit_time", "وقت خروج السيارة من المنطقة"),
        ],
    },
];

// =============================================================================
// Offers
// =============================================================================

/// One selectable answer to a clarifying question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisambiguationOption {
    /// Column name substituted into the query when chosen.
    pub value: String,
    pub display: String,
    pub description: String,
}

/// A clarifying question for the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisambiguationOffer {
    pub ambiguous_term: String,
    pub question: String,
    pub options: Vec<DisambiguationOption>,
}

impl DisambiguationOffer {
    fn from_term(entry: &AmbiguousTerm) -> Self {
        Self {
            ambiguous_term: entry.term.to_string(),
            question: entry.question.to_string(),
            options: entry
                .columns
                .iter()
                .map(|c| DisambiguationOption {
                    value: c.name.to_string(),
                    display: c.name.to_string(),
                    description: c.description.to_string(),
                })
                .collect(),
        }
    }

    /// Match a user's reply against the options.
    ///
    /// Accepts a 1-based option number or the column name (case-insensitive).
    /// Anything else is taken verbatim as the chosen column.
    pub fn choose(&self, reply: &str) -> String {
        let reply = reply.trim();
        if let Ok(n) = reply.parse::<usize>() {
            if let Some(opt) = n.checked_sub(1).and_then(|i| self.options.get(i)) {
                return opt.value.clone();
            }
        }
        self.options
            .iter()
            .find(|o| o.value.eq_ignore_ascii_case(reply) || o.value.replace('_', " ").eq_ignore_ascii_case(reply))
            .map(|o| o.value.clone())
            .unwrap_or_else(|| reply.to_string())
    }
}

// =============================================================================
// Operations
// =============================================================================

/// First term of `domain` that appears in `query` and that the user has not
/// already narrowed to a specific column.
pub fn detect(query: &str, domain: Domain) -> Option<DisambiguationOffer> {
    let query_lower = query.to_lowercase();
    let entry = domain
        .terms()
        .iter()
        .find(|e| term_appears(&query_lower, e.term) && !e.already_specific(&query_lower))?;

    tracing::debug!(term = %entry.term, domain = ?domain, "Ambiguous column term detected");
    Some(DisambiguationOffer::from_term(entry))
}

/// Offer for a known term, used when re-asking a pending question.
pub fn offer_for(term: &str, domain: Domain) -> Option<DisambiguationOffer> {
    domain
        .terms()
        .iter()
        .find(|e| e.term == term)
        .map(DisambiguationOffer::from_term)
}

/// First domain term present in `query`, ignoring whether the user already
/// named a specific column. Used for routing, not for asking.
pub fn first_term(query_lower: &str, domain: Domain) -> Option<&'static str> {
    domain
        .terms()
        .iter()
        .find(|e| term_appears(query_lower, e.term))
        .map(|e| e.term)
}

/// Replace the first case-insensitive occurrence of `term` in `original`
/// with `selected`; append `" (using {selected})"` when the term is absent.
pub fn resolve(original: &str, term: &str, selected: &str) -> String {
    let resolved = match find_case_insensitive(original, term) {
        Some((start, end)) => format!("{}{}{}", &original[..start], selected, &original[end..]),
        None => format!("{} (using {})", original, selected),
    };
    tracing::debug!(term = %term, selected = %selected, resolved = %resolved, "Disambiguation resolved");
    resolved
}

/// Whether `term` occurs in an already lower-cased query.
///
/// Plain substring match, so "downtime" carries "time" and plurals match.
/// [`resolve`] rewrites the same first occurrence.
pub(crate) fn term_appears(query_lower: &str, term: &str) -> bool {
    query_lower.contains(term)
}

/// Byte span of the first case-insensitive occurrence of `needle`.
fn find_case_insensitive(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    let needle: Vec<char> = needle.chars().collect();
    if needle.is_empty() {
        return None;
    }

    for (start, _) in haystack.char_indices() {
        let mut chars = haystack[start..].char_indices();
        let mut matched = true;
        let mut end = start;
        for want in &needle {
            match chars.next() {
                Some((offset, got)) if chars_eq_ignore_case(got, *want) => {
                    end = start + offset + got.len_utf8();
                }
                _ => {
                    matched = false;
                    break;
                }
            }
        }
        if matched {
            return Some((start, end));
        }
    }
    None
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}
