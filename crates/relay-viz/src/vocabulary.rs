//! Word lists the selector matches column names and queries against.

use std::sync::LazyLock;

use regex::Regex;

/// A set of phrases matched on word boundaries (Latin) or as substrings
/// (Arabic, where prefixes attach to the word).
pub(crate) struct Vocabulary {
    latin: Regex,
    arabic: &'static [&'static str],
}

impl Vocabulary {
    fn new(latin: &[&str], arabic: &'static [&'static str]) -> Self {
        let alternation = latin
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");
        Self {
            latin: Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
                .expect("Invalid vocabulary regex"),
            arabic,
        }
    }

    pub(crate) fn matches(&self, text: &str) -> bool {
        self.latin.is_match(text) || self.arabic.iter().any(|w| text.contains(w))
    }
}

/// Lower-case, trim, and read `_` and `-` as spaces.
pub(crate) fn normalize_column(name: &str) -> String {
    name.trim().to_lowercase().replace(['_', '-'], " ")
}

// =============================================================================
// Column-name vocabularies (matched against normalized names)
// =============================================================================

pub(crate) static TIME_COLUMNS: LazyLock<Vocabulary> = LazyLock::new(|| {
    Vocabulary::new(
        &[
            "date",
            "month",
            "year",
            "day",
            "week",
            "quarter",
            "scheduled date",
            "actual date",
            "created date",
            "creation date",
            "entry time",
            "exit time",
            "timestamp",
        ],
        &["تاريخ", "شهر", "سنة", "يوم"],
    )
});

pub(crate) static CATEGORY_COLUMNS: LazyLock<Vocabulary> = LazyLock::new(|| {
    Vocabulary::new(
        &[
            "vendor name",
            "vendor",
            "contractor name",
            "contractor",
            "waybill status desc",
            "waybill status",
            "status",
            "power plant desc",
            "power plant",
            "plant desc",
            "plant",
            "fuel type",
            "fuel",
            "route code",
            "route desc",
            "route",
            "zone name",
            "zone",
            "driver id",
            "driver",
            "vehicle name",
            "vehicle",
        ],
        &["مقاول", "حالة", "مصنع", "منطقة", "سائق", "سيارة"],
    )
});

pub(crate) static VALUE_COLUMNS: LazyLock<Vocabulary> = LazyLock::new(|| {
    Vocabulary::new(
        &[
            "count",
            "sum",
            "total",
            "avg",
            "average",
            "mean",
            "requested quantity",
            "actual quantity",
            "quantity",
            "cost",
            "price",
            "amount",
            "value",
            "dwell hrs",
            "dwell minutes",
            "duration",
            "hours",
            "hrs",
            "minutes",
        ],
        &["عدد", "مجموع", "كمية", "متوسط"],
    )
});

// =============================================================================
// Query vocabularies
// =============================================================================

/// The user wants rows, not a picture.
pub(crate) static RAW_DATA_QUERY: LazyLock<Vocabulary> = LazyLock::new(|| {
    Vocabulary::new(
        &[
            "list",
            "show all",
            "give me all",
            "display all",
            "all records",
            "details",
            "detail",
            "information",
            "records",
            "entries",
            "waybill number",
            "specific",
            "particular",
            "assigned to",
            "belongs to",
            "related to",
            "for contractor",
            "for vendor",
            "find",
            "search",
            "lookup",
            "look up",
        ],
        &["قائمة", "تفاصيل", "سجلات"],
    )
});

/// The user asked for a chart outright.
pub(crate) static CHART_REQUEST_QUERY: LazyLock<Vocabulary> = LazyLock::new(|| {
    Vocabulary::new(
        &[
            "chart",
            "charts",
            "graph",
            "plot",
            "visualize",
            "visualise",
            "visualization",
            "visualisation",
        ],
        &["رسم بياني", "مخطط"],
    )
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_column() {
        assert_eq!(normalize_column(" Dwell_Hrs "), "dwell hrs");
        assert_eq!(normalize_column("entry-time"), "entry time");
    }

    #[test]
    fn test_column_vocabularies() {
        assert!(TIME_COLUMNS.matches(&normalize_column("Scheduled Date")));
        assert!(TIME_COLUMNS.matches(&normalize_column("month")));
        assert!(TIME_COLUMNS.matches("تاريخ التسليم"));
        assert!(!TIME_COLUMNS.matches(&normalize_column("last_updated")));
        assert!(!TIME_COLUMNS.matches(&normalize_column("today_count")));

        assert!(CATEGORY_COLUMNS.matches(&normalize_column("zone_name")));
        assert!(CATEGORY_COLUMNS.matches(&normalize_column("Vendor Name")));
        assert!(!CATEGORY_COLUMNS.matches(&normalize_column("avg_hrs")));

        assert!(VALUE_COLUMNS.matches(&normalize_column("avg_hrs")));
        assert!(VALUE_COLUMNS.matches(&normalize_column("count(*)")));
        assert!(VALUE_COLUMNS.matches(&normalize_column("total_waybills")));
        assert!(!VALUE_COLUMNS.matches(&normalize_column("country")));
    }

    #[test]
    fn test_query_vocabularies() {
        assert!(RAW_DATA_QUERY.matches("list all waybills for vendor X"));
        assert!(RAW_DATA_QUERY.matches("Show me the details of waybill 7"));
        assert!(!RAW_DATA_QUERY.matches("waybill count by status"));
        assert!(!RAW_DATA_QUERY.matches("specialist teams"));
        assert!(RAW_DATA_QUERY.matches("قائمة المقاولين"));

        assert!(CHART_REQUEST_QUERY.matches("plot waybills per month"));
        assert!(CHART_REQUEST_QUERY.matches("show it as a Chart"));
        assert!(!CHART_REQUEST_QUERY.matches("chartered vessels"));
    }
}
