//! Visualization selection.
//!
//! Guards first (nothing to chart, raw rows wanted), then shape rules on the
//! first row's value types, then a fallback on column names. The first rule
//! that applies decides.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use relay_core::{scalar_to_string, TableData};

use crate::vocabulary::{
    normalize_column, CATEGORY_COLUMNS, CHART_REQUEST_QUERY, RAW_DATA_QUERY, TIME_COLUMNS,
    VALUE_COLUMNS,
};

/// Row counts at or below this render as a pie.
const PIE_MAX_ROWS: usize = 6;
/// Above this many rows (or categories) bars turn horizontal.
const VERTICAL_MAX_ROWS: usize = 10;
/// A grouping column needs between 2 and this many distinct values.
const MAX_GROUPS: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
    HorizontalBar,
    GroupedBar,
    HorizontalGroupedBar,
}

/// How to chart a result, or that it should not be charted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualizationSpec {
    pub should_visualize: bool,
    pub chart_type: Option<ChartType>,
    pub x_axis: Option<String>,
    pub y_axis: Option<String>,
    pub y_axis_secondary: Option<String>,
    pub y_axis_list: Option<Vec<String>>,
    pub group_by: Option<String>,
    pub title: Option<String>,
}

impl VisualizationSpec {
    pub fn none() -> Self {
        Self::default()
    }

    fn chart(chart_type: ChartType, x_axis: &str, y_axis: &str, title: String) -> Self {
        Self {
            should_visualize: true,
            chart_type: Some(chart_type),
            x_axis: Some(x_axis.to_string()),
            y_axis: Some(y_axis.to_string()),
            title: Some(title),
            ..Self::default()
        }
    }

    /// Convenience wrapper over [`select_visualization`].
    pub fn for_table(table: &TableData, query: &str) -> Self {
        select_visualization(&table.columns, &table.rows, query)
    }
}

/// Decide whether and how to chart a result.
pub fn select_visualization(columns: &[String], rows: &[Vec<Value>], query: &str) -> VisualizationSpec {
    if columns.is_empty() || rows.is_empty() || rows.len() == 1 || columns.len() == 1 {
        return VisualizationSpec::none();
    }
    if wants_raw_data(query) {
        tracing::debug!("Query asks for raw rows, skipping visualization");
        return VisualizationSpec::none();
    }

    let spec = category_value_pair(columns, rows, query)
        .or_else(|| multi_measure(columns, rows, query))
        .or_else(|| grouped_categories(columns, rows, query))
        .or_else(|| by_column_names(columns, rows, query))
        .unwrap_or_else(VisualizationSpec::none);

    tracing::debug!(
        chart = ?spec.chart_type,
        x = ?spec.x_axis,
        y = ?spec.y_axis,
        rows = rows.len(),
        "Visualization selected"
    );
    spec
}

/// Raw-data phrasing suppresses charts unless a chart is asked for outright.
fn wants_raw_data(query: &str) -> bool {
    let query = query.to_lowercase();
    RAW_DATA_QUERY.matches(&query) && !CHART_REQUEST_QUERY.matches(&query)
}

// =============================================================================
// Shape rules
// =============================================================================

/// A label column followed by exactly one measure.
fn category_value_pair(columns: &[String], rows: &[Vec<Value>], query: &str) -> Option<VisualizationSpec> {
    let first = &rows[0];
    if !is_label(first.first()?) || !is_numeric(first.get(1)?) {
        return None;
    }
    if numeric_positions(columns, first).len() != 1 {
        return None;
    }

    let (x, y) = (&columns[0], &columns[1]);
    let chart_type = if is_time_column(x) {
        ChartType::Line
    } else {
        by_row_count(rows.len())
    };
    Some(VisualizationSpec::chart(chart_type, x, y, title_for(query, x, y)))
}

/// A label column followed by two or more measures.
fn multi_measure(columns: &[String], rows: &[Vec<Value>], query: &str) -> Option<VisualizationSpec> {
    if columns.len() < 3 {
        return None;
    }
    let first = &rows[0];
    if !is_label(first.first()?) {
        return None;
    }
    let measures: Vec<String> = numeric_positions(columns, first)
        .into_iter()
        .map(|i| columns[i].clone())
        .collect();
    if measures.len() < 2 {
        return None;
    }

    let x = &columns[0];
    let list = (measures.len() > 2).then(|| measures.clone());

    if is_time_column(x) {
        let mut spec = VisualizationSpec::chart(
            ChartType::Line,
            x,
            &measures[0],
            title_for(query, x, &measures.join(" vs ")),
        );
        spec.y_axis_secondary = Some(measures[1].clone());
        spec.y_axis_list = list;
        return Some(spec);
    }

    let chart_type = if rows.len() > VERTICAL_MAX_ROWS {
        ChartType::HorizontalGroupedBar
    } else {
        ChartType::GroupedBar
    };
    let title = query_title(query).unwrap_or_else(|| format!("Comparison by {}", x));
    let mut spec = VisualizationSpec::chart(chart_type, x, &measures[0], title);
    if measures.len() == 2 {
        spec.y_axis_secondary = Some(measures[1].clone());
    }
    spec.y_axis_list = list;
    Some(spec)
}

/// Two label columns and a measure; the first label may group the second.
fn grouped_categories(columns: &[String], rows: &[Vec<Value>], query: &str) -> Option<VisualizationSpec> {
    if columns.len() < 3 {
        return None;
    }
    let first = &rows[0];
    if !is_label(first.first()?) || !is_label(first.get(1)?) || !is_numeric(first.get(2)?) {
        return None;
    }

    let (group, x, y) = (&columns[0], &columns[1], &columns[2]);
    let groups = distinct_count(rows, 0);

    if groups > 1 && groups <= MAX_GROUPS {
        let chart_type = if distinct_count(rows, 1) > VERTICAL_MAX_ROWS {
            ChartType::HorizontalGroupedBar
        } else {
            ChartType::GroupedBar
        };
        let mut spec =
            VisualizationSpec::chart(chart_type, x, y, format!("{} by {} grouped by {}", y, x, group));
        spec.group_by = Some(group.clone());
        return Some(spec);
    }

    let chart_type = by_row_count(rows.len());
    Some(VisualizationSpec::chart(chart_type, x, y, title_for(query, x, y)))
}

/// Fallback on column names when no value-shape rule applied.
fn by_column_names(columns: &[String], rows: &[Vec<Value>], query: &str) -> Option<VisualizationSpec> {
    let mut time = Vec::new();
    let mut value = Vec::new();
    let mut category = Vec::new();
    for column in columns {
        if is_time_column(column) {
            time.push(column);
        } else if is_value_column(column) {
            value.push(column);
        } else if is_category_column(column) {
            category.push(column);
        }
    }

    let y_for = |x: &String| -> Option<String> {
        value
            .first()
            .map(|v| v.to_string())
            .or_else(|| columns.iter().find(|c| *c != x).cloned())
    };

    if let Some(&x) = time.first() {
        let y = y_for(x)?;
        let mut spec = VisualizationSpec::chart(ChartType::Line, x, &y, title_for(query, x, &y));
        spec.y_axis_secondary = value.get(1).map(|v| v.to_string());
        return Some(spec);
    }

    if let Some(&x) = category.first() {
        let y = y_for(x)?;
        let chart_type = by_row_count(rows.len());
        return Some(VisualizationSpec::chart(chart_type, x, &y, title_for(query, x, &y)));
    }

    None
}

// =============================================================================
// Helpers
// =============================================================================

fn by_row_count(rows: usize) -> ChartType {
    if rows <= PIE_MAX_ROWS {
        ChartType::Pie
    } else if rows <= VERTICAL_MAX_ROWS {
        ChartType::Bar
    } else {
        ChartType::HorizontalBar
    }
}

/// JSON numbers and numeric strings such as `"477"`.
fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => {
            let s = s.trim();
            !s.is_empty() && s.parse::<f64>().map(f64::is_finite).unwrap_or(false)
        }
        _ => false,
    }
}

/// A text cell that does not read as a number.
fn is_label(value: &Value) -> bool {
    matches!(value, Value::String(_)) && !is_numeric(value)
}

/// Positions after the first column whose first-row cell is numeric.
fn numeric_positions(columns: &[String], first_row: &[Value]) -> Vec<usize> {
    (1..columns.len().min(first_row.len()))
        .filter(|&i| is_numeric(&first_row[i]))
        .collect()
}

fn distinct_count(rows: &[Vec<Value>], idx: usize) -> usize {
    rows.iter()
        .filter_map(|r| r.get(idx))
        .map(scalar_to_string)
        .collect::<HashSet<_>>()
        .len()
}

fn is_time_column(name: &str) -> bool {
    TIME_COLUMNS.matches(&normalize_column(name))
}

fn is_value_column(name: &str) -> bool {
    VALUE_COLUMNS.matches(&normalize_column(name))
}

fn is_category_column(name: &str) -> bool {
    CATEGORY_COLUMNS.matches(&normalize_column(name))
}

static TITLE_SPLIT: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)\s+by\s+").expect("Invalid title regex"),
        Regex::new(r"(?i)\s+per\s+").expect("Invalid title regex"),
    ]
});

/// "waybills by status" becomes "Waybills by Status"; otherwise "{y} by {x}".
fn title_for(query: &str, x_axis: &str, y_axis: &str) -> String {
    query_title(query).unwrap_or_else(|| format!("{} by {}", y_axis, x_axis))
}

/// Title from a " by " or " per " split of the query, if it has one.
fn query_title(query: &str) -> Option<String> {
    let query = query.trim().trim_end_matches(['?', '.', '!']);
    for (re, word) in TITLE_SPLIT.iter().zip(["by", "per"]) {
        if let Some(m) = re.find(query) {
            let left = query[..m.start()].trim();
            let right = query[m.end()..].trim();
            if !left.is_empty() && !right.is_empty() {
                return Some(format!("{} {} {}", title_case(left), word, title_case(right)));
            }
        }
    }
    None
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}
