//! Compact summaries of the last collaborator result.
//!
//! A follow-up like "what about its dwell time?" only makes sense if the
//! router and collaborators can see which vendor, plant, or zone the
//! previous answer was about. [`ContextExtractor`] keeps just enough of the
//! last table to resolve those references.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use relay_core::config::ContextConfig;
use relay_core::{scalar_to_string, TableData};

/// A column paired with the value it held in a single-row result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnValue {
    pub column: String,
    pub value: Value,
}

/// Distinct values of a key column: a scalar when only one was seen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    One(Value),
    Many(Vec<Value>),
}

/// A key column and the values found for it in a multi-row result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyColumn {
    pub column: String,
    pub value: KeyValue,
}

/// What a follow-up question may refer back to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultContext {
    /// Every column of a one-row result, in column order.
    Single { values: Vec<ColumnValue> },
    /// Row count plus the key columns present, in column order.
    Multi { count: usize, key_values: Vec<KeyColumn> },
}

impl ResultContext {
    /// Render for inclusion in a collaborator prompt.
    pub fn render(&self) -> String {
        let mut out = String::from("## Previous Query Result Context:");
        match self {
            ResultContext::Single { values } => {
                for cv in values {
                    out.push_str(&format!("\n- {}: {}", cv.column, scalar_to_string(&cv.value)));
                }
            }
            ResultContext::Multi { count, key_values } => {
                out.push_str(&format!("\n- Result count: {} records", count));
                for kc in key_values {
                    match &kc.value {
                        KeyValue::One(v) => {
                            out.push_str(&format!("\n- {}: {}", kc.column, scalar_to_string(v)));
                        }
                        KeyValue::Many(vs) => {
                            let shown: Vec<String> = vs.iter().take(3).map(scalar_to_string).collect();
                            out.push_str(&format!(
                                "\n- {} (first values): {}",
                                kc.column,
                                shown.join(", ")
                            ));
                        }
                    }
                }
            }
        }
        out
    }
}

/// Builds [`ResultContext`] values from collaborator tables.
#[derive(Debug, Clone)]
pub struct ContextExtractor {
    key_columns: Vec<String>,
    max_key_values: usize,
    scan_rows: usize,
}

impl Default for ContextExtractor {
    fn default() -> Self {
        Self::new(&ContextConfig::default())
    }
}

impl ContextExtractor {
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            key_columns: config.key_columns.clone(),
            max_key_values: config.max_key_values,
            scan_rows: config.scan_rows,
        }
    }

    /// Summarize `table`, or `None` when nothing worth remembering is in it.
    ///
    /// A single row keeps every column. Multiple rows keep the row count and
    /// up to `max_key_values` distinct non-empty values of each configured key
    /// column, looking only at the first `scan_rows` rows.
    pub fn extract(&self, table: &TableData) -> Option<ResultContext> {
        if table.is_empty() {
            return None;
        }

        if table.rows.len() == 1 {
            let values = table
                .columns
                .iter()
                .zip(table.rows[0].iter())
                .map(|(column, value)| ColumnValue {
                    column: column.clone(),
                    value: value.clone(),
                })
                .collect();
            return Some(ResultContext::Single { values });
        }

        let mut key_values = Vec::new();
        for (idx, column) in table.columns.iter().enumerate() {
            if !self.key_columns.iter().any(|k| k == column) {
                continue;
            }

            let mut distinct: Vec<Value> = Vec::new();
            for row in table.rows.iter().take(self.scan_rows) {
                let Some(cell) = row.get(idx) else { continue };
                if is_blank(cell) || distinct.contains(cell) {
                    continue;
                }
                distinct.push(cell.clone());
                if distinct.len() >= self.max_key_values {
                    break;
                }
            }

            let value = match distinct.len() {
                0 => continue,
                1 => KeyValue::One(distinct.remove(0)),
                _ => KeyValue::Many(distinct),
            };
            key_values.push(KeyColumn {
                column: column.clone(),
                value,
            });
        }

        if key_values.is_empty() {
            return None;
        }

        Some(ResultContext::Multi {
            count: table.rows.len(),
            key_values,
        })
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> TableData {
        TableData::new(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    // ---- Extraction ----

    #[test]
    fn test_empty_table_yields_none() {
        let extractor = ContextExtractor::default();
        assert!(extractor.extract(&TableData::default()).is_none());
        assert!(extractor.extract(&table(&["Vendor Name"], vec![])).is_none());
    }

    #[test]
    fn test_single_row_keeps_all_columns_in_order() {
        let extractor = ContextExtractor::default();
        let t = table(
            &["Vendor Name", "Requested Quantity", "Actual Quantity"],
            vec![vec![json!("ACME"), json!(120), json!(118.5)]],
        );

        let ctx = extractor.extract(&t).unwrap();
        match ctx {
            ResultContext::Single { values } => {
                assert_eq!(values.len(), 3);
                assert_eq!(values[0].column, "Vendor Name");
                assert_eq!(values[0].value, json!("ACME"));
                assert_eq!(values[2].column, "Actual Quantity");
            }
            other => panic!("expected single-row context, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_row_collects_key_columns_only() {
        let extractor = ContextExtractor::default();
        let t = table(
            &["zone_name", "avg_hrs", "driver_id"],
            vec![
                vec![json!("North"), json!(2.5), json!("D1")],
                vec![json!("South"), json!(3.0), json!("D1")],
                vec![json!("North"), json!(1.0), json!("D1")],
            ],
        );

        let ctx = extractor.extract(&t).unwrap();
        let ResultContext::Multi { count, key_values } = ctx else {
            panic!("expected multi-row context");
        };
        assert_eq!(count, 3);
        assert_eq!(key_values.len(), 2);
        assert_eq!(key_values[0].column, "zone_name");
        assert_eq!(
            key_values[0].value,
            KeyValue::Many(vec![json!("North"), json!("South")])
        );
        assert_eq!(key_values[1].column, "driver_id");
        assert_eq!(key_values[1].value, KeyValue::One(json!("D1")));
    }

    #[test]
    fn test_multi_row_caps_distinct_values() {
        let extractor = ContextExtractor::default();
        let rows = (0..8).map(|i| vec![json!(format!("V{}", i))]).collect();
        let t = table(&["Vendor Name"], rows);

        let ResultContext::Multi { key_values, .. } = extractor.extract(&t).unwrap() else {
            panic!("expected multi-row context");
        };
        match &key_values[0].value {
            KeyValue::Many(vs) => assert_eq!(vs.len(), 5),
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_row_scans_leading_rows_only() {
        let extractor = ContextExtractor::default();
        let mut rows: Vec<Vec<Value>> = (0..10).map(|_| vec![json!("same")]).collect();
        rows.push(vec![json!("late")]);
        let t = table(&["month"], rows);

        let ResultContext::Multi { count, key_values } = extractor.extract(&t).unwrap() else {
            panic!("expected multi-row context");
        };
        assert_eq!(count, 11);
        assert_eq!(key_values[0].value, KeyValue::One(json!("same")));
    }

    #[test]
    fn test_multi_row_skips_blank_cells() {
        let extractor = ContextExtractor::default();
        let t = table(
            &["Contractor Name"],
            vec![vec![json!(null)], vec![json!("")], vec![json!("Delta")]],
        );

        let ResultContext::Multi { key_values, .. } = extractor.extract(&t).unwrap() else {
            panic!("expected multi-row context");
        };
        assert_eq!(key_values[0].value, KeyValue::One(json!("Delta")));
    }

    #[test]
    fn test_multi_row_without_key_columns_yields_none() {
        let extractor = ContextExtractor::default();
        let t = table(
            &["total", "avg"],
            vec![vec![json!(1), json!(2)], vec![json!(3), json!(4)]],
        );
        assert!(extractor.extract(&t).is_none());
    }

    #[test]
    fn test_custom_key_columns() {
        let config = ContextConfig {
            key_columns: vec!["site".to_string()],
            max_key_values: 2,
            scan_rows: 10,
        };
        let extractor = ContextExtractor::new(&config);
        let t = table(
            &["site"],
            vec![vec![json!("a")], vec![json!("b")], vec![json!("c")]],
        );
        let ResultContext::Multi { key_values, .. } = extractor.extract(&t).unwrap() else {
            panic!("expected multi-row context");
        };
        assert_eq!(key_values[0].value, KeyValue::Many(vec![json!("a"), json!("b")]));
    }

    // ---- Rendering ----

    #[test]
    fn test_render_single() {
        let ctx = ResultContext::Single {
            values: vec![
                ColumnValue {
                    column: "Vendor Name".into(),
                    value: json!("ACME"),
                },
                ColumnValue {
                    column: "Actual Quantity".into(),
                    value: json!(12),
                },
            ],
        };
        assert_eq!(
            ctx.render(),
            "## Previous Query Result Context:\n- Vendor Name: ACME\n- Actual Quantity: 12"
        );
    }

    #[test]
    fn test_render_multi_shows_first_three_values() {
        let ctx = ResultContext::Multi {
            count: 40,
            key_values: vec![
                KeyColumn {
                    column: "zone_name".into(),
                    value: KeyValue::Many(vec![json!("A"), json!("B"), json!("C"), json!("D")]),
                },
                KeyColumn {
                    column: "month".into(),
                    value: KeyValue::One(json!("2024-05")),
                },
            ],
        };
        assert_eq!(
            ctx.render(),
            "## Previous Query Result Context:\n- Result count: 40 records\n\
             - zone_name (first values): A, B, C\n- month: 2024-05"
        );
    }

    #[test]
    fn test_key_value_serializes_untagged() {
        assert_eq!(serde_json::to_value(KeyValue::One(json!("x"))).unwrap(), json!("x"));
        assert_eq!(
            serde_json::to_value(KeyValue::Many(vec![json!(1), json!(2)])).unwrap(),
            json!([1, 2])
        );
    }
}
