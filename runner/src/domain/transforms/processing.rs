//! Derived cost and ranking columns over cleaned listings

use std::collections::HashMap;

use serde_json::Value;

use super::records::{Table, TransformError};
use super::{Transform, TransformStep};

#[derive(Debug, Clone, Copy, Default)]
pub struct Processing;

impl Transform for Processing {
    fn name(&self) -> &'static str {
        "processing"
    }

    fn steps(&self) -> Vec<TransformStep> {
        vec![
            TransformStep::new("Calculate Cost Per Night", cost_per_night),
            TransformStep::new("Calculate Minimum Total Spend", minimum_total_spend),
            TransformStep::new("Rank by Cost Per Night in Neighbourhood", |table| {
                rank_within_group(
                    table,
                    "neighbourhood",
                    "cost_per_night",
                    "exp_rank_per_neighbourhood",
                )
            }),
            TransformStep::new("Rank by Cost Per Night Overall", |table| {
                rank_column(table, "cost_per_night", "exp_rank_overall")
            }),
            TransformStep::new("Rank by Number of Reviews", |table| {
                rank_column(table, "number_of_reviews", "rank_overall_reviews")
            }),
            TransformStep::new("Create Property Rank Columns", property_rank_columns),
        ]
    }
}

fn cost_per_night(table: &mut Table) -> Result<(), TransformError> {
    let price = table.numbers("price")?;
    let fee = table.numbers("service_fee")?;
    let cost: Vec<f64> = price.iter().zip(&fee).map(|(p, f)| p + f).collect();
    table.set_numbers("cost_per_night", &cost)
}

fn minimum_total_spend(table: &mut Table) -> Result<(), TransformError> {
    let cost = table.numbers("cost_per_night")?;
    let nights = table.numbers("minimum_nights")?;
    let spend: Vec<f64> = cost.iter().zip(&nights).map(|(c, n)| c * n).collect();
    table.set_numbers("minimum_total_spend", &spend)
}

/// Dense descending ranks: the largest value ranks 1 and ties share a rank.
fn dense_rank_desc(values: &[f64]) -> Vec<u64> {
    let mut distinct = values.to_vec();
    distinct.sort_by(|a, b| b.total_cmp(a));
    distinct.dedup_by(|a, b| a.total_cmp(b).is_eq());
    values
        .iter()
        .map(|v| {
            let idx = distinct
                .binary_search_by(|d| v.total_cmp(d))
                .unwrap_or_else(|idx| idx);
            idx as u64 + 1
        })
        .collect()
}

fn set_ranks(table: &mut Table, column: &str, ranks: &[u64]) {
    for (record, rank) in table.rows_mut().iter_mut().zip(ranks) {
        record.insert(column.to_string(), Value::from(*rank));
    }
}

fn rank_column(table: &mut Table, source: &str, target: &str) -> Result<(), TransformError> {
    let values = table.numbers(source)?;
    set_ranks(table, target, &dense_rank_desc(&values));
    Ok(())
}

fn rank_within_group(
    table: &mut Table,
    group: &str,
    source: &str,
    target: &str,
) -> Result<(), TransformError> {
    table.require_column(group)?;
    let values = table.numbers(source)?;

    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, record) in table.rows().iter().enumerate() {
        let key = record.get(group).map(Value::to_string).unwrap_or_default();
        groups.entry(key).or_default().push(idx);
    }

    let mut ranks = vec![0; values.len()];
    for members in groups.values() {
        let group_values: Vec<f64> = members.iter().map(|&i| values[i]).collect();
        for (&i, rank) in members.iter().zip(dense_rank_desc(&group_values)) {
            ranks[i] = rank;
        }
    }
    set_ranks(table, target, &ranks);
    Ok(())
}

/// `"<rank>/<total properties>"` for the overall cost and review ranks
fn property_rank_columns(table: &mut Table) -> Result<(), TransformError> {
    let total = table.len();
    for (source, target) in [
        ("exp_rank_overall", "prop_rank_exp"),
        ("rank_overall_reviews", "prop_rank_review"),
    ] {
        let ranks = table.numbers(source)?;
        for (record, rank) in table.rows_mut().iter_mut().zip(ranks) {
            record.insert(target.to_string(), Value::from(format!("{rank}/{total}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::transforms::apply_all;

    #[test]
    fn test_dense_rank_desc() {
        assert_eq!(dense_rank_desc(&[10.0, 30.0, 20.0, 30.0]), vec![3, 1, 2, 1]);
        assert!(dense_rank_desc(&[]).is_empty());
    }

    #[test]
    fn test_full_processing() {
        let rows = [
            json!({"neighbourhood": "A", "price": 100, "service_fee": 20, "minimum_nights": 2, "number_of_reviews": 5}),
            json!({"neighbourhood": "A", "price": 50, "service_fee": 10, "minimum_nights": 1, "number_of_reviews": 9}),
            json!({"neighbourhood": "B", "price": 40, "service_fee": 5, "minimum_nights": 3, "number_of_reviews": 5}),
        ];
        let lines: Vec<String> = rows.iter().map(|r| r.to_string()).collect();
        let mut table = Table::from_json_lines(lines.join("\n").as_bytes()).unwrap();

        apply_all(&Processing, &mut table).unwrap();

        assert_eq!(table.numbers("cost_per_night").unwrap(), vec![120.0, 60.0, 45.0]);
        assert_eq!(
            table.numbers("minimum_total_spend").unwrap(),
            vec![240.0, 60.0, 135.0]
        );
        assert_eq!(
            table.numbers("exp_rank_per_neighbourhood").unwrap(),
            vec![1.0, 2.0, 1.0]
        );
        assert_eq!(table.numbers("exp_rank_overall").unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(
            table.numbers("rank_overall_reviews").unwrap(),
            vec![2.0, 1.0, 2.0]
        );
        assert_eq!(table.rows()[2].get("prop_rank_exp"), Some(&json!("3/3")));
        assert_eq!(table.rows()[1].get("prop_rank_review"), Some(&json!("1/3")));
    }

    #[test]
    fn test_missing_price_fails() {
        let mut table = Table::from_json_lines(b"{\"service_fee\": 1}").unwrap();
        assert!(matches!(
            cost_per_night(&mut table),
            Err(TransformError::MissingColumn { .. })
        ));
    }
}
