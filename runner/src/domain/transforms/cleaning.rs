//! Raw listings cleanup

use std::collections::HashSet;

use serde_json::Value;

use super::records::{Record, Table, TransformError, as_number, is_null, number};
use super::{Transform, TransformStep};

const DROPPED_COLUMNS: [&str; 4] = ["host_id", "country_code", "license", "availability_365"];

const DUPLICATE_KEY: [&str; 4] = ["host_name", "lat", "long", "price"];

const NULL_FILLS: [(&str, &str); 7] = [
    ("house_rules", "Blank"),
    ("host_name", "Blank"),
    ("name", "Blank"),
    ("country", "United States"),
    ("host_identity_verified", "Unconfirmed"),
    ("instant_bookable", "TRUE"),
    ("cancellation_policy", "moderate"),
];

const CURRENCY_COLUMNS: [&str; 2] = ["price", "service_fee"];

#[derive(Debug, Clone, Copy, Default)]
pub struct Cleaning;

impl Transform for Cleaning {
    fn name(&self) -> &'static str {
        "cleaning"
    }

    fn steps(&self) -> Vec<TransformStep> {
        let mut steps = vec![
            TransformStep::new("Standardize Column Names", standardize_column_names),
            TransformStep::new("Drop Columns", |table| {
                drop_columns(table, &DROPPED_COLUMNS);
                Ok(())
            })
            .with_attribute("columns", DROPPED_COLUMNS.join(",")),
            TransformStep::new("Remove Duplicates", remove_duplicates),
            TransformStep::new("Fill Null Values", fill_nulls),
            TransformStep::new("Filter Minimum Nights", filter_minimum_nights),
        ];
        for column in CURRENCY_COLUMNS {
            steps.push(
                TransformStep::new("Convert Currency", move |table| {
                    convert_currency(table, column)
                })
                .with_attribute("column", column),
            );
        }
        steps.push(TransformStep::new(
            "Correct Neighbourhood Group",
            correct_neighbourhood_group,
        ));
        steps
    }
}

fn standardize_column_names(table: &mut Table) -> Result<(), TransformError> {
    for row in table.rows_mut() {
        let renamed: Record = std::mem::take(row)
            .into_iter()
            .map(|(key, value)| (key.to_lowercase().replace(' ', "_"), value))
            .collect();
        *row = renamed;
    }
    Ok(())
}

fn drop_columns(table: &mut Table, columns: &[&str]) {
    for row in table.rows_mut() {
        for column in columns {
            row.shift_remove(*column);
        }
    }
}

fn remove_duplicates(table: &mut Table) -> Result<(), TransformError> {
    let mut seen = HashSet::new();
    table.rows_mut().retain(|row| {
        let key: Vec<String> = DUPLICATE_KEY
            .iter()
            .map(|column| row.get(*column).map(Value::to_string).unwrap_or_default())
            .collect();
        seen.insert(key)
    });
    Ok(())
}

fn fill_nulls(table: &mut Table) -> Result<(), TransformError> {
    for row in table.rows_mut() {
        for (column, fill) in NULL_FILLS {
            if is_null(row.get(column)) {
                row.insert(column.to_string(), Value::from(fill));
            }
        }
    }
    Ok(())
}

/// Keep rows with `0 < minimum_nights < 365`; missing values are dropped.
fn filter_minimum_nights(table: &mut Table) -> Result<(), TransformError> {
    table.require_column("minimum_nights")?;
    table.rows_mut().retain(|row| {
        row.get("minimum_nights")
            .and_then(as_number)
            .is_some_and(|nights| nights > 0.0 && nights < 365.0)
    });
    Ok(())
}

/// `"$1,234"` to `1234.0`. Rows whose value does not convert to a finite
/// amount are dropped.
fn convert_currency(table: &mut Table, column: &str) -> Result<(), TransformError> {
    table.require_column(column)?;

    let mut converted = Vec::with_capacity(table.len());
    for (row, mut record) in std::mem::take(table.rows_mut()).into_iter().enumerate() {
        let amount = match record.get(column) {
            Some(Value::String(s)) => s.replace(['$', ','], "").trim().parse::<f64>().ok(),
            Some(Value::Number(n)) => n.as_f64(),
            _ => None,
        }
        .filter(|amount| amount.is_finite());
        if let Some(amount) = amount {
            record.insert(column.to_string(), number(column, row, amount)?);
            converted.push(record);
        }
    }
    *table.rows_mut() = converted;
    Ok(())
}

fn correct_neighbourhood_group(table: &mut Table) -> Result<(), TransformError> {
    for row in table.rows_mut() {
        if let Some(group) = row.get_mut("neighbourhood_group") {
            if group.as_str() == Some("brookln") {
                *group = Value::from("Brooklyn");
            }
        }
    }
    Ok(())
}
