//! One-to-many explosion of comma-separated identity fields.

use bronze_model::{Frame, Row, RowSnapshot, Value};

/// Splits a comma-separated field into trimmed, non-empty tokens.
///
/// Nulls, blanks and textual null markers yield `[None]`.
pub fn split_list(value: &Value) -> Vec<Option<String>> {
    let Some(text) = value.key_text() else {
        return vec![None];
    };
    let lowered = text.to_lowercase();
    if text.is_empty() || lowered == "nan" || lowered == "none" {
        return vec![None];
    }
    let tokens: Vec<Option<String>> = text
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| Some(token.to_string()))
        .collect();
    if tokens.is_empty() { vec![None] } else { tokens }
}

/// Pads or truncates `names` to the length of `values`.
///
/// Missing positions repeat the last name.
pub fn align_names(values: &[Option<String>], names: &[Option<String>]) -> Vec<Option<String>> {
    let fill = names.last().cloned().flatten();
    (0..values.len())
        .map(|position| names.get(position).cloned().unwrap_or_else(|| fill.clone()))
        .collect()
}

/// Joins identifiers with `", "`, re-splitting embedded lists and keeping
/// the first occurrence of each.
pub fn join_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut ordered: Vec<&str> = Vec::new();
    for entry in ids {
        for part in entry.split(',').map(str::trim) {
            if !part.is_empty() && !ordered.contains(&part) {
                ordered.push(part);
            }
        }
    }
    if ordered.is_empty() {
        None
    } else {
        Some(ordered.join(", "))
    }
}

/// For each value, the other values of the same list joined in order.
pub fn co_identities(values: &[Option<String>]) -> Vec<Option<String>> {
    values
        .iter()
        .map(|value| {
            let current = value.as_deref()?;
            join_ids(
                values
                    .iter()
                    .flatten()
                    .map(String::as_str)
                    .filter(|other| *other != current),
            )
        })
        .collect()
}

/// Columns involved in one explosion.
#[derive(Debug, Clone, Copy)]
pub struct SplitSpec<'a> {
    pub id_column: &'a str,
    /// Display names aligned by position with the identifiers.
    pub name_column: Option<&'a str>,
    /// Boolean set on every row produced by a split.
    pub flag_column: &'a str,
    pub co_column: &'a str,
    /// Merge the existing co-identities with the split siblings instead of
    /// replacing them.
    pub merge_existing: bool,
}

/// Rows replaced by an explosion and the rows that replaced them.
#[derive(Debug, Default)]
pub struct Split {
    pub rows_split: usize,
    pub originals: Vec<RowSnapshot>,
    pub results: Vec<RowSnapshot>,
}

impl Split {
    pub fn rows_created(&self) -> usize {
        self.results.len()
    }
}

/// Explodes every row whose `id_column` holds more than one identity.
///
/// Rows with a single identity keep their row id; the identifier is
/// trimmed and co-identities are re-joined. Exploded rows get fresh row ids
/// and take the original row's place in the frame.
pub fn split_multi_valued(frame: &mut Frame, spec: SplitSpec<'_>) -> Split {
    let mut split = Split::default();
    if !frame.has_column(spec.id_column) {
        return split;
    }
    frame.ensure_column(spec.flag_column);
    frame.ensure_column(spec.co_column);
    let name_column = spec.name_column.filter(|column| frame.has_column(column));

    let rows = frame.take_rows();
    let mut output: Vec<Row> = Vec::with_capacity(rows.len());
    for mut row in rows {
        let ids = split_list(row.get(spec.id_column));
        let existing_co = row
            .get(spec.co_column)
            .key_text()
            .and_then(|text| join_ids([text.as_str()]));
        let distinct = ids.iter().flatten().count();
        if distinct <= 1 {
            row.set(spec.id_column, ids.into_iter().flatten().next());
            row.set(spec.co_column, existing_co);
            output.push(row);
            continue;
        }

        let names = name_column.map(|column| align_names(&ids, &split_list(row.get(column))));
        let siblings = co_identities(&ids);
        split.rows_split += 1;
        split.originals.push(frame.snapshot(&row));
        for (position, id) in ids.iter().enumerate() {
            let mut exploded = frame.derive_row(&row);
            exploded.set(spec.id_column, id.clone());
            if let Some(column) = name_column
                && let Some(name) = names.as_ref().and_then(|names| names[position].clone())
            {
                exploded.set(column, name);
            }
            exploded.set(spec.flag_column, true);
            let sibling = siblings[position].as_deref();
            let co = if spec.merge_existing {
                join_ids(existing_co.as_deref().into_iter().chain(sibling))
            } else {
                sibling.map(str::to_string).or_else(|| existing_co.clone())
            };
            exploded.set(spec.co_column, co);
            split.results.push(frame.snapshot(&exploded));
            output.push(exploded);
        }
    }
    frame.replace_rows(output);
    split
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_drops_blanks() {
        assert_eq!(
            split_list(&Value::text(" US01, ,US02 ")),
            [Some("US01".to_string()), Some("US02".to_string())]
        );
        assert_eq!(split_list(&Value::text("NaN")), [None]);
        assert_eq!(split_list(&Value::Null), [None]);
    }

    #[test]
    fn names_pad_with_the_last_name() {
        let ids = split_list(&Value::text("a, b, c"));
        let names = split_list(&Value::text("Ann, Bob"));
        assert_eq!(
            align_names(&ids, &names),
            [Some("Ann".to_string()), Some("Bob".to_string()), Some("Bob".to_string())]
        );
    }
}
