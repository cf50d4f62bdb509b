use std::collections::BTreeSet;

use bronze_model::{Frame, IssueLedger, Value};
use bronze_remediate::{SplitSpec, deduplicate, split_multi_valued};
use proptest::prelude::*;

const HOLDERS: SplitSpec<'static> = SplitSpec {
    id_column: "castaway_id",
    name_column: Some("castaway"),
    flag_column: "joint_play",
    co_column: "co_castaway_ids",
    merge_existing: false,
};

/// Distinct holder ids in arbitrary order.
fn holder_ids() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(1u32..9999, 2..6)
        .prop_map(|ids: BTreeSet<u32>| {
            ids.into_iter()
                .map(|id| format!("US{id:04}"))
                .collect::<Vec<_>>()
        })
        .prop_flat_map(|ids| Just(ids).prop_shuffle())
}

#[test]
fn split_rows_keep_the_listed_order() {
    let mut frame = Frame::from_rows(
        "advantage_movement",
        ["version_season", "advantage_id", "castaway_id", "castaway"],
        vec![vec![
            "US41".into(),
            "USIN4101".into(),
            "US0630, US0612, US0625".into(),
            "Xander, Deshawn, Erika".into(),
        ]],
    );

    split_multi_valued(&mut frame, HOLDERS);

    let column = |name: &str| -> Vec<String> {
        frame.column_values(name).filter_map(Value::key_text).collect()
    };
    assert_eq!(column("castaway_id"), ["US0630", "US0612", "US0625"]);
    assert_eq!(column("castaway"), ["Xander", "Deshawn", "Erika"]);
    assert_eq!(
        column("co_castaway_ids"),
        ["US0612, US0625", "US0630, US0625", "US0630, US0612"]
    );
}

proptest! {
    #[test]
    fn joint_rows_split_into_one_row_per_holder(ids in holder_ids(), spacing in 0usize..3) {
        let separator = format!(",{}", " ".repeat(spacing));
        let mut frame = Frame::from_rows(
            "advantage_movement",
            ["version_season", "advantage_id", "castaway_id"],
            vec![vec!["US41".into(), "USIN4101".into(), Value::text(ids.join(&separator))]],
        );

        let split = split_multi_valued(&mut frame, HOLDERS);

        prop_assert_eq!(split.rows_split, 1);
        prop_assert_eq!(frame.height(), ids.len());
        for (row, id) in frame.rows().iter().zip(&ids) {
            let others: Vec<&str> = ids.iter().filter(|other| *other != id).map(String::as_str).collect();
            prop_assert_eq!(row.get("castaway_id"), &Value::text(id.as_str()));
            prop_assert_eq!(row.get("co_castaway_ids"), &Value::text(others.join(", ")));
            prop_assert_eq!(row.get("joint_play"), &Value::Bool(true));
            prop_assert_eq!(row.get("advantage_id"), &Value::text("USIN4101"));
        }
    }

    #[test]
    fn deduplication_leaves_unique_keys(keys in prop::collection::vec(0u8..5, 0..30)) {
        let mut frame = Frame::from_rows(
            "castaway_scores",
            ["castaway_id", "score"],
            keys.iter().enumerate().map(|(position, key)| {
                vec![Value::text(format!("US{key:04}")), Value::Int(position as i64)]
            }),
        );
        let subset = vec!["castaway_id".to_string()];
        let mut ledger = IssueLedger::new();

        let removed = deduplicate(&mut frame, &subset, &mut ledger);

        let distinct: BTreeSet<u8> = keys.iter().copied().collect();
        prop_assert_eq!(frame.height(), distinct.len());
        prop_assert_eq!(removed, keys.len() - distinct.len());
        prop_assert_eq!(ledger.len(), usize::from(removed > 0));
        let kept: BTreeSet<String> = frame
            .column_values("castaway_id")
            .filter_map(Value::key_text)
            .collect();
        prop_assert_eq!(kept.len(), frame.height());
    }
}
