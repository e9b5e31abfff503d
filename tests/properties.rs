use std::collections::HashSet;

use proptest::prelude::*;

use ohlcv_clean::detect::{
    collect_value_set, find_null_like_columns, leaves, DetectorOptions, FieldPath, NullDefinition,
    ScanStrategy, DEFAULT_MAX_DEPTH,
};
use ohlcv_clean::processing::{aggregate, dedup, prune_columns, AggregateSpec};
use ohlcv_clean::types::{DataSet, DataType, Field, LeafClass, Schema, Value};

fn text_cell() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        Just(Value::from("")),
        Just(Value::from("NULL")),
        Just(Value::from(" null ")),
        Just(Value::from("x")),
        Just(Value::from("y")),
    ]
}

fn int_cell() -> impl Strategy<Value = Value> {
    prop_oneof![Just(Value::Null), (0i64..3).prop_map(Value::Int64)]
}

fn dataset() -> impl Strategy<Value = DataSet> {
    prop::collection::vec((text_cell(), text_cell(), int_cell(), int_cell()), 0..24).prop_map(
        |rows| {
            let schema = Schema::new(vec![
                Field::new("a", DataType::Utf8),
                Field::new("b", DataType::Utf8),
                Field::new("open", DataType::Int64),
                Field::new("volume", DataType::Int64),
            ]);
            let rows = rows
                .into_iter()
                .map(|(a, b, open, volume)| vec![a, b, open, volume])
                .collect();
            DataSet::new(schema, rows)
        },
    )
}

fn nested_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Int64),
        Field::record(
            "meta",
            vec![
                Field::new("a", DataType::Utf8),
                Field::record("b", vec![Field::new("c", DataType::Int64)]),
            ],
        ),
        Field::new(
            "fills",
            DataType::list(DataType::Struct(vec![
                Field::new("px", DataType::Utf8),
                Field::new("m", DataType::Utf8),
            ])),
        ),
        Field::new("tags", DataType::list(DataType::Utf8)),
    ])
}

fn meta_cell() -> impl Strategy<Value = Value> {
    let inner = prop_oneof![
        Just(Value::Null),
        int_cell().prop_map(|c| Value::Record(vec![c])),
    ];
    prop_oneof![
        Just(Value::Null),
        (text_cell(), inner).prop_map(|(a, b)| Value::Record(vec![a, b])),
    ]
}

fn fills_cell() -> impl Strategy<Value = Value> {
    let fill = prop_oneof![
        Just(Value::Null),
        (text_cell(), text_cell()).prop_map(|(px, m)| Value::Record(vec![px, m])),
    ];
    prop_oneof![
        Just(Value::Null),
        prop::collection::vec(fill, 0..3).prop_map(Value::List),
    ]
}

fn tags_cell() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        prop::collection::vec(text_cell(), 0..3).prop_map(Value::List),
    ]
}

fn nested_dataset() -> impl Strategy<Value = DataSet> {
    prop::collection::vec((int_cell(), meta_cell(), fills_cell(), tags_cell()), 0..16).prop_map(
        |rows| {
            let rows = rows
                .into_iter()
                .map(|(id, meta, fills, tags)| vec![id, meta, fills, tags])
                .collect();
            DataSet::new(nested_schema(), rows)
        },
    )
}

fn null_like_names(ds: &DataSet, strategy: ScanStrategy) -> Vec<String> {
    let opts = DetectorOptions {
        strategy,
        ..Default::default()
    };
    find_null_like_columns(ds, &NullDefinition::default(), &opts)
        .unwrap()
        .null_like_paths()
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Column-by-column reading of the default null sets.
fn expected_null_like(ds: &DataSet) -> Vec<String> {
    ds.schema
        .fields
        .iter()
        .filter(|field| {
            ds.column_values(&field.name).unwrap().all(|v| match v {
                Value::Null => true,
                Value::Utf8(s) => matches!(s.trim(), "" | "NULL" | "null"),
                _ => false,
            })
        })
        .map(|field| field.name.clone())
        .collect()
}

proptest! {
    #[test]
    fn detection_matches_column_reading(ds in dataset()) {
        let expected = expected_null_like(&ds);
        prop_assert_eq!(null_like_names(&ds, ScanStrategy::Materialize), expected.clone());
        prop_assert_eq!(null_like_names(&ds, ScanStrategy::EarlyExit), expected);
    }

    #[test]
    fn pruning_leaves_nothing_null_like(ds in dataset()) {
        let report = find_null_like_columns(&ds, &NullDefinition::default(), &DetectorOptions::default()).unwrap();
        let pruned = prune_columns(&ds, &report.null_like_paths()).unwrap();
        prop_assert!(null_like_names(&pruned, ScanStrategy::EarlyExit).is_empty());
        prop_assert_eq!(pruned.row_count(), ds.row_count());
        pruned.validate().unwrap();
    }

    #[test]
    fn nested_verdicts_agree_with_value_sets(ds in nested_dataset()) {
        let nulls = NullDefinition::default();
        let report = find_null_like_columns(&ds, &nulls, &DetectorOptions::default()).unwrap();
        let leaves = leaves(&ds.schema, DEFAULT_MAX_DEPTH).unwrap();
        prop_assert_eq!(report.leaf_count(), leaves.len());

        for (leaf, verdict) in leaves.iter().zip(&report.verdicts) {
            prop_assert_eq!(&leaf.path, &verdict.path);
            let values = collect_value_set(&ds, leaf);
            let all_null = values.iter().all(|v| nulls.matches(leaf.class, v));
            if verdict.null_like {
                prop_assert!(all_null, "{} kept a real value: {:?}", leaf.path, values);
            } else if leaf.class != LeafClass::OtherUnsupported {
                prop_assert!(!all_null, "{} only holds null-like values", leaf.path);
            }
        }
        prop_assert_eq!(
            null_like_names(&ds, ScanStrategy::Materialize),
            null_like_names(&ds, ScanStrategy::EarlyExit)
        );
    }

    #[test]
    fn nested_pruning_reaches_a_fixpoint(ds in nested_dataset()) {
        let report = find_null_like_columns(&ds, &NullDefinition::default(), &DetectorOptions::default()).unwrap();
        let pruned = prune_columns(&ds, &report.null_like_paths()).unwrap();
        pruned.validate().unwrap();
        prop_assert_eq!(pruned.row_count(), ds.row_count());
        prop_assert!(null_like_names(&pruned, ScanStrategy::EarlyExit).is_empty());
        prop_assert!(null_like_names(&pruned, ScanStrategy::Materialize).is_empty());
    }

    #[test]
    fn dedup_keeps_exactly_one_of_each_row(ds in dataset()) {
        let out = dedup(&ds);
        let distinct: HashSet<&Vec<Value>> = ds.rows.iter().collect();
        prop_assert_eq!(out.row_count(), distinct.len());
        for row in &ds.rows {
            prop_assert!(out.rows.contains(row));
        }
        prop_assert_eq!(dedup(&out), out);
    }

    #[test]
    fn group_counts_add_up_to_row_count(ds in dataset()) {
        let out = aggregate(&ds, &["open"], &[AggregateSpec::new("volume", "count")]).unwrap();
        let total: i64 = out
            .rows
            .iter()
            .map(|row| match row[1] {
                Value::Int64(n) => n,
                _ => 0,
            })
            .sum();
        prop_assert_eq!(total, ds.row_count() as i64);

        let keys: HashSet<&Value> = out.rows.iter().map(|row| &row[0]).collect();
        prop_assert_eq!(keys.len(), out.row_count());
    }
}

#[test]
fn nested_batch_is_clean_after_one_prune() {
    let rows = vec![
        vec![
            Value::Int64(1),
            Value::Record(vec![Value::from(" null "), Value::Record(vec![Value::Null])]),
            Value::List(vec![
                Value::Record(vec![Value::from("10"), Value::from("")]),
                Value::Record(vec![Value::Null, Value::from("NULL")]),
            ]),
            Value::List(vec![Value::from("")]),
        ],
        vec![
            Value::Int64(2),
            Value::Null,
            Value::List(vec![]),
            Value::Null,
        ],
    ];
    let ds = DataSet::new(nested_schema(), rows);
    ds.validate().unwrap();

    let first = null_like_names(&ds, ScanStrategy::EarlyExit);
    assert_eq!(first, vec!["meta.a", "meta.b.c", "fills.m", "tags"]);

    let paths: Vec<FieldPath> = first.iter().map(|p| FieldPath::parse(p)).collect();
    let pruned = prune_columns(&ds, &paths).unwrap();
    pruned.validate().unwrap();
    assert_eq!(
        pruned.schema.field_names().collect::<Vec<_>>(),
        vec!["id", "meta", "fills"]
    );
    assert!(null_like_names(&pruned, ScanStrategy::EarlyExit).is_empty());
    assert!(null_like_names(&pruned, ScanStrategy::Materialize).is_empty());
}
