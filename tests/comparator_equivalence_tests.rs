//! Typed vs serialized comparison: sign agreement, antisymmetry, and the
//! group comparator being a prefix of the sort comparator.

mod test_data_gen;

use std::cmp::Ordering;

use cogroup_core::config::GroupingConfig;
use cogroup_core::schema::{DataType, EnumType, Field, Schema};
use cogroup_core::sort::{Order, SortSpec};
use cogroup_core::types::{EnumValue, Tuple, Value};
use cogroup_operators::ComparatorRegistry;
use proptest::prelude::*;
use test_data_gen::{schema_of, stack, stack_with, Stack, FETCHES, VISITS};

fn level() -> EnumType {
    EnumType::new("Level", ["low", "mid", "high"])
}

/// Every orderable type in common scope, mixed field order between sources,
/// and a secondary sort on each side.
fn wide_config() -> GroupingConfig {
    let a = Schema::new(
        "a",
        vec![
            Field::new("url", DataType::Utf8),
            Field::new("n", DataType::Int64),
            Field::new("score", DataType::Float64),
            Field::new("flag", DataType::Boolean),
            Field::new("level", DataType::Enum(level())),
            Field::new("extra", DataType::Int32),
        ],
    )
    .unwrap();
    let b = Schema::new(
        "b",
        vec![
            Field::new("tag", DataType::Utf8),
            Field::new("level", DataType::Enum(level())),
            Field::new("flag", DataType::Boolean),
            Field::new("score", DataType::Float64),
            Field::new("n", DataType::Int64),
            Field::new("url", DataType::Utf8),
            Field::new("ratio", DataType::Float32),
        ],
    )
    .unwrap();
    GroupingConfig::new()
        .with_source(VISITS, a)
        .with_source(FETCHES, b)
        .with_order_by(SortSpec::parse("url, n desc, score, flag desc, level").unwrap())
        .with_secondary_order_by(VISITS, SortSpec::parse("extra desc").unwrap())
        .with_secondary_order_by(FETCHES, SortSpec::parse("ratio, tag desc").unwrap())
        .with_group_by(["url", "n"])
}

#[derive(Debug, Clone)]
struct Row {
    from_a: bool,
    url: String,
    n: i64,
    score: f64,
    flag: bool,
    level: usize,
    extra: i32,
    tag: String,
    ratio: f32,
}

fn row() -> impl Strategy<Value = Row> {
    (
        any::<bool>(),
        "[ab]{0,2}",
        prop_oneof![-2i64..2, any::<i64>()],
        prop_oneof![Just(0.0f64), Just(-0.0f64), -1.5f64..1.5, any::<f64>()],
        any::<bool>(),
        0usize..3,
        prop_oneof![-1i32..1, any::<i32>()],
        "[xy]{0,2}",
        any::<f32>(),
    )
        .prop_map(
            |(from_a, url, n, score, flag, level, extra, tag, ratio)| Row {
                from_a,
                url,
                n,
                score,
                flag,
                level,
                extra,
                tag,
                ratio,
            },
        )
}

fn tuple(stack: &Stack, r: &Row) -> Tuple {
    let symbol = ["low", "mid", "high"][r.level];
    let level = Value::Enum(EnumValue::new(&level(), symbol).unwrap());
    if r.from_a {
        Tuple::from_values(
            schema_of(&stack.plan, VISITS),
            vec![
                r.url.clone().into(),
                Value::Int64(r.n),
                Value::Float64(r.score),
                Value::Bool(r.flag),
                level,
                Value::Int32(r.extra),
            ],
        )
        .unwrap()
    } else {
        Tuple::from_values(
            schema_of(&stack.plan, FETCHES),
            vec![
                r.tag.clone().into(),
                level,
                Value::Bool(r.flag),
                Value::Float64(r.score),
                Value::Int64(r.n),
                r.url.clone().into(),
                Value::Float32(r.ratio),
            ],
        )
        .unwrap()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn byte_path_agrees_with_typed_path(a in row(), b in row()) {
        let s = stack(wide_config());
        let (ta, tb) = (tuple(&s, &a), tuple(&s, &b));
        let (ba, bb) = (s.serializer.to_bytes(&ta).unwrap(), s.serializer.to_bytes(&tb).unwrap());

        prop_assert_eq!(s.sort.compare(&ta, &tb).unwrap(), s.sort.compare_bytes(&ba, &bb).unwrap());

        let group = s.sort.group_comparator();
        prop_assert_eq!(group.compare(&ta, &tb).unwrap(), group.compare_bytes(&ba, &bb).unwrap());
    }

    #[test]
    fn sort_is_antisymmetric_and_reflexive(a in row(), b in row()) {
        let s = stack(wide_config());
        let (ta, tb) = (tuple(&s, &a), tuple(&s, &b));
        prop_assert_eq!(s.sort.compare(&ta, &ta).unwrap(), Ordering::Equal);
        prop_assert_eq!(
            s.sort.compare(&ta, &tb).unwrap(),
            s.sort.compare(&tb, &ta).unwrap().reverse()
        );
    }

    #[test]
    fn group_order_is_a_prefix_of_sort_order(a in row(), b in row()) {
        let s = stack(wide_config());
        let (ta, tb) = (tuple(&s, &a), tuple(&s, &b));
        let group = s.sort.group_comparator().compare(&ta, &tb).unwrap();
        let sort = s.sort.compare(&ta, &tb).unwrap();
        if group != Ordering::Equal {
            prop_assert_eq!(group, sort);
        }
        if sort == Ordering::Equal {
            prop_assert_eq!(group, Ordering::Equal);
        }
    }

    #[test]
    fn sorting_records_matches_sorting_tuples(rows in prop::collection::vec(row(), 0..40)) {
        let s = stack(wide_config());
        let tuples: Vec<Tuple> = rows.iter().map(|r| tuple(&s, r)).collect();

        let mut by_value = tuples.clone();
        by_value.sort_by(|x, y| s.sort.compare(x, y).unwrap());

        let mut records: Vec<Vec<u8>> =
            tuples.iter().map(|t| s.serializer.to_bytes(t).unwrap()).collect();
        records.sort_by(|x, y| s.sort.compare_bytes(x, y).unwrap());
        let by_bytes: Vec<Tuple> =
            records.iter().map(|r| s.deserializer.deserialize(r).unwrap()).collect();

        for (x, y) in by_value.iter().zip(&by_bytes) {
            prop_assert_eq!(s.sort.compare(x, y).unwrap(), Ordering::Equal);
        }
    }
}

#[test]
fn rows_of_different_sources_never_compare_equal() {
    let s = stack(wide_config());
    let r = Row {
        from_a: true,
        url: "a".into(),
        n: 1,
        score: 0.5,
        flag: true,
        level: 2,
        extra: 0,
        tag: String::new(),
        ratio: 0.0,
    };
    let ta = tuple(&s, &r);
    let tb = tuple(&s, &Row { from_a: false, ..r });
    assert_eq!(s.sort.compare(&ta, &tb).unwrap(), Ordering::Less);
    assert_eq!(
        s.sort.group_comparator().compare(&ta, &tb).unwrap(),
        Ordering::Equal
    );
}

#[test]
fn custom_comparator_is_used_on_both_paths() {
    let comparators = ComparatorRegistry::new().with("ci", |a: &Value, b: &Value| {
        let (a, b) = (a.as_str().unwrap_or(""), b.as_str().unwrap_or(""));
        a.to_lowercase().cmp(&b.to_lowercase())
    });
    let config = GroupingConfig::new()
        .with_source(VISITS, Schema::parse("a", "name:string, n:int").unwrap())
        .with_order_by(
            SortSpec::new()
                .add_with_comparator("name", Order::Asc, "ci")
                .add("n", Order::Desc),
        )
        .with_group_by(["name"]);
    let s = stack_with(config, &comparators);
    let schema = schema_of(&s.plan, VISITS);
    let t = |name: &str, n: i32| {
        Tuple::from_values(schema.clone(), vec![name.into(), Value::Int32(n)]).unwrap()
    };

    let cases = [
        (t("Abc", 1), t("abc", 2), Ordering::Greater),
        (t("abc", 2), t("ABD", 9), Ordering::Less),
        (t("b", 1), t("A", 1), Ordering::Greater),
    ];
    for (x, y, expected) in cases {
        let bx = s.serializer.to_bytes(&x).unwrap();
        let by = s.serializer.to_bytes(&y).unwrap();
        assert_eq!(s.sort.compare(&x, &y).unwrap(), expected);
        assert_eq!(s.sort.compare_bytes(&bx, &by).unwrap(), expected);
    }
    let group = s.sort.group_comparator();
    assert!(group.field_eq(0, &"MiXeD".into(), &"mixed".into()).unwrap());
}
