//! End-to-end runs through the local runner

mod test_data_gen;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use cogroup_codec::ObjectCodecs;
use cogroup_core::config::{GroupingConfig, RuntimeConfig};
use cogroup_core::error::Error;
use cogroup_core::id::SourceId;
use cogroup_core::schema::Schema;
use cogroup_core::sort::{Order, SortSpec};
use cogroup_core::types::{Tuple, Value};
use cogroup_exec::{ExecError, LocalRunner};
use cogroup_operators::{
    ComparatorRegistry, GroupElements, GroupHandler, GroupKey, HandlerResult, Registry,
};
use test_data_gen::{fetch, generate_mixed, url_config, visit, visits_schema, Recorder, FETCHES, VISITS};

fn runner(config: GroupingConfig, partitions: usize) -> LocalRunner {
    LocalRunner::new(
        config,
        RuntimeConfig::default().with_partitions(partitions),
        &ComparatorRegistry::new(),
        ObjectCodecs::with_defaults(),
        Registry::new(),
    )
    .unwrap()
}

/// Per url: sources in arrival order and the total of `visits`.
#[derive(Default)]
struct PerUrl {
    seen: BTreeMap<String, (Vec<String>, i64)>,
}

impl GroupHandler for PerUrl {
    fn on_group_elements(&mut self, key: &GroupKey, elements: &mut GroupElements<'_>) -> HandlerResult {
        let url = key.get_by_name("url").map(|v| v.to_string()).unwrap_or_default();
        let entry = self.seen.entry(url).or_default();
        for t in elements {
            let t = t?;
            entry.0.push(t.schema().name.clone());
            if let Some(Value::Int64(v)) = t.get_by_name("visits") {
                entry.1 = entry.1.wrapping_add(*v);
            }
        }
        Ok(())
    }
}

#[test]
fn cogroup_visits_and_fetches_by_url() {
    let r = runner(url_config(), 1);
    let plan = r.plan().clone();
    let input = vec![
        fetch(&plan, "b.org", 3, 1.0, true),
        visit(&plan, "a.org", 1, 5),
        fetch(&plan, "a.org", 9, 2.5, false),
        visit(&plan, "b.org", 2, -7),
        visit(&plan, "a.org", 2, 1),
    ];
    let mut h = PerUrl::default();
    let summary = r.run_into(input, &mut h).unwrap();

    assert_eq!(summary.groups(), 2);
    assert_eq!(
        h.seen["a.org"],
        (vec!["visits".into(), "visits".into(), "fetches".into()], 6)
    );
    assert_eq!(h.seen["b.org"], (vec!["visits".into(), "fetches".into()], -7));
}

#[test]
fn generated_input_matches_a_direct_count() {
    let r = runner(url_config(), 4);
    let input = generate_mixed(&r.plan().clone(), 600, 25, 42);

    let mut expected: BTreeMap<String, usize> = BTreeMap::new();
    for t in &input {
        let url = t.get_by_name("url").unwrap().to_string();
        *expected.entry(url).or_default() += 1;
    }

    let mut h = PerUrl::default();
    let summary = r.run_into(input, &mut h).unwrap();
    assert_eq!(summary.records, 600);
    assert_eq!(summary.groups() as usize, expected.len());
    for (url, n) in expected {
        let (sources, _) = &h.seen[&url];
        assert_eq!(sources.len(), n);
        // visits (source 0) before fetches (source 1) inside every group
        let first_fetch = sources.iter().position(|s| s == "fetches").unwrap_or(sources.len());
        assert!(sources[first_fetch..].iter().all(|s| s == "fetches"));
    }
}

#[test]
fn negative_keys_sort_numerically() {
    let config = GroupingConfig::new()
        .with_source(VISITS, visits_schema())
        .with_order_by(SortSpec::new().add("date", Order::Asc).add("url", Order::Asc))
        .with_group_by(["date"]);
    let r = runner(config, 1);
    let plan = r.plan().clone();
    let dates = [5, -1, 0, i32::MIN, -300, 127, 128, i32::MAX, -128];
    let input: Vec<Tuple> = dates.iter().map(|d| visit(&plan, "x", *d, 0)).collect();

    let mut rec = Recorder::default();
    r.run_into(input, &mut rec).unwrap();
    let opened: Vec<i32> = rec
        .events
        .iter()
        .filter_map(|e| e.strip_prefix("open 0 date="))
        .map(|d| d.parse().unwrap())
        .collect();
    let mut sorted = dates.to_vec();
    sorted.sort();
    assert_eq!(opened, sorted);
}

#[test]
fn rollup_prefix_decides_partitions() {
    let config = GroupingConfig::new()
        .with_source(VISITS, visits_schema())
        .with_group_by(["url", "date"])
        .with_rollup_from("url");
    let r = runner(config, 3);
    let plan = r.plan().clone();
    let input: Vec<Tuple> = (0..60)
        .map(|i| visit(&plan, &format!("u{}", i % 6), i % 4, i64::from(i)))
        .collect();

    let opened_urls = Arc::new(Mutex::new(Vec::new()));
    let summary = r
        .run_with(input, |_| {
            struct Urls(Arc<Mutex<Vec<String>>>);
            impl GroupHandler for Urls {
                fn on_open_group(&mut self, depth: usize, _: &str, key: &GroupKey) -> HandlerResult {
                    if depth == 0 {
                        self.0.lock().unwrap().push(key.get(0).unwrap().to_string());
                    }
                    Ok(())
                }
                fn on_group_elements(&mut self, _: &GroupKey, _: &mut GroupElements<'_>) -> HandlerResult {
                    Ok(())
                }
            }
            Ok(Box::new(Urls(opened_urls.clone())) as Box<dyn GroupHandler>)
        })
        .unwrap();

    // each url opens exactly once over all partitions
    let mut urls = opened_urls.lock().unwrap().clone();
    urls.sort();
    assert_eq!(urls, vec!["u0", "u1", "u2", "u3", "u4", "u5"]);
    assert_eq!(summary.groups(), 12);
}

#[test]
fn tuple_of_unknown_schema_aborts_the_run() {
    let r = runner(url_config(), 1);
    let stray = Arc::new(Schema::parse("stray", "url:string").unwrap());
    let input = vec![Tuple::from_values(stray, vec!["a".into()]).unwrap()];
    let err = r.run_into(input, &mut Recorder::default()).unwrap_err();
    assert!(matches!(err, ExecError::Engine(Error::UnknownSource(_))));
}

#[test]
fn null_in_plain_field_aborts_the_run() {
    let r = runner(url_config(), 1);
    let mut t = Tuple::new(r.plan().source(VISITS).unwrap().schema.clone());
    t.set_by_name("url", "a").unwrap();
    t.set_by_name("date", 1).unwrap();
    let err = r.run_into(vec![t], &mut Recorder::default()).unwrap_err();
    assert!(matches!(err, ExecError::Engine(Error::NullNotAllowed(ref f)) if f == "visits"));
}

#[test]
fn configuration_errors_surface_before_any_record() {
    let config = GroupingConfig::new()
        .with_source(VISITS, Schema::parse("a", "url:string, n:long").unwrap())
        .with_source(FETCHES, Schema::parse("b", "url:string, n:int").unwrap())
        .with_order_by(SortSpec::parse("url, n").unwrap())
        .with_group_by(["url"]);
    let err = LocalRunner::new(
        config,
        RuntimeConfig::default(),
        &ComparatorRegistry::new(),
        ObjectCodecs::with_defaults(),
        Registry::new(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, ExecError::Engine(ref e) if e.is_config()));
}

#[test]
fn object_payloads_travel_with_the_record() {
    let config = GroupingConfig::new()
        .with_source(
            SourceId::new(3),
            Schema::parse("docs", "id:long, body:object<json>").unwrap(),
        )
        .with_group_by(["id"]);
    let r = runner(config, 1);
    let schema = r.plan().source(SourceId::new(3)).unwrap().schema.clone();
    let input = vec![
        Tuple::from_values(schema.clone(), vec![Value::Int64(2), Value::Null]).unwrap(),
        Tuple::from_values(
            schema,
            vec![Value::Int64(1), Value::Object(serde_json::json!({"k": [1, 2]}))],
        )
        .unwrap(),
    ];
    let mut rec = Recorder::default();
    r.run_into(input, &mut rec).unwrap();
    let leaves: Vec<_> = rec.events.iter().filter(|e| e.starts_with("leaf")).collect();
    assert_eq!(leaves, vec![r#"leaf (1) [{"k":[1,2]}]"#, "leaf (2) [null]"]);
}
