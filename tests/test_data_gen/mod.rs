//! Shared fixtures for the integration tests: schemas, deterministic tuple
//! generators, a ready-made codec/comparator stack and an event recorder.

#![allow(dead_code)]

use std::sync::Arc;

use cogroup_codec::{field_codec_for, FieldCodec, ObjectCodecs, TupleDeserializer, TupleSerializer};
use cogroup_core::config::GroupingConfig;
use cogroup_core::id::SourceId;
use cogroup_core::schema::Schema;
use cogroup_core::types::{Tuple, Value};
use cogroup_operators::{
    ComparatorRegistry, GroupElements, GroupHandler, GroupKey, HandlerResult, SortComparator,
};
use cogroup_planner::GroupingPlan;

pub const VISITS: SourceId = SourceId::new(0);
pub const FETCHES: SourceId = SourceId::new(1);

pub fn visits_schema() -> Schema {
    Schema::parse("visits", "url:string, date:int, visits:long").unwrap()
}

pub fn fetches_schema() -> Schema {
    Schema::parse("fetches", "fetched:long, url:string, size:double, ok:boolean").unwrap()
}

/// Two sources co-grouped by url, visits and fetches interleaved per url.
pub fn url_config() -> GroupingConfig {
    GroupingConfig::new()
        .with_source(VISITS, visits_schema())
        .with_source(FETCHES, fetches_schema())
        .with_group_by(["url"])
}

/// Linear congruential generator; enough for reproducible fixtures.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed ^ 0x9e37_79b9_7f4a_7c15)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 11
    }

    pub fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n.max(1)
    }
}

pub struct Stack {
    pub plan: Arc<GroupingPlan>,
    pub codec: Arc<FieldCodec>,
    pub serializer: TupleSerializer,
    pub deserializer: TupleDeserializer,
    pub sort: SortComparator,
}

pub fn stack(config: GroupingConfig) -> Stack {
    stack_with(config, &ComparatorRegistry::new())
}

pub fn stack_with(config: GroupingConfig, comparators: &ComparatorRegistry) -> Stack {
    let plan = Arc::new(GroupingPlan::build(config).unwrap());
    let codec = Arc::new(
        field_codec_for(&plan, Arc::new(ObjectCodecs::with_defaults()), 1 << 20).unwrap(),
    );
    Stack {
        serializer: TupleSerializer::new(plan.clone(), codec.clone()),
        deserializer: TupleDeserializer::new(plan.clone(), codec.clone()),
        sort: SortComparator::new(plan.clone(), codec.clone(), comparators).unwrap(),
        plan,
        codec,
    }
}

pub fn schema_of(plan: &GroupingPlan, id: SourceId) -> Arc<Schema> {
    plan.source(id).unwrap().schema.clone()
}

pub fn visit(plan: &GroupingPlan, url: &str, date: i32, visits: i64) -> Tuple {
    Tuple::from_values(
        schema_of(plan, VISITS),
        vec![url.into(), Value::Int32(date), Value::Int64(visits)],
    )
    .unwrap()
}

pub fn fetch(plan: &GroupingPlan, url: &str, fetched: i64, size: f64, ok: bool) -> Tuple {
    Tuple::from_values(
        schema_of(plan, FETCHES),
        vec![Value::Int64(fetched), url.into(), Value::Float64(size), Value::Bool(ok)],
    )
    .unwrap()
}

/// `n` visits and fetches over `urls` distinct urls, in generation order.
pub fn generate_mixed(plan: &GroupingPlan, n: usize, urls: u64, seed: u64) -> Vec<Tuple> {
    let mut rng = Lcg::new(seed);
    (0..n)
        .map(|_| {
            let url = format!("site{}.example/p{}", rng.below(urls), rng.below(3));
            if rng.below(2) == 0 {
                visit(
                    plan,
                    &url,
                    rng.below(30) as i32 - 15,
                    rng.next_u64() as i64 - (1 << 52),
                )
            } else {
                let size = (rng.below(20_000) as f64 - 10_000.0) / 7.0;
                fetch(plan, &url, rng.next_u64() as i64, size, rng.below(2) == 0)
            }
        })
        .collect()
}

/// Records every callback as a short string.
#[derive(Default)]
pub struct Recorder {
    pub events: Vec<String>,
    /// Read at most this many elements per group.
    pub read_limit: Option<usize>,
}

impl GroupHandler for Recorder {
    fn on_open_group(&mut self, depth: usize, field: &str, key: &GroupKey) -> HandlerResult {
        self.events
            .push(format!("open {depth} {field}={}", key.get(depth).unwrap()));
        Ok(())
    }

    fn on_close_group(&mut self, depth: usize, field: &str, key: &GroupKey) -> HandlerResult {
        self.events
            .push(format!("close {depth} {field}={}", key.get(depth).unwrap()));
        Ok(())
    }

    fn on_group_elements(
        &mut self,
        key: &GroupKey,
        elements: &mut GroupElements<'_>,
    ) -> HandlerResult {
        let limit = self.read_limit.unwrap_or(usize::MAX);
        let mut seen = Vec::new();
        for t in elements.take(limit) {
            let t = t?;
            seen.push(t.values().last().map(|v| v.to_string()).unwrap_or_default());
        }
        self.events.push(format!("leaf {key} [{}]", seen.join(",")));
        Ok(())
    }
}
