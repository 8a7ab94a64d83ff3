use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::provider::RuntimeProvider;
use crate::sections::{
    ClassLoadingSection, MemorySection, RuntimeSection, Section, ThreadDetail, ThreadSection,
};

pub const DEFAULT_STACK_TRACE_DEPTH: usize = 5;

/// Accumulates one snapshot document, one key per [`Section`].
///
/// Each `add_*` call reads the provider and inserts its section, replacing any
/// earlier value for the same key in place.
///
/// ```no_run
/// use rtsnap::builder::SnapshotBuilder;
/// use rtsnap::system::host::HostProvider;
///
/// # fn main() -> rtsnap::error::Result<()> {
/// let mut builder = SnapshotBuilder::new(HostProvider::current()?);
/// builder.add_runtime_section()?.add_memory_section()?;
/// println!("{}", builder.render_pretty()?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SnapshotBuilder<P> {
    provider: P,
    document: Map<String, Value>,
}

impl<P: RuntimeProvider> SnapshotBuilder<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            document: Map::new(),
        }
    }

    /// Memory with pools, runtime, threads at `stack_trace_depth`, then class loading.
    pub fn full(provider: P, stack_trace_depth: usize) -> Result<Self> {
        let mut builder = Self::new(provider);
        builder
            .add_memory_section_with_pools(true)?
            .add_runtime_section()?
            .add_thread_section_with_depth(stack_trace_depth)?
            .add_class_loading_section()?;
        Ok(builder)
    }

    pub fn full_without_stacks(provider: P) -> Result<Self> {
        Self::full(provider, 0)
    }

    pub fn add_runtime_section(&mut self) -> Result<&mut Self> {
        let _span = tracing::debug_span!("builder.add_runtime_section").entered();

        let identity = self.provider.process_identity()?;
        let section = RuntimeSection::from_identity(identity, self.provider.path_separator());
        self.insert(Section::Runtime, &section)
    }

    pub fn add_thread_section(&mut self) -> Result<&mut Self> {
        self.add_thread_section_with_depth(DEFAULT_STACK_TRACE_DEPTH)
    }

    /// Threads with capability flags and up to `stack_trace_depth` frames each.
    /// A depth of 0 keeps an empty `stack-trace` array on every thread.
    pub fn add_thread_section_with_depth(&mut self, stack_trace_depth: usize) -> Result<&mut Self> {
        self.add_threads(ThreadDetail::Extended { stack_trace_depth })
    }

    /// Threads without capability flags or stack traces.
    pub fn add_thread_summary_section(&mut self) -> Result<&mut Self> {
        self.add_threads(ThreadDetail::Summary)
    }

    fn add_threads(&mut self, detail: ThreadDetail) -> Result<&mut Self> {
        let depth = detail.stack_trace_depth();
        let _span = tracing::debug_span!("builder.add_thread_section", depth).entered();

        let ids = self.provider.thread_ids()?;
        let snapshots = self.provider.thread_snapshots(&ids, depth)?;
        if snapshots.len() < ids.len() {
            tracing::debug!(
                enumerated = ids.len(),
                captured = snapshots.len(),
                "threads ended during scan"
            );
        }
        let counters = self.provider.thread_counters()?;
        let section = ThreadSection::new(counters, snapshots, detail);
        self.insert(Section::Thread, &section)
    }

    pub fn add_memory_section(&mut self) -> Result<&mut Self> {
        self.add_memory_section_with_pools(false)
    }

    pub fn add_memory_section_with_pools(&mut self, include_pools: bool) -> Result<&mut Self> {
        let _span = tracing::debug_span!("builder.add_memory_section", include_pools).entered();

        let readings = self.provider.memory_readings(include_pools)?;
        let section = MemorySection::new(readings.heap, readings.non_heap, readings.pools);
        self.insert(Section::Memory, &section)
    }

    pub fn add_class_loading_section(&mut self) -> Result<&mut Self> {
        let _span = tracing::debug_span!("builder.add_class_loading_section").entered();

        let counters = self.provider.class_loading()?;
        self.insert(Section::ClassLoading, &ClassLoadingSection::from(counters))
    }

    fn insert<T: Serialize>(&mut self, section: Section, value: &T) -> Result<&mut Self> {
        let value = serde_json::to_value(value)?;
        let replaced = self
            .document
            .insert(section.key().to_string(), value)
            .is_some();
        tracing::debug!(section = section.key(), replaced, "section added");
        Ok(self)
    }
}

impl<P> SnapshotBuilder<P> {
    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }

    pub fn into_document(self) -> Value {
        Value::Object(self.document)
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn render_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.document)?)
    }

    pub fn render_compact(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.document)?)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use serde_json::json;

    use super::*;
    use crate::error::SnapshotError;
    use crate::provider::fake::FakeProvider;
    use crate::provider::{
        ClassLoadingCounters, MemoryPool, MemoryReadings, MemoryUsage, ProcessIdentity,
        ThreadCounters, ThreadSnapshot, ThreadState, UNDEFINED,
    };

    /// Only answers memory reads through `memory_readings`, and counts them.
    struct CombinedMemoryOnly {
        inner: FakeProvider,
        reads: Cell<u32>,
    }

    impl CombinedMemoryOnly {
        fn split_read() -> Result<()> {
            Err(SnapshotError::Unavailable("split memory read".to_string()))
        }
    }

    impl RuntimeProvider for CombinedMemoryOnly {
        fn process_identity(&self) -> Result<ProcessIdentity> {
            self.inner.process_identity()
        }

        fn thread_ids(&self) -> Result<Vec<u64>> {
            self.inner.thread_ids()
        }

        fn thread_snapshots(&self, ids: &[u64], max_depth: usize) -> Result<Vec<ThreadSnapshot>> {
            self.inner.thread_snapshots(ids, max_depth)
        }

        fn thread_counters(&self) -> Result<ThreadCounters> {
            self.inner.thread_counters()
        }

        fn heap_usage(&self) -> Result<MemoryUsage> {
            Self::split_read()?;
            self.inner.heap_usage()
        }

        fn non_heap_usage(&self) -> Result<MemoryUsage> {
            Self::split_read()?;
            self.inner.non_heap_usage()
        }

        fn memory_pools(&self) -> Result<Vec<MemoryPool>> {
            Self::split_read()?;
            self.inner.memory_pools()
        }

        fn memory_readings(&self, include_pools: bool) -> Result<MemoryReadings> {
            self.reads.set(self.reads.get() + 1);
            self.inner.memory_readings(include_pools)
        }

        fn class_loading(&self) -> Result<ClassLoadingCounters> {
            self.inner.class_loading()
        }
    }

    fn keys<P>(builder: &SnapshotBuilder<P>) -> Vec<&str> {
        builder.document().keys().map(String::as_str).collect()
    }

    #[test]
    fn empty_builder_renders_empty_object() {
        let builder = SnapshotBuilder::new(FakeProvider::new());
        assert_eq!(builder.render_compact().unwrap(), "{}");
        assert_eq!(builder.render_pretty().unwrap(), "{}");
    }

    #[test]
    fn class_loading_only_compact() {
        let provider = FakeProvider::new().with_class_loading(100, 120, 20);
        let mut builder = SnapshotBuilder::new(provider);
        builder.add_class_loading_section().unwrap();
        assert_eq!(
            builder.render_compact().unwrap(),
            r#"{"class-loading":{"loaded-classes":100,"total-loaded-classes":120,"unloaded-classes":20}}"#
        );
    }

    #[test]
    fn depth_zero_keeps_empty_stack_trace() {
        let main = ThreadSnapshot {
            name: "main".to_string(),
            id: 1,
            blocked_count: 2,
            blocked_time: UNDEFINED,
            waited_count: 5,
            waited_time: UNDEFINED,
            state: ThreadState::Waiting,
            stack_trace: FakeProvider::sample().threads[0].stack_trace.clone(),
        };
        let mut builder = SnapshotBuilder::new(FakeProvider::new().with_threads(vec![main]));
        builder.add_thread_section_with_depth(0).unwrap();

        let threads = &builder.document()["thread"]["threads"];
        assert_eq!(
            threads,
            &json!([{
                "name": "main",
                "id": 1,
                "blocked-count": 2,
                "blocked-time": -1,
                "waited-count": 5,
                "waited-time": -1,
                "state": "WAITING",
                "stack-trace": []
            }])
        );
    }

    #[test]
    fn default_thread_section_uses_five_frames() {
        let mut main = FakeProvider::sample().threads[0].clone();
        let template = main.stack_trace[1].clone();
        main.stack_trace = vec![template; 8];
        let mut builder = SnapshotBuilder::new(FakeProvider::sample().with_threads(vec![main]));
        builder.add_thread_section().unwrap();

        let trace = builder.document()["thread"]["threads"][0]["stack-trace"]
            .as_array()
            .unwrap();
        assert_eq!(trace.len(), DEFAULT_STACK_TRACE_DEPTH);
    }

    #[test]
    fn re_adding_replaces_in_place() {
        let mut builder = SnapshotBuilder::new(FakeProvider::sample());
        builder
            .add_memory_section_with_pools(true)
            .unwrap()
            .add_runtime_section()
            .unwrap()
            .add_memory_section()
            .unwrap();

        assert_eq!(keys(&builder), vec!["memory", "runtime"]);
        assert!(builder.document()["memory"]["heap"].get("pools").is_none());
    }

    #[test]
    fn summary_then_extended_leaves_latest() {
        let mut builder = SnapshotBuilder::new(FakeProvider::sample());
        builder
            .add_thread_section_with_depth(3)
            .unwrap()
            .add_thread_summary_section()
            .unwrap();

        let thread = &builder.document()["thread"];
        assert!(thread.get("thread-cpu-time-enabled").is_none());
        assert!(thread["threads"][0].get("stack-trace").is_none());
        assert_eq!(builder.document().len(), 1);
    }

    #[test]
    fn full_adds_sections_in_fixed_order() {
        let builder = SnapshotBuilder::full(FakeProvider::sample(), 0).unwrap();
        assert_eq!(
            keys(&builder),
            vec!["memory", "runtime", "thread", "class-loading"]
        );
        let memory = &builder.document()["memory"];
        assert!(memory["heap"]["pools"].is_array());
        assert!(memory["non-heap"]["pools"].is_array());
    }

    #[test]
    fn full_without_stacks_has_empty_traces() {
        let builder = SnapshotBuilder::full_without_stacks(FakeProvider::sample()).unwrap();
        for thread in builder.document()["thread"]["threads"].as_array().unwrap() {
            assert_eq!(thread["stack-trace"], json!([]));
        }
    }

    #[test]
    fn provider_failure_is_surfaced_and_keeps_prior_sections() {
        let provider = FakeProvider::sample().unavailable(Section::Thread);
        let mut builder = SnapshotBuilder::new(provider);
        builder.add_runtime_section().unwrap();

        let err = builder.add_thread_section().unwrap_err();
        assert!(matches!(err, SnapshotError::Unavailable(_)));
        assert_eq!(keys(&builder), vec!["runtime"]);
    }

    #[test]
    fn full_fails_when_any_section_is_unavailable() {
        let provider = FakeProvider::sample().unavailable(Section::ClassLoading);
        assert!(SnapshotBuilder::full(provider, 2).is_err());
    }

    #[test]
    fn borrowed_provider_is_accepted() {
        let provider = FakeProvider::sample();
        let mut builder = SnapshotBuilder::new(&provider);
        builder.add_runtime_section().unwrap();
        assert_eq!(
            builder.document()["runtime"]["classpath"],
            json!(["/usr/local/bin", "/usr/bin"])
        );
    }

    #[test]
    fn memory_section_takes_one_combined_reading() {
        let provider = CombinedMemoryOnly {
            inner: FakeProvider::sample(),
            reads: Cell::new(0),
        };
        let mut builder = SnapshotBuilder::new(&provider);
        builder.add_memory_section_with_pools(true).unwrap();
        assert_eq!(provider.reads.get(), 1);
        assert_eq!(
            builder.document()["memory"]["heap"]["pools"][0]["name"],
            json!("[heap]")
        );

        builder.add_memory_section().unwrap();
        assert_eq!(provider.reads.get(), 2);
        assert!(builder.document()["memory"]["heap"].get("pools").is_none());
    }

    #[test]
    fn into_document_returns_object() {
        let mut builder = SnapshotBuilder::new(FakeProvider::sample());
        builder.add_class_loading_section().unwrap();
        let doc = builder.into_document();
        assert_eq!(doc["class-loading"]["unloaded-classes"], json!(20));
    }
}
