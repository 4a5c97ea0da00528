//! The pipeline owner.

use crate::element::{Sink, Source, Stage, StageKind};
use crate::error::Result;
use crate::link;
use crate::observability::{TracingConfig, span_link, span_pipeline};
use std::fmt;
use std::rc::Rc;

/// Unique identifier for a stage within a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(usize);

impl StageId {
    /// Get the index of this stage in insertion order.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Owns the stages of one or more linked chains.
///
/// Dropping the pipeline drops every stage it owns; a pending asynchronous
/// operation whose stage is gone is discarded.
pub struct Pipeline {
    name: String,
    stages: Vec<Rc<dyn Stage>>,
    links: Vec<(StageId, StageId)>,
    tracing: TracingConfig,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self {
            name: "pipeline".to_string(),
            stages: Vec::new(),
            links: Vec::new(),
            tracing: TracingConfig::default(),
        }
    }

    /// Set a custom name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the tracing configuration.
    pub fn with_tracing(mut self, config: TracingConfig) -> Self {
        self.tracing = config;
        self
    }

    /// Get the pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take ownership of a stage.
    pub fn add<S: Stage + 'static>(&mut self, stage: S) -> Rc<S> {
        let stage = Rc::new(stage);
        self.adopt(&stage);
        stage
    }

    /// Share ownership of a stage created elsewhere.
    ///
    /// Adopting the same stage twice returns the existing id.
    pub fn adopt<S: Stage + 'static>(&mut self, stage: &Rc<S>) -> StageId {
        if let Some(id) = self.id_of(stage) {
            return id;
        }
        let id = StageId(self.stages.len());
        let erased: Rc<dyn Stage> = Rc::clone(stage) as Rc<dyn Stage>;
        self.stages.push(erased);
        id
    }

    /// Look up the id of a stage owned by this pipeline.
    pub fn id_of<S: Stage + 'static>(&self, stage: &Rc<S>) -> Option<StageId> {
        let target = Rc::as_ptr(stage).cast::<()>();
        self.stages
            .iter()
            .position(|s| Rc::as_ptr(s).cast::<()>() == target)
            .map(StageId)
    }

    /// Link two stages, taking shared ownership of both.
    ///
    /// See [`link::link`] for the protocol. On error nothing is linked, but
    /// both stages stay owned by the pipeline.
    pub fn link<T, S, K>(&mut self, source: &Rc<S>, sink: &Rc<K>) -> Result<Rc<K>>
    where
        T: 'static,
        S: Source<T> + 'static,
        K: Sink<T> + 'static,
    {
        let from = self.adopt(source);
        let to = self.adopt(sink);

        let _pipeline = self
            .tracing
            .pipeline_spans
            .then(|| span_pipeline(&self.name).entered());
        let _link = self
            .tracing
            .link_spans
            .then(|| span_link(source.name(), source.kind(), sink.name(), sink.kind()).entered());

        let linked = link::link(source, sink)?;
        self.links.push((from, to));
        Ok(linked)
    }

    /// Get the number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Check if the pipeline owns no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Iterate over `(id, name, kind)` for every stage.
    pub fn stages(&self) -> impl Iterator<Item = (StageId, &str, StageKind)> + '_ {
        self.stages
            .iter()
            .enumerate()
            .map(|(i, s)| (StageId(i), s.name(), s.kind()))
    }

    /// Get the links made through this pipeline, in order.
    pub fn links(&self) -> &[(StageId, StageId)] {
        &self.links
    }

    /// Get the stages with no upstream link.
    pub fn heads(&self) -> Vec<StageId> {
        (0..self.stages.len())
            .map(StageId)
            .filter(|id| !self.links.iter().any(|(_, to)| to == id))
            .collect()
    }

    fn downstream_of(&self, id: StageId) -> Option<StageId> {
        self.links
            .iter()
            .find(|(from, _)| *from == id)
            .map(|(_, to)| *to)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes each chain as `a ! b ! c`, chains separated by `; `.
impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, head) in self.heads().into_iter().enumerate() {
            if n > 0 {
                f.write_str("; ")?;
            }
            f.write_str(self.stages[head.0].name())?;
            let mut current = head;
            // A chain is at most as long as the stage list.
            for _ in 0..self.stages.len() {
                let Some(next) = self.downstream_of(current) else {
                    break;
                };
                write!(f, " ! {}", self.stages[next.0].name())?;
                current = next;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stages.len())
            .field("links", &self.links.len())
            .finish()
    }
}
