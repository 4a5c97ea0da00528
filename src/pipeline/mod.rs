//! Pipeline ownership and wiring.
//!
//! Links between stages are non-owning, so something has to keep every stage
//! alive while values (and asynchronous continuations) are still moving. A
//! [`Pipeline`] is that owner: it holds a strong reference to each stage it
//! has seen and records the links made through it.
//!
//! ```rust
//! use pushflow::elements::{Collect, Map, Values};
//! use pushflow::pipeline::Pipeline;
//!
//! let mut pipeline = Pipeline::new().with_name("doubler");
//! let src = pipeline.add(Values::new(vec![1, 2, 3]));
//! let double = pipeline.add(Map::new(|x: i32| x * 2));
//! let (sink, mut done) = Collect::channel();
//! let sink = pipeline.add(sink);
//!
//! pipeline.link(&src, &double).unwrap();
//! pipeline.link(&double, &sink).unwrap();
//!
//! assert_eq!(pipeline.to_string(), "values ! map ! collect");
//! let items = done.try_recv().unwrap().unwrap().into_result().unwrap();
//! assert_eq!(items, vec![2, 4, 6]);
//! ```

mod graph;

pub use graph::{Pipeline, StageId};
