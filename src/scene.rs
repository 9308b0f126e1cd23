//! Linear, step-indexed conversation flows.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use crate::bot::{boxed_handler, Ctx, Handler, HandlerResult};

/// A named, ordered list of step handlers. Immutable once registered;
/// the per-user position inside a scene lives in the session, not here.
#[derive(Clone)]
pub struct Scene {
    id: String,
    steps: Vec<Handler>,
}

impl Scene {
    pub fn new(id: impl Into<String>) -> Self {
        Scene {
            id: id.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step. Steps run one per inbound update, in order, as the
    /// user calls `next()`.
    pub fn step<H, F>(mut self, handler: H) -> Self
    where
        H: Fn(Ctx) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.steps.push(boxed_handler(handler));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The handler at `index`, if the index is in range.
    pub fn step_at(&self, index: usize) -> Option<Handler> {
        self.steps.get(index).cloned()
    }
}

/// Scene id -> scene, shared read-only between the engine and every
/// per-update context.
pub(crate) type SceneRegistry = Arc<RwLock<HashMap<String, Scene>>>;

pub(crate) fn lookup_step(registry: &SceneRegistry, scene_id: &str, index: usize) -> Option<Handler> {
    let scenes = registry.read().unwrap();
    scenes.get(scene_id).and_then(|scene| scene.step_at(index))
}
