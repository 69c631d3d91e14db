//! Core data model: endpoint definitions, load shapes, and scenarios.
//!
//! Everything here is immutable once the catalog is built. Dynamic values
//! (randomized search queries, generated registration bodies) are expressed
//! as generator closures resolved per call with the worker's own rng, so each
//! iteration gets fresh values and seeded runs stay reproducible.

use rand::rngs::StdRng;
use rand::Rng;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub type PathFn = Arc<dyn Fn(&mut StdRng) -> String + Send + Sync>;
pub type BodyFn = Arc<dyn Fn(&mut StdRng) -> Value + Send + Sync>;

/// A request path, either fixed or produced fresh per call.
#[derive(Clone)]
pub enum PathSpec {
    Literal(String),
    Generated(PathFn),
}

impl PathSpec {
    pub fn resolve(&self, rng: &mut StdRng) -> String {
        match self {
            PathSpec::Literal(path) => path.clone(),
            PathSpec::Generated(f) => f(rng),
        }
    }
}

impl fmt::Debug for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSpec::Literal(path) => write!(f, "PathSpec::Literal({path:?})"),
            PathSpec::Generated(_) => write!(f, "PathSpec::Generated(..)"),
        }
    }
}

/// A request body, either fixed or produced fresh per call.
#[derive(Clone)]
pub enum BodySpec {
    Literal(Value),
    Generated(BodyFn),
}

impl BodySpec {
    pub fn resolve(&self, rng: &mut StdRng) -> Value {
        match self {
            BodySpec::Literal(v) => v.clone(),
            BodySpec::Generated(f) => f(rng),
        }
    }
}

impl fmt::Debug for BodySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodySpec::Literal(v) => write!(f, "BodySpec::Literal({v})"),
            BodySpec::Generated(_) => write!(f, "BodySpec::Generated(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

/// One target endpoint as listed in the catalog. Immutable, loaded once.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub path: PathSpec,
    pub method: Method,
    pub body: Option<BodySpec>,
    pub headers: Vec<(&'static str, String)>,
}

impl Endpoint {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: PathSpec::Literal(path.into()),
            method: Method::Get,
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn get_generated(f: impl Fn(&mut StdRng) -> String + Send + Sync + 'static) -> Self {
        Self {
            path: PathSpec::Generated(Arc::new(f)),
            method: Method::Get,
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            path: PathSpec::Literal(path.into()),
            method: Method::Post,
            body: Some(BodySpec::Literal(body)),
            headers: Vec::new(),
        }
    }

    pub fn post_generated(
        path: impl Into<String>,
        f: impl Fn(&mut StdRng) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            path: PathSpec::Literal(path.into()),
            method: Method::Post,
            body: Some(BodySpec::Generated(Arc::new(f))),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Resolve generator fields into a concrete request. Called once per
    /// invocation, never ahead of time.
    pub fn resolve(&self, rng: &mut StdRng) -> EndpointRequest {
        EndpointRequest {
            path: self.path.resolve(rng),
            method: self.method,
            body: self.body.as_ref().map(|b| b.resolve(rng)),
            headers: self.headers.clone(),
        }
    }
}

/// A fully resolved request, ready for the invoker.
#[derive(Debug, Clone)]
pub struct EndpointRequest {
    pub path: String,
    pub method: Method,
    pub body: Option<Value>,
    pub headers: Vec<(&'static str, String)>,
}

/// Randomized pause between a virtual user's actions, drawn uniformly from
/// `[min_ms, max_ms]` per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkTime {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl ThinkTime {
    pub const NONE: ThinkTime = ThinkTime { min_ms: 0, max_ms: 0 };

    pub fn range(min_ms: u64, max_ms: u64) -> Self {
        debug_assert!(min_ms <= max_ms);
        Self { min_ms, max_ms }
    }

    pub fn sample(&self, rng: &mut StdRng) -> Duration {
        if self.max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms))
    }
}

/// One step of a concurrency ramp: hold `target_vus` live workers for
/// `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub target_vus: usize,
    pub duration: Duration,
}

impl Stage {
    pub fn new(target_vus: usize, duration: Duration) -> Self {
        Self { target_vus, duration }
    }
}

/// What each virtual user does on every iteration.
#[derive(Debug, Clone)]
pub enum Workload {
    /// Hit a uniformly-random endpoint from the set.
    Endpoints(Arc<Vec<Endpoint>>),
    /// Run one scripted multi-step session.
    Journey(Journey),
}

/// Scripted sessions. See `engine::journey` for the step sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Journey {
    /// Browse → maybe search → episode list → watch 1-3 episodes.
    Viewer,
    /// Check username → register → login → plans → referral → browse → watch.
    Onboarding,
}

/// Whether the run holds a flat worker count or ramps through stages.
#[derive(Debug, Clone)]
pub enum LoadShape {
    Flat { duration: Duration },
    Ramp { stages: Vec<Stage> },
}

impl LoadShape {
    /// Total wall-clock length of the run; for ramps, the sum of stage
    /// durations.
    pub fn total_duration(&self) -> Duration {
        match self {
            LoadShape::Flat { duration } => *duration,
            LoadShape::Ramp { stages } => stages.iter().map(|s| s.duration).sum(),
        }
    }

    /// Peak concurrency the shape reaches, used for report metadata.
    pub fn peak_vus(&self, default_vus: usize) -> usize {
        match self {
            LoadShape::Flat { .. } => default_vus,
            LoadShape::Ramp { stages } => {
                stages.iter().map(|s| s.target_vus).max().unwrap_or(default_vus)
            }
        }
    }
}

/// A runnable scenario preset: what to hit, how many users, for how long.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub id: &'static str,
    pub workload: Workload,
    pub default_vus: usize,
    pub shape: LoadShape,
    pub think_time: ThinkTime,
}
