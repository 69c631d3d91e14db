//! Static catalog of target sources, endpoint sets, and scenario presets.
//!
//! Built once at startup and never mutated. The title ids below were pulled
//! from each provider's live trending/theaters API so detail and stream hits
//! exercise real cache paths instead of 404s.

use crate::domain::{
    Endpoint, Journey, LoadShape, Scenario, Stage, ThinkTime, Workload,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Referral code credited by the registration flow.
pub const REFERRAL_CODE: &str = "CY5DXWJP";

pub const SEARCH_QUERIES: &[&str] = &[
    "love", "drama", "romance", "action", "comedy", "thriller", "mystery",
    "family", "school", "revenge", "cinta", "mafia", "perselingkuhan", "CEO",
];

/// How a provider addresses a title in detail/stream URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    /// `?bookId=<id>&episode=<ep>` query parameters.
    Query,
    /// `/<id>/<ep>` path segments.
    Segment,
}

/// One upstream content provider proxied by the backend.
#[derive(Debug)]
pub struct Source {
    pub name: &'static str,
    home_kind: &'static str,
    search_param: &'static str,
    style: PathStyle,
    pub title_ids: &'static [&'static str],
}

impl Source {
    pub fn home(&self) -> String {
        format!("/api/{}/{}", self.name, self.home_kind)
    }

    pub fn search(&self, query: &str) -> String {
        format!("/api/{}/search?{}={}", self.name, self.search_param, query)
    }

    /// The title's full episode listing (`allstreams`).
    pub fn episode_list(&self, title_id: &str) -> String {
        match self.style {
            PathStyle::Query => format!("/api/{}/allstreams?bookId={}", self.name, title_id),
            PathStyle::Segment => format!("/api/{}/allstreams/{}", self.name, title_id),
        }
    }

    pub fn stream(&self, title_id: &str, episode: u32) -> String {
        match self.style {
            PathStyle::Query => format!(
                "/api/{}/stream?bookId={}&episode={}",
                self.name, title_id, episode
            ),
            PathStyle::Segment => {
                format!("/api/{}/stream/{}/{}", self.name, title_id, episode)
            }
        }
    }
}

pub const SOURCES: &[Source] = &[
    Source {
        name: "dramabox",
        home_kind: "trending",
        search_param: "query",
        style: PathStyle::Query,
        title_ids: &["42000005001", "42000004908", "42000003970", "42000000651", "42000004320"],
    },
    Source {
        name: "reelshort",
        home_kind: "homepage",
        search_param: "query",
        style: PathStyle::Segment,
        title_ids: &["6970dc9ecc387f98e7089003", "69718a0cbebc33de2800dff9", "698004f02593c82ff003e1b8"],
    },
    Source {
        name: "netshort",
        home_kind: "theaters",
        search_param: "query",
        style: PathStyle::Segment,
        title_ids: &["1997949622037180417", "1905132909649330177", "1995736036563972097"],
    },
    Source {
        name: "dramawave",
        home_kind: "home",
        search_param: "q",
        style: PathStyle::Segment,
        title_ids: &["3CYOPt1oEJ", "sBVbIpy0Hu", "kVh9qtHl4n"],
    },
    Source {
        name: "dotdrama",
        home_kind: "theaters",
        search_param: "q",
        style: PathStyle::Segment,
        title_ids: &["2020377573465849858", "2020676551784857602", "2021480354837684226"],
    },
    Source {
        name: "flickreels",
        home_kind: "theaters",
        search_param: "q",
        style: PathStyle::Segment,
        title_ids: &["3498", "499", "5381"],
    },
    Source {
        name: "goodshort",
        home_kind: "theaters",
        search_param: "q",
        style: PathStyle::Segment,
        title_ids: &["31001241758", "31001210540", "31001188126"],
    },
    Source {
        name: "idrama",
        home_kind: "theaters",
        search_param: "q",
        style: PathStyle::Segment,
        title_ids: &["161001640116", "161001640057", "160000640145"],
    },
    // shortmax is proxied but its theaters API returns no stable ids yet, so
    // only its homepage participates in random title picks.
    Source {
        name: "shortmax",
        home_kind: "theaters",
        search_param: "q",
        style: PathStyle::Segment,
        title_ids: &[],
    },
    Source {
        name: "velolo",
        home_kind: "theaters",
        search_param: "q",
        style: PathStyle::Segment,
        title_ids: &["2022580083738873856", "2006999931168559104", "2011352771877998592"],
    },
    Source {
        name: "melolo",
        home_kind: "theaters",
        search_param: "q",
        style: PathStyle::Segment,
        title_ids: &["7582509823137172485", "7582430701799083061", "7582154125387779077"],
    },
    Source {
        name: "bilitv",
        home_kind: "theaters",
        search_param: "q",
        style: PathStyle::Segment,
        title_ids: &["2457", "1881", "1877"],
    },
    Source {
        name: "stardusttv",
        home_kind: "theaters",
        search_param: "q",
        style: PathStyle::Segment,
        title_ids: &["16011", "14350", "14279"],
    },
    Source {
        name: "vigloo",
        home_kind: "theaters",
        search_param: "q",
        style: PathStyle::Segment,
        title_ids: &["15000826", "15000324", "15000728"],
    },
];

pub fn random_query(rng: &mut StdRng) -> &'static str {
    SEARCH_QUERIES.choose(rng).copied().unwrap_or("drama")
}

/// A random source that has known title ids, plus one of its titles.
pub fn random_title(rng: &mut StdRng) -> (&'static Source, &'static str) {
    let candidates: Vec<&Source> =
        SOURCES.iter().filter(|s| !s.title_ids.is_empty()).collect();
    let source = candidates.choose(rng).copied().expect("catalog has sources with titles");
    let id = source.title_ids.choose(rng).copied().expect("non-empty title set");
    (source, id)
}

fn generated_username(rng: &mut StdRng) -> String {
    format!("vu_{:08x}{:04x}", rng.gen::<u32>(), rng.gen::<u16>())
}

// ---------------------------------------------------------------------------
// Endpoint sets
// ---------------------------------------------------------------------------

/// Exactly what a user loading the homepage hits; all served from cache.
pub fn homepage_endpoints() -> Vec<Endpoint> {
    let mut eps = vec![
        Endpoint::get("/api/health"),
        Endpoint::get("/api/settings/ads"),
        Endpoint::get("/api/vip/plans"),
        Endpoint::get("/api/referral/settings"),
    ];
    eps.extend(SOURCES.iter().map(|s| Endpoint::get(s.home())));
    eps
}

/// Full public surface: homepage + search + episode lists + first streams
/// across all sources.
pub fn public_endpoints() -> Vec<Endpoint> {
    let mut eps = homepage_endpoints();
    eps.extend(search_endpoints());
    for source in SOURCES.iter().filter(|s| !s.title_ids.is_empty()) {
        for id in source.title_ids.iter().take(2) {
            eps.push(Endpoint::get(source.episode_list(id)));
        }
        eps.push(Endpoint::get(source.stream(source.title_ids[0], 1)));
    }
    eps
}

/// Search every source with a random query per call.
pub fn search_endpoints() -> Vec<Endpoint> {
    SOURCES
        .iter()
        .map(|source| {
            Endpoint::get_generated(move |rng| source.search(random_query(rng)))
        })
        .collect()
}

/// Hot cached endpoints, hit repeatedly to measure cache behavior.
pub fn cache_endpoints() -> Vec<Endpoint> {
    let mut eps: Vec<Endpoint> = SOURCES.iter().map(|s| Endpoint::get(s.home())).collect();
    eps.push(Endpoint::get("/api/vip/plans"));
    eps.push(Endpoint::get("/api/referral/settings"));
    eps.push(Endpoint::get("/api/settings/ads"));
    eps
}

pub fn auth_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::post(
            "/api/auth/login",
            json!({ "username": "stresstest", "password": "Test123!" }),
        ),
        Endpoint::post(
            "/api/auth/login",
            json!({ "username": "stresstest2", "password": "Test123!" }),
        ),
        Endpoint::get_generated(|rng| {
            format!("/api/auth/check-username?username={}", generated_username(rng))
        }),
        Endpoint::post_generated("/api/auth/register", |rng| {
            let username = generated_username(rng);
            json!({
                "username": &username,
                "password": "StressTest123!",
                "email": format!("{username}@stress.dev"),
                "referralCode": REFERRAL_CODE,
            })
        }),
    ]
}

/// VIP endpoints; the token is intentionally invalid, so status/history are
/// expected to come back 401/403.
pub fn vip_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::get("/api/vip/plans"),
        Endpoint::get("/api/vip/status").with_header("authorization", "Bearer stress_test_token"),
        Endpoint::get("/api/vip/history").with_header("authorization", "Bearer stress_test_token"),
    ]
}

pub fn referral_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::get("/api/referral/settings"),
        Endpoint::get(format!("/api/referral/lookup/{REFERRAL_CODE}")),
        Endpoint::get("/api/referral/me").with_header("authorization", "Bearer stress_test_token"),
    ]
}

// ---------------------------------------------------------------------------
// Scenario presets
// ---------------------------------------------------------------------------

/// The scenario catalog consumed by the orchestrator.
#[derive(Debug)]
pub struct Catalog {
    scenarios: Vec<Scenario>,
}

impl Catalog {
    pub fn builtin() -> Self {
        let secs = Duration::from_secs;
        let endpoints = |eps: Vec<Endpoint>| Workload::Endpoints(Arc::new(eps));
        let flat = |duration| LoadShape::Flat { duration };

        let scenarios = vec![
            Scenario {
                id: "quick",
                workload: endpoints(public_endpoints()),
                default_vus: 50,
                shape: flat(secs(30)),
                think_time: ThinkTime::range(250, 750),
            },
            Scenario {
                id: "load",
                workload: endpoints(public_endpoints()),
                default_vus: 500,
                shape: LoadShape::Ramp {
                    stages: vec![
                        Stage::new(100, secs(60)),
                        Stage::new(300, secs(120)),
                        Stage::new(500, secs(120)),
                        Stage::new(200, secs(60)),
                    ],
                },
                think_time: ThinkTime::range(100, 400),
            },
            Scenario {
                id: "stress",
                workload: endpoints(public_endpoints()),
                default_vus: 5000,
                shape: LoadShape::Ramp {
                    stages: vec![
                        Stage::new(1650, secs(60)),
                        Stage::new(2650, secs(60)),
                        Stage::new(3350, secs(60)),
                        Stage::new(5000, secs(60)),
                    ],
                },
                think_time: ThinkTime::range(100, 400),
            },
            Scenario {
                id: "spike",
                workload: endpoints(public_endpoints()),
                default_vus: 2000,
                shape: flat(secs(60)),
                think_time: ThinkTime::NONE,
            },
            Scenario {
                id: "burst",
                workload: endpoints(public_endpoints()),
                default_vus: 2000,
                shape: flat(secs(60)),
                think_time: ThinkTime::NONE,
            },
            Scenario {
                id: "homeburst",
                workload: endpoints(homepage_endpoints()),
                default_vus: 10_000,
                shape: flat(secs(60)),
                think_time: ThinkTime::NONE,
            },
            Scenario {
                id: "soak",
                workload: endpoints(public_endpoints()),
                default_vus: 200,
                shape: flat(secs(30 * 60)),
                think_time: ThinkTime::range(500, 1500),
            },
            Scenario {
                id: "auth",
                workload: endpoints(auth_endpoints()),
                default_vus: 100,
                shape: flat(secs(60)),
                think_time: ThinkTime::range(250, 750),
            },
            Scenario {
                id: "search",
                workload: endpoints(search_endpoints()),
                default_vus: 100,
                shape: flat(secs(60)),
                think_time: ThinkTime::range(250, 750),
            },
            Scenario {
                id: "cache",
                workload: endpoints(cache_endpoints()),
                default_vus: 200,
                shape: flat(secs(60)),
                think_time: ThinkTime::range(250, 750),
            },
            Scenario {
                id: "vip",
                workload: endpoints(vip_endpoints()),
                default_vus: 100,
                shape: flat(secs(60)),
                think_time: ThinkTime::range(250, 750),
            },
            Scenario {
                id: "referral",
                workload: endpoints(referral_endpoints()),
                default_vus: 50,
                shape: flat(secs(60)),
                think_time: ThinkTime::range(250, 750),
            },
            // Hammers one cheap endpoint with no pacing to provoke the
            // backend's limiter; 429s count as expected.
            Scenario {
                id: "ratelimit",
                workload: endpoints(vec![Endpoint::get("/api/health")]),
                default_vus: 500,
                shape: flat(secs(30)),
                think_time: ThinkTime::NONE,
            },
            Scenario {
                id: "journey",
                workload: Workload::Journey(Journey::Viewer),
                default_vus: 50,
                shape: flat(secs(120)),
                think_time: ThinkTime::range(1000, 3000),
            },
            Scenario {
                id: "onboarding",
                workload: Workload::Journey(Journey::Onboarding),
                default_vus: 20,
                shape: flat(secs(120)),
                think_time: ThinkTime::range(2000, 4000),
            },
        ];

        Self { scenarios }
    }

    /// A catalog with caller-supplied scenarios; tests use this to run
    /// against mock backends with short durations.
    pub fn from_scenarios(scenarios: Vec<Scenario>) -> Self {
        Self { scenarios }
    }

    pub fn scenario(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    pub fn scenario_ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.scenarios.iter().map(|s| s.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn source_url_builders() {
        let dramabox = SOURCES.iter().find(|s| s.name == "dramabox").unwrap();
        assert_eq!(dramabox.home(), "/api/dramabox/trending");
        assert_eq!(dramabox.search("love"), "/api/dramabox/search?query=love");
        assert_eq!(
            dramabox.episode_list("42000005001"),
            "/api/dramabox/allstreams?bookId=42000005001"
        );
        assert_eq!(
            dramabox.stream("42000005001", 3),
            "/api/dramabox/stream?bookId=42000005001&episode=3"
        );

        let velolo = SOURCES.iter().find(|s| s.name == "velolo").unwrap();
        assert_eq!(velolo.home(), "/api/velolo/theaters");
        assert_eq!(velolo.search("cinta"), "/api/velolo/search?q=cinta");
        assert_eq!(velolo.stream("x", 1), "/api/velolo/stream/x/1");
    }

    #[test]
    fn random_title_never_picks_an_empty_source() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let (source, id) = random_title(&mut rng);
            assert!(!source.title_ids.is_empty());
            assert!(source.title_ids.contains(&id));
        }
    }

    #[test]
    fn endpoint_sets_cover_all_sources() {
        assert_eq!(homepage_endpoints().len(), 4 + SOURCES.len());
        assert_eq!(search_endpoints().len(), SOURCES.len());
        // public = homepage + searches + (2 episode lists + 1 stream) per
        // source that has title ids
        let with_ids = SOURCES.iter().filter(|s| !s.title_ids.is_empty()).count();
        assert_eq!(
            public_endpoints().len(),
            homepage_endpoints().len() + SOURCES.len() + with_ids * 3
        );
    }

    #[test]
    fn builtin_catalog_lookup() {
        let catalog = Catalog::builtin();
        assert!(catalog.scenario("quick").is_some());
        assert!(catalog.scenario("journey").is_some());
        assert!(catalog.scenario("no-such-test").is_none());

        let load = catalog.scenario("load").unwrap();
        match &load.shape {
            LoadShape::Ramp { stages } => {
                assert_eq!(stages.len(), 4);
                assert_eq!(load.shape.total_duration(), Duration::from_secs(360));
            }
            LoadShape::Flat { .. } => panic!("load must be staged"),
        }
    }

    #[test]
    fn registration_bodies_are_unique_per_call() {
        let mut rng = StdRng::seed_from_u64(5);
        let register = auth_endpoints().pop().unwrap();
        let a = register.resolve(&mut rng);
        let b = register.resolve(&mut rng);
        assert_ne!(a.body, b.body);
    }
}
