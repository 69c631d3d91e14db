//! Scripted multi-step user sessions.
//!
//! A journey models one human session rather than independent random hits:
//! the viewer browses, sometimes searches, opens a title and watches a few
//! episodes with realistic pauses; the onboarding flow registers a fresh
//! account and pokes around. Every step records into the run's aggregator
//! exactly like a plain endpoint hit, and liveness is checked between steps
//! so a stop lands promptly even mid-session.

use super::worker::WorkerEnv;
use crate::catalog::{self, REFERRAL_CODE};
use crate::domain::{EndpointRequest, Journey, Method, ThinkTime};
use rand::rngs::StdRng;
use rand::Rng;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};

/// Run one session of the given journey. Returns early (between steps) as
/// soon as the run stops, the deadline passes, or this worker is retired;
/// the trailing between-session think-time is the worker loop's.
pub(crate) async fn run_session(
    env: &WorkerEnv,
    journey: Journey,
    rng: &mut StdRng,
    active: &AtomicBool,
) {
    match journey {
        Journey::Viewer => viewer_session(env, rng, active).await,
        Journey::Onboarding => onboarding_session(env, rng, active).await,
    }
}

async fn viewer_session(env: &WorkerEnv, rng: &mut StdRng, active: &AtomicBool) {
    let (source, title) = catalog::random_title(rng);

    // Browse the source's homepage.
    if !step(env, rng, active, get(source.home()), ThinkTime::range(1000, 2000)).await {
        return;
    }

    // Half the time the viewer searches before picking.
    if rng.gen_bool(0.5) {
        let search = get(source.search(catalog::random_query(rng)));
        if !step(env, rng, active, search, ThinkTime::range(800, 2000)).await {
            return;
        }
    }

    // Open the title's episode listing.
    if !step(
        env,
        rng,
        active,
        get(source.episode_list(title)),
        ThinkTime::range(800, 1800),
    )
    .await
    {
        return;
    }

    // Watch one to three episodes; the pause is the partial-watch time.
    let episodes = rng.gen_range(1..=3);
    for episode in 1..=episodes {
        if !step(
            env,
            rng,
            active,
            get(source.stream(title, episode)),
            ThinkTime::range(2000, 5000),
        )
        .await
        {
            return;
        }
    }
}

async fn onboarding_session(env: &WorkerEnv, rng: &mut StdRng, active: &AtomicBool) {
    let username = format!("vu_{:08x}{:04x}", rng.gen::<u32>(), rng.gen::<u16>());

    if !step(
        env,
        rng,
        active,
        get(format!("/api/auth/check-username?username={username}")),
        ThinkTime::range(500, 1000),
    )
    .await
    {
        return;
    }

    let register = post(
        "/api/auth/register",
        json!({
            "username": &username,
            "password": "StressTest123!",
            "email": format!("{username}@stress.dev"),
            "referralCode": REFERRAL_CODE,
        }),
    );
    if !step(env, rng, active, register, ThinkTime::range(800, 1800)).await {
        return;
    }

    let login = post(
        "/api/auth/login",
        json!({ "username": &username, "password": "StressTest123!" }),
    );
    if !step(env, rng, active, login, ThinkTime::range(500, 1000)).await {
        return;
    }

    if !step(env, rng, active, get("/api/vip/plans"), ThinkTime::range(500, 1000)).await {
        return;
    }
    if !step(env, rng, active, get("/api/referral/settings"), ThinkTime::range(500, 1000)).await {
        return;
    }

    // Fresh account takes a look around and watches one episode.
    let (source, title) = catalog::random_title(rng);
    if !step(env, rng, active, get(source.home()), ThinkTime::range(1000, 2000)).await {
        return;
    }
    if !step(
        env,
        rng,
        active,
        get(source.episode_list(title)),
        ThinkTime::range(500, 1000),
    )
    .await
    {
        return;
    }
    let _ = step(env, rng, active, get(source.stream(title, 1)), ThinkTime::NONE).await;
}

/// Execute one step, record it, pause for its think-time, then report
/// whether the session may continue.
async fn step(
    env: &WorkerEnv,
    rng: &mut StdRng,
    active: &AtomicBool,
    request: EndpointRequest,
    think: ThinkTime,
) -> bool {
    let outcome = env.invoker.invoke(&request).await;
    env.metrics.record(&request.path, &outcome);

    let pause = think.sample(rng);
    if !pause.is_zero() {
        tokio::time::sleep(pause).await;
    }
    active.load(Ordering::Relaxed) && env.run.is_live()
}

fn get(path: impl Into<String>) -> EndpointRequest {
    EndpointRequest {
        path: path.into(),
        method: Method::Get,
        body: None,
        headers: Vec::new(),
    }
}

fn post(path: &str, body: serde_json::Value) -> EndpointRequest {
    EndpointRequest {
        path: path.to_string(),
        method: Method::Post,
        body: Some(body),
        headers: Vec::new(),
    }
}
