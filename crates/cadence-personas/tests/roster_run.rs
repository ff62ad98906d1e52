//! Full-roster runs: every persona registered, driven through `run_ticks`
//! with the in-memory kernel and in-memory adapters.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use serde_json::json;

use cadence_core::adapters::{MemoryLogger, MemoryTelemetry, StaticFacts, StubSolver};
use cadence_core::dispatch::reasons;
use cadence_core::{
    Adapters, CadenceConfig, FixedClock, InMemoryKernel, NoOpCallback, RunSummary,
    TickOrchestrator, run_ticks,
};
use cadence_personas::register_all;
use cadence_types::{EffectKind, FulfillmentStatus, RunId, TickFrame, TickPhase};

struct Harness {
    orchestrator: TickOrchestrator,
    telemetry: Arc<MemoryTelemetry>,
}

fn harness(config: &CadenceConfig, adapters: Adapters) -> Harness {
    let telemetry = Arc::new(MemoryTelemetry::new());
    let mut orchestrator = TickOrchestrator::new(
        RunId::fixed(7),
        Arc::new(FixedClock::epoch()),
        config.orchestrator_config(),
        config.budget_gate().unwrap(),
        Box::new(InMemoryKernel::new()),
        adapters.with_telemetry(telemetry.clone()),
    );
    register_all(&mut orchestrator, config).unwrap();
    Harness {
        orchestrator,
        telemetry,
    }
}

fn default_adapters() -> Adapters {
    Adapters::none()
        .with_logger(Arc::new(MemoryLogger::new()))
        .with_solver(Arc::new(StubSolver::fulfilled(json!({"ok": true}))))
}

fn capped_config() -> CadenceConfig {
    let mut config = CadenceConfig::default();
    config.budget.caps.insert("movement".to_owned(), 2);
    config.personas.moderator.blocked_kinds = vec!["greet".to_owned()];
    config
}

async fn run(h: &mut Harness, config: &CadenceConfig, ticks: u64) -> RunSummary {
    let payload = serde_json::to_value(config).unwrap();
    run_ticks(&mut h.orchestrator, payload, ticks, &mut NoOpCallback)
        .await
        .unwrap()
}

fn effects_of<'a>(frames: &'a [TickFrame], kind: &'a EffectKind) -> impl Iterator<Item = &'a TickFrame> {
    frames
        .iter()
        .filter(move |f| f.emitted_effects.iter().any(|e| &e.kind == kind))
}

fn count_kind(frames: &[TickFrame], kind: &EffectKind) -> usize {
    frames
        .iter()
        .flat_map(|f| f.emitted_effects.iter())
        .filter(|e| &e.kind == kind)
        .count()
}

#[tokio::test]
async fn three_ticks_with_default_roster() {
    let config = capped_config();
    let mut h = harness(&config, default_adapters());
    let summary = run(&mut h, &config, 3).await;

    assert_eq!(summary.ticks_completed, 3);
    assert_eq!(summary.frames, 16);
    // greet every tick; move admitted on ticks 0 and 1, rejected on tick 2.
    assert_eq!(summary.admitted_actions, 5);

    let frames = h.orchestrator.frames();
    assert_eq!(count_kind(frames, &EffectKind::LimitReached), 1);
    assert_eq!(count_kind(frames, &EffectKind::LimitViolated), 1);
    assert!(effects_of(frames, &EffectKind::LimitViolated).all(|f| f.phase == TickPhase::Apply));

    // Moderator flags each admitted greet one phase later.
    let flagged: Vec<_> = frames
        .iter()
        .filter(|f| f.phase == TickPhase::Emit)
        .map(|f| {
            f.emitted_effects
                .iter()
                .filter(|e| e.kind == EffectKind::ActionRejected)
                .count()
        })
        .collect();
    assert_eq!(flagged, vec![1, 1, 1]);
}

#[tokio::test]
async fn persona_views_reflect_the_run() {
    let config = capped_config();
    let mut h = harness(&config, default_adapters());
    run(&mut h, &config, 3).await;

    let views = h.orchestrator.persona_views();
    assert_eq!(views["configurator"].state, "configured");
    assert_eq!(views["director"].state, "resting");
    assert_eq!(views["director"].context["lastPlan"], "plan:2");
    assert_eq!(views["actor"].context["rounds"], 3);
    assert_eq!(views["annotator"].context["annotations"], 3);
}

#[tokio::test]
async fn allocator_reports_once_per_tick() {
    let config = capped_config();
    let mut h = harness(&config, default_adapters());
    run(&mut h, &config, 3).await;

    let records = h.telemetry.records();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.name == "budget.tick"));
    assert_eq!(records[0].fields["usage"]["movement"]["usage"], 1);
    assert_eq!(records[2].fields["usage"]["movement"]["usage"], 3);
    assert_eq!(records[2].fields["limitViolated"], 1);
}

#[tokio::test]
async fn solver_requests_follow_cadence() {
    let config = capped_config();
    let mut h = harness(&config, default_adapters());
    let summary = run(&mut h, &config, 3).await;

    // solve_every = 2: requests on ticks 0 and 2.
    assert_eq!(summary.solver_results, 2);
    let results = h.orchestrator.staged_solver_results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].meta.id, "solve:2");
    assert_eq!(results[0].status, FulfillmentStatus::Fulfilled);
}

#[tokio::test]
async fn plan_annotations_defer_without_fact_resolver() {
    let config = capped_config();
    let mut h = harness(&config, default_adapters());
    run(&mut h, &config, 2).await;

    let facts: Vec<_> = h
        .orchestrator
        .effect_log()
        .iter()
        .filter(|r| r.effect.kind == EffectKind::NeedExternalFact)
        .collect();
    assert_eq!(facts.len(), 2);
    assert!(facts.iter().all(|r| r.status == FulfillmentStatus::Deferred));
    assert!(facts
        .iter()
        .all(|r| r.reason.as_deref() == Some(reasons::MISSING_FACT_RESOLVER)));
}

#[tokio::test]
async fn plan_annotations_resolve_with_facts() {
    let config = capped_config();
    let facts = StaticFacts::new()
        .with_fact("plan:0", json!({"steps": 1}))
        .with_fact("plan:1", json!({"steps": 2}));
    let mut h = harness(&config, default_adapters().with_facts(Arc::new(facts)));
    run(&mut h, &config, 2).await;

    let fulfilled = h
        .orchestrator
        .effect_log()
        .iter()
        .filter(|r| r.effect.kind == EffectKind::NeedExternalFact)
        .filter(|r| r.status == FulfillmentStatus::Fulfilled)
        .count();
    assert_eq!(fulfilled, 2);
}

#[tokio::test]
async fn miswired_config_is_reported_on_init() {
    let mut config = CadenceConfig::default();
    config.personas.actor.proposals.push("dance".to_owned());
    let mut h = harness(&config, default_adapters());
    run(&mut h, &config, 1).await;

    let frames = h.orchestrator.frames();
    let init = &frames[0];
    assert_eq!(init.phase, TickPhase::Init);
    assert_eq!(count_kind(std::slice::from_ref(init), &EffectKind::InitInvalid), 1);
    assert_eq!(h.orchestrator.persona_views()["configurator"].state, "invalid");

    // The kernel has no code for `dance`; it is rejected at Apply.
    let apply = frames.iter().find(|f| f.phase == TickPhase::Apply).unwrap();
    assert!(apply
        .emitted_effects
        .iter()
        .any(|e| e.kind == EffectKind::ActionRejected && e.data["actionKind"] == "dance"));
}

#[tokio::test]
async fn same_seed_replays_identically() {
    let config = capped_config();
    let mut first = harness(&config, default_adapters());
    let mut second = harness(&config, default_adapters());
    run(&mut first, &config, 4).await;
    run(&mut second, &config, 4).await;

    let a = serde_json::to_string(first.orchestrator.frames()).unwrap();
    let b = serde_json::to_string(second.orchestrator.frames()).unwrap();
    assert_eq!(a, b);
}
