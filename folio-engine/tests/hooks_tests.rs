use folio_engine::{
    hook_fn, run_stage, CollectionHooks, EngineError, EngineResult, Hook, HookContext,
    RequestContext, StageName, UpdateArgs, UpdatePhase, ValidationError,
};
use folio_model::CollectionSchema;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn ctx<'a>(schema: &'a CollectionSchema, req: &'a RequestContext) -> HookContext<'a> {
    HookContext {
        stage: StageName::BeforeChange,
        schema,
        request: req,
        original: None,
    }
}

fn append(tag: &'static str) -> Arc<dyn Hook<Value>> {
    hook_fn(move |value: &Value, _ctx: &HookContext<'_>| {
        let mut next = value.clone();
        let trail = next["trail"].as_str().unwrap_or("").to_string();
        next["trail"] = json!(format!("{trail}{tag}"));
        Ok(Some(next))
    })
}

// ── Fold semantics ───────────────────────────────────────────────

#[tokio::test]
async fn hooks_run_in_registration_order() {
    let schema = CollectionSchema::new("posts");
    let req = RequestContext::anonymous();
    let hooks = vec![append("a"), append("b"), append("c")];

    let out = run_stage(&hooks, json!({}), &ctx(&schema, &req)).await.unwrap();
    assert_eq!(out["trail"], json!("abc"));
}

#[tokio::test]
async fn none_and_null_keep_the_working_value() {
    let schema = CollectionSchema::new("posts");
    let req = RequestContext::anonymous();
    let hooks = vec![
        append("a"),
        hook_fn(|_: &Value, _: &HookContext<'_>| Ok(None)),
        hook_fn(|_: &Value, _: &HookContext<'_>| Ok(Some(Value::Null))),
        append("b"),
    ];

    let out = run_stage(&hooks, json!({"title": "A"}), &ctx(&schema, &req)).await.unwrap();
    assert_eq!(out, json!({"title": "A", "trail": "ab"}));
}

#[tokio::test]
async fn replacement_is_seen_by_later_hooks() {
    let schema = CollectionSchema::new("posts");
    let req = RequestContext::anonymous();
    let hooks = vec![
        hook_fn(|_: &Value, _: &HookContext<'_>| Ok(Some(json!({"title": "replaced"})))),
        hook_fn(|value: &Value, _: &HookContext<'_>| {
            assert_eq!(value["title"], json!("replaced"));
            Ok(None)
        }),
    ];

    let out = run_stage(&hooks, json!({"title": "A"}), &ctx(&schema, &req)).await.unwrap();
    assert_eq!(out, json!({"title": "replaced"}));
}

#[tokio::test]
async fn error_aborts_remaining_hooks() {
    let schema = CollectionSchema::new("posts");
    let req = RequestContext::anonymous();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = {
        let calls = calls.clone();
        hook_fn(move |_: &Value, _: &HookContext<'_>| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        })
    };
    let hooks = vec![
        counter.clone(),
        hook_fn(|_: &Value, _: &HookContext<'_>| Err(ValidationError::field("title", "too short").into())),
        counter,
    ];

    let err = run_stage(&hooks, json!({}), &ctx(&schema, &req)).await.unwrap_err();
    match err {
        EngineError::Validation(v) => assert_eq!(v.paths(), vec!["title"]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn empty_stage_returns_input() {
    let schema = CollectionSchema::new("posts");
    let req = RequestContext::anonymous();
    let out = tokio_test::block_on(run_stage::<Value>(&[], json!({"x": 1}), &ctx(&schema, &req)));
    assert_eq!(out.unwrap(), json!({"x": 1}));
}

// ── Context ──────────────────────────────────────────────────────

#[tokio::test]
async fn hooks_see_context() {
    let schema = CollectionSchema::new("posts");
    let req = RequestContext::anonymous().with_locale("de", Some("en"));
    let original = json!({"title": "before"});
    let context = HookContext {
        original: Some(&original),
        ..ctx(&schema, &req)
    };
    let hooks = vec![hook_fn(|value: &Value, ctx: &HookContext<'_>| {
        assert_eq!(ctx.operation(), "update");
        assert_eq!(ctx.stage, StageName::AfterChange);
        assert_eq!(ctx.schema.slug, "posts");
        assert_eq!(ctx.request.locale.as_deref(), Some("de"));
        let mut next = value.clone();
        next["previous"] = ctx.original.map_or(Value::Null, |o| o["title"].clone());
        Ok(Some(next))
    })];

    let out = run_stage(&hooks, json!({}), &context.at(StageName::AfterChange)).await.unwrap();
    assert_eq!(out["previous"], json!("before"));
}

#[tokio::test]
async fn custom_hook_impl() {
    struct Stamp;

    #[async_trait::async_trait]
    impl Hook<UpdateArgs> for Stamp {
        async fn call(&self, args: &UpdateArgs, _ctx: &HookContext<'_>) -> EngineResult<Option<UpdateArgs>> {
            let mut next = args.clone();
            next.data["stamped"] = json!(true);
            Ok(Some(next))
        }
    }

    let schema = CollectionSchema::new("posts");
    let req = RequestContext::anonymous();
    let hooks: Vec<Arc<dyn Hook<UpdateArgs>>> = vec![Arc::new(Stamp)];
    let args = UpdateArgs::new("posts", 1, json!({"title": "A"}));

    let out = run_stage(&hooks, args, &ctx(&schema, &req)).await.unwrap();
    assert_eq!(out.data, json!({"title": "A", "stamped": true}));
}

// ── Registration ─────────────────────────────────────────────────

#[test]
fn collection_hooks_route_by_stage() {
    let hooks = CollectionHooks::new()
        .on(StageName::BeforeValidate, append("v"))
        .on(StageName::BeforeChange, append("c"))
        .on(StageName::BeforeChange, append("d"))
        .on(StageName::AfterRead, append("r"))
        .on(StageName::AfterOperation, append("o"))
        .on(StageName::BeforeOperation, append("ignored"));

    assert_eq!(hooks.stage(StageName::BeforeValidate).len(), 1);
    assert_eq!(hooks.stage(StageName::BeforeChange).len(), 2);
    assert_eq!(hooks.stage(StageName::AfterRead).len(), 1);
    assert_eq!(hooks.stage(StageName::AfterChange).len(), 0);
    assert_eq!(hooks.stage(StageName::AfterOperation).len(), 1);
    assert!(hooks.stage(StageName::BeforeOperation).is_empty());
    assert!(hooks.before_operation.is_empty());
}

#[test]
fn stage_names() {
    let names: Vec<&str> = StageName::ORDER.iter().map(StageName::as_str).collect();
    assert_eq!(
        names,
        vec!["beforeOperation", "beforeValidate", "beforeChange", "afterRead", "afterChange", "afterOperation"]
    );
}

// ── Phase machine ────────────────────────────────────────────────

#[test]
fn phases_form_a_single_path() {
    let mut phase = UpdatePhase::NotStarted;
    let mut path = vec![phase];
    while let Some(next) = phase.next() {
        assert!(phase.can_advance_to(next));
        phase = next;
        path.push(phase);
    }
    assert_eq!(
        path,
        vec![
            UpdatePhase::NotStarted,
            UpdatePhase::BeforeOperation,
            UpdatePhase::AccessChecked,
            UpdatePhase::Locked,
            UpdatePhase::BeforeValidate,
            UpdatePhase::FilesMaterialized,
            UpdatePhase::BeforeChange,
            UpdatePhase::Persisted,
            UpdatePhase::AfterRead,
            UpdatePhase::AfterChange,
            UpdatePhase::Completed,
        ]
    );
}

#[test]
fn failed_is_reachable_from_every_running_phase() {
    let mut phase = UpdatePhase::NotStarted;
    while let Some(next) = phase.next() {
        assert!(phase.can_advance_to(UpdatePhase::Failed), "{phase:?}");
        phase = next;
    }
    assert!(!UpdatePhase::Completed.can_advance_to(UpdatePhase::Failed));
    assert!(!UpdatePhase::Failed.can_advance_to(UpdatePhase::Failed));
    assert!(!UpdatePhase::Locked.can_advance_to(UpdatePhase::Persisted));
}
