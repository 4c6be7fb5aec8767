//! Tests for scenario CRUD, search, import/export and demo seeding.

use std::collections::HashSet;
use std::sync::Arc;

use callscript::engine::catalog::*;
use callscript::engine::types::*;
use callscript::engine::EngineError;
use callscript::storage::memory_store::MemoryBlobStore;
use callscript::storage::repository::ScenarioRepository;

fn catalog() -> ScenarioCatalog {
    ScenarioCatalog::new(ScenarioRepository::new(Arc::new(MemoryBlobStore::new())))
}

fn draft(name: &str) -> ScenarioDraft {
    ScenarioDraft {
        name: name.to_string(),
        description: "Outbound script".to_string(),
        webhook_url: None,
        steps: vec![Step::new("a", "Greeting", "Hello").with_option("Bye", END_STEP)],
    }
}

#[test]
fn slugify_cases() {
    assert_eq!(slugify("Service Sales"), "service-sales");
    assert_eq!(slugify("  Cold   call #2! "), "cold-call-2");
    assert_eq!(slugify("Продажи"), "scenario");
    assert_eq!(slugify(""), "scenario");
}

#[test]
fn unique_id_appends_suffix() {
    let taken: HashSet<String> = ["sales", "sales-2"].iter().map(|s| s.to_string()).collect();
    assert_eq!(unique_id("support", &taken), "support");
    assert_eq!(unique_id("sales", &taken), "sales-3");
}

#[test]
fn normalize_drops_incomplete_steps() {
    let draft = ScenarioDraft {
        name: "  Sales ".to_string(),
        description: " desc ".to_string(),
        webhook_url: Some("   ".to_string()),
        steps: vec![
            Step::new("a", " Greeting ", " Hi ")
                .with_option("  ", "b")
                .with_option(" Go ", "b"),
            Step::new("b", "", "no title").with_option("x", END_STEP),
            Step::new("c", "No options", ""),
            Step::new("", "Fresh", "").with_option("Done", END_STEP),
        ],
    };

    let normalized = draft.normalize().unwrap();
    assert_eq!(normalized.name, "Sales");
    assert_eq!(normalized.description, "desc");
    assert!(normalized.webhook_url.is_none());
    assert_eq!(normalized.steps.len(), 2);
    assert_eq!(normalized.steps[0].title, "Greeting");
    assert_eq!(normalized.steps[0].content, "Hi");
    assert_eq!(normalized.steps[0].options, vec![StepOption::new("Go", "b")]);
    assert!(normalized.steps[1].id.starts_with("step-"));
}

#[test]
fn normalize_requires_name_and_steps() {
    let err = draft("   ").normalize().unwrap_err();
    assert!(matches!(err, EngineError::Validation(ref m) if m.contains("name")));

    let mut no_steps = draft("Sales");
    no_steps.steps = vec![Step::new("a", "Greeting", "")];
    let err = no_steps.normalize().unwrap_err();
    assert!(matches!(err, EngineError::Validation(ref m) if m.contains("step")));
}

#[test]
fn normalize_rejects_repeated_step_ids() {
    let mut d = draft("Sales");
    d.steps = vec![
        Step::new("a", "Greeting", "").with_option("go", "a"),
        Step::new("a", "Pitch", "").with_option("bye", END_STEP),
    ];

    let err = d.normalize().unwrap_err();
    assert!(matches!(err, EngineError::Validation(ref m) if m.contains("'a'")));
}

#[test]
fn duplicate_step_id_finds_first_repeat() {
    let steps = vec![
        Step::new("a", "A", ""),
        Step::new("b", "B", ""),
        Step::new("b", "B again", ""),
    ];
    assert_eq!(duplicate_step_id(&steps), Some("b"));
    assert_eq!(duplicate_step_id(&steps[..2]), None);
}

#[test]
fn search_matches_name_or_description() {
    let mut scenario = Scenario::new("s1", "Service sales", vec![]);
    scenario.description = "Objection handling".to_string();

    assert!(matches_search(&scenario, "SALES"));
    assert!(matches_search(&scenario, "objection"));
    assert!(matches_search(&scenario, "  "));
    assert!(!matches_search(&scenario, "support"));
}

#[tokio::test]
async fn create_assigns_unique_slug_ids() {
    let catalog = catalog();

    let first = catalog.create(draft("Cold Call")).await.unwrap();
    let second = catalog.create(draft("Cold Call")).await.unwrap();

    assert_eq!(first.id, "cold-call");
    assert_eq!(second.id, "cold-call-2");
    assert!(first.last_used.is_none());
    assert_eq!(catalog.list(None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn invalid_draft_is_not_stored() {
    let catalog = catalog();
    let result = catalog.create(draft("")).await;
    assert!(result.is_err());
    assert!(catalog.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn get_missing_scenario() {
    let err = catalog().get("nope").await.unwrap_err();
    assert!(matches!(err, EngineError::ScenarioNotFound(ref id) if id == "nope"));
}

#[tokio::test]
async fn update_keeps_identity() {
    let catalog = catalog();
    let mut d = draft("Sales");
    d.webhook_url = Some("http://crm/hook".to_string());
    let created = catalog.create(d).await.unwrap();

    let mut cached = created.clone();
    let mut data = WebhookData::new();
    data.insert("NAME".to_string(), "Ann".to_string());
    cached.webhook_data = Some(data);
    catalog.save(&cached).await.unwrap();

    let mut edit = draft("Sales v2");
    edit.webhook_url = Some("http://crm/hook".to_string());
    let updated = catalog.update(&created.id, edit).await.unwrap();
    assert_eq!(updated.id, "sales");
    assert_eq!(updated.name, "Sales v2");
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.webhook_data.is_some());

    let mut edit = draft("Sales v3");
    edit.webhook_url = Some("http://crm/other".to_string());
    let updated = catalog.update(&created.id, edit).await.unwrap();
    assert!(updated.webhook_data.is_none());
}

#[tokio::test]
async fn update_missing_scenario() {
    let err = catalog().update("ghost", draft("Ghost")).await.unwrap_err();
    assert!(matches!(err, EngineError::ScenarioNotFound(_)));
}

#[tokio::test]
async fn save_requires_existing_scenario() {
    let scenario = Scenario::new("ghost", "Ghost", vec![Step::new("a", "A", "")]);
    let err = catalog().save(&scenario).await.unwrap_err();
    assert!(matches!(err, EngineError::ScenarioNotFound(_)));
}

#[tokio::test]
async fn delete_and_search() {
    let catalog = catalog();
    catalog.create(draft("Sales")).await.unwrap();
    catalog.create(draft("Support")).await.unwrap();

    let found = catalog.list(Some("supp")).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "support");

    assert!(catalog.delete("sales").await.unwrap());
    assert!(!catalog.delete("sales").await.unwrap());
    assert_eq!(catalog.list(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn export_then_import_appends_with_new_ids() {
    let catalog = catalog();
    catalog.create(draft("Sales")).await.unwrap();

    let exported = catalog.export().await.unwrap();
    let imported = catalog.import(&exported).await.unwrap();

    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].id, "sales-2");
    assert_eq!(imported[0].name, "Sales");

    let ids: Vec<String> = catalog
        .list(None)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec!["sales", "sales-2"]);
}

#[tokio::test]
async fn import_rejects_bad_payloads() {
    let catalog = catalog();

    let err = catalog.import("{ not json").await.unwrap_err();
    assert!(matches!(err, EngineError::Import(_)));

    let empty_steps = r#"[
        { "id": "ok", "name": "Ok", "steps": [{ "id": "a", "title": "A" }] },
        { "id": "bad", "name": "Bad", "steps": [] }
    ]"#;
    let err = catalog.import(empty_steps).await.unwrap_err();
    assert!(err.to_string().contains("Bad"));
    assert!(catalog.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn create_and_update_reject_repeated_step_ids() {
    let catalog = catalog();
    let mut repeated = draft("Sales");
    repeated.steps = vec![
        Step::new("a", "A", "").with_option("go", "a"),
        Step::new("a", "A2", "").with_option("end", END_STEP),
    ];

    assert!(catalog.create(repeated.clone()).await.is_err());
    assert!(catalog.list(None).await.unwrap().is_empty());

    let created = catalog.create(draft("Sales")).await.unwrap();
    let err = catalog.update(&created.id, repeated).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(catalog.get("sales").await.unwrap().steps.len(), 1);
}

#[tokio::test]
async fn import_rejects_repeated_step_ids() {
    let catalog = catalog();
    let payload = r#"[
        { "id": "twins", "name": "Twins", "steps": [
            { "id": "a", "title": "A", "options": [{ "text": "go", "nextStep": "a" }] },
            { "id": "a", "title": "A2", "options": [{ "text": "end", "nextStep": "end" }] }
        ] }
    ]"#;

    let err = catalog.import(payload).await.unwrap_err();
    assert!(matches!(err, EngineError::Import(ref m) if m.contains("'a'")));
    assert!(catalog.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn import_derives_blank_ids_from_name() {
    let catalog = catalog();
    catalog.create(draft("Cold Call")).await.unwrap();

    let payload = r#"[
        { "id": "", "name": "Cold Call", "steps": [{ "id": "a", "title": "A" }] },
        { "id": "  ", "name": "Warm Lead", "steps": [{ "id": "a", "title": "A" }] }
    ]"#;

    let imported = catalog.import(payload).await.unwrap();
    let ids: Vec<&str> = imported.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["cold-call-2", "warm-lead"]);
}

#[tokio::test]
async fn edit_saves_only_on_success() {
    let catalog = catalog();
    catalog.create(draft("Sales")).await.unwrap();

    let (scenario, new_id) = catalog
        .edit("sales", |s| {
            Ok(callscript::engine::editor::add_step(s).id.clone())
        })
        .await
        .unwrap();
    assert!(scenario.has_step(&new_id));
    assert_eq!(catalog.get("sales").await.unwrap().steps.len(), 2);

    let err = catalog
        .edit("sales", |s| callscript::engine::editor::move_step(s, 0, 9))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let missing = catalog
        .edit("ghost", |s| Ok(s.steps.len()))
        .await
        .unwrap_err();
    assert!(matches!(missing, EngineError::ScenarioNotFound(_)));
}

#[tokio::test]
async fn seeding_happens_once() {
    let catalog = catalog();

    assert!(catalog.ensure_seeded().await.unwrap());
    let scenarios = catalog.list(None).await.unwrap();
    assert_eq!(scenarios.len(), 1);
    assert_eq!(scenarios[0].id, "demo-sales");

    // Deleting everything must not bring the demo back.
    catalog.delete("demo-sales").await.unwrap();
    assert!(!catalog.ensure_seeded().await.unwrap());
    assert!(catalog.list(None).await.unwrap().is_empty());
}

#[test]
fn demo_scenario_is_well_formed() {
    let demo = demo_scenarios();
    let scenario = &demo[0];

    assert_eq!(scenario.steps.len(), 11);
    assert_eq!(scenario.entry_step().unwrap().id, "step-1");
    assert!(scenario.steps[0].content.contains("[NAME]"));
    assert!(callscript::engine::editor::dangling_references(scenario).is_empty());
}
