mod common;

use std::collections::HashMap;
use std::sync::Arc;

use aisim_core::generator::ArtifactGenerator;
use aisim_core::llm::{ScriptStep, ScriptedModel};
use aisim_core::model::ArtifactStatus;
use aisim_core::store::SessionStore;
use aisim_core::variations::VariationPipeline;

use common::{fast_settings, named_model, STYLES};

fn five_chunks(tag: &str) -> Vec<String> {
    vec![
        format!("<{tag} class=\"card\">"),
        "<h1>Title</h1>".to_string(),
        "<p>Body ".to_string(),
        "text</p>".to_string(),
        format!("</{tag}>"),
    ]
}

#[tokio::test]
async fn three_concurrent_streams_complete_with_concatenated_html() {
    let tags = ["section", "article", "aside"];
    let mut model = named_model();
    for (style, tag) in STYLES.iter().zip(tags) {
        let steps = five_chunks(tag).into_iter().map(ScriptStep::Chunk).collect();
        model = model.with_stream(*style, steps);
    }

    let store = SessionStore::new();
    let generator = ArtifactGenerator::new(Arc::new(model), store.clone(), &fast_settings());
    let session = generator.generate("pricing table").await.unwrap();

    assert_eq!(session.artifacts.len(), 3);
    for (artifact, tag) in session.artifacts.iter().zip(tags) {
        assert_eq!(artifact.status, ArtifactStatus::Complete);
        assert_eq!(artifact.html, five_chunks(tag).concat());
    }
    let styles: Vec<&str> = session
        .artifacts
        .iter()
        .map(|a| a.style_name.as_str())
        .collect();
    assert_eq!(styles, STYLES.to_vec());
    assert!(!store.snapshot().is_loading);
}

#[tokio::test]
async fn fenced_stream_is_trimmed_on_completion() {
    let mut model = named_model();
    for style in STYLES {
        model = model.with_stream(
            style,
            vec![
                ScriptStep::chunk("```ht"),
                ScriptStep::chunk("ml\n<div>x</div>"),
                ScriptStep::chunk("\n```\n"),
            ],
        );
    }
    let generator = ArtifactGenerator::new(Arc::new(model), SessionStore::new(), &fast_settings());
    let session = generator.generate("x").await.unwrap();
    assert!(session.artifacts.iter().all(|a| a.html == "<div>x</div>"));
}

#[tokio::test]
async fn variation_stream_split_mid_object_yields_branded_names() {
    let raw = r#"{"name":"Foo","html":"<div></div>"}{"name":"AiSim Bar","html":"<p></p>"}"#;
    let split = raw.find("<div>").unwrap();
    let model = ScriptedModel::new().with_stream(
        "VARIATIONS",
        vec![ScriptStep::chunk(&raw[..split]), ScriptStep::chunk(&raw[split..])],
    );

    let store = SessionStore::new();
    let session = store.start_session("toggle switch").unwrap();
    store.finish_loading();
    store.focus(0).unwrap();

    let pipeline = VariationPipeline::new(Arc::new(model), store.clone(), &fast_settings());
    let variations = pipeline.run_focused().await.unwrap();

    let names: Vec<&str> = variations.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["AiSim Foo", "AiSim Bar"]);
    assert_eq!(variations[0].html, "<div></div>");

    let drawer = store.snapshot().variations.unwrap();
    assert_eq!(drawer.artifact_id, session.artifacts[0].id);
    assert_eq!(drawer.items, variations);
}

#[tokio::test]
async fn failing_stream_errors_only_its_artifact() {
    let model = named_model()
        .with_stream(
            STYLES[0],
            vec![ScriptStep::chunk("<div>ok</div>")],
        )
        .with_stream(
            STYLES[1],
            vec![
                ScriptStep::chunk("<div>par"),
                ScriptStep::chunk("tial"),
                ScriptStep::Fail("connection reset by peer".into()),
            ],
        )
        .with_stream(STYLES[2], vec![ScriptStep::chunk("<div>fine</div>")]);

    let generator = ArtifactGenerator::new(Arc::new(model), SessionStore::new(), &fast_settings());
    let session = generator.generate("login form").await.unwrap();

    let failed = &session.artifacts[1];
    assert_eq!(failed.status, ArtifactStatus::Error);
    assert!(failed.html.starts_with(r#"<div style="color: #ff6b6b;"#));
    assert!(failed.html.contains("connection reset by peer"));
    assert!(!failed.html.contains("partial"));

    assert_eq!(session.artifacts[0].status, ArtifactStatus::Complete);
    assert_eq!(session.artifacts[0].html, "<div>ok</div>");
    assert_eq!(session.artifacts[2].status, ArtifactStatus::Complete);
    assert_eq!(session.artifacts[2].html, "<div>fine</div>");
}

#[tokio::test]
async fn observers_see_monotonic_growth_until_terminal() {
    let mut model = named_model();
    for style in STYLES {
        model = model.with_stream(style, ScriptStep::chunked("<main><h1>grow</h1><p>steadily</p></main>", 4));
    }

    let store = SessionStore::new();
    let mut rx = store.subscribe();
    let generator = ArtifactGenerator::new(Arc::new(model), store.clone(), &fast_settings());
    let handle = tokio::spawn(async move { generator.generate("x").await });

    let mut history: HashMap<String, Vec<String>> = HashMap::new();
    let mut terminal: HashMap<String, String> = HashMap::new();
    while rx.changed().await.is_ok() {
        let snap = rx.borrow_and_update().clone();
        for artifact in snap.sessions.iter().flat_map(|s| &s.artifacts) {
            match artifact.status {
                ArtifactStatus::Streaming => {
                    assert!(
                        !terminal.contains_key(&artifact.id),
                        "artifact left a terminal state"
                    );
                    history
                        .entry(artifact.id.clone())
                        .or_default()
                        .push(artifact.html.clone());
                }
                _ => {
                    let first = terminal
                        .entry(artifact.id.clone())
                        .or_insert_with(|| artifact.html.clone());
                    assert_eq!(*first, artifact.html, "terminal artifact mutated");
                }
            }
        }
        if !snap.sessions.is_empty() && !snap.is_loading {
            break;
        }
    }

    let session = handle.await.unwrap().unwrap();
    assert!(session.is_settled());
    for values in history.values() {
        for pair in values.windows(2) {
            assert!(
                pair[1].starts_with(&pair[0]),
                "{:?} does not extend {:?}",
                pair[1],
                pair[0]
            );
        }
    }
}

#[tokio::test]
async fn writes_for_a_replaced_session_do_not_touch_the_new_one() {
    let store = SessionStore::new();
    let old = store.start_session("first").unwrap();
    store.finish_loading();
    let new = store.start_session("second").unwrap();

    // a slow stream from the first session finishing late
    assert!(store.complete_artifact(&old.artifacts[0].id, "<p>old</p>".into()));
    let snap = store.snapshot();
    let current = snap.current().unwrap();
    assert_eq!(current.id, new.id);
    assert!(current.artifacts.iter().all(|a| a.html.is_empty()));
    assert!(!store.publish_html(&old.artifacts[0].id, "<p>old</p><p>more"));
}
