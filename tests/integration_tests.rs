//! Integration tests for translation-sync
//!
//! These tests run the full save-to-translation path: an in-memory SQLite
//! database, the HTTP provider against a wiremock server, and the
//! orchestrator wiring used by the binary.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use translation_sync::{
    config::parse_translatable_types, retry::RetryConfig, AutoTranslator, ContentEntity,
    Database, HttpProviderFactory, LanguageConfig, LanguageSetResolver, PairStatus,
    RequiredFieldRules, SkipReason, TranslatableRegistry,
};

// ==================== Test Helpers ====================

const AUTHOR: i64 = 42;

struct Harness {
    db: Database,
    translator: AutoTranslator,
    tenant_id: i64,
}

fn registry() -> Arc<TranslatableRegistry> {
    Arc::new(
        TranslatableRegistry::builder()
            .register("article", &["title", "body"])
            .build(),
    )
}

async fn harness(server: &MockServer, quota_limit: i64, primary: &str, enabled: &[&str]) -> Harness {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    let tenant_id = db
        .create_tenant("Acme Media", quota_limit, Some("tenant-key"))
        .await
        .expect("create tenant");
    db.add_member(AUTHOR, tenant_id).await.expect("add member");
    db.save_language_settings(
        AUTHOR,
        &LanguageConfig {
            primary_language: primary.to_string(),
            enabled_languages: enabled.iter().map(|s| s.to_string()).collect(),
            dashboard_language: Some("en".to_string()),
        },
    )
    .await
    .expect("save language settings");

    let providers = HttpProviderFactory::new(
        &format!("{}/v2/translate", server.uri()),
        Duration::from_secs(5),
        RetryConfig::immediate(1),
    )
    .expect("provider factory");

    let translator = AutoTranslator::new(
        db.clone(),
        registry(),
        Arc::new(providers),
        LanguageSetResolver::new("en"),
    );

    Harness {
        db,
        translator,
        tenant_id,
    }
}

/// Mount a provider response for one target language.
async fn mock_translation(server: &MockServer, target: &str, translated: &str) {
    Mock::given(method("POST"))
        .and(path("/v2/translate"))
        .and(header("Authorization", "DeepL-Auth-Key tenant-key"))
        .and(body_partial_json(json!({ "target_lang": target })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "translations": [{ "detected_source_language": "TR", "text": translated }]
        })))
        .mount(server)
        .await;
}

async fn quota_used(h: &Harness) -> i64 {
    h.db
        .tenant(h.tenant_id)
        .await
        .expect("query tenant")
        .expect("tenant exists")
        .quota_used
}

// ==================== Quota Gate Tests ====================

#[tokio::test]
async fn test_batch_within_quota_then_rejected_batch_writes_nothing() {
    let server = MockServer::start().await;
    mock_translation(&server, "EN", "translated-en").await;
    mock_translation(&server, "DE", "translated-de").await;

    let h = harness(&server, 1000, "tr", &["en", "de"]).await;
    assert!(h.db.try_consume_quota(h.tenant_id, 950).await.unwrap());

    // 13 characters into two languages: 26 of the remaining 50
    let entity = ContentEntity::new("article", 1).with_field("title", "Yeni haberler");
    h.db.save_entity(&entity).await.unwrap();

    let outcome = h
        .translator
        .on_content_saved(AUTHOR, "article", &entity, true)
        .await;
    assert!(outcome.is_translated(), "unexpected outcome: {:?}", outcome.status);
    assert_eq!(outcome.characters, 26);
    assert_eq!(quota_used(&h).await, 976);

    let stored = h.db.load_entity("article", 1).await.unwrap().unwrap();
    assert_eq!(stored.get("title_en"), Some("translated-en"));
    assert_eq!(stored.get("title_de"), Some("translated-de"));

    // 20 characters into two languages: 40 requested, 24 remaining
    let edited = ContentEntity::new("article", 1).with_field("title", "Daha uzun bir başlık");
    h.db.save_entity(&edited).await.unwrap();
    let before = h.db.load_entity("article", 1).await.unwrap().unwrap();

    let outcome = h
        .translator
        .on_content_saved(AUTHOR, "article", &edited, false)
        .await;
    assert_eq!(
        outcome.skip_reason(),
        Some(&SkipReason::QuotaExceeded {
            requested: 40,
            remaining: 24
        })
    );
    assert_eq!(quota_used(&h).await, 976);

    let after = h.db.load_entity("article", 1).await.unwrap().unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_rejected_batch_leaves_no_hash_behind() {
    let server = MockServer::start().await;
    mock_translation(&server, "EN", "translated-en").await;

    let h = harness(&server, 5, "tr", &["en"]).await;
    let entity = ContentEntity::new("article", 7).with_field("title", "Merhaba");
    h.db.save_entity(&entity).await.unwrap();

    let outcome = h
        .translator
        .on_content_saved(AUTHOR, "article", &entity, true)
        .await;
    assert_eq!(
        outcome.skip_reason(),
        Some(&SkipReason::QuotaExceeded {
            requested: 7,
            remaining: 5
        })
    );
    assert!(h.db.source_hashes("article", 7).await.unwrap().is_empty());

    // A shorter title fits; resync picks up the stored entity
    let edited = ContentEntity::new("article", 7).with_field("title", "Selam");
    h.db.save_entity(&edited).await.unwrap();
    let outcome = h
        .translator
        .resync(AUTHOR, "article", 7)
        .await
        .unwrap()
        .expect("entity exists");

    assert!(outcome.is_translated());
    assert_eq!(quota_used(&h).await, 5);
    assert_eq!(h.db.source_hashes("article", 7).await.unwrap().len(), 1);
}

// ==================== Provider Failure Tests ====================

#[tokio::test]
async fn test_revoked_credential_aborts_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/translate"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, 1000, "tr", &["en", "de"]).await;
    let entity = ContentEntity::new("article", 3)
        .with_field("title", "Merhaba")
        .with_field("body", "Dünya");
    h.db.save_entity(&entity).await.unwrap();

    let outcome = h
        .translator
        .on_content_saved(AUTHOR, "article", &entity, true)
        .await;

    assert_eq!(outcome.skip_reason(), Some(&SkipReason::NothingToTranslate));
    assert_eq!(outcome.count(&PairStatus::Abandoned), 3);
    assert_eq!(quota_used(&h).await, 0);
    assert_eq!(h.db.load_entity("article", 3).await.unwrap().unwrap(), entity);
}

#[tokio::test]
async fn test_rich_text_sent_as_plain_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/translate"))
        .and(body_partial_json(json!({
            "text": ["Merhaba dünya"],
            "source_lang": "TR",
            "target_lang": "EN"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "translations": [{ "text": "Hello world" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, 1000, "tr", &["en"]).await;
    let entity =
        ContentEntity::new("article", 5).with_field("body", "<p>Merhaba <b>dünya</b></p>");
    h.db.save_entity(&entity).await.unwrap();

    let outcome = h
        .translator
        .on_content_saved(AUTHOR, "article", &entity, true)
        .await;

    assert!(outcome.is_translated());
    assert_eq!(outcome.characters, 13);
    let stored = h.db.load_entity("article", 5).await.unwrap().unwrap();
    assert_eq!(stored.get("body_en"), Some("Hello world"));
    assert_eq!(stored.get("body"), Some("<p>Merhaba <b>dünya</b></p>"));
}

#[tokio::test]
async fn test_unchanged_resave_makes_no_provider_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/translate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "translations": [{ "text": "Hello" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, 1000, "tr", &["en"]).await;
    let entity = ContentEntity::new("article", 9).with_field("title", "Merhaba");
    h.db.save_entity(&entity).await.unwrap();

    let first = h
        .translator
        .on_content_saved(AUTHOR, "article", &entity, true)
        .await;
    assert!(first.is_translated());

    let second = h
        .translator
        .on_content_saved(AUTHOR, "article", &entity, false)
        .await;
    assert_eq!(second.count(&PairStatus::Unchanged), 1);
    assert_eq!(quota_used(&h).await, 7);
}

// ==================== Form Rules Tests ====================

#[tokio::test]
async fn test_required_fields_follow_stored_settings() {
    let server = MockServer::start().await;
    let h = harness(&server, 1000, "tr", &["en", "de"]).await;

    let registry = Arc::new(
        parse_translatable_types("article:title,body")
            .unwrap()
            .iter()
            .fold(TranslatableRegistry::builder(), |b, (content_type, fields)| {
                let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
                b.register(content_type, &fields)
            })
            .build(),
    );
    let resolver = LanguageSetResolver::new("en");
    let settings = h
        .db
        .language_settings(AUTHOR, resolver.default_language())
        .await
        .unwrap();
    let rules = RequiredFieldRules::new(registry, resolver);

    let required: Vec<String> = rules
        .required_fields("article", &settings)
        .into_iter()
        .collect();
    assert_eq!(required, vec!["body_de", "body_en", "title_de", "title_en"]);

    // A user with no stored settings works in the default language only
    let fresh = h.db.language_settings(7, "en").await.unwrap();
    assert!(rules.required_fields("article", &fresh).is_empty());
}
