//! translation-sync: operator commands for the translation pipeline
//!
//! Usage:
//!   translation-sync resync <content_type> <entity_id> <user_id>
//!       Re-run translation for a stored entity acting as <user_id>
//!       (the manual path for batches abandoned on quota or credential errors)
//!   translation-sync languages <user_id>
//!       Print the resolved languages and required form fields for a user
//!
//! Environment: see `Config::from_env` (DATABASE_URL, TRANSLATION_API_URL,
//! DEFAULT_LANGUAGE, TRANSLATABLE_TYPES, PROVIDER_TIMEOUT_SECS, PROVIDER_MAX_ATTEMPTS).

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::info;
use translation_sync::config::Config;
use translation_sync::{
    AutoTranslator, Database, HttpProviderFactory, LanguageSetResolver, RequiredFieldRules,
};

fn usage() -> &'static str {
    "usage:\n  translation-sync resync <content_type> <entity_id> <user_id>\n  translation-sync languages <user_id>"
}

fn parse_id(raw: Option<&String>, name: &str) -> Result<i64> {
    raw.with_context(|| format!("missing <{}>\n{}", name, usage()))?
        .parse()
        .with_context(|| format!("<{}> must be an integer", name))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translation_sync=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!("{}", usage());
    };

    let config = Config::from_env()?;
    let db = Database::connect(&config.database_url).await?;
    let registry = Arc::new(config.build_registry());
    let resolver = LanguageSetResolver::new(config.default_language.clone());

    match command.as_str() {
        "resync" => {
            let content_type = args
                .get(1)
                .with_context(|| format!("missing <content_type>\n{}", usage()))?;
            let entity_id = parse_id(args.get(2), "entity_id")?;
            let user_id = parse_id(args.get(3), "user_id")?;

            let providers = Arc::new(HttpProviderFactory::from_config(&config)?);
            let translator = AutoTranslator::new(db, registry, providers, resolver);

            info!("Resyncing {} #{} as user {}", content_type, entity_id, user_id);
            let outcome = translator
                .resync(user_id, content_type, entity_id)
                .await?
                .with_context(|| format!("{} #{} not found", content_type, entity_id))?;

            println!("{}", serde_json::to_string_pretty(&outcome)?);
            info!(
                "Metrics: {}",
                serde_json::to_string(&translator.metrics().report())?
            );
        }
        "languages" => {
            let user_id = parse_id(args.get(1), "user_id")?;
            let settings = db
                .language_settings(user_id, resolver.default_language())
                .await?;

            println!("languages: {:?}", resolver.resolve_supported(&settings));

            let rules = RequiredFieldRules::new(registry.clone(), resolver);
            for content_type in registry.content_types() {
                println!(
                    "{}: required {:?}",
                    content_type,
                    rules.required_fields(content_type, &settings)
                );
            }
        }
        other => bail!("Unknown command '{}'\n{}", other, usage()),
    }

    Ok(())
}
