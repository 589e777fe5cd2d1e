//! Utility to list stored registration drafts and re-validate them.

use maos_amigas_client::client_store::{ClientStore, DraftKind};
use maos_amigas_client::config::Config;
use maos_amigas_client::models::RegistrationForm;
use maos_amigas_client::obs::init_tracing;
use maos_amigas_client::registration::RegistrationKind;
use maos_amigas_client::storage::{FileStorage, KeyValueStore};
use maos_amigas_client::validation::FieldValidator;
use std::sync::Arc;

/// Main entry point for the draft inspection utility.
///
/// Opens the configured storage directory, prints every draft with its
/// save timestamp and lists the fields that would block submission.
fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::from_env()?;
    let storage = Arc::new(FileStorage::new(&config.storage_dir)?);

    println!("Storage: {}", storage.dir().display());
    println!("Keys: {}", storage.keys()?.join(", "));
    println!();

    let store = ClientStore::open(storage);
    for kind in [RegistrationKind::AssistedUser, RegistrationKind::Volunteer] {
        inspect(&store, kind);
    }

    Ok(())
}

fn inspect(store: &ClientStore, kind: RegistrationKind) {
    let draft_kind: DraftKind = kind.draft_kind();
    println!("{} ({:?})", draft_kind.data_key(), kind);

    let Some(form) = store.load_draft::<RegistrationForm>(draft_kind) else {
        println!("  no draft (missing or failed checksum)");
        println!();
        return;
    };

    match store.draft_saved_at(draft_kind) {
        Some(at) => println!("  saved at: {}", at.to_rfc3339()),
        None => println!("  saved at: unknown"),
    }

    let validator = FieldValidator::new(kind.phone_rule());
    let mut filled = 0;
    for field in kind.fields() {
        let value = form.get(field);
        if value.trim().is_empty() {
            continue;
        }
        filled += 1;
        let result = validator.validate(field, value);
        if result.valid {
            println!("  - {}: ok", field);
        } else {
            println!("  - {}: {}", field, result.message);
        }
    }
    println!("  {} of {} fields filled", filled, kind.fields().len());
    println!();
}
