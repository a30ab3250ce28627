//! Single-document commands: insert, get, delete.

use super::open_catalog;
use crate::error::{CliError, CliResult};
use orbital_core::{CollectionOptions, Config, Document, DocumentId, Query};
use serde_json::Value;
use std::path::Path;

/// Inserts `document` (JSON text) and returns its id.
pub fn insert_document(
    path: &Path,
    collection: &str,
    document: &str,
    assign_id: bool,
) -> CliResult<DocumentId> {
    let value: Value = serde_json::from_str(document)?;
    let catalog = open_catalog(path, Config::default().assign_missing_ids(assign_id))?;
    let handle = catalog.collection(collection)?;
    let id = handle.lock().insert_value(value)?;
    Ok(id)
}

/// Runs `query` (JSON text), indexing `fields` first.
pub fn find_document(
    path: &Path,
    collection: &str,
    query: &str,
    fields: &[String],
) -> CliResult<Option<Document>> {
    let query = Query::from_value(&serde_json::from_str(query)?)?;
    let catalog = open_catalog(path, Config::default())?;
    require_existing(&catalog, collection)?;

    let options = fields
        .iter()
        .fold(CollectionOptions::new(), |options, field| options.index_field(field.as_str()));
    let handle = catalog.collection_with(collection, options)?;
    let found = handle.lock().find_one(&query)?;
    Ok(found)
}

/// Deletes the document whose id is `id` (JSON text).
pub fn delete_document(path: &Path, collection: &str, id: &str) -> CliResult<bool> {
    let id = match Query::from_value(&serde_json::from_str(id)?)? {
        Query::Id(id) => id,
        Query::Field { name, .. } => {
            return Err(orbital_core::CoreError::invalid_query(format!(
                "delete takes an id, not a field match on {name:?}"
            ))
            .into())
        }
    };
    let catalog = open_catalog(path, Config::default())?;
    require_existing(&catalog, collection)?;

    let handle = catalog.collection(collection)?;
    let deleted = handle.lock().delete(&id)?;
    Ok(deleted)
}

fn require_existing(catalog: &orbital_core::Catalog, collection: &str) -> CliResult<()> {
    if catalog.discover()?.iter().any(|n| n == collection) {
        Ok(())
    } else {
        Err(CliError::UnknownCollection {
            name: collection.to_string(),
        })
    }
}

/// Runs the insert command.
pub fn insert(path: &Path, collection: &str, document: &str, assign_id: bool) -> CliResult<()> {
    let id = insert_document(path, collection, document, assign_id)?;
    println!("inserted {id}");
    Ok(())
}

/// Runs the get command. Returns `false` if nothing matched.
pub fn get(path: &Path, collection: &str, query: &str, fields: &[String]) -> CliResult<bool> {
    match find_document(path, collection, query, fields)? {
        Some(document) => {
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(true)
        }
        None => {
            eprintln!("no matching document");
            Ok(false)
        }
    }
}

/// Runs the delete command.
pub fn delete(path: &Path, collection: &str, id: &str) -> CliResult<()> {
    if delete_document(path, collection, id)? {
        println!("deleted");
    } else {
        println!("not found");
    }
    Ok(())
}
