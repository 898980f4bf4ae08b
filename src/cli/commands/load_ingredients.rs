use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use model::entities::ingredient;
use sea_orm::{sea_query::OnConflict, ConnectionTrait, Database, EntityTrait, Set};
use serde::Deserialize;
use tracing::{debug, error, info, trace, warn};

/// Rows per INSERT statement.
const CHUNK_SIZE: usize = 500;

/// One fixture entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IngredientRecord {
    pub name: String,
    pub measurement_unit: String,
}

/// Parse `name,measurement_unit` rows. A leading header row is skipped.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<IngredientRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (line, row) in rdr.records().enumerate() {
        let row = row.with_context(|| format!("malformed CSV at record {}", line + 1))?;
        let (Some(name), Some(unit)) = (row.get(0), row.get(1)) else {
            warn!("Skipping record {} with fewer than two fields", line + 1);
            continue;
        };
        if line == 0 && name.eq_ignore_ascii_case("name") {
            trace!("Skipping CSV header");
            continue;
        }
        if name.is_empty() || unit.is_empty() {
            warn!("Skipping record {} with an empty field", line + 1);
            continue;
        }
        records.push(IngredientRecord {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
        });
    }
    Ok(records)
}

pub fn parse_json(content: &str) -> Result<Vec<IngredientRecord>> {
    serde_json::from_str(content).context("expected a JSON array of {name, measurement_unit}")
}

/// Insert records, skipping ones already present. Returns the number of
/// rows actually inserted.
pub async fn import_ingredients<C: ConnectionTrait>(db: &C, records: &[IngredientRecord]) -> Result<u64> {
    let mut inserted = 0;
    for chunk in records.chunks(CHUNK_SIZE) {
        let rows = chunk.iter().map(|record| ingredient::ActiveModel {
            name: Set(record.name.clone()),
            measurement_unit: Set(record.measurement_unit.clone()),
            ..Default::default()
        });
        inserted += ingredient::Entity::insert_many(rows)
            .on_conflict(
                OnConflict::columns([ingredient::Column::Name, ingredient::Column::MeasurementUnit])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
        debug!("Imported chunk of {} ingredients", chunk.len());
    }
    Ok(inserted)
}

pub async fn load_ingredients(database_url: &str, path: &Path) -> Result<()> {
    trace!("Entering load_ingredients function");
    info!("Loading ingredients from {}", path.display());

    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            return Err(e.into());
        }
    };

    let records = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => parse_csv(content.as_bytes())?,
        Some(ext) if ext.eq_ignore_ascii_case("json") => parse_json(&content)?,
        _ => bail!("unsupported fixture format for {}, expected .csv or .json", path.display()),
    };
    info!("Parsed {} ingredient records", records.len());

    let db = Database::connect(database_url).await?;
    let inserted = import_ingredients(&db, &records).await?;

    info!(
        "Ingredient import finished: {} inserted, {} already present",
        inserted,
        (records.len() as u64).saturating_sub(inserted)
    );
    Ok(())
}
