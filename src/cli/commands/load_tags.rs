use std::path::Path;

use anyhow::{bail, Context, Result};
use common::TagDefinition;
use model::entities::tag;
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, Database, EntityTrait, QueryFilter, Set};
use tracing::{debug, error, info, trace};
use validator::Validate;

/// Parse and validate a tag fixture. Any invalid entry rejects the file.
pub fn parse_tags(content: &str) -> Result<Vec<TagDefinition>> {
    let tags: Vec<TagDefinition> =
        serde_json::from_str(content).context("expected a JSON array of {name, color, slug}")?;

    for (index, definition) in tags.iter().enumerate() {
        if let Err(errors) = definition.validate() {
            bail!("invalid tag #{} ({}): {}", index, definition.slug, errors);
        }
    }
    Ok(tags)
}

/// Insert tags whose name, color and slug are all unused. Returns the number inserted.
pub async fn import_tags<C: ConnectionTrait>(db: &C, tags: &[TagDefinition]) -> Result<usize> {
    let mut inserted = 0;
    for definition in tags {
        let clash = tag::Entity::find()
            .filter(
                Condition::any()
                    .add(tag::Column::Name.eq(definition.name.as_str()))
                    .add(tag::Column::Color.eq(definition.color.as_str()))
                    .add(tag::Column::Slug.eq(definition.slug.as_str())),
            )
            .one(db)
            .await?;
        if let Some(existing) = clash {
            debug!("Skipping tag {}, clashes with existing tag {}", definition.slug, existing.id);
            continue;
        }

        tag::ActiveModel {
            name: Set(definition.name.clone()),
            color: Set(definition.color.clone()),
            slug: Set(definition.slug.clone()),
            ..Default::default()
        }
        .insert(db)
        .await?;
        inserted += 1;
    }
    Ok(inserted)
}

pub async fn load_tags(database_url: &str, path: &Path) -> Result<()> {
    trace!("Entering load_tags function");
    info!("Loading tags from {}", path.display());

    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            return Err(e.into());
        }
    };
    let tags = parse_tags(&content)?;

    let db = Database::connect(database_url).await?;
    let inserted = import_tags(&db, &tags).await?;

    info!("Tag import finished: {} of {} inserted", inserted, tags.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};

    const FIXTURE: &str = r##"[
        {"name": "Breakfast", "color": "#E26C2D", "slug": "breakfast"},
        {"name": "Dinner", "color": "#8775D2", "slug": "dinner"}
    ]"##;

    #[test]
    fn test_invalid_entry_rejects_fixture() {
        assert_eq!(parse_tags(FIXTURE).unwrap().len(), 2);

        let bad_color = r##"[{"name": "Lunch", "color": "green", "slug": "lunch"}]"##;
        assert!(parse_tags(bad_color).is_err());

        let bad_slug = r##"[{"name": "Lunch", "color": "#49B64E", "slug": "обед"}]"##;
        assert!(parse_tags(bad_slug).is_err());
    }

    #[tokio::test]
    async fn test_import_skips_existing_tags() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        let tags = parse_tags(FIXTURE).unwrap();
        assert_eq!(import_tags(&db, &tags).await.unwrap(), 2);
        assert_eq!(import_tags(&db, &tags).await.unwrap(), 0);
        assert_eq!(tag::Entity::find().all(&db).await.unwrap().len(), 2);
    }
}
