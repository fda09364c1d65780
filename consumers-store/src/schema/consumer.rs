//! Consumer CRUD operations
//!
//! Spatial containment is evaluated by PostGIS (`ST_Contains`); this module
//! only assembles the statements.

use crate::error::{Result, StoreError};
use crate::schema::types::{Consumer, ConsumerFilter, ConsumerUpdate, NewConsumer};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

const CONSUMER_COLUMNS: &str =
    "c.id, c.name, ST_AsGeoJSON(c.location)::jsonb AS location";

/// Build the listing statement for `filter`.
///
/// Every present dimension adds one `AND`-joined clause.
pub fn build_list_query(filter: &ConsumerFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {} FROM water_usage.consumers c",
        CONSUMER_COLUMNS
    ));
    let mut separator = " WHERE ";

    if let Some(usage_above) = filter.usage_above {
        builder
            .push(separator)
            .push("c.id IN (SELECT u.consumer FROM water_usage.usages u WHERE u.value > ")
            .push_bind(usage_above)
            .push(")");
        separator = " AND ";
    }

    if let Some(ids) = &filter.ids {
        builder
            .push(separator)
            .push("c.id = ANY(")
            .push_bind(ids.clone())
            .push(")");
        separator = " AND ";
    }

    if let Some(area_keys) = &filter.area_keys {
        builder
            .push(separator)
            .push("EXISTS (SELECT 1 FROM geodata.shapes s WHERE s.key = ANY(")
            .push_bind(area_keys.clone())
            .push(") AND ST_Contains(s.geom, c.location))");
    }

    builder.push(" ORDER BY c.name, c.id");
    builder
}

/// List consumers matching `filter`
pub async fn list_consumers(pool: &PgPool, filter: &ConsumerFilter) -> Result<Vec<Consumer>> {
    let mut builder = build_list_query(filter);
    debug!(sql = builder.sql(), "listing consumers");

    let consumers = builder
        .build_query_as::<Consumer>()
        .fetch_all(pool)
        .await
        .map_err(|e| StoreError::QueryError(format!("Failed to list consumers: {}", e)))?;

    Ok(consumers)
}

/// Get a consumer by id
///
/// # Returns
/// * `Ok(Some(Consumer))` if the consumer exists
/// * `Ok(None)` if not found
pub async fn get_consumer(pool: &PgPool, id: Uuid) -> Result<Option<Consumer>> {
    let sql = format!(
        "SELECT {} FROM water_usage.consumers c WHERE c.id = $1",
        CONSUMER_COLUMNS
    );

    sqlx::query_as::<_, Consumer>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| StoreError::QueryError(format!("Failed to get consumer: {}", e)))
}

/// Insert a consumer and return the stored row
pub async fn create_consumer(pool: &PgPool, consumer: &NewConsumer) -> Result<Consumer> {
    let sql = format!(
        "INSERT INTO water_usage.consumers AS c (name, location) \
         VALUES ($1, ST_SetSRID(ST_MakePoint($2, $3), 4326)) \
         RETURNING {}",
        CONSUMER_COLUMNS
    );

    sqlx::query_as::<_, Consumer>(&sql)
        .bind(&consumer.name)
        .bind(consumer.longitude)
        .bind(consumer.latitude)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::UniqueViolation(db.message().to_string())
            }
            other => StoreError::QueryError(format!("Failed to create consumer: {}", other)),
        })
}

/// Apply `update` to the consumer with `id`
///
/// # Returns
/// * `Ok(Some(Consumer))` with the updated row
/// * `Ok(None)` if no consumer has this id
pub async fn update_consumer(
    pool: &PgPool,
    id: Uuid,
    update: &ConsumerUpdate,
) -> Result<Option<Consumer>> {
    let (longitude, latitude) = match update.coordinates() {
        Some((long, lat)) => (Some(long), Some(lat)),
        None => (None, None),
    };

    let sql = format!(
        "UPDATE water_usage.consumers AS c SET \
           name = COALESCE($2, c.name), \
           location = CASE WHEN $3::float8 IS NULL OR $4::float8 IS NULL \
                           THEN c.location \
                           ELSE ST_SetSRID(ST_MakePoint($3, $4), 4326) END \
         WHERE c.id = $1 \
         RETURNING {}",
        CONSUMER_COLUMNS
    );

    sqlx::query_as::<_, Consumer>(&sql)
        .bind(id)
        .bind(update.name.as_deref())
        .bind(longitude)
        .bind(latitude)
        .fetch_optional(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::UniqueViolation(db.message().to_string())
            }
            other => StoreError::QueryError(format!("Failed to update consumer: {}", other)),
        })
}

/// Delete the consumer with `id`, returning the number of removed rows
pub async fn delete_consumer(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM water_usage.consumers WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| StoreError::QueryError(format!("Failed to delete consumer: {}", e)))?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfiltered_query() {
        let builder = build_list_query(&ConsumerFilter::default());
        let sql = builder.sql();
        assert!(!sql.contains("WHERE"));
        assert!(sql.ends_with("ORDER BY c.name, c.id"));
    }

    #[test]
    fn test_single_dimension_query() {
        let filter = ConsumerFilter {
            ids: Some(vec![Uuid::nil()]),
            ..Default::default()
        };
        let builder = build_list_query(&filter);
        let sql = builder.sql();
        assert!(sql.contains(" WHERE c.id = ANY($1)"));
        assert!(!sql.contains(" AND "));
    }

    #[test]
    fn test_all_dimensions_query() {
        let filter = ConsumerFilter {
            usage_above: Some(1000),
            ids: Some(vec![Uuid::nil()]),
            area_keys: Some(vec!["03241".to_string()]),
        };
        let builder = build_list_query(&filter);
        let sql = builder.sql();

        assert!(sql.contains("WHERE u.value > $1"));
        assert!(sql.contains(" AND c.id = ANY($2)"));
        assert!(sql.contains(" AND EXISTS (SELECT 1 FROM geodata.shapes s WHERE s.key = ANY($3)"));
        assert!(sql.contains("ST_Contains(s.geom, c.location)"));
        assert_eq!(sql.matches(" WHERE ").count(), 3);
    }

    #[test]
    fn test_usage_and_area_query() {
        let filter = ConsumerFilter {
            usage_above: Some(5),
            area_keys: Some(vec!["a".to_string(), "b".to_string()]),
            ..Default::default()
        };
        let builder = build_list_query(&filter);
        let sql = builder.sql();
        assert!(sql.contains("s.key = ANY($2)"));
        assert!(!sql.contains("$3"));
    }
}
