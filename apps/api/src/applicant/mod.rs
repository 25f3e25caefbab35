// Applicant information: basic info, academics, achievements, skills,
// projects and experiences. Every query is scoped to the calling user.
//
// POST bodies dispatch on an `action` field (create / update / delete /
// reorder) and carry camelCase fields.

pub mod academics;
pub mod achievements;
pub mod basic_info;
pub mod complete;
pub mod experiences;
pub mod projects;
pub mod skills;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use sqlx::{PgExecutor, PgPool};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::db::is_unique_violation;
use crate::errors::AppError;

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderChange {
    pub id: Uuid,
    pub display_order: i32,
}

#[derive(Debug, Deserialize)]
pub struct IdBody {
    pub id: Option<Uuid>,
}

/// Splits a POST body into its action name (defaulting to `default`) and the body itself.
pub fn split_action(body: Value, default: &str) -> (String, Value) {
    let action = body
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string();
    (action, body)
}

/// Deserializes an action payload, reporting shape errors as validation failures.
pub fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T, AppError> {
    serde_json::from_value(body).map_err(|e| AppError::Validation(format!("Invalid input: {e}")))
}

/// The `id` an update/delete action targets.
pub fn required_id(body: &Value, label: &str, action: &str) -> Result<Uuid, AppError> {
    let parsed: IdBody = parse_body(body.clone())?;
    parsed
        .id
        .ok_or_else(|| AppError::Validation(format!("{label} ID is required for {action}")))
}

pub fn invalid_action(action: &str, allowed: &str) -> AppError {
    AppError::Validation(format!("Invalid action: {action}. Use {allowed}"))
}

/// `Some(None)` for an explicit `null`, `None` when the key is absent.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Rejects a missing or blank required field and enforces a maximum length.
pub fn require_text(field: &str, value: Option<&str>, max_len: usize) -> Result<String, AppError> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{field}: This field cannot be blank.")))?;
    check_len(field, value, max_len)?;
    Ok(value.to_string())
}

/// Validates a field present in a partial update; absent stays absent.
pub fn patch_text(
    field: &str,
    value: Option<String>,
    max_len: usize,
) -> Result<Option<String>, AppError> {
    value
        .map(|v| require_text(field, Some(&v), max_len))
        .transpose()
}

pub fn check_len(field: &str, value: &str, max_len: usize) -> Result<(), AppError> {
    if value.chars().count() > max_len {
        return Err(AppError::Validation(format!(
            "{field}: Ensure this value has at most {max_len} characters."
        )));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Ordered, user-owned tables
// ────────────────────────────────────────────────────────────────────────────

/// Display order for a new row: one past the highest order in use.
pub fn next_order(existing: &[(Uuid, i32)]) -> i32 {
    existing
        .iter()
        .map(|(_, order)| *order)
        .max()
        .map_or(0, |max| max.saturating_add(1))
}

/// Rejects `order` if it is negative or held by a row other than `id`.
/// `id` is `None` for a row that does not exist yet.
pub fn check_order(
    existing: &[(Uuid, i32)],
    id: Option<Uuid>,
    order: i32,
) -> Result<(), AppError> {
    if order < 0 {
        return Err(AppError::Validation(
            "displayOrder: Ensure this value is greater than or equal to 0.".to_string(),
        ));
    }
    if existing
        .iter()
        .any(|(other, taken)| *taken == order && Some(*other) != id)
    {
        return Err(order_taken(order));
    }
    Ok(())
}

/// The subset of `changes` that targets rows in `existing`, provided the
/// resulting orders stay non-negative and distinct. Later changes to the
/// same id win.
pub fn plan_reorder(
    existing: &[(Uuid, i32)],
    changes: &[OrderChange],
) -> Result<Vec<OrderChange>, AppError> {
    let mut orders: HashMap<Uuid, i32> = existing.iter().copied().collect();
    let mut planned: Vec<OrderChange> = Vec::new();

    for change in changes {
        if !orders.contains_key(&change.id) {
            continue;
        }
        if change.display_order < 0 {
            return Err(AppError::Validation(
                "displayOrder: Ensure this value is greater than or equal to 0.".to_string(),
            ));
        }
        orders.insert(change.id, change.display_order);
        planned.retain(|c| c.id != change.id);
        planned.push(*change);
    }

    let mut seen = HashSet::new();
    for order in orders.values() {
        if !seen.insert(*order) {
            return Err(order_taken(*order));
        }
    }
    Ok(planned)
}

fn order_taken(order: i32) -> AppError {
    AppError::Duplicate(format!("displayOrder {order} is already used by another record"))
}

/// Maps the per-user order constraint firing under a concurrent write to a
/// duplicate-entry error.
pub fn order_conflict(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::Duplicate("displayOrder is already used by another record".to_string())
    } else {
        AppError::Database(e)
    }
}

/// Tables whose rows carry a per-user `display_order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderedTable {
    Academics,
    Achievements,
    Projects,
    Experiences,
}

impl OrderedTable {
    fn name(self) -> &'static str {
        match self {
            OrderedTable::Academics => "academics",
            OrderedTable::Achievements => "achievements",
            OrderedTable::Projects => "projects",
            OrderedTable::Experiences => "experiences",
        }
    }

    /// `(id, display_order)` for each of the user's rows.
    async fn orders<'e, E>(self, executor: E, user_id: Uuid) -> Result<Vec<(Uuid, i32)>, AppError>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT id, display_order FROM {} WHERE user_id = $1 FOR UPDATE",
            self.name()
        );
        Ok(sqlx::query_as::<_, (Uuid, i32)>(&sql)
            .bind(user_id)
            .fetch_all(executor)
            .await?)
    }

    /// Order for a new row: `requested` when given and free, or the next order when absent.
    pub async fn new_row_order(
        self,
        pool: &PgPool,
        user_id: Uuid,
        requested: Option<i32>,
    ) -> Result<i32, AppError> {
        let existing = self.orders(pool, user_id).await?;
        match requested {
            Some(order) => {
                check_order(&existing, None, order)?;
                Ok(order)
            }
            None => Ok(next_order(&existing)),
        }
    }

    /// Validates an updated order for row `id`; no-op when the update leaves it alone.
    pub async fn check_update(
        self,
        pool: &PgPool,
        user_id: Uuid,
        id: Uuid,
        requested: Option<i32>,
    ) -> Result<(), AppError> {
        let Some(order) = requested else {
            return Ok(());
        };
        let existing = self.orders(pool, user_id).await?;
        check_order(&existing, Some(id), order)
    }

    /// Deletes one of the user's rows; false when no such row exists.
    pub async fn delete(self, pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let sql = format!("DELETE FROM {} WHERE id = $1 AND user_id = $2", self.name());
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Applies every change in one transaction. Ids the user does not own are
    /// skipped; a batch that would leave two rows sharing an order is rejected.
    pub async fn reorder(
        self,
        pool: &PgPool,
        user_id: Uuid,
        orders: &[OrderChange],
    ) -> Result<u64, AppError> {
        let sql = format!(
            "UPDATE {} SET display_order = $1, updated_at = NOW() WHERE id = $2 AND user_id = $3",
            self.name()
        );
        let mut tx = pool.begin().await?;
        let existing = self.orders(&mut *tx, user_id).await?;
        let planned = plan_reorder(&existing, orders)?;

        let mut updated = 0;
        for order in &planned {
            updated += sqlx::query(&sql)
                .bind(order.display_order)
                .bind(order.id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await.map_err(order_conflict)?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        role: Option<Option<String>>,
    }

    #[test]
    fn test_split_action_defaults() {
        let (action, _) = split_action(json!({"collegeName": "MIT"}), "create");
        assert_eq!(action, "create");
        let (action, body) = split_action(json!({"action": "delete", "id": null}), "create");
        assert_eq!(action, "delete");
        assert!(body.get("id").is_some());
    }

    #[test]
    fn test_required_id() {
        let id = Uuid::new_v4();
        assert_eq!(
            required_id(&json!({"id": id}), "Academic", "update").unwrap(),
            id
        );
        let err = required_id(&json!({}), "Academic", "update").unwrap_err();
        assert!(
            matches!(err, AppError::Validation(ref m) if m == "Academic ID is required for update")
        );
        assert!(required_id(&json!({"id": "nope"}), "Academic", "update").is_err());
    }

    #[test]
    fn test_double_option_distinguishes_null_from_absent() {
        let absent: Patch = serde_json::from_value(json!({})).unwrap();
        assert_eq!(absent.role, None);
        let null: Patch = serde_json::from_value(json!({"role": null})).unwrap();
        assert_eq!(null.role, Some(None));
        let set: Patch = serde_json::from_value(json!({"role": "Dev"})).unwrap();
        assert_eq!(set.role, Some(Some("Dev".to_string())));
    }

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("course", Some("  CS  "), 10).unwrap(), "CS");
        assert!(require_text("course", Some("   "), 10).is_err());
        assert!(require_text("course", None, 10).is_err());
        assert!(require_text("course", Some("Computer Science"), 5).is_err());
        assert_eq!(patch_text("course", None, 10).unwrap(), None);
        assert!(patch_text("course", Some(String::new()), 10).is_err());
    }

    #[test]
    fn test_order_change_is_camel_case() {
        let id = Uuid::new_v4();
        let change: OrderChange =
            serde_json::from_value(json!({"id": id, "displayOrder": 3})).unwrap();
        assert_eq!(change.display_order, 3);
        assert_eq!(OrderedTable::Experiences.name(), "experiences");
    }

    #[test]
    fn test_next_order_after_middle_delete() {
        let (a, c) = (Uuid::new_v4(), Uuid::new_v4());
        // rows at 0, 1, 2 with the middle one deleted
        let existing = vec![(a, 0), (c, 2)];
        let order = next_order(&existing);
        assert_eq!(order, 3);
        assert!(check_order(&existing, None, order).is_ok());

        assert_eq!(next_order(&[]), 0);
    }

    #[test]
    fn test_check_order_rejects_collision_with_another_row() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let existing = vec![(a, 0), (b, 1)];

        let err = check_order(&existing, Some(a), 1).unwrap_err();
        assert!(matches!(err, AppError::Duplicate(ref m) if m.contains("displayOrder 1")));
        assert!(check_order(&existing, None, 0).is_err());

        // keeping its own order or moving to a free slot is fine
        assert!(check_order(&existing, Some(b), 1).is_ok());
        assert!(check_order(&existing, Some(a), 5).is_ok());
        assert!(matches!(
            check_order(&existing, None, -1),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_plan_reorder_allows_swap() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let existing = vec![(a, 0), (b, 1), (c, 2)];
        let swap = [
            OrderChange { id: a, display_order: 1 },
            OrderChange { id: b, display_order: 0 },
        ];

        let planned = plan_reorder(&existing, &swap).unwrap();
        assert_eq!(planned.len(), 2);
        assert_eq!(planned[0].id, a);
        assert_eq!(planned[1].display_order, 0);
    }

    #[test]
    fn test_plan_reorder_rejects_half_swap_and_skips_foreign_ids() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let existing = vec![(a, 0), (b, 1)];

        let half = [OrderChange { id: a, display_order: 1 }];
        assert!(matches!(
            plan_reorder(&existing, &half),
            Err(AppError::Duplicate(_))
        ));

        let foreign = [OrderChange { id: Uuid::new_v4(), display_order: 1 }];
        assert!(plan_reorder(&existing, &foreign).unwrap().is_empty());

        let negative = [OrderChange { id: b, display_order: -3 }];
        assert!(matches!(
            plan_reorder(&existing, &negative),
            Err(AppError::Validation(_))
        ));
    }
}
