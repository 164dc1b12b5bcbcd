use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::backend::{Backend, Cardinality, Embed, Filter, Query};
use crate::error::{AppError, Result};
use crate::models::session::{AuthUser, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Count,
    Insert,
    Update,
    Delete,
    Upsert,
    Upload,
    SignIn,
}

#[derive(Debug, Clone)]
struct FailRule {
    operation: Operation,
    table: Option<String>,
    remaining: Option<usize>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

#[derive(Debug, Clone)]
struct Account {
    password: String,
    user: AuthUser,
}

/// 内存后端：进程内的表、对象存储和账户
///
/// Every operation yields to the scheduler once before touching state, so
/// concurrent callers interleave at the same points a network round trip
/// would let them.
pub struct MemoryBackend {
    base_url: String,
    tables: RwLock<HashMap<String, Vec<Value>>>,
    unique_keys: RwLock<HashMap<String, Vec<Vec<String>>>>,
    objects: RwLock<HashMap<(String, String), StoredObject>>,
    accounts: RwLock<HashMap<String, Account>>,
    access_token: RwLock<Option<String>>,
    failures: Mutex<Vec<FailRule>>,
    requests: AtomicU64,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            base_url: "memory://storage".to_string(),
            tables: RwLock::new(HashMap::new()),
            unique_keys: RwLock::new(HashMap::new()),
            objects: RwLock::new(HashMap::new()),
            accounts: RwLock::new(HashMap::new()),
            access_token: RwLock::new(None),
            failures: Mutex::new(Vec::new()),
            requests: AtomicU64::new(0),
        }
    }

    /// 带有应用默认唯一约束的实例
    pub fn with_app_schema() -> Self {
        let backend = Self::new();
        backend.add_unique_key("profiles", &["id"]);
        backend.add_unique_key("profiles", &["username"]);
        backend.add_unique_key("hair_profiles", &["user_id"]);
        backend.add_unique_key("posts", &["id"]);
        backend.add_unique_key("saved_posts", &["user_id", "post_id"]);
        backend.add_unique_key("follows", &["follower_id", "following_id"]);
        backend
    }

    pub fn add_unique_key(&self, table: &str, columns: &[&str]) {
        self.unique_keys
            .write()
            .entry(table.to_string())
            .or_default()
            .push(columns.iter().map(|c| c.to_string()).collect());
    }

    /// 直接写入一行，不经过失败注入和约束检查
    pub fn seed(&self, table: &str, row: Value) {
        let row = Self::with_defaults(row);
        self.tables.write().entry(table.to_string()).or_default().push(row);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables.read().get(table).cloned().unwrap_or_default()
    }

    pub fn add_account(&self, email: &str, password: &str, user: AuthUser) {
        self.accounts.write().insert(
            email.to_lowercase(),
            Account {
                password: password.to_string(),
                user,
            },
        );
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<(Vec<u8>, String)> {
        self.objects
            .read()
            .get(&(bucket.to_string(), path.to_string()))
            .map(|o| (o.bytes.clone(), o.content_type.clone()))
    }

    pub fn access_token(&self) -> Option<String> {
        self.access_token.read().clone()
    }

    /// Number of operations attempted so far, failed ones included.
    pub fn request_count(&self) -> u64 {
        self.requests.load(AtomicOrdering::SeqCst)
    }

    /// 下一次匹配的操作失败
    pub fn fail_next(&self, operation: Operation, table: Option<&str>) {
        self.failures.lock().push(FailRule {
            operation,
            table: table.map(|t| t.to_string()),
            remaining: Some(1),
        });
    }

    /// 所有匹配的操作都失败，直到 clear_failures
    pub fn fail_always(&self, operation: Operation, table: Option<&str>) {
        self.failures.lock().push(FailRule {
            operation,
            table: table.map(|t| t.to_string()),
            remaining: None,
        });
    }

    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    async fn enter(&self, operation: Operation, table: &str) -> Result<()> {
        self.requests.fetch_add(1, AtomicOrdering::SeqCst);
        tokio::task::yield_now().await;

        let mut failures = self.failures.lock();
        let hit = failures.iter().position(|rule| {
            rule.operation == operation && rule.table.as_deref().map_or(true, |t| t == table)
        });

        if let Some(index) = hit {
            let exhausted = match failures[index].remaining.as_mut() {
                Some(remaining) => {
                    *remaining -= 1;
                    *remaining == 0
                }
                None => false,
            };
            if exhausted {
                failures.remove(index);
            }
            debug!("Simulated {:?} failure on {}", operation, table);
            return Err(AppError::ExternalService(format!(
                "Simulated {:?} failure on {}",
                operation, table
            )));
        }
        Ok(())
    }

    fn with_defaults(row: Value) -> Value {
        let mut row = match row {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        row.entry("id")
            .or_insert_with(|| json!(Uuid::new_v4().to_string()));
        row.entry("created_at")
            .or_insert_with(|| json!(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)));
        Value::Object(row)
    }

    fn matches(row: &Value, filters: &[Filter]) -> bool {
        filters.iter().all(|filter| match filter {
            Filter::Eq(column, expected) => {
                row.get(column).map(value_as_string).as_deref() == Some(expected.as_str())
            }
        })
    }

    fn violates_unique(&self, table: &str, rows: &[Value], candidate: &Value, skip: Option<usize>) -> bool {
        let keys = self.unique_keys.read();
        let Some(keys) = keys.get(table) else {
            return false;
        };

        keys.iter().any(|columns| {
            let candidate_key: Vec<Option<String>> =
                columns
                    .iter()
                    .map(|c| candidate.get(c).filter(|v| !v.is_null()).map(value_as_string))
                    .collect();
            if candidate_key.iter().any(|k| k.is_none()) {
                return false;
            }
            rows.iter().enumerate().any(|(i, row)| {
                Some(i) != skip
                    && columns
                        .iter()
                        .map(|c| row.get(c).map(value_as_string))
                        .collect::<Vec<_>>()
                        == candidate_key
            })
        })
    }

    fn resolve(&self, tables: &HashMap<String, Vec<Value>>, row: &Value, columns: &str, embeds: &[Embed]) -> Value {
        let mut out = project(row, columns);

        for embed in embeds {
            let related = tables.get(&embed.relation).map(Vec::as_slice).unwrap_or(&[]);
            let local = row.get(&embed.local_column).map(value_as_string);
            let matching: Vec<Value> = related
                .iter()
                .filter(|r| {
                    local.is_some() && r.get(&embed.remote_column).map(value_as_string) == local
                })
                .map(|r| self.resolve(tables, r, &embed.columns, &embed.embeds))
                .collect();

            let value = match embed.cardinality {
                Cardinality::Many => Value::Array(matching),
                Cardinality::One => matching.into_iter().next().unwrap_or(Value::Null),
            };
            if let Value::Object(map) = &mut out {
                map.insert(embed.relation.clone(), value);
            }
        }
        out
    }
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn project(row: &Value, columns: &str) -> Value {
    if columns.trim() == "*" {
        return row.clone();
    }
    let mut out = Map::new();
    for column in columns.split(',').map(|c| c.trim()).filter(|c| !c.is_empty()) {
        if let Some(value) = row.get(column) {
            out.insert(column.to_string(), value.clone());
        }
    }
    Value::Object(out)
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None, None) | (Some(Value::Null), Some(Value::Null)) => Ordering::Equal,
        (None, _) | (Some(Value::Null), _) => Ordering::Less,
        (_, None) | (_, Some(Value::Null)) => Ordering::Greater,
        (Some(x), Some(y)) => value_as_string(x).cmp(&value_as_string(y)),
    }
}

fn merge_into(target: &mut Value, patch: &Value) {
    if let (Value::Object(target), Value::Object(patch)) = (target, patch) {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        self.enter(Operation::Select, &query.table).await?;

        let tables = self.tables.read();
        let mut rows: Vec<&Value> = tables
            .get(&query.table)
            .map(|rows| rows.iter().filter(|r| Self::matches(r, &query.filters)).collect())
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(rows
            .into_iter()
            .take(limit)
            .map(|row| self.resolve(&tables, row, &query.columns, &query.embeds))
            .collect())
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        self.enter(Operation::Count, table).await?;
        let tables = self.tables.read();
        Ok(tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| Self::matches(r, filters)).count() as u64)
            .unwrap_or(0))
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        self.enter(Operation::Insert, table).await?;

        let row = Self::with_defaults(row);
        let mut tables = self.tables.write();
        let rows = tables.entry(table.to_string()).or_default();
        if self.violates_unique(table, rows, &row, None) {
            return Err(AppError::Conflict(format!(
                "duplicate key value violates unique constraint on {}",
                table
            )));
        }
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<Vec<Value>> {
        self.enter(Operation::Update, table).await?;
        if filters.is_empty() {
            return Err(AppError::bad_request("Refusing to update without a filter"));
        }

        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(Vec::new());
        };

        let targets: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| Self::matches(r, filters))
            .map(|(i, _)| i)
            .collect();

        for &i in &targets {
            let mut candidate = rows[i].clone();
            merge_into(&mut candidate, &patch);
            if self.violates_unique(table, rows, &candidate, Some(i)) {
                return Err(AppError::Conflict(format!(
                    "duplicate key value violates unique constraint on {}",
                    table
                )));
            }
        }

        let mut updated = Vec::with_capacity(targets.len());
        for i in targets {
            merge_into(&mut rows[i], &patch);
            updated.push(rows[i].clone());
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>> {
        self.enter(Operation::Delete, table).await?;
        if filters.is_empty() {
            return Err(AppError::bad_request("Refusing to delete without a filter"));
        }

        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(Vec::new());
        };
        let (removed, kept): (Vec<Value>, Vec<Value>) =
            rows.drain(..).partition(|r| Self::matches(r, filters));
        *rows = kept;
        Ok(removed)
    }

    async fn upsert(&self, table: &str, row: Value, on_conflict: &str) -> Result<Value> {
        self.enter(Operation::Upsert, table).await?;

        let columns: Vec<&str> = on_conflict.split(',').map(|c| c.trim()).collect();
        let filters: Vec<Filter> = columns
            .iter()
            .map(|c| {
                row.get(*c)
                    .map(|v| Filter::eq(c, value_as_string(v)))
                    .ok_or_else(|| AppError::bad_request(&format!("Upsert row is missing {}", c)))
            })
            .collect::<Result<_>>()?;

        // 检查与写入在同一把锁内完成
        let mut tables = self.tables.write();
        let rows = tables.entry(table.to_string()).or_default();
        if let Some(existing) = rows.iter_mut().find(|r| Self::matches(r, &filters)) {
            merge_into(existing, &row);
            return Ok(existing.clone());
        }

        let row = Self::with_defaults(row);
        rows.push(row.clone());
        Ok(row)
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<()> {
        self.enter(Operation::Upload, bucket).await?;

        let key = (bucket.to_string(), path.to_string());
        let mut objects = self.objects.write();
        if !upsert && objects.contains_key(&key) {
            return Err(AppError::Conflict(format!("Object {} already exists", path)));
        }
        objects.insert(
            key,
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/object/public/{}/{}", self.base_url, bucket, path)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        self.enter(Operation::SignIn, "auth").await?;

        let account = self
            .accounts
            .read()
            .get(&email.to_lowercase())
            .cloned()
            .filter(|a| a.password == password)
            .ok_or_else(|| AppError::unauthorized("Invalid login credentials"))?;

        let token = format!("memory-token-{}", Uuid::new_v4());
        self.set_access_token(Some(token.clone()));
        Ok(Session {
            access_token: token,
            refresh_token: None,
            token_type: Some("bearer".to_string()),
            expires_in: Some(3600),
            expires_at: Some(Utc::now().timestamp() + 3600),
            user: account.user,
        })
    }

    async fn sign_out(&self) -> Result<()> {
        self.set_access_token(None);
        Ok(())
    }

    fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write() = token;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_select_with_embeds_and_order() {
        let backend = MemoryBackend::with_app_schema();
        backend.seed("profiles", json!({ "id": "u1", "username": "laila" }));
        backend.seed("posts", json!({ "id": "p1", "user_id": "u1", "created_at": "2026-10-01T00:00:00Z" }));
        backend.seed("posts", json!({ "id": "p2", "user_id": "u1", "created_at": "2026-10-02T00:00:00Z" }));
        backend.seed("post_media", json!({ "post_id": "p2", "media_url": "https://cdn/x.png", "order": 0 }));

        let query = Query::from("posts")
            .embed(Embed::one("profiles", "user_id").columns("id,username"))
            .embed(Embed::many("post_media", "post_id"))
            .order("created_at", false);
        let rows = backend.select(&query).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], "p2");
        assert_eq!(rows[0]["profiles"]["username"], "laila");
        assert_eq!(rows[0]["post_media"].as_array().unwrap().len(), 1);
        assert_eq!(rows[1]["post_media"], json!([]));
    }

    #[tokio::test]
    async fn test_unique_key_conflict() {
        let backend = MemoryBackend::with_app_schema();
        let row = json!({ "follower_id": "a", "following_id": "b" });
        backend.insert("follows", row.clone()).await.unwrap();
        let err = backend.insert("follows", row).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_fail_next_only_once() {
        let backend = MemoryBackend::new();
        backend.fail_next(Operation::Select, Some("posts"));

        assert!(backend.select(&Query::from("posts")).await.is_err());
        assert!(backend.select(&Query::from("posts")).await.is_ok());
        assert_eq!(backend.request_count(), 2);
    }

    #[tokio::test]
    async fn test_upsert_merges_existing_row() {
        let backend = MemoryBackend::new();
        backend
            .upsert("hair_profiles", json!({ "user_id": "u1", "porosity": "Low" }), "user_id")
            .await
            .unwrap();
        let row = backend
            .upsert("hair_profiles", json!({ "user_id": "u1", "porosity": "High" }), "user_id")
            .await
            .unwrap();

        assert_eq!(row["porosity"], "High");
        assert_eq!(backend.rows("hair_profiles").len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete_require_filters() {
        let backend = MemoryBackend::new();
        assert!(backend.update("posts", &[], json!({})).await.is_err());
        assert!(backend.delete("posts", &[]).await.is_err());
    }
}
