//! Storage/auth collaborator: table CRUD, object storage and password auth.
//!
//! `RestBackend` speaks the hosted service's REST conventions;
//! `MemoryBackend` keeps tables in process for tests and offline demos.

pub mod memory;
pub mod query;
pub mod rest;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::session::Session;

pub use memory::MemoryBackend;
pub use query::{Cardinality, Embed, Filter, Order, Query};
pub use rest::RestBackend;

#[async_trait]
pub trait Backend: Send + Sync {
    /// 查询记录（含嵌入关系）
    async fn select(&self, query: &Query) -> Result<Vec<Value>>;

    /// 统计匹配过滤条件的记录数
    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64>;

    /// 插入记录并返回存储后的行
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    /// 合并更新所有匹配的记录，返回更新后的行
    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<Vec<Value>>;

    /// 删除所有匹配的记录，返回被删除的行
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>>;

    /// Single-request insert-or-update keyed on the `on_conflict` columns.
    async fn upsert(&self, table: &str, row: Value, on_conflict: &str) -> Result<Value>;

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<()>;

    fn public_url(&self, bucket: &str, path: &str) -> String;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_out(&self) -> Result<()>;

    /// 后续请求使用的访问令牌；None 表示匿名访问
    fn set_access_token(&self, token: Option<String>);
}
