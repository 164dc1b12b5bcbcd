/// 表查询描述：选择列、嵌入关系、过滤条件和排序

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq(String, String),
}

impl Filter {
    pub fn eq(column: &str, value: impl ToString) -> Self {
        Filter::Eq(column.to_string(), value.to_string())
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(column, _) => column,
        }
    }

    /// PostgREST 查询参数，例如 ("user_id", "eq.u1")
    pub fn to_param(&self) -> (String, String) {
        match self {
            Filter::Eq(column, value) => (column.clone(), format!("eq.{}", value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// Related rows whose `remote_column` equals this row's `local_column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub relation: String,
    pub columns: String,
    pub local_column: String,
    pub remote_column: String,
    pub cardinality: Cardinality,
    pub embeds: Vec<Embed>,
}

impl Embed {
    /// 子表指向当前行，例如 hair_profiles.user_id = profiles.id
    pub fn many(relation: &str, remote_column: &str) -> Self {
        Self {
            relation: relation.to_string(),
            columns: "*".to_string(),
            local_column: "id".to_string(),
            remote_column: remote_column.to_string(),
            cardinality: Cardinality::Many,
            embeds: Vec::new(),
        }
    }

    /// 当前行指向父表，例如 posts.user_id = profiles.id
    pub fn one(relation: &str, local_column: &str) -> Self {
        Self {
            relation: relation.to_string(),
            columns: "*".to_string(),
            local_column: local_column.to_string(),
            remote_column: "id".to_string(),
            cardinality: Cardinality::One,
            embeds: Vec::new(),
        }
    }

    pub fn columns(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    fn select_clause(&self) -> String {
        let mut parts = vec![self.columns.clone()];
        parts.extend(self.embeds.iter().map(|e| e.select_clause()));
        format!("{}({})", self.relation, parts.join(","))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub table: String,
    pub columns: String,
    pub embeds: Vec<Embed>,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: "*".to_string(),
            embeds: Vec::new(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn select_clause(&self) -> String {
        let mut parts = vec![self.columns.clone()];
        parts.extend(self.embeds.iter().map(|e| e.select_clause()));
        parts.join(",")
    }

    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.select_clause())];
        params.extend(self.filters.iter().map(|f| f.to_param()));
        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_select_clause() {
        let query = Query::from("saved_posts")
            .embed(
                Embed::one("posts", "post_id")
                    .embed(Embed::one("profiles", "user_id").columns("id,username,avatar_url,full_name"))
                    .embed(Embed::many("post_media", "post_id")),
            )
            .eq("user_id", "u1")
            .order("created_at", false);

        assert_eq!(
            query.select_clause(),
            "*,posts(*,profiles(id,username,avatar_url,full_name),post_media(*))"
        );

        let params = query.to_params();
        assert!(params.contains(&("user_id".to_string(), "eq.u1".to_string())));
        assert!(params.contains(&("order".to_string(), "created_at.desc".to_string())));
    }

    #[test]
    fn test_limit_param() {
        let params = Query::from("hair_profiles").select("id").eq("user_id", 5).limit(1).to_params();
        assert_eq!(
            params,
            vec![
                ("select".to_string(), "id".to_string()),
                ("user_id".to_string(), "eq.5".to_string()),
                ("limit".to_string(), "1".to_string()),
            ]
        );
    }
}
