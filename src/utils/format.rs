use chrono::{DateTime, Utc};

pub const ALL_CATEGORIES: &str = "all";

/// 相对时间显示，例如 "20m ago"
pub fn time_ago(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(created_at) = created_at else {
        return String::new();
    };

    let diff_mins = (now - created_at).num_minutes();
    let diff_hours = diff_mins / 60;
    let diff_days = diff_hours / 24;

    if diff_mins < 1 {
        "Just now".to_string()
    } else if diff_mins < 60 {
        format!("{}m ago", diff_mins)
    } else if diff_hours < 24 {
        format!("{}h ago", diff_hours)
    } else if diff_days < 7 {
        format!("{}d ago", diff_days)
    } else {
        created_at.format("%-m/%-d/%Y").to_string()
    }
}

/// 分类标签：首字母大写，"all" 显示为 "All Posts"
pub fn category_label(category: &str) -> String {
    if category == ALL_CATEGORIES {
        return "All Posts".to_string();
    }

    let mut chars = category.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// 头像占位的首字母
pub fn initial(name: &str) -> String {
    name.chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_time_ago_buckets() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();

        assert_eq!(time_ago(None, now), "");
        assert_eq!(time_ago(Some(now - Duration::seconds(30)), now), "Just now");
        assert_eq!(time_ago(Some(now - Duration::minutes(20)), now), "20m ago");
        assert_eq!(time_ago(Some(now - Duration::hours(3)), now), "3h ago");
        assert_eq!(time_ago(Some(now - Duration::days(2)), now), "2d ago");
        assert_eq!(time_ago(Some(now - Duration::days(30)), now), "9/19/2026");
    }

    #[test]
    fn test_category_label() {
        assert_eq!(category_label("all"), "All Posts");
        assert_eq!(category_label("braids"), "Braids");
        assert_eq!(category_label(""), "");
    }

    #[test]
    fn test_initial() {
        assert_eq!(initial("laila"), "L");
        assert_eq!(initial(""), "");
    }
}
