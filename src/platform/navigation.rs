use parking_lot::Mutex;
use tracing::debug;

use crate::models::post::Post;

/// 可导航的界面及其参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    MainTabs,
    UserProfile { user_id: String, is_stylist: bool },
}

#[cfg_attr(test, mockall::automock)]
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
    fn go_back(&self);
}

/// 简单的栈式导航，根界面为 MainTabs
pub struct StackNavigator {
    stack: Mutex<Vec<Route>>,
}

impl StackNavigator {
    pub fn new() -> Self {
        Self {
            stack: Mutex::new(vec![Route::MainTabs]),
        }
    }

    pub fn current(&self) -> Route {
        self.stack.lock().last().cloned().unwrap_or(Route::MainTabs)
    }

    pub fn depth(&self) -> usize {
        self.stack.lock().len()
    }
}

impl Default for StackNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for StackNavigator {
    fn navigate(&self, route: Route) {
        debug!("Navigating to {:?}", route);
        self.stack.lock().push(route);
    }

    /// The root screen is never popped.
    fn go_back(&self) {
        let mut stack = self.stack.lock();
        if stack.len() > 1 {
            stack.pop();
        }
    }
}

/// 打开帖子作者的主页
pub fn open_author(navigator: &dyn Navigator, post: &Post) {
    navigator.navigate(Route::UserProfile {
        user_id: post.author_id().to_string(),
        is_stylist: false,
    });
}

/// 打开帖子关联发型师的主页；没有发型师时返回 false
pub fn open_stylist(navigator: &dyn Navigator, post: &Post) -> bool {
    let stylist_id = post
        .stylists
        .as_ref()
        .map(|s| s.id.clone())
        .or_else(|| post.stylist_id.clone());

    match stylist_id {
        Some(user_id) => {
            navigator.navigate(Route::UserProfile {
                user_id,
                is_stylist: true,
            });
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use serde_json::json;

    fn post(stylist_id: Option<&str>) -> Post {
        serde_json::from_value(json!({
            "id": "p1",
            "user_id": "u1",
            "stylist_id": stylist_id,
            "profiles": { "id": "u1", "username": "kinkycoily" }
        }))
        .unwrap()
    }

    #[test]
    fn test_stack_navigator() {
        let nav = StackNavigator::new();
        nav.go_back();
        assert_eq!(nav.depth(), 1);

        open_author(&nav, &post(None));
        assert_eq!(
            nav.current(),
            Route::UserProfile {
                user_id: "u1".to_string(),
                is_stylist: false
            }
        );

        nav.go_back();
        assert_eq!(nav.current(), Route::MainTabs);
    }

    #[test]
    fn test_open_stylist() {
        let mut nav = MockNavigator::new();
        nav.expect_navigate()
            .with(eq(Route::UserProfile {
                user_id: "s9".to_string(),
                is_stylist: true,
            }))
            .times(1)
            .return_const(());

        assert!(open_stylist(&nav, &post(Some("s9"))));
        assert!(!open_stylist(&nav, &post(None)));
    }
}
