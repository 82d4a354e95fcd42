use sea_orm::{
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, sea_query::Expr,
};

use crate::{
    EngineError, Notification, ResultEngine, notifications,
    pagination::{Page, PageRequest},
};

use super::Engine;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NotificationFilter {
    /// Exact match on the dotted event tag.
    pub kind: Option<String>,
    pub is_read: Option<bool>,
}

impl NotificationFilter {
    #[must_use]
    pub fn unread() -> Self {
        Self {
            kind: None,
            is_read: Some(false),
        }
    }
}

impl Engine {
    /// The user's notifications, newest first.
    pub async fn notifications(
        &self,
        user_id: i32,
        filter: NotificationFilter,
        page: PageRequest,
    ) -> ResultEngine<Page<Notification>> {
        let page = page.validate()?;
        let mut query =
            notifications::Entity::find().filter(notifications::Column::UserId.eq(user_id));
        if let Some(kind) = filter.kind {
            query = query.filter(notifications::Column::Kind.eq(kind));
        }
        if let Some(is_read) = filter.is_read {
            query = query.filter(notifications::Column::IsRead.eq(is_read));
        }

        let paginator = query
            .order_by_desc(notifications::Column::CreatedAt)
            .order_by_desc(notifications::Column::Id)
            .paginate(&self.database, page.per_page);
        let total = paginator.num_items().await?;
        let items = paginator
            .fetch_page(page.page - 1)
            .await?
            .into_iter()
            .map(Notification::from)
            .collect();

        Ok(Page::new(items, page, total))
    }

    /// Mark one notification as read. Notifications of other users are
    /// reported as missing.
    pub async fn mark_notification_read(
        &self,
        user_id: i32,
        notification_id: i32,
    ) -> ResultEngine<Notification> {
        let result = notifications::Entity::update_many()
            .col_expr(notifications::Column::IsRead, Expr::value(true))
            .filter(notifications::Column::Id.eq(notification_id))
            .filter(notifications::Column::UserId.eq(user_id))
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::KeyNotFound(format!(
                "notification {notification_id}"
            )));
        }

        notifications::Entity::find_by_id(notification_id)
            .one(&self.database)
            .await?
            .map(Notification::from)
            .ok_or_else(|| EngineError::KeyNotFound(format!("notification {notification_id}")))
    }

    /// Mark every unread notification of the user as read and return how
    /// many changed.
    pub async fn mark_all_notifications_read(&self, user_id: i32) -> ResultEngine<u64> {
        let result = notifications::Entity::update_many()
            .col_expr(notifications::Column::IsRead, Expr::value(true))
            .filter(notifications::Column::UserId.eq(user_id))
            .filter(notifications::Column::IsRead.eq(false))
            .exec(&self.database)
            .await?;
        tracing::debug!(user_id, marked = result.rows_affected, "notifications read");
        Ok(result.rows_affected)
    }
}
