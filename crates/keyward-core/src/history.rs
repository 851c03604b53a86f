//! Login event recording and paginated history

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::HistoryConfig;
use crate::error::{AuthError, Result};
use crate::models::{LoginRecord, RefreshTokenRecord, User};
use crate::store::UserStore;

pub struct LoginHistoryRecorder {
    users: Arc<dyn UserStore>,
    config: HistoryConfig,
}

impl LoginHistoryRecorder {
    pub fn new(users: Arc<dyn UserStore>, config: HistoryConfig) -> Self {
        Self { users, config }
    }

    /// Append a login event together with the issuance audit row
    ///
    /// Both rows land in one store transaction, so a history entry never
    /// exists without the issuance that produced it.
    pub async fn record(
        &self,
        user: &User,
        signin_data: Option<String>,
        at: DateTime<Utc>,
        audit: &RefreshTokenRecord,
    ) -> Result<LoginRecord> {
        let record = LoginRecord {
            id: Uuid::new_v4(),
            user_id: user.id,
            login_at: at,
            signin_data,
        };
        self.users.record_sign_in(&record, audit).await?;
        Ok(record)
    }

    /// Page through a user's logins, most recent first
    ///
    /// `page_number` is 1-based. `page_size` defaults to the configured value
    /// and is clamped into the configured range.
    pub async fn history(
        &self,
        login: &str,
        page_number: u32,
        page_size: Option<u32>,
    ) -> Result<Vec<LoginRecord>> {
        if page_number < 1 {
            return Err(AuthError::validation("page_number must be at least 1"));
        }
        let page_size = self.page_size(page_size);

        let user = self
            .users
            .find_by_login(login)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let limit = i64::from(page_size);
        let offset = i64::from(page_number - 1) * limit;
        self.users.login_history(user.id, limit, offset).await
    }

    fn page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.config.default_page_size)
            .clamp(self.config.min_page_size, self.config.max_page_size)
    }
}
