//! Paging and sorting shared by list endpoints.
//!
//! Sort fields arrive as client strings and are mapped onto a fixed set of SQL
//! column expressions, so nothing user-supplied is ever spliced into a query.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("desc") => Ok(Self::Desc),
            Some("asc") => Ok(Self::Asc),
            Some(other) => Err(AppError::invalid(format!(
                "invalid sort direction '{other}', expected asc or desc"
            ))),
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Query-string paging parameters: `?page=0&size=20&sort_by=created_at&direction=desc`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
}

/// Validated paging request with the ORDER BY already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
    pub sort_column: &'static str,
    pub direction: SortDirection,
}

impl PageRequest {
    /// `columns` maps accepted `sort_by` names to SQL expressions; the first entry is the default.
    pub fn resolve(
        params: &PageParams,
        columns: &[(&str, &'static str)],
    ) -> Result<Self, AppError> {
        let page = params.page.unwrap_or(0);
        if page < 0 {
            return Err(AppError::invalid("page must not be negative"));
        }
        let size = params
            .size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let sort_column = match params.sort_by.as_deref().map(str::trim) {
            None | Some("") => columns[0].1,
            Some(name) => columns
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name) || camel_matches(k, name))
                .map(|(_, col)| *col)
                .ok_or_else(|| AppError::invalid(format!("cannot sort by '{name}'")))?,
        };

        Ok(Self {
            page,
            size,
            sort_column,
            direction: SortDirection::parse(params.direction.as_deref())?,
        })
    }

    pub fn offset(&self) -> i64 {
        self.page.saturating_mul(self.size)
    }

    pub fn order_by(&self) -> String {
        format!("{} {}", self.sort_column, self.direction.as_sql())
    }
}

// accepts `createdAt` for `created_at`
fn camel_matches(snake: &str, candidate: &str) -> bool {
    let squashed: String = snake.chars().filter(|c| *c != '_').collect();
    squashed.eq_ignore_ascii_case(candidate)
}

/// Page envelope returned by list endpoints.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: i64,
    pub size: i64,
    pub total_elements: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, req: &PageRequest, total_elements: i64) -> Self {
        let total_pages = if total_elements <= 0 {
            0
        } else {
            (total_elements + req.size - 1) / req.size
        };
        Self {
            content,
            page: req.page,
            size: req.size,
            total_elements,
            total_pages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
