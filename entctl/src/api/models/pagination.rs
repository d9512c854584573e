//! Paging and sorting contract for list endpoints.
//!
//! Query parameters (`page`, `per_page`, `sort_by`, `order`) are parsed into a
//! [`PageRequest`] before the handler runs. A request with none of the four
//! parameters gets no `PageRequest` at all; downstream code treats that as
//! "return everything, unordered".
//!
//! Validation is strict: a malformed or non-positive value is a 400 naming the
//! offending field, never a silent clamp to something sensible.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::config::PagingConfig;
use crate::errors::Error;

/// Page number used when `per_page` is supplied without `page`.
pub const DEFAULT_PAGE: i32 = 1;

/// Sort direction for list endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Ascending => write!(f, "ascending"),
            Order::Descending => write!(f, "descending"),
        }
    }
}

impl Order {
    /// Parse an order token, case-insensitively. Both the short and long
    /// spellings are accepted.
    fn parse(token: &str) -> Result<Self, Error> {
        match token.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Order::Ascending),
            "desc" | "descending" => Ok(Order::Descending),
            _ => Err(Error::BadRequest {
                message: "order must be 'ascending' or 'descending'".to_string(),
            }),
        }
    }

    /// SQL keyword for this direction.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Order::Ascending => "ASC",
            Order::Descending => "DESC",
        }
    }
}

/// A validated paging/sorting directive for one request.
///
/// `page` and `per_page` are `Some` only when the request is paging; a
/// sort-only request carries `paging: false` with both fields `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PageRequest {
    pub page: Option<i32>,
    pub per_page: Option<i32>,
    pub sort_by: Option<String>,
    pub order: Order,
    /// True iff `page` or `per_page` appeared in the query. Sorting without
    /// paging leaves this false: apply the sort, return the full set.
    pub paging: bool,
}

impl PageRequest {
    /// Row offset for a paging request, or `None` for sort-only requests.
    pub fn offset(&self) -> Option<i64> {
        match (self.paging, self.page, self.per_page) {
            (true, Some(page), Some(per_page)) => Some(i64::from(page - 1) * i64::from(per_page)),
            _ => None,
        }
    }

    /// Row limit for a paging request, or `None` for sort-only requests.
    pub fn limit(&self) -> Option<i64> {
        if self.paging { self.per_page.map(i64::from) } else { None }
    }
}

fn parse_positive_int(field: &str, raw: &str) -> Result<i32, Error> {
    let value: i32 = raw.parse().map_err(|_| Error::BadRequest {
        message: format!("{field} must be an integer value"),
    })?;
    if value <= 0 {
        return Err(Error::BadRequest {
            message: format!("{field} must be greater than zero"),
        });
    }
    Ok(value)
}

/// Parse the paging contract out of a raw query string.
///
/// Returns `Ok(None)` when none of the four parameters are present. When
/// exactly one of `page`/`per_page` is supplied, the other is defaulted (the
/// configured per-page default, or page 1). Defaulting never applies to a
/// supplied-but-invalid value.
pub fn parse_page_request(query: Option<&str>, paging: &PagingConfig) -> Result<Option<PageRequest>, Error> {
    let mut page_raw: Option<String> = None;
    let mut per_page_raw: Option<String> = None;
    let mut sort_by: Option<String> = None;
    let mut order_raw: Option<String> = None;

    // Parameter names are case-sensitive; unknown parameters are ignored and
    // a duplicated parameter keeps its first occurrence.
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or("").as_bytes()) {
        let slot = match key.as_ref() {
            "page" => &mut page_raw,
            "per_page" => &mut per_page_raw,
            "sort_by" => &mut sort_by,
            "order" => &mut order_raw,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value.into_owned());
        }
    }

    if page_raw.is_none() && per_page_raw.is_none() && sort_by.is_none() && order_raw.is_none() {
        return Ok(None);
    }

    let page = page_raw.as_deref().map(|raw| parse_positive_int("page", raw)).transpose()?;
    let per_page = per_page_raw
        .as_deref()
        .map(|raw| parse_positive_int("per_page", raw))
        .transpose()?;

    if let Some(per_page) = per_page
        && per_page > paging.max_per_page
    {
        return Err(Error::BadRequest {
            message: format!("per_page must be at most {}", paging.max_per_page),
        });
    }

    let order = order_raw.as_deref().map(Order::parse).transpose()?.unwrap_or_default();

    // Either of the pair present means paging; the missing half gets the
    // configured default, invalid halves were already rejected above.
    let is_paging = page.is_some() || per_page.is_some();
    let (page, per_page) = if is_paging {
        (
            Some(page.unwrap_or(DEFAULT_PAGE)),
            Some(per_page.unwrap_or(paging.default_per_page)),
        )
    } else {
        (None, None)
    };

    Ok(Some(PageRequest {
        page,
        per_page,
        sort_by,
        order,
        paging: is_paging,
    }))
}
