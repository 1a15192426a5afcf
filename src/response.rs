//! Standard response envelope helpers.

use crate::query::Page;
use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub success: bool,
    pub data: T,
}

/// Listing envelope: page items plus pagination metadata and the echoed query.
#[derive(Serialize)]
pub struct SuccessPage<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub total_pages: u64,
    pub page: i64,
    pub size: i64,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
}

pub fn success_one<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::OK, Json(SuccessOne { success: true, data }))
}

pub fn success_page<T: Serialize>(
    page: Page<T>,
    filter: Option<String>,
    order: Option<String>,
) -> (StatusCode, Json<SuccessPage<T>>) {
    (
        StatusCode::OK,
        Json(SuccessPage {
            success: true,
            data: page.items,
            total_pages: page.total_pages,
            page: page.page,
            size: page.size,
            count: page.count,
            filter,
            order,
        }),
    )
}
