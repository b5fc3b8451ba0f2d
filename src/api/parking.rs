use super::AppState;
use crate::db::{Database, Row};
use crate::error::AppError;
use crate::params;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateParkingLot {
    pub name: String,
    pub location: String,
    pub total_spaces: i64,
    pub price_per_hour: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParkingLot {
    pub name: String,
    pub location: String,
    pub total_spaces: i64,
    pub available_spaces: i64,
    pub price_per_hour: f64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_parking_lots).post(create_parking_lot))
        .route(
            "/:id",
            get(get_parking_lot)
                .put(update_parking_lot)
                .delete(delete_parking_lot),
        )
}

pub async fn list_parking_lots(
    Extension(db): Extension<Arc<Database>>,
) -> Result<Json<Vec<Row>>, AppError> {
    let lots = db
        .query("SELECT * FROM parking_lots ORDER BY id", &[])
        .await?;
    Ok(Json(lots))
}

pub async fn get_parking_lot(
    id: Result<Path<i64>, PathRejection>,
    Extension(db): Extension<Arc<Database>>,
) -> Result<Json<Row>, AppError> {
    let Path(id) = id?;
    db.query("SELECT * FROM parking_lots WHERE id = ?", &params![id])
        .await?
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Parking lot {} not found", id)))
}

pub async fn create_parking_lot(
    Extension(db): Extension<Arc<Database>>,
    body: Result<Json<CreateParkingLot>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(body) = body?;
    validate(&body.name, &body.location, body.total_spaces, body.price_per_hour)?;

    // A new lot starts empty.
    let result = db
        .run(
            "INSERT INTO parking_lots (name, location, total_spaces, available_spaces, price_per_hour) VALUES (?, ?, ?, ?, ?) RETURNING id",
            &params![
                body.name,
                body.location,
                body.total_spaces,
                body.total_spaces,
                body.price_per_hour
            ],
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Parking lot created",
            "id": result.id,
        })),
    ))
}

pub async fn update_parking_lot(
    id: Result<Path<i64>, PathRejection>,
    Extension(db): Extension<Arc<Database>>,
    body: Result<Json<UpdateParkingLot>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(id) = id?;
    let Json(body) = body?;
    validate(&body.name, &body.location, body.total_spaces, body.price_per_hour)?;
    check_spaces("availableSpaces", body.available_spaces)?;

    let result = db
        .run(
            "UPDATE parking_lots SET name = ?, location = ?, total_spaces = ?, available_spaces = ?, price_per_hour = ? WHERE id = ?",
            &params![
                body.name,
                body.location,
                body.total_spaces,
                body.available_spaces,
                body.price_per_hour,
                id
            ],
        )
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!("Parking lot {} not found", id)));
    }
    Ok(Json(json!({"message": "Parking lot updated"})))
}

pub async fn delete_parking_lot(
    id: Result<Path<i64>, PathRejection>,
    Extension(db): Extension<Arc<Database>>,
) -> Result<Json<Value>, AppError> {
    let Path(id) = id?;
    let result = db
        .run("DELETE FROM parking_lots WHERE id = ?", &params![id])
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!("Parking lot {} not found", id)));
    }
    Ok(Json(json!({"message": "Parking lot deleted"})))
}

/// Largest count an `INTEGER` column holds.
const MAX_SPACES: i64 = i32::MAX as i64;
/// `price_per_hour` is `DECIMAL(10,2)`.
const MAX_PRICE: f64 = 99_999_999.99;

fn validate(name: &str, location: &str, total_spaces: i64, price_per_hour: f64) -> Result<(), AppError> {
    if name.trim().is_empty() || location.trim().is_empty() {
        return Err(AppError::BadRequest("name and location are required".into()));
    }
    check_spaces("totalSpaces", total_spaces)?;
    if !price_per_hour.is_finite() || !(0.0..=MAX_PRICE).contains(&price_per_hour) {
        return Err(AppError::BadRequest(format!(
            "pricePerHour must be between 0 and {}",
            MAX_PRICE
        )));
    }
    Ok(())
}

fn check_spaces(field: &str, spaces: i64) -> Result<(), AppError> {
    if !(0..=MAX_SPACES).contains(&spaces) {
        return Err(AppError::BadRequest(format!(
            "{} must be between 0 and {}",
            field, MAX_SPACES
        )));
    }
    Ok(())
}
