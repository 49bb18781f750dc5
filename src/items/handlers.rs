use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::extractors::{AuthUser, MaybeAuthUser},
    categories::repo::Category,
    error::{AppError, FieldError},
    media,
    state::AppState,
};

use super::dto::{
    CreateItemRequest, HomeResponse, ItemDetail, SearchParams, SearchResponse, UpdateItemRequest,
};
use super::repo::Item;

/// Home page shows at most this many unsold items.
const HOME_ITEM_LIMIT: i64 = 6;
/// Detail page shows at most this many related items.
const RELATED_ITEM_LIMIT: i64 = 3;

const MAX_NAME_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 500;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/home", get(home))
        .route("/items/search", get(search))
        .route("/items/:id", get(detail))
        .route("/dashboard", get(dashboard))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/items", post(create_item))
        .route(
            "/items/:id",
            axum::routing::put(update_item).delete(delete_item),
        )
        .route("/items/:id/image", post(upload_image))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 10MB
}

fn validate_item_fields(
    name: &str,
    description: Option<&str>,
    price: Decimal,
) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if name.trim().is_empty() {
        errors.push(FieldError::new("name", "Name is required"));
    } else if name.chars().count() > MAX_NAME_LEN {
        errors.push(FieldError::new("name", "Name too long"));
    }
    if let Some(description) = description {
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            errors.push(FieldError::new("description", "Description too long"));
        }
    }
    if price < Decimal::ZERO {
        errors.push(FieldError::new("price", "Price must not be negative"));
    }
    errors
}

/// Absent, empty, or zero category means "all categories". The nil UUID
/// is the id-typed spelling of the `0` sentinel.
fn parse_category(raw: Option<&str>) -> Result<Option<Uuid>, AppError> {
    match raw.map(str::trim) {
        None | Some("") | Some("0") => Ok(None),
        Some(s) => s
            .parse::<Uuid>()
            .map(|id| (!id.is_nil()).then_some(id))
            .map_err(|_| AppError::validation("category", "Invalid category")),
    }
}

// --- read handlers ---

#[instrument(skip(state))]
pub async fn home(State(state): State<AppState>) -> Result<Json<HomeResponse>, AppError> {
    let categories = Category::list(&state.db).await?;
    let items = Item::list_available(&state.db, HOME_ITEM_LIMIT).await?;
    Ok(Json(HomeResponse { categories, items }))
}

#[instrument(skip(state))]
pub async fn detail(
    State(state): State<AppState>,
    MaybeAuthUser(user_id): MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ItemDetail>, AppError> {
    let item = Item::get_with_owner(&state.db, id)
        .await?
        .ok_or(AppError::NotFound)?;
    let related =
        Item::list_related(&state.db, item.category_id, item.id, RELATED_ITEM_LIMIT).await?;
    let is_owner = user_id == Some(item.owner_id);
    Ok(Json(ItemDetail {
        item,
        related,
        is_owner,
    }))
}

#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let category = parse_category(params.category.as_deref())?;
    let items = Item::search(&state.db, params.query.as_deref(), category).await?;
    Ok(Json(SearchResponse {
        items,
        query: params.query,
        category,
    }))
}

#[instrument(skip(state))]
pub async fn dashboard(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Item>>, AppError> {
    let items = Item::list_by_owner(&state.db, user_id).await?;
    Ok(Json(items))
}

// --- write handlers ---

#[instrument(skip(state, payload))]
pub async fn create_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateItemRequest>,
) -> Result<(StatusCode, HeaderMap, Json<Item>), AppError> {
    let errors = validate_item_fields(
        &payload.name,
        payload.description.as_deref(),
        payload.price,
    );
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    if !Category::exists(&state.db, payload.category_id).await? {
        return Err(AppError::validation("category_id", "Unknown category"));
    }

    let item = Item::create(
        &state.db,
        user_id,
        payload.category_id,
        payload.name.trim(),
        payload.description.as_deref(),
        payload.price,
    )
    .await?;

    info!(item_id = %item.id, owner_id = %user_id, "item created");

    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::LOCATION,
        crate::app::item_path(item.id)
            .parse()
            .map_err(anyhow::Error::from)?,
    );
    Ok((StatusCode::CREATED, headers, Json(item)))
}

#[instrument(skip(state, payload))]
pub async fn update_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<Json<Item>, AppError> {
    let errors = validate_item_fields(
        &payload.name,
        payload.description.as_deref(),
        payload.price,
    );
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let item = Item::update(
        &state.db,
        id,
        user_id,
        payload.name.trim(),
        payload.description.as_deref(),
        payload.price,
        payload.is_sold,
    )
    .await?
    .ok_or(AppError::NotFound)?;

    info!(item_id = %item.id, "item updated");
    Ok(Json(item))
}

#[instrument(skip(state))]
pub async fn delete_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let image = Item::delete(&state.db, id, user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    if let Some(key) = image {
        if let Err(e) = state.media.delete(&key).await {
            warn!(error = %e, key = %key, "failed to remove item image");
        }
    }

    info!(item_id = %id, owner_id = %user_id, "item deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /items/:id/image (multipart, field `image`)
#[instrument(skip(state, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    mut mp: Multipart,
) -> Result<Json<Item>, AppError> {
    // Ownership check before touching the media store.
    let previous = Item::get_owned(&state.db, id, user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut upload = None;
    while let Ok(Some(field)) = mp.next_field().await {
        if field.name() == Some("image") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|_| AppError::validation("image", "Unreadable upload"))?;
            upload = Some((filename, data));
        }
    }
    let Some((filename, data)) = upload else {
        return Err(AppError::validation("image", "An image file is required"));
    };
    if data.is_empty() {
        return Err(AppError::validation("image", "Uploaded file is empty"));
    }

    let key = media::image_key(id, &filename);
    state
        .media
        .put(&key, data)
        .await
        .map_err(|e| {
            warn!(error = %e, item_id = %id, "media store rejected upload");
            AppError::validation("image", "Could not store the image")
        })?;

    let item = Item::set_image(&state.db, id, user_id, &key)
        .await?
        .ok_or(AppError::NotFound)?;

    if let Some(old) = previous.image {
        if let Err(e) = state.media.delete(&old).await {
            warn!(error = %e, key = %old, "failed to remove replaced image");
        }
    }

    info!(item_id = %id, key = %key, "item image uploaded");
    Ok(Json(item))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_fields_validate_cleanly() {
        let errors = validate_item_fields("Bike", Some("A decent city bike"), Decimal::new(1000, 1));
        assert!(errors.is_empty());
    }

    #[test]
    fn item_name_is_required() {
        let errors = validate_item_fields("   ", None, Decimal::ZERO);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "name");
    }

    #[test]
    fn negative_price_is_rejected() {
        let errors = validate_item_fields("Bike", None, Decimal::new(-1, 0));
        assert!(errors.iter().any(|e| e.field == "price"));
    }

    #[test]
    fn oversized_description_is_rejected() {
        let long = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        let errors = validate_item_fields("Bike", Some(&long), Decimal::ONE);
        assert!(errors.iter().any(|e| e.field == "description"));
    }

    #[test]
    fn limits_count_characters_not_bytes() {
        // Multi-byte text at exactly the limit must pass.
        let name = "é".repeat(MAX_NAME_LEN);
        let description = "ü".repeat(MAX_DESCRIPTION_LEN);
        let errors = validate_item_fields(&name, Some(&description), Decimal::ONE);
        assert!(errors.is_empty());

        let errors = validate_item_fields(&format!("{name}é"), None, Decimal::ONE);
        assert!(errors.iter().any(|e| e.field == "name"));
    }

    #[test]
    fn category_param_absent_or_empty_means_all() {
        assert_eq!(parse_category(None).unwrap(), None);
        assert_eq!(parse_category(Some("")).unwrap(), None);
        assert_eq!(parse_category(Some("  ")).unwrap(), None);
    }

    #[test]
    fn category_param_zero_means_all() {
        assert_eq!(parse_category(Some("0")).unwrap(), None);
        assert_eq!(
            parse_category(Some(&Uuid::nil().to_string())).unwrap(),
            None
        );
    }

    #[test]
    fn category_param_parses_uuid_and_rejects_garbage() {
        let id = Uuid::new_v4();
        assert_eq!(
            parse_category(Some(&id.to_string())).unwrap(),
            Some(id)
        );
        assert!(parse_category(Some("not-a-uuid")).is_err());
    }
}
