//! REST API for the load planner.
//!
//! Exposes trucks, tours, capacity planning and interactive layout sessions
//! over HTTP. Uses Axum as the web framework and supports CORS.
//!
//! A layout session lives in server memory between requests. Every mutating
//! session endpoint answers with the session's current snapshot, so a client
//! can redraw after each call without keeping its own copy of the layout.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, State};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::capacity::{CapacityError, SelectedCapacity, min_trucks_for, selected_capacity};
use crate::config::ApiConfig;
use crate::fleet::{FleetAssignment, TruckLoad, assign_tour};
use crate::model::{
    Article, BoxId, Cargo, CargoBox, LoadTotals, PlacedBox, Placement, Tour, Truck, TruckId,
    UnplacedBox,
};
use crate::packer::LayoutConfig;
use crate::session::{
    CommittedLayout, CommittedPlacement, LayoutSession, LayoutSnapshot, MoveOutcome, SessionError,
};
use crate::store::{LayoutStore, StoreError};
use crate::types::{Bed, Point, Rect};

/// An open editing session and the tour it belongs to.
struct SessionEntry {
    tour_id: String,
    session: LayoutSession,
}

#[derive(Clone)]
pub struct ApiState {
    store: Arc<dyn LayoutStore>,
    layout_config: LayoutConfig,
    sessions: Arc<Mutex<HashMap<String, SessionEntry>>>,
}

impl ApiState {
    pub fn new(store: Arc<dyn LayoutStore>, layout_config: LayoutConfig) -> Self {
        Self {
            store,
            layout_config,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn sessions(&self) -> Result<MutexGuard<'_, HashMap<String, SessionEntry>>, Response> {
        self.sessions.lock().map_err(|_| {
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Session registry unavailable",
                "lock poisoned",
            )
        })
    }

    /// Runs `f` against one open session.
    fn with_session<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut SessionEntry) -> Result<T, Response>,
    ) -> Result<T, Response> {
        let mut sessions = self.sessions()?;
        let entry = sessions.get_mut(session_id).ok_or_else(|| {
            error_response(
                StatusCode::NOT_FOUND,
                "Unknown session",
                format!("No open session '{}'", session_id),
            )
        })?;
        f(entry)
    }
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/ on 2025-10-29.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>truck-planner API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Tour with its load totals.
#[derive(Serialize, ToSchema)]
pub struct TourResponse {
    pub tour: Tour,
    pub totals: LoadTotals,
    /// Totals of the boxes not yet assigned to a truck.
    pub pool_totals: LoadTotals,
}

impl TourResponse {
    fn from_tour(tour: Tour) -> Self {
        Self {
            totals: tour.totals(),
            pool_totals: tour.pool_totals(),
            tour,
        }
    }
}

/// Declares `quantity` pieces of an article for a tour.
#[derive(Deserialize, ToSchema)]
#[schema(example = json!({
    "article": {
        "name": "Fliesen 60x60", "weight_per_piece_kg": 2.5, "pieces_per_box": 40,
        "length_cm": 120.0, "width_cm": 80.0, "crate_weight_kg": 25.0
    },
    "quantity": 100,
    "preview_only": false
}))]
pub struct ArticleRequest {
    pub article: Article,
    pub quantity: u32,
    /// Only compute the totals the boxes would add.
    #[serde(default)]
    pub preview_only: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ArticleResponse {
    /// Boxes created by this request; empty for a preview.
    pub added: Vec<CargoBox>,
    pub preview: LoadTotals,
    pub tour_totals: LoadTotals,
}

#[derive(Deserialize, ToSchema)]
#[schema(example = json!({"truck_ids": ["t1", "t2", "t3"], "selected_truck_ids": ["t1"]}))]
pub struct CapacityRequest {
    /// Candidate fleet; all known trucks when absent.
    #[serde(default)]
    #[schema(nullable = true)]
    pub truck_ids: Option<Vec<TruckId>>,
    /// Trucks picked so far, summarized against the tour's demand.
    #[serde(default)]
    pub selected_truck_ids: Vec<TruckId>,
}

#[derive(Serialize, ToSchema)]
pub struct CapacityResponse {
    pub required: LoadTotals,
    /// `null` if even the whole candidate fleet is too small.
    pub min_trucks: Option<usize>,
    pub selected: SelectedCapacity,
}

#[derive(Deserialize, ToSchema)]
#[schema(example = json!({"truck_ids": ["t1", "t2"]}))]
pub struct AssignRequest {
    /// Trucks to fill, in order.
    pub truck_ids: Vec<TruckId>,
}

#[derive(Deserialize, ToSchema)]
#[schema(example = json!({"truck_id": "t2"}))]
pub struct MoveBoxRequest {
    /// Target truck; `null` sends the box back to the pool.
    #[serde(default)]
    pub truck_id: Option<TruckId>,
}

#[derive(Deserialize, ToSchema)]
#[schema(example = json!({"tour_id": "tour-1", "truck_id": "t1"}))]
pub struct CreateSessionRequest {
    pub tour_id: String,
    pub truck_id: TruckId,
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub session_id: String,
    pub tour_id: String,
    pub snapshot: LayoutSnapshot,
}

/// Selects by id, or by the front-most box under `point`. Neither clears the selection.
#[derive(Deserialize, ToSchema)]
pub struct SelectRequest {
    #[serde(default)]
    #[schema(nullable = true)]
    pub box_id: Option<BoxId>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub point: Option<Point>,
}

/// Pointer-down on the bed. Without `box_id`, the box under the pointer is grabbed.
#[derive(Deserialize, ToSchema)]
#[schema(example = json!({"pointer": {"x": 1.2, "y": 0.4}}))]
pub struct BeginDragRequest {
    #[serde(default)]
    #[schema(nullable = true)]
    pub box_id: Option<BoxId>,
    pub pointer: Point,
}

#[derive(Deserialize, ToSchema)]
#[schema(example = json!({"pointer": {"x": 2.0, "y": 0.4}}))]
pub struct PointerRequest {
    pub pointer: Point,
}

/// Rotates the given box, or the selected one when `box_id` is absent.
#[derive(Deserialize, Default, ToSchema)]
pub struct RotateRequest {
    #[serde(default)]
    #[schema(nullable = true)]
    pub box_id: Option<BoxId>,
}

#[derive(Serialize, ToSchema)]
pub struct MutationResponse {
    pub outcome: MoveOutcome,
    pub snapshot: LayoutSnapshot,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid input data",
        details,
    )
}

fn store_error(err: StoreError) -> Response {
    match err {
        StoreError::TourNotFound(_) => {
            error_response(StatusCode::NOT_FOUND, "Unknown tour", err.to_string())
        }
        other => {
            error!("Store access failed: {}", other);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Storage failure",
                other.to_string(),
            )
        }
    }
}

fn session_error(err: SessionError) -> Response {
    let status = match err {
        SessionError::UnknownBox(_) => StatusCode::NOT_FOUND,
        SessionError::NotPlaced(_)
        | SessionError::NotInOverflow(_)
        | SessionError::NoActiveDrag
        | SessionError::NoSelection => StatusCode::CONFLICT,
    };
    error_response(status, "Layout command rejected", err.to_string())
}

fn capacity_error(err: CapacityError) -> Response {
    validation_error(err.to_string())
}

fn parse_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload.map(|Json(value)| value).map_err(json_deserialize_error)
}

fn into_response<T: Serialize>(result: Result<T, Response>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(response) => response,
    }
}

/// Looks up trucks by id, keeping the requested order.
fn resolve_trucks(all: &[Truck], ids: &[TruckId]) -> Result<Vec<Truck>, Response> {
    ids.iter()
        .map(|id| {
            all.iter().find(|t| &t.id == id).cloned().ok_or_else(|| {
                error_response(
                    StatusCode::NOT_FOUND,
                    "Unknown truck",
                    format!("No truck with id '{}'", id),
                )
            })
        })
        .collect()
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handle_list_trucks,
        handle_get_tour,
        handle_add_articles,
        handle_move_box,
        handle_remove_box,
        handle_capacity,
        handle_assign,
        handle_create_session,
        handle_get_session,
        handle_close_session,
        handle_select,
        handle_begin_drag,
        handle_drag_move,
        handle_end_drag,
        handle_rotate,
        handle_auto_layout,
        handle_place_overflow,
        handle_commit
    ),
    components(
        schemas(
            Truck,
            Tour,
            Cargo,
            CargoBox,
            Placement,
            PlacedBox,
            UnplacedBox,
            Article,
            LoadTotals,
            Bed,
            Point,
            Rect,
            TourResponse,
            ArticleRequest,
            ArticleResponse,
            CapacityRequest,
            CapacityResponse,
            SelectedCapacity,
            AssignRequest,
            MoveBoxRequest,
            FleetAssignment,
            TruckLoad,
            CreateSessionRequest,
            SessionResponse,
            SelectRequest,
            BeginDragRequest,
            PointerRequest,
            RotateRequest,
            MutationResponse,
            MoveOutcome,
            LayoutSnapshot,
            CommittedLayout,
            CommittedPlacement,
            ErrorResponse
        )
    ),
    tags(
        (name = "tours", description = "Trucks, tours and capacity planning"),
        (name = "layout", description = "Interactive load bed editing")
    )
)]
struct ApiDoc;

/// Builds the router with all API routes.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        // Trucks and tours
        .route("/trucks", get(handle_list_trucks))
        .route("/tours/{tour_id}", get(handle_get_tour))
        .route("/tours/{tour_id}/articles", post(handle_add_articles))
        .route(
            "/tours/{tour_id}/boxes/{box_id}",
            put(handle_move_box).delete(handle_remove_box),
        )
        .route("/tours/{tour_id}/capacity", post(handle_capacity))
        .route("/tours/{tour_id}/assign", post(handle_assign))
        // Layout sessions
        .route("/sessions", post(handle_create_session))
        .route(
            "/sessions/{session_id}",
            get(handle_get_session).delete(handle_close_session),
        )
        .route("/sessions/{session_id}/select", post(handle_select))
        .route("/sessions/{session_id}/drag/begin", post(handle_begin_drag))
        .route("/sessions/{session_id}/drag/move", post(handle_drag_move))
        .route("/sessions/{session_id}/drag/end", post(handle_end_drag))
        .route("/sessions/{session_id}/rotate", post(handle_rotate))
        .route("/sessions/{session_id}/auto-layout", post(handle_auto_layout))
        .route(
            "/sessions/{session_id}/overflow/{box_id}/place",
            post(handle_place_overflow),
        )
        .route("/sessions/{session_id}/commit", post(handle_commit))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state)
}

/// Starts the API server and blocks until it terminates.
///
/// Configures CORS for cross-origin requests from the frontend.
pub async fn start_api_server(config: ApiConfig, state: ApiState) -> std::io::Result<()> {
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        "Server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() {
        info!("Local access: http://localhost:{}", config.port());
    }
    info!("Documentation: GET /docs, GET /docs/openapi.json");

    axum::serve(listener, router(state)).await
}

/// Handler for GET /trucks.
#[utoipa::path(
    get,
    path = "/trucks",
    responses((status = 200, description = "All known trucks", body = [Truck])),
    tag = "tours"
)]
async fn handle_list_trucks(State(state): State<ApiState>) -> Response {
    into_response(state.store.load_trucks().map_err(store_error))
}

/// Handler for GET /tours/{tour_id}.
#[utoipa::path(
    get,
    path = "/tours/{tour_id}",
    params(("tour_id" = String, Path, description = "Tour id")),
    responses(
        (status = 200, description = "Tour with load totals", body = TourResponse),
        (status = NOT_FOUND, description = "Unknown tour", body = ErrorResponse)
    ),
    tag = "tours"
)]
async fn handle_get_tour(State(state): State<ApiState>, Path(tour_id): Path<String>) -> Response {
    into_response(
        state
            .store
            .load_tour(&tour_id)
            .map(TourResponse::from_tour)
            .map_err(store_error),
    )
}

/// Handler for POST /tours/{tour_id}/articles.
///
/// Expands an article quantity into boxes and appends them to the tour's pool.
#[utoipa::path(
    post,
    path = "/tours/{tour_id}/articles",
    params(("tour_id" = String, Path, description = "Tour id")),
    request_body = ArticleRequest,
    responses(
        (status = 200, description = "Boxes added (or previewed)", body = ArticleResponse),
        (status = NOT_FOUND, description = "Unknown tour", body = ErrorResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid article", body = ErrorResponse)
    ),
    tag = "tours"
)]
async fn handle_add_articles(
    State(state): State<ApiState>,
    Path(tour_id): Path<String>,
    payload: Result<Json<ArticleRequest>, JsonRejection>,
) -> Response {
    into_response(add_articles(&state, &tour_id, payload))
}

fn add_articles(
    state: &ApiState,
    tour_id: &str,
    payload: Result<Json<ArticleRequest>, JsonRejection>,
) -> Result<ArticleResponse, Response> {
    let request = parse_json(payload)?;
    request
        .article
        .validate()
        .map_err(|err| validation_error(err.to_string()))?;

    let mut tour = state.store.load_tour(tour_id).map_err(store_error)?;
    let preview = request.article.preview(request.quantity);
    if request.preview_only {
        return Ok(ArticleResponse {
            added: Vec::new(),
            preview,
            tour_totals: tour.totals(),
        });
    }

    let added = request.article.expand(request.quantity);
    tour.boxes.extend(added.iter().cloned());
    state
        .store
        .save_tour_layout(&tour.id, &tour.boxes, &tour.confirmed_truck_ids)
        .map_err(store_error)?;
    info!(
        "Added {} boxes of '{}' to tour '{}'",
        added.len(),
        request.article.name,
        tour.id
    );

    Ok(ArticleResponse {
        added,
        preview,
        tour_totals: tour.totals(),
    })
}

/// Handler for PUT /tours/{tour_id}/boxes/{box_id}.
///
/// Reassigns one box to another truck or back to the pool. The saved
/// placement is dropped; the next layout session places the box anew.
#[utoipa::path(
    put,
    path = "/tours/{tour_id}/boxes/{box_id}",
    params(
        ("tour_id" = String, Path, description = "Tour id"),
        ("box_id" = String, Path, description = "Box id")
    ),
    request_body = MoveBoxRequest,
    responses(
        (status = 200, description = "Box reassigned", body = TourResponse),
        (status = NOT_FOUND, description = "Unknown tour, box or truck", body = ErrorResponse)
    ),
    tag = "tours"
)]
async fn handle_move_box(
    State(state): State<ApiState>,
    Path((tour_id, box_id)): Path<(String, BoxId)>,
    payload: Result<Json<MoveBoxRequest>, JsonRejection>,
) -> Response {
    into_response(move_box(&state, &tour_id, &box_id, payload))
}

fn move_box(
    state: &ApiState,
    tour_id: &str,
    box_id: &str,
    payload: Result<Json<MoveBoxRequest>, JsonRejection>,
) -> Result<TourResponse, Response> {
    let request = parse_json(payload)?;
    if let Some(truck_id) = &request.truck_id {
        let trucks = state.store.load_trucks().map_err(store_error)?;
        resolve_trucks(&trucks, std::slice::from_ref(truck_id))?;
    }

    let mut tour = state.store.load_tour(tour_id).map_err(store_error)?;
    if !tour.assign_box(box_id, request.truck_id.clone()) {
        return Err(unknown_box(tour_id, box_id));
    }
    state
        .store
        .save_tour_layout(&tour.id, &tour.boxes, &tour.confirmed_truck_ids)
        .map_err(store_error)?;
    info!(
        "Moved box '{}' of tour '{}' to {}",
        box_id,
        tour.id,
        request.truck_id.as_deref().unwrap_or("the pool")
    );
    Ok(TourResponse::from_tour(tour))
}

/// Handler for DELETE /tours/{tour_id}/boxes/{box_id}.
#[utoipa::path(
    delete,
    path = "/tours/{tour_id}/boxes/{box_id}",
    params(
        ("tour_id" = String, Path, description = "Tour id"),
        ("box_id" = String, Path, description = "Box id")
    ),
    responses(
        (status = 200, description = "Box removed", body = TourResponse),
        (status = NOT_FOUND, description = "Unknown tour or box", body = ErrorResponse)
    ),
    tag = "tours"
)]
async fn handle_remove_box(
    State(state): State<ApiState>,
    Path((tour_id, box_id)): Path<(String, BoxId)>,
) -> Response {
    into_response(remove_box(&state, &tour_id, &box_id))
}

fn remove_box(state: &ApiState, tour_id: &str, box_id: &str) -> Result<TourResponse, Response> {
    let mut tour = state.store.load_tour(tour_id).map_err(store_error)?;
    if tour.remove_box(box_id).is_none() {
        return Err(unknown_box(tour_id, box_id));
    }
    state
        .store
        .save_tour_layout(&tour.id, &tour.boxes, &tour.confirmed_truck_ids)
        .map_err(store_error)?;
    info!("Removed box '{}' from tour '{}'", box_id, tour.id);
    Ok(TourResponse::from_tour(tour))
}

fn unknown_box(tour_id: &str, box_id: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "Unknown box",
        format!("Tour '{}' has no box '{}'", tour_id, box_id),
    )
}

/// Handler for POST /tours/{tour_id}/capacity.
#[utoipa::path(
    post,
    path = "/tours/{tour_id}/capacity",
    params(("tour_id" = String, Path, description = "Tour id")),
    request_body = CapacityRequest,
    responses(
        (status = 200, description = "Minimum fleet and selection summary", body = CapacityResponse),
        (status = NOT_FOUND, description = "Unknown tour or truck", body = ErrorResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Fleet too large to solve exactly", body = ErrorResponse)
    ),
    tag = "tours"
)]
async fn handle_capacity(
    State(state): State<ApiState>,
    Path(tour_id): Path<String>,
    payload: Result<Json<CapacityRequest>, JsonRejection>,
) -> Response {
    into_response(capacity(&state, &tour_id, payload))
}

fn capacity(
    state: &ApiState,
    tour_id: &str,
    payload: Result<Json<CapacityRequest>, JsonRejection>,
) -> Result<CapacityResponse, Response> {
    let request = parse_json(payload)?;
    let tour = state.store.load_tour(tour_id).map_err(store_error)?;
    let all_trucks = state.store.load_trucks().map_err(store_error)?;

    let fleet = match &request.truck_ids {
        Some(ids) => resolve_trucks(&all_trucks, ids)?,
        None => all_trucks.clone(),
    };
    let selection = resolve_trucks(&all_trucks, &request.selected_truck_ids)?;

    let required = tour.totals();
    let min_trucks = min_trucks_for(&fleet, &required, state.layout_config.max_fleet_size)
        .map_err(capacity_error)?;

    Ok(CapacityResponse {
        required,
        min_trucks,
        selected: selected_capacity(&selection, &required),
    })
}

/// Handler for POST /tours/{tour_id}/assign.
///
/// Distributes all boxes of the tour over the given trucks and saves the result.
#[utoipa::path(
    post,
    path = "/tours/{tour_id}/assign",
    params(("tour_id" = String, Path, description = "Tour id")),
    request_body = AssignRequest,
    responses(
        (status = 200, description = "Per-truck loads and leftovers", body = FleetAssignment),
        (status = NOT_FOUND, description = "Unknown tour or truck", body = ErrorResponse)
    ),
    tag = "tours"
)]
async fn handle_assign(
    State(state): State<ApiState>,
    Path(tour_id): Path<String>,
    payload: Result<Json<AssignRequest>, JsonRejection>,
) -> Response {
    into_response(assign(&state, &tour_id, payload))
}

fn assign(
    state: &ApiState,
    tour_id: &str,
    payload: Result<Json<AssignRequest>, JsonRejection>,
) -> Result<FleetAssignment, Response> {
    let request = parse_json(payload)?;
    let mut tour = state.store.load_tour(tour_id).map_err(store_error)?;
    let all_trucks = state.store.load_trucks().map_err(store_error)?;
    let trucks = resolve_trucks(&all_trucks, &request.truck_ids)?;

    let assignment = assign_tour(&mut tour, &trucks, &state.layout_config);
    state
        .store
        .save_tour_layout(&tour.id, &tour.boxes, &tour.confirmed_truck_ids)
        .map_err(store_error)?;
    if !assignment.is_complete() {
        warn!(
            "Tour '{}': {} boxes did not fit the confirmed trucks",
            tour.id,
            assignment.unassignable.len()
        );
    }
    Ok(assignment)
}

/// Handler for POST /sessions.
///
/// Opens an editing session on the boxes a tour has assigned to one truck.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 200, description = "Session opened with its initial layout", body = SessionResponse),
        (status = NOT_FOUND, description = "Unknown tour or truck", body = ErrorResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid truck or box data", body = ErrorResponse)
    ),
    tag = "layout"
)]
async fn handle_create_session(
    State(state): State<ApiState>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Response {
    into_response(create_session(&state, payload))
}

fn create_session(
    state: &ApiState,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<SessionResponse, Response> {
    let request = parse_json(payload)?;
    let all_trucks = state.store.load_trucks().map_err(store_error)?;
    let truck = resolve_trucks(&all_trucks, std::slice::from_ref(&request.truck_id))?
        .into_iter()
        .next()
        .ok_or_else(|| validation_error("Missing truck"))?;
    truck
        .validate()
        .map_err(|err| validation_error(err.to_string()))?;

    let boxes: Vec<CargoBox> = state
        .store
        .load_boxes_for_tour(&request.tour_id)
        .map_err(store_error)?
        .into_iter()
        .filter(|b| b.truck_id.as_deref() == Some(truck.id.as_str()))
        .collect();
    for record in &boxes {
        record
            .cargo
            .validate()
            .map_err(|err| validation_error(err.to_string()))?;
    }

    let session = LayoutSession::build_initial_layout(truck, boxes, state.layout_config);
    let snapshot = session.snapshot();
    let session_id = uuid::Uuid::new_v4().to_string();
    state.sessions()?.insert(
        session_id.clone(),
        SessionEntry {
            tour_id: request.tour_id.clone(),
            session,
        },
    );
    info!(
        "Opened session {} for tour '{}' on truck '{}'",
        session_id, request.tour_id, request.truck_id
    );

    Ok(SessionResponse {
        session_id,
        tour_id: request.tour_id,
        snapshot,
    })
}

/// Handler for GET /sessions/{session_id}.
#[utoipa::path(
    get,
    path = "/sessions/{session_id}",
    params(("session_id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Current layout", body = LayoutSnapshot),
        (status = NOT_FOUND, description = "Unknown session", body = ErrorResponse)
    ),
    tag = "layout"
)]
async fn handle_get_session(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Response {
    into_response(state.with_session(&session_id, |entry| Ok(entry.session.snapshot())))
}

/// Handler for DELETE /sessions/{session_id}. Discards uncommitted changes.
#[utoipa::path(
    delete,
    path = "/sessions/{session_id}",
    params(("session_id" = String, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session closed"),
        (status = NOT_FOUND, description = "Unknown session", body = ErrorResponse)
    ),
    tag = "layout"
)]
async fn handle_close_session(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Response {
    let removed = match state.sessions() {
        Ok(mut sessions) => sessions.remove(&session_id),
        Err(response) => return response,
    };
    match removed {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            "Unknown session",
            format!("No open session '{}'", session_id),
        ),
    }
}

/// Handler for POST /sessions/{session_id}/select.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/select",
    params(("session_id" = String, Path, description = "Session id")),
    request_body = SelectRequest,
    responses(
        (status = 200, description = "Selection updated", body = LayoutSnapshot),
        (status = NOT_FOUND, description = "Unknown session or box", body = ErrorResponse)
    ),
    tag = "layout"
)]
async fn handle_select(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    payload: Result<Json<SelectRequest>, JsonRejection>,
) -> Response {
    let result = parse_json(payload).and_then(|request| {
        state.with_session(&session_id, |entry| {
            let session = &mut entry.session;
            let target = match (request.box_id, request.point) {
                (Some(box_id), _) => Some(box_id),
                (None, Some(point)) => session.hit_test(&point).map(|p| p.id().to_string()),
                (None, None) => None,
            };
            match target {
                Some(box_id) => session.select(&box_id).map_err(session_error)?,
                None => session.clear_selection(),
            }
            Ok(session.snapshot())
        })
    });
    into_response(result)
}

/// Handler for POST /sessions/{session_id}/drag/begin.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/drag/begin",
    params(("session_id" = String, Path, description = "Session id")),
    request_body = BeginDragRequest,
    responses(
        (status = 200, description = "Drag started", body = LayoutSnapshot),
        (status = NOT_FOUND, description = "Unknown session, or no box under the pointer", body = ErrorResponse),
        (status = CONFLICT, description = "Box is not placed", body = ErrorResponse)
    ),
    tag = "layout"
)]
async fn handle_begin_drag(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    payload: Result<Json<BeginDragRequest>, JsonRejection>,
) -> Response {
    let result = parse_json(payload).and_then(|request| {
        state.with_session(&session_id, |entry| {
            let session = &mut entry.session;
            let box_id = match request.box_id {
                Some(box_id) => box_id,
                None => session
                    .hit_test(&request.pointer)
                    .map(|p| p.id().to_string())
                    .ok_or_else(|| {
                        error_response(
                            StatusCode::NOT_FOUND,
                            "Nothing to drag",
                            format!(
                                "No box at ({:.3}, {:.3})",
                                request.pointer.x, request.pointer.y
                            ),
                        )
                    })?,
            };
            session
                .begin_drag(&box_id, request.pointer)
                .map_err(session_error)?;
            Ok(session.snapshot())
        })
    });
    into_response(result)
}

/// Handler for POST /sessions/{session_id}/drag/move.
///
/// A move into another box is answered with `rejected`; the box stays put.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/drag/move",
    params(("session_id" = String, Path, description = "Session id")),
    request_body = PointerRequest,
    responses(
        (status = 200, description = "Move applied or rejected", body = MutationResponse),
        (status = CONFLICT, description = "No drag in progress", body = ErrorResponse)
    ),
    tag = "layout"
)]
async fn handle_drag_move(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    payload: Result<Json<PointerRequest>, JsonRejection>,
) -> Response {
    let result = parse_json(payload).and_then(|request| {
        state.with_session(&session_id, |entry| {
            let outcome = entry
                .session
                .drag_to(request.pointer)
                .map_err(session_error)?;
            Ok(MutationResponse {
                outcome,
                snapshot: entry.session.snapshot(),
            })
        })
    });
    into_response(result)
}

/// Handler for POST /sessions/{session_id}/drag/end.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/drag/end",
    params(("session_id" = String, Path, description = "Session id")),
    responses((status = 200, description = "Drag finished", body = LayoutSnapshot)),
    tag = "layout"
)]
async fn handle_end_drag(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Response {
    into_response(state.with_session(&session_id, |entry| {
        entry.session.end_drag();
        Ok(entry.session.snapshot())
    }))
}

/// Handler for POST /sessions/{session_id}/rotate.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/rotate",
    params(("session_id" = String, Path, description = "Session id")),
    request_body = RotateRequest,
    responses(
        (status = 200, description = "Rotation applied or rejected", body = MutationResponse),
        (status = CONFLICT, description = "Nothing selected, or box not placed", body = ErrorResponse)
    ),
    tag = "layout"
)]
async fn handle_rotate(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    payload: Result<Json<RotateRequest>, JsonRejection>,
) -> Response {
    let result = parse_json(payload).and_then(|request| {
        state.with_session(&session_id, |entry| {
            let outcome = match request.box_id {
                Some(box_id) => entry.session.rotate(&box_id),
                None => entry.session.rotate_selected(),
            }
            .map_err(session_error)?;
            Ok(MutationResponse {
                outcome,
                snapshot: entry.session.snapshot(),
            })
        })
    });
    into_response(result)
}

/// Handler for POST /sessions/{session_id}/auto-layout.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/auto-layout",
    params(("session_id" = String, Path, description = "Session id")),
    responses((status = 200, description = "Bed repacked from scratch", body = LayoutSnapshot)),
    tag = "layout"
)]
async fn handle_auto_layout(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Response {
    into_response(state.with_session(&session_id, |entry| {
        entry.session.auto_layout();
        Ok(entry.session.snapshot())
    }))
}

/// Handler for POST /sessions/{session_id}/overflow/{box_id}/place.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/overflow/{box_id}/place",
    params(
        ("session_id" = String, Path, description = "Session id"),
        ("box_id" = String, Path, description = "Overflow box to place")
    ),
    responses(
        (status = 200, description = "Box placed, or rejected for lack of space", body = MutationResponse),
        (status = CONFLICT, description = "Box is not in overflow", body = ErrorResponse)
    ),
    tag = "layout"
)]
async fn handle_place_overflow(
    State(state): State<ApiState>,
    Path((session_id, box_id)): Path<(String, String)>,
) -> Response {
    into_response(state.with_session(&session_id, |entry| {
        let outcome = entry
            .session
            .place_overflow(&box_id)
            .map_err(session_error)?;
        Ok(MutationResponse {
            outcome,
            snapshot: entry.session.snapshot(),
        })
    }))
}

/// Handler for POST /sessions/{session_id}/commit.
///
/// Answers with the committed layout right away; the tour is saved in the background.
/// The store merges each truck's boxes under its write lock, so commits for
/// different trucks of one tour both survive. Two commits for the same truck
/// race, and the later save wins.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/commit",
    params(("session_id" = String, Path, description = "Session id")),
    responses((status = 200, description = "Committed layout", body = CommittedLayout)),
    tag = "layout"
)]
async fn handle_commit(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Response {
    let committed = state.with_session(&session_id, |entry| {
        Ok((entry.tour_id.clone(), entry.session.commit()))
    });
    let (tour_id, layout) = match committed {
        Ok(committed) => committed,
        Err(response) => return response,
    };

    let store = Arc::clone(&state.store);
    let records = layout.boxes.clone();
    let truck_id = layout.truck_id.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(err) = store.merge_truck_layout(&tour_id, &truck_id, records) {
            error!("Saving layout of tour '{}' failed: {}", tour_id, err);
        }
    });

    (StatusCode::OK, Json(layout)).into_response()
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
