use std::sync::Arc;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Path, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;

use super::access::{bearer_token, require_role, SessionDirectory};
use super::activity::ActivitySettingsUpdate;
use super::domain::{
    GroupSessionId, InterviewId, InterviewerId, PositionDraft, PositionId, PositionUpdate,
    Principal, Role,
};
use super::error::{ErrorKind, SchedulingError};
use super::service::SchedulingService;

/// Shared handler state: the scheduling facade plus the token directory.
pub struct ApiState<D> {
    service: Arc<SchedulingService>,
    sessions: Arc<D>,
}

impl<D> Clone for ApiState<D> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

impl<D: SessionDirectory> ApiState<D> {
    fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, ApiFailure> {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or(ApiFailure::Unauthenticated)?;
        self.sessions
            .resolve(token)
            .ok_or(ApiFailure::Unauthenticated)
    }
}

/// Failure surfaced by a handler: an unauthenticated request or a domain error.
#[derive(Debug)]
pub enum ApiFailure {
    Unauthenticated,
    Scheduling(SchedulingError),
}

impl From<SchedulingError> for ApiFailure {
    fn from(value: SchedulingError) -> Self {
        Self::Scheduling(value)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::ActivityGateClosed => StatusCode::LOCKED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict | ErrorKind::InvalidState => StatusCode::CONFLICT,
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        match self {
            ApiFailure::Unauthenticated => {
                let payload = json!({
                    "error": "missing or unknown bearer token",
                    "kind": "unauthenticated",
                });
                (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
            }
            ApiFailure::Scheduling(error) => {
                let kind = error.kind();
                let payload = json!({
                    "error": error.to_string(),
                    "kind": kind.label(),
                });
                (status_for(kind), Json(payload)).into_response()
            }
        }
    }
}

/// JSON body whose rejections use the same `{"error", "kind"}` envelope as domain failures.
pub struct Payload<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiFailure;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Payload(value)),
            Err(rejection) => Err(body_failure(rejection)),
        }
    }
}

fn body_failure(rejection: JsonRejection) -> ApiFailure {
    ApiFailure::Scheduling(SchedulingError::validation("body", rejection.body_text()))
}

type HandlerResult = Result<Response, ApiFailure>;

fn ok<T: Serialize>(value: T) -> HandlerResult {
    Ok((StatusCode::OK, Json(value)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    pub position_id: PositionId,
}

#[derive(Debug, Deserialize)]
pub struct DelayRequest {
    pub position_id: PositionId,
    pub minutes: u32,
}

#[derive(Debug, Deserialize)]
pub struct OptimizeRequest {
    pub regular_position_id: PositionId,
    pub priority_position_id: PositionId,
}

#[derive(Debug, Deserialize)]
pub struct GroupResponseRequest {
    pub accept: bool,
}

#[derive(Debug, Deserialize)]
pub struct InterviewRequest {
    pub interview_id: InterviewId,
}

#[derive(Debug, Deserialize)]
pub struct ExceptionRequest {
    pub interview_id: InterviewId,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExtendRequest {
    pub interview_id: InterviewId,
    pub minutes: u32,
}

#[derive(Debug, Deserialize)]
pub struct InitiateGroupRequest {
    pub position_id: PositionId,
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub minimum_acceptances: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AssignmentRequest {
    pub interviewer_id: InterviewerId,
}

/// Router builder exposing the candidate, interviewer, control and company endpoints.
pub fn scheduling_router<D>(service: Arc<SchedulingService>, sessions: Arc<D>) -> Router
where
    D: SessionDirectory + 'static,
{
    Router::new()
        .route("/api/activity/status", get(activity_status_handler::<D>))
        .route("/api/candidate/positions", get(candidate_positions_handler::<D>))
        .route("/api/candidate/queue/join", post(join_handler::<D>))
        .route("/api/candidate/queue/leave", post(leave_handler::<D>))
        .route("/api/candidate/queue/priority", post(priority_handler::<D>))
        .route("/api/candidate/queue/delay", post(delay_handler::<D>))
        .route("/api/candidate/queue/status", get(queue_status_handler::<D>))
        .route("/api/candidate/queue/conflicts", get(conflicts_handler::<D>))
        .route(
            "/api/candidate/queue/jump-ahead/:position_id",
            get(jump_ahead_check_handler::<D>),
        )
        .route("/api/candidate/queue/jump-ahead", post(jump_ahead_handler::<D>))
        .route(
            "/api/candidate/queue/optimization",
            get(optimization_handler::<D>),
        )
        .route("/api/candidate/queue/optimize", post(optimize_handler::<D>))
        .route(
            "/api/candidate/queue/optimize/decline",
            post(decline_optimization_handler::<D>),
        )
        .route(
            "/api/candidate/group/:session_id/respond",
            post(group_respond_handler::<D>),
        )
        .route("/api/interviewer/queue", get(interviewer_queue_handler::<D>))
        .route(
            "/api/interviewer/interview/start",
            post(start_interview_handler::<D>),
        )
        .route(
            "/api/interviewer/interview/end",
            post(end_interview_handler::<D>),
        )
        .route(
            "/api/interviewer/interview/exception",
            post(exception_handler::<D>),
        )
        .route(
            "/api/interviewer/interview/extend",
            post(extend_handler::<D>),
        )
        .route(
            "/api/interviewer/interview/current",
            get(current_interview_handler::<D>),
        )
        .route("/api/interviewer/pause", post(pause_handler::<D>))
        .route("/api/interviewer/resume", post(resume_handler::<D>))
        .route("/api/interviewer/stats", get(interviewer_stats_handler::<D>))
        .route(
            "/api/interviewer/group/check/:position_id",
            get(group_check_handler::<D>),
        )
        .route(
            "/api/interviewer/group/initiate",
            post(group_initiate_handler::<D>),
        )
        .route(
            "/api/interviewer/group/:session_id/end",
            post(group_end_handler::<D>),
        )
        .route(
            "/api/admin/activity",
            get(activity_settings_handler::<D>).put(update_activity_handler::<D>),
        )
        .route("/api/admin/activity/start", post(start_activity_handler::<D>))
        .route("/api/admin/activity/end", post(end_activity_handler::<D>))
        .route("/api/admin/dashboard", get(dashboard_handler::<D>))
        .route(
            "/api/company/positions",
            get(company_positions_handler::<D>).post(create_position_handler::<D>),
        )
        .route("/api/company/interviewers", get(company_interviewers_handler::<D>))
        .route("/api/company/stats", get(company_stats_handler::<D>))
        .route(
            "/api/company/positions/:position_id",
            put(update_position_handler::<D>).delete(delete_position_handler::<D>),
        )
        .route(
            "/api/company/positions/:position_id/assign",
            post(assign_handler::<D>),
        )
        .route(
            "/api/company/positions/:position_id/unassign",
            post(unassign_handler::<D>),
        )
        .with_state(ApiState { service, sessions })
}

// Activity status is public so that lobby screens can poll it without a session.
async fn activity_status_handler<D>(State(state): State<ApiState<D>>) -> Response
where
    D: SessionDirectory + 'static,
{
    (StatusCode::OK, Json(state.service.activity_status())).into_response()
}

async fn candidate_positions_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.list_positions(&principal))
}

async fn join_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Payload(request): Payload<PositionRequest>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    let entry = state.service.join(&principal, request.position_id)?;
    Ok((StatusCode::CREATED, Json(entry)).into_response())
}

async fn leave_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Payload(request): Payload<PositionRequest>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.leave(&principal, request.position_id)?)
}

async fn priority_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Payload(request): Payload<PositionRequest>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.request_priority(&principal, request.position_id)?)
}

async fn delay_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Payload(request): Payload<DelayRequest>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state
        .service
        .delay(&principal, request.position_id, request.minutes)?)
}

async fn queue_status_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.queue_status(&principal)?)
}

async fn conflicts_handler<D>(State(state): State<ApiState<D>>, headers: HeaderMap) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.conflicts(&principal)?)
}

async fn jump_ahead_check_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Path(position_id): Path<u64>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state
        .service
        .jump_ahead_check(&principal, PositionId(position_id))?)
}

async fn jump_ahead_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Payload(request): Payload<PositionRequest>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.jump_ahead(&principal, request.position_id)?)
}

async fn optimization_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.optimization(&principal)?)
}

async fn optimize_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Payload(request): Payload<OptimizeRequest>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.apply_optimization(
        &principal,
        request.regular_position_id,
        request.priority_position_id,
    )?)
}

async fn decline_optimization_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Payload(request): Payload<OptimizeRequest>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    state.service.decline_optimization(
        &principal,
        request.regular_position_id,
        request.priority_position_id,
    )?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn group_respond_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Path(session_id): Path<u64>,
    Payload(request): Payload<GroupResponseRequest>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state
        .service
        .respond_group(&principal, GroupSessionId(session_id), request.accept)?)
}

async fn interviewer_queue_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.interviewer_queue(&principal)?)
}

async fn start_interview_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Payload(request): Payload<PositionRequest>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    let interview = state.service.start_next(&principal, request.position_id)?;
    Ok((StatusCode::CREATED, Json(interview)).into_response())
}

async fn end_interview_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Payload(request): Payload<InterviewRequest>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.end_interview(&principal, request.interview_id)?)
}

async fn exception_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Payload(request): Payload<ExceptionRequest>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state
        .service
        .mark_exception(&principal, request.interview_id, request.reason)?)
}

async fn extend_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Payload(request): Payload<ExtendRequest>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state
        .service
        .extend_interview(&principal, request.interview_id, request.minutes)?)
}

async fn current_interview_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    let current = state.service.current_interview(&principal)?;
    ok(json!({ "interview": current }))
}

async fn pause_handler<D>(State(state): State<ApiState<D>>, headers: HeaderMap) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.set_paused(&principal, true)?)
}

async fn resume_handler<D>(State(state): State<ApiState<D>>, headers: HeaderMap) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.set_paused(&principal, false)?)
}

async fn interviewer_stats_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.interviewer_stats(&principal)?)
}

async fn group_check_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Path(position_id): Path<u64>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state
        .service
        .group_check(&principal, PositionId(position_id))?)
}

async fn group_initiate_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Payload(request): Payload<InitiateGroupRequest>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    let session = state.service.initiate_group(
        &principal,
        request.position_id,
        request.max_participants,
        request.minimum_acceptances,
    )?;
    Ok((StatusCode::CREATED, Json(session)).into_response())
}

async fn group_end_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Path(session_id): Path<u64>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state
        .service
        .end_group(&principal, GroupSessionId(session_id))?)
}

async fn activity_settings_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.activity_settings(&principal)?)
}

async fn update_activity_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Payload(update): Payload<ActivitySettingsUpdate>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.update_activity(&principal, &update)?)
}

async fn start_activity_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.start_activity(&principal)?)
}

async fn end_activity_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.end_activity(&principal)?)
}

async fn dashboard_handler<D>(State(state): State<ApiState<D>>, headers: HeaderMap) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.dashboard(&principal)?)
}

async fn company_positions_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    require_role(&principal, Role::CompanyAdmin, "list company positions")?;
    ok(state.service.list_positions(&principal))
}

async fn company_interviewers_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.company_interviewers(&principal)?)
}

async fn company_stats_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.company_stats(&principal)?)
}

async fn create_position_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Payload(draft): Payload<PositionDraft>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    let position = state.service.create_position(&principal, draft)?;
    Ok((StatusCode::CREATED, Json(position)).into_response())
}

async fn update_position_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Path(position_id): Path<u64>,
    Payload(update): Payload<PositionUpdate>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state
        .service
        .update_position(&principal, PositionId(position_id), update)?)
}

async fn delete_position_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Path(position_id): Path<u64>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    state
        .service
        .delete_position(&principal, PositionId(position_id))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn assign_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Path(position_id): Path<u64>,
    Payload(request): Payload<AssignmentRequest>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.assign_interviewer(
        &principal,
        PositionId(position_id),
        request.interviewer_id,
    )?)
}

async fn unassign_handler<D>(
    State(state): State<ApiState<D>>,
    headers: HeaderMap,
    Path(position_id): Path<u64>,
    Payload(request): Payload<AssignmentRequest>,
) -> HandlerResult
where
    D: SessionDirectory + 'static,
{
    let principal = state.authenticate(&headers)?;
    ok(state.service.unassign_interviewer(
        &principal,
        PositionId(position_id),
        request.interviewer_id,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_onto_http_statuses() {
        assert_eq!(status_for(ErrorKind::PermissionDenied), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorKind::ActivityGateClosed), StatusCode::LOCKED);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::InvalidState), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorKind::Validation),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[tokio::test]
    async fn malformed_bodies_are_validation_failures() {
        let req = axum::http::Request::builder()
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{\"position_id\": \"one\"}"))
            .expect("request builds");
        let rejection = match Payload::<PositionRequest>::from_request(req, &()).await {
            Ok(_) => panic!("string id must not deserialize"),
            Err(rejection) => rejection,
        };
        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body collects");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(payload["kind"], "validation");
        assert!(payload["error"]
            .as_str()
            .is_some_and(|message| message.starts_with("body: ")));
    }

    #[test]
    fn unauthenticated_requests_get_401() {
        let response = ApiFailure::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let response = ApiFailure::from(SchedulingError::ActivityGateClosed).into_response();
        assert_eq!(response.status(), StatusCode::LOCKED);
    }
}
