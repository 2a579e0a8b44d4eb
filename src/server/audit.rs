use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, Utc};

use crate::auth::RequireCoordinator;
use crate::server::AppState;
use crate::server::dto::AuditQuery;
use crate::server::response::{ApiError, ApiResponse};
use crate::store::AuditFilter;
use crate::types::AuditRecord;

pub async fn list_audit(
    _auth: RequireCoordinator,
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditQuery>,
) -> Result<Response, ApiError> {
    let filter = AuditFilter {
        start: params
            .start
            .as_deref()
            .map(|s| parse_timestamp(s, false))
            .transpose()?,
        end: params
            .end
            .as_deref()
            .map(|s| parse_timestamp(s, true))
            .transpose()?,
        school_id: params.school_id.filter(|s| !s.is_empty()),
        action: params.action.filter(|s| !s.is_empty()),
        actor: params.actor.filter(|s| !s.is_empty()),
    };

    let logs = state.store.list_audit(&filter)?;

    if params.export.as_deref() == Some("csv") {
        let csv = export_csv(&logs)?;
        return Ok((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=auditoria.csv",
                ),
            ],
            csv,
        )
            .into_response());
    }

    Ok(Json(ApiResponse::success(logs)).into_response())
}

/// Accepts RFC 3339 timestamps or bare dates; a bare date expands to the
/// start or end of that day.
fn parse_timestamp(value: &str, end_of_day: bool) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let time = if end_of_day {
            date.and_hms_opt(23, 59, 59)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        if let Some(naive) = time {
            return Ok(naive.and_utc());
        }
    }

    Err(ApiError::bad_request("Formato de data inválido. Use ISO 8601."))
}

/// Fixed column order: timestamp, action, school id, school name, actor,
/// payload.
fn export_csv(logs: &[AuditRecord]) -> Result<String, ApiError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["Data/Hora", "Ação", "Escola ID", "Escola", "Usuário", "Detalhes"])
        .map_err(|_| ApiError::internal("Falha ao gerar CSV"))?;

    for log in logs {
        writer
            .write_record([
                log.ts.to_rfc3339().as_str(),
                log.action.as_str(),
                log.school_id.as_deref().unwrap_or(""),
                log.school_name.as_deref().unwrap_or(""),
                log.actor.as_str(),
                log.payload.to_string().as_str(),
            ])
            .map_err(|_| ApiError::internal("Falha ao gerar CSV"))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|_| ApiError::internal("Falha ao gerar CSV"))?;
    String::from_utf8(bytes).map_err(|_| ApiError::internal("Falha ao gerar CSV"))
}
