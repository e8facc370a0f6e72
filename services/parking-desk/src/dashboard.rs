//! Operator dashboard: HTML page plus JSON API over the shared desk state

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::actions::{parse_id, Dispatcher, FixedAnswer};
use crate::messages;
use crate::state::{Notice, NoticeLevel, StateHandle};
use crate::table::{Cell, Row, RowAction, Table};
use crate::view::{RECORD_COLUMNS, SPACE_COLUMNS};

/// Dashboard application state
#[derive(Clone)]
pub struct DashboardState {
    pub state: StateHandle,
    pub dispatcher: Arc<Dispatcher>,
    /// Prefix for backend-relative links such as plate images
    pub backend_base: String,
}

/// Build the dashboard axum router
pub fn build_router(dispatcher: Arc<Dispatcher>) -> Router {
    let dashboard_state = DashboardState {
        state: Arc::clone(dispatcher.state()),
        backend_base: dispatcher.api().base_url().to_string(),
        dispatcher,
    };

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/records", get(records_handler))
        .route("/api/spaces", get(spaces_handler))
        .route("/api/status", get(status_handler))
        .route("/api/notices", get(notices_handler))
        .route("/api/entry", post(entry_handler))
        .route("/api/exit/{id}", post(exit_handler))
        .route("/api/records/{id}", delete(delete_handler))
        .route("/api/fee", post(fee_handler))
        .route("/api/spaces/{id}/charging", post(charging_handler))
        .route("/api/spaces/{id}/occupied", post(occupied_handler))
        .with_state(dashboard_state)
}

fn status_for(notice: &Notice) -> StatusCode {
    match notice.level {
        NoticeLevel::Info => StatusCode::OK,
        NoticeLevel::Warning => StatusCode::BAD_REQUEST,
        NoticeLevel::Error => StatusCode::BAD_GATEWAY,
    }
}

fn notice_response(notice: Notice) -> (StatusCode, Json<Notice>) {
    (status_for(&notice), Json(notice))
}

/// Parse an optional JSON body; an empty body yields the default
fn parse_body<T: Default + serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, Notice> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| Notice::warning(format!("Invalid request body: {}", e)))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn action_button(action: &RowAction) -> String {
    let (label, call) = match action {
        RowAction::Exit(id) => (messages::EXIT_ACTION, format!("exitRecord({})", id)),
        RowAction::Delete(id) => (messages::DELETE_ACTION, format!("deleteRecord({})", id)),
        RowAction::ToggleOccupied(id) => {
            (messages::TOGGLE_OCCUPIED_ACTION, format!("toggleOccupied({})", id))
        }
        RowAction::ToggleCharging(id) => {
            (messages::TOGGLE_CHARGING_ACTION, format!("toggleCharging({})", id))
        }
    };
    format!(r#"<button onclick="{}">{}</button>"#, call, label)
}

fn render_cell(cell: &Cell, backend_base: &str) -> String {
    match cell {
        Cell::Text(text) => escape_html(text),
        Cell::Placeholder(text) => format!(r#"<span class="placeholder">{}</span>"#, escape_html(text)),
        Cell::Image { src, alt } => format!(
            r#"<img src="{}/{}" alt="{}" width="100">"#,
            escape_html(backend_base),
            escape_html(src),
            escape_html(alt)
        ),
        Cell::Actions(actions) => actions.iter().map(action_button).collect::<Vec<_>>().join(" "),
    }
}

fn render_row(row: &Row, backend_base: &str) -> String {
    let cells: String = row
        .cells
        .iter()
        .map(|c| format!("<td>{}</td>", render_cell(c, backend_base)))
        .collect();
    format!(r#"<tr data-id="{}">{}</tr>"#, row.key, cells)
}

fn render_table(table: &Table, columns: &[&str], empty: &str, body_id: &str, backend_base: &str) -> String {
    let header: String = columns.iter().map(|c| format!("<th>{}</th>", c)).collect();
    let body = if table.is_empty() {
        format!(r#"<tr><td colspan="{}">{}</td></tr>"#, columns.len(), empty)
    } else {
        table.rows().iter().map(|r| render_row(r, backend_base)).collect()
    };
    format!(
        r#"<table><thead><tr>{}</tr></thead><tbody id="{}">{}</tbody></table>"#,
        header, body_id, body
    )
}

async fn index_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let state = dashboard.state.read().await;
    let base = dashboard.backend_base.as_str();

    let records = render_table(
        &state.records,
        &RECORD_COLUMNS,
        messages::NO_RECORDS,
        "records-body",
        base,
    );
    let spaces = render_table(
        &state.spaces,
        &SPACE_COLUMNS,
        messages::NO_SPACES,
        "spaces-body",
        base,
    );
    let recognition = state
        .recognition_label
        .as_deref()
        .map(escape_html)
        .unwrap_or_default();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>停車場管理</title>
    <style>
        body {{ font-family: system-ui, sans-serif; max-width: 1100px; margin: 0 auto; padding: 1rem; }}
        table {{ width: 100%; border-collapse: collapse; margin-bottom: 1.5rem; }}
        th, td {{ padding: 0.5rem; text-align: left; border-bottom: 1px solid #dee2e6; }}
        .placeholder {{ color: #6c757d; }}
        #channel {{ font-weight: 600; }}
    </style>
    <script>
        const BACKEND = {backend_json};
        const LABELS = {{ exit: '{exit_label}', delete: '{delete_label}', toggle_occupied: '{occupied_label}', toggle_charging: '{charging_label}' }};
        const CALLS = {{ exit: 'exitRecord', delete: 'deleteRecord', toggle_occupied: 'toggleOccupied', toggle_charging: 'toggleCharging' }};

        function esc(s) {{
            return String(s).replace(/[&<>"']/g, c => ({{'&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;'}})[c]);
        }}
        function cellHtml(cell) {{
            switch (cell.kind) {{
                case 'text': return esc(cell.value);
                case 'placeholder': return `<span class="placeholder">${{esc(cell.value)}}</span>`;
                case 'image': return `<img src="${{esc(BACKEND)}}/${{esc(cell.value.src)}}" alt="${{esc(cell.value.alt)}}" width="100">`;
                case 'actions': return cell.value.map(a => `<button onclick="${{CALLS[a.action]}}(${{a.target}})">${{LABELS[a.action]}}</button>`).join(' ');
            }}
            return '';
        }}
        // keyed merge: rows stay in the DOM, only changed cells are rewritten
        function reconcileTable(id, rows, columns, empty) {{
            const tbody = document.getElementById(id);
            if (rows.length === 0) {{
                tbody.innerHTML = `<tr><td colspan="${{columns}}">${{empty}}</td></tr>`;
                return;
            }}
            tbody.querySelectorAll('tr:not([data-id])').forEach(tr => tr.remove());
            const keep = new Set();
            for (const r of rows) {{
                const key = String(r.key);
                keep.add(key);
                let tr = tbody.querySelector(`tr[data-id="${{key}}"]`);
                if (!tr) {{
                    tr = document.createElement('tr');
                    tr.dataset.id = key;
                    tbody.appendChild(tr);
                }}
                r.cells.forEach((c, i) => {{
                    let td = tr.cells[i];
                    if (!td) td = tr.insertCell(i);
                    const html = cellHtml(c);
                    if (td.innerHTML !== html) td.innerHTML = html;
                }});
                while (tr.cells.length > r.cells.length) tr.deleteCell(-1);
            }}
            tbody.querySelectorAll('tr[data-id]').forEach(tr => {{
                if (!keep.has(tr.dataset.id)) tr.remove();
            }});
        }}
        function refreshData() {{
            fetch('/api/records').then(r => r.json()).then(rows => reconcileTable('records-body', rows, {record_columns}, '{no_records}'));
            fetch('/api/spaces').then(r => r.json()).then(rows => reconcileTable('spaces-body', rows, {space_columns}, '{no_spaces}'));
            fetch('/api/status').then(r => r.json()).then(s => {{
                document.getElementById('channel').textContent = s.channel.status;
                document.getElementById('recognition').textContent = s.recognition_label || '';
                const plate = document.getElementById('plate');
                if (s.entry_form.plate && document.activeElement !== plate) {{
                    plate.value = s.entry_form.plate;
                }}
            }});
        }}
        function send(method, url, body) {{
            const init = {{ method, headers: {{ 'Content-Type': 'application/json' }} }};
            if (body !== undefined) init.body = JSON.stringify(body);
            return fetch(url, init)
                .then(r => r.json())
                .then(n => {{ alert(n.text); refreshData(); }});
        }}
        function submitEntry() {{
            send('POST', '/api/entry', {{ plate: document.getElementById('plate').value }});
        }}
        function estimateFee() {{
            send('POST', '/api/fee', {{ plate: document.getElementById('fee-plate').value }});
        }}
        function exitRecord(id) {{ send('POST', `/api/exit/${{id}}`); }}
        function deleteRecord(id) {{
            if (!confirm('{confirm_delete}')) return;
            send('DELETE', `/api/records/${{id}}?confirm=true`);
        }}
        function toggleCharging(id) {{ send('POST', `/api/spaces/${{id}}/charging`); }}
        function toggleOccupied(id) {{
            const plate = prompt('{plate_prompt}') || null;
            send('POST', `/api/spaces/${{id}}/occupied`, {{ plate, is_occupied: plate !== null }});
        }}
        setInterval(refreshData, 3000);
    </script>
</head>
<body>
    <h1>停車場管理</h1>
    <p>Channel: <span id="channel">{channel}</span> &nbsp; <span id="recognition">{recognition}</span></p>
    <section>
        <input id="plate" placeholder="車牌號碼" value="{plate}">
        <button onclick="submitEntry()">進場</button>
        <input id="fee-plate" placeholder="車牌號碼">
        <button onclick="estimateFee()">費用預估</button>
    </section>
    <section>
        <h2>停車紀錄</h2>
        {records}
    </section>
    <section>
        <h2>車位</h2>
        {spaces}
    </section>
</body>
</html>"#,
        backend_json = serde_json::Value::String(dashboard.backend_base.clone()),
        exit_label = messages::EXIT_ACTION,
        delete_label = messages::DELETE_ACTION,
        occupied_label = messages::TOGGLE_OCCUPIED_ACTION,
        charging_label = messages::TOGGLE_CHARGING_ACTION,
        record_columns = RECORD_COLUMNS.len(),
        space_columns = SPACE_COLUMNS.len(),
        no_records = messages::NO_RECORDS,
        no_spaces = messages::NO_SPACES,
        confirm_delete = messages::CONFIRM_DELETE,
        plate_prompt = messages::PLATE_REQUIRED,
        channel = escape_html(&state.channel.to_string()),
        recognition = recognition,
        plate = escape_html(&state.entry_form.plate),
        records = records,
        spaces = spaces,
    );

    Html(html)
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}

async fn records_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let state = dashboard.state.read().await;
    Json(state.records.rows().to_vec())
}

async fn spaces_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let state = dashboard.state.read().await;
    Json(state.spaces.rows().to_vec())
}

async fn status_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let state = dashboard.state.read().await;
    Json(serde_json::json!({
        "channel": state.channel,
        "entry_form": state.entry_form,
        "recognition_label": state.recognition_label,
        "record_count": state.records.len(),
        "space_count": state.spaces.len(),
        "last_records_sync_epoch_ms": state.last_records_sync_epoch_ms,
        "last_spaces_sync_epoch_ms": state.last_spaces_sync_epoch_ms,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

async fn notices_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let state = dashboard.state.read().await;
    Json(state.notices.iter().cloned().collect::<Vec<_>>())
}

#[derive(Debug, Default, Deserialize)]
struct EntryRequest {
    #[serde(default)]
    plate: Option<String>,
    #[serde(default)]
    space: Option<u64>,
}

async fn entry_handler(State(dashboard): State<DashboardState>, body: Bytes) -> impl IntoResponse {
    let request: EntryRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(notice) => return notice_response(notice),
    };

    let notice = match request.space {
        Some(space) => {
            let plate = match request.plate {
                Some(plate) => plate,
                None => dashboard.state.read().await.entry_form.plate.clone(),
            };
            dashboard.dispatcher.entry_at_space(space, &plate).await
        }
        None => {
            dashboard
                .dispatcher
                .entry_from_form(request.plate.as_deref())
                .await
        }
    };
    notice_response(notice)
}

async fn exit_handler(
    State(dashboard): State<DashboardState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id = parse_id(&id).unwrap_or(0);
    notice_response(dashboard.dispatcher.exit(id).await)
}

#[derive(Debug, Default, Deserialize)]
struct DeleteQuery {
    #[serde(default)]
    confirm: bool,
}

async fn delete_handler(
    State(dashboard): State<DashboardState>,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> impl IntoResponse {
    let id = parse_id(&id).unwrap_or(0);
    notice_response(
        dashboard
            .dispatcher
            .delete(id, &FixedAnswer(query.confirm))
            .await,
    )
}

#[derive(Debug, Default, Deserialize)]
struct FeeRequest {
    #[serde(default)]
    plate: String,
}

async fn fee_handler(State(dashboard): State<DashboardState>, body: Bytes) -> impl IntoResponse {
    let request: FeeRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(notice) => return notice_response(notice),
    };
    notice_response(dashboard.dispatcher.calculate_fee(&request.plate).await)
}

async fn charging_handler(
    State(dashboard): State<DashboardState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id = parse_id(&id).unwrap_or(0);
    notice_response(dashboard.dispatcher.toggle_charging(id).await)
}

#[derive(Debug, Default, Deserialize)]
struct OccupiedRequest {
    #[serde(default)]
    plate: Option<String>,
    #[serde(default)]
    is_occupied: bool,
}

async fn occupied_handler(
    State(dashboard): State<DashboardState>,
    Path(id): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    let id = parse_id(&id).unwrap_or(0);
    let request: OccupiedRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(notice) => return notice_response(notice),
    };
    notice_response(
        dashboard
            .dispatcher
            .toggle_occupied(id, request.plate.as_deref(), request.is_occupied)
            .await,
    )
}
