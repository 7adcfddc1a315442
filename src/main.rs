use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradepilot::application::services::account_service::{AccountService, PortfolioSummary};
use tradepilot::application::services::autopilot::AutopilotController;
use tradepilot::config::AppConfig;
use tradepilot::domain::entities::alert::{AlertDirection, PriceAlert};
use tradepilot::domain::entities::autopilot::{AutopilotLogEntry, AutopilotSettings, AutopilotState};
use tradepilot::domain::entities::order::{Order, OrderKind};
use tradepilot::domain::entities::position::Position;
use tradepilot::domain::entities::settings::OrderSettings;
use tradepilot::domain::errors::LedgerError;
use tradepilot::domain::repositories::notifier::NullNotifier;
use tradepilot::domain::services::ledger::{Ledger, OrderDraft};
use tradepilot::infrastructure::advisor_client::ChatAdvisorClient;
use tradepilot::infrastructure::quote_client::YahooQuoteClient;
use tradepilot::infrastructure::statement_import;
use tradepilot::persistence::{AccountDocument, SnapshotStore};

#[derive(Clone)]
struct AppState {
    account: Arc<AccountService>,
    autopilot: Arc<AutopilotController>,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn ledger_error_response(e: LedgerError) -> ApiError {
    let status = match &e {
        LedgerError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::CycleInProgress | LedgerError::InvalidTransition { .. } => {
            StatusCode::CONFLICT
        }
        LedgerError::InsufficientCash { .. }
        | LedgerError::InsufficientShares { .. }
        | LedgerError::DuplicateOrder { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
    };
    (status, Json(serde_json::json!({ "error": e.to_string() })))
}

fn bad_request(message: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradepilot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    info!("TradePilot starting, snapshot at {}", config.snapshot_path);

    let store = Arc::new(SnapshotStore::new(&config.snapshot_path));
    let mut ledger = Ledger::new(config.initial_capital);
    match store.load() {
        Ok(Some(document)) => {
            document.apply(&mut ledger);
            info!("account restored from snapshot");
        }
        Ok(None) => info!(
            "starting a fresh account with {:.2} initial capital",
            config.initial_capital
        ),
        Err(e) => {
            error!("snapshot could not be restored: {}", e);
            return Err(e.into());
        }
    }
    let ledger = Arc::new(RwLock::new(ledger));

    let quotes = Arc::new(YahooQuoteClient::new(Some(&config.quote_base_url))?);
    let advisor_key = config.advisor_api_key.clone().unwrap_or_default();
    if advisor_key.is_empty() {
        warn!("ADVISOR_API_KEY not set; autopilot cycles will log advisor failures");
    }
    let advisor = Arc::new(ChatAdvisorClient::new(
        Some(&config.advisor_base_url),
        &advisor_key,
        None,
    )?);
    let notifier = Arc::new(NullNotifier);

    let account = Arc::new(AccountService::new(
        ledger.clone(),
        quotes.clone(),
        notifier.clone(),
    ));
    let autopilot = Arc::new(AutopilotController::new(
        ledger.clone(),
        advisor,
        notifier,
        config.strategy.clone(),
        config.risk_tolerance.clone(),
    ));

    let autopilot_shutdown = autopilot.clone().spawn();
    tokio::spawn(price_sweep_task(account.clone()));
    tokio::spawn(snapshot_task(
        account.clone(),
        store.clone(),
        config.snapshot_interval_seconds,
    ));

    let state = AppState {
        account: account.clone(),
        autopilot,
    };

    let app = Router::new()
        .route("/", get(|| async { "TradePilot account simulator is running" }))
        .route("/health", get(health_check))
        .route("/portfolio", get(get_portfolio))
        .route("/positions", get(get_positions))
        .route("/orders", get(get_orders).post(create_order))
        .route("/orders/settings", get(get_order_settings).put(put_order_settings))
        .route("/orders/:id", delete(delete_order))
        .route("/orders/:id/confirm", post(confirm_order))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/execute", post(execute_order))
        .route("/cash/deposit", post(deposit))
        .route("/cash/withdraw", post(withdraw))
        .route("/watchlist", get(get_watchlist))
        .route("/watchlist/:symbol", post(add_watchlist).delete(remove_watchlist))
        .route("/alerts", get(get_alerts).post(create_alert))
        .route("/alerts/:id", delete(delete_alert))
        .route("/signals", get(get_signals))
        .route("/autopilot/status", get(autopilot_status))
        .route("/autopilot/settings", put(put_autopilot_settings))
        .route("/autopilot/run", post(autopilot_run_now))
        .route("/autopilot/log", get(autopilot_log))
        .route("/export", get(export_account))
        .route("/import", post(import_account))
        .route("/import/statement", post(import_statement_csv))
        .with_state(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, app);

    let shutdown_signal = async move {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C signal"),
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("Received SIGTERM signal");
                }
                Err(e) => error!("Failed to install SIGTERM handler: {}", e),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    };

    info!("Server started successfully. Press Ctrl+C to stop.");
    server.with_graceful_shutdown(shutdown_signal).await?;

    info!("Server shutting down gracefully...");
    let _ = autopilot_shutdown.send(true);
    if let Err(e) = store.save(&account.export_account().await) {
        error!("final snapshot failed: {}", e);
    }
    info!("Shutdown complete");
    Ok(())
}

/// Background monitoring pass: quotes, expiries, triggers, alerts.
async fn price_sweep_task(account: Arc<AccountService>) {
    loop {
        let interval_secs = {
            let ledger = account.ledger();
            let secs = ledger.read().await.order_settings().check_interval_secs;
            secs.max(5)
        };
        tokio::time::sleep(tokio::time::Duration::from_secs(interval_secs)).await;

        let report = account.run_price_sweep().await;
        if !report.orders_executed.is_empty() || !report.orders_expired.is_empty() {
            info!(
                executed = report.orders_executed.len(),
                expired = report.orders_expired.len(),
                cancelled = report.orders_cancelled.len(),
                "price sweep applied order transitions"
            );
        }
    }
}

/// Periodic account snapshot to disk.
async fn snapshot_task(account: Arc<AccountService>, store: Arc<SnapshotStore>, interval_secs: u64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_secs.max(5)));
    loop {
        interval.tick().await;
        if let Err(e) = store.save(&account.export_account().await) {
            warn!("periodic snapshot failed: {}", e);
        }
    }
}

// ---- handlers ------------------------------------------------------------

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let ledger = state.account.ledger();
    let ledger = ledger.read().await;
    Json(serde_json::json!({
        "status": "running",
        "openOrders": ledger.open_orders().count(),
        "autopilotEnabled": ledger.autopilot_settings().enabled,
    }))
}

async fn get_portfolio(State(state): State<AppState>) -> Json<PortfolioSummary> {
    Json(state.account.portfolio_summary().await)
}

async fn get_positions(State(state): State<AppState>) -> Json<Vec<Position>> {
    let ledger = state.account.ledger();
    let ledger = ledger.read().await;
    let mut positions: Vec<Position> = ledger.positions().cloned().collect();
    positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    Json(positions)
}

async fn get_orders(State(state): State<AppState>) -> Json<Vec<Order>> {
    let ledger = state.account.ledger();
    let orders = ledger.read().await.orders().to_vec();
    Json(orders)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderRequest {
    symbol: String,
    #[serde(default)]
    name: String,
    kind: OrderKind,
    quantity: f64,
    trigger_price: f64,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    override_duplicate: bool,
}

async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let name = if request.name.is_empty() {
        request.symbol.clone()
    } else {
        request.name.clone()
    };
    let mut draft = OrderDraft::manual(
        request.symbol,
        name,
        request.kind,
        request.quantity,
        request.trigger_price,
    );
    draft.expires_at = request.expires_at;
    draft.note = request.note;
    draft.override_duplicate = request.override_duplicate;

    let order = state
        .account
        .create_order(draft)
        .await
        .map_err(ledger_error_response)?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_order_settings(State(state): State<AppState>) -> Json<OrderSettings> {
    let ledger = state.account.ledger();
    let settings = ledger.read().await.order_settings().clone();
    Json(settings)
}

async fn put_order_settings(
    State(state): State<AppState>,
    Json(settings): Json<OrderSettings>,
) -> StatusCode {
    let ledger = state.account.ledger();
    ledger.write().await.set_order_settings(settings);
    StatusCode::NO_CONTENT
}

async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    state
        .account
        .remove_order(&id)
        .await
        .map(Json)
        .map_err(ledger_error_response)
}

async fn confirm_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .account
        .confirm_order(&id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(ledger_error_response)
}

#[derive(Debug, Default, Deserialize)]
struct CancelRequest {
    #[serde(default)]
    reason: Option<String>,
}

async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<CancelRequest>>,
) -> Result<StatusCode, ApiError> {
    let reason = body.and_then(|Json(r)| r.reason);
    state
        .account
        .cancel_order(&id, reason.as_deref())
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(ledger_error_response)
}

async fn execute_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = state
        .account
        .execute_order(&id)
        .await
        .map_err(ledger_error_response)?;
    Ok(Json(serde_json::json!({ "outcome": format!("{:?}", outcome) })))
}

#[derive(Debug, Deserialize)]
struct AmountRequest {
    amount: f64,
}

async fn deposit(
    State(state): State<AppState>,
    Json(request): Json<AmountRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .account
        .deposit(request.amount)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(ledger_error_response)
}

async fn withdraw(
    State(state): State<AppState>,
    Json(request): Json<AmountRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .account
        .withdraw(request.amount)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(ledger_error_response)
}

async fn get_watchlist(State(state): State<AppState>) -> Json<Vec<String>> {
    let ledger = state.account.ledger();
    let watchlist = ledger.read().await.watchlist().to_vec();
    Json(watchlist)
}

async fn add_watchlist(State(state): State<AppState>, Path(symbol): Path<String>) -> StatusCode {
    state.account.add_to_watchlist(&symbol).await;
    StatusCode::NO_CONTENT
}

async fn remove_watchlist(State(state): State<AppState>, Path(symbol): Path<String>) -> StatusCode {
    state.account.remove_from_watchlist(&symbol).await;
    StatusCode::NO_CONTENT
}

async fn get_alerts(State(state): State<AppState>) -> Json<Vec<PriceAlert>> {
    let ledger = state.account.ledger();
    let alerts = ledger.read().await.alerts().to_vec();
    Json(alerts)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAlertRequest {
    symbol: String,
    target_price: f64,
    direction: AlertDirection,
}

async fn create_alert(
    State(state): State<AppState>,
    Json(request): Json<CreateAlertRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if !request.target_price.is_finite() || request.target_price <= 0.0 {
        return Err(bad_request(format!(
            "Alert target price must be positive, got {}",
            request.target_price
        )));
    }
    let id = state
        .account
        .add_alert(PriceAlert::new(
            String::new(),
            request.symbol,
            request.target_price,
            request.direction,
        ))
        .await;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

async fn delete_alert(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.account.remove_alert(&id).await;
    StatusCode::NO_CONTENT
}

async fn get_signals(State(state): State<AppState>) -> Json<serde_json::Value> {
    let ledger = state.account.ledger();
    let ledger = ledger.read().await;
    Json(serde_json::json!({
        "signals": ledger.signals(),
        "lastAnalysis": ledger.last_analysis().map(|(text, at)| serde_json::json!({
            "text": text,
            "timestamp": at,
        })),
    }))
}

async fn autopilot_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let ledger = state.account.ledger();
    let ledger = ledger.read().await;
    let settings: &AutopilotSettings = ledger.autopilot_settings();
    let autopilot_state: &AutopilotState = ledger.autopilot_state();
    Json(serde_json::json!({
        "settings": settings,
        "state": autopilot_state,
    }))
}

async fn put_autopilot_settings(
    State(state): State<AppState>,
    Json(settings): Json<AutopilotSettings>,
) -> StatusCode {
    let ledger = state.account.ledger();
    ledger.write().await.set_autopilot_settings(settings);
    StatusCode::NO_CONTENT
}

async fn autopilot_run_now(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let report = state
        .autopilot
        .run_cycle(Utc::now())
        .await
        .map_err(ledger_error_response)?;
    Ok(Json(serde_json::json!({
        "ordersCreated": report.orders_created,
        "suggestionsSkipped": report.suggestions_skipped,
        "ranAdvisor": report.ran_advisor,
    })))
}

async fn autopilot_log(State(state): State<AppState>) -> Json<Vec<AutopilotLogEntry>> {
    let ledger = state.account.ledger();
    let entries: Vec<AutopilotLogEntry> = ledger.read().await.autopilot_log().cloned().collect();
    Json(entries)
}

async fn export_account(State(state): State<AppState>) -> Json<AccountDocument> {
    Json(state.account.export_account().await)
}

async fn import_account(
    State(state): State<AppState>,
    body: String,
) -> Result<StatusCode, ApiError> {
    state
        .account
        .import_account(&body)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(|e| bad_request(e.to_string()))
}

async fn import_statement_csv(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let positions =
        statement_import::import_statement(body.as_bytes()).map_err(|e| bad_request(e.to_string()))?;
    let imported = positions.len();
    for position in positions {
        state.account.merge_position(position).await;
    }
    Ok(Json(serde_json::json!({ "positionsImported": imported })))
}
