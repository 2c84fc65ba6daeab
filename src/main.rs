use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use clap::{Args, Parser, Subcommand};
use cover_scheduler::config::AppConfig;
use cover_scheduler::error::AppError;
use cover_scheduler::telemetry;
use cover_scheduler::workflows::substitution::{
    substitution_router, AbsenceSlot, Actor, ActorRole, InMemoryNotifier, InMemoryRequestStore,
    InMemoryRoster, ResponseAction, ScheduleEntry, SchedulingPolicy, SubstitutionService, Teacher,
    TeacherId, TimeSlot,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Cover Scheduler",
    about = "Run the substitute-teacher assignment service from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk a substitution request through its full lifecycle on sample data
    Demo,
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Demo => run_demo(),
    }
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let service = Arc::new(SubstitutionService::new(
        Arc::new(sample_roster()),
        Arc::new(InMemoryRequestStore::default()),
        Arc::new(InMemoryNotifier::default()),
        config.workflow.scheduling_policy(),
    ));

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(substitution_router(service))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "cover scheduler ready");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn run_demo() -> Result<(), AppError> {
    let roster = Arc::new(sample_roster());
    let requests = Arc::new(InMemoryRequestStore::default());
    let notifier = Arc::new(InMemoryNotifier::default());
    let service = SubstitutionService::new(
        roster,
        requests,
        notifier.clone(),
        SchedulingPolicy::default(),
    );

    let date = next_monday();
    let now: NaiveDateTime = Local::now().naive_local();
    let absence = AbsenceSlot {
        date,
        slot: slot(10, 11),
        subject: "VLSI Design".to_string(),
    };
    let requester = TeacherId(1);
    let head = Actor {
        id: TeacherId(9),
        role: ActorRole::HeadOfDepartment,
        department: "ECE".to_string(),
    };

    println!("Substitution workflow demo");
    println!("Absence: VLSI Design on {date}, 10:00-11:00");

    let ranked = service.recommend(requester, &absence)?;
    println!("\nRecommended substitutes");
    for entry in &ranked {
        println!(
            "- {} ({}), current load {}",
            entry.teacher.full_name, entry.teacher.id, entry.load
        );
    }

    let candidates: Vec<TeacherId> = ranked.iter().map(|entry| entry.teacher.id).collect();
    let request = service
        .create(
            requester,
            absence,
            "Medical appointment".to_string(),
            Some("Lecture notes are on the shared drive".to_string()),
            &candidates,
            now,
        )?;
    println!("\nCreated {} with status {}", request.id.0, request.status);

    let approved = service.approve(&request.id, &head, now)?;
    println!("Head of department approved: status {}", approved.status);

    if let Some(first) = candidates.first() {
        let declined = service.respond(&request.id, *first, ResponseAction::Reject, now)?;
        println!("Teacher {first} declined: status {}", declined.status);
    }

    if let Some(second) = candidates.get(1) {
        let filled = service.respond(&request.id, *second, ResponseAction::Accept, now)?;
        println!(
            "Teacher {second} accepted: status {}, winner {:?}",
            filled.status,
            filled.winner.map(|id| id.0)
        );
    }

    println!("\nNotifications dispatched");
    for notice in notifier.sent() {
        println!("- to teacher {}: {}", notice.recipient, notice.title);
    }

    Ok(())
}

fn next_monday() -> NaiveDate {
    let mut date = Local::now().date_naive() + Duration::days(1);
    while date.weekday() != Weekday::Mon {
        date += Duration::days(1);
    }
    date
}

fn slot(start_hour: u32, end_hour: u32) -> TimeSlot {
    TimeSlot {
        start: NaiveTime::from_hms_opt(start_hour, 0, 0).unwrap_or_default(),
        end: NaiveTime::from_hms_opt(end_hour, 0, 0).unwrap_or_default(),
    }
}

fn subjects(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

/// One ECE department with varied availability and workload history, enough
/// to exercise every endpoint by hand.
fn sample_roster() -> InMemoryRoster {
    let roster = InMemoryRoster::default();

    roster.add_teacher(Teacher {
        id: TeacherId(1),
        full_name: "Asha Pillai".to_string(),
        department: "ECE".to_string(),
        subjects: subjects(&["VLSI Design", "Digital Electronics"]),
    });
    roster.add_schedule_entry(
        TeacherId(1),
        ScheduleEntry {
            weekday: Weekday::Mon,
            slot: slot(10, 11),
            subject: "VLSI Design".to_string(),
            room: "E-204".to_string(),
        },
    );

    roster.add_teacher(Teacher {
        id: TeacherId(5),
        full_name: "Ravi Menon".to_string(),
        department: "ECE".to_string(),
        subjects: subjects(&["VLSI Design", "Signals and Systems"]),
    });
    roster.add_schedule_entry(
        TeacherId(5),
        ScheduleEntry {
            weekday: Weekday::Tue,
            slot: slot(9, 10),
            subject: "Signals and Systems".to_string(),
            room: "E-101".to_string(),
        },
    );

    roster.add_teacher(Teacher {
        id: TeacherId(8),
        full_name: "Divya Nair".to_string(),
        department: "ECE".to_string(),
        subjects: subjects(&["VLSI Design", "Embedded Systems"]),
    });
    roster.add_schedule_entry(
        TeacherId(8),
        ScheduleEntry {
            weekday: Weekday::Wed,
            slot: slot(11, 12),
            subject: "Embedded Systems".to_string(),
            room: "E-310".to_string(),
        },
    );

    roster.add_teacher(Teacher {
        id: TeacherId(9),
        full_name: "Meera Varma".to_string(),
        department: "ECE".to_string(),
        subjects: subjects(&["Digital Electronics"]),
    });
    roster.assign_head("ECE", TeacherId(9));

    roster
}
