use std::{
    io::{self, Write},
    process::{self, ExitCode},
    sync::Arc,
};

use printgate::{
    application::{
        error::AppError,
        gate::ConfirmationGate,
        print::{PrintDefaults, PrintRequest, PrintService, PrintStatus},
        render::{ChromeRenderService, RenderOrchestrator, RenderOverrides, RenderSpec},
    },
    config::{self, CheckArgs, PreviewArgs, PrintArgs},
    domain::access::AccessPolicy,
    infra::{error::InfraError, pages::LopdfPageCounter, spooler::LpSpooler, telemetry},
};
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

const EXIT_CONFIRMATION_REQUIRED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            report_application_error(&error);
            process::exit(1);
        }
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<ExitCode, AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    let policy = Arc::new(AccessPolicy::new(
        settings.access.allowed_dirs.clone(),
        settings.access.denied_dirs.clone(),
    ));
    info!(
        target = "printgate::main",
        allowed = policy.allowed().len(),
        denied = policy.denied().len(),
        "Access policy loaded"
    );

    match cli_args.command {
        config::Command::Check(args) => run_check(&policy, args),
        config::Command::Preview(args) => run_preview(build_service(policy, &settings), args).await,
        config::Command::Print(args) => run_print(build_service(policy, &settings), args).await,
    }
}

fn build_service(policy: Arc<AccessPolicy>, settings: &config::Settings) -> PrintService {
    let renderer = Arc::new(ChromeRenderService::new(settings.render.chrome_path.clone()));
    let orchestrator = RenderOrchestrator::new(policy, settings.render.config.clone(), renderer);
    let gate = ConfirmationGate::new(
        Arc::new(LopdfPageCounter),
        settings.print.confirm_threshold,
    );
    let spooler = Arc::new(LpSpooler::new(settings.print.lp_path.clone()));

    PrintService::new(
        orchestrator,
        gate,
        spooler,
        PrintDefaults {
            printer: settings.print.printer.clone(),
            duplex: settings.print.duplex,
        },
    )
}

#[derive(Debug, Serialize)]
struct CheckReport {
    path: String,
    allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

fn run_check(policy: &AccessPolicy, args: CheckArgs) -> Result<ExitCode, AppError> {
    let reports: Vec<CheckReport> = args
        .paths
        .into_iter()
        .map(|path| match policy.authorize(&path) {
            Ok(resolved) => CheckReport {
                path,
                allowed: true,
                resolved: Some(resolved.display().to_string()),
                reason: None,
                message: None,
            },
            Err(denied) => CheckReport {
                reason: Some(denied.reason.code()),
                message: Some(denied.to_string()),
                path,
                allowed: false,
                resolved: None,
            },
        })
        .collect();

    let all_allowed = reports.iter().all(|report| report.allowed);
    emit_json(&reports)?;
    Ok(if all_allowed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_preview(service: PrintService, args: PreviewArgs) -> Result<ExitCode, AppError> {
    let spec = RenderSpec::new(args.path).with_overrides(RenderOverrides::from(&args.render));
    let report = service.preview(&spec, args.duplex).await?;
    emit_json(&report)?;
    Ok(ExitCode::SUCCESS)
}

async fn run_print(service: PrintService, args: PrintArgs) -> Result<ExitCode, AppError> {
    let overrides = RenderOverrides::from(&args.render);
    let requests: Vec<PrintRequest> = args
        .paths
        .iter()
        .map(|path| PrintRequest {
            spec: RenderSpec::new(path.as_str()).with_overrides(overrides.clone()),
            copies: args.copies,
            duplex: args.duplex,
            printer: args.printer.clone(),
        })
        .collect();

    let results = service.print_batch(&requests, args.confirm).await;
    emit_json(&results)?;

    let code = if results.iter().any(|result| result.status.is_failure()) {
        ExitCode::FAILURE
    } else if results
        .iter()
        .any(|result| matches!(result.status, PrintStatus::ConfirmationRequired { .. }))
    {
        ExitCode::from(EXIT_CONFIRMATION_REQUIRED)
    } else {
        ExitCode::SUCCESS
    };
    Ok(code)
}

fn emit_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{rendered}").map_err(InfraError::from)?;
    Ok(())
}
